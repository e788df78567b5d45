//! Terraform modules in the private module registry.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use super::{Lookup, NodeData, ResourceMetadata, found, lookup};
use crate::tharsis_client::TharsisClient;
use crate::tharsis_error::Result;
use crate::tharsis_graphql::{Problem, ProblemsPayload, into_entity, into_unit};
use crate::tharsis_paginator::{Connection, Page, PaginationOptions};

const GET_MODULE_BY_ID: &str = r"
    query GetTerraformModuleById($id: String!) {
        node(id: $id) {
            ... on TerraformModule {
                id
                metadata { createdAt updatedAt version trn }
                name
                system
                groupPath
                resourcePath
                registryNamespace
                private
                repositoryUrl
            }
        }
    }
";

const GET_MODULE_BY_PATH: &str = r"
    query GetTerraformModuleByPath($path: String!) {
        terraformModule(path: $path) {
            id
            metadata { createdAt updatedAt version trn }
            name
            system
            groupPath
            resourcePath
            registryNamespace
            private
            repositoryUrl
        }
    }
";

const LIST_MODULES: &str = r"
    query ListTerraformModules($first: Int, $after: String, $search: String) {
        terraformModules(first: $first, after: $after, search: $search) {
            totalCount
            pageInfo { hasNextPage endCursor }
            edges {
                node {
                    id
                    metadata { createdAt updatedAt version trn }
                    name
                    system
                    groupPath
                    resourcePath
                    registryNamespace
                    private
                    repositoryUrl
                }
            }
        }
    }
";

const CREATE_MODULE: &str = r"
    mutation CreateTerraformModule($input: CreateTerraformModuleInput!) {
        createTerraformModule(input: $input) {
            module {
                id
                metadata { createdAt updatedAt version trn }
                name
                system
                groupPath
                resourcePath
                registryNamespace
                private
                repositoryUrl
            }
            problems { message field type }
        }
    }
";

const UPDATE_MODULE: &str = r"
    mutation UpdateTerraformModule($input: UpdateTerraformModuleInput!) {
        updateTerraformModule(input: $input) {
            module {
                id
                metadata { createdAt updatedAt version trn }
                name
                system
                groupPath
                resourcePath
                registryNamespace
                private
                repositoryUrl
            }
            problems { message field type }
        }
    }
";

const DELETE_MODULE: &str = r"
    mutation DeleteTerraformModule($input: DeleteTerraformModuleInput!) {
        deleteTerraformModule(input: $input) {
            problems { message field type }
        }
    }
";

/// Terraform module.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerraformModule {
    /// Module ID.
    pub id: String,
    /// Resource metadata.
    pub metadata: ResourceMetadata,
    /// Module name.
    pub name: String,
    /// Target system (provider), e.g. `aws`.
    pub system: String,
    /// Path of the owning group.
    pub group_path: String,
    /// Full resource path (`group/name/system`).
    pub resource_path: String,
    /// Registry namespace (top-level group).
    #[serde(default)]
    pub registry_namespace: String,
    /// Whether only group members may read it.
    #[serde(default)]
    pub private: bool,
    /// Source repository.
    #[serde(default)]
    pub repository_url: String,
}

/// Lookup of a single module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetTerraformModuleInput {
    /// Module ID.
    pub id: Option<String>,
    /// Module resource path.
    pub path: Option<String>,
}

/// Filter for listing modules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListTerraformModulesInput {
    /// Free-text search on name and path.
    pub search: Option<String>,
    /// Page size and cursor.
    pub pagination: PaginationOptions,
}

/// Input for creating a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTerraformModuleInput {
    /// Module name.
    pub name: String,
    /// Target system.
    pub system: String,
    /// Owning group path.
    pub group_path: String,
    /// Source repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    /// Restrict reads to group members.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
}

/// Input for updating a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTerraformModuleInput {
    /// Module ID.
    pub id: String,
    /// New source repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    /// New visibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
    /// Expected version (optimistic lock).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Input for deleting a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTerraformModuleInput {
    /// Module ID.
    pub id: String,
    /// Expected version (optimistic lock).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Terraform module operations.
#[derive(Debug, Clone, Copy)]
pub struct TerraformModules<'a> {
    client: &'a TharsisClient,
}

impl<'a> TerraformModules<'a> {
    pub(crate) const fn new(client: &'a TharsisClient) -> Self {
        Self { client }
    }

    /// Get a module by ID or resource path.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` when neither key is set, `NotFound` when the module
    /// does not exist, or any transport error.
    #[instrument(skip(self, input), fields(id = ?input.id, path = ?input.path))]
    pub async fn get(&self, input: &GetTerraformModuleInput) -> Result<TerraformModule> {
        let transport = self.client.authenticated()?;

        match lookup(input.id.as_deref(), input.path.as_deref(), "terraform module")? {
            Lookup::Id(id) => {
                let data: NodeData<TerraformModule> = transport
                    .execute("GetTerraformModuleById", GET_MODULE_BY_ID, json!({ "id": id }))
                    .await?;
                found(data.node, "terraform module")
            }
            Lookup::Path(path) => {
                let data: ModuleData = transport
                    .execute("GetTerraformModuleByPath", GET_MODULE_BY_PATH, json!({ "path": path }))
                    .await?;
                found(data.terraform_module, "terraform module")
            }
        }
    }

    /// List one page of modules.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, input), fields(search = ?input.search))]
    pub async fn list(&self, input: &ListTerraformModulesInput) -> Result<Page<TerraformModule>> {
        let transport = self.client.authenticated()?;
        let variables = json!({
            "first": input.pagination.limit,
            "after": input.pagination.cursor,
            "search": input.search,
        });
        let data: ModulesData = transport
            .execute("ListTerraformModules", LIST_MODULES, variables)
            .await?;
        Ok(data.terraform_modules.into_page())
    }

    /// Create a module.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, input), fields(group = %input.group_path, name = %input.name, system = %input.system))]
    pub async fn create(&self, input: &CreateTerraformModuleInput) -> Result<TerraformModule> {
        let transport = self.client.authenticated()?;
        let data: CreateModuleData = transport
            .execute("CreateTerraformModule", CREATE_MODULE, json!({ "input": input }))
            .await?;
        data.create_terraform_module.into_module()
    }

    /// Update a module.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, input), fields(id = %input.id))]
    pub async fn update(&self, input: &UpdateTerraformModuleInput) -> Result<TerraformModule> {
        let transport = self.client.authenticated()?;
        let data: UpdateModuleData = transport
            .execute("UpdateTerraformModule", UPDATE_MODULE, json!({ "input": input }))
            .await?;
        data.update_terraform_module.into_module()
    }

    /// Delete a module and all of its versions.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, input), fields(id = %input.id))]
    pub async fn delete(&self, input: &DeleteTerraformModuleInput) -> Result<()> {
        let transport = self.client.authenticated()?;
        let data: DeleteModuleData = transport
            .execute("DeleteTerraformModule", DELETE_MODULE, json!({ "input": input }))
            .await?;
        into_unit(&data.delete_terraform_module.problems)
    }
}

// ============================================================================
// GraphQL response types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModuleData {
    terraform_module: Option<TerraformModule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModulesData {
    terraform_modules: Connection<TerraformModule>,
}

#[derive(Debug, Deserialize)]
struct ModulePayload {
    module: Option<TerraformModule>,
    #[serde(default)]
    problems: Vec<Problem>,
}

impl ModulePayload {
    fn into_module(self) -> Result<TerraformModule> {
        into_entity(&self.problems, self.module)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateModuleData {
    create_terraform_module: ModulePayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateModuleData {
    update_terraform_module: ModulePayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteModuleData {
    delete_terraform_module: ProblemsPayload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tharsis_error::{ErrorCode, is_forbidden_error};

    const MODULE_JSON: &str = r#"{
        "id": "TM_1",
        "metadata": {"createdAt": "2024-02-10T09:00:00Z", "updatedAt": "2024-02-10T09:00:00Z", "version": "1", "trn": "trn:terraform_module:ops/vpc/aws"},
        "name": "vpc",
        "system": "aws",
        "groupPath": "ops",
        "resourcePath": "ops/vpc/aws",
        "registryNamespace": "ops",
        "private": true,
        "repositoryUrl": "https://git.example.com/ops/vpc"
    }"#;

    #[test]
    fn module_decodes() {
        let module: TerraformModule = serde_json::from_str(MODULE_JSON).unwrap();
        assert_eq!(module.resource_path, "ops/vpc/aws");
        assert_eq!(module.system, "aws");
        assert!(module.private);
    }

    #[test]
    fn get_by_path_null_is_absent() {
        let data: ModuleData = serde_json::from_str(r#"{"terraformModule": null}"#).unwrap();
        let err = found(data.terraform_module, "terraform module").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn create_payload_forbidden() {
        let raw = r#"{"createTerraformModule": {"module": null, "problems": [
            {"message": "not allowed to create modules in group ops", "field": [], "type": "FORBIDDEN"}
        ]}}"#;
        let data: CreateModuleData = serde_json::from_str(raw).unwrap();
        assert!(is_forbidden_error(&data.create_terraform_module.into_module().unwrap_err()));
    }

    #[test]
    fn list_decodes_connection() {
        let raw = format!(
            r#"{{"terraformModules": {{"totalCount": 3, "pageInfo": {{"hasNextPage": true, "endCursor": "c1"}}, "edges": [{{"node": {MODULE_JSON}}}]}}}}"#
        );
        let data: ModulesData = serde_json::from_str(&raw).unwrap();
        let page = data.terraform_modules.into_page();
        assert_eq!(page.items[0].id, "TM_1");
        assert_eq!(page.page_info.end_cursor.as_deref(), Some("c1"));
        assert_eq!(page.page_info.total_count, Some(3));
    }
}
