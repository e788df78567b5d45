//! Terraform module versions.
//!
//! A version is created empty (status `pending`) and becomes usable once its
//! archive is uploaded with [`TerraformModuleVersions::upload`]. The upload is
//! a plain HTTP `PUT`, not GraphQL.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use super::{NodeData, ResourceMetadata, found};
use crate::tharsis_client::TharsisClient;
use crate::tharsis_error::{Result, TharsisError};
use crate::tharsis_graphql::{Problem, ProblemsPayload, into_entity, into_unit};
use crate::tharsis_paginator::{Connection, Page, PaginationOptions};

const GET_VERSION_BY_ID: &str = r"
    query GetTerraformModuleVersionById($id: String!) {
        node(id: $id) {
            ... on TerraformModuleVersion {
                id
                metadata { createdAt updatedAt version trn }
                version
                shaSum
                status
                error
                submodules
                examples
                latest
            }
        }
    }
";

const GET_VERSION_BY_PATH: &str = r"
    query GetTerraformModuleVersionByPath($modulePath: String!, $version: String) {
        terraformModuleVersion(modulePath: $modulePath, version: $version) {
            id
            metadata { createdAt updatedAt version trn }
            version
            shaSum
            status
            error
            submodules
            examples
            latest
        }
    }
";

const LIST_VERSIONS: &str = r"
    query ListTerraformModuleVersions($id: String!, $first: Int, $after: String) {
        node(id: $id) {
            ... on TerraformModule {
                versions(first: $first, after: $after) {
                    totalCount
                    pageInfo { hasNextPage endCursor }
                    edges {
                        node {
                            id
                            metadata { createdAt updatedAt version trn }
                            version
                            shaSum
                            status
                            error
                            submodules
                            examples
                            latest
                        }
                    }
                }
            }
        }
    }
";

const CREATE_VERSION: &str = r"
    mutation CreateTerraformModuleVersion($input: CreateTerraformModuleVersionInput!) {
        createTerraformModuleVersion(input: $input) {
            moduleVersion {
                id
                metadata { createdAt updatedAt version trn }
                version
                shaSum
                status
                error
                submodules
                examples
                latest
            }
            problems { message field type }
        }
    }
";

const DELETE_VERSION: &str = r"
    mutation DeleteTerraformModuleVersion($input: DeleteTerraformModuleVersionInput!) {
        deleteTerraformModuleVersion(input: $input) {
            problems { message field type }
        }
    }
";

/// Terraform module version.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerraformModuleVersion {
    /// Version ID.
    pub id: String,
    /// Resource metadata.
    pub metadata: ResourceMetadata,
    /// Semantic version.
    pub version: String,
    /// Hex SHA-256 of the uploaded archive.
    #[serde(default)]
    pub sha_sum: String,
    /// Upload/processing status (`pending`, `uploaded`, `errored`).
    pub status: String,
    /// Processing error, if any.
    #[serde(default)]
    pub error: String,
    /// Submodule paths found in the archive.
    #[serde(default)]
    pub submodules: Vec<String>,
    /// Example paths found in the archive.
    #[serde(default)]
    pub examples: Vec<String>,
    /// Whether this is the latest version of the module.
    #[serde(default)]
    pub latest: bool,
}

/// Lookup of a single module version.
///
/// Either `id`, or `module_path` with an optional `version` (latest when
/// absent).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetTerraformModuleVersionInput {
    /// Version ID.
    pub id: Option<String>,
    /// Module resource path.
    pub module_path: Option<String>,
    /// Semantic version within the module.
    pub version: Option<String>,
}

/// Filter for listing the versions of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListTerraformModuleVersionsInput {
    /// Module ID.
    pub module_id: String,
    /// Page size and cursor.
    pub pagination: PaginationOptions,
}

/// Input for creating a module version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTerraformModuleVersionInput {
    /// Module resource path.
    pub module_path: String,
    /// Semantic version.
    pub version: String,
    /// Hex SHA-256 of the archive that will be uploaded.
    pub sha_sum: String,
}

/// Input for deleting a module version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTerraformModuleVersionInput {
    /// Version ID.
    pub id: String,
    /// Expected version (optimistic lock).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Terraform module version operations.
#[derive(Debug, Clone, Copy)]
pub struct TerraformModuleVersions<'a> {
    client: &'a TharsisClient,
}

impl<'a> TerraformModuleVersions<'a> {
    pub(crate) const fn new(client: &'a TharsisClient) -> Self {
        Self { client }
    }

    /// Get a module version by ID, or by module path and version.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` when neither an ID nor a module path is set,
    /// `NotFound` when the version does not exist, or any transport error.
    #[instrument(skip(self, input), fields(id = ?input.id, module = ?input.module_path, version = ?input.version))]
    pub async fn get(&self, input: &GetTerraformModuleVersionInput) -> Result<TerraformModuleVersion> {
        let transport = self.client.authenticated()?;

        if let Some(id) = input.id.as_deref() {
            let data: NodeData<TerraformModuleVersion> = transport
                .execute("GetTerraformModuleVersionById", GET_VERSION_BY_ID, json!({ "id": id }))
                .await?;
            return found(data.node, "terraform module version");
        }

        let Some(module_path) = input.module_path.as_deref() else {
            return Err(TharsisError::bad_request(
                "either an ID or a module path must be specified to get a terraform module version",
            ));
        };

        let variables = json!({ "modulePath": module_path, "version": input.version });
        let data: VersionData = transport
            .execute("GetTerraformModuleVersionByPath", GET_VERSION_BY_PATH, variables)
            .await?;
        found(data.terraform_module_version, "terraform module version")
    }

    /// List one page of versions of a module.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the module does not exist, or any transport error.
    #[instrument(skip(self, input), fields(module_id = %input.module_id))]
    pub async fn list(
        &self,
        input: &ListTerraformModuleVersionsInput,
    ) -> Result<Page<TerraformModuleVersion>> {
        let transport = self.client.authenticated()?;
        let variables = json!({
            "id": input.module_id,
            "first": input.pagination.limit,
            "after": input.pagination.cursor,
        });
        let data: NodeData<ModuleVersions> = transport
            .execute("ListTerraformModuleVersions", LIST_VERSIONS, variables)
            .await?;
        let module = found(data.node, "terraform module")?;
        Ok(module.versions.into_page())
    }

    /// Create a module version. The archive is sent separately with
    /// [`Self::upload`].
    ///
    /// # Errors
    ///
    /// Returns the normalized problems (e.g. `Conflict` for an existing
    /// version) or any transport error.
    #[instrument(skip(self, input), fields(module = %input.module_path, version = %input.version))]
    pub async fn create(
        &self,
        input: &CreateTerraformModuleVersionInput,
    ) -> Result<TerraformModuleVersion> {
        let transport = self.client.authenticated()?;
        let data: CreateVersionData = transport
            .execute("CreateTerraformModuleVersion", CREATE_VERSION, json!({ "input": input }))
            .await?;
        data.create_terraform_module_version.into_version()
    }

    /// Delete a module version.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, input), fields(id = %input.id))]
    pub async fn delete(&self, input: &DeleteTerraformModuleVersionInput) -> Result<()> {
        let transport = self.client.authenticated()?;
        let data: DeleteVersionData = transport
            .execute("DeleteTerraformModuleVersion", DELETE_VERSION, json!({ "input": input }))
            .await?;
        into_unit(&data.delete_terraform_module_version.problems)
    }

    /// Upload the archive (`.tar.gz`) of a module version.
    ///
    /// # Errors
    ///
    /// Returns the status-mapped error on a non-success response (`TooLarge`
    /// for 413), or any transport error.
    #[instrument(skip(self, archive))]
    pub async fn upload(&self, module_version_id: &str, archive: impl Into<Vec<u8>>) -> Result<()> {
        let transport = self.client.authenticated()?;
        let archive = archive.into();
        debug!(bytes = archive.len(), "uploading module version archive");
        transport
            .put_bytes(&upload_path(module_version_id), archive)
            .await
    }
}

fn upload_path(module_version_id: &str) -> String {
    format!("v1/module-registry/versions/{module_version_id}/upload")
}

// ============================================================================
// GraphQL response types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionData {
    terraform_module_version: Option<TerraformModuleVersion>,
}

#[derive(Debug, Deserialize)]
struct ModuleVersions {
    versions: Connection<TerraformModuleVersion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionPayload {
    module_version: Option<TerraformModuleVersion>,
    #[serde(default)]
    problems: Vec<Problem>,
}

impl VersionPayload {
    fn into_version(self) -> Result<TerraformModuleVersion> {
        into_entity(&self.problems, self.module_version)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateVersionData {
    create_terraform_module_version: VersionPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteVersionData {
    delete_terraform_module_version: ProblemsPayload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tharsis_error::is_conflict_error;

    const VERSION_JSON: &str = r#"{
        "id": "TMV_1",
        "metadata": {"createdAt": "2024-02-11T09:00:00Z", "updatedAt": "2024-02-11T09:05:00Z", "version": "2", "trn": null},
        "version": "1.2.0",
        "shaSum": "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08",
        "status": "uploaded",
        "error": "",
        "submodules": ["modules/subnet"],
        "examples": [],
        "latest": true
    }"#;

    #[test]
    fn version_decodes() {
        let v: TerraformModuleVersion = serde_json::from_str(VERSION_JSON).unwrap();
        assert_eq!(v.version, "1.2.0");
        assert_eq!(v.status, "uploaded");
        assert_eq!(v.submodules, vec!["modules/subnet".to_string()]);
        assert!(v.latest);
    }

    #[test]
    fn list_unwraps_module_node() {
        let raw = format!(
            r#"{{"node": {{"versions": {{"totalCount": 1, "pageInfo": {{"hasNextPage": false, "endCursor": "v1"}}, "edges": [{{"node": {VERSION_JSON}}}]}}}}}}"#
        );
        let data: NodeData<ModuleVersions> = serde_json::from_str(&raw).unwrap();
        let page = data.node.unwrap().versions.into_page();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "TMV_1");
    }

    #[test]
    fn create_conflict() {
        let raw = r#"{"createTerraformModuleVersion": {"moduleVersion": null, "problems": [
            {"message": "version 1.2.0 already exists", "field": ["version"], "type": "CONFLICT"}
        ]}}"#;
        let data: CreateVersionData = serde_json::from_str(raw).unwrap();
        assert!(is_conflict_error(
            &data.create_terraform_module_version.into_version().unwrap_err()
        ));
    }

    #[test]
    fn upload_path_uses_version_id() {
        assert_eq!(upload_path("TMV_1"), "v1/module-registry/versions/TMV_1/upload");
    }
}
