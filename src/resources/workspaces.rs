//! Workspaces.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use super::{Lookup, NodeData, ResourceMetadata, found, lookup};
use crate::tharsis_client::TharsisClient;
use crate::tharsis_error::Result;
use crate::tharsis_graphql::{Problem, ProblemsPayload, into_entity, into_unit};
use crate::tharsis_paginator::{Connection, Page, PaginationOptions};

const WORKSPACE_FIELDS: &str = r"
    id
    metadata { createdAt updatedAt version trn }
    name
    description
    fullPath
    groupPath
    dirtyState
    locked
    maxJobDuration
    terraformVersion
    preventDestroyPlan
";

/// Workspace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    /// Workspace ID.
    pub id: String,
    /// Resource metadata.
    pub metadata: ResourceMetadata,
    /// Workspace name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Full path (`group/name`).
    pub full_path: String,
    /// Path of the owning group.
    pub group_path: String,
    /// Whether state diverged from the last applied run.
    #[serde(default)]
    pub dirty_state: bool,
    /// Whether the workspace is locked.
    #[serde(default)]
    pub locked: bool,
    /// Job timeout in minutes.
    #[serde(default)]
    pub max_job_duration: Option<i32>,
    /// Terraform CLI version used by runs.
    #[serde(default)]
    pub terraform_version: Option<String>,
    /// Whether destroy plans are refused.
    #[serde(default)]
    pub prevent_destroy_plan: bool,
}

/// Lookup of a single workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetWorkspaceInput {
    /// Workspace ID.
    pub id: Option<String>,
    /// Workspace full path.
    pub path: Option<String>,
}

impl GetWorkspaceInput {
    /// Look up by ID.
    #[must_use]
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            path: None,
        }
    }

    /// Look up by full path.
    #[must_use]
    pub fn by_path(path: impl Into<String>) -> Self {
        Self {
            id: None,
            path: Some(path.into()),
        }
    }
}

/// Filter for listing workspaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListWorkspacesInput {
    /// Only workspaces under this group.
    pub group_path: Option<String>,
    /// Free-text search on the path.
    pub search: Option<String>,
    /// Page size and cursor.
    pub pagination: PaginationOptions,
}

/// Input for creating a workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkspaceInput {
    /// Workspace name.
    pub name: String,
    /// Owning group path.
    pub group_path: String,
    /// Description.
    pub description: String,
    /// Job timeout in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_job_duration: Option<i32>,
    /// Terraform CLI version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terraform_version: Option<String>,
    /// Refuse destroy plans.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prevent_destroy_plan: Option<bool>,
}

/// Input for updating a workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkspaceInput {
    /// Workspace ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Workspace full path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_path: Option<String>,
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New job timeout in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_job_duration: Option<i32>,
    /// New Terraform CLI version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terraform_version: Option<String>,
    /// Refuse destroy plans.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prevent_destroy_plan: Option<bool>,
    /// Expected version (optimistic lock).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Input for deleting a workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteWorkspaceInput {
    /// Workspace ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Workspace full path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_path: Option<String>,
    /// Delete even when resources are still deployed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
    /// Expected version (optimistic lock).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Workspace operations.
#[derive(Debug, Clone, Copy)]
pub struct Workspaces<'a> {
    client: &'a TharsisClient,
}

impl<'a> Workspaces<'a> {
    pub(crate) const fn new(client: &'a TharsisClient) -> Self {
        Self { client }
    }

    /// Get a workspace by ID or full path.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` when neither key is set, `NotFound` when the
    /// workspace does not exist, or any transport error.
    #[instrument(skip(self, input), fields(id = ?input.id, path = ?input.path))]
    pub async fn get(&self, input: &GetWorkspaceInput) -> Result<Workspace> {
        let transport = self.client.authenticated()?;

        match lookup(input.id.as_deref(), input.path.as_deref(), "workspace")? {
            Lookup::Id(id) => {
                let query = format!(
                    "query GetWorkspaceById($id: String!) {{ node(id: $id) {{ ... on Workspace {{ {WORKSPACE_FIELDS} }} }} }}"
                );
                let data: NodeData<Workspace> = transport
                    .execute("GetWorkspaceById", &query, json!({ "id": id }))
                    .await?;
                found(data.node, "workspace")
            }
            Lookup::Path(path) => {
                let query = format!(
                    "query GetWorkspaceByPath($path: String!) {{ workspace(fullPath: $path) {{ {WORKSPACE_FIELDS} }} }}"
                );
                let data: WorkspaceData = transport
                    .execute("GetWorkspaceByPath", &query, json!({ "path": path }))
                    .await?;
                found(data.workspace, "workspace")
            }
        }
    }

    /// List one page of workspaces.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, input), fields(group = ?input.group_path))]
    pub async fn list(&self, input: &ListWorkspacesInput) -> Result<Page<Workspace>> {
        let transport = self.client.authenticated()?;
        let query = format!(
            "query ListWorkspaces($first: Int, $after: String, $groupPath: String, $search: String) {{ \
             workspaces(first: $first, after: $after, groupPath: $groupPath, search: $search) {{ \
             totalCount pageInfo {{ hasNextPage endCursor }} edges {{ node {{ {WORKSPACE_FIELDS} }} }} }} }}"
        );
        let variables = json!({
            "first": input.pagination.limit,
            "after": input.pagination.cursor,
            "groupPath": input.group_path,
            "search": input.search,
        });
        let data: WorkspacesData = transport.execute("ListWorkspaces", &query, variables).await?;
        Ok(data.workspaces.into_page())
    }

    /// Create a workspace.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, input), fields(group = %input.group_path, name = %input.name))]
    pub async fn create(&self, input: &CreateWorkspaceInput) -> Result<Workspace> {
        let transport = self.client.authenticated()?;
        let query = format!(
            "mutation CreateWorkspace($input: CreateWorkspaceInput!) {{ createWorkspace(input: $input) {{ \
             workspace {{ {WORKSPACE_FIELDS} }} problems {{ message field type }} }} }}"
        );
        let data: CreateWorkspaceData = transport
            .execute("CreateWorkspace", &query, json!({ "input": input }))
            .await?;
        data.create_workspace.into_workspace()
    }

    /// Update a workspace.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, input), fields(id = ?input.id, path = ?input.workspace_path))]
    pub async fn update(&self, input: &UpdateWorkspaceInput) -> Result<Workspace> {
        let transport = self.client.authenticated()?;
        let query = format!(
            "mutation UpdateWorkspace($input: UpdateWorkspaceInput!) {{ updateWorkspace(input: $input) {{ \
             workspace {{ {WORKSPACE_FIELDS} }} problems {{ message field type }} }} }}"
        );
        let data: UpdateWorkspaceData = transport
            .execute("UpdateWorkspace", &query, json!({ "input": input }))
            .await?;
        data.update_workspace.into_workspace()
    }

    /// Delete a workspace.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, input), fields(id = ?input.id, path = ?input.workspace_path))]
    pub async fn delete(&self, input: &DeleteWorkspaceInput) -> Result<()> {
        let transport = self.client.authenticated()?;
        let query = "mutation DeleteWorkspace($input: DeleteWorkspaceInput!) { \
                     deleteWorkspace(input: $input) { problems { message field type } } }";
        let data: DeleteWorkspaceData = transport
            .execute("DeleteWorkspace", query, json!({ "input": input }))
            .await?;
        into_unit(&data.delete_workspace.problems)
    }
}

// ============================================================================
// GraphQL response types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
struct WorkspaceData {
    workspace: Option<Workspace>,
}

#[derive(Debug, Deserialize)]
struct WorkspacesData {
    workspaces: Connection<Workspace>,
}

#[derive(Debug, Deserialize)]
struct WorkspacePayload {
    workspace: Option<Workspace>,
    #[serde(default)]
    problems: Vec<Problem>,
}

impl WorkspacePayload {
    fn into_workspace(self) -> Result<Workspace> {
        into_entity(&self.problems, self.workspace)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateWorkspaceData {
    create_workspace: WorkspacePayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateWorkspaceData {
    update_workspace: WorkspacePayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteWorkspaceData {
    delete_workspace: ProblemsPayload,
}
