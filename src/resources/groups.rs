//! Groups.
//!
//! Groups form the namespace tree that owns workspaces, modules, runners and
//! service accounts.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use super::{Lookup, NodeData, ResourceMetadata, found, lookup};
use crate::tharsis_client::TharsisClient;
use crate::tharsis_error::Result;
use crate::tharsis_graphql::{Problem, ProblemsPayload, into_entity, into_unit};
use crate::tharsis_paginator::{Connection, Page, PaginationOptions};

const GET_GROUP_BY_ID: &str = r"
    query GetGroupById($id: String!) {
        node(id: $id) {
            ... on Group {
                id
                metadata { createdAt updatedAt version trn }
                name
                description
                fullPath
            }
        }
    }
";

const GET_GROUP_BY_PATH: &str = r"
    query GetGroupByPath($path: String!) {
        group(fullPath: $path) {
            id
            metadata { createdAt updatedAt version trn }
            name
            description
            fullPath
        }
    }
";

const LIST_GROUPS: &str = r"
    query ListGroups($first: Int, $after: String, $parentPath: String, $search: String) {
        groups(first: $first, after: $after, parentPath: $parentPath, search: $search) {
            totalCount
            pageInfo { hasNextPage endCursor }
            edges {
                node {
                    id
                    metadata { createdAt updatedAt version trn }
                    name
                    description
                    fullPath
                }
            }
        }
    }
";

const CREATE_GROUP: &str = r"
    mutation CreateGroup($input: CreateGroupInput!) {
        createGroup(input: $input) {
            group {
                id
                metadata { createdAt updatedAt version trn }
                name
                description
                fullPath
            }
            problems { message field type }
        }
    }
";

const UPDATE_GROUP: &str = r"
    mutation UpdateGroup($input: UpdateGroupInput!) {
        updateGroup(input: $input) {
            group {
                id
                metadata { createdAt updatedAt version trn }
                name
                description
                fullPath
            }
            problems { message field type }
        }
    }
";

const DELETE_GROUP: &str = r"
    mutation DeleteGroup($input: DeleteGroupInput!) {
        deleteGroup(input: $input) {
            problems { message field type }
        }
    }
";

/// Group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Group ID.
    pub id: String,
    /// Resource metadata.
    pub metadata: ResourceMetadata,
    /// Group name (last path segment).
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Full path (`parent/child`).
    pub full_path: String,
}

/// Lookup of a single group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetGroupInput {
    /// Group ID.
    pub id: Option<String>,
    /// Group full path.
    pub path: Option<String>,
}

impl GetGroupInput {
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

/// Filter for listing groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListGroupsInput {
    /// Only direct children of this group.
    pub parent_path: Option<String>,
    /// Free-text search on the path.
    pub search: Option<String>,
    /// Page size and cursor.
    pub pagination: PaginationOptions,
}

/// Input for creating a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupInput {
    /// Group name.
    pub name: String,
    /// Parent group path (top-level when absent).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_path: Option<String>,
    /// Description.
    pub description: String,
}

/// Input for updating a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupInput {
    /// Group ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Group full path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_path: Option<String>,
    /// New description.
    pub description: String,
    /// Expected version (optimistic lock).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Input for deleting a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteGroupInput {
    /// Group ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Group full path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_path: Option<String>,
    /// Delete even when the group is not empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
    /// Expected version (optimistic lock).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Group operations.
#[derive(Debug, Clone, Copy)]
pub struct Groups<'a> {
    client: &'a TharsisClient,
}

impl<'a> Groups<'a> {
    pub(crate) const fn new(client: &'a TharsisClient) -> Self {
        Self { client }
    }

    /// Get a group by ID or full path.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` when neither key is set, `NotFound` when the group
    /// does not exist, or any transport error.
    #[instrument(skip(self, input), fields(id = ?input.id, path = ?input.path))]
    pub async fn get(&self, input: &GetGroupInput) -> Result<Group> {
        let transport = self.client.authenticated()?;

        match lookup(input.id.as_deref(), input.path.as_deref(), "group")? {
            Lookup::Id(id) => {
                let data: NodeData<Group> = transport
                    .execute("GetGroupById", GET_GROUP_BY_ID, json!({ "id": id }))
                    .await?;
                found(data.node, "group")
            }
            Lookup::Path(path) => {
                let data: GroupData = transport
                    .execute("GetGroupByPath", GET_GROUP_BY_PATH, json!({ "path": path }))
                    .await?;
                found(data.group, "group")
            }
        }
    }

    /// List one page of groups.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, input), fields(parent = ?input.parent_path))]
    pub async fn list(&self, input: &ListGroupsInput) -> Result<Page<Group>> {
        let transport = self.client.authenticated()?;
        let variables = json!({
            "first": input.pagination.limit,
            "after": input.pagination.cursor,
            "parentPath": input.parent_path,
            "search": input.search,
        });
        let data: GroupsData = transport.execute("ListGroups", LIST_GROUPS, variables).await?;
        Ok(data.groups.into_page())
    }

    /// Create a group.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems (e.g. `Conflict` when the path is taken)
    /// or any transport error.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: &CreateGroupInput) -> Result<Group> {
        let transport = self.client.authenticated()?;
        let data: CreateGroupData = transport
            .execute("CreateGroup", CREATE_GROUP, json!({ "input": input }))
            .await?;
        data.create_group.into_group()
    }

    /// Update a group.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems (e.g. `OptimisticLock` on a stale
    /// version) or any transport error.
    #[instrument(skip(self, input), fields(id = ?input.id, path = ?input.group_path))]
    pub async fn update(&self, input: &UpdateGroupInput) -> Result<Group> {
        let transport = self.client.authenticated()?;
        let data: UpdateGroupData = transport
            .execute("UpdateGroup", UPDATE_GROUP, json!({ "input": input }))
            .await?;
        data.update_group.into_group()
    }

    /// Delete a group.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, input), fields(id = ?input.id, path = ?input.group_path))]
    pub async fn delete(&self, input: &DeleteGroupInput) -> Result<()> {
        let transport = self.client.authenticated()?;
        let data: DeleteGroupData = transport
            .execute("DeleteGroup", DELETE_GROUP, json!({ "input": input }))
            .await?;
        into_unit(&data.delete_group.problems)
    }
}

// ============================================================================
// GraphQL response types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
struct GroupData {
    group: Option<Group>,
}

#[derive(Debug, Deserialize)]
struct GroupsData {
    groups: Connection<Group>,
}

#[derive(Debug, Deserialize)]
struct GroupPayload {
    group: Option<Group>,
    #[serde(default)]
    problems: Vec<Problem>,
}

impl GroupPayload {
    fn into_group(self) -> Result<Group> {
        into_entity(&self.problems, self.group)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateGroupData {
    create_group: GroupPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateGroupData {
    update_group: GroupPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteGroupData {
    delete_group: ProblemsPayload,
}
