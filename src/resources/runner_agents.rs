//! Runner agents.
//!
//! A runner agent is the registration of a job executor. Group runners only
//! pick up jobs of their group; shared runners serve every group.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use super::{Lookup, NodeData, ResourceMetadata, found, lookup};
use crate::tharsis_client::TharsisClient;
use crate::tharsis_error::Result;
use crate::tharsis_graphql::{Problem, ProblemsPayload, into_entity, into_unit};

const GET_RUNNER_BY_ID: &str = r"
    query GetRunnerById($id: String!) {
        node(id: $id) {
            ... on Runner {
                id
                metadata { createdAt updatedAt version trn }
                name
                description
                groupPath
                resourcePath
                type
                createdBy
                disabled
                tags
                runUntaggedJobs
            }
        }
    }
";

const GET_RUNNER_BY_PATH: &str = r"
    query GetRunnerByPath($path: String!) {
        runner(path: $path) {
            id
            metadata { createdAt updatedAt version trn }
            name
            description
            groupPath
            resourcePath
            type
            createdBy
            disabled
            tags
            runUntaggedJobs
        }
    }
";

const CREATE_RUNNER: &str = r"
    mutation CreateRunner($input: CreateRunnerInput!) {
        createRunner(input: $input) {
            runner {
                id
                metadata { createdAt updatedAt version trn }
                name
                description
                groupPath
                resourcePath
                type
                createdBy
                disabled
                tags
                runUntaggedJobs
            }
            problems { message field type }
        }
    }
";

const UPDATE_RUNNER: &str = r"
    mutation UpdateRunner($input: UpdateRunnerInput!) {
        updateRunner(input: $input) {
            runner {
                id
                metadata { createdAt updatedAt version trn }
                name
                description
                groupPath
                resourcePath
                type
                createdBy
                disabled
                tags
                runUntaggedJobs
            }
            problems { message field type }
        }
    }
";

const DELETE_RUNNER: &str = r"
    mutation DeleteRunner($input: DeleteRunnerInput!) {
        deleteRunner(input: $input) {
            problems { message field type }
        }
    }
";

const ASSIGN_SERVICE_ACCOUNT: &str = r"
    mutation AssignServiceAccountToRunner($input: AssignServiceAccountToRunnerInput!) {
        assignServiceAccountToRunner(input: $input) {
            problems { message field type }
        }
    }
";

const UNASSIGN_SERVICE_ACCOUNT: &str = r"
    mutation UnassignServiceAccountFromRunner($input: AssignServiceAccountToRunnerInput!) {
        unassignServiceAccountFromRunner(input: $input) {
            problems { message field type }
        }
    }
";

/// Runner kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunnerType {
    /// Serves one group and its descendants.
    Group,
    /// Serves every group.
    Shared,
    /// Type this SDK does not know.
    #[serde(other)]
    Unknown,
}

/// Runner agent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerAgent {
    /// Runner ID.
    pub id: String,
    /// Resource metadata.
    pub metadata: ResourceMetadata,
    /// Runner name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Path of the owning group (empty for shared runners).
    #[serde(default)]
    pub group_path: String,
    /// Full resource path.
    pub resource_path: String,
    /// Runner kind.
    #[serde(rename = "type")]
    pub runner_type: RunnerType,
    /// Creator.
    #[serde(default)]
    pub created_by: String,
    /// Whether the runner is paused.
    #[serde(default)]
    pub disabled: bool,
    /// Job tags the runner accepts.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether the runner also takes untagged jobs.
    #[serde(default)]
    pub run_untagged_jobs: bool,
}

/// Lookup of a single runner agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetRunnerAgentInput {
    /// Runner ID.
    pub id: Option<String>,
    /// Runner resource path.
    pub path: Option<String>,
}

/// Input for creating a runner agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRunnerAgentInput {
    /// Runner name.
    pub name: String,
    /// Owning group path.
    pub group_path: String,
    /// Description.
    pub description: String,
    /// Job tags the runner accepts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Also take untagged jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_untagged_jobs: Option<bool>,
}

/// Input for updating a runner agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRunnerAgentInput {
    /// Runner ID.
    pub id: String,
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Pause or resume the runner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    /// New tag set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Also take untagged jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_untagged_jobs: Option<bool>,
    /// Expected version (optimistic lock).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Input for deleting a runner agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRunnerAgentInput {
    /// Runner ID.
    pub id: String,
    /// Expected version (optimistic lock).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Input for (un)assigning a service account to a runner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignServiceAccountToRunnerInput {
    /// Runner resource path.
    pub runner_path: String,
    /// Service account resource path.
    pub service_account_path: String,
}

/// Runner agent operations.
#[derive(Debug, Clone, Copy)]
pub struct RunnerAgents<'a> {
    client: &'a TharsisClient,
}

impl<'a> RunnerAgents<'a> {
    pub(crate) const fn new(client: &'a TharsisClient) -> Self {
        Self { client }
    }

    /// Get a runner agent by ID or resource path.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` when neither key is set, `NotFound` when the runner
    /// does not exist, or any transport error.
    #[instrument(skip(self, input), fields(id = ?input.id, path = ?input.path))]
    pub async fn get(&self, input: &GetRunnerAgentInput) -> Result<RunnerAgent> {
        let transport = self.client.authenticated()?;

        match lookup(input.id.as_deref(), input.path.as_deref(), "runner agent")? {
            Lookup::Id(id) => {
                let data: NodeData<RunnerAgent> = transport
                    .execute("GetRunnerById", GET_RUNNER_BY_ID, json!({ "id": id }))
                    .await?;
                found(data.node, "runner agent")
            }
            Lookup::Path(path) => {
                let data: RunnerData = transport
                    .execute("GetRunnerByPath", GET_RUNNER_BY_PATH, json!({ "path": path }))
                    .await?;
                found(data.runner, "runner agent")
            }
        }
    }

    /// Register a group runner agent.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, input), fields(group = %input.group_path, name = %input.name))]
    pub async fn create(&self, input: &CreateRunnerAgentInput) -> Result<RunnerAgent> {
        let transport = self.client.authenticated()?;
        let data: CreateRunnerData = transport
            .execute("CreateRunner", CREATE_RUNNER, json!({ "input": input }))
            .await?;
        data.create_runner.into_runner()
    }

    /// Update a runner agent.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, input), fields(id = %input.id))]
    pub async fn update(&self, input: &UpdateRunnerAgentInput) -> Result<RunnerAgent> {
        let transport = self.client.authenticated()?;
        let data: UpdateRunnerData = transport
            .execute("UpdateRunner", UPDATE_RUNNER, json!({ "input": input }))
            .await?;
        data.update_runner.into_runner()
    }

    /// Delete a runner agent.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, input), fields(id = %input.id))]
    pub async fn delete(&self, input: &DeleteRunnerAgentInput) -> Result<()> {
        let transport = self.client.authenticated()?;
        let data: DeleteRunnerData = transport
            .execute("DeleteRunner", DELETE_RUNNER, json!({ "input": input }))
            .await?;
        into_unit(&data.delete_runner.problems)
    }

    /// Allow a service account to act as this runner.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, input), fields(runner = %input.runner_path, service_account = %input.service_account_path))]
    pub async fn assign_service_account(&self, input: &AssignServiceAccountToRunnerInput) -> Result<()> {
        let transport = self.client.authenticated()?;
        let data: AssignData = transport
            .execute(
                "AssignServiceAccountToRunner",
                ASSIGN_SERVICE_ACCOUNT,
                json!({ "input": input }),
            )
            .await?;
        into_unit(&data.assign_service_account_to_runner.problems)
    }

    /// Revoke a service account from this runner.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, input), fields(runner = %input.runner_path, service_account = %input.service_account_path))]
    pub async fn unassign_service_account(
        &self,
        input: &AssignServiceAccountToRunnerInput,
    ) -> Result<()> {
        let transport = self.client.authenticated()?;
        let data: UnassignData = transport
            .execute(
                "UnassignServiceAccountFromRunner",
                UNASSIGN_SERVICE_ACCOUNT,
                json!({ "input": input }),
            )
            .await?;
        into_unit(&data.unassign_service_account_from_runner.problems)
    }
}

// ============================================================================
// GraphQL response types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
struct RunnerData {
    runner: Option<RunnerAgent>,
}

#[derive(Debug, Deserialize)]
struct RunnerPayload {
    runner: Option<RunnerAgent>,
    #[serde(default)]
    problems: Vec<Problem>,
}

impl RunnerPayload {
    fn into_runner(self) -> Result<RunnerAgent> {
        into_entity(&self.problems, self.runner)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRunnerData {
    create_runner: RunnerPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRunnerData {
    update_runner: RunnerPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRunnerData {
    delete_runner: ProblemsPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignData {
    assign_service_account_to_runner: ProblemsPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnassignData {
    unassign_service_account_from_runner: ProblemsPayload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tharsis_error::is_not_found_error;

    #[test]
    fn runner_decodes_type() {
        let raw = r#"{"runner": {
            "id": "R_1",
            "metadata": {"createdAt": "2024-06-01T00:00:00Z", "updatedAt": "2024-06-01T00:00:00Z", "version": "1"},
            "name": "edge-runner",
            "description": "",
            "groupPath": "ops",
            "resourcePath": "ops/edge-runner",
            "type": "GROUP",
            "createdBy": "ci@example.com",
            "disabled": false,
            "tags": ["gpu"],
            "runUntaggedJobs": true
        }}"#;
        let data: RunnerData = serde_json::from_str(raw).unwrap();
        let runner = data.runner.unwrap();
        assert_eq!(runner.runner_type, RunnerType::Group);
        assert_eq!(runner.tags, vec!["gpu".to_string()]);
        assert!(runner.run_untagged_jobs);
    }

    #[test]
    fn unknown_runner_type_is_tolerated() {
        let runner_type: RunnerType = serde_json::from_str(r#""EPHEMERAL""#).unwrap();
        assert_eq!(runner_type, RunnerType::Unknown);
    }

    #[test]
    fn assign_problems_map() {
        let raw = r#"{"assignServiceAccountToRunner": {"problems": [
            {"message": "service account ops/missing not found", "field": [], "type": "NOT_FOUND"}
        ]}}"#;
        let data: AssignData = serde_json::from_str(raw).unwrap();
        assert!(is_not_found_error(
            &into_unit(&data.assign_service_account_to_runner.problems).unwrap_err()
        ));
    }

    #[test]
    fn assign_input_shape() {
        let input = AssignServiceAccountToRunnerInput {
            runner_path: "ops/edge-runner".to_string(),
            service_account_path: "ops/deployer".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({"runnerPath": "ops/edge-runner", "serviceAccountPath": "ops/deployer"})
        );
    }
}
