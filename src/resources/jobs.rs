//! Jobs.
//!
//! Runners poll [`Jobs::claim`] for work; the returned token authenticates the
//! job's own calls back to the API.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use super::{NodeData, ResourceMetadata, found};
use crate::tharsis_client::TharsisClient;
use crate::tharsis_error::{Result, TharsisError};
use crate::tharsis_graphql::{Problem, into_entity};

const GET_JOB: &str = r"
    query GetJob($id: String!) {
        node(id: $id) {
            ... on Job {
                id
                metadata { createdAt updatedAt version trn }
                status
                type
                workspacePath
                runId
                cancelRequested
                maxJobDuration
                tags
                timestamps { queuedAt pendingAt runningAt finishedAt }
            }
        }
    }
";

const CLAIM_JOB: &str = r"
    mutation ClaimJob($input: ClaimJobInput!) {
        claimJob(input: $input) {
            jobId
            token
            problems { message field type }
        }
    }
";

/// Job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Job ID.
    pub id: String,
    /// Resource metadata.
    pub metadata: ResourceMetadata,
    /// Lifecycle status (`queued`, `pending`, `running`, `finished`).
    pub status: String,
    /// Job kind (`plan` or `apply`).
    #[serde(rename = "type")]
    pub job_type: String,
    /// Path of the workspace the job runs in.
    pub workspace_path: String,
    /// Run the job belongs to.
    pub run_id: String,
    /// Whether cancellation was requested.
    #[serde(default)]
    pub cancel_requested: bool,
    /// Timeout in minutes.
    #[serde(default)]
    pub max_job_duration: Option<i32>,
    /// Runner tags required by the job.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Lifecycle timestamps.
    #[serde(default)]
    pub timestamps: JobTimestamps,
}

/// Lifecycle timestamps of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTimestamps {
    /// When the job was queued.
    #[serde(default)]
    pub queued_at: Option<DateTime<Utc>>,
    /// When a runner picked it up.
    #[serde(default)]
    pub pending_at: Option<DateTime<Utc>>,
    /// When execution started.
    #[serde(default)]
    pub running_at: Option<DateTime<Utc>>,
    /// When execution ended.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Result of claiming a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimJobResponse {
    /// Claimed job ID.
    pub job_id: String,
    /// Token scoped to the job.
    pub token: String,
}

/// Job operations.
#[derive(Debug, Clone, Copy)]
pub struct Jobs<'a> {
    client: &'a TharsisClient,
}

impl<'a> Jobs<'a> {
    pub(crate) const fn new(client: &'a TharsisClient) -> Self {
        Self { client }
    }

    /// Get a job by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the job does not exist, or any transport error.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Job> {
        if id.is_empty() {
            return Err(TharsisError::bad_request("an ID must be specified to get a job"));
        }
        let transport = self.client.authenticated()?;
        let data: NodeData<Job> = transport
            .execute("GetJob", GET_JOB, json!({ "id": id }))
            .await?;
        found(data.node, "job")
    }

    /// Claim the next job for a runner. Blocks server-side until a job is
    /// available or the request times out.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self))]
    pub async fn claim(&self, runner_path: &str) -> Result<ClaimJobResponse> {
        let transport = self.client.authenticated()?;
        let variables = json!({ "input": { "runnerPath": runner_path } });
        let data: ClaimJobData = transport.execute("ClaimJob", CLAIM_JOB, variables).await?;
        data.claim_job.into_response()
    }
}

// ============================================================================
// GraphQL response types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimJobData {
    claim_job: ClaimJobPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimJobPayload {
    job_id: Option<String>,
    token: Option<String>,
    #[serde(default)]
    problems: Vec<Problem>,
}

impl ClaimJobPayload {
    fn into_response(self) -> Result<ClaimJobResponse> {
        let (job_id, token) = into_entity(&self.problems, self.job_id.zip(self.token))?;
        Ok(ClaimJobResponse { job_id, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tharsis_error::{ErrorCode, is_forbidden_error};

    #[test]
    fn job_decodes() {
        let raw = r#"{"node": {
            "id": "J_1",
            "metadata": {"createdAt": "2024-07-01T00:00:00Z", "updatedAt": "2024-07-01T00:01:00Z", "version": "3"},
            "status": "running",
            "type": "plan",
            "workspacePath": "ops/prod/network",
            "runId": "RUN_1",
            "cancelRequested": false,
            "maxJobDuration": 60,
            "tags": [],
            "timestamps": {"queuedAt": "2024-07-01T00:00:00Z", "pendingAt": "2024-07-01T00:00:10Z", "runningAt": "2024-07-01T00:00:20Z", "finishedAt": null}
        }}"#;
        let data: NodeData<Job> = serde_json::from_str(raw).unwrap();
        let job = data.node.unwrap();
        assert_eq!(job.job_type, "plan");
        assert_eq!(job.run_id, "RUN_1");
        assert!(job.timestamps.running_at.is_some());
        assert!(job.timestamps.finished_at.is_none());
    }

    #[test]
    fn claim_returns_id_and_token() {
        let raw = r#"{"claimJob": {"jobId": "J_1", "token": "job-token", "problems": []}}"#;
        let data: ClaimJobData = serde_json::from_str(raw).unwrap();
        assert_eq!(
            data.claim_job.into_response().unwrap(),
            ClaimJobResponse {
                job_id: "J_1".to_string(),
                token: "job-token".to_string(),
            }
        );
    }

    #[test]
    fn claim_problems_map() {
        let raw = r#"{"claimJob": {"jobId": null, "token": null, "problems": [
            {"message": "runner ops/edge-runner is disabled", "field": [], "type": "FORBIDDEN"}
        ]}}"#;
        let data: ClaimJobData = serde_json::from_str(raw).unwrap();
        assert!(is_forbidden_error(&data.claim_job.into_response().unwrap_err()));
    }

    #[test]
    fn claim_without_token_is_internal() {
        let raw = r#"{"claimJob": {"jobId": "J_1", "token": null, "problems": []}}"#;
        let data: ClaimJobData = serde_json::from_str(raw).unwrap();
        assert_eq!(data.claim_job.into_response().unwrap_err().code(), ErrorCode::Internal);
    }
}
