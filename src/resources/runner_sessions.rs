//! Runner sessions.
//!
//! A runner opens a session when it starts, keeps it alive with heartbeats and
//! reports failures against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use super::ResourceMetadata;
use crate::tharsis_client::TharsisClient;
use crate::tharsis_error::Result;
use crate::tharsis_graphql::{Problem, ProblemsPayload, into_entity, into_unit};

const CREATE_SESSION: &str = r"
    mutation CreateRunnerSession($input: CreateRunnerSessionInput!) {
        createRunnerSession(input: $input) {
            runnerSession {
                id
                metadata { createdAt updatedAt version trn }
                lastContacted
                active
                internal
                errorCount
            }
            problems { message field type }
        }
    }
";

const HEARTBEAT: &str = r"
    mutation RunnerSessionHeartbeat($input: RunnerSessionHeartbeatInput!) {
        runnerSessionHeartbeat(input: $input) {
            problems { message field type }
        }
    }
";

const CREATE_ERROR: &str = r"
    mutation CreateRunnerSessionError($input: CreateRunnerSessionErrorInput!) {
        createRunnerSessionError(input: $input) {
            problems { message field type }
        }
    }
";

/// Runner session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerSession {
    /// Session ID.
    pub id: String,
    /// Resource metadata.
    pub metadata: ResourceMetadata,
    /// Last heartbeat received.
    #[serde(default)]
    pub last_contacted: Option<DateTime<Utc>>,
    /// Whether the session is still considered alive.
    #[serde(default)]
    pub active: bool,
    /// Whether the runner is operated by Tharsis itself.
    #[serde(default)]
    pub internal: bool,
    /// Errors reported so far.
    #[serde(default)]
    pub error_count: u32,
}

/// Input for opening a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRunnerSessionInput {
    /// Runner resource path.
    pub runner_path: String,
    /// Whether the runner is operated by Tharsis itself.
    pub internal: bool,
}

/// Runner session operations.
#[derive(Debug, Clone, Copy)]
pub struct RunnerSessions<'a> {
    client: &'a TharsisClient,
}

impl<'a> RunnerSessions<'a> {
    pub(crate) const fn new(client: &'a TharsisClient) -> Self {
        Self { client }
    }

    /// Open a session for a runner.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, input), fields(runner = %input.runner_path, internal = input.internal))]
    pub async fn create(&self, input: &CreateRunnerSessionInput) -> Result<RunnerSession> {
        let transport = self.client.authenticated()?;
        let data: CreateSessionData = transport
            .execute("CreateRunnerSession", CREATE_SESSION, json!({ "input": input }))
            .await?;
        data.create_runner_session.into_session()
    }

    /// Keep a session alive.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems (`NotFound` for an expired session) or
    /// any transport error.
    #[instrument(skip(self))]
    pub async fn send_heartbeat(&self, runner_session_id: &str) -> Result<()> {
        let transport = self.client.authenticated()?;
        let variables = json!({ "input": { "runnerSessionId": runner_session_id } });
        let data: HeartbeatData = transport
            .execute("RunnerSessionHeartbeat", HEARTBEAT, variables)
            .await?;
        into_unit(&data.runner_session_heartbeat.problems)
    }

    /// Report an error against a session.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems or any transport error.
    #[instrument(skip(self, error_message))]
    pub async fn create_error(&self, runner_session_id: &str, error_message: &str) -> Result<()> {
        let transport = self.client.authenticated()?;
        let variables = json!({
            "input": {
                "runnerSessionId": runner_session_id,
                "errorMessage": error_message
            }
        });
        let data: CreateErrorData = transport
            .execute("CreateRunnerSessionError", CREATE_ERROR, variables)
            .await?;
        into_unit(&data.create_runner_session_error.problems)
    }
}

// ============================================================================
// GraphQL response types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionPayload {
    runner_session: Option<RunnerSession>,
    #[serde(default)]
    problems: Vec<Problem>,
}

impl SessionPayload {
    fn into_session(self) -> Result<RunnerSession> {
        into_entity(&self.problems, self.runner_session)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionData {
    create_runner_session: SessionPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeartbeatData {
    runner_session_heartbeat: ProblemsPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateErrorData {
    create_runner_session_error: ProblemsPayload,
}
