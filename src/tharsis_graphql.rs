//! Tharsis GraphQL transport.
//!
//! Unique responsibility: send one GraphQL operation (or one raw HTTP request)
//! to the API and hand back either decoded data or a normalized [`TharsisError`].
//!
//! API endpoints:
//! - POST `{endpoint}/graphql`
//! - PUT `{endpoint}/v1/module-registry/versions/{id}/upload`
//! - Header: Authorization: Bearer <token> (authenticated transport only)
//!
//! A transport is either authenticated (it owns a [`TokenProvider`] and asks it
//! for a token before every request) or unauthenticated. Building and caching
//! transports is the job of [`crate::TharsisClient`].

use std::fmt;
use std::sync::Arc;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::tharsis_auth::TokenProvider;
use crate::tharsis_error::{
    Result, TharsisError, from_graphql_errors, from_graphql_errors_with_status, from_http_status,
    from_problems,
};

/// GraphQL transport bound to one Tharsis endpoint.
pub struct GraphqlTransport {
    base_url: String,
    graphql_url: String,
    http: reqwest::Client,
    token_provider: Option<Arc<dyn TokenProvider>>,
}

impl GraphqlTransport {
    /// Create a transport for `base_url`.
    ///
    /// Pass a token provider to get an authenticated transport.
    #[must_use]
    pub fn new(
        base_url: &str,
        http: reqwest::Client,
        token_provider: Option<Arc<dyn TokenProvider>>,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            graphql_url: format!("{base_url}/graphql"),
            base_url,
            http,
            token_provider,
        }
    }

    /// Whether requests carry a bearer token.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token_provider.is_some()
    }

    /// Base URL of the API (no trailing slash).
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GraphQL endpoint URL.
    #[must_use]
    pub fn graphql_url(&self) -> &str {
        &self.graphql_url
    }

    /// Attach `Authorization: Bearer <token>` when a token provider is present.
    async fn authorize(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        match &self.token_provider {
            Some(provider) => {
                let token = provider.get_token().await?;
                Ok(req.bearer_auth(token))
            }
            None => Ok(req),
        }
    }

    /// Execute a query or mutation and decode its `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server answers with a non-success
    /// status, the body carries GraphQL errors, or `data` is missing.
    #[instrument(skip_all, fields(operation = operation_name, authenticated = self.is_authenticated()))]
    pub async fn execute<V, T>(&self, operation_name: &str, query: &str, variables: V) -> Result<T>
    where
        V: Serialize + Send,
        T: DeserializeOwned,
    {
        let body = GraphqlRequest {
            query,
            variables,
            operation_name,
        };

        let req = self.authorize(self.http.post(&self.graphql_url).json(&body)).await?;
        let resp = req.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        debug!(status = status.as_u16(), bytes = bytes.len(), "graphql response");

        if !status.is_success() {
            // Servers often still send a GraphQL error list with a 4xx/5xx.
            if let Ok(parsed) = serde_json::from_slice::<GraphqlResponse<serde_json::Value>>(&bytes)
                && !parsed.errors.is_empty()
            {
                return Err(from_graphql_errors_with_status(&parsed.errors, status));
            }
            return Err(from_http_status(status, &String::from_utf8_lossy(&bytes)));
        }

        let parsed: GraphqlResponse<T> = serde_json::from_slice(&bytes)?;
        parsed.into_data()
    }

    /// Send raw bytes with `PUT` to a path relative to the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server answers with a
    /// non-success status.
    #[instrument(skip(self, body), fields(bytes = body.len()))]
    pub async fn put_bytes(&self, path: &str, body: Vec<u8>) -> Result<()> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));

        let req = self.authorize(self.http.put(&url).body(body)).await?;
        let resp = req.send().await?;
        let status = resp.status();

        debug!(status = status.as_u16(), "upload response");

        if status.is_success() {
            return Ok(());
        }
        Err(status_error(status, resp.text().await))
    }
}

/// Error for a failed non-GraphQL response, noting when its body was unreadable.
fn status_error<E: fmt::Display>(status: StatusCode, body: std::result::Result<String, E>) -> TharsisError {
    match body {
        Ok(text) => from_http_status(status, &text),
        Err(e) => {
            warn!(status = status.as_u16(), error = %e, "failed to read error response body");
            from_http_status(status, &format!("response body unreadable: {e}"))
        }
    }
}

impl fmt::Debug for GraphqlTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphqlTransport")
            .field("graphql_url", &self.graphql_url)
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// GraphQL request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlRequest<'a, V> {
    query: &'a str,
    variables: V,
    operation_name: &'a str,
}

/// GraphQL response envelope.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct GraphqlResponse<T> {
    /// Response data.
    #[serde(default)]
    pub data: Option<T>,
    /// Transport-level GraphQL errors.
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

impl<T> GraphqlResponse<T> {
    /// Turn the envelope into its data, normalizing any errors.
    ///
    /// # Errors
    ///
    /// Returns the normalized GraphQL errors, or an internal error when `data`
    /// is absent.
    pub fn into_data(self) -> Result<T> {
        if !self.errors.is_empty() {
            return Err(from_graphql_errors(&self.errors));
        }
        self.data
            .ok_or_else(|| TharsisError::internal("empty response from server"))
    }
}

/// GraphQL error as returned by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GraphqlError {
    /// Human-readable message.
    pub message: String,
    /// Path of the failing field.
    #[serde(default)]
    pub path: Vec<serde_json::Value>,
    /// Extensions (carries `code`).
    #[serde(default)]
    pub extensions: Option<serde_json::Value>,
}

impl GraphqlError {
    /// The `extensions.code` value, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.get("code"))
            .and_then(serde_json::Value::as_str)
    }
}

/// Problem type reported alongside a mutation payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProblemType {
    /// Resource conflict.
    Conflict,
    /// Invalid input.
    BadRequest,
    /// Referenced resource does not exist.
    NotFound,
    /// Caller lacks permission.
    Forbidden,
    /// Version mismatch.
    OptimisticLock,
    /// Type this SDK does not know.
    #[serde(other)]
    Unknown,
}

/// Structured, non-exception error returned by a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Problem {
    /// Human-readable message.
    pub message: String,
    /// Input field path the problem refers to.
    #[serde(default)]
    pub field: Vec<String>,
    /// Problem type.
    #[serde(rename = "type")]
    pub problem_type: ProblemType,
}

/// Resolve a mutation payload: problems first, then the entity.
pub(crate) fn into_entity<T>(problems: &[Problem], entity: Option<T>) -> Result<T> {
    if let Some(err) = from_problems(problems) {
        return Err(err);
    }
    entity.ok_or_else(|| TharsisError::internal("empty response from server"))
}

/// Resolve a payload that carries no entity (deletes, heartbeats).
pub(crate) fn into_unit(problems: &[Problem]) -> Result<()> {
    from_problems(problems).map_or(Ok(()), Err)
}

/// Payload of mutations that only report problems.
#[derive(Debug, Deserialize)]
pub(crate) struct ProblemsPayload {
    #[serde(default)]
    pub problems: Vec<Problem>,
}
