//! Tharsis SDK errors.
//!
//! Unique responsibility: fold the three error shapes the API can produce into
//! one small, closed set of SDK error codes.
//!
//! Sources:
//! - GraphQL transport errors (keyed by `extensions.code`)
//! - Mutation "problems" (keyed by problem `type`)
//! - Plain HTTP status codes (binary endpoints and failed GraphQL calls)
//!
//! Callers branch on the code with the `is_*_error` helpers instead of matching
//! on messages.

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

use crate::tharsis_graphql::{GraphqlError, Problem, ProblemType};

/// Longest HTTP body kept in an error message.
const MAX_BODY_LEN: usize = 4096;

/// Result alias used across the SDK.
pub type Result<T> = std::result::Result<T, TharsisError>;

/// Closed set of SDK error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Unexpected server or client failure.
    Internal,
    /// Resource does not exist.
    NotFound,
    /// Resource already exists or conflicts with another one.
    Conflict,
    /// Resource was modified concurrently (version mismatch).
    OptimisticLock,
    /// Caller lacks permission.
    Forbidden,
    /// Caller is being rate limited.
    TooManyRequests,
    /// Caller is not authenticated.
    Unauthorized,
    /// Payload exceeds the server limit.
    TooLarge,
    /// Request was rejected as invalid.
    BadRequest,
    /// Operation is not supported by the server.
    NotImplemented,
}

impl ErrorCode {
    /// Map a GraphQL `extensions.code` value.
    ///
    /// Unknown or missing codes map to [`ErrorCode::Internal`].
    #[must_use]
    pub fn from_graphql_code(code: Option<&str>) -> Self {
        match code {
            Some("NOT_FOUND") => Self::NotFound,
            Some("CONFLICT") => Self::Conflict,
            Some("OPTIMISTIC_LOCK") => Self::OptimisticLock,
            Some("FORBIDDEN") => Self::Forbidden,
            Some("RATE_LIMIT_EXCEEDED" | "TOO_MANY_REQUESTS") => Self::TooManyRequests,
            Some("UNAUTHENTICATED" | "UNAUTHORIZED") => Self::Unauthorized,
            Some("TOO_LARGE" | "MAX_UPLOAD_SIZE_EXCEEDED") => Self::TooLarge,
            Some("BAD_REQUEST" | "GRAPHQL_VALIDATION_FAILED" | "BAD_USER_INPUT") => {
                Self::BadRequest
            }
            Some("NOT_IMPLEMENTED") => Self::NotImplemented,
            _ => Self::Internal,
        }
    }

    /// Map a mutation problem type.
    #[must_use]
    pub const fn from_problem_type(problem_type: &ProblemType) -> Self {
        match problem_type {
            ProblemType::Conflict => Self::Conflict,
            ProblemType::BadRequest => Self::BadRequest,
            ProblemType::NotFound => Self::NotFound,
            ProblemType::Forbidden => Self::Forbidden,
            ProblemType::OptimisticLock => Self::OptimisticLock,
            ProblemType::Unknown => Self::Internal,
        }
    }

    /// Map an HTTP status code.
    #[must_use]
    pub const fn from_http_status(status: StatusCode) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            409 => Self::Conflict,
            413 => Self::TooLarge,
            429 => Self::TooManyRequests,
            501 => Self::NotImplemented,
            _ => Self::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Internal => "internal error",
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::OptimisticLock => "optimistic lock",
            Self::Forbidden => "forbidden",
            Self::TooManyRequests => "too many requests",
            Self::Unauthorized => "unauthorized",
            Self::TooLarge => "too large",
            Self::BadRequest => "bad request",
            Self::NotImplemented => "not implemented",
        };
        f.write_str(s)
    }
}

/// Error type for every SDK operation.
#[derive(Debug, Error)]
pub enum TharsisError {
    /// Error reported by (or on behalf of) the API, tagged with an SDK code.
    #[error("{code}: {message}")]
    Api {
        /// SDK error code.
        code: ErrorCode,
        /// Human-readable message.
        message: String,
    },

    /// Several API errors returned together (e.g. multiple problems).
    #[error("{}", join_messages(.0))]
    Multiple(Vec<TharsisError>),

    /// HTTP client error (connect, timeout, body read).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding or decoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing required environment variable.
    #[error("missing required env var: {0}")]
    MissingEnv(&'static str),

    /// Invalid environment variable value.
    #[error("invalid env var {key}: {reason}")]
    InvalidEnv {
        /// The environment variable key.
        key: &'static str,
        /// The reason for invalidity.
        reason: &'static str,
    },
}

impl TharsisError {
    /// Build an API error with the given code.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// Build an [`ErrorCode::Internal`] error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Build an [`ErrorCode::NotFound`] error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Build an [`ErrorCode::BadRequest`] error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// SDK code of this error.
    ///
    /// Transport, serialization and configuration failures are internal.
    /// A multi-error reports the code of its first entry.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Api { code, .. } => *code,
            Self::Multiple(errors) => errors.first().map_or(ErrorCode::Internal, Self::code),
            Self::Http(_) | Self::Json(_) | Self::MissingEnv(_) | Self::InvalidEnv { .. } => {
                ErrorCode::Internal
            }
        }
    }

    /// Whether this error, or any error aggregated in it, carries `code`.
    #[must_use]
    pub fn has_code(&self, code: ErrorCode) -> bool {
        match self {
            Self::Multiple(errors) => errors.iter().any(|e| e.has_code(code)),
            other => other.code() == code,
        }
    }
}

fn join_messages(errors: &[TharsisError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Collapse a list of errors: one stays as is, several become a multi-error.
fn aggregate(mut errors: Vec<TharsisError>) -> TharsisError {
    match errors.len() {
        0 => TharsisError::internal("empty error list"),
        1 => errors.remove(0),
        _ => TharsisError::Multiple(errors),
    }
}

/// Normalize GraphQL transport errors.
#[must_use]
pub fn from_graphql_errors(errors: &[GraphqlError]) -> TharsisError {
    aggregate(
        errors
            .iter()
            .map(|e| TharsisError::new(ErrorCode::from_graphql_code(e.code()), e.message.clone()))
            .collect(),
    )
}

/// Normalize GraphQL errors that came with a non-success HTTP status.
///
/// A recognized `extensions.code` wins; otherwise the status decides the code.
#[must_use]
pub fn from_graphql_errors_with_status(errors: &[GraphqlError], status: StatusCode) -> TharsisError {
    aggregate(
        errors
            .iter()
            .map(|e| {
                let code = match ErrorCode::from_graphql_code(e.code()) {
                    ErrorCode::Internal => ErrorCode::from_http_status(status),
                    code => code,
                };
                TharsisError::new(code, e.message.clone())
            })
            .collect(),
    )
}

/// Normalize mutation problems. Returns `None` when there are none.
#[must_use]
pub fn from_problems(problems: &[Problem]) -> Option<TharsisError> {
    if problems.is_empty() {
        return None;
    }
    Some(aggregate(
        problems
            .iter()
            .map(|p| {
                TharsisError::new(ErrorCode::from_problem_type(&p.problem_type), p.message.clone())
            })
            .collect(),
    ))
}

/// Normalize a non-success HTTP response.
#[must_use]
pub fn from_http_status(status: StatusCode, body: &str) -> TharsisError {
    let body = body.trim();
    let message = if body.is_empty() {
        let reason = status
            .canonical_reason()
            .map_or_else(|| status.as_u16().to_string(), str::to_string);
        format!("request failed with status {reason}")
    } else {
        truncate(body)
    };
    TharsisError::new(ErrorCode::from_http_status(status), message)
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_BODY_LEN {
        return body.to_string();
    }
    let mut end = MAX_BODY_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

/// Whether the error carries [`ErrorCode::Internal`].
#[must_use]
pub fn is_internal_error(err: &TharsisError) -> bool {
    err.has_code(ErrorCode::Internal)
}

/// Whether the error carries [`ErrorCode::NotFound`].
#[must_use]
pub fn is_not_found_error(err: &TharsisError) -> bool {
    err.has_code(ErrorCode::NotFound)
}

/// Whether the error carries [`ErrorCode::Conflict`].
#[must_use]
pub fn is_conflict_error(err: &TharsisError) -> bool {
    err.has_code(ErrorCode::Conflict)
}

/// Whether the error carries [`ErrorCode::OptimisticLock`].
#[must_use]
pub fn is_optimistic_lock_error(err: &TharsisError) -> bool {
    err.has_code(ErrorCode::OptimisticLock)
}

/// Whether the error carries [`ErrorCode::Forbidden`].
#[must_use]
pub fn is_forbidden_error(err: &TharsisError) -> bool {
    err.has_code(ErrorCode::Forbidden)
}

/// Whether the error carries [`ErrorCode::TooManyRequests`].
#[must_use]
pub fn is_too_many_requests_error(err: &TharsisError) -> bool {
    err.has_code(ErrorCode::TooManyRequests)
}

/// Whether the error carries [`ErrorCode::Unauthorized`].
#[must_use]
pub fn is_unauthorized_error(err: &TharsisError) -> bool {
    err.has_code(ErrorCode::Unauthorized)
}

/// Whether the error carries [`ErrorCode::TooLarge`].
#[must_use]
pub fn is_too_large_error(err: &TharsisError) -> bool {
    err.has_code(ErrorCode::TooLarge)
}

/// Whether the error carries [`ErrorCode::BadRequest`].
#[must_use]
pub fn is_bad_request_error(err: &TharsisError) -> bool {
    err.has_code(ErrorCode::BadRequest)
}

/// Whether the error carries [`ErrorCode::NotImplemented`].
#[must_use]
pub fn is_not_implemented_error(err: &TharsisError) -> bool {
    err.has_code(ErrorCode::NotImplemented)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gql_error(message: &str, code: Option<&str>) -> GraphqlError {
        GraphqlError {
            message: message.to_string(),
            path: Vec::new(),
            extensions: code.map(|c| serde_json::json!({ "code": c })),
        }
    }

    fn problem(message: &str, problem_type: ProblemType) -> Problem {
        Problem {
            message: message.to_string(),
            field: Vec::new(),
            problem_type,
        }
    }

    #[test]
    fn graphql_codes_map_to_sdk_codes() {
        let cases = [
            ("NOT_FOUND", ErrorCode::NotFound),
            ("CONFLICT", ErrorCode::Conflict),
            ("OPTIMISTIC_LOCK", ErrorCode::OptimisticLock),
            ("FORBIDDEN", ErrorCode::Forbidden),
            ("RATE_LIMIT_EXCEEDED", ErrorCode::TooManyRequests),
            ("UNAUTHENTICATED", ErrorCode::Unauthorized),
            ("MAX_UPLOAD_SIZE_EXCEEDED", ErrorCode::TooLarge),
            ("GRAPHQL_VALIDATION_FAILED", ErrorCode::BadRequest),
            ("NOT_IMPLEMENTED", ErrorCode::NotImplemented),
            ("INTERNAL_SERVER_ERROR", ErrorCode::Internal),
            ("SOMETHING_NEW", ErrorCode::Internal),
        ];
        for (raw, expected) in cases {
            assert_eq!(ErrorCode::from_graphql_code(Some(raw)), expected, "{raw}");
        }
        assert_eq!(ErrorCode::from_graphql_code(None), ErrorCode::Internal);
    }

    #[test]
    fn status_fills_in_for_uncoded_graphql_errors() {
        let err = from_graphql_errors_with_status(
            &[gql_error("token expired", None)],
            StatusCode::UNAUTHORIZED,
        );
        assert_eq!(err.code(), ErrorCode::Unauthorized);
        assert_eq!(err.to_string(), "unauthorized: token expired");

        let err = from_graphql_errors_with_status(
            &[gql_error("slow down", Some("RATE_LIMIT_EXCEEDED"))],
            StatusCode::BAD_REQUEST,
        );
        assert_eq!(err.code(), ErrorCode::TooManyRequests);

        let err = from_graphql_errors_with_status(
            &[gql_error("boom", Some("INTERNAL_SERVER_ERROR"))],
            StatusCode::PAYLOAD_TOO_LARGE,
        );
        assert_eq!(err.code(), ErrorCode::TooLarge);
    }

    #[test]
    fn http_statuses_map_to_sdk_codes() {
        assert_eq!(ErrorCode::from_http_status(StatusCode::BAD_REQUEST), ErrorCode::BadRequest);
        assert_eq!(ErrorCode::from_http_status(StatusCode::UNAUTHORIZED), ErrorCode::Unauthorized);
        assert_eq!(ErrorCode::from_http_status(StatusCode::FORBIDDEN), ErrorCode::Forbidden);
        assert_eq!(ErrorCode::from_http_status(StatusCode::NOT_FOUND), ErrorCode::NotFound);
        assert_eq!(ErrorCode::from_http_status(StatusCode::CONFLICT), ErrorCode::Conflict);
        assert_eq!(ErrorCode::from_http_status(StatusCode::PAYLOAD_TOO_LARGE), ErrorCode::TooLarge);
        assert_eq!(
            ErrorCode::from_http_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorCode::TooManyRequests
        );
        assert_eq!(
            ErrorCode::from_http_status(StatusCode::NOT_IMPLEMENTED),
            ErrorCode::NotImplemented
        );
        assert_eq!(ErrorCode::from_http_status(StatusCode::BAD_GATEWAY), ErrorCode::Internal);
    }

    #[test]
    fn single_graphql_error_is_not_wrapped() {
        let err = from_graphql_errors(&[gql_error("group not found", Some("NOT_FOUND"))]);
        assert!(matches!(err, TharsisError::Api { code: ErrorCode::NotFound, .. }));
        assert_eq!(err.to_string(), "not found: group not found");
    }

    #[test]
    fn multiple_problems_aggregate_in_order() {
        let err = from_problems(&[
            problem("name already taken", ProblemType::Conflict),
            problem("description too long", ProblemType::BadRequest),
        ])
        .unwrap();

        assert_eq!(err.code(), ErrorCode::Conflict);
        assert!(is_conflict_error(&err));
        assert!(is_bad_request_error(&err));
        assert!(!is_not_found_error(&err));
        assert_eq!(
            err.to_string(),
            "conflict: name already taken; bad request: description too long"
        );
    }

    #[test]
    fn no_problems_is_not_an_error() {
        assert!(from_problems(&[]).is_none());
    }

    #[test]
    fn unknown_problem_type_is_internal() {
        let err = from_problems(&[problem("boom", ProblemType::Unknown)]).unwrap();
        assert!(is_internal_error(&err));
    }

    #[test]
    fn http_error_uses_body_or_reason() {
        let err = from_http_status(StatusCode::PAYLOAD_TOO_LARGE, "  archive exceeds limit \n");
        assert!(is_too_large_error(&err));
        assert_eq!(err.to_string(), "too large: archive exceeds limit");

        let err = from_http_status(StatusCode::FORBIDDEN, "");
        assert_eq!(err.to_string(), "forbidden: request failed with status Forbidden");
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(MAX_BODY_LEN + 10);
        let TharsisError::Api { message, .. } = from_http_status(StatusCode::BAD_GATEWAY, &body)
        else {
            panic!("expected api error");
        };
        assert!(message.ends_with('…'));
        assert_eq!(message.chars().count(), MAX_BODY_LEN + 1);
    }

    #[test]
    fn env_errors_are_internal() {
        let err = TharsisError::MissingEnv("THARSIS_ENDPOINT");
        assert_eq!(err.code(), ErrorCode::Internal);
        assert_eq!(err.to_string(), "missing required env var: THARSIS_ENDPOINT");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TharsisError>();
    }
}
