//! Typed wrappers for Tharsis resources.
//!
//! Every wrapper follows the same template: build variables, run the query or
//! mutation on the right transport, normalize problems/errors, return the typed
//! object. Handles are cheap borrows of [`crate::TharsisClient`].

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::tharsis_error::{Result, TharsisError};

pub mod groups;
pub mod jobs;
pub mod module_attestations;
pub mod module_versions;
pub mod modules;
pub mod runner_agents;
pub mod runner_sessions;
pub mod service_accounts;
pub mod variables;
pub mod workspaces;

/// Metadata shared by every resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Optimistic-lock version.
    pub version: String,
    /// Tharsis resource name.
    #[serde(default)]
    pub trn: Option<String>,
}

/// How a single resource is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookup<'a> {
    Id(&'a str),
    Path(&'a str),
}

/// `node(id:)` query result.
#[derive(Debug, Deserialize)]
pub(crate) struct NodeData<T> {
    pub node: Option<T>,
}

/// Pick the lookup key; the ID wins when both are supplied.
pub(crate) fn lookup<'a>(id: Option<&'a str>, path: Option<&'a str>, what: &str) -> Result<Lookup<'a>> {
    match (id, path) {
        (Some(id), _) => Ok(Lookup::Id(id)),
        (None, Some(path)) => Ok(Lookup::Path(path)),
        (None, None) => Err(TharsisError::bad_request(format!(
            "either an ID or a path must be specified to get a {what}"
        ))),
    }
}

/// A `null` lookup result becomes a not-found error.
pub(crate) fn found<T>(entity: Option<T>, what: &str) -> Result<T> {
    entity.ok_or_else(|| TharsisError::not_found(format!("{what} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tharsis_error::{is_bad_request_error, is_not_found_error};

    #[test]
    fn id_wins_over_path() {
        assert_eq!(lookup(Some("G_1"), Some("a/b"), "group").unwrap(), Lookup::Id("G_1"));
        assert_eq!(lookup(None, Some("a/b"), "group").unwrap(), Lookup::Path("a/b"));
    }

    #[test]
    fn lookup_needs_a_key() {
        let err = lookup(None, None, "workspace").unwrap_err();
        assert!(is_bad_request_error(&err));
        assert!(err.to_string().contains("workspace"));
    }

    #[test]
    fn null_entity_is_not_found() {
        let err = found::<u8>(None, "group").unwrap_err();
        assert!(is_not_found_error(&err));
        assert_eq!(err.to_string(), "not found: group not found");
    }

    #[test]
    fn metadata_decodes_timestamps() {
        let raw = r#"{
            "createdAt": "2024-05-01T10:00:00Z",
            "updatedAt": "2024-05-02T11:30:00Z",
            "version": "3",
            "trn": "trn:group:ops"
        }"#;
        let meta: ResourceMetadata = serde_json::from_str(raw).unwrap();
        assert_eq!(meta.version, "3");
        assert_eq!(meta.trn.as_deref(), Some("trn:group:ops"));
        assert!(meta.created_at.unwrap() < meta.updated_at.unwrap());
    }
}
