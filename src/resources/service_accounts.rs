//! Service accounts.
//!
//! `create_token` is the only call in the SDK that runs on the unauthenticated
//! transport: it is how a service account obtains its bearer token in the
//! first place.

use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use super::{Lookup, NodeData, ResourceMetadata, found, lookup};
use crate::tharsis_client::TharsisClient;
use crate::tharsis_error::Result;
use crate::tharsis_graphql::{GraphqlTransport, Problem, into_entity};

const GET_SERVICE_ACCOUNT_BY_ID: &str = r"
    query GetServiceAccountById($id: String!) {
        node(id: $id) {
            ... on ServiceAccount {
                id
                metadata { createdAt updatedAt version trn }
                name
                description
                groupPath
                resourcePath
            }
        }
    }
";

const GET_SERVICE_ACCOUNT_BY_PATH: &str = r"
    query GetServiceAccountByPath($path: String!) {
        serviceAccount(path: $path) {
            id
            metadata { createdAt updatedAt version trn }
            name
            description
            groupPath
            resourcePath
        }
    }
";

const CREATE_TOKEN: &str = r"
    mutation ServiceAccountCreateToken($input: ServiceAccountCreateTokenInput!) {
        serviceAccountCreateToken(input: $input) {
            token
            expiresIn
            problems { message field type }
        }
    }
";

/// Service account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
    /// Service account ID.
    pub id: String,
    /// Resource metadata.
    pub metadata: ResourceMetadata,
    /// Name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Path of the owning group.
    pub group_path: String,
    /// Full resource path (`group/name`).
    pub resource_path: String,
}

/// Token issued to a service account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccountToken {
    /// Bearer token.
    pub token: String,
    /// Validity in seconds.
    pub expires_in: u64,
}

/// Lookup of a single service account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetServiceAccountInput {
    /// Service account ID.
    pub id: Option<String>,
    /// Service account resource path.
    pub path: Option<String>,
}

/// Service account operations.
#[derive(Debug, Clone, Copy)]
pub struct ServiceAccounts<'a> {
    client: &'a TharsisClient,
}

impl<'a> ServiceAccounts<'a> {
    pub(crate) const fn new(client: &'a TharsisClient) -> Self {
        Self { client }
    }

    /// Get a service account by ID or path.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` when neither key is set, `NotFound` when it does not
    /// exist, or any transport error.
    #[instrument(skip(self, input), fields(id = ?input.id, path = ?input.path))]
    pub async fn get(&self, input: &GetServiceAccountInput) -> Result<ServiceAccount> {
        let transport = self.client.authenticated()?;

        match lookup(input.id.as_deref(), input.path.as_deref(), "service account")? {
            Lookup::Id(id) => {
                let data: NodeData<ServiceAccount> = transport
                    .execute("GetServiceAccountById", GET_SERVICE_ACCOUNT_BY_ID, json!({ "id": id }))
                    .await?;
                found(data.node, "service account")
            }
            Lookup::Path(path) => {
                let data: ServiceAccountData = transport
                    .execute(
                        "GetServiceAccountByPath",
                        GET_SERVICE_ACCOUNT_BY_PATH,
                        json!({ "path": path }),
                    )
                    .await?;
                found(data.service_account, "service account")
            }
        }
    }

    /// Exchange an OIDC token for a service account token.
    ///
    /// Runs unauthenticated.
    ///
    /// # Errors
    ///
    /// Returns the normalized problems (typically `Unauthorized`/`Forbidden`)
    /// or any transport error.
    #[instrument(skip(self, oidc_token))]
    pub async fn create_token(
        &self,
        service_account_path: &str,
        oidc_token: &str,
    ) -> Result<ServiceAccountToken> {
        let transport = self.client.unauthenticated()?;
        create_token(&transport, service_account_path, oidc_token).await
    }
}

/// Run the token exchange on `transport`.
pub(crate) async fn create_token(
    transport: &GraphqlTransport,
    service_account_path: &str,
    oidc_token: &str,
) -> Result<ServiceAccountToken> {
    let variables = json!({
        "input": {
            "serviceAccountPath": service_account_path,
            "token": oidc_token
        }
    });
    let data: CreateTokenData = transport
        .execute("ServiceAccountCreateToken", CREATE_TOKEN, variables)
        .await?;
    data.service_account_create_token.into_token()
}

// ============================================================================
// GraphQL response types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceAccountData {
    service_account: Option<ServiceAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTokenData {
    service_account_create_token: CreateTokenPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTokenPayload {
    token: Option<String>,
    expires_in: Option<u64>,
    #[serde(default)]
    problems: Vec<Problem>,
}

impl CreateTokenPayload {
    fn into_token(self) -> Result<ServiceAccountToken> {
        let pair = self.token.zip(self.expires_in);
        let (token, expires_in) = into_entity(&self.problems, pair)?;
        Ok(ServiceAccountToken { token, expires_in })
    }
}
