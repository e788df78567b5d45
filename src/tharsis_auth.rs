//! Token providers for the authenticated transport.
//!
//! Unique responsibility: hand the transport a bearer token on demand.
//!
//! Two providers ship with the SDK:
//! - [`StaticTokenProvider`]: a fixed token (personal access token, CI secret)
//! - [`ServiceAccountTokenProvider`]: exchanges an OIDC token for a short-lived
//!   service account token and renews it shortly before it expires
//!
//! Anything else (vault lookups, SSO caches) plugs in through [`TokenProvider`].

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::resources::service_accounts;
use crate::tharsis_config::default_user_agent;
use crate::tharsis_error::Result;
use crate::tharsis_graphql::GraphqlTransport;

/// Renew a service account token when less than this much validity is left.
const EXPIRATION_LEEWAY: Duration = Duration::from_secs(30);

/// Default HTTP timeout of the token exchange.
const TOKEN_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest lifetime trusted from the server; larger `expiresIn` values are capped.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Source of bearer tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a token valid for the next request.
    ///
    /// # Errors
    ///
    /// Returns an error if no token can be obtained.
    async fn get_token(&self) -> Result<String>;
}

/// Provider returning the same token forever.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Create a provider for `token`.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

/// Callback producing the OIDC token presented to the service account login.
pub type OidcTokenSource = Arc<dyn Fn() -> Result<String> + Send + Sync>;

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Provider logging in as a service account.
///
/// The login goes through an unauthenticated transport of its own, so it never
/// recurses into itself.
pub struct ServiceAccountTokenProvider {
    transport: GraphqlTransport,
    service_account_path: String,
    oidc_token: OidcTokenSource,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenProvider {
    /// Create a provider for the service account at `service_account_path`,
    /// using the default timeout and user agent for the login call.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        endpoint: &str,
        service_account_path: impl Into<String>,
        oidc_token: OidcTokenSource,
    ) -> Result<Self> {
        Self::with_http_options(
            endpoint,
            service_account_path,
            oidc_token,
            TOKEN_HTTP_TIMEOUT,
            &default_user_agent(),
        )
    }

    /// Same as [`Self::new`] with an explicit timeout and user agent for the
    /// login call.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_http_options(
        endpoint: &str,
        service_account_path: impl Into<String>,
        oidc_token: OidcTokenSource,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            transport: GraphqlTransport::new(endpoint, http, None),
            service_account_path: service_account_path.into(),
            oidc_token,
            cached: Mutex::new(None),
        })
    }

    /// Path of the service account this provider logs in as.
    #[must_use]
    pub fn service_account_path(&self) -> &str {
        &self.service_account_path
    }
}

impl fmt::Debug for ServiceAccountTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountTokenProvider")
            .field("endpoint", &self.transport.base_url())
            .field("service_account_path", &self.service_account_path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn get_token(&self) -> Result<String> {
        // Held across the exchange so concurrent callers share one login.
        let mut cached = self.cached.lock().await;

        if let Some(current) = cached.as_ref()
            && current.expires_at > Instant::now() + EXPIRATION_LEEWAY
        {
            return Ok(current.token.clone());
        }

        debug!(path = %self.service_account_path, "requesting service account token");

        let oidc_token = (self.oidc_token)()?;
        let created =
            service_accounts::create_token(&self.transport, &self.service_account_path, &oidc_token)
                .await?;

        let token = created.token.clone();
        *cached = Some(CachedToken {
            token: created.token,
            expires_at: expiry_deadline(Instant::now(), created.expires_in),
        });
        Ok(token)
    }
}

/// When a token issued at `now` with `expires_in` seconds of validity expires.
fn expiry_deadline(now: Instant, expires_in: u64) -> Instant {
    now + Duration::from_secs(expires_in).min(MAX_TOKEN_LIFETIME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_returns_its_token() {
        let provider = StaticTokenProvider::new("abc");
        assert_eq!(provider.get_token().await.unwrap(), "abc");
        assert_eq!(provider.get_token().await.unwrap(), "abc");
    }

    #[test]
    fn debug_output_hides_token() {
        let provider = StaticTokenProvider::new("super-secret");
        let rendered = format!("{provider:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn huge_expiry_is_capped() {
        let now = Instant::now();
        assert_eq!(expiry_deadline(now, u64::MAX), now + MAX_TOKEN_LIFETIME);
        assert_eq!(expiry_deadline(now, 300), now + Duration::from_secs(300));
        assert_eq!(expiry_deadline(now, 0), now);
    }

    #[test]
    fn service_account_provider_keeps_path() {
        let source: OidcTokenSource = Arc::new(|| Ok::<_, crate::TharsisError>("oidc".to_string()));
        let provider =
            ServiceAccountTokenProvider::new("https://tharsis.example.com", "ops/deployer", source)
                .unwrap();
        assert_eq!(provider.service_account_path(), "ops/deployer");
        assert!(format!("{provider:?}").contains("ops/deployer"));
    }
}
