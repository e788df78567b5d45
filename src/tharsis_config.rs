//! Tharsis SDK configuration.
//!
//! All configuration can be loaded from environment variables (a local `.env`
//! file is honored) or assembled with the builder methods.
//!
//! | Env | Default |
//! |---|---|
//! | `THARSIS_ENDPOINT` | required |
//! | `THARSIS_HTTP_TIMEOUT_MS` | `30000` |
//! | `THARSIS_USER_AGENT` | `tharsis-sdk-rust/<version>` |
//! | `THARSIS_STATIC_TOKEN` | none |
//! | `THARSIS_SERVICE_ACCOUNT_PATH` / `THARSIS_SERVICE_ACCOUNT_TOKEN` | none |

use std::{env, fmt, sync::Arc, time::Duration};

use crate::tharsis_auth::{
    OidcTokenSource, ServiceAccountTokenProvider, StaticTokenProvider, TokenProvider,
};
use crate::tharsis_error::{Result, TharsisError};

/// Default HTTP timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Configuration for [`crate::TharsisClient`].
#[derive(Clone)]
pub struct TharsisConfig {
    /// Base URL of the Tharsis API.
    /// Env: `THARSIS_ENDPOINT` (required)
    pub endpoint: String,

    /// HTTP request timeout in milliseconds.
    /// Env: `THARSIS_HTTP_TIMEOUT_MS` (default: 30000)
    pub timeout_ms: u64,

    /// User agent for HTTP requests.
    /// Env: `THARSIS_USER_AGENT` (default: "tharsis-sdk-rust/<version>")
    pub user_agent: String,

    /// Token provider for authenticated calls.
    /// Env: `THARSIS_STATIC_TOKEN`, or `THARSIS_SERVICE_ACCOUNT_PATH` +
    /// `THARSIS_SERVICE_ACCOUNT_TOKEN`
    pub token_provider: Option<Arc<dyn TokenProvider>>,
}

impl TharsisConfig {
    /// Create a configuration for `endpoint` with defaults and no token provider.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: default_user_agent(),
            token_provider: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// In local dev, this will also attempt to load `.env` from the current directory.
    /// If `.env` is missing, it does not fail.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self> {
        let endpoint = lookup("THARSIS_ENDPOINT")
            .filter(|v| !v.trim().is_empty())
            .ok_or(TharsisError::MissingEnv("THARSIS_ENDPOINT"))?;

        let mut cfg = Self::new(endpoint);

        if let Some(raw) = lookup("THARSIS_HTTP_TIMEOUT_MS") {
            cfg.timeout_ms = raw.parse::<u64>().map_err(|_| TharsisError::InvalidEnv {
                key: "THARSIS_HTTP_TIMEOUT_MS",
                reason: "expected an unsigned integer",
            })?;
        }

        if let Some(user_agent) = lookup("THARSIS_USER_AGENT") {
            cfg.user_agent = user_agent;
        }

        if let Some(token) = lookup("THARSIS_STATIC_TOKEN") {
            return Ok(cfg.with_token_provider(StaticTokenProvider::new(token)));
        }

        match (
            lookup("THARSIS_SERVICE_ACCOUNT_PATH"),
            lookup("THARSIS_SERVICE_ACCOUNT_TOKEN"),
        ) {
            (Some(path), Some(oidc_token)) => {
                let source: OidcTokenSource = Arc::new(move || Ok::<_, TharsisError>(oidc_token.clone()));
                let provider = ServiceAccountTokenProvider::with_http_options(
                    &cfg.endpoint,
                    path,
                    source,
                    cfg.timeout(),
                    &cfg.user_agent,
                )?;
                Ok(cfg.with_token_provider(provider))
            }
            (Some(_), None) => Err(TharsisError::MissingEnv("THARSIS_SERVICE_ACCOUNT_TOKEN")),
            (None, Some(_)) => Err(TharsisError::MissingEnv("THARSIS_SERVICE_ACCOUNT_PATH")),
            (None, None) => Ok(cfg),
        }
    }

    /// Set the HTTP timeout in milliseconds.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the token provider used by authenticated calls.
    #[must_use]
    pub fn with_token_provider(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.token_provider = Some(Arc::new(provider));
        self
    }

    /// Set an already shared token provider.
    #[must_use]
    pub fn with_shared_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// HTTP timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl fmt::Debug for TharsisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TharsisConfig")
            .field("endpoint", &self.endpoint)
            .field("timeout_ms", &self.timeout_ms)
            .field("user_agent", &self.user_agent)
            .field("token_provider", &self.token_provider.is_some())
            .finish()
    }
}

pub(crate) fn default_user_agent() -> String {
    format!("tharsis-sdk-rust/{}", env!("CARGO_PKG_VERSION"))
}
