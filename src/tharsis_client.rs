//! Tharsis client.
//!
//! Unique responsibility: own the configuration and lazily build the two
//! GraphQL transports every resource wrapper runs on.
//!
//! - Authenticated transport: attaches `Authorization: Bearer <token>` from the
//!   configured [`crate::TokenProvider`]. Asking for it without a provider is an
//!   internal error.
//! - Unauthenticated transport: used for calls that must work before a token
//!   exists (service account login).
//!
//! Both are built on first use and cached behind a single mutex.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::resources::groups::Groups;
use crate::resources::jobs::Jobs;
use crate::resources::module_attestations::TerraformModuleAttestations;
use crate::resources::module_versions::TerraformModuleVersions;
use crate::resources::modules::TerraformModules;
use crate::resources::runner_agents::RunnerAgents;
use crate::resources::runner_sessions::RunnerSessions;
use crate::resources::service_accounts::ServiceAccounts;
use crate::resources::variables::Variables;
use crate::resources::workspaces::Workspaces;
use crate::tharsis_config::TharsisConfig;
use crate::tharsis_error::{Result, TharsisError};
use crate::tharsis_graphql::GraphqlTransport;

#[derive(Default)]
struct TransportSlots {
    authenticated: Option<Arc<GraphqlTransport>>,
    unauthenticated: Option<Arc<GraphqlTransport>>,
}

/// Entry point of the SDK.
pub struct TharsisClient {
    cfg: TharsisConfig,
    transports: Mutex<TransportSlots>,
}

impl TharsisClient {
    /// Create a client. No connection is made until the first call.
    #[must_use]
    pub fn new(cfg: TharsisConfig) -> Self {
        Self {
            cfg,
            transports: Mutex::new(TransportSlots::default()),
        }
    }

    /// Create a client from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is missing or invalid.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(TharsisConfig::from_env()?))
    }

    /// Get a reference to the current configuration.
    #[must_use]
    pub const fn config(&self) -> &TharsisConfig {
        &self.cfg
    }

    /// Transport that sends a bearer token with every request.
    ///
    /// # Errors
    ///
    /// Returns an internal error if no token provider is configured, or if the
    /// HTTP client cannot be built.
    pub fn authenticated(&self) -> Result<Arc<GraphqlTransport>> {
        self.transport(true)
    }

    /// Transport that never sends credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn unauthenticated(&self) -> Result<Arc<GraphqlTransport>> {
        self.transport(false)
    }

    fn transport(&self, authenticated: bool) -> Result<Arc<GraphqlTransport>> {
        let provider = if authenticated {
            Some(self.cfg.token_provider.clone().ok_or_else(|| {
                TharsisError::internal(
                    "token provider is not configured; authenticated calls are unavailable",
                )
            })?)
        } else {
            None
        };

        let mut slots = self
            .transports
            .lock()
            .map_err(|_| TharsisError::internal("transport cache lock poisoned"))?;

        let slot = if authenticated {
            &mut slots.authenticated
        } else {
            &mut slots.unauthenticated
        };

        if let Some(existing) = slot.as_ref() {
            return Ok(Arc::clone(existing));
        }

        debug!(authenticated, endpoint = %self.cfg.endpoint, "building graphql transport");

        let http = reqwest::Client::builder()
            .timeout(self.cfg.timeout())
            .user_agent(self.cfg.user_agent.clone())
            .build()?;

        let transport = Arc::new(GraphqlTransport::new(&self.cfg.endpoint, http, provider));
        *slot = Some(Arc::clone(&transport));
        Ok(transport)
    }

    /// Group operations.
    #[must_use]
    pub const fn groups(&self) -> Groups<'_> {
        Groups::new(self)
    }

    /// Workspace operations.
    #[must_use]
    pub const fn workspaces(&self) -> Workspaces<'_> {
        Workspaces::new(self)
    }

    /// Terraform module operations.
    #[must_use]
    pub const fn terraform_modules(&self) -> TerraformModules<'_> {
        TerraformModules::new(self)
    }

    /// Terraform module version operations.
    #[must_use]
    pub const fn terraform_module_versions(&self) -> TerraformModuleVersions<'_> {
        TerraformModuleVersions::new(self)
    }

    /// Terraform module attestation operations.
    #[must_use]
    pub const fn terraform_module_attestations(&self) -> TerraformModuleAttestations<'_> {
        TerraformModuleAttestations::new(self)
    }

    /// Runner agent operations.
    #[must_use]
    pub const fn runner_agents(&self) -> RunnerAgents<'_> {
        RunnerAgents::new(self)
    }

    /// Runner session operations.
    #[must_use]
    pub const fn runner_sessions(&self) -> RunnerSessions<'_> {
        RunnerSessions::new(self)
    }

    /// Job operations.
    #[must_use]
    pub const fn jobs(&self) -> Jobs<'_> {
        Jobs::new(self)
    }

    /// Service account operations.
    #[must_use]
    pub const fn service_accounts(&self) -> ServiceAccounts<'_> {
        ServiceAccounts::new(self)
    }

    /// Namespace variable operations.
    #[must_use]
    pub const fn variables(&self) -> Variables<'_> {
        Variables::new(self)
    }
}

impl std::fmt::Debug for TharsisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TharsisClient")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}
