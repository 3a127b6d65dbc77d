//! Shared gateway state.

use std::sync::Arc;
use std::time::Instant;

use waypost_auth::TokenVerifier;
use waypost_dispatch::Registry;
use waypost_store::{AuditLog, ConfigStore};

use crate::config::GatewayConfig;
use crate::policy::IpPolicy;

/// State shared by every request handler.
pub struct GatewayState {
    /// Startup-time settings.
    pub settings: GatewayConfig,
    /// The runtime configuration store.
    pub config: Arc<ConfigStore>,
    /// Token verifier with its replay cache.
    pub verifier: TokenVerifier,
    /// The frozen service registry.
    pub registry: Registry,
    /// The guarded audit appender.
    pub audit: Arc<AuditLog>,
    /// The IP policy layer.
    pub policy: IpPolicy,
    /// Process start, the monotonic anchor for the init window. A wall-clock
    /// adjustment cannot reopen the window.
    pub deployed_at: Instant,
}

impl GatewayState {
    /// Assemble the gateway state at startup.
    #[must_use]
    pub fn new(
        settings: GatewayConfig,
        config: Arc<ConfigStore>,
        registry: Registry,
        audit: Arc<AuditLog>,
        policy: IpPolicy,
    ) -> Self {
        Self {
            settings,
            config,
            verifier: TokenVerifier::new(),
            registry,
            audit,
            policy,
            deployed_at: Instant::now(),
        }
    }

    /// Override the deploy instant. Used by tests to age the init window.
    #[must_use]
    pub fn with_deployed_at(mut self, deployed_at: Instant) -> Self {
        self.deployed_at = deployed_at;
        self
    }
}
