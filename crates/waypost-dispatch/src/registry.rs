//! The service registry.
//!
//! A static mapping from lowercased service name to handler, populated once
//! during startup and read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use waypost_core::Params;

use crate::error::HandlerError;

/// Per-request context threaded through to handlers.
///
/// Carries correlation data only; handlers must not treat any of it as an
/// authorization input.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The request identifier, echoed in audit rows.
    pub request_id: String,
    /// The caller's self-reported IP.
    pub client_ip: String,
}

impl RequestContext {
    /// Build a context for one request.
    #[must_use]
    pub fn new(request_id: impl Into<String>, client_ip: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            client_ip: client_ip.into(),
        }
    }
}

/// A service handler: `(action, params) → data`.
///
/// Handlers may call out to upstream collaborators and may fail with any
/// classified error except `AUTH_FAILED` and `IP_BLOCKED`. They never write
/// to the audit sink and never read secrets outside the config accessors.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Execute one action.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] on any failure; the dispatcher maps it
    /// into the response envelope.
    async fn handle(
        &self,
        ctx: &RequestContext,
        action: &str,
        params: &Params,
    ) -> Result<Value, HandlerError>;
}

/// The read-only service registry.
pub struct Registry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl Registry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            handlers: HashMap::new(),
        }
    }

    /// Resolve a handler by lowercased service name.
    #[must_use]
    pub fn get(&self, service: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(service)
    }

    /// Sorted list of registered service names.
    #[must_use]
    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Builder used during startup; [`RegistryBuilder::build`] freezes the map.
pub struct RegistryBuilder {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl RegistryBuilder {
    /// Register a handler under a service name (stored lowercased).
    #[must_use]
    pub fn register(mut self, service: &str, handler: Arc<dyn Handler>) -> Self {
        self.handlers.insert(service.to_lowercase(), handler);
        self
    }

    /// Service names registered so far, sorted.
    #[must_use]
    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Freeze the registry.
    #[must_use]
    pub fn build(self) -> Registry {
        Registry {
            handlers: self.handlers,
        }
    }
}
