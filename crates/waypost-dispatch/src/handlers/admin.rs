//! The administrative service handler.
//!
//! Exposes the configuration surface over the same authenticated pipeline as
//! every other service: config retrieval and updates, audit log status and
//! clearing, allow-list management, and a health report.

use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use ipnet::Ipv4Net;
use serde_json::{json, Value};

use waypost_core::{require_str, ApiError, Params};
use waypost_store::{keys, AuditLog, ConfigStore};

use crate::error::HandlerError;
use crate::registry::{Handler, RequestContext};

/// Handler for the `admin` service.
pub struct AdminHandler {
    config: Arc<ConfigStore>,
    audit: Arc<AuditLog>,
    services: Vec<String>,
}

impl AdminHandler {
    /// Create the handler. `services` is the final registered service list,
    /// reported by `health`.
    #[must_use]
    pub fn new(config: Arc<ConfigStore>, audit: Arc<AuditLog>, services: Vec<String>) -> Self {
        Self {
            config,
            audit,
            services,
        }
    }

    fn health(&self) -> Value {
        json!({
            "status": "healthy",
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            "version": env!("CARGO_PKG_VERSION"),
            "configured": self.config.jwt_secret().is_some(),
            "services": self.services,
        })
    }

    fn config_get(&self) -> Value {
        json!({ "config": self.config.snapshot_redacted() })
    }

    fn config_set(&self, params: &Params) -> Result<Value, ApiError> {
        let key = require_str(params, "key")?;
        let value = require_str(params, "value")?;
        self.config.set(key, value);

        let echoed = if ConfigStore::is_sensitive(key) {
            ConfigStore::mask(value)
        } else {
            value.to_owned()
        };
        Ok(json!({ "key": key, "value": echoed }))
    }

    fn log_status(&self) -> Value {
        json!({
            "enabled": self.config.log_enabled(),
            "rows": self.audit.data_rows(),
            "maxRows": self.config.log_max_rows(),
            "sinkId": self.config.log_sink_id(),
        })
    }

    fn log_clear(&self) -> Result<Value, HandlerError> {
        let removed = self
            .audit
            .clear()
            .map_err(|err| HandlerError::upstream(err.to_string()))?;
        Ok(json!({ "cleared": removed }))
    }

    fn ip_list(&self) -> Value {
        json!({ "allowlist": self.config.ip_allowlist() })
    }

    fn ip_add(&self, params: &Params) -> Result<Value, ApiError> {
        let entry = require_str(params, "ip")?;
        if !is_valid_entry(entry) {
            return Err(ApiError::invalid_request(
                "ip must be an IPv4 address or CIDR block",
            ));
        }

        let mut list = self.config.ip_allowlist();
        if !list.iter().any(|e| e == entry) {
            list.push(entry.to_owned());
            self.config.set(keys::IP_ALLOWLIST, list.join(","));
        }
        Ok(json!({ "allowlist": list }))
    }

    fn ip_remove(&self, params: &Params) -> Result<Value, ApiError> {
        let entry = require_str(params, "ip")?;
        let mut list = self.config.ip_allowlist();
        list.retain(|e| e != entry);
        self.config.set(keys::IP_ALLOWLIST, list.join(","));
        Ok(json!({ "allowlist": list }))
    }
}

fn is_valid_entry(entry: &str) -> bool {
    entry.parse::<Ipv4Addr>().is_ok() || entry.parse::<Ipv4Net>().is_ok()
}

#[async_trait]
impl Handler for AdminHandler {
    async fn handle(
        &self,
        _ctx: &RequestContext,
        action: &str,
        params: &Params,
    ) -> Result<Value, HandlerError> {
        match action {
            "health" => Ok(self.health()),
            "config.get" => Ok(self.config_get()),
            "config.set" => Ok(self.config_set(params)?),
            "log.status" => Ok(self.log_status()),
            "log.clear" => self.log_clear(),
            "ip.list" => Ok(self.ip_list()),
            "ip.add" => Ok(self.ip_add(params)?),
            "ip.remove" => Ok(self.ip_remove(params)?),
            other => Err(ApiError::not_found(format!("unknown action: admin.{other}")).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypost_core::ErrorCode;
    use waypost_store::MemorySink;

    fn handler() -> (Arc<ConfigStore>, AdminHandler) {
        let config = Arc::new(ConfigStore::new());
        let sink = Arc::new(MemorySink::open("s1"));
        let audit = Arc::new(AuditLog::new(sink, config.clone()));
        let admin = AdminHandler::new(
            config.clone(),
            audit,
            vec!["admin".to_owned(), "mail".to_owned()],
        );
        (config, admin)
    }

    fn ctx() -> RequestContext {
        RequestContext::new("r1", "203.0.113.9")
    }

    fn params(v: Value) -> Params {
        v.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn health_reports_configuration_state() {
        let (config, admin) = handler();
        let data = admin.handle(&ctx(), "health", &Params::new()).await.unwrap();
        assert_eq!(data["status"], json!("healthy"));
        assert_eq!(data["configured"], json!(false));
        assert_eq!(data["services"], json!(["admin", "mail"]));

        config.set(keys::JWT_SECRET, "topsecret-abcdefghijklmnopqrstu");
        let data = admin.handle(&ctx(), "health", &Params::new()).await.unwrap();
        assert_eq!(data["configured"], json!(true));
    }

    #[tokio::test]
    async fn config_get_is_redacted() {
        let (config, admin) = handler();
        config.set(keys::JWT_SECRET, "topsecret-abcdefghijklmnopqrstu");
        let data = admin
            .handle(&ctx(), "config.get", &Params::new())
            .await
            .unwrap();
        assert_eq!(data["config"][keys::JWT_SECRET], json!("****rstu"));
    }

    #[tokio::test]
    async fn config_set_round_trips() {
        let (config, admin) = handler();
        let data = admin
            .handle(
                &ctx(),
                "config.set",
                &params(json!({"key": "LOG_MAX_ROWS", "value": "100"})),
            )
            .await
            .unwrap();
        assert_eq!(data["value"], json!("100"));
        assert_eq!(config.log_max_rows(), 100);
    }

    #[tokio::test]
    async fn config_set_masks_sensitive_echo() {
        let (_config, admin) = handler();
        let data = admin
            .handle(
                &ctx(),
                "config.set",
                &params(json!({"key": "IP_CHECK_API_KEY", "value": "reputation-key-1234"})),
            )
            .await
            .unwrap();
        assert_eq!(data["value"], json!("****1234"));
    }

    #[tokio::test]
    async fn ip_add_validates_entries() {
        let (config, admin) = handler();
        let err = admin
            .handle(&ctx(), "ip.add", &params(json!({"ip": "not-an-ip"})))
            .await
            .unwrap_err()
            .into_api_error("admin", "ip.add");
        assert_eq!(err.code, ErrorCode::InvalidRequest);

        admin
            .handle(&ctx(), "ip.add", &params(json!({"ip": "203.0.113.0/24"})))
            .await
            .unwrap();
        admin
            .handle(&ctx(), "ip.add", &params(json!({"ip": "198.51.100.7"})))
            .await
            .unwrap();
        assert_eq!(
            config.ip_allowlist(),
            vec!["203.0.113.0/24".to_owned(), "198.51.100.7".to_owned()]
        );
    }

    #[tokio::test]
    async fn ip_add_is_idempotent() {
        let (config, admin) = handler();
        for _ in 0..2 {
            admin
                .handle(&ctx(), "ip.add", &params(json!({"ip": "198.51.100.7"})))
                .await
                .unwrap();
        }
        assert_eq!(config.ip_allowlist().len(), 1);
    }

    #[tokio::test]
    async fn ip_remove_drops_entry() {
        let (config, admin) = handler();
        config.set(keys::IP_ALLOWLIST, "203.0.113.0/24,198.51.100.7");
        let data = admin
            .handle(&ctx(), "ip.remove", &params(json!({"ip": "198.51.100.7"})))
            .await
            .unwrap();
        assert_eq!(data["allowlist"], json!(["203.0.113.0/24"]));
        assert_eq!(config.ip_allowlist(), vec!["203.0.113.0/24".to_owned()]);
    }

    #[tokio::test]
    async fn unknown_action_is_not_found() {
        let (_config, admin) = handler();
        let err = admin
            .handle(&ctx(), "frobnicate", &Params::new())
            .await
            .unwrap_err()
            .into_api_error("admin", "frobnicate");
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(err.message.contains("frobnicate"));
    }
}
