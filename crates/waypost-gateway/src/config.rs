//! Gateway runtime settings.
//!
//! These are fixed at startup, unlike the [`waypost_store::ConfigStore`]
//! keys which admins can change while the service runs.

use std::time::Duration;

use serde::Deserialize;

/// Settings for the HTTP front door.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Soft deadline for a request. Chosen to precede the platform's hard
    /// 360-second execution cap.
    #[serde(default = "GatewayConfig::default_watchdog")]
    pub watchdog_seconds: u64,

    /// Timeout for calls to the reputation provider.
    #[serde(default = "GatewayConfig::default_reputation_timeout")]
    pub reputation_timeout_seconds: u64,

    /// Reputation provider endpoint.
    #[serde(default = "GatewayConfig::default_reputation_endpoint")]
    pub reputation_endpoint: String,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    const fn default_max_body() -> usize {
        1024 * 1024 // 1 MiB
    }

    const fn default_watchdog() -> u64 {
        330
    }

    const fn default_reputation_timeout() -> u64 {
        10
    }

    fn default_reputation_endpoint() -> String {
        "https://api.abuseipdb.com/api/v2/check".to_string()
    }

    /// The watchdog deadline as a `Duration`.
    #[must_use]
    pub const fn watchdog(&self) -> Duration {
        Duration::from_secs(self.watchdog_seconds)
    }

    /// The reputation timeout as a `Duration`.
    #[must_use]
    pub const fn reputation_timeout(&self) -> Duration {
        Duration::from_secs(self.reputation_timeout_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            max_body_bytes: Self::default_max_body(),
            watchdog_seconds: Self::default_watchdog(),
            reputation_timeout_seconds: Self::default_reputation_timeout(),
            reputation_endpoint: Self::default_reputation_endpoint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.max_body_bytes, 1024 * 1024);
        assert_eq!(config.watchdog_seconds, 330);
        assert_eq!(config.watchdog(), Duration::from_secs(330));
        assert_eq!(config.reputation_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn watchdog_precedes_platform_cap() {
        assert!(GatewayConfig::default().watchdog_seconds < 360);
    }
}
