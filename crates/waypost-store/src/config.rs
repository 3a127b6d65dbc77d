//! The process-wide configuration store.
//!
//! An opaque string→string map with a set of known keys and typed accessors.
//! Lookup is total: a missing or unparseable value yields the declared
//! default, never an error. Writers race with readers under last-writer-wins
//! semantics, which is the documented contract for admin config updates.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use parking_lot::RwLock;

/// Known configuration keys.
pub mod keys {
    /// Shared HMAC key. Absent means the service is unconfigured.
    pub const JWT_SECRET: &str = "JWT_SECRET";
    /// Gate for the audit sink.
    pub const LOG_ENABLED: &str = "LOG_ENABLED";
    /// Opaque reference to the audit backing store.
    pub const LOG_SINK_ID: &str = "LOG_SINK_ID";
    /// Rolling window upper bound, excluding the header row.
    pub const LOG_MAX_ROWS: &str = "LOG_MAX_ROWS";
    /// Comma-separated exact IPv4 addresses and/or CIDR blocks.
    pub const IP_ALLOWLIST: &str = "IP_ALLOWLIST";
    /// Gate for the external reputation check.
    pub const IP_CHECK_ENABLED: &str = "IP_CHECK_ENABLED";
    /// Credential for the reputation provider.
    pub const IP_CHECK_API_KEY: &str = "IP_CHECK_API_KEY";
    /// Reputation score at or above which the request is denied.
    pub const IP_CHECK_THRESHOLD: &str = "IP_CHECK_THRESHOLD";
    /// Comma-separated sender substrings that mark mail as sensitive.
    pub const SECURITY_BLOCKED_SENDERS: &str = "SECURITY_BLOCKED_SENDERS";
    /// Pattern matched against mail subjects and body prefixes.
    pub const SECURITY_CONTENT_REGEX: &str = "SECURITY_CONTENT_REGEX";
}

/// Default rolling-window bound for the audit log.
pub const DEFAULT_LOG_MAX_ROWS: usize = 5000;

/// Default reputation denial threshold.
pub const DEFAULT_IP_CHECK_THRESHOLD: u32 = 50;

/// Default blocked-sender substrings: account-recovery and credential-flow
/// senders that must stay unreachable through the proxy.
pub const DEFAULT_BLOCKED_SENDERS: &[&str] = &[
    "no-reply@accounts.google.com",
    "account-security-noreply",
    "noreply@id.apple.com",
    "no-reply@verificationemail.com",
    "password-reset@",
];

/// Default content pattern: credential and one-time-code language. Matching
/// is always case-insensitive; the pattern itself is overridable.
pub const DEFAULT_CONTENT_REGEX: &str = "verification code|security code|one[- ]?time (pass)?code|password reset|reset your password|two[- ]?factor|2fa|login code|sign[- ]?in attempt|recovery code";

const SECRET_MASK: &str = "****";

/// The process-wide configuration store.
pub struct ConfigStore {
    values: RwLock<HashMap<String, String>>,
}

impl ConfigStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }

    /// Seed the store from key/value pairs, skipping empty values.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        {
            let mut values = store.values.write();
            for (key, value) in pairs {
                let value = value.into();
                if !value.is_empty() {
                    values.insert(key.into(), value);
                }
            }
        }
        store
    }

    /// Raw lookup. `None` means the key is absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    /// Set a key. Concurrent writers follow last-writer-wins.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(key.into(), value.into());
    }

    /// Remove a key entirely.
    pub fn remove(&self, key: &str) {
        self.values.write().remove(key);
    }

    // =========================================================================
    // Typed accessors
    // =========================================================================

    /// The shared HMAC secret, if configured.
    #[must_use]
    pub fn jwt_secret(&self) -> Option<String> {
        self.get(keys::JWT_SECRET).filter(|s| !s.is_empty())
    }

    /// Whether audit logging is enabled (default true).
    #[must_use]
    pub fn log_enabled(&self) -> bool {
        self.get(keys::LOG_ENABLED)
            .map_or(true, |v| parse_bool(&v))
    }

    /// The audit sink reference, if configured.
    #[must_use]
    pub fn log_sink_id(&self) -> Option<String> {
        self.get(keys::LOG_SINK_ID).filter(|s| !s.is_empty())
    }

    /// The rolling-window bound for the audit log (default 5000).
    #[must_use]
    pub fn log_max_rows(&self) -> usize {
        self.get(keys::LOG_MAX_ROWS)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_LOG_MAX_ROWS)
    }

    /// The IP allow-list entries (default empty).
    #[must_use]
    pub fn ip_allowlist(&self) -> Vec<String> {
        self.get(keys::IP_ALLOWLIST)
            .map(|v| split_csv(&v))
            .unwrap_or_default()
    }

    /// Whether the external reputation check is enabled (default false).
    #[must_use]
    pub fn ip_check_enabled(&self) -> bool {
        self.get(keys::IP_CHECK_ENABLED)
            .is_some_and(|v| parse_bool(&v))
    }

    /// The reputation provider credential, if configured.
    #[must_use]
    pub fn ip_check_api_key(&self) -> Option<String> {
        self.get(keys::IP_CHECK_API_KEY).filter(|s| !s.is_empty())
    }

    /// The reputation denial threshold (default 50).
    #[must_use]
    pub fn ip_check_threshold(&self) -> u32 {
        self.get(keys::IP_CHECK_THRESHOLD)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_IP_CHECK_THRESHOLD)
    }

    /// The blocked-sender substrings, lowercased.
    #[must_use]
    pub fn blocked_senders(&self) -> Vec<String> {
        self.get(keys::SECURITY_BLOCKED_SENDERS)
            .map(|v| split_csv(&v))
            .unwrap_or_else(|| {
                DEFAULT_BLOCKED_SENDERS
                    .iter()
                    .map(|s| (*s).to_owned())
                    .collect()
            })
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect()
    }

    /// The content pattern for the mail filter.
    #[must_use]
    pub fn content_regex(&self) -> String {
        self.get(keys::SECURITY_CONTENT_REGEX)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_REGEX.to_owned())
    }

    // =========================================================================
    // Redaction
    // =========================================================================

    /// Whether a key's value must be masked when echoed back.
    #[must_use]
    pub fn is_sensitive(key: &str) -> bool {
        matches!(key, keys::JWT_SECRET | keys::IP_CHECK_API_KEY)
    }

    /// Mask a secret value, keeping only the last four characters.
    #[must_use]
    pub fn mask(value: &str) -> String {
        let chars: Vec<char> = value.chars().collect();
        if chars.len() <= 4 {
            return SECRET_MASK.to_owned();
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{SECRET_MASK}{tail}")
    }

    /// A sorted snapshot of every key, with sensitive values masked.
    #[must_use]
    pub fn snapshot_redacted(&self) -> BTreeMap<String, String> {
        self.values
            .read()
            .iter()
            .map(|(k, v)| {
                let value = if Self::is_sensitive(k) {
                    Self::mask(v)
                } else {
                    v.clone()
                };
                (k.clone(), value)
            })
            .collect()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("values", &self.snapshot_redacted())
            .finish()
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_total() {
        let config = ConfigStore::new();
        assert!(config.jwt_secret().is_none());
        assert!(config.log_enabled());
        assert_eq!(config.log_max_rows(), DEFAULT_LOG_MAX_ROWS);
        assert!(config.ip_allowlist().is_empty());
        assert!(!config.ip_check_enabled());
        assert_eq!(config.ip_check_threshold(), DEFAULT_IP_CHECK_THRESHOLD);
        assert!(!config.blocked_senders().is_empty());
        assert_eq!(config.content_regex(), DEFAULT_CONTENT_REGEX);
    }

    #[test]
    fn unparseable_values_fall_back() {
        let config = ConfigStore::new();
        config.set(keys::LOG_MAX_ROWS, "many");
        config.set(keys::IP_CHECK_THRESHOLD, "-1");
        assert_eq!(config.log_max_rows(), DEFAULT_LOG_MAX_ROWS);
        assert_eq!(config.ip_check_threshold(), DEFAULT_IP_CHECK_THRESHOLD);
    }

    #[test]
    fn allowlist_splits_and_trims() {
        let config = ConfigStore::new();
        config.set(keys::IP_ALLOWLIST, "203.0.113.0/24, 198.51.100.7 ,,");
        assert_eq!(
            config.ip_allowlist(),
            vec!["203.0.113.0/24".to_owned(), "198.51.100.7".to_owned()]
        );
    }

    #[test]
    fn log_enabled_parses_booleans() {
        let config = ConfigStore::new();
        config.set(keys::LOG_ENABLED, "false");
        assert!(!config.log_enabled());
        config.set(keys::LOG_ENABLED, "TRUE");
        assert!(config.log_enabled());
    }

    #[test]
    fn mask_keeps_last_four() {
        assert_eq!(ConfigStore::mask("topsecret-abcdefgh"), "****efgh");
        assert_eq!(ConfigStore::mask("abc"), "****");
        assert_eq!(ConfigStore::mask(""), "****");
    }

    #[test]
    fn snapshot_masks_sensitive_keys() {
        let config = ConfigStore::new();
        config.set(keys::JWT_SECRET, "topsecret-abcdefghijklmnopqrstu");
        config.set(keys::IP_CHECK_API_KEY, "reputation-key-1234");
        config.set(keys::LOG_MAX_ROWS, "100");

        let snapshot = config.snapshot_redacted();
        assert_eq!(snapshot[keys::JWT_SECRET], "****rstu");
        assert_eq!(snapshot[keys::IP_CHECK_API_KEY], "****1234");
        assert_eq!(snapshot[keys::LOG_MAX_ROWS], "100");
    }

    #[test]
    fn debug_never_prints_secrets() {
        let config = ConfigStore::new();
        config.set(keys::JWT_SECRET, "topsecret-abcdefghijklmnopqrstu");
        let debug = format!("{config:?}");
        assert!(!debug.contains("topsecret"));
        assert!(debug.contains("****"));
    }

    #[test]
    fn last_writer_wins() {
        let config = ConfigStore::new();
        config.set("K", "one");
        config.set("K", "two");
        assert_eq!(config.get("K").as_deref(), Some("two"));
    }

    #[test]
    fn from_pairs_skips_empty_values() {
        let config = ConfigStore::from_pairs([(keys::JWT_SECRET, ""), (keys::LOG_SINK_ID, "s1")]);
        assert!(config.jwt_secret().is_none());
        assert_eq!(config.log_sink_id().as_deref(), Some("s1"));
    }
}
