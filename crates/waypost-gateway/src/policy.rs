//! The IP policy layer: allow-list matching plus an advisory reputation
//! check.
//!
//! The reported IP is self-supplied by the caller, so this layer is
//! defense-in-depth against casual misuse, not an access control. The
//! reputation check is advisory and fails open: a third-party outage must
//! never take the proxy offline.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use ipnet::Ipv4Net;
use serde::Deserialize;

use waypost_core::ApiError;
use waypost_store::ConfigStore;

/// A single allow-list entry: a literal address or a CIDR block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowlistEntry {
    /// An exact IPv4 address.
    Literal(Ipv4Addr),
    /// A CIDR block.
    Net(Ipv4Net),
}

impl AllowlistEntry {
    /// Parse one entry. `None` for anything that is neither an address nor a
    /// CIDR block.
    #[must_use]
    pub fn parse(entry: &str) -> Option<Self> {
        if let Ok(addr) = entry.parse::<Ipv4Addr>() {
            return Some(Self::Literal(addr));
        }
        entry.parse::<Ipv4Net>().ok().map(Self::Net)
    }

    /// Whether this entry matches the given address.
    #[must_use]
    pub fn matches(&self, ip: Ipv4Addr) -> bool {
        match self {
            Self::Literal(addr) => *addr == ip,
            Self::Net(net) => net.contains(&ip),
        }
    }
}

/// Parse every configured entry, skipping (and logging) invalid ones.
#[must_use]
pub fn parse_allowlist(raw: &[String]) -> Vec<AllowlistEntry> {
    raw.iter()
        .filter_map(|entry| {
            let parsed = AllowlistEntry::parse(entry);
            if parsed.is_none() {
                tracing::warn!(entry = %entry, "ignoring unparseable allow-list entry");
            }
            parsed
        })
        .collect()
}

/// Wire shape of the reputation provider's response.
#[derive(Debug, Deserialize)]
struct ReputationResponse {
    data: ReputationData,
}

#[derive(Debug, Deserialize)]
struct ReputationData {
    #[serde(rename = "abuseConfidenceScore")]
    abuse_confidence_score: i64,
}

/// HTTP client for the reputation provider.
///
/// Any deviation from the expected shape — network error, non-JSON body,
/// missing field — is treated as "no score available".
#[derive(Debug, Clone)]
pub struct ReputationClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ReputationClient {
    /// Create a client for the given endpoint with a bounded total timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be constructed.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Fetch the confidence score for an address. `None` on any failure.
    pub async fn score(&self, ip: &str, api_key: &str) -> Option<u32> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("ipAddress", ip)])
            .header("Key", api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .ok()?;

        let body: ReputationResponse = response.json().await.ok()?;
        u32::try_from(body.data.abuse_confidence_score).ok()
    }
}

/// The IP policy: allow-list first, then the optional reputation check.
pub struct IpPolicy {
    config: Arc<ConfigStore>,
    reputation: ReputationClient,
}

impl IpPolicy {
    /// Create the policy over the config store and a reputation client.
    #[must_use]
    pub fn new(config: Arc<ConfigStore>, reputation: ReputationClient) -> Self {
        Self { config, reputation }
    }

    /// Check a reported address against the policy.
    ///
    /// An absent address passes: IP checking is opportunistic. With a
    /// non-empty allow-list the address must parse and match an entry. The
    /// reputation layer only ever denies on a well-formed score at or above
    /// the threshold.
    ///
    /// # Errors
    ///
    /// Returns `IP_BLOCKED` when the allow-list rejects the address or the
    /// reputation score meets the threshold.
    pub async fn check(&self, reported_ip: &str) -> Result<(), ApiError> {
        if reported_ip.is_empty() || reported_ip == "unknown" {
            return Ok(());
        }

        let raw = self.config.ip_allowlist();
        if !raw.is_empty() {
            let ip: Ipv4Addr = reported_ip.parse().map_err(|_| {
                ApiError::ip_blocked("reported address is not a valid IPv4 address")
            })?;
            let entries = parse_allowlist(&raw);
            if !entries.iter().any(|entry| entry.matches(ip)) {
                return Err(ApiError::ip_blocked("address not in allow-list"));
            }
        }

        if self.config.ip_check_enabled() {
            if let Some(api_key) = self.config.ip_check_api_key() {
                if let Some(score) = self.reputation.score(reported_ip, &api_key).await {
                    let threshold = self.config.ip_check_threshold();
                    if score >= threshold {
                        return Err(ApiError::ip_blocked(format!(
                            "address reputation score {score} at or above threshold {threshold}"
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypost_core::ErrorCode;
    use waypost_store::keys;

    fn policy_with(config: &Arc<ConfigStore>) -> IpPolicy {
        // Unroutable endpoint: every reputation call fails, and fails open.
        let client = ReputationClient::new("http://127.0.0.1:1/check", Duration::from_millis(200));
        IpPolicy::new(config.clone(), client)
    }

    #[test]
    fn cidr_match_correctness() {
        let any = AllowlistEntry::parse("0.0.0.0/0").unwrap();
        for ip in ["0.0.0.0", "10.1.2.3", "255.255.255.255"] {
            assert!(any.matches(ip.parse().unwrap()));
        }

        let net = AllowlistEntry::parse("10.1.0.0/16").unwrap();
        assert!(net.matches("10.1.2.3".parse().unwrap()));
        assert!(!net.matches("10.2.0.0".parse().unwrap()));
    }

    #[test]
    fn literal_entry_matches_exactly() {
        let entry = AllowlistEntry::parse("198.51.100.7").unwrap();
        assert!(entry.matches("198.51.100.7".parse().unwrap()));
        assert!(!entry.matches("198.51.100.8".parse().unwrap()));
    }

    #[test]
    fn invalid_entries_are_skipped() {
        let entries = parse_allowlist(&[
            "garbage".to_owned(),
            "10.0.0.0/8".to_owned(),
            "300.1.1.1".to_owned(),
        ]);
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn absent_ip_passes() {
        let config = Arc::new(ConfigStore::new());
        config.set(keys::IP_ALLOWLIST, "203.0.113.0/24");
        let policy = policy_with(&config);
        assert!(policy.check("").await.is_ok());
        assert!(policy.check("unknown").await.is_ok());
    }

    #[tokio::test]
    async fn empty_allowlist_passes_everything() {
        let config = Arc::new(ConfigStore::new());
        let policy = policy_with(&config);
        assert!(policy.check("198.51.100.7").await.is_ok());
    }

    #[tokio::test]
    async fn allowlist_denies_non_member() {
        let config = Arc::new(ConfigStore::new());
        config.set(keys::IP_ALLOWLIST, "203.0.113.0/24");
        let policy = policy_with(&config);

        assert!(policy.check("203.0.113.42").await.is_ok());

        let err = policy.check("198.51.100.7").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::IpBlocked);
        assert!(!err.retryable);
    }

    #[tokio::test]
    async fn unparseable_ip_denied_when_allowlist_set() {
        let config = Arc::new(ConfigStore::new());
        config.set(keys::IP_ALLOWLIST, "203.0.113.0/24");
        let policy = policy_with(&config);
        assert!(policy.check("not-an-ip").await.is_err());
    }

    #[tokio::test]
    async fn reputation_outage_fails_open() {
        let config = Arc::new(ConfigStore::new());
        config.set(keys::IP_CHECK_ENABLED, "true");
        config.set(keys::IP_CHECK_API_KEY, "reputation-key-1234");
        let policy = policy_with(&config);
        // The endpoint is unreachable; the advisory layer must pass.
        assert!(policy.check("198.51.100.7").await.is_ok());
    }

    #[tokio::test]
    async fn reputation_disabled_without_api_key() {
        let config = Arc::new(ConfigStore::new());
        config.set(keys::IP_CHECK_ENABLED, "true");
        let policy = policy_with(&config);
        assert!(policy.check("198.51.100.7").await.is_ok());
    }

    #[tokio::test]
    async fn reputation_score_at_threshold_denies() {
        use axum::routing::get;
        use axum::Json;

        // Serve a fixed reputation response on an ephemeral port.
        let app = axum::Router::new().route(
            "/check",
            get(|| async {
                Json(serde_json::json!({"data": {"abuseConfidenceScore": 50}}))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = Arc::new(ConfigStore::new());
        config.set(keys::IP_CHECK_ENABLED, "true");
        config.set(keys::IP_CHECK_API_KEY, "reputation-key-1234");
        let client =
            ReputationClient::new(format!("http://{addr}/check"), Duration::from_secs(2));
        let policy = IpPolicy::new(config.clone(), client.clone());

        let err = policy.check("198.51.100.7").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::IpBlocked);

        // Raising the threshold lets the same score through.
        config.set(keys::IP_CHECK_THRESHOLD, "51");
        let policy = IpPolicy::new(config, client);
        assert!(policy.check("198.51.100.7").await.is_ok());
    }
}
