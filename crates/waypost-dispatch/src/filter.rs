//! The mail security content filter.
//!
//! Account-recovery and credential-flow mail must be unreachable through the
//! proxy: a caller holding the shared secret cannot read, modify, or destroy
//! such items, and listings never include them. Classification and
//! enforcement live here; the mail handler routes every operation through
//! this filter.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};

use waypost_core::ApiError;
use waypost_store::{AuditEntry, AuditLog, AuditStatus, ConfigStore};

use crate::handlers::mail::MailMessage;
use crate::registry::RequestContext;

/// How much of the plain-text body is classified, in characters.
const BODY_PREFIX_CHARS: usize = 500;

/// Classification policy: blocked senders plus a content pattern.
///
/// A message is security-sensitive if its sender contains any blocked-sender
/// entry (case-insensitive), or its subject or body prefix matches the
/// content pattern (case-insensitive). A thread is sensitive if any of its
/// messages is.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    blocked_senders: Vec<String>,
    content_regex: Regex,
}

impl SecurityPolicy {
    /// Build a policy from sender substrings and a pattern.
    ///
    /// # Errors
    ///
    /// Returns the regex error if the pattern does not compile.
    pub fn new(blocked_senders: Vec<String>, pattern: &str) -> Result<Self, regex::Error> {
        let content_regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self {
            blocked_senders: blocked_senders
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect(),
            content_regex,
        })
    }

    /// Build a policy from the config store.
    ///
    /// An unparseable configured pattern falls back to the built-in default
    /// rather than leaving mail unfiltered.
    #[must_use]
    pub fn from_config(config: &ConfigStore) -> Self {
        let senders = config.blocked_senders();
        let pattern = config.content_regex();
        match Self::new(senders.clone(), &pattern) {
            Ok(policy) => policy,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "configured content pattern invalid, using default"
                );
                Self::new(senders, waypost_store::config::DEFAULT_CONTENT_REGEX)
                    .unwrap_or_else(|_| unreachable!("default content pattern compiles"))
            }
        }
    }

    /// Whether a single message is security-sensitive.
    #[must_use]
    pub fn is_sensitive(&self, message: &MailMessage) -> bool {
        let sender = message.from.to_lowercase();
        if self.blocked_senders.iter().any(|s| sender.contains(s)) {
            return true;
        }
        if self.content_regex.is_match(&message.subject) {
            return true;
        }
        self.content_regex.is_match(body_prefix(&message.body))
    }

    /// Whether any message in a thread is security-sensitive.
    #[must_use]
    pub fn is_sensitive_thread(&self, messages: &[MailMessage]) -> bool {
        messages.iter().any(|m| self.is_sensitive(m))
    }
}

/// Only the first `BODY_PREFIX_CHARS` characters participate in matching.
fn body_prefix(body: &str) -> &str {
    body.char_indices()
        .nth(BODY_PREFIX_CHARS)
        .map_or(body, |(idx, _)| &body[..idx])
}

/// The compiled policy together with the raw config it was built from, so
/// that a config change invalidates the cache.
struct CachedPolicy {
    senders: Vec<String>,
    pattern: String,
    policy: SecurityPolicy,
}

/// Enforcement wrapper: classifies, withholds, and records intercepts.
///
/// The policy is recompiled whenever the `SECURITY_*` config keys change, so
/// admin updates take effect without a restart.
pub struct SecurityFilter {
    config: Arc<ConfigStore>,
    audit: Arc<AuditLog>,
    cache: RwLock<CachedPolicy>,
}

impl SecurityFilter {
    /// Create a filter over the config store and the guarded audit appender.
    #[must_use]
    pub fn new(config: Arc<ConfigStore>, audit: Arc<AuditLog>) -> Self {
        let cache = CachedPolicy {
            senders: config.blocked_senders(),
            pattern: config.content_regex(),
            policy: SecurityPolicy::from_config(&config),
        };
        Self {
            config,
            audit,
            cache: RwLock::new(cache),
        }
    }

    /// The current policy, recompiled if config changed underneath us.
    #[must_use]
    pub fn policy(&self) -> SecurityPolicy {
        let senders = self.config.blocked_senders();
        let pattern = self.config.content_regex();
        {
            let cache = self.cache.read();
            if cache.senders == senders && cache.pattern == pattern {
                return cache.policy.clone();
            }
        }
        let policy = SecurityPolicy::from_config(&self.config);
        *self.cache.write() = CachedPolicy {
            senders,
            pattern,
            policy: policy.clone(),
        };
        policy
    }

    /// Drop sensitive messages from a listing, recording one intercept per
    /// withheld item.
    #[must_use]
    pub fn screen_listing(
        &self,
        ctx: &RequestContext,
        origin_action: &str,
        messages: Vec<MailMessage>,
    ) -> Vec<MailMessage> {
        let policy = self.policy();
        let mut kept = Vec::with_capacity(messages.len());
        for message in messages {
            if policy.is_sensitive(&message) {
                self.record_intercept(ctx, origin_action, &message.id);
            } else {
                kept.push(message);
            }
        }
        kept
    }

    /// Refuse access to a sensitive item.
    ///
    /// The thread context, when supplied, widens the check: a message inside
    /// a sensitive thread is itself off-limits.
    ///
    /// # Errors
    ///
    /// Returns `FORBIDDEN` (and records an intercept) when the item or its
    /// thread is security-sensitive.
    pub fn ensure_allowed(
        &self,
        ctx: &RequestContext,
        origin_action: &str,
        message: &MailMessage,
        thread: Option<&[MailMessage]>,
    ) -> Result<(), ApiError> {
        let policy = self.policy();
        let sensitive = policy.is_sensitive(message)
            || thread.is_some_and(|t| policy.is_sensitive_thread(t));
        if sensitive {
            self.record_intercept(ctx, origin_action, &message.id);
            return Err(ApiError::forbidden("message withheld by security policy"));
        }
        Ok(())
    }

    /// Record one intercept event. The detail names the item, never its
    /// content.
    fn record_intercept(&self, ctx: &RequestContext, origin_action: &str, message_id: &str) {
        self.audit.append(&AuditEntry {
            timestamp: Utc::now(),
            request_id: ctx.request_id.clone(),
            client_ip: ctx.client_ip.clone(),
            service: "mail".to_owned(),
            action: format!("security_intercept:{origin_action}"),
            status: AuditStatus::Blocked,
            duration_ms: 0,
            error: format!("message {message_id} withheld"),
        });
    }
}
