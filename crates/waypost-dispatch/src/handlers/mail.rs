//! The mail service handler.
//!
//! Translates mail actions into calls against a [`MailUpstream`] adapter and
//! routes every result through the security content filter. Concrete
//! adapters live outside this crate; an in-memory upstream ships for tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use waypost_core::{clamp_limit, require_str, ApiError, Params};

use crate::error::HandlerError;
use crate::filter::SecurityFilter;
use crate::registry::{Handler, RequestContext};

/// Default and maximum listing sizes.
const DEFAULT_LIMIT: u64 = 25;
const MAX_LIMIT: u64 = 100;

/// A mail message as seen by the proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailMessage {
    /// Upstream message identifier.
    pub id: String,
    /// Identifier of the thread this message belongs to.
    #[serde(rename = "threadId")]
    pub thread_id: String,
    /// Sender address, as reported by the upstream.
    pub from: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// Whether the message is unread.
    pub unread: bool,
    /// Whether the message is starred.
    pub starred: bool,
    /// Upstream labels.
    pub labels: Vec<String>,
}

/// A mutation applied to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailOp {
    /// Attach a label.
    Label(String),
    /// Star the message.
    Star,
    /// Archive the message.
    Archive,
    /// Move the message to trash.
    Trash,
    /// Delete the message permanently.
    Delete,
}

/// The upstream mailbox contract.
///
/// Adapters translate these calls into the concrete provider API. They are
/// pure collaborators: no filtering, no auditing, no secret access.
#[async_trait]
pub trait MailUpstream: Send + Sync {
    /// The newest messages, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns an upstream cause on provider failure.
    async fn list(&self, limit: usize) -> Result<Vec<MailMessage>, HandlerError>;

    /// Messages matching a free-form query, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns an upstream cause on provider failure.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MailMessage>, HandlerError>;

    /// A single message by identifier.
    ///
    /// # Errors
    ///
    /// Returns an upstream cause on provider failure.
    async fn get(&self, id: &str) -> Result<Option<MailMessage>, HandlerError>;

    /// Every message in a thread.
    ///
    /// # Errors
    ///
    /// Returns an upstream cause on provider failure.
    async fn thread(&self, thread_id: &str) -> Result<Vec<MailMessage>, HandlerError>;

    /// Apply a mutation to a message.
    ///
    /// # Errors
    ///
    /// Returns an upstream cause on provider failure.
    async fn modify(&self, id: &str, op: &MailOp) -> Result<(), HandlerError>;
}

/// Handler for the `mail` service.
pub struct MailHandler {
    upstream: Arc<dyn MailUpstream>,
    filter: SecurityFilter,
}

impl MailHandler {
    /// Create the handler over an upstream adapter and the security filter.
    #[must_use]
    pub fn new(upstream: Arc<dyn MailUpstream>, filter: SecurityFilter) -> Self {
        Self { upstream, filter }
    }

    async fn listing(
        &self,
        ctx: &RequestContext,
        action: &str,
        params: &Params,
    ) -> Result<Value, HandlerError> {
        // Bounded by MAX_LIMIT, so the narrowing is lossless.
        #[allow(clippy::cast_possible_truncation)]
        let limit = clamp_limit(params, "limit", DEFAULT_LIMIT, MAX_LIMIT) as usize;
        let messages = match action {
            "list" => self.upstream.list(limit).await?,
            _ => {
                let query = require_str(params, "query")?;
                self.upstream.search(query, limit).await?
            }
        };
        let kept = self.filter.screen_listing(ctx, action, messages);
        Ok(json!({ "count": kept.len(), "messages": kept }))
    }

    /// Fetch a message and refuse if it, or its thread, is sensitive.
    async fn fetch_guarded(
        &self,
        ctx: &RequestContext,
        action: &str,
        params: &Params,
    ) -> Result<MailMessage, HandlerError> {
        let id = require_str(params, "id")?;
        let message = self
            .upstream
            .get(id)
            .await?
            .ok_or_else(|| ApiError::not_found("message not found"))?;
        let thread = self.upstream.thread(&message.thread_id).await?;
        self.filter
            .ensure_allowed(ctx, action, &message, Some(&thread))?;
        Ok(message)
    }

    async fn mutate(
        &self,
        ctx: &RequestContext,
        action: &str,
        params: &Params,
        op: MailOp,
    ) -> Result<Value, HandlerError> {
        let message = self.fetch_guarded(ctx, action, params).await?;
        self.upstream.modify(&message.id, &op).await?;
        Ok(json!({ "id": message.id, "applied": action }))
    }
}

#[async_trait]
impl Handler for MailHandler {
    async fn handle(
        &self,
        ctx: &RequestContext,
        action: &str,
        params: &Params,
    ) -> Result<Value, HandlerError> {
        match action {
            "list" | "search" => self.listing(ctx, action, params).await,
            "get" => {
                let message = self.fetch_guarded(ctx, action, params).await?;
                Ok(json!({ "message": message }))
            }
            "label" => {
                let name = require_str(params, "label")?.to_owned();
                self.mutate(ctx, action, params, MailOp::Label(name)).await
            }
            "star" => self.mutate(ctx, action, params, MailOp::Star).await,
            "archive" => self.mutate(ctx, action, params, MailOp::Archive).await,
            "trash" => self.mutate(ctx, action, params, MailOp::Trash).await,
            "delete" => self.mutate(ctx, action, params, MailOp::Delete).await,
            other => Err(ApiError::not_found(format!("unknown action: mail.{other}")).into()),
        }
    }
}

/// An in-memory mailbox for tests.
#[cfg(any(test, feature = "test-utils"))]
pub struct InMemoryMailUpstream {
    messages: parking_lot::Mutex<Vec<MailMessage>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl InMemoryMailUpstream {
    /// Create a mailbox holding the given messages, newest first.
    #[must_use]
    pub fn new(messages: Vec<MailMessage>) -> Self {
        Self {
            messages: parking_lot::Mutex::new(messages),
        }
    }

    /// Current mailbox contents.
    #[must_use]
    pub fn snapshot(&self) -> Vec<MailMessage> {
        self.messages.lock().clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl MailUpstream for InMemoryMailUpstream {
    async fn list(&self, limit: usize) -> Result<Vec<MailMessage>, HandlerError> {
        Ok(self.messages.lock().iter().take(limit).cloned().collect())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MailMessage>, HandlerError> {
        let needle = query.to_lowercase();
        Ok(self
            .messages
            .lock()
            .iter()
            .filter(|m| {
                m.subject.to_lowercase().contains(&needle)
                    || m.body.to_lowercase().contains(&needle)
                    || m.from.to_lowercase().contains(&needle)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<MailMessage>, HandlerError> {
        Ok(self.messages.lock().iter().find(|m| m.id == id).cloned())
    }

    async fn thread(&self, thread_id: &str) -> Result<Vec<MailMessage>, HandlerError> {
        Ok(self
            .messages
            .lock()
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .cloned()
            .collect())
    }

    async fn modify(&self, id: &str, op: &MailOp) -> Result<(), HandlerError> {
        let mut messages = self.messages.lock();
        match op {
            MailOp::Delete => messages.retain(|m| m.id != id),
            _ => {
                if let Some(message) = messages.iter_mut().find(|m| m.id == id) {
                    match op {
                        MailOp::Label(name) => message.labels.push(name.clone()),
                        MailOp::Star => message.starred = true,
                        MailOp::Archive => message.labels.retain(|l| l != "INBOX"),
                        MailOp::Trash => message.labels = vec!["TRASH".to_owned()],
                        MailOp::Delete => {}
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
    use waypost_store::{AuditLog, ConfigStore, MemorySink};

    fn message(id: &str, from: &str, subject: &str) -> MailMessage {
        MailMessage {
            id: id.to_owned(),
            thread_id: format!("t-{id}"),
            from: from.to_owned(),
            subject: subject.to_owned(),
            body: "hello".to_owned(),
            unread: true,
            starred: false,
            labels: vec!["INBOX".to_owned()],
        }
    }

    fn fixture(
        messages: Vec<MailMessage>,
    ) -> (Arc<MemorySink>, Arc<InMemoryMailUpstream>, MailHandler) {
        let sink = Arc::new(MemorySink::open("s1"));
        let config = Arc::new(ConfigStore::new());
        let audit = Arc::new(AuditLog::new(sink.clone(), config.clone()));
        let upstream = Arc::new(InMemoryMailUpstream::new(messages));
        let handler = MailHandler::new(upstream.clone(), SecurityFilter::new(config, audit));
        (sink, upstream, handler)
    }

    fn ctx() -> RequestContext {
        RequestContext::new("r1", "203.0.113.9")
    }

    fn params(v: Value) -> Params {
        v.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn list_filters_sensitive_and_counts_after() {
        let (sink, _upstream, handler) = fixture(vec![
            message("m1", "no-reply@accounts.google.com", "Account recovery"),
            message("m2", "alice@example.com", "lunch?"),
        ]);
        let data = handler.handle(&ctx(), "list", &Params::new()).await.unwrap();
        assert_eq!(data["count"], json!(1));
        assert_eq!(data["messages"][0]["from"], json!("alice@example.com"));

        // One BLOCKED intercept entry exists for the withheld item.
        let rows = sink.rows();
        assert!(rows
            .iter()
            .any(|r| r[5] == "BLOCKED" && r[4] == "security_intercept:list"));
    }

    #[tokio::test]
    async fn search_respects_query_and_filter() {
        let (_sink, _upstream, handler) = fixture(vec![
            message("m1", "no-reply@accounts.google.com", "project sync"),
            message("m2", "bob@example.com", "project sync"),
        ]);
        let data = handler
            .handle(&ctx(), "search", &params(json!({"query": "project"})))
            .await
            .unwrap();
        assert_eq!(data["count"], json!(1));
        assert_eq!(data["messages"][0]["id"], json!("m2"));
    }

    #[tokio::test]
    async fn get_of_sensitive_is_forbidden() {
        let (_sink, _upstream, handler) = fixture(vec![message(
            "m1",
            "no-reply@accounts.google.com",
            "Account recovery",
        )]);
        let err = handler
            .handle(&ctx(), "get", &params(json!({"id": "m1"})))
            .await
            .unwrap_err()
            .into_api_error("mail", "get");
        assert_eq!(err.code, ErrorCode::Forbidden);
        assert!(!err.retryable);
    }

    #[tokio::test]
    async fn get_of_benign_message_succeeds() {
        let (_sink, _upstream, handler) = fixture(vec![message("m2", "alice@example.com", "hi")]);
        let data = handler
            .handle(&ctx(), "get", &params(json!({"id": "m2"})))
            .await
            .unwrap();
        assert_eq!(data["message"]["id"], json!("m2"));
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let (_sink, _upstream, handler) = fixture(vec![]);
        let err = handler
            .handle(&ctx(), "get", &params(json!({"id": "nope"})))
            .await
            .unwrap_err()
            .into_api_error("mail", "get");
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn mutations_on_sensitive_are_forbidden() {
        for action in ["label", "star", "archive", "trash", "delete"] {
            let (_sink, upstream, handler) = fixture(vec![message(
                "m1",
                "no-reply@accounts.google.com",
                "Account recovery",
            )]);
            let mut p = params(json!({"id": "m1"}));
            if action == "label" {
                p.insert("label".to_owned(), json!("keep"));
            }
            let err = handler
                .handle(&ctx(), action, &p)
                .await
                .unwrap_err()
                .into_api_error("mail", action);
            assert_eq!(err.code, ErrorCode::Forbidden, "action {action}");
            // The sensitive item is untouched.
            assert_eq!(upstream.snapshot().len(), 1);
        }
    }

    #[tokio::test]
    async fn benign_mutations_apply() {
        let (_sink, upstream, handler) = fixture(vec![message("m2", "alice@example.com", "hi")]);
        handler
            .handle(&ctx(), "star", &params(json!({"id": "m2"})))
            .await
            .unwrap();
        assert!(upstream.snapshot()[0].starred);

        handler
            .handle(&ctx(), "delete", &params(json!({"id": "m2"})))
            .await
            .unwrap();
        assert!(upstream.snapshot().is_empty());
    }

    #[tokio::test]
    async fn benign_message_in_sensitive_thread_is_forbidden() {
        let mut recovery = message("m1", "no-reply@accounts.google.com", "Account recovery");
        recovery.thread_id = "t-shared".to_owned();
        let mut reply = message("m2", "alice@example.com", "fwd");
        reply.thread_id = "t-shared".to_owned();

        let (_sink, _upstream, handler) = fixture(vec![recovery, reply]);
        let err = handler
            .handle(&ctx(), "get", &params(json!({"id": "m2"})))
            .await
            .unwrap_err()
            .into_api_error("mail", "get");
        assert_eq!(err.code, ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn missing_id_is_invalid_request() {
        let (_sink, _upstream, handler) = fixture(vec![]);
        let err = handler
            .handle(&ctx(), "get", &Params::new())
            .await
            .unwrap_err()
            .into_api_error("mail", "get");
        assert_eq!(err.code, ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn limit_is_clamped() {
        let messages = (0..50)
            .map(|i| message(&format!("m{i}"), "alice@example.com", "hi"))
            .collect();
        let (_sink, _upstream, handler) = fixture(messages);
        let data = handler
            .handle(&ctx(), "list", &params(json!({"limit": 10})))
            .await
            .unwrap();
        assert_eq!(data["count"], json!(10));
    }

    #[tokio::test]
    async fn unknown_action_is_not_found() {
        let (_sink, _upstream, handler) = fixture(vec![]);
        let err = handler
            .handle(&ctx(), "zap", &Params::new())
            .await
            .unwrap_err()
            .into_api_error("mail", "zap");
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(err.message.contains("zap"));
    }
}
