//! The bounded rolling audit log.
//!
//! Every request produces exactly one entry through [`AuditLog::append`];
//! the mail filter adds intercept entries through the same appender. The
//! appender is the only component allowed to touch the sink, and it only
//! accepts the fixed eight-field entry — nothing derived from request params
//! or handler results can reach the log.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;

use crate::config::ConfigStore;
use crate::error::Result;
use crate::SinkTable;

/// The fixed audit schema.
pub const AUDIT_COLUMNS: [&str; 8] = [
    "timestamp",
    "request_id",
    "client_ip",
    "service",
    "action",
    "status",
    "duration_ms",
    "error",
];

/// Default bound on waiting for the advisory lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Terminal status of a request, as recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    /// The request completed successfully.
    Ok,
    /// Token verification failed.
    AuthFailed,
    /// The IP policy rejected the request.
    IpBlocked,
    /// The content filter withheld an item or refused an operation.
    Blocked,
    /// Any other failure.
    Error,
    /// The watchdog fired before the handler completed.
    Timeout,
}

impl AuditStatus {
    /// The spelling written to the log.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::AuthFailed => "AUTH_FAILED",
            Self::IpBlocked => "IP_BLOCKED",
            Self::Blocked => "BLOCKED",
            Self::Error => "ERROR",
            Self::Timeout => "TIMEOUT",
        }
    }
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit record. The eight fields here are the entire schema.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// The request this entry belongs to.
    pub request_id: String,
    /// The caller's self-reported IP, verbatim.
    pub client_ip: String,
    /// Target service.
    pub service: String,
    /// Target action (or `security_intercept:<origin>` for filter events).
    pub action: String,
    /// Terminal status.
    pub status: AuditStatus,
    /// Wall time spent on the request, in milliseconds.
    pub duration_ms: u64,
    /// Failure reason, empty on success. Never derived from params.
    pub error: String,
}

impl AuditEntry {
    fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.request_id.clone(),
            self.client_ip.clone(),
            self.service.clone(),
            self.action.clone(),
            self.status.to_string(),
            self.duration_ms.to_string(),
            self.error.clone(),
        ]
    }
}

/// The guarded appender over the audit sink.
///
/// Logging must never delay or fail a request: lock acquisition is bounded,
/// and every sink failure is swallowed after a best-effort write.
pub struct AuditLog {
    sink: Arc<dyn SinkTable>,
    config: Arc<ConfigStore>,
    lock: Mutex<()>,
    lock_timeout: Duration,
}

impl AuditLog {
    /// Create an appender over `sink`, reading `LOG_ENABLED` and
    /// `LOG_MAX_ROWS` from `config` on every append.
    #[must_use]
    pub fn new(sink: Arc<dyn SinkTable>, config: Arc<ConfigStore>) -> Self {
        Self {
            sink,
            config,
            lock: Mutex::new(()),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Override the advisory-lock timeout. Capped at 5 seconds.
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout.min(DEFAULT_LOCK_TIMEOUT);
        self
    }

    /// Append one entry. Never fails; on lock timeout or sink failure the
    /// entry is dropped.
    pub fn append(&self, entry: &AuditEntry) {
        if !self.config.log_enabled() {
            return;
        }

        let Some(_guard) = self.lock.try_lock_for(self.lock_timeout) else {
            tracing::debug!(request_id = %entry.request_id, "audit lock timed out, entry dropped");
            return;
        };

        if let Err(err) = self.append_locked(entry) {
            tracing::debug!(error = %err, "audit append failed, entry dropped");
        }
    }

    fn append_locked(&self, entry: &AuditEntry) -> Result<()> {
        if self.sink.row_count()? == 0 {
            self.sink.append_header(&AUDIT_COLUMNS)?;
        }
        self.sink.append_row(entry.to_row())?;

        let max_rows = self.config.log_max_rows();
        let total = self.sink.row_count()?;
        if total > max_rows + 1 {
            self.sink.delete_rows(1, total - max_rows - 1)?;
        }
        Ok(())
    }

    /// Number of data rows currently held (header excluded).
    #[must_use]
    pub fn data_rows(&self) -> usize {
        self.sink
            .row_count()
            .map(|n| n.saturating_sub(1))
            .unwrap_or(0)
    }

    /// Delete every data row, keeping the header. Returns rows removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be read or mutated, or if the
    /// advisory lock cannot be acquired within its timeout.
    pub fn clear(&self) -> Result<usize> {
        let Some(_guard) = self.lock.try_lock_for(self.lock_timeout) else {
            return Err(crate::StoreError::Sink("audit lock timed out".into()));
        };
        let total = self.sink.row_count()?;
        let data = total.saturating_sub(1);
        if data > 0 {
            self.sink.delete_rows(1, data)?;
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::keys;
    use crate::memory::MemorySink;

    fn entry(request_id: &str) -> AuditEntry {
        AuditEntry {
            timestamp: Utc::now(),
            request_id: request_id.to_owned(),
            client_ip: "203.0.113.9".to_owned(),
            service: "admin".to_owned(),
            action: "health".to_owned(),
            status: AuditStatus::Ok,
            duration_ms: 12,
            error: String::new(),
        }
    }

    fn log_with(max_rows: &str) -> (Arc<MemorySink>, AuditLog) {
        let sink = Arc::new(MemorySink::open("s1"));
        let config = Arc::new(ConfigStore::new());
        config.set(keys::LOG_MAX_ROWS, max_rows);
        let log = AuditLog::new(sink.clone(), config);
        (sink, log)
    }

    #[test]
    fn header_written_on_first_use() {
        let (sink, log) = log_with("10");
        log.append(&entry("r1"));
        let rows = sink.rows();
        assert_eq!(rows[0], AUDIT_COLUMNS.map(str::to_owned).to_vec());
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn eight_column_rows() {
        let (sink, log) = log_with("10");
        log.append(&entry("r1"));
        assert_eq!(sink.rows()[1].len(), 8);
    }

    #[test]
    fn rolling_bound_holds() {
        let (sink, log) = log_with("5");
        for i in 0..20 {
            log.append(&entry(&format!("r{i}")));
        }
        let rows = sink.rows();
        // Exactly max_rows data entries plus one header.
        assert_eq!(rows.len(), 6);
        // The oldest entries were the ones evicted.
        assert_eq!(rows[1][1], "r15");
        assert_eq!(rows[5][1], "r19");
    }

    #[test]
    fn disabled_log_drops_entries() {
        let sink = Arc::new(MemorySink::open("s1"));
        let config = Arc::new(ConfigStore::new());
        config.set(keys::LOG_ENABLED, "false");
        let log = AuditLog::new(sink.clone(), config);
        log.append(&entry("r1"));
        assert!(sink.rows().is_empty());
    }

    #[test]
    fn clear_keeps_header() {
        let (sink, log) = log_with("10");
        for i in 0..3 {
            log.append(&entry(&format!("r{i}")));
        }
        let removed = log.clear().unwrap();
        assert_eq!(removed, 3);
        assert_eq!(sink.rows().len(), 1);
        assert_eq!(log.data_rows(), 0);
    }

    #[test]
    fn concurrent_appends_keep_bound() {
        let (sink, log) = log_with("50");
        let log = Arc::new(log);
        std::thread::scope(|scope| {
            for t in 0..4 {
                let log = Arc::clone(&log);
                scope.spawn(move || {
                    for i in 0..50 {
                        log.append(&entry(&format!("t{t}-{i}")));
                    }
                });
            }
        });
        assert_eq!(sink.rows().len(), 51);
    }
}
