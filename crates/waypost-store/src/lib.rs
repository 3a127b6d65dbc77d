//! Configuration and audit storage for the waypost gateway.
//!
//! This crate holds the two pieces of mutable shared state in the system:
//!
//! - **Config store**: a process-wide key→value map with known keys, typed
//!   defaults, and secret masking
//! - **Audit log**: a bounded rolling appender over an abstract tabular
//!   sink, guarded by a timed advisory lock
//!
//! The [`SinkTable`] trait is the storage seam: concrete backends live
//! outside this crate, and an in-memory table ships for local use and tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod audit;
pub mod config;
pub mod error;
pub mod memory;

pub use audit::{AuditEntry, AuditLog, AuditStatus, AUDIT_COLUMNS};
pub use config::{keys, ConfigStore};
pub use error::{Result, StoreError};
pub use memory::MemorySink;

/// An append-only tabular store backing the audit log.
///
/// Rows are indexed from zero; row zero is the header once written. The
/// appender in [`audit`] is the only writer and enforces the schema; sinks
/// only move rows.
pub trait SinkTable: Send + Sync {
    /// Write the header row. Called once, on first use of a fresh sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot persist the row.
    fn append_header(&self, columns: &[&str]) -> Result<()>;

    /// Append one data row after the last existing row.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot persist the row.
    fn append_row(&self, row: Vec<String>) -> Result<()>;

    /// Total number of rows currently held, header included.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be read.
    fn row_count(&self) -> Result<usize>;

    /// Delete `count` rows starting at index `start` (0-based, header = 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the range is out of bounds or the sink cannot be
    /// mutated.
    fn delete_rows(&self, start: usize, count: usize) -> Result<()>;
}
