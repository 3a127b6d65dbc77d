//! Storage error types.

use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The sink rejected or failed an operation.
    #[error("sink failure: {0}")]
    Sink(String),

    /// A row range was out of bounds for the sink's current contents.
    #[error("row range out of bounds: start {start}, count {count}, rows {rows}")]
    OutOfBounds {
        /// First row of the requested range.
        start: usize,
        /// Number of rows requested.
        count: usize,
        /// Rows actually held by the sink.
        rows: usize,
    },
}
