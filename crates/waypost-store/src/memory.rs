//! In-memory sink table.

use parking_lot::Mutex;

use crate::error::{Result, StoreError};
use crate::SinkTable;

/// A sink table held entirely in memory.
///
/// The default backend for local deployments and tests. The identifier is
/// the opaque `LOG_SINK_ID` it was opened under.
pub struct MemorySink {
    id: String,
    rows: Mutex<Vec<Vec<String>>>,
}

impl MemorySink {
    /// Open (create) a sink under the given identifier.
    #[must_use]
    pub fn open(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rows: Mutex::new(Vec::new()),
        }
    }

    /// The identifier this sink was opened under.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// A snapshot of every row, header included. Test-facing.
    #[must_use]
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.lock().clone()
    }
}

impl SinkTable for MemorySink {
    fn append_header(&self, columns: &[&str]) -> Result<()> {
        let mut rows = self.rows.lock();
        rows.insert(0, columns.iter().map(|c| (*c).to_owned()).collect());
        Ok(())
    }

    fn append_row(&self, row: Vec<String>) -> Result<()> {
        self.rows.lock().push(row);
        Ok(())
    }

    fn row_count(&self) -> Result<usize> {
        Ok(self.rows.lock().len())
    }

    fn delete_rows(&self, start: usize, count: usize) -> Result<()> {
        let mut rows = self.rows.lock();
        let end = start.saturating_add(count);
        if start > rows.len() || end > rows.len() {
            return Err(StoreError::OutOfBounds {
                start,
                count,
                rows: rows.len(),
            });
        }
        rows.drain(start..end);
        Ok(())
    }
}
