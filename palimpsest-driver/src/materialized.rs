//! Client-side result buffer shared by the backends.
//!
//! Both client libraries hand rows over eagerly; the buffer keeps them as
//! value vectors and builds a `Record` only when a row is fetched.

use crate::NativeResult;
use palimpsest_core::{Record, Value};

/// Rows and counts of one executed statement.
#[derive(Debug, Clone, Default)]
pub struct MaterializedResult {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    affected: u64,
    released: bool,
}

impl MaterializedResult {
    /// Result of a statement that returned rows.
    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<Value>>, affected: u64) -> Self {
        Self {
            columns,
            rows,
            affected,
            released: false,
        }
    }

    /// Result of a statement that returned no rows.
    pub fn command(affected: u64) -> Self {
        Self {
            affected,
            ..Self::default()
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl NativeResult for MaterializedResult {
    fn row_count(&self) -> Option<usize> {
        if self.released {
            return None;
        }
        Some(self.rows.len())
    }

    fn affected_rows(&self) -> Option<u64> {
        if self.released {
            return None;
        }
        Some(self.affected)
    }

    fn fetch_row(&self, index: usize) -> Option<Record> {
        if self.released {
            return None;
        }
        let row = self.rows.get(index)?;
        Some(
            self.columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect(),
        )
    }

    fn release(&mut self) {
        self.rows.clear();
        self.released = true;
    }
}
