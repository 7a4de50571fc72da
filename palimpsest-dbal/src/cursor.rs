//! Forward cursor over a statement result.

use palimpsest_core::{DbalError, DbalResult, Record};
use palimpsest_driver::NativeResult;

/// Result of one executed statement.
///
/// Rows are fetched from the native result on demand, so iterating twice (or
/// after `rewind`) sees the same rows again. The native result is released
/// when the cursor is dropped, whatever transaction it was produced in.
pub struct Cursor {
    result: Box<dyn NativeResult>,
    position: usize,
}

impl Cursor {
    pub fn new(result: Box<dyn NativeResult>) -> Self {
        Self {
            result,
            position: 0,
        }
    }

    /// Number of rows returned by the statement.
    pub fn num_rows(&self) -> DbalResult<usize> {
        self.result
            .row_count()
            .ok_or_else(|| DbalError::result("Number of rows failed"))
    }

    /// Number of rows inserted, updated or deleted by the statement.
    pub fn affected_rows(&self) -> DbalResult<u64> {
        self.result
            .affected_rows()
            .ok_or_else(|| DbalError::result("Number of affected rows failed"))
    }

    /// Fetch the row at `row` as a field → value record.
    pub fn fetch(&self, row: usize) -> DbalResult<Record> {
        self.result
            .fetch_row(row)
            .ok_or_else(|| DbalError::result(format!("Unable to fetch row: {}", row)))
    }

    pub fn fetch_first(&self) -> DbalResult<Record> {
        self.fetch(0)
    }

    /// All rows, in order.
    pub fn fetch_all(&self) -> DbalResult<Vec<Record>> {
        self.iter().collect()
    }

    // ------------------------------------------------------------------------
    // Positional iteration
    // ------------------------------------------------------------------------

    pub fn rewind(&mut self) {
        self.position = 0;
    }

    pub fn key(&self) -> usize {
        self.position
    }

    /// Row at the current position.
    pub fn current(&self) -> DbalResult<Record> {
        self.fetch(self.position)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) {
        self.position += 1;
    }

    /// Whether the current position holds a row.
    pub fn valid(&self) -> bool {
        self.num_rows()
            .map(|rows| self.position < rows)
            .unwrap_or(false)
    }

    /// Iterate over all rows from the first, leaving the position untouched.
    pub fn iter(&self) -> Rows<'_> {
        Rows {
            cursor: self,
            index: 0,
            len: None,
            done: false,
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.result.release();
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("rows", &self.result.row_count())
            .field("affected", &self.result.affected_rows())
            .field("position", &self.position)
            .finish()
    }
}

impl<'a> IntoIterator for &'a Cursor {
    type Item = DbalResult<Record>;
    type IntoIter = Rows<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the rows of a [`Cursor`].
///
/// A failing row count is yielded once as an error, then iteration stops.
pub struct Rows<'a> {
    cursor: &'a Cursor,
    index: usize,
    len: Option<usize>,
    done: bool,
}

impl Iterator for Rows<'_> {
    type Item = DbalResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let len = match self.len {
            Some(len) => len,
            None => match self.cursor.num_rows() {
                Ok(len) => {
                    self.len = Some(len);
                    len
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            },
        };
        if self.index >= len {
            self.done = true;
            return None;
        }
        let row = self.cursor.fetch(self.index);
        self.index += 1;
        if row.is_err() {
            self.done = true;
        }
        Some(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palimpsest_core::Value;
    use palimpsest_driver::MaterializedResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn people() -> Cursor {
        Cursor::new(Box::new(MaterializedResult::with_rows(
            vec!["id".to_string(), "name".to_string()],
            vec![
                vec![Value::Integer(1), Value::from("ada")],
                vec![Value::Integer(2), Value::from("grace")],
                vec![Value::Integer(3), Value::Null],
            ],
            3,
        )))
    }

    /// Native result that reports the failure sentinel and counts releases.
    struct Broken {
        releases: Arc<AtomicUsize>,
    }

    impl NativeResult for Broken {
        fn row_count(&self) -> Option<usize> {
            None
        }
        fn affected_rows(&self) -> Option<u64> {
            None
        }
        fn fetch_row(&self, _index: usize) -> Option<Record> {
            None
        }
        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_counts() {
        let cursor = people();
        assert_eq!(cursor.num_rows().unwrap(), 3);
        assert_eq!(cursor.affected_rows().unwrap(), 3);
    }

    #[test]
    fn test_fetch_out_of_range() {
        let err = people().fetch(3).unwrap_err();
        assert!(format!("{}", err).contains("Unable to fetch row: 3"));
    }

    #[test]
    fn test_positional_iteration() {
        let mut cursor = people();
        let mut names = Vec::new();
        cursor.rewind();
        while cursor.valid() {
            let row = cursor.current().unwrap();
            names.push((cursor.key(), row["name"].to_text()));
            cursor.next();
        }
        assert_eq!(
            names,
            vec![
                (0, "ada".to_string()),
                (1, "grace".to_string()),
                (2, String::new())
            ]
        );
        assert!(!cursor.valid());

        cursor.rewind();
        assert_eq!(cursor.key(), 0);
        assert_eq!(cursor.current().unwrap()["id"], Value::Integer(1));
    }

    #[test]
    fn test_iter_is_repeatable() {
        let cursor = people();
        let first: Vec<Record> = cursor.iter().collect::<DbalResult<_>>().unwrap();
        let mut second = Vec::new();
        for row in &cursor {
            second.push(row.unwrap());
        }
        assert_eq!(first, second);
        assert_eq!(cursor.fetch_all().unwrap().len(), 3);
    }

    #[test]
    fn test_failure_sentinel_surfaces_as_error() {
        let releases = Arc::new(AtomicUsize::new(0));
        let cursor = Cursor::new(Box::new(Broken {
            releases: Arc::clone(&releases),
        }));
        assert!(matches!(cursor.num_rows(), Err(DbalError::Result { .. })));
        assert!(matches!(cursor.affected_rows(), Err(DbalError::Result { .. })));
        assert!(!cursor.valid());

        let mut rows = cursor.iter();
        assert!(matches!(rows.next(), Some(Err(_))));
        assert!(rows.next().is_none());
        assert!(cursor.fetch_all().is_err());
    }

    #[test]
    fn test_drop_releases_once() {
        let releases = Arc::new(AtomicUsize::new(0));
        let cursor = Cursor::new(Box::new(Broken {
            releases: Arc::clone(&releases),
        }));
        drop(cursor);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }
}
