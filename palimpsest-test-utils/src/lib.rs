//! palimpsest Test Utilities
//!
//! Shared test infrastructure for the palimpsest workspace:
//! - Fixtures creating scratch tables and sequences on any backend
//! - Proptest generators for values and records
//! - Log capture for asserting on tracing output

pub use palimpsest_core::{record, DbalError, DbalResult, Record, Value};
pub use palimpsest_dbal::{Connection, Database, DatabaseConnection};

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;
use uuid::Uuid;

// ============================================================================
// FIXTURES
// ============================================================================

/// Fresh in-memory SQLite connection.
pub fn memory_connection() -> Connection {
    Database::open_in_memory().expect("in-memory sqlite database")
}

/// Unique table name, safe to create on a shared PostgreSQL database.
pub fn scratch_table_name() -> String {
    format!("scratch_{}", Uuid::now_v7().simple())
}

fn run<C: DatabaseConnection + ?Sized>(conn: &mut C, sql: &str) {
    if let Err(e) = conn.query(sql) {
        panic!("fixture statement failed: {sql}: {e}");
    }
}

/// Create the `<table>_id` sequence.
pub fn create_sequence<C: DatabaseConnection + ?Sized>(conn: &mut C, table: &str) {
    let dialect = conn.dialect();
    for sql in dialect.create_sequence_sql(&format!("{table}_id")) {
        run(conn, &sql);
    }
}

/// Create `table (table_id, foo, bar, boo)` and its id sequence.
pub fn create_plain_table<C: DatabaseConnection + ?Sized>(conn: &mut C, table: &str) {
    let dialect = conn.dialect();
    let sql = format!(
        "CREATE TABLE {} ({} BIGINT, foo INTEGER, bar TEXT, boo BOOLEAN)",
        dialect.escape_identifier(table),
        dialect.escape_identifier(&format!("{table}_id")),
    );
    run(conn, &sql);
    create_sequence(conn, table);
}

/// Create a versioned `table (table_id, owner, name, value, active,
/// table_deleted)` and its id sequence.
pub fn create_versioned_table<C: DatabaseConnection + ?Sized>(conn: &mut C, table: &str) {
    let dialect = conn.dialect();
    let sql = format!(
        "CREATE TABLE {} ({} BIGINT, owner INTEGER, name TEXT, value TEXT, active BOOLEAN, {} TIMESTAMP)",
        dialect.escape_identifier(table),
        dialect.escape_identifier(&format!("{table}_id")),
        dialect.escape_identifier(&format!("{table}_deleted")),
    );
    run(conn, &sql);
    create_sequence(conn, table);
}

/// Drop a table created by the fixtures, with its sequence.
pub fn drop_table<C: DatabaseConnection + ?Sized>(conn: &mut C, table: &str) {
    let dialect = conn.dialect();
    run(
        conn,
        &format!("DROP TABLE IF EXISTS {}", dialect.escape_identifier(table)),
    );
    run(conn, &dialect.drop_sequence_sql(&format!("{table}_id")));
}

/// Number of rows in `table`, deleted versions included.
pub fn count_rows<C: DatabaseConnection + ?Sized>(conn: &mut C, table: &str) -> usize {
    conn.select(table, &Record::new(), &[])
        .and_then(|cursor| cursor.num_rows())
        .expect("count rows")
}

/// Active versions in `table` matching `where_fields`.
pub fn active_rows<C: DatabaseConnection + ?Sized>(
    conn: &mut C,
    table: &str,
    where_fields: &Record,
) -> Vec<Record> {
    let scope = where_fields
        .clone()
        .with(format!("{table}_deleted"), Value::Null);
    conn.select(table, &scope, &[])
        .and_then(|cursor| cursor.fetch_all())
        .expect("select active rows")
}

// ============================================================================
// LOG CAPTURE
// ============================================================================

/// Collects formatted tracing output in memory.
///
/// ```
/// use palimpsest_test_utils::LogCapture;
///
/// let logs = LogCapture::new();
/// logs.run(|| tracing::error!("something broke"));
/// assert!(logs.contains("something broke"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with a subscriber writing into this capture installed for the
    /// current thread.
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    /// Everything captured so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.contents().contains(needle)
    }

    /// Captured lines at the given level, e.g. `"ERROR"`.
    pub fn lines_at(&self, level: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.split_whitespace().any(|word| word == level))
            .map(String::from)
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for values and records.

    use super::*;
    use proptest::prelude::*;

    /// Any scalar value. Floats are finite.
    pub fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Boolean),
            any::<i64>().prop_map(Value::Integer),
            (-1.0e9f64..1.0e9f64).prop_map(Value::Float),
            "[a-zA-Z0-9 '\\\\\"_-]{0,24}".prop_map(Value::Text),
        ]
    }

    /// Field names that are valid identifiers.
    pub fn arb_field_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,15}"
    }

    /// Record of up to six arbitrary scalar fields.
    pub fn arb_scalar_record() -> impl Strategy<Value = Record> {
        proptest::collection::vec((arb_field_name(), arb_value()), 0..6)
            .prop_map(|fields| fields.into_iter().collect())
    }

    /// Text values for the `name` and `value` columns of a versioned table.
    pub fn arb_text_record() -> impl Strategy<Value = Record> {
        ("[a-zA-Z0-9 ']{0,16}", "[a-zA-Z0-9 '\\\\]{0,16}").prop_map(|(name, value)| {
            Record::new()
                .with("name", Value::Text(name))
                .with("value", Value::Text(value))
        })
    }
}

pub use generators::*;
