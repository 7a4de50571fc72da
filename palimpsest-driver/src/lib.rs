//! palimpsest Driver - SQL Executor Traits and Backends
//!
//! Defines the boundary between the data access layer and the database
//! client library. The core only ever hands a driver fully rendered SQL text
//! (identifiers and literals already escaped through the driver's
//! [`Dialect`]) and reads back a [`NativeResult`].
//!
//! Backends:
//! - [`SqliteDriver`] (feature `sqlite`), built on rusqlite
//! - [`PostgresDriver`] (feature `postgres`), built on tokio-postgres

pub mod dialect;
pub mod materialized;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use dialect::Dialect;
pub use materialized::MaterializedResult;
#[cfg(feature = "postgres")]
pub use postgres::PostgresDriver;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDriver;

use palimpsest_core::{DbalResult, Record};

// ============================================================================
// DRIVER TRAITS
// ============================================================================

/// Outcome of one executed statement, as held by the client library.
///
/// `None` from the count accessors is the driver's failure sentinel; the
/// cursor layer turns it into a result error.
pub trait NativeResult: Send {
    /// Number of rows returned by the statement.
    fn row_count(&self) -> Option<usize>;

    /// Number of rows inserted, updated or deleted by the statement.
    fn affected_rows(&self) -> Option<u64>;

    /// Column name → value mapping of the row at `index`, or `None` when the
    /// index is out of range.
    fn fetch_row(&self, index: usize) -> Option<Record>;

    /// Free the result. Must be idempotent and must not fail.
    fn release(&mut self);
}

/// A live handle to a backing store.
pub trait Driver: Send {
    /// Execute one SQL statement.
    ///
    /// Failures carry the client library's message in `DbalError::Query`.
    fn execute(&mut self, sql: &str) -> DbalResult<Box<dyn NativeResult>>;

    /// Dialect used to quote identifiers and literals for this backend.
    fn dialect(&self) -> Dialect;

    /// Short backend name for diagnostics.
    fn backend_name(&self) -> &'static str {
        self.dialect().as_str()
    }

    /// Close the handle. Must be idempotent and must not fail; problems are
    /// logged.
    fn release(&mut self);
}
