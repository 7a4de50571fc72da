//! palimpsest DBAL - Nested Transactions and Record Versioning
//!
//! A small data access layer over plain SQL records:
//!
//! - [`Connection`]: the root session, owning a backend driver
//! - [`Transaction`]: a transaction level borrowed from its parent; levels
//!   below the first are backed by savepoints
//! - [`Cursor`]: the rows and counts of one statement
//! - soft-delete versioning (`record_version`, `mark_versions_deleted`)
//!
//! All handles implement or return through [`DatabaseConnection`], so code
//! written against the trait runs unchanged at any nesting depth.
//!
//! ```no_run
//! use palimpsest_dbal::{record, Database, DatabaseConnection};
//!
//! # fn main() -> palimpsest_dbal::DbalResult<()> {
//! let mut conn = Database::open_in_memory()?;
//! let mut tx = conn.get_transaction()?;
//! tx.insert("item", &record! { "name" => "widget", "active" => true })?;
//! tx.commit()?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod cursor;
pub mod database;
pub mod sql;
pub mod transaction;
pub mod versioning;

pub use connection::{Connection, DatabaseConnection};
pub use cursor::{Cursor, Rows};
pub use database::Database;
pub use transaction::{transaction, Transaction, TransactionState};
pub use versioning::values_match;

pub use palimpsest_core::{
    record, ConfigError, DbConfig, DbalError, DbalResult, Record, TableName, Value,
};
pub use palimpsest_driver::{Dialect, Driver, NativeResult};
