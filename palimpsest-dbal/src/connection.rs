//! The data operation surface and the root connection.
//!
//! [`DatabaseConnection`] is implemented by the root [`Connection`] and by
//! every [`Transaction`]; code written against the trait works the same inside
//! or outside a transaction. Transactions forward each call to their parent,
//! so every statement is ultimately executed by the root connection's driver.

use crate::sql;
use crate::transaction::Transaction;
use crate::versioning;
use crate::Cursor;
use palimpsest_core::{DbalError, DbalResult, Record, TableName, Value};
use palimpsest_driver::{Dialect, Driver};
use std::collections::HashSet;

// ============================================================================
// CAPABILITY TRAIT
// ============================================================================

/// Operations available on a database handle.
///
/// Table and field names are validated identifiers; values are rendered as
/// escaped literals by the driver's dialect.
pub trait DatabaseConnection {
    /// Execute raw SQL.
    fn query(&mut self, sql: &str) -> DbalResult<Cursor>;

    /// `SELECT <fields|*> FROM table [WHERE ...]`.
    ///
    /// Every field of `where_record` is an equality condition, joined with
    /// AND; a Null value matches `IS NULL`.
    fn select(&mut self, table: &str, where_record: &Record, fields: &[&str])
        -> DbalResult<Cursor>;

    /// Insert one row. Fails with `InsertCardinality` unless exactly one row
    /// was inserted.
    fn insert(&mut self, table: &str, record: &Record) -> DbalResult<Cursor>;

    /// Insert one row with a primary key drawn from the `<table>_id`
    /// sequence, returning that key.
    fn insert_return_id(&mut self, table: &str, record: &Record) -> DbalResult<i64>;

    /// Update exactly one row. Fails with `UpdateCardinality` otherwise.
    fn update(&mut self, table: &str, set_record: &Record, where_record: &Record)
        -> DbalResult<Cursor>;

    /// Update exactly one row, or insert `set ∪ where` when no single row
    /// matched.
    ///
    /// Check-then-act: two callers racing on the same key can both insert.
    fn update_or_insert(
        &mut self,
        table: &str,
        set_record: &Record,
        where_record: &Record,
    ) -> DbalResult<Cursor>;

    /// Key of the first row equal to `record`, inserting it when absent.
    /// Not atomic.
    fn exists_or_insert(&mut self, table: &str, record: &Record) -> DbalResult<i64>;

    /// Record a new version of the active row selected by `where_fields`.
    ///
    /// Returns 0 when the active version already holds `value_fields`,
    /// otherwise the key of the newly inserted version.
    fn record_version(
        &mut self,
        table: &str,
        value_fields: &Record,
        where_fields: &Record,
    ) -> DbalResult<i64>;

    /// Soft-delete active rows within `where_fields` whose `match_field` is
    /// not listed in `continued`. Returns the number of rows soft-deleted.
    fn mark_versions_deleted(
        &mut self,
        table: &str,
        match_field: &str,
        continued: &HashSet<String>,
        where_fields: &Record,
    ) -> DbalResult<u64>;

    /// Start a transaction (or a savepoint, when called on a transaction).
    fn get_transaction(&mut self) -> DbalResult<Transaction<'_>>;

    fn commit(&mut self) -> DbalResult<()>;

    fn rollback(&mut self) -> DbalResult<()>;

    fn is_transaction(&self) -> bool;

    fn dialect(&self) -> Dialect;
}

// ============================================================================
// ROOT CONNECTION
// ============================================================================

/// A database session owning its driver.
///
/// The driver is released when the connection is closed or dropped.
pub struct Connection {
    driver: Box<dyn Driver>,
}

impl Connection {
    pub fn new(driver: Box<dyn Driver>) -> Self {
        Self { driver }
    }

    /// Short name of the backing driver.
    pub fn backend(&self) -> &'static str {
        self.driver.backend_name()
    }

    /// Release the driver now instead of at drop.
    pub fn close(mut self) {
        self.driver.release();
    }

    fn next_sequence_value(&mut self, table: &TableName) -> DbalResult<i64> {
        let sequence = table.sequence_name();
        let sql = self.dialect().next_sequence_sql(&sequence);
        let cursor = self.query(&sql)?;
        let row = cursor.fetch_first()?;
        row.first_value()
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                DbalError::result(format!("Sequence {} returned no integer value", sequence))
            })
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.driver.release();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &self.backend())
            .finish()
    }
}

impl DatabaseConnection for Connection {
    fn query(&mut self, sql: &str) -> DbalResult<Cursor> {
        tracing::debug!(sql = %sql, backend = self.driver.backend_name(), "Executing statement");
        let result = self.driver.execute(sql)?;
        Ok(Cursor::new(result))
    }

    fn select(
        &mut self,
        table: &str,
        where_record: &Record,
        fields: &[&str],
    ) -> DbalResult<Cursor> {
        let table = TableName::new(table)?;
        let sql = sql::select_sql(self.dialect(), &table, where_record, fields)?;
        self.query(&sql)
    }

    fn insert(&mut self, table: &str, record: &Record) -> DbalResult<Cursor> {
        let table = TableName::new(table)?;
        let sql = sql::insert_sql(self.dialect(), &table, record)?;
        let cursor = self.query(&sql)?;

        let affected = cursor.affected_rows()?;
        if affected != 1 {
            return Err(DbalError::InsertCardinality {
                table: table.to_string(),
                affected,
            });
        }
        Ok(cursor)
    }

    fn insert_return_id(&mut self, table: &str, record: &Record) -> DbalResult<i64> {
        let table = TableName::new(table)?;
        let id = self.next_sequence_value(&table)?;

        let record = record.clone().with(table.id_column(), id);
        self.insert(table.as_str(), &record)?;
        Ok(id)
    }

    fn update(
        &mut self,
        table: &str,
        set_record: &Record,
        where_record: &Record,
    ) -> DbalResult<Cursor> {
        if set_record.is_empty() {
            return Err(DbalError::invalid_record(
                "update requires at least one field to set",
            ));
        }
        if where_record.is_empty() {
            return Err(DbalError::invalid_record(
                "update requires at least one where condition",
            ));
        }

        let table = TableName::new(table)?;
        let sql = sql::update_sql(self.dialect(), &table, set_record, where_record)?;
        let cursor = self.query(&sql)?;

        let affected = cursor.affected_rows()?;
        if affected != 1 {
            return Err(DbalError::UpdateCardinality {
                table: table.to_string(),
                affected,
            });
        }
        Ok(cursor)
    }

    fn update_or_insert(
        &mut self,
        table: &str,
        set_record: &Record,
        where_record: &Record,
    ) -> DbalResult<Cursor> {
        let overlap = set_record.overlapping_keys(where_record);
        if !overlap.is_empty() {
            return Err(DbalError::invalid_record(format!(
                "fields {} appear in both the set and where records",
                overlap.join(", ")
            )));
        }

        match self.update(table, set_record, where_record) {
            Err(e) if e.is_update_cardinality() => {
                tracing::warn!(table = %table, error = %e, "No single row to update, inserting instead");
                self.insert(table, &set_record.merged(where_record))
            }
            other => other,
        }
    }

    fn exists_or_insert(&mut self, table: &str, record: &Record) -> DbalResult<i64> {
        let table_name = TableName::new(table)?;
        let cursor = self.select(table, record, &[])?;
        if cursor.num_rows()? == 0 {
            return self.insert_return_id(table, record);
        }

        let id_column = table_name.id_column();
        let row = cursor.fetch_first()?;
        row.get(&id_column).and_then(Value::as_i64).ok_or_else(|| {
            DbalError::result(format!(
                "Row in {} has no integer {} column",
                table_name, id_column
            ))
        })
    }

    fn record_version(
        &mut self,
        table: &str,
        value_fields: &Record,
        where_fields: &Record,
    ) -> DbalResult<i64> {
        versioning::record_version(self, table, value_fields, where_fields)
    }

    fn mark_versions_deleted(
        &mut self,
        table: &str,
        match_field: &str,
        continued: &HashSet<String>,
        where_fields: &Record,
    ) -> DbalResult<u64> {
        versioning::mark_versions_deleted(self, table, match_field, continued, where_fields)
    }

    fn get_transaction(&mut self) -> DbalResult<Transaction<'_>> {
        Transaction::begin(self)
    }

    fn commit(&mut self) -> DbalResult<()> {
        Err(DbalError::NotInTransaction)
    }

    fn rollback(&mut self) -> DbalResult<()> {
        Err(DbalError::NotInTransaction)
    }

    fn is_transaction(&self) -> bool {
        false
    }

    fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }
}
