//! Transactions and savepoint nesting.
//!
//! A transaction opened on the root connection issues the dialect's begin
//! statement. One opened on another transaction is nested: it is backed by a
//! uniquely named savepoint and forwards every statement to its parent.
//!
//! # State Transition Diagram
//!
//! ```text
//!                      ┌── commit() ───→ Committed
//! begin() ──→ Active ──┤
//!                      └── rollback() ─→ RolledBack
//!                  │
//!          drop while Active: logged, then rollback()
//! ```
//!
//! Both end states are terminal; any call on a finished transaction fails
//! with `TransactionClosed`. While a child transaction is alive it holds the
//! only mutable borrow of its parent, so levels always close innermost first.

use crate::{Cursor, DatabaseConnection};
use palimpsest_core::{DbalError, DbalResult, Record};
use palimpsest_driver::Dialect;
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// TRANSACTION STATE
// ============================================================================

/// Lifecycle state of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Active => "active",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled back",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionState::Active)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

/// One transaction level borrowed from its parent connection.
pub struct Transaction<'p> {
    parent: &'p mut (dyn DatabaseConnection + 'p),
    savepoint: Option<String>,
    state: TransactionState,
}

fn new_savepoint_name() -> String {
    format!("transaction_{}", Uuid::now_v7().simple())
}

impl<'p> Transaction<'p> {
    /// Open a transaction on `parent`.
    ///
    /// Nested when the parent is itself a transaction.
    pub fn begin(parent: &'p mut (dyn DatabaseConnection + 'p)) -> DbalResult<Self> {
        let dialect = parent.dialect();
        let savepoint = if parent.is_transaction() {
            let name = new_savepoint_name();
            parent.query(&format!("SAVEPOINT {}", dialect.escape_identifier(&name)))?;
            Some(name)
        } else {
            parent.query(dialect.begin_transaction_sql())?;
            None
        };

        tracing::debug!(savepoint = savepoint.as_deref(), "Transaction started");

        Ok(Self {
            parent,
            savepoint,
            state: TransactionState::Active,
        })
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Whether this level is backed by a savepoint.
    pub fn is_nested(&self) -> bool {
        self.savepoint.is_some()
    }

    pub fn savepoint_name(&self) -> Option<&str> {
        self.savepoint.as_deref()
    }

    fn ensure_active(&self) -> DbalResult<()> {
        if self.state.is_terminal() {
            return Err(DbalError::TransactionClosed {
                state: self.state.to_string(),
            });
        }
        Ok(())
    }

    fn quoted_savepoint(&self, name: &str) -> String {
        self.parent.dialect().escape_identifier(name)
    }

    /// Undo this level. The caller has already checked the state.
    fn roll_back_level(&mut self) -> DbalResult<()> {
        self.state = TransactionState::RolledBack;
        match self.savepoint.clone() {
            Some(name) => {
                let quoted = self.quoted_savepoint(&name);
                self.parent
                    .query(&format!("ROLLBACK TRANSACTION TO SAVEPOINT {}", quoted))?;
                self.parent.query(&format!("RELEASE SAVEPOINT {}", quoted))?;
            }
            None => {
                self.parent.query("ROLLBACK TRANSACTION")?;
            }
        }
        tracing::debug!(savepoint = self.savepoint.as_deref(), "Transaction rolled back");
        Ok(())
    }
}

impl DatabaseConnection for Transaction<'_> {
    fn query(&mut self, sql: &str) -> DbalResult<Cursor> {
        self.ensure_active()?;
        self.parent.query(sql)
    }

    fn select(
        &mut self,
        table: &str,
        where_record: &Record,
        fields: &[&str],
    ) -> DbalResult<Cursor> {
        self.ensure_active()?;
        self.parent.select(table, where_record, fields)
    }

    fn insert(&mut self, table: &str, record: &Record) -> DbalResult<Cursor> {
        self.ensure_active()?;
        self.parent.insert(table, record)
    }

    fn insert_return_id(&mut self, table: &str, record: &Record) -> DbalResult<i64> {
        self.ensure_active()?;
        self.parent.insert_return_id(table, record)
    }

    fn update(
        &mut self,
        table: &str,
        set_record: &Record,
        where_record: &Record,
    ) -> DbalResult<Cursor> {
        self.ensure_active()?;
        self.parent.update(table, set_record, where_record)
    }

    fn update_or_insert(
        &mut self,
        table: &str,
        set_record: &Record,
        where_record: &Record,
    ) -> DbalResult<Cursor> {
        self.ensure_active()?;
        self.parent.update_or_insert(table, set_record, where_record)
    }

    fn exists_or_insert(&mut self, table: &str, record: &Record) -> DbalResult<i64> {
        self.ensure_active()?;
        self.parent.exists_or_insert(table, record)
    }

    fn record_version(
        &mut self,
        table: &str,
        value_fields: &Record,
        where_fields: &Record,
    ) -> DbalResult<i64> {
        self.ensure_active()?;
        self.parent.record_version(table, value_fields, where_fields)
    }

    fn mark_versions_deleted(
        &mut self,
        table: &str,
        match_field: &str,
        continued: &HashSet<String>,
        where_fields: &Record,
    ) -> DbalResult<u64> {
        self.ensure_active()?;
        self.parent
            .mark_versions_deleted(table, match_field, continued, where_fields)
    }

    fn get_transaction(&mut self) -> DbalResult<Transaction<'_>> {
        self.ensure_active()?;
        Transaction::begin(self)
    }

    /// Release the savepoint, or commit the root transaction.
    ///
    /// A failed commit leaves the transaction Active.
    fn commit(&mut self) -> DbalResult<()> {
        self.ensure_active()?;
        match &self.savepoint {
            Some(name) => {
                let sql = format!("RELEASE SAVEPOINT {}", self.quoted_savepoint(name));
                self.parent.query(&sql)?;
            }
            None => {
                self.parent.query("COMMIT TRANSACTION")?;
            }
        }
        self.state = TransactionState::Committed;
        tracing::debug!(savepoint = self.savepoint.as_deref(), "Transaction committed");
        Ok(())
    }

    /// Roll back to the savepoint, or roll back the root transaction.
    ///
    /// The transaction is RolledBack afterwards even when a statement failed.
    fn rollback(&mut self) -> DbalResult<()> {
        self.ensure_active()?;
        self.roll_back_level()
    }

    fn is_transaction(&self) -> bool {
        true
    }

    fn dialect(&self) -> Dialect {
        self.parent.dialect()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state != TransactionState::Active {
            return;
        }
        tracing::error!(
            savepoint = self.savepoint.as_deref(),
            "Transaction dropped without commit or rollback, rolling back"
        );
        if let Err(e) = self.roll_back_level() {
            tracing::error!(
                error = %e,
                savepoint = self.savepoint.as_deref(),
                "Failed to roll back abandoned transaction"
            );
        }
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("savepoint", &self.savepoint)
            .field("state", &self.state)
            .finish()
    }
}

// ============================================================================
// SCOPED HELPER
// ============================================================================

/// Run `f` inside a new transaction on `conn`.
///
/// Commits when `f` returns `Ok` and rolls back when it returns `Err`; the
/// closure's error is returned unchanged. A transaction the closure already
/// finished itself is left alone.
pub fn transaction<C, T, F>(conn: &mut C, f: F) -> DbalResult<T>
where
    C: DatabaseConnection + ?Sized,
    F: FnOnce(&mut Transaction<'_>) -> DbalResult<T>,
{
    let mut tx = conn.get_transaction()?;
    match f(&mut tx) {
        Ok(value) => {
            if tx.state() == TransactionState::Active {
                if let Err(commit_err) = tx.commit() {
                    tracing::error!(error = %commit_err, "Commit failed, rolling back");
                    if let Err(rollback_err) = tx.rollback() {
                        tracing::error!(error = %rollback_err, "Rollback after failed commit failed");
                    }
                    return Err(commit_err);
                }
            }
            Ok(value)
        }
        Err(e) => {
            if tx.state() == TransactionState::Active {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::error!(error = %rollback_err, "Rollback after failed transaction body failed");
                }
            }
            Err(e)
        }
    }
}
