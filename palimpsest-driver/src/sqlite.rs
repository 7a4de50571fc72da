//! SQLite backend built on rusqlite.
//!
//! Statements run to completion inside `execute` and their rows are copied
//! into a [`MaterializedResult`], so results never borrow the connection.
//! SQLite has no boolean storage class; columns whose declared type mentions
//! `BOOL` are surfaced as `Value::Boolean`.

use crate::{Dialect, Driver, MaterializedResult, NativeResult};
use palimpsest_core::{DbalError, DbalResult, Value};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::Path;

/// Driver owning one rusqlite connection.
pub struct SqliteDriver {
    conn: Option<Connection>,
    location: String,
}

impl SqliteDriver {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> DbalResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| DbalError::connection(e.to_string()))?;
        Ok(Self {
            conn: Some(conn),
            location: path.display().to_string(),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> DbalResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| DbalError::connection(e.to_string()))?;
        Ok(Self {
            conn: Some(conn),
            location: ":memory:".to_string(),
        })
    }

    fn connection(&self) -> DbalResult<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| DbalError::connection("sqlite connection already released"))
    }
}

impl Driver for SqliteDriver {
    fn execute(&mut self, sql: &str) -> DbalResult<Box<dyn NativeResult>> {
        let conn = self.connection()?;
        let query_err = |e: rusqlite::Error| DbalError::query(sql, e.to_string());

        let mut stmt = conn.prepare(sql).map_err(query_err)?;

        if stmt.column_count() == 0 {
            let affected = stmt.execute([]).map_err(query_err)?;
            return Ok(Box::new(MaterializedResult::command(affected as u64)));
        }

        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let boolean_columns: Vec<bool> = stmt
            .columns()
            .iter()
            .map(|c| {
                c.decl_type()
                    .map(|t| t.to_ascii_uppercase().contains("BOOL"))
                    .unwrap_or(false)
            })
            .collect();
        let readonly = stmt.readonly();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([]).map_err(query_err)?;
        while let Some(row) = cursor.next().map_err(query_err)? {
            let mut values = Vec::with_capacity(columns.len());
            for (idx, is_bool) in boolean_columns.iter().enumerate() {
                let raw = row.get_ref(idx).map_err(query_err)?;
                values.push(convert_value(raw, *is_bool, &columns[idx])?);
            }
            rows.push(values);
        }
        drop(cursor);

        // SELECT reports its row count the way PostgreSQL's command tag does;
        // DML with RETURNING reports the rows it changed.
        let affected = if readonly {
            rows.len() as u64
        } else {
            conn.changes() as u64
        };

        Ok(Box::new(MaterializedResult::with_rows(columns, rows, affected)))
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn release(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                tracing::error!(error = %e, location = %self.location, "Failed to close sqlite connection");
            }
        }
    }
}

impl Drop for SqliteDriver {
    fn drop(&mut self) {
        self.release();
    }
}

fn convert_value(raw: ValueRef<'_>, is_bool: bool, column: &str) -> DbalResult<Value> {
    match raw {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(i) if is_bool => Ok(Value::Boolean(i != 0)),
        ValueRef::Integer(i) => Ok(Value::Integer(i)),
        ValueRef::Real(f) => Ok(Value::Float(f)),
        ValueRef::Text(bytes) => Ok(Value::Text(String::from_utf8_lossy(bytes).into_owned())),
        ValueRef::Blob(_) => Err(DbalError::result(format!(
            "column {column} holds a BLOB, which has no scalar representation"
        ))),
    }
}
