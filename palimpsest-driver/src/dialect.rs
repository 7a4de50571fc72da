//! SQL dialect differences between backends: quoting, transaction start,
//! sequences and the current timestamp.

use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL dialect spoken by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Quote an identifier, doubling embedded double quotes.
    pub fn escape_identifier(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 2);
        out.push('"');
        for c in name.chars() {
            if c == '"' {
                out.push('"');
            }
            out.push(c);
        }
        out.push('"');
        out
    }

    /// Quote a string literal, doubling embedded single quotes.
    ///
    /// PostgreSQL literals containing a backslash are emitted in the `E'...'`
    /// form with doubled backslashes, as libpq's `PQescapeLiteral` does, so the
    /// result is correct regardless of `standard_conforming_strings`.
    pub fn escape_literal(&self, value: &str) -> String {
        let escape_backslash = *self == Dialect::Postgres && value.contains('\\');
        let mut out = String::with_capacity(value.len() + 3);
        if escape_backslash {
            out.push_str(" E");
        }
        out.push('\'');
        for c in value.chars() {
            match c {
                '\'' => out.push_str("''"),
                '\\' if escape_backslash => out.push_str("\\\\"),
                _ => out.push(c),
            }
        }
        out.push('\'');
        out
    }

    /// Statement opening a root transaction.
    pub fn begin_transaction_sql(&self) -> &'static str {
        match self {
            Dialect::Postgres => "START TRANSACTION",
            Dialect::Sqlite => "BEGIN TRANSACTION",
        }
    }

    /// Expression evaluating to the current timestamp.
    pub fn current_timestamp_sql(&self) -> &'static str {
        match self {
            Dialect::Postgres => "now()",
            Dialect::Sqlite => "CURRENT_TIMESTAMP",
        }
    }

    /// Single-row, single-column query advancing `sequence` and returning the
    /// new value.
    ///
    /// SQLite has no sequences; they are emulated by a one-row table with a
    /// `value` column (see [`Dialect::create_sequence_sql`]).
    pub fn next_sequence_sql(&self, sequence: &str) -> String {
        match self {
            Dialect::Postgres => format!(
                "SELECT nextval({})",
                self.escape_literal(&self.escape_identifier(sequence))
            ),
            Dialect::Sqlite => {
                let seq = self.escape_identifier(sequence);
                format!(
                    "UPDATE {seq} SET \"value\" = \"value\" + 1 RETURNING \"value\""
                )
            }
        }
    }

    /// Statements creating `sequence`, starting so the first value is 1.
    pub fn create_sequence_sql(&self, sequence: &str) -> Vec<String> {
        let seq = self.escape_identifier(sequence);
        match self {
            Dialect::Postgres => vec![format!("CREATE SEQUENCE {seq}")],
            Dialect::Sqlite => vec![
                format!("CREATE TABLE {seq} (\"value\" INTEGER NOT NULL)"),
                format!("INSERT INTO {seq} (\"value\") VALUES (0)"),
            ],
        }
    }

    /// Statement dropping `sequence`.
    pub fn drop_sequence_sql(&self, sequence: &str) -> String {
        let seq = self.escape_identifier(sequence);
        match self {
            Dialect::Postgres => format!("DROP SEQUENCE {seq}"),
            Dialect::Sqlite => format!("DROP TABLE {seq}"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
