//! Soft-delete record versioning.
//!
//! A versioned table `t` keeps every version of a logical row. The active
//! version has `t_deleted IS NULL`; replacing it stamps `t_deleted` with the
//! current time and inserts the new version with a fresh `t_id`. Nothing is
//! ever physically deleted.

use crate::sql;
use crate::{Connection, DatabaseConnection};
use palimpsest_core::{validate_identifier, DbalResult, Record, TableName, Value};
use std::collections::HashSet;

/// Whether an application value equals a stored value.
///
/// Stored booleans, including the text `'true'`/`'false'` some backends hand
/// back, compare by truthiness of the application value. Everything else
/// compares by text rendering, so `1` matches `'1'` and Null matches `''`.
pub fn values_match(value: &Value, stored: &Value) -> bool {
    match stored_boolean(stored) {
        Some(flag) => value.is_truthy() == flag,
        None => value.to_text() == stored.to_text(),
    }
}

fn stored_boolean(stored: &Value) -> Option<bool> {
    match stored {
        Value::Boolean(flag) => Some(*flag),
        Value::Text(text) if text == "true" => Some(true),
        Value::Text(text) if text == "false" => Some(false),
        _ => None,
    }
}

/// `where_fields` restricted to active versions, unless the caller already
/// constrains the deleted column.
fn active_scope(table: &TableName, where_fields: &Record) -> Record {
    let deleted = table.deleted_column();
    if where_fields.contains_key(&deleted) {
        where_fields.clone()
    } else {
        where_fields.clone().with(deleted, Value::Null)
    }
}

fn soft_delete(conn: &mut Connection, table: &TableName, scope: &Record) -> DbalResult<u64> {
    let sql = sql::soft_delete_sql(conn.dialect(), table, scope)?;
    conn.query(&sql)?.affected_rows()
}

pub(crate) fn record_version(
    conn: &mut Connection,
    table: &str,
    value_fields: &Record,
    where_fields: &Record,
) -> DbalResult<i64> {
    let table_name = TableName::new(table)?;
    let scope = active_scope(&table_name, where_fields);

    let cursor = conn.select(table, &scope, &[])?;
    let matching = cursor.num_rows()?;
    if matching == 1 {
        let stored = cursor.fetch_first()?;
        let unchanged = value_fields
            .iter()
            .all(|(field, value)| values_match(value, &stored[field.as_str()]));
        if unchanged {
            tracing::debug!(table = %table_name, "Active version unchanged");
            return Ok(0);
        }
    } else if matching > 1 {
        tracing::warn!(
            table = %table_name,
            active = matching,
            "Several active versions in scope, replacing all of them"
        );
    }
    drop(cursor);

    if matching > 0 {
        let deleted = soft_delete(conn, &table_name, &scope)?;
        tracing::debug!(table = %table_name, deleted, "Superseded active versions");
    }
    conn.insert_return_id(table, &value_fields.merged(where_fields))
}

pub(crate) fn mark_versions_deleted(
    conn: &mut Connection,
    table: &str,
    match_field: &str,
    continued: &HashSet<String>,
    where_fields: &Record,
) -> DbalResult<u64> {
    let table_name = TableName::new(table)?;
    validate_identifier(match_field)?;
    let scope = active_scope(&table_name, where_fields);

    let cursor = conn.select(table, &scope, &[])?;
    let mut seen = HashSet::new();
    let mut stale = Vec::new();
    for row in &cursor {
        let key = row?[match_field].clone();
        let text = key.to_text();
        if !continued.contains(&text) && seen.insert(text) {
            stale.push(key);
        }
    }
    drop(cursor);

    let mut deleted = 0;
    for key in stale {
        let condition = scope.clone().with(match_field, key);
        deleted += soft_delete(conn, &table_name, &condition)?;
    }
    tracing::debug!(table = %table_name, deleted, "Marked discontinued versions deleted");
    Ok(deleted)
}
