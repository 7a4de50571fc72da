//! SQL text generation from records.
//!
//! Every identifier and literal goes through the driver's [`Dialect`]; nothing
//! here concatenates caller text unescaped. NULL needs different treatment in
//! the two contexts a record is rendered in: `IS NULL` in a WHERE list,
//! `= NULL` in a SET list.

use palimpsest_core::{validate_identifier, DbalResult, Record, TableName, Value};
use palimpsest_driver::Dialect;

/// Render a value as a SQL literal.
///
/// Booleans become the `true`/`false` keywords, every other scalar the
/// escaped literal of its text form.
pub fn render_value(dialect: Dialect, value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Boolean(true) => "true".to_string(),
        Value::Boolean(false) => "false".to_string(),
        other => dialect.escape_literal(&other.to_text()),
    }
}

fn check_fields(record: &Record) -> DbalResult<()> {
    for field in record.keys() {
        validate_identifier(field)?;
    }
    Ok(())
}

/// `k1 = v1 AND k2 IS NULL ...`
pub fn predicate_sql(dialect: Dialect, record: &Record) -> DbalResult<String> {
    check_fields(record)?;
    let parts: Vec<String> = record
        .iter()
        .map(|(field, value)| {
            let column = dialect.escape_identifier(field);
            match value {
                Value::Null => format!("{column} IS NULL"),
                other => format!("{column} = {}", render_value(dialect, other)),
            }
        })
        .collect();
    Ok(parts.join(" AND "))
}

/// `k1 = v1, k2 = NULL ...`
pub fn assignment_sql(dialect: Dialect, record: &Record) -> DbalResult<String> {
    check_fields(record)?;
    let parts: Vec<String> = record
        .iter()
        .map(|(field, value)| {
            format!(
                "{} = {}",
                dialect.escape_identifier(field),
                render_value(dialect, value)
            )
        })
        .collect();
    Ok(parts.join(", "))
}

/// `SELECT <fields|*> FROM <table> [WHERE ...]`
pub fn select_sql(
    dialect: Dialect,
    table: &TableName,
    where_record: &Record,
    fields: &[&str],
) -> DbalResult<String> {
    let columns = if fields.is_empty() {
        "*".to_string()
    } else {
        let mut escaped = Vec::with_capacity(fields.len());
        for field in fields {
            validate_identifier(field)?;
            escaped.push(dialect.escape_identifier(field));
        }
        escaped.join(", ")
    };

    let mut sql = format!(
        "SELECT {} FROM {}",
        columns,
        dialect.escape_identifier(table.as_str())
    );
    if !where_record.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicate_sql(dialect, where_record)?);
    }
    Ok(sql)
}

/// `INSERT INTO <table> (cols) VALUES (vals)`, or `DEFAULT VALUES` for an
/// empty record.
pub fn insert_sql(dialect: Dialect, table: &TableName, record: &Record) -> DbalResult<String> {
    let table = dialect.escape_identifier(table.as_str());
    if record.is_empty() {
        return Ok(format!("INSERT INTO {table} DEFAULT VALUES"));
    }
    check_fields(record)?;

    let columns: Vec<String> = record.keys().map(|k| dialect.escape_identifier(k)).collect();
    let values: Vec<String> = record
        .iter()
        .map(|(_, v)| render_value(dialect, v))
        .collect();
    Ok(format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(","),
        values.join(",")
    ))
}

/// `UPDATE <table> SET ... WHERE ...`
pub fn update_sql(
    dialect: Dialect,
    table: &TableName,
    set_record: &Record,
    where_record: &Record,
) -> DbalResult<String> {
    Ok(format!(
        "UPDATE {} SET {} WHERE {}",
        dialect.escape_identifier(table.as_str()),
        assignment_sql(dialect, set_record)?,
        predicate_sql(dialect, where_record)?
    ))
}

/// `UPDATE <table> SET <table>_deleted = <now> WHERE ...`
pub fn soft_delete_sql(
    dialect: Dialect,
    table: &TableName,
    where_record: &Record,
) -> DbalResult<String> {
    let mut sql = format!(
        "UPDATE {} SET {} = {}",
        dialect.escape_identifier(table.as_str()),
        dialect.escape_identifier(&table.deleted_column()),
        dialect.current_timestamp_sql()
    );
    if !where_record.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicate_sql(dialect, where_record)?);
    }
    Ok(sql)
}
