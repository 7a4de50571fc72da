//! PostgreSQL backend built on tokio-postgres.
//!
//! The data access layer is synchronous, so the driver owns a private
//! current-thread tokio runtime and blocks on each statement. The connection
//! future is spawned on that runtime and makes progress whenever a statement
//! is being awaited.
//!
//! Each statement is prepared to learn its result column types, then run
//! through the simple query protocol. Row values arrive as the server's text
//! rendering; booleans and integers are converted to typed values, every
//! other type stays text so comparisons see exactly what the server stores.
//! The affected-row count is taken from the command completion tag.

use crate::{Dialect, Driver, MaterializedResult, NativeResult};
use palimpsest_core::{DbalError, DbalResult, Value};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tokio_postgres::types::Type;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage, SimpleQueryRow};

/// Driver owning one PostgreSQL session.
pub struct PostgresDriver {
    runtime: Runtime,
    client: Option<Client>,
    connection_task: Option<JoinHandle<()>>,
}

impl PostgresDriver {
    /// Connect using a libpq-style connection string
    /// (see `DbConfig::connection_string`).
    pub fn connect(connection_string: &str) -> DbalResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DbalError::connection(format!("Failed to start runtime: {}", e)))?;

        let (client, connection) = runtime
            .block_on(tokio_postgres::connect(connection_string, NoTls))
            .map_err(|e| DbalError::connection(pg_message(&e)))?;

        let connection_task = runtime.spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection terminated");
            }
        });

        tracing::debug!("Connected to PostgreSQL");

        Ok(Self {
            runtime,
            client: Some(client),
            connection_task: Some(connection_task),
        })
    }

    fn client(&self) -> DbalResult<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| DbalError::connection("postgres connection already released"))
    }
}

impl Driver for PostgresDriver {
    fn execute(&mut self, sql: &str) -> DbalResult<Box<dyn NativeResult>> {
        let client = self.client()?;
        let query_err = |e: tokio_postgres::Error| DbalError::query(sql, pg_message(&e));

        let result = self.runtime.block_on(async {
            // Column types come from the prepared statement, values from the
            // simple protocol so they keep the server's text rendering.
            let stmt = client.prepare(sql).await.map_err(query_err)?;
            let messages = client.simple_query(sql).await.map_err(query_err)?;

            let columns: Vec<String> = stmt
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect();
            let types: Vec<Type> = stmt.columns().iter().map(|c| c.type_().clone()).collect();

            let mut rows = Vec::new();
            let mut affected = 0;
            for message in messages {
                match message {
                    SimpleQueryMessage::Row(row) => rows.push(convert_row(&row, &types)?),
                    SimpleQueryMessage::CommandComplete(count) => affected = count,
                    _ => {}
                }
            }

            if columns.is_empty() {
                return Ok::<_, DbalError>(MaterializedResult::command(affected));
            }
            Ok::<_, DbalError>(MaterializedResult::with_rows(columns, rows, affected))
        })?;

        Ok(Box::new(result))
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn release(&mut self) {
        // Dropping the client closes the session; the connection task then
        // finishes on its own, abort covers a wedged socket.
        self.client.take();
        if let Some(task) = self.connection_task.take() {
            task.abort();
        }
    }
}

impl Drop for PostgresDriver {
    fn drop(&mut self) {
        self.release();
    }
}

/// Prefer the server's message over the generic "db error" wrapper.
fn pg_message(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => db.message().to_string(),
        None => e.to_string(),
    }
}

fn convert_row(row: &SimpleQueryRow, types: &[Type]) -> DbalResult<Vec<Value>> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let ty = types.get(idx).unwrap_or(&Type::TEXT);
            convert_text(row.get(idx), ty).map_err(|reason| {
                DbalError::result(format!(
                    "Unable to read column {} ({}): {}",
                    column.name(),
                    ty,
                    reason
                ))
            })
        })
        .collect()
}

/// Booleans and integers become typed values; everything else keeps the
/// server's text rendering, which is what stored values are compared by.
fn convert_text(raw: Option<&str>, ty: &Type) -> Result<Value, String> {
    let Some(text) = raw else {
        return Ok(Value::Null);
    };
    if *ty == Type::BOOL {
        match text {
            "t" => Ok(Value::Boolean(true)),
            "f" => Ok(Value::Boolean(false)),
            other => Err(format!("unexpected boolean {other:?}")),
        }
    } else if *ty == Type::INT2 || *ty == Type::INT4 || *ty == Type::INT8 || *ty == Type::OID {
        text.parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| format!("{e}: {text:?}"))
    } else {
        Ok(Value::Text(text.to_string()))
    }
}
