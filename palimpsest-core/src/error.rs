//! Error types for palimpsest operations

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for the data access layer.
///
/// Every variant surfaces to the caller. The only error swallowed inside the
/// library is `UpdateCardinality`, which drives the fallback path of
/// `update_or_insert`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DbalError {
    #[error("Connection error: {reason}")]
    Connection { reason: String },

    #[error("Query failed: {message}")]
    Query { sql: String, message: String },

    #[error("Result error: {reason}")]
    Result { reason: String },

    #[error("Expected a single row inserted into {table}, affected {affected}")]
    InsertCardinality { table: String, affected: u64 },

    #[error("Expected a single row updated in {table}, affected {affected}")]
    UpdateCardinality { table: String, affected: u64 },

    #[error("Unsupported value for field {field}: {reason}")]
    UnsupportedValue { field: String, reason: String },

    #[error("Transaction already finished ({state})")]
    TransactionClosed { state: String },

    #[error(
        "Not a transaction connection. Ensure you are using the return object from get_transaction()"
    )]
    NotInTransaction,

    #[error("Invalid identifier {name:?}: {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("Invalid record: {reason}")]
    InvalidRecord { reason: String },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl DbalError {
    /// Build a query error from the failing statement and the driver message.
    pub fn query(sql: impl Into<String>, message: impl Into<String>) -> Self {
        DbalError::Query {
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// Build a result error.
    pub fn result(reason: impl Into<String>) -> Self {
        DbalError::Result {
            reason: reason.into(),
        }
    }

    /// Build a connection error.
    pub fn connection(reason: impl Into<String>) -> Self {
        DbalError::Connection {
            reason: reason.into(),
        }
    }

    /// Build an invalid record error.
    pub fn invalid_record(reason: impl Into<String>) -> Self {
        DbalError::InvalidRecord {
            reason: reason.into(),
        }
    }

    /// True for the exactly-one-row update failure.
    pub fn is_update_cardinality(&self) -> bool {
        matches!(self, DbalError::UpdateCardinality { .. })
    }
}

/// Result type alias for data access operations.
pub type DbalResult<T> = Result<T, DbalError>;

// =============================================================================
// TESTS
// =============================================================================
