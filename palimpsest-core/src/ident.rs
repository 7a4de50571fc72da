//! Validated table identifiers and the column naming conventions derived from
//! them.

use crate::{DbalError, DbalResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest identifier PostgreSQL keeps without truncation (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// A validated, non-empty table name.
///
/// By convention the primary key of a table `t` is `t_id`, its id sequence is
/// also named `t_id`, and versioned tables carry a nullable `t_deleted`
/// timestamp where NULL marks the active version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> DbalResult<Self> {
        let name = name.into();
        validate_identifier(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Primary key column, `<table>_id`.
    pub fn id_column(&self) -> String {
        format!("{}_id", self.0)
    }

    /// Sequence feeding the primary key, `<table>_id`.
    pub fn sequence_name(&self) -> String {
        self.id_column()
    }

    /// Soft-delete timestamp column, `<table>_deleted`.
    pub fn deleted_column(&self) -> String {
        format!("{}_deleted", self.0)
    }
}

/// Check that `name` can be used as a quoted SQL identifier.
pub fn validate_identifier(name: &str) -> DbalResult<()> {
    let reason = if name.is_empty() {
        "identifier must not be empty"
    } else if name.contains('\0') {
        "identifier must not contain NUL bytes"
    } else if name.len() > MAX_IDENTIFIER_LEN {
        "identifier exceeds 63 bytes"
    } else {
        return Ok(());
    };
    Err(DbalError::InvalidIdentifier {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TableName {
    type Error = DbalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TableName::new(value)
    }
}

impl TryFrom<&str> for TableName {
    type Error = DbalError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        TableName::new(value)
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conventional_columns() {
        let t = TableName::new("person").unwrap();
        assert_eq!(t.id_column(), "person_id");
        assert_eq!(t.sequence_name(), "person_id");
        assert_eq!(t.deleted_column(), "person_deleted");
    }

    #[test]
    fn test_rejects_empty() {
        let err = TableName::new("").unwrap_err();
        assert!(matches!(err, DbalError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_rejects_nul() {
        assert!(TableName::new("bad\0name").is_err());
    }

    #[test]
    fn test_rejects_overlong() {
        assert!(TableName::new("x".repeat(64)).is_err());
        assert!(TableName::new("x".repeat(63)).is_ok());
    }

    #[test]
    fn test_accepts_mixed_case_and_spaces() {
        let t = TableName::new("Order Items").unwrap();
        assert_eq!(t.as_str(), "Order Items");
    }

    #[test]
    fn test_serde_validates() {
        let ok: TableName = serde_json::from_str("\"person\"").unwrap();
        assert_eq!(ok.as_str(), "person");
        assert!(serde_json::from_str::<TableName>("\"\"").is_err());
    }
}
