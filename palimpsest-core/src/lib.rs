//! palimpsest Core - Value, Record and Error Types
//!
//! Plain data shared by every other crate in the workspace: the closed scalar
//! `Value`, ordered `Record`s of field values, validated table identifiers,
//! the error taxonomy and connection configuration.

pub mod config;
pub mod error;
pub mod ident;
pub mod record;
pub mod value;

pub use config::DbConfig;
pub use error::{ConfigError, DbalError, DbalResult};
pub use ident::{validate_identifier, TableName, MAX_IDENTIFIER_LEN};
pub use record::Record;
pub use value::Value;
