//! Connection configuration.
//!
//! Configuration is loaded from environment variables with development
//! defaults, and rendered into a libpq-style connection string.

use crate::ConfigError;
use serde::{Deserialize, Serialize};

// ============================================================================
// DATABASE CONFIGURATION
// ============================================================================

/// PostgreSQL connection descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    /// PostgreSQL host. Empty means the driver default (local socket).
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "palimpsest".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
        }
    }
}

impl DbConfig {
    /// Create a configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PALIMPSEST_DB_HOST` (default: localhost)
    /// - `PALIMPSEST_DB_PORT` (default: 5432)
    /// - `PALIMPSEST_DB_NAME` (default: palimpsest)
    /// - `PALIMPSEST_DB_USER` (default: postgres)
    /// - `PALIMPSEST_DB_PASSWORD` (default: empty)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`DbConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("PALIMPSEST_DB_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "PALIMPSEST_DB_PORT".to_string(),
                value: raw.clone(),
                reason: "must be a port number".to_string(),
            })?,
            None => defaults.port,
        };

        let config = Self {
            host: lookup("PALIMPSEST_DB_HOST").unwrap_or(defaults.host),
            port,
            dbname: lookup("PALIMPSEST_DB_NAME").unwrap_or(defaults.dbname),
            user: lookup("PALIMPSEST_DB_USER").unwrap_or(defaults.user),
            password: lookup("PALIMPSEST_DB_PASSWORD").unwrap_or(defaults.password),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dbname.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "dbname".to_string(),
            });
        }
        if self.user.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "user".to_string(),
            });
        }
        Ok(())
    }

    /// Render the key/value connection string understood by libpq and
    /// tokio-postgres. The host is omitted when empty.
    pub fn connection_string(&self) -> String {
        let mut parts = vec![
            format!("dbname={}", quote_conninfo(&self.dbname)),
            format!("user={}", quote_conninfo(&self.user)),
            format!("password={}", quote_conninfo(&self.password)),
        ];
        if !self.host.is_empty() {
            parts.push(format!("host={}", quote_conninfo(&self.host)));
            parts.push(format!("port={}", self.port));
        }
        parts.join(" ")
    }
}

/// Quote a conninfo value when it is empty or contains spaces, quotes or
/// backslashes.
fn quote_conninfo(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\');
    if !needs_quotes {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_env_empty() {
        let config = DbConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, DbConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = DbConfig::from_lookup(lookup_from(&[
            ("PALIMPSEST_DB_HOST", "db.internal"),
            ("PALIMPSEST_DB_PORT", "6543"),
            ("PALIMPSEST_DB_NAME", "ledger"),
            ("PALIMPSEST_DB_USER", "app"),
            ("PALIMPSEST_DB_PASSWORD", "s3cret"),
        ]))
        .unwrap();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6543);
        assert_eq!(config.dbname, "ledger");
        assert_eq!(config.user, "app");
        assert_eq!(config.password, "s3cret");
    }

    #[test]
    fn test_invalid_port() {
        let err = DbConfig::from_lookup(lookup_from(&[("PALIMPSEST_DB_PORT", "nope")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref value, .. } if value == "nope"));
    }

    #[test]
    fn test_missing_dbname() {
        let err = DbConfig::from_lookup(lookup_from(&[("PALIMPSEST_DB_NAME", " ")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingRequired {
                field: "dbname".to_string()
            }
        );
    }

    #[test]
    fn test_connection_string_with_host() {
        let config = DbConfig {
            password: "pw".to_string(),
            ..DbConfig::default()
        };
        assert_eq!(
            config.connection_string(),
            "dbname=palimpsest user=postgres password=pw host=localhost port=5432"
        );
    }

    #[test]
    fn test_connection_string_without_host() {
        let config = DbConfig {
            host: String::new(),
            ..DbConfig::default()
        };
        assert_eq!(
            config.connection_string(),
            "dbname=palimpsest user=postgres password=''"
        );
    }

    #[test]
    fn test_connection_string_quotes_special_values() {
        let config = DbConfig {
            host: String::new(),
            password: "it's a secret".to_string(),
            ..DbConfig::default()
        };
        assert!(config
            .connection_string()
            .ends_with("password='it\\'s a secret'"));
    }
}
