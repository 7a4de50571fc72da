//! Connection entry points.

use crate::Connection;
#[cfg(feature = "postgres")]
use palimpsest_core::DbConfig;
use palimpsest_core::DbalResult;

/// Opens root connections on the available backends.
pub struct Database;

impl Database {
    /// Connect to PostgreSQL.
    #[cfg(feature = "postgres")]
    pub fn connect(config: &DbConfig) -> DbalResult<Connection> {
        config.validate()?;
        let driver = palimpsest_driver::PostgresDriver::connect(&config.connection_string())?;
        tracing::info!(
            host = %config.host,
            port = config.port,
            dbname = %config.dbname,
            "Connected to database"
        );
        Ok(Connection::new(Box::new(driver)))
    }

    /// Open (or create) a SQLite database file.
    #[cfg(feature = "sqlite")]
    pub fn open_sqlite(path: impl AsRef<std::path::Path>) -> DbalResult<Connection> {
        let driver = palimpsest_driver::SqliteDriver::open(path)?;
        Ok(Connection::new(Box::new(driver)))
    }

    /// Open a private in-memory SQLite database.
    #[cfg(feature = "sqlite")]
    pub fn open_in_memory() -> DbalResult<Connection> {
        let driver = palimpsest_driver::SqliteDriver::open_in_memory()?;
        Ok(Connection::new(Box::new(driver)))
    }
}
