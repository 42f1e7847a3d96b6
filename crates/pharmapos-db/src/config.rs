//! Store configuration.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults, or built directly for embedding and tests.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DbError, DbResult};

/// Connection settings shared by every tenant pool the registry opens.
///
/// ## Example
/// ```rust,ignore
/// let config = StoreConfig::new("./data")
///     .max_connections(5)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding one `{slug}.db` SQLite file per tenant.
    pub data_dir: PathBuf,

    /// Maximum number of connections per tenant pool.
    /// Default: 5 (plenty for a shop's counter traffic)
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long an acquire may wait before PoolExhausted.
    /// Default: 30 seconds
    pub acquire_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// When set, every namespace lives in its own in-memory database.
    /// Used by tests and the seed binary's dry-run mode.
    pub ephemeral: bool,
}

impl StoreConfig {
    /// Creates a configuration with the given data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        StoreConfig {
            data_dir: data_dir.into(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            ephemeral: false,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable                          | Default  |
    /// |-----------------------------------|----------|
    /// | `PHARMAPOS_DATA_DIR`              | `./data` |
    /// | `PHARMAPOS_MAX_CONNECTIONS`       | `5`      |
    /// | `PHARMAPOS_ACQUIRE_TIMEOUT_SECS`  | `30`     |
    pub fn from_env() -> DbResult<Self> {
        let data_dir = env::var("PHARMAPOS_DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let max_connections: u32 = env::var("PHARMAPOS_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|_| DbError::Config("Invalid value for PHARMAPOS_MAX_CONNECTIONS".to_string()))?;

        let acquire_timeout_secs: u64 = env::var("PHARMAPOS_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| {
                DbError::Config("Invalid value for PHARMAPOS_ACQUIRE_TIMEOUT_SECS".to_string())
            })?;

        if max_connections == 0 {
            return Err(DbError::Config(
                "PHARMAPOS_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }

        Ok(StoreConfig::new(data_dir)
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(acquire_timeout_secs)))
    }

    /// Sets the maximum number of connections per tenant pool.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections per tenant pool.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the acquire timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Creates an in-memory configuration (for testing).
    ///
    /// In-memory SQLite lives inside a single connection, so the pool is
    /// pinned to one connection per namespace.
    pub fn ephemeral() -> Self {
        StoreConfig {
            data_dir: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            ephemeral: true,
        }
    }

    /// The database file backing a namespace.
    pub(crate) fn database_path(&self, namespace: &str) -> PathBuf {
        self.data_dir.join(format!("{namespace}.db"))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
