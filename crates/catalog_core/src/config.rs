//! Runtime configuration for the catalog core.
//!
//! # Responsibility
//! - Carry database location, lock wait and transaction defaults.
//! - Provide defaults so hosts only override what they need.
//!
//! # Invariants
//! - `db_path = None` selects an in-memory database.
//! - `default_tx_timeout_secs = None` means transactions never time out
//!   unless a definition asks for it.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Host-supplied configuration, usually parsed from JSON or TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// SQLite database file. `None` opens an in-memory database.
    pub db_path: Option<PathBuf>,
    /// How long a connection waits for another unit of work's lock.
    pub busy_timeout_ms: u64,
    /// Timeout applied to definitions that do not set their own.
    pub default_tx_timeout_secs: Option<u64>,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling log files. `None` disables file logs.
    pub log_dir: Option<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            default_tx_timeout_secs: None,
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CatalogConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn default_tx_timeout(&self) -> Option<Duration> {
        self.default_tx_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::CatalogConfig;
    use std::time::Duration;

    #[test]
    fn defaults_use_memory_db_and_five_second_busy_wait() {
        let config = CatalogConfig::default();
        assert!(config.db_path.is_none());
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert_eq!(config.default_tx_timeout(), None);
    }
}
