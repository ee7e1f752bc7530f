//! Configuration for the ledger store

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// In-process hash maps, lost on restart
    Memory,
    /// RocksDB column families (requires the `rocksdb` feature)
    Rocksdb,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend to open
    pub backend: StoreBackend,

    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            data_dir: PathBuf::from("./data/payouts"),
            rocksdb: RocksDBConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 3,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

impl StoreConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: StoreConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self) -> crate::Result<()> {
        if let Ok(backend) = std::env::var("PAYOUT_STORE_BACKEND") {
            self.backend = match backend.as_str() {
                "memory" => StoreBackend::Memory,
                "rocksdb" => StoreBackend::Rocksdb,
                other => {
                    return Err(crate::Error::Config(format!(
                        "Unknown store backend '{}'",
                        other
                    )))
                }
            };
        }

        if let Ok(dir) = std::env::var("PAYOUT_STORE_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.backend, StoreBackend::Memory);
        assert_eq!(config.rocksdb.max_background_jobs, 2);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: StoreConfig = toml::from_str(
            r#"
            backend = "rocksdb"
            data_dir = "/var/lib/payouts"
            "#,
        )
        .unwrap();
        assert_eq!(config.backend, StoreBackend::Rocksdb);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/payouts"));
        assert_eq!(config.rocksdb.write_buffer_size_mb, 64);
    }
}
