//! Configuration for rc-store

use rc_core::RcParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Default database location
pub fn default_db_path() -> PathBuf {
    PathBuf::from(".").join("rc-ledger.sled")
}

fn default_cache_capacity() -> u64 {
    64 * 1024 * 1024 // 64MB
}

/// Sled store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to sled database
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Page cache size in bytes
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,

    /// Throwaway database, removed on drop
    #[serde(default)]
    pub temporary: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_capacity: default_cache_capacity(),
            temporary: false,
        }
    }
}

/// Configuration for the `rc-replay` tool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Chain-wide RC parameters
    #[serde(default)]
    pub params: RcParams,

    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| StoreError::Config(e.to_string()))?;
        config
            .params
            .validate()
            .map_err(|e| StoreError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| StoreError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
