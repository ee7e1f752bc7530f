//! Configuration for the payout engine

use ledger_core::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Payout engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Holiday calendar and default fee plan
    pub settlement: settlement::Config,

    /// Persistence backend
    pub store: StoreConfig,

    /// Payout request handling
    pub payouts: PayoutConfig,

    /// Expose Prometheus metrics
    pub metrics_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "payout-engine".to_string(),
            settlement: settlement::Config::default(),
            store: StoreConfig::default(),
            payouts: PayoutConfig::default(),
            metrics_enabled: true,
        }
    }
}

/// Payout request handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PayoutConfig {
    /// Re-reads after a lost conditional write before giving up
    pub max_reservation_retries: u32,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            max_reservation_retries: 3,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PAYOUT_*` overrides on top of the current values
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(name) = std::env::var("PAYOUT_SERVICE_NAME") {
            self.service_name = name;
        }

        if let Ok(retries) = std::env::var("PAYOUT_MAX_RESERVATION_RETRIES") {
            self.payouts.max_reservation_retries = retries.trim().parse().map_err(|e| {
                Error::Config(format!(
                    "Invalid PAYOUT_MAX_RESERVATION_RETRIES '{}': {}",
                    retries, e
                ))
            })?;
        }

        if let Ok(enabled) = std::env::var("PAYOUT_METRICS_ENABLED") {
            self.metrics_enabled = enabled.trim().parse().map_err(|e| {
                Error::Config(format!("Invalid PAYOUT_METRICS_ENABLED '{}': {}", enabled, e))
            })?;
        }

        self.settlement.apply_env()?;
        self.store.apply_env()?;
        Ok(())
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(Error::Config("service_name must not be empty".to_string()));
        }
        self.settlement.validate()?;
        Ok(())
    }
}
