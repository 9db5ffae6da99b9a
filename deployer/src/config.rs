//! Deployment configuration.
//!
//! A `DeployConfig` is read from TOML and fixes everything the three
//! contracts take at construction time.
//!
//! ```toml
//! deployer = "0x0101...01"
//!
//! [rewards]
//! plastic_per_kg = 1000000000
//! metal_per_kg = 3000000000
//! grade_b_bps = 7500
//!
//! [payment]
//! kind = "per_kilogram"
//! amount_per_kg = 20000000
//!
//! [limits]
//! max_calls_per_run = 4
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use urbancycle_common::{
    constants::limits,
    math::RewardSchedule,
    types::{address_from_hex, address_to_hex, Address, ZERO_ADDRESS},
};
use urbancycle_recycle_manager::{ExecutionLimits, PaymentPolicy};

/// Top-level deployment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Deployer address, hex encoded. Becomes the token admin and the only
    /// account allowed to bind the registry.
    pub deployer: String,

    /// Reward rates per material and grade multipliers.
    #[serde(default)]
    pub rewards: RewardSchedule,

    /// Informal recycler payment policy.
    #[serde(default)]
    pub payment: PaymentPolicy,

    /// Host execution limits.
    #[serde(default)]
    pub limits: ExecutionLimits,
}

impl DeployConfig {
    /// Default configuration for `deployer`.
    pub fn new(deployer: Address) -> Self {
        Self {
            deployer: address_to_hex(&deployer),
            rewards: RewardSchedule::default(),
            payment: PaymentPolicy::default(),
            limits: ExecutionLimits::default(),
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a value is out of range.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every value the contracts would reject at deployment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` naming the offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.deployer_address()?;
        self.rewards
            .validate()
            .map_err(|e| ConfigError::Validation(format!("[rewards]: {e}")))?;
        self.payment
            .validate()
            .map_err(|e| ConfigError::Validation(format!("[payment]: {e}")))?;

        if self.limits.max_calls_per_run == 0 {
            return Err(ConfigError::Validation(
                "[limits]: max_calls_per_run must be at least 1".to_string(),
            ));
        }
        if !self.limits.settles_in_one_run() {
            warn!(
                max_calls_per_run = self.limits.max_calls_per_run,
                minimum = limits::MIN_CALLS_FOR_SETTLEMENT,
                "every run will stop before recording and need reconciliation"
            );
        }
        Ok(())
    }

    /// The parsed deployer address.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` for malformed or zero addresses.
    pub fn deployer_address(&self) -> Result<Address, ConfigError> {
        let address = address_from_hex(&self.deployer)
            .map_err(|e| ConfigError::Validation(format!("deployer: {e}")))?;
        if address == ZERO_ADDRESS {
            return Err(ConfigError::Validation("deployer: zero address".to_string()));
        }
        Ok(address)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}
