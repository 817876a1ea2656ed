//! Distribution module parameters.
//!
//! Parameters are read from a TOML file. Every field has a default, so an
//! empty file (or no file) yields the standard configuration:
//!
//! ```toml
//! community_tax = "0.02"
//! base_proposer_reward = "0.01"
//! bonus_proposer_reward = "0.04"
//! withdraw_addr_enabled = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tally_types::Dec;

use crate::{DistributionError, Result};

/// Distribution module parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionParams {
    /// Fraction of each block's fees sent straight to the community pool.
    #[serde(default = "default_community_tax")]
    pub community_tax: Dec,
    /// Fraction of fees always paid to the block proposer.
    #[serde(default = "default_base_proposer_reward")]
    pub base_proposer_reward: Dec,
    /// Extra proposer fraction, scaled by the share of voting power that signed.
    #[serde(default = "default_bonus_proposer_reward")]
    pub bonus_proposer_reward: Dec,
    /// Whether delegators may redirect withdrawals to another account.
    #[serde(default = "default_true")]
    pub withdraw_addr_enabled: bool,
}

fn default_community_tax() -> Dec {
    Dec::from_ratio(2, 100).unwrap_or_default()
}

fn default_base_proposer_reward() -> Dec {
    Dec::from_ratio(1, 100).unwrap_or_default()
}

fn default_bonus_proposer_reward() -> Dec {
    Dec::from_ratio(4, 100).unwrap_or_default()
}

fn default_true() -> bool {
    true
}

impl Default for DistributionParams {
    fn default() -> Self {
        Self {
            community_tax: default_community_tax(),
            base_proposer_reward: default_base_proposer_reward(),
            bonus_proposer_reward: default_bonus_proposer_reward(),
            withdraw_addr_enabled: true,
        }
    }
}

impl DistributionParams {
    /// Check every fraction lies in `[0, 1]` and the fixed shares leave room
    /// for validators.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::InvalidParams`] describing the first violation
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("community_tax", &self.community_tax),
            ("base_proposer_reward", &self.base_proposer_reward),
            ("bonus_proposer_reward", &self.bonus_proposer_reward),
        ] {
            if !value.is_unit_interval() {
                return Err(DistributionError::InvalidParams(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        let fixed = &self.community_tax + &self.base_proposer_reward + &self.bonus_proposer_reward;
        if fixed > Dec::one() {
            return Err(DistributionError::InvalidParams(format!(
                "community_tax + base_proposer_reward + bonus_proposer_reward must not exceed 1, got {fixed}"
            )));
        }
        Ok(())
    }

    /// Parse and validate parameters from TOML text.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::InvalidParams`] on malformed TOML or invalid values
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let params: DistributionParams = toml::from_str(content)
            .map_err(|e| DistributionError::InvalidParams(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Load parameters from a TOML file.
    ///
    /// Falls back to defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::InvalidParams`] if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "no parameter file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| DistributionError::InvalidParams(format!("{}: {e}", path.display())))?;
        let params = Self::from_toml_str(&content)?;
        tracing::info!(
            community_tax = %params.community_tax,
            base_proposer_reward = %params.base_proposer_reward,
            bonus_proposer_reward = %params.bonus_proposer_reward,
            withdraw_addr_enabled = params.withdraw_addr_enabled,
            "distribution parameters loaded"
        );
        Ok(params)
    }

    /// Serialize to TOML text.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::InvalidParams`] if serialization fails
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| DistributionError::InvalidParams(e.to_string()))
    }
}
