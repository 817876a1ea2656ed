//! Per-validator reward index and commission.
//!
//! ## Index
//!
//! `reward_index` is the cumulative reward earned per delegator share since
//! the validator was registered. Each allocation adds
//!
//! ```text
//! (gross - gross * commission_rate) / total_delegator_shares
//! ```
//!
//! and the index never decreases. Slashing reprices shares in the staking
//! module instead of touching the index.

use serde::{Deserialize, Serialize};
use tally_types::{Dec, Height, ValidatorId};

use crate::providers::DistributionStore;
use crate::{DistributionError, Result};

/// Distribution bookkeeping for one validator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorDistInfo {
    /// The validator.
    pub validator_id: ValidatorId,
    /// Cumulative reward per delegator share.
    pub reward_index: Dec,
    /// Height of the last index advance.
    pub last_update_height: Height,
    /// Commission owed to the operator, not yet withdrawn.
    pub outstanding_commission: Dec,
}

/// The outcome of one reward allocation to a validator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorAllocation {
    /// The updated record.
    pub record: ValidatorDistInfo,
    /// Commission cut added to `outstanding_commission`.
    pub commission: Dec,
    /// Increase of `reward_index`.
    pub index_increase: Dec,
    /// Delegator portion redirected to the community pool because no shares exist.
    pub to_community_pool: Dec,
}

impl ValidatorDistInfo {
    /// A freshly registered validator.
    pub fn new(validator_id: ValidatorId, height: Height) -> Self {
        Self {
            validator_id,
            reward_index: Dec::zero(),
            last_update_height: height,
            outstanding_commission: Dec::zero(),
        }
    }

    /// Apply a gross reward.
    ///
    /// All inputs are validated before anything is computed; on error the
    /// record is untouched.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::NegativeReward`] if `gross_reward < 0`
    /// - [`DistributionError::InvalidRate`] if `commission_rate` is outside `[0, 1]`
    /// - [`DistributionError::InvalidShares`] if `total_delegator_shares < 0`
    pub fn allocate(
        &self,
        gross_reward: &Dec,
        commission_rate: &Dec,
        total_delegator_shares: &Dec,
        height: Height,
    ) -> Result<ValidatorAllocation> {
        if gross_reward.is_negative() {
            return Err(DistributionError::NegativeReward(gross_reward.clone()));
        }
        if !commission_rate.is_unit_interval() {
            return Err(DistributionError::InvalidRate(commission_rate.clone()));
        }
        if total_delegator_shares.is_negative() {
            return Err(DistributionError::InvalidShares(total_delegator_shares.clone()));
        }

        let commission = gross_reward * commission_rate;
        let delegator_portion = gross_reward - &commission;

        let (index_increase, to_community_pool) =
            match delegator_portion.checked_div(total_delegator_shares) {
                Some(per_share) => (per_share, Dec::zero()),
                None => (Dec::zero(), delegator_portion),
            };

        tracing::trace!(
            validator = %self.validator_id,
            %commission,
            %index_increase,
            %to_community_pool,
            height,
            "validator reward applied"
        );

        let record = ValidatorDistInfo {
            validator_id: self.validator_id,
            reward_index: &self.reward_index + &index_increase,
            last_update_height: height.max(self.last_update_height),
            outstanding_commission: &self.outstanding_commission + &commission,
        };

        Ok(ValidatorAllocation {
            record,
            commission,
            index_increase,
            to_community_pool,
        })
    }

    /// Take the whole outstanding commission, returning the zeroed record and
    /// the amount taken.
    pub fn take_commission(&self) -> (ValidatorDistInfo, Dec) {
        let record = ValidatorDistInfo {
            outstanding_commission: Dec::zero(),
            ..self.clone()
        };
        (record, self.outstanding_commission.clone())
    }

    /// Check stored values are sane.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::InvariantViolation`] on a negative index or commission
    pub fn ensure_valid(&self) -> Result<()> {
        if self.reward_index.is_negative() {
            return Err(DistributionError::InvariantViolation(format!(
                "negative reward index {} for validator {}",
                self.reward_index, self.validator_id
            )));
        }
        if self.outstanding_commission.is_negative() {
            return Err(DistributionError::InvariantViolation(format!(
                "negative outstanding commission {} for validator {}",
                self.outstanding_commission, self.validator_id
            )));
        }
        Ok(())
    }
}

/// Read a validator record that must exist.
///
/// # Errors
///
/// - [`DistributionError::ValidatorNotFound`] if there is no record
/// - [`DistributionError::InvariantViolation`] if the stored record is corrupt
pub fn load<S: DistributionStore + ?Sized>(
    store: &S,
    validator: &ValidatorId,
) -> Result<ValidatorDistInfo> {
    let info = store
        .validator(validator)?
        .ok_or(DistributionError::ValidatorNotFound(*validator))?;
    info.ensure_valid()?;
    Ok(info)
}
