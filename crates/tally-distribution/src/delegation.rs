//! Per-delegation index snapshot.
//!
//! A delegation's unclaimed reward is the distance between its validator's
//! current index and the snapshot taken at its last settlement, times the
//! shares it holds now:
//!
//! ```text
//! owed = (validator.reward_index - record.index_snapshot) * current_shares
//! ```
//!
//! The snapshot must be settled before any change to the share count, or
//! rewards accrued under the old count would be repriced at the new one.

use serde::{Deserialize, Serialize};
use tally_types::{Dec, DelegatorId, Height, TokenAmount, ValidatorId};

use crate::validator::ValidatorDistInfo;
use crate::{DistributionError, Result};

/// Distribution bookkeeping for one (delegator, validator) pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationDistInfo {
    /// The delegator.
    pub delegator_id: DelegatorId,
    /// The validator.
    pub validator_id: ValidatorId,
    /// The validator's index at the last settlement.
    pub index_snapshot: Dec,
    /// Height of the last settlement.
    pub settled_height: Height,
}

impl DelegationDistInfo {
    /// A new delegation, snapshotting the validator's current index.
    pub fn new(delegator_id: DelegatorId, validator: &ValidatorDistInfo, height: Height) -> Self {
        Self {
            delegator_id,
            validator_id: validator.validator_id,
            index_snapshot: validator.reward_index.clone(),
            settled_height: height,
        }
    }
}

/// Exact reward owed to a delegation holding `current_shares`.
///
/// # Errors
///
/// - [`DistributionError::InvalidShares`] if `current_shares < 0`
/// - [`DistributionError::InvariantViolation`] if the record belongs to another
///   validator or its snapshot is ahead of the validator's index
pub fn compute_owed(
    record: &DelegationDistInfo,
    validator: &ValidatorDistInfo,
    current_shares: &Dec,
) -> Result<Dec> {
    if current_shares.is_negative() {
        return Err(DistributionError::InvalidShares(current_shares.clone()));
    }
    if record.validator_id != validator.validator_id {
        return Err(DistributionError::InvariantViolation(format!(
            "delegation record for {} paired with validator {}",
            record.validator_id, validator.validator_id
        )));
    }
    if record.index_snapshot > validator.reward_index {
        return Err(DistributionError::InvariantViolation(format!(
            "snapshot {} ahead of reward index {} for {} -> {}",
            record.index_snapshot, validator.reward_index, record.delegator_id, record.validator_id
        )));
    }
    Ok((&validator.reward_index - &record.index_snapshot) * current_shares)
}

/// Advance the snapshot to the validator's current index.
pub fn settle_snapshot(
    record: &DelegationDistInfo,
    validator: &ValidatorDistInfo,
    height: Height,
) -> DelegationDistInfo {
    DelegationDistInfo {
        delegator_id: record.delegator_id,
        validator_id: record.validator_id,
        index_snapshot: validator.reward_index.clone(),
        settled_height: height,
    }
}

/// Split an owed amount into the payable integer and the dust that must go
/// back to the community pool.
///
/// # Errors
///
/// - [`DistributionError::Overflow`] if `owed` is negative or too large
pub fn split_payable(owed: &Dec) -> Result<(TokenAmount, Dec)> {
    Ok(owed.floor_split()?)
}
