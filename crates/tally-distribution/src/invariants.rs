//! State audits.
//!
//! [`check_invariants`] walks the whole store. It is meant for tests, genesis
//! import and operator tooling, never for the block path.

use std::collections::BTreeMap;

use tally_types::{Dec, ValidatorId};

use crate::delegation::compute_owed;
use crate::providers::{DistributionStore, StakingProvider};
use crate::validator::ValidatorDistInfo;
use crate::{fee_pool, DistributionError, Result};

/// Check every stored record against the accounting invariants:
///
/// - the community pool, every reward index and every commission are non-negative
/// - every delegation refers to an existing validator
/// - every snapshot lies between zero and its validator's index
///
/// # Errors
///
/// - [`DistributionError::FeePoolMissing`] if the fee pool was never initialised
/// - [`DistributionError::InvariantViolation`] describing the first violation
pub fn check_invariants<S: DistributionStore + ?Sized>(store: &S) -> Result<()> {
    fee_pool::load(store)?;

    let validators: BTreeMap<ValidatorId, ValidatorDistInfo> = store
        .validators()?
        .into_iter()
        .map(|v| (v.validator_id, v))
        .collect();
    for info in validators.values() {
        info.ensure_valid()?;
    }

    for record in store.delegations()? {
        let Some(validator) = validators.get(&record.validator_id) else {
            return Err(DistributionError::InvariantViolation(format!(
                "delegation {} -> {} has no validator record",
                record.delegator_id, record.validator_id
            )));
        };
        if record.index_snapshot.is_negative() || record.index_snapshot > validator.reward_index {
            return Err(DistributionError::InvariantViolation(format!(
                "delegation {} -> {} snapshot {} outside [0, {}]",
                record.delegator_id, record.validator_id, record.index_snapshot, validator.reward_index
            )));
        }
    }

    tracing::trace!(validators = validators.len(), "invariants hold");
    Ok(())
}

/// Where every allocated reward currently sits, short of the bank.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Holdings {
    /// The community pool.
    pub community_pool: Dec,
    /// Commission not yet withdrawn, across every validator.
    pub outstanding_commission: Dec,
    /// Exact rewards owed to delegations, not yet withdrawn.
    pub owed_to_delegators: Dec,
}

impl Holdings {
    pub fn total(&self) -> Dec {
        &self.community_pool + &self.outstanding_commission + &self.owed_to_delegators
    }
}

/// Sum every unpaid reward. Together with the bank's credited total this
/// equals everything ever allocated.
///
/// # Errors
///
/// - [`DistributionError::FeePoolMissing`] if the fee pool was never initialised
/// - [`DistributionError::InvariantViolation`] if a delegation has no validator
pub fn holdings<S, K>(store: &S, staking: &K) -> Result<Holdings>
where
    S: DistributionStore + ?Sized,
    K: StakingProvider + ?Sized,
{
    let community_pool = fee_pool::load(store)?.community_pool;

    let validators: BTreeMap<ValidatorId, ValidatorDistInfo> = store
        .validators()?
        .into_iter()
        .map(|v| (v.validator_id, v))
        .collect();
    let outstanding_commission: Dec = validators
        .values()
        .map(|v| &v.outstanding_commission)
        .sum();

    let mut owed_to_delegators = Dec::zero();
    for record in store.delegations()? {
        let validator = validators.get(&record.validator_id).ok_or_else(|| {
            DistributionError::InvariantViolation(format!(
                "delegation {} -> {} has no validator record",
                record.delegator_id, record.validator_id
            ))
        })?;
        let shares = staking.delegator_shares(&record.delegator_id, &record.validator_id)?;
        owed_to_delegators += compute_owed(&record, validator, &shares)?;
    }

    Ok(Holdings {
        community_pool,
        outstanding_commission,
        owed_to_delegators,
    })
}
