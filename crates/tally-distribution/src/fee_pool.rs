//! Community pool ledger.
//!
//! A single [`FeePool`] record per chain. It receives rewards that no
//! validator owns (community tax, delegator portions of share-less
//! validators, unsigned voting power) and every fractional remainder produced
//! when an exact owed amount is truncated to a payable integer. Nothing is
//! ever lost to truncation because the dust lands here.

use serde::{Deserialize, Serialize};
use tally_types::Dec;

use crate::providers::DistributionStore;
use crate::{DistributionError, Result};

/// The community pool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePool {
    /// Undistributed collective rewards plus accumulated rounding dust.
    pub community_pool: Dec,
}

impl FeePool {
    /// An empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rewards earmarked for collective use.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::NegativeReward`] if `amount` is negative
    pub fn add_collective_reward(&self, amount: &Dec) -> Result<FeePool> {
        if amount.is_negative() {
            return Err(DistributionError::NegativeReward(amount.clone()));
        }
        Ok(FeePool {
            community_pool: &self.community_pool + amount,
        })
    }

    /// Fold a truncation remainder back into the pool.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::InvariantViolation`] if `remainder` is not in `[0, 1)`
    pub fn add_rounding_remainder(&self, remainder: &Dec) -> Result<FeePool> {
        if remainder.is_negative() || *remainder >= Dec::one() {
            return Err(DistributionError::InvariantViolation(format!(
                "rounding remainder {remainder} outside [0, 1)"
            )));
        }
        Ok(FeePool {
            community_pool: &self.community_pool + remainder,
        })
    }

    /// Spend from the pool.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::NegativeReward`] if `amount` is negative
    /// - [`DistributionError::InsufficientPool`] if `amount` exceeds the pool
    pub fn spend_collective(&self, amount: &Dec) -> Result<FeePool> {
        if amount.is_negative() {
            return Err(DistributionError::NegativeReward(amount.clone()));
        }
        if *amount > self.community_pool {
            return Err(DistributionError::InsufficientPool {
                available: self.community_pool.clone(),
                requested: amount.clone(),
            });
        }
        Ok(FeePool {
            community_pool: &self.community_pool - amount,
        })
    }

    /// Check the pool is not negative.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::InvariantViolation`] if the pool is negative
    pub fn ensure_valid(&self) -> Result<()> {
        if self.community_pool.is_negative() {
            return Err(DistributionError::InvariantViolation(format!(
                "negative community pool {}",
                self.community_pool
            )));
        }
        Ok(())
    }
}

/// Read the fee pool slot.
///
/// # Errors
///
/// - [`DistributionError::FeePoolMissing`] if the slot was never initialised
pub fn load<S: DistributionStore + ?Sized>(store: &S) -> Result<FeePool> {
    let pool = store.fee_pool()?.ok_or(DistributionError::FeePoolMissing)?;
    pool.ensure_valid()?;
    Ok(pool)
}

/// Read-modify-write the fee pool slot.
pub(crate) fn update<S, F>(store: &mut S, f: F) -> Result<FeePool>
where
    S: DistributionStore + ?Sized,
    F: FnOnce(&FeePool) -> Result<FeePool>,
{
    let current = load(store)?;
    let next = f(&current)?;
    store.set_fee_pool(next.clone())?;
    Ok(next)
}
