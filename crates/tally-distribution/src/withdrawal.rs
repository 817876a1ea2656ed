//! Delegator reward withdrawal.
//!
//! A withdrawal computes the exact owed amount from the index delta, pays the
//! floor of it, returns the fraction to the community pool and moves the
//! snapshot up to the current index. Only this engine moves
//! `index_snapshot`.
//!
//! The engine writes the store before crediting the bank. Run it over a
//! [`crate::CacheStore`] (as [`crate::Distribution`] does) so a failed credit
//! leaves no trace.

use tally_types::{Dec, DelegatorId, Height, TokenAmount, ValidatorId};

use crate::delegation::{compute_owed, settle_snapshot, split_payable, DelegationDistInfo};
use crate::providers::{resolve_withdraw_address, BankProvider, DistributionStore, StakingProvider};
use crate::{fee_pool, validator, DistributionError, Result};

/// Settles and pays delegation rewards.
pub struct WithdrawalEngine<'a, S: ?Sized, K: ?Sized, B: ?Sized> {
    store: &'a mut S,
    staking: &'a K,
    bank: &'a mut B,
}

impl<'a, S, K, B> WithdrawalEngine<'a, S, K, B>
where
    S: DistributionStore + ?Sized,
    K: StakingProvider + ?Sized,
    B: BankProvider + ?Sized,
{
    pub fn new(store: &'a mut S, staking: &'a K, bank: &'a mut B) -> Self {
        Self {
            store,
            staking,
            bank,
        }
    }

    /// Withdraw the rewards of one delegation.
    ///
    /// Returns the whole tokens credited. A second call with no allocation in
    /// between returns 0.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::RecordNotFound`] if the delegation has no record
    /// - [`DistributionError::ValidatorNotFound`] if the validator has no record
    /// - [`DistributionError::UnknownAccount`] if the bank rejects the credit
    pub fn withdraw_single(
        &mut self,
        delegator: &DelegatorId,
        validator: &ValidatorId,
        height: Height,
    ) -> Result<TokenAmount> {
        let payable = self.settle(delegator, validator, height)?;
        self.pay(delegator, payable)?;
        tracing::info!(
            %delegator,
            %validator,
            amount = payable,
            height,
            "delegation rewards withdrawn"
        );
        Ok(payable)
    }

    /// Withdraw the rewards of every delegation `delegator` holds.
    ///
    /// Validators are visited in sorted order and each delegation is
    /// truncated on its own; the total is credited once.
    ///
    /// # Errors
    ///
    /// Any error of [`Self::withdraw_single`] for any of the delegations.
    pub fn withdraw_all(&mut self, delegator: &DelegatorId, height: Height) -> Result<TokenAmount> {
        let mut validators = self.staking.delegations(delegator)?;
        validators.sort();
        validators.dedup();

        let mut total: TokenAmount = 0;
        for validator in &validators {
            let payable = self.settle(delegator, validator, height)?;
            total = total.checked_add(payable).ok_or_else(|| {
                DistributionError::Overflow(format!("withdrawal total for {delegator}"))
            })?;
        }

        self.pay(delegator, total)?;
        tracing::info!(
            %delegator,
            validators = validators.len(),
            amount = total,
            height,
            "all delegation rewards withdrawn"
        );
        Ok(total)
    }

    /// Settle one delegation and return its payable amount. Dust goes to the
    /// community pool.
    fn settle(
        &mut self,
        delegator: &DelegatorId,
        validator: &ValidatorId,
        height: Height,
    ) -> Result<TokenAmount> {
        let record = load_record(&*self.store, delegator, validator)?;
        let info = validator::load(&*self.store, validator)?;
        let shares = self.staking.delegator_shares(delegator, validator)?;

        let owed = compute_owed(&record, &info, &shares)?;
        let (payable, dust) = split_payable(&owed)?;

        if !dust.is_zero() {
            fee_pool::update(&mut *self.store, |pool| pool.add_rounding_remainder(&dust))?;
        }
        self.store.set_delegation(settle_snapshot(&record, &info, height))?;

        tracing::trace!(%delegator, %validator, %owed, %dust, "delegation settled");
        Ok(payable)
    }

    fn pay(&mut self, delegator: &DelegatorId, amount: TokenAmount) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let address = resolve_withdraw_address(&*self.store, delegator)?;
        self.bank.credit(&address, amount)
    }
}

/// Read a delegation record that must exist.
///
/// # Errors
///
/// - [`DistributionError::RecordNotFound`] if there is no record
pub fn load_record<S: DistributionStore + ?Sized>(
    store: &S,
    delegator: &DelegatorId,
    validator: &ValidatorId,
) -> Result<DelegationDistInfo> {
    store
        .delegation(delegator, validator)?
        .ok_or(DistributionError::RecordNotFound {
            delegator: *delegator,
            validator: *validator,
        })
}

/// Exact reward a delegation could withdraw now. Read-only.
///
/// # Errors
///
/// - [`DistributionError::RecordNotFound`] if the delegation has no record
/// - [`DistributionError::ValidatorNotFound`] if the validator has no record
pub fn pending_rewards<S, K>(
    store: &S,
    staking: &K,
    delegator: &DelegatorId,
    validator: &ValidatorId,
) -> Result<Dec>
where
    S: DistributionStore + ?Sized,
    K: StakingProvider + ?Sized,
{
    let record = load_record(store, delegator, validator)?;
    let info = validator::load(store, validator)?;
    let shares = staking.delegator_shares(delegator, validator)?;
    compute_owed(&record, &info, &shares)
}

/// Exact reward across every delegation of `delegator`. Read-only.
///
/// # Errors
///
/// Any error of [`pending_rewards`].
pub fn pending_rewards_all<S, K>(store: &S, staking: &K, delegator: &DelegatorId) -> Result<Dec>
where
    S: DistributionStore + ?Sized,
    K: StakingProvider + ?Sized,
{
    let mut total = Dec::zero();
    for validator in staking.delegations(delegator)? {
        total += pending_rewards(store, staking, delegator, &validator)?;
    }
    Ok(total)
}
