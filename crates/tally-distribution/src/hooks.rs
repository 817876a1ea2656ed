//! Staking notifications.
//!
//! The staking module calls these around every change that affects reward
//! accounting. The `before_*` hooks run while the old share count is still in
//! place, so the rewards earned under it are paid at that count.

use tally_types::{Dec, DelegatorId, TokenAmount, ValidatorId};

use crate::delegation::DelegationDistInfo;
use crate::keeper::Distribution;
use crate::providers::{BankProvider, DistributionStore, StakingProvider};
use crate::validator::{self, ValidatorDistInfo};
use crate::{DistributionError, Result};

/// Callbacks from the staking module.
pub trait StakingHooks {
    /// A validator was created. Registers its record with a zero index.
    fn after_validator_created(&mut self, validator: &ValidatorId) -> Result<()>;

    /// A validator was removed. Pays its outstanding commission and deletes
    /// its record; returns the whole tokens paid.
    fn after_validator_removed(&mut self, validator: &ValidatorId) -> Result<TokenAmount>;

    /// A delegation was created. Snapshots the validator's current index.
    fn after_delegation_created(
        &mut self,
        delegator: &DelegatorId,
        validator: &ValidatorId,
    ) -> Result<()>;

    /// A delegation's share count is about to change. Withdraws its rewards.
    fn before_delegation_shares_modified(
        &mut self,
        delegator: &DelegatorId,
        validator: &ValidatorId,
    ) -> Result<TokenAmount>;

    /// A delegation is about to be removed. Withdraws its rewards and deletes
    /// its record.
    fn before_delegation_removed(
        &mut self,
        delegator: &DelegatorId,
        validator: &ValidatorId,
    ) -> Result<TokenAmount>;

    /// A validator is about to be slashed by `fraction`. Withdraws every one
    /// of its delegations at the current share counts.
    fn before_validator_slashed(&mut self, validator: &ValidatorId, fraction: &Dec)
        -> Result<TokenAmount>;
}

impl<S, K, B> StakingHooks for Distribution<S, K, B>
where
    S: DistributionStore,
    K: StakingProvider,
    B: BankProvider,
{
    fn after_validator_created(&mut self, validator: &ValidatorId) -> Result<()> {
        self.atomic(|ctx| {
            if ctx.store.validator(validator)?.is_some() {
                return Err(DistributionError::AlreadyRegistered(format!(
                    "validator {validator}"
                )));
            }
            ctx.store
                .set_validator(ValidatorDistInfo::new(*validator, ctx.height))
        })?;
        tracing::debug!(%validator, "validator registered");
        Ok(())
    }

    fn after_validator_removed(&mut self, validator: &ValidatorId) -> Result<TokenAmount> {
        let paid = self.atomic(|ctx| {
            let remaining = ctx.store.delegations_of_validator(validator)?.len();
            if remaining > 0 {
                return Err(DistributionError::ValidatorHasDelegations {
                    validator: *validator,
                    remaining,
                });
            }
            let paid = ctx.allocator().withdraw_validator_commission(validator)?;
            ctx.store.remove_validator(validator)?;
            Ok(paid)
        })?;
        tracing::info!(%validator, commission = paid, "validator record removed");
        Ok(paid)
    }

    fn after_delegation_created(
        &mut self,
        delegator: &DelegatorId,
        validator: &ValidatorId,
    ) -> Result<()> {
        self.atomic(|ctx| {
            if ctx.store.delegation(delegator, validator)?.is_some() {
                return Err(DistributionError::AlreadyRegistered(format!(
                    "delegation {delegator} -> {validator}"
                )));
            }
            let info = validator::load(&*ctx.store, validator)?;
            ctx.store
                .set_delegation(DelegationDistInfo::new(*delegator, &info, ctx.height))
        })?;
        tracing::debug!(%delegator, %validator, "delegation registered");
        Ok(())
    }

    fn before_delegation_shares_modified(
        &mut self,
        delegator: &DelegatorId,
        validator: &ValidatorId,
    ) -> Result<TokenAmount> {
        self.withdraw_single(delegator, validator)
    }

    fn before_delegation_removed(
        &mut self,
        delegator: &DelegatorId,
        validator: &ValidatorId,
    ) -> Result<TokenAmount> {
        let paid = self.atomic(|ctx| {
            let height = ctx.height;
            let paid = ctx.withdrawals().withdraw_single(delegator, validator, height)?;
            ctx.store.remove_delegation(delegator, validator)?;
            Ok(paid)
        })?;
        tracing::debug!(%delegator, %validator, "delegation record removed");
        Ok(paid)
    }

    fn before_validator_slashed(
        &mut self,
        validator: &ValidatorId,
        fraction: &Dec,
    ) -> Result<TokenAmount> {
        if !fraction.is_unit_interval() {
            return Err(DistributionError::InvalidRate(fraction.clone()));
        }
        let (paid, settled) = self.atomic(|ctx| {
            validator::load(&*ctx.store, validator)?;
            let height = ctx.height;
            let records = ctx.store.delegations_of_validator(validator)?;
            let mut withdrawals = ctx.withdrawals();
            let mut paid: TokenAmount = 0;
            for record in &records {
                let amount = withdrawals.withdraw_single(&record.delegator_id, validator, height)?;
                paid = paid.checked_add(amount).ok_or_else(|| {
                    DistributionError::Overflow(format!("slash settlement of {validator}"))
                })?;
            }
            Ok((paid, records.len()))
        })?;
        tracing::warn!(
            %validator,
            %fraction,
            delegations = settled,
            paid,
            "delegations settled before slash"
        );
        Ok(paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memstore::MemStore;
    use crate::params::DistributionParams;
    use crate::testing::{MockBank, MockStaking};
    use tally_types::AccountId;

    fn dec(s: &str) -> Dec {
        s.parse().expect("dec")
    }

    const D1: DelegatorId = AccountId([1; 32]);
    const D2: DelegatorId = AccountId([2; 32]);
    const V: ValidatorId = ValidatorId([7; 32]);

    fn setup() -> Distribution<MemStore, MockStaking, MockBank> {
        let mut staking = MockStaking::new();
        staking.set_shares(D1, V, dec("30"));
        staking.set_shares(D2, V, dec("70"));
        let mut dist = Distribution::new(
            MemStore::with_empty_pool(),
            staking,
            MockBank::new(),
            DistributionParams::default(),
        )
        .expect("distribution");
        dist.after_validator_created(&V).expect("validator");
        dist.after_delegation_created(&D1, &V).expect("d1");
        dist.after_delegation_created(&D2, &V).expect("d2");
        dist
    }

    #[test]
    fn test_duplicate_registration_is_fatal() {
        let mut dist = setup();
        let err = dist.after_validator_created(&V).expect_err("duplicate");
        assert!(matches!(err, DistributionError::AlreadyRegistered(_)));
        assert!(err.is_fatal());
        assert!(dist.after_delegation_created(&D1, &V).is_err());
    }

    #[test]
    fn test_delegation_created_late_snapshots_index() {
        let mut dist = setup();
        dist.allocate_block_reward(&V, &dec("100"), &Dec::zero(), &dec("100"))
            .expect("allocate");

        let late = AccountId::new([3; 32]);
        dist.after_delegation_created(&late, &V).expect("late");
        let record = dist.delegation_record(&late, &V).expect("read").expect("record");
        assert_eq!(record.index_snapshot, Dec::one());
    }

    #[test]
    fn test_shares_modified_pays_at_old_count() {
        let mut dist = setup();
        dist.allocate_block_reward(&V, &dec("100"), &Dec::zero(), &dec("100"))
            .expect("allocate");

        assert_eq!(dist.before_delegation_shares_modified(&D1, &V).expect("hook"), 30);
        dist.staking_mut().set_shares(D1, V, dec("60"));
        assert!(dist.pending_rewards(&D1, &V).expect("pending").is_zero());
    }

    #[test]
    fn test_delegation_removed_deletes_record() {
        let mut dist = setup();
        dist.allocate_block_reward(&V, &dec("10"), &Dec::zero(), &dec("100"))
            .expect("allocate");

        assert_eq!(dist.before_delegation_removed(&D2, &V).expect("hook"), 7);
        assert!(dist.delegation_record(&D2, &V).expect("read").is_none());
        assert_eq!(dist.bank().balance(&D2), 7);
    }

    #[test]
    fn test_slash_settles_every_delegation() {
        let mut dist = setup();
        dist.allocate_block_reward(&V, &dec("100"), &Dec::zero(), &dec("100"))
            .expect("allocate");

        assert_eq!(dist.before_validator_slashed(&V, &dec("0.5")).expect("slash"), 100);
        dist.staking_mut().scale_validator(&V, &dec("0.5"));

        let record = dist.validator_record(&V).expect("read").expect("record");
        assert_eq!(record.reward_index, Dec::one());
        assert!(dist.pending_rewards_all(&D1).expect("pending").is_zero());
        assert!(dist.pending_rewards_all(&D2).expect("pending").is_zero());
    }

    #[test]
    fn test_slash_fraction_validated() {
        let mut dist = setup();
        assert!(matches!(
            dist.before_validator_slashed(&V, &dec("1.5")),
            Err(DistributionError::InvalidRate(_))
        ));
    }

    #[test]
    fn test_validator_removal_requires_no_delegations() {
        let mut dist = setup();
        dist.allocate_block_reward(&V, &dec("10.5"), &Dec::one(), &dec("100"))
            .expect("allocate");

        let err = dist.after_validator_removed(&V).expect_err("still delegated");
        assert!(matches!(
            err,
            DistributionError::ValidatorHasDelegations { remaining: 2, .. }
        ));

        dist.before_delegation_removed(&D1, &V).expect("d1");
        dist.before_delegation_removed(&D2, &V).expect("d2");
        assert_eq!(dist.after_validator_removed(&V).expect("remove"), 10);
        assert!(dist.validator_record(&V).expect("read").is_none());
        assert_eq!(dist.bank().balance(&V.operator()), 10);
        assert_eq!(dist.fee_pool().expect("pool").community_pool, dec("0.5"));
    }
}
