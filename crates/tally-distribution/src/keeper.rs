//! The distribution facade.
//!
//! [`Distribution`] owns the store, the staking and bank collaborators, the
//! module parameters and the current block height. Every mutating operation
//! runs against a fresh [`CacheStore`] and buffers its bank credits. Once the
//! engines succeed, every recipient is checked with the bank, the cache is
//! committed, and only then are the credits paid. A rejected operation
//! therefore leaves both the store and the bank untouched.
//!
//! Wrap the store in an outer [`CacheStore`] (or a SQLite transaction) to
//! roll back a whole block.

use std::collections::BTreeMap;

use tally_types::{AccountId, Dec, DelegatorId, Height, TokenAmount, ValidatorId};

use crate::allocation::{BlockAllocation, BlockRewards, RewardAllocator};
use crate::cache::CacheStore;
use crate::delegation::DelegationDistInfo;
use crate::fee_pool::{self, FeePool};
use crate::genesis::{self, GenesisState};
use crate::invariants::{self, Holdings};
use crate::params::DistributionParams;
use crate::providers::{resolve_withdraw_address, BankProvider, DistributionStore, StakingProvider};
use crate::validator::{ValidatorAllocation, ValidatorDistInfo};
use crate::withdrawal::{self, WithdrawalEngine};
use crate::{DistributionError, Result};

/// Credits recorded during an operation, paid once it succeeds.
#[derive(Debug, Default)]
pub(crate) struct Payouts {
    credits: BTreeMap<AccountId, TokenAmount>,
}

impl Payouts {
    /// Check every recipient with the bank. Moves no tokens.
    fn verify<B: BankProvider + ?Sized>(&self, bank: &B) -> Result<()> {
        for account in self.credits.keys() {
            bank.ensure_account(account)?;
        }
        Ok(())
    }

    /// Pay every recipient. Runs after the store commit, so a refusal here
    /// means the bank broke its `ensure_account` promise.
    fn flush<B: BankProvider + ?Sized>(self, bank: &mut B) -> Result<()> {
        for (account, amount) in self.credits {
            bank.credit(&account, amount).map_err(|err| {
                DistributionError::InvariantViolation(format!(
                    "credit of {amount} to {account} failed after commit: {err}"
                ))
            })?;
        }
        Ok(())
    }
}

impl BankProvider for Payouts {
    fn ensure_account(&self, _account: &AccountId) -> Result<()> {
        Ok(())
    }

    fn credit(&mut self, account: &AccountId, amount: TokenAmount) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let pending = self.credits.entry(*account).or_default();
        *pending = pending
            .checked_add(amount)
            .ok_or_else(|| DistributionError::Overflow(format!("payout to {account}")))?;
        Ok(())
    }
}

/// Borrowed view handed to an atomic operation.
pub(crate) struct Ctx<'c, 'a, S: DistributionStore, K> {
    pub store: &'c mut CacheStore<'a, S>,
    pub staking: &'c K,
    pub payouts: &'c mut Payouts,
    pub params: &'c DistributionParams,
    pub height: Height,
}

impl<'c, 'a, S: DistributionStore, K: StakingProvider> Ctx<'c, 'a, S, K> {
    pub fn allocator(&mut self) -> RewardAllocator<'_, CacheStore<'a, S>, K, Payouts> {
        RewardAllocator::new(&mut *self.store, self.staking, &mut *self.payouts, self.params)
    }

    pub fn withdrawals(&mut self) -> WithdrawalEngine<'_, CacheStore<'a, S>, K, Payouts> {
        WithdrawalEngine::new(&mut *self.store, self.staking, &mut *self.payouts)
    }
}

/// Lazy reward distribution over a store and its collaborators.
pub struct Distribution<S, K, B> {
    store: S,
    staking: K,
    bank: B,
    params: DistributionParams,
    height: Height,
}

impl<S, K, B> Distribution<S, K, B>
where
    S: DistributionStore,
    K: StakingProvider,
    B: BankProvider,
{
    /// Build the facade.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::InvalidParams`] if `params` fail validation
    pub fn new(store: S, staking: K, bank: B, params: DistributionParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            store,
            staking,
            bank,
            params,
            height: 0,
        })
    }

    /// Set the height stamped on records written from now on.
    pub fn set_block_height(&mut self, height: Height) {
        self.height = height;
    }

    pub fn block_height(&self) -> Height {
        self.height
    }

    pub fn params(&self) -> &DistributionParams {
        &self.params
    }

    /// Replace the module parameters.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::InvalidParams`] if `params` fail validation
    pub fn set_params(&mut self, params: DistributionParams) -> Result<()> {
        params.validate()?;
        tracing::info!(
            community_tax = %params.community_tax,
            withdraw_addr_enabled = params.withdraw_addr_enabled,
            "distribution parameters updated"
        );
        self.params = params;
        Ok(())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn staking(&self) -> &K {
        &self.staking
    }

    /// Mutable staking access, for collaborators that live inside the facade.
    pub fn staking_mut(&mut self) -> &mut K {
        &mut self.staking
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    /// Take the facade apart, returning the store and collaborators.
    pub fn into_parts(self) -> (S, K, B) {
        (self.store, self.staking, self.bank)
    }

    /// Run `op` against a write buffer. Every recipient is checked with the
    /// bank before the store commits, and credits are paid only after the
    /// commit, so a failure at any step pays nobody.
    pub(crate) fn atomic<T, F>(&mut self, op: F) -> Result<T>
    where
        F: for<'c, 'a> FnOnce(&mut Ctx<'c, 'a, S, K>) -> Result<T>,
    {
        let mut cache = CacheStore::new(&mut self.store);
        let mut payouts = Payouts::default();
        let out = op(&mut Ctx {
            store: &mut cache,
            staking: &self.staking,
            payouts: &mut payouts,
            params: &self.params,
            height: self.height,
        })?;
        payouts.verify(&self.bank)?;
        cache.commit()?;
        payouts.flush(&mut self.bank)?;
        Ok(out)
    }

    /// Allocate a gross reward to one validator with an explicit commission
    /// rate and share total.
    ///
    /// # Errors
    ///
    /// See [`RewardAllocator::allocate_block_reward`].
    pub fn allocate_block_reward(
        &mut self,
        validator: &ValidatorId,
        gross_reward: &Dec,
        commission_rate: &Dec,
        total_delegator_shares: &Dec,
    ) -> Result<ValidatorAllocation> {
        self.atomic(|ctx| {
            let height = ctx.height;
            ctx.allocator().allocate_block_reward(
                validator,
                gross_reward,
                commission_rate,
                total_delegator_shares,
                height,
            )
        })
    }

    /// Allocate the previous block's fees.
    ///
    /// # Errors
    ///
    /// See [`RewardAllocator::allocate_block`].
    pub fn allocate_block(&mut self, rewards: &BlockRewards) -> Result<BlockAllocation> {
        self.atomic(|ctx| {
            let height = ctx.height;
            ctx.allocator().allocate_block(rewards, height)
        })
    }

    /// Withdraw one delegation's rewards.
    ///
    /// # Errors
    ///
    /// See [`WithdrawalEngine::withdraw_single`].
    pub fn withdraw_single(
        &mut self,
        delegator: &DelegatorId,
        validator: &ValidatorId,
    ) -> Result<TokenAmount> {
        self.atomic(|ctx| {
            let height = ctx.height;
            ctx.withdrawals().withdraw_single(delegator, validator, height)
        })
    }

    /// Withdraw the rewards of every delegation `delegator` holds.
    ///
    /// # Errors
    ///
    /// See [`WithdrawalEngine::withdraw_all`].
    pub fn withdraw_all(&mut self, delegator: &DelegatorId) -> Result<TokenAmount> {
        self.atomic(|ctx| {
            let height = ctx.height;
            ctx.withdrawals().withdraw_all(delegator, height)
        })
    }

    /// Pay out a validator's outstanding commission.
    ///
    /// # Errors
    ///
    /// See [`RewardAllocator::withdraw_validator_commission`].
    pub fn withdraw_validator_commission(&mut self, validator: &ValidatorId) -> Result<TokenAmount> {
        self.atomic(|ctx| ctx.allocator().withdraw_validator_commission(validator))
    }

    /// Redirect a delegator's future withdrawals to `address`.
    ///
    /// Setting the delegator's own account clears the custom address.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::WithdrawAddressDisabled`] if parameters disable it
    pub fn set_withdraw_address(&mut self, delegator: &DelegatorId, address: AccountId) -> Result<()> {
        if !self.params.withdraw_addr_enabled {
            return Err(DistributionError::WithdrawAddressDisabled);
        }
        self.atomic(|ctx| {
            if address == *delegator {
                ctx.store.remove_withdraw_address(delegator)
            } else {
                ctx.store.set_withdraw_address(*delegator, address)
            }
        })?;
        tracing::info!(%delegator, %address, "withdraw address set");
        Ok(())
    }

    /// Where `delegator`'s rewards are paid.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::Store`] if the store fails
    pub fn withdraw_address(&self, delegator: &DelegatorId) -> Result<AccountId> {
        resolve_withdraw_address(&self.store, delegator)
    }

    /// Exact reward one delegation could withdraw now.
    ///
    /// # Errors
    ///
    /// See [`withdrawal::pending_rewards`].
    pub fn pending_rewards(&self, delegator: &DelegatorId, validator: &ValidatorId) -> Result<Dec> {
        withdrawal::pending_rewards(&self.store, &self.staking, delegator, validator)
    }

    /// Exact reward across every delegation of `delegator`.
    ///
    /// # Errors
    ///
    /// See [`withdrawal::pending_rewards_all`].
    pub fn pending_rewards_all(&self, delegator: &DelegatorId) -> Result<Dec> {
        withdrawal::pending_rewards_all(&self.store, &self.staking, delegator)
    }

    /// Pay `amount` whole tokens from the community pool to `recipient`.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::InsufficientPool`] if the pool is too small
    /// - [`DistributionError::UnknownAccount`] if the bank rejects the credit
    pub fn spend_community_pool(&mut self, recipient: &AccountId, amount: TokenAmount) -> Result<()> {
        let spend = Dec::from_tokens(amount);
        self.atomic(|ctx| {
            fee_pool::update(&mut *ctx.store, |pool| pool.spend_collective(&spend))?;
            ctx.payouts.credit(recipient, amount)
        })?;
        tracing::info!(%recipient, amount, "community pool spend");
        Ok(())
    }

    /// The fee pool.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::FeePoolMissing`] if it was never initialised
    pub fn fee_pool(&self) -> Result<FeePool> {
        fee_pool::load(&self.store)
    }

    pub fn validator_record(&self, validator: &ValidatorId) -> Result<Option<ValidatorDistInfo>> {
        self.store.validator(validator)
    }

    pub fn delegation_record(
        &self,
        delegator: &DelegatorId,
        validator: &ValidatorId,
    ) -> Result<Option<DelegationDistInfo>> {
        self.store.delegation(delegator, validator)
    }

    /// Import a whole-module state into an empty store. The state's
    /// parameters replace the current ones.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::InvalidGenesis`] or [`DistributionError::InvalidParams`]
    ///   if the state fails validation
    /// - [`DistributionError::AlreadyRegistered`] if the store is not empty
    pub fn init_genesis(&mut self, state: &GenesisState) -> Result<()> {
        self.atomic(|ctx| genesis::init(&mut *ctx.store, state))?;
        self.params = state.params.clone();
        Ok(())
    }

    /// Export the whole-module state.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::FeePoolMissing`] if the fee pool was never initialised
    pub fn export_genesis(&self) -> Result<GenesisState> {
        genesis::export(&self.store, &self.params)
    }

    /// Audit the stored state.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::InvariantViolation`] describing the first broken invariant
    pub fn check_invariants(&self) -> Result<()> {
        invariants::check_invariants(&self.store)
    }

    /// Every unpaid reward, by where it sits.
    ///
    /// # Errors
    ///
    /// See [`invariants::holdings`].
    pub fn holdings(&self) -> Result<Holdings> {
        invariants::holdings(&self.store, &self.staking)
    }
}
