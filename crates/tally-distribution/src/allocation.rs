//! Block reward allocation.
//!
//! [`RewardAllocator`] advances validator indices and commission, and is the
//! only writer of `reward_index` and `outstanding_commission`. Every
//! allocation is O(1) in the number of delegators.
//!
//! ## Block split
//!
//! For a block with fees `F`, signed power `p`, total power `P`:
//!
//! ```text
//! community tax   = F * community_tax
//! proposer        = F * (base_proposer_reward + bonus_proposer_reward * p / P)
//! signer i        = F * (1 - proposer multiplier - community_tax) * power_i / P
//! residue         = F - tax - proposer - sum(signer i)   -> community pool
//! ```

use serde::{Deserialize, Serialize};
use tally_types::{Dec, Height, TokenAmount, ValidatorId};

use crate::params::DistributionParams;
use crate::providers::{resolve_withdraw_address, BankProvider, DistributionStore, StakingProvider};
use crate::validator::ValidatorAllocation;
use crate::{fee_pool, validator, DistributionError, Result};

/// One validator's vote on the previous block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteInfo {
    pub validator: ValidatorId,
    /// Voting power at the previous block.
    pub power: u64,
    pub signed_last_block: bool,
}

/// Input to [`RewardAllocator::allocate_block`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRewards {
    /// Fees collected in the previous block.
    pub fees: Dec,
    /// Proposer of the previous block.
    pub proposer: ValidatorId,
    /// Every validator in the previous block's active set.
    pub votes: Vec<VoteInfo>,
}

/// What a block allocation did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockAllocation {
    /// Community tax sent to the pool.
    pub community_tax: Dec,
    /// Gross reward allocated to the proposer.
    pub proposer_reward: Dec,
    /// Gross reward allocated to each signer, in vote order.
    pub voter_rewards: Vec<(ValidatorId, Dec)>,
    /// Fees left after tax, proposer and signers, sent to the pool.
    pub residue: Dec,
    /// Delegator portions of share-less validators, sent to the pool.
    pub routed_to_pool: Dec,
    /// Commission added across every validator.
    pub commission: Dec,
}

impl BlockAllocation {
    /// Total added to the community pool.
    pub fn to_community_pool(&self) -> Dec {
        &self.community_tax + &self.residue + &self.routed_to_pool
    }
}

/// Writes reward events into validator records.
pub struct RewardAllocator<'a, S: ?Sized, K: ?Sized, B: ?Sized> {
    store: &'a mut S,
    staking: &'a K,
    bank: &'a mut B,
    params: &'a DistributionParams,
}

impl<'a, S, K, B> RewardAllocator<'a, S, K, B>
where
    S: DistributionStore + ?Sized,
    K: StakingProvider + ?Sized,
    B: BankProvider + ?Sized,
{
    pub fn new(
        store: &'a mut S,
        staking: &'a K,
        bank: &'a mut B,
        params: &'a DistributionParams,
    ) -> Self {
        Self {
            store,
            staking,
            bank,
            params,
        }
    }

    /// Allocate a gross reward to one validator.
    ///
    /// The commission cut accrues to the operator; the rest advances the
    /// reward index, or goes to the community pool when no shares exist.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::NegativeReward`], [`DistributionError::InvalidRate`]
    ///   or [`DistributionError::InvalidShares`] on bad input, before any write
    /// - [`DistributionError::ValidatorNotFound`] if the validator has no record
    pub fn allocate_block_reward(
        &mut self,
        validator: &ValidatorId,
        gross_reward: &Dec,
        commission_rate: &Dec,
        total_delegator_shares: &Dec,
        height: Height,
    ) -> Result<ValidatorAllocation> {
        let allocation = self.apply(
            validator,
            gross_reward,
            commission_rate,
            total_delegator_shares,
            height,
        )?;
        if !allocation.to_community_pool.is_zero() {
            fee_pool::update(&mut *self.store, |pool| {
                pool.add_collective_reward(&allocation.to_community_pool)
            })?;
            tracing::warn!(
                %validator,
                amount = %allocation.to_community_pool,
                "validator has no delegator shares, reward routed to community pool"
            );
        }
        Ok(allocation)
    }

    /// Split a block's fees between the community pool, the proposer and
    /// the validators that signed.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::NegativeReward`] if the fees are negative
    /// - [`DistributionError::InvalidParams`] if the parameters are invalid
    /// - [`DistributionError::ValidatorNotFound`] if a rewarded validator has no record
    pub fn allocate_block(
        &mut self,
        rewards: &BlockRewards,
        height: Height,
    ) -> Result<BlockAllocation> {
        if rewards.fees.is_negative() {
            return Err(DistributionError::NegativeReward(rewards.fees.clone()));
        }
        self.params.validate()?;

        let total_power: u128 = rewards.votes.iter().map(|v| u128::from(v.power)).sum();
        let signed_power: u128 = rewards
            .votes
            .iter()
            .filter(|v| v.signed_last_block)
            .map(|v| u128::from(v.power))
            .sum();
        let total_power = Dec::from_tokens(total_power);
        let fraction_votes = Dec::from_tokens(signed_power)
            .checked_div(&total_power)
            .unwrap_or_default();

        let fees = &rewards.fees;
        let community_tax = fees * &self.params.community_tax;
        let proposer_multiplier =
            &self.params.base_proposer_reward + &self.params.bonus_proposer_reward * &fraction_votes;
        let proposer_reward = fees * &proposer_multiplier;
        let voter_multiplier = Dec::one() - &proposer_multiplier - &self.params.community_tax;
        let voter_pool = fees * &voter_multiplier;

        let mut summary = BlockAllocation {
            community_tax,
            proposer_reward,
            ..BlockAllocation::default()
        };

        let proposer = self.apply_from_staking(&rewards.proposer, &summary.proposer_reward, height)?;
        summary.commission += &proposer.commission;
        summary.routed_to_pool += &proposer.to_community_pool;

        let mut distributed = Dec::zero();
        for vote in rewards.votes.iter().filter(|v| v.signed_last_block) {
            let Some(reward) = (&voter_pool * Dec::from_tokens(u128::from(vote.power)))
                .checked_div(&total_power)
            else {
                continue;
            };
            let outcome = self.apply_from_staking(&vote.validator, &reward, height)?;
            summary.commission += &outcome.commission;
            summary.routed_to_pool += &outcome.to_community_pool;
            distributed += &reward;
            summary.voter_rewards.push((vote.validator, reward));
        }

        summary.residue = fees - &summary.community_tax - &summary.proposer_reward - &distributed;
        if summary.residue.is_negative() {
            return Err(DistributionError::InvariantViolation(format!(
                "block allocation overspent fees by {}",
                -summary.residue.clone()
            )));
        }

        let to_pool = summary.to_community_pool();
        if !to_pool.is_zero() {
            fee_pool::update(&mut *self.store, |pool| pool.add_collective_reward(&to_pool))?;
        }

        tracing::debug!(
            height,
            fees = %fees,
            proposer = %rewards.proposer,
            %fraction_votes,
            signers = summary.voter_rewards.len(),
            to_community_pool = %to_pool,
            "block rewards allocated"
        );
        Ok(summary)
    }

    /// Pay out a validator's outstanding commission.
    ///
    /// The whole-token part goes to the operator's withdraw address, the
    /// fraction to the community pool. Returns 0 without writing anything
    /// when no commission is outstanding.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::ValidatorNotFound`] if the validator has no record
    /// - [`DistributionError::UnknownAccount`] if the bank rejects the credit
    pub fn withdraw_validator_commission(&mut self, validator: &ValidatorId) -> Result<TokenAmount> {
        let info = validator::load(&*self.store, validator)?;
        if info.outstanding_commission.is_zero() {
            return Ok(0);
        }

        let (record, commission) = info.take_commission();
        let (payable, dust) = commission.floor_split()?;
        if !dust.is_zero() {
            fee_pool::update(&mut *self.store, |pool| pool.add_rounding_remainder(&dust))?;
        }
        self.store.set_validator(record)?;

        let operator = validator.operator();
        if payable > 0 {
            let address = resolve_withdraw_address(&*self.store, &operator)?;
            self.bank.credit(&address, payable)?;
        }

        tracing::info!(
            %validator,
            amount = payable,
            %dust,
            "validator commission withdrawn"
        );
        Ok(payable)
    }

    /// Allocate using the staking module's commission rate and share total.
    fn apply_from_staking(
        &mut self,
        validator: &ValidatorId,
        gross_reward: &Dec,
        height: Height,
    ) -> Result<ValidatorAllocation> {
        let rate = self.staking.commission_rate(validator)?;
        let shares = self.staking.validator_share_total(validator)?;
        self.apply(validator, gross_reward, &rate, &shares, height)
    }

    /// Write the validator's new record. The caller settles the pool.
    fn apply(
        &mut self,
        validator: &ValidatorId,
        gross_reward: &Dec,
        commission_rate: &Dec,
        total_delegator_shares: &Dec,
        height: Height,
    ) -> Result<ValidatorAllocation> {
        let info = validator::load(&*self.store, validator)?;
        let allocation = info.allocate(gross_reward, commission_rate, total_delegator_shares, height)?;
        self.store.set_validator(allocation.record.clone())?;
        Ok(allocation)
    }
}
