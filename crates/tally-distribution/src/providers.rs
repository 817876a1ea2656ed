//! Collaborator traits.
//!
//! The distribution engine never reaches for global state. Staking data, token
//! crediting and persistence are injected through these traits.

use tally_types::{AccountId, Dec, DelegatorId, TokenAmount, ValidatorId};

use crate::delegation::DelegationDistInfo;
use crate::fee_pool::FeePool;
use crate::validator::ValidatorDistInfo;
use crate::Result;

/// Read access to the staking module.
pub trait StakingProvider {
    /// Total delegator shares issued by `validator`.
    fn validator_share_total(&self, validator: &ValidatorId) -> Result<Dec>;

    /// Shares `delegator` holds with `validator`; zero when there is no delegation.
    fn delegator_shares(&self, delegator: &DelegatorId, validator: &ValidatorId) -> Result<Dec>;

    /// Every validator `delegator` currently delegates to. Each call performs
    /// a fresh enumeration.
    fn delegations(&self, delegator: &DelegatorId) -> Result<Vec<ValidatorId>>;

    /// Commission rate of `validator`, in `[0, 1]`.
    fn commission_rate(&self, validator: &ValidatorId) -> Result<Dec>;
}

/// Token crediting owned by the bank module.
///
/// The engine calls [`BankProvider::ensure_account`] for every recipient of an
/// operation before crediting any of them. A credit to an account that passed
/// the check must not fail.
pub trait BankProvider {
    /// Fail with [`crate::DistributionError::UnknownAccount`] unless `account`
    /// can receive credits. Never moves tokens.
    fn ensure_account(&self, account: &AccountId) -> Result<()>;

    /// Credit `amount` whole tokens to `account`.
    ///
    /// Fails with [`crate::DistributionError::UnknownAccount`] if the account
    /// does not exist.
    fn credit(&mut self, account: &AccountId, amount: TokenAmount) -> Result<()>;
}

/// Durable storage for distribution records.
///
/// Reads return `Ok(None)` for absent keys; interpreting an absence as a fault
/// is the engine's job. Enumerations are ordered by key.
pub trait DistributionStore {
    /// Read the fee pool slot.
    fn fee_pool(&self) -> Result<Option<FeePool>>;

    /// Write the fee pool slot.
    fn set_fee_pool(&mut self, pool: FeePool) -> Result<()>;

    /// Read a validator record.
    fn validator(&self, validator: &ValidatorId) -> Result<Option<ValidatorDistInfo>>;

    /// Write a validator record.
    fn set_validator(&mut self, info: ValidatorDistInfo) -> Result<()>;

    /// Delete a validator record.
    fn remove_validator(&mut self, validator: &ValidatorId) -> Result<()>;

    /// All validator records, ordered by validator id.
    fn validators(&self) -> Result<Vec<ValidatorDistInfo>>;

    /// Read a delegation record.
    fn delegation(
        &self,
        delegator: &DelegatorId,
        validator: &ValidatorId,
    ) -> Result<Option<DelegationDistInfo>>;

    /// Write a delegation record.
    fn set_delegation(&mut self, info: DelegationDistInfo) -> Result<()>;

    /// Delete a delegation record.
    fn remove_delegation(&mut self, delegator: &DelegatorId, validator: &ValidatorId)
        -> Result<()>;

    /// Delegation records of one validator, ordered by delegator id.
    fn delegations_of_validator(&self, validator: &ValidatorId) -> Result<Vec<DelegationDistInfo>>;

    /// All delegation records, ordered by (delegator, validator).
    fn delegations(&self) -> Result<Vec<DelegationDistInfo>>;

    /// Read a delegator's custom withdraw address.
    fn withdraw_address(&self, delegator: &DelegatorId) -> Result<Option<AccountId>>;

    /// Write a delegator's custom withdraw address.
    fn set_withdraw_address(&mut self, delegator: DelegatorId, address: AccountId) -> Result<()>;

    /// Clear a delegator's custom withdraw address.
    fn remove_withdraw_address(&mut self, delegator: &DelegatorId) -> Result<()>;

    /// All custom withdraw addresses, ordered by delegator id.
    fn withdraw_addresses(&self) -> Result<Vec<(DelegatorId, AccountId)>>;
}

/// Where rewards for `delegator` are paid: the custom withdraw address if
/// one is set, otherwise the delegator's own account.
pub fn resolve_withdraw_address<S: DistributionStore + ?Sized>(
    store: &S,
    delegator: &DelegatorId,
) -> Result<AccountId> {
    Ok(store.withdraw_address(delegator)?.unwrap_or(*delegator))
}

impl<T: StakingProvider + ?Sized> StakingProvider for &T {
    fn validator_share_total(&self, validator: &ValidatorId) -> Result<Dec> {
        (**self).validator_share_total(validator)
    }

    fn delegator_shares(&self, delegator: &DelegatorId, validator: &ValidatorId) -> Result<Dec> {
        (**self).delegator_shares(delegator, validator)
    }

    fn delegations(&self, delegator: &DelegatorId) -> Result<Vec<ValidatorId>> {
        (**self).delegations(delegator)
    }

    fn commission_rate(&self, validator: &ValidatorId) -> Result<Dec> {
        (**self).commission_rate(validator)
    }
}

impl<T: BankProvider + ?Sized> BankProvider for &mut T {
    fn ensure_account(&self, account: &AccountId) -> Result<()> {
        (**self).ensure_account(account)
    }

    fn credit(&mut self, account: &AccountId, amount: TokenAmount) -> Result<()> {
        (**self).credit(account, amount)
    }
}

impl<T: DistributionStore + ?Sized> DistributionStore for &mut T {
    fn fee_pool(&self) -> Result<Option<FeePool>> {
        (**self).fee_pool()
    }

    fn set_fee_pool(&mut self, pool: FeePool) -> Result<()> {
        (**self).set_fee_pool(pool)
    }

    fn validator(&self, validator: &ValidatorId) -> Result<Option<ValidatorDistInfo>> {
        (**self).validator(validator)
    }

    fn set_validator(&mut self, info: ValidatorDistInfo) -> Result<()> {
        (**self).set_validator(info)
    }

    fn remove_validator(&mut self, validator: &ValidatorId) -> Result<()> {
        (**self).remove_validator(validator)
    }

    fn validators(&self) -> Result<Vec<ValidatorDistInfo>> {
        (**self).validators()
    }

    fn delegation(
        &self,
        delegator: &DelegatorId,
        validator: &ValidatorId,
    ) -> Result<Option<DelegationDistInfo>> {
        (**self).delegation(delegator, validator)
    }

    fn set_delegation(&mut self, info: DelegationDistInfo) -> Result<()> {
        (**self).set_delegation(info)
    }

    fn remove_delegation(&mut self, delegator: &DelegatorId, validator: &ValidatorId) -> Result<()> {
        (**self).remove_delegation(delegator, validator)
    }

    fn delegations_of_validator(&self, validator: &ValidatorId) -> Result<Vec<DelegationDistInfo>> {
        (**self).delegations_of_validator(validator)
    }

    fn delegations(&self) -> Result<Vec<DelegationDistInfo>> {
        (**self).delegations()
    }

    fn withdraw_address(&self, delegator: &DelegatorId) -> Result<Option<AccountId>> {
        (**self).withdraw_address(delegator)
    }

    fn set_withdraw_address(&mut self, delegator: DelegatorId, address: AccountId) -> Result<()> {
        (**self).set_withdraw_address(delegator, address)
    }

    fn remove_withdraw_address(&mut self, delegator: &DelegatorId) -> Result<()> {
        (**self).remove_withdraw_address(delegator)
    }

    fn withdraw_addresses(&self) -> Result<Vec<(DelegatorId, AccountId)>> {
        (**self).withdraw_addresses()
    }
}
