//! In-memory [`DistributionStore`].

use std::collections::BTreeMap;

use tally_types::{AccountId, DelegatorId, ValidatorId};

use crate::delegation::DelegationDistInfo;
use crate::fee_pool::FeePool;
use crate::providers::DistributionStore;
use crate::validator::ValidatorDistInfo;
use crate::Result;

/// `BTreeMap`-backed store. Iteration order is key order, so every node
/// enumerates records identically.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemStore {
    fee_pool: Option<FeePool>,
    validators: BTreeMap<ValidatorId, ValidatorDistInfo>,
    delegations: BTreeMap<(DelegatorId, ValidatorId), DelegationDistInfo>,
    withdraw_addresses: BTreeMap<DelegatorId, AccountId>,
}

impl MemStore {
    /// An empty store with no fee pool slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store with a zeroed fee pool.
    pub fn with_empty_pool() -> Self {
        Self {
            fee_pool: Some(FeePool::new()),
            ..Self::default()
        }
    }
}

impl DistributionStore for MemStore {
    fn fee_pool(&self) -> Result<Option<FeePool>> {
        Ok(self.fee_pool.clone())
    }

    fn set_fee_pool(&mut self, pool: FeePool) -> Result<()> {
        self.fee_pool = Some(pool);
        Ok(())
    }

    fn validator(&self, validator: &ValidatorId) -> Result<Option<ValidatorDistInfo>> {
        Ok(self.validators.get(validator).cloned())
    }

    fn set_validator(&mut self, info: ValidatorDistInfo) -> Result<()> {
        self.validators.insert(info.validator_id, info);
        Ok(())
    }

    fn remove_validator(&mut self, validator: &ValidatorId) -> Result<()> {
        self.validators.remove(validator);
        Ok(())
    }

    fn validators(&self) -> Result<Vec<ValidatorDistInfo>> {
        Ok(self.validators.values().cloned().collect())
    }

    fn delegation(
        &self,
        delegator: &DelegatorId,
        validator: &ValidatorId,
    ) -> Result<Option<DelegationDistInfo>> {
        Ok(self.delegations.get(&(*delegator, *validator)).cloned())
    }

    fn set_delegation(&mut self, info: DelegationDistInfo) -> Result<()> {
        self.delegations
            .insert((info.delegator_id, info.validator_id), info);
        Ok(())
    }

    fn remove_delegation(&mut self, delegator: &DelegatorId, validator: &ValidatorId) -> Result<()> {
        self.delegations.remove(&(*delegator, *validator));
        Ok(())
    }

    fn delegations_of_validator(&self, validator: &ValidatorId) -> Result<Vec<DelegationDistInfo>> {
        Ok(self
            .delegations
            .values()
            .filter(|d| d.validator_id == *validator)
            .cloned()
            .collect())
    }

    fn delegations(&self) -> Result<Vec<DelegationDistInfo>> {
        Ok(self.delegations.values().cloned().collect())
    }

    fn withdraw_address(&self, delegator: &DelegatorId) -> Result<Option<AccountId>> {
        Ok(self.withdraw_addresses.get(delegator).copied())
    }

    fn set_withdraw_address(&mut self, delegator: DelegatorId, address: AccountId) -> Result<()> {
        self.withdraw_addresses.insert(delegator, address);
        Ok(())
    }

    fn remove_withdraw_address(&mut self, delegator: &DelegatorId) -> Result<()> {
        self.withdraw_addresses.remove(delegator);
        Ok(())
    }

    fn withdraw_addresses(&self) -> Result<Vec<(DelegatorId, AccountId)>> {
        Ok(self
            .withdraw_addresses
            .iter()
            .map(|(d, a)| (*d, *a))
            .collect())
    }
}
