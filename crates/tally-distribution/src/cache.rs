//! Write-buffering store overlay.
//!
//! A [`CacheStore`] reads through to its parent and keeps every write in
//! memory until [`CacheStore::commit`]. Dropping it (or calling
//! [`CacheStore::discard`]) throws the writes away, leaving the parent
//! untouched. The [`crate::Distribution`] facade runs each operation inside one,
//! and block processing can wrap a whole block in another.

use std::collections::BTreeMap;

use tally_types::{AccountId, DelegatorId, ValidatorId};

use crate::delegation::DelegationDistInfo;
use crate::fee_pool::FeePool;
use crate::providers::DistributionStore;
use crate::validator::ValidatorDistInfo;
use crate::Result;

/// Pending writes; `None` marks a deletion.
type Overlay<K, V> = BTreeMap<K, Option<V>>;

/// Buffered view over a parent store.
pub struct CacheStore<'a, S: DistributionStore + ?Sized> {
    parent: &'a mut S,
    fee_pool: Option<FeePool>,
    validators: Overlay<ValidatorId, ValidatorDistInfo>,
    delegations: Overlay<(DelegatorId, ValidatorId), DelegationDistInfo>,
    withdraw_addresses: Overlay<DelegatorId, AccountId>,
}

impl<'a, S: DistributionStore + ?Sized> CacheStore<'a, S> {
    /// Start buffering writes over `parent`.
    pub fn new(parent: &'a mut S) -> Self {
        Self {
            parent,
            fee_pool: None,
            validators: BTreeMap::new(),
            delegations: BTreeMap::new(),
            withdraw_addresses: BTreeMap::new(),
        }
    }

    /// Number of buffered writes.
    pub fn pending_writes(&self) -> usize {
        usize::from(self.fee_pool.is_some())
            + self.validators.len()
            + self.delegations.len()
            + self.withdraw_addresses.len()
    }

    /// Flush every buffered write to the parent, in key order. Validator
    /// deletions are applied after every delegation write.
    pub fn commit(self) -> Result<()> {
        let writes = self.pending_writes();
        let Self {
            parent,
            fee_pool,
            validators,
            delegations,
            withdraw_addresses,
        } = self;

        if let Some(pool) = fee_pool {
            parent.set_fee_pool(pool)?;
        }
        let mut removed_validators = Vec::new();
        for (id, entry) in validators {
            match entry {
                Some(info) => parent.set_validator(info)?,
                None => removed_validators.push(id),
            }
        }
        for ((delegator, validator), entry) in delegations {
            match entry {
                Some(info) => parent.set_delegation(info)?,
                None => parent.remove_delegation(&delegator, &validator)?,
            }
        }
        for id in &removed_validators {
            parent.remove_validator(id)?;
        }
        for (delegator, entry) in withdraw_addresses {
            match entry {
                Some(address) => parent.set_withdraw_address(delegator, address)?,
                None => parent.remove_withdraw_address(&delegator)?,
            }
        }

        tracing::trace!(writes, "cache committed");
        Ok(())
    }

    /// Drop every buffered write.
    pub fn discard(self) {
        tracing::trace!(writes = self.pending_writes(), "cache discarded");
    }
}

/// Merge a parent listing with overlay entries, ordered by key.
fn merge<K: Ord + Clone, V: Clone>(
    base: impl IntoIterator<Item = (K, V)>,
    overlay: impl Iterator<Item = (K, Option<V>)>,
) -> Vec<V> {
    let mut merged: BTreeMap<K, V> = base.into_iter().collect();
    for (key, entry) in overlay {
        match entry {
            Some(value) => {
                merged.insert(key, value);
            }
            None => {
                merged.remove(&key);
            }
        }
    }
    merged.into_values().collect()
}

impl<'a, S: DistributionStore + ?Sized> DistributionStore for CacheStore<'a, S> {
    fn fee_pool(&self) -> Result<Option<FeePool>> {
        match &self.fee_pool {
            Some(pool) => Ok(Some(pool.clone())),
            None => self.parent.fee_pool(),
        }
    }

    fn set_fee_pool(&mut self, pool: FeePool) -> Result<()> {
        self.fee_pool = Some(pool);
        Ok(())
    }

    fn validator(&self, validator: &ValidatorId) -> Result<Option<ValidatorDistInfo>> {
        match self.validators.get(validator) {
            Some(entry) => Ok(entry.clone()),
            None => self.parent.validator(validator),
        }
    }

    fn set_validator(&mut self, info: ValidatorDistInfo) -> Result<()> {
        self.validators.insert(info.validator_id, Some(info));
        Ok(())
    }

    fn remove_validator(&mut self, validator: &ValidatorId) -> Result<()> {
        self.validators.insert(*validator, None);
        Ok(())
    }

    fn validators(&self) -> Result<Vec<ValidatorDistInfo>> {
        let base = self
            .parent
            .validators()?
            .into_iter()
            .map(|v| (v.validator_id, v));
        let overlay = self.validators.iter().map(|(k, v)| (*k, v.clone()));
        Ok(merge(base, overlay))
    }

    fn delegation(
        &self,
        delegator: &DelegatorId,
        validator: &ValidatorId,
    ) -> Result<Option<DelegationDistInfo>> {
        match self.delegations.get(&(*delegator, *validator)) {
            Some(entry) => Ok(entry.clone()),
            None => self.parent.delegation(delegator, validator),
        }
    }

    fn set_delegation(&mut self, info: DelegationDistInfo) -> Result<()> {
        self.delegations
            .insert((info.delegator_id, info.validator_id), Some(info));
        Ok(())
    }

    fn remove_delegation(&mut self, delegator: &DelegatorId, validator: &ValidatorId) -> Result<()> {
        self.delegations.insert((*delegator, *validator), None);
        Ok(())
    }

    fn delegations_of_validator(&self, validator: &ValidatorId) -> Result<Vec<DelegationDistInfo>> {
        let base = self
            .parent
            .delegations_of_validator(validator)?
            .into_iter()
            .map(|d| (d.delegator_id, d));
        let overlay = self
            .delegations
            .iter()
            .filter(|((_, v), _)| v == validator)
            .map(|((d, _), entry)| (*d, entry.clone()));
        Ok(merge(base, overlay))
    }

    fn delegations(&self) -> Result<Vec<DelegationDistInfo>> {
        let base = self
            .parent
            .delegations()?
            .into_iter()
            .map(|d| ((d.delegator_id, d.validator_id), d));
        let overlay = self.delegations.iter().map(|(k, v)| (*k, v.clone()));
        Ok(merge(base, overlay))
    }

    fn withdraw_address(&self, delegator: &DelegatorId) -> Result<Option<AccountId>> {
        match self.withdraw_addresses.get(delegator) {
            Some(entry) => Ok(*entry),
            None => self.parent.withdraw_address(delegator),
        }
    }

    fn set_withdraw_address(&mut self, delegator: DelegatorId, address: AccountId) -> Result<()> {
        self.withdraw_addresses.insert(delegator, Some(address));
        Ok(())
    }

    fn remove_withdraw_address(&mut self, delegator: &DelegatorId) -> Result<()> {
        self.withdraw_addresses.insert(*delegator, None);
        Ok(())
    }

    fn withdraw_addresses(&self) -> Result<Vec<(DelegatorId, AccountId)>> {
        let base = self
            .parent
            .withdraw_addresses()?
            .into_iter()
            .map(|(d, a)| (d, (d, a)));
        let overlay = self
            .withdraw_addresses
            .iter()
            .map(|(d, a)| (*d, (*a).map(|a| (*d, a))));
        Ok(merge(base, overlay))
    }
}
