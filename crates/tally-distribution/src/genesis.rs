//! Whole-module state import and export.
//!
//! A [`GenesisState`] carries the parameters, the fee pool and every record.
//! It is exchanged as JSON.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tally_types::{AccountId, DelegatorId};

use crate::delegation::DelegationDistInfo;
use crate::fee_pool::{self, FeePool};
use crate::params::DistributionParams;
use crate::providers::DistributionStore;
use crate::validator::ValidatorDistInfo;
use crate::{DistributionError, Result};

/// A custom withdraw address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawAddressEntry {
    pub delegator: DelegatorId,
    pub address: AccountId,
}

/// Exported distribution state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    #[serde(default)]
    pub params: DistributionParams,
    #[serde(default)]
    pub fee_pool: FeePool,
    #[serde(default)]
    pub validators: Vec<ValidatorDistInfo>,
    #[serde(default)]
    pub delegations: Vec<DelegationDistInfo>,
    #[serde(default)]
    pub withdraw_addresses: Vec<WithdrawAddressEntry>,
}

fn invalid(msg: String) -> DistributionError {
    DistributionError::InvalidGenesis(msg)
}

impl GenesisState {
    /// Check the state is internally consistent.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::InvalidParams`] if the parameters are invalid
    /// - [`DistributionError::InvalidGenesis`] describing the first bad record
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        self.fee_pool.ensure_valid().map_err(|e| invalid(e.to_string()))?;

        let mut validators = BTreeSet::new();
        for info in &self.validators {
            info.ensure_valid().map_err(|e| invalid(e.to_string()))?;
            if !validators.insert(info.validator_id) {
                return Err(invalid(format!("duplicate validator {}", info.validator_id)));
            }
        }

        let mut delegations = BTreeSet::new();
        for record in &self.delegations {
            let Some(validator) = self
                .validators
                .iter()
                .find(|v| v.validator_id == record.validator_id)
            else {
                return Err(invalid(format!(
                    "delegation {} -> {} references an unknown validator",
                    record.delegator_id, record.validator_id
                )));
            };
            if record.index_snapshot.is_negative() || record.index_snapshot > validator.reward_index {
                return Err(invalid(format!(
                    "delegation {} -> {} snapshot {} outside [0, {}]",
                    record.delegator_id,
                    record.validator_id,
                    record.index_snapshot,
                    validator.reward_index
                )));
            }
            if !delegations.insert((record.delegator_id, record.validator_id)) {
                return Err(invalid(format!(
                    "duplicate delegation {} -> {}",
                    record.delegator_id, record.validator_id
                )));
            }
        }

        let mut delegators = BTreeSet::new();
        for entry in &self.withdraw_addresses {
            if !delegators.insert(entry.delegator) {
                return Err(invalid(format!(
                    "duplicate withdraw address for {}",
                    entry.delegator
                )));
            }
        }
        Ok(())
    }

    /// Encode as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::InvalidGenesis`] if encoding fails
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| invalid(e.to_string()))
    }

    /// Decode and validate JSON.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::InvalidGenesis`] on malformed JSON or an invalid state
    pub fn from_json(json: &str) -> Result<Self> {
        let state: GenesisState = serde_json::from_str(json).map_err(|e| invalid(e.to_string()))?;
        state.validate()?;
        Ok(state)
    }
}

/// Write `state` into an empty store.
///
/// # Errors
///
/// - [`DistributionError::AlreadyRegistered`] if the store already holds a
///   fee pool or any record
/// - any error of [`GenesisState::validate`]
pub fn init<S: DistributionStore + ?Sized>(store: &mut S, state: &GenesisState) -> Result<()> {
    state.validate()?;
    if store.fee_pool()?.is_some()
        || !store.validators()?.is_empty()
        || !store.delegations()?.is_empty()
    {
        return Err(DistributionError::AlreadyRegistered(
            "distribution state already initialised".to_string(),
        ));
    }

    store.set_fee_pool(state.fee_pool.clone())?;
    for info in &state.validators {
        store.set_validator(info.clone())?;
    }
    for record in &state.delegations {
        store.set_delegation(record.clone())?;
    }
    for entry in &state.withdraw_addresses {
        store.set_withdraw_address(entry.delegator, entry.address)?;
    }

    tracing::info!(
        validators = state.validators.len(),
        delegations = state.delegations.len(),
        community_pool = %state.fee_pool.community_pool,
        "distribution genesis imported"
    );
    Ok(())
}

/// Read the whole state back out of `store`.
///
/// # Errors
///
/// - [`DistributionError::FeePoolMissing`] if the fee pool was never initialised
pub fn export<S: DistributionStore + ?Sized>(
    store: &S,
    params: &DistributionParams,
) -> Result<GenesisState> {
    let state = GenesisState {
        params: params.clone(),
        fee_pool: fee_pool::load(store)?,
        validators: store.validators()?,
        delegations: store.delegations()?,
        withdraw_addresses: store
            .withdraw_addresses()?
            .into_iter()
            .map(|(delegator, address)| WithdrawAddressEntry { delegator, address })
            .collect(),
    };
    tracing::info!(
        validators = state.validators.len(),
        delegations = state.delegations.len(),
        "distribution genesis exported"
    );
    Ok(state)
}
