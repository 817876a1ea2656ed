//! Integration test crate for tally.
//!
//! Library code here is limited to fixtures shared by the end-to-end tests
//! under `tests/`: a tracing subscriber and a small chain setup over the
//! in-memory collaborators.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p tally-integration-tests
//! ```

use tally_distribution::testing::{MockBank, MockStaking};
use tally_distribution::{
    Distribution, DistributionParams, DistributionStore, MemStore, Result, StakingHooks,
};
use tally_types::{AccountId, Dec, ValidatorId};

/// Install a `tracing` subscriber honouring `RUST_LOG`. Safe to call from
/// every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn validator(byte: u8) -> ValidatorId {
    ValidatorId::new([byte; 32])
}

pub fn account(byte: u8) -> AccountId {
    AccountId::new([byte; 32])
}

/// One delegation in a chain setup.
#[derive(Clone, Debug)]
pub struct Stake {
    pub delegator: AccountId,
    pub validator: ValidatorId,
    pub shares: Dec,
}

/// Register `validators` and `stakes` with the staking mock and through the
/// hooks, the way the staking module would at chain start.
pub fn bootstrap<S: DistributionStore>(
    store: S,
    validators: &[(ValidatorId, Dec)],
    stakes: &[Stake],
    params: DistributionParams,
) -> Result<Distribution<S, MockStaking, MockBank>> {
    let mut staking = MockStaking::new();
    for (v, rate) in validators {
        staking.set_commission(*v, rate.clone());
    }
    for stake in stakes {
        staking.set_shares(stake.delegator, stake.validator, stake.shares.clone());
    }

    let mut dist = Distribution::new(store, staking, MockBank::new(), params)?;
    for (v, _) in validators {
        dist.after_validator_created(v)?;
    }
    for stake in stakes {
        dist.after_delegation_created(&stake.delegator, &stake.validator)?;
    }
    Ok(dist)
}

/// [`bootstrap`] over a fresh [`MemStore`].
pub fn bootstrap_memory(
    validators: &[(ValidatorId, Dec)],
    stakes: &[Stake],
) -> Result<Distribution<MemStore, MockStaking, MockBank>> {
    bootstrap(
        MemStore::with_empty_pool(),
        validators,
        stakes,
        DistributionParams::default(),
    )
}
