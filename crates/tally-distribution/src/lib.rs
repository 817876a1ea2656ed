//! # tally-distribution
//!
//! Lazy staking-reward distribution.
//!
//! Each validator carries a cumulative reward-per-share index that advances in
//! O(1) per reward event. Each delegation carries a snapshot of that index
//! taken at its last settlement. A delegator's owed reward is
//! `(index - snapshot) * shares`, computed only when they withdraw, so no
//! operation ever iterates the delegator set of a validator on the block path.
//!
//! ## Modules
//!
//! - [`fee_pool`] — Community pool and rounding-dust sink
//! - [`validator`] — Per-validator reward index and commission
//! - [`delegation`] — Per-delegation snapshot and owed computation
//! - [`allocation`] — Block reward allocation
//! - [`withdrawal`] — Delegator reward withdrawal
//! - [`hooks`] — Staking notifications
//! - [`keeper`] — The [`Distribution`] facade offered to block processing
//! - [`providers`] — Collaborator traits (staking, bank, persistence)
//! - [`cache`] / [`memstore`] — Write-buffering overlay and in-memory store
//! - [`genesis`] / [`invariants`] — State import/export and audits
//! - [`params`] — Module parameters loaded from TOML
//! - `testing` — In-memory staking and bank collaborators (feature `testing`)

pub mod allocation;
pub mod cache;
pub mod delegation;
pub mod fee_pool;
pub mod genesis;
pub mod hooks;
pub mod invariants;
pub mod keeper;
pub mod memstore;
pub mod params;
pub mod providers;
pub mod validator;
pub mod withdrawal;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::CacheStore;
pub use hooks::StakingHooks;
pub use keeper::Distribution;
pub use memstore::MemStore;
pub use params::DistributionParams;
pub use providers::{BankProvider, DistributionStore, StakingProvider};

use tally_types::{AccountId, Dec, DelegatorId, ValidatorId};

/// How a caller should treat a [`DistributionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// State corruption or a broken caller contract. Block processing must halt.
    InvariantViolation,
    /// Bad input, rejected before any mutation.
    InputValidation,
    /// A recoverable shortage or missing external resource.
    Resource,
}

/// Error types for distribution operations.
#[derive(Debug, thiserror::Error)]
pub enum DistributionError {
    /// A delegation the staking module knows about has no distribution record.
    #[error("no distribution record for delegation {delegator} -> {validator}")]
    RecordNotFound {
        /// The delegator.
        delegator: DelegatorId,
        /// The validator.
        validator: ValidatorId,
    },

    /// A validator has no distribution record.
    #[error("no distribution record for validator {0}")]
    ValidatorNotFound(ValidatorId),

    /// The fee pool slot was never initialised.
    #[error("fee pool has not been initialised")]
    FeePoolMissing,

    /// A record was registered twice.
    #[error("duplicate registration: {0}")]
    AlreadyRegistered(String),

    /// A validator still has delegation records and cannot be removed.
    #[error("validator {validator} still has {remaining} delegation records")]
    ValidatorHasDelegations {
        /// The validator being removed.
        validator: ValidatorId,
        /// Number of delegation records left.
        remaining: usize,
    },

    /// Stored state contradicts an accounting invariant.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An amount does not fit in a payable token integer.
    #[error("amount overflow: {0}")]
    Overflow(String),

    /// The persistence collaborator failed.
    #[error("store error: {0}")]
    Store(String),

    /// Commission rate outside `[0, 1]`.
    #[error("commission rate {0} is outside [0, 1]")]
    InvalidRate(Dec),

    /// A reward or spend amount below zero.
    #[error("negative amount: {0}")]
    NegativeReward(Dec),

    /// A share count below zero.
    #[error("negative share count: {0}")]
    InvalidShares(Dec),

    /// Module parameters failed validation or could not be loaded.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// A genesis state failed validation or could not be decoded.
    #[error("invalid genesis: {0}")]
    InvalidGenesis(String),

    /// Custom withdraw addresses are disabled by parameters.
    #[error("setting a withdraw address is disabled")]
    WithdrawAddressDisabled,

    /// A spend exceeds the community pool.
    #[error("insufficient community pool: have {available}, need {requested}")]
    InsufficientPool {
        /// Pool balance.
        available: Dec,
        /// Requested spend.
        requested: Dec,
    },

    /// The bank does not know the destination account.
    #[error("unknown account {0}")]
    UnknownAccount(AccountId),
}

impl DistributionError {
    /// Classify the fault for the block-processing layer.
    pub fn class(&self) -> FaultClass {
        match self {
            Self::RecordNotFound { .. }
            | Self::ValidatorNotFound(_)
            | Self::FeePoolMissing
            | Self::AlreadyRegistered(_)
            | Self::ValidatorHasDelegations { .. }
            | Self::InvariantViolation(_)
            | Self::Overflow(_)
            | Self::Store(_) => FaultClass::InvariantViolation,
            Self::InvalidRate(_)
            | Self::NegativeReward(_)
            | Self::InvalidShares(_)
            | Self::InvalidParams(_)
            | Self::InvalidGenesis(_)
            | Self::WithdrawAddressDisabled => FaultClass::InputValidation,
            Self::InsufficientPool { .. } | Self::UnknownAccount(_) => FaultClass::Resource,
        }
    }

    /// Returns `true` when block processing must halt.
    pub fn is_fatal(&self) -> bool {
        self.class() == FaultClass::InvariantViolation
    }
}

impl From<tally_types::DecError> for DistributionError {
    fn from(err: tally_types::DecError) -> Self {
        Self::Overflow(err.to_string())
    }
}

/// Convenience result type for distribution operations.
pub type Result<T> = std::result::Result<T, DistributionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_classes() {
        let v = ValidatorId::new([1; 32]);
        let d = AccountId::new([2; 32]);
        assert!(DistributionError::RecordNotFound { delegator: d, validator: v }.is_fatal());
        assert!(DistributionError::FeePoolMissing.is_fatal());
        assert_eq!(
            DistributionError::InvalidRate(Dec::from_integer(2)).class(),
            FaultClass::InputValidation
        );
        assert_eq!(
            DistributionError::UnknownAccount(d).class(),
            FaultClass::Resource
        );
        assert!(!DistributionError::InsufficientPool {
            available: Dec::zero(),
            requested: Dec::one(),
        }
        .is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = DistributionError::InvalidRate("1.5".parse().expect("dec"));
        assert_eq!(err.to_string(), "commission rate 1.5 is outside [0, 1]");
    }
}
