//! # tally-types
//!
//! Shared domain types used across the Tally workspace.
//!
//! ## Modules
//!
//! - [`dec`] — Exact unbounded-precision decimal amounts
//! - [`ids`] — Account and validator identifiers

pub mod dec;
pub mod ids;

pub use dec::{Dec, DecError};
pub use ids::{AccountId, DelegatorId, ValidatorId};

/// Payable integer token amount handed to the bank.
pub type TokenAmount = u128;

/// Block height.
pub type Height = u64;

/// Length in bytes of every identifier.
pub const ID_LENGTH: usize = 32;
