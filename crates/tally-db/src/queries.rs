//! Query functions, one module per table.

pub mod delegations;
pub mod fee_pool;
pub mod validators;
pub mod withdraw_addresses;

use tally_types::{AccountId, Dec, Height, ValidatorId};

use crate::{DbError, Result};

pub(crate) fn parse_dec(column: &'static str, text: &str) -> Result<Dec> {
    text.parse().map_err(|e: tally_types::DecError| DbError::Corrupt {
        column,
        reason: e.to_string(),
    })
}

pub(crate) fn parse_validator_id(column: &'static str, bytes: &[u8]) -> Result<ValidatorId> {
    ValidatorId::from_slice(bytes).ok_or_else(|| DbError::Corrupt {
        column,
        reason: format!("expected 32 bytes, got {}", bytes.len()),
    })
}

pub(crate) fn parse_account_id(column: &'static str, bytes: &[u8]) -> Result<AccountId> {
    AccountId::from_slice(bytes).ok_or_else(|| DbError::Corrupt {
        column,
        reason: format!("expected 32 bytes, got {}", bytes.len()),
    })
}

/// Heights are stored as SQLite INTEGER, which is signed 64-bit.
pub(crate) fn height_to_sql(column: &'static str, height: Height) -> Result<i64> {
    i64::try_from(height).map_err(|_| DbError::Corrupt {
        column,
        reason: format!("height {height} exceeds the INTEGER range"),
    })
}

pub(crate) fn height_from_sql(column: &'static str, value: i64) -> Result<Height> {
    Height::try_from(value).map_err(|_| DbError::Corrupt {
        column,
        reason: format!("negative height {value}"),
    })
}
