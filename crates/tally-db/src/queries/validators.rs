//! Validator distribution records.

use rusqlite::{Connection, OptionalExtension};
use tally_distribution::validator::ValidatorDistInfo;
use tally_types::ValidatorId;

use super::{height_from_sql, height_to_sql, parse_dec, parse_validator_id};
use crate::Result;

const COLUMNS: &str = "validator_id, reward_index, last_update_height, outstanding_commission";

/// Insert or replace a validator record.
pub fn upsert(conn: &Connection, info: &ValidatorDistInfo) -> Result<()> {
    let last_update_height =
        height_to_sql("validator_dist.last_update_height", info.last_update_height)?;
    conn.execute(
        "INSERT INTO validator_dist
             (validator_id, reward_index, last_update_height, outstanding_commission)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(validator_id) DO UPDATE SET
             reward_index = excluded.reward_index,
             last_update_height = excluded.last_update_height,
             outstanding_commission = excluded.outstanding_commission",
        rusqlite::params![
            info.validator_id.as_bytes().as_slice(),
            info.reward_index.to_string(),
            last_update_height,
            info.outstanding_commission.to_string(),
        ],
    )?;
    Ok(())
}

/// Get a validator record.
pub fn get(conn: &Connection, validator: &ValidatorId) -> Result<Option<ValidatorDistInfo>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM validator_dist WHERE validator_id = ?1"),
        [validator.as_bytes().as_slice()],
        ValidatorRow::from_row,
    )
    .optional()?
    .map(ValidatorRow::into_info)
    .transpose()
}

/// Delete a validator record.
pub fn remove(conn: &Connection, validator: &ValidatorId) -> Result<()> {
    conn.execute(
        "DELETE FROM validator_dist WHERE validator_id = ?1",
        [validator.as_bytes().as_slice()],
    )?;
    Ok(())
}

/// List all validator records, ordered by id.
pub fn list(conn: &Connection) -> Result<Vec<ValidatorDistInfo>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM validator_dist ORDER BY validator_id"
    ))?;
    let rows = stmt
        .query_map([], ValidatorRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(ValidatorRow::into_info).collect()
}

/// A raw validator row.
#[derive(Debug)]
struct ValidatorRow {
    validator_id: Vec<u8>,
    reward_index: String,
    last_update_height: i64,
    outstanding_commission: String,
}

impl ValidatorRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            validator_id: row.get(0)?,
            reward_index: row.get(1)?,
            last_update_height: row.get(2)?,
            outstanding_commission: row.get(3)?,
        })
    }

    fn into_info(self) -> Result<ValidatorDistInfo> {
        Ok(ValidatorDistInfo {
            validator_id: parse_validator_id("validator_dist.validator_id", &self.validator_id)?,
            reward_index: parse_dec("validator_dist.reward_index", &self.reward_index)?,
            last_update_height: height_from_sql(
                "validator_dist.last_update_height",
                self.last_update_height,
            )?,
            outstanding_commission: parse_dec(
                "validator_dist.outstanding_commission",
                &self.outstanding_commission,
            )?,
        })
    }
}
