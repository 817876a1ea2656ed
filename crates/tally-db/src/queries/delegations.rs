//! Delegation distribution records.

use rusqlite::{Connection, OptionalExtension};
use tally_distribution::delegation::DelegationDistInfo;
use tally_types::{DelegatorId, ValidatorId};

use super::{height_from_sql, height_to_sql, parse_account_id, parse_dec, parse_validator_id};
use crate::Result;

const COLUMNS: &str = "delegator_id, validator_id, index_snapshot, settled_height";

/// Insert or replace a delegation record.
pub fn upsert(conn: &Connection, info: &DelegationDistInfo) -> Result<()> {
    let settled_height = height_to_sql("delegation_dist.settled_height", info.settled_height)?;
    conn.execute(
        "INSERT INTO delegation_dist (delegator_id, validator_id, index_snapshot, settled_height)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(delegator_id, validator_id) DO UPDATE SET
             index_snapshot = excluded.index_snapshot,
             settled_height = excluded.settled_height",
        rusqlite::params![
            info.delegator_id.as_bytes().as_slice(),
            info.validator_id.as_bytes().as_slice(),
            info.index_snapshot.to_string(),
            settled_height,
        ],
    )?;
    Ok(())
}

/// Get a delegation record.
pub fn get(
    conn: &Connection,
    delegator: &DelegatorId,
    validator: &ValidatorId,
) -> Result<Option<DelegationDistInfo>> {
    conn.query_row(
        &format!(
            "SELECT {COLUMNS} FROM delegation_dist WHERE delegator_id = ?1 AND validator_id = ?2"
        ),
        [delegator.as_bytes().as_slice(), validator.as_bytes().as_slice()],
        DelegationRow::from_row,
    )
    .optional()?
    .map(DelegationRow::into_info)
    .transpose()
}

/// Delete a delegation record.
pub fn remove(conn: &Connection, delegator: &DelegatorId, validator: &ValidatorId) -> Result<()> {
    conn.execute(
        "DELETE FROM delegation_dist WHERE delegator_id = ?1 AND validator_id = ?2",
        [delegator.as_bytes().as_slice(), validator.as_bytes().as_slice()],
    )?;
    Ok(())
}

/// Delegations of one validator, ordered by delegator.
pub fn list_for_validator(conn: &Connection, validator: &ValidatorId) -> Result<Vec<DelegationDistInfo>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM delegation_dist WHERE validator_id = ?1 ORDER BY delegator_id"
    ))?;
    let rows = stmt
        .query_map([validator.as_bytes().as_slice()], DelegationRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(DelegationRow::into_info).collect()
}

/// All delegations, ordered by (delegator, validator).
pub fn list(conn: &Connection) -> Result<Vec<DelegationDistInfo>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM delegation_dist ORDER BY delegator_id, validator_id"
    ))?;
    let rows = stmt
        .query_map([], DelegationRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(DelegationRow::into_info).collect()
}

/// A raw delegation row.
#[derive(Debug)]
struct DelegationRow {
    delegator_id: Vec<u8>,
    validator_id: Vec<u8>,
    index_snapshot: String,
    settled_height: i64,
}

impl DelegationRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            delegator_id: row.get(0)?,
            validator_id: row.get(1)?,
            index_snapshot: row.get(2)?,
            settled_height: row.get(3)?,
        })
    }

    fn into_info(self) -> Result<DelegationDistInfo> {
        Ok(DelegationDistInfo {
            delegator_id: parse_account_id("delegation_dist.delegator_id", &self.delegator_id)?,
            validator_id: parse_validator_id("delegation_dist.validator_id", &self.validator_id)?,
            index_snapshot: parse_dec("delegation_dist.index_snapshot", &self.index_snapshot)?,
            settled_height: height_from_sql("delegation_dist.settled_height", self.settled_height)?,
        })
    }
}
