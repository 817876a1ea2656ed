//! Custom withdraw addresses.

use rusqlite::{Connection, OptionalExtension};
use tally_types::{AccountId, DelegatorId};

use super::parse_account_id;
use crate::Result;

/// Get a delegator's custom withdraw address.
pub fn get(conn: &Connection, delegator: &DelegatorId) -> Result<Option<AccountId>> {
    let bytes: Option<Vec<u8>> = conn
        .query_row(
            "SELECT address FROM withdraw_addresses WHERE delegator_id = ?1",
            [delegator.as_bytes().as_slice()],
            |row| row.get(0),
        )
        .optional()?;
    match bytes {
        Some(b) => Ok(Some(parse_account_id("withdraw_addresses.address", &b)?)),
        None => Ok(None),
    }
}

/// Set a delegator's custom withdraw address.
pub fn set(conn: &Connection, delegator: &DelegatorId, address: &AccountId) -> Result<()> {
    conn.execute(
        "INSERT INTO withdraw_addresses (delegator_id, address) VALUES (?1, ?2)
         ON CONFLICT(delegator_id) DO UPDATE SET address = excluded.address",
        [delegator.as_bytes().as_slice(), address.as_bytes().as_slice()],
    )?;
    Ok(())
}

/// Clear a delegator's custom withdraw address.
pub fn remove(conn: &Connection, delegator: &DelegatorId) -> Result<()> {
    conn.execute(
        "DELETE FROM withdraw_addresses WHERE delegator_id = ?1",
        [delegator.as_bytes().as_slice()],
    )?;
    Ok(())
}

/// List all custom withdraw addresses, ordered by delegator.
pub fn list(conn: &Connection) -> Result<Vec<(DelegatorId, AccountId)>> {
    let mut stmt =
        conn.prepare("SELECT delegator_id, address FROM withdraw_addresses ORDER BY delegator_id")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(d, a)| -> Result<(DelegatorId, AccountId)> {
            Ok((
                parse_account_id("withdraw_addresses.delegator_id", &d)?,
                parse_account_id("withdraw_addresses.address", &a)?,
            ))
        })
        .collect()
}
