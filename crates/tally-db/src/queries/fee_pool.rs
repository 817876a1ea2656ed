//! Fee pool singleton row.

use rusqlite::{Connection, OptionalExtension};
use tally_distribution::fee_pool::FeePool;

use super::parse_dec;
use crate::Result;

/// Read the fee pool, if initialised.
pub fn get(conn: &Connection) -> Result<Option<FeePool>> {
    let text: Option<String> = conn
        .query_row(
            "SELECT community_pool FROM fee_pool WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    match text {
        Some(t) => Ok(Some(FeePool {
            community_pool: parse_dec("fee_pool.community_pool", &t)?,
        })),
        None => Ok(None),
    }
}

/// Write the fee pool.
pub fn set(conn: &Connection, pool: &FeePool) -> Result<()> {
    conn.execute(
        "INSERT INTO fee_pool (id, community_pool) VALUES (1, ?1)
         ON CONFLICT(id) DO UPDATE SET community_pool = excluded.community_pool",
        [pool.community_pool.to_string()],
    )?;
    Ok(())
}
