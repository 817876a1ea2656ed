//! Database migration system.
//!
//! Schema version stored in `PRAGMA user_version`. Migrations are
//! forward-only.

use rusqlite::Connection;

use crate::{schema, DbError, Result, SCHEMA_VERSION};

/// Run all pending migrations.
pub fn run(conn: &Connection) -> Result<()> {
    let current_version: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(DbError::Sqlite)?;

    match current_version {
        0 => {
            tracing::info!("initializing distribution schema v{SCHEMA_VERSION}");
            conn.execute_batch(schema::SCHEMA_V1)
                .map_err(DbError::Sqlite)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .map_err(DbError::Sqlite)?;
        }
        SCHEMA_VERSION => {}
        // Future schema versions add an arm here that upgrades from the
        // previous version in place.
        other => {
            return Err(DbError::Migration(format!(
                "database version {other} is not supported (expected {SCHEMA_VERSION})"
            )));
        }
    }

    Ok(())
}
