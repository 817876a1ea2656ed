//! # tally-db
//!
//! SQLite persistence for distribution state.
//!
//! ## Schema
//!
//! - WAL mode
//! - Foreign keys enforced: every delegation row references a validator row
//! - Exact decimals stored as TEXT
//! - Schema version stored in `PRAGMA user_version`
//!
//! [`SqliteStore`] implements [`tally_distribution::DistributionStore`] over a
//! borrowed connection, and [`apply_block`] runs a whole block inside one
//! transaction.

pub mod migrations;
pub mod queries;
pub mod schema;
pub mod store;

pub use store::{apply_block, SqliteStore};

use rusqlite::Connection;
use std::path::Path;
use tally_distribution::DistributionError;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("corrupt column {column}: {reason}")]
    Corrupt { column: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<DbError> for DistributionError {
    fn from(err: DbError) -> Self {
        DistributionError::Store(err.to_string())
    }
}

/// Open or create the distribution database at the given path.
///
/// Configures WAL mode, foreign keys, and runs any pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run(&conn)?;
    tracing::debug!(path = %path.display(), "distribution database opened");
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Configure SQLite pragmas.
fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = FULL;",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory() {
        let conn = open_memory().expect("open in-memory db");
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("get user_version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_open_on_disk_uses_wal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = open(&dir.path().join("tally.db")).expect("open");
        let mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("get journal_mode");
        assert_eq!(mode, "wal");
    }

    #[test]
    fn test_reopen_keeps_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tally.db");
        drop(open(&path).expect("first open"));
        let conn = open(&path).expect("second open");
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("get user_version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = open_memory().expect("open");
        let fk: i32 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("get foreign_keys");
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_error_maps_to_store_fault() {
        let err: DistributionError = DbError::Migration("boom".into()).into();
        assert!(matches!(err, DistributionError::Store(_)));
        assert!(err.is_fatal());
    }
}
