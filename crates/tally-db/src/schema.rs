//! SQL schema definitions.
//!
//! Exact decimals are stored as TEXT in their canonical string form
//! (`"12.5"`, `"2/3"`). Identifiers are 32-byte BLOBs, so `ORDER BY` on them
//! matches the in-memory key order.

/// Schema for the v1 database.
pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS fee_pool (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    community_pool TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS validator_dist (
    validator_id BLOB PRIMARY KEY CHECK (length(validator_id) = 32),
    reward_index TEXT NOT NULL,
    last_update_height INTEGER NOT NULL,
    outstanding_commission TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS delegation_dist (
    delegator_id BLOB NOT NULL CHECK (length(delegator_id) = 32),
    validator_id BLOB NOT NULL REFERENCES validator_dist(validator_id),
    index_snapshot TEXT NOT NULL,
    settled_height INTEGER NOT NULL,
    PRIMARY KEY (delegator_id, validator_id)
);

CREATE INDEX IF NOT EXISTS idx_delegation_dist_validator
    ON delegation_dist(validator_id, delegator_id);

CREATE TABLE IF NOT EXISTS withdraw_addresses (
    delegator_id BLOB PRIMARY KEY CHECK (length(delegator_id) = 32),
    address BLOB NOT NULL CHECK (length(address) = 32)
);
"#;
