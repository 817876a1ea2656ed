//! [`DistributionStore`] over a SQLite connection.

use rusqlite::Connection;
use tally_distribution::delegation::DelegationDistInfo;
use tally_distribution::fee_pool::FeePool;
use tally_distribution::validator::ValidatorDistInfo;
use tally_distribution::{DistributionError, DistributionStore};
use tally_types::{AccountId, DelegatorId, ValidatorId};

use crate::queries::{delegations, fee_pool, validators, withdraw_addresses};
use crate::DbError;

type StoreResult<T> = std::result::Result<T, DistributionError>;

/// Distribution records in SQLite. Borrow a plain connection for immediate
/// writes, or a transaction to group writes.
#[derive(Clone, Copy, Debug)]
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &'c Connection {
        self.conn
    }
}

impl DistributionStore for SqliteStore<'_> {
    fn fee_pool(&self) -> StoreResult<Option<FeePool>> {
        Ok(fee_pool::get(self.conn)?)
    }

    fn set_fee_pool(&mut self, pool: FeePool) -> StoreResult<()> {
        Ok(fee_pool::set(self.conn, &pool)?)
    }

    fn validator(&self, validator: &ValidatorId) -> StoreResult<Option<ValidatorDistInfo>> {
        Ok(validators::get(self.conn, validator)?)
    }

    fn set_validator(&mut self, info: ValidatorDistInfo) -> StoreResult<()> {
        Ok(validators::upsert(self.conn, &info)?)
    }

    fn remove_validator(&mut self, validator: &ValidatorId) -> StoreResult<()> {
        Ok(validators::remove(self.conn, validator)?)
    }

    fn validators(&self) -> StoreResult<Vec<ValidatorDistInfo>> {
        Ok(validators::list(self.conn)?)
    }

    fn delegation(
        &self,
        delegator: &DelegatorId,
        validator: &ValidatorId,
    ) -> StoreResult<Option<DelegationDistInfo>> {
        Ok(delegations::get(self.conn, delegator, validator)?)
    }

    fn set_delegation(&mut self, info: DelegationDistInfo) -> StoreResult<()> {
        Ok(delegations::upsert(self.conn, &info)?)
    }

    fn remove_delegation(&mut self, delegator: &DelegatorId, validator: &ValidatorId) -> StoreResult<()> {
        Ok(delegations::remove(self.conn, delegator, validator)?)
    }

    fn delegations_of_validator(&self, validator: &ValidatorId) -> StoreResult<Vec<DelegationDistInfo>> {
        Ok(delegations::list_for_validator(self.conn, validator)?)
    }

    fn delegations(&self) -> StoreResult<Vec<DelegationDistInfo>> {
        Ok(delegations::list(self.conn)?)
    }

    fn withdraw_address(&self, delegator: &DelegatorId) -> StoreResult<Option<AccountId>> {
        Ok(withdraw_addresses::get(self.conn, delegator)?)
    }

    fn set_withdraw_address(&mut self, delegator: DelegatorId, address: AccountId) -> StoreResult<()> {
        Ok(withdraw_addresses::set(self.conn, &delegator, &address)?)
    }

    fn remove_withdraw_address(&mut self, delegator: &DelegatorId) -> StoreResult<()> {
        Ok(withdraw_addresses::remove(self.conn, delegator)?)
    }

    fn withdraw_addresses(&self) -> StoreResult<Vec<(DelegatorId, AccountId)>> {
        Ok(withdraw_addresses::list(self.conn)?)
    }
}

/// Run one block's distribution work in a single transaction.
///
/// `f` receives a store bound to the transaction. The transaction commits if
/// `f` returns `Ok` and rolls back otherwise, so a failed block leaves no
/// distribution writes behind.
///
/// # Errors
///
/// - whatever `f` returns
/// - [`DistributionError::Store`] if the transaction cannot begin or commit
pub fn apply_block<T, F>(conn: &mut Connection, f: F) -> StoreResult<T>
where
    F: FnOnce(SqliteStore<'_>) -> StoreResult<T>,
{
    let tx = conn.transaction().map_err(DbError::from)?;
    match f(SqliteStore::new(&tx)) {
        Ok(out) => {
            tx.commit().map_err(DbError::from)?;
            tracing::debug!("block transaction committed");
            Ok(out)
        }
        Err(err) => {
            tx.rollback().map_err(DbError::from)?;
            tracing::warn!(error = %err, "block transaction rolled back");
            Err(err)
        }
    }
}
