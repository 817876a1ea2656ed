//! Integration test: block processing against an on-disk SQLite database.
//!
//! Each block runs inside `tally_db::apply_block`. A failing block must leave
//! no writes behind, and everything committed must survive reopening the
//! database file.

use rusqlite::Connection;
use tally_db::{apply_block, SqliteStore};
use tally_distribution::allocation::{BlockRewards, VoteInfo};
use tally_distribution::fee_pool::FeePool;
use tally_distribution::invariants::{check_invariants, holdings};
use tally_distribution::testing::{MockBank, MockStaking};
use tally_distribution::{Distribution, DistributionError, DistributionParams, DistributionStore};
use tally_integration_tests::{account, bootstrap, init_tracing, validator, Stake};
use tally_types::Dec;

fn dec(s: &str) -> Dec {
    s.parse().expect("dec")
}

fn genesis(conn: &mut Connection) -> (MockStaking, MockBank) {
    let validators = [(validator(1), dec("0.1")), (validator(2), Dec::zero())];
    let stakes = [
        Stake { delegator: account(10), validator: validator(1), shares: dec("10") },
        Stake { delegator: account(11), validator: validator(1), shares: dec("40") },
        Stake { delegator: account(10), validator: validator(2), shares: dec("25") },
    ];
    apply_block(conn, |mut store| {
        store.set_fee_pool(FeePool::new())?;
        let dist = bootstrap(store, &validators, &stakes, DistributionParams::default())?;
        let (_, staking, bank) = dist.into_parts();
        Ok((staking, bank))
    })
    .expect("genesis block")
}

fn rewards(fees: &str) -> BlockRewards {
    BlockRewards {
        fees: dec(fees),
        proposer: validator(1),
        votes: vec![
            VoteInfo { validator: validator(1), power: 60, signed_last_block: true },
            VoteInfo { validator: validator(2), power: 40, signed_last_block: true },
        ],
    }
}

#[test]
fn blocks_commit_roll_back_and_persist() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("distribution.db");
    let params = DistributionParams::default();

    let mut conn = tally_db::open(&path).expect("open");
    let (staking, mut bank) = genesis(&mut conn);

    let mut allocated = Dec::zero();
    for height in 1..=3u64 {
        let block = rewards("1000");
        apply_block(&mut conn, |store| {
            let mut dist = Distribution::new(store, &staking, &mut bank, params.clone())?;
            dist.set_block_height(height);
            dist.allocate_block(&block)?;
            Ok(())
        })
        .expect("block");
        allocated += &block.fees;
    }

    let paid = apply_block(&mut conn, |store| {
        let mut dist = Distribution::new(store, &staking, &mut bank, params.clone())?;
        dist.set_block_height(4);
        dist.withdraw_all(&account(10))
    })
    .expect("withdraw block");
    assert!(paid > 0);
    assert_eq!(bank.balance(&account(10)), paid);

    let before = SqliteStore::new(&conn)
        .validator(&validator(1))
        .expect("read")
        .expect("record");
    let failed = apply_block(&mut conn, |store| {
        let mut dist = Distribution::new(store, &staking, &mut bank, params.clone())?;
        dist.set_block_height(5);
        dist.allocate_block(&rewards("500"))?;
        dist.withdraw_single(&account(12), &validator(1))
    });
    assert!(matches!(failed, Err(DistributionError::RecordNotFound { .. })));
    let after = SqliteStore::new(&conn)
        .validator(&validator(1))
        .expect("read")
        .expect("record");
    assert_eq!(before, after);

    drop(conn);
    let conn = tally_db::open(&path).expect("reopen");
    let store = SqliteStore::new(&conn);
    check_invariants(&store).expect("invariants");
    let record = store.validator(&validator(1)).expect("read").expect("record");
    assert_eq!(record, after);
    assert_eq!(record.last_update_height, 3);

    let held = holdings(&store, &staking).expect("holdings");
    let credited = Dec::from_tokens(bank.total_credited());
    assert_eq!(credited + held.total(), allocated);
}

#[test]
fn database_and_memory_agree() {
    init_tracing();
    let params = DistributionParams::default();
    let mut conn = tally_db::open_memory().expect("open");
    let (staking, mut sql_bank) = genesis(&mut conn);

    let validators = [(validator(1), dec("0.1")), (validator(2), Dec::zero())];
    let stakes = [
        Stake { delegator: account(10), validator: validator(1), shares: dec("10") },
        Stake { delegator: account(11), validator: validator(1), shares: dec("40") },
        Stake { delegator: account(10), validator: validator(2), shares: dec("25") },
    ];
    let mut memory = tally_integration_tests::bootstrap_memory(&validators, &stakes).expect("memory");

    for height in 1..=4u64 {
        let block = rewards(&format!("{}.5", 300 * height));
        apply_block(&mut conn, |store| {
            let mut dist = Distribution::new(store, &staking, &mut sql_bank, params.clone())?;
            dist.set_block_height(height);
            dist.allocate_block(&block)?;
            if height % 2 == 0 {
                dist.withdraw_all(&account(11))?;
                dist.withdraw_validator_commission(&validator(1))?;
            }
            Ok(())
        })
        .expect("sql block");

        memory.set_block_height(height);
        memory.allocate_block(&block).expect("memory block");
        if height % 2 == 0 {
            memory.withdraw_all(&account(11)).expect("withdraw");
            memory
                .withdraw_validator_commission(&validator(1))
                .expect("commission");
        }
    }

    let store = SqliteStore::new(&conn);
    assert_eq!(store.fee_pool().expect("pool"), Some(memory.fee_pool().expect("pool")));
    assert_eq!(store.validators().expect("validators"), memory.store().validators().expect("validators"));
    assert_eq!(store.delegations().expect("delegations"), memory.store().delegations().expect("delegations"));
    assert_eq!(sql_bank.total_credited(), memory.bank().total_credited());
}
