//! Integration test: reward lifecycle over the in-memory store.
//!
//! Walks a chain through the accounting scenarios:
//! 1. One allocation, one delegator withdrawal (exact index arithmetic)
//! 2. Fractional owed amounts and the rounding sink
//! 3. Withdraw-all across several validators
//! 4. Commission payout and validator removal
//! 5. Full block allocation with proposer bonus
//! 6. Slashing settlement and share changes
//!
//! After every step the stored state passes the invariant audit and the
//! bank's credits plus unpaid holdings add up to everything allocated.

use tally_distribution::allocation::{BlockRewards, VoteInfo};
use tally_distribution::testing::{MockBank, MockStaking};
use tally_distribution::{Distribution, DistributionError, MemStore, StakingHooks};
use tally_integration_tests::{account, bootstrap_memory, init_tracing, validator, Stake};
use tally_types::Dec;

fn dec(s: &str) -> Dec {
    s.parse().expect("dec")
}

fn stake(delegator: u8, v: u8, shares: &str) -> Stake {
    Stake {
        delegator: account(delegator),
        validator: validator(v),
        shares: dec(shares),
    }
}

/// Credits plus unpaid holdings must equal `allocated` exactly.
fn assert_conserved(dist: &Distribution<MemStore, MockStaking, MockBank>, allocated: &Dec) {
    dist.check_invariants().expect("invariants");
    let held = dist.holdings().expect("holdings");
    let credited = Dec::from_tokens(dist.bank().total_credited());
    assert_eq!(&(credited + held.total()), allocated);
}

#[test]
fn single_allocation_and_withdrawal() {
    init_tracing();
    let v = validator(1);
    let d = account(10);
    let mut dist = bootstrap_memory(
        &[(v, dec("0.1"))],
        &[stake(10, 1, "10"), stake(11, 1, "40")],
    )
    .expect("bootstrap");

    dist.set_block_height(1);
    dist.allocate_block_reward(&v, &dec("100"), &dec("0.1"), &dec("50"))
        .expect("allocate");

    let record = dist.validator_record(&v).expect("read").expect("record");
    assert_eq!(record.outstanding_commission, dec("10"));
    assert_eq!(record.reward_index, dec("1.8"));
    assert_conserved(&dist, &dec("100"));

    dist.set_block_height(2);
    assert_eq!(dist.withdraw_single(&d, &v).expect("withdraw"), 18);
    assert_eq!(dist.bank().balance(&d), 18);
    let delegation = dist.delegation_record(&d, &v).expect("read").expect("record");
    assert_eq!(delegation.index_snapshot, dec("1.8"));

    assert_eq!(dist.withdraw_single(&d, &v).expect("idempotent"), 0);
    assert_conserved(&dist, &dec("100"));
}

#[test]
fn fractional_rewards_feed_the_community_pool() {
    init_tracing();
    let v = validator(1);
    let d = account(10);
    let mut dist = bootstrap_memory(
        &[(v, Dec::zero())],
        &[stake(10, 1, "10"), stake(11, 1, "40")],
    )
    .expect("bootstrap");

    dist.allocate_block_reward(&v, &dec("93.5"), &Dec::zero(), &dec("50"))
        .expect("allocate");
    assert_eq!(dist.pending_rewards(&d, &v).expect("pending"), dec("18.7"));

    assert_eq!(dist.withdraw_single(&d, &v).expect("withdraw"), 18);
    assert_eq!(dist.fee_pool().expect("pool").community_pool, dec("0.7"));
    assert_conserved(&dist, &dec("93.5"));
}

#[test]
fn withdraw_all_sums_every_validator() {
    init_tracing();
    let (v1, v2) = (validator(1), validator(2));
    let d = account(10);
    let mut dist = bootstrap_memory(
        &[(v1, Dec::zero()), (v2, Dec::zero())],
        &[stake(10, 2, "10"), stake(10, 1, "10")],
    )
    .expect("bootstrap");

    dist.allocate_block_reward(&v1, &dec("5"), &Dec::zero(), &dec("10"))
        .expect("v1");
    dist.allocate_block_reward(&v2, &dec("7"), &Dec::zero(), &dec("10"))
        .expect("v2");
    assert_eq!(dist.pending_rewards_all(&d).expect("pending"), dec("12"));

    assert_eq!(dist.withdraw_all(&d).expect("withdraw all"), 12);
    assert_eq!(dist.bank().balance(&d), 12);
    assert_eq!(dist.withdraw_all(&d).expect("again"), 0);
    assert_conserved(&dist, &dec("12"));
}

#[test]
fn zero_share_validator_routes_to_pool() {
    init_tracing();
    let v = validator(1);
    let mut dist = bootstrap_memory(&[(v, dec("0.2"))], &[]).expect("bootstrap");

    dist.allocate_block_reward(&v, &dec("50"), &dec("0.2"), &Dec::zero())
        .expect("allocate");
    let record = dist.validator_record(&v).expect("read").expect("record");
    assert!(record.reward_index.is_zero());
    assert_eq!(record.outstanding_commission, dec("10"));
    assert_eq!(dist.fee_pool().expect("pool").community_pool, dec("40"));
    assert_conserved(&dist, &dec("50"));
}

#[test]
fn commission_payout_and_validator_removal() {
    init_tracing();
    let v = validator(1);
    let d = account(10);
    let mut dist = bootstrap_memory(&[(v, dec("1/3"))], &[stake(10, 1, "3")]).expect("bootstrap");

    dist.allocate_block_reward(&v, &dec("10"), &dec("1/3"), &dec("3"))
        .expect("allocate");
    assert_eq!(dist.withdraw_validator_commission(&v).expect("commission"), 3);
    assert_eq!(dist.bank().balance(&v.operator()), 3);
    assert_eq!(dist.fee_pool().expect("pool").community_pool, dec("1/3"));
    assert_conserved(&dist, &dec("10"));

    let err = dist.after_validator_removed(&v).expect_err("still delegated");
    assert!(matches!(err, DistributionError::ValidatorHasDelegations { .. }));

    assert_eq!(dist.before_delegation_removed(&d, &v).expect("undelegate"), 6);
    dist.staking_mut().set_shares(d, v, Dec::zero());
    assert_eq!(dist.after_validator_removed(&v).expect("remove"), 0);
    assert!(dist.validator_record(&v).expect("read").is_none());
    assert_conserved(&dist, &dec("10"));
}

#[test]
fn block_allocation_conserves_fees() {
    init_tracing();
    let (v1, v2, v3) = (validator(1), validator(2), validator(3));
    let mut dist = bootstrap_memory(
        &[(v1, dec("0.05")), (v2, dec("0.1")), (v3, Dec::zero())],
        &[
            stake(10, 1, "100"),
            stake(11, 1, "33"),
            stake(10, 2, "70"),
            stake(12, 3, "7"),
        ],
    )
    .expect("bootstrap");

    let mut allocated = Dec::zero();
    for height in 1..=5u64 {
        dist.set_block_height(height);
        let rewards = BlockRewards {
            fees: Dec::from_integer(997 + i128::from(height)),
            proposer: validator(1 + (height % 3) as u8),
            votes: vec![
                VoteInfo { validator: v1, power: 40, signed_last_block: true },
                VoteInfo { validator: v2, power: 35, signed_last_block: height % 2 == 0 },
                VoteInfo { validator: v3, power: 25, signed_last_block: true },
            ],
        };
        let summary = dist.allocate_block(&rewards).expect("allocate block");
        let voter_total: Dec = summary.voter_rewards.iter().map(|(_, r)| r).sum();
        assert_eq!(
            &summary.proposer_reward + &voter_total + summary.to_community_pool()
                - &summary.routed_to_pool,
            rewards.fees
        );
        allocated += &rewards.fees;
        assert_conserved(&dist, &allocated);
    }

    for d in [account(10), account(11), account(12)] {
        dist.withdraw_all(&d).expect("withdraw all");
    }
    for v in [v1, v2, v3] {
        dist.withdraw_validator_commission(&v).expect("commission");
    }
    assert_conserved(&dist, &allocated);
    let held = dist.holdings().expect("holdings");
    assert!(held.owed_to_delegators.is_zero());
    assert!(held.outstanding_commission.is_zero());
}

#[test]
fn slash_settles_before_repricing() {
    init_tracing();
    let v = validator(1);
    let (d1, d2) = (account(10), account(11));
    let mut dist = bootstrap_memory(
        &[(v, Dec::zero())],
        &[stake(10, 1, "60"), stake(11, 1, "40")],
    )
    .expect("bootstrap");

    dist.allocate_block_reward(&v, &dec("100"), &Dec::zero(), &dec("100"))
        .expect("allocate");
    let index_before = dist.validator_record(&v).expect("read").expect("record").reward_index;

    assert_eq!(dist.before_validator_slashed(&v, &dec("0.1")).expect("slash"), 100);
    dist.staking_mut().scale_validator(&v, &dec("0.9"));
    let index_after = dist.validator_record(&v).expect("read").expect("record").reward_index;
    assert_eq!(index_before, index_after);

    dist.allocate_block_reward(&v, &dec("90"), &Dec::zero(), &dec("90"))
        .expect("allocate after slash");
    assert_eq!(dist.withdraw_single(&d1, &v).expect("d1"), 54);
    assert_eq!(dist.withdraw_single(&d2, &v).expect("d2"), 36);
    assert_conserved(&dist, &dec("190"));
}

#[test]
fn share_change_settles_at_old_count() {
    init_tracing();
    let v = validator(1);
    let d = account(10);
    let mut dist = bootstrap_memory(&[(v, Dec::zero())], &[stake(10, 1, "10")]).expect("bootstrap");

    dist.allocate_block_reward(&v, &dec("10"), &Dec::zero(), &dec("10"))
        .expect("allocate");
    assert_eq!(dist.before_delegation_shares_modified(&d, &v).expect("hook"), 10);
    dist.staking_mut().set_shares(d, v, dec("30"));

    dist.allocate_block_reward(&v, &dec("30"), &Dec::zero(), &dec("30"))
        .expect("allocate");
    assert_eq!(dist.withdraw_single(&d, &v).expect("withdraw"), 30);
    assert_conserved(&dist, &dec("40"));
}

#[test]
fn withdraw_address_redirects_payouts() {
    init_tracing();
    let v = validator(1);
    let d = account(10);
    let target = account(99);
    let mut dist = bootstrap_memory(&[(v, Dec::zero())], &[stake(10, 1, "5")]).expect("bootstrap");

    dist.set_withdraw_address(&d, target).expect("set address");
    dist.allocate_block_reward(&v, &dec("5"), &Dec::zero(), &dec("5"))
        .expect("allocate");
    assert_eq!(dist.withdraw_all(&d).expect("withdraw"), 5);
    assert_eq!(dist.bank().balance(&target), 5);
    assert_eq!(dist.bank().balance(&d), 0);
}

#[test]
fn missing_record_halts() {
    init_tracing();
    let v = validator(1);
    let d = account(10);
    let mut dist = bootstrap_memory(&[(v, Dec::zero())], &[]).expect("bootstrap");
    dist.staking_mut().set_shares(d, v, dec("5"));

    let err = dist.withdraw_all(&d).expect_err("record missing");
    assert!(matches!(err, DistributionError::RecordNotFound { .. }));
    assert!(err.is_fatal());
}

#[test]
fn failed_slash_settlement_can_be_retried() {
    init_tracing();
    let v = validator(1);
    let (d1, d2) = (account(10), account(11));
    let dist = bootstrap_memory(
        &[(v, Dec::zero())],
        &[stake(10, 1, "30"), stake(11, 1, "70")],
    )
    .expect("bootstrap");
    let (store, staking, mut bank) = dist.into_parts();
    bank.close_account(d2);
    let mut dist = Distribution::new(store, staking, bank, Default::default()).expect("facade");

    dist.allocate_block_reward(&v, &dec("100"), &Dec::zero(), &dec("100"))
        .expect("allocate");
    let err = dist.before_validator_slashed(&v, &dec("0.5")).expect_err("closed account");
    assert!(matches!(err, DistributionError::UnknownAccount(_)));
    assert_eq!(dist.bank().balance(&d1), 0);
    assert_eq!(dist.pending_rewards(&d1, &v).expect("pending"), dec("30"));
    assert_conserved(&dist, &dec("100"));

    assert_eq!(dist.withdraw_single(&d1, &v).expect("retry"), 30);
    assert_eq!(dist.withdraw_single(&d1, &v).expect("again"), 0);
    assert_conserved(&dist, &dec("100"));
}
