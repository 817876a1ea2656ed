//! In-memory staking and bank collaborators.
//!
//! Compiled for unit tests and, with the `testing` feature, for downstream
//! test crates.

use std::collections::{BTreeMap, BTreeSet};

use tally_types::{AccountId, Dec, DelegatorId, TokenAmount, ValidatorId};

use crate::providers::{BankProvider, StakingProvider};
use crate::{DistributionError, Result};

/// A share table keyed by (delegator, validator).
#[derive(Clone, Debug, Default)]
pub struct MockStaking {
    shares: BTreeMap<(DelegatorId, ValidatorId), Dec>,
    commission: BTreeMap<ValidatorId, Dec>,
}

impl MockStaking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a validator's commission rate. Unset validators charge zero.
    pub fn set_commission(&mut self, validator: ValidatorId, rate: Dec) {
        self.commission.insert(validator, rate);
    }

    /// Set the shares a delegator holds. Zero removes the delegation.
    pub fn set_shares(&mut self, delegator: DelegatorId, validator: ValidatorId, shares: Dec) {
        if shares.is_zero() {
            self.shares.remove(&(delegator, validator));
        } else {
            self.shares.insert((delegator, validator), shares);
        }
    }

    /// Multiply every delegation of `validator` by `factor`, the way a slash
    /// reprices shares.
    pub fn scale_validator(&mut self, validator: &ValidatorId, factor: &Dec) {
        for ((_, v), shares) in self.shares.iter_mut() {
            if v == validator {
                *shares = &*shares * factor;
            }
        }
    }
}

impl StakingProvider for MockStaking {
    fn validator_share_total(&self, validator: &ValidatorId) -> Result<Dec> {
        Ok(self
            .shares
            .iter()
            .filter(|((_, v), _)| v == validator)
            .map(|(_, shares)| shares)
            .sum())
    }

    fn delegator_shares(&self, delegator: &DelegatorId, validator: &ValidatorId) -> Result<Dec> {
        Ok(self
            .shares
            .get(&(*delegator, *validator))
            .cloned()
            .unwrap_or_default())
    }

    fn delegations(&self, delegator: &DelegatorId) -> Result<Vec<ValidatorId>> {
        Ok(self
            .shares
            .keys()
            .filter(|(d, _)| d == delegator)
            .map(|(_, v)| *v)
            .collect())
    }

    fn commission_rate(&self, validator: &ValidatorId) -> Result<Dec> {
        Ok(self.commission.get(validator).cloned().unwrap_or_default())
    }
}

/// Balances of credited accounts. Every account is open unless closed.
#[derive(Clone, Debug, Default)]
pub struct MockBank {
    balances: BTreeMap<AccountId, TokenAmount>,
    closed: BTreeSet<AccountId>,
}

impl MockBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make credits to `account` fail with `UnknownAccount`.
    pub fn close_account(&mut self, account: AccountId) {
        self.closed.insert(account);
    }

    pub fn balance(&self, account: &AccountId) -> TokenAmount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Sum of every credit made so far.
    pub fn total_credited(&self) -> TokenAmount {
        self.balances.values().sum()
    }
}

impl BankProvider for MockBank {
    fn ensure_account(&self, account: &AccountId) -> Result<()> {
        if self.closed.contains(account) {
            return Err(DistributionError::UnknownAccount(*account));
        }
        Ok(())
    }

    fn credit(&mut self, account: &AccountId, amount: TokenAmount) -> Result<()> {
        self.ensure_account(account)?;
        let balance = self.balances.entry(*account).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| DistributionError::Overflow(format!("balance of {account}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_totals_and_enumeration() {
        let mut staking = MockStaking::new();
        let (d1, d2) = (DelegatorId::new([1; 32]), DelegatorId::new([2; 32]));
        let (v1, v2) = (ValidatorId::new([10; 32]), ValidatorId::new([20; 32]));
        staking.set_shares(d1, v1, Dec::from_integer(10));
        staking.set_shares(d2, v1, Dec::from_integer(40));
        staking.set_shares(d1, v2, Dec::from_integer(5));

        assert_eq!(
            staking.validator_share_total(&v1).expect("total"),
            Dec::from_integer(50)
        );
        assert_eq!(staking.delegations(&d1).expect("list"), vec![v1, v2]);

        staking.set_shares(d1, v2, Dec::zero());
        assert_eq!(staking.delegations(&d1).expect("list"), vec![v1]);
        assert!(staking.delegator_shares(&d1, &v2).expect("shares").is_zero());
    }

    #[test]
    fn test_bank_rejects_closed_account() {
        let mut bank = MockBank::new();
        let a = AccountId::new([1; 32]);
        bank.credit(&a, 5).expect("credit");
        bank.close_account(a);
        assert!(bank.ensure_account(&AccountId::new([2; 32])).is_ok());
        assert!(matches!(
            bank.ensure_account(&a),
            Err(DistributionError::UnknownAccount(_))
        ));
        assert!(matches!(
            bank.credit(&a, 1),
            Err(DistributionError::UnknownAccount(_))
        ));
        assert_eq!(bank.balance(&a), 5);
        assert_eq!(bank.total_credited(), 5);
    }
}
