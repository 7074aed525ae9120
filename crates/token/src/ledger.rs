use std::collections::HashMap;

use alloy::primitives::{Address, U256};

use ballast_common::error::TokenError;

/// Balance and allowance bookkeeping shared by every in-memory asset.
#[derive(Debug, Default, Clone)]
pub struct BalanceBook {
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    total_supply: U256,
}

impl BalanceBook {
    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn balance_of(&self, owner: Address) -> U256 {
        self.balances.get(&owner).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: U256) -> Result<(), TokenError> {
        if owner.is_zero() || spender.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        self.allowances.insert((owner, spender), amount);
        Ok(())
    }

    /// Consume `amount` of the allowance `owner` granted to `spender`.
    /// An allowance of `U256::MAX` is treated as infinite.
    pub fn spend_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), TokenError> {
        let allowance = self.allowance(owner, spender);
        if allowance == U256::MAX {
            return Ok(());
        }
        let remaining = allowance
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientAllowance {
                owner,
                spender,
                allowance,
                needed: amount,
            })?;
        self.allowances.insert((owner, spender), remaining);
        Ok(())
    }

    /// Fail exactly when `transfer(from, to, amount)` would fail.
    pub fn ensure_transferable(&self, from: Address, to: Address, amount: U256) -> Result<(), TokenError> {
        if from.is_zero() || to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(TokenError::InsufficientBalance {
                owner: from,
                balance,
                needed: amount,
            });
        }
        if from != to && self.balance_of(to).checked_add(amount).is_none() {
            return Err(TokenError::Overflow);
        }
        Ok(())
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), TokenError> {
        self.ensure_transferable(from, to, amount)?;
        let debited = self.balance_of(from) - amount;
        self.balances.insert(from, debited);
        let credited = self.balance_of(to) + amount;
        self.balances.insert(to, credited);
        Ok(())
    }

    pub fn mint(&mut self, to: Address, amount: U256) -> Result<(), TokenError> {
        if to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        self.total_supply = supply;
        self.balances.insert(to, balance);
        Ok(())
    }

    pub fn burn(&mut self, from: Address, amount: U256) -> Result<(), TokenError> {
        let balance = self.balance_of(from);
        let remaining = balance
            .checked_sub(amount)
            .ok_or(TokenError::BurnAmountExceedsBalance { balance, amount })?;
        self.balances.insert(from, remaining);
        self.total_supply -= amount;
        Ok(())
    }
}
