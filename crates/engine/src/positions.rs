//! Per-user collateral and debt ledger.
//!
//! The engine owns a `PositionStore` injected at construction. Mutations go
//! through a `Journal`, which records the previous value of every entry it
//! touches so that a failed operation can be reverted exactly.

use std::collections::HashMap;

use alloy::primitives::{Address, U256};

use ballast_common::error::EngineError;

/// Storage of collateral deposits per `(user, asset)` and debt per user.
///
/// A missing entry reads as zero: an untouched position is the empty state.
pub trait PositionStore: Send {
    fn collateral_deposited(&self, user: Address, asset: Address) -> U256;

    fn set_collateral_deposited(&mut self, user: Address, asset: Address, amount: U256);

    fn dsc_minted(&self, user: Address) -> U256;

    fn set_dsc_minted(&mut self, user: Address, amount: U256);
}

/// Hash-map backed store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPositions {
    collateral: HashMap<(Address, Address), U256>,
    debt: HashMap<Address, U256>,
}

impl PositionStore for InMemoryPositions {
    fn collateral_deposited(&self, user: Address, asset: Address) -> U256 {
        self.collateral
            .get(&(user, asset))
            .copied()
            .unwrap_or_default()
    }

    fn set_collateral_deposited(&mut self, user: Address, asset: Address, amount: U256) {
        if amount.is_zero() {
            self.collateral.remove(&(user, asset));
        } else {
            self.collateral.insert((user, asset), amount);
        }
    }

    fn dsc_minted(&self, user: Address) -> U256 {
        self.debt.get(&user).copied().unwrap_or_default()
    }

    fn set_dsc_minted(&mut self, user: Address, amount: U256) {
        if amount.is_zero() {
            self.debt.remove(&user);
        } else {
            self.debt.insert(user, amount);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum JournalEntry {
    Collateral {
        user: Address,
        asset: Address,
        previous: U256,
    },
    Debt {
        user: Address,
        previous: U256,
    },
}

/// Undo log of ledger mutations made by one operation.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn credit_collateral<S: PositionStore + ?Sized>(
        &mut self,
        store: &mut S,
        user: Address,
        asset: Address,
        amount: U256,
    ) -> Result<(), EngineError> {
        let previous = store.collateral_deposited(user, asset);
        let next = previous.checked_add(amount).ok_or(EngineError::Overflow)?;
        self.entries.push(JournalEntry::Collateral {
            user,
            asset,
            previous,
        });
        store.set_collateral_deposited(user, asset, next);
        Ok(())
    }

    pub fn debit_collateral<S: PositionStore + ?Sized>(
        &mut self,
        store: &mut S,
        user: Address,
        asset: Address,
        amount: U256,
    ) -> Result<(), EngineError> {
        let previous = store.collateral_deposited(user, asset);
        let next = previous
            .checked_sub(amount)
            .ok_or(EngineError::InsufficientCollateral {
                user,
                asset,
                deposited: previous,
                requested: amount,
            })?;
        self.entries.push(JournalEntry::Collateral {
            user,
            asset,
            previous,
        });
        store.set_collateral_deposited(user, asset, next);
        Ok(())
    }

    pub fn add_debt<S: PositionStore + ?Sized>(
        &mut self,
        store: &mut S,
        user: Address,
        amount: U256,
    ) -> Result<(), EngineError> {
        let previous = store.dsc_minted(user);
        let next = previous.checked_add(amount).ok_or(EngineError::Overflow)?;
        self.entries.push(JournalEntry::Debt { user, previous });
        store.set_dsc_minted(user, next);
        Ok(())
    }

    pub fn sub_debt<S: PositionStore + ?Sized>(
        &mut self,
        store: &mut S,
        user: Address,
        amount: U256,
    ) -> Result<(), EngineError> {
        let previous = store.dsc_minted(user);
        let next = previous
            .checked_sub(amount)
            .ok_or(EngineError::InsufficientDebt {
                user,
                minted: previous,
                requested: amount,
            })?;
        self.entries.push(JournalEntry::Debt { user, previous });
        store.set_dsc_minted(user, next);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restore every touched entry, newest first.
    pub fn revert<S: PositionStore + ?Sized>(self, store: &mut S) {
        for entry in self.entries.into_iter().rev() {
            match entry {
                JournalEntry::Collateral {
                    user,
                    asset,
                    previous,
                } => store.set_collateral_deposited(user, asset, previous),
                JournalEntry::Debt { user, previous } => store.set_dsc_minted(user, previous),
            }
        }
    }
}
