use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy::primitives::{Address, U256};

use ballast_common::error::TokenError;

use crate::ledger::BalanceBook;

/// Fungible asset ledger with ERC20-style transfer semantics.
///
/// The first address argument of every mutating call is the authenticated
/// caller. `Ok(false)` reports a transfer the ledger declined without a
/// specific error, matching the boolean return of the on-chain interface.
pub trait FungibleAsset: Send + Sync {
    fn address(&self) -> Address;

    fn symbol(&self) -> String;

    fn total_supply(&self) -> U256;

    fn balance_of(&self, owner: Address) -> U256;

    fn allowance(&self, owner: Address, spender: Address) -> U256;

    fn approve(&self, owner: Address, spender: Address, amount: U256) -> Result<bool, TokenError>;

    /// Move `amount` from the caller `from` to `to`.
    fn transfer(&self, from: Address, to: Address, amount: U256) -> Result<bool, TokenError>;

    /// Move `amount` from `from` to `to` on behalf of `spender`, consuming allowance.
    fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<bool, TokenError>;
}

/// In-memory collateral asset with an open faucet (`mint`).
#[derive(Debug)]
pub struct InMemoryAsset {
    address: Address,
    symbol: String,
    book: Mutex<BalanceBook>,
}

impl InMemoryAsset {
    pub fn new(address: Address, symbol: impl Into<String>) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            book: Mutex::new(BalanceBook::default()),
        }
    }

    /// Credit `amount` to `to` out of thin air.
    pub fn mint(&self, to: Address, amount: U256) -> Result<(), TokenError> {
        self.book().mint(to, amount)
    }

    fn book(&self) -> MutexGuard<'_, BalanceBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FungibleAsset for InMemoryAsset {
    fn address(&self) -> Address {
        self.address
    }

    fn symbol(&self) -> String {
        self.symbol.clone()
    }

    fn total_supply(&self) -> U256 {
        self.book().total_supply()
    }

    fn balance_of(&self, owner: Address) -> U256 {
        self.book().balance_of(owner)
    }

    fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.book().allowance(owner, spender)
    }

    fn approve(&self, owner: Address, spender: Address, amount: U256) -> Result<bool, TokenError> {
        self.book().approve(owner, spender, amount)?;
        Ok(true)
    }

    fn transfer(&self, from: Address, to: Address, amount: U256) -> Result<bool, TokenError> {
        self.book().transfer(from, to, amount)?;
        Ok(true)
    }

    fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<bool, TokenError> {
        let mut book = self.book();
        book.ensure_transferable(from, to, amount)?;
        book.spend_allowance(from, spender, amount)?;
        book.transfer(from, to, amount)?;
        Ok(true)
    }
}
