//! The synthetic, USD-pegged stablecoin ledger.
//!
//! Minting and burning are gated by a `MintAuthority` capability. It is only
//! produced by `Stablecoin::new`, alongside the ledger, and is neither `Clone`
//! nor constructible elsewhere: whoever owns it is the sole issuer.

use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy::primitives::{Address, U256};

use ballast_common::error::TokenError;

use crate::asset::FungibleAsset;
use crate::ledger::BalanceBook;

/// Exclusive right to mint and burn one stablecoin ledger.
#[derive(Debug)]
pub struct MintAuthority {
    token: Address,
    holder: Address,
}

impl MintAuthority {
    /// Ledger this authority is valid for.
    pub fn token(&self) -> Address {
        self.token
    }

    /// Account that burns are debited from.
    pub fn holder(&self) -> Address {
        self.holder
    }
}

/// A fungible ledger whose supply is controlled through a `MintAuthority`.
pub trait SyntheticAsset: FungibleAsset {
    /// Create `amount` new tokens for `to`.
    fn mint(&self, authority: &MintAuthority, to: Address, amount: U256) -> Result<bool, TokenError>;

    /// Destroy `amount` tokens held by the authority holder.
    fn burn(&self, authority: &MintAuthority, amount: U256) -> Result<(), TokenError>;
}

/// In-memory stablecoin ("DSC").
#[derive(Debug)]
pub struct Stablecoin {
    address: Address,
    book: Mutex<BalanceBook>,
}

impl Stablecoin {
    pub const SYMBOL: &'static str = "DSC";

    /// Create the ledger together with the only authority able to mint and burn it.
    pub fn new(address: Address, authority_holder: Address) -> (Self, MintAuthority) {
        let coin = Self {
            address,
            book: Mutex::new(BalanceBook::default()),
        };
        let authority = MintAuthority {
            token: address,
            holder: authority_holder,
        };
        (coin, authority)
    }

    fn book(&self) -> MutexGuard<'_, BalanceBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_authority(&self, authority: &MintAuthority) -> Result<(), TokenError> {
        if authority.token != self.address {
            return Err(TokenError::Unauthorized { token: self.address });
        }
        Ok(())
    }
}

impl FungibleAsset for Stablecoin {
    fn address(&self) -> Address {
        self.address
    }

    fn symbol(&self) -> String {
        Self::SYMBOL.to_string()
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

impl SyntheticAsset for Stablecoin {
    fn mint(&self, authority: &MintAuthority, to: Address, amount: U256) -> Result<bool, TokenError> {
        self.check_authority(authority)?;
        if to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        if amount.is_zero() {
            return Err(TokenError::MustBeMoreThanZero);
        }
        self.book().mint(to, amount)?;
        tracing::debug!(to = %to, amount = %amount, "Stablecoin minted");
        Ok(true)
    }

    fn burn(&self, authority: &MintAuthority, amount: U256) -> Result<(), TokenError> {
        self.check_authority(authority)?;
        if amount.is_zero() {
            return Err(TokenError::MustBeMoreThanZero);
        }
        self.book().burn(authority.holder, amount)?;
        tracing::debug!(from = %authority.holder, amount = %amount, "Stablecoin burned");
        Ok(())
    }
}
