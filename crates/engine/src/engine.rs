//! The solvency engine.
//!
//! Every mutating operation runs through `DscEngine::execute`:
//! 1. Take the operation lock (other threads wait, same-thread re-entry fails)
//! 2. Apply ledger effects through the operation's journal
//! 3. Check solvency against the effected ledger
//! 4. Interact with tokens: inflows first, the single outflow last
//! 5. Commit events, or compensate completed interactions and revert the journal

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy::primitives::{Address, Log, U256};

use ballast_common::error::EngineError;
use ballast_common::precision::{
    LIQUIDATION_BONUS, LIQUIDATION_PRECISION, LIQUIDATION_THRESHOLD, MIN_HEALTH_FACTOR, PRECISION,
};
use ballast_common::types::{AccountInformation, CollateralType};
use ballast_oracle::{OracleAdapter, PriceFeed};
use ballast_token::{FungibleAsset, MintAuthority, SyntheticAsset};

use crate::events::{CollateralDeposited, CollateralRedeemed, DscBurned, DscMinted};
use crate::guard::ReentrancyGuard;
use crate::health;
use crate::positions::{InMemoryPositions, PositionStore};
use crate::registry::{CollateralEntry, CollateralRegistry};
use crate::tx::{Compensation, Tx};

/// Over-collateralized stablecoin engine.
///
/// Holds deposited collateral in custody at `address`, tracks per-user debt
/// and is the only holder of the stablecoin's `MintAuthority`.
pub struct DscEngine<S: PositionStore = InMemoryPositions> {
    address: Address,
    registry: CollateralRegistry,
    oracle: OracleAdapter,
    dsc: Arc<dyn SyntheticAsset>,
    authority: MintAuthority,
    positions: Mutex<S>,
    guard: ReentrancyGuard,
    events: Mutex<Vec<Log>>,
}

impl<S: PositionStore> DscEngine<S> {
    /// Register `tokens[i]` priced by `price_feeds[i]`.
    ///
    /// `authority` must have been issued by `dsc` to `address`.
    pub fn new(
        address: Address,
        tokens: Vec<Arc<dyn FungibleAsset>>,
        price_feeds: Vec<Arc<dyn PriceFeed>>,
        dsc: Arc<dyn SyntheticAsset>,
        authority: MintAuthority,
        oracle: OracleAdapter,
        positions: S,
    ) -> Result<Self, EngineError> {
        if authority.token() != dsc.address() || authority.holder() != address {
            return Err(EngineError::AuthorityMismatch);
        }
        let registry = CollateralRegistry::new(tokens, price_feeds, oracle.feed_decimals())?;

        tracing::info!(
            engine = %address,
            dsc = %dsc.address(),
            collateral_types = registry.len(),
            staleness_timeout = oracle.timeout(),
            "Engine initialized"
        );

        Ok(Self {
            address,
            registry,
            oracle,
            dsc,
            authority,
            positions: Mutex::new(positions),
            guard: ReentrancyGuard::default(),
            events: Mutex::new(Vec::new()),
        })
    }

    // ============================================================
    // Mutating operations
    // ============================================================

    /// Move `amount` of `asset` from `caller` into custody and credit it.
    pub fn deposit_collateral(
        &self,
        caller: Address,
        asset: Address,
        amount: U256,
    ) -> Result<(), EngineError> {
        more_than_zero(amount)?;
        let entry = self.registry.get(asset)?;
        self.execute("deposit_collateral", |tx| {
            self.deposit_in(tx, entry, caller, amount)
        })
    }

    /// Deposit collateral and mint DSC against it in one operation.
    pub fn deposit_collateral_and_mint_dsc(
        &self,
        caller: Address,
        asset: Address,
        amount_collateral: U256,
        amount_dsc_to_mint: U256,
    ) -> Result<(), EngineError> {
        more_than_zero(amount_collateral)?;
        more_than_zero(amount_dsc_to_mint)?;
        let entry = self.registry.get(asset)?;
        self.execute("deposit_collateral_and_mint_dsc", |tx| {
            {
                let mut store = self.store();
                tx.journal
                    .credit_collateral(&mut *store, caller, asset, amount_collateral)?;
                tx.journal.add_debt(&mut *store, caller, amount_dsc_to_mint)?;
            }
            tx.emit(CollateralDeposited {
                user: caller,
                token: asset,
                amount: amount_collateral,
            });
            tx.emit(DscMinted {
                user: caller,
                amount: amount_dsc_to_mint,
            });
            self.revert_if_health_factor_is_broken(caller)?;

            self.pull_collateral(tx, entry, caller, amount_collateral)?;
            self.mint_to(caller, amount_dsc_to_mint)
        })
    }

    /// Record `amount` of new debt for `caller` and mint it to them.
    pub fn mint_dsc(&self, caller: Address, amount: U256) -> Result<(), EngineError> {
        more_than_zero(amount)?;
        self.execute("mint_dsc", |tx| {
            {
                let mut store = self.store();
                tx.journal.add_debt(&mut *store, caller, amount)?;
            }
            tx.emit(DscMinted {
                user: caller,
                amount,
            });
            self.revert_if_health_factor_is_broken(caller)?;
            self.mint_to(caller, amount)
        })
    }

    /// Pull `amount` DSC from `caller`, destroy it and reduce their debt.
    pub fn burn_dsc(&self, caller: Address, amount: U256) -> Result<(), EngineError> {
        more_than_zero(amount)?;
        self.execute("burn_dsc", |tx| {
            self.burn_debt_in(tx, caller, caller, amount)?;
            self.revert_if_health_factor_is_broken(caller)?;

            self.pull_dsc(tx, caller, amount)?;
            self.burn_custodied_dsc(tx, amount)
        })
    }

    /// Withdraw `amount` of `asset` back to `caller`.
    pub fn redeem_collateral(
        &self,
        caller: Address,
        asset: Address,
        amount: U256,
    ) -> Result<(), EngineError> {
        more_than_zero(amount)?;
        let entry = self.registry.get(asset)?;
        self.execute("redeem_collateral", |tx| {
            self.debit_in(tx, asset, caller, caller, amount)?;
            self.revert_if_health_factor_is_broken(caller)?;
            self.push_collateral(entry, caller, amount)
        })
    }

    /// Burn `amount_dsc_to_burn` then redeem `amount_collateral` of `asset`.
    ///
    /// The burn is applied first, so the health check after the redeem sees
    /// the reduced debt.
    pub fn redeem_collateral_for_dsc(
        &self,
        caller: Address,
        asset: Address,
        amount_collateral: U256,
        amount_dsc_to_burn: U256,
    ) -> Result<(), EngineError> {
        more_than_zero(amount_collateral)?;
        more_than_zero(amount_dsc_to_burn)?;
        let entry = self.registry.get(asset)?;
        self.execute("redeem_collateral_for_dsc", |tx| {
            self.burn_debt_in(tx, caller, caller, amount_dsc_to_burn)?;
            self.debit_in(tx, asset, caller, caller, amount_collateral)?;
            self.revert_if_health_factor_is_broken(caller)?;

            self.pull_dsc(tx, caller, amount_dsc_to_burn)?;
            self.burn_custodied_dsc(tx, amount_dsc_to_burn)?;
            self.push_collateral(entry, caller, amount_collateral)
        })
    }

    /// Cover `debt_to_cover` of `user`'s debt and seize collateral plus bonus.
    ///
    /// `user` must be below `MIN_HEALTH_FACTOR`, the liquidation must strictly
    /// improve their health factor and leave the liquidator healthy. Returns
    /// the amount of `collateral` paid to the liquidator.
    pub fn liquidate(
        &self,
        liquidator: Address,
        collateral: Address,
        user: Address,
        debt_to_cover: U256,
    ) -> Result<U256, EngineError> {
        more_than_zero(debt_to_cover)?;
        let entry = self.registry.get(collateral)?;
        self.execute("liquidate", |tx| {
            let starting = self.health_factor(user)?;
            if starting >= MIN_HEALTH_FACTOR {
                return Err(EngineError::HealthFactorOk(starting));
            }

            let price = self.oracle.validated_quote(entry.price_feed.as_ref())?.price;
            let covered = health::token_amount_from_usd(price, debt_to_cover)?;
            let bonus = health::liquidation_bonus(covered);
            let seized = covered.checked_add(bonus).ok_or(EngineError::Overflow)?;

            self.debit_in(tx, collateral, user, liquidator, seized)?;
            self.burn_debt_in(tx, user, liquidator, debt_to_cover)?;

            let ending = self.health_factor(user)?;
            if ending <= starting {
                return Err(EngineError::HealthFactorNotImproved {
                    before: starting,
                    after: ending,
                });
            }
            self.revert_if_health_factor_is_broken(liquidator)?;

            self.pull_dsc(tx, liquidator, debt_to_cover)?;
            self.burn_custodied_dsc(tx, debt_to_cover)?;
            self.push_collateral(entry, liquidator, seized)?;

            tracing::info!(
                liquidator = %liquidator,
                user = %user,
                collateral = %collateral,
                debt_covered = %debt_to_cover,
                seized = %seized,
                health_before = %starting,
                health_after = %ending,
                "Position liquidated"
            );
            Ok(seized)
        })
    }

    // ============================================================
    // Read-only queries
    // ============================================================
    //
    // Queries touching positions or the event log wait for any operation in
    // flight on another thread, so they only ever see committed state.

    pub fn account_information(&self, user: Address) -> Result<AccountInformation, EngineError> {
        let _read = self.guard.observe();
        let total_dsc_minted = self.dsc_minted(user);
        let collateral_value_in_usd = self.account_collateral_value(user)?;
        Ok(AccountInformation {
            total_dsc_minted,
            collateral_value_in_usd,
        })
    }

    /// USD value of everything `user` has deposited.
    ///
    /// Every registered feed is consulted, so one stale feed fails the whole
    /// valuation even when the user holds none of that asset.
    pub fn account_collateral_value(&self, user: Address) -> Result<U256, EngineError> {
        let _read = self.guard.observe();
        let store = self.store();
        let deposits: Vec<(&CollateralEntry, U256)> = self
            .registry
            .iter()
            .map(|entry| (entry, store.collateral_deposited(user, entry.asset)))
            .collect();
        drop(store);

        let mut total = U256::ZERO;
        for (entry, amount) in deposits {
            let quote = self.oracle.validated_quote(entry.price_feed.as_ref())?;
            let value = health::usd_value(quote.price, amount)?;
            total = total.checked_add(value).ok_or(EngineError::Overflow)?;
        }
        Ok(total)
    }

    pub fn health_factor(&self, user: Address) -> Result<U256, EngineError> {
        let info = self.account_information(user)?;
        let health_factor =
            health::calculate_health_factor(info.total_dsc_minted, info.collateral_value_in_usd);
        tracing::debug!(
            user = %user,
            debt = %info.total_dsc_minted,
            collateral_value = %info.collateral_value_in_usd,
            health_factor = %health_factor,
            "Health factor computed"
        );
        Ok(health_factor)
    }

    pub fn calculate_health_factor(
        &self,
        total_dsc_minted: U256,
        collateral_value_in_usd: U256,
    ) -> U256 {
        health::calculate_health_factor(total_dsc_minted, collateral_value_in_usd)
    }

    pub fn usd_value(&self, asset: Address, amount: U256) -> Result<U256, EngineError> {
        let entry = self.registry.get(asset)?;
        let quote = self.oracle.validated_quote(entry.price_feed.as_ref())?;
        health::usd_value(quote.price, amount)
    }

    pub fn token_amount_from_usd(
        &self,
        asset: Address,
        usd_amount: U256,
    ) -> Result<U256, EngineError> {
        let entry = self.registry.get(asset)?;
        let quote = self.oracle.validated_quote(entry.price_feed.as_ref())?;
        health::token_amount_from_usd(quote.price, usd_amount)
    }

    pub fn collateral_tokens(&self) -> Vec<Address> {
        self.registry.assets()
    }

    pub fn collateral_types(&self) -> Vec<CollateralType> {
        self.registry.collateral_types()
    }

    pub fn collateral_balance_of_user(&self, user: Address, asset: Address) -> U256 {
        let _read = self.guard.observe();
        self.store().collateral_deposited(user, asset)
    }

    /// Outstanding debt of `user`. Needs no price, so it never goes stale.
    pub fn dsc_minted(&self, user: Address) -> U256 {
        let _read = self.guard.observe();
        self.store().dsc_minted(user)
    }

    pub fn price_feed_address(&self, asset: Address) -> Result<Address, EngineError> {
        Ok(self.registry.get(asset)?.price_feed.address())
    }

    pub fn dsc_address(&self) -> Address {
        self.dsc.address()
    }

    /// Custody address holding deposited collateral.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn precision(&self) -> U256 {
        PRECISION
    }

    pub fn additional_feed_precision(&self) -> U256 {
        self.oracle.additional_feed_precision()
    }

    pub fn liquidation_threshold(&self) -> U256 {
        LIQUIDATION_THRESHOLD
    }

    pub fn liquidation_bonus(&self) -> U256 {
        LIQUIDATION_BONUS
    }

    pub fn liquidation_precision(&self) -> U256 {
        LIQUIDATION_PRECISION
    }

    pub fn min_health_factor(&self) -> U256 {
        MIN_HEALTH_FACTOR
    }

    pub fn staleness_timeout(&self) -> u64 {
        self.oracle.timeout()
    }

    /// Events of committed operations, oldest first.
    pub fn events(&self) -> Vec<Log> {
        let _read = self.guard.observe();
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ============================================================
    // Internals
    // ============================================================

    fn store(&self) -> MutexGuard<'_, S> {
        self.positions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn execute<T>(
        &self,
        operation: &'static str,
        body: impl FnOnce(&mut Tx) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let _entered = self.guard.enter()?;
        let mut tx = Tx::default();

        match body(&mut tx) {
            Ok(value) => {
                let committed = tx.events.len();
                self.events
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend(tx.events.into_iter().map(|data| Log {
                        address: self.address,
                        data,
                    }));
                tracing::info!(operation, events = committed, "Operation committed");
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(operation, error = %err, "Operation aborted, rolling back");
                let stranded = self.rollback(tx);
                if stranded.is_empty() {
                    return Err(err);
                }
                Err(EngineError::RollbackIncomplete {
                    cause: Box::new(err),
                    stranded,
                })
            }
        }
    }

    /// Undo completed interactions newest first, then revert the journal.
    ///
    /// Returns the failures of compensations that could not be applied. The
    /// tokens they would have moved are left in custody.
    fn rollback(&self, tx: Tx) -> Vec<EngineError> {
        let Tx {
            journal,
            compensations,
            ..
        } = tx;

        let mut stranded = Vec::new();
        for compensation in compensations.into_iter().rev() {
            let label = compensation.label();
            let outcome = match compensation {
                Compensation::RefundCollateral { token, to, amount } => {
                    match token.transfer(self.address, to, amount) {
                        Ok(true) => Ok(()),
                        Ok(false) => Err(EngineError::TransferFailed {
                            asset: token.address(),
                        }),
                        Err(e) => Err(e.into()),
                    }
                }
                Compensation::RefundDsc { to, amount } => {
                    match self.dsc.transfer(self.address, to, amount) {
                        Ok(true) => Ok(()),
                        Ok(false) => Err(EngineError::TransferFailed {
                            asset: self.dsc.address(),
                        }),
                        Err(e) => Err(e.into()),
                    }
                }
                Compensation::RestoreBurnedDsc { amount } => self.mint_to(self.address, amount),
            };
            if let Err(e) = outcome {
                tracing::error!(compensation = label, error = %e, "Compensation failed");
                stranded.push(e);
            }
        }

        journal.revert(&mut *self.store());
        stranded
    }

    fn revert_if_health_factor_is_broken(&self, user: Address) -> Result<(), EngineError> {
        let health_factor = self.health_factor(user)?;
        if health_factor < MIN_HEALTH_FACTOR {
            return Err(EngineError::HealthFactorBroken(health_factor));
        }
        Ok(())
    }

    fn deposit_in(
        &self,
        tx: &mut Tx,
        entry: &CollateralEntry,
        caller: Address,
        amount: U256,
    ) -> Result<(), EngineError> {
        {
            let mut store = self.store();
            tx.journal
                .credit_collateral(&mut *store, caller, entry.asset, amount)?;
        }
        tx.emit(CollateralDeposited {
            user: caller,
            token: entry.asset,
            amount,
        });
        self.pull_collateral(tx, entry, caller, amount)
    }

    fn debit_in(
        &self,
        tx: &mut Tx,
        asset: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), EngineError> {
        {
            let mut store = self.store();
            tx.journal.debit_collateral(&mut *store, from, asset, amount)?;
        }
        tx.emit(CollateralRedeemed {
            redeemed_from: from,
            redeemed_to: to,
            token: asset,
            amount,
        });
        Ok(())
    }

    /// Reduce `on_behalf_of`'s debt; the DSC itself is supplied by `dsc_from`.
    fn burn_debt_in(
        &self,
        tx: &mut Tx,
        on_behalf_of: Address,
        dsc_from: Address,
        amount: U256,
    ) -> Result<(), EngineError> {
        {
            let mut store = self.store();
            tx.journal.sub_debt(&mut *store, on_behalf_of, amount)?;
        }
        tx.emit(DscBurned {
            on_behalf_of,
            dsc_from,
            amount,
        });
        Ok(())
    }

    fn pull_collateral(
        &self,
        tx: &mut Tx,
        entry: &CollateralEntry,
        from: Address,
        amount: U256,
    ) -> Result<(), EngineError> {
        if !entry
            .token
            .transfer_from(self.address, from, self.address, amount)?
        {
            return Err(EngineError::TransferFailed { asset: entry.asset });
        }
        tx.completed(Compensation::RefundCollateral {
            token: Arc::clone(&entry.token),
            to: from,
            amount,
        });
        Ok(())
    }

    fn pull_dsc(&self, tx: &mut Tx, from: Address, amount: U256) -> Result<(), EngineError> {
        if !self
            .dsc
            .transfer_from(self.address, from, self.address, amount)?
        {
            return Err(EngineError::TransferFailed {
                asset: self.dsc.address(),
            });
        }
        tx.completed(Compensation::RefundDsc { to: from, amount });
        Ok(())
    }

    fn burn_custodied_dsc(&self, tx: &mut Tx, amount: U256) -> Result<(), EngineError> {
        self.dsc.burn(&self.authority, amount)?;
        tx.completed(Compensation::RestoreBurnedDsc { amount });
        Ok(())
    }

    fn push_collateral(
        &self,
        entry: &CollateralEntry,
        to: Address,
        amount: U256,
    ) -> Result<(), EngineError> {
        if !entry.token.transfer(self.address, to, amount)? {
            return Err(EngineError::TransferFailed { asset: entry.asset });
        }
        Ok(())
    }

    fn mint_to(&self, to: Address, amount: U256) -> Result<(), EngineError> {
        if !self.dsc.mint(&self.authority, to, amount)? {
            return Err(EngineError::MintFailed);
        }
        Ok(())
    }
}

fn more_than_zero(amount: U256) -> Result<(), EngineError> {
    if amount.is_zero() {
        return Err(EngineError::NeedsMoreThanZero);
    }
    Ok(())
}
