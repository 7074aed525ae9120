//! A collateral token that calls back into the engine from inside transfers.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use alloy::primitives::{Address, U256};

use ballast_common::error::{EngineError, TokenError};
use ballast_engine::{DscEngine, InMemoryPositions};
use ballast_oracle::{ManualClock, MockAggregator, OracleAdapter, OracleSettings, PriceFeed};
use ballast_token::{FungibleAsset, InMemoryAsset, Stablecoin};

use common::*;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Observation {
    nested: Result<(), EngineError>,
    credited: U256,
}

struct ReentrantAsset {
    inner: InMemoryAsset,
    engine: OnceLock<Weak<DscEngine>>,
    armed: AtomicBool,
    observed: Mutex<Vec<Observation>>,
}

impl ReentrantAsset {
    fn new() -> Self {
        Self {
            inner: InMemoryAsset::new(weth_address(), "EVIL"),
            engine: OnceLock::new(),
            armed: AtomicBool::new(true),
            observed: Mutex::new(Vec::new()),
        }
    }

    fn call_back(&self, victim: Address, amount: U256, redeem: bool) {
        if !self.armed.swap(false, Ordering::SeqCst) {
            return;
        }
        let Some(engine) = self.engine.get().and_then(Weak::upgrade) else {
            return;
        };
        let nested = if redeem {
            engine.redeem_collateral(victim, weth_address(), amount)
        } else {
            engine.deposit_collateral(victim, weth_address(), amount)
        };
        let credited = engine.collateral_balance_of_user(victim, weth_address());
        self.observed.lock().unwrap().push(Observation { nested, credited });
    }
}

impl FungibleAsset for ReentrantAsset {
    fn address(&self) -> Address {
        self.inner.address()
    }

    fn symbol(&self) -> String {
        self.inner.symbol()
    }

    fn total_supply(&self) -> U256 {
        self.inner.total_supply()
    }

    fn balance_of(&self, owner: Address) -> U256 {
        self.inner.balance_of(owner)
    }

    fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.inner.allowance(owner, spender)
    }

    fn approve(&self, owner: Address, spender: Address, amount: U256) -> Result<bool, TokenError> {
        self.inner.approve(owner, spender, amount)
    }

    fn transfer(&self, from: Address, to: Address, amount: U256) -> Result<bool, TokenError> {
        self.call_back(to, amount, true);
        self.inner.transfer(from, to, amount)
    }

    fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<bool, TokenError> {
        self.call_back(from, amount, false);
        self.inner.transfer_from(spender, from, to, amount)
    }
}

struct Harness {
    asset: Arc<ReentrantAsset>,
    engine: Arc<DscEngine>,
    feed: Arc<MockAggregator>,
    dsc: Arc<Stablecoin>,
}

fn build() -> (Arc<ReentrantAsset>, Arc<DscEngine>) {
    let harness = harness();
    (harness.asset, harness.engine)
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(START));
    let asset = Arc::new(ReentrantAsset::new());
    let feed = Arc::new(MockAggregator::new(
        Address::repeat_byte(0xf1),
        8,
        usd_8(2_000),
        clock.clone(),
    ));
    let (coin, authority) = Stablecoin::new(dsc_address(), engine_address());
    let dsc = Arc::new(coin);
    let oracle = OracleAdapter::new(clock, OracleSettings::default()).unwrap();

    let engine = Arc::new(
        DscEngine::new(
            engine_address(),
            vec![asset.clone() as Arc<dyn FungibleAsset>],
            vec![feed.clone() as Arc<dyn PriceFeed>],
            dsc.clone(),
            authority,
            oracle,
            InMemoryPositions::default(),
        )
        .unwrap(),
    );
    asset.engine.set(Arc::downgrade(&engine)).unwrap();
    Harness {
        asset,
        engine,
        feed,
        dsc,
    }
}

#[test]
fn test_reentrant_deposit_rejected() {
    let (asset, engine) = build();
    asset.inner.mint(user(), ether(4)).unwrap();
    asset.approve(user(), engine_address(), ether(4)).unwrap();

    engine
        .deposit_collateral(user(), weth_address(), ether(2))
        .unwrap();

    let observed = asset.observed.lock().unwrap().clone();
    assert_eq!(
        observed,
        vec![Observation {
            nested: Err(EngineError::ReentrantCall),
            // The outer deposit was already credited when the token was called
            credited: ether(2),
        }]
    );
    assert_eq!(
        engine.collateral_balance_of_user(user(), weth_address()),
        ether(2)
    );
    assert_eq!(asset.balance_of(engine_address()), ether(2));
}

#[test]
fn test_reentrant_redeem_rejected() {
    let (asset, engine) = build();
    asset.inner.mint(user(), ether(4)).unwrap();
    asset.approve(user(), engine_address(), ether(4)).unwrap();

    asset.armed.store(false, Ordering::SeqCst);
    engine
        .deposit_collateral(user(), weth_address(), ether(4))
        .unwrap();
    asset.armed.store(true, Ordering::SeqCst);

    engine
        .redeem_collateral(user(), weth_address(), ether(1))
        .unwrap();

    let observed = asset.observed.lock().unwrap().clone();
    assert_eq!(observed.len(), 1);
    assert_eq!(observed[0].nested, Err(EngineError::ReentrantCall));
    assert_eq!(observed[0].credited, ether(3));
    assert_eq!(
        engine.collateral_balance_of_user(user(), weth_address()),
        ether(3)
    );
    assert_eq!(asset.balance_of(user()), ether(1));
}

#[test]
fn test_guard_released_after_operation() {
    let (asset, engine) = build();
    asset.armed.store(false, Ordering::SeqCst);
    asset.inner.mint(user(), ether(2)).unwrap();
    asset.approve(user(), engine_address(), ether(2)).unwrap();

    assert!(engine.mint_dsc(user(), ether(1)).is_err());
    engine
        .deposit_collateral(user(), weth_address(), ether(1))
        .unwrap();
    engine
        .deposit_collateral(user(), weth_address(), ether(1))
        .unwrap();
    assert_eq!(
        engine.collateral_balance_of_user(user(), weth_address()),
        ether(2)
    );
}

#[test]
fn test_reentrant_redeem_during_liquidation_payout_rejected() {
    let Harness {
        asset,
        engine,
        feed,
        dsc,
    } = harness();
    asset.armed.store(false, Ordering::SeqCst);
    for (who, collateral, debt) in [(user(), 10, 5_000), (liquidator(), 20, 1_000)] {
        asset.inner.mint(who, ether(collateral)).unwrap();
        asset.approve(who, engine_address(), ether(collateral)).unwrap();
        engine
            .deposit_collateral_and_mint_dsc(who, weth_address(), ether(collateral), ether(debt))
            .unwrap();
    }
    dsc.approve(liquidator(), engine_address(), ether(1_000)).unwrap();
    feed.update_answer(usd_8(900));
    asset.armed.store(true, Ordering::SeqCst);

    // The collateral payout calls back into the engine as the liquidator
    let seized = engine
        .liquidate(liquidator(), weth_address(), user(), ether(1_000))
        .unwrap();
    assert_eq!(seized, U256::from(1_222_222_222_222_222_222u128));

    let observed = asset.observed.lock().unwrap().clone();
    assert_eq!(
        observed,
        vec![Observation {
            nested: Err(EngineError::ReentrantCall),
            credited: ether(20),
        }]
    );
    assert_eq!(asset.balance_of(liquidator()), seized);
    assert_eq!(
        engine.collateral_balance_of_user(user(), weth_address()),
        ether(10) - seized
    );
    assert_eq!(engine.dsc_minted(user()), ether(4_000));
    assert_eq!(
        engine.collateral_balance_of_user(liquidator(), weth_address()),
        ether(20)
    );
}
