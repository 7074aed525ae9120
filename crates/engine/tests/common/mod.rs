#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, OnceLock};

use alloy::primitives::{Address, I256, U256};

use ballast_common::error::TokenError;
use ballast_common::precision::pow10;
use ballast_engine::{DscEngine, InMemoryPositions};
use ballast_oracle::{ManualClock, MockAggregator, OracleAdapter, OracleSettings, PriceFeed};
use ballast_token::{FungibleAsset, InMemoryAsset, MintAuthority, Stablecoin, SyntheticAsset};

pub const START: u64 = 1_700_000_000;

pub fn engine_address() -> Address {
    Address::repeat_byte(0xba)
}

pub fn dsc_address() -> Address {
    Address::repeat_byte(0xd5)
}

pub fn weth_address() -> Address {
    Address::repeat_byte(0xee)
}

pub fn wbtc_address() -> Address {
    Address::repeat_byte(0xbb)
}

pub fn user() -> Address {
    Address::repeat_byte(0x01)
}

pub fn liquidator() -> Address {
    Address::repeat_byte(0x02)
}

pub fn ether(value: u64) -> U256 {
    U256::from(value) * pow10(18)
}

/// Feed answer for a whole-dollar price at 8 decimals.
pub fn usd_8(value: i64) -> I256 {
    I256::try_from(value * 100_000_000).unwrap()
}

/// Collateral token whose transfers can be switched to report failure.
pub struct SwitchableAsset {
    pub inner: InMemoryAsset,
    pub fail_pulls: AtomicBool,
    pub fail_pushes: AtomicBool,
}

impl SwitchableAsset {
    pub fn new(address: Address, symbol: &str) -> Self {
        Self {
            inner: InMemoryAsset::new(address, symbol),
            fail_pulls: AtomicBool::new(false),
            fail_pushes: AtomicBool::new(false),
        }
    }
}

impl FungibleAsset for SwitchableAsset {
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
        if self.fail_pushes.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.transfer(from, to, amount)
    }

    fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<bool, TokenError> {
        if self.fail_pulls.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.transfer_from(spender, from, to, amount)
    }
}

/// Stablecoin whose mint can be switched to report failure.
///
/// Once `mint_gate` is set, every mint first waits on that barrier, which
/// parks the calling operation mid-flight.
pub struct SwitchableCoin {
    pub inner: Stablecoin,
    pub fail_mints: AtomicBool,
    pub mint_gate: OnceLock<Arc<Barrier>>,
}

impl FungibleAsset for SwitchableCoin {
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
        self.inner.transfer(from, to, amount)
    }

    fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<bool, TokenError> {
        self.inner.transfer_from(spender, from, to, amount)
    }
}

impl SyntheticAsset for SwitchableCoin {
    fn mint(&self, authority: &MintAuthority, to: Address, amount: U256) -> Result<bool, TokenError> {
        if let Some(gate) = self.mint_gate.get() {
            gate.wait();
        }
        if self.fail_mints.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.mint(authority, to, amount)
    }

    fn burn(&self, authority: &MintAuthority, amount: U256) -> Result<(), TokenError> {
        self.inner.burn(authority, amount)
    }
}

/// Engine with WETH at $2000 and WBTC at $1000, both 8-decimal feeds.
pub struct Fixture {
    pub clock: Arc<ManualClock>,
    pub weth: Arc<SwitchableAsset>,
    pub wbtc: Arc<SwitchableAsset>,
    pub weth_feed: Arc<MockAggregator>,
    pub wbtc_feed: Arc<MockAggregator>,
    pub dsc: Arc<SwitchableCoin>,
    pub engine: DscEngine,
}

impl Fixture {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let weth = Arc::new(SwitchableAsset::new(weth_address(), "WETH"));
        let wbtc = Arc::new(SwitchableAsset::new(wbtc_address(), "WBTC"));
        let weth_feed = Arc::new(MockAggregator::new(
            Address::repeat_byte(0xf1),
            8,
            usd_8(2_000),
            clock.clone(),
        ));
        let wbtc_feed = Arc::new(MockAggregator::new(
            Address::repeat_byte(0xf2),
            8,
            usd_8(1_000),
            clock.clone(),
        ));

        let (coin, authority) = Stablecoin::new(dsc_address(), engine_address());
        let dsc = Arc::new(SwitchableCoin {
            inner: coin,
            fail_mints: AtomicBool::new(false),
            mint_gate: OnceLock::new(),
        });

        let oracle = OracleAdapter::new(clock.clone(), OracleSettings::default()).unwrap();
        let engine = DscEngine::new(
            engine_address(),
            vec![
                weth.clone() as Arc<dyn FungibleAsset>,
                wbtc.clone() as Arc<dyn FungibleAsset>,
            ],
            vec![
                weth_feed.clone() as Arc<dyn PriceFeed>,
                wbtc_feed.clone() as Arc<dyn PriceFeed>,
            ],
            dsc.clone(),
            authority,
            oracle,
            InMemoryPositions::default(),
        )
        .unwrap();

        Self {
            clock,
            weth,
            wbtc,
            weth_feed,
            wbtc_feed,
            dsc,
            engine,
        }
    }

    /// Mint WETH to `who` and approve the engine to pull it.
    pub fn fund_weth(&self, who: Address, amount: U256) {
        self.weth.inner.mint(who, amount).unwrap();
        self.weth.approve(who, engine_address(), amount).unwrap();
    }

    pub fn fund_wbtc(&self, who: Address, amount: U256) {
        self.wbtc.inner.mint(who, amount).unwrap();
        self.wbtc.approve(who, engine_address(), amount).unwrap();
    }

    /// Fund, deposit `collateral` WETH and mint `debt` DSC for `who`.
    pub fn open_position(&self, who: Address, collateral: U256, debt: U256) {
        self.fund_weth(who, collateral);
        self.engine
            .deposit_collateral_and_mint_dsc(who, weth_address(), collateral, debt)
            .unwrap();
    }

    pub fn approve_dsc(&self, who: Address, amount: U256) {
        self.dsc.approve(who, engine_address(), amount).unwrap();
    }

    pub fn set_weth_price(&self, usd: i64) {
        self.weth_feed.update_answer(usd_8(usd));
    }
}
