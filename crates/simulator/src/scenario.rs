//! Scenario files and their deterministic replay against an in-memory engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy::primitives::utils::{parse_ether, parse_units};
use alloy::primitives::{Address, I256, U256, keccak256};
use anyhow::Context;
use serde::Deserialize;

use ballast_common::config::AppConfig;
use ballast_common::error::EngineError;
use ballast_engine::{DscEngine, InMemoryPositions};
use ballast_oracle::{
    Clock, ManualClock, MockAggregator, OracleAdapter, OracleSettings, PriceFeed, SystemClock,
};
use ballast_token::{FungibleAsset, InMemoryAsset, Stablecoin};

use crate::report::{AccountReport, SimulationReport, StepOutcome};

/// A replayable sequence of engine operations.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Unix seconds the replay clock starts at. Defaults to wall-clock time.
    #[serde(default)]
    pub start_time: Option<u64>,
    pub collateral: Vec<CollateralSpec>,
    #[serde(default)]
    pub wallets: Vec<WalletSpec>,
    pub steps: Vec<Step>,
}

/// Collateral type and its starting USD price, e.g. `"2000"`.
#[derive(Debug, Clone, Deserialize)]
pub struct CollateralSpec {
    pub symbol: String,
    pub price: String,
}

/// Starting balance of `symbol` for `account`, in whole units.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletSpec {
    pub account: String,
    pub symbol: String,
    pub amount: String,
}

/// One scenario step. Amounts are decimal strings in 18-decimal units.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Deposit {
        account: String,
        symbol: String,
        amount: String,
    },
    DepositAndMint {
        account: String,
        symbol: String,
        collateral: String,
        dsc: String,
    },
    Mint {
        account: String,
        amount: String,
    },
    Burn {
        account: String,
        amount: String,
    },
    Redeem {
        account: String,
        symbol: String,
        amount: String,
    },
    RedeemForDsc {
        account: String,
        symbol: String,
        collateral: String,
        dsc: String,
    },
    Liquidate {
        liquidator: String,
        symbol: String,
        user: String,
        debt_to_cover: String,
    },
    SetPrice {
        symbol: String,
        price: String,
    },
    AdvanceTime {
        seconds: u64,
    },
}

impl Step {
    pub fn op(&self) -> &'static str {
        match self {
            Step::Deposit { .. } => "deposit",
            Step::DepositAndMint { .. } => "deposit_and_mint",
            Step::Mint { .. } => "mint",
            Step::Burn { .. } => "burn",
            Step::Redeem { .. } => "redeem",
            Step::RedeemForDsc { .. } => "redeem_for_dsc",
            Step::Liquidate { .. } => "liquidate",
            Step::SetPrice { .. } => "set_price",
            Step::AdvanceTime { .. } => "advance_time",
        }
    }
}

/// Deterministic address for a scenario name.
pub fn named_address(name: &str) -> Address {
    Address::from_slice(&keccak256(name.as_bytes())[12..])
}

struct SimCollateral {
    symbol: String,
    token: Arc<InMemoryAsset>,
    feed: Arc<MockAggregator>,
}

/// An engine wired to in-memory tokens and mock feeds driven by a manual clock.
pub struct Simulation {
    name: String,
    clock: Arc<ManualClock>,
    feed_decimals: u8,
    collateral: Vec<SimCollateral>,
    dsc: Arc<Stablecoin>,
    engine: DscEngine,
    accounts: BTreeMap<String, Address>,
}

impl Simulation {
    pub fn new(scenario: &Scenario, config: &AppConfig) -> anyhow::Result<Self> {
        let start_time = scenario.start_time.unwrap_or_else(|| SystemClock.now());
        let clock = Arc::new(ManualClock::new(start_time));
        let feed_decimals = config.oracle_feed_decimals;

        let mut collateral = Vec::with_capacity(scenario.collateral.len());
        for spec in &scenario.collateral {
            let answer = parse_price(&spec.price, feed_decimals)?;
            collateral.push(SimCollateral {
                symbol: spec.symbol.clone(),
                token: Arc::new(InMemoryAsset::new(
                    named_address(&format!("token:{}", spec.symbol)),
                    spec.symbol.clone(),
                )),
                feed: Arc::new(MockAggregator::new(
                    named_address(&format!("feed:{}", spec.symbol)),
                    feed_decimals,
                    answer,
                    clock.clone(),
                )),
            });
        }

        let (coin, authority) = Stablecoin::new(named_address("token:DSC"), config.engine_address);
        let dsc = Arc::new(coin);

        let oracle = OracleAdapter::new(
            clock.clone(),
            OracleSettings {
                staleness_timeout_secs: config.oracle_staleness_timeout_secs,
                feed_decimals,
            },
        )?;
        let engine = DscEngine::new(
            config.engine_address,
            collateral
                .iter()
                .map(|c| c.token.clone() as Arc<dyn FungibleAsset>)
                .collect(),
            collateral
                .iter()
                .map(|c| c.feed.clone() as Arc<dyn PriceFeed>)
                .collect(),
            dsc.clone(),
            authority,
            oracle,
            InMemoryPositions::default(),
        )?;

        let mut simulation = Self {
            name: scenario.name.clone(),
            clock,
            feed_decimals,
            collateral,
            dsc,
            engine,
            accounts: BTreeMap::new(),
        };

        for wallet in &scenario.wallets {
            let owner = simulation.account(&wallet.account)?;
            let amount = parse_amount(&wallet.amount)?;
            simulation.collateral(&wallet.symbol)?.token.mint(owner, amount)?;
        }

        tracing::info!(
            scenario = %simulation.name,
            collateral_types = simulation.collateral.len(),
            accounts = simulation.accounts.len(),
            "Simulation ready"
        );
        Ok(simulation)
    }

    /// Run `steps` in order and report the final state.
    ///
    /// Engine errors are recorded per step; malformed steps abort the run.
    pub fn run(mut self, steps: &[Step]) -> anyhow::Result<SimulationReport> {
        let mut outcomes = Vec::with_capacity(steps.len());

        for (index, step) in steps.iter().enumerate() {
            let outcome = match self.execute(step)? {
                Ok(detail) => {
                    tracing::info!(index, op = step.op(), "Step committed");
                    StepOutcome {
                        index,
                        op: step.op().to_string(),
                        ok: true,
                        detail,
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::warn!(index, op = step.op(), error = %e, "Step failed");
                    StepOutcome {
                        index,
                        op: step.op().to_string(),
                        ok: false,
                        detail: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        Ok(self.report(outcomes))
    }

    fn execute(&mut self, step: &Step) -> anyhow::Result<Result<Option<String>, EngineError>> {
        let result = match step {
            Step::Deposit {
                account,
                symbol,
                amount,
            } => {
                let caller = self.account(account)?;
                let asset = self.collateral(symbol)?.token.address();
                self.engine
                    .deposit_collateral(caller, asset, parse_amount(amount)?)
                    .map(|_| None)
            }
            Step::DepositAndMint {
                account,
                symbol,
                collateral,
                dsc,
            } => {
                let caller = self.account(account)?;
                let asset = self.collateral(symbol)?.token.address();
                self.engine
                    .deposit_collateral_and_mint_dsc(
                        caller,
                        asset,
                        parse_amount(collateral)?,
                        parse_amount(dsc)?,
                    )
                    .map(|_| None)
            }
            Step::Mint { account, amount } => {
                let caller = self.account(account)?;
                self.engine
                    .mint_dsc(caller, parse_amount(amount)?)
                    .map(|_| None)
            }
            Step::Burn { account, amount } => {
                let caller = self.account(account)?;
                self.engine
                    .burn_dsc(caller, parse_amount(amount)?)
                    .map(|_| None)
            }
            Step::Redeem {
                account,
                symbol,
                amount,
            } => {
                let caller = self.account(account)?;
                let asset = self.collateral(symbol)?.token.address();
                self.engine
                    .redeem_collateral(caller, asset, parse_amount(amount)?)
                    .map(|_| None)
            }
            Step::RedeemForDsc {
                account,
                symbol,
                collateral,
                dsc,
            } => {
                let caller = self.account(account)?;
                let asset = self.collateral(symbol)?.token.address();
                self.engine
                    .redeem_collateral_for_dsc(
                        caller,
                        asset,
                        parse_amount(collateral)?,
                        parse_amount(dsc)?,
                    )
                    .map(|_| None)
            }
            Step::Liquidate {
                liquidator,
                symbol,
                user,
                debt_to_cover,
            } => {
                let liquidator = self.account(liquidator)?;
                let user = self.account(user)?;
                let asset = self.collateral(symbol)?.token.address();
                self.engine
                    .liquidate(liquidator, asset, user, parse_amount(debt_to_cover)?)
                    .map(|seized| Some(format!("seized {} {symbol}", format_amount(seized))))
            }
            Step::SetPrice { symbol, price } => {
                let answer = parse_price(price, self.feed_decimals)?;
                self.collateral(symbol)?.feed.update_answer(answer);
                Ok(Some(format!("{symbol} answer {answer}")))
            }
            Step::AdvanceTime { seconds } => {
                self.clock.advance(*seconds);
                Ok(Some(format!("now {}", self.clock.now())))
            }
        };
        Ok(result)
    }

    /// Address of `name`, registering it on first use with unlimited approvals
    /// for the engine on every token.
    fn account(&mut self, name: &str) -> anyhow::Result<Address> {
        if let Some(address) = self.accounts.get(name) {
            return Ok(*address);
        }
        let address = named_address(name);
        let spender = self.engine.address();
        for collateral in &self.collateral {
            collateral.token.approve(address, spender, U256::MAX)?;
        }
        self.dsc.approve(address, spender, U256::MAX)?;
        self.accounts.insert(name.to_string(), address);
        Ok(address)
    }

    fn collateral(&self, symbol: &str) -> anyhow::Result<&SimCollateral> {
        self.collateral
            .iter()
            .find(|c| c.symbol == symbol)
            .with_context(|| format!("unknown collateral symbol {symbol}"))
    }

    fn report(&self, steps: Vec<StepOutcome>) -> SimulationReport {
        let accounts = self
            .accounts
            .iter()
            .map(|(name, address)| self.account_report(name, *address))
            .collect();

        let custodied = self.collateral.iter().try_fold(U256::ZERO, |total, c| {
            let held = c.token.balance_of(self.engine.address());
            let value = self.engine.usd_value(c.token.address(), held)?;
            total.checked_add(value).ok_or(EngineError::Overflow)
        });
        let supply = self.dsc.total_supply();

        let (custodied_collateral_value_usd, solvent, valuation_error) = match custodied {
            Ok(value) => (Some(format_amount(value)), Some(supply <= value), None),
            Err(e) => (None, None, Some(e.to_string())),
        };

        SimulationReport {
            scenario: self.name.clone(),
            timestamp: self.clock.now(),
            steps,
            accounts,
            total_dsc_supply: format_amount(supply),
            custodied_collateral_value_usd,
            solvent,
            valuation_error,
            events: self.engine.events().len(),
        }
    }

    fn account_report(&self, name: &str, address: Address) -> AccountReport {
        let collateral = self
            .collateral
            .iter()
            .map(|c| {
                let deposited = self
                    .engine
                    .collateral_balance_of_user(address, c.token.address());
                (c.symbol.clone(), format_amount(deposited))
            })
            .collect();

        let debt = self.engine.dsc_minted(address);
        let (collateral_value_in_usd, health_factor, valuation_error) =
            match self.engine.account_collateral_value(address) {
                Ok(value) => {
                    let health_factor = self.engine.calculate_health_factor(debt, value);
                    (
                        Some(format_amount(value)),
                        Some(format_health_factor(health_factor)),
                        None,
                    )
                }
                Err(e) => (None, None, Some(e.to_string())),
            };

        AccountReport {
            name: name.to_string(),
            address,
            collateral,
            dsc_balance: format_amount(self.dsc.balance_of(address)),
            total_dsc_minted: format_amount(debt),
            collateral_value_in_usd,
            health_factor,
            valuation_error,
        }
    }
}

/// Decimal string to 18-decimal units.
pub fn parse_amount(value: &str) -> anyhow::Result<U256> {
    parse_ether(value).with_context(|| format!("invalid amount {value:?}"))
}

/// Decimal USD string to a feed answer with `decimals` decimals. Negative
/// prices are accepted so that invalid feed states can be scripted.
pub fn parse_price(value: &str, decimals: u8) -> anyhow::Result<I256> {
    Ok(parse_units(value, decimals)
        .with_context(|| format!("invalid price {value:?}"))?
        .get_signed())
}

pub fn format_amount(value: U256) -> String {
    alloy::primitives::utils::format_ether(value)
}

pub fn format_health_factor(value: U256) -> String {
    if value == U256::MAX {
        "max".to_string()
    } else {
        format_amount(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIQUIDATION: &str = include_str!("../scenarios/liquidation.json");
    const STALE_PRICE: &str = include_str!("../scenarios/stale_price.json");

    fn config() -> AppConfig {
        AppConfig::from_lookup(|_| None).unwrap()
    }

    fn run(raw: &str) -> SimulationReport {
        let scenario: Scenario = serde_json::from_str(raw).unwrap();
        Simulation::new(&scenario, &config())
            .unwrap()
            .run(&scenario.steps)
            .unwrap()
    }

    #[test]
    fn test_step_tags() {
        let step: Step = serde_json::from_str(
            r#"{"op":"redeem_for_dsc","account":"a","symbol":"WETH","collateral":"1","dsc":"2"}"#,
        )
        .unwrap();
        assert_eq!(step.op(), "redeem_for_dsc");

        let step: Step = serde_json::from_str(r#"{"op":"advance_time","seconds":60}"#).unwrap();
        assert!(matches!(step, Step::AdvanceTime { seconds: 60 }));
    }

    #[test]
    fn test_parse_price_uses_feed_decimals() {
        assert_eq!(
            parse_price("2000", 8).unwrap(),
            I256::try_from(200_000_000_000i64).unwrap()
        );
        assert!(parse_price("-1", 8).unwrap().is_negative());
        assert!(parse_amount("abc").is_err());
    }

    #[test]
    fn test_named_address_is_stable() {
        assert_eq!(named_address("alice"), named_address("alice"));
        assert_ne!(named_address("alice"), named_address("bob"));
    }

    #[test]
    fn test_liquidation_scenario() {
        let report = run(LIQUIDATION);

        assert!(report.steps.iter().all(|s| s.ok), "{:?}", report.steps);
        let liquidation = report
            .steps
            .iter()
            .find(|s| s.op == "liquidate")
            .unwrap();
        assert_eq!(
            liquidation.detail.as_deref(),
            Some("seized 1.222222222222222222 WETH")
        );

        let alice = report.accounts.iter().find(|a| a.name == "alice").unwrap();
        assert_eq!(alice.total_dsc_minted, "4000.000000000000000000");
        assert_eq!(alice.health_factor.as_deref(), Some("0.987500000000000000"));
        assert_eq!(report.solvent, Some(true));
    }

    #[test]
    fn test_stale_price_scenario_records_failure() {
        let report = run(STALE_PRICE);

        let mint = report.steps.iter().rev().find(|s| s.op == "mint").unwrap();
        assert!(!mint.ok);
        assert!(mint.error.as_deref().unwrap().contains("Stale price"));
        assert!(report.valuation_error.is_some());
        assert_eq!(report.solvent, None);
    }

    #[test]
    fn test_stale_price_still_reports_debt() {
        let report = run(STALE_PRICE);

        let alice = report.accounts.iter().find(|a| a.name == "alice").unwrap();
        assert_eq!(alice.total_dsc_minted, "1000.000000000000000000");
        assert_eq!(alice.collateral["WETH"], "5.000000000000000000");
        assert!(alice.health_factor.is_none());
        assert!(alice.collateral_value_in_usd.is_none());
        assert!(alice.valuation_error.as_deref().unwrap().contains("Stale price"));
    }

    #[test]
    fn test_start_time_defaults_to_wall_clock() {
        let scenario: Scenario = serde_json::from_str(
            r#"{"name":"now","collateral":[{"symbol":"WETH","price":"2000"}],"steps":[]}"#,
        )
        .unwrap();
        assert_eq!(scenario.start_time, None);

        let before = SystemClock.now();
        let simulation = Simulation::new(&scenario, &config()).unwrap();
        assert!(simulation.clock.now() >= before);
    }

    #[test]
    fn test_unknown_symbol_aborts() {
        let scenario: Scenario = serde_json::from_str(
            r#"{"name":"bad","collateral":[{"symbol":"WETH","price":"2000"}],
                "steps":[{"op":"deposit","account":"a","symbol":"DOGE","amount":"1"}]}"#,
        )
        .unwrap();
        let result = Simulation::new(&scenario, &config())
            .unwrap()
            .run(&scenario.steps);
        assert!(result.is_err());
    }
}
