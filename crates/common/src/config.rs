use alloy::primitives::Address;
use serde::Deserialize;

/// Default custody address of the engine when `ENGINE_ADDRESS` is unset.
pub const DEFAULT_ENGINE_ADDRESS: &str = "0x000000000000000000000000000000000000ba11";

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Maximum age of a price round before it is rejected (default: 10800 = 3h)
    pub oracle_staleness_timeout_secs: u64,

    /// Decimals emitted by the price feeds (default: 8)
    pub oracle_feed_decimals: u8,

    /// Address under which the engine custodies collateral
    pub engine_address: Address,

    /// Scenario file replayed by the simulator
    pub sim_scenario_path: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let oracle_feed_decimals: u8 = lookup("ORACLE_FEED_DECIMALS")
            .unwrap_or_else(|| "8".to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("ORACLE_FEED_DECIMALS must be a valid u8"))?;
        if oracle_feed_decimals > 18 {
            anyhow::bail!("ORACLE_FEED_DECIMALS must not exceed 18");
        }

        Ok(Self {
            oracle_staleness_timeout_secs: lookup("ORACLE_STALENESS_TIMEOUT_SECS")
                .unwrap_or_else(|| "10800".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("ORACLE_STALENESS_TIMEOUT_SECS must be a valid u64"))?,
            oracle_feed_decimals,
            engine_address: lookup("ENGINE_ADDRESS")
                .unwrap_or_else(|| DEFAULT_ENGINE_ADDRESS.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("ENGINE_ADDRESS must be a 20-byte hex address"))?,
            sim_scenario_path: lookup("SIM_SCENARIO_PATH")
                .unwrap_or_else(|| "crates/simulator/scenarios/liquidation.json".to_string()),
        })
    }
}
