use std::collections::BTreeMap;

use alloy::primitives::Address;
use serde::Serialize;

/// Result of one scenario step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub op: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final state of one account. Valuation fields are absent when a feed could
/// not be priced; the debt needs no price and is always present.
#[derive(Debug, Clone, Serialize)]
pub struct AccountReport {
    pub name: String,
    pub address: Address,
    pub collateral: BTreeMap<String, String>,
    pub dsc_balance: String,
    pub total_dsc_minted: String,
    pub collateral_value_in_usd: Option<String>,
    pub health_factor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valuation_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub scenario: String,
    pub timestamp: u64,
    pub steps: Vec<StepOutcome>,
    pub accounts: Vec<AccountReport>,
    pub total_dsc_supply: String,
    pub custodied_collateral_value_usd: Option<String>,
    /// Supply is covered by custodied collateral at current prices.
    pub solvent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valuation_error: Option<String>,
    pub events: usize,
}

impl SimulationReport {
    pub fn failed_steps(&self) -> usize {
        self.steps.iter().filter(|s| !s.ok).count()
    }
}
