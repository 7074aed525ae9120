//! State of one in-flight engine operation.

use std::sync::Arc;

use alloy::primitives::{Address, LogData, U256};
use alloy::sol_types::SolEvent;

use ballast_token::FungibleAsset;

use crate::positions::Journal;

/// Undo action for an interaction that already completed.
pub(crate) enum Compensation {
    /// Collateral pulled into custody; send it back.
    RefundCollateral {
        token: Arc<dyn FungibleAsset>,
        to: Address,
        amount: U256,
    },
    /// DSC pulled into custody; send it back.
    RefundDsc { to: Address, amount: U256 },
    /// DSC burned out of custody; mint it back into custody.
    RestoreBurnedDsc { amount: U256 },
}

impl Compensation {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Compensation::RefundCollateral { .. } => "refund_collateral",
            Compensation::RefundDsc { .. } => "refund_dsc",
            Compensation::RestoreBurnedDsc { .. } => "restore_burned_dsc",
        }
    }
}

/// Ledger journal, completed interactions and pending events of one operation.
///
/// Nothing here becomes visible unless the operation commits.
#[derive(Default)]
pub struct Tx {
    pub(crate) journal: Journal,
    pub(crate) compensations: Vec<Compensation>,
    pub(crate) events: Vec<LogData>,
}

impl Tx {
    pub fn emit<E: SolEvent>(&mut self, event: E) {
        self.events.push(event.encode_log_data());
    }

    pub(crate) fn completed(&mut self, compensation: Compensation) {
        self.compensations.push(compensation);
    }
}
