use alloy::primitives::{Address, I256, U256};
use serde::Serialize;

/// A single round as reported by a round-based price feed.
///
/// Mirrors the `latestRoundData()` tuple of the feed API: the answer is a
/// signed fixed-point number in the feed's own precision and `updated_at` is
/// the freshness timestamp (unix seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundData {
    pub round_id: u128,
    pub answer: I256,
    pub started_at: u64,
    pub updated_at: u64,
    pub answered_in_round: u128,
}

/// A validated price, normalised to 18 decimals.
///
/// Quotes are never cached: every valuation fetches a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    /// Price of one whole unit of the asset in USD, scaled by `PRECISION`.
    pub price: U256,
    /// When the underlying round was last updated (unix seconds).
    pub published_at: u64,
    pub round_id: u128,
}

/// An asset accepted as collateral together with the feed that prices it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollateralType {
    pub asset: Address,
    pub price_feed: Address,
}

/// Debt and collateral value of a single account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AccountInformation {
    /// Synthetic tokens minted against the position.
    pub total_dsc_minted: U256,
    /// USD value of all deposited collateral, scaled by `PRECISION`.
    pub collateral_value_in_usd: U256,
}
