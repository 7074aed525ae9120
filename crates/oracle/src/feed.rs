//! Round-based price feed interface and an in-memory aggregator.
//!
//! A feed reports rounds of `(round_id, answer, started_at, updated_at,
//! answered_in_round)`. The answer is a signed fixed-point number with
//! `decimals()` decimals. `MockAggregator` keeps a full round history so that
//! tests and the simulator can move prices and timestamps deterministically.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use alloy::primitives::{Address, I256};

use ballast_common::error::OracleError;
use ballast_common::types::RoundData;

use crate::clock::Clock;

/// Versioned, round-based price feed.
pub trait PriceFeed: Send + Sync {
    /// Identifier of the feed (its on-chain address).
    fn address(&self) -> Address;

    /// Decimals of the reported answer.
    fn decimals(&self) -> u8;

    fn description(&self) -> String;

    fn version(&self) -> u64;

    /// The most recent round.
    fn latest_round_data(&self) -> Result<RoundData, OracleError>;

    /// A historical round by id.
    fn round_data(&self, round_id: u128) -> Result<RoundData, OracleError>;
}

#[derive(Debug)]
struct AggregatorState {
    latest_round: u128,
    rounds: BTreeMap<u128, RoundData>,
}

/// In-memory aggregator that stamps new answers with the injected clock.
pub struct MockAggregator {
    address: Address,
    decimals: u8,
    description: String,
    clock: Arc<dyn Clock>,
    state: Mutex<AggregatorState>,
}

impl MockAggregator {
    /// Version reported by `version()`.
    pub const VERSION: u64 = 4;

    pub fn new(address: Address, decimals: u8, initial_answer: I256, clock: Arc<dyn Clock>) -> Self {
        let aggregator = Self {
            address,
            decimals,
            description: "v0.8/tests/MockAggregator".to_string(),
            clock,
            state: Mutex::new(AggregatorState {
                latest_round: 0,
                rounds: BTreeMap::new(),
            }),
        };
        aggregator.update_answer(initial_answer);
        aggregator
    }

    /// Publish a new answer in a fresh round, timestamped now.
    pub fn update_answer(&self, answer: I256) {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let round_id = state.latest_round + 1;
        state.latest_round = round_id;
        state.rounds.insert(
            round_id,
            RoundData {
                round_id,
                answer,
                started_at: now,
                updated_at: now,
                answered_in_round: round_id,
            },
        );
        tracing::debug!(feed = %self.address, round_id, answer = %answer, "Feed answer updated");
    }

    /// Publish a fully specified round; it becomes the latest round.
    pub fn update_round_data(&self, round_id: u128, answer: I256, updated_at: u64, started_at: u64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.latest_round = round_id;
        state.rounds.insert(
            round_id,
            RoundData {
                round_id,
                answer,
                started_at,
                updated_at,
                answered_in_round: round_id,
            },
        );
    }

    /// Overwrite the latest round as-is, including its `answered_in_round`.
    pub fn set_latest_round(&self, round: RoundData) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.latest_round = round.round_id;
        state.rounds.insert(round.round_id, round);
    }
}

impl PriceFeed for MockAggregator {
    fn address(&self) -> Address {
        self.address
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn version(&self) -> u64 {
        Self::VERSION
    }

    fn latest_round_data(&self) -> Result<RoundData, OracleError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .rounds
            .get(&state.latest_round)
            .copied()
            .ok_or_else(|| OracleError::FeedUnavailable {
                feed: self.address,
                reason: "no rounds published".to_string(),
            })
    }

    fn round_data(&self, round_id: u128) -> Result<RoundData, OracleError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .rounds
            .get(&round_id)
            .copied()
            .ok_or(OracleError::UnknownRound {
                feed: self.address,
                round_id,
            })
    }
}
