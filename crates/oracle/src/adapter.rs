//! Oracle adapter: staleness protection and precision normalisation.
//!
//! Every valuation goes through `OracleAdapter::validated_quote`, which reads
//! the latest round of a feed and rejects it when:
//! - the round was never completed (`updated_at == 0` or `answered_in_round < round_id`)
//! - it is older than the staleness timeout (default 3 hours)
//! - the answer is not positive
//!
//! Accepted answers are scaled from the feed's precision to 18 decimals by a
//! constant factor, `ADDITIONAL_FEED_PRECISION = 10^(18 - feed_decimals)`.
//! Nothing is cached: a stale price is a hard failure, never retried.

use std::sync::Arc;

use alloy::primitives::U256;

use ballast_common::error::OracleError;
use ballast_common::precision::{PRECISION_DECIMALS, pow10};
use ballast_common::types::{Quote, RoundData};

use crate::clock::Clock;
use crate::feed::PriceFeed;

/// Default maximum age of a round (3 hours).
pub const DEFAULT_STALENESS_TIMEOUT_SECS: u64 = 3 * 60 * 60;

/// Default feed precision.
pub const DEFAULT_FEED_DECIMALS: u8 = 8;

/// Tunables of the oracle adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleSettings {
    pub staleness_timeout_secs: u64,
    pub feed_decimals: u8,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            staleness_timeout_secs: DEFAULT_STALENESS_TIMEOUT_SECS,
            feed_decimals: DEFAULT_FEED_DECIMALS,
        }
    }
}

/// Validates feed rounds and normalises them into 18-decimal quotes.
pub struct OracleAdapter {
    clock: Arc<dyn Clock>,
    staleness_timeout: u64,
    feed_decimals: u8,
    additional_feed_precision: U256,
}

impl OracleAdapter {
    pub fn new(clock: Arc<dyn Clock>, settings: OracleSettings) -> Result<Self, OracleError> {
        if settings.feed_decimals > PRECISION_DECIMALS {
            return Err(OracleError::UnsupportedDecimals(settings.feed_decimals));
        }

        Ok(Self {
            clock,
            staleness_timeout: settings.staleness_timeout_secs,
            feed_decimals: settings.feed_decimals,
            additional_feed_precision: pow10(PRECISION_DECIMALS - settings.feed_decimals),
        })
    }

    /// Maximum accepted age of a round, in seconds.
    pub fn timeout(&self) -> u64 {
        self.staleness_timeout
    }

    /// Decimals every feed is expected to report.
    pub fn feed_decimals(&self) -> u8 {
        self.feed_decimals
    }

    /// Factor lifting a feed answer to 18 decimals.
    pub fn additional_feed_precision(&self) -> U256 {
        self.additional_feed_precision
    }

    /// Current time as seen by the adapter.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Latest round of `feed`, rejected when incomplete or stale.
    pub fn stale_check_latest_round_data(
        &self,
        feed: &dyn PriceFeed,
    ) -> Result<RoundData, OracleError> {
        let round = feed.latest_round_data()?;
        let now = self.clock.now();

        let incomplete = round.updated_at == 0 || round.answered_in_round < round.round_id;
        let age = now.saturating_sub(round.updated_at);

        if incomplete || age > self.staleness_timeout {
            tracing::warn!(
                feed = %feed.address(),
                round_id = round.round_id,
                updated_at = round.updated_at,
                now,
                timeout = self.staleness_timeout,
                "Rejected stale price round"
            );
            return Err(OracleError::StalePrice {
                feed: feed.address(),
                updated_at: round.updated_at,
                now,
            });
        }

        Ok(round)
    }

    /// Fresh, 18-decimal price for the asset priced by `feed`.
    pub fn validated_quote(&self, feed: &dyn PriceFeed) -> Result<Quote, OracleError> {
        let round = self.stale_check_latest_round_data(feed)?;

        if !round.answer.is_positive() {
            tracing::warn!(feed = %feed.address(), answer = %round.answer, "Rejected non-positive price");
            return Err(OracleError::InvalidPrice {
                feed: feed.address(),
                answer: round.answer,
            });
        }

        let price = round
            .answer
            .into_raw()
            .checked_mul(self.additional_feed_precision)
            .ok_or(OracleError::InvalidPrice {
                feed: feed.address(),
                answer: round.answer,
            })?;

        tracing::debug!(feed = %feed.address(), round_id = round.round_id, price = %price, "Accepted price quote");

        Ok(Quote {
            price,
            published_at: round.updated_at,
            round_id: round.round_id,
        })
    }
}
