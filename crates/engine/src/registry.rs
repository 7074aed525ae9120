use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;

use ballast_common::error::EngineError;
use ballast_common::types::CollateralType;
use ballast_oracle::PriceFeed;
use ballast_token::FungibleAsset;

/// A registered collateral asset and the feed pricing it.
#[derive(Clone)]
pub struct CollateralEntry {
    pub asset: Address,
    pub token: Arc<dyn FungibleAsset>,
    pub price_feed: Arc<dyn PriceFeed>,
}

/// Collateral types accepted by an engine, fixed at construction.
///
/// Iteration follows registration order.
pub struct CollateralRegistry {
    entries: Vec<CollateralEntry>,
    index: HashMap<Address, usize>,
}

impl CollateralRegistry {
    /// Pair `tokens[i]` with `price_feeds[i]`.
    ///
    /// Every feed must report `feed_decimals` decimals.
    pub fn new(
        tokens: Vec<Arc<dyn FungibleAsset>>,
        price_feeds: Vec<Arc<dyn PriceFeed>>,
        feed_decimals: u8,
    ) -> Result<Self, EngineError> {
        if tokens.len() != price_feeds.len() {
            return Err(EngineError::ConfigLengthMismatch {
                tokens: tokens.len(),
                price_feeds: price_feeds.len(),
            });
        }
        if tokens.is_empty() {
            return Err(EngineError::EmptyCollateralConfig);
        }

        let mut entries = Vec::with_capacity(tokens.len());
        let mut index = HashMap::with_capacity(tokens.len());

        for (token, price_feed) in tokens.into_iter().zip(price_feeds) {
            let asset = token.address();
            if index.insert(asset, entries.len()).is_some() {
                return Err(EngineError::DuplicateCollateral(asset));
            }
            let actual = price_feed.decimals();
            if actual != feed_decimals {
                return Err(EngineError::FeedDecimalsMismatch {
                    feed: price_feed.address(),
                    expected: feed_decimals,
                    actual,
                });
            }
            entries.push(CollateralEntry {
                asset,
                token,
                price_feed,
            });
        }

        Ok(Self { entries, index })
    }

    /// The entry for `asset`, or `NotAllowedToken`.
    pub fn get(&self, asset: Address) -> Result<&CollateralEntry, EngineError> {
        self.index
            .get(&asset)
            .map(|&i| &self.entries[i])
            .ok_or(EngineError::NotAllowedToken(asset))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollateralEntry> {
        self.entries.iter()
    }

    pub fn assets(&self) -> Vec<Address> {
        self.entries.iter().map(|e| e.asset).collect()
    }

    pub fn collateral_types(&self) -> Vec<CollateralType> {
        self.entries
            .iter()
            .map(|e| CollateralType {
                asset: e.asset,
                price_feed: e.price_feed.address(),
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
