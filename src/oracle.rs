//! Price Oracle
//!
//! A single push-based feed per collateral asset. An operator publishes
//! prices in stablecoin units scaled to 18 decimals; reads past the
//! staleness window surface as failures to the calling operation.

use std::collections::BTreeMap;

use tracing::warn;

use crate::check;
use crate::errors::{EngineError, EngineResult};
use crate::types::Address;

/// Default staleness window in seconds
pub const DEFAULT_MAX_PRICE_AGE: u64 = 3_600;

/// One published price point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricePoint {
    /// Price in stablecoin units, scaled 1e18
    pub price: u128,
    /// Timestamp the price was published at
    pub updated_at: u64,
}

/// Push-based single feed per asset
#[derive(Debug, Clone)]
pub struct PriceFeed {
    operator: Address,
    max_age: u64,
    prices: BTreeMap<Address, PricePoint>,
}

impl PriceFeed {
    pub fn new(operator: Address) -> Self {
        Self {
            operator,
            max_age: DEFAULT_MAX_PRICE_AGE,
            prices: BTreeMap::new(),
        }
    }

    /// Current feed operator
    pub fn operator(&self) -> Address {
        self.operator
    }

    /// Rotates the operator. Owner-gated by the engine.
    pub fn set_operator(&mut self, operator: Address) {
        self.operator = operator;
    }

    /// Adjusts the staleness window.
    pub fn set_max_age(&mut self, max_age: u64) -> EngineResult<()> {
        check!(
            max_age > 0,
            EngineError::InvalidParameter {
                what: "price staleness window must be non-zero",
            }
        );
        self.max_age = max_age;
        Ok(())
    }

    /// Publishes a price for `asset`.
    pub fn update_price(
        &mut self,
        caller: Address,
        asset: Address,
        price: u128,
        now: u64,
    ) -> EngineResult<()> {
        check!(caller == self.operator, EngineError::NotAuthorized);
        check!(
            price > 0,
            EngineError::InvalidParameter {
                what: "price must be non-zero",
            }
        );
        self.prices.insert(
            asset,
            PricePoint {
                price,
                updated_at: now,
            },
        );
        Ok(())
    }

    /// Returns the current price of `asset`, failing on a missing or
    /// stale feed.
    pub fn fetch_price(&self, asset: Address, now: u64) -> EngineResult<u128> {
        let point = self
            .prices
            .get(&asset)
            .ok_or(EngineError::OracleFailure { asset })?;

        if now.saturating_sub(point.updated_at) > self.max_age {
            warn!(age = now - point.updated_at, "stale oracle price");
            return Err(EngineError::OracleFailure { asset });
        }
        Ok(point.price)
    }
}
