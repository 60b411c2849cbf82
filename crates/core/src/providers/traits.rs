use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::errors::CoreError;
use crate::models::price::{PriceMap, PriceRequest};

/// A single-attempt upstream spot price source.
///
/// Implementations make exactly one request per call and report failures
/// through the upstream variants of [`CoreError`] so the fetcher can decide
/// whether to retry. Swapping the upstream (CoinGecko today) only touches
/// the implementation, never the cache or the valuation code.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Fetch spot prices for every id in `request`. Ids the upstream does
    /// not know are simply absent from the result.
    async fn fetch_prices(&self, request: &PriceRequest) -> Result<PriceMap, CoreError>;
}

/// Last-resort price table consulted when the upstream is down and nothing
/// has ever been cached for the requested set.
pub trait FallbackPrices: Send + Sync {
    fn name(&self) -> &str;

    /// `(price, change_24h_percent)` for `asset_id`, or
    /// [`CoreError::NoPriceData`] when the table has nothing for it.
    fn lookup(&self, asset_id: &str) -> Result<(Decimal, Decimal), CoreError>;
}
