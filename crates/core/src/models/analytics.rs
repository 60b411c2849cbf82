use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::asset::Asset;
use super::price::PriceSource;
use super::transaction::Transaction;

/// Live-valued portfolio. Recomputed on every request, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    /// Per-asset breakdown, active holdings only
    pub holdings: Vec<EnrichedHolding>,

    /// Sum of `current_value` over all holdings
    pub total_value: Decimal,

    pub total_cost_basis: Decimal,

    /// `total_value - total_cost_basis`
    pub total_pnl: Decimal,

    /// `total_pnl / total_cost_basis * 100`, or 0 with no cost basis
    pub total_pnl_percent: Decimal,

    /// Sum of per-holding day change, in the quote currency
    pub day_change: Decimal,

    /// `day_change / total_value * 100`, or 0 with no value
    pub day_change_percent: Decimal,

    /// Where the prices behind this summary came from
    pub price_source: PriceSource,

    /// True when any line was valued from stale, reference or missing prices
    pub degraded: bool,
}

impl PortfolioSummary {
    /// The defined "nothing held" result.
    pub fn empty() -> Self {
        Self {
            holdings: Vec::new(),
            total_value: Decimal::ZERO,
            total_cost_basis: Decimal::ZERO,
            total_pnl: Decimal::ZERO,
            total_pnl_percent: Decimal::ZERO,
            day_change: Decimal::ZERO,
            day_change_percent: Decimal::ZERO,
            price_source: PriceSource::Live,
            degraded: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    /// Copy with every monetary and percentage figure rounded to `dp` places
    /// for display. Quantities are left untouched.
    #[must_use]
    pub fn rounded(&self, dp: u32) -> Self {
        Self {
            holdings: self.holdings.iter().map(|h| h.rounded(dp)).collect(),
            total_value: self.total_value.round_dp(dp),
            total_cost_basis: self.total_cost_basis.round_dp(dp),
            total_pnl: self.total_pnl.round_dp(dp),
            total_pnl_percent: self.total_pnl_percent.round_dp(dp),
            day_change: self.day_change.round_dp(dp),
            day_change_percent: self.day_change_percent.round_dp(dp),
            price_source: self.price_source,
            degraded: self.degraded,
        }
    }
}

/// A holding valued at the current price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedHolding {
    pub asset: Asset,

    pub quantity: Decimal,

    pub cost_basis: Decimal,

    /// `cost_basis / quantity`
    pub avg_cost: Decimal,

    /// Zero when no price is known
    pub current_price: Decimal,

    /// `quantity * current_price`
    pub current_value: Decimal,

    /// `current_value - cost_basis`
    pub pnl: Decimal,

    pub pnl_percent: Decimal,

    /// `current_value * day_change_percent / 100`
    pub day_change: Decimal,

    /// Upstream 24h change for this asset
    pub day_change_percent: Decimal,

    /// Price is not live: stale entry, reference table, or missing altogether
    pub stale: bool,

    pub transactions: Vec<Transaction>,
}

impl EnrichedHolding {
    #[must_use]
    pub fn rounded(&self, dp: u32) -> Self {
        Self {
            cost_basis: self.cost_basis.round_dp(dp),
            avg_cost: self.avg_cost.round_dp(dp),
            current_price: self.current_price.round_dp(dp),
            current_value: self.current_value.round_dp(dp),
            pnl: self.pnl.round_dp(dp),
            pnl_percent: self.pnl_percent.round_dp(dp),
            day_change: self.day_change.round_dp(dp),
            day_change_percent: self.day_change_percent.round_dp(dp),
            ..self.clone()
        }
    }
}
