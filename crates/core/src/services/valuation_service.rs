use rust_decimal::Decimal;

use crate::models::analytics::{EnrichedHolding, PortfolioSummary};
use crate::models::holding::Holding;
use crate::models::price::PriceSet;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Values holdings at current prices and rolls them up into portfolio totals.
///
/// Never fails: an asset without a price becomes a zero-valued line marked
/// `stale`, and the summary as a whole is marked `degraded`.
pub struct ValuationService;

impl ValuationService {
    pub fn new() -> Self {
        Self
    }

    /// Value `holdings` against `prices`.
    ///
    /// Holdings with a non-positive quantity are skipped. Line order follows
    /// `holdings`.
    pub fn valuate(&self, holdings: &[Holding], prices: &PriceSet) -> PortfolioSummary {
        let degraded_source = prices.source.is_degraded();

        let lines: Vec<EnrichedHolding> = holdings
            .iter()
            .filter(|h| h.is_active())
            .map(|h| {
                let snapshot = prices.get(&h.asset.id);
                let stale = degraded_source || snapshot.is_none();
                Self::value_line(h, snapshot.map(|s| (s.price, s.change_24h_percent)), stale)
            })
            .collect();

        if lines.is_empty() {
            return PortfolioSummary {
                price_source: prices.source,
                ..PortfolioSummary::empty()
            };
        }

        let total_value: Decimal = lines.iter().map(|l| l.current_value).sum();
        let total_cost_basis: Decimal = lines.iter().map(|l| l.cost_basis).sum();
        let day_change: Decimal = lines.iter().map(|l| l.day_change).sum();
        let total_pnl = total_value - total_cost_basis;

        let total_pnl_percent = if total_cost_basis > Decimal::ZERO {
            total_pnl / total_cost_basis * HUNDRED
        } else {
            Decimal::ZERO
        };
        let day_change_percent = if total_value > Decimal::ZERO {
            day_change / total_value * HUNDRED
        } else {
            Decimal::ZERO
        };
        let degraded = lines.iter().any(|l| l.stale);

        PortfolioSummary {
            holdings: lines,
            total_value,
            total_cost_basis,
            total_pnl,
            total_pnl_percent,
            day_change,
            day_change_percent,
            price_source: prices.source,
            degraded,
        }
    }

    fn value_line(
        holding: &Holding,
        quote: Option<(Decimal, Decimal)>,
        stale: bool,
    ) -> EnrichedHolding {
        let (current_price, day_change_percent) =
            quote.unwrap_or((Decimal::ZERO, Decimal::ZERO));

        let current_value = holding.quantity * current_price;
        let pnl = current_value - holding.cost_basis;
        let pnl_percent = if holding.cost_basis > Decimal::ZERO {
            pnl / holding.cost_basis * HUNDRED
        } else {
            Decimal::ZERO
        };

        EnrichedHolding {
            asset: holding.asset.clone(),
            quantity: holding.quantity,
            cost_basis: holding.cost_basis,
            avg_cost: holding.avg_cost(),
            current_price,
            current_value,
            pnl,
            pnl_percent,
            day_change: current_value * day_change_percent / HUNDRED,
            day_change_percent,
            stale,
            transactions: holding.transactions.clone(),
        }
    }
}

impl Default for ValuationService {
    fn default() -> Self {
        Self::new()
    }
}
