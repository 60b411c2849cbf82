pub mod clock;
pub mod errors;
pub mod ledger;
pub mod models;
pub mod providers;
pub mod services;

use log::debug;
use std::sync::Arc;

use errors::CoreError;
use ledger::LedgerReader;
use models::{analytics::PortfolioSummary, price::PriceSet, settings::Settings};
use providers::coingecko::CoinGeckoProvider;
use services::{
    portfolio_service::PortfolioService, price_service::PriceService,
    valuation_service::ValuationService,
};

/// Main entry point for the coinfolio core library.
///
/// Reads a user's ledger, folds it into holdings, prices them through the
/// shared cache and returns a valued summary. Share one instance (behind an
/// `Arc`) across requests so they share the price cache.
#[must_use]
pub struct CoinPortfolio {
    ledger: Arc<dyn LedgerReader>,
    price_service: PriceService,
    portfolio_service: PortfolioService,
    valuation_service: ValuationService,
}

impl std::fmt::Debug for CoinPortfolio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinPortfolio")
            .field("vs_currency", &self.price_service.vs_currency())
            .field("cached_price_sets", &self.price_service.entry_count())
            .finish()
    }
}

impl CoinPortfolio {
    pub fn new(ledger: Arc<dyn LedgerReader>, price_service: PriceService) -> Self {
        Self {
            ledger,
            price_service,
            portfolio_service: PortfolioService::new(),
            valuation_service: ValuationService::new(),
        }
    }

    /// Wire the CoinGecko provider, retry policy and cache from `settings`.
    pub fn from_settings(
        settings: &Settings,
        ledger: Arc<dyn LedgerReader>,
    ) -> Result<Self, CoreError> {
        let provider = Arc::new(CoinGeckoProvider::from_settings(settings));
        let price_service = PriceService::from_settings(settings, provider)?;
        Ok(Self::new(ledger, price_service))
    }

    pub fn price_service(&self) -> &PriceService {
        &self.price_service
    }

    // ── Portfolio ───────────────────────────────────────────────────

    /// Value a user's portfolio at current prices.
    ///
    /// Ledger → aggregation → price cache → valuation. Only a ledger failure
    /// is returned as an error; upstream price trouble shows up as
    /// `degraded` lines instead.
    pub async fn get_portfolio_summary(
        &self,
        user_id: &str,
    ) -> Result<PortfolioSummary, CoreError> {
        let transactions = self.ledger.list_transactions(user_id).await?;
        if transactions.is_empty() {
            return Ok(PortfolioSummary::empty());
        }

        let holdings = self.portfolio_service.aggregate(&transactions);
        let active = self.portfolio_service.active_holdings(holdings);
        if active.is_empty() {
            return Ok(PortfolioSummary::empty());
        }

        let prices = self
            .price_service
            .get_prices(active.iter().map(|h| h.asset.id.as_str()))
            .await;
        let summary = self.valuation_service.valuate(&active, &prices);
        debug!(
            "valued {} holding(s) for {user_id} from {} prices",
            summary.holdings.len(),
            summary.price_source
        );
        Ok(summary)
    }

    // ── Prices ──────────────────────────────────────────────────────

    /// Cache-backed spot prices, bypassing the ledger.
    pub async fn get_current_prices<I, S>(&self, asset_ids: I) -> PriceSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.price_service.get_prices(asset_ids).await
    }
}
