use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::errors::CoreError;
use crate::models::holding::Holding;
use crate::models::transaction::{Transaction, TransactionKind};

/// Folds ledger transactions into per-asset holdings using a moving-average
/// cost model.
///
/// Pure business logic: no I/O, no API calls.
pub struct PortfolioService;

impl PortfolioService {
    pub fn new() -> Self {
        Self
    }

    /// Build every holding touched by `transactions`, keyed by asset id.
    ///
    /// Transactions are folded oldest-first (stable on timestamp, so equal
    /// timestamps keep ledger order), which makes a newest-first ledger and
    /// an oldest-first one produce the same result. Holdings whose quantity
    /// ended at or below zero are still returned here; use
    /// [`PortfolioService::active_holdings`] for the reportable set.
    pub fn aggregate(&self, transactions: &[Transaction]) -> HashMap<String, Holding> {
        let mut ordered: Vec<&Transaction> = transactions.iter().collect();
        ordered.sort_by_key(|tx| tx.timestamp);

        let mut holdings: HashMap<String, Holding> = HashMap::new();
        for tx in ordered {
            let holding = holdings
                .entry(tx.asset.id.clone())
                .or_insert_with(|| Holding::new(tx.asset.clone()));
            Self::apply(holding, tx);
        }
        holdings
    }

    /// Holdings with a positive quantity, sorted by asset id.
    pub fn active_holdings(&self, holdings: HashMap<String, Holding>) -> Vec<Holding> {
        let mut active: Vec<Holding> = holdings
            .into_values()
            .filter(Holding::is_active)
            .collect();
        active.sort_by(|a, b| a.asset.id.cmp(&b.asset.id));
        active
    }

    /// Validate then aggregate, rejecting the whole batch on the first bad record.
    pub fn aggregate_checked(
        &self,
        transactions: &[Transaction],
    ) -> Result<HashMap<String, Holding>, CoreError> {
        for tx in transactions {
            tx.validate()?;
        }
        Ok(self.aggregate(transactions))
    }

    fn apply(holding: &mut Holding, tx: &Transaction) {
        match tx.kind {
            TransactionKind::Buy => {
                holding.quantity += tx.quantity;
                holding.cost_basis += tx.total_amount;
            }
            TransactionKind::Sell => {
                // Average cost at the moment of sale; the sell price itself
                // never touches the remaining basis.
                let avg_cost = if holding.quantity > Decimal::ZERO {
                    holding.cost_basis / holding.quantity
                } else {
                    Decimal::ZERO
                };
                holding.cost_basis -= avg_cost * tx.quantity;
                holding.quantity -= tx.quantity;
                // Full exit: clear division residue so a re-entry starts clean.
                if holding.quantity.is_zero() {
                    holding.cost_basis = Decimal::ZERO;
                }
            }
        }
        // Display metadata follows the latest record for the asset.
        holding.asset = tx.asset.clone();
        holding.transactions.push(tx.clone());
    }
}

impl Default for PortfolioService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::asset::Asset;
    use chrono::{DateTime, Duration, Utc};
    use rust_decimal_macros::dec;

    fn t(minutes: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap() + Duration::minutes(minutes)
    }

    fn eth() -> Asset {
        Asset::new("ethereum", "Ethereum", "eth")
    }

    #[test]
    fn sell_before_buy_in_ledger_order_is_folded_chronologically() {
        let svc = PortfolioService::new();
        // Newest-first, as the ledger hands it over.
        let txs = vec![
            Transaction::sell(eth(), dec!(4), dec!(2500), t(10)),
            Transaction::buy(eth(), dec!(10), dec!(2000), t(0)),
        ];
        let holdings = svc.aggregate(&txs);
        let h = &holdings["ethereum"];
        assert_eq!(h.quantity, dec!(6));
        assert_eq!(h.cost_basis, dec!(12000));
        assert_eq!(h.transactions[0].kind, TransactionKind::Buy);
    }

    #[test]
    fn full_exit_then_reentry_starts_fresh_basis() {
        let svc = PortfolioService::new();
        let txs = vec![
            Transaction::buy(eth(), dec!(3), dec!(100), t(0)),
            Transaction::sell(eth(), dec!(3), dec!(150), t(1)),
            Transaction::buy(eth(), dec!(1), dec!(400), t(2)),
        ];
        let h = &svc.aggregate(&txs)["ethereum"];
        assert_eq!(h.quantity, dec!(1));
        assert_eq!(h.cost_basis, dec!(400));
        assert_eq!(h.transactions.len(), 3);
    }

    #[test]
    fn oversell_goes_negative_and_is_not_active() {
        let svc = PortfolioService::new();
        let txs = vec![
            Transaction::buy(eth(), dec!(1), dec!(100), t(0)),
            Transaction::sell(eth(), dec!(2), dec!(100), t(1)),
        ];
        let all = svc.aggregate(&txs);
        assert_eq!(all["ethereum"].quantity, dec!(-1));
        assert!(svc.active_holdings(all).is_empty());
    }
}
