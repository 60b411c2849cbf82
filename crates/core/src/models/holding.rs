use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::asset::Asset;
use super::transaction::Transaction;

/// Position in one asset, derived from the ledger on every request.
///
/// `cost_basis` only covers the currently held `quantity` (moving-average
/// model). A holding with `quantity <= 0` is kept during aggregation but is
/// never reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub asset: Asset,

    /// Signed running total of units
    pub quantity: Decimal,

    /// Cost in the quote currency attributable to `quantity`
    pub cost_basis: Decimal,

    /// Transactions folded into this holding, in processing order
    pub transactions: Vec<Transaction>,
}

impl Holding {
    pub fn new(asset: Asset) -> Self {
        Self {
            asset,
            quantity: Decimal::ZERO,
            cost_basis: Decimal::ZERO,
            transactions: Vec::new(),
        }
    }

    /// Average cost per unit; zero when nothing is held.
    pub fn avg_cost(&self) -> Decimal {
        if self.quantity > Decimal::ZERO {
            self.cost_basis / self.quantity
        } else {
            Decimal::ZERO
        }
    }

    pub fn is_active(&self) -> bool {
        self.quantity > Decimal::ZERO
    }
}
