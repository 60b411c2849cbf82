use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::asset::Asset;
use crate::errors::CoreError;

/// Smallest quantity the ledger accepts for a single transaction.
pub const MIN_QUANTITY: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// Maximum length of a free-text note, in characters.
pub const MAX_NOTE_LEN: usize = 500;

/// Direction of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Buy,
    Sell,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Buy => write!(f, "Buy"),
            TransactionKind::Sell => write!(f, "Sell"),
        }
    }
}

/// A single immutable buy/sell record from the ledger.
///
/// `total_amount` is always `quantity * unit_price`. Edits never mutate a
/// record in place; [`Transaction::amended`] returns a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,

    pub asset: Asset,

    pub kind: TransactionKind,

    /// Units of the asset (always positive)
    pub quantity: Decimal,

    /// Price per unit in the quote currency
    pub unit_price: Decimal,

    /// `quantity * unit_price`
    pub total_amount: Decimal,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub note: Option<String>,
}

impl Transaction {
    pub fn new(
        asset: Asset,
        kind: TransactionKind,
        quantity: Decimal,
        unit_price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            asset,
            kind,
            quantity,
            unit_price,
            total_amount: quantity * unit_price,
            timestamp,
            note: None,
        }
    }

    pub fn buy(asset: Asset, quantity: Decimal, unit_price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self::new(asset, TransactionKind::Buy, quantity, unit_price, timestamp)
    }

    pub fn sell(asset: Asset, quantity: Decimal, unit_price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self::new(asset, TransactionKind::Sell, quantity, unit_price, timestamp)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Produce an edited copy with `total_amount` recomputed. The id is kept,
    /// since the edit replaces the same logical ledger entry.
    pub fn amended(&self, quantity: Option<Decimal>, unit_price: Option<Decimal>) -> Self {
        let quantity = quantity.unwrap_or(self.quantity);
        let unit_price = unit_price.unwrap_or(self.unit_price);
        Self {
            quantity,
            unit_price,
            total_amount: quantity * unit_price,
            ..self.clone()
        }
    }

    /// Check the record invariants before it is allowed into the ledger.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.asset.id.is_empty() {
            return Err(CoreError::InvalidTransaction(
                "asset id must not be empty".into(),
            ));
        }
        if self.quantity < MIN_QUANTITY {
            return Err(CoreError::InvalidTransaction(format!(
                "quantity must be at least {MIN_QUANTITY}, got {}",
                self.quantity
            )));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(CoreError::InvalidTransaction(format!(
                "unit price must not be negative, got {}",
                self.unit_price
            )));
        }
        if self.total_amount != self.quantity * self.unit_price {
            return Err(CoreError::InvalidTransaction(format!(
                "total amount {} does not match {} x {}",
                self.total_amount, self.quantity, self.unit_price
            )));
        }
        if let Some(note) = &self.note {
            if note.chars().count() > MAX_NOTE_LEN {
                return Err(CoreError::InvalidTransaction(format!(
                    "note exceeds {MAX_NOTE_LEN} characters"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc() -> Asset {
        Asset::new("bitcoin", "Bitcoin", "btc")
    }

    #[test]
    fn total_amount_is_quantity_times_price() {
        let tx = Transaction::buy(btc(), dec!(0.5), dec!(30000), Utc::now());
        assert_eq!(tx.total_amount, dec!(15000));
    }

    #[test]
    fn amended_recomputes_total_and_keeps_original() {
        let tx = Transaction::buy(btc(), dec!(2), dec!(100), Utc::now());
        let edited = tx.amended(Some(dec!(3)), None);
        assert_eq!(edited.total_amount, dec!(300));
        assert_eq!(edited.id, tx.id);
        assert_eq!(tx.total_amount, dec!(200));
    }

    #[test]
    fn min_quantity_constant() {
        assert_eq!(MIN_QUANTITY, dec!(0.000001));
    }
}
