use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::transaction::Transaction;

/// Default page size for [`InMemoryLedger::query`].
pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// Read side of the transaction ledger.
///
/// Implementations must be idempotent and side-effect free, and return the
/// user's transactions newest-first. A failure here is the only error
/// [`crate::CoinPortfolio::get_portfolio_summary`] lets through.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    async fn list_transactions(&self, user_id: &str) -> Result<Vec<Transaction>, CoreError>;
}

/// Filter and paging for a ledger listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionQuery {
    /// 1-based page number
    pub page: usize,
    pub limit: usize,
    /// Only transactions for this asset id
    pub asset_id: Option<String>,
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            asset_id: None,
        }
    }
}

/// One page of a ledger listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_transactions: usize,
}

/// Ledger kept in process memory, keyed by user id.
///
/// Meant for embedding and tests; anything durable belongs behind its own
/// [`LedgerReader`] implementation.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    by_user: RwLock<HashMap<String, Vec<Transaction>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append a transaction for `user_id`.
    pub fn record(&self, user_id: &str, transaction: Transaction) -> Result<Uuid, CoreError> {
        transaction.validate()?;
        let id = transaction.id;
        self.by_user
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(user_id.to_string())
            .or_default()
            .push(transaction);
        Ok(id)
    }

    /// Replace an existing record with an amended copy (same id).
    pub fn replace(&self, user_id: &str, transaction: Transaction) -> Result<(), CoreError> {
        transaction.validate()?;
        let mut by_user = self.by_user.write().unwrap_or_else(|e| e.into_inner());
        let slot = by_user
            .get_mut(user_id)
            .and_then(|txs| txs.iter_mut().find(|t| t.id == transaction.id))
            .ok_or_else(|| CoreError::Ledger(format!("transaction not found: {}", transaction.id)))?;
        *slot = transaction;
        Ok(())
    }

    pub fn remove(&self, user_id: &str, transaction_id: Uuid) -> Result<Transaction, CoreError> {
        let mut by_user = self.by_user.write().unwrap_or_else(|e| e.into_inner());
        let txs = by_user
            .get_mut(user_id)
            .ok_or_else(|| CoreError::Ledger(format!("transaction not found: {transaction_id}")))?;
        let idx = txs
            .iter()
            .position(|t| t.id == transaction_id)
            .ok_or_else(|| CoreError::Ledger(format!("transaction not found: {transaction_id}")))?;
        Ok(txs.remove(idx))
    }

    /// Newest-first listing, optionally filtered by asset and paged.
    pub fn query(&self, user_id: &str, query: &TransactionQuery) -> TransactionPage {
        let limit = query.limit.max(1);
        let page = query.page.max(1);

        let mut matching = self.newest_first(user_id);
        if let Some(asset_id) = &query.asset_id {
            let asset_id = asset_id.to_lowercase();
            matching.retain(|t| t.asset.id == asset_id);
        }

        let total_transactions = matching.len();
        let total_pages = total_transactions.div_ceil(limit);
        let transactions = matching
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect();

        TransactionPage {
            transactions,
            current_page: page,
            total_pages,
            total_transactions,
        }
    }

    fn newest_first(&self, user_id: &str) -> Vec<Transaction> {
        let mut txs = self
            .by_user
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(user_id)
            .cloned()
            .unwrap_or_default();
        txs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        txs
    }
}

#[async_trait]
impl LedgerReader for InMemoryLedger {
    async fn list_transactions(&self, user_id: &str) -> Result<Vec<Transaction>, CoreError> {
        Ok(self.newest_first(user_id))
    }
}
