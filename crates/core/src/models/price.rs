use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Spot price of one asset as returned by the upstream source.
///
/// Snapshots are never mutated; a refresh produces new ones that replace
/// the whole cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub asset_id: String,
    pub price: Decimal,
    /// Percentage move over the last 24 hours (e.g. `-2.5` for -2.5%)
    pub change_24h_percent: Decimal,
    pub fetched_at: DateTime<Utc>,
}

impl PriceSnapshot {
    pub fn new(
        asset_id: impl Into<String>,
        price: Decimal,
        change_24h_percent: Decimal,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            price,
            change_24h_percent,
            fetched_at,
        }
    }

    /// Zero-priced placeholder for an asset nobody knows a price for.
    pub fn unknown(asset_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(asset_id, Decimal::ZERO, Decimal::ZERO, at)
    }
}

/// assetId → snapshot, as produced by one upstream fetch.
pub type PriceMap = HashMap<String, PriceSnapshot>;

/// Where the prices in a [`PriceSet`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// Fetched from upstream for this request
    Live,
    /// Served from a cache entry still within its TTL
    Cached,
    /// Upstream failed; served from an expired cache entry
    Stale,
    /// Upstream failed and nothing was cached; static reference table
    Reference,
    /// Upstream failed, nothing cached, no reference data
    Unavailable,
}

impl PriceSource {
    /// Whether these prices should be flagged as not live.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            PriceSource::Stale | PriceSource::Reference | PriceSource::Unavailable
        )
    }
}

impl std::fmt::Display for PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceSource::Live => write!(f, "live"),
            PriceSource::Cached => write!(f, "cached"),
            PriceSource::Stale => write!(f, "stale"),
            PriceSource::Reference => write!(f, "reference"),
            PriceSource::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Result of a cache lookup: the snapshots plus how fresh they are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSet {
    pub prices: PriceMap,
    pub source: PriceSource,
}

impl PriceSet {
    pub fn new(prices: PriceMap, source: PriceSource) -> Self {
        Self { prices, source }
    }

    pub fn empty() -> Self {
        Self::new(HashMap::new(), PriceSource::Live)
    }

    pub fn get(&self, asset_id: &str) -> Option<&PriceSnapshot> {
        self.prices.get(asset_id)
    }
}

/// Normalized asset-id set: trimmed, lowercased, deduplicated and sorted.
///
/// `["ethereum", "bitcoin", "bitcoin"]` and `["bitcoin", "ethereum"]` produce
/// the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
    pub fn new<I, S>(asset_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: BTreeSet<String> = asset_ids
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self(ids.into_iter().collect())
    }

    pub fn asset_ids(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Comma-joined form, as the upstream query expects.
    pub fn joined(&self) -> String {
        self.0.join(",")
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.joined())
    }
}

/// One cached fetch result. Replaced wholesale on refresh.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub snapshot: Arc<PriceMap>,
    pub written_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: CacheKey, snapshot: PriceMap, written_at: DateTime<Utc>) -> Self {
        Self {
            key,
            snapshot: Arc::new(snapshot),
            written_at,
        }
    }

    /// `now - written_at < ttl`
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.written_at < ttl
    }
}

/// What to ask the upstream source for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRequest {
    pub asset_ids: CacheKey,
    /// Quote currency code as the upstream spells it (e.g. "usd")
    pub vs_currency: String,
}

impl PriceRequest {
    pub fn new(asset_ids: CacheKey, vs_currency: impl Into<String>) -> Self {
        Self {
            asset_ids,
            vs_currency: vs_currency.into().to_lowercase(),
        }
    }
}
