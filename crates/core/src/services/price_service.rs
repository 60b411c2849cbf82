use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::clock::{Clock, SystemClock};
use crate::errors::CoreError;
use crate::models::price::{
    CacheEntry, CacheKey, PriceMap, PriceRequest, PriceSet, PriceSnapshot, PriceSource,
};
use crate::models::settings::Settings;
use crate::providers::fetcher::RateLimitedFetcher;
use crate::providers::reference::StaticReferencePrices;
use crate::providers::traits::{FallbackPrices, PriceProvider};

type Flight = Arc<OnceCell<PriceSet>>;

/// Process-wide spot price cache in front of the rate-limited fetcher.
///
/// Cache strategy:
/// - **Key**: the normalized asset-id set. Each distinct set is its own
///   entry; entries are never merged across keys.
/// - **Fresh** (`now - written_at < ttl`): served without touching upstream.
/// - **Expired or missing**: one upstream fetch for exactly those ids. On
///   success the entry is replaced wholesale.
/// - **Fetch failed, entry exists**: the old entry is served as-is and its
///   `written_at` is left alone, so the next request tries again.
/// - **Fetch failed, never cached**: the [`FallbackPrices`] strategy fills
///   in; whatever it lacks is reported at price 0.
///
/// Concurrent misses on the same key share a single in-flight fetch.
/// Upstream errors never escape this type.
pub struct PriceService {
    fetcher: RateLimitedFetcher,
    fallback: Arc<dyn FallbackPrices>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    vs_currency: String,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    in_flight: Mutex<HashMap<CacheKey, Flight>>,
}

impl PriceService {
    pub fn new(fetcher: RateLimitedFetcher, ttl: Duration, vs_currency: impl Into<String>) -> Self {
        Self {
            fetcher,
            fallback: Arc::new(StaticReferencePrices::new()),
            clock: Arc::new(SystemClock),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::weeks(5200)),
            vs_currency: vs_currency.into().to_lowercase(),
            entries: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Wire a cache for `provider` using the TTL, currency and retry policy
    /// from `settings`.
    pub fn from_settings(
        settings: &Settings,
        provider: Arc<dyn PriceProvider>,
    ) -> Result<Self, CoreError> {
        settings.validate()?;
        let fetcher = RateLimitedFetcher::new(provider, settings.retry.clone());
        Ok(Self::new(fetcher, settings.price_ttl(), &settings.quote_currency))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackPrices>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn vs_currency(&self) -> &str {
        &self.vs_currency
    }

    /// Spot prices for `asset_ids`. Never fails; see the type docs for how
    /// degraded answers are produced and flagged.
    pub async fn get_prices<I, S>(&self, asset_ids: I) -> PriceSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let key = CacheKey::new(asset_ids);
        if key.is_empty() {
            return PriceSet::empty();
        }

        if let Some(prices) = self.fresh_entry(&key) {
            debug!("price cache hit for [{key}]");
            return PriceSet::new(prices, PriceSource::Cached);
        }

        let flight = self.join_flight(&key);
        let result = flight.get_or_init(|| self.refresh(&key)).await.clone();
        self.leave_flight(&key, &flight);
        result
    }

    /// Number of distinct asset-id sets cached.
    pub fn entry_count(&self) -> usize {
        self.read_entries().len()
    }

    /// When the entry for this id set was last written, if ever.
    pub fn written_at<I, S>(&self, asset_ids: I) -> Option<DateTime<Utc>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let key = CacheKey::new(asset_ids);
        self.read_entries().get(&key).map(|e| e.written_at)
    }

    // ── internals ───────────────────────────────────────────────────

    fn fresh_entry(&self, key: &CacheKey) -> Option<PriceMap> {
        let now = self.clock.now();
        self.read_entries()
            .get(key)
            .filter(|e| e.is_fresh(now, self.ttl))
            .map(|e| (*e.snapshot).clone())
    }

    /// The one upstream round-trip behind a flight. Runs at most once per
    /// flight no matter how many callers are waiting on it.
    async fn refresh(&self, key: &CacheKey) -> PriceSet {
        // A flight that finished just before we joined may already have
        // written a fresh entry.
        if let Some(prices) = self.fresh_entry(key) {
            return PriceSet::new(prices, PriceSource::Cached);
        }

        debug!("price cache miss for [{key}], fetching from {}", self.fetcher.provider_name());
        let request = PriceRequest::new(key.clone(), &self.vs_currency);
        match self.fetcher.fetch(&request).await {
            Ok(prices) => {
                let entry = CacheEntry::new(key.clone(), prices.clone(), self.clock.now());
                self.write_entries().insert(key.clone(), entry);
                PriceSet::new(prices, PriceSource::Live)
            }
            Err(e) => self.degraded(key, &e),
        }
    }

    fn degraded(&self, key: &CacheKey, cause: &CoreError) -> PriceSet {
        if let Some(entry) = self.read_entries().get(key) {
            warn!(
                "price fetch for [{key}] failed ({cause}); serving stale prices from {}",
                entry.written_at
            );
            return PriceSet::new((*entry.snapshot).clone(), PriceSource::Stale);
        }

        let now = self.clock.now();
        let mut found = 0usize;
        let prices: PriceMap = key
            .asset_ids()
            .iter()
            .map(|id| {
                let snapshot = match self.fallback.lookup(id) {
                    Ok((price, change)) => {
                        found += 1;
                        PriceSnapshot::new(id.clone(), price, change, now)
                    }
                    Err(e) => {
                        debug!("{e}; reporting zero price");
                        PriceSnapshot::unknown(id.clone(), now)
                    }
                };
                (id.clone(), snapshot)
            })
            .collect();

        let source = if found > 0 {
            PriceSource::Reference
        } else {
            PriceSource::Unavailable
        };
        info!(
            "price fetch for [{key}] failed ({cause}) with nothing cached; {found}/{} price(s) from {} fallback",
            prices.len(),
            self.fallback.name()
        );
        PriceSet::new(prices, source)
    }

    fn join_flight(&self, key: &CacheKey) -> Flight {
        self.lock_flights()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// Drop the flight once it has landed so the next miss starts a new one.
    fn leave_flight(&self, key: &CacheKey, flight: &Flight) {
        let mut flights = self.lock_flights();
        if flights.get(key).is_some_and(|f| Arc::ptr_eq(f, flight)) {
            flights.remove(key);
        }
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_flights(&self) -> MutexGuard<'_, HashMap<CacheKey, Flight>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}
