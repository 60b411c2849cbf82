use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::CoreError;

pub const DEFAULT_API_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Upper bound accepted for [`RetryPolicy::max_retries`].
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Runtime configuration for the price layer.
///
/// Every field has a default, so a partial JSON document (or none at all)
/// is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Upstream base URL (no trailing slash).
    pub api_base_url: String,

    /// Optional CoinGecko demo API key, sent as `x-cg-demo-api-key`.
    pub api_key: Option<String>,

    /// Quote currency for every price (e.g. "usd").
    pub quote_currency: String,

    /// How long a fetched price set is served without going upstream.
    pub price_ttl_secs: u64,

    pub retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: None,
            quote_currency: "usd".to_string(),
            price_ttl_secs: 60,
            retry: RetryPolicy::default(),
        }
    }
}

/// Bounded retry with exponential backoff for upstream fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,

    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay_ms: u64,

    /// Cap on the computed delay. An upstream retry-after hint is not capped.
    pub max_delay_ms: u64,

    /// Timeout for a single upstream request.
    pub request_timeout_secs: u64,

    /// Bound on the whole fetch, retries and waits included.
    pub overall_timeout_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 30_000,
            request_timeout_secs: 15,
            overall_timeout_secs: 60,
        }
    }
}

impl RetryPolicy {
    /// Computed delay before retry number `retry` (0-based):
    /// `base * 2^retry`, capped at `max_delay_ms`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.overall_timeout_secs)
    }
}

impl Settings {
    /// Parse settings from a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| CoreError::Config(format!("invalid settings JSON: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults overridden by environment variables, where set.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Settings::from_env`] but reading from an arbitrary lookup,
    /// so callers (and tests) need not touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(key) = lookup("COINGECKO_API_KEY").filter(|k| !k.trim().is_empty()) {
            settings.api_key = Some(key.trim().to_string());
        }
        if let Some(url) = lookup("COINFOLIO_API_BASE_URL") {
            settings.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(currency) = lookup("COINFOLIO_QUOTE_CURRENCY") {
            settings.quote_currency = currency.trim().to_lowercase();
        }
        if let Some(v) = lookup("COINFOLIO_PRICE_TTL_SECS") {
            settings.price_ttl_secs = parse_var("COINFOLIO_PRICE_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("COINFOLIO_MAX_RETRIES") {
            settings.retry.max_retries = parse_var("COINFOLIO_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("COINFOLIO_RETRY_BASE_MS") {
            settings.retry.base_delay_ms = parse_var("COINFOLIO_RETRY_BASE_MS", &v)?;
        }
        if let Some(v) = lookup("COINFOLIO_REQUEST_TIMEOUT_SECS") {
            settings.retry.request_timeout_secs = parse_var("COINFOLIO_REQUEST_TIMEOUT_SECS", &v)?;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.price_ttl_secs == 0 {
            return Err(CoreError::Config("price TTL must be greater than zero".into()));
        }
        if self.quote_currency.trim().is_empty() {
            return Err(CoreError::Config("quote currency must not be empty".into()));
        }
        if self.retry.request_timeout_secs == 0 || self.retry.overall_timeout_secs == 0 {
            return Err(CoreError::Config("timeouts must be greater than zero".into()));
        }
        if self.retry.max_retries > MAX_RETRIES_LIMIT {
            return Err(CoreError::Config(format!(
                "max retries must be at most {MAX_RETRIES_LIMIT}, got {}",
                self.retry.max_retries
            )));
        }
        Ok(())
    }

    pub fn price_ttl(&self) -> Duration {
        Duration::from_secs(self.price_ttl_secs)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, CoreError> {
    value
        .trim()
        .parse()
        .map_err(|_| CoreError::Config(format!("{name} has an invalid value: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            base_delay_ms: 1_000,
            max_delay_ms: 5_000,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(5));
        assert_eq!(policy.backoff_delay(200), Duration::from_secs(5));
    }
}
