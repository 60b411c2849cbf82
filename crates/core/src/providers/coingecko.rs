use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::warn;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use super::traits::PriceProvider;
use crate::errors::CoreError;
use crate::models::price::{PriceMap, PriceRequest, PriceSnapshot};
use crate::models::settings::Settings;

const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// Longest error body we echo back in a rejection message.
const MAX_ERROR_BODY: usize = 200;

/// CoinGecko `simple/price` provider.
///
/// - **Free tier**: works without a key; a demo key raises the rate limit.
/// - **Endpoint**: `/simple/price?ids={a,b}&vs_currencies={usd}&include_24hr_change=true`
/// - **Ids**: CoinGecko uses lowercase slugs like "bitcoin", "ethereum".
///
/// One call is one HTTP request. Retrying is the fetcher's job; this type
/// only translates the HTTP outcome into the right [`CoreError`] variant.
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoProvider {
    pub fn new() -> Self {
        Self::from_settings(&Settings::default())
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let client = Client::builder()
            .timeout(settings.retry.request_timeout())
            .build()
            .unwrap_or_else(|e| {
                warn!("CoinGecko client setup failed ({e}); using a default client without the configured timeout");
                Client::new()
            });
        Self {
            client,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        }
    }

    fn price_url(&self) -> String {
        format!("{}/simple/price", self.base_url)
    }
}

impl Default for CoinGeckoProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ── CoinGecko API response types ────────────────────────────────────

/// `{"bitcoin": {"usd": 67000.1, "usd_24h_change": -1.2}, ...}`
type SimplePriceResponse = HashMap<String, HashMap<String, Option<f64>>>;

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Turn a `simple/price` body into snapshots.
///
/// Entries without a price for `vs_currency` are dropped; a missing 24h
/// change reads as zero.
pub fn parse_simple_price(
    body: &str,
    vs_currency: &str,
    fetched_at: DateTime<Utc>,
) -> Result<PriceMap, CoreError> {
    let raw: SimplePriceResponse = serde_json::from_str(body)?;
    let change_key = format!("{vs_currency}_24h_change");

    let prices = raw
        .into_iter()
        .filter_map(|(id, fields)| {
            let price = fields.get(vs_currency).copied().flatten()?;
            let price = Decimal::from_f64(price)?;
            let change = fields
                .get(&change_key)
                .copied()
                .flatten()
                .and_then(Decimal::from_f64)
                .unwrap_or(Decimal::ZERO);
            Some((id.clone(), PriceSnapshot::new(id, price, change, fetched_at)))
        })
        .collect();
    Ok(prices)
}

/// Read a `Retry-After` value, given either as delta-seconds or an HTTP-date.
pub fn parse_retry_after(value: &str, now: SystemTime) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = httpdate::parse_http_date(value).ok()?;
    Some(at.duration_since(now).unwrap_or(Duration::ZERO))
}

fn retry_after_from(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, SystemTime::now()))
}

/// Map a non-success status to the upstream error taxonomy.
pub fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> CoreError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return CoreError::UpstreamRateLimited { retry_after };
    }
    // 5xx retry-after hints are not carried; the fetcher backs off instead.
    if status.is_server_error() {
        return CoreError::UpstreamUnavailable(format!("CoinGecko returned {status}"));
    }
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| body.chars().take(MAX_ERROR_BODY).collect());
    CoreError::UpstreamRejected {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl PriceProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        "CoinGecko"
    }

    async fn fetch_prices(&self, request: &PriceRequest) -> Result<PriceMap, CoreError> {
        if request.asset_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids = request.asset_ids.joined();
        let mut builder = self.client.get(self.price_url()).query(&[
            ("ids", ids.as_str()),
            ("vs_currencies", request.vs_currency.as_str()),
            ("include_24hr_change", "true"),
        ]);
        if let Some(key) = &self.api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let retry_after = retry_after_from(resp.headers());
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, &body));
        }

        let body = resp.text().await?;
        parse_simple_price(&body, &request.vs_currency, Utc::now())
    }
}
