use std::time::Duration;

use thiserror::Error;

/// Unified error type for the entire coinfolio-core library.
/// Every public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Upstream price source ───────────────────────────────────────
    #[error("Upstream rate limited the request{}", fmt_retry_after(.retry_after))]
    UpstreamRateLimited { retry_after: Option<Duration> },

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream rejected the request ({status}): {message}")]
    UpstreamRejected { status: u16, message: String },

    #[error("Price fetch failed after {attempts} attempt(s): {source}")]
    FetchExhausted {
        attempts: u32,
        #[source]
        source: Box<CoreError>,
    },

    #[error("No price data for asset: {0}")]
    NoPriceData(String),

    // ── Network / decoding ──────────────────────────────────────────
    #[error("Network error: {0}")]
    Network(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ── Collaborators & business logic ──────────────────────────────
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Ledger read failed: {0}")]
    Ledger(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn fmt_retry_after(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}

/// How the fetcher should react to an upstream error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Terminal for this request: malformed request, unknown asset, bad config.
    Never,
    /// Transient: rate limiting, timeouts, connection failures, 5xx.
    WithBackoff,
}

impl CoreError {
    /// Classify the error for the retry loop.
    ///
    /// ```
    /// use coinfolio_core::errors::{CoreError, RetryClass};
    ///
    /// let err = CoreError::UpstreamRateLimited { retry_after: None };
    /// assert_eq!(err.retry_class(), RetryClass::WithBackoff);
    ///
    /// let err = CoreError::UpstreamRejected { status: 404, message: "coin not found".into() };
    /// assert_eq!(err.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::UpstreamRateLimited { .. }
            | Self::UpstreamUnavailable(_)
            | Self::Network(_) => RetryClass::WithBackoff,

            Self::UpstreamRejected { .. }
            | Self::FetchExhausted { .. }
            | Self::NoPriceData(_)
            | Self::Deserialization(_)
            | Self::InvalidTransaction(_)
            | Self::Ledger(_)
            | Self::Config(_) => RetryClass::Never,
        }
    }

    /// Explicit wait requested by the upstream, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::UpstreamRateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors often carry the full URL, including the API key in the query.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };

        if e.is_timeout() || e.is_connect() {
            return CoreError::UpstreamUnavailable(sanitized);
        }
        if let Some(status) = e.status() {
            if status.as_u16() == 429 {
                return CoreError::UpstreamRateLimited { retry_after: None };
            }
            if status.is_server_error() {
                return CoreError::UpstreamUnavailable(sanitized);
            }
            if status.is_client_error() {
                return CoreError::UpstreamRejected {
                    status: status.as_u16(),
                    message: sanitized,
                };
            }
        }
        if e.is_decode() {
            return CoreError::Deserialization(sanitized);
        }
        CoreError::Network(sanitized)
    }
}
