// ═══════════════════════════════════════════════════════════════════
// Error Tests: CoreError variants, Display formatting and retry classes
// ═══════════════════════════════════════════════════════════════════

use std::error::Error;
use std::time::Duration;

use coinfolio_core::errors::{CoreError, RetryClass};

// ── Display formatting ──────────────────────────────────────────────

mod display {
    use super::*;

    #[test]
    fn rate_limited_without_hint() {
        let err = CoreError::UpstreamRateLimited { retry_after: None };
        assert_eq!(err.to_string(), "Upstream rate limited the request");
    }

    #[test]
    fn rate_limited_with_hint() {
        let err = CoreError::UpstreamRateLimited {
            retry_after: Some(Duration::from_secs(5)),
        };
        assert_eq!(
            err.to_string(),
            "Upstream rate limited the request (retry after 5s)"
        );
    }

    #[test]
    fn upstream_unavailable() {
        let err = CoreError::UpstreamUnavailable("CoinGecko returned 503".into());
        assert_eq!(err.to_string(), "Upstream unavailable: CoinGecko returned 503");
    }

    #[test]
    fn upstream_rejected() {
        let err = CoreError::UpstreamRejected {
            status: 404,
            message: "coin not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "Upstream rejected the request (404): coin not found"
        );
    }

    #[test]
    fn fetch_exhausted_includes_last_cause() {
        let err = CoreError::FetchExhausted {
            attempts: 3,
            source: Box::new(CoreError::UpstreamRateLimited { retry_after: None }),
        };
        assert_eq!(
            err.to_string(),
            "Price fetch failed after 3 attempt(s): Upstream rate limited the request"
        );
    }

    #[test]
    fn no_price_data() {
        let err = CoreError::NoPriceData("mystery-coin".into());
        assert_eq!(err.to_string(), "No price data for asset: mystery-coin");
    }

    #[test]
    fn invalid_transaction() {
        let err = CoreError::InvalidTransaction("quantity must be positive".into());
        assert_eq!(
            err.to_string(),
            "Invalid transaction: quantity must be positive"
        );
    }

    #[test]
    fn ledger() {
        let err = CoreError::Ledger("connection refused".into());
        assert_eq!(err.to_string(), "Ledger read failed: connection refused");
    }

    #[test]
    fn config() {
        let err = CoreError::Config("price TTL must be greater than zero".into());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: price TTL must be greater than zero"
        );
    }
}

// ── Retry classification ────────────────────────────────────────────

mod retry_class {
    use super::*;

    #[test]
    fn rate_limited_retries() {
        let err = CoreError::UpstreamRateLimited { retry_after: None };
        assert_eq!(err.retry_class(), RetryClass::WithBackoff);
    }

    #[test]
    fn unavailable_retries() {
        let err = CoreError::UpstreamUnavailable("timeout".into());
        assert_eq!(err.retry_class(), RetryClass::WithBackoff);
    }

    #[test]
    fn network_retries() {
        let err = CoreError::Network("connection reset by peer".into());
        assert_eq!(err.retry_class(), RetryClass::WithBackoff);
    }

    #[test]
    fn rejected_never_retries() {
        let err = CoreError::UpstreamRejected {
            status: 400,
            message: "bad request".into(),
        };
        assert_eq!(err.retry_class(), RetryClass::Never);
    }

    #[test]
    fn exhausted_never_retries() {
        let err = CoreError::FetchExhausted {
            attempts: 4,
            source: Box::new(CoreError::UpstreamUnavailable("503".into())),
        };
        assert_eq!(err.retry_class(), RetryClass::Never);
    }

    #[test]
    fn malformed_body_never_retries() {
        let err = CoreError::Deserialization("expected value".into());
        assert_eq!(err.retry_class(), RetryClass::Never);
    }

    #[test]
    fn retry_after_only_from_rate_limit() {
        let hinted = CoreError::UpstreamRateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(hinted.retry_after(), Some(Duration::from_secs(7)));

        let other = CoreError::UpstreamUnavailable("503".into());
        assert_eq!(other.retry_after(), None);
    }
}

// ── From impls & std::error::Error ──────────────────────────────────

mod conversions {
    use super::*;

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CoreError = json_err.into();
        assert!(matches!(err, CoreError::Deserialization(_)));
    }

    #[test]
    fn exhausted_exposes_source() {
        let err = CoreError::FetchExhausted {
            attempts: 2,
            source: Box::new(CoreError::UpstreamUnavailable("reset".into())),
        };
        let source = err.source().expect("exhausted error should carry its cause");
        assert_eq!(source.to_string(), "Upstream unavailable: reset");
    }

    #[test]
    fn leaf_errors_have_no_source() {
        let err = CoreError::NoPriceData("x".into());
        assert!(err.source().is_none());
    }

    #[test]
    fn errors_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CoreError>();
    }
}
