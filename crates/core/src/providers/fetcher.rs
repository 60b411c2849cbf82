use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::traits::PriceProvider;
use crate::errors::{CoreError, RetryClass};
use crate::models::price::{PriceMap, PriceRequest};
use crate::models::settings::RetryPolicy;

/// Wraps a [`PriceProvider`] with bounded retries and timeouts.
///
/// - Transient failures (429, 5xx, timeouts, connection errors) are retried
///   up to `max_retries` times. The wait is `base * 2^n`, unless the
///   upstream sent a retry-after hint, which wins.
/// - Anything else fails on the spot with the original error.
/// - Every attempt is bounded by the per-request timeout, and the whole
///   loop by the overall deadline.
/// - When retries run out the result is [`CoreError::FetchExhausted`]
///   carrying the last cause.
pub struct RateLimitedFetcher {
    provider: Arc<dyn PriceProvider>,
    policy: RetryPolicy,
}

impl RateLimitedFetcher {
    pub fn new(provider: Arc<dyn PriceProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn fetch(&self, request: &PriceRequest) -> Result<PriceMap, CoreError> {
        // Elapsed-based; never add a configured or upstream duration to an Instant.
        let started = Instant::now();
        let overall = self.policy.overall_timeout();
        let max_attempts = self.policy.max_retries.saturating_add(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let remaining = overall.saturating_sub(started.elapsed());
            let budget = remaining.min(self.policy.request_timeout());

            let err = match tokio::time::timeout(budget, self.provider.fetch_prices(request)).await {
                Ok(Ok(prices)) => {
                    if attempt > 1 {
                        debug!(
                            "{} answered for [{}] on attempt {attempt}",
                            self.provider.name(),
                            request.asset_ids
                        );
                    }
                    return Ok(prices);
                }
                Ok(Err(e)) => e,
                Err(_) => CoreError::UpstreamUnavailable(format!(
                    "{} did not answer within {}ms",
                    self.provider.name(),
                    budget.as_millis()
                )),
            };

            if err.retry_class() == RetryClass::Never {
                warn!(
                    "{} rejected request for [{}]: {err}",
                    self.provider.name(),
                    request.asset_ids
                );
                return Err(err);
            }

            if attempt >= max_attempts {
                warn!(
                    "{} failed {attempt} time(s) for [{}], giving up: {err}",
                    self.provider.name(),
                    request.asset_ids
                );
                return Err(CoreError::FetchExhausted {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let delay = self.delay_for(&err, attempt - 1);
            if delay >= overall.saturating_sub(started.elapsed()) {
                warn!(
                    "{} retry for [{}] would pass the {}s deadline, giving up: {err}",
                    self.provider.name(),
                    request.asset_ids,
                    self.policy.overall_timeout_secs
                );
                return Err(CoreError::FetchExhausted {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            warn!(
                "{} attempt {attempt}/{max_attempts} for [{}] failed ({err}), retrying in {}ms",
                self.provider.name(),
                request.asset_ids,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Upstream hint if present, otherwise exponential backoff.
    fn delay_for(&self, err: &CoreError, retry: u32) -> Duration {
        err.retry_after()
            .unwrap_or_else(|| self.policy.backoff_delay(retry))
    }
}
