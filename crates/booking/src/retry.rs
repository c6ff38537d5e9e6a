use std::future::Future;
use std::time::Duration;

use tracing::warn;
use tripwise_core::config::BookingConfig;

use crate::transport::TransportError;
use crate::ProviderError;

/// Bounded retry with a fixed delay between attempts. `max_retries = 3` allows four
/// attempts in total.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, delay: Duration::from_millis(2_000) }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &BookingConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Runs `call` until it succeeds or the attempt budget is spent. Every transport
    /// error is retried, including non-success statuses.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    warn!(
                        event_name = "booking.search.attempt_failed",
                        operation,
                        attempt,
                        max_attempts,
                        error = %error,
                        "provider call failed"
                    );

                    if attempt >= max_attempts {
                        return Err(ProviderError::RetriesExhausted {
                            operation,
                            attempts: attempt,
                            last_error: error,
                        });
                    }

                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }
    }
}
