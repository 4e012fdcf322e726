//! Bounded retry of rate-limited (HTTP 429) calls.
//!
//! Only 429 is retried. The wait comes from the `Retry-After` header, read as
//! whole seconds and capped; other statuses and transport failures go back to
//! the caller untouched.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::sleep::Sleeper;

pub const RATE_LIMITED_STATUS: u16 = 429;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(15 * 60);

/// Configuration for the rate-limit retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt. Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// Wait used when `Retry-After` is absent or not an integer.
    pub default_delay: Duration,
    /// Upper bound applied to any advertised wait.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            default_delay: DEFAULT_RETRY_AFTER,
            max_delay: MAX_RETRY_AFTER,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Wait before reissuing a request that got `response`.
    pub fn delay_for(&self, response: &HttpResponse) -> Duration {
        response
            .header("retry-after")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.default_delay)
            .min(self.max_delay)
    }
}

/// Send `request`, sleeping and reissuing it verbatim while the server answers 429.
///
/// Any non-429 response is returned as-is. Once the retry budget is spent the
/// call fails with [`PipelineError::RateLimited`].
pub async fn execute_with_retry(
    client: &dyn HttpClient,
    sleeper: &dyn Sleeper,
    config: &RetryConfig,
    request: &HttpRequest,
) -> Result<HttpResponse, PipelineError> {
    let url = request.redacted_url();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let response = client.execute(request.clone()).await.map_err(|error| {
            warn!(url = %url, attempt, timed_out = error.timed_out(), error = %error, "request failed");
            PipelineError::Transport(error)
        })?;
        if response.status != RATE_LIMITED_STATUS {
            debug!(url = %url, status = response.status, attempt, "response received");
            return Ok(response);
        }

        let delay = config.delay_for(&response);
        if attempt > config.max_retries {
            return Err(PipelineError::RateLimited {
                attempts: attempt,
                retry_after_secs: delay.as_secs(),
            });
        }

        warn!(
            url = %url,
            attempt,
            delay_secs = delay.as_secs(),
            "rate limited, waiting before retry"
        );
        sleeper.sleep(delay).await;
    }
}
