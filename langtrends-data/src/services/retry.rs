//! Retry loop for transient provider failures
//!
//! Shared by both provider clients. Sleeping goes through an injected [`Sleeper`]
//! so backoff timing is testable without wall-clock delays.

use crate::services::provider::ProviderError;
use async_trait::async_trait;
use langtrends_common::config::RetrySettings;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Async sleep abstraction
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeper backed by `tokio::time::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How many times to retry and how long to wait without a provider hint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries until success or a terminal error
    pub max_retries: Option<u32>,
    pub fixed_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            fixed_backoff: Duration::from_secs(settings.fixed_backoff_secs),
        }
    }
}

/// Run `operation` until it succeeds, fails terminally, or retries run out
///
/// Retryable errors wait for the provider's hint when present, otherwise for
/// `policy.fixed_backoff`. The last error is returned once retries are exhausted.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    label: &str,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut retries: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                if policy.max_retries.is_some_and(|max| retries >= max) {
                    return Err(e);
                }

                let wait = e.retry_after().unwrap_or(policy.fixed_backoff);
                warn!(
                    provider = label,
                    error = %e,
                    retry = retries + 1,
                    "Transient provider error; retrying in {}s",
                    wait.as_secs()
                );
                sleeper.sleep(wait).await;
                retries += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
