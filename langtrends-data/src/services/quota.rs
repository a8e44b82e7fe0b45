//! Remaining-quota inspection after every provider call

use crate::services::provider::ProviderError;
use tracing::warn;

/// Outcome of a non-terminal quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaStatus {
    /// Provider did not report a counter
    Unknown,
    Healthy(u64),
    /// At or below one batch worth of requests; a warning was logged
    Low(u64),
}

/// Escalates provider quota counters
///
/// Warns once the remaining quota is at or below one batch worth of requests,
/// and fails terminally when nothing is left.
#[derive(Debug, Clone, Copy)]
pub struct QuotaInspector {
    warn_threshold: u64,
}

impl QuotaInspector {
    pub fn new(warn_threshold: u64) -> Self {
        Self { warn_threshold }
    }

    pub fn inspect(
        &self,
        provider: &'static str,
        quota_remaining: Option<u64>,
    ) -> Result<QuotaStatus, ProviderError> {
        match quota_remaining {
            None => Ok(QuotaStatus::Unknown),
            Some(0) => Err(ProviderError::QuotaExhausted(provider)),
            Some(remaining) if remaining <= self.warn_threshold => {
                warn!(provider, remaining, "{} API quota remaining: {}", provider, remaining);
                Ok(QuotaStatus::Low(remaining))
            }
            Some(remaining) => Ok(QuotaStatus::Healthy(remaining)),
        }
    }
}
