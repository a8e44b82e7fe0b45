//! Score provider capability shared by the repository and question-tag clients

use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

/// Provider client errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Rate limited{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("Service unavailable (HTTP {0})")]
    Unavailable(u16),

    #[error("{0} API quota exhausted")]
    QuotaExhausted(&'static str),

    #[error("Invalid or missing API key")]
    InvalidApiKey,

    #[error("Query rejected: {0}")]
    QueryRejected(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl ProviderError {
    /// Transient errors are retried inside the provider and never reach the engine
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::NetworkError(_)
                | ProviderError::RateLimited { .. }
                | ProviderError::Unavailable(_)
        )
    }

    /// Provider-supplied wait hint, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(wait) => format!(" (retry after {}s)", wait.as_secs()),
        None => String::new(),
    }
}

/// Count for one query plus the provider's remaining-quota counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCount {
    pub count: u64,
    pub quota_remaining: Option<u64>,
}

impl ProviderCount {
    pub fn new(count: u64, quota_remaining: Option<u64>) -> Self {
        Self {
            count,
            quota_remaining,
        }
    }
}

/// Counts activity for a tag over a half-open date interval
///
/// Implementations must return 0 for a zero-width interval, accept the two
/// dates in either order, and retry transient failures internally.
#[async_trait]
pub trait ScoreProvider: Send + Sync {
    /// Provider identifier used in logs and errors
    fn name(&self) -> &'static str;

    async fn get_count(
        &self,
        tag: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<ProviderCount, ProviderError>;
}

/// Source of the authoritative live catalog of language names
#[async_trait]
pub trait LanguageCatalogSource: Send + Sync {
    /// Catalog owner, used in logs and errors
    fn catalog_name(&self) -> &'static str;

    async fn fetch_language_names(&self) -> Result<Vec<String>, ProviderError>;
}

/// Order two dates so the earlier comes first
pub fn normalize_interval(a: NaiveDate, b: NaiveDate) -> (NaiveDate, NaiveDate) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

// ============================================================================
// Mock Provider for Testing
// ============================================================================
