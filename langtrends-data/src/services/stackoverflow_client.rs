//! Stack Overflow API client (question-tag provider)
//!
//! Counts questions carrying a tag over a date interval through the Stack
//! Exchange search API.

use crate::services::provider::{normalize_interval, ProviderCount, ProviderError, ScoreProvider};
use crate::services::retry::{retry_with_backoff, RetryPolicy, Sleeper, TokioSleeper};
use async_trait::async_trait;
use chrono::NaiveDate;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const STACKEXCHANGE_SEARCH_URL: &str = "https://api.stackexchange.com/2.2/search";
/// Custom filter returning only `backoff`, `quota_remaining` and `total`
const RESPONSE_FILTER: &str = "!.UE8F0bVg4M-_Ii4";
const USER_AGENT: &str = concat!("langtrends-data/", env!("CARGO_PKG_VERSION"));
const PROVIDER_NAME: &str = "Stack Overflow";

/// Stack Overflow client configuration
#[derive(Debug, Clone)]
pub struct StackOverflowConfig {
    /// Optional; raises the daily quota
    pub api_key: Option<String>,
    pub requests_per_second: u32,
    pub retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    total: u64,
    quota_remaining: u64,
    backoff: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    error_name: Option<String>,
    error_message: Option<String>,
}

/// Stack Overflow API client
pub struct StackOverflowClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    rate_limiter: DefaultDirectRateLimiter,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    /// Set from the `backoff` field; no request may be sent before this instant
    backoff_until: Mutex<Option<Instant>>,
}

impl StackOverflowClient {
    pub fn new(config: StackOverflowConfig) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http_client,
            api_key: config.api_key.filter(|k| !k.trim().is_empty()),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
            retry: config.retry,
            sleeper: Arc::new(TokioSleeper),
            backoff_until: Mutex::new(None),
        })
    }

    /// Replace the sleeper used between retries and for `backoff` waits
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Tags are lower-case with dashes for spaces
    pub fn encode_tag(language_name: &str) -> String {
        language_name.to_lowercase().replace(' ', "-")
    }

    /// Query parameters for questions tagged `tag` in [from, to)
    ///
    /// API dates are unix epoch seconds and `todate` is inclusive, so the range
    /// ends one second before `to`.
    fn build_query(&self, tag: &str, from: NaiveDate, to: NaiveDate) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("fromdate", epoch_seconds(from).to_string()),
            ("todate", (epoch_seconds(to) - 1).to_string()),
            ("site", "stackoverflow".to_string()),
            ("tagged", Self::encode_tag(tag)),
            ("filter", RESPONSE_FILTER.to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("key", key.clone()));
        }
        params
    }

    async fn wait_for_backoff(&self) {
        let until = *self.backoff_until.lock().await;
        if let Some(until) = until {
            let now = Instant::now();
            if until > now {
                let wait = until - now;
                tracing::debug!("Stack Overflow backoff: waiting {:?}", wait);
                self.sleeper.sleep(wait).await;
            }
        }
    }

    async fn search_once(
        &self,
        params: &[(&'static str, String)],
    ) -> Result<ProviderCount, ProviderError> {
        self.wait_for_backoff().await;
        self.rate_limiter.until_ready().await;

        let response = self
            .http_client
            .get(STACKEXCHANGE_SEARCH_URL)
            .query(params)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &error_text));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        if let Some(seconds) = body.backoff {
            tracing::warn!(seconds, "Stack Overflow API requested backoff");
            *self.backoff_until.lock().await = Some(Instant::now() + Duration::from_secs(seconds));
        }

        Ok(ProviderCount::new(body.total, Some(body.quota_remaining)))
    }
}

#[async_trait]
impl ScoreProvider for StackOverflowClient {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn get_count(
        &self,
        tag: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<ProviderCount, ProviderError> {
        let (from, to) = normalize_interval(from_date, to_date);
        if from == to {
            return Ok(ProviderCount::new(0, None));
        }

        let params = self.build_query(tag, from, to);
        tracing::debug!(tag = %tag, from = %from, to = %to, "Querying Stack Overflow API");
        let params = params.as_slice();

        retry_with_backoff(&self.retry, self.sleeper.as_ref(), PROVIDER_NAME, move || {
            self.search_once(params)
        })
        .await
    }
}

fn epoch_seconds(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Map a non-success HTTP status to a provider error
fn classify_status(status: u16, error_text: &str) -> ProviderError {
    let error: ErrorResponse = serde_json::from_str(error_text).unwrap_or_default();
    let message = error
        .error_message
        .unwrap_or_else(|| error_text.to_string());

    match (status, error.error_name.as_deref()) {
        // Daily limit exceeded
        (400, Some("throttle_violation")) => ProviderError::QuotaExhausted(PROVIDER_NAME),
        (400, Some("key_required" | "access_denied")) | (401 | 403, _) => {
            ProviderError::InvalidApiKey
        }
        (429, _) => ProviderError::RateLimited { retry_after: None },
        (500..=599, _) => ProviderError::Unavailable(status),
        _ => ProviderError::ApiError(status, message),
    }
}
