//! GitHub API client (repository provider)
//!
//! Counts repositories created for a language over a date interval through the
//! GraphQL search API, and reads the live language catalog from the advanced
//! search page.

use crate::services::provider::{
    normalize_interval, LanguageCatalogSource, ProviderCount, ProviderError, ScoreProvider,
};
use crate::services::retry::{retry_with_backoff, RetryPolicy, Sleeper, TokioSleeper};
use async_trait::async_trait;
use chrono::NaiveDate;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use langtrends_common::time::format_date;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";
const GITHUB_LANGUAGES_URL: &str = "https://github.com/search/advanced";
const USER_AGENT: &str = concat!("langtrends-data/", env!("CARGO_PKG_VERSION"));
const PROVIDER_NAME: &str = "GitHub";

const SEARCH_QUERY: &str = "query($searchQuery: String!) { \
    search(query: $searchQuery, type: REPOSITORY) { repositoryCount } \
    rateLimit { remaining } }";

/// GitHub client configuration
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// Required; the GraphQL API rejects anonymous access
    pub api_key: String,
    pub requests_per_second: u32,
    pub retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<SearchData>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchData {
    search: SearchResult,
    rate_limit: Option<RateLimitInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    repository_count: u64,
}

#[derive(Debug, Deserialize)]
struct RateLimitInfo {
    remaining: u64,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

/// GitHub API client
pub struct GitHubClient {
    http_client: reqwest::Client,
    api_key: String,
    rate_limiter: DefaultDirectRateLimiter,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::InvalidApiKey);
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http_client,
            api_key: config.api_key,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
            retry: config.retry,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the sleeper used between retries
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Search qualifier for repositories created in [from, to)
    ///
    /// GitHub date ranges are inclusive, so the day before `to` ends the range.
    /// Spaces in language names become dashes.
    pub fn build_search_query(language_name: &str, from: NaiveDate, to: NaiveDate) -> String {
        let last_day = to.pred_opt().unwrap_or(to);
        format!(
            "language:{} created:{}..{}",
            language_name.replace(' ', "-"),
            format_date(from),
            format_date(last_day)
        )
    }

    async fn search_once(&self, body: &serde_json::Value) -> Result<ProviderCount, ProviderError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .http_client
            .post(GITHUB_GRAPHQL_URL)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = header_u64(&response, reqwest::header::RETRY_AFTER.as_str())
                .map(Duration::from_secs);
            let remaining = header_u64(&response, "x-ratelimit-remaining");
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), retry_after, remaining, error_text));
        }

        let parsed: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        parse_search_response(parsed)
    }

    async fn fetch_catalog_page(&self) -> Result<String, ProviderError> {
        let response = self
            .http_client
            .get(GITHUB_LANGUAGES_URL)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = header_u64(&response, reqwest::header::RETRY_AFTER.as_str())
                .map(Duration::from_secs);
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), retry_after, None, error_text));
        }

        response
            .text()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl ScoreProvider for GitHubClient {
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

        let search_query = Self::build_search_query(tag, from, to);
        tracing::debug!(query = %search_query, "Querying GitHub API");

        let body = json!({
            "query": SEARCH_QUERY,
            "variables": { "searchQuery": search_query },
        });
        let body = &body;

        retry_with_backoff(&self.retry, self.sleeper.as_ref(), PROVIDER_NAME, move || {
            self.search_once(body)
        })
        .await
    }
}

#[async_trait]
impl LanguageCatalogSource for GitHubClient {
    fn catalog_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn fetch_language_names(&self) -> Result<Vec<String>, ProviderError> {
        let html = retry_with_backoff(&self.retry, self.sleeper.as_ref(), PROVIDER_NAME, move || {
            self.fetch_catalog_page()
        })
        .await?;

        let names = parse_language_names(&html)?;
        tracing::info!(count = names.len(), "Fetched language catalog from GitHub");
        Ok(names)
    }
}

fn header_u64(response: &reqwest::Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Map a non-success HTTP status to a provider error
fn classify_status(
    status: u16,
    retry_after: Option<Duration>,
    ratelimit_remaining: Option<u64>,
    error_text: String,
) -> ProviderError {
    match status {
        401 => ProviderError::InvalidApiKey,
        // Secondary (abuse) limits send Retry-After; an exhausted primary quota does not
        403 | 429 if retry_after.is_some() => ProviderError::RateLimited { retry_after },
        403 | 429 if ratelimit_remaining == Some(0) => ProviderError::QuotaExhausted(PROVIDER_NAME),
        429 => ProviderError::RateLimited { retry_after: None },
        500..=599 => ProviderError::Unavailable(status),
        _ => ProviderError::ApiError(status, error_text),
    }
}

fn parse_search_response(response: GraphQlResponse) -> Result<ProviderCount, ProviderError> {
    if let Some(data) = response.data {
        return Ok(ProviderCount::new(
            data.search.repository_count,
            data.rate_limit.map(|r| r.remaining),
        ));
    }

    let errors = response.errors.unwrap_or_default();
    if errors
        .iter()
        .any(|e| e.error_type.as_deref() == Some("RATE_LIMITED"))
    {
        return Err(ProviderError::QuotaExhausted(PROVIDER_NAME));
    }

    match errors.into_iter().next() {
        Some(error) => Err(ProviderError::QueryRejected(format!(
            "GitHub API error ({})",
            error.message
        ))),
        None => Err(ProviderError::ParseError(
            "GitHub response contained neither data nor errors".to_string(),
        )),
    }
}

/// Extract the ordered language names from the advanced search page
///
/// Names are the `<option>` labels inside the optgroups of the `search_language`
/// select; the leading "Any language" option sits outside any optgroup.
pub fn parse_language_names(html: &str) -> Result<Vec<String>, ProviderError> {
    let regex = |pattern: &str| {
        Regex::new(pattern).map_err(|e| ProviderError::ParseError(e.to_string()))
    };
    let select_re = regex(r#"(?s)<select[^>]*\bid="search_language"[^>]*>(.*?)</select>"#)?;
    let optgroup_re = regex(r"(?s)<optgroup[^>]*>(.*?)</optgroup>")?;
    let option_re = regex(r"(?s)<option[^>]*>(.*?)</option>")?;
    let entity_re = regex(r"&(?:#([0-9]+)|#[xX]([0-9a-fA-F]+)|(quot|apos|lt|gt|amp));")?;

    let select = select_re
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| {
            ProviderError::ParseError("Language select not found on GitHub search page".to_string())
        })?;

    let names: Vec<String> = optgroup_re
        .captures_iter(select.as_str())
        .filter_map(|group| group.get(1))
        .flat_map(|group| {
            option_re
                .captures_iter(group.as_str())
                .filter_map(|option| option.get(1))
                .map(|label| decode_entities(&entity_re, label.as_str().trim()))
                .collect::<Vec<_>>()
        })
        .filter(|name| !name.is_empty())
        .collect();

    if names.is_empty() {
        return Err(ProviderError::ParseError(
            "No languages found on GitHub search page".to_string(),
        ));
    }

    Ok(names)
}

/// Decode character references in one pass, so `&amp;#43;` stays `&#43;`
fn decode_entities(entity_re: &Regex, text: &str) -> String {
    entity_re
        .replace_all(text, |caps: &regex::Captures| {
            let decoded = match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(dec), _, _) => dec.as_str().parse().ok().and_then(char::from_u32),
                (_, Some(hex), _) => u32::from_str_radix(hex.as_str(), 16)
                    .ok()
                    .and_then(char::from_u32),
                (_, _, Some(named)) => match named.as_str() {
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    _ => Some('&'),
                },
                _ => None,
            };
            // Invalid code points are left as written
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}
