//! Front-end settings lookup
//!
//! The front end decides how many dates its charts show; the condensed series
//! is sized from its published `settings.json`.

use crate::services::provider::ProviderError;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FrontendSettings {
    number_of_dates: usize,
}

/// Extract `numberOfDates` from a front-end settings document
pub fn parse_number_of_dates(body: &str) -> Result<usize, ProviderError> {
    serde_json::from_str::<FrontendSettings>(body)
        .map(|s| s.number_of_dates)
        .map_err(|e| ProviderError::ParseError(format!("Front-end settings: {}", e)))
}

/// Fetch `numberOfDates` from the front end's settings URL
pub async fn fetch_number_of_dates(url: &str) -> Result<usize, ProviderError> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

    let response = http_client
        .get(url)
        .send()
        .await
        .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(ProviderError::ApiError(status.as_u16(), error_text));
    }

    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::NetworkError(e.to_string()))?;
    let number_of_dates = parse_number_of_dates(&body)?;
    tracing::debug!(number_of_dates, "Loaded front-end settings from {}", url);
    Ok(number_of_dates)
}
