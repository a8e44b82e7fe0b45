//! In-memory providers
//!
//! Counts grow by a fixed rate per tag per month, so any [from, to) window is
//! `rate * months`. No network access.

use async_trait::async_trait;
use chrono::NaiveDate;
use langtrends_common::time::months_between;
use langtrends_data::services::provider::normalize_interval;
use langtrends_data::services::{
    LanguageCatalogSource, ProviderCount, ProviderError, ScoreProvider,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct RateProvider {
    name: &'static str,
    rates: HashMap<String, u64>,
    /// Per-window overrides keyed by (tag, from, to)
    windows: HashMap<(String, NaiveDate, NaiveDate), u64>,
    quota_remaining: Mutex<Option<u64>>,
    calls: AtomicUsize,
}

impl RateProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rates: HashMap::new(),
            windows: HashMap::new(),
            quota_remaining: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_rate(mut self, tag: &str, per_month: u64) -> Self {
        self.rates.insert(tag.to_string(), per_month);
        self
    }

    pub fn with_window(mut self, tag: &str, from: NaiveDate, to: NaiveDate, count: u64) -> Self {
        self.windows.insert((tag.to_string(), from, to), count);
        self
    }

    /// Remaining quota, decremented on every call
    pub fn with_quota(self, remaining: u64) -> Self {
        *self.quota_remaining.lock().unwrap() = Some(remaining);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoreProvider for RateProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn get_count(
        &self,
        tag: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<ProviderCount, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (from, to) = normalize_interval(from_date, to_date);

        let count = match self.windows.get(&(tag.to_string(), from, to)) {
            Some(&count) => count,
            None => self.rates.get(tag).copied().unwrap_or(0) * u64::from(months_between(from, to)),
        };

        let mut quota = self.quota_remaining.lock().unwrap();
        if let Some(remaining) = quota.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        Ok(ProviderCount::new(count, *quota))
    }
}

/// Fixed live catalog
pub struct StaticCatalog {
    names: Vec<String>,
}

impl StaticCatalog {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

#[async_trait]
impl LanguageCatalogSource for StaticCatalog {
    fn catalog_name(&self) -> &'static str {
        "GitHub"
    }

    async fn fetch_language_names(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.names.clone())
    }
}
