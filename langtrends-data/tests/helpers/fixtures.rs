//! Tempdir-backed stores and populators

use super::providers::{RateProvider, StaticCatalog};
use chrono::NaiveDate;
use langtrends_data::models::{LanguageMetadata, LanguagesMetadata, Score};
use langtrends_data::services::PopulatorSettings;
use langtrends_data::{DataPopulator, DataStore};
use std::sync::Arc;
use tempfile::TempDir;

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn language_names(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Metadata including every name, with optional Stack Overflow tags
pub fn metadata_for(entries: &[(&str, Option<&str>)]) -> LanguagesMetadata {
    entries
        .iter()
        .map(|(name, tag)| {
            (
                name.to_string(),
                LanguageMetadata {
                    include: true,
                    stackoverflow_tag: tag.map(str::to_string),
                    ..Default::default()
                },
            )
        })
        .collect()
}

/// Temporary data directory plus the store over it
pub struct TestEnv {
    pub dir: TempDir,
    pub store: DataStore,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = DataStore::new(dir.path());
        Self { dir, store }
    }

    pub fn scores(&self) -> Vec<Score> {
        self.store.read_scores().unwrap()
    }
}

pub fn settings(oldest_date: NaiveDate, first_day_of_month: NaiveDate) -> PopulatorSettings {
    PopulatorSettings {
        oldest_date,
        first_day_of_month,
        max_concurrent_requests: 3,
        minimum_score: 1000,
        delta_floor: 100,
    }
}

/// Populator over `env` with a fixed live catalog
pub fn test_populator(
    env: &TestEnv,
    metadata: LanguagesMetadata,
    live_names: Vec<String>,
    oldest_date: NaiveDate,
    first_day_of_month: NaiveDate,
    repositories: Arc<RateProvider>,
    questions: Arc<RateProvider>,
) -> DataPopulator {
    DataPopulator::new(
        env.store.clone(),
        metadata,
        settings(oldest_date, first_day_of_month),
        repositories,
        questions,
        Arc::new(StaticCatalog::new(live_names.clone())),
    )
    .with_live_catalog(live_names)
}

pub fn write_scores(env: &TestEnv, scores: &[(NaiveDate, u32, u64)]) {
    let scores: Vec<Score> = scores
        .iter()
        .map(|&(date, language_id, points)| Score {
            date,
            language_id,
            points,
        })
        .collect();
    env.store.write_scores(&scores).unwrap();
}
