//! Run-level orchestration over the store, providers and engine
//!
//! Each operation reads its artifacts in full, works in memory, and writes the
//! result back in full.

use crate::models::{Language, LanguagesMetadata, Score, ScoreSet};
use crate::services::catalog_merger::{merge_catalog, CatalogMerge};
use crate::services::condenser::{condense, SampleConfig};
use crate::services::language_validator::{LanguageValidator, ValidationError};
use crate::services::maintenance::{self, MonthBreakdown, ScoreDeviation};
use crate::services::provider::{LanguageCatalogSource, ProviderError, ScoreProvider};
use crate::services::score_populator::{
    PopulateError, PopulationFailure, PopulatorSettings, ScorePopulator,
};
use crate::store::DataStore;
use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] langtrends_common::Error),
}

pub struct DataPopulator {
    store: DataStore,
    metadata: LanguagesMetadata,
    repositories: Arc<dyn ScoreProvider>,
    questions: Arc<dyn ScoreProvider>,
    catalog: Arc<dyn LanguageCatalogSource>,
    engine: ScorePopulator,
    /// Live catalog snapshot, fetched at most once per run
    live_catalog: Option<Vec<String>>,
}

impl DataPopulator {
    pub fn new(
        store: DataStore,
        metadata: LanguagesMetadata,
        settings: PopulatorSettings,
        repositories: Arc<dyn ScoreProvider>,
        questions: Arc<dyn ScoreProvider>,
        catalog: Arc<dyn LanguageCatalogSource>,
    ) -> Self {
        let engine = ScorePopulator::new(settings, repositories.clone(), questions.clone());
        Self {
            store,
            metadata,
            repositories,
            questions,
            catalog,
            engine,
            live_catalog: None,
        }
    }

    /// Use a fixed live catalog instead of fetching one
    pub fn with_live_catalog(mut self, names: Vec<String>) -> Self {
        self.live_catalog = Some(names);
        self
    }

    pub fn settings(&self) -> &PopulatorSettings {
        self.engine.settings()
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    async fn live_catalog(&mut self) -> Result<&[String], ProviderError> {
        if self.live_catalog.is_none() {
            let names = self.catalog.fetch_language_names().await?;
            self.live_catalog = Some(names);
        }
        Ok(self.live_catalog.as_deref().unwrap_or_default())
    }

    /// Merge the live catalog into `languages.json`
    ///
    /// `limit` caps the total number of tracked languages.
    pub async fn populate_languages(&mut self, limit: Option<usize>) -> Result<CatalogMerge, DataError> {
        let existing = self.store.read_languages()?;
        let live_names = self.live_catalog().await?.to_vec();

        let merge = merge_catalog(existing, &live_names, &self.metadata, limit);
        info!("Successfully populated {} languages", merge.added);

        self.store.write_languages(&merge.languages)?;
        Ok(merge)
    }

    /// Fill every missing score and persist the full history
    ///
    /// The history is sorted and written whether or not the walk succeeded, so
    /// progress made before a failure is kept.
    pub async fn populate_all_scores(&mut self, num_scores: Option<usize>) -> Result<usize, PopulationFailure> {
        let loaded = self
            .store
            .read_languages()
            .and_then(|languages| Ok((languages, self.store.read_scores()?)));
        let (languages, scores) =
            loaded.map_err(|e| PopulationFailure::new(0, PopulateError::Store(e)))?;

        let mut scores = ScoreSet::from(scores);
        let outcome = self
            .engine
            .populate_scores(&languages, self.live_catalog.as_deref(), &mut scores, num_scores)
            .await;

        let scores_added = match &outcome {
            Ok(added) => *added,
            Err(failure) => failure.scores_added,
        };
        info!("Successfully populated {} scores", scores_added);

        scores.sort();
        if let Err(e) = self.store.write_scores(scores.as_slice()) {
            error!("Failed to persist scores: {}", e);
            return Err(match outcome {
                // The walk's own error stays the source
                Err(mut failure) => {
                    error!("Population stopped before the write failed: {}", failure.source);
                    failure.unsaved = Some(e);
                    failure
                }
                Ok(_) => PopulationFailure::new(scores_added, PopulateError::Store(e)),
            });
        }

        outcome
    }

    /// Check live catalog, metadata and tracked languages against each other
    pub async fn validate_languages(&mut self) -> Result<(), ValidationError> {
        let catalog_name = self.catalog.catalog_name();
        let live_names = self
            .live_catalog()
            .await
            .map_err(|source| ValidationError::Provider {
                provider: catalog_name,
                source,
            })?
            .to_vec();
        // An unreadable languages file only skips the tag check
        let languages = self.store.read_languages().unwrap_or_else(|e| {
            error!("Could not read languages for validation: {}", e);
            Vec::new()
        });

        let settings = self.settings();
        let validator = LanguageValidator::new(
            self.repositories.clone(),
            self.questions.clone(),
            settings.max_concurrent_requests,
            settings.oldest_date,
            settings.first_day_of_month,
            settings.minimum_score,
        );
        validator.validate(&live_names, &self.metadata, &languages).await
    }

    /// Provider counts behind the stored scores of a language, newest first
    pub async fn score_breakdown(
        &self,
        language_name: &str,
        date: NaiveDate,
        months: u32,
    ) -> Result<Vec<MonthBreakdown>, DataError> {
        let languages = self.store.read_languages()?;
        let language = maintenance::find_language(&languages, language_name)?;
        let scores = ScoreSet::from(self.store.read_scores()?);

        Ok(maintenance::score_breakdown(
            self.repositories.as_ref(),
            self.questions.as_ref(),
            language,
            &scores,
            self.settings().oldest_date,
            date,
            months,
        )
        .await?)
    }
}

/// Rewrite the condensed series from the full history
pub fn populate_condensed_scores(
    store: &DataStore,
    first_day_of_month: NaiveDate,
    sample: &SampleConfig,
) -> Result<Vec<Score>, DataError> {
    let scores = store.read_scores()?;
    let condensed = condense(&scores, first_day_of_month, sample);
    store.write_condensed_scores(&condensed)?;
    info!(count = condensed.len(), "Wrote {} condensed scores", condensed.len());
    Ok(condensed)
}

/// Drop every score of a language so the next run recomputes them
pub fn remove_scores(store: &DataStore, language_name: &str) -> Result<usize, DataError> {
    let languages = store.read_languages()?;
    let mut scores = ScoreSet::from(store.read_scores()?);

    let removed = maintenance::remove_scores(&languages, &mut scores, language_name)?;
    store.write_scores(scores.as_slice())?;
    info!("{} scores removed", removed);
    Ok(removed)
}

/// Drop a language and its scores
pub fn remove_language(store: &DataStore, language_name: &str) -> Result<(Language, usize), DataError> {
    let mut languages = store.read_languages()?;
    let mut scores = ScoreSet::from(store.read_scores()?);

    let (language, removed) = maintenance::remove_language(&mut languages, &mut scores, language_name)?;
    store.write_languages(&languages)?;
    store.write_scores(scores.as_slice())?;
    info!(
        language = %language.name,
        "Removed language {} (id {}) and {} scores",
        language.name,
        language.id,
        removed
    );
    Ok((language, removed))
}

/// Stored month-over-month drops the regression guard would reject
pub fn score_deviations(store: &DataStore, minimum_score: u64) -> Result<Vec<ScoreDeviation>, DataError> {
    let languages = store.read_languages()?;
    let scores = ScoreSet::from(store.read_scores()?);

    let deviations = maintenance::score_deviations(&languages, &scores, minimum_score)?;
    info!("Found {} score deviations", deviations.len());
    Ok(deviations)
}
