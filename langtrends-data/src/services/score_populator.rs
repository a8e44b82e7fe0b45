//! Score population engine
//!
//! Walks calendar months from the oldest configured date up to the current
//! month. Every language without a score for a month gets one, computed as the
//! previous month's cumulative points plus a single-month delta from both
//! providers. Small deltas fall back to a full-window count, and a sharp
//! month-over-month decrease aborts the run.

use crate::models::{Language, ScoreSet};
use crate::services::batcher::ConcurrencyBatcher;
use crate::services::provider::{ProviderError, ScoreProvider};
use crate::services::quota::QuotaInspector;
use chrono::NaiveDate;
use langtrends_common::config::TomlConfig;
use langtrends_common::time::{add_months, subtract_months};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that end a population run
#[derive(Debug, Error)]
pub enum PopulateError {
    #[error("{provider} request failed: {source}")]
    Provider {
        provider: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("Points for language {language} decreased a lot; this month: {this_month}, last month: {last_month}")]
    Regression {
        language: String,
        this_month: u64,
        last_month: u64,
    },

    #[error("Storage error: {0}")]
    Store(#[from] langtrends_common::Error),
}

impl PopulateError {
    fn provider(provider: &'static str, source: ProviderError) -> Self {
        PopulateError::Provider { provider, source }
    }
}

/// A failed run, still carrying how many scores it added before stopping
#[derive(Debug, Error)]
#[error(
    "{source} ({scores_added} scores populated before failure){}",
    unsaved_hint(.unsaved)
)]
pub struct PopulationFailure {
    pub scores_added: usize,
    pub source: PopulateError,
    /// Set when the scores could not be written after the walk failed
    pub unsaved: Option<langtrends_common::Error>,
}

impl PopulationFailure {
    pub fn new(scores_added: usize, source: PopulateError) -> Self {
        Self {
            scores_added,
            source,
            unsaved: None,
        }
    }
}

fn unsaved_hint(unsaved: &Option<langtrends_common::Error>) -> String {
    match unsaved {
        Some(e) => format!("; scores were not saved: {}", e),
        None => String::new(),
    }
}

/// Engine tunables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulatorSettings {
    /// Inclusive lower bound of the walk
    pub oldest_date: NaiveDate,
    /// Inclusive upper bound of the walk
    pub first_day_of_month: NaiveDate,
    pub max_concurrent_requests: usize,
    pub minimum_score: u64,
    /// Deltas below this trigger a full-window recount
    pub delta_floor: u64,
}

impl PopulatorSettings {
    pub fn from_config(config: &TomlConfig, first_day_of_month: NaiveDate) -> Self {
        Self {
            oldest_date: config.oldest_date,
            first_day_of_month,
            max_concurrent_requests: config.max_concurrent_requests,
            minimum_score: config.minimum_score,
            delta_floor: config.delta_floor,
        }
    }
}

/// Fail when `this_month` dropped from `last_month` by more than
/// `minimum_score` points and more than 1%
/// A drop larger than both `minimum_score` and 1% of last month's points
pub fn is_regression(last_month: u64, this_month: u64, minimum_score: u64) -> bool {
    let decrease = last_month.saturating_sub(this_month);
    decrease > minimum_score && decrease.saturating_mul(100) > last_month
}

pub fn check_regression(
    language: &str,
    last_month: u64,
    this_month: u64,
    minimum_score: u64,
) -> Result<(), PopulateError> {
    if is_regression(last_month, this_month, minimum_score) {
        return Err(PopulateError::Regression {
            language: language.to_string(),
            this_month,
            last_month,
        });
    }
    Ok(())
}

pub struct ScorePopulator {
    settings: PopulatorSettings,
    repositories: Arc<dyn ScoreProvider>,
    questions: Arc<dyn ScoreProvider>,
    batcher: ConcurrencyBatcher,
    quota: QuotaInspector,
}

impl ScorePopulator {
    pub fn new(
        settings: PopulatorSettings,
        repositories: Arc<dyn ScoreProvider>,
        questions: Arc<dyn ScoreProvider>,
    ) -> Self {
        let batcher = ConcurrencyBatcher::new(settings.max_concurrent_requests);
        let quota = QuotaInspector::new(batcher.limit() as u64);
        Self {
            settings,
            repositories,
            questions,
            batcher,
            quota,
        }
    }

    pub fn settings(&self) -> &PopulatorSettings {
        &self.settings
    }

    /// Fill every missing (month, language) score in `scores`
    ///
    /// Languages absent from `live_catalog` are skipped for the whole run. When
    /// `num_scores` is set the walk stops once that many new scores exist.
    /// Scores added before a failure stay in `scores`; the caller persists them.
    pub async fn populate_scores(
        &self,
        languages: &[Language],
        live_catalog: Option<&[String]>,
        scores: &mut ScoreSet,
        num_scores: Option<usize>,
    ) -> Result<usize, PopulationFailure> {
        let active = self.active_languages(languages, live_catalog);
        let mut added = 0;
        let mut date = self.settings.oldest_date;

        while date <= self.settings.first_day_of_month {
            let remaining = num_scores.map(|n| n.saturating_sub(added));
            if remaining == Some(0) {
                break;
            }

            let mut pending: Vec<&Language> = active
                .iter()
                .copied()
                .filter(|l| scores.get(date, l.id).is_none())
                .collect();
            if let Some(remaining) = remaining {
                pending.truncate(remaining);
            }

            debug!(date = %date, pending = pending.len(), "Populating scores for {}", date);

            let (month_added, result) = self.populate_month(date, &pending, scores).await;
            added += month_added;
            if let Err(source) = result {
                return Err(PopulationFailure::new(added, source));
            }

            date = add_months(date, 1);
        }

        Ok(added)
    }

    /// Languages to score this run, warning once for each stale one
    fn active_languages<'a>(
        &self,
        languages: &'a [Language],
        live_catalog: Option<&[String]>,
    ) -> Vec<&'a Language> {
        let Some(live_catalog) = live_catalog else {
            return languages.iter().collect();
        };

        let live: HashSet<&str> = live_catalog.iter().map(String::as_str).collect();
        languages
            .iter()
            .filter(|language| {
                let present = live.contains(language.name.as_str());
                if !present {
                    warn!(
                        language = %language.name,
                        "Language in data file not found in GitHub: {}",
                        language.name
                    );
                }
                present
            })
            .collect()
    }

    /// Score one month in batches
    ///
    /// Each batch fully settles before the next starts. Successful results of
    /// a batch are upserted even when another language in it failed; the first
    /// failure then ends the month.
    async fn populate_month(
        &self,
        date: NaiveDate,
        pending: &[&Language],
        scores: &mut ScoreSet,
    ) -> (usize, Result<(), PopulateError>) {
        let mut added = 0;

        for batch in self.batcher.batches(pending) {
            let results = {
                let snapshot: &ScoreSet = scores;
                self.batcher
                    .settle(batch.iter().map(|&language| self.compute_points(date, language, snapshot)))
                    .await
            };

            let mut first_error = None;
            for (language, result) in batch.iter().zip(results) {
                match result {
                    Ok(points) => {
                        if scores.upsert(date, language.id, points) {
                            added += 1;
                        }
                    }
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }

            if let Some(e) = first_error {
                return (added, Err(e));
            }
        }

        (added, Ok(()))
    }

    /// Delta-or-total heuristic for one language and month
    async fn compute_points(
        &self,
        date: NaiveDate,
        language: &Language,
        scores: &ScoreSet,
    ) -> Result<u64, PopulateError> {
        let last_month = subtract_months(date, 1);
        let previous = scores.points(last_month, language.id).unwrap_or(0);

        let delta = self.combined_count(language, last_month, date).await?;
        let mut points = previous + delta;

        if delta < self.settings.delta_floor {
            points = self
                .combined_count(language, self.settings.oldest_date, date)
                .await?;
            debug!(
                language = %language.name,
                date = %date,
                delta,
                points,
                "Delta below floor; using full-window count"
            );
        }

        check_regression(&language.name, previous, points, self.settings.minimum_score)?;
        Ok(points)
    }

    /// Sum of both providers' counts over [from, to)
    pub async fn combined_count(
        &self,
        language: &Language,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<u64, PopulateError> {
        let repositories = async {
            self.repositories
                .get_count(&language.name, from, to)
                .await
                .map_err(|e| PopulateError::provider(self.repositories.name(), e))
        };
        let questions = async {
            self.questions
                .get_count(language.stackoverflow_tag_or_name(), from, to)
                .await
                .map_err(|e| PopulateError::provider(self.questions.name(), e))
        };

        let (repository_count, question_count) = futures::try_join!(repositories, questions)?;

        self.quota
            .inspect(self.repositories.name(), repository_count.quota_remaining)
            .map_err(|e| PopulateError::provider(self.repositories.name(), e))?;
        self.quota
            .inspect(self.questions.name(), question_count.quota_remaining)
            .map_err(|e| PopulateError::provider(self.questions.name(), e))?;

        Ok(repository_count.count + question_count.count)
    }
}
