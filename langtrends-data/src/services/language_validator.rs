//! Catalog consistency checks
//!
//! Compares the live catalog, the curated metadata and the tracked languages.
//! Every discrepancy is collected before failing so one run reports them all.

use crate::models::{Language, LanguagesMetadata};
use crate::services::batcher::ConcurrencyBatcher;
use crate::services::provider::{ProviderError, ScoreProvider};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Every discrepancy found by one validation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogDiscrepancyReport {
    /// Live names without metadata that are nearing the minimum score
    pub live_not_in_metadata: Vec<String>,
    /// Metadata names the live catalog no longer lists
    pub metadata_not_in_live: Vec<String>,
    /// Tracked languages with repositories but no questions under their tag
    pub missing_question_tags: Vec<String>,
}

impl CatalogDiscrepancyReport {
    pub fn is_empty(&self) -> bool {
        self.live_not_in_metadata.is_empty()
            && self.metadata_not_in_live.is_empty()
            && self.missing_question_tags.is_empty()
    }
}

impl fmt::Display for CatalogDiscrepancyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sections = [
            ("Languages from GitHub not found in metadata", &self.live_not_in_metadata),
            ("Languages in metadata not found in GitHub", &self.metadata_not_in_live),
            ("Stack Overflow tags not found for", &self.missing_question_tags),
        ];

        let rendered: Vec<String> = sections
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .map(|(title, names)| format!("{}: {}", title, names.join(", ")))
            .collect();

        write!(f, "{}", rendered.join("\n\n"))
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Language validation failed:\n\n{0}")]
    Discrepancies(CatalogDiscrepancyReport),

    #[error("{provider} request failed: {source}")]
    Provider {
        provider: &'static str,
        #[source]
        source: ProviderError,
    },
}

/// Runs the three catalog checks against both providers
pub struct LanguageValidator {
    repositories: Arc<dyn ScoreProvider>,
    questions: Arc<dyn ScoreProvider>,
    batcher: ConcurrencyBatcher,
    oldest_date: NaiveDate,
    first_day_of_month: NaiveDate,
    minimum_score: u64,
}

impl LanguageValidator {
    pub fn new(
        repositories: Arc<dyn ScoreProvider>,
        questions: Arc<dyn ScoreProvider>,
        max_concurrent_requests: usize,
        oldest_date: NaiveDate,
        first_day_of_month: NaiveDate,
        minimum_score: u64,
    ) -> Self {
        Self {
            repositories,
            questions,
            batcher: ConcurrencyBatcher::new(max_concurrent_requests),
            oldest_date,
            first_day_of_month,
            minimum_score,
        }
    }

    /// Build the full report without failing on discrepancies
    pub async fn report(
        &self,
        live_names: &[String],
        metadata: &LanguagesMetadata,
        languages: &[Language],
    ) -> Result<CatalogDiscrepancyReport, ValidationError> {
        Ok(CatalogDiscrepancyReport {
            live_not_in_metadata: self.live_not_in_metadata(live_names, metadata).await?,
            metadata_not_in_live: metadata_not_in_live(live_names, metadata),
            missing_question_tags: self.missing_question_tags(languages).await?,
        })
    }

    /// Fail with every discrepancy at once
    pub async fn validate(
        &self,
        live_names: &[String],
        metadata: &LanguagesMetadata,
        languages: &[Language],
    ) -> Result<(), ValidationError> {
        let report = self.report(live_names, metadata, languages).await?;
        if report.is_empty() {
            info!("Language validation passed");
            Ok(())
        } else {
            Err(ValidationError::Discrepancies(report))
        }
    }

    /// Whether a full-window count is close enough to the minimum score to matter
    fn nearing_minimum(&self, count: u64) -> bool {
        count.saturating_mul(4) > self.minimum_score.saturating_mul(3)
    }

    async fn live_not_in_metadata(
        &self,
        live_names: &[String],
        metadata: &LanguagesMetadata,
    ) -> Result<Vec<String>, ValidationError> {
        let unmapped: Vec<&String> = live_names
            .iter()
            .filter(|name| !metadata.contains(name))
            .collect();
        debug!(count = unmapped.len(), "Checking live languages missing from metadata");

        let mut flagged = Vec::new();
        for batch in self.batcher.batches(&unmapped) {
            let totals = self
                .batcher
                .settle(batch.iter().map(|&name| async move {
                    // Unmapped names have no tag of their own
                    let repositories = self.count(&self.repositories, name).await?;
                    let questions = self.count(&self.questions, name).await?;
                    Ok::<_, ValidationError>(repositories + questions)
                }))
                .await;

            for (name, total) in batch.iter().zip(totals) {
                if self.nearing_minimum(total?) {
                    flagged.push((*name).clone());
                }
            }
        }
        Ok(flagged)
    }

    async fn missing_question_tags(
        &self,
        languages: &[Language],
    ) -> Result<Vec<String>, ValidationError> {
        let mut flagged = Vec::new();
        for batch in self.batcher.batches(languages) {
            let counts = self
                .batcher
                .settle(batch.iter().map(|language| async move {
                    let repositories = self.count(&self.repositories, &language.name).await?;
                    let questions = self
                        .count(&self.questions, language.stackoverflow_tag_or_name())
                        .await?;
                    Ok::<_, ValidationError>((repositories, questions))
                }))
                .await;

            for (language, counts) in batch.iter().zip(counts) {
                let (repositories, questions) = counts?;
                if self.nearing_minimum(repositories) && questions == 0 {
                    flagged.push(language.name.clone());
                }
            }
        }
        Ok(flagged)
    }

    /// Full-window count from one provider
    async fn count(
        &self,
        provider: &Arc<dyn ScoreProvider>,
        tag: &str,
    ) -> Result<u64, ValidationError> {
        provider
            .get_count(tag, self.oldest_date, self.first_day_of_month)
            .await
            .map(|c| c.count)
            .map_err(|source| ValidationError::Provider {
                provider: provider.name(),
                source,
            })
    }
}

fn metadata_not_in_live(live_names: &[String], metadata: &LanguagesMetadata) -> Vec<String> {
    let live: HashSet<&str> = live_names.iter().map(String::as_str).collect();
    metadata
        .names()
        .filter(|name| !live.contains(name))
        .map(str::to_string)
        .collect()
}
