//! Providers, the population engine and the passes around it

pub mod batcher;
pub mod catalog_merger;
pub mod condenser;
pub mod frontend_settings;
pub mod github_client;
pub mod language_validator;
pub mod maintenance;
pub mod provider;
pub mod quota;
pub mod retry;
pub mod score_populator;
pub mod stackoverflow_client;

pub use batcher::ConcurrencyBatcher;
pub use catalog_merger::{merge_catalog, CatalogMerge};
pub use condenser::{condense, condensed_dates, SampleConfig};
pub use github_client::{GitHubClient, GitHubConfig};
pub use language_validator::{CatalogDiscrepancyReport, LanguageValidator, ValidationError};
pub use maintenance::{
    remove_language, remove_scores, score_breakdown, score_deviations, MonthBreakdown,
    ScoreDeviation,
};
pub use provider::{LanguageCatalogSource, ProviderCount, ProviderError, ScoreProvider};
pub use quota::{QuotaInspector, QuotaStatus};
pub use retry::{retry_with_backoff, RetryPolicy, Sleeper, TokioSleeper};
pub use score_populator::{
    check_regression, is_regression, PopulateError, PopulationFailure, PopulatorSettings, ScorePopulator,
};
pub use stackoverflow_client::{StackOverflowClient, StackOverflowConfig};
