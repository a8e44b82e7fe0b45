//! Data models for langtrends-data
//!
//! Language and Score records are persisted as complete JSON snapshots; the
//! curated metadata table is read-only input.

pub mod language;
pub mod metadata;
pub mod score;

pub use language::Language;
pub use metadata::{LanguageMetadata, LanguagesMetadata};
pub use score::{Score, ScoreSet};
