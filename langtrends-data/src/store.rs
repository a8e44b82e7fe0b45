//! JSON snapshot persistence
//!
//! Each artifact is read in full at the start of a run and rewritten in full at
//! the end. Writes go to a sibling temporary file that is renamed into place so
//! an interrupted write never leaves a truncated snapshot.

use crate::models::{Language, LanguagesMetadata, Score};
use langtrends_common::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const LANGUAGES_FILE: &str = "languages.json";
pub const SCORES_FILE: &str = "scores-full.json";
pub const CONDENSED_SCORES_FILE: &str = "scores.json";

/// File locations of the persisted artifacts
#[derive(Debug, Clone)]
pub struct DataStore {
    languages_file: PathBuf,
    scores_file: PathBuf,
    condensed_scores_file: PathBuf,
}

impl DataStore {
    /// Store using the default file names under `data_dir`
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            languages_file: data_dir.join(LANGUAGES_FILE),
            scores_file: data_dir.join(SCORES_FILE),
            condensed_scores_file: data_dir.join(CONDENSED_SCORES_FILE),
        }
    }

    pub fn with_languages_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.languages_file = path.into();
        self
    }

    pub fn with_scores_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.scores_file = path.into();
        self
    }

    pub fn with_condensed_scores_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.condensed_scores_file = path.into();
        self
    }

    pub fn languages_file(&self) -> &Path {
        &self.languages_file
    }

    pub fn scores_file(&self) -> &Path {
        &self.scores_file
    }

    pub fn condensed_scores_file(&self) -> &Path {
        &self.condensed_scores_file
    }

    pub fn read_languages(&self) -> Result<Vec<Language>> {
        read_json_list(&self.languages_file)
    }

    pub fn write_languages(&self, languages: &[Language]) -> Result<()> {
        write_json(&self.languages_file, languages, false)
    }

    pub fn read_scores(&self) -> Result<Vec<Score>> {
        read_json_list(&self.scores_file)
    }

    /// Full history is pretty-printed so runs diff cleanly
    pub fn write_scores(&self, scores: &[Score]) -> Result<()> {
        write_json(&self.scores_file, scores, true)
    }

    pub fn read_condensed_scores(&self) -> Result<Vec<Score>> {
        read_json_list(&self.condensed_scores_file)
    }

    pub fn write_condensed_scores(&self, scores: &[Score]) -> Result<()> {
        write_json(&self.condensed_scores_file, scores, false)
    }
}

/// Load the curated metadata table
pub fn read_metadata(path: &Path) -> Result<LanguagesMetadata> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Read a JSON array; a missing file is an empty list, a malformed one is an error
fn read_json_list<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{} does not exist yet, starting empty", path.display());
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let content = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;

    debug!("Wrote {}", path.display());
    Ok(())
}
