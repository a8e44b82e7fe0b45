//! Score records and the in-memory working set

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Cumulative popularity of one language as of one month
///
/// `points` counts activity from the dataset origin up to the end of the month
/// before `date`; it is not a monthly delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    /// Always the first day of a month (UTC)
    pub date: NaiveDate,
    pub language_id: u32,
    pub points: u64,
}

/// Working set of scores, unique per (date, language id)
#[derive(Debug, Clone, Default)]
pub struct ScoreSet {
    scores: Vec<Score>,
    index: HashMap<(NaiveDate, u32), usize>,
}

impl ScoreSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn get(&self, date: NaiveDate, language_id: u32) -> Option<&Score> {
        self.index.get(&(date, language_id)).map(|&i| &self.scores[i])
    }

    pub fn points(&self, date: NaiveDate, language_id: u32) -> Option<u64> {
        self.get(date, language_id).map(|s| s.points)
    }

    /// Update points in place or append a new score
    ///
    /// Returns `true` when a new score was appended.
    pub fn upsert(&mut self, date: NaiveDate, language_id: u32, points: u64) -> bool {
        match self.index.get(&(date, language_id)) {
            Some(&i) => {
                self.scores[i].points = points;
                false
            }
            None => {
                self.index.insert((date, language_id), self.scores.len());
                self.scores.push(Score {
                    date,
                    language_id,
                    points,
                });
                true
            }
        }
    }

    /// Drop every score for a language, returning how many were removed
    pub fn remove_language(&mut self, language_id: u32) -> usize {
        let before = self.scores.len();
        self.scores.retain(|s| s.language_id != language_id);
        self.rebuild_index();
        before - self.scores.len()
    }

    /// Sort by (date ascending, language id ascending) for stable diffs
    pub fn sort(&mut self) {
        self.scores
            .sort_by(|a, b| (a.date, a.language_id).cmp(&(b.date, b.language_id)));
        self.rebuild_index();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Score> {
        self.scores.iter()
    }

    pub fn as_slice(&self) -> &[Score] {
        &self.scores
    }

    pub fn into_vec(self) -> Vec<Score> {
        self.scores
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .scores
            .iter()
            .enumerate()
            .map(|(i, s)| ((s.date, s.language_id), i))
            .collect();
    }
}

impl From<Vec<Score>> for ScoreSet {
    /// Build a set from persisted scores; a duplicated (date, language) keeps the last points
    fn from(scores: Vec<Score>) -> Self {
        let mut set = ScoreSet::new();
        for score in scores {
            if !set.upsert(score.date, score.language_id, score.points) {
                warn!(
                    date = %score.date,
                    language_id = score.language_id,
                    "Duplicate score in data file; keeping the last one"
                );
            }
        }
        set
    }
}
