//! Out-of-band maintenance over the persisted data set
//!
//! Used after a regression-guard trip or an upstream rename: drop a
//! language's scores so the next run recomputes them, or inspect the raw
//! provider counts behind a month.

use crate::models::{Language, ScoreSet};
use crate::services::provider::{ProviderError, ScoreProvider};
use crate::services::score_populator::is_regression;
use chrono::NaiveDate;
use langtrends_common::time::subtract_months;
use langtrends_common::{Error, Result};

/// Look up a tracked language by name
pub fn find_language<'a>(languages: &'a [Language], name: &str) -> Result<&'a Language> {
    languages
        .iter()
        .find(|l| l.name == name)
        .ok_or_else(|| Error::NotFound(format!("Language not found: {}", name)))
}

/// Remove every score of the named language; returns how many were removed
pub fn remove_scores(languages: &[Language], scores: &mut ScoreSet, name: &str) -> Result<usize> {
    let language = find_language(languages, name)?;
    Ok(scores.remove_language(language.id))
}

/// Remove the named language and all its scores
pub fn remove_language(
    languages: &mut Vec<Language>,
    scores: &mut ScoreSet,
    name: &str,
) -> Result<(Language, usize)> {
    let id = find_language(languages, name)?.id;
    let removed_scores = scores.remove_language(id);

    let position = languages
        .iter()
        .position(|l| l.id == id)
        .ok_or_else(|| Error::NotFound(format!("Language not found: {}", name)))?;
    Ok((languages.remove(position), removed_scores))
}

/// A stored month-over-month drop that the regression guard would reject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreDeviation {
    pub language: String,
    pub previous_date: NaiveDate,
    pub previous_points: u64,
    pub date: NaiveDate,
    pub points: u64,
}

impl ScoreDeviation {
    /// Signed change in points, negative for a drop
    pub fn deviation(&self) -> i64 {
        self.points as i64 - self.previous_points as i64
    }

    pub fn deviation_percentage(&self) -> f64 {
        if self.previous_points == 0 {
            return 0.0;
        }
        self.deviation() as f64 * 100.0 / self.previous_points as f64
    }
}

/// Scan the stored history for drops the regression guard would reject,
/// ordered by date then language id
pub fn score_deviations(
    languages: &[Language],
    scores: &ScoreSet,
    minimum_score: u64,
) -> Result<Vec<ScoreDeviation>> {
    let mut ordered: Vec<_> = scores.iter().collect();
    ordered.sort_by_key(|s| (s.date, s.language_id));

    let mut deviations = Vec::new();
    for score in ordered {
        let previous_date = subtract_months(score.date, 1);
        let Some(previous_points) = scores.points(previous_date, score.language_id) else {
            continue;
        };
        if !is_regression(previous_points, score.points, minimum_score) {
            continue;
        }

        let language = languages
            .iter()
            .find(|l| l.id == score.language_id)
            .ok_or_else(|| Error::NotFound(format!("Language ID not found: {}", score.language_id)))?;
        deviations.push(ScoreDeviation {
            language: language.name.clone(),
            previous_date,
            previous_points,
            date: score.date,
            points: score.points,
        });
    }

    Ok(deviations)
}

/// Raw provider counts behind one month's score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthBreakdown {
    pub date: NaiveDate,
    /// Points currently stored for this month, if any
    pub stored_points: Option<u64>,
    /// Counts over [date - 1 month, date)
    pub repositories_delta: u64,
    pub questions_delta: u64,
    /// Counts over [oldest date, date)
    pub repositories_total: u64,
    pub questions_total: u64,
}

impl MonthBreakdown {
    pub fn combined_delta(&self) -> u64 {
        self.repositories_delta + self.questions_delta
    }

    pub fn combined_total(&self) -> u64 {
        self.repositories_total + self.questions_total
    }
}

/// Delta and full-window counts for `months` months ending at `date`, newest first
pub async fn score_breakdown(
    repositories: &dyn ScoreProvider,
    questions: &dyn ScoreProvider,
    language: &Language,
    scores: &ScoreSet,
    oldest_date: NaiveDate,
    date: NaiveDate,
    months: u32,
) -> std::result::Result<Vec<MonthBreakdown>, ProviderError> {
    let tag = language.stackoverflow_tag_or_name();
    let mut breakdown = Vec::new();
    let mut current = date;

    for _ in 0..months {
        let previous = subtract_months(current, 1);
        let (repositories_delta, questions_delta, repositories_total, questions_total) = futures::try_join!(
            repositories.get_count(&language.name, previous, current),
            questions.get_count(tag, previous, current),
            repositories.get_count(&language.name, oldest_date, current),
            questions.get_count(tag, oldest_date, current),
        )?;

        breakdown.push(MonthBreakdown {
            date: current,
            stored_points: scores.points(current, language.id),
            repositories_delta: repositories_delta.count,
            questions_delta: questions_delta.count,
            repositories_total: repositories_total.count,
            questions_total: questions_total.count,
        });
        current = previous;
    }

    Ok(breakdown)
}
