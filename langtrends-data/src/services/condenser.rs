//! Condensed series for the front end
//!
//! Samples the full history at a few fixed intervals back from the current
//! month and drops scores at or below the minimum score.

use crate::models::Score;
use chrono::NaiveDate;
use langtrends_common::config::CondensedSettings;
use langtrends_common::time::subtract_months;
use std::collections::HashSet;

/// Sampling policy for the condensed series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleConfig {
    pub intervals_in_months: Vec<u32>,
    /// Dates shown per interval; one extra is kept so the oldest point has a delta
    pub number_of_dates: usize,
    pub minimum_score: u64,
}

impl SampleConfig {
    pub fn from_settings(settings: &CondensedSettings, minimum_score: u64) -> Self {
        Self {
            intervals_in_months: settings.intervals_in_months.clone(),
            number_of_dates: settings.number_of_dates,
            minimum_score,
        }
    }

    pub fn with_number_of_dates(mut self, number_of_dates: usize) -> Self {
        self.number_of_dates = number_of_dates;
        self
    }
}

/// Sample dates, newest first within each interval, without duplicates
pub fn condensed_dates(first_day_of_month: NaiveDate, config: &SampleConfig) -> Vec<NaiveDate> {
    let mut seen = HashSet::new();
    let mut dates = Vec::new();

    for &interval in &config.intervals_in_months {
        let mut date = first_day_of_month;
        for _ in 0..=config.number_of_dates {
            if seen.insert(date) {
                dates.push(date);
            }
            date = subtract_months(date, interval);
        }
    }

    dates
}

/// Scores on a sample date whose points exceed the minimum score
pub fn condense(scores: &[Score], first_day_of_month: NaiveDate, config: &SampleConfig) -> Vec<Score> {
    let dates: HashSet<NaiveDate> = condensed_dates(first_day_of_month, config)
        .into_iter()
        .collect();

    scores
        .iter()
        .filter(|s| dates.contains(&s.date) && s.points > config.minimum_score)
        .cloned()
        .collect()
}
