//! Configuration loading and config file resolution
//!
//! Every field has a default so an absent or partial `langtrends.toml` is valid.
//! Credentials resolve ENV → TOML and are handed to each provider explicitly.

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "LANGTRENDS_CONFIG";
pub const GITHUB_API_KEY_ENV_VAR: &str = "GITHUB_API_KEY";
pub const STACKOVERFLOW_API_KEY_ENV_VAR: &str = "STACKOVERFLOW_API_KEY";

const CONFIG_FILE_NAME: &str = "langtrends.toml";

/// Oldest month with data is 2007-11 but no language has a meaningful score before 2008-02
pub const DEFAULT_OLDEST_DATE: (i32, u32, u32) = (2008, 2, 1);
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 10;
pub const DEFAULT_MINIMUM_SCORE: u64 = 1000;
/// Monthly deltas under this count trigger a full-window recount.
///
/// Tuned from five languages whose totals were observed to shrink; revisit if the
/// regression guard keeps tripping.
pub const DEFAULT_DELTA_FLOOR: u64 = 100;

/// Top-level `langtrends.toml` contents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Directory holding languages.json, scores-full.json and scores.json
    pub data_dir: PathBuf,
    /// Curated metadata table; defaults to `<data_dir>/languages-metadata.json`
    pub metadata_file: Option<PathBuf>,
    /// Inclusive lower bound of the monthly walk
    pub oldest_date: NaiveDate,
    /// Languages in flight per batch; also the quota warning threshold
    pub max_concurrent_requests: usize,
    /// Scores at or below this are noise for presentation and the regression guard
    pub minimum_score: u64,
    pub delta_floor: u64,
    pub logging: LoggingConfig,
    pub github: ProviderSettings,
    pub stackoverflow: ProviderSettings,
    pub retry: RetrySettings,
    pub condensed: CondensedSettings,
}

impl Default for TomlConfig {
    fn default() -> Self {
        let (y, m, d) = DEFAULT_OLDEST_DATE;
        Self {
            data_dir: PathBuf::from("data"),
            metadata_file: None,
            oldest_date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            minimum_score: DEFAULT_MINIMUM_SCORE,
            delta_floor: DEFAULT_DELTA_FLOOR,
            logging: LoggingConfig::default(),
            github: ProviderSettings {
                api_key: None,
                requests_per_second: 10,
            },
            stackoverflow: ProviderSettings {
                api_key: None,
                requests_per_second: 25,
            },
            retry: RetrySettings::default(),
            condensed: CondensedSettings::default(),
        }
    }
}

impl TomlConfig {
    /// Path of the curated language metadata table
    pub fn metadata_path(&self) -> PathBuf {
        self.metadata_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("languages-metadata.json"))
    }

    /// Reject values the population engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_requests == 0 {
            return Err(Error::Config(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if !crate::time::is_first_of_month(self.oldest_date) {
            return Err(Error::Config(format!(
                "oldest_date must be the first day of a month (got {})",
                self.oldest_date
            )));
        }
        for (name, provider) in [("github", &self.github), ("stackoverflow", &self.stackoverflow)] {
            if provider.requests_per_second == 0 {
                return Err(Error::Config(format!(
                    "{}.requests_per_second must be at least 1",
                    name
                )));
            }
        }
        if self.condensed.intervals_in_months.iter().any(|&m| m == 0) {
            return Err(Error::Config(
                "condensed.intervals_in_months must not contain 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing directive; `RUST_LOG` overrides it
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Per-provider settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    /// Client-side throttle
    pub requests_per_second: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            requests_per_second: 10,
        }
    }
}

/// Retry policy for transient provider failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries after the first attempt; `None` retries until success or a terminal error
    pub max_retries: Option<u32>,
    /// Wait used when the provider gives no hint
    pub fixed_backoff_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: Some(5),
            fixed_backoff_secs: 30,
        }
    }
}

/// Sampling policy for the condensed series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CondensedSettings {
    pub intervals_in_months: Vec<u32>,
    pub number_of_dates: usize,
    /// Front-end settings.json whose `numberOfDates` overrides `number_of_dates`
    pub frontend_settings_url: Option<String>,
}

impl Default for CondensedSettings {
    fn default() -> Self {
        Self {
            intervals_in_months: vec![1, 3, 12],
            number_of_dates: 12,
            frontend_settings_url: None,
        }
    }
}

/// Config file resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `<config_dir>/langtrends/langtrends.toml` if it exists
///
/// Returns `None` when no file applies and defaults should be used.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    dirs::config_dir()
        .map(|d| d.join("langtrends").join(CONFIG_FILE_NAME))
        .filter(|p| p.exists())
}

/// Load and validate config from `path`, or defaults when `path` is `None`
pub fn load_config(path: Option<&Path>) -> Result<TomlConfig> {
    let config = match path {
        Some(path) => {
            if !path.exists() {
                return Err(Error::NotFound(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            let content = std::fs::read_to_string(path)?;
            let config: TomlConfig = toml::from_str(&content)?;
            info!("Loaded config from {}", path.display());
            config
        }
        None => {
            info!("No config file found, using defaults");
            TomlConfig::default()
        }
    };

    config.validate()?;
    Ok(config)
}

/// Resolve an API key from ENV → TOML
///
/// Blank values are ignored. A warning is logged when both sources are set.
pub fn resolve_api_key(env_var_name: &str, toml_key: Option<&str>) -> Option<String> {
    let env_key = std::env::var(env_var_name).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_key.filter(|k| is_valid_key(k));

    match (env_key, toml_key) {
        (Some(env), Some(_)) => {
            warn!(
                "{} found in environment and TOML config. Using environment (highest priority).",
                env_var_name
            );
            Some(env)
        }
        (Some(env), None) => {
            info!("{} loaded from environment variable", env_var_name);
            Some(env)
        }
        (None, Some(toml)) => {
            info!("{} loaded from TOML config", env_var_name);
            Some(toml.to_string())
        }
        (None, None) => None,
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TomlConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.oldest_date, NaiveDate::from_ymd_opt(2008, 2, 1).unwrap());
        assert_eq!(config.delta_floor, DEFAULT_DELTA_FLOOR);
        assert_eq!(config.condensed.intervals_in_months, vec![1, 3, 12]);
    }

    #[test]
    fn test_metadata_path_defaults_to_data_dir() {
        let config = TomlConfig {
            data_dir: PathBuf::from("/tmp/lt"),
            ..TomlConfig::default()
        };
        assert_eq!(
            config.metadata_path(),
            PathBuf::from("/tmp/lt/languages-metadata.json")
        );
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = TomlConfig {
            max_concurrent_requests: 0,
            ..TomlConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_mid_month_oldest_date() {
        let config = TomlConfig {
            oldest_date: NaiveDate::from_ymd_opt(2020, 3, 15).unwrap(),
            ..TomlConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            oldest_date = "2023-01-01"

            [github]
            api_key = "abc"
            "#,
        )
        .unwrap();

        assert_eq!(config.oldest_date, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(config.github.api_key.as_deref(), Some("abc"));
        assert_eq!(config.github.requests_per_second, 10);
        assert_eq!(config.max_concurrent_requests, DEFAULT_MAX_CONCURRENT_REQUESTS);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }
}
