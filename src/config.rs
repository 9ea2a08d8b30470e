//! Configuration loader and validator for the Asana extractor.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::api::ASANA_API_BASE;
use crate::extractor::DEFAULT_PAGE_LIMIT;
use crate::retry::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("Unknown extraction period {0:?}; expected `30s` or `5m`")]
    UnknownPeriod(String),
}

/// Root configuration. Every key is optional in YAML except the token,
/// which may also come from the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub asana: Asana,
    pub extraction: Extraction,
    pub retry: Retry,
    pub output: Output,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Asana {
    pub access_token: String,
    pub host: String,
    pub page_limit: u32,
}

impl Default for Asana {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            host: ASANA_API_BASE.to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Extraction {
    pub period: String,
}

impl Default for Extraction {
    fn default() -> Self {
        Self {
            period: ExtractionPeriod::ThirtySeconds.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Retry {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Output {
    pub dir: String,
}

impl Default for Output {
    fn default() -> Self {
        Self {
            dir: "./output".to_string(),
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub access_token: Option<String>,
    pub host: Option<String>,
    pub extraction_period: Option<String>,
    pub output_dir: Option<String>,
}

/// The accepted extraction cadences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPeriod {
    ThirtySeconds,
    FiveMinutes,
}

impl ExtractionPeriod {
    pub const ALL: [ExtractionPeriod; 2] =
        [ExtractionPeriod::ThirtySeconds, ExtractionPeriod::FiveMinutes];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionPeriod::ThirtySeconds => "30s",
            ExtractionPeriod::FiveMinutes => "5m",
        }
    }

    pub fn interval(&self) -> Duration {
        match self {
            ExtractionPeriod::ThirtySeconds => Duration::from_secs(30),
            ExtractionPeriod::FiveMinutes => Duration::from_secs(5 * 60),
        }
    }
}

impl FromStr for ExtractionPeriod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExtractionPeriod::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| ConfigError::UnknownPeriod(s.to_string()))
    }
}

impl fmt::Display for ExtractionPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Config {
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(token) = overrides.access_token {
            self.asana.access_token = token;
        }
        if let Some(host) = overrides.host {
            self.asana.host = host;
        }
        if let Some(period) = overrides.extraction_period {
            self.extraction.period = period;
        }
        if let Some(dir) = overrides.output_dir {
            self.output.dir = dir;
        }
    }

    /// Ensure the snapshot directory exists.
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        fs::create_dir_all(&self.output.dir)
    }

    pub fn extraction_period(&self) -> Result<ExtractionPeriod, ConfigError> {
        self.extraction.period.parse()
    }

    pub fn api_base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(self.asana.host.trim())
            .map_err(|_| ConfigError::Invalid("asana.host must be an absolute URL"))?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(ConfigError::Invalid("asana.host must be an http(s) URL"));
        }
        Ok(url)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            Duration::from_millis(self.retry.base_delay_ms),
        )
    }
}

/// Load configuration from an optional YAML file, apply command-line
/// overrides, then validate the result.
pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Config, ConfigError> {
    let mut cfg = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            serde_yaml::from_str(&content)?
        }
        None => Config::default(),
    };
    cfg.apply(overrides);
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.asana.access_token.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "asana.access_token must be non-empty (see https://developers.asana.com/docs/personal-access-token)",
        ));
    }
    cfg.api_base_url()?;
    if !(1..=100).contains(&cfg.asana.page_limit) {
        return Err(ConfigError::Invalid("asana.page_limit must be between 1 and 100"));
    }
    cfg.extraction_period()?;
    if cfg.output.dir.trim().is_empty() {
        return Err(ConfigError::Invalid("output.dir must be non-empty"));
    }
    Ok(())
}

/// Example YAML with every key spelled out.
pub fn example() -> &'static str {
    r#"asana:
  access_token: "YOUR_ASANA_PERSONAL_ACCESS_TOKEN"
  host: "https://app.asana.com/api/1.0"
  page_limit: 100

extraction:
  period: "5m"

retry:
  max_retries: 5
  base_delay_ms: 50

output:
  dir: "./output"
"#
}
