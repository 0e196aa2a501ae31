// src/models/config.rs

//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SourceVariant;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Remote source identity and request shape
    #[serde(default)]
    pub source: SourceConfig,

    /// HTTP, delay and retry behavior
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Output sink locations
    #[serde(default)]
    pub output: OutputConfig,

    /// Batch run limits
    #[serde(default)]
    pub run: RunConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.source.base_url).is_err() {
            return Err(AppError::validation(format!(
                "source.base_url is not a valid URL: {}",
                self.source.base_url
            )));
        }
        if self.source.school_name.trim().is_empty() {
            return Err(AppError::validation("source.school_name is empty"));
        }
        if self.source.page_size == 0 {
            return Err(AppError::validation("source.page_size must be > 0"));
        }
        if self.source.search_terms.is_empty() {
            return Err(AppError::validation(
                "source.search_terms must contain at least one term",
            ));
        }
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_retries == 0 {
            return Err(AppError::validation("crawler.max_retries must be > 0"));
        }
        if self.crawler.max_consecutive_failures == 0 {
            return Err(AppError::validation(
                "crawler.max_consecutive_failures must be > 0",
            ));
        }
        if self.output.professors_file.trim().is_empty() || self.output.courses_file.trim().is_empty()
        {
            return Err(AppError::validation("output file names must not be empty"));
        }
        if self.run.test_mode_cap == 0 {
            return Err(AppError::validation("run.test_mode_cap must be > 0"));
        }
        Ok(())
    }
}

/// Remote source settings. Request shapes are fixed per variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Which scraper variant to run
    #[serde(default)]
    pub variant: SourceVariant,

    /// Site root, without a trailing slash
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Numeric school identifier on the site
    #[serde(default = "defaults::school_id")]
    pub school_id: u64,

    /// School display name stamped onto every record
    #[serde(default = "defaults::school_name")]
    pub school_name: String,

    /// Search texts swept in order by the GraphQL variant
    #[serde(default = "defaults::search_terms")]
    pub search_terms: Vec<String>,

    /// Maximum teachers requested per GraphQL page
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,
}

impl SourceConfig {
    /// GraphQL endpoint URL.
    pub fn graphql_url(&self) -> String {
        format!("{}/graphql", self.base_url.trim_end_matches('/'))
    }

    /// Server-rendered professor search page URL.
    pub fn search_page_url(&self) -> String {
        format!(
            "{}/search/professors/{}?q=*",
            self.base_url.trim_end_matches('/'),
            self.school_id
        )
    }

    /// Public profile URL for a legacy professor id.
    pub fn profile_url(&self, legacy_id: &str) -> String {
        format!(
            "{}/professor/{}",
            self.base_url.trim_end_matches('/'),
            legacy_id
        )
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            variant: SourceVariant::default(),
            base_url: defaults::base_url(),
            school_id: defaults::school_id(),
            school_name: defaults::school_name(),
            search_terms: defaults::search_terms(),
            page_size: defaults::page_size(),
        }
    }
}

/// HTTP client, delay and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Minimum delay after every fetch in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Total attempts per request
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// First backoff interval in milliseconds, doubled per attempt
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_ms: u64,

    /// First backoff interval after a 429, doubled per attempt
    #[serde(default = "defaults::rate_limit_backoff")]
    pub rate_limit_backoff_ms: u64,

    /// Consecutive failed pages before pagination stops
    #[serde(default = "defaults::max_consecutive_failures")]
    pub max_consecutive_failures: usize,
}

impl CrawlerConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_retries: defaults::max_retries(),
            backoff_base_ms: defaults::backoff_base(),
            rate_limit_backoff_ms: defaults::rate_limit_backoff(),
            max_consecutive_failures: defaults::max_consecutive_failures(),
        }
    }
}

/// How a sink treats records already on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Truncate the sink at the start of the run
    #[default]
    Fresh,
    /// Keep existing lines and skip their identifiers
    Accumulate,
}

/// Output sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory holding every sink
    #[serde(default = "defaults::output_dir")]
    pub dir: PathBuf,

    #[serde(default = "defaults::professors_file")]
    pub professors_file: String,

    #[serde(default = "defaults::courses_file")]
    pub courses_file: String,

    /// Pretty JSON summary of the last completed run
    #[serde(default = "defaults::stats_file")]
    pub stats_file: String,

    #[serde(default)]
    pub mode: WriteMode,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: defaults::output_dir(),
            professors_file: defaults::professors_file(),
            courses_file: defaults::courses_file(),
            stats_file: defaults::stats_file(),
            mode: WriteMode::default(),
        }
    }
}

/// Batch run limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Record cap applied in test mode
    #[serde(default = "defaults::test_mode_cap")]
    pub test_mode_cap: usize,

    /// Maximum records per run; unlimited when absent
    #[serde(default)]
    pub max_records: Option<usize>,

    /// Maximum records sent through the detail pass; all when absent
    #[serde(default)]
    pub detail_limit: Option<usize>,

    #[serde(default)]
    pub skip_details: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            test_mode_cap: defaults::test_mode_cap(),
            max_records: None,
            detail_limit: None,
            skip_details: false,
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Source defaults
    pub fn base_url() -> String {
        "https://www.ratemyprofessors.com".into()
    }
    pub fn school_id() -> u64 {
        758
    }
    pub fn school_name() -> String {
        "Penn State University".into()
    }
    pub fn search_terms() -> Vec<String> {
        vec![String::new()]
    }
    pub fn page_size() -> usize {
        50
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        1000
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn backoff_base() -> u64 {
        1000
    }
    pub fn rate_limit_backoff() -> u64 {
        5000
    }
    pub fn max_consecutive_failures() -> usize {
        3
    }

    // Output defaults
    pub fn output_dir() -> PathBuf {
        PathBuf::from("data")
    }
    pub fn professors_file() -> String {
        "penn_state_professors.jsonl".into()
    }
    pub fn courses_file() -> String {
        "penn_state_courses.jsonl".into()
    }
    pub fn stats_file() -> String {
        "last_run.json".into()
    }

    // Run defaults
    pub fn test_mode_cap() -> usize {
        10
    }
}
