// src/models/stats.rs

//! Run statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::SourceVariant;

/// Why the batch loop ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Record target reached
    Target,
    /// Listing had no more pages
    #[default]
    Exhausted,
    /// Too many consecutive page failures
    CircuitBreaker,
}

/// Counters for one scrape run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub variant: SourceVariant,
    pub pages_fetched: usize,
    pub page_failures: usize,
    /// Payloads received
    pub fetched: usize,
    /// Records written
    pub succeeded: usize,
    /// Duplicates and empty payloads
    pub skipped: usize,
    /// Payloads rejected by the normalizer
    pub failed: usize,
    pub detail_failures: usize,
    pub courses_written: usize,
    pub stopped_by: StopReason,
}

impl RunStats {
    pub fn new(variant: SourceVariant) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            variant,
            pages_fetched: 0,
            page_failures: 0,
            fetched: 0,
            succeeded: 0,
            skipped: 0,
            failed: 0,
            detail_failures: 0,
            courses_written: 0,
            stopped_by: StopReason::default(),
        }
    }

    pub fn finish(&mut self, reason: StopReason) {
        self.stopped_by = reason;
        self.finished_at = Some(Utc::now());
    }

    /// Summary lines for logging.
    pub fn summary_items(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Variant", self.variant.to_string()),
            ("Pages", format!("{} ok, {} failed", self.pages_fetched, self.page_failures)),
            ("Fetched", self.fetched.to_string()),
            ("Succeeded", self.succeeded.to_string()),
            ("Skipped", self.skipped.to_string()),
            ("Failed", self.failed.to_string()),
            ("Detail failures", self.detail_failures.to_string()),
            ("Courses written", self.courses_written.to_string()),
            ("Stopped by", format!("{:?}", self.stopped_by)),
        ]
    }
}
