// src/pipeline/scrape.rs

//! Professor scraping pipeline.

use crate::error::{AppError, Result};
use crate::models::{Config, CourseRecord, Cursor, RunStats, StopReason};
use crate::pipeline::{CircuitBreaker, CircuitBreakerResult};
use crate::services::ProfessorSource;
use crate::storage::{DedupKey, LocalStorage};

/// Per-invocation limits layered over the configuration.
#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    /// Stop after this many written records
    pub max_records: Option<usize>,
    /// Cap the run at `run.test_mode_cap` records
    pub test_mode: bool,
    pub skip_details: bool,
}

impl ScrapeOptions {
    /// Record target for this run, if any.
    pub fn target(&self, config: &Config) -> Option<usize> {
        let max = self.max_records.or(config.run.max_records);
        if self.test_mode {
            let cap = config.run.test_mode_cap;
            Some(max.map_or(cap, |m| m.min(cap)))
        } else {
            max
        }
    }
}

/// Run one batch: page through `source`, normalize, dedup and write.
///
/// Bad payloads are logged and counted; failed detail requests leave the
/// record without details. Only sink failures, or a run in which no page
/// could be fetched at all, return an error.
pub async fn run_scraper(
    config: &Config,
    storage: &LocalStorage,
    source: &dyn ProfessorSource,
    options: &ScrapeOptions,
) -> Result<RunStats> {
    let target = options.target(config);
    let skip_details = options.skip_details || config.run.skip_details;
    let detail_limit = config.run.detail_limit.unwrap_or(usize::MAX);

    log::info!(
        "Starting {} scrape for {} (target: {})",
        source.variant(),
        config.source.school_name,
        target.map_or_else(|| "all".to_string(), |t| t.to_string())
    );

    let mut professors = storage.open_professors().await?;
    let mut courses = storage.open_courses().await?;
    if !professors.is_empty() {
        log::info!(
            "Accumulating onto {} existing records in {}",
            professors.len(),
            professors.path().display()
        );
    }

    let mut stats = RunStats::new(source.variant());
    let mut breaker = CircuitBreaker::from_config(&config.crawler);
    let mut cursor = Some(Cursor::start());
    let mut detail_requests = 0usize;

    let reason = 'pages: loop {
        if target.is_some_and(|t| stats.succeeded >= t) {
            break StopReason::Target;
        }
        let Some(current) = cursor.take() else {
            break StopReason::Exhausted;
        };

        let want = target.map_or(usize::MAX, |t| t - stats.succeeded);
        let page = match source.fetch_page(&current, want).await {
            Ok(page) => {
                breaker.record_success();
                stats.pages_fetched += 1;
                page
            }
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                stats.page_failures += 1;
                log::warn!("Page fetch failed at {}: {}", current, e);
                if let CircuitBreakerResult::Open { .. } = breaker.record_failure() {
                    break StopReason::CircuitBreaker;
                }
                cursor = Some(current);
                continue;
            }
        };

        log::info!(
            "Page {}: {} payloads",
            stats.pages_fetched,
            page.payloads.len()
        );
        cursor = page.next;

        for payload in &page.payloads {
            if target.is_some_and(|t| stats.succeeded >= t) {
                break 'pages StopReason::Target;
            }
            stats.fetched += 1;
            let item = stats.fetched;

            let record = match source.parse(payload) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    log::debug!("Item {}: empty payload", item);
                    stats.skipped += 1;
                    continue;
                }
                Err(e) => {
                    log::warn!("Skipping item {}: {}", item, e);
                    stats.failed += 1;
                    continue;
                }
            };

            if professors.contains(&record.dedup_key()) {
                log::debug!("Item {}: {} already written", item, record.name);
                stats.skipped += 1;
                continue;
            }

            let mut record = record;
            let mut course_records = Vec::new();
            if !skip_details && detail_requests < detail_limit {
                detail_requests += 1;
                match source.details(&record).await {
                    Ok(Some(details)) => {
                        course_records = CourseRecord::from_details(&record, &details);
                        record = record.with_details(details);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        log::warn!("Details for {} failed: {}", record.name, e);
                        stats.detail_failures += 1;
                    }
                }
            }

            if professors.append(&record).await? {
                stats.succeeded += 1;
                log::debug!("Item {}: wrote {} ({})", item, record.name, record.department);
            } else {
                stats.skipped += 1;
            }

            for course in &course_records {
                if courses.append(course).await? {
                    stats.courses_written += 1;
                }
            }
        }
    };

    stats.finish(reason);

    log::info!("Scrape finished");
    for (label, value) in stats.summary_items() {
        log::info!("  {}: {}", label, value);
    }

    storage.save_stats(&stats).await?;

    if stats.pages_fetched == 0 && stats.page_failures > 0 {
        return Err(AppError::FetchExhausted(format!(
            "{} page requests failed for {}",
            stats.page_failures, config.source.school_name
        )));
    }

    log::info!(
        "Saved {} professors to {}",
        stats.succeeded,
        professors.path().display()
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target() {
        let mut config = Config::default();
        let opts = ScrapeOptions::default();
        assert_eq!(opts.target(&config), None);

        let test = ScrapeOptions {
            test_mode: true,
            ..Default::default()
        };
        assert_eq!(test.target(&config), Some(10));

        let small = ScrapeOptions {
            test_mode: true,
            max_records: Some(3),
            ..Default::default()
        };
        assert_eq!(small.target(&config), Some(3));

        config.run.max_records = Some(500);
        assert_eq!(opts.target(&config), Some(500));
        assert_eq!(test.target(&config), Some(10));
    }
}
