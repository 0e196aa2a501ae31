// tests/scrape_pipeline.rs

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;

use rmp_crawler::error::{AppError, Result};
use rmp_crawler::models::{Config, SourceVariant, StopReason, WriteMode};
use rmp_crawler::pipeline::{ScrapeOptions, run_scraper};
use rmp_crawler::services::{Fetcher, ProfessorSource, RetryPolicy, build_source};
use rmp_crawler::storage::LocalStorage;
use rmp_crawler::utils::http::{HttpRequest, HttpResponse, Transport};

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync;

/// Answers every request with a closure and remembers what was asked.
struct FakeSite {
    handler: Box<Handler>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeSite {
    fn new(handler: impl Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeSite {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(request)
    }
}

fn no_wait() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        request_delay: Duration::ZERO,
        backoff_base: Duration::ZERO,
        rate_limit_base: Duration::ZERO,
    }
}

fn teacher(id: u32) -> Value {
    let department = if id % 2 == 0 { "Mathematics" } else { "" };
    json!({
        "id": format!("node-{id}"),
        "legacyId": id,
        "firstName": format!("First{id}"),
        "lastName": format!("Last{id}"),
        "department": department,
        "avgRating": 4.0,
        "numRatings": 10 + id,
        "avgDifficulty": 2.5,
        "wouldTakeAgainPercent": 75.0
    })
}

fn search_body(nodes: Vec<Value>, end_cursor: Option<&str>) -> String {
    let edges: Vec<Value> = nodes.into_iter().map(|node| json!({ "node": node })).collect();
    json!({
        "data": {"newSearch": {"teachers": {
            "edges": edges,
            "pageInfo": {
                "hasNextPage": end_cursor.is_some(),
                "endCursor": end_cursor
            }
        }}}
    })
    .to_string()
}

fn is_search(request: &HttpRequest) -> bool {
    request
        .body
        .as_ref()
        .and_then(|b| b["query"].as_str())
        .is_some_and(|q| q.contains("NewSearchTeachersQuery"))
}

fn config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.output.dir = dir.to_path_buf();
    config
}

fn graphql_source(config: &Config, site: Arc<FakeSite>) -> Box<dyn ProfessorSource> {
    let fetcher = Arc::new(Fetcher::new(site, no_wait()));
    build_source(SourceVariant::Graphql, &config.source, fetcher).unwrap()
}

fn read_lines(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn skip_details() -> ScrapeOptions {
    ScrapeOptions {
        skip_details: true,
        ..ScrapeOptions::default()
    }
}

#[tokio::test]
async fn test_mode_writes_ten_valid_lines() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path());
    let storage = LocalStorage::from_config(&config.output);
    let site = FakeSite::new(|_| {
        Ok(HttpResponse::ok(search_body((1..=12).map(teacher).collect(), Some("more"))))
    });
    let source = graphql_source(&config, site);

    let options = ScrapeOptions {
        test_mode: true,
        skip_details: true,
        ..ScrapeOptions::default()
    };
    let stats = run_scraper(&config, &storage, source.as_ref(), &options)
        .await
        .unwrap();

    assert_eq!(stats.succeeded, 10);
    assert_eq!(stats.stopped_by, StopReason::Target);

    let lines = read_lines(&storage.professors_path());
    assert_eq!(lines.len(), 10);
    for line in &lines {
        assert!(!line["name"].as_str().unwrap().is_empty());
        assert!(!line["department"].as_str().unwrap().is_empty());
    }
    assert_eq!(lines[0]["department"], "Unknown");
    assert_eq!(lines[1]["department"], "Mathematics");
    assert!(storage.stats_path().exists());
}

#[tokio::test]
async fn malformed_item_is_skipped_and_run_succeeds() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path());
    let storage = LocalStorage::from_config(&config.output);
    let site = FakeSite::new(|_| {
        let mut nodes: Vec<Value> = (1..=10).map(teacher).collect();
        nodes[4] = json!({"firstName": 12, "lastName": ["x"]});
        Ok(HttpResponse::ok(search_body(nodes, None)))
    });
    let source = graphql_source(&config, site);

    let stats = run_scraper(&config, &storage, source.as_ref(), &skip_details())
        .await
        .unwrap();

    assert_eq!(stats.fetched, 10);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.succeeded, 9);
    assert_eq!(stats.stopped_by, StopReason::Exhausted);

    let lines = read_lines(&storage.professors_path());
    assert_eq!(lines.len(), 9);
    assert!(lines.iter().all(|l| l["id"] != "5"));
}

#[tokio::test]
async fn same_record_is_written_once() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path());
    let storage = LocalStorage::from_config(&config.output);
    let site = FakeSite::new(|_| {
        Ok(HttpResponse::ok(search_body(vec![teacher(7), teacher(7)], None)))
    });
    let source = graphql_source(&config, site);

    let stats = run_scraper(&config, &storage, source.as_ref(), &skip_details())
        .await
        .unwrap();

    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(read_lines(&storage.professors_path()).len(), 1);
}

#[tokio::test]
async fn accumulate_mode_stays_unique_across_runs() {
    let tmp = TempDir::new().unwrap();
    let mut config = config(tmp.path());
    config.output.mode = WriteMode::Accumulate;
    let storage = LocalStorage::from_config(&config.output);

    for run in 0..2 {
        let site = FakeSite::new(move |_| {
            let nodes = (1..=3 + run).map(teacher).collect();
            Ok(HttpResponse::ok(search_body(nodes, None)))
        });
        let source = graphql_source(&config, site);
        run_scraper(&config, &storage, source.as_ref(), &skip_details())
            .await
            .unwrap();
    }

    let lines = read_lines(&storage.professors_path());
    let ids: Vec<&str> = lines.iter().map(|l| l["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4"]);
}

#[tokio::test]
async fn follows_cursor_across_pages() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path());
    let storage = LocalStorage::from_config(&config.output);
    let site = FakeSite::new(|request| {
        let after = request.body.as_ref().map(|b| b["variables"]["after"].clone());
        let body = match after.as_ref().and_then(Value::as_str) {
            None => search_body(vec![teacher(1), teacher(2)], Some("page-2")),
            Some("page-2") => search_body(vec![teacher(3)], None),
            Some(other) => panic!("unexpected cursor {other}"),
        };
        Ok(HttpResponse::ok(body))
    });
    let source = graphql_source(&config, site.clone());

    let stats = run_scraper(&config, &storage, source.as_ref(), &skip_details())
        .await
        .unwrap();

    assert_eq!(stats.pages_fetched, 2);
    assert_eq!(stats.succeeded, 3);
    assert_eq!(site.requests().len(), 2);
}

#[tokio::test]
async fn detail_pass_merges_tags_and_writes_courses() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path());
    let storage = LocalStorage::from_config(&config.output);
    let site = FakeSite::new(|request| {
        if is_search(request) {
            return Ok(HttpResponse::ok(search_body(vec![teacher(1), teacher(2)], None)));
        }
        let id = request.body.as_ref().unwrap()["variables"]["id"].clone();
        if id == "node-2" {
            return Ok(HttpResponse::with_status(500, ""));
        }
        Ok(HttpResponse::ok(
            json!({"data": {"node": {
                "teacherRatingTags": [{"tagName": "Caring"}],
                "courseCodes": [
                    {"courseName": "MATH140", "courseCount": 6},
                    {"courseName": "MATH141", "courseCount": 4}
                ],
                "ratingsDistribution": {"r1": 0, "r2": 1, "r3": 2, "r4": 3, "r5": 5}
            }}})
            .to_string(),
        ))
    });
    let source = graphql_source(&config, site);

    let stats = run_scraper(&config, &storage, source.as_ref(), &ScrapeOptions::default())
        .await
        .unwrap();

    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.detail_failures, 1);
    assert_eq!(stats.courses_written, 2);

    let professors = read_lines(&storage.professors_path());
    assert_eq!(professors[0]["tags"], json!(["Caring"]));
    assert_eq!(professors[0]["courses"], json!(["MATH140", "MATH141"]));
    assert_eq!(professors[0]["rating_distribution"]["r5"], 5);
    assert_eq!(professors[1]["tags"], json!([]));

    let courses = read_lines(&storage.courses_path());
    assert_eq!(courses.len(), 2);
    assert_eq!(courses[0]["professor_id"], "1");
}

// Writes to /dev/full fail with ENOSPC, so the course sink breaks after the
// first professor line is already on disk.
#[cfg(target_os = "linux")]
#[tokio::test]
async fn sink_failure_mid_run_keeps_written_lines() {
    let tmp = TempDir::new().unwrap();
    let mut config = config(tmp.path());
    config.output.courses_file = "/dev/full".to_string();
    let storage = LocalStorage::from_config(&config.output);
    let site = FakeSite::new(|request| {
        if is_search(request) {
            return Ok(HttpResponse::ok(search_body(
                vec![teacher(1), teacher(2), teacher(3)],
                None,
            )));
        }
        Ok(HttpResponse::ok(
            json!({"data": {"node": {
                "teacherRatingTags": [],
                "courseCodes": [{"courseName": "MATH140", "courseCount": 2}]
            }}})
            .to_string(),
        ))
    });
    let source = graphql_source(&config, site);

    let err = run_scraper(&config, &storage, source.as_ref(), &ScrapeOptions::default())
        .await
        .unwrap_err();

    match err {
        AppError::SinkWrite { path, .. } => assert_eq!(path, Path::new("/dev/full")),
        other => panic!("expected SinkWrite, got {other:?}"),
    }

    let lines = read_lines(&storage.professors_path());
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["id"], "1");
    assert_eq!(lines[0]["courses"], json!(["MATH140"]));
}

#[tokio::test]
async fn total_fetch_failure_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path());
    let storage = LocalStorage::from_config(&config.output);
    let site = FakeSite::new(|_| Ok(HttpResponse::with_status(503, "")));
    let source = graphql_source(&config, site.clone());

    let err = run_scraper(&config, &storage, source.as_ref(), &skip_details())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::FetchExhausted(_)));
    // Three pages, three attempts each, then the breaker opens.
    assert_eq!(site.requests().len(), 9);

    let stats = storage.load_stats().await.unwrap().unwrap();
    assert_eq!(stats.stopped_by, StopReason::CircuitBreaker);
    assert_eq!(stats.page_failures, 3);
}

#[tokio::test]
async fn html_variant_falls_back_to_cards() {
    let tmp = TempDir::new().unwrap();
    let mut config = config(tmp.path());
    config.source.variant = SourceVariant::Html;
    let storage = LocalStorage::from_config(&config.output);
    let site = FakeSite::new(|request| {
        assert!(request.url.ends_with("/search/professors/758?q=*"));
        Ok(HttpResponse::ok(
            r#"<html><body>
              <a href="/professor/11"><div>QUALITY</div><div>4.2</div><div>8 ratings</div>
                <div>Ada Lovelace</div><div>Mathematics</div><div>Penn State University</div></a>
              <a href="/professor/12"><div>oops</div></a>
            </body></html>"#,
        ))
    });
    let fetcher = Arc::new(Fetcher::new(site, no_wait()));
    let source = build_source(SourceVariant::Html, &config.source, fetcher).unwrap();

    let stats = run_scraper(&config, &storage, source.as_ref(), &ScrapeOptions::default())
        .await
        .unwrap();

    assert_eq!(stats.pages_fetched, 1);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 1);

    let lines = read_lines(&storage.professors_path());
    assert_eq!(lines[0]["id"], "11");
    assert_eq!(lines[0]["source"], "html");
    assert_eq!(lines[0]["rating"], 4.2);
    assert_eq!(lines[0]["tags"], json!([]));
}
