// src/services/sources/html.rs

//! Server-rendered search page.
//!
//! The page embeds the relay store as JSON; when that is missing the
//! professor cards themselves are scraped.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::error::Result;
use crate::models::{Cursor, Page, ProfessorRecord, RawPayload, SourceConfig, SourceVariant};
use crate::services::Fetcher;
use crate::services::normalize::{Normalizer, parse_selector};
use crate::services::sources::ProfessorSource;
use crate::utils::http::HttpRequest;

static RELAY_STORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"window\.__RELAY_STORE__\s*=\s*").expect("valid regex"));

/// Teacher entries of the embedded relay store, in key order.
fn relay_teachers(html: &str) -> Vec<Value> {
    let Some(start) = RELAY_STORE.find(html) else {
        log::info!("No relay store found");
        return Vec::new();
    };

    let mut values =
        serde_json::Deserializer::from_str(&html[start.end()..]).into_iter::<Value>();
    let store = match values.next() {
        Some(Ok(Value::Object(store))) => store,
        Some(Ok(_)) => return Vec::new(),
        Some(Err(e)) => {
            log::debug!("Relay store is not valid JSON: {}", e);
            return Vec::new();
        }
        None => return Vec::new(),
    };

    store
        .into_iter()
        .map(|(_, entry)| entry)
        .filter(|entry| entry.get("__typename").and_then(Value::as_str) == Some("Teacher"))
        .collect()
}

/// Outer HTML of every professor card.
fn card_fragments(html: &str, selector: &Selector) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .map(|card| card.html())
        .collect()
}

/// Scrapes the single server-rendered search page.
pub struct HtmlSource {
    config: SourceConfig,
    fetcher: Arc<Fetcher>,
    normalizer: Normalizer,
    card_selector: Selector,
}

impl HtmlSource {
    pub fn new(config: &SourceConfig, fetcher: Arc<Fetcher>) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            fetcher,
            normalizer: Normalizer::new(config)?,
            card_selector: parse_selector(r#"a[href*="/professor/"]"#)?,
        })
    }

    fn extract(&self, html: &str) -> Vec<RawPayload> {
        let teachers = relay_teachers(html);
        if !teachers.is_empty() {
            log::info!("Extracted {} professors from relay store", teachers.len());
            return teachers.into_iter().map(RawPayload::Json).collect();
        }

        let cards = card_fragments(html, &self.card_selector);
        log::info!("Found {} professor cards", cards.len());
        cards.into_iter().map(RawPayload::Html).collect()
    }
}

#[async_trait]
impl ProfessorSource for HtmlSource {
    fn variant(&self) -> SourceVariant {
        SourceVariant::Html
    }

    async fn fetch_page(&self, _cursor: &Cursor, want: usize) -> Result<Page> {
        let url = self.config.search_page_url();
        let html = self.fetcher.fetch_text(&HttpRequest::get(&url)).await?;

        let mut payloads = self.extract(&html);
        payloads.truncate(want);

        Ok(Page {
            payloads,
            next: None,
        })
    }

    fn parse(&self, payload: &RawPayload) -> Result<Option<ProfessorRecord>> {
        self.normalizer.normalize(payload, SourceVariant::Html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_teachers() {
        let html = r#"<html><script>
            window.__RELAY_STORE__ = {"client:root": {"__typename": "__Root"},
              "VGVhY2hlci0x": {"__typename": "Teacher", "legacyId": 1, "firstName": "Ada", "lastName": "L", "department": "Math};"},
              "U2Nob29sLTc1OA==": {"__typename": "School", "name": "Penn State"}};
            window.other = 1;
        </script></html>"#;

        let teachers = relay_teachers(html);
        assert_eq!(teachers.len(), 1);
        assert_eq!(teachers[0]["firstName"], "Ada");
        assert_eq!(teachers[0]["department"], "Math};");
    }

    #[test]
    fn test_relay_missing_or_broken() {
        assert!(relay_teachers("<html></html>").is_empty());
        assert!(relay_teachers("window.__RELAY_STORE__ = {broken").is_empty());
    }

    #[test]
    fn test_card_fragments() {
        let selector = parse_selector(r#"a[href*="/professor/"]"#).unwrap();
        let html = r#"<div>
            <a href="/professor/1"><div>Ada</div></a>
            <a href="/school/758">School</a>
            <a href="/professor/2"><div>Grace</div></a>
        </div>"#;
        let cards = card_fragments(html, &selector);
        assert_eq!(cards.len(), 2);
        assert!(cards[0].contains("/professor/1"));
    }
}
