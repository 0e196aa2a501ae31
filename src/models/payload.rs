// src/models/payload.rs

//! Raw payloads and pagination positions handed between fetch and parse.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scraper variant that produced a payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum SourceVariant {
    /// GraphQL teacher search
    #[default]
    Graphql,
    /// Server-rendered search page
    Html,
}

impl fmt::Display for SourceVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceVariant::Graphql => f.write_str("graphql"),
            SourceVariant::Html => f.write_str("html"),
        }
    }
}

/// One unparsed professor entry.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// GraphQL teacher node or relay-store entry
    Json(serde_json::Value),
    /// Outer HTML of a professor card
    Html(String),
}

/// Opaque position in a paginated listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Index of the search term being swept
    pub term: usize,
    /// Source-specific continuation token
    pub token: Option<String>,
}

impl Cursor {
    pub fn start() -> Self {
        Self::default()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.token {
            Some(token) => write!(f, "term {} after {}", self.term, token),
            None => write!(f, "term {} start", self.term),
        }
    }
}

/// One fetched batch of payloads.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub payloads: Vec<RawPayload>,
    /// Where to continue; `None` once the listing is exhausted
    pub next: Option<Cursor>,
}
