// src/services/sources/mod.rs

//! Professor listing sources.
//!
//! A source knows how to fetch one page of raw entries, turn one entry into
//! a [`ProfessorRecord`], and optionally fetch per-professor details.

mod graphql;
mod html;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    Cursor, Page, ProfessorDetails, ProfessorRecord, RawPayload, SourceConfig, SourceVariant,
};
use crate::services::Fetcher;

pub use graphql::GraphqlSource;
pub use html::HtmlSource;

/// One remote listing of professors.
#[async_trait]
pub trait ProfessorSource: Send + Sync {
    fn variant(&self) -> SourceVariant;

    /// Fetch the page at `cursor`, asking for at most `want` entries.
    async fn fetch_page(&self, cursor: &Cursor, want: usize) -> Result<Page>;

    /// Normalize one payload. `Ok(None)` means the payload was empty.
    fn parse(&self, payload: &RawPayload) -> Result<Option<ProfessorRecord>>;

    /// Fetch the detail fields for `record`, if this source has any.
    async fn details(&self, _record: &ProfessorRecord) -> Result<Option<ProfessorDetails>> {
        Ok(None)
    }
}

/// Build the source for `variant`.
pub fn build_source(
    variant: SourceVariant,
    config: &SourceConfig,
    fetcher: Arc<Fetcher>,
) -> Result<Box<dyn ProfessorSource>> {
    Ok(match variant {
        SourceVariant::Graphql => Box::new(GraphqlSource::new(config, fetcher)?),
        SourceVariant::Html => Box::new(HtmlSource::new(config, fetcher)?),
    })
}
