// src/services/mod.rs

//! Service layer for the crawler application.
//!
//! This module contains the business logic for:
//! - Request execution with retry (`Fetcher`)
//! - Payload normalization (`Normalizer`)
//! - Professor listing sources (`GraphqlSource`, `HtmlSource`)

mod fetcher;
pub mod normalize;
pub mod sources;

pub use fetcher::{Fetcher, RetryPolicy};
pub use normalize::Normalizer;
pub use sources::{GraphqlSource, HtmlSource, ProfessorSource, build_source};
