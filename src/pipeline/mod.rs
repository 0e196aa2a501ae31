// src/pipeline/mod.rs

//! Pipeline entry points for scraper operations.
//!
//! - `run_scraper`: Page through a source and append normalized records

pub mod circuit_breaker;
pub mod scrape;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerResult};
pub use scrape::{ScrapeOptions, run_scraper};
