// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod payload;
mod professor;
mod stats;

// Re-export all public types
pub use config::{Config, CrawlerConfig, OutputConfig, RunConfig, SourceConfig, WriteMode};
pub use payload::{Cursor, Page, RawPayload, SourceVariant};
pub use professor::{
    CourseCount, CourseRecord, ProfessorDetails, ProfessorRecord, RatingDistribution,
    UNKNOWN_DEPARTMENT,
};
pub use stats::{RunStats, StopReason};
