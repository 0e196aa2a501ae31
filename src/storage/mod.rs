// src/storage/mod.rs

//! Record persistence.
//!
//! Records are appended to JSONL sinks, one JSON object per line, and never
//! rewritten. The first record written for a key wins.
//!
//! ## Directory Structure
//!
//! ```text
//! {output.dir}/
//! ├── penn_state_professors.jsonl   # ProfessorRecord lines
//! ├── penn_state_courses.jsonl      # CourseRecord lines
//! └── last_run.json                 # RunStats of the latest run
//! ```

pub mod jsonl;
pub mod local;

use crate::models::{CourseRecord, ProfessorRecord};
use crate::utils::digest;

// Re-export for convenience
pub use jsonl::JsonlSink;
pub use local::LocalStorage;

/// Identity of a record within a sink.
pub trait DedupKey {
    fn dedup_key(&self) -> String;
}

impl DedupKey for ProfessorRecord {
    /// The site id when known, otherwise a digest of name and department.
    fn dedup_key(&self) -> String {
        match self.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => format!("id:{id}"),
            None => format!(
                "name:{}",
                digest(&format!(
                    "{}|{}",
                    self.name.to_lowercase(),
                    self.department.to_lowercase()
                ))
            ),
        }
    }
}

impl DedupKey for CourseRecord {
    fn dedup_key(&self) -> String {
        let professor = match self.professor_id.as_deref() {
            Some(id) => format!("id:{id}"),
            None => format!(
                "name:{}",
                digest(&format!(
                    "{}|{}",
                    self.professor_name.to_lowercase(),
                    self.department.to_lowercase()
                ))
            ),
        };
        format!("{}@{}", self.course_code, professor)
    }
}
