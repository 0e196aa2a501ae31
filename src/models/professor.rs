// src/models/professor.rs

//! Professor and course record structures.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::SourceVariant;

/// Fallback department when the source exposes none.
pub const UNKNOWN_DEPARTMENT: &str = "Unknown";

/// One reviewed instructor, normalized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfessorRecord {
    /// Legacy numeric site id, as a string
    pub id: Option<String>,

    /// Opaque GraphQL node id
    pub node_id: Option<String>,

    pub first_name: String,
    pub last_name: String,

    /// Full display name
    pub name: String,

    pub department: String,
    pub school: String,

    /// Overall quality, 0.0 to 5.0
    pub rating: Option<f64>,

    pub num_ratings: u32,

    /// 0 to 100
    pub would_take_again_pct: Option<f64>,

    /// Level of difficulty, 0.0 to 5.0
    pub difficulty: Option<f64>,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default)]
    pub courses: BTreeSet<String>,

    #[serde(default)]
    pub rating_distribution: Option<RatingDistribution>,

    pub profile_url: Option<String>,

    pub source: SourceVariant,
}

impl ProfessorRecord {
    /// Build a new record carrying the detail-pass fields.
    ///
    /// Empty detail lists keep whatever the listing already had.
    pub fn with_details(self, details: ProfessorDetails) -> Self {
        let ProfessorDetails {
            tags,
            courses,
            rating_distribution,
        } = details;

        let tags = if tags.is_empty() { self.tags } else { tags };
        let course_codes: BTreeSet<String> =
            courses.iter().map(|c| c.course_code.clone()).collect();
        let courses = if course_codes.is_empty() {
            self.courses
        } else {
            course_codes
        };

        Self {
            tags,
            courses,
            rating_distribution: rating_distribution.or(self.rating_distribution),
            ..self
        }
    }
}

/// Star-count histogram from the detail pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RatingDistribution {
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r4: u32,
    pub r5: u32,
}

impl RatingDistribution {
    pub fn total(&self) -> u64 {
        [self.r1, self.r2, self.r3, self.r4, self.r5]
            .into_iter()
            .map(u64::from)
            .sum()
    }
}

/// Course code with the number of ratings mentioning it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseCount {
    pub course_code: String,
    pub count: Option<u32>,
}

/// Normalized output of the detail pass for one professor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfessorDetails {
    pub tags: BTreeSet<String>,
    pub courses: Vec<CourseCount>,
    pub rating_distribution: Option<RatingDistribution>,
}

/// One course taught by one professor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourseRecord {
    pub course_code: String,
    pub professor_id: Option<String>,
    pub professor_name: String,
    pub department: String,
    pub num_ratings: Option<u32>,
}

impl CourseRecord {
    /// Course records for every course in `details`, attributed to `professor`.
    pub fn from_details(professor: &ProfessorRecord, details: &ProfessorDetails) -> Vec<Self> {
        details
            .courses
            .iter()
            .map(|course| Self {
                course_code: course.course_code.clone(),
                professor_id: professor.id.clone(),
                professor_name: professor.name.clone(),
                department: professor.department.clone(),
                num_ratings: course.count,
            })
            .collect()
    }
}
