// src/services/normalize.rs

//! Payload normalization.
//!
//! Every source hands its raw entries to [`Normalizer`], which maps them
//! onto [`ProfessorRecord`]. Optional numeric fields that are missing or out
//! of range become `null`; only a missing name or a payload of the wrong
//! shape rejects the whole record.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{
    CourseCount, ProfessorDetails, ProfessorRecord, RatingDistribution, RawPayload,
    SourceConfig, SourceVariant, UNKNOWN_DEPARTMENT,
};
use crate::utils::{extract_professor_id, legacy_id_from_graphql, normalize_whitespace};

const MAX_RATING: f64 = 5.0;
const MAX_PERCENT: f64 = 100.0;
const MIN_CARD_LINES: usize = 4;

static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.\d+)").expect("valid regex"));
static NUM_RATINGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) ratings?").expect("valid regex"));
static TAKE_AGAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)% would take again").expect("valid regex"));
static DIFFICULTY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.\d+) level of difficulty").expect("valid regex"));
static NUMERIC_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d.]+$").expect("valid regex"));
static TITLE_CASE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][a-z]+ [A-Z][a-z]+( [A-Z][a-z]+)?$").expect("valid regex")
});

/// Card text shown in place of a missing value.
const PLACEHOLDERS: &[&str] = &["n/a", "na", "-", "--", "—", "–", "none"];

/// Teacher node as returned by the search, detail, and relay-store shapes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeacherNode {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    legacy_id: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    avg_rating: Option<f64>,
    #[serde(default)]
    num_ratings: Option<i64>,
    #[serde(default)]
    avg_difficulty: Option<f64>,
    #[serde(default)]
    would_take_again_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_list")]
    teacher_rating_tags: Vec<TagNode>,
    #[serde(default, deserialize_with = "lenient_list")]
    course_codes: Vec<CourseNode>,
    #[serde(default)]
    ratings_distribution: Option<RatingDistribution>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagNode {
    #[serde(default)]
    tag_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseNode {
    #[serde(default)]
    course_name: Option<String>,
    #[serde(default)]
    course_count: Option<u32>,
}

/// Accepts numeric or string ids.
fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.trim().to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected id as number or string, got {other}"
        ))),
    }
}

/// Keeps the well-formed elements of an array; anything else is an empty list.
fn lenient_list<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Keep `value` only if it is finite and within `[0, max]`.
fn bounded(field: &str, value: Option<f64>, max: f64) -> Option<f64> {
    match value {
        Some(v) if v.is_finite() && (0.0..=max).contains(&v) => Some(v),
        Some(v) => {
            log::debug!("Dropping out-of-range {field}: {v}");
            None
        }
        None => None,
    }
}

fn department_or_unknown(department: Option<&str>) -> String {
    let department = department.map(normalize_whitespace).unwrap_or_default();
    if department.is_empty() {
        UNKNOWN_DEPARTMENT.to_string()
    } else {
        department
    }
}

fn tag_set(tags: &[TagNode]) -> BTreeSet<String> {
    tags.iter()
        .filter_map(|t| t.tag_name.as_deref())
        .map(normalize_whitespace)
        .filter(|t| !t.is_empty())
        .collect()
}

fn course_counts(courses: &[CourseNode]) -> Vec<CourseCount> {
    let mut seen = BTreeSet::new();
    courses
        .iter()
        .filter_map(|c| {
            let code = normalize_whitespace(c.course_name.as_deref()?);
            if code.is_empty() || !seen.insert(code.clone()) {
                return None;
            }
            Some(CourseCount {
                course_code: code,
                count: c.course_count,
            })
        })
        .collect()
}

/// Maps raw payloads onto the record schema.
pub struct Normalizer {
    source: SourceConfig,
    card_selector: Selector,
}

impl Normalizer {
    pub fn new(source: &SourceConfig) -> Result<Self> {
        let card_selector = parse_selector(r#"a[href*="/professor/"]"#)?;
        Ok(Self {
            source: source.clone(),
            card_selector,
        })
    }

    /// Normalize one payload from `variant`.
    ///
    /// `Ok(None)` means the payload carried no entry (a null edge node).
    pub fn normalize(
        &self,
        payload: &RawPayload,
        variant: SourceVariant,
    ) -> Result<Option<ProfessorRecord>> {
        match payload {
            RawPayload::Json(Value::Null) => Ok(None),
            RawPayload::Json(node) => self.normalize_node(node, variant).map(Some),
            RawPayload::Html(fragment) => self.normalize_card(fragment, variant).map(Some),
        }
    }

    /// Normalize a GraphQL or relay-store teacher node.
    pub fn normalize_node(&self, node: &Value, variant: SourceVariant) -> Result<ProfessorRecord> {
        if !node.is_object() {
            return Err(AppError::schema(format!(
                "teacher node is not an object: {}",
                truncate(&node.to_string(), 80)
            )));
        }
        let teacher: TeacherNode = TeacherNode::deserialize(node)
            .map_err(|e| AppError::schema(format!("teacher node: {e}")))?;

        let first_name = teacher
            .first_name
            .as_deref()
            .map(normalize_whitespace)
            .unwrap_or_default();
        let last_name = teacher
            .last_name
            .as_deref()
            .map(normalize_whitespace)
            .unwrap_or_default();
        let name = normalize_whitespace(&format!("{first_name} {last_name}"));
        if name.is_empty() {
            return Err(AppError::schema("teacher node has no name"));
        }

        let legacy_id = teacher.legacy_id.clone().or_else(|| {
            teacher
                .id
                .as_deref()
                .and_then(|id| legacy_id_from_graphql("Teacher", id))
        });

        let num_ratings = match teacher.num_ratings {
            Some(n) if n >= 0 => u32::try_from(n).unwrap_or(u32::MAX),
            Some(n) => {
                log::debug!("Dropping negative numRatings: {n}");
                0
            }
            None => 0,
        };
        let unrated = teacher.num_ratings == Some(0);

        let rating = bounded("avgRating", teacher.avg_rating, MAX_RATING).filter(|_| !unrated);
        let difficulty =
            bounded("avgDifficulty", teacher.avg_difficulty, MAX_RATING).filter(|_| !unrated);
        // The site reports -1 when nobody answered the question.
        let would_take_again_pct = teacher
            .would_take_again_percent
            .filter(|pct| *pct >= 0.0)
            .and_then(|pct| bounded("wouldTakeAgainPercent", Some(pct), MAX_PERCENT))
            .filter(|_| !unrated);

        let courses = course_counts(&teacher.course_codes)
            .into_iter()
            .map(|c| c.course_code)
            .collect();

        Ok(ProfessorRecord {
            profile_url: legacy_id.as_deref().map(|id| self.source.profile_url(id)),
            id: legacy_id,
            node_id: teacher.id.filter(|id| !id.trim().is_empty()),
            first_name,
            last_name,
            name,
            department: department_or_unknown(teacher.department.as_deref()),
            school: self.source.school_name.clone(),
            rating,
            num_ratings,
            would_take_again_pct,
            difficulty,
            tags: tag_set(&teacher.teacher_rating_tags),
            courses,
            rating_distribution: teacher.ratings_distribution,
            source: variant,
        })
    }

    /// Normalize the `node` of a detail query response.
    ///
    /// `Ok(None)` when the server returned no node for the id.
    pub fn normalize_details(&self, node: &Value) -> Result<Option<ProfessorDetails>> {
        if node.is_null() {
            return Ok(None);
        }
        let teacher: TeacherNode = TeacherNode::deserialize(node)
            .map_err(|e| AppError::schema(format!("teacher details: {e}")))?;

        Ok(Some(ProfessorDetails {
            tags: tag_set(&teacher.teacher_rating_tags),
            courses: course_counts(&teacher.course_codes),
            rating_distribution: teacher.ratings_distribution,
        }))
    }

    /// Normalize the outer HTML of a professor search card.
    pub fn normalize_card(&self, fragment: &str, variant: SourceVariant) -> Result<ProfessorRecord> {
        let document = Html::parse_fragment(fragment);
        let card = document
            .select(&self.card_selector)
            .next()
            .ok_or_else(|| AppError::schema("card has no professor link"))?;

        let legacy_id = card.value().attr("href").and_then(extract_professor_id);

        let lines: Vec<String> = card
            .text()
            .flat_map(|t| t.lines())
            .map(normalize_whitespace)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.len() < MIN_CARD_LINES {
            return Err(AppError::schema(format!(
                "card has {} text lines, expected at least {}",
                lines.len(),
                MIN_CARD_LINES
            )));
        }

        let full_text = lines.join(" ");
        let difficulty_match = DIFFICULTY.captures(&full_text).and_then(|c| c.get(1));
        let rating_match = DECIMAL
            .find_iter(&full_text)
            .find(|m| difficulty_match.is_none_or(|d| d.start() != m.start()));

        let rating = bounded(
            "rating",
            rating_match.and_then(|m| m.as_str().parse().ok()),
            MAX_RATING,
        );
        let difficulty = bounded(
            "difficulty",
            difficulty_match.and_then(|m| m.as_str().parse().ok()),
            MAX_RATING,
        );
        let would_take_again_pct = bounded(
            "would take again",
            capture_number(&TAKE_AGAIN, &full_text),
            MAX_PERCENT,
        );
        let num_ratings = NUM_RATINGS
            .captures(&full_text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0);
        let unrated = num_ratings == 0;
        let rating = rating.filter(|_| !unrated);
        let difficulty = difficulty.filter(|_| !unrated);
        let would_take_again_pct = would_take_again_pct.filter(|_| !unrated);

        let school = self.source.school_name.to_lowercase();
        let mut candidates = lines.iter().filter(|line| {
            let lower = line.to_lowercase();
            !NUMERIC_LINE.is_match(line)
                && !PLACEHOLDERS.contains(&lower.as_str())
                && !lower.contains("quality")
                && !lower.contains("rating")
                && !lower.contains("would take")
                && !lower.contains("level of")
                && !lower.contains(&school)
                && line.chars().count() > 2
        });

        let (name, department) = match candidates.next() {
            Some(name) => (
                name.clone(),
                department_or_unknown(candidates.next().map(String::as_str)),
            ),
            None => {
                let name = lines
                    .iter()
                    .find(|line| TITLE_CASE_NAME.is_match(line))
                    .cloned()
                    .ok_or_else(|| AppError::schema("card has no name line"))?;
                (name, UNKNOWN_DEPARTMENT.to_string())
            }
        };
        let (first_name, last_name) = match name.split_once(' ') {
            Some((first, last)) => (first.to_string(), last.to_string()),
            None => (name.clone(), String::new()),
        };

        Ok(ProfessorRecord {
            profile_url: legacy_id.as_deref().map(|id| self.source.profile_url(id)),
            id: legacy_id,
            node_id: None,
            first_name,
            last_name,
            name,
            department,
            school: self.source.school_name.clone(),
            rating,
            num_ratings,
            would_take_again_pct,
            difficulty,
            tags: BTreeSet::new(),
            courses: BTreeSet::new(),
            rating_distribution: None,
            source: variant,
        })
    }
}

fn capture_number(pattern: &Regex, text: &str) -> Option<f64> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

pub(crate) fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
