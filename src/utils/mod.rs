// src/utils/mod.rs

//! Utility functions and helpers.

pub mod http;

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use sha2::{Digest, Sha256};

static PROFESSOR_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/professor/(\d+)").expect("valid regex"));

/// Extract the legacy professor id from a profile link.
pub fn extract_professor_id(url: &str) -> Option<String> {
    PROFESSOR_PATH
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str().to_string())
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// GraphQL global id for a typed legacy id, e.g. `School-758`.
pub fn graphql_id(kind: &str, legacy_id: impl std::fmt::Display) -> String {
    STANDARD.encode(format!("{kind}-{legacy_id}"))
}

/// Decode a GraphQL global id back to its legacy id, if it has the given kind.
pub fn legacy_id_from_graphql(kind: &str, node_id: &str) -> Option<String> {
    let bytes = STANDARD.decode(node_id).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    text.strip_prefix(kind)
        .and_then(|rest| rest.strip_prefix('-'))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Short stable hex digest of a string.
pub fn digest(input: &str) -> String {
    let hash = Sha256::digest(input.as_bytes());
    hex::encode(&hash[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_professor_id() {
        assert_eq!(
            extract_professor_id("https://www.ratemyprofessors.com/professor/2145"),
            Some("2145".to_string())
        );
        assert_eq!(extract_professor_id("/professor/77?tid=1"), Some("77".to_string()));
        assert_eq!(extract_professor_id("/school/758"), None);
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  Ada \n\t Lovelace "), "Ada Lovelace");
        assert_eq!(normalize_whitespace("   "), "");
    }

    #[test]
    fn test_graphql_id_round_trip() {
        assert_eq!(graphql_id("School", 758), "U2Nob29sLTc1OA==");
        let node = graphql_id("Teacher", 2145);
        assert_eq!(legacy_id_from_graphql("Teacher", &node), Some("2145".to_string()));
        assert_eq!(legacy_id_from_graphql("School", &node), None);
        assert_eq!(legacy_id_from_graphql("Teacher", "%%%"), None);
    }

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(digest("ada|math"), digest("ada|math"));
        assert_ne!(digest("ada|math"), digest("ada|physics"));
        assert_eq!(digest("x").len(), 24);
    }
}
