// src/services/sources/graphql.rs

//! GraphQL teacher search.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::{
    Cursor, Page, ProfessorDetails, ProfessorRecord, RawPayload, SourceConfig, SourceVariant,
};
use crate::services::normalize::Normalizer;
use crate::services::sources::ProfessorSource;
use crate::services::Fetcher;
use crate::utils::graphql_id;
use crate::utils::http::HttpRequest;

const SEARCH_QUERY: &str = r#"
query NewSearchTeachersQuery($text: String!, $schoolID: ID!, $first: Int!, $after: String) {
  newSearch {
    teachers(query: {text: $text, schoolID: $schoolID}, first: $first, after: $after) {
      edges {
        cursor
        node {
          id
          legacyId
          firstName
          lastName
          department
          avgRating
          numRatings
          avgDifficulty
          wouldTakeAgainPercent
        }
      }
      pageInfo {
        hasNextPage
        endCursor
      }
    }
  }
}"#;

const DETAILS_QUERY: &str = r#"
query TeacherRatingsPageQuery($id: ID!) {
  node(id: $id) {
    ... on Teacher {
      id
      legacyId
      teacherRatingTags {
        tagName
      }
      courseCodes {
        courseName
        courseCount
      }
      ratingsDistribution {
        r1
        r2
        r3
        r4
        r5
      }
    }
  }
}"#;

/// Unwrap `data` from a GraphQL response, failing on reported errors.
fn graphql_data(body: &str) -> Result<Value> {
    let mut response: Value = serde_json::from_str(body)?;
    if let Some(errors) = response
        .get("errors")
        .and_then(Value::as_array)
        .filter(|errors| !errors.is_empty())
    {
        return Err(AppError::schema(format!(
            "GraphQL errors: {}",
            Value::from(errors.clone())
        )));
    }
    match response.get_mut("data").map(Value::take) {
        Some(data) if data.is_object() => Ok(data),
        _ => Err(AppError::schema("GraphQL response has no data")),
    }
}

/// One decoded search page.
#[derive(Debug)]
struct SearchPage {
    nodes: Vec<Value>,
    end_cursor: Option<String>,
    has_next: bool,
}

fn decode_search(body: &str) -> Result<SearchPage> {
    let data = graphql_data(body)?;
    let teachers = data
        .pointer("/newSearch/teachers")
        .filter(|t| t.is_object())
        .ok_or_else(|| AppError::schema("response has no newSearch.teachers"))?;

    let nodes = teachers
        .get("edges")
        .and_then(Value::as_array)
        .map(|edges| {
            edges
                .iter()
                .map(|edge| edge.get("node").cloned().unwrap_or(Value::Null))
                .collect()
        })
        .unwrap_or_default();

    let page_info = teachers.get("pageInfo");
    Ok(SearchPage {
        nodes,
        end_cursor: page_info
            .and_then(|p| p.get("endCursor"))
            .and_then(Value::as_str)
            .map(str::to_string),
        has_next: page_info
            .and_then(|p| p.get("hasNextPage"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

/// Teacher search against the site's GraphQL endpoint.
pub struct GraphqlSource {
    config: SourceConfig,
    fetcher: Arc<Fetcher>,
    normalizer: Normalizer,
    school_node_id: String,
}

impl GraphqlSource {
    pub fn new(config: &SourceConfig, fetcher: Arc<Fetcher>) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            fetcher,
            normalizer: Normalizer::new(config)?,
            school_node_id: graphql_id("School", config.school_id),
        })
    }

    /// Cursor after the page fetched at `current`. Moves to the next search
    /// term once the current one is exhausted. An end cursor equal to the one
    /// just requested also ends the term.
    fn next_cursor(&self, current: &Cursor, page: &SearchPage) -> Option<Cursor> {
        let term = current.term;
        match &page.end_cursor {
            Some(token)
                if page.has_next
                    && !page.nodes.is_empty()
                    && current.token.as_ref() != Some(token) =>
            {
                Some(Cursor {
                    term,
                    token: Some(token.clone()),
                })
            }
            _ if term + 1 < self.config.search_terms.len() => Some(Cursor {
                term: term + 1,
                token: None,
            }),
            _ => None,
        }
    }
}

#[async_trait]
impl ProfessorSource for GraphqlSource {
    fn variant(&self) -> SourceVariant {
        SourceVariant::Graphql
    }

    async fn fetch_page(&self, cursor: &Cursor, want: usize) -> Result<Page> {
        let Some(term) = self.config.search_terms.get(cursor.term) else {
            return Ok(Page::default());
        };
        let first = want.clamp(1, self.config.page_size.max(1));

        let request = HttpRequest::post_json(
            self.config.graphql_url(),
            json!({
                "query": SEARCH_QUERY,
                "variables": {
                    "text": term,
                    "schoolID": self.school_node_id,
                    "first": first,
                    "after": cursor.token,
                }
            }),
        );
        let page = self
            .fetcher
            .fetch_with(&request, |body| decode_search(&body))
            .await?;

        log::debug!(
            "Search {:?} ({}): {} teachers, has_next={}",
            term,
            cursor,
            page.nodes.len(),
            page.has_next
        );

        let next = self.next_cursor(cursor, &page);
        Ok(Page {
            payloads: page.nodes.into_iter().map(RawPayload::Json).collect(),
            next,
        })
    }

    fn parse(&self, payload: &RawPayload) -> Result<Option<ProfessorRecord>> {
        self.normalizer.normalize(payload, SourceVariant::Graphql)
    }

    async fn details(&self, record: &ProfessorRecord) -> Result<Option<ProfessorDetails>> {
        let node_id = match (&record.node_id, &record.id) {
            (Some(node_id), _) => node_id.clone(),
            (None, Some(id)) => graphql_id("Teacher", id),
            (None, None) => return Ok(None),
        };

        let request = HttpRequest::post_json(
            self.config.graphql_url(),
            json!({
                "query": DETAILS_QUERY,
                "variables": { "id": node_id },
            }),
        );
        let node = self
            .fetcher
            .fetch_with(&request, |body| {
                let mut data = graphql_data(&body)?;
                Ok(data.get_mut("node").map(Value::take).unwrap_or(Value::Null))
            })
            .await?;

        self.normalizer.normalize_details(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(terms: &[&str]) -> GraphqlSource {
        let config = SourceConfig {
            search_terms: terms.iter().map(|t| t.to_string()).collect(),
            ..SourceConfig::default()
        };
        let fetcher = Arc::new(Fetcher::new(
            Arc::new(crate::utils::http::ReqwestTransport::new(reqwest::Client::new())),
            Default::default(),
        ));
        GraphqlSource::new(&config, fetcher).unwrap()
    }

    #[test]
    fn test_decode_search() {
        let body = json!({
            "data": {"newSearch": {"teachers": {
                "edges": [
                    {"cursor": "a", "node": {"firstName": "Ada", "lastName": "L"}},
                    {"cursor": "b", "node": null}
                ],
                "pageInfo": {"hasNextPage": true, "endCursor": "b"}
            }}}
        })
        .to_string();

        let page = decode_search(&body).unwrap();
        assert_eq!(page.nodes.len(), 2);
        assert!(page.nodes[1].is_null());
        assert!(page.has_next);
        assert_eq!(page.end_cursor.as_deref(), Some("b"));
    }

    #[test]
    fn test_graphql_errors_fail_decode() {
        let body = r#"{"errors": [{"message": "bad schoolID"}], "data": null}"#;
        assert!(matches!(decode_search(body), Err(AppError::Schema(_))));
        assert!(decode_search(r#"{"data": {}}"#).is_err());
        assert!(decode_search("not json").is_err());
    }

    #[test]
    fn test_next_cursor_sweeps_terms() {
        let source = source(&["A", "B"]);
        let more = SearchPage {
            nodes: vec![Value::Null],
            end_cursor: Some("c1".into()),
            has_next: true,
        };
        let done = SearchPage {
            nodes: vec![Value::Null],
            end_cursor: Some("c2".into()),
            has_next: false,
        };

        assert_eq!(
            source.next_cursor(&Cursor::start(), &more),
            Some(Cursor { term: 0, token: Some("c1".into()) })
        );
        assert_eq!(
            source.next_cursor(&Cursor::start(), &done),
            Some(Cursor { term: 1, token: None })
        );
        let second = Cursor { term: 1, token: None };
        assert_eq!(source.next_cursor(&second, &done), None);
    }

    #[test]
    fn test_empty_page_does_not_loop() {
        let source = source(&[""]);
        let empty = SearchPage {
            nodes: vec![],
            end_cursor: Some("c".into()),
            has_next: true,
        };
        assert_eq!(source.next_cursor(&Cursor::start(), &empty), None);
    }

    #[test]
    fn test_repeated_end_cursor_ends_term() {
        let source = source(&["A", "B"]);
        let stuck = SearchPage {
            nodes: vec![Value::Null],
            end_cursor: Some("c1".into()),
            has_next: true,
        };
        let at_c1 = Cursor { term: 0, token: Some("c1".into()) };
        assert_eq!(
            source.next_cursor(&at_c1, &stuck),
            Some(Cursor { term: 1, token: None })
        );

        let last = Cursor { term: 1, token: Some("c1".into()) };
        assert_eq!(source.next_cursor(&last, &stuck), None);
    }
}
