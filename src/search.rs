// src/search.rs
pub mod elasticsearch;

use serde::Deserialize;
use serde_json::Value;

use crate::error::SearchError;

pub use elasticsearch::ElasticsearchClient;

/// One search call, already rendered for a specific event
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Query string in the backend's query syntax
    pub query: String,
    /// Comma-delimited `<field>:<direction>` pairs
    pub sort: String,
    /// `_source` filter; `None` returns whole documents
    pub source_filter: Option<String>,
    /// Result window size
    pub size: usize,
}

/// A matched document
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub index: Option<String>,
    pub id: Option<String>,
    pub source: Value,
}

impl Hit {
    /// Human-readable identity for log and error messages
    pub fn describe(&self) -> String {
        match (&self.index, &self.id) {
            (Some(index), Some(id)) => format!("{}/{}", index, id),
            (None, Some(id)) => id.clone(),
            _ => "unknown id".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    /// Total number of matches reported by the backend
    pub total: u64,
    /// True when `total` is only a lower bound
    pub total_is_lower_bound: bool,
    /// Returned hits, in backend sort order
    pub hits: Vec<Hit>,
}

impl SearchResponse {
    /// Decode an Elasticsearch `_search` response body.
    ///
    /// `hits.total` is accepted both as a plain number and as the
    /// `{"value": n, "relation": "eq" | "gte"}` object.
    pub fn from_json(body: &str) -> Result<Self, SearchError> {
        let raw: RawResponse =
            serde_json::from_str(body).map_err(|e| SearchError::Decode(e.to_string()))?;

        let (total, total_is_lower_bound) = match raw.hits.total {
            RawTotal::Count(n) => (n, false),
            RawTotal::Object { value, relation } => {
                (value, relation.as_deref().is_some_and(|r| r != "eq"))
            }
        };

        let hits = raw
            .hits
            .hits
            .into_iter()
            .map(|hit| Hit {
                index: hit.index,
                id: hit.id,
                source: hit.source,
            })
            .collect();

        Ok(SearchResponse {
            total,
            total_is_lower_bound,
            hits,
        })
    }
}

/// The single capability the response time filter needs from a store
pub trait SearchBackend: Send + Sync {
    fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError>;

    fn name(&self) -> &str {
        "search"
    }
}

#[derive(Deserialize)]
struct RawResponse {
    hits: RawHits,
}

#[derive(Deserialize)]
struct RawHits {
    total: RawTotal,
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTotal {
    Count(u64),
    Object {
        value: u64,
        #[serde(default)]
        relation: Option<String>,
    },
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_index", default)]
    index: Option<String>,
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(rename = "_source", default)]
    source: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_legacy_total() {
        let body = json!({
            "took": 3,
            "hits": {
                "total": 2,
                "hits": [
                    {"_index": "logs", "_id": "a", "_source": {"latency": {"response_transmitted": 12}}},
                    {"_index": "logs", "_id": "b", "_source": {"latency": {"response_transmitted": 7}}}
                ]
            }
        })
        .to_string();

        let response = SearchResponse::from_json(&body).unwrap();
        assert_eq!(response.total, 2);
        assert!(!response.total_is_lower_bound);
        assert_eq!(response.hits.len(), 2);
        assert_eq!(response.hits[0].describe(), "logs/a");
        assert_eq!(response.hits[1].source["latency"]["response_transmitted"], json!(7));
    }

    #[test]
    fn test_decode_object_total() {
        let body = r#"{"hits":{"total":{"value":10000,"relation":"gte"},"hits":[]}}"#;
        let response = SearchResponse::from_json(body).unwrap();
        assert_eq!(response.total, 10000);
        assert!(response.total_is_lower_bound);

        let body = r#"{"hits":{"total":{"value":0,"relation":"eq"}}}"#;
        let response = SearchResponse::from_json(body).unwrap();
        assert_eq!(response.total, 0);
        assert!(!response.total_is_lower_bound);
        assert!(response.hits.is_empty());
    }

    #[test]
    fn test_decode_hit_without_source() {
        let body = r#"{"hits":{"total":1,"hits":[{"_id":"x"}]}}"#;
        let response = SearchResponse::from_json(body).unwrap();
        assert_eq!(response.hits[0].source, Value::Null);
        assert_eq!(response.hits[0].describe(), "x");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            SearchResponse::from_json("not json"),
            Err(SearchError::Decode(_))
        ));
        assert!(matches!(
            SearchResponse::from_json(r#"{"error":"boom"}"#),
            Err(SearchError::Decode(_))
        ));
    }
}
