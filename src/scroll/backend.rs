//! Search backend interface and wire documents
//!
//! The backend connection is owned by the caller. This crate describes what
//! it sends (search requests, continuation and release bodies) and reads
//! what comes back.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::errors::{BackendError, BackendResult};

/// Blocking search, continuation and release round trips
pub trait SearchBackend: Send + Sync {
    /// Run a search; a keep-alive on the request opens a scroll
    fn search(&self, index: &str, request: &SearchRequest) -> BackendResult<SearchResponse>;

    /// Fetch the next batch of an open scroll
    fn scroll(&self, scroll_id: &str, keep_alive: Duration) -> BackendResult<SearchResponse>;

    /// Release scroll ids
    fn clear_scroll(&self, scroll_ids: &BTreeSet<String>) -> BackendResult<()>;
}

/// Keep-alive as the backend's time unit string, e.g. `120s`
pub fn keep_alive_param(keep_alive: Duration) -> String {
    format!("{}s", keep_alive.as_secs())
}

/// Body of a scroll continuation request
pub fn scroll_body(scroll_id: &str, keep_alive: Duration) -> Value {
    json!({"scroll_id": scroll_id, "scroll": keep_alive_param(keep_alive)})
}

/// Body of a scroll release request
pub fn clear_scroll_body(scroll_ids: &BTreeSet<String>) -> Value {
    json!({"scroll_id": scroll_ids.iter().collect::<Vec<_>>()})
}

/// A search request
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SearchRequest {
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<usize>,
    /// Scroll keep-alive; sent as a URL parameter, not in the body
    #[serde(skip)]
    pub scroll: Option<Duration>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Value>,
    #[serde(rename = "_source", skip_serializing_if = "Vec::is_empty")]
    pub source_includes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stored_fields: Vec<String>,
    pub query: Value,
    #[serde(rename = "aggs", skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Map<String, Value>>,
}

impl SearchRequest {
    pub fn new(query: Value, size: usize) -> Self {
        Self {
            size,
            query,
            ..Self::default()
        }
    }

    /// Add a sort entry `{field: {"order": order}}`
    pub fn add_sort(&mut self, field: &str, order: &str) {
        let mut entry = Map::new();
        entry.insert(field.to_string(), json!({ "order": order }));
        self.sort.push(Value::Object(entry));
    }

    /// JSON body sent to the search endpoint
    pub fn to_body(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// `scroll=<secs>s` URL parameter value, if scrolling
    pub fn scroll_param(&self) -> Option<String> {
        self.scroll.map(keep_alive_param)
    }
}

/// One returned document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source", default)]
    pub source: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Map<String, Value>>,
    #[serde(rename = "_score", default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl SearchHit {
    pub fn new(id: impl Into<String>, source: Value) -> Self {
        Self {
            id: id.into(),
            source,
            fields: None,
            score: None,
        }
    }
}

/// A search or continuation response
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchResponse {
    /// Total hits matching the query
    pub total: u64,
    pub hits: Vec<SearchHit>,
    pub scroll_id: Option<String>,
    pub aggregations: Option<Value>,
}

impl SearchResponse {
    /// Read a response body
    ///
    /// `hits.total` may be a number or an object with a `value` member.
    pub fn from_json(body: &Value) -> BackendResult<Self> {
        let hits = body
            .get("hits")
            .ok_or_else(|| BackendError::Malformed("missing hits".into()))?;
        let total = match hits.get("total") {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::Object(obj)) => obj.get("value").and_then(Value::as_u64),
            None => Some(0),
            _ => None,
        }
        .ok_or_else(|| BackendError::Malformed("invalid hits.total".into()))?;
        let hits: Vec<SearchHit> = match hits.get("hits") {
            Some(list) => serde_json::from_value(list.clone())
                .map_err(|e| BackendError::Malformed(e.to_string()))?,
            None => Vec::new(),
        };
        Ok(Self {
            total,
            hits,
            scroll_id: body
                .get("_scroll_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            aggregations: body.get("aggregations").cloned(),
        })
    }
}
