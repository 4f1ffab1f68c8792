//! Native query document builders
//!
//! Small constructors for the boolean query shapes the compiler emits.
//! Documents are `serde_json::Value` trees with insertion-ordered keys.

use serde_json::{json, Map, Value};

/// `{"match_all": {}}`
pub fn match_all() -> Value {
    json!({"match_all": {}})
}

pub fn is_match_all(query: &Value) -> bool {
    *query == match_all()
}

/// `{"bool": {"must_not": clause}}`
pub fn must_not(clause: Value) -> Value {
    json!({"bool": {"must_not": clause}})
}

/// Matches nothing
pub fn match_none() -> Value {
    must_not(match_all())
}

pub fn must(clauses: Vec<Value>) -> Value {
    json!({"bool": {"must": clauses}})
}

pub fn should(clauses: Vec<Value>) -> Value {
    json!({"bool": {"should": clauses}})
}

/// Non-scoring filter under a match-all
pub fn filtered(clause: Value) -> Value {
    json!({"bool": {"must": match_all(), "filter": clause}})
}

/// A clause keyed by field: `{kind: {field: body}}`
pub fn field_clause(kind: &str, field: &str, body: Value) -> Value {
    let mut inner = Map::new();
    inner.insert(field.to_string(), body);
    let mut outer = Map::new();
    outer.insert(kind.to_string(), Value::Object(inner));
    Value::Object(outer)
}

pub fn term(field: &str, value: Value) -> Value {
    field_clause("term", field, value)
}

/// Range clause from ordered `(bound, value)` pairs
pub fn range(field: &str, bounds: &[(&str, Value)]) -> Value {
    let body: Map<String, Value> = bounds
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect();
    field_clause("range", field, Value::Object(body))
}

pub fn exists(field: &str) -> Value {
    json!({"exists": {"field": field}})
}

pub fn ids(values: Vec<String>) -> Value {
    json!({"ids": {"values": values}})
}

pub fn nested(path: &str, query: Value) -> Value {
    json!({"nested": {"path": path, "query": query}})
}

/// Wrap in a nested envelope when a path is given
pub fn maybe_nested(path: Option<&str>, query: Value) -> Value {
    match path {
        Some(path) => nested(path, query),
        None => query,
    }
}

/// AND two queries, dropping a match-all side
pub fn and_queries(native: Value, compiled: Value) -> Value {
    if is_match_all(&native) {
        compiled
    } else if is_match_all(&compiled) {
        native
    } else {
        must(vec![native, compiled])
    }
}
