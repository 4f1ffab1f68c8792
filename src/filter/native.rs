//! Caller-supplied native query and aggregations
//!
//! The native override arrives as JSON text alongside the predicate. It can
//! replace the compiled predicate or be ANDed with it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::{FilterError, FilterResult};
use super::query;

/// Raw native override text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeOverride {
    /// Native query document (`q`)
    #[serde(default)]
    pub q: Option<String>,
    /// Native aggregation definitions (`a`)
    #[serde(default)]
    pub a: Option<String>,
    /// Use only the native query and ignore the predicate
    #[serde(default)]
    pub native_only: bool,
}

/// A parsed native override
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOverride {
    /// Native query, match-all when absent
    pub query: Value,
    pub aggregations: Option<Map<String, Value>>,
    pub native_only: bool,
}

impl NativeOverride {
    pub fn query(text: impl Into<String>) -> Self {
        Self {
            q: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn aggregations(text: impl Into<String>) -> Self {
        Self {
            a: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn exclusive(mut self) -> Self {
        self.native_only = true;
        self
    }

    /// Parse the override text
    ///
    /// The query must be a JSON object. Aggregations must be an object of
    /// named objects, each naming one aggregation type.
    pub fn parse(&self) -> FilterResult<ParsedOverride> {
        let query = match self.q.as_deref() {
            Some(text) => {
                let value: Value = serde_json::from_str(text)
                    .map_err(|e| FilterError::configuration("query", e.to_string()))?;
                if !value.is_object() {
                    return Err(FilterError::configuration("query", "not a JSON object"));
                }
                value
            }
            None => query::match_all(),
        };

        let aggregations = match self.a.as_deref() {
            Some(text) => {
                let value: Value = serde_json::from_str(text)
                    .map_err(|e| FilterError::configuration("aggregations", e.to_string()))?;
                Some(validate_aggregations(value)?)
            }
            None => None,
        };

        Ok(ParsedOverride {
            query,
            aggregations,
            native_only: self.native_only,
        })
    }
}

fn validate_aggregations(value: Value) -> FilterResult<Map<String, Value>> {
    let Value::Object(map) = value else {
        return Err(FilterError::configuration(
            "aggregations",
            "not a JSON object",
        ));
    };
    for (name, entry) in &map {
        let valid = entry
            .as_object()
            .map(|e| e.values().all(Value::is_object))
            .unwrap_or(false);
        if !valid {
            return Err(FilterError::configuration(
                "aggregations",
                format!("aggregation '{}' is not an object of objects", name),
            ));
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_override_is_match_all() {
        let parsed = NativeOverride::default().parse().unwrap();
        assert!(query::is_match_all(&parsed.query));
        assert!(parsed.aggregations.is_none());
        assert!(!parsed.native_only);
    }

    #[test]
    fn test_parse_query() {
        let parsed = NativeOverride::query(r#"{"term": {"kind": "road"}}"#)
            .exclusive()
            .parse()
            .unwrap();
        assert_eq!(parsed.query, json!({"term": {"kind": "road"}}));
        assert!(parsed.native_only);
    }

    #[test]
    fn test_malformed_query_is_configuration_error() {
        let err = NativeOverride::query("{not json").parse().unwrap_err();
        assert_eq!(err.code(), "ESGEO_FILTER_CONFIG");

        assert!(NativeOverride::query("[1, 2]").parse().is_err());
    }

    #[test]
    fn test_parse_aggregations() {
        let parsed = NativeOverride::aggregations(
            r#"{"cells": {"geohash_grid": {"field": "geom", "precision": 3}}}"#,
        )
        .parse()
        .unwrap();
        let aggs = parsed.aggregations.unwrap();
        assert_eq!(aggs["cells"]["geohash_grid"]["field"], "geom");
    }

    #[test]
    fn test_malformed_aggregations() {
        assert!(NativeOverride::aggregations(r#"{"cells": 5}"#).parse().is_err());
        assert!(NativeOverride::aggregations(r#"{"cells": {"terms": 5}}"#)
            .parse()
            .is_err());
        assert!(NativeOverride::aggregations("nope").parse().is_err());
    }
}
