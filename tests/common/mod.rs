//! Shared fixtures for integration tests
//!
//! - A small document set with scalar, nested, date and point attributes
//! - A matcher that evaluates native query documents against it
//! - A backend serving the fixture through that matcher, recording calls

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use geo::{Contains, Point, Polygon};
use geo_types::{Coord, LineString};
use regex::Regex;
use serde_json::{json, Value};

use esgeo::filter::evaluate::{compare_values, haversine_meters, lookup};
use esgeo::filter::{AttributeSchema, Binding, FeatureSchema, GeometryStorage};
use esgeo::geo::geometry::from_document;
use esgeo::scroll::{
    BackendError, BackendResult, SearchBackend, SearchHit, SearchRequest, SearchResponse,
};

// =============================================================================
// Fixture Documents
// =============================================================================

pub fn schema() -> FeatureSchema {
    FeatureSchema::new("places")
        .with_attribute(AttributeSchema::new("name"))
        .with_attribute(AttributeSchema::new("rank").with_binding(Binding::Integer))
        .with_attribute(AttributeSchema::new("city"))
        .with_attribute(AttributeSchema::new("tags.name").nested())
        .with_attribute(AttributeSchema::new("created").with_binding(Binding::Date))
        .with_attribute(AttributeSchema::geometry("loc", GeometryStorage::Point))
}

pub fn documents() -> Vec<SearchHit> {
    vec![
        SearchHit::new(
            "0",
            json!({"name": "Main Street", "rank": 1, "city": "Oslo",
                   "tags": [{"name": "park"}], "created": "2020-01-01T00:00:00Z",
                   "loc": [10.75, 59.91]}),
        ),
        SearchHit::new(
            "1",
            json!({"name": "Main Road", "rank": 5, "city": "Bergen",
                   "tags": [{"name": "harbor"}, {"name": "park"}],
                   "created": "2020-06-15T12:00:00Z", "loc": [5.32, 60.39]}),
        ),
        SearchHit::new(
            "2",
            json!({"name": "Harbor Way", "rank": 9, "city": null, "tags": [],
                   "created": "2021-03-01T00:00:00Z", "loc": "59.95,10.80"}),
        ),
        SearchHit::new(
            "3",
            json!({"name": "Side Lane", "rank": 3, "city": "Oslo",
                   "created": "2019-12-31T23:59:59Z",
                   "loc": {"type": "Point", "coordinates": [10.70, 59.90]}}),
        ),
        SearchHit::new(
            "4",
            json!({"name": "main square", "rank": 7, "city": "Trondheim",
                   "tags": [{"name": "market"}], "created": "2022-01-01T00:00:00Z",
                   "loc": [10.39, 63.43]}),
        ),
        SearchHit::new(
            "5",
            json!({"name": "Old Road", "rank": 2, "tags": [{"name": "park"}],
                   "loc": [-0.12, 51.50]}),
        ),
        SearchHit::new(
            "6",
            json!({"name": "Ring", "rank": 10, "city": "Bergen",
                   "tags": [{"name": "harbor"}], "created": "2020-06-15T12:00:00Z",
                   "loc": {"lat": 60.40, "lon": 5.30}}),
        ),
        SearchHit::new(
            "7",
            json!({"name": "Main Street", "rank": 4, "city": "Oslo",
                   "tags": [{"name": "square"}], "created": "2020-02-01T00:00:00Z"}),
        ),
    ]
}

/// `n` plain documents with ids `0..n`
pub fn numbered(n: usize) -> Vec<SearchHit> {
    (0..n)
        .map(|i| SearchHit::new(i.to_string(), json!({ "rank": i })))
        .collect()
}

// =============================================================================
// Native Query Matcher
// =============================================================================

/// True when the native query selects the document
pub fn matches(query: &Value, id: &str, doc: &Value) -> bool {
    let (kind, body) = single_entry(query);
    match kind {
        "match_all" => true,
        "bool" => {
            let all = |key: &str| clauses(body.get(key)).iter().all(|q| matches(q, id, doc));
            let should = match body.get("should") {
                Some(_) => clauses(body.get("should"))
                    .iter()
                    .any(|q| matches(q, id, doc)),
                None => true,
            };
            let excluded = clauses(body.get("must_not"))
                .iter()
                .any(|q| matches(q, id, doc));
            all("must") && all("filter") && should && !excluded
        }
        "term" => {
            let (field, expected) = single_entry(body);
            lookup(doc, field)
                .iter()
                .any(|v| compare_values(v, expected) == Some(Ordering::Equal))
        }
        "range" => {
            let (field, bounds) = single_entry(body);
            lookup(doc, field).iter().any(|v| in_range(v, bounds))
        }
        "exists" => {
            let field = body["field"].as_str().unwrap_or_default();
            !lookup(doc, field).is_empty()
        }
        "ids" => body["values"]
            .as_array()
            .map(|values| values.iter().any(|v| v.as_str() == Some(id)))
            .unwrap_or(false),
        "regexp" => {
            let (field, pattern) = single_entry(body);
            let re = Regex::new(&format!("^(?:{})$", pattern.as_str().unwrap_or_default()))
                .expect("regexp pattern");
            lookup(doc, field)
                .iter()
                .any(|v| v.as_str().map(|s| re.is_match(s)).unwrap_or(false))
        }
        "nested" => matches(&body["query"], id, doc),
        "geo_bounding_box" => {
            let (field, bbox) = single_entry(body);
            let (Some(p), Some(tl), Some(br)) =
                (point_at(doc, field), pair(&bbox["top_left"]), pair(&bbox["bottom_right"]))
            else {
                return false;
            };
            p.x() >= tl.x && p.x() <= br.x && p.y() >= br.y && p.y() <= tl.y
        }
        "geo_distance" => {
            let limit: f64 = body["distance"]
                .as_str()
                .and_then(|d| d.trim_end_matches('m').parse().ok())
                .expect("distance in meters");
            let Some((field, center)) = body
                .as_object()
                .and_then(|o| o.iter().find(|(k, _)| k.as_str() != "distance"))
            else {
                return false;
            };
            let (Some(p), Some(c)) = (point_at(doc, field), pair(center)) else {
                return false;
            };
            haversine_meters(p, Point::from(c)) <= limit
        }
        "geo_polygon" => {
            let (field, body) = single_entry(body);
            let ring: Vec<Coord<f64>> = body["points"]
                .as_array()
                .map(|points| points.iter().filter_map(pair).collect())
                .unwrap_or_default();
            let polygon = Polygon::new(LineString::from(ring), vec![]);
            point_at(doc, field)
                .map(|p| polygon.contains(&p))
                .unwrap_or(false)
        }
        other => panic!("matcher has no rule for '{}'", other),
    }
}

static NULL: Value = Value::Null;

fn single_entry(value: &Value) -> (&str, &Value) {
    value
        .as_object()
        .and_then(|o| o.iter().next())
        .map(|(k, v)| (k.as_str(), v))
        .unwrap_or(("", &NULL))
}

fn clauses(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
        None => Vec::new(),
    }
}

fn in_range(value: &Value, bounds: &Value) -> bool {
    let Some(bounds) = bounds.as_object() else {
        return false;
    };
    bounds.iter().all(|(key, bound)| {
        let ord = compare_values(value, bound);
        match key.as_str() {
            "gt" => ord == Some(Ordering::Greater),
            "gte" => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            "lt" => ord == Some(Ordering::Less),
            "lte" => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
            _ => false,
        }
    })
}

fn pair(value: &Value) -> Option<Coord<f64>> {
    let items = value.as_array()?;
    Some(Coord {
        x: items.first()?.as_f64()?,
        y: items.get(1)?.as_f64()?,
    })
}

fn point_at(doc: &Value, field: &str) -> Option<Point<f64>> {
    let mut current = doc;
    for segment in field.split('.') {
        current = current.get(segment)?;
    }
    match from_document(current)? {
        geo_types::Geometry::Point(p) => Some(p),
        _ => None,
    }
}

// =============================================================================
// Fixture Backend
// =============================================================================

#[derive(Default)]
struct State {
    searches: Vec<SearchRequest>,
    continuations: Vec<String>,
    releases: Vec<BTreeSet<String>>,
    open: HashMap<String, (Vec<SearchHit>, usize)>,
    counter: usize,
}

/// Serves the documents the native query matches
pub struct FixtureBackend {
    docs: Vec<SearchHit>,
    state: Mutex<State>,
}

impl FixtureBackend {
    pub fn new(docs: Vec<SearchHit>) -> Self {
        Self {
            docs,
            state: Mutex::new(State::default()),
        }
    }

    pub fn searches(&self) -> Vec<SearchRequest> {
        self.state.lock().unwrap().searches.clone()
    }

    pub fn continuations(&self) -> Vec<String> {
        self.state.lock().unwrap().continuations.clone()
    }

    pub fn releases(&self) -> Vec<BTreeSet<String>> {
        self.state.lock().unwrap().releases.clone()
    }

    fn open_batch(
        state: &mut State,
        remaining: Vec<SearchHit>,
        size: usize,
        total: usize,
    ) -> SearchResponse {
        let take = size.min(remaining.len());
        let hits = remaining[..take].to_vec();
        let rest = remaining[take..].to_vec();
        state.counter += 1;
        let id = format!("scroll-{}", state.counter);
        state.open.insert(id.clone(), (rest, size));
        SearchResponse {
            total: total as u64,
            hits,
            scroll_id: Some(id),
            aggregations: None,
        }
    }
}

impl SearchBackend for FixtureBackend {
    fn search(&self, _index: &str, request: &SearchRequest) -> BackendResult<SearchResponse> {
        let mut state = self.state.lock().unwrap();
        state.searches.push(request.clone());
        let matched: Vec<SearchHit> = self
            .docs
            .iter()
            .filter(|hit| matches(&request.query, &hit.id, &hit.source))
            .cloned()
            .collect();
        let total = matched.len();

        if request.scroll.is_some() {
            return Ok(Self::open_batch(&mut state, matched, request.size, total));
        }
        let from = request.from.unwrap_or(0).min(total);
        let end = (from + request.size).min(total);
        Ok(SearchResponse {
            total: total as u64,
            hits: matched[from..end].to_vec(),
            scroll_id: None,
            aggregations: request.aggregations.as_ref().map(|_| json!({})),
        })
    }

    fn scroll(&self, scroll_id: &str, _keep_alive: Duration) -> BackendResult<SearchResponse> {
        let mut state = self.state.lock().unwrap();
        state.continuations.push(scroll_id.to_string());
        let (remaining, size) = state
            .open
            .remove(scroll_id)
            .ok_or_else(|| BackendError::Io(format!("unknown scroll {}", scroll_id)))?;
        let total = remaining.len();
        Ok(Self::open_batch(&mut state, remaining, size, total))
    }

    fn clear_scroll(&self, scroll_ids: &BTreeSet<String>) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap();
        state.releases.push(scroll_ids.clone());
        for id in scroll_ids {
            state.open.remove(id);
        }
        Ok(())
    }
}
