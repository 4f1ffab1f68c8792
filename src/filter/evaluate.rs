//! Row-level predicate evaluation
//!
//! Re-evaluates the full predicate against a returned document when
//! compilation degraded. Field lookup follows the native field path, and a
//! multi-valued field matches when any of its values does.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use geo::{BoundingRect, Centroid, Relate};
use geo_types::{Geometry, Point};
use regex::Regex;
use serde_json::Value;

use super::ast::{
    operands, ComparisonOp, DistanceOp, Expr, LikeSyntax, Literal, Predicate, SpatialOp,
    TemporalOp,
};
use super::like;
use super::schema::{AttributeSchema, FeatureSchema};
use super::temporal::{classify, side, Side, TemporalValue};
use crate::geo::geometry::from_document;
use crate::geo::sanitize::{sanitize, Sanitized};
use crate::geo::units::to_meters;

/// Mean earth radius in meters used for great-circle distances
const EARTH_RADIUS_METERS: f64 = 6_371_008.7714;

/// Great-circle distance between two lon/lat points
pub fn haversine_meters(a: Point<f64>, b: Point<f64>) -> f64 {
    let (lat1, lat2) = (a.y().to_radians(), b.y().to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.x() - a.x()).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// Collect every value at a dotted path, descending into arrays
pub fn lookup<'a>(document: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![document];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            collect_child(value, segment, &mut next);
        }
        current = next;
    }
    let mut out = Vec::new();
    for value in current {
        match value {
            Value::Array(items) => out.extend(items.iter().filter(|v| !v.is_null())),
            Value::Null => {}
            other => out.push(other),
        }
    }
    out
}

fn collect_child<'a>(value: &'a Value, key: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            if let Some(child) = map.get(key) {
                out.push(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_child(item, key, out);
            }
        }
        _ => {}
    }
}

/// Parse a stored date with the attribute's format, falling back to RFC 3339
pub fn parse_date(attribute: &AttributeSchema, value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    let format = attribute.date_format.as_deref()?;
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, format)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Ordering between two stored or literal scalars
///
/// Numbers compare numerically, RFC 3339 strings as instants, other strings
/// lexically. Mixed kinds do not compare.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(dx), Ok(dy)) => Some(dx.cmp(&dy)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn satisfies(op: ComparisonOp, ordering: Option<Ordering>) -> bool {
    match (op, ordering) {
        (ComparisonOp::Eq, Some(o)) => o == Ordering::Equal,
        (ComparisonOp::NotEq, Some(o)) => o != Ordering::Equal,
        (ComparisonOp::Gt, Some(o)) => o == Ordering::Greater,
        (ComparisonOp::Gte, Some(o)) => o != Ordering::Less,
        (ComparisonOp::Lt, Some(o)) => o == Ordering::Less,
        (ComparisonOp::Lte, Some(o)) => o != Ordering::Greater,
        (_, None) => false,
    }
}

/// Scalar or instant operand after resolution
#[derive(Debug, Clone)]
enum Scalar {
    Value(Value),
    Instant(DateTime<Utc>),
}

/// Evaluates a predicate tree against documents of one feature type
pub struct PostFilter {
    predicate: Predicate,
    schema: FeatureSchema,
    patterns: HashMap<(String, char, char, char, bool), Option<Regex>>,
}

impl PostFilter {
    pub fn new(predicate: Predicate, schema: FeatureSchema) -> Self {
        let mut patterns = HashMap::new();
        collect_patterns(&predicate, &mut patterns);
        Self {
            predicate,
            schema,
            patterns,
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// True when the document with this id and source satisfies the predicate
    pub fn matches(&self, id: &str, source: &Value) -> bool {
        self.eval(&self.predicate, id, source)
    }

    fn eval(&self, predicate: &Predicate, id: &str, doc: &Value) -> bool {
        match predicate {
            Predicate::Include => true,
            Predicate::Exclude => false,
            Predicate::And { children } => children.iter().all(|c| self.eval(c, id, doc)),
            Predicate::Or { children } => children.iter().any(|c| self.eval(c, id, doc)),
            Predicate::Not { child } => !self.eval(child, id, doc),
            Predicate::Compare {
                operator,
                left,
                right,
            } => self.eval_compare(*operator, left, right, doc),
            Predicate::Between { expr, lower, upper } => {
                let attribute = expr.as_property().map(|n| self.schema.resolve(n));
                let lhs = self.scalars(expr, doc);
                let lower = self.scalars(lower, doc);
                let upper = self.scalars(upper, doc);
                lhs.iter().any(|v| {
                    lower.iter().any(|lo| {
                        satisfies(ComparisonOp::Gte, order(attribute.as_deref(), v, lo))
                    }) && upper.iter().any(|hi| {
                        satisfies(ComparisonOp::Lte, order(attribute.as_deref(), v, hi))
                    })
                })
            }
            Predicate::Like {
                expr,
                pattern,
                syntax,
            } => {
                let Some(re) = self.patterns.get(&pattern_key(pattern, syntax)).cloned().flatten()
                else {
                    return false;
                };
                self.scalars(expr, doc).iter().any(|v| match v {
                    Scalar::Value(Value::String(s)) => re.is_match(s),
                    Scalar::Value(other @ (Value::Number(_) | Value::Bool(_))) => {
                        re.is_match(&other.to_string())
                    }
                    _ => false,
                })
            }
            Predicate::IsNull { expr } => match expr {
                Expr::Property(name) => {
                    let attribute = self.schema.resolve(name);
                    lookup(doc, attribute.field()).is_empty()
                }
                Expr::Literal(Literal::Value(v)) => v.is_null(),
                Expr::Literal(_) => false,
            },
            Predicate::Ids { ids } => {
                let prefix = format!("{}.", self.schema.type_name);
                ids.iter()
                    .any(|candidate| candidate == id || candidate.strip_prefix(&prefix) == Some(id))
            }
            Predicate::Spatial {
                operator,
                left,
                right,
            } => self.eval_spatial(*operator, left, right, doc),
            Predicate::Distance {
                operator,
                left,
                right,
                distance,
                units,
            } => self.eval_distance(*operator, left, right, *distance, units, doc),
            Predicate::Temporal {
                operator,
                left,
                right,
            } => self.eval_temporal(*operator, left, right, doc),
        }
    }

    fn scalars(&self, expr: &Expr, doc: &Value) -> Vec<Scalar> {
        match expr {
            Expr::Property(name) => {
                let attribute = self.schema.resolve(name);
                lookup(doc, attribute.field())
                    .into_iter()
                    .map(|v| Scalar::Value(v.clone()))
                    .collect()
            }
            Expr::Literal(Literal::Value(v)) if !v.is_null() => vec![Scalar::Value(v.clone())],
            Expr::Literal(Literal::Date(instant)) => vec![Scalar::Instant(*instant)],
            Expr::Literal(_) => Vec::new(),
        }
    }

    fn eval_compare(&self, op: ComparisonOp, left: &Expr, right: &Expr, doc: &Value) -> bool {
        let attribute = left
            .as_property()
            .or_else(|| right.as_property())
            .map(|n| self.schema.resolve(n));
        let lhs = self.scalars(left, doc);
        let rhs = self.scalars(right, doc);

        // A missing value never equals anything, so != holds
        if op == ComparisonOp::NotEq {
            return !lhs.iter().any(|a| {
                rhs.iter()
                    .any(|b| satisfies(ComparisonOp::Eq, order(attribute.as_deref(), a, b)))
            });
        }
        lhs.iter().any(|a| {
            rhs.iter()
                .any(|b| satisfies(op, order(attribute.as_deref(), a, b)))
        })
    }

    fn doc_geometries(&self, name: &str, doc: &Value) -> (AttributeSchema, Vec<Geometry<f64>>) {
        let attribute = self.schema.resolve(name).into_owned();
        let mut geometries = Vec::new();
        // A bare [lon, lat] pair is one point, not two values
        if let Some(raw) = single_value(doc, attribute.field()) {
            if let Some(g) = from_document(raw) {
                geometries.push(g);
                return (attribute, geometries);
            }
        }
        for value in lookup(doc, attribute.field()) {
            if let Some(g) = from_document(value) {
                geometries.push(g);
            }
        }
        (attribute, geometries)
    }

    fn eval_spatial(&self, op: SpatialOp, left: &Expr, right: &Expr, doc: &Value) -> bool {
        let Some(ops) = operands(left, right) else {
            return false;
        };
        let Literal::Geometry(literal) = ops.literal else {
            return false;
        };
        let (attribute, geometries) = self.doc_geometries(ops.property, doc);

        let literal = if attribute.geographic {
            match sanitize(literal.geometry()) {
                Sanitized::World => return true,
                Sanitized::Empty => return op == SpatialOp::Disjoint,
                Sanitized::Clipped(g) => g,
            }
        } else {
            literal.geometry().clone()
        };
        let literal = match op {
            SpatialOp::Bbox => match literal.bounding_rect() {
                Some(rect) => Geometry::Rect(rect),
                None => return false,
            },
            _ => literal,
        };

        geometries.iter().any(|g| {
            let matrix = if ops.swapped {
                literal.relate(g)
            } else {
                g.relate(&literal)
            };
            match op {
                SpatialOp::Bbox | SpatialOp::Intersects => matrix.is_intersects(),
                SpatialOp::Contains => matrix.is_contains(),
                SpatialOp::Crosses => matrix.is_crosses(),
                SpatialOp::Disjoint => matrix.is_disjoint(),
                SpatialOp::Equals => matrix.is_equal_topo(),
                SpatialOp::Overlaps => matrix.is_overlaps(),
                SpatialOp::Touches => matrix.is_touches(),
                SpatialOp::Within => matrix.is_within(),
            }
        })
    }

    fn eval_distance(
        &self,
        op: DistanceOp,
        left: &Expr,
        right: &Expr,
        distance: f64,
        units: &str,
        doc: &Value,
    ) -> bool {
        let Some(ops) = operands(left, right) else {
            return false;
        };
        let Literal::Geometry(literal) = ops.literal else {
            return false;
        };
        let Some(center) = literal.geometry().centroid() else {
            return false;
        };
        let (attribute, geometries) = self.doc_geometries(ops.property, doc);
        let limit = to_meters(distance, units, attribute.geographic);

        let within = geometries.iter().filter_map(|g| g.centroid()).any(|p| {
            let d = if attribute.geographic {
                haversine_meters(p, center)
            } else {
                ((p.x() - center.x()).powi(2) + (p.y() - center.y()).powi(2)).sqrt()
            };
            d <= limit
        });
        let negate = match op {
            DistanceOp::DWithin => ops.swapped,
            DistanceOp::Beyond => !ops.swapped,
        };
        within != negate
    }

    fn eval_temporal(&self, op: TemporalOp, left: &Expr, right: &Expr, doc: &Value) -> bool {
        let Some(ops) = operands(left, right) else {
            return false;
        };
        let Some(literal) = classify(ops.literal) else {
            return false;
        };
        let attribute = self.schema.resolve(ops.property);
        lookup(doc, attribute.field())
            .into_iter()
            .filter_map(|v| parse_date(&attribute, v))
            .any(|v| temporal_holds(op, v, literal, ops.swapped))
    }
}

fn single_value<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn order(attribute: Option<&AttributeSchema>, a: &Scalar, b: &Scalar) -> Option<Ordering> {
    let instant = |s: &Scalar| match s {
        Scalar::Instant(i) => Some(*i),
        Scalar::Value(v) => attribute.and_then(|attr| parse_date(attr, v)),
    };
    match (a, b) {
        (Scalar::Value(x), Scalar::Value(y)) => compare_values(x, y),
        _ => Some(instant(a)?.cmp(&instant(b)?)),
    }
}

/// Relation between an instant attribute value and a literal
pub fn temporal_holds(
    op: TemporalOp,
    value: DateTime<Utc>,
    literal: TemporalValue,
    swapped: bool,
) -> bool {
    match (op, literal) {
        (TemporalOp::After | TemporalOp::Before, TemporalValue::Period(p)) => {
            match side(op, swapped) {
                Some(Side::Later) => value > p.end,
                _ => value < p.begin,
            }
        }
        (TemporalOp::After | TemporalOp::Before, TemporalValue::Instant(i)) => {
            match side(op, swapped) {
                Some(Side::Later) => value > i,
                _ => value < i,
            }
        }
        (TemporalOp::Begins | TemporalOp::Meets, TemporalValue::Period(p)) => value == p.begin,
        (TemporalOp::Ends | TemporalOp::MetBy, TemporalValue::Period(p)) => value == p.end,
        (TemporalOp::During | TemporalOp::TContains, TemporalValue::Period(p)) => {
            value > p.begin && value < p.end
        }
        (TemporalOp::AnyInteracts, TemporalValue::Period(p)) => value >= p.begin && value <= p.end,
        (
            TemporalOp::Begins
            | TemporalOp::Ends
            | TemporalOp::BegunBy
            | TemporalOp::EndedBy
            | TemporalOp::TEquals
            | TemporalOp::AnyInteracts,
            TemporalValue::Instant(i),
        ) => value == i,
        _ => false,
    }
}

type PatternKey = (String, char, char, char, bool);

fn pattern_key(pattern: &str, syntax: &LikeSyntax) -> PatternKey {
    (
        pattern.to_string(),
        syntax.wildcard,
        syntax.single_char,
        syntax.escape,
        syntax.match_case,
    )
}

fn collect_patterns(predicate: &Predicate, out: &mut HashMap<PatternKey, Option<Regex>>) {
    match predicate {
        Predicate::And { children } | Predicate::Or { children } => {
            for child in children {
                collect_patterns(child, out);
            }
        }
        Predicate::Not { child } => collect_patterns(child, out),
        Predicate::Like {
            pattern, syntax, ..
        } => {
            out.entry(pattern_key(pattern, syntax))
                .or_insert_with(|| like::to_regex(pattern, syntax).ok());
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::schema::GeometryStorage;
    use crate::geo::geometry::{parse_wkt, GeometryLiteral};
    use chrono::TimeZone;
    use serde_json::json;

    fn schema() -> FeatureSchema {
        FeatureSchema::new("roads")
            .with_attribute(AttributeSchema::new("name"))
            .with_attribute(
                AttributeSchema::new("tag")
                    .with_native_name("tags.name")
                    .nested(),
            )
            .with_attribute(AttributeSchema::geometry("geom", GeometryStorage::Point))
            .with_attribute(AttributeSchema::new("seen").with_date_format("%Y-%m-%d"))
    }

    fn eval(predicate: Predicate, doc: &Value) -> bool {
        PostFilter::new(predicate, schema()).matches("7", doc)
    }

    #[test]
    fn test_lookup_through_arrays() {
        let doc = json!({"tags": [{"name": "a"}, {"name": "b"}], "x": {"y": 1}});
        assert_eq!(lookup(&doc, "tags.name"), vec![&json!("a"), &json!("b")]);
        assert_eq!(lookup(&doc, "x.y"), vec![&json!(1)]);
        assert!(lookup(&doc, "missing").is_empty());
    }

    #[test]
    fn test_compare_numbers_and_strings() {
        let doc = json!({"name": "Main", "lanes": 2});
        assert!(eval(Predicate::eq("name", "Main"), &doc));
        assert!(eval(Predicate::eq("lanes", 2.0), &doc));
        let gt = Predicate::compare(ComparisonOp::Gt, Expr::property("lanes"), Expr::value(1));
        assert!(eval(gt, &doc));
        let swapped = Predicate::compare(ComparisonOp::Lt, Expr::value(1), Expr::property("lanes"));
        assert!(eval(swapped, &doc));
    }

    #[test]
    fn test_not_equal_on_missing_field() {
        let ne = Predicate::compare(ComparisonOp::NotEq, Expr::property("lanes"), Expr::value(2));
        assert!(eval(ne, &json!({"name": "x"})));
    }

    #[test]
    fn test_nested_any_match() {
        let doc = json!({"tags": [{"name": "bridge"}, {"name": "toll"}]});
        assert!(eval(Predicate::eq("tag", "toll"), &doc));
        assert!(!eval(Predicate::eq("tag", "tunnel"), &doc));
    }

    #[test]
    fn test_like_and_null() {
        let doc = json!({"name": "Main Street"});
        assert!(eval(Predicate::like("name", "Main%"), &doc));
        assert!(!eval(Predicate::like("name", "main%"), &doc));
        assert!(eval(Predicate::is_null("lanes"), &doc));
        assert!(!eval(Predicate::is_null("name"), &doc));
    }

    #[test]
    fn test_ids_with_prefix() {
        let doc = json!({});
        assert!(eval(Predicate::ids(["roads.7"]), &doc));
        assert!(eval(Predicate::ids(["7"]), &doc));
        assert!(!eval(Predicate::ids(["8"]), &doc));
    }

    #[test]
    fn test_spatial_relations() {
        let doc = json!({"geom": [0.5, 0.5]});
        let square = GeometryLiteral::new(parse_wkt("POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))").unwrap());
        assert!(eval(Predicate::spatial(SpatialOp::Within, "geom", square.clone()), &doc));
        assert!(eval(Predicate::spatial(SpatialOp::Intersects, "geom", square.clone()), &doc));
        assert!(!eval(Predicate::spatial(SpatialOp::Disjoint, "geom", square.clone()), &doc));

        let far = json!({"geom": "10,10"});
        assert!(!eval(Predicate::spatial(SpatialOp::Bbox, "geom", square), &far));
    }

    #[test]
    fn test_distance() {
        let doc = json!({"geom": [0.0, 0.0]});
        let origin = GeometryLiteral::new(parse_wkt("POINT(0 0.01)").unwrap());
        // 0.01 degrees of latitude is about 1.1 km
        assert!(eval(
            Predicate::distance(DistanceOp::DWithin, "geom", origin.clone(), 2.0, "km"),
            &doc
        ));
        assert!(!eval(
            Predicate::distance(DistanceOp::DWithin, "geom", origin.clone(), 1.0, "km"),
            &doc
        ));
        assert!(eval(
            Predicate::distance(DistanceOp::Beyond, "geom", origin, 1.0, "km"),
            &doc
        ));
    }

    #[test]
    fn test_haversine() {
        let d = haversine_meters(Point::new(0.0, 0.0), Point::new(0.0, 1.0));
        assert!((d - 111_195.0).abs() < 10.0);
    }

    #[test]
    fn test_temporal_with_custom_format() {
        let doc = json!({"seen": "2020-01-15"});
        let period = Literal::Period(crate::filter::ast::Period {
            begin: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2020, 1, 31, 0, 0, 0).unwrap(),
        });
        assert!(eval(
            Predicate::temporal(TemporalOp::During, "seen", period.clone()),
            &doc
        ));
        assert!(!eval(Predicate::temporal(TemporalOp::After, "seen", period), &doc));
    }

    #[test]
    fn test_unsupported_temporal_evaluates_locally() {
        let begin = Utc.with_ymd_and_hms(2020, 1, 15, 0, 0, 0).unwrap();
        let value = begin;
        let period = TemporalValue::Period(crate::filter::ast::Period {
            begin,
            end: Utc.with_ymd_and_hms(2020, 2, 1, 0, 0, 0).unwrap(),
        });
        assert!(temporal_holds(TemporalOp::Meets, value, period, false));
        assert!(temporal_holds(TemporalOp::AnyInteracts, value, period, false));
        assert!(!temporal_holds(TemporalOp::MetBy, value, period, false));
    }
}
