//! Predicate tree
//!
//! A closed set of predicate kinds. Trees are plain data: they can be built
//! in code or deserialized from a tagged JSON form such as
//! `{"op": "and", "children": [...]}`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geo::geometry::GeometryLiteral;

/// An operand: an attribute reference or a literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Property(String),
    Literal(Literal),
}

impl Expr {
    /// Attribute reference
    pub fn property(name: impl Into<String>) -> Self {
        Expr::Property(name.into())
    }

    /// Plain JSON literal
    pub fn value(value: impl Into<Value>) -> Self {
        Expr::Literal(Literal::Value(value.into()))
    }

    /// Instant literal
    pub fn date(instant: DateTime<Utc>) -> Self {
        Expr::Literal(Literal::Date(instant))
    }

    /// Period literal
    pub fn period(begin: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Expr::Literal(Literal::Period(Period { begin, end }))
    }

    /// Geometry literal
    pub fn geometry(geometry: impl Into<geo_types::Geometry<f64>>) -> Self {
        Expr::Literal(Literal::Geometry(GeometryLiteral::new(geometry)))
    }

    pub fn as_property(&self) -> Option<&str> {
        match self {
            Expr::Property(name) => Some(name),
            Expr::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Expr::Property(_) => None,
            Expr::Literal(literal) => Some(literal),
        }
    }
}

/// Literal operand values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    /// Strings, numbers and booleans
    Value(Value),
    /// An instant, RFC 3339 on the wire
    Date(DateTime<Utc>),
    /// A closed time period
    Period(Period),
    /// A geometry, WKT on the wire
    Geometry(GeometryLiteral),
}

/// A time period with inclusive bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Binary comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
}

impl ComparisonOp {
    /// The operator that keeps meaning when operands trade places
    pub fn mirror(self) -> Self {
        match self {
            ComparisonOp::Gt => ComparisonOp::Lt,
            ComparisonOp::Gte => ComparisonOp::Lte,
            ComparisonOp::Lt => ComparisonOp::Gt,
            ComparisonOp::Lte => ComparisonOp::Gte,
            other => other,
        }
    }

    /// Range clause key for ordering operators
    pub fn range_key(self) -> Option<&'static str> {
        match self {
            ComparisonOp::Gt => Some("gt"),
            ComparisonOp::Gte => Some("gte"),
            ComparisonOp::Lt => Some("lt"),
            ComparisonOp::Lte => Some("lte"),
            ComparisonOp::Eq | ComparisonOp::NotEq => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::NotEq => "!=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
        }
    }
}

/// Binary spatial relations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialOp {
    Bbox,
    Contains,
    Crosses,
    Disjoint,
    Equals,
    Intersects,
    Overlaps,
    Touches,
    Within,
}

impl SpatialOp {
    pub fn as_str(self) -> &'static str {
        match self {
            SpatialOp::Bbox => "bbox",
            SpatialOp::Contains => "contains",
            SpatialOp::Crosses => "crosses",
            SpatialOp::Disjoint => "disjoint",
            SpatialOp::Equals => "equals",
            SpatialOp::Intersects => "intersects",
            SpatialOp::Overlaps => "overlaps",
            SpatialOp::Touches => "touches",
            SpatialOp::Within => "within",
        }
    }
}

/// Distance buffer relations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceOp {
    #[serde(rename = "dwithin")]
    DWithin,
    Beyond,
}

impl DistanceOp {
    pub fn as_str(self) -> &'static str {
        match self {
            DistanceOp::DWithin => "dwithin",
            DistanceOp::Beyond => "beyond",
        }
    }
}

/// Temporal relations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalOp {
    After,
    Before,
    Begins,
    BegunBy,
    During,
    EndedBy,
    Ends,
    Meets,
    MetBy,
    OverlappedBy,
    #[serde(rename = "tcontains")]
    TContains,
    #[serde(rename = "tequals")]
    TEquals,
    #[serde(rename = "toverlaps")]
    TOverlaps,
    AnyInteracts,
}

impl TemporalOp {
    pub fn as_str(self) -> &'static str {
        match self {
            TemporalOp::After => "after",
            TemporalOp::Before => "before",
            TemporalOp::Begins => "begins",
            TemporalOp::BegunBy => "begun_by",
            TemporalOp::During => "during",
            TemporalOp::EndedBy => "ended_by",
            TemporalOp::Ends => "ends",
            TemporalOp::Meets => "meets",
            TemporalOp::MetBy => "met_by",
            TemporalOp::OverlappedBy => "overlapped_by",
            TemporalOp::TContains => "tcontains",
            TemporalOp::TEquals => "tequals",
            TemporalOp::TOverlaps => "toverlaps",
            TemporalOp::AnyInteracts => "any_interacts",
        }
    }
}

/// Wildcard configuration of a like predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeSyntax {
    #[serde(default = "default_wildcard")]
    pub wildcard: char,
    #[serde(default = "default_single_char")]
    pub single_char: char,
    #[serde(default = "default_escape")]
    pub escape: char,
    #[serde(default = "default_match_case")]
    pub match_case: bool,
}

fn default_wildcard() -> char {
    '%'
}
fn default_single_char() -> char {
    '_'
}
fn default_escape() -> char {
    '\\'
}
fn default_match_case() -> bool {
    true
}

impl Default for LikeSyntax {
    fn default() -> Self {
        Self {
            wildcard: default_wildcard(),
            single_char: default_single_char(),
            escape: default_escape(),
            match_case: default_match_case(),
        }
    }
}

/// A predicate tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Matches everything
    Include,
    /// Matches nothing
    Exclude,
    And {
        children: Vec<Predicate>,
    },
    Or {
        children: Vec<Predicate>,
    },
    Not {
        child: Box<Predicate>,
    },
    Compare {
        operator: ComparisonOp,
        left: Expr,
        right: Expr,
    },
    /// Inclusive on both bounds
    Between {
        expr: Expr,
        lower: Expr,
        upper: Expr,
    },
    Like {
        expr: Expr,
        pattern: String,
        #[serde(default)]
        syntax: LikeSyntax,
    },
    IsNull {
        expr: Expr,
    },
    /// Feature identifier set
    Ids {
        ids: Vec<String>,
    },
    Spatial {
        operator: SpatialOp,
        left: Expr,
        right: Expr,
    },
    Distance {
        operator: DistanceOp,
        left: Expr,
        right: Expr,
        distance: f64,
        #[serde(default)]
        units: String,
    },
    Temporal {
        operator: TemporalOp,
        left: Expr,
        right: Expr,
    },
}

impl Predicate {
    pub fn and(children: Vec<Predicate>) -> Self {
        Predicate::And { children }
    }

    pub fn or(children: Vec<Predicate>) -> Self {
        Predicate::Or { children }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: Predicate) -> Self {
        Predicate::Not {
            child: Box::new(child),
        }
    }

    pub fn compare(operator: ComparisonOp, left: Expr, right: Expr) -> Self {
        Predicate::Compare {
            operator,
            left,
            right,
        }
    }

    /// `property = value`
    pub fn eq(property: &str, value: impl Into<Value>) -> Self {
        Self::compare(ComparisonOp::Eq, Expr::property(property), Expr::value(value))
    }

    pub fn between(property: &str, lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        Predicate::Between {
            expr: Expr::property(property),
            lower: Expr::value(lower),
            upper: Expr::value(upper),
        }
    }

    /// Like with the default `%`, `_` and `\` syntax
    pub fn like(property: &str, pattern: impl Into<String>) -> Self {
        Predicate::Like {
            expr: Expr::property(property),
            pattern: pattern.into(),
            syntax: LikeSyntax::default(),
        }
    }

    pub fn is_null(property: &str) -> Self {
        Predicate::IsNull {
            expr: Expr::property(property),
        }
    }

    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::Ids {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn spatial(operator: SpatialOp, property: &str, geometry: GeometryLiteral) -> Self {
        Predicate::Spatial {
            operator,
            left: Expr::property(property),
            right: Expr::Literal(Literal::Geometry(geometry)),
        }
    }

    pub fn distance(
        operator: DistanceOp,
        property: &str,
        geometry: GeometryLiteral,
        distance: f64,
        units: impl Into<String>,
    ) -> Self {
        Predicate::Distance {
            operator,
            left: Expr::property(property),
            right: Expr::Literal(Literal::Geometry(geometry)),
            distance,
            units: units.into(),
        }
    }

    pub fn temporal(operator: TemporalOp, property: &str, literal: Literal) -> Self {
        Predicate::Temporal {
            operator,
            left: Expr::property(property),
            right: Expr::Literal(literal),
        }
    }

    /// Short name of the predicate kind for logs and notes
    pub fn kind(&self) -> &'static str {
        match self {
            Predicate::Include => "include",
            Predicate::Exclude => "exclude",
            Predicate::And { .. } => "and",
            Predicate::Or { .. } => "or",
            Predicate::Not { .. } => "not",
            Predicate::Compare { .. } => "compare",
            Predicate::Between { .. } => "between",
            Predicate::Like { .. } => "like",
            Predicate::IsNull { .. } => "is_null",
            Predicate::Ids { .. } => "ids",
            Predicate::Spatial { operator, .. } => operator.as_str(),
            Predicate::Distance { operator, .. } => operator.as_str(),
            Predicate::Temporal { operator, .. } => operator.as_str(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(text) => write!(f, "{}", text),
            Err(_) => write!(f, "{}", self.kind()),
        }
    }
}

/// An attribute on one side and a literal on the other
#[derive(Debug, Clone, Copy)]
pub struct Operands<'a> {
    pub property: &'a str,
    pub literal: &'a Literal,
    /// The literal was written first
    pub swapped: bool,
}

/// Split a binary operand pair into attribute and literal
///
/// Returns None for two attributes or two literals.
pub fn operands<'a>(left: &'a Expr, right: &'a Expr) -> Option<Operands<'a>> {
    match (left, right) {
        (Expr::Property(property), Expr::Literal(literal)) => Some(Operands {
            property,
            literal,
            swapped: false,
        }),
        (Expr::Literal(literal), Expr::Property(property)) => Some(Operands {
            property,
            literal,
            swapped: true,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_tagged_tree() {
        let value = json!({
            "op": "and",
            "children": [
                {"op": "compare", "operator": ">=", "left": {"property": "age"}, "right": {"literal": {"value": 18}}},
                {"op": "is_null", "expr": {"property": "deleted"}},
            ]
        });
        let predicate: Predicate = serde_json::from_value(value).unwrap();
        assert_eq!(
            predicate,
            Predicate::and(vec![
                Predicate::compare(ComparisonOp::Gte, Expr::property("age"), Expr::value(18)),
                Predicate::is_null("deleted"),
            ])
        );
    }

    #[test]
    fn test_deserialize_like_defaults() {
        let value = json!({"op": "like", "expr": {"property": "name"}, "pattern": "Ab%"});
        match serde_json::from_value::<Predicate>(value).unwrap() {
            Predicate::Like { syntax, .. } => assert_eq!(syntax, LikeSyntax::default()),
            other => panic!("expected like, got {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_spatial_and_temporal_literals() {
        let value = json!({
            "op": "distance",
            "operator": "dwithin",
            "left": {"property": "geom"},
            "right": {"literal": {"geometry": "POINT(1 2)"}},
            "distance": 1.0,
            "units": "mile",
        });
        let predicate: Predicate = serde_json::from_value(value).unwrap();
        assert_eq!(predicate.kind(), "dwithin");

        let value = json!({
            "op": "temporal",
            "operator": "during",
            "left": {"property": "seen"},
            "right": {"literal": {"period": {"begin": "2020-01-01T00:00:00Z", "end": "2020-02-01T00:00:00Z"}}},
        });
        let predicate: Predicate = serde_json::from_value(value).unwrap();
        assert_eq!(predicate.kind(), "during");
    }

    #[test]
    fn test_invalid_wkt_fails_deserialization() {
        let value = json!({
            "op": "spatial",
            "operator": "intersects",
            "left": {"property": "geom"},
            "right": {"literal": {"geometry": "POLYGON((0 0"}},
        });
        assert!(serde_json::from_value::<Predicate>(value).is_err());
    }

    #[test]
    fn test_mirror() {
        assert_eq!(ComparisonOp::Lt.mirror(), ComparisonOp::Gt);
        assert_eq!(ComparisonOp::Gte.mirror(), ComparisonOp::Lte);
        assert_eq!(ComparisonOp::Eq.mirror(), ComparisonOp::Eq);
    }

    #[test]
    fn test_operands_swapped() {
        let left = Expr::value(5);
        let right = Expr::property("age");
        let ops = operands(&left, &right).unwrap();
        assert_eq!(ops.property, "age");
        assert!(ops.swapped);

        assert!(operands(&Expr::property("a"), &Expr::property("b")).is_none());
    }
}
