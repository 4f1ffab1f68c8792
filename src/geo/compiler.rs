//! Spatial predicate compilation
//!
//! Turns spatial relations between a geometry attribute and a geometry
//! literal into `geo_distance`, `geo_polygon`, `geo_bounding_box` or
//! `geo_shape` clauses, depending on how the attribute is stored.

use geo::{BoundingRect, Centroid};
use geo_types::{Geometry, Polygon};
use serde_json::{json, Map, Value};

use super::geometry::to_geojson;
use super::sanitize::{clip_lat, clip_lon, sanitize, Sanitized};
use super::units::{format_distance, to_meters};
use crate::filter::ast::{DistanceOp, SpatialOp};
use crate::filter::Unsupported;
use crate::filter::query;
use crate::filter::schema::{AttributeSchema, GeometryStorage};

/// Compile a distance buffer relation
///
/// The literal is reduced to its centroid. Beyond is the negation of
/// DWithin, and a swapped operand order flips the polarity once more.
pub fn compile_distance(
    op: DistanceOp,
    attribute: &AttributeSchema,
    literal: &Geometry<f64>,
    distance: f64,
    units: &str,
    swapped: bool,
) -> Result<Value, Unsupported> {
    if attribute.geometry == GeometryStorage::None {
        return Err(Unsupported::new(op.as_str(), "attribute is not a geometry"));
    }
    let centroid = literal
        .centroid()
        .ok_or_else(|| Unsupported::new(op.as_str(), "literal has no centroid"))?;
    let meters = to_meters(distance, units, attribute.geographic);

    let mut body = Map::new();
    body.insert("distance".to_string(), Value::String(format_distance(meters)));
    body.insert(
        attribute.field().to_string(),
        json!([centroid.x(), centroid.y()]),
    );
    let clause = query::filtered(json!({ "geo_distance": Value::Object(body) }));

    let negate = match op {
        DistanceOp::DWithin => swapped,
        DistanceOp::Beyond => !swapped,
    };
    Ok(if negate { query::must_not(clause) } else { clause })
}

/// Compile a binary spatial relation
pub fn compile_spatial(
    op: SpatialOp,
    attribute: &AttributeSchema,
    literal: &Geometry<f64>,
    swapped: bool,
) -> Result<Value, Unsupported> {
    if attribute.geometry == GeometryStorage::None {
        return Err(Unsupported::new(op.as_str(), "attribute is not a geometry"));
    }

    let geometry = if attribute.geographic {
        match sanitize(literal) {
            Sanitized::World => return Ok(query::match_all()),
            Sanitized::Empty if op == SpatialOp::Disjoint => return Ok(query::match_all()),
            Sanitized::Empty => return Ok(query::match_none()),
            Sanitized::Clipped(geometry) => geometry,
        }
    } else {
        literal.clone()
    };

    // Full longitude wrap is judged on the literal as written
    let full_wrap = literal
        .bounding_rect()
        .map(|r| r.width() >= 360.0)
        .unwrap_or(false);

    match attribute.geometry {
        GeometryStorage::Point => point_clause(op, attribute.field(), &geometry, swapped, full_wrap),
        GeometryStorage::Shape => shape_clause(op, attribute.field(), &geometry, swapped),
        GeometryStorage::None => Err(Unsupported::new(op.as_str(), "attribute is not a geometry")),
    }
}

fn is_within(op: SpatialOp, swapped: bool) -> bool {
    (op == SpatialOp::Within && !swapped) || (op == SpatialOp::Contains && swapped)
}

fn as_polygon(geometry: &Geometry<f64>) -> Option<Polygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(p.clone()),
        Geometry::Rect(r) => Some(r.to_polygon()),
        Geometry::Triangle(t) => Some(t.to_polygon()),
        _ => None,
    }
}

fn point_clause(
    op: SpatialOp,
    field: &str,
    geometry: &Geometry<f64>,
    swapped: bool,
    full_wrap: bool,
) -> Result<Value, Unsupported> {
    if is_within(op, swapped) || op == SpatialOp::Intersects {
        if let Some(polygon) = as_polygon(geometry) {
            let points: Vec<Value> = polygon
                .exterior()
                .coords()
                .map(|c| json!([c.x, c.y]))
                .collect();
            return Ok(query::filtered(query::field_clause(
                "geo_polygon",
                field,
                json!({ "points": points }),
            )));
        }
    }

    if op == SpatialOp::Bbox {
        let envelope = geometry
            .bounding_rect()
            .ok_or_else(|| Unsupported::new(op.as_str(), "literal has no envelope"))?;
        let min_y = clip_lat(envelope.min().y);
        let max_y = clip_lat(envelope.max().y);
        let (min_x, max_x) = if full_wrap {
            (-180.0, 180.0)
        } else {
            (clip_lon(envelope.min().x), clip_lon(envelope.max().x))
        };
        return Ok(query::filtered(query::field_clause(
            "geo_bounding_box",
            field,
            json!({
                "top_left": [min_x, max_y],
                "bottom_right": [max_x, min_y],
            }),
        )));
    }

    Err(Unsupported::new(
        op.as_str(),
        "not supported for point storage with this literal",
    ))
}

fn shape_clause(
    op: SpatialOp,
    field: &str,
    geometry: &Geometry<f64>,
    swapped: bool,
) -> Result<Value, Unsupported> {
    let relation = if op == SpatialOp::Disjoint {
        "disjoint"
    } else if is_within(op, swapped) {
        "within"
    } else if op == SpatialOp::Intersects || op == SpatialOp::Bbox {
        "intersects"
    } else {
        return Err(Unsupported::new(op.as_str(), "not supported for shape storage"));
    };
    Ok(query::filtered(query::field_clause(
        "geo_shape",
        field,
        json!({ "shape": to_geojson(geometry), "relation": relation }),
    )))
}
