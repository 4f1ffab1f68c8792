//! Spatial compilation and grid precision through the public API

use geo_types::{coord, Rect};
use serde_json::{json, Value};

use esgeo::filter::{
    bounds, compile, AttributeSchema, DistanceOp, FeatureSchema, GeometryStorage, Predicate,
    SpatialOp,
};
use esgeo::geo::geometry::parse_wkt;
use esgeo::geo::{compute_precision, update_grid_aggregation_precision, GeometryLiteral};

fn schema() -> FeatureSchema {
    FeatureSchema::new("parcels")
        .with_attribute(AttributeSchema::geometry("loc", GeometryStorage::Point))
        .with_attribute(AttributeSchema::geometry("grid", GeometryStorage::Point).planar())
        .with_attribute(AttributeSchema::geometry("outline", GeometryStorage::Shape))
}

fn wkt(text: &str) -> GeometryLiteral {
    GeometryLiteral::new(parse_wkt(text).unwrap())
}

fn query_of(predicate: &Predicate) -> Value {
    let compiled = compile(predicate, &schema(), None).unwrap();
    assert!(compiled.fully_supported);
    compiled.query
}

// =============================================================================
// Distance
// =============================================================================

#[test]
fn test_dwithin_converts_miles_on_geographic_field() {
    let query = query_of(&Predicate::distance(
        DistanceOp::DWithin,
        "loc",
        wkt("POINT(10 20)"),
        1.0,
        "mile",
    ));
    assert_eq!(
        query["bool"]["filter"]["geo_distance"],
        json!({"distance": "1609.344m", "loc": [10.0, 20.0]})
    );
}

#[test]
fn test_dwithin_leaves_planar_distance_alone() {
    let query = query_of(&Predicate::distance(
        DistanceOp::DWithin,
        "grid",
        wkt("POINT(10 20)"),
        1.0,
        "mile",
    ));
    assert_eq!(query["bool"]["filter"]["geo_distance"]["distance"], json!("1m"));
}

#[test]
fn test_beyond_is_negated_dwithin() {
    let query = query_of(&Predicate::distance(
        DistanceOp::Beyond,
        "loc",
        wkt("POINT(0 0)"),
        2.0,
        "km",
    ));
    assert_eq!(
        query["bool"]["must_not"]["bool"]["filter"]["geo_distance"]["distance"],
        json!("2000m")
    );
}

// =============================================================================
// Spatial Relations
// =============================================================================

#[test]
fn test_bbox_spanning_the_globe_covers_all_longitudes() {
    let query = query_of(&Predicate::spatial(
        SpatialOp::Bbox,
        "loc",
        wkt("POLYGON((-200 -10, 200 -10, 200 10, -200 10, -200 -10))"),
    ));
    let bbox = &query["bool"]["filter"]["geo_bounding_box"]["loc"];
    assert_eq!(bbox["top_left"], json!([-180.0, 10.0]));
    assert_eq!(bbox["bottom_right"], json!([180.0, -10.0]));
}

#[test]
fn test_shape_relations() {
    let polygon = wkt("POLYGON((0 0, 4 0, 4 4, 0 4, 0 0))");

    let intersects = query_of(&Predicate::spatial(SpatialOp::Intersects, "outline", polygon.clone()));
    assert_eq!(
        intersects["bool"]["filter"]["geo_shape"]["outline"]["relation"],
        "intersects"
    );
    assert_eq!(
        intersects["bool"]["filter"]["geo_shape"]["outline"]["shape"]["type"],
        "Polygon"
    );

    let disjoint = query_of(&Predicate::spatial(SpatialOp::Disjoint, "outline", polygon));
    assert_eq!(
        disjoint["bool"]["filter"]["geo_shape"]["outline"]["relation"],
        "disjoint"
    );
}

#[test]
fn test_world_literal_matches_everything() {
    let query = query_of(&Predicate::spatial(
        SpatialOp::Intersects,
        "outline",
        wkt("POLYGON((-180 -90, 180 -90, 180 90, -180 90, -180 -90))"),
    ));
    assert_eq!(query, json!({"match_all": {}}));
}

#[test]
fn test_unsupported_relation_degrades() {
    let predicate = Predicate::spatial(SpatialOp::Crosses, "loc", wkt("LINESTRING(0 0, 1 1)"));
    let compiled = compile(&predicate, &schema(), None).unwrap();
    assert!(!compiled.fully_supported);
    assert_eq!(compiled.query, json!({"match_all": {}}));
}

// =============================================================================
// Grid Precision
// =============================================================================

#[test]
fn test_world_precision_levels() {
    let world = Rect::new(coord! { x: -180.0, y: -90.0 }, coord! { x: 180.0, y: 90.0 });
    assert_eq!(compute_precision(&world, 32), 1);
    assert_eq!(compute_precision(&world, 1024), 2);
    assert_eq!(compute_precision(&world, 10000), 2);
    assert_eq!(compute_precision(&world, 32768), 3);
}

#[test]
fn test_smaller_envelope_allows_finer_cells() {
    let world = Rect::new(coord! { x: -180.0, y: -90.0 }, coord! { x: 180.0, y: 90.0 });
    let city = Rect::new(coord! { x: 10.0, y: 59.0 }, coord! { x: 11.0, y: 60.0 });
    assert!(compute_precision(&city, 10000) > compute_precision(&world, 10000));
}

#[test]
fn test_precision_from_predicate_bounds() {
    let predicate = Predicate::spatial(
        SpatialOp::Bbox,
        "loc",
        wkt("POLYGON((-180 -90, 180 -90, 180 90, -180 90, -180 -90))"),
    );
    let envelope = bounds(&predicate).envelope();
    assert_eq!(compute_precision(&envelope, 1024), 2);
}

#[test]
fn test_update_grid_precision_leaves_siblings() {
    let mut aggs = json!({
        "cells": {"geohash_grid": {"field": "loc", "precision": 1}},
        "kinds": {"terms": {"field": "kind"}},
    })
    .as_object()
    .cloned()
    .unwrap();

    update_grid_aggregation_precision(&mut aggs, 4);

    assert_eq!(aggs["cells"]["geohash_grid"]["precision"], json!(4));
    assert_eq!(aggs["cells"]["geohash_grid"]["field"], json!("loc"));
    assert_eq!(aggs["kinds"], json!({"terms": {"field": "kind"}}));
}
