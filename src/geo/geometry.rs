//! Geometry literals and their wire forms
//!
//! Literals arrive as WKT, go out to the backend as GeoJSON, and stored
//! document geometries are decoded back for row-level evaluation.

use std::fmt;
use std::str::FromStr;

use geo::CoordsIter;
use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon, Rect,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use wkt::ToWkt;

use super::errors::{GeoError, GeoResult};

/// A geometry literal inside a predicate tree
///
/// Serialized as WKT so predicate trees stay plain JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GeometryLiteral(pub Geometry<f64>);

impl GeometryLiteral {
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self(geometry.into())
    }

    pub fn geometry(&self) -> &Geometry<f64> {
        &self.0
    }
}

impl TryFrom<String> for GeometryLiteral {
    type Error = GeoError;

    fn try_from(value: String) -> GeoResult<Self> {
        parse_wkt(&value).map(GeometryLiteral)
    }
}

impl From<GeometryLiteral> for String {
    fn from(value: GeometryLiteral) -> Self {
        value.0.wkt_string()
    }
}

impl fmt::Display for GeometryLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.wkt_string())
    }
}

/// Parse a WKT string into a geometry
pub fn parse_wkt(text: &str) -> GeoResult<Geometry<f64>> {
    wkt::Wkt::from_str(text)
        .map_err(|e| GeoError::WktParse(format!("{:?}", e)))
        .and_then(|w| {
            w.try_into()
                .map_err(|e: wkt::conversion::Error| GeoError::WktParse(format!("{:?}", e)))
        })
}

/// True when the geometry has no coordinates at all
pub fn is_empty(geometry: &Geometry<f64>) -> bool {
    geometry.coords_count() == 0
}

fn position(c: Coord<f64>) -> Value {
    json!([c.x, c.y])
}

fn positions(line: &LineString<f64>) -> Value {
    Value::Array(line.coords().map(|c| position(*c)).collect())
}

fn rings(polygon: &Polygon<f64>) -> Value {
    let mut out = vec![positions(polygon.exterior())];
    out.extend(polygon.interiors().iter().map(positions));
    Value::Array(out)
}

/// Encode a geometry as a GeoJSON object for shape clauses
pub fn to_geojson(geometry: &Geometry<f64>) -> Value {
    match geometry {
        Geometry::Point(p) => json!({"type": "Point", "coordinates": position(p.0)}),
        Geometry::Line(l) => json!({
            "type": "LineString",
            "coordinates": [position(l.start), position(l.end)],
        }),
        Geometry::LineString(ls) => json!({"type": "LineString", "coordinates": positions(ls)}),
        Geometry::Polygon(p) => json!({"type": "Polygon", "coordinates": rings(p)}),
        Geometry::MultiPoint(mp) => json!({
            "type": "MultiPoint",
            "coordinates": mp.0.iter().map(|p| position(p.0)).collect::<Vec<_>>(),
        }),
        Geometry::MultiLineString(mls) => json!({
            "type": "MultiLineString",
            "coordinates": mls.0.iter().map(positions).collect::<Vec<_>>(),
        }),
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(rings).collect::<Vec<_>>(),
        }),
        Geometry::GeometryCollection(gc) => json!({
            "type": "GeometryCollection",
            "geometries": gc.0.iter().map(to_geojson).collect::<Vec<_>>(),
        }),
        // The backend's envelope form is upper-left then lower-right
        Geometry::Rect(r) => json!({
            "type": "envelope",
            "coordinates": [[r.min().x, r.max().y], [r.max().x, r.min().y]],
        }),
        Geometry::Triangle(t) => to_geojson(&Geometry::Polygon(t.to_polygon())),
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coord(value: &Value) -> Option<Coord<f64>> {
    let arr = value.as_array()?;
    if arr.len() < 2 {
        return None;
    }
    Some(Coord {
        x: number(&arr[0])?,
        y: number(&arr[1])?,
    })
}

fn line(value: &Value) -> Option<LineString<f64>> {
    let coords: Option<Vec<_>> = value.as_array()?.iter().map(coord).collect();
    Some(LineString::new(coords?))
}

fn polygon(value: &Value) -> Option<Polygon<f64>> {
    let mut rings = value.as_array()?.iter().map(line);
    let exterior = rings.next()??;
    let interiors: Option<Vec<_>> = rings.collect();
    Some(Polygon::new(exterior, interiors?))
}

/// Decode a geometry stored in a document
///
/// Accepts GeoJSON objects (including the backend's `envelope` type),
/// `"lat,lon"` strings, `[lon, lat]` arrays and `{"lat", "lon"}` objects.
pub fn from_document(value: &Value) -> Option<Geometry<f64>> {
    match value {
        Value::String(s) => parse_geo_point(s).map(Geometry::Point),
        Value::Array(_) => coord(value).map(|c| Geometry::Point(Point(c))),
        Value::Object(obj) => {
            if let (Some(lat), Some(lon)) = (obj.get("lat"), obj.get("lon")) {
                return Some(Geometry::Point(Point::new(number(lon)?, number(lat)?)));
            }
            let kind = obj.get("type")?.as_str()?.to_ascii_uppercase();
            if kind == "GEOMETRYCOLLECTION" {
                let members: Option<Vec<_>> = obj
                    .get("geometries")?
                    .as_array()?
                    .iter()
                    .map(from_document)
                    .collect();
                return Some(Geometry::GeometryCollection(GeometryCollection::new_from(
                    members?,
                )));
            }
            let coords = obj.get("coordinates")?;
            match kind.as_str() {
                "POINT" => coord(coords).map(|c| Geometry::Point(Point(c))),
                "LINESTRING" => line(coords).map(Geometry::LineString),
                "POLYGON" => polygon(coords).map(Geometry::Polygon),
                "MULTIPOINT" => line(coords)
                    .map(|ls| Geometry::MultiPoint(MultiPoint::new(ls.points().collect()))),
                "MULTILINESTRING" => {
                    let lines: Option<Vec<_>> = coords.as_array()?.iter().map(line).collect();
                    Some(Geometry::MultiLineString(MultiLineString::new(lines?)))
                }
                "MULTIPOLYGON" => {
                    let polys: Option<Vec<_>> = coords.as_array()?.iter().map(polygon).collect();
                    Some(Geometry::MultiPolygon(MultiPolygon::new(polys?)))
                }
                "ENVELOPE" => {
                    let corners = coords.as_array()?;
                    let upper_left = coord(corners.first()?)?;
                    let lower_right = coord(corners.get(1)?)?;
                    Some(Geometry::Rect(Rect::new(upper_left, lower_right)))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// Parse the backend's `"lat,lon"` point string
pub fn parse_geo_point(text: &str) -> Option<Point<f64>> {
    let pattern = Regex::new(r"^\s*(-?\d*\.?\d*)\s*,\s*(-?\d*\.?\d*)\s*$").ok()?;
    let caps = pattern.captures(text)?;
    let lat: f64 = caps.get(1)?.as_str().parse().ok()?;
    let lon: f64 = caps.get(2)?.as_str().parse().ok()?;
    Some(Point::new(lon, lat))
}

/// Parse `minx,miny,maxx,maxy` into an envelope
pub fn parse_bbox(text: &str) -> GeoResult<Rect<f64>> {
    let parts: Vec<f64> = text
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| GeoError::InvalidBbox(format!("{}: {}", text, e)))?;
    match parts.as_slice() {
        [min_x, min_y, max_x, max_y] if min_x <= max_x && min_y <= max_y => Ok(Rect::new(
            Coord { x: *min_x, y: *min_y },
            Coord { x: *max_x, y: *max_y },
        )),
        [_, _, _, _] => Err(GeoError::InvalidBbox(format!("{}: min exceeds max", text))),
        _ => Err(GeoError::InvalidBbox(format!("{}: expected four numbers", text))),
    }
}
