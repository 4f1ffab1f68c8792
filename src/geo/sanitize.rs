//! Geography sanitization
//!
//! Geographic literals are wrapped and clamped into the world bounds before
//! any spatial clause is built from them.

use geo::{Area, BoundingRect, MapCoords};
use geo_types::{coord, Coord, Geometry, Rect};

use super::geometry::is_empty;

/// The full world in longitude/latitude degrees
pub fn world() -> Rect<f64> {
    Rect::new(coord! { x: -180.0, y: -90.0 }, coord! { x: 180.0, y: 90.0 })
}

/// Wrap a longitude into [-180, 180]
///
/// Modulo wrap, not a clamp: 190 becomes -170.
pub fn clip_lon(lon: f64) -> f64 {
    let x = lon.signum() * (lon.abs() % 360.0);
    if x > 180.0 {
        x - 360.0
    } else if x < -180.0 {
        x + 360.0
    } else {
        x
    }
}

/// Clamp a latitude into [-90, 90]
pub fn clip_lat(lat: f64) -> f64 {
    lat.clamp(-90.0, 90.0)
}

/// Apply longitude wrap and latitude clamp to every coordinate
pub fn clip_to_world(geometry: &Geometry<f64>) -> Geometry<f64> {
    geometry.map_coords(|c: Coord<f64>| Coord {
        x: clip_lon(c.x),
        y: clip_lat(c.y),
    })
}

/// True when the geometry covers exactly the world envelope
pub fn is_world(geometry: &Geometry<f64>) -> bool {
    let world = world();
    match geometry.bounding_rect() {
        Some(bounds) => {
            bounds == world && (geometry.unsigned_area() - world.unsigned_area()).abs() < 1e-9
        }
        None => false,
    }
}

/// Outcome of sanitizing a geographic literal
#[derive(Debug, Clone, PartialEq)]
pub enum Sanitized {
    /// The literal covers the world; nothing to filter
    World,
    /// The literal has no coordinates
    Empty,
    /// The clipped literal to compile against
    Clipped(Geometry<f64>),
}

/// Clip a geographic literal, then classify it
pub fn sanitize(geometry: &Geometry<f64>) -> Sanitized {
    if is_empty(geometry) {
        return Sanitized::Empty;
    }
    let clipped = clip_to_world(geometry);
    if is_world(&clipped) {
        Sanitized::World
    } else {
        Sanitized::Clipped(clipped)
    }
}
