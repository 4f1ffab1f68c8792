//! Geometry support
//!
//! - WKT literals and GeoJSON encoding
//! - Geography sanitization (longitude wrap, latitude clamp)
//! - Spatial predicate compilation
//! - Geohash grid precision

pub mod compiler;
mod errors;
pub mod geometry;
pub mod precision;
pub mod sanitize;
pub mod units;

pub use compiler::{compile_distance, compile_spatial};
pub use errors::{GeoError, GeoResult};
pub use geometry::GeometryLiteral;
pub use precision::{compute_precision, update_grid_aggregation_precision};
