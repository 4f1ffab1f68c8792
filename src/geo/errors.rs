//! Geometry error types

use thiserror::Error;

/// Result type for geometry operations
pub type GeoResult<T> = Result<T, GeoError>;

/// Geometry literal errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    /// A WKT literal could not be parsed or converted
    #[error("Invalid WKT geometry: {0}")]
    WktParse(String),

    /// A bounding box argument was malformed
    #[error("Invalid bounding box: {0}")]
    InvalidBbox(String),
}

impl GeoError {
    pub fn code(&self) -> &'static str {
        match self {
            GeoError::WktParse(_) => "ESGEO_GEOMETRY_INVALID",
            GeoError::InvalidBbox(_) => "ESGEO_BBOX_INVALID",
        }
    }
}
