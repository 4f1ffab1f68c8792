//! Geohash grid precision
//!
//! Picks the geohash level whose cell count over an envelope best fits a
//! cell budget, and writes it into every geohash grid aggregation.

use geo_types::Rect;
use serde_json::{Map, Value};

/// Deepest geohash level the backend supports
pub const MAX_PRECISION: u32 = 12;

/// Cell width in degrees at a geohash level
pub fn cell_width(level: u32) -> f64 {
    let bits = (5 * level).div_ceil(2);
    360.0 / 2f64.powi(bits as i32)
}

/// Cell height in degrees at a geohash level
pub fn cell_height(level: u32) -> f64 {
    let bits = (5 * level) / 2;
    180.0 / 2f64.powi(bits as i32)
}

/// Number of cells covering the world-clamped envelope at a level
pub fn cell_count(envelope: &Rect<f64>, level: u32) -> f64 {
    let min_x = envelope.min().x.max(-180.0);
    let max_x = envelope.max().x.min(180.0);
    let min_y = envelope.min().y.max(-90.0);
    let max_y = envelope.max().y.min(90.0);
    let width = (max_x - min_x).max(0.0);
    let height = (max_y - min_y).max(0.0);
    (width / cell_width(level)) * (height / cell_height(level))
}

/// Resolve the geohash level for an envelope and a cell budget
///
/// Scans upward from level 1. At the first level whose cell count exceeds
/// `max_bins`, returns the level below when it is closer to the budget.
pub fn compute_precision(envelope: &Rect<f64>, max_bins: u64) -> u32 {
    let budget = max_bins as f64;
    for level in 1..=MAX_PRECISION {
        let cells = cell_count(envelope, level);
        if cells > budget {
            let previous = cell_count(envelope, level - 1);
            return if cells - budget > budget - previous {
                level - 1
            } else {
                level
            };
        }
    }
    MAX_PRECISION
}

/// Overwrite the precision of every geohash grid aggregation
///
/// Entries without a `geohash_grid` member are left untouched.
pub fn update_grid_aggregation_precision(aggregations: &mut Map<String, Value>, level: u32) {
    for entry in aggregations.values_mut() {
        if let Some(Value::Object(grid)) = entry.get_mut("geohash_grid") {
            grid.insert("precision".to_string(), Value::from(level));
        }
    }
}
