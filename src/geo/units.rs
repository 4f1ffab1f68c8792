//! Linear distance units
//!
//! Conversion only applies to geographic attributes: the backend measures
//! geographic distances in meters. Unknown units pass through unconverted.

/// Meters per unit, or None when the unit is not recognized
pub fn meters_per_unit(units: &str) -> Option<f64> {
    let factor = match units.trim() {
        "" | "m" | "meter" | "meters" => 1.0,
        "kilometers" | "kilometer" | "km" => 1000.0,
        "millimeter" | "millimeters" | "mm" => 0.001,
        "mile" | "miles" | "mi" => 1609.344,
        "nautical mile" | "nautical-mile" | "NM" | "nmi" => 1852.0,
        "foot" | "feet" | "ft" => 0.3048,
        "inch" | "inches" | "in" => 0.0254,
        _ => return None,
    };
    Some(factor)
}

/// Convert a distance for an attribute
///
/// Planar attributes keep the caller's distance as given.
pub fn to_meters(distance: f64, units: &str, geographic: bool) -> f64 {
    if !geographic {
        return distance;
    }
    match meters_per_unit(units) {
        Some(factor) => distance * factor,
        None => distance,
    }
}

/// Render a distance the way the backend's distance clause expects it
pub fn format_distance(meters: f64) -> String {
    format!("{}m", meters)
}
