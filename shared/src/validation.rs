//! Validation utilities for the Hyperlocal Air Quality platform
//!
//! Everything here runs before any computation; failures are surfaced to
//! callers as invalid-input errors.

use crate::types::{BoundingBox, GeoPoint};

/// Upper bound accepted for any AQI input. The scale tops out at 500 but
/// extreme events are reported above it.
pub const MAX_AQI: f64 = 2000.0;

/// Validate latitude and longitude ranges
pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), &'static str> {
    if !lat.is_finite() || !lon.is_finite() {
        return Err("Coordinates must be finite numbers");
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err("Latitude must be between -90 and 90");
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err("Longitude must be between -180 and 180");
    }
    Ok(())
}

/// Validate a point
pub fn validate_point(point: &GeoPoint) -> Result<(), &'static str> {
    validate_coordinates(point.lat, point.lon)
}

/// Validate a bounding box: valid corners, non-empty extent
pub fn validate_bbox(bbox: &BoundingBox) -> Result<(), &'static str> {
    validate_coordinates(bbox.min_lat, bbox.min_lon)?;
    validate_coordinates(bbox.max_lat, bbox.max_lon)?;
    if bbox.min_lat >= bbox.max_lat || bbox.min_lon >= bbox.max_lon {
        return Err("Bounding box minimum must be below its maximum");
    }
    Ok(())
}

/// Validate an AQI value
pub fn validate_aqi(aqi: f64) -> Result<(), &'static str> {
    if !aqi.is_finite() {
        return Err("AQI must be a finite number");
    }
    if aqi < 0.0 {
        return Err("AQI cannot be negative");
    }
    if aqi > MAX_AQI {
        return Err("AQI exceeds the maximum accepted value");
    }
    Ok(())
}

/// Validate symptom severity on the 1-10 scale
pub fn validate_severity(severity: i32) -> Result<(), &'static str> {
    if !(1..=10).contains(&severity) {
        return Err("Severity must be between 1 and 10");
    }
    Ok(())
}

/// Validate a search radius in kilometres
pub fn validate_radius_km(radius_km: f64) -> Result<(), &'static str> {
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err("Radius must be a positive number");
    }
    if radius_km > 500.0 {
        return Err("Radius must be at most 500 km");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_coordinates_valid() {
        assert!(validate_coordinates(28.6139, 77.2090).is_ok());
        assert!(validate_coordinates(-90.0, 180.0).is_ok());
        assert!(validate_coordinates(0.0, 0.0).is_ok());
    }

    #[test]
    fn test_validate_coordinates_invalid() {
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, -180.5).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
        assert!(validate_coordinates(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_bbox() {
        assert!(validate_bbox(&BoundingBox::new(28.4, 76.9, 28.8, 77.4)).is_ok());
        assert!(validate_bbox(&BoundingBox::new(28.8, 76.9, 28.4, 77.4)).is_err());
        assert!(validate_bbox(&BoundingBox::new(28.4, 77.0, 28.8, 77.0)).is_err());
    }

    #[test]
    fn test_validate_aqi() {
        assert!(validate_aqi(0.0).is_ok());
        assert!(validate_aqi(450.0).is_ok());
        assert!(validate_aqi(-1.0).is_err());
        assert!(validate_aqi(f64::NAN).is_err());
        assert!(validate_aqi(5000.0).is_err());
    }

    #[test]
    fn test_validate_severity() {
        assert!(validate_severity(1).is_ok());
        assert!(validate_severity(10).is_ok());
        assert!(validate_severity(0).is_err());
        assert!(validate_severity(11).is_err());
    }

    #[test]
    fn test_validate_radius() {
        assert!(validate_radius_km(25.0).is_ok());
        assert!(validate_radius_km(0.0).is_err());
        assert!(validate_radius_km(-3.0).is_err());
        assert!(validate_radius_km(501.0).is_err());
    }
}
