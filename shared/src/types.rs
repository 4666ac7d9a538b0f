//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Kilometres per degree of latitude (and of longitude at the equator).
pub const KM_PER_DEGREE: f64 = 111.0;

/// A WGS84 point in decimal degrees
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Euclidean distance measured directly on degrees.
    ///
    /// This is the relevance metric used for live updates: 0.5 degrees is
    /// treated as roughly 50 km regardless of latitude.
    pub fn planar_distance_deg(&self, other: &GeoPoint) -> f64 {
        let dlat = self.lat - other.lat;
        let dlon = self.lon - other.lon;
        (dlat * dlat + dlon * dlon).sqrt()
    }

    /// Equirectangular approximation of the ground distance in kilometres.
    ///
    /// Longitude is scaled by the cosine of the mean latitude. Accurate to
    /// well under 1% at city scale, which is all the interpolator needs.
    pub fn approx_distance_km(&self, other: &GeoPoint) -> f64 {
        let mean_lat = ((self.lat + other.lat) / 2.0).to_radians();
        let dy = (self.lat - other.lat) * KM_PER_DEGREE;
        let dx = (self.lon - other.lon) * KM_PER_DEGREE * mean_lat.cos();
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned bounding region in decimal degrees
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// Box spanning `radius_km` around `center`.
    pub fn around(center: GeoPoint, radius_km: f64) -> Self {
        let lat_offset = radius_km / KM_PER_DEGREE;
        let cos_lat = center.lat.to_radians().cos().abs().max(1e-6);
        let lon_offset = radius_km / (KM_PER_DEGREE * cos_lat);
        Self {
            min_lat: center.lat - lat_offset,
            min_lon: center.lon - lon_offset,
            max_lat: center.lat + lat_offset,
            max_lon: center.lon + lon_offset,
        }
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lon >= self.min_lon
            && point.lon <= self.max_lon
    }
}

/// Number of future hourly points a forecast covers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(try_from = "u32", into = "u32")]
pub enum ForecastHorizon {
    Day,
    #[default]
    TwoDays,
}

impl ForecastHorizon {
    pub fn hours(&self) -> u32 {
        match self {
            ForecastHorizon::Day => 24,
            ForecastHorizon::TwoDays => 48,
        }
    }
}

impl TryFrom<u32> for ForecastHorizon {
    type Error = &'static str;

    fn try_from(hours: u32) -> Result<Self, Self::Error> {
        match hours {
            24 => Ok(ForecastHorizon::Day),
            48 => Ok(ForecastHorizon::TwoDays),
            _ => Err("Forecast horizon must be 24 or 48 hours"),
        }
    }
}

impl From<ForecastHorizon> for u32 {
    fn from(horizon: ForecastHorizon) -> Self {
        horizon.hours()
    }
}
