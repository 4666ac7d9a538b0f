//! Sensor and historical readings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aqi::{pm10_to_aqi, pm25_to_aqi};
use crate::types::GeoPoint;

/// A single station measurement from the sensor feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorReading {
    pub station_id: String,
    pub lat: f64,
    pub lon: f64,
    /// PM2.5 in µg/m³
    pub pm25: Option<f64>,
    /// PM10 in µg/m³
    pub pm10: Option<f64>,
    /// Air temperature in °C, when the station reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl SensorReading {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }

    /// AQI of the reading: the highest of the available sub-indices.
    ///
    /// `None` when the station reports no usable concentration.
    pub fn aqi(&self) -> Option<f64> {
        let pm25 = self.pm25.and_then(|v| pm25_to_aqi(v).ok());
        let pm10 = self.pm10.and_then(|v| pm10_to_aqi(v).ok());
        match (pm25, pm10) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// One point of a location's AQI history
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HistoricalPoint {
    pub timestamp: DateTime<Utc>,
    pub aqi: f64,
}

/// A station reading as kept by the historical store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoricalReading {
    pub station_id: String,
    pub lat: f64,
    pub lon: f64,
    pub aqi: f64,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub timestamp: DateTime<Utc>,
}
