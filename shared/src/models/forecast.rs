//! Forecast and alert models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::aqi::AqiCategory;
use crate::types::GeoPoint;

/// One hourly prediction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub hour_offset: u32,
    pub predicted_aqi: f64,
    /// Model confidence in [0, 1]
    pub confidence: f64,
    pub category: AqiCategory,
}

/// Alert tiers, ordered from lowest to highest severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Moderate,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AlertSeverity {
    /// Tier crossed by a predicted AQI, if any
    pub fn for_aqi(aqi: f64) -> Option<Self> {
        if aqi > 300.0 {
            Some(AlertSeverity::Hazardous)
        } else if aqi > 200.0 {
            Some(AlertSeverity::VeryUnhealthy)
        } else if aqi > 150.0 {
            Some(AlertSeverity::Unhealthy)
        } else if aqi > 100.0 {
            Some(AlertSeverity::Moderate)
        } else {
            None
        }
    }

    /// Lower boundary that has to be exceeded for this tier
    pub fn boundary(&self) -> f64 {
        match self {
            AlertSeverity::Moderate => 100.0,
            AlertSeverity::Unhealthy => 150.0,
            AlertSeverity::VeryUnhealthy => 200.0,
            AlertSeverity::Hazardous => 300.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AlertSeverity::Moderate => "moderate",
            AlertSeverity::Unhealthy => "unhealthy",
            AlertSeverity::VeryUnhealthy => "very unhealthy",
            AlertSeverity::Hazardous => "hazardous",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AlertSeverity::Moderate => {
                "Moderate pollution expected. Sensitive groups should limit outdoor time."
            }
            AlertSeverity::Unhealthy => {
                "Unhealthy air expected. Everyone may begin to experience health effects."
            }
            AlertSeverity::VeryUnhealthy => {
                "Very unhealthy air expected. Health alert for the entire population."
            }
            AlertSeverity::Hazardous => {
                "Hazardous air expected. Emergency conditions for everyone."
            }
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            AlertSeverity::Moderate => "Reduce prolonged outdoor exertion and close windows during peak traffic",
            AlertSeverity::Unhealthy => "Avoid outdoor activities during this time and wear an N95 mask outside",
            AlertSeverity::VeryUnhealthy => "Stay indoors, run air purifiers and avoid all physical exertion",
            AlertSeverity::Hazardous => "Do not go outside; seal doors and windows and keep air purifiers running",
        }
    }
}

/// Why an alert was raised
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Prediction rose into a higher severity tier
    Threshold,
    /// Consecutive predictions changed sharply
    RapidChange,
}

/// Alert derived from a forecast point
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub recommendation: String,
    pub point: ForecastPoint,
}

/// Current-hour prediction for a location with guidance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationAlert {
    pub location: GeoPoint,
    pub predicted_aqi: f64,
    pub category: AqiCategory,
    /// `None` while the prediction stays at or below 100
    pub severity: Option<AlertSeverity>,
    pub alert: String,
    pub recommendations: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Summary statistics over the forecast horizon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastStatistics {
    pub avg_aqi: f64,
    pub max_aqi: f64,
    pub min_aqi: f64,
    pub worst_hour: DateTime<Utc>,
    pub best_hour: DateTime<Utc>,
}

/// Per-date aggregate of a forecast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub min_aqi: f64,
    pub max_aqi: f64,
    pub avg_aqi: f64,
    pub category: AqiCategory,
}

/// Full forecast response for a location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Forecast {
    pub location: GeoPoint,
    pub horizon_hours: u32,
    pub generated_at: DateTime<Utc>,
    pub forecasts: Vec<ForecastPoint>,
    pub statistics: ForecastStatistics,
    pub daily_summary: Vec<DailySummary>,
    pub alerts: Vec<Alert>,
    /// Served from cache because the model was unavailable
    #[serde(default)]
    pub stale: bool,
}

/// Forecast digest for one named location of a region
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionalForecastEntry {
    pub name: String,
    pub location: GeoPoint,
    pub current_aqi: f64,
    pub next_24h_avg: f64,
    pub peak_aqi: f64,
    pub peak_time: DateTime<Utc>,
    pub stale: bool,
}

/// Regional forecast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionalForecast {
    pub region: String,
    pub generated_at: DateTime<Utc>,
    pub locations: Vec<RegionalForecastEntry>,
}
