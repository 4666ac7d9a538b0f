//! AQI breakpoint math, categories and the cigarette equivalence
//!
//! Concentrations are converted with the US-EPA breakpoint tables in their
//! continuous form: each table is a polyline of `(concentration, aqi)` knots
//! and values are linearly interpolated between neighbouring knots. That
//! keeps the mapping strictly increasing, so it can be inverted exactly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sustained PM2.5 (µg/m³) that equals one cigarette per day.
pub const PM25_PER_CIGARETTE: f64 = 22.0;

const PM25_KNOTS: &[(f64, f64)] = &[
    (0.0, 0.0),
    (12.0, 50.0),
    (35.4, 100.0),
    (55.4, 150.0),
    (150.4, 200.0),
    (250.4, 300.0),
    (350.4, 400.0),
    (500.4, 500.0),
];

const PM10_KNOTS: &[(f64, f64)] = &[
    (0.0, 0.0),
    (54.0, 50.0),
    (154.0, 100.0),
    (254.0, 150.0),
    (354.0, 200.0),
    (424.0, 300.0),
    (504.0, 400.0),
    (604.0, 500.0),
];

/// Errors from AQI conversions
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AqiError {
    #[error("AQI must be a non-negative number")]
    NegativeAqi,

    #[error("Concentration must be a non-negative number")]
    NegativeConcentration,
}

/// Interpolate along a knot table, extrapolating past the last knot with
/// the final segment's slope.
fn interpolate(knots: &[(f64, f64)], x: f64, forward: bool) -> f64 {
    let pick = |k: &(f64, f64)| if forward { *k } else { (k.1, k.0) };

    for pair in knots.windows(2) {
        let (x0, y0) = pick(&pair[0]);
        let (x1, y1) = pick(&pair[1]);
        if x <= x1 {
            return y0 + (x - x0) * (y1 - y0) / (x1 - x0);
        }
    }

    let n = knots.len();
    let (x0, y0) = pick(&knots[n - 2]);
    let (x1, y1) = pick(&knots[n - 1]);
    y1 + (x - x1) * (y1 - y0) / (x1 - x0)
}

fn check_concentration(value: f64) -> Result<f64, AqiError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(AqiError::NegativeConcentration)
    }
}

fn check_aqi(value: f64) -> Result<f64, AqiError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(AqiError::NegativeAqi)
    }
}

/// PM2.5 sub-index for a concentration in µg/m³
pub fn pm25_to_aqi(pm25: f64) -> Result<f64, AqiError> {
    Ok(interpolate(PM25_KNOTS, check_concentration(pm25)?, true))
}

/// PM10 sub-index for a concentration in µg/m³
pub fn pm10_to_aqi(pm10: f64) -> Result<f64, AqiError> {
    Ok(interpolate(PM10_KNOTS, check_concentration(pm10)?, true))
}

/// Estimated PM2.5 concentration that produces the given AQI
pub fn aqi_to_pm25(aqi: f64) -> Result<f64, AqiError> {
    Ok(interpolate(PM25_KNOTS, check_aqi(aqi)?, false))
}

/// AQI category
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AqiCategory {
    #[serde(rename = "Good")]
    Good,
    #[serde(rename = "Moderate")]
    Moderate,
    #[serde(rename = "Unhealthy for Sensitive Groups")]
    UnhealthyForSensitive,
    #[serde(rename = "Unhealthy")]
    Unhealthy,
    #[serde(rename = "Very Unhealthy")]
    VeryUnhealthy,
    #[serde(rename = "Hazardous")]
    Hazardous,
}

impl AqiCategory {
    pub const ALL: [AqiCategory; 6] = [
        AqiCategory::Good,
        AqiCategory::Moderate,
        AqiCategory::UnhealthyForSensitive,
        AqiCategory::Unhealthy,
        AqiCategory::VeryUnhealthy,
        AqiCategory::Hazardous,
    ];

    pub fn from_aqi(aqi: f64) -> Self {
        if aqi <= 50.0 {
            AqiCategory::Good
        } else if aqi <= 100.0 {
            AqiCategory::Moderate
        } else if aqi <= 150.0 {
            AqiCategory::UnhealthyForSensitive
        } else if aqi <= 200.0 {
            AqiCategory::Unhealthy
        } else if aqi <= 300.0 {
            AqiCategory::VeryUnhealthy
        } else {
            AqiCategory::Hazardous
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitive => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }

    /// Display colour for map legends
    pub fn color(&self) -> &'static str {
        match self {
            AqiCategory::Good => "#10b981",
            AqiCategory::Moderate => "#f59e0b",
            AqiCategory::UnhealthyForSensitive => "#f97316",
            AqiCategory::Unhealthy => "#ef4444",
            AqiCategory::VeryUnhealthy => "#dc2626",
            AqiCategory::Hazardous => "#7c3aed",
        }
    }
}

impl std::fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Cigarette-equivalence of breathing air at a given AQI for 24 hours
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CigaretteEquivalence {
    pub aqi: f64,
    pub pm25_est: f64,
    pub cigarettes_equivalent: f64,
    pub message: String,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Cigarettes per day equivalent to a sustained PM2.5 concentration
pub fn cigarettes_for_pm25(pm25: f64) -> Result<f64, AqiError> {
    Ok(check_concentration(pm25)? / PM25_PER_CIGARETTE)
}

/// Map an AQI value to its cigarettes-per-day equivalent
pub fn cigarette_equivalence(aqi: f64) -> Result<CigaretteEquivalence, AqiError> {
    let pm25 = aqi_to_pm25(aqi)?;
    let cigarettes = cigarettes_for_pm25(pm25)?;

    Ok(CigaretteEquivalence {
        aqi,
        pm25_est: round_to(pm25, 1),
        cigarettes_equivalent: round_to(cigarettes, 2),
        message: format!(
            "Breathing this air for 24 hours is equivalent to smoking {:.1} cigarettes.",
            cigarettes
        ),
    })
}
