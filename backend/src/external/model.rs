//! Forecast inference seam
//!
//! The forecast engine prepares one `ForecastFeatures` row per hour offset and
//! asks an `InferenceModel` for a prediction. Implementations must not let a
//! malformed answer through: raw payloads are checked before they become a
//! `ModelPrediction`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::MAX_AQI;
use thiserror::Error;

use crate::config::ModelConfig;
use crate::error::AppError;

/// Covariates for one forecast hour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastFeatures {
    pub lat: f64,
    pub lon: f64,
    pub timestamp: DateTime<Utc>,
    pub hour_offset: u32,
    /// Hour of day, 0-23
    pub hour: u32,
    /// Days since Monday, 0-6
    pub day_of_week: u32,
    pub traffic_index: f64,
    pub temperature: f64,
    pub last_aqi: Option<f64>,
    pub trailing_mean_aqi: Option<f64>,
}

/// Validated model output
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ModelPrediction {
    pub predicted_aqi: f64,
    pub confidence: Option<f64>,
}

/// Prediction as received over the wire, before validation
#[derive(Debug, Clone, Deserialize)]
pub struct RawPrediction {
    #[serde(alias = "aqi")]
    pub predicted_aqi: Option<f64>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("model unreachable: {0}")]
    Unavailable(String),

    #[error("malformed model output: {0}")]
    InvalidPayload(String),
}

impl From<ModelError> for AppError {
    fn from(error: ModelError) -> Self {
        AppError::ModelUnavailable(error.to_string())
    }
}

impl TryFrom<RawPrediction> for ModelPrediction {
    type Error = ModelError;

    fn try_from(raw: RawPrediction) -> Result<Self, Self::Error> {
        let predicted_aqi = raw
            .predicted_aqi
            .ok_or_else(|| ModelError::InvalidPayload("missing predicted_aqi".into()))?;
        if !predicted_aqi.is_finite() || !(0.0..=MAX_AQI).contains(&predicted_aqi) {
            return Err(ModelError::InvalidPayload(format!(
                "predicted_aqi out of range: {}",
                predicted_aqi
            )));
        }
        if let Some(c) = raw.confidence {
            if !c.is_finite() || !(0.0..=1.0).contains(&c) {
                return Err(ModelError::InvalidPayload(format!(
                    "confidence out of range: {}",
                    c
                )));
            }
        }
        Ok(Self {
            predicted_aqi,
            confidence: raw.confidence,
        })
    }
}

/// Black-box time-series model
#[async_trait]
pub trait InferenceModel: Send + Sync {
    fn name(&self) -> &str;

    async fn predict(&self, features: &ForecastFeatures) -> Result<ModelPrediction, ModelError>;
}

/// Deterministic in-process model driven by recent history and the
/// diurnal covariates
#[derive(Debug, Clone)]
pub struct BaselineModel {
    fallback_aqi: f64,
}

impl BaselineModel {
    pub fn new(fallback_aqi: f64) -> Self {
        Self { fallback_aqi }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(config.fallback_aqi)
    }
}

impl Default for BaselineModel {
    fn default() -> Self {
        Self::new(150.0)
    }
}

#[async_trait]
impl InferenceModel for BaselineModel {
    fn name(&self) -> &str {
        "baseline"
    }

    async fn predict(&self, features: &ForecastFeatures) -> Result<ModelPrediction, ModelError> {
        let has_history = features.last_aqi.is_some() || features.trailing_mean_aqi.is_some();
        let level = match (features.last_aqi, features.trailing_mean_aqi) {
            (Some(last), Some(mean)) => 0.6 * last + 0.4 * mean,
            (Some(v), None) | (None, Some(v)) => v,
            (None, None) => self.fallback_aqi,
        };

        // Cold nights trap pollutants near the ground
        let inversion = (22.0 - features.temperature).max(0.0) * 1.5;
        let predicted = (level * (0.7 + 0.3 * features.traffic_index) + inversion).clamp(0.0, MAX_AQI);

        let mut confidence = (0.95 - 0.01 * features.hour_offset as f64).max(0.4);
        if !has_history {
            confidence = (confidence - 0.2).max(0.2);
        }

        ModelPrediction::try_from(RawPrediction {
            predicted_aqi: Some((predicted * 10.0).round() / 10.0),
            confidence: Some(confidence),
        })
    }
}
