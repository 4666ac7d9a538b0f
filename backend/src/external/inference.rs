//! Remote inference client
//!
//! Posts one feature row per request to an HTTP model server and validates
//! the answer before handing it to the forecast engine.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::ModelConfig;
use crate::error::{AppError, AppResult};
use crate::external::model::{
    ForecastFeatures, InferenceModel, ModelError, ModelPrediction, RawPrediction,
};

/// Client for an external forecast model server
#[derive(Clone)]
pub struct RemoteModelClient {
    endpoint: String,
    http_client: Client,
}

impl RemoteModelClient {
    /// Create a new remote model client
    pub fn new(endpoint: String, timeout: Duration) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Model HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            http_client,
        })
    }

    /// Create a client from the `model` configuration section
    pub fn from_config(config: &ModelConfig) -> AppResult<Self> {
        let endpoint = config.endpoint.clone().ok_or_else(|| {
            AppError::Configuration("model.endpoint is required for the remote model".into())
        })?;
        Self::new(endpoint, Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl InferenceModel for RemoteModelClient {
    fn name(&self) -> &str {
        "remote"
    }

    async fn predict(&self, features: &ForecastFeatures) -> Result<ModelPrediction, ModelError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(features)
            .send()
            .await
            .map_err(|e| ModelError::Unavailable(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ModelError::Unavailable(format!(
                "Model returned {}: {}",
                status, body
            )));
        }

        let raw: RawPrediction = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidPayload(format!("Failed to parse response: {}", e)))?;

        ModelPrediction::try_from(raw)
    }
}
