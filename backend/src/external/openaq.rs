//! OpenAQ client for fetching the latest station measurements
//!
//! Integrates with the OpenAQ "latest" endpoint; each location's
//! measurements are folded into one `SensorReading`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use shared::{GeoPoint, SensorReading};

use crate::config::FeedConfig;
use crate::error::{AppError, AppResult};
use crate::external::feed::SensorFeed;

/// OpenAQ API client
#[derive(Clone)]
pub struct OpenAqClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    max_radius_m: u32,
    limit: u32,
}

/// OpenAQ API response for latest measurements
#[derive(Debug, Deserialize)]
struct OpenAqResponse {
    results: Vec<OpenAqLocation>,
}

#[derive(Debug, Deserialize)]
struct OpenAqLocation {
    location: String,
    coordinates: Option<OpenAqCoordinates>,
    measurements: Vec<OpenAqMeasurement>,
}

#[derive(Debug, Deserialize)]
struct OpenAqCoordinates {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenAqMeasurement {
    parameter: String,
    value: f64,
    last_updated: Option<DateTime<Utc>>,
}

impl OpenAqClient {
    /// Create a new OpenAqClient
    pub fn new(config: &FeedConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("Feed HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            max_radius_m: config.radius_m,
            limit: config.limit,
        })
    }

    /// Convert an OpenAQ location into our reading format
    fn convert_location(location: OpenAqLocation) -> Option<SensorReading> {
        let coordinates = location.coordinates?;
        let mut reading = SensorReading {
            station_id: location.location,
            lat: coordinates.latitude,
            lon: coordinates.longitude,
            pm25: None,
            pm10: None,
            temperature: None,
            timestamp: Utc::now(),
        };

        let mut newest: Option<DateTime<Utc>> = None;
        for m in location.measurements {
            match m.parameter.as_str() {
                "pm25" => reading.pm25 = Some(m.value),
                "pm10" => reading.pm10 = Some(m.value),
                "temperature" => reading.temperature = Some(m.value),
                _ => continue,
            }
            if let Some(ts) = m.last_updated {
                newest = Some(newest.map_or(ts, |n| n.max(ts)));
            }
        }
        if let Some(ts) = newest {
            reading.timestamp = ts;
        }

        (reading.pm25.is_some() || reading.pm10.is_some()).then_some(reading)
    }
}

#[async_trait]
impl SensorFeed for OpenAqClient {
    async fn latest(&self, center: GeoPoint, radius_km: f64) -> AppResult<Vec<SensorReading>> {
        let radius_m = ((radius_km * 1000.0) as u32).min(self.max_radius_m).max(1);
        let coordinates = format!("{},{}", center.lat, center.lon);

        let mut request = self.client.get(&self.base_url).query(&[
            ("coordinates", coordinates),
            ("radius", radius_m.to_string()),
            ("limit", self.limit.to_string()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::FeedUnavailable(format!("OpenAQ request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::FeedUnavailable(format!(
                "OpenAQ error: {} - {}",
                status, body
            )));
        }

        let data: OpenAqResponse = response
            .json()
            .await
            .map_err(|e| AppError::FeedUnavailable(format!("Failed to parse OpenAQ response: {}", e)))?;

        let readings: Vec<SensorReading> = data
            .results
            .into_iter()
            .filter_map(Self::convert_location)
            .collect();

        tracing::debug!(
            stations = readings.len(),
            lat = center.lat,
            lon = center.lon,
            "Fetched latest sensor readings"
        );

        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_location_folds_measurements() {
        let payload = r#"{
            "results": [{
                "location": "Anand Vihar",
                "coordinates": {"latitude": 28.6476, "longitude": 77.3158},
                "measurements": [
                    {"parameter": "pm25", "value": 180.0, "lastUpdated": "2024-11-02T10:00:00Z"},
                    {"parameter": "pm10", "value": 320.0, "lastUpdated": "2024-11-02T11:00:00Z"},
                    {"parameter": "no2", "value": 40.0}
                ]
            }, {
                "location": "No coordinates",
                "coordinates": null,
                "measurements": [{"parameter": "pm25", "value": 20.0}]
            }]
        }"#;
        let data: OpenAqResponse = serde_json::from_str(payload).unwrap();
        let readings: Vec<_> = data
            .results
            .into_iter()
            .filter_map(OpenAqClient::convert_location)
            .collect();

        assert_eq!(readings.len(), 1);
        let r = &readings[0];
        assert_eq!(r.station_id, "Anand Vihar");
        assert_eq!(r.pm25, Some(180.0));
        assert_eq!(r.pm10, Some(320.0));
        assert_eq!(r.timestamp.to_rfc3339(), "2024-11-02T11:00:00+00:00");
    }
}
