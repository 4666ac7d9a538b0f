//! AQI forecasting
//!
//! `ForecastEngine` turns history plus diurnal covariates into an hourly
//! forecast through the configured `InferenceModel`, then derives alerts,
//! statistics and per-day summaries. `ForecastService` adds the history
//! lookup, a per-location cache used when the model is down, live-update
//! publication and the regional digest.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, DurationRound, Timelike, Utc};
use parking_lot::RwLock;
use shared::{
    validate_point, Alert, AlertKind, AlertSeverity, AqiCategory, DailySummary, Forecast,
    ForecastHorizon, ForecastPoint, ForecastStatistics, GeoPoint, HistoricalPoint, LocationAlert,
    RegionalForecast, RegionalForecastEntry, UpdateKind,
};

use crate::config::ForecastConfig;
use crate::error::{AppError, AppResult};
use crate::external::{ForecastFeatures, InferenceModel};
use crate::services::broadcast::BroadcastHub;
use crate::services::health;
use crate::store::HistoryStore;

/// Named locations covered by the regional forecast
pub const KEY_LOCATIONS: [(&str, f64, f64); 5] = [
    ("Connaught Place", 28.6289, 77.2065),
    ("Dwarka", 28.5921, 77.0460),
    ("Noida", 28.5355, 77.3910),
    ("Gurgaon", 28.4595, 77.0266),
    ("Rohini", 28.7496, 77.0669),
];

pub const REGION_NAME: &str = "Delhi-NCR";

/// History window feeding the trailing mean
const HISTORY_HOURS: i64 = 24;

/// Relative road traffic for an hour of the day
pub fn estimate_traffic(hour: u32, weekend: bool) -> f64 {
    let base = if weekend { 0.6 } else { 1.0 };
    let factor = match hour {
        7..=9 => 1.5,
        17..=20 => 1.6,
        h if h >= 22 || h < 6 => 0.3,
        _ => 0.8,
    };
    base * factor
}

/// Diurnal temperature estimate in Celsius, coolest around 00:00
pub fn estimate_temperature(hour: u32) -> f64 {
    20.0 + 10.0 * ((hour as f64 - 6.0) * std::f64::consts::PI / 12.0).sin()
}

pub struct ForecastEngine {
    model: Arc<dyn InferenceModel>,
    config: ForecastConfig,
}

impl ForecastEngine {
    pub fn new(model: Arc<dyn InferenceModel>, config: ForecastConfig) -> Self {
        Self { model, config }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Hourly forecast starting at the current hour. The model is invoked
    /// once per offset; any failure aborts the whole forecast.
    pub async fn forecast(
        &self,
        location: GeoPoint,
        horizon: ForecastHorizon,
        history: &[HistoricalPoint],
        now: DateTime<Utc>,
    ) -> AppResult<Forecast> {
        validate_point(&location).map_err(|msg| AppError::invalid("location", msg))?;

        let base = now
            .duration_trunc(Duration::hours(1))
            .map_err(|e| AppError::Internal(format!("Invalid forecast base time: {}", e)))?;

        let (last_aqi, trailing_mean_aqi) = history_levels(history, now);
        let mut forecasts = Vec::with_capacity(horizon.hours() as usize);
        for offset in 0..horizon.hours() {
            let timestamp = base + Duration::hours(i64::from(offset));
            forecasts.push(
                self.predict_point(location, timestamp, offset, last_aqi, trailing_mean_aqi)
                    .await?,
            );
        }

        let statistics = compute_statistics(&forecasts)
            .ok_or_else(|| AppError::Internal("Forecast produced no points".into()))?;
        let alerts = derive_alerts(
            &forecasts,
            self.config.rapid_change_threshold,
            self.config.max_alerts,
        );

        Ok(Forecast {
            location,
            horizon_hours: horizon.hours(),
            generated_at: now,
            daily_summary: daily_summary(&forecasts),
            forecasts,
            statistics,
            alerts,
            stale: false,
        })
    }

    /// Prediction for the current hour only
    pub async fn current(
        &self,
        location: GeoPoint,
        history: &[HistoricalPoint],
        now: DateTime<Utc>,
    ) -> AppResult<ForecastPoint> {
        validate_point(&location).map_err(|msg| AppError::invalid("location", msg))?;
        let base = now
            .duration_trunc(Duration::hours(1))
            .map_err(|e| AppError::Internal(format!("Invalid forecast base time: {}", e)))?;
        let (last_aqi, trailing_mean_aqi) = history_levels(history, now);
        self.predict_point(location, base, 0, last_aqi, trailing_mean_aqi)
            .await
    }

    async fn predict_point(
        &self,
        location: GeoPoint,
        timestamp: DateTime<Utc>,
        offset: u32,
        last_aqi: Option<f64>,
        trailing_mean_aqi: Option<f64>,
    ) -> AppResult<ForecastPoint> {
        let hour = timestamp.hour();
        let weekday = timestamp.weekday();
        let features = ForecastFeatures {
            lat: location.lat,
            lon: location.lon,
            timestamp,
            hour_offset: offset,
            hour,
            day_of_week: weekday.num_days_from_monday(),
            traffic_index: estimate_traffic(hour, weekday.num_days_from_monday() >= 5),
            temperature: estimate_temperature(hour),
            last_aqi,
            trailing_mean_aqi,
        };

        let prediction = self.model.predict(&features).await?;
        let confidence = prediction
            .confidence
            .unwrap_or_else(|| (0.95 - 0.01 * f64::from(offset)).max(0.3));

        Ok(ForecastPoint {
            timestamp,
            hour_offset: offset,
            predicted_aqi: prediction.predicted_aqi,
            confidence,
            category: AqiCategory::from_aqi(prediction.predicted_aqi),
        })
    }
}

/// Latest AQI and the mean over the trailing history window
fn history_levels(history: &[HistoricalPoint], now: DateTime<Utc>) -> (Option<f64>, Option<f64>) {
    let last_aqi = history.last().map(|p| p.aqi);
    let window_start = now - Duration::hours(HISTORY_HOURS);
    let recent: Vec<f64> = history
        .iter()
        .filter(|p| p.timestamp >= window_start)
        .map(|p| p.aqi)
        .collect();
    let trailing_mean_aqi =
        (!recent.is_empty()).then(|| recent.iter().sum::<f64>() / recent.len() as f64);
    (last_aqi, trailing_mean_aqi)
}

/// Alert and guidance for a current-hour prediction
pub fn location_alert(location: GeoPoint, point: &ForecastPoint) -> AppResult<LocationAlert> {
    let severity = AlertSeverity::for_aqi(point.predicted_aqi);
    let alert = match severity {
        Some(severity) => severity.message(),
        None => "Air quality is good. Enjoy outdoor activities!",
    };
    let advice = health::recommendations(point.predicted_aqi, false)?;

    Ok(LocationAlert {
        location,
        predicted_aqi: point.predicted_aqi,
        category: point.category,
        severity,
        alert: alert.to_string(),
        recommendations: advice
            .detailed_recommendations
            .into_iter()
            .map(str::to_string)
            .collect(),
        timestamp: point.timestamp,
    })
}

/// Alerts in time order, capped at `max_alerts`.
///
/// A threshold alert fires when a point's tier is higher than the previous
/// point's, so a run of points inside one tier raises a single alert. A
/// rapid-change alert fires when consecutive predictions differ by more
/// than `rapid_change_threshold`.
pub fn derive_alerts(
    points: &[ForecastPoint],
    rapid_change_threshold: f64,
    max_alerts: usize,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let mut previous_tier: Option<AlertSeverity> = None;
    let mut previous_aqi: Option<f64> = None;

    for point in points {
        let tier = AlertSeverity::for_aqi(point.predicted_aqi);
        if let Some(severity) = tier {
            if Some(severity) > previous_tier {
                alerts.push(Alert {
                    kind: AlertKind::Threshold,
                    severity,
                    message: severity.message().to_string(),
                    recommendation: severity.recommendation().to_string(),
                    point: point.clone(),
                });
            }
        }

        if let Some(prev) = previous_aqi {
            let change = point.predicted_aqi - prev;
            if change.abs() > rapid_change_threshold {
                let severity = tier.unwrap_or(AlertSeverity::Moderate);
                let direction = if change > 0.0 { "rise" } else { "drop" };
                alerts.push(Alert {
                    kind: AlertKind::RapidChange,
                    severity,
                    message: format!(
                        "Rapid AQI {} expected: {:+.1} within one hour",
                        direction, change
                    ),
                    recommendation: "Monitor conditions closely and plan outdoor time accordingly"
                        .to_string(),
                    point: point.clone(),
                });
            }
        }

        previous_tier = tier;
        previous_aqi = Some(point.predicted_aqi);
    }

    alerts.truncate(max_alerts);
    alerts
}

/// Statistics over all points; `None` for an empty forecast
pub fn compute_statistics(points: &[ForecastPoint]) -> Option<ForecastStatistics> {
    let first = points.first()?;
    let mut worst = first;
    let mut best = first;
    let mut sum = 0.0;

    for point in points {
        sum += point.predicted_aqi;
        if point.predicted_aqi > worst.predicted_aqi {
            worst = point;
        }
        if point.predicted_aqi < best.predicted_aqi {
            best = point;
        }
    }

    Some(ForecastStatistics {
        avg_aqi: sum / points.len() as f64,
        max_aqi: worst.predicted_aqi,
        min_aqi: best.predicted_aqi,
        worst_hour: worst.timestamp,
        best_hour: best.timestamp,
    })
}

/// Per-date min/max/mean in date order
pub fn daily_summary(points: &[ForecastPoint]) -> Vec<DailySummary> {
    let mut days: BTreeMap<_, Vec<f64>> = BTreeMap::new();
    for point in points {
        days.entry(point.timestamp.date_naive())
            .or_default()
            .push(point.predicted_aqi);
    }

    days.into_iter()
        .map(|(date, values)| {
            let min_aqi = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max_aqi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let avg_aqi = values.iter().sum::<f64>() / values.len() as f64;
            DailySummary {
                date,
                min_aqi,
                max_aqi,
                avg_aqi,
                category: AqiCategory::from_aqi(avg_aqi),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    lat: i64,
    lon: i64,
    hours: u32,
}

impl CacheKey {
    /// Locations within about 0.01 degrees share an entry
    fn new(location: &GeoPoint, horizon: ForecastHorizon) -> Self {
        Self {
            lat: (location.lat * 100.0).round() as i64,
            lon: (location.lon * 100.0).round() as i64,
            hours: horizon.hours(),
        }
    }
}

pub struct ForecastService {
    engine: ForecastEngine,
    store: Arc<dyn HistoryStore>,
    hub: Arc<BroadcastHub>,
    cache: RwLock<HashMap<CacheKey, Forecast>>,
    cache_ttl: Duration,
    cache_capacity: usize,
}

impl ForecastService {
    pub fn new(
        engine: ForecastEngine,
        store: Arc<dyn HistoryStore>,
        hub: Arc<BroadcastHub>,
        cache_ttl_secs: i64,
        cache_capacity: usize,
    ) -> Self {
        Self {
            engine,
            store,
            hub,
            cache: RwLock::new(HashMap::new()),
            cache_ttl: Duration::seconds(cache_ttl_secs.max(0)),
            cache_capacity: cache_capacity.max(1),
        }
    }

    pub fn engine(&self) -> &ForecastEngine {
        &self.engine
    }

    /// Number of locations with a cached forecast
    pub fn cached_forecasts(&self) -> usize {
        self.cache.read().len()
    }

    /// Forecast for a location. A fresh cached forecast is reused; when the
    /// model is unavailable the last good forecast is returned marked stale.
    pub async fn get_forecast(
        &self,
        location: GeoPoint,
        horizon: ForecastHorizon,
    ) -> AppResult<Forecast> {
        validate_point(&location).map_err(|msg| AppError::invalid("location", msg))?;
        let key = CacheKey::new(&location, horizon);
        let now = Utc::now();

        let fresh = self
            .cache
            .read()
            .get(&key)
            .filter(|cached| !cached.stale && now - cached.generated_at < self.cache_ttl)
            .cloned();
        if let Some(cached) = fresh {
            tracing::debug!(lat = location.lat, lon = location.lon, "Forecast cache hit");
            return Ok(cached);
        }

        let history = self
            .store
            .series(location, now - Duration::hours(HISTORY_HOURS))
            .await?;

        match self.engine.forecast(location, horizon, &history, now).await {
            Ok(forecast) => {
                self.remember(key, forecast.clone());
                self.publish(&forecast);
                Ok(forecast)
            }
            Err(AppError::ModelUnavailable(reason)) => {
                let cached = self.cache.read().get(&key).cloned();
                match cached {
                    Some(mut stale) => {
                        tracing::warn!(
                            reason = %reason,
                            generated_at = %stale.generated_at,
                            "Model unavailable, serving cached forecast"
                        );
                        stale.stale = true;
                        Ok(stale)
                    }
                    None => Err(AppError::ModelUnavailable(reason)),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Current-hour prediction for a location with its alert and guidance
    pub async fn location_alert(&self, location: GeoPoint) -> AppResult<LocationAlert> {
        validate_point(&location).map_err(|msg| AppError::invalid("location", msg))?;
        let now = Utc::now();
        let history = self
            .store
            .series(location, now - Duration::hours(HISTORY_HOURS))
            .await?;
        let point = self.engine.current(location, &history, now).await?;
        location_alert(location, &point)
    }

    /// Digest of the 48-hour forecast for every key location. Locations that
    /// fail are skipped; the first error is returned only if all fail.
    pub async fn regional_forecast(&self) -> AppResult<RegionalForecast> {
        let mut locations = Vec::with_capacity(KEY_LOCATIONS.len());
        let mut first_error = None;

        for (name, lat, lon) in KEY_LOCATIONS {
            match self
                .get_forecast(GeoPoint::new(lat, lon), ForecastHorizon::TwoDays)
                .await
            {
                Ok(forecast) => {
                    if let Some(entry) = regional_entry(name, &forecast) {
                        locations.push(entry);
                    }
                }
                Err(e) => {
                    tracing::warn!(location = name, error = %e, "Regional forecast failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        if locations.is_empty() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        Ok(RegionalForecast {
            region: REGION_NAME.to_string(),
            generated_at: Utc::now(),
            locations,
        })
    }

    /// Cache the latest forecast for `key`. Past capacity the entry with the
    /// oldest forecast is evicted, so every key keeps at most its newest one.
    fn remember(&self, key: CacheKey, forecast: Forecast) {
        let mut cache = self.cache.write();
        if cache.len() >= self.cache_capacity && !cache.contains_key(&key) {
            let oldest = cache
                .iter()
                .min_by_key(|(_, cached)| cached.generated_at)
                .map(|(k, _)| *k);
            if let Some(oldest) = oldest {
                cache.remove(&oldest);
            }
        }
        cache.insert(key, forecast);
    }

    fn publish(&self, forecast: &Forecast) {
        let data = match serde_json::to_value(forecast) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode forecast update");
                return;
            }
        };
        if let Err(e) = self
            .hub
            .publish(UpdateKind::ForecastUpdate, forecast.location, data)
        {
            tracing::warn!(error = %e, "Failed to publish forecast update");
        }

        if !forecast.alerts.is_empty() {
            let data = serde_json::json!({ "alerts": forecast.alerts });
            if let Err(e) = self.hub.publish(UpdateKind::Alert, forecast.location, data) {
                tracing::warn!(error = %e, "Failed to publish forecast alerts");
            }
        }
    }
}

fn regional_entry(name: &str, forecast: &Forecast) -> Option<RegionalForecastEntry> {
    let current = forecast.forecasts.first()?;
    let next_day: Vec<f64> = forecast
        .forecasts
        .iter()
        .take(24)
        .map(|p| p.predicted_aqi)
        .collect();

    Some(RegionalForecastEntry {
        name: name.to_string(),
        location: forecast.location,
        current_aqi: current.predicted_aqi,
        next_24h_avg: next_day.iter().sum::<f64>() / next_day.len() as f64,
        peak_aqi: forecast.statistics.max_aqi,
        peak_time: forecast.statistics.worst_hour,
        stale: forecast.stale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traffic_profile() {
        assert_eq!(estimate_traffic(8, false), 1.5);
        assert_eq!(estimate_traffic(18, false), 1.6);
        assert_eq!(estimate_traffic(23, false), 0.3);
        assert_eq!(estimate_traffic(3, false), 0.3);
        assert_eq!(estimate_traffic(13, false), 0.8);
        assert_eq!(estimate_traffic(7, false), 1.5);
        assert_eq!(estimate_traffic(9, false), 1.5);
        assert_eq!(estimate_traffic(10, false), 0.8);
        assert_eq!(estimate_traffic(17, false), 1.6);
        assert_eq!(estimate_traffic(20, false), 1.6);
        assert_eq!(estimate_traffic(21, false), 0.8);
        assert_eq!(estimate_traffic(22, false), 0.3);
        assert!((estimate_traffic(8, true) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_temperature_profile() {
        assert!((estimate_temperature(12) - 30.0).abs() < 1e-9);
        assert!((estimate_temperature(0) - 10.0).abs() < 1e-9);
        assert!((estimate_temperature(6) - 20.0).abs() < 1e-9);
    }
}
