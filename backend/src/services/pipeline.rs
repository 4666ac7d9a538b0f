//! Sensor feed → grid → hotspots → live updates
//!
//! Every computed grid and hotspot set is published to the broadcast hub
//! centered on its region. Readings pulled from the feed are also appended
//! to the historical store so forecasts have recent history.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use shared::{
    validate_point, validate_radius_km, AqiCategory, BoundingBox, GeoPoint, GridSnapshot, Hotspot,
    LocationAqi, SensorReading, UpdateKind,
};
use tokio::task::JoinHandle;

use crate::error::{AppError, AppResult};
use crate::external::SensorFeed;
use crate::services::broadcast::{BroadcastHub, PublishReport};
use crate::services::grid::{estimate_point, GridInterpolator};
use crate::services::hotspot::{assign_ids, HotspotDetector};
use crate::store::HistoryStore;

/// Hotspots near a point, with the grid they were derived from
#[derive(Debug, Clone, Serialize)]
pub struct HotspotScan {
    pub center: GeoPoint,
    pub radius_km: f64,
    pub threshold: f64,
    pub grid_version: u64,
    pub hotspots: Vec<Hotspot>,
}

/// Outcome of one background publication
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleSummary {
    pub grid_version: u64,
    pub hotspots: usize,
    pub delivered: usize,
}

pub struct AirQualityPipeline {
    feed: Arc<dyn SensorFeed>,
    store: Arc<dyn HistoryStore>,
    grid: Arc<GridInterpolator>,
    detector: HotspotDetector,
    hub: Arc<BroadcastHub>,
}

impl AirQualityPipeline {
    pub fn new(
        feed: Arc<dyn SensorFeed>,
        store: Arc<dyn HistoryStore>,
        grid: Arc<GridInterpolator>,
        detector: HotspotDetector,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self {
            feed,
            store,
            grid,
            detector,
            hub,
        }
    }

    /// Region served when a request names no location
    pub fn default_region(&self) -> BoundingBox {
        let config = self.grid.config();
        BoundingBox::around(
            GeoPoint::new(config.default_lat, config.default_lon),
            config.default_radius_km,
        )
    }

    /// Fresh grid for `region`, published as an `aqi_update`
    pub async fn grid(&self, region: BoundingBox) -> AppResult<Arc<GridSnapshot>> {
        let snapshot = self.compute_grid(region).await?;
        self.publish_grid(&snapshot)?;
        Ok(snapshot)
    }

    /// Hotspots within `radius_km` of `center`
    pub async fn hotspots(
        &self,
        center: GeoPoint,
        radius_km: f64,
        threshold: Option<f64>,
    ) -> AppResult<HotspotScan> {
        validate_point(&center).map_err(|msg| AppError::invalid("location", msg))?;
        validate_radius_km(radius_km).map_err(|msg| AppError::invalid("radius_km", msg))?;

        let snapshot = self.compute_grid(BoundingBox::around(center, radius_km)).await?;
        let threshold = threshold.unwrap_or_else(|| self.detector.threshold());
        let mut hotspots: Vec<Hotspot> = self
            .detector
            .detect_with_threshold(&snapshot.cells, threshold)?
            .into_iter()
            .filter(|h| h.centroid.approx_distance_km(&center) <= radius_km)
            .collect();
        // Ids follow the filtered order
        assign_ids(&mut hotspots);

        self.publish_grid(&snapshot)?;
        self.hub.publish(
            UpdateKind::HotspotUpdate,
            center,
            serde_json::json!({ "grid_version": snapshot.version, "hotspots": hotspots }),
        )?;

        Ok(HotspotScan {
            center,
            radius_km,
            threshold,
            grid_version: snapshot.version,
            hotspots,
        })
    }

    /// Estimated AQI at a single point from the stations around it
    pub async fn location_aqi(&self, location: GeoPoint) -> AppResult<LocationAqi> {
        validate_point(&location).map_err(|msg| AppError::invalid("location", msg))?;

        let config = self.grid.config();
        let readings = self
            .fetch_readings(location, config.search_radius_km)
            .await?;
        let estimate = estimate_point(config, &readings, &location)?;
        let aqi = estimate.aqi.ok_or(AppError::DataUnavailable)?;

        let temperature = readings
            .iter()
            .filter_map(|r| r.temperature.map(|t| (r.location().approx_distance_km(&location), t)))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, t)| t);

        Ok(LocationAqi {
            location,
            aqi,
            category: AqiCategory::from_aqi(aqi),
            confidence: estimate.confidence,
            station_count: estimate.station_count,
            temperature,
            timestamp: Utc::now(),
        })
    }

    /// Recompute and publish grid and hotspots for `region`
    pub async fn publish_cycle(&self, region: BoundingBox) -> AppResult<CycleSummary> {
        let snapshot = self.compute_grid(region).await?;
        let hotspots = self.detector.detect(&snapshot.cells);

        let mut delivered = self.publish_grid(&snapshot)?.delivered;
        delivered += self
            .hub
            .publish(
                UpdateKind::HotspotUpdate,
                snapshot.center(),
                serde_json::json!({ "grid_version": snapshot.version, "hotspots": hotspots }),
            )?
            .delivered;

        Ok(CycleSummary {
            grid_version: snapshot.version,
            hotspots: hotspots.len(),
            delivered,
        })
    }

    async fn compute_grid(&self, region: BoundingBox) -> AppResult<Arc<GridSnapshot>> {
        let readings = self.readings_for(&region).await?;
        self.grid.refresh(region, readings).await
    }

    /// Stations that can influence any cell of `region`
    async fn readings_for(&self, region: &BoundingBox) -> AppResult<Vec<SensorReading>> {
        let center = region.center();
        let half_diagonal_km =
            GeoPoint::new(region.max_lat, region.max_lon).approx_distance_km(&center);
        let radius_km = half_diagonal_km + self.grid.config().search_radius_km;
        self.fetch_readings(center, radius_km).await
    }

    /// Latest feed readings near `center`, appended to the store on the way
    async fn fetch_readings(&self, center: GeoPoint, radius_km: f64) -> AppResult<Vec<SensorReading>> {
        let readings = self.feed.latest(center, radius_km).await?;

        if let Err(e) = self.store.record_readings(&readings).await {
            tracing::warn!(error = %e, "Failed to record sensor readings");
        }
        Ok(readings)
    }

    fn publish_grid(&self, snapshot: &GridSnapshot) -> AppResult<PublishReport> {
        let cells: Vec<_> = snapshot
            .valued_cells()
            .map(|c| {
                serde_json::json!({
                    "lat": c.lat,
                    "lon": c.lon,
                    "aqi": c.interpolated_aqi,
                    "confidence": c.confidence,
                })
            })
            .collect();

        self.hub.publish(
            UpdateKind::AqiUpdate,
            snapshot.center(),
            serde_json::json!({
                "region": snapshot.region,
                "version": snapshot.version,
                "resolution_deg": snapshot.resolution_deg,
                "generated_at": snapshot.generated_at,
                "cells": cells,
            }),
        )
    }
}

/// Periodically publish the default region while anyone is listening
pub fn spawn_publisher(pipeline: Arc<AirQualityPipeline>, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            interval.tick().await;
            if pipeline.hub.subscriber_count() == 0 {
                continue;
            }
            match pipeline.publish_cycle(pipeline.default_region()).await {
                Ok(summary) => tracing::info!(
                    version = summary.grid_version,
                    hotspots = summary.hotspots,
                    delivered = summary.delivered,
                    "Published periodic update"
                ),
                Err(e) => tracing::warn!(error = %e, "Periodic update failed"),
            }
        }
    })
}
