//! Inverse-distance-weighted AQI grid
//!
//! Each region has its own slot guarded by an async mutex, so at most one
//! recomputation per region runs at a time while different regions proceed
//! in parallel. Readers get an `Arc` to an immutable, versioned snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use shared::{validate_bbox, BoundingBox, GeoPoint, GridCell, GridSnapshot, SensorReading};
use tokio::sync::Mutex as AsyncMutex;

use crate::config::GridConfig;
use crate::error::{AppError, AppResult};

/// Distances below this are treated as a station sitting on the cell center
const EXACT_MATCH_KM: f64 = 1e-9;

/// Idle region slots are pruned once this many are cached
const MAX_CACHED_REGIONS: usize = 256;

/// Region identity at roughly 10 m precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionKey([i64; 4]);

impl RegionKey {
    pub fn for_region(region: &BoundingBox) -> Self {
        let q = |v: f64| (v * 10_000.0).round() as i64;
        Self([
            q(region.min_lat),
            q(region.min_lon),
            q(region.max_lat),
            q(region.max_lon),
        ])
    }
}

#[derive(Default)]
struct RegionState {
    version: u64,
    latest: Option<Arc<GridSnapshot>>,
}

#[derive(Default)]
struct RegionSlot {
    state: AsyncMutex<RegionState>,
}

/// Cells of one computation, before they are versioned
#[derive(Debug, Clone)]
pub struct GridLayout {
    pub rows: u32,
    pub cols: u32,
    pub cells: Vec<GridCell>,
}

struct Station {
    location: GeoPoint,
    aqi: f64,
}

pub struct GridInterpolator {
    config: GridConfig,
    regions: Mutex<HashMap<RegionKey, Arc<RegionSlot>>>,
}

impl GridInterpolator {
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            regions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Recompute the grid for `region` and publish it as the region's
    /// latest snapshot. The version only advances on success.
    pub async fn refresh(
        &self,
        region: BoundingBox,
        readings: Vec<SensorReading>,
    ) -> AppResult<Arc<GridSnapshot>> {
        let slot = self.slot(&region);
        let mut state = slot.state.lock().await;

        let config = self.config.clone();
        let layout = tokio::task::spawn_blocking(move || interpolate(&config, &region, &readings))
            .await
            .map_err(|e| AppError::Internal(format!("Grid computation aborted: {}", e)))??;

        state.version += 1;
        let snapshot = Arc::new(GridSnapshot {
            region,
            resolution_deg: self.config.resolution_deg,
            rows: layout.rows,
            cols: layout.cols,
            version: state.version,
            generated_at: Utc::now(),
            cells: layout.cells,
        });
        state.latest = Some(snapshot.clone());

        tracing::debug!(
            version = snapshot.version,
            rows = snapshot.rows,
            cols = snapshot.cols,
            "Grid refreshed"
        );

        Ok(snapshot)
    }

    /// Last successfully computed snapshot for `region`
    pub async fn latest(&self, region: &BoundingBox) -> Option<Arc<GridSnapshot>> {
        let slot = self.regions.lock().get(&RegionKey::for_region(region)).cloned()?;
        let state = slot.state.lock().await;
        state.latest.clone()
    }

    fn slot(&self, region: &BoundingBox) -> Arc<RegionSlot> {
        let mut regions = self.regions.lock();
        if regions.len() >= MAX_CACHED_REGIONS {
            regions.retain(|_, slot| Arc::strong_count(slot) > 1);
        }
        regions
            .entry(RegionKey::for_region(region))
            .or_default()
            .clone()
    }
}

/// Interpolate station readings onto a regular grid covering `region`.
///
/// A cell sitting exactly on a station takes that station's AQI with full
/// confidence. Otherwise the value is the `1/d^power` weighted mean of the
/// stations within the search radius, or `None` when fewer than
/// `min_stations` are in range.
pub fn interpolate(
    config: &GridConfig,
    region: &BoundingBox,
    readings: &[SensorReading],
) -> AppResult<GridLayout> {
    validate_bbox(region).map_err(|msg| AppError::invalid("region", msg))?;
    if !(config.resolution_deg.is_finite() && config.resolution_deg > 0.0) {
        return Err(AppError::Configuration(
            "grid.resolution_deg must be positive".into(),
        ));
    }
    if !(config.power.is_finite() && config.power > 0.0) {
        return Err(AppError::Configuration("grid.power must be positive".into()));
    }

    let res = config.resolution_deg;
    let rows = (((region.max_lat - region.min_lat) / res).ceil() as usize).max(1);
    let cols = (((region.max_lon - region.min_lon) / res).ceil() as usize).max(1);
    if rows.saturating_mul(cols) > config.max_cells {
        return Err(AppError::invalid(
            "region",
            format!(
                "Region needs {}x{} cells, more than the limit of {}",
                rows, cols, config.max_cells
            ),
        ));
    }

    let stations = stations(readings)?;
    let mut cells = Vec::with_capacity(rows * cols);
    let mut valued = 0usize;

    for row in 0..rows {
        let lat = region.min_lat + (row as f64 + 0.5) * res;
        for col in 0..cols {
            let lon = region.min_lon + (col as f64 + 0.5) * res;
            let estimate = estimate_at(config, &stations, &GeoPoint::new(lat, lon));
            if estimate.aqi.is_some() {
                valued += 1;
            }

            cells.push(GridCell {
                row: row as u32,
                col: col as u32,
                lat,
                lon,
                interpolated_aqi: estimate.aqi,
                confidence: estimate.confidence,
                station_count: estimate.station_count,
            });
        }
    }

    if valued == 0 {
        return Err(AppError::DataUnavailable);
    }

    Ok(GridLayout {
        rows: rows as u32,
        cols: cols as u32,
        cells,
    })
}

/// Interpolated value at one point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointEstimate {
    pub aqi: Option<f64>,
    pub confidence: f64,
    pub station_count: u32,
}

/// Estimate the AQI at `point` with the same weighting as a grid cell.
/// `DataUnavailable` when no reading has an AQI.
pub fn estimate_point(
    config: &GridConfig,
    readings: &[SensorReading],
    point: &GeoPoint,
) -> AppResult<PointEstimate> {
    if !(config.power.is_finite() && config.power > 0.0) {
        return Err(AppError::Configuration("grid.power must be positive".into()));
    }
    Ok(estimate_at(config, &stations(readings)?, point))
}

fn stations(readings: &[SensorReading]) -> AppResult<Vec<Station>> {
    let stations: Vec<Station> = readings
        .iter()
        .filter(|r| r.lat.is_finite() && r.lon.is_finite())
        .filter_map(|r| {
            r.aqi().map(|aqi| Station {
                location: r.location(),
                aqi,
            })
        })
        .collect();
    if stations.is_empty() {
        return Err(AppError::DataUnavailable);
    }
    Ok(stations)
}

fn estimate_at(config: &GridConfig, stations: &[Station], point: &GeoPoint) -> PointEstimate {
    let radius = config.search_radius_km;
    let min_stations = config.min_stations.max(1);

    let mut exact: Option<f64> = None;
    let mut weight_sum = 0.0;
    let mut weighted_aqi = 0.0;
    let mut nearest = f64::INFINITY;
    let mut in_range = 0u32;

    for station in stations {
        let d = station.location.approx_distance_km(point);
        if d <= EXACT_MATCH_KM {
            exact.get_or_insert(station.aqi);
            in_range += 1;
            continue;
        }
        if d <= radius {
            let w = 1.0 / d.powf(config.power);
            weight_sum += w;
            weighted_aqi += w * station.aqi;
            nearest = nearest.min(d);
            in_range += 1;
        }
    }

    let (aqi, confidence) = match exact {
        Some(aqi) => (Some(aqi), 1.0),
        None if in_range as usize >= min_stations && weight_sum > 0.0 => (
            Some(weighted_aqi / weight_sum),
            (1.0 - 0.5 * nearest / radius).clamp(0.0, 1.0),
        ),
        None => (None, 0.0),
    };

    PointEstimate {
        aqi,
        confidence,
        station_count: in_range,
    }
}
