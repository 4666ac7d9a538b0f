//! HTTP handlers for the AQI grid and hotspots

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use shared::{
    validate_bbox, validate_coordinates, validate_radius_km, BoundingBox, GeoPoint, GridSnapshot,
    LocationAqi,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::HotspotScan;
use crate::AppState;

/// Query parameters for the grid: an explicit box, or a point and radius
#[derive(Debug, Default, Deserialize)]
pub struct GridQuery {
    pub min_lat: Option<f64>,
    pub min_lon: Option<f64>,
    pub max_lat: Option<f64>,
    pub max_lon: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius_km: Option<f64>,
    pub client_id: Option<Uuid>,
}

impl GridQuery {
    /// Region named by the query, falling back to `default_region`
    pub fn region(&self, default_radius_km: f64, default_region: BoundingBox) -> AppResult<BoundingBox> {
        match (self.min_lat, self.min_lon, self.max_lat, self.max_lon) {
            (Some(min_lat), Some(min_lon), Some(max_lat), Some(max_lon)) => {
                let bbox = BoundingBox::new(min_lat, min_lon, max_lat, max_lon);
                validate_bbox(&bbox).map_err(|msg| AppError::invalid("bbox", msg))?;
                Ok(bbox)
            }
            (None, None, None, None) => match (self.lat, self.lon) {
                (Some(lat), Some(lon)) => {
                    validate_coordinates(lat, lon)
                        .map_err(|msg| AppError::invalid("location", msg))?;
                    let radius_km = self.radius_km.unwrap_or(default_radius_km);
                    validate_radius_km(radius_km)
                        .map_err(|msg| AppError::invalid("radius_km", msg))?;
                    Ok(BoundingBox::around(GeoPoint::new(lat, lon), radius_km))
                }
                (None, None) => Ok(default_region),
                _ => Err(AppError::invalid("location", "Both lat and lon are required")),
            },
            _ => Err(AppError::invalid(
                "bbox",
                "min_lat, min_lon, max_lat and max_lon must be given together",
            )),
        }
    }
}

/// Interpolated grid for a region
pub async fn get_grid(
    State(state): State<AppState>,
    Query(query): Query<GridQuery>,
) -> AppResult<Json<GridSnapshot>> {
    let region = query.region(
        state.config.grid.default_radius_km,
        state.pipeline.default_region(),
    )?;

    if let Some(client_id) = query.client_id {
        state.hub.remember_location(client_id, region.center());
    }

    let snapshot = state.pipeline.grid(region).await?;
    Ok(Json(snapshot.as_ref().clone()))
}

/// Query parameters for hotspot detection
#[derive(Debug, Deserialize)]
pub struct HotspotQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius_km: Option<f64>,
    pub threshold: Option<f64>,
    pub client_id: Option<Uuid>,
}

/// Hotspots around a point
pub async fn get_hotspots(
    State(state): State<AppState>,
    Query(query): Query<HotspotQuery>,
) -> AppResult<Json<HotspotScan>> {
    let grid = &state.config.grid;
    let center = match (query.lat, query.lon) {
        (Some(lat), Some(lon)) => GeoPoint::new(lat, lon),
        (None, None) => GeoPoint::new(grid.default_lat, grid.default_lon),
        _ => return Err(AppError::invalid("location", "Both lat and lon are required")),
    };
    let radius_km = query.radius_km.unwrap_or(grid.default_radius_km);

    if let Some(client_id) = query.client_id {
        state.hub.remember_location(client_id, center);
    }

    let scan = state
        .pipeline
        .hotspots(center, radius_km, query.threshold)
        .await?;
    Ok(Json(scan))
}

/// Query parameters for a single point
#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub lat: f64,
    pub lon: f64,
    pub client_id: Option<Uuid>,
}

/// Estimated AQI and category at a point
pub async fn get_location_aqi(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> AppResult<Json<LocationAqi>> {
    validate_coordinates(query.lat, query.lon).map_err(|msg| AppError::invalid("location", msg))?;
    let location = GeoPoint::new(query.lat, query.lon);

    if let Some(client_id) = query.client_id {
        state.hub.remember_location(client_id, location);
    }

    let estimate = state.pipeline.location_aqi(location).await?;
    Ok(Json(estimate))
}
