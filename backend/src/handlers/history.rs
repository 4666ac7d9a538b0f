//! HTTP handlers for stored readings

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{validate_coordinates, validate_radius_km, GeoPoint, HistoricalReading};

use crate::error::{AppError, AppResult};
use crate::store::ReadingQuery;
use crate::AppState;

const DEFAULT_RADIUS_KM: f64 = 1.0;
const DEFAULT_LIMIT: usize = 1000;
const MAX_LIMIT: usize = 10_000;

#[derive(Debug, Default, Deserialize)]
pub struct HistoricalQuery {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius_km: Option<f64>,
    pub limit: Option<usize>,
}

impl HistoricalQuery {
    pub fn to_reading_query(&self) -> AppResult<ReadingQuery> {
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if start > end {
                return Err(AppError::invalid(
                    "start_time",
                    "start_time must not be after end_time",
                ));
            }
        }

        let near = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => {
                validate_coordinates(lat, lon).map_err(|msg| AppError::invalid("location", msg))?;
                let radius_km = self.radius_km.unwrap_or(DEFAULT_RADIUS_KM);
                validate_radius_km(radius_km).map_err(|msg| AppError::invalid("radius_km", msg))?;
                Some((GeoPoint::new(lat, lon), radius_km))
            }
            (None, None) => None,
            _ => return Err(AppError::invalid("location", "Both lat and lon are required")),
        };

        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if limit == 0 || limit > MAX_LIMIT {
            return Err(AppError::invalid(
                "limit",
                format!("limit must be between 1 and {}", MAX_LIMIT),
            ));
        }

        Ok(ReadingQuery {
            start: self.start_time,
            end: self.end_time,
            near,
            limit,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct HistoricalResponse {
    pub count: usize,
    pub readings: Vec<HistoricalReading>,
}

/// Stored readings filtered by time window and distance
pub async fn get_historical(
    State(state): State<AppState>,
    Query(query): Query<HistoricalQuery>,
) -> AppResult<Json<HistoricalResponse>> {
    let readings = state.store.readings(&query.to_reading_query()?).await?;
    Ok(Json(HistoricalResponse {
        count: readings.len(),
        readings,
    }))
}
