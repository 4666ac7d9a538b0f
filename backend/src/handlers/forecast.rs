//! HTTP handlers for AQI forecasts

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use shared::{
    validate_coordinates, Forecast, ForecastHorizon, GeoPoint, LocationAlert, RegionalForecast,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::handlers::aqi::LocationQuery;
use crate::AppState;

/// Query parameters for a point forecast
#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub lat: f64,
    pub lon: f64,
    /// 24 or 48; defaults to 48
    pub horizon: Option<u32>,
    pub client_id: Option<Uuid>,
}

/// Hourly forecast for a location
pub async fn get_forecast(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
) -> AppResult<Json<Forecast>> {
    validate_coordinates(query.lat, query.lon).map_err(|msg| AppError::invalid("location", msg))?;
    let horizon = match query.horizon {
        Some(hours) => {
            ForecastHorizon::try_from(hours).map_err(|msg| AppError::invalid("horizon", msg))?
        }
        None => ForecastHorizon::default(),
    };

    let location = GeoPoint::new(query.lat, query.lon);
    if let Some(client_id) = query.client_id {
        state.hub.remember_location(client_id, location);
    }

    let forecast = state.forecasts.get_forecast(location, horizon).await?;
    Ok(Json(forecast))
}

/// Forecast digest for the region's key locations
pub async fn get_regional_forecast(
    State(state): State<AppState>,
) -> AppResult<Json<RegionalForecast>> {
    let forecast = state.forecasts.regional_forecast().await?;
    Ok(Json(forecast))
}

/// Current-hour prediction with alert and recommendations
pub async fn get_location_alert(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> AppResult<Json<LocationAlert>> {
    validate_coordinates(query.lat, query.lon).map_err(|msg| AppError::invalid("location", msg))?;
    let location = GeoPoint::new(query.lat, query.lon);

    if let Some(client_id) = query.client_id {
        state.hub.remember_location(client_id, location);
    }

    let alert = state.forecasts.location_alert(location).await?;
    Ok(Json(alert))
}
