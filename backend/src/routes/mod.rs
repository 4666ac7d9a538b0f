//! Route definitions for the Hyperlocal Air Quality Platform

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Street-level AQI
        .nest("/aqi", aqi_routes())
        // Forecasts
        .nest("/forecast", forecast_routes())
        .route("/alerts", get(handlers::get_location_alert))
        // Stored readings
        .route("/historical", get(handlers::get_historical))
        // Exposure impact
        .route("/impact/cigarettes", get(handlers::get_cigarette_equivalence))
        // Health guidance and symptom correlation
        .nest("/health", health_routes())
        // Live updates
        .route("/stream", get(handlers::stream_handler))
}

fn aqi_routes() -> Router<AppState> {
    Router::new()
        .route("/grid", get(handlers::get_grid))
        .route("/hotspots", get(handlers::get_hotspots))
        .route("/location", get(handlers::get_location_aqi))
}

fn forecast_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_forecast))
        .route("/regional", get(handlers::get_regional_forecast))
}

fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/recommendations", get(handlers::get_health_recommendations))
        .route("/symptoms", post(handlers::log_symptoms))
        .route("/correlation", get(handlers::get_correlation))
}
