//! Hyperlocal Air Quality Platform - Backend
//!
//! Street-level AQI estimation, hotspot detection, forecasting, symptom
//! correlation and live updates for a single metropolitan region.

use std::sync::Arc;

use axum::{http::Uri, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;

use external::{InferenceModel, SensorFeed};
use services::{
    AirQualityPipeline, BroadcastHub, CorrelationEngine, ForecastEngine, ForecastService,
    GridInterpolator, HotspotDetector,
};
use store::HistoryStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn HistoryStore>,
    pub pipeline: Arc<AirQualityPipeline>,
    pub forecasts: Arc<ForecastService>,
    pub correlation: Arc<CorrelationEngine>,
    pub hub: Arc<BroadcastHub>,
}

impl AppState {
    /// Wire every service from configuration and the external collaborators
    pub fn new(
        config: Config,
        feed: Arc<dyn SensorFeed>,
        store: Arc<dyn HistoryStore>,
        model: Arc<dyn InferenceModel>,
    ) -> Self {
        let hub = Arc::new(BroadcastHub::new(config.broadcast.clone()));
        let pipeline = Arc::new(AirQualityPipeline::new(
            feed,
            store.clone(),
            Arc::new(GridInterpolator::new(config.grid.clone())),
            HotspotDetector::new(config.hotspot.clone()),
            hub.clone(),
        ));
        let forecasts = Arc::new(ForecastService::new(
            ForecastEngine::new(model, config.forecast.clone()),
            store.clone(),
            hub.clone(),
            config.forecast.cache_ttl_secs,
            config.forecast.cache_capacity,
        ));
        let correlation = Arc::new(CorrelationEngine::new(&config.correlation));

        Self {
            config: Arc::new(config),
            store,
            pipeline,
            forecasts,
            correlation,
            hub,
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes())
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// JSON 404 for unknown paths
async fn not_found(uri: Uri) -> error::AppError {
    error::AppError::NotFound(format!("Route {}", uri.path()))
}

/// Root endpoint
async fn root() -> &'static str {
    "Hyperlocal Air Quality Platform API v1.0"
}
