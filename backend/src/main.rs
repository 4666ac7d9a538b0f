//! Hyperlocal Air Quality Platform - Backend Server
//!
//! Serves street-level AQI grids, hotspots, forecasts, symptom correlation
//! and live updates over HTTP and WebSocket.

use std::{net::SocketAddr, sync::Arc};

use hyperlocal_aq_backend::{
    config::{Config, ModelKind},
    create_app,
    external::{BaselineModel, InferenceModel, OpenAqClient, RemoteModelClient},
    services::spawn_publisher,
    store::{HistoryStore, InMemoryStore, PgHistoryStore},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "haq_server=debug,hyperlocal_aq_backend=debug,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Hyperlocal Air Quality Server");
    tracing::info!("Environment: {}", config.environment);

    // Historical store
    let store: Arc<dyn HistoryStore> = match config.database.url {
        Some(_) => {
            tracing::info!("Connecting to database...");
            let pg = PgHistoryStore::connect(&config.database).await?;
            tracing::info!("Database connection established");

            if config.environment == "development" {
                tracing::info!("Running database migrations...");
                pg.migrate().await?;
                tracing::info!("Migrations completed");
            }
            Arc::new(pg)
        }
        None => {
            tracing::warn!("database.url not set, using in-memory history store");
            Arc::new(InMemoryStore::new())
        }
    };

    // External collaborators
    let feed = Arc::new(OpenAqClient::new(&config.feed)?);
    let model: Arc<dyn InferenceModel> = match config.model.kind {
        ModelKind::Baseline => Arc::new(BaselineModel::from_config(&config.model)),
        ModelKind::Remote => Arc::new(RemoteModelClient::from_config(&config.model)?),
    };
    tracing::info!(model = model.name(), "Forecast model ready");

    // Create application state
    let state = AppState::new(config.clone(), feed, store.clone(), model);

    let restored = state.correlation.rebuild(&store.symptoms().await?);
    tracing::info!(records = restored, "Symptom correlation restored");

    let publisher = spawn_publisher(state.pipeline.clone(), config.broadcast.interval_secs);
    let hub = state.hub.clone();

    // Build application
    let app = create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
            publisher.abort();
            hub.close_all();
        })
        .await?;

    Ok(())
}
