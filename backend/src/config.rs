//! Configuration management for the Hyperlocal Air Quality server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with HAQ prefix (`HAQ__GRID__POWER=3`)

use config::{builder::DefaultState, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Historical store configuration
    pub database: DatabaseConfig,

    /// Sensor feed configuration
    pub feed: FeedConfig,

    /// Grid interpolation parameters
    pub grid: GridConfig,

    /// Hotspot detection parameters
    pub hotspot: HotspotConfig,

    /// Forecast derivation parameters
    pub forecast: ForecastConfig,

    /// Inference model selection
    pub model: ModelConfig,

    /// Symptom correlation parameters
    pub correlation: CorrelationConfig,

    /// Live update fan-out parameters
    pub broadcast: BroadcastConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; the in-memory store is used when absent
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    /// OpenAQ-compatible "latest" endpoint
    pub base_url: String,

    /// API key sent as `X-API-Key`
    pub api_key: Option<String>,

    /// Search radius around the requested point, in metres
    pub radius_m: u32,

    /// Maximum stations per request
    pub limit: u32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GridConfig {
    /// Cell size in degrees
    pub resolution_deg: f64,

    /// Inverse-distance weighting exponent
    pub power: f64,

    /// Stations further than this from a cell are ignored
    pub search_radius_km: f64,

    /// Minimum stations within the radius for a cell to get a value
    pub min_stations: usize,

    /// Upper bound on cells per region
    pub max_cells: usize,

    /// Region served when no location is given
    pub default_lat: f64,
    pub default_lon: f64,
    pub default_radius_km: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HotspotConfig {
    /// Cells at or above this AQI are candidates
    pub threshold: f64,

    /// Smallest component reported as a hotspot
    pub min_member_cells: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ForecastConfig {
    /// Cap on alerts returned per forecast
    pub max_alerts: usize,

    /// Hour-to-hour change that raises a rapid-change alert
    pub rapid_change_threshold: f64,

    /// Fresh forecasts are reused for this many seconds
    pub cache_ttl_secs: i64,

    /// Locations kept in the forecast cache
    pub cache_capacity: usize,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Baseline,
    Remote,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub kind: ModelKind,

    /// Inference endpoint for the remote model
    pub endpoint: Option<String>,

    /// Inference request timeout in seconds
    pub timeout_secs: u64,

    /// Baseline AQI when a location has no history
    pub fallback_aqi: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorrelationConfig {
    /// Buckets below this count report insufficient data
    pub min_samples: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BroadcastConfig {
    /// Planar distance in degrees within which an update is relevant
    pub relevance_radius_deg: f64,

    /// Pending messages kept per client before the oldest is dropped
    pub queue_capacity: usize,

    /// Seconds between heartbeats on idle connections
    pub heartbeat_secs: u64,

    /// Seconds between background grid/hotspot publications
    pub interval_secs: u64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("HAQ_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = Self::with_defaults(&environment)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (HAQ prefix)
            .add_source(
                Environment::with_prefix("HAQ")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Configuration made of code defaults only
    pub fn from_defaults() -> Result<Self, ConfigError> {
        Self::with_defaults("test")?.build()?.try_deserialize()
    }

    fn with_defaults(environment: &str) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        config::Config::builder()
            .set_default("environment", environment)?
            .set_default("server.port", 8000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("feed.base_url", "https://api.openaq.org/v2/latest")?
            .set_default("feed.radius_m", 50_000)?
            .set_default("feed.limit", 100)?
            .set_default("feed.timeout_secs", 10)?
            .set_default("grid.resolution_deg", 0.005)?
            .set_default("grid.power", 2.0)?
            .set_default("grid.search_radius_km", 25.0)?
            .set_default("grid.min_stations", 1)?
            .set_default("grid.max_cells", 250_000)?
            .set_default("grid.default_lat", 28.6139)?
            .set_default("grid.default_lon", 77.2090)?
            .set_default("grid.default_radius_km", 25.0)?
            .set_default("hotspot.threshold", 150.0)?
            .set_default("hotspot.min_member_cells", 2)?
            .set_default("forecast.max_alerts", 10)?
            .set_default("forecast.rapid_change_threshold", 50.0)?
            .set_default("forecast.cache_ttl_secs", 600)?
            .set_default("forecast.cache_capacity", 1024)?
            .set_default("model.kind", "baseline")?
            .set_default("model.timeout_secs", 5)?
            .set_default("model.fallback_aqi", 150.0)?
            .set_default("correlation.min_samples", 3)?
            .set_default("broadcast.relevance_radius_deg", 0.5)?
            .set_default("broadcast.queue_capacity", 32)?
            .set_default("broadcast.heartbeat_secs", 30)?
            .set_default("broadcast.interval_secs", 300)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            resolution_deg: 0.005,
            power: 2.0,
            search_radius_km: 25.0,
            min_stations: 1,
            max_cells: 250_000,
            default_lat: 28.6139,
            default_lon: 77.2090,
            default_radius_km: 25.0,
        }
    }
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self {
            threshold: 150.0,
            min_member_cells: 2,
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            max_alerts: 10,
            rapid_change_threshold: 50.0,
            cache_ttl_secs: 600,
            cache_capacity: 1024,
        }
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self { min_samples: 3 }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            relevance_radius_deg: 0.5,
            queue_capacity: 32,
            heartbeat_secs: 30,
            interval_secs: 300,
        }
    }
}
