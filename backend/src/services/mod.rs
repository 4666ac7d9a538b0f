//! Core services of the Hyperlocal Air Quality platform

pub mod broadcast;
pub mod correlation;
pub mod forecast;
pub mod grid;
pub mod health;
pub mod hotspot;
pub mod pipeline;

pub use broadcast::{BroadcastHub, ClientId, ClientQueue, PublishReport, PushOutcome};
pub use correlation::CorrelationEngine;
pub use forecast::{ForecastEngine, ForecastService};
pub use grid::GridInterpolator;
pub use hotspot::HotspotDetector;
pub use pipeline::{spawn_publisher, AirQualityPipeline, HotspotScan};
