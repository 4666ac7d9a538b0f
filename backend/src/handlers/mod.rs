//! HTTP handlers for the Hyperlocal Air Quality API

pub mod aqi;
pub mod forecast;
pub mod health;
pub mod history;
pub mod impact;
pub mod stream;
pub mod symptoms;

pub use aqi::{get_grid, get_hotspots, get_location_aqi};
pub use forecast::{get_forecast, get_location_alert, get_regional_forecast};
pub use health::health_check;
pub use history::get_historical;
pub use impact::{get_cigarette_equivalence, get_health_recommendations};
pub use stream::stream_handler;
pub use symptoms::{get_correlation, log_symptoms};
