//! WebAssembly module for the Hyperlocal Air Quality Platform
//!
//! Provides client-side computation for:
//! - AQI categories, colors and breakpoint conversion
//! - Cigarette equivalence
//! - Live-update connection lifecycle with exponential backoff
//! - Building and inspecting stream messages

use shared::{
    validate_bbox, validate_coordinates, validate_severity, AqiCategory, Backoff, BoundingBox,
    ClientCommand, ConnectionEvent, ConnectionMachine, ConnectionState, StreamMessage,
};
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages in browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_error(message: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&message.to_string())
}

#[cfg(target_arch = "wasm32")]
fn log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}

#[cfg(not(target_arch = "wasm32"))]
fn log(_message: &str) {}

#[cfg(target_arch = "wasm32")]
fn now_ms() -> f64 {
    js_sys::Date::now()
}

#[cfg(not(target_arch = "wasm32"))]
fn now_ms() -> f64 {
    0.0
}

/// Category name for an AQI value
#[wasm_bindgen]
pub fn aqi_category(aqi: f64) -> String {
    AqiCategory::from_aqi(aqi).name().to_string()
}

/// Display color for an AQI value
#[wasm_bindgen]
pub fn aqi_color(aqi: f64) -> String {
    AqiCategory::from_aqi(aqi).color().to_string()
}

/// AQI for a PM2.5 concentration in µg/m³
#[wasm_bindgen]
pub fn pm25_to_aqi(pm25: f64) -> Result<f64, JsValue> {
    shared::pm25_to_aqi(pm25).map_err(js_error)
}

/// Estimated PM2.5 concentration for an AQI value
#[wasm_bindgen]
pub fn aqi_to_pm25(aqi: f64) -> Result<f64, JsValue> {
    shared::aqi_to_pm25(aqi).map_err(js_error)
}

/// Cigarette equivalence of an AQI value, as JSON
#[wasm_bindgen]
pub fn cigarette_equivalence(aqi: f64) -> Result<String, JsValue> {
    let equivalence = shared::cigarette_equivalence(aqi).map_err(js_error)?;
    serde_json::to_string(&equivalence).map_err(js_error)
}

/// Check a symptom report before it is queued for upload
#[wasm_bindgen]
pub fn validate_symptom_report(lat: f64, lon: f64, aqi: f64, severity: i32) -> Result<(), JsValue> {
    validate_coordinates(lat, lon).map_err(js_error)?;
    shared::validate_aqi(aqi).map_err(js_error)?;
    validate_severity(severity).map_err(js_error)
}

/// `set_location` command for the stream
#[wasm_bindgen]
pub fn set_location_command(lat: f64, lon: f64) -> Result<String, JsValue> {
    validate_coordinates(lat, lon).map_err(js_error)?;
    serde_json::to_string(&ClientCommand::SetLocation { lat, lon }).map_err(js_error)
}

/// `set_viewport` command for the stream
#[wasm_bindgen]
pub fn set_viewport_command(
    min_lat: f64,
    min_lon: f64,
    max_lat: f64,
    max_lon: f64,
) -> Result<String, JsValue> {
    validate_bbox(&BoundingBox::new(min_lat, min_lon, max_lat, max_lon)).map_err(js_error)?;
    serde_json::to_string(&ClientCommand::SetViewport {
        min_lat,
        min_lon,
        max_lat,
        max_lon,
    })
    .map_err(js_error)
}

/// `type` tag of a server message, rejecting anything malformed
#[wasm_bindgen]
pub fn stream_message_type(json: &str) -> Result<String, JsValue> {
    let message: StreamMessage = serde_json::from_str(json)
        .map_err(|e| js_error(format!("Invalid stream message: {}", e)))?;
    let kind = match message {
        StreamMessage::Connection { .. } => "connection",
        StreamMessage::AqiUpdate { .. } => "aqi_update",
        StreamMessage::HotspotUpdate { .. } => "hotspot_update",
        StreamMessage::ForecastUpdate { .. } => "forecast_update",
        StreamMessage::Alert { .. } => "alert",
        StreamMessage::Heartbeat { .. } => "heartbeat",
        StreamMessage::Error { .. } => "error",
    };
    Ok(kind.to_string())
}

/// Browser-side driver for the live-update connection.
///
/// JavaScript owns the socket and the timers; it reports socket events here
/// and schedules a reconnect after the returned delay.
#[wasm_bindgen]
pub struct ReconnectController {
    machine: ConnectionMachine,
    last_change_ms: f64,
}

#[wasm_bindgen]
impl ReconnectController {
    /// `max_attempts` of zero or less retries forever
    #[wasm_bindgen(constructor)]
    pub fn new(initial_ms: u32, max_ms: u32, max_attempts: i32) -> ReconnectController {
        let backoff = Backoff {
            initial_ms: u64::from(initial_ms),
            max_ms: u64::from(max_ms.max(initial_ms)),
            max_attempts: u32::try_from(max_attempts).ok().filter(|n| *n > 0),
            ..Backoff::default()
        };
        ReconnectController {
            machine: ConnectionMachine::new(backoff),
            last_change_ms: now_ms(),
        }
    }

    /// Socket handshake completed
    pub fn opened(&mut self) -> Result<(), JsValue> {
        self.apply(ConnectionEvent::Opened).map(|_| ())
    }

    /// Socket failed or closed. Returns the delay in milliseconds before the
    /// next attempt, or -1 when the client should stop reconnecting.
    pub fn dropped(&mut self) -> Result<f64, JsValue> {
        match self.apply(ConnectionEvent::Dropped)? {
            ConnectionState::Reconnecting { delay_ms, .. } => Ok(delay_ms as f64),
            _ => Ok(-1.0),
        }
    }

    /// Backoff delay expired; the client should open a new socket
    pub fn retry_elapsed(&mut self) -> Result<(), JsValue> {
        self.apply(ConnectionEvent::RetryElapsed).map(|_| ())
    }

    /// Deliberate teardown, e.g. the page is being hidden
    pub fn cancel(&mut self) {
        // Cancel is accepted from every state
        let _ = self.apply(ConnectionEvent::Cancel);
    }

    pub fn is_closed(&self) -> bool {
        self.machine.is_closed()
    }

    /// Current state as JSON, e.g. `{"state":"reconnecting","attempt":2,"delay_ms":2000}`
    pub fn state(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.machine.state()).map_err(js_error)
    }

    /// Milliseconds since the last state change
    pub fn elapsed_ms(&self) -> f64 {
        now_ms() - self.last_change_ms
    }
}

impl ReconnectController {
    fn apply(&mut self, event: ConnectionEvent) -> Result<ConnectionState, JsValue> {
        let state = self.machine.handle(event).map_err(js_error)?;
        self.last_change_ms = now_ms();
        log(&format!("live connection: {:?} -> {:?}", event, state));
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aqi_category_and_color() {
        assert_eq!(aqi_category(42.0), "Good");
        assert_eq!(aqi_category(180.0), "Unhealthy");
        assert_eq!(aqi_category(420.0), "Hazardous");
        assert_eq!(aqi_color(42.0), AqiCategory::Good.color());
    }

    #[test]
    fn test_pm25_conversion() {
        assert!((pm25_to_aqi(35.4).unwrap() - 100.0).abs() < 1e-9);
        assert!((aqi_to_pm25(100.0).unwrap() - 35.4).abs() < 1e-9);
    }

    #[test]
    fn test_cigarette_equivalence_json() {
        let json: serde_json::Value =
            serde_json::from_str(&cigarette_equivalence(300.0).unwrap()).unwrap();
        assert!((json["cigarettes_equivalent"].as_f64().unwrap() - 11.38).abs() < 0.01);
    }

    #[test]
    fn test_commands() {
        let command: serde_json::Value =
            serde_json::from_str(&set_location_command(28.61, 77.2).unwrap()).unwrap();
        assert_eq!(command["action"], "set_location");

        let command: serde_json::Value =
            serde_json::from_str(&set_viewport_command(28.4, 77.0, 28.8, 77.4).unwrap()).unwrap();
        assert_eq!(command["action"], "set_viewport");
    }

    #[test]
    fn test_stream_message_type() {
        let json = serde_json::to_string(&StreamMessage::heartbeat()).unwrap();
        assert_eq!(stream_message_type(&json).unwrap(), "heartbeat");
    }

    #[test]
    fn test_reconnect_backoff() {
        let mut controller = ReconnectController::new(1_000, 8_000, 0);
        controller.opened().unwrap();

        assert_eq!(controller.dropped().unwrap(), 1_000.0);
        controller.retry_elapsed().unwrap();
        assert_eq!(controller.dropped().unwrap(), 2_000.0);
        controller.retry_elapsed().unwrap();
        assert_eq!(controller.dropped().unwrap(), 4_000.0);
        controller.retry_elapsed().unwrap();
        controller.opened().unwrap();

        // Success resets the backoff
        assert_eq!(controller.dropped().unwrap(), 1_000.0);

        controller.cancel();
        assert!(controller.is_closed());
    }

    #[test]
    fn test_reconnect_gives_up() {
        let mut controller = ReconnectController::new(500, 5_000, 1);
        assert_eq!(controller.dropped().unwrap(), 500.0);
        controller.retry_elapsed().unwrap();
        assert_eq!(controller.dropped().unwrap(), -1.0);
        assert!(controller.is_closed());
    }
}
