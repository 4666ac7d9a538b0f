//! Live-update channel messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{BoundingBox, GeoPoint};

/// Kind of update pushed to subscribers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    AqiUpdate,
    HotspotUpdate,
    ForecastUpdate,
    Alert,
}

/// Server-to-client message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    Connection {
        status: String,
        client_id: Uuid,
        message: String,
        timestamp: DateTime<Utc>,
    },
    AqiUpdate {
        center: GeoPoint,
        data: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    HotspotUpdate {
        center: GeoPoint,
        data: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    ForecastUpdate {
        center: GeoPoint,
        data: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    Alert {
        center: GeoPoint,
        data: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    Heartbeat {
        timestamp: DateTime<Utc>,
    },
    Error {
        code: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl StreamMessage {
    pub fn update(kind: UpdateKind, center: GeoPoint, data: serde_json::Value) -> Self {
        let timestamp = Utc::now();
        match kind {
            UpdateKind::AqiUpdate => StreamMessage::AqiUpdate { center, data, timestamp },
            UpdateKind::HotspotUpdate => StreamMessage::HotspotUpdate { center, data, timestamp },
            UpdateKind::ForecastUpdate => StreamMessage::ForecastUpdate { center, data, timestamp },
            UpdateKind::Alert => StreamMessage::Alert { center, data, timestamp },
        }
    }

    pub fn heartbeat() -> Self {
        StreamMessage::Heartbeat {
            timestamp: Utc::now(),
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        StreamMessage::Error {
            code: code.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Client-to-server command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    SetLocation { lat: f64, lon: f64 },
    SetViewport {
        min_lat: f64,
        min_lon: f64,
        max_lat: f64,
        max_lon: f64,
    },
    Ping,
}

/// Where a subscriber is looking
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anchor {
    Point(GeoPoint),
    Viewport(BoundingBox),
}
