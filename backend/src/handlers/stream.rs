//! WebSocket endpoint for live AQI, hotspot, forecast and alert updates
//!
//! ## Protocol
//!
//! Clients connect to `/api/v1/stream`, optionally with `?lat=&lon=` or a
//! `client_id` that earlier REST calls carried. Messages are JSON objects
//! tagged by `type`: `connection`, `aqi_update`, `hotspot_update`,
//! `forecast_update`, `alert`, `heartbeat` and `error`.
//!
//! ### Client Commands
//!
//! - `{"action": "set_location", "lat": .., "lon": ..}`
//! - `{"action": "set_viewport", "min_lat": .., "min_lon": .., "max_lat": .., "max_lon": ..}`
//! - `{"action": "ping"}`

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use shared::{
    validate_bbox, validate_coordinates, Anchor, BoundingBox, ClientCommand, ConnectionEvent,
    ConnectionMachine, GeoPoint, StreamMessage,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::{BroadcastHub, ClientId};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub client_id: Option<Uuid>,
}

/// Upgrade to a live-update connection
#[tracing::instrument(skip(state, ws))]
pub async fn stream_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let anchor = match (query.lat, query.lon) {
        (Some(lat), Some(lon)) => {
            validate_coordinates(lat, lon).map_err(|msg| AppError::invalid("location", msg))?;
            Some(Anchor::Point(GeoPoint::new(lat, lon)))
        }
        (None, None) => None,
        _ => return Err(AppError::invalid("location", "Both lat and lon are required")),
    };
    let client_id = query.client_id.unwrap_or_else(Uuid::new_v4);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state.hub, client_id, anchor)))
}

/// Serve one connection until either side closes it
async fn handle_socket(
    socket: WebSocket,
    hub: Arc<BroadcastHub>,
    client_id: ClientId,
    anchor: Option<Anchor>,
) {
    let mut machine = ConnectionMachine::without_retry();
    let (mut sender, mut receiver) = socket.split();
    let queue = hub.connect(client_id, anchor);

    let greeting = StreamMessage::Connection {
        status: "connected".to_string(),
        client_id,
        message: if hub.anchor(client_id).is_some() {
            "Subscribed to live air quality updates".to_string()
        } else {
            "Connected; send set_location or set_viewport to receive updates".to_string()
        },
        timestamp: Utc::now(),
    };
    if send_json(&mut sender, &greeting).await.is_err() {
        hub.release(client_id, &queue);
        return;
    }
    transition(&mut machine, ConnectionEvent::Opened, client_id);

    let mut heartbeat =
        tokio::time::interval(Duration::from_secs(hub.config().heartbeat_secs.max(1)));
    heartbeat.tick().await;

    loop {
        tokio::select! {
            pending = queue.recv() => {
                let Some(payload) = pending else {
                    // Hub closed the queue (shutdown or replaced connection)
                    transition(&mut machine, ConnectionEvent::Cancel, client_id);
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                };
                if sender.send(Message::Text(payload.to_string())).await.is_err() {
                    transition(&mut machine, ConnectionEvent::Dropped, client_id);
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if send_json(&mut sender, &StreamMessage::heartbeat()).await.is_err() {
                    transition(&mut machine, ConnectionEvent::Dropped, client_id);
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = apply_command(&hub, client_id, &text) {
                            if send_json(&mut sender, &reply).await.is_err() {
                                transition(&mut machine, ConnectionEvent::Dropped, client_id);
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::debug!("Ignoring binary WebSocket message");
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(client_id = %client_id, "Client closed WebSocket connection");
                        transition(&mut machine, ConnectionEvent::Dropped, client_id);
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(client_id = %client_id, error = %e, "WebSocket receive failed");
                        transition(&mut machine, ConnectionEvent::Dropped, client_id);
                        break;
                    }
                }
            }
        }
    }

    hub.release(client_id, &queue);
    tracing::debug!(
        client_id = %client_id,
        dropped = queue.dropped(),
        "WebSocket connection closed"
    );
}

/// Apply a client command; returns the reply to send, if any
pub fn apply_command(hub: &BroadcastHub, client_id: ClientId, text: &str) -> Option<StreamMessage> {
    let command: ClientCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse WebSocket command");
            return Some(StreamMessage::error("INVALID_COMMAND", e.to_string()));
        }
    };

    match command {
        ClientCommand::SetLocation { lat, lon } => {
            if let Err(msg) = validate_coordinates(lat, lon) {
                return Some(StreamMessage::error("INVALID_INPUT", msg));
            }
            hub.set_anchor(client_id, Anchor::Point(GeoPoint::new(lat, lon)));
            tracing::debug!(client_id = %client_id, lat, lon, "Client location set");
            None
        }
        ClientCommand::SetViewport {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        } => {
            let viewport = BoundingBox::new(min_lat, min_lon, max_lat, max_lon);
            if let Err(msg) = validate_bbox(&viewport) {
                return Some(StreamMessage::error("INVALID_INPUT", msg));
            }
            hub.set_anchor(client_id, Anchor::Viewport(viewport));
            tracing::debug!(client_id = %client_id, "Client viewport set");
            None
        }
        ClientCommand::Ping => Some(StreamMessage::heartbeat()),
    }
}

fn transition(machine: &mut ConnectionMachine, event: ConnectionEvent, client_id: ClientId) {
    match machine.handle(event) {
        Ok(state) => tracing::debug!(client_id = %client_id, state = ?state, "Connection state changed"),
        Err(e) => tracing::warn!(client_id = %client_id, error = %e, "Unexpected connection event"),
    }
}

async fn send_json<S>(sender: &mut S, message: &StreamMessage) -> Result<(), axum::Error>
where
    S: futures_util::Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(message).map_err(axum::Error::new)?;
    sender.send(Message::Text(json)).await
}
