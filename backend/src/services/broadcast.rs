//! Live update fan-out
//!
//! Every connected client owns a bounded queue. Publishing never waits on a
//! client: when a queue is full its oldest message is dropped. Messages are
//! serialized once per publish and shared between queues.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use shared::{Anchor, GeoPoint, StreamMessage, UpdateKind};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::config::BroadcastConfig;
use crate::error::{AppError, AppResult};

pub type ClientId = Uuid;

/// Serialized message shared by every queue it was delivered to
pub type Payload = Arc<str>;

/// Known client locations kept from REST activity
const MAX_KNOWN_LOCATIONS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued,
    /// Enqueued after evicting the oldest pending message
    DroppedOldest,
    Closed,
}

#[derive(Default)]
struct QueueInner {
    messages: VecDeque<Payload>,
    dropped: u64,
    closed: bool,
}

/// Bounded single-consumer queue for one client
pub struct ClientQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    capacity: usize,
}

impl ClientQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, message: Payload) -> PushOutcome {
        let outcome = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return PushOutcome::Closed;
            }
            let outcome = if inner.messages.len() >= self.capacity {
                inner.messages.pop_front();
                inner.dropped += 1;
                PushOutcome::DroppedOldest
            } else {
                PushOutcome::Enqueued
            };
            inner.messages.push_back(message);
            outcome
        };
        self.notify.notify_one();
        outcome
    }

    /// Next message, waiting if none is pending. `None` once closed.
    pub async fn recv(&self) -> Option<Payload> {
        loop {
            {
                let mut inner = self.inner.lock();
                if inner.closed {
                    return None;
                }
                if let Some(message) = inner.messages.pop_front() {
                    return Some(message);
                }
            }
            self.notify.notified().await;
        }
    }

    pub fn try_recv(&self) -> Option<Payload> {
        self.inner.lock().messages.pop_front()
    }

    pub fn close(&self) {
        {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.messages.clear();
        }
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages evicted so far because the client fell behind
    pub fn dropped(&self) -> u64 {
        self.inner.lock().dropped
    }
}

struct Subscription {
    anchor: Option<Anchor>,
    queue: Arc<ClientQueue>,
}

/// Result of one publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
}

pub struct BroadcastHub {
    config: BroadcastConfig,
    subscriptions: RwLock<HashMap<ClientId, Subscription>>,
    known_locations: Mutex<HashMap<ClientId, (GeoPoint, Instant)>>,
    published: AtomicU64,
}

impl BroadcastHub {
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            config,
            subscriptions: RwLock::new(HashMap::new()),
            known_locations: Mutex::new(HashMap::new()),
            published: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    /// Register a connected client. Without an explicit anchor the client's
    /// last known REST location is used, if any.
    pub fn connect(&self, client_id: ClientId, anchor: Option<Anchor>) -> Arc<ClientQueue> {
        let anchor = anchor.or_else(|| self.known_location(client_id).map(Anchor::Point));
        let queue = Arc::new(ClientQueue::new(self.config.queue_capacity));

        let previous = self.subscriptions.write().insert(
            client_id,
            Subscription {
                anchor,
                queue: queue.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.queue.close();
        }

        tracing::info!(client_id = %client_id, anchored = anchor.is_some(), "Client subscribed");
        queue
    }

    /// Remove a client; its queue is closed immediately
    pub fn disconnect(&self, client_id: ClientId) {
        if let Some(subscription) = self.subscriptions.write().remove(&client_id) {
            subscription.queue.close();
            tracing::info!(client_id = %client_id, "Client unsubscribed");
        }
    }

    /// Remove a client only if `queue` is still its current subscription, so
    /// a superseded connection cannot evict its replacement
    pub fn release(&self, client_id: ClientId, queue: &Arc<ClientQueue>) {
        let mut subscriptions = self.subscriptions.write();
        let current = subscriptions
            .get(&client_id)
            .is_some_and(|s| Arc::ptr_eq(&s.queue, queue));
        if current {
            subscriptions.remove(&client_id);
            tracing::info!(client_id = %client_id, "Client unsubscribed");
        }
        drop(subscriptions);
        queue.close();
    }

    /// Change where a connected client is looking
    pub fn set_anchor(&self, client_id: ClientId, anchor: Anchor) -> bool {
        match self.subscriptions.write().get_mut(&client_id) {
            Some(subscription) => {
                subscription.anchor = Some(anchor);
                true
            }
            None => false,
        }
    }

    pub fn anchor(&self, client_id: ClientId) -> Option<Anchor> {
        self.subscriptions
            .read()
            .get(&client_id)
            .and_then(|s| s.anchor)
    }

    /// Record a location seen on a REST call. A connected client without an
    /// anchor adopts it.
    pub fn remember_location(&self, client_id: ClientId, location: GeoPoint) {
        {
            let mut known = self.known_locations.lock();
            if known.len() >= MAX_KNOWN_LOCATIONS && !known.contains_key(&client_id) {
                let oldest = known
                    .iter()
                    .min_by_key(|(_, (_, seen))| *seen)
                    .map(|(id, _)| *id);
                if let Some(oldest) = oldest {
                    known.remove(&oldest);
                }
            }
            known.insert(client_id, (location, Instant::now()));
        }

        if let Some(subscription) = self.subscriptions.write().get_mut(&client_id) {
            if subscription.anchor.is_none() {
                subscription.anchor = Some(Anchor::Point(location));
            }
        }
    }

    pub fn known_location(&self, client_id: ClientId) -> Option<GeoPoint> {
        self.known_locations
            .lock()
            .get(&client_id)
            .map(|(location, _)| *location)
    }

    /// Whether an update centered at `center` concerns `anchor`
    pub fn is_relevant(&self, anchor: &Anchor, center: &GeoPoint) -> bool {
        let radius = self.config.relevance_radius_deg;
        match anchor {
            Anchor::Point(point) => point.planar_distance_deg(center) <= radius,
            Anchor::Viewport(bbox) => {
                bbox.contains(center) || bbox.center().planar_distance_deg(center) <= radius
            }
        }
    }

    /// Deliver an update to every subscriber it is relevant to. Clients
    /// without an anchor receive nothing.
    pub fn publish(
        &self,
        kind: UpdateKind,
        center: GeoPoint,
        data: serde_json::Value,
    ) -> AppResult<PublishReport> {
        let message = StreamMessage::update(kind, center, data);
        let payload: Payload = serde_json::to_string(&message)
            .map_err(|e| AppError::Internal(format!("Failed to encode update: {}", e)))?
            .into();

        let mut report = PublishReport::default();
        let mut closed = Vec::new();
        {
            let subscriptions = self.subscriptions.read();
            for (client_id, subscription) in subscriptions.iter() {
                let Some(anchor) = &subscription.anchor else {
                    continue;
                };
                if !self.is_relevant(anchor, &center) {
                    continue;
                }
                match subscription.queue.push(payload.clone()) {
                    PushOutcome::Enqueued => report.delivered += 1,
                    PushOutcome::DroppedOldest => {
                        report.delivered += 1;
                        report.dropped += 1;
                    }
                    PushOutcome::Closed => closed.push((*client_id, subscription.queue.clone())),
                }
            }
        }

        // A client may have reconnected since the read lock was released
        for (client_id, queue) in closed {
            self.release(client_id, &queue);
        }
        if report.dropped > 0 {
            tracing::warn!(kind = ?kind, dropped = report.dropped, "Slow clients lost queued updates");
        }
        self.published.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(kind = ?kind, delivered = report.delivered, "Update published");

        Ok(report)
    }

    /// Queue a message for one client regardless of its anchor
    pub fn send_to(&self, client_id: ClientId, message: &StreamMessage) -> bool {
        let Ok(json) = serde_json::to_string(message) else {
            return false;
        };
        match self.subscriptions.read().get(&client_id) {
            Some(subscription) => subscription.queue.push(json.into()) != PushOutcome::Closed,
            None => false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Close every subscription; used on shutdown
    pub fn close_all(&self) {
        let drained: Vec<Subscription> = self
            .subscriptions
            .write()
            .drain()
            .map(|(_, subscription)| subscription)
            .collect();
        for subscription in &drained {
            subscription.queue.close();
        }
        tracing::info!(closed = drained.len(), "Closed all live subscriptions");
    }
}
