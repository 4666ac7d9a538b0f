//! Live update fan-out integration tests
//!
//! Tests for the broadcast hub including:
//! - Relevance of updates to point and viewport anchors
//! - Bounded queues that drop the oldest message
//! - Subscription lifecycle and shutdown

use std::sync::Arc;
use std::time::Duration;

use hyperlocal_aq_backend::config::BroadcastConfig;
use hyperlocal_aq_backend::handlers::stream::apply_command;
use hyperlocal_aq_backend::services::{BroadcastHub, ClientQueue, PushOutcome};
use proptest::prelude::*;
use shared::{Anchor, BoundingBox, GeoPoint, UpdateKind};
use uuid::Uuid;

fn hub() -> BroadcastHub {
    BroadcastHub::new(BroadcastConfig::default())
}

fn delhi() -> GeoPoint {
    GeoPoint::new(28.61, 77.20)
}

fn decode(payload: &str) -> serde_json::Value {
    serde_json::from_str(payload).unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Updates reach nearby subscribers only
    #[test]
    fn test_update_reaches_nearby_subscriber_only() {
        let hub = hub();
        let queue = hub.connect(Uuid::new_v4(), Some(Anchor::Point(GeoPoint::new(28.6139, 77.2090))));

        let report = hub
            .publish(
                UpdateKind::AqiUpdate,
                GeoPoint::new(28.6200, 77.2100),
                serde_json::json!({ "version": 1 }),
            )
            .unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 0);

        let report = hub
            .publish(UpdateKind::AqiUpdate, GeoPoint::new(29.6, 78.5), serde_json::json!({ "version": 2 }))
            .unwrap();
        assert_eq!(report.delivered, 0);

        let message = decode(&queue.try_recv().unwrap());
        assert_eq!(message["type"], "aqi_update");
        assert_eq!(message["data"]["version"], 1);
        assert!(queue.is_empty());
        assert_eq!(hub.published_count(), 2);
    }

    /// A viewport receives updates centered inside it
    #[test]
    fn test_viewport_anchor() {
        let hub = hub();
        let viewport = BoundingBox::new(27.0, 76.0, 30.0, 79.0);
        let queue = hub.connect(Uuid::new_v4(), Some(Anchor::Viewport(viewport)));

        hub.publish(UpdateKind::HotspotUpdate, GeoPoint::new(29.9, 78.9), serde_json::json!({}))
            .unwrap();
        hub.publish(UpdateKind::HotspotUpdate, GeoPoint::new(19.07, 72.87), serde_json::json!({}))
            .unwrap();

        assert_eq!(queue.len(), 1);
    }

    /// Subscribers that have not said where they are receive nothing
    #[test]
    fn test_unanchored_subscriber_receives_nothing() {
        let hub = hub();
        let queue = hub.connect(Uuid::new_v4(), None);

        let report = hub
            .publish(UpdateKind::AqiUpdate, delhi(), serde_json::json!({}))
            .unwrap();

        assert_eq!(report.delivered, 0);
        assert!(queue.is_empty());
    }

    /// A full queue drops its oldest message
    #[test]
    fn test_full_queue_drops_oldest() {
        let hub = BroadcastHub::new(BroadcastConfig {
            queue_capacity: 3,
            ..BroadcastConfig::default()
        });
        let queue = hub.connect(Uuid::new_v4(), Some(Anchor::Point(delhi())));

        let mut dropped = 0;
        for seq in 0..5 {
            dropped += hub
                .publish(UpdateKind::AqiUpdate, delhi(), serde_json::json!({ "seq": seq }))
                .unwrap()
                .dropped;
        }

        assert_eq!(dropped, 2);
        assert_eq!(queue.dropped(), 2);
        let remaining: Vec<i64> = std::iter::from_fn(|| queue.try_recv())
            .map(|payload| decode(&payload)["data"]["seq"].as_i64().unwrap())
            .collect();
        assert_eq!(remaining, vec![2, 3, 4]);
    }

    /// Disconnecting closes the queue and stops delivery immediately
    #[tokio::test]
    async fn test_disconnect_closes_queue() {
        let hub = hub();
        let client_id = Uuid::new_v4();
        let queue = hub.connect(client_id, Some(Anchor::Point(delhi())));

        hub.disconnect(client_id);

        assert!(queue.is_closed());
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(queue.recv().await, None);
        let report = hub
            .publish(UpdateKind::AqiUpdate, delhi(), serde_json::json!({}))
            .unwrap();
        assert_eq!(report.delivered, 0);
    }

    /// A reconnect replaces the previous queue, and the old connection
    /// cannot evict its successor on release
    #[test]
    fn test_reconnect_supersedes_previous_queue() {
        let hub = hub();
        let client_id = Uuid::new_v4();
        let old = hub.connect(client_id, Some(Anchor::Point(delhi())));
        let new = hub.connect(client_id, Some(Anchor::Point(delhi())));

        assert!(old.is_closed());
        hub.release(client_id, &old);
        assert_eq!(hub.subscriber_count(), 1);

        hub.publish(UpdateKind::AqiUpdate, delhi(), serde_json::json!({}))
            .unwrap();
        assert_eq!(new.len(), 1);

        hub.release(client_id, &new);
        assert_eq!(hub.subscriber_count(), 0);
        assert!(new.is_closed());
    }

    /// A location seen on a REST call anchors later connections
    #[test]
    fn test_remembered_location_anchors_connection() {
        let hub = hub();
        let client_id = Uuid::new_v4();
        hub.remember_location(client_id, delhi());

        let queue = hub.connect(client_id, None);
        assert_eq!(hub.anchor(client_id), Some(Anchor::Point(delhi())));

        hub.publish(UpdateKind::AqiUpdate, delhi(), serde_json::json!({}))
            .unwrap();
        assert_eq!(queue.len(), 1);
    }

    /// An unanchored connection adopts a location seen later
    #[test]
    fn test_connected_client_adopts_remembered_location() {
        let hub = hub();
        let client_id = Uuid::new_v4();
        let _queue = hub.connect(client_id, None);

        hub.remember_location(client_id, delhi());
        assert_eq!(hub.anchor(client_id), Some(Anchor::Point(delhi())));

        hub.remember_location(client_id, GeoPoint::new(19.07, 72.87));
        assert_eq!(hub.anchor(client_id), Some(Anchor::Point(delhi())));
    }

    #[test]
    fn test_viewport_command_moves_subscription() {
        let hub = hub();
        let client_id = Uuid::new_v4();
        let queue = hub.connect(client_id, Some(Anchor::Point(GeoPoint::new(19.07, 72.87))));

        let reply = apply_command(
            &hub,
            client_id,
            r#"{"action":"set_viewport","min_lat":28.4,"min_lon":77.0,"max_lat":28.8,"max_lon":77.4}"#,
        );
        assert!(reply.is_none());

        hub.publish(UpdateKind::AqiUpdate, delhi(), serde_json::json!({}))
            .unwrap();
        assert_eq!(queue.len(), 1);
    }

    /// A queue closed by its connection is pruned on the next publish
    /// without touching other subscribers
    #[test]
    fn test_closed_queue_pruned_on_publish() {
        let hub = hub();
        let gone = Uuid::new_v4();
        let live = Uuid::new_v4();
        let gone_queue = hub.connect(gone, Some(Anchor::Point(delhi())));
        let live_queue = hub.connect(live, Some(Anchor::Point(delhi())));

        gone_queue.close();
        let report = hub
            .publish(UpdateKind::AqiUpdate, delhi(), serde_json::json!({}))
            .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(hub.anchor(gone), None);
        assert_eq!(live_queue.len(), 1);

        // Pruning releases only the queue that was closed
        let replacement = hub.connect(gone, Some(Anchor::Point(delhi())));
        hub.release(gone, &gone_queue);
        assert!(!replacement.is_closed());
        assert_eq!(hub.subscriber_count(), 2);
    }

    #[test]
    fn test_send_to_ignores_anchor() {
        let hub = hub();
        let client_id = Uuid::new_v4();
        let queue = hub.connect(client_id, None);

        assert!(hub.send_to(client_id, &shared::StreamMessage::heartbeat()));
        assert!(!hub.send_to(Uuid::new_v4(), &shared::StreamMessage::heartbeat()));
        assert_eq!(decode(&queue.try_recv().unwrap())["type"], "heartbeat");
    }

    /// Shutdown closes every subscription
    #[tokio::test]
    async fn test_close_all() {
        let hub = hub();
        let queues: Vec<_> = (0..3)
            .map(|_| hub.connect(Uuid::new_v4(), Some(Anchor::Point(delhi()))))
            .collect();

        hub.close_all();

        assert_eq!(hub.subscriber_count(), 0);
        for queue in &queues {
            assert_eq!(queue.recv().await, None);
        }
    }

    /// A waiting receiver wakes when a message is pushed
    #[tokio::test]
    async fn test_recv_wakes_on_push() {
        let queue = Arc::new(ClientQueue::new(4));
        let receiver = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.recv().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(queue.push("hello".into()), PushOutcome::Enqueued);

        let received = tokio::time::timeout(Duration::from_secs(1), receiver)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.as_deref(), Some("hello"));
    }

    #[test]
    fn test_push_after_close() {
        let queue = ClientQueue::new(1);
        assert_eq!(queue.push("a".into()), PushOutcome::Enqueued);
        assert_eq!(queue.push("b".into()), PushOutcome::DroppedOldest);
        queue.close();
        assert_eq!(queue.push("c".into()), PushOutcome::Closed);
        assert!(queue.is_empty());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A queue never holds more than its capacity and keeps the newest
        #[test]
        fn prop_queue_bounded(capacity in 1usize..16, pushes in 0usize..64) {
            let queue = ClientQueue::new(capacity);
            for i in 0..pushes {
                queue.push(i.to_string().into());
            }

            prop_assert_eq!(queue.len(), pushes.min(capacity));
            prop_assert_eq!(queue.dropped() as usize, pushes.saturating_sub(capacity));
            if pushes > 0 {
                let expected_first = pushes.saturating_sub(capacity).to_string();
                let first = queue.try_recv();
                prop_assert_eq!(first.as_deref(), Some(expected_first.as_str()));
            }
        }

        /// Point relevance is symmetric planar distance
        #[test]
        fn prop_point_relevance_matches_distance(
            lat in 20.0f64..35.0,
            lon in 70.0f64..85.0,
            dlat in -1.0f64..1.0,
            dlon in -1.0f64..1.0,
        ) {
            let hub = hub();
            let anchor = GeoPoint::new(lat, lon);
            let center = GeoPoint::new(lat + dlat, lon + dlon);

            let relevant = hub.is_relevant(&Anchor::Point(anchor), &center);
            let distance = (dlat * dlat + dlon * dlon).sqrt();
            if distance < 0.49 {
                prop_assert!(relevant);
            }
            if distance > 0.51 {
                prop_assert!(!relevant);
            }
        }
    }
}
