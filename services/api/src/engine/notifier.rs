//! services/api/src/engine/notifier.rs
//!
//! The notification engine. Every user-facing alert in the system funnels
//! through here: the engine suppresses repeats inside the dedupe window,
//! persists fresh records, and fans realtime events out to both of the
//! recipient's rooms. Persistence is authoritative - a failed publish is
//! logged and the stored notification stands.

use chrono::{Duration, Utc};
use readcircle_core::domain::{recipient_rooms, NewNotification, Notification};
use readcircle_core::ports::{EventPublisher, NotificationStore, PortResult};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// The outcome of a delivery attempt: either a fresh record, or the recent
/// duplicate that suppressed it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub notification: Notification,
    pub created: bool,
}

/// Creates, dedupes and fans out notifications. Collaborators are injected,
/// so tests can drive it with an in-memory store and a recording publisher.
#[derive(Clone)]
pub struct NotificationEngine {
    store: Arc<dyn NotificationStore>,
    publisher: Arc<dyn EventPublisher>,
    dedupe_window: Duration,
}

impl NotificationEngine {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        publisher: Arc<dyn EventPublisher>,
        dedupe_window_hours: i64,
    ) -> Self {
        Self {
            store,
            publisher,
            dedupe_window: Duration::hours(dedupe_window_hours),
        }
    }

    /// Delivers a notification unless an equivalent one (same recipient, same
    /// kind, same correlation key) was already created inside the rolling
    /// dedupe window. A suppressed delivery returns the existing record and
    /// publishes nothing.
    pub async fn create_if_not_exists(&self, new: NewNotification) -> PortResult<Delivery> {
        let since = Utc::now() - self.dedupe_window;
        if let Some(existing) = self
            .store
            .find_recent_notification(new.recipient_id, &new.kind, since, new.correlation.as_ref())
            .await?
        {
            debug!(
                recipient = %new.recipient_id,
                kind = %new.kind,
                "duplicate notification suppressed"
            );
            return Ok(Delivery {
                notification: existing,
                created: false,
            });
        }

        let created = self.store.insert_notification(new).await?;
        self.fan_out(
            created.recipient_id,
            "notification",
            notification_payload(&created),
        )
        .await;
        Ok(Delivery {
            notification: created,
            created: true,
        })
    }

    /// Flips one notification to read, scoped to the recipient, and tells the
    /// recipient's open connections about the change.
    pub async fn mark_read(&self, recipient_id: Uuid, id: Uuid) -> PortResult<Notification> {
        let updated = self.store.mark_notification_read(id, recipient_id).await?;
        self.fan_out(
            recipient_id,
            "notification:update",
            notification_payload(&updated),
        )
        .await;
        Ok(updated)
    }

    /// Marks everything unread as read and announces the sweep once, with the
    /// affected count, rather than per record.
    pub async fn mark_all_read(&self, recipient_id: Uuid) -> PortResult<u64> {
        let count = self.store.mark_all_notifications_read(recipient_id).await?;
        self.fan_out(
            recipient_id,
            "notification:markAllRead",
            json!({ "count": count }),
        )
        .await;
        Ok(count)
    }

    /// Publishes one event to both room spellings for a recipient. Failures
    /// are logged and swallowed.
    async fn fan_out(&self, recipient_id: Uuid, event: &str, payload: Value) {
        for room in recipient_rooms(recipient_id) {
            if let Err(e) = self.publisher.publish(&room, event, payload.clone()).await {
                warn!(room = %room, event, error = %e, "realtime publish failed");
            }
        }
    }
}

/// The frame payload for realtime notification events. The REST responses
/// carry the same field names through their own typed bodies.
pub fn notification_payload(n: &Notification) -> Value {
    json!({
        "id": n.id,
        "recipientId": n.recipient_id,
        "kind": n.kind,
        "message": n.message,
        "data": n.data,
        "correlation": n.correlation.map(|c| json!({
            "kind": c.kind.as_str(),
            "id": c.id,
        })),
        "read": n.read,
        "createdAt": n.created_at,
    })
}
