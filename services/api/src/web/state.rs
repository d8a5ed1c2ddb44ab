//! services/api/src/web/state.rs
//!
//! Defines the application's shared state: every store port, the notification
//! engine, the realtime hub and the sweeper, wired once at startup.

use crate::adapters::WsHub;
use crate::config::Config;
use crate::engine::{NotificationEngine, Sweeper};
use readcircle_core::domain::recipient_rooms;
use readcircle_core::ports::{
    BookStore, EventPublisher, HabitStore, JournalStore, LendingStore, ListingStore,
    NotificationStore, TokenService, UserStore,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub books: Arc<dyn BookStore>,
    pub listings: Arc<dyn ListingStore>,
    pub lendings: Arc<dyn LendingStore>,
    pub journal: Arc<dyn JournalStore>,
    pub habits: Arc<dyn HabitStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub notifier: NotificationEngine,
    pub publisher: Arc<dyn EventPublisher>,
    pub tokens: Arc<dyn TokenService>,
    pub hub: Arc<WsHub>,
    pub sweeper: Sweeper,
    pub config: Arc<Config>,
}

impl AppState {
    /// Fire-and-forget publish for handler-driven events. Failures are logged;
    /// the HTTP response never depends on realtime delivery.
    pub async fn publish_event(&self, room: &str, event: &str, payload: serde_json::Value) {
        if let Err(e) = self.publisher.publish(room, event, payload.clone()).await {
            warn!(room, event, error = %e, "realtime publish failed");
        }
    }

    /// Publishes one event to both room spellings of a user.
    pub async fn publish_to_user(&self, user_id: Uuid, event: &str, payload: serde_json::Value) {
        for room in recipient_rooms(user_id) {
            self.publish_event(&room, event, payload.clone()).await;
        }
    }
}
