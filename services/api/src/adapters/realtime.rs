//! services/api/src/adapters/realtime.rs
//!
//! The in-process realtime hub. WebSocket connections register per-room
//! senders here, and the `EventPublisher` port implementation fans frames out
//! to every member of a room. Delivery is fire-and-forget: a room with no
//! members swallows the event, and senders whose connection has gone away are
//! pruned on the next send.

use async_trait::async_trait;
use dashmap::DashMap;
use readcircle_core::ports::{EventPublisher, PortResult};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use uuid::Uuid;

/// Every server-to-client message is one of these envelopes, whether it comes
/// from a room publish or directly from the connection's own handler.
pub fn encode_frame(event: &str, payload: &Value) -> String {
    json!({ "event": event, "payload": payload }).to_string()
}

/// A room registry keyed by room name. Each member is one WebSocket
/// connection, identified by a per-connection id so the same user can hold
/// several tabs open.
#[derive(Default)]
pub struct WsHub {
    rooms: DashMap<String, HashMap<Uuid, UnboundedSender<String>>>,
}

impl WsHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection's sender in a room.
    pub fn join(&self, room: &str, conn_id: Uuid, sender: UnboundedSender<String>) {
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(conn_id, sender);
    }

    /// Removes a connection from one room, dropping the room when it empties.
    pub fn leave(&self, room: &str, conn_id: Uuid) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(&conn_id);
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());
    }

    /// Removes a connection from every room it joined. Called on disconnect.
    pub fn leave_all(&self, conn_id: Uuid) {
        self.rooms.retain(|_, members| {
            members.remove(&conn_id);
            !members.is_empty()
        });
    }

    pub fn room_size(&self, room: &str) -> usize {
        self.rooms.get(room).map(|members| members.len()).unwrap_or(0)
    }

    /// Sends an already-encoded frame to every member of a room, pruning
    /// members whose receiving task has gone away.
    pub fn send_to_room(&self, room: &str, frame: &str) -> usize {
        let mut delivered = 0;
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.retain(|_, sender| match sender.send(frame.to_string()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                // The connection task dropped its receiver without leaving.
                Err(_) => false,
            });
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());
        delivered
    }
}

#[async_trait]
impl EventPublisher for WsHub {
    async fn publish(&self, room: &str, event: &str, payload: Value) -> PortResult<()> {
        let frame = encode_frame(event, &payload);
        let delivered = self.send_to_room(room, &frame);
        debug!(room, event, delivered, "published realtime event");
        Ok(())
    }
}
