//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the
//! API server.
//!
//! Server-to-client traffic is always an `{event, payload}` JSON frame (see
//! `adapters::realtime::encode_frame`); this module covers the much smaller
//! client-to-server side plus the topic names clients may subscribe to.

use serde::Deserialize;

//=========================================================================================
// Broadcast Topics
//=========================================================================================

/// Marketplace-wide listing events. Any authenticated connection may
/// subscribe; per-user rooms are joined automatically and are not
/// subscribable.
pub const LISTINGS_TOPIC: &str = "listings";

/// Whether a topic name is open for explicit subscription. Everything else is
/// a per-user room, and letting clients name those would let them read other
/// users' notifications.
pub fn is_broadcast_topic(topic: &str) -> bool {
    topic == LISTINGS_TOPIC
}

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Joins a broadcast topic. Acknowledged with a `subscribed` frame.
    Subscribe { topic: String },

    /// Leaves a broadcast topic. Acknowledged with an `unsubscribed` frame.
    Unsubscribe { topic: String },
}
