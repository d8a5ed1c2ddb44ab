//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! A connection authenticates with a `?token=` query parameter (browser
//! WebSocket clients cannot set an Authorization header), is joined to both
//! of its user's rooms, and may then subscribe to broadcast topics.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use readcircle_core::domain::{recipient_rooms, AuthClaims};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::realtime::encode_frame;
use crate::error::ApiError;
use crate::web::protocol::{is_broadcast_topic, ClientMessage};
use crate::web::state::AppState;

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// The handler for upgrading HTTP requests to WebSocket connections. The
/// token is checked before the upgrade so a bad credential costs one HTTP
/// round trip, not a socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
) -> Result<Response, ApiError> {
    let token = query
        .token
        .ok_or_else(|| ApiError::unauthorized("Missing token query parameter"))?;
    let claims = app_state.tokens.verify(&token)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, app_state, claims)))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, claims: AuthClaims) {
    let conn_id = Uuid::new_v4();
    info!(user = %claims.username, %conn_id, "websocket connected");

    // --- 1. Join the user's rooms ---
    // Frames published to any room this connection belongs to arrive on `frames`.
    let (tx, mut frames) = unbounded_channel::<String>();
    for room in recipient_rooms(claims.user_id) {
        app_state.hub.join(&room, conn_id, tx.clone());
    }

    // --- 2. Pump frames out and client messages in until either side closes ---
    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                if sender.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = apply_client_message(&app_state, conn_id, &tx, &text)
                        {
                            if sender.send(Message::Text(reply.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // Ping/pong keepalives are answered by the protocol layer.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(%conn_id, error = %e, "websocket receive failed");
                        break;
                    }
                }
            }
        }
    }

    // --- 3. Tear down every room membership, including subscriptions ---
    app_state.hub.leave_all(conn_id);
    info!(%conn_id, "websocket disconnected");
}

/// Applies one client message and returns the ack or error frame to send
/// back. Topic names are restricted to the broadcast set; per-user rooms can
/// never be subscribed by name.
fn apply_client_message(
    app_state: &AppState,
    conn_id: Uuid,
    tx: &UnboundedSender<String>,
    text: &str,
) -> Option<String> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Subscribe { topic }) => {
            if !is_broadcast_topic(&topic) {
                return Some(encode_frame(
                    "error",
                    &json!({ "message": format!("Unknown topic: {topic}") }),
                ));
            }
            app_state.hub.join(&topic, conn_id, tx.clone());
            debug!(%conn_id, topic, "subscribed to broadcast topic");
            Some(encode_frame("subscribed", &json!({ "topic": topic })))
        }
        Ok(ClientMessage::Unsubscribe { topic }) => {
            if !is_broadcast_topic(&topic) {
                return Some(encode_frame(
                    "error",
                    &json!({ "message": format!("Unknown topic: {topic}") }),
                ));
            }
            app_state.hub.leave(&topic, conn_id);
            debug!(%conn_id, topic, "unsubscribed from broadcast topic");
            Some(encode_frame("unsubscribed", &json!({ "topic": topic })))
        }
        Err(e) => {
            warn!(%conn_id, error = %e, "unparseable websocket message");
            Some(encode_frame(
                "error",
                &json!({ "message": "Unrecognised message" }),
            ))
        }
    }
}
