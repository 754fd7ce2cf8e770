//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser dashboard and the
//! API server.

use crate::error::ApiError;
use axum::extract::ws::Message;
use bbq_core::DashboardView;
use futures::{Sink, SinkExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Anything that accepts outgoing socket messages. In production this is the
/// sending half of a split `WebSocket`.
pub type MessageSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

/// The sending half of a socket, shared between the control loop and the
/// dashboard task.
pub type WsSender = Arc<Mutex<MessageSink>>;

/// Wraps a sink for sharing between tasks.
pub fn shared_sender<S>(sink: S) -> WsSender
where
    S: Sink<Message, Error = axum::Error> + Send + 'static,
{
    Arc::new(Mutex::new(Box::pin(sink)))
}

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts (or switches) the live dashboard for a session.
    Subscribe { session_id: String },

    /// Sets the food target of the subscribed session.
    SetTarget { food_target: f64 },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the subscription. Views follow as the feeds report.
    Subscribed { session_id: String },

    /// A freshly computed dashboard. Replaces any previous view.
    View { view: DashboardView },

    /// Confirms a target write.
    TargetUpdated { session_id: String, food_target: f64 },

    /// A non-fatal error; the connection stays open.
    Error { message: String },
}

/// Serializes and sends one message.
pub async fn send_message(ws_sender: &WsSender, msg: &ServerMessage) -> Result<(), ApiError> {
    let json = serde_json::to_string(msg)?;
    ws_sender.lock().await.send(Message::Text(json.into())).await?;
    Ok(())
}
