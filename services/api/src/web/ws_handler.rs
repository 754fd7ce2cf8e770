//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! It owns the connection's subscription and delegates view streaming to a
//! spawned dashboard task.

use crate::web::{
    dashboard_task::dashboard_process,
    protocol::{send_message, shared_sender, ClientMessage, ServerMessage, WsSender},
    state::{AppState, ConnectionState},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::stream::StreamExt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established.");

    // The sender is wrapped in an Arc<Mutex<>> to allow for shared mutable access across tasks.
    let (sender, mut receiver) = socket.split();
    let ws_sender = shared_sender(sender);
    let mut connection = ConnectionState::default();

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_text_message(text.as_str(), &app_state, &mut connection, &ws_sender).await;
            }
            Ok(Message::Close(_)) => {
                info!("Client sent close message.");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    // --- Cleanup ---
    connection.stop();
    info!("WebSocket connection closed.");
}

/// Handles one text frame from the client. Failures are reported to the
/// client; none of them end the connection.
pub async fn handle_text_message(
    text: &str,
    app_state: &Arc<AppState>,
    connection: &mut ConnectionState,
    ws_sender: &WsSender,
) {
    let reply = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Subscribe { session_id }) => {
            info!("Subscribing connection to session {}.", session_id);
            subscribe(app_state, connection, ws_sender, session_id).await;
            return;
        }
        Ok(ClientMessage::SetTarget { food_target }) => match connection.session_id.clone() {
            Some(session_id) => match app_state.store.update_target(&session_id, food_target).await {
                Ok(()) => ServerMessage::TargetUpdated {
                    session_id,
                    food_target,
                },
                Err(e) => {
                    error!("Failed to update target for session {}: {:?}", session_id, e);
                    ServerMessage::Error {
                        message: format!("Failed to update target: {}", e),
                    }
                }
            },
            None => ServerMessage::Error {
                message: "Subscribe to a session before setting its target.".to_string(),
            },
        },
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            ServerMessage::Error {
                message: format!("Unrecognized message: {}", e),
            }
        }
    };

    if let Err(e) = send_message(ws_sender, &reply).await {
        error!("Failed to send reply: {:?}", e);
    }
}

/// Replaces any running dashboard task with one for `session_id`.
async fn subscribe(
    app_state: &Arc<AppState>,
    connection: &mut ConnectionState,
    ws_sender: &WsSender,
    session_id: String,
) {
    connection.stop();
    connection.session_id = Some(session_id.clone());

    // Confirm before the first view can race ahead of it.
    let confirmation = ServerMessage::Subscribed {
        session_id: session_id.clone(),
    };
    if let Err(e) = send_message(ws_sender, &confirmation).await {
        error!("Failed to send subscription confirmation: {:?}", e);
    }

    let task = {
        let app_state = app_state.clone();
        let ws_sender = ws_sender.clone();
        let token = connection.cancellation_token.clone();
        tokio::spawn(async move {
            if let Err(e) = dashboard_process(app_state, session_id, ws_sender, token).await {
                error!("Dashboard process failed: {:?}", e);
            }
        })
    };
    connection.dashboard_task = Some(task);
}
