//! services/api/src/web/dashboard_task.rs
//!
//! This module contains the asynchronous "worker" function that streams live
//! dashboard views to one WebSocket client.

use crate::error::ApiError;
use crate::web::{
    protocol::{send_message, ServerMessage, WsSender},
    state::AppState,
};
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs the session's controller and forwards every view to the client.
///
/// Each view is a complete recomputation, so a view that is never sent is
/// simply superseded by the next one. The task ends when the token is
/// cancelled, the feeds close, or the socket stops accepting messages.
pub async fn dashboard_process(
    app_state: Arc<AppState>,
    session_id: String,
    ws_sender: WsSender,
    cancellation_token: CancellationToken,
) -> Result<(), ApiError> {
    info!("Dashboard task started for session {}.", session_id);
    let mut views = app_state.controller(&session_id).into_views();

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Dashboard task for session {} cancelled.", session_id);
                return Ok(());
            }
            next = views.next() => match next {
                Some(view) => {
                    debug!(
                        "Sending view for session {} ({} readings)",
                        session_id,
                        view.chart.len()
                    );
                    send_message(&ws_sender, &ServerMessage::View { view }).await?;
                }
                None => break,
            },
        }
    }

    info!("Dashboard feeds for session {} closed.", session_id);
    Ok(())
}
