//! services/api/src/web/state.rs
//!
//! Defines the application's shared and connection-specific states.

use crate::config::Config;
use bbq_core::{DashboardController, SampleStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SampleStore>,
    pub config: Arc<Config>,
}

impl AppState {
    /// A controller for one session, wired to the shared store.
    pub fn controller(&self, session_id: &str) -> DashboardController {
        DashboardController::new(self.store.clone(), session_id, self.config.smoothing)
    }
}

//=========================================================================================
// ConnectionState (Specific to One WebSocket Connection)
//=========================================================================================

/// The state for a single, active WebSocket connection.
#[derive(Default)]
pub struct ConnectionState {
    /// The session currently being watched, if any.
    pub session_id: Option<String>,
    /// A token to gracefully cancel the current dashboard task.
    pub cancellation_token: CancellationToken,
    pub dashboard_task: Option<JoinHandle<()>>,
}

impl ConnectionState {
    /// Stops the running dashboard task, if any, and arms a fresh token.
    pub fn stop(&mut self) {
        self.cancellation_token.cancel();
        if let Some(handle) = self.dashboard_task.take() {
            handle.abort();
        }
        self.cancellation_token = CancellationToken::new();
    }
}
