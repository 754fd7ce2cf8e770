//! crates/bbq_core/src/ports.rs
//!
//! Defines the service contract for the sample store. The trait forms the
//! boundary of the hexagonal architecture: the dashboard core only talks to
//! this port, never to a concrete database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::domain::{NewReading, Sample, Session};
use crate::feed::Change;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait SampleStore: Send + Sync {
    // --- Ingestion ---

    /// Upserts the session, sets its `last_update` to `at` and appends the
    /// reading stamped with the same instant.
    async fn append_reading(
        &self,
        session_id: &str,
        reading: NewReading,
        at: DateTime<Utc>,
    ) -> PortResult<Sample>;

    // --- Session Metadata ---
    async fn find_session(&self, session_id: &str) -> PortResult<Option<Session>>;

    /// All sessions, most recently updated first.
    async fn list_sessions(&self) -> PortResult<Vec<Session>>;

    async fn update_target(&self, session_id: &str, food_target: f64) -> PortResult<()>;

    // --- Reading Log ---

    /// The full reading log, ascending by time. Malformed documents are skipped.
    async fn read_all(&self, session_id: &str) -> PortResult<Vec<Sample>>;

    // --- Subscription ---

    /// Raw change notifications. Use the helpers in `feed` to turn these into
    /// complete-state feeds.
    fn changes(&self) -> broadcast::Receiver<Change>;
}

/// Rejects targets that would poison every downstream estimate.
pub fn validate_target(food_target: f64) -> PortResult<()> {
    if food_target.is_finite() {
        Ok(())
    } else {
        Err(PortError::InvalidInput(format!(
            "food target must be a finite number, got {}",
            food_target
        )))
    }
}
