//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use bbq_core::{DashboardView, NewReading, PortError, Session};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        ingest_reading_handler,
        list_sessions_handler,
        get_view_handler,
        set_target_handler,
    ),
    components(
        schemas(IngestRequest, SessionSummary, SetTargetRequest)
    ),
    tags(
        (name = "BBQ Dashboard API", description = "Reading ingestion and live cook dashboards.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// One reading posted by the pit controller. `session` is any JSON number;
/// see `session_key` for how it becomes a session id.
#[derive(Deserialize, Serialize, ToSchema, Debug, Clone, Copy)]
pub struct IngestRequest {
    pub session: f64,
    pub food_temp_f: f64,
    pub ambient_temp_f: f64,
    pub duty_pct: f64,
}

/// A session as listed on the index page.
#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub id: String,
    pub last_update: DateTime<Utc>,
    pub food_target: Option<f64>,
}

impl From<Session> for SessionSummary {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            last_update: session.last_update,
            food_target: session.food_target,
        }
    }
}

#[derive(Deserialize, Serialize, ToSchema, Debug, Clone, Copy)]
pub struct SetTargetRequest {
    pub food_target: f64,
}

/// The session id for a posted session number. Integral values render
/// without a fractional part (`1.0` and `1` are both session "1"); anything
/// else keeps its shortest decimal form.
pub fn session_key(session: f64) -> String {
    // 2^53: beyond this not every integer is representable.
    const EXACT_INT_LIMIT: f64 = 9_007_199_254_740_992.0;
    if session.fract() == 0.0 && session.abs() < EXACT_INT_LIMIT {
        format!("{}", session as i64)
    } else {
        session.to_string()
    }
}

/// Maps a port failure onto the HTTP status a client should see.
pub fn port_status(e: &PortError) -> StatusCode {
    match e {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Append a reading to a session, creating the session on first use.
#[utoipa::path(
    post,
    path = "/api/readings",
    request_body = IngestRequest,
    responses(
        (status = 200, description = "Reading stored", body = String),
        (status = 400, description = "Session number is not finite"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn ingest_reading_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> Result<&'static str, (StatusCode, String)> {
    if !req.session.is_finite() {
        warn!("Rejected reading with session number {}", req.session);
        return Err((StatusCode::BAD_REQUEST, "Session must be a finite number".to_string()));
    }
    let session_id = session_key(req.session);
    let reading = NewReading {
        ambient_temp_f: req.ambient_temp_f,
        food_temp_f: req.food_temp_f,
        duty_pct: req.duty_pct,
    };

    app_state
        .store
        .append_reading(&session_id, reading, Utc::now())
        .await
        .map_err(|e| {
            error!("Failed to append reading to session {}: {:?}", session_id, e);
            (port_status(&e), "Failed to store reading".to_string())
        })?;

    Ok("ok\n")
}

/// List all sessions, most recently updated first.
#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "All sessions", body = [SessionSummary]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_sessions_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<SessionSummary>>, (StatusCode, String)> {
    let sessions = app_state.store.list_sessions().await.map_err(|e| {
        error!("Failed to list sessions: {:?}", e);
        (port_status(&e), "Failed to list sessions".to_string())
    })?;
    Ok(Json(sessions.into_iter().map(SessionSummary::from).collect()))
}

/// The current dashboard for one session: derived series, estimate and
/// staleness notice.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    params(
        ("id" = String, Path, description = "The session id.")
    ),
    responses(
        (status = 200, description = "Dashboard view", content_type = "application/json"),
        (status = 404, description = "Session not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_view_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<DashboardView>, (StatusCode, String)> {
    let view = app_state
        .controller(&session_id)
        .snapshot(Utc::now())
        .await
        .map_err(|e| {
            error!("Failed to build view for session {}: {:?}", session_id, e);
            (port_status(&e), "Failed to build dashboard".to_string())
        })?;

    view.map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        )
    })
}

/// Set the food target temperature of a session.
#[utoipa::path(
    put,
    path = "/sessions/{id}/target",
    params(
        ("id" = String, Path, description = "The session id.")
    ),
    request_body = SetTargetRequest,
    responses(
        (status = 204, description = "Target updated"),
        (status = 400, description = "Target is not a finite number"),
        (status = 404, description = "Session not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn set_target_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<SetTargetRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    match app_state.store.update_target(&session_id, req.food_target).await {
        Ok(()) => {
            info!("Session {} target set to {}°F", session_id, req.food_target);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => {
            let status = port_status(&e);
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!("Failed to update target for session {}: {:?}", session_id, e);
            } else {
                warn!("Rejected target update for session {}: {}", session_id, e);
            }
            Err((status, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1.0, "1")]
    #[case(-3.0, "-3")]
    #[case(42.0, "42")]
    #[case(-0.0, "0")]
    #[case(1.5, "1.5")]
    #[case(1e16, "10000000000000000")]
    fn session_numbers_become_ids(#[case] session: f64, #[case] expected: &str) {
        assert_eq!(session_key(session), expected);
    }

    #[test]
    fn port_errors_map_to_statuses() {
        assert_eq!(port_status(&PortError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(port_status(&PortError::InvalidInput("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            port_status(&PortError::Unexpected("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
