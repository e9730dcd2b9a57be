//! Webhook handlers.
//!
//! The chat platform posts every button click or form submission to
//! `POST /interact`; the response carries the session's new state, which the
//! platform side renders.

use super::error::AppError;
use super::state::AppState;
use crate::interaction::{Action, InteractionState, UserAction, Values};
use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

/// `POST /interact` body
#[derive(Debug, Deserialize)]
pub struct InteractRequest {
    /// Chat user the action comes from
    pub session_key: String,
    /// Which button or form was used
    pub action_id: String,
    /// Submitted form values
    #[serde(default)]
    pub values: Values,
}

/// Session state returned by every session endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    /// Session the state belongs to
    pub session_key: String,
    /// Current state
    pub state: InteractionState,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

fn session_key(raw: &str) -> Result<&str, AppError> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(AppError::bad_request("session_key is required"));
    }
    Ok(key)
}

/// `POST /interact`
///
/// # Errors
///
/// 400 for a blank session key or action id, 5xx when the session store fails.
pub async fn interact(
    State(state): State<AppState>,
    Json(request): Json<InteractRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let key = session_key(&request.session_key)?;
    if request.action_id.trim().is_empty() {
        return Err(AppError::bad_request("action_id is required"));
    }

    tracing::debug!(session = key, action = %request.action_id, "Interaction received");
    let action = Action::User(UserAction {
        action_id: request.action_id.trim().to_string(),
        values: request.values,
    });
    let new_state = state.app.interact(key, action).await?;

    Ok(Json(SessionResponse {
        session_key: key.to_string(),
        state: new_state,
    }))
}

/// `POST /sessions/:key`: open the session on `Login` or `Landing`
///
/// # Errors
///
/// 400 for a blank key, 5xx when the session store fails.
pub async fn open_session(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let key = session_key(&key)?;
    let opened = state.app.open_session(key).await?;
    tracing::info!(session = key, state = opened.name(), "Session opened");
    Ok(Json(SessionResponse {
        session_key: key.to_string(),
        state: opened,
    }))
}

/// `GET /sessions/:key`
///
/// # Errors
///
/// 404 for a session never opened, 5xx when the session store fails.
pub async fn get_session(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let key = session_key(&key)?;
    let current = state
        .app
        .session(key)
        .await?
        .ok_or_else(|| AppError::not_found("Session", key))?;
    Ok(Json(SessionResponse {
        session_key: key.to_string(),
        state: current,
    }))
}

/// `GET /health`
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// `GET /metrics` in Prometheus text format
///
/// # Errors
///
/// 503 when no recorder is installed in this process.
#[allow(clippy::unused_async)]
pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .render()
        .ok_or_else(|| AppError::unavailable("metrics recorder not installed"))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
