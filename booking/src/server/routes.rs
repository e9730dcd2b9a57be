//! Router configuration for the chat webhook.

use super::handlers::{get_session, health_check, interact, metrics, open_session};
use super::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the complete router.
///
/// - `POST /interact`: feed a user action to a session
/// - `POST /sessions/:key`: open a session
/// - `GET /sessions/:key`: read a session's state
/// - `GET /health`, `GET /metrics`
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/interact", post(interact))
        .route("/sessions/:key", post(open_session).get(get_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
