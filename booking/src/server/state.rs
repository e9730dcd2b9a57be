//! Shared state of the webhook server.

use crate::app::RoombookApp;
use roombook_runtime::metrics::MetricsRecorder;
use std::sync::Arc;

/// Everything handlers need, cloned per request
#[derive(Clone)]
pub struct AppState {
    /// Booking engine
    pub app: RoombookApp,
    /// Prometheus snapshot source for `GET /metrics`
    pub metrics: Arc<MetricsRecorder>,
}

impl AppState {
    /// Create the server state
    #[must_use]
    pub const fn new(app: RoombookApp, metrics: Arc<MetricsRecorder>) -> Self {
        Self { app, metrics }
    }
}
