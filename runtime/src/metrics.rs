//! Prometheus metrics for observability and monitoring.
//!
//! Metric groups:
//! - Session store (actions reduced, commands executed, feedback-loop cutoffs)
//! - Calendar aggregation (per-room fetch outcomes, build latency)
//! - Booking outcomes (confirmed, rejected by reason)
//! - Retries against the booking service
//!
//! # Example
//!
//! ```rust,no_run
//! use roombook_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut recorder = MetricsRecorder::new();
//! recorder.install()?;
//!
//! // Expose `recorder.render()` from an HTTP handler
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, histogram};

/// Errors raised while installing the Prometheus recorder
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Exporter configuration was rejected
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// A global recorder could not be installed
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installs the global Prometheus recorder and renders its snapshot.
///
/// The recorder does not bind a port of its own; the web server exposes
/// [`MetricsRecorder::render`] on `GET /metrics`.
#[derive(Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Create a recorder that has not been installed yet
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe all metrics and install the global recorder.
    ///
    /// A second installation in the same process is tolerated (tests create
    /// several servers); in that case no handle is kept and `render` yields
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be configured or installed.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus recorder installed");
                Ok(())
            },
            Err(e) => {
                let message = e.to_string();
                if message.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(message))
                }
            },
        }
    }

    /// Render the current metrics in Prometheus text format
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    // Session store
    describe_counter!(
        "session_actions_processed_total",
        "Total number of actions reduced by the session store"
    );
    describe_counter!(
        "session_commands_executed_total",
        "Total number of commands executed on behalf of sessions"
    );
    describe_counter!(
        "session_feedback_limit_total",
        "Number of times a feedback loop was cut off at its step limit"
    );
    describe_histogram!(
        "session_send_duration_seconds",
        "Time taken to process one user action end to end"
    );

    // Calendar
    describe_counter!(
        "calendar_room_fetch_total",
        "Per-room busy-time fetches, labelled by outcome"
    );
    describe_histogram!(
        "calendar_build_duration_seconds",
        "Time taken to build a calendar across all rooms"
    );

    // Booking
    describe_counter!("bookings_confirmed_total", "Total number of confirmed bookings");
    describe_counter!(
        "bookings_rejected_total",
        "Bookings refused before reaching the service, labelled by reason"
    );

    // Retry
    describe_counter!("retry_attempts_total", "Total number of retry attempts");
    describe_counter!(
        "retry_exhausted_total",
        "Operations that failed after exhausting their retries"
    );
}

/// Session store metrics
pub struct SessionMetrics;

impl SessionMetrics {
    /// Record one reduced action
    pub fn record_action() {
        counter!("session_actions_processed_total").increment(1);
    }

    /// Record one executed command
    pub fn record_command(kind: &'static str) {
        counter!("session_commands_executed_total", "command" => kind).increment(1);
    }

    /// Record a feedback loop that hit its step limit
    pub fn record_feedback_limit() {
        counter!("session_feedback_limit_total").increment(1);
    }

    /// Record the end-to-end duration of a `send`
    pub fn record_send(duration: Duration) {
        histogram!("session_send_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Calendar aggregation metrics
pub struct CalendarMetrics;

impl CalendarMetrics {
    /// Record the outcome of one per-room fetch (`ok`, `error`, `timeout`, `panic`)
    pub fn record_fetch(outcome: &'static str) {
        counter!("calendar_room_fetch_total", "outcome" => outcome).increment(1);
    }

    /// Record how long a full calendar build took
    pub fn record_build(duration: Duration) {
        histogram!("calendar_build_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Booking outcome metrics
pub struct BookingMetrics;

impl BookingMetrics {
    /// Record a confirmed booking
    pub fn record_confirmed() {
        counter!("bookings_confirmed_total").increment(1);
    }

    /// Record a booking refused before any service call
    pub fn record_rejected(reason: &'static str) {
        counter!("bookings_rejected_total", "reason" => reason).increment(1);
    }
}

/// Retry metrics
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a retry attempt
    pub fn record_attempt() {
        counter!("retry_attempts_total").increment(1);
    }

    /// Record an operation that ran out of retries
    pub fn record_exhausted() {
        counter!("retry_exhausted_total").increment(1);
    }
}
