use axum::{extract::State, http::StatusCode};
use std::sync::Arc;

use crate::collector::HealthState;

/// Application state shared across handlers
pub struct AppState {
    pub health: Arc<HealthState>,
}

// ============================================================================
// Health Check
// ============================================================================

/// Liveness check: 500 once the collector has gone three intervals without
/// a successful cycle. The body is returned either way.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, String) {
    let report = state.health.report();
    tracing::debug!(
        healthy = report.healthy,
        seconds_since_poll = report.seconds_since_poll,
        "Received health check"
    );

    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let body = format!(
        "scanwatch {}\nPolled last: [{}] seconds ago (poll interval {}s)\n",
        if report.healthy { "is healthy" } else { "is STALE" },
        report.seconds_since_poll,
        state.health.poll_interval().as_secs()
    );

    (status, body)
}
