//! Health endpoint.
//!
//! `GET /health` always returns 200 while the process is serving, with the
//! admission-control state in the body. It sits behind the same middleware as
//! every other route, so a client that exhausted its budget gets 429 here too.

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use tracing::instrument;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "environment": "production",
///   "rateLimiting": true,
///   "trackedIdentities": 12,
///   "uptimeSeconds": 3600,
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.to_string(),
        rate_limiting: state.limiter.is_some(),
        tracked_identities: state.tracked_identities(),
        uptime_seconds: state.uptime_seconds(),
        timestamp: Utc::now(),
    })
}
