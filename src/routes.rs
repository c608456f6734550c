//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (applied in order)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌───────────────────┐
//! │ Admission Control │ ← 429 if the client's window is full
//! └─────────┬─────────┘
//!           │
//!           ▼
//! ┌───────────────────┐
//! │    Request ID     │ ← Trace id, X-Request-Id header
//! └─────────┬─────────┘
//!           │
//!           ▼
//! ┌───────────────────┐
//! │      Tracing      │ ← HTTP request/response spans
//! └─────────┬─────────┘
//!           │
//!           ▼
//! ┌───────────────────┐
//! │ Error Translation │ ← Failures → JSON error envelope
//! └─────────┬─────────┘
//!           │
//!           ▼
//!        Handler
//! ```
//!
//! # Route Groups
//!
//! - `/health` - Health check
//! - `/api/v1.0/version` - Version information
//! - `/api/diagnostics/*` - Endpoints raising each failure kind

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::middleware::{AdmissionLayer, ErrorTranslationLayer, RequestIdLayer};
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
///
/// Admission control is installed when `state.limiter` is present. Failure
/// detail exposure follows the configured environment.
///
/// Serve with `into_make_service_with_connect_info::<SocketAddr>()` so client
/// identities resolve to peer addresses instead of `"unknown"`.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/v1.0/version", get(handlers::version))
        .route(
            "/api/diagnostics/throw-unauthorized",
            get(handlers::throw_unauthorized),
        )
        .route(
            "/api/diagnostics/throw-argument",
            get(handlers::throw_argument),
        )
        .route(
            "/api/diagnostics/throw-not-found",
            get(handlers::throw_not_found),
        )
        .route(
            "/api/diagnostics/throw-database",
            get(handlers::throw_database),
        )
        .route(
            "/api/diagnostics/throw-unexpected",
            get(handlers::throw_unexpected),
        )
        .route("/api/diagnostics/panic", get(handlers::throw_panic));

    // =========================================================================
    // Apply Middleware Stack (order matters - applied bottom to top)
    // =========================================================================

    // 1. Failure translation (innermost, closest to handlers)
    let details = config.environment.detail_policy();
    info!(environment = %config.environment, ?details, "Failure translation enabled");
    router = router.layer(
        ErrorTranslationLayer::new(details).with_trusted_proxies(state.trusted_proxies.clone()),
    );

    // 2. Tracing
    router = router.layer(TraceLayer::new_for_http());

    // 3. Request ID
    router = router.layer(RequestIdLayer::new());

    // 4. Admission control (if enabled) - applied last, runs first
    match &state.limiter {
        Some(limiter) => {
            info!(
                window_ms = config.rate_limit_window.as_millis(),
                max_requests = config.rate_limit_max_requests,
                trusted_proxies = config.trusted_proxies.len(),
                "Rate limiting enabled"
            );
            router = router.layer(AdmissionLayer::new(
                limiter.clone(),
                state.trusted_proxies.clone(),
            ));
        }
        None => info!("Rate limiting disabled (RATE_LIMIT_MAX_REQUESTS=0)"),
    }

    router.with_state(state)
}
