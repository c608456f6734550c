//! # Request Guard
//!
//! The request-pipeline core of an HTTP service, built on Axum and Tower:
//!
//! - **Admission Control**: per-client sliding-window rate limiting with
//!   sharded state, rejecting over-budget clients with 429
//! - **Failure Translation**: a single recovery boundary mapping any handler
//!   failure (typed errors, foreign errors, panics) to a closed set of JSON
//!   error envelopes with structured diagnostic logging
//! - **Observability**: trace identifiers, structured logging, Prometheus metrics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  AdmissionLayer ── SlidingWindowLimiter (DashMap shards)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RequestIdLayer → TraceLayer                                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ErrorTranslationLayer ── taxonomy::classify                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, version, diagnostics)                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//!
//! use request_guard::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let state = AppState::new(config.clone())?;
//!     let app = build_router(state);
//!
//!     let listener = tokio::net::TcpListener::bind(config.server_addr()).await?;
//!     axum::serve(
//!         listener,
//!         app.into_make_service_with_connect_info::<SocketAddr>(),
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Raising Failures
//!
//! ```rust
//! use request_guard::failure::{HandlerResult, NotFound};
//!
//! async fn get_employee() -> HandlerResult<String> {
//!     Err(NotFound("Employee with ID 7 was not found.".into()).into())
//! }
//! ```

pub mod config;
pub mod error;
pub mod failure;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod taxonomy;
pub mod utils;

// Re-exports for convenience
pub use config::{Config, Environment, LogFormat};
pub use error::{AppError, AppResult};
pub use failure::{Failure, HandlerResult};
pub use limiter::{RateLimiterConfig, SlidingWindowLimiter};
pub use routes::build_router;
pub use state::AppState;
pub use taxonomy::{FailureCategory, classify};
