use std::net::SocketAddr;
use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use request_guard::{AppState, Config, LogFormat, build_router, metrics, utils};

#[tokio::main]
async fn main() -> ExitCode {
    // Configuration decides the log format, so it is loaded first
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info", LogFormat::Text);
            error!("Configuration error: {e}");
            return ExitCode::from(e.exit_code() as u8);
        }
    };
    init_tracing(&config.log_level, config.log_format);

    info!("Starting Request Guard v{}", env!("CARGO_PKG_VERSION"));

    match run(config).await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Install the global subscriber. `RUST_LOG` syntax applies to `filter`.
fn init_tracing(filter: &str, format: LogFormat) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Run the application, returning an exit code on error.
async fn run(config: Config) -> Result<(), exitcode::ExitCode> {
    info!(
        host = %config.host,
        port = %config.port,
        environment = %config.environment,
        "Configuration loaded"
    );

    // Metrics exporter
    match config.metrics_addr() {
        Some(metrics_addr) => {
            metrics::init_metrics(metrics_addr).map_err(|e| {
                error!("Failed to start metrics exporter: {e}");
                e.exit_code()
            })?;
        }
        None => warn!("Metrics export disabled (METRICS_PORT=0)"),
    }

    // Build application state and router
    let state = AppState::new(config.clone()).map_err(|e| {
        error!("Failed to initialize application state: {e}");
        e.exit_code()
    })?;
    let app = build_router(state.clone());

    // Start server
    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Server listening on http://{addr}");
    info!("API endpoints:");
    info!("  GET  /health                                - Health check");
    info!("  GET  /api/v1.0/version                      - Version information");
    info!("  GET  /api/diagnostics/throw-unauthorized    - Raise 401");
    info!("  GET  /api/diagnostics/throw-argument        - Raise 400 for ?value<0");
    info!("  GET  /api/diagnostics/throw-not-found       - Raise 404");
    info!("  GET  /api/diagnostics/throw-database        - Raise 409");
    info!("  GET  /api/diagnostics/throw-unexpected      - Raise 500");
    info!("  GET  /api/diagnostics/panic                 - Panic in handler");

    // Peer addresses feed client identity resolution
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(utils::shutdown_signal())
    .await
    .map_err(|e| {
        error!("Server error: {e}");
        exitcode::SOFTWARE
    })?;

    // Gracefully shutdown background tasks
    info!("HTTP server stopped, shutting down background tasks...");
    state.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}
