use axum::Json;
use axum::extract::State;

use crate::models::VersionResponse;
use crate::state::AppState;

/// `GET /api/v1.0/version` - package version and deployment environment.
pub async fn version(State(state): State<AppState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        package_name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.to_string(),
    })
}
