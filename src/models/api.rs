use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error body written by the failure translation boundary.
///
/// `message` is always the public message of the matched failure category;
/// `details` is only present outside production.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status_code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub trace_id: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    /// Whether admission control is active
    pub rate_limiting: bool,
    /// Client identities currently held by the limiter
    pub tracked_identities: usize,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

/// Build and environment information.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    pub package_name: String,
    pub version: String,
    pub environment: String,
}

/// Query string of the invalid-argument demonstration endpoint.
#[derive(Debug, Deserialize)]
pub struct ValueQuery {
    #[serde(default)]
    pub value: i64,
}

/// Query string of the not-found demonstration endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeQuery {
    #[serde(default)]
    pub employee_id: i64,
}
