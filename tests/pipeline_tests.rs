//! In-process tests of the full middleware pipeline.
//!
//! Requests are driven through the router with `tower::ServiceExt::oneshot`,
//! with `ConnectInfo` inserted by hand to stand in for the TCP peer.
//!
//! Run with: `cargo test --test pipeline_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request, StatusCode, header};
use http_body_util::BodyExt;
use request_guard::config::{Config, Environment};
use request_guard::middleware::REJECTION_BODY;
use request_guard::models::{ErrorEnvelope, HealthResponse, VersionResponse};
use request_guard::{AppState, build_router};
use tower::ServiceExt;

// ============================================================================
// Helpers
// ============================================================================

fn test_config(max_requests: u32) -> Config {
    Config {
        rate_limit_max_requests: max_requests,
        metrics_port: 0,
        ..Config::default()
    }
}

fn build_app(config: Config) -> (AppState, Router) {
    let state = AppState::new(config).expect("state should build");
    let app = build_router(state.clone());
    (state, app)
}

fn request_from(peer: &str, uri: &str) -> Request<Body> {
    let peer: SocketAddr = peer.parse().unwrap();
    let mut req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    req.extensions_mut().insert(ConnectInfo(peer));
    req
}

struct Captured {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Captured {
    fn text(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }

    fn envelope(&self) -> ErrorEnvelope {
        serde_json::from_slice(&self.body).expect("body should be an error envelope")
    }

    fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("body should be JSON")
    }
}

async fn send(app: &Router, req: Request<Body>) -> Captured {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    Captured {
        status,
        headers,
        body,
    }
}

// ============================================================================
// Admission Control
// ============================================================================

#[tokio::test]
async fn test_third_request_in_window_is_rejected() {
    let (state, app) = build_app(test_config(2));

    let first = send(&app, request_from("10.0.0.1:4000", "/health")).await;
    let second = send(&app, request_from("10.0.0.1:4001", "/health")).await;
    let third = send(&app, request_from("10.0.0.1:4002", "/health")).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(third.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(third.text(), REJECTION_BODY);

    state.shutdown().await;
}

#[tokio::test]
async fn test_rejection_is_plain_text_with_rate_limit_headers() {
    let (state, app) = build_app(test_config(1));

    send(&app, request_from("10.0.0.1:4000", "/health")).await;
    let rejected = send(&app, request_from("10.0.0.1:4000", "/health")).await;

    assert_eq!(rejected.status, StatusCode::TOO_MANY_REQUESTS);
    let content_type = rejected.headers[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
    assert_eq!(rejected.headers["x-ratelimit-limit"], "1");
    assert_eq!(rejected.headers["x-ratelimit-remaining"], "0");

    let retry_after: u64 = rejected.headers[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));

    state.shutdown().await;
}

#[tokio::test]
async fn test_rejection_bypasses_failure_translation() {
    let (state, app) = build_app(test_config(1));

    let first = send(&app, request_from("10.0.0.1:4000", "/api/diagnostics/throw-not-found")).await;
    assert_eq!(first.status, StatusCode::NOT_FOUND);

    let second =
        send(&app, request_from("10.0.0.1:4000", "/api/diagnostics/throw-not-found")).await;
    assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.text(), REJECTION_BODY);

    state.shutdown().await;
}

#[tokio::test]
async fn test_window_expiry_restores_admission() {
    let config = Config {
        rate_limit_window: Duration::from_millis(100),
        ..test_config(2)
    };
    let (state, app) = build_app(config);

    assert_eq!(send(&app, request_from("10.0.0.1:1", "/health")).await.status, StatusCode::OK);
    assert_eq!(send(&app, request_from("10.0.0.1:1", "/health")).await.status, StatusCode::OK);
    assert_eq!(
        send(&app, request_from("10.0.0.1:1", "/health")).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(send(&app, request_from("10.0.0.1:1", "/health")).await.status, StatusCode::OK);

    state.shutdown().await;
}

#[tokio::test]
async fn test_clients_have_independent_budgets() {
    let (state, app) = build_app(test_config(1));

    assert_eq!(send(&app, request_from("10.0.0.1:1", "/health")).await.status, StatusCode::OK);
    assert_eq!(send(&app, request_from("10.0.0.2:1", "/health")).await.status, StatusCode::OK);
    assert_eq!(
        send(&app, request_from("10.0.0.1:1", "/health")).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );

    state.shutdown().await;
}

#[tokio::test]
async fn test_requests_without_peer_share_unknown_budget() {
    let (state, app) = build_app(test_config(1));

    let bare = || Request::builder().uri("/health").body(Body::empty()).unwrap();

    assert_eq!(send(&app, bare()).await.status, StatusCode::OK);
    assert_eq!(send(&app, bare()).await.status, StatusCode::TOO_MANY_REQUESTS);

    state.shutdown().await;
}

#[tokio::test]
async fn test_forwarded_header_from_untrusted_peer_is_ignored() {
    let (state, app) = build_app(test_config(1));

    let spoofed = |client: &str| {
        let mut req = request_from("203.0.113.9:5555", "/health");
        req.headers_mut()
            .insert("x-forwarded-for", client.parse().unwrap());
        req
    };

    assert_eq!(send(&app, spoofed("1.1.1.1")).await.status, StatusCode::OK);
    assert_eq!(
        send(&app, spoofed("2.2.2.2")).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );

    state.shutdown().await;
}

#[tokio::test]
async fn test_forwarded_header_from_trusted_proxy_identifies_client() {
    let config = Config {
        trusted_proxies: vec!["10.0.0.0/8".to_string()],
        ..test_config(1)
    };
    let (state, app) = build_app(config);

    let via_proxy = |client: &str| {
        let mut req = request_from("10.1.2.3:5555", "/health");
        req.headers_mut()
            .insert("x-forwarded-for", client.parse().unwrap());
        req
    };

    assert_eq!(send(&app, via_proxy("1.1.1.1")).await.status, StatusCode::OK);
    assert_eq!(send(&app, via_proxy("2.2.2.2, 10.1.2.3")).await.status, StatusCode::OK);
    assert_eq!(
        send(&app, via_proxy("1.1.1.1")).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );

    state.shutdown().await;
}

#[tokio::test]
async fn test_rate_limiting_disabled() {
    let (state, app) = build_app(test_config(0));

    for _ in 0..20 {
        let captured = send(&app, request_from("10.0.0.1:1", "/health")).await;
        assert_eq!(captured.status, StatusCode::OK);
    }
    assert!(!send(&app, request_from("10.0.0.1:1", "/health")).await.json()["rateLimiting"]
        .as_bool()
        .unwrap());

    state.shutdown().await;
}

// ============================================================================
// Failure Translation
// ============================================================================

#[tokio::test]
async fn test_not_found_envelope_in_production() {
    let (state, app) = build_app(test_config(100));

    let captured = send(
        &app,
        request_from("10.0.0.1:1", "/api/diagnostics/throw-not-found?employeeId=7"),
    )
    .await;

    assert_eq!(captured.status, StatusCode::NOT_FOUND);
    let content_type = captured.headers[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("application/json"));

    let json = captured.json();
    assert_eq!(json["statusCode"], 404);
    assert_eq!(json["message"], "Resource not found");
    assert!(json.get("details").is_none());
    assert!(!json["traceId"].as_str().unwrap().is_empty());

    state.shutdown().await;
}

#[tokio::test]
async fn test_each_failure_kind_maps_to_its_status() {
    let (state, app) = build_app(test_config(100));

    let cases = [
        ("/api/diagnostics/throw-unauthorized", 401, "Unauthorized access"),
        ("/api/diagnostics/throw-argument?value=-1", 400, "Invalid argument provided"),
        ("/api/diagnostics/throw-not-found?employeeId=3", 404, "Resource not found"),
        ("/api/diagnostics/throw-database", 409, "Database update error"),
        ("/api/diagnostics/throw-unexpected", 500, "An unexpected error occurred"),
        ("/api/diagnostics/panic", 500, "An unexpected error occurred"),
    ];

    for (uri, status, message) in cases {
        let captured = send(&app, request_from("10.0.0.1:1", uri)).await;
        assert_eq!(captured.status.as_u16(), status, "status for {uri}");

        let envelope = captured.envelope();
        assert_eq!(envelope.status_code, status, "statusCode for {uri}");
        assert_eq!(envelope.message, message, "message for {uri}");
        assert_eq!(envelope.details, None, "details for {uri}");
    }

    state.shutdown().await;
}

#[tokio::test]
async fn test_malformed_query_becomes_invalid_argument_envelope() {
    let (state, app) = build_app(test_config(100));

    for uri in [
        "/api/diagnostics/throw-argument?value=abc",
        "/api/diagnostics/throw-not-found?employeeId=seven",
    ] {
        let captured = send(&app, request_from("10.0.0.1:1", uri)).await;
        assert_eq!(captured.status, StatusCode::BAD_REQUEST, "status for {uri}");
        let content_type = captured.headers[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("application/json"));

        let envelope = captured.envelope();
        assert_eq!(envelope.status_code, 400);
        assert_eq!(envelope.message, "Invalid argument provided");
        assert_eq!(envelope.details, None);
        assert!(!captured.text().contains("deserialize"));
    }

    state.shutdown().await;
}

#[tokio::test]
async fn test_admitted_responses_carry_remaining_budget() {
    let (state, app) = build_app(test_config(5));

    let captured = send(&app, request_from("10.0.0.1:1", "/health")).await;
    assert_eq!(captured.headers["x-ratelimit-limit"], "5");
    assert_eq!(captured.headers["x-ratelimit-remaining"], "4");

    state.shutdown().await;
}

#[tokio::test]
async fn test_development_exposes_failure_detail() {
    let config = Config {
        environment: Environment::Development,
        ..test_config(100)
    };
    let (state, app) = build_app(config);

    let captured = send(
        &app,
        request_from("10.0.0.1:1", "/api/diagnostics/throw-not-found?employeeId=42"),
    )
    .await;
    let envelope = captured.envelope();
    assert_eq!(envelope.status_code, 404);
    assert!(envelope.details.unwrap().contains("Employee with ID 42 was not found."));

    let captured = send(&app, request_from("10.0.0.1:1", "/api/diagnostics/panic")).await;
    let envelope = captured.envelope();
    assert_eq!(envelope.status_code, 500);
    assert!(envelope.details.unwrap().contains("no slot available"));

    state.shutdown().await;
}

#[tokio::test]
async fn test_trace_id_follows_request_id_header() {
    let (state, app) = build_app(test_config(100));

    let mut req = request_from("10.0.0.1:1", "/api/diagnostics/throw-unexpected");
    req.headers_mut()
        .insert("x-request-id", "trace-abc-123".parse().unwrap());
    let captured = send(&app, req).await;

    assert_eq!(captured.headers["x-request-id"], "trace-abc-123");
    assert_eq!(captured.envelope().trace_id, "trace-abc-123");

    state.shutdown().await;
}

#[tokio::test]
async fn test_generated_trace_id_matches_response_header() {
    let (state, app) = build_app(test_config(100));

    let captured = send(&app, request_from("10.0.0.1:1", "/api/diagnostics/throw-database")).await;

    let header_id = captured.headers["x-request-id"].to_str().unwrap().to_string();
    assert!(!header_id.is_empty());
    assert_eq!(captured.envelope().trace_id, header_id);

    state.shutdown().await;
}

#[tokio::test]
async fn test_successful_responses_pass_through_unchanged() {
    let (state, app) = build_app(test_config(100));

    let captured = send(
        &app,
        request_from("10.0.0.1:1", "/api/diagnostics/throw-argument?value=5"),
    )
    .await;
    assert_eq!(captured.status, StatusCode::OK);
    assert_eq!(captured.text(), "Value received: 5");

    state.shutdown().await;
}

// ============================================================================
// Health & Version
// ============================================================================

#[tokio::test]
async fn test_health_reports_tracked_identities() {
    let (state, app) = build_app(test_config(100));

    send(&app, request_from("10.0.0.1:1", "/health")).await;
    send(&app, request_from("10.0.0.2:1", "/health")).await;
    let captured = send(&app, request_from("10.0.0.3:1", "/health")).await;

    assert_eq!(captured.status, StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&captured.body).unwrap();
    assert_eq!(health.status, "healthy");
    assert!(health.rate_limiting);
    assert_eq!(health.tracked_identities, 3);
    assert_eq!(health.environment, "production");

    state.shutdown().await;
}

#[tokio::test]
async fn test_version_endpoint() {
    let (state, app) = build_app(test_config(100));

    let captured = send(&app, request_from("10.0.0.1:1", "/api/v1.0/version")).await;

    assert_eq!(captured.status, StatusCode::OK);
    let version: VersionResponse = serde_json::from_slice(&captured.body).unwrap();
    assert_eq!(version.package_name, "request_guard");
    assert_eq!(version.version, env!("CARGO_PKG_VERSION"));

    state.shutdown().await;
}

#[tokio::test]
async fn test_unknown_route_is_not_translated() {
    let (state, app) = build_app(test_config(100));

    let captured = send(&app, request_from("10.0.0.1:1", "/no-such-route")).await;
    assert_eq!(captured.status, StatusCode::NOT_FOUND);
    assert!(captured.body.is_empty());

    state.shutdown().await;
}
