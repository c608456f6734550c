//! Admission control middleware backed by the sliding-window limiter.
//!
//! # Behavior
//!
//! For every request the client identity is resolved (see
//! [`super::identity`]) and evaluated against the shared
//! [`SlidingWindowLimiter`]:
//!
//! - **Admitted**: the inner service runs; its response gains
//!   `X-RateLimit-Limit` and `X-RateLimit-Remaining` (budget left after this request)
//! - **Rejected**: the inner service is never called; the client gets
//!
//! ```text
//! HTTP/1.1 429 Too Many Requests
//! content-type: text/plain; charset=utf-8
//! retry-after: 12
//! x-ratelimit-limit: 100
//! x-ratelimit-remaining: 0
//!
//! Too many requests. Please try again later.
//! ```
//!
//! This layer sits outside the failure translation boundary, so rejections
//! are never rewritten into error envelopes.
//!
//! # Observability
//!
//! Rejections are logged at `warn` with identity, method and path (never the
//! request body) and counted in the `requests_rate_limited_total` metric.
//! Admissions are counted in `requests_admitted_total`.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderValue, Request, Response, StatusCode};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::warn;

use super::identity::{TrustedProxies, resolve_client_identity};
use crate::limiter::{Clock, Decision, SlidingWindowLimiter, SystemClock};
use crate::metrics;

/// Body of every rate-limit rejection.
pub const REJECTION_BODY: &str = "Too many requests. Please try again later.";

/// Admission control layer for the Tower middleware stack.
///
/// # Example
///
/// ```rust,ignore
/// let limiter = Arc::new(SlidingWindowLimiter::new(RateLimiterConfig::default()));
/// let app = Router::new()
///     .route("/api", get(handler))
///     .layer(AdmissionLayer::new(limiter, Arc::new(TrustedProxies::default())));
/// ```
pub struct AdmissionLayer<C: Clock = SystemClock> {
    limiter: Arc<SlidingWindowLimiter<C>>,
    trusted_proxies: Arc<TrustedProxies>,
}

impl<C: Clock> AdmissionLayer<C> {
    pub fn new(limiter: Arc<SlidingWindowLimiter<C>>, trusted_proxies: Arc<TrustedProxies>) -> Self {
        Self {
            limiter,
            trusted_proxies,
        }
    }
}

impl<C: Clock> Clone for AdmissionLayer<C> {
    fn clone(&self) -> Self {
        Self {
            limiter: self.limiter.clone(),
            trusted_proxies: self.trusted_proxies.clone(),
        }
    }
}

impl<S, C: Clock> Layer<S> for AdmissionLayer<C> {
    type Service = AdmissionService<S, C>;

    fn layer(&self, inner: S) -> Self::Service {
        AdmissionService {
            inner,
            limiter: self.limiter.clone(),
            trusted_proxies: self.trusted_proxies.clone(),
        }
    }
}

/// Admission control service wrapper.
pub struct AdmissionService<S, C: Clock = SystemClock> {
    inner: S,
    limiter: Arc<SlidingWindowLimiter<C>>,
    trusted_proxies: Arc<TrustedProxies>,
}

impl<S: Clone, C: Clock> Clone for AdmissionService<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: self.limiter.clone(),
            trusted_proxies: self.trusted_proxies.clone(),
        }
    }
}

impl<S, C> Service<Request<Body>> for AdmissionService<S, C>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
    C: Clock,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let identity = resolve_client_identity(&req, &self.trusted_proxies);

        match self.limiter.check(&identity) {
            Decision::Admitted { remaining } => {
                metrics::record_admission(true);
                let limit = self.limiter.config().max_requests();
                let clone = self.inner.clone();
                let mut inner = std::mem::replace(&mut self.inner, clone);
                Box::pin(async move {
                    let mut response = inner.call(req).await?;
                    let headers = response.headers_mut();
                    headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
                    headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
                    Ok(response)
                })
            }
            Decision::Rejected { retry_after } => {
                metrics::record_admission(false);
                let retry_after_secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;

                warn!(
                    client_ip = %identity,
                    method = %req.method(),
                    path = %req.uri().path(),
                    retry_after_secs,
                    "Rate limit exceeded"
                );

                let response = rejection(self.limiter.config().max_requests(), retry_after_secs);
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

fn rejection(limit: u32, retry_after_secs: u64) -> Response<Body> {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [
            ("Retry-After", retry_after_secs.to_string()),
            ("X-RateLimit-Limit", limit.to_string()),
            ("X-RateLimit-Remaining", "0".to_string()),
        ],
        REJECTION_BODY,
    )
        .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::extract::ConnectInfo;
    use http_body_util::BodyExt;
    use tower::{ServiceExt, service_fn};

    use super::*;
    use crate::limiter::RateLimiterConfig;

    fn layer(max: u32) -> AdmissionLayer {
        let config = RateLimiterConfig::new(Duration::from_secs(60), max).unwrap();
        AdmissionLayer::new(
            Arc::new(SlidingWindowLimiter::new(config)),
            Arc::new(TrustedProxies::default()),
        )
    }

    fn request_from(peer: &str) -> Request<Body> {
        let mut req = Request::builder().uri("/anything").body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        req
    }

    #[tokio::test]
    async fn test_rejection_short_circuits_downstream() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let svc = layer(2).layer(service_fn(move |_req: Request<Body>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(Response::new(Body::from("ok")))
            }
        }));

        let statuses: Vec<StatusCode> = {
            let mut statuses = Vec::new();
            for _ in 0..3 {
                let response = svc.clone().oneshot(request_from("10.1.1.1:1000")).await.unwrap();
                statuses.push(response.status());
            }
            statuses
        };

        assert_eq!(
            statuses,
            vec![StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_admitted_response_reports_remaining_budget() {
        let svc = layer(3).layer(service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(Response::new(Body::from("ok")))
        }));

        let first = svc.clone().oneshot(request_from("10.1.1.1:1000")).await.unwrap();
        assert_eq!(first.headers()["x-ratelimit-limit"], "3");
        assert_eq!(first.headers()["x-ratelimit-remaining"], "2");

        let second = svc.oneshot(request_from("10.1.1.1:1000")).await.unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(second.headers()["x-ratelimit-remaining"], "1");
    }

    #[tokio::test]
    async fn test_rejection_body_and_headers() {
        let svc = layer(1).layer(service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(Response::new(Body::empty()))
        }));

        svc.clone().oneshot(request_from("10.1.1.1:1000")).await.unwrap();
        let response = svc.oneshot(request_from("10.1.1.1:1001")).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["x-ratelimit-limit"], "1");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        let retry_after: u64 = response.headers()["retry-after"]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&retry_after));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], REJECTION_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_distinct_peers_have_separate_budgets() {
        let svc = layer(1).layer(service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(Response::new(Body::empty()))
        }));

        for peer in ["10.0.0.1:1", "10.0.0.2:1", "[::1]:1"] {
            let response = svc.clone().oneshot(request_from(peer)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_missing_origin_shares_unknown_partition() {
        let svc = layer(1).layer(service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(Response::new(Body::empty()))
        }));

        let first = svc
            .clone()
            .oneshot(Request::new(Body::empty()))
            .await
            .unwrap();
        let second = svc.oneshot(Request::new(Body::empty())).await.unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
