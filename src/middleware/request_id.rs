//! Request-scoped trace identifiers.
//!
//! Every request gets a trace identifier that links the client-visible error
//! envelope (`traceId`) to the diagnostic log entry written for it.
//!
//! - An incoming non-empty `X-Request-Id` header is reused as-is
//! - Otherwise a UUIDv4 is generated
//! - The id is stored in the request extensions as [`TraceId`] and in the
//!   request headers, then echoed in the `X-Request-Id` response header
//!
//! ```bash
//! curl -H "X-Request-Id: my-correlation-id" http://localhost:5000/health
//! ```

use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::HeaderValue;
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::{Span, debug};
use uuid::Uuid;

/// Header name for request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Trace identifier attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(pub String);

impl TraceId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Trace id of a request: the extension, then the header, then a fresh one.
    pub fn of<B>(req: &Request<B>) -> Self {
        if let Some(id) = req.extensions().get::<TraceId>() {
            return id.clone();
        }
        incoming_request_id(req).map_or_else(Self::generate, |id| Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn incoming_request_id<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Request ID layer for Tower middleware stack.
#[derive(Clone, Default)]
pub struct RequestIdLayer;

impl RequestIdLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RequestIdService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let trace_id = TraceId::of(&req);
        // A generated UUID is always a valid header value; a reused one already was.
        let header_value = HeaderValue::from_str(trace_id.as_str()).ok();

        if let Some(value) = &header_value {
            req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
        }
        req.extensions_mut().insert(trace_id.clone());

        Span::current().record("request_id", trace_id.as_str());
        debug!(trace_id = %trace_id, "Processing request");

        // Take the service that was driven to readiness, leave a clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            if let Some(value) = header_value {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            Ok(response)
        })
    }
}

/// Extension trait to read the trace identifier from requests.
pub trait RequestIdExt {
    fn trace_id(&self) -> Option<&TraceId>;
}

impl<B> RequestIdExt for Request<B> {
    fn trace_id(&self) -> Option<&TraceId> {
        self.extensions().get::<TraceId>()
    }
}
