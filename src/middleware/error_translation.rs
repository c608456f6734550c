//! Recovery boundary that turns handler failures into stable error envelopes.
//!
//! # Failure Shapes
//!
//! The boundary wraps the rest of the handler chain and recovers from:
//!
//! 1. a [`RaisedFailure`] stashed in the response by [`Failure`]'s `IntoResponse`,
//! 2. an `Err` returned by the inner service,
//! 3. a panic while the inner future is polled.
//!
//! Successful responses pass through untouched.
//!
//! # Translation
//!
//! For each failure the boundary classifies it with [`classify`], writes one
//! `error`-level log event carrying the request path, method, client identity,
//! trace id and category, and replaces the response with:
//!
//! ```json
//! {
//!   "statusCode": 404,
//!   "message": "Resource not found",
//!   "traceId": "0f6b2c8e-..."
//! }
//! ```
//!
//! When the boundary is built with [`DetailPolicy::Expose`] (non-production
//! environments) the envelope also carries `details` with the full failure
//! rendering, and the log event includes it as `full_error`.

use std::borrow::Cow;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::Json;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::response::IntoResponse;
use futures::FutureExt;
use tower::{BoxError, Layer, Service, ServiceExt};
use tracing::error;

use super::identity::{TrustedProxies, resolve_client_identity};
use super::request_id::TraceId;
use crate::failure::{Failure, RaisedFailure};
use crate::metrics;
use crate::models::ErrorEnvelope;
use crate::taxonomy::{Classification, classify};

/// Whether raw failure detail may be shown to clients and written to logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailPolicy {
    /// Production: public messages only.
    #[default]
    Conceal,
    /// Development: include the full failure rendering.
    Expose,
}

/// Tower layer installing the failure translation boundary.
#[derive(Clone, Default)]
pub struct ErrorTranslationLayer {
    details: DetailPolicy,
    trusted_proxies: Arc<TrustedProxies>,
}

impl ErrorTranslationLayer {
    pub fn new(details: DetailPolicy) -> Self {
        Self {
            details,
            trusted_proxies: Arc::new(TrustedProxies::default()),
        }
    }

    /// Resolve the logged client identity through these trusted proxies.
    pub fn with_trusted_proxies(mut self, trusted_proxies: Arc<TrustedProxies>) -> Self {
        self.trusted_proxies = trusted_proxies;
        self
    }
}

impl<S> Layer<S> for ErrorTranslationLayer {
    type Service = ErrorTranslationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorTranslationService {
            inner,
            details: self.details,
            trusted_proxies: self.trusted_proxies.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ErrorTranslationService<S> {
    inner: S,
    details: DetailPolicy,
    trusted_proxies: Arc<TrustedProxies>,
}

/// What the boundary knows about a request before handing it on.
struct RequestRecord {
    path: String,
    method: Method,
    client: Cow<'static, str>,
    trace_id: TraceId,
}

impl<S> Service<Request<Body>> for ErrorTranslationService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness failures of the inner service surface inside `call` via `oneshot`.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let record = RequestRecord {
            path: req.uri().path().to_string(),
            method: req.method().clone(),
            client: resolve_client_identity(&req, &self.trusted_proxies),
            trace_id: TraceId::of(&req),
        };
        let details = self.details;
        let inner = self.inner.clone();

        Box::pin(async move {
            let outcome = AssertUnwindSafe(inner.oneshot(req)).catch_unwind().await;

            let failure = match outcome {
                Ok(Ok(mut response)) => match response.extensions_mut().remove::<RaisedFailure>() {
                    Some(RaisedFailure(failure)) => failure,
                    None => return Ok(response),
                },
                Ok(Err(err)) => {
                    let err: BoxError = err.into();
                    Arc::new(Failure::from(anyhow::anyhow!(err)))
                }
                Err(payload) => Arc::new(Failure::from_panic(payload.as_ref())),
            };

            Ok(translate(&failure, &record, details))
        })
    }
}

/// Classify, log and render one failure.
fn translate(failure: &Failure, record: &RequestRecord, details: DetailPolicy) -> Response<Body> {
    let Classification {
        category,
        status,
        public_message,
        param,
    } = classify(failure);

    let detail = match details {
        DetailPolicy::Expose => Some(failure.detail()),
        DetailPolicy::Conceal => None,
    };

    match &detail {
        Some(full_error) => error!(
            trace_id = %record.trace_id,
            path = %record.path,
            method = %record.method,
            client_ip = %record.client,
            exception_type = category.log_label(),
            status = status.as_u16(),
            param = param.as_deref(),
            error = %failure,
            full_error = %full_error,
            "Exception occurred: {public_message}"
        ),
        None => error!(
            trace_id = %record.trace_id,
            path = %record.path,
            method = %record.method,
            client_ip = %record.client,
            exception_type = category.log_label(),
            status = status.as_u16(),
            param = param.as_deref(),
            error = %failure,
            "Exception occurred: {public_message}"
        ),
    }
    metrics::record_failure_translated(category);

    let envelope = ErrorEnvelope {
        status_code: status.as_u16(),
        message: public_message.to_string(),
        details: detail,
        trace_id: record.trace_id.to_string(),
    };

    // `Json` sets the content type; a serialization failure becomes axum's own 500.
    (status, Json(envelope)).into_response()
}
