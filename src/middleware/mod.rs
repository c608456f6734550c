//! HTTP middleware forming the request pipeline core.
//!
//! - **Admission**: per-client sliding-window rate limiting
//! - **Request ID**: trace identifier generation and propagation
//! - **Error Translation**: recovery boundary mapping failures to error envelopes
//! - **Identity**: client identity resolution shared by the layers above
//!
//! # Architecture
//!
//! ```text
//! Request → Admission → Request ID → Trace → Error Translation → Handler
//!              ↓            ↓                       ↓
//!        429 Too Many   X-Request-Id        401/400/404/409/500 envelope
//! ```
//!
//! Admission runs outside the recovery boundary: limiter rejections are final
//! and never translated.

pub mod admission;
pub mod error_translation;
pub mod identity;
pub mod request_id;

pub use admission::{AdmissionLayer, REJECTION_BODY};
pub use error_translation::{DetailPolicy, ErrorTranslationLayer};
pub use identity::{CidrRange, TrustedProxies, UNKNOWN_IDENTITY, resolve_client_identity};
pub use request_id::{REQUEST_ID_HEADER, RequestIdExt, RequestIdLayer, TraceId};
