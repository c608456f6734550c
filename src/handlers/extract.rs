//! Extractors whose rejections go through the failure translation boundary.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use crate::failure::{Failure, InvalidArgument};

/// `Query<T>` that rejects a malformed query string as an [`InvalidArgument`],
/// so clients get the standard error envelope instead of axum's plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Failure;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| InvalidArgument {
                param: None,
                message: rejection.body_text(),
            })?;
        Ok(Self(value))
    }
}
