//! Closed mapping from failures to client-facing error contracts.
//!
//! | Category | Status | Public message |
//! |----------|--------|----------------|
//! | `Unauthorized` | 401 | "Unauthorized access" |
//! | `InvalidArgument` | 400 | "Invalid argument provided" |
//! | `NotFound` | 404 | "Resource not found" |
//! | `DataConflict` | 409 | "Database update error" |
//! | `Unexpected` | 500 | "An unexpected error occurred" |
//!
//! Classification looks only at the concrete type of the failure, never at
//! its message, and every failure lands in exactly one category.

use axum::http::StatusCode;

use crate::failure::{Failure, InvalidArgument, NotFound, PermissionDenied, WriteConflict};

/// Client-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    Unauthorized,
    InvalidArgument,
    NotFound,
    DataConflict,
    Unexpected,
}

impl FailureCategory {
    pub const ALL: [FailureCategory; 5] = [
        FailureCategory::Unauthorized,
        FailureCategory::InvalidArgument,
        FailureCategory::NotFound,
        FailureCategory::DataConflict,
        FailureCategory::Unexpected,
    ];

    pub fn status(self) -> StatusCode {
        match self {
            FailureCategory::Unauthorized => StatusCode::UNAUTHORIZED,
            FailureCategory::InvalidArgument => StatusCode::BAD_REQUEST,
            FailureCategory::NotFound => StatusCode::NOT_FOUND,
            FailureCategory::DataConflict => StatusCode::CONFLICT,
            FailureCategory::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The only message clients ever see for this category.
    pub fn public_message(self) -> &'static str {
        match self {
            FailureCategory::Unauthorized => "Unauthorized access",
            FailureCategory::InvalidArgument => "Invalid argument provided",
            FailureCategory::NotFound => "Resource not found",
            FailureCategory::DataConflict => "Database update error",
            FailureCategory::Unexpected => "An unexpected error occurred",
        }
    }

    /// Value of the `exception_type` field in diagnostic logs.
    pub fn log_label(self) -> &'static str {
        match self {
            FailureCategory::Unauthorized => "Unauthorized",
            FailureCategory::InvalidArgument => "ArgumentError",
            FailureCategory::NotFound => "NotFound",
            FailureCategory::DataConflict => "DatabaseError",
            FailureCategory::Unexpected => "UnexpectedError",
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.log_label())
    }
}

/// Result of classifying one failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: FailureCategory,
    pub status: StatusCode,
    pub public_message: &'static str,
    /// Offending parameter, for invalid-argument failures that name one.
    pub param: Option<String>,
}

impl From<FailureCategory> for Classification {
    fn from(category: FailureCategory) -> Self {
        Self {
            category,
            status: category.status(),
            public_message: category.public_message(),
            param: None,
        }
    }
}

/// Declared kind of a failure, recovered from its concrete type.
enum FailureKind<'a> {
    PermissionDenied,
    InvalidArgument(&'a InvalidArgument),
    NotFound,
    WriteConflict,
    Unrecognized,
}

impl<'a> FailureKind<'a> {
    fn of(failure: &'a Failure) -> Self {
        let err = failure.inner();
        if err.is::<PermissionDenied>() {
            FailureKind::PermissionDenied
        } else if let Some(arg) = err.downcast_ref::<InvalidArgument>() {
            FailureKind::InvalidArgument(arg)
        } else if err.is::<NotFound>() {
            FailureKind::NotFound
        } else if err.is::<WriteConflict>() {
            FailureKind::WriteConflict
        } else {
            FailureKind::Unrecognized
        }
    }
}

/// Map a failure to its category, status and public message.
///
/// Total and pure: unrecognized failure types yield
/// [`FailureCategory::Unexpected`].
pub fn classify(failure: &Failure) -> Classification {
    match FailureKind::of(failure) {
        FailureKind::PermissionDenied => FailureCategory::Unauthorized.into(),
        FailureKind::InvalidArgument(arg) => Classification {
            param: arg.param.clone(),
            ..FailureCategory::InvalidArgument.into()
        },
        FailureKind::NotFound => FailureCategory::NotFound.into(),
        FailureKind::WriteConflict => FailureCategory::DataConflict.into(),
        FailureKind::Unrecognized => FailureCategory::Unexpected.into(),
    }
}
