//! Endpoints that raise each failure kind on purpose.
//!
//! They exist to exercise the failure translation boundary end to end:
//!
//! | Route | Raises | Status |
//! |-------|--------|--------|
//! | `GET /api/diagnostics/throw-unauthorized` | `PermissionDenied` | 401 |
//! | `GET /api/diagnostics/throw-argument?value=-1` | `InvalidArgument` | 400 |
//! | `GET /api/diagnostics/throw-not-found?employeeId=7` | `NotFound` | 404 |
//! | `GET /api/diagnostics/throw-database` | `WriteConflict` | 409 |
//! | `GET /api/diagnostics/throw-unexpected` | unrecognized error | 500 |
//! | `GET /api/diagnostics/panic` | panic | 500 |

use tracing::{debug, instrument};

use super::extract::ValidQuery;
use crate::failure::{HandlerResult, InvalidArgument, NotFound, PermissionDenied, WriteConflict};
use crate::models::{EmployeeQuery, ValueQuery};

/// Error type no part of the taxonomy recognizes.
#[derive(Debug, thiserror::Error)]
#[error("An unexpected error occurred in the system.")]
struct InvalidOperation;

#[instrument]
pub async fn throw_unauthorized() -> HandlerResult<&'static str> {
    Err(PermissionDenied("You do not have permission to access this resource.".into()).into())
}

/// Accepts non-negative values, rejects negative ones as an invalid argument.
#[instrument]
pub async fn throw_argument(ValidQuery(query): ValidQuery<ValueQuery>) -> HandlerResult<String> {
    if query.value < 0 {
        return Err(InvalidArgument::new("value", "Value must be non-negative.").into());
    }
    Ok(format!("Value received: {}", query.value))
}

#[instrument]
pub async fn throw_not_found(
    ValidQuery(query): ValidQuery<EmployeeQuery>,
) -> HandlerResult<&'static str> {
    Err(NotFound(format!(
        "Employee with ID {} was not found.",
        query.employee_id
    ))
    .into())
}

/// Simulates a rejected insert surfacing as a write conflict.
#[instrument]
pub async fn throw_database() -> HandlerResult<&'static str> {
    let insert: Result<(), std::io::Error> = Err(std::io::Error::other(
        "CHECK constraint violated: id must be positive",
    ));
    debug!("Attempting insert with an invalid id");

    insert.map_err(|e| WriteConflict::with_source("Error updating database", e))?;
    Ok("inserted")
}

#[instrument]
pub async fn throw_unexpected() -> HandlerResult<&'static str> {
    Err(InvalidOperation.into())
}

#[instrument]
pub async fn throw_panic() -> &'static str {
    let slots: Vec<&str> = Vec::new();
    match slots.first() {
        Some(slot) => *slot,
        None => panic!("no slot available to serve the request"),
    }
}
