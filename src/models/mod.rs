mod api;

pub use api::{EmployeeQuery, ErrorEnvelope, HealthResponse, ValueQuery, VersionResponse};
