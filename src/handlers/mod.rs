mod diagnostics;
mod extract;
mod health;
mod version;

pub use diagnostics::{
    throw_argument, throw_database, throw_not_found, throw_panic, throw_unauthorized,
    throw_unexpected,
};
pub use extract::ValidQuery;
pub use health::health_check;
pub use version::version;
