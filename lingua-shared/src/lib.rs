//! # Lingua Shared Library
//!
//! Domain types, storage and service logic for the Lingua language-center
//! backend. The HTTP layer in `lingua-api` is a thin shell over this crate.
//!
//! ## Module Organization
//!
//! - `auth`: passwords, session tokens, route guard, sign-in and password reset
//! - `catalog`: courses, schedules, enrollments and blog posts
//! - `db`: connection pool and embedded migrations
//! - `error`: the service error taxonomy
//! - `messaging`: conversations between users
//! - `models`: database models and data structures
//! - `payments`: signed payment webhooks
//! - `store`: storage traits with PostgreSQL and in-memory backends

pub mod auth;
pub mod catalog;
pub mod db;
pub mod error;
pub mod messaging;
pub mod models;
pub mod payments;
pub mod store;

/// Current version of the Lingua shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
