/// Database layer
///
/// - [`pool`]: PostgreSQL connection pool with health checks
/// - [`migrations`]: embedded schema migrations
///
/// Table access goes through the [`crate::store`] traits; the SQL itself lives
/// next to each model in [`crate::models`].

pub mod migrations;
pub mod pool;
