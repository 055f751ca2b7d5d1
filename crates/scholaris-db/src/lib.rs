//! Scholaris Database: SurrealDB connection management, schema
//! migrations and repository implementations of the `scholaris-core`
//! traits.

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{latest_schema_version, run_migrations};
