//! Scholaris Core: domain models, error taxonomy, repository traits
//! and tenant scoping shared by every other crate.

pub mod error;
pub mod models;
pub mod repository;
pub mod scope;

pub use error::{ErrorKind, ScholarisError, ScholarisResult};
pub use scope::{AccessContext, Operation, RequestTenant, TenantScope};
