//! SurrealDB repository implementations.

mod academic_session;
mod admission_counter;
mod class;
mod student;
mod tenant;

pub use academic_session::SurrealAcademicSessionRepository;
pub use admission_counter::SurrealAdmissionCounterRepository;
pub use class::SurrealClassRepository;
pub use student::SurrealStudentRepository;
pub use tenant::SurrealTenantRepository;

use surrealdb_types::SurrealValue;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}
