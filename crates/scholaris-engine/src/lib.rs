//! Scholaris Engine: business rules over the repository traits.
//!
//! Services are generic over the `scholaris_core` repository traits and
//! expect an [`AccessContext`](scholaris_core::AccessContext) produced by
//! the scoping resolver on every call.

pub mod class;
pub mod config;
pub mod error;
pub mod numbering;
pub mod promotion;
pub mod session;
pub mod student;
pub mod tenant;

pub use class::ClassService;
pub use config::EngineConfig;
pub use error::EngineError;
pub use numbering::{
    AdmissionNumberPolicy, PreserveAdmissionNumbers, SequentialAdmissionNumbers,
    compare_admission_numbers,
};
pub use promotion::PromotionEngine;
pub use session::SessionService;
pub use student::{NewStudent, StudentService};
pub use tenant::TenantRegistry;
