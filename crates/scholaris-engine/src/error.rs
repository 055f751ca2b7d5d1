//! Business-rule error types.

use scholaris_core::error::ScholarisError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("tenant is frozen")]
    TenantFrozen,

    #[error("tenant has been deleted")]
    TenantDeleted,

    #[error("operation requires the SUPERADMIN role")]
    SuperAdminRequired,

    #[error("name must not be empty")]
    EmptyName,

    #[error("session end date must be after its start date")]
    InvalidDateRange,

    #[error("no active session")]
    NoActiveSession,

    #[error("cannot activate an archived session")]
    ActivateArchived,

    #[error("cannot archive an active session")]
    ArchiveActive,

    #[error("session is already archived")]
    AlreadyArchived,

    #[error("session is not archived")]
    NotArchived,

    #[error("session is archived")]
    SessionArchived,

    #[error("session belongs to another tenant")]
    ForeignSession,

    #[error("session is not active")]
    SessionInactive,

    #[error("cannot {action} class from an inactive session")]
    FreezeInactiveSession { action: &'static str },

    #[error("cannot {action} class from an archived session")]
    FreezeArchivedSession { action: &'static str },

    #[error("class is already frozen")]
    AlreadyFrozen,

    #[error("class is already unfrozen")]
    AlreadyUnfrozen,

    #[error("class is frozen")]
    ClassFrozen,

    #[error("class belongs to a different session")]
    ClassSessionMismatch,

    #[error("class {0} does not exist")]
    UnknownClass(Uuid),

    #[error("admission number must not be empty")]
    EmptyAdmissionNumber,

    #[error("source and target session must differ")]
    SameSession,

    #[error("cannot promote students from an active session")]
    PromoteFromActive,

    #[error("cannot promote students from an archived session")]
    PromoteFromArchived,

    #[error("target session must be active")]
    TargetNotActive,

    #[error("student id list must not be empty")]
    EmptySelection,

    #[error("page number out of range")]
    InvalidPage,
}

impl From<EngineError> for ScholarisError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::TenantFrozen
            | EngineError::SuperAdminRequired
            | EngineError::ActivateArchived
            | EngineError::SessionArchived
            | EngineError::ForeignSession
            | EngineError::ClassFrozen => ScholarisError::forbidden(err.to_string()),

            EngineError::TenantDeleted => ScholarisError::NotFound {
                entity: "tenant".into(),
                id: "deleted".into(),
            },

            EngineError::NoActiveSession => ScholarisError::NotFound {
                entity: "academic_session".into(),
                id: "active".into(),
            },

            EngineError::EmptyName
            | EngineError::InvalidDateRange
            | EngineError::ClassSessionMismatch
            | EngineError::UnknownClass(_)
            | EngineError::EmptyAdmissionNumber
            | EngineError::SameSession
            | EngineError::EmptySelection
            | EngineError::InvalidPage => ScholarisError::validation(err.to_string()),

            EngineError::ArchiveActive
            | EngineError::AlreadyArchived
            | EngineError::NotArchived
            | EngineError::SessionInactive
            | EngineError::FreezeInactiveSession { .. }
            | EngineError::FreezeArchivedSession { .. }
            | EngineError::AlreadyFrozen
            | EngineError::AlreadyUnfrozen
            | EngineError::PromoteFromActive
            | EngineError::PromoteFromArchived
            | EngineError::TargetNotActive => ScholarisError::conflict(err.to_string()),
        }
    }
}
