//! Error types for the Scholaris system.
//!
//! Every failure carries an explicit [`ErrorKind`] so the boundary layer
//! can map it to a transport status without inspecting the message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScholarisError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ScholarisResult<T> = Result<T, ScholarisError>;

/// Coarse classification of a [`ScholarisError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    NotFound,
    Conflict,
    Validation,
    Internal,
}

impl ErrorKind {
    /// HTTP status code a transport layer should answer with.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::Unauthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Validation => 422,
            ErrorKind::Internal => 500,
        }
    }
}

impl ScholarisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScholarisError::Unauthenticated => ErrorKind::Unauthenticated,
            ScholarisError::Forbidden { .. } => ErrorKind::Forbidden,
            ScholarisError::NotFound { .. } => ErrorKind::NotFound,
            ScholarisError::Conflict { .. } => ErrorKind::Conflict,
            ScholarisError::Validation { .. } => ErrorKind::Validation,
            ScholarisError::Database(_) | ScholarisError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        ScholarisError::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        ScholarisError::Conflict {
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ScholarisError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        ScholarisError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}
