//! Academic session domain model.
//!
//! A session is a tenant's academic-year partition. Classes and students
//! are scoped to one session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state derived from the `is_active` / `archived` flags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionState {
    Inactive,
    Active,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicSession {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency counter, bumped by every transition.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AcademicSession {
    pub fn state(&self) -> SessionState {
        if self.archived {
            SessionState::Archived
        } else if self.is_active {
            SessionState::Active
        } else {
            SessionState::Inactive
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAcademicSession {
    pub tenant_id: Uuid,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// A compare-and-swap lifecycle change applied by the repository.
///
/// `expected_version` must match the stored row or the transition fails
/// with a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    Deactivate,
    Archive,
    Unarchive,
}
