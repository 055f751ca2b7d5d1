//! Student domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Guardian {
    pub name: String,
    pub relation: String,
    pub phone: Option<String>,
}

/// Demographic data copied verbatim when a student is promoted.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct StudentProfile {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<DateTime<Utc>>,
    #[serde(default)]
    pub guardians: Vec<Guardian>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    /// Reference to a stored photo; the image itself lives elsewhere.
    pub photo_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub session_id: Uuid,
    /// `None` means unassigned. When set it references a class of the
    /// same tenant and session.
    pub class_id: Option<Uuid>,
    /// Unique within `(tenant_id, session_id)`.
    pub admission_no: String,
    pub profile: StudentProfile,
    /// Source record this one was promoted from, if any.
    pub promoted_from: Option<Uuid>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStudent {
    pub tenant_id: Uuid,
    pub session_id: Uuid,
    pub class_id: Option<Uuid>,
    pub admission_no: String,
    pub profile: StudentProfile,
    pub promoted_from: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateStudent {
    /// `Some(Some(id))` = move, `Some(None)` = unassign, `None` = no change.
    pub class_id: Option<Option<Uuid>>,
    pub admission_no: Option<String>,
    pub profile: Option<StudentProfile>,
}

/// Filter for student listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct StudentFilter {
    pub class_id: Option<Uuid>,
}
