//! Class domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub session_id: Uuid,
    /// Unique within `(tenant_id, session_id)`.
    pub name: String,
    /// Students of a frozen class cannot be created, updated, deleted or promoted.
    pub frozen: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClass {
    pub tenant_id: Uuid,
    pub session_id: Uuid,
    pub name: String,
}
