//! Promotion request and outcome types.
//!
//! Outcomes are ephemeral: they describe one invocation and are never
//! persisted.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromotionOptions {
    /// Reuse the source admission number instead of asking the
    /// numbering policy for a new one.
    pub preserve_admission_numbers: bool,
    /// Class in the target session to place promoted students in.
    /// `None` leaves them unassigned.
    pub target_class_id: Option<Uuid>,
    /// Restricts the implicit "all students" selection to one source class.
    /// Ignored when explicit student ids are given.
    pub source_class_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct PromoteStudents {
    pub tenant_id: Uuid,
    pub source_session_id: Uuid,
    pub target_session_id: Uuid,
    /// `None` promotes every student of the source session.
    pub student_ids: Option<Vec<Uuid>>,
    pub options: PromotionOptions,
}

/// Why a single student was not promoted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SkipReason {
    NotFound,
    FrozenClass,
    Conflict,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromotedStudent {
    /// Id of the source record.
    pub student_id: Uuid,
    /// Id of the record created in the target session.
    pub new_student_id: Uuid,
    pub admission_no: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromotionError {
    pub student_id: Uuid,
    pub reason: SkipReason,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EntryOutcome {
    Success,
    Skipped(SkipReason),
}

/// Per-student line of the outcome, in processing order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromotionEntry {
    pub student_id: Uuid,
    pub outcome: EntryOutcome,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromotionOutcome {
    pub promoted_count: usize,
    pub total_count: usize,
    pub entries: Vec<PromotionEntry>,
    pub promoted_students: Vec<PromotedStudent>,
    pub errors: Vec<PromotionError>,
}

impl PromotionOutcome {
    pub fn record_success(&mut self, promoted: PromotedStudent) {
        self.entries.push(PromotionEntry {
            student_id: promoted.student_id,
            outcome: EntryOutcome::Success,
        });
        self.promoted_count += 1;
        self.promoted_students.push(promoted);
    }

    pub fn record_skip(&mut self, student_id: Uuid, reason: SkipReason, detail: impl Into<String>) {
        self.entries.push(PromotionEntry {
            student_id,
            outcome: EntryOutcome::Skipped(reason),
        });
        self.errors.push(PromotionError {
            student_id,
            reason,
            detail: detail.into(),
        });
    }
}
