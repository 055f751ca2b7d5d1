//! Promotion engine.
//!
//! Copies students of a closed session into the active one. Session-level
//! preconditions fail the whole call; anything that goes wrong for a
//! single student is recorded in the outcome and the batch moves on.
//! Each student is written in its own store transaction, so students
//! promoted before an interruption stay promoted and a retry skips them.

use std::collections::{HashMap, HashSet};

use scholaris_core::error::{ErrorKind, ScholarisError, ScholarisResult};
use scholaris_core::models::promotion::{
    PromoteStudents, PromotedStudent, PromotionOptions, PromotionOutcome, SkipReason,
};
use scholaris_core::models::student::{CreateStudent, Student, StudentFilter};
use scholaris_core::repository::{
    AcademicSessionRepository, ClassRepository, StudentRepository, TenantRepository,
};
use scholaris_core::scope::{AccessContext, Operation};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::numbering::{AdmissionNumberPolicy, compare_admission_numbers};
use crate::session::SessionService;
use crate::student::writable_class;

/// Why one student was skipped, with a human-readable detail.
type Skip = (SkipReason, String);

/// Students picked for a batch, split into those that resolved to a
/// record of the source session and ids that did not.
struct Selection {
    resolved: Vec<Student>,
    unresolved: Vec<(Uuid, Skip)>,
}

#[derive(Clone)]
pub struct PromotionEngine<T, S, C, R, N>
where
    T: TenantRepository,
    S: AcademicSessionRepository,
    C: ClassRepository,
    R: StudentRepository,
    N: AdmissionNumberPolicy,
{
    sessions: SessionService<T, S>,
    class_repo: C,
    student_repo: R,
    numbering: N,
}

impl<T, S, C, R, N> PromotionEngine<T, S, C, R, N>
where
    T: TenantRepository,
    S: AcademicSessionRepository,
    C: ClassRepository,
    R: StudentRepository,
    N: AdmissionNumberPolicy,
{
    pub fn new(sessions: SessionService<T, S>, class_repo: C, student_repo: R, numbering: N) -> Self {
        Self {
            sessions,
            class_repo,
            student_repo,
            numbering,
        }
    }

    pub async fn promote_students(
        &self,
        ctx: &AccessContext,
        request: PromoteStudents,
    ) -> ScholarisResult<PromotionOutcome> {
        let PromoteStudents {
            tenant_id,
            source_session_id,
            target_session_id,
            student_ids,
            options,
        } = request;

        ctx.authorize(tenant_id, Operation::Mutate)?;
        self.sessions.tenants().ensure_writable(tenant_id).await?;

        if source_session_id == target_session_id {
            return Err(EngineError::SameSession.into());
        }
        let source = self.sessions.load(tenant_id, source_session_id).await?;
        let target = self.sessions.load(tenant_id, target_session_id).await?;
        if source.is_active {
            return Err(EngineError::PromoteFromActive.into());
        }
        if source.archived {
            return Err(EngineError::PromoteFromArchived.into());
        }
        if !target.is_active || target.archived {
            return Err(EngineError::TargetNotActive.into());
        }
        if student_ids.as_ref().is_some_and(Vec::is_empty) {
            return Err(EngineError::EmptySelection.into());
        }
        if let Some(class_id) = options.target_class_id {
            writable_class(&self.class_repo, tenant_id, target.id, class_id).await?;
        }

        let selection = self
            .select(tenant_id, source.id, student_ids, &options)
            .await?;

        info!(
            tenant_id = %tenant_id,
            source_session_id = %source.id,
            target_session_id = %target.id,
            selected = selection.resolved.len() + selection.unresolved.len(),
            preserve_admission_numbers = options.preserve_admission_numbers,
            by = %ctx.subject_id,
            "Promotion started"
        );

        let mut outcome = PromotionOutcome {
            total_count: selection.resolved.len() + selection.unresolved.len(),
            ..Default::default()
        };
        let mut frozen_classes: HashMap<Uuid, bool> = HashMap::new();

        for student in &selection.resolved {
            match self
                .promote_one(tenant_id, target.id, student, &options, &mut frozen_classes)
                .await
            {
                Ok(promoted) => {
                    debug!(
                        student_id = %student.id,
                        new_student_id = %promoted.new_student_id,
                        admission_no = %promoted.admission_no,
                        "Student promoted"
                    );
                    outcome.record_success(promoted);
                }
                Err((reason, detail)) => {
                    debug!(student_id = %student.id, ?reason, %detail, "Student skipped");
                    outcome.record_skip(student.id, reason, detail);
                }
            }
        }
        for (student_id, (reason, detail)) in selection.unresolved {
            debug!(student_id = %student_id, ?reason, %detail, "Student skipped");
            outcome.record_skip(student_id, reason, detail);
        }

        info!(
            tenant_id = %tenant_id,
            target_session_id = %target.id,
            promoted = outcome.promoted_count,
            total = outcome.total_count,
            skipped = outcome.errors.len(),
            "Promotion finished"
        );
        Ok(outcome)
    }

    /// Resolve the students a batch covers, in processing order.
    async fn select(
        &self,
        tenant_id: Uuid,
        source_session_id: Uuid,
        student_ids: Option<Vec<Uuid>>,
        options: &PromotionOptions,
    ) -> ScholarisResult<Selection> {
        let mut selection = match student_ids {
            None => Selection {
                resolved: self
                    .student_repo
                    .list_all(
                        tenant_id,
                        source_session_id,
                        StudentFilter {
                            class_id: options.source_class_id,
                        },
                    )
                    .await?,
                unresolved: Vec::new(),
            },
            Some(ids) => {
                let mut selection = Selection {
                    resolved: Vec::new(),
                    unresolved: Vec::new(),
                };
                let mut seen = HashSet::new();
                for id in ids.into_iter().filter(|id| seen.insert(*id)) {
                    match self.student_repo.get_by_id(tenant_id, id).await {
                        Ok(student) if student.session_id == source_session_id => {
                            selection.resolved.push(student);
                        }
                        Ok(_) => selection.unresolved.push((
                            id,
                            (
                                SkipReason::NotFound,
                                "student is not in the source session".into(),
                            ),
                        )),
                        Err(e) if e.kind() == ErrorKind::NotFound => selection
                            .unresolved
                            .push((id, (SkipReason::NotFound, "student not found".into()))),
                        Err(e) => {
                            warn!(student_id = %id, error = %e, "Student lookup failed");
                            selection
                                .unresolved
                                .push((id, (SkipReason::Failed, e.to_string())));
                        }
                    }
                }
                selection
            }
        };

        selection.resolved.sort_by(|a, b| {
            compare_admission_numbers(&a.admission_no, &b.admission_no).then(a.id.cmp(&b.id))
        });
        Ok(selection)
    }

    async fn promote_one(
        &self,
        tenant_id: Uuid,
        target_session_id: Uuid,
        student: &Student,
        options: &PromotionOptions,
        frozen_classes: &mut HashMap<Uuid, bool>,
    ) -> Result<PromotedStudent, Skip> {
        if let Some(class_id) = student.class_id {
            let frozen = match frozen_classes.get(&class_id) {
                Some(frozen) => *frozen,
                None => {
                    let class = self
                        .class_repo
                        .get_by_id(tenant_id, class_id)
                        .await
                        .map_err(failed)?;
                    frozen_classes.insert(class_id, class.frozen);
                    class.frozen
                }
            };
            if frozen {
                return Err((SkipReason::FrozenClass, format!("class {class_id} is frozen")));
            }
        }

        if let Some(existing) = self
            .student_repo
            .find_promoted_from(tenant_id, target_session_id, student.id)
            .await
            .map_err(failed)?
        {
            return Err((
                SkipReason::Conflict,
                format!("already promoted as {}", existing.id),
            ));
        }

        let admission_no = if options.preserve_admission_numbers {
            let taken = self
                .student_repo
                .find_by_admission_no(tenant_id, target_session_id, &student.admission_no)
                .await
                .map_err(failed)?;
            if taken.is_some() {
                return Err((
                    SkipReason::Conflict,
                    format!(
                        "admission number {} already exists in target session",
                        student.admission_no
                    ),
                ));
            }
            student.admission_no.clone()
        } else {
            self.numbering
                .assign(tenant_id, target_session_id, student)
                .await
                .map_err(failed)?
        };

        let created = match self
            .student_repo
            .create(CreateStudent {
                tenant_id,
                session_id: target_session_id,
                class_id: options.target_class_id,
                admission_no,
                profile: student.profile.clone(),
                promoted_from: Some(student.id),
            })
            .await
        {
            Ok(created) => created,
            Err(e) => return Err(self.rejected_create(tenant_id, options, e).await),
        };

        Ok(PromotedStudent {
            student_id: student.id,
            new_student_id: created.id,
            admission_no: created.admission_no,
        })
    }

    /// Classify a create the store refused. The target class may have
    /// been frozen after the batch started.
    async fn rejected_create(
        &self,
        tenant_id: Uuid,
        options: &PromotionOptions,
        err: ScholarisError,
    ) -> Skip {
        match (err.kind(), options.target_class_id) {
            (ErrorKind::Conflict, _) => (SkipReason::Conflict, err.to_string()),
            (ErrorKind::Forbidden, Some(class_id)) => {
                match self.class_repo.get_by_id(tenant_id, class_id).await {
                    Ok(class) if class.frozen => {
                        (SkipReason::FrozenClass, format!("class {class_id} is frozen"))
                    }
                    _ => failed(err),
                }
            }
            _ => failed(err),
        }
    }
}

fn failed(err: ScholarisError) -> Skip {
    warn!(error = %err, "Promotion step failed");
    (SkipReason::Failed, err.to_string())
}
