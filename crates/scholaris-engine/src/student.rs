//! Student registry.
//!
//! Every write re-checks the rules the store enforces atomically so that
//! callers get a precise error before a transaction is attempted. The
//! store transaction remains the authority under concurrency.

use scholaris_core::error::{ErrorKind, ScholarisResult};
use scholaris_core::models::academic_session::AcademicSession;
use scholaris_core::models::class::Class;
use scholaris_core::models::student::{
    CreateStudent, Student, StudentFilter, StudentProfile, UpdateStudent,
};
use scholaris_core::repository::{
    AcademicSessionRepository, ClassRepository, PaginatedResult, StudentRepository,
    TenantRepository,
};
use scholaris_core::scope::{AccessContext, Operation};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::EngineError;
use crate::session::SessionService;

/// Input for [`StudentService::create_student`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStudent {
    /// Defaults to the tenant's active session.
    pub session_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
    pub admission_no: String,
    pub profile: StudentProfile,
}

/// Resolve a class that students of `session_id` may be written into.
pub(crate) async fn writable_class<C: ClassRepository>(
    class_repo: &C,
    tenant_id: Uuid,
    session_id: Uuid,
    class_id: Uuid,
) -> ScholarisResult<Class> {
    let class = match class_repo.get_by_id(tenant_id, class_id).await {
        Ok(class) => class,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(EngineError::UnknownClass(class_id).into());
        }
        Err(e) => return Err(e),
    };
    if class.session_id != session_id {
        return Err(EngineError::ClassSessionMismatch.into());
    }
    if class.frozen {
        return Err(EngineError::ClassFrozen.into());
    }
    Ok(class)
}

#[derive(Clone)]
pub struct StudentService<T, S, C, R>
where
    T: TenantRepository,
    S: AcademicSessionRepository,
    C: ClassRepository,
    R: StudentRepository,
{
    sessions: SessionService<T, S>,
    class_repo: C,
    student_repo: R,
}

impl<T, S, C, R> StudentService<T, S, C, R>
where
    T: TenantRepository,
    S: AcademicSessionRepository,
    C: ClassRepository,
    R: StudentRepository,
{
    pub fn new(sessions: SessionService<T, S>, class_repo: C, student_repo: R) -> Self {
        Self {
            sessions,
            class_repo,
            student_repo,
        }
    }

    async fn open_session(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> ScholarisResult<AcademicSession> {
        let session = self.sessions.load(tenant_id, session_id).await?;
        SessionService::<T, S>::ensure_open(&session)?;
        Ok(session)
    }

    /// Load a student whose record may still be changed.
    async fn mutable_student(&self, tenant_id: Uuid, student_id: Uuid) -> ScholarisResult<Student> {
        let student = self.student_repo.get_by_id(tenant_id, student_id).await?;
        self.open_session(tenant_id, student.session_id).await?;
        if let Some(class_id) = student.class_id {
            let class = self.class_repo.get_by_id(tenant_id, class_id).await?;
            if class.frozen {
                return Err(EngineError::ClassFrozen.into());
            }
        }
        Ok(student)
    }

    pub async fn create_student(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        input: NewStudent,
    ) -> ScholarisResult<Student> {
        ctx.authorize(tenant_id, Operation::Mutate)?;
        self.sessions.tenants().ensure_writable(tenant_id).await?;

        let admission_no = input.admission_no.trim();
        if admission_no.is_empty() {
            return Err(EngineError::EmptyAdmissionNumber.into());
        }

        let session = match input.session_id {
            Some(id) => self.open_session(tenant_id, id).await?,
            None => self.sessions.active_session(tenant_id).await?,
        };
        if let Some(class_id) = input.class_id {
            writable_class(&self.class_repo, tenant_id, session.id, class_id).await?;
        }

        let student = self
            .student_repo
            .create(CreateStudent {
                tenant_id,
                session_id: session.id,
                class_id: input.class_id,
                admission_no: admission_no.to_owned(),
                profile: input.profile,
                promoted_from: None,
            })
            .await?;
        info!(
            tenant_id = %tenant_id,
            session_id = %session.id,
            student_id = %student.id,
            "Student created"
        );
        Ok(student)
    }

    pub async fn get_student(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        student_id: Uuid,
    ) -> ScholarisResult<Student> {
        ctx.authorize(tenant_id, Operation::Read)?;
        self.sessions.tenants().ensure_readable(tenant_id).await?;
        self.student_repo.get_by_id(tenant_id, student_id).await
    }

    /// Change demographics, admission number or class assignment.
    pub async fn update_student(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        student_id: Uuid,
        mut input: UpdateStudent,
    ) -> ScholarisResult<Student> {
        ctx.authorize(tenant_id, Operation::Mutate)?;
        self.sessions.tenants().ensure_writable(tenant_id).await?;

        if let Some(no) = input.admission_no.take() {
            let no = no.trim();
            if no.is_empty() {
                return Err(EngineError::EmptyAdmissionNumber.into());
            }
            input.admission_no = Some(no.to_owned());
        }

        let student = self.mutable_student(tenant_id, student_id).await?;
        if let Some(Some(class_id)) = input.class_id {
            writable_class(&self.class_repo, tenant_id, student.session_id, class_id).await?;
        }

        let updated = self
            .student_repo
            .update(tenant_id, student_id, student.version, input)
            .await?;
        info!(tenant_id = %tenant_id, student_id = %student_id, "Student updated");
        Ok(updated)
    }

    pub async fn delete_student(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        student_id: Uuid,
    ) -> ScholarisResult<()> {
        ctx.authorize(tenant_id, Operation::Mutate)?;
        self.sessions.tenants().ensure_writable(tenant_id).await?;

        let student = self.mutable_student(tenant_id, student_id).await?;
        self.student_repo
            .delete(tenant_id, student_id, student.version)
            .await?;
        info!(tenant_id = %tenant_id, student_id = %student_id, "Student deleted");
        Ok(())
    }

    /// Page through a session's students, archived sessions included.
    pub async fn list_students(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        session_id: Uuid,
        class_id: Option<Uuid>,
        page: u64,
        page_size: u64,
    ) -> ScholarisResult<PaginatedResult<Student>> {
        ctx.authorize(tenant_id, Operation::Read)?;
        let pagination = self.sessions.config().pagination(page, page_size)?;
        self.sessions.tenants().ensure_readable(tenant_id).await?;
        self.sessions.load(tenant_id, session_id).await?;
        self.student_repo
            .list(tenant_id, session_id, StudentFilter { class_id }, pagination)
            .await
    }
}
