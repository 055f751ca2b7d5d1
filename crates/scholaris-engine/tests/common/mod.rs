//! Shared fixtures for engine integration tests: every service wired to
//! one in-memory SurrealDB.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use scholaris_core::models::academic_session::{AcademicSession, CreateAcademicSession};
use scholaris_core::models::principal::{Principal, Role};
use scholaris_core::models::student::{Student, StudentProfile};
use scholaris_core::models::tenant::CreateTenant;
use scholaris_core::scope::{self, AccessContext, Operation, RequestTenant};
use scholaris_db::{DbConfig, DbManager};
use scholaris_db::repository::{
    SurrealAcademicSessionRepository, SurrealAdmissionCounterRepository, SurrealClassRepository,
    SurrealStudentRepository, SurrealTenantRepository,
};
use scholaris_engine::{
    ClassService, EngineConfig, NewStudent, PromotionEngine, SequentialAdmissionNumbers,
    SessionService, StudentService, TenantRegistry,
};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use uuid::Uuid;

pub type Tenants = SurrealTenantRepository<Db>;
pub type SessionRepo = SurrealAcademicSessionRepository<Db>;
pub type ClassRepo = SurrealClassRepository<Db>;
pub type StudentRepo = SurrealStudentRepository<Db>;
pub type Numbering = SequentialAdmissionNumbers<SurrealAdmissionCounterRepository<Db>>;

pub struct Harness {
    pub db: Surreal<Db>,
    pub tenants: TenantRegistry<Tenants>,
    pub sessions: SessionService<Tenants, SessionRepo>,
    pub classes: ClassService<Tenants, SessionRepo, ClassRepo>,
    pub students: StudentService<Tenants, SessionRepo, ClassRepo, StudentRepo>,
    pub promotions: PromotionEngine<Tenants, SessionRepo, ClassRepo, StudentRepo, Numbering>,
    /// Superadmin context without a tenant filter.
    pub root: AccessContext,
}

impl Harness {
    pub async fn new() -> Self {
        let db = DbManager::in_memory(&DbConfig::default())
            .await
            .unwrap()
            .into_client();

        let config = EngineConfig::default();
        let tenants = TenantRegistry::new(SurrealTenantRepository::new(db.clone()), config.clone());
        let sessions = SessionService::new(
            tenants.clone(),
            SurrealAcademicSessionRepository::new(db.clone()),
            config.clone(),
        );
        let classes = ClassService::new(sessions.clone(), SurrealClassRepository::new(db.clone()));
        let students = StudentService::new(
            sessions.clone(),
            SurrealClassRepository::new(db.clone()),
            SurrealStudentRepository::new(db.clone()),
        );
        let promotions = PromotionEngine::new(
            sessions.clone(),
            SurrealClassRepository::new(db.clone()),
            SurrealStudentRepository::new(db.clone()),
            SequentialAdmissionNumbers::new(
                SurrealAdmissionCounterRepository::new(db.clone()),
                &config,
            ),
        );

        let root = scope::resolve(
            Some(&principal(Role::SuperAdmin, None)),
            RequestTenant::default(),
            Operation::Read,
        )
        .unwrap();

        Self {
            db,
            tenants,
            sessions,
            classes,
            students,
            promotions,
            root,
        }
    }

    pub async fn tenant(&self, name: &str) -> Uuid {
        self.tenants
            .create_tenant(&self.root, CreateTenant { name: name.into() })
            .await
            .unwrap()
            .id
    }

    pub async fn session(&self, tenant_id: Uuid, name: &str) -> AcademicSession {
        let start = Utc::now();
        self.sessions
            .create_session(
                &admin(tenant_id),
                CreateAcademicSession {
                    tenant_id,
                    name: name.into(),
                    start_date: start,
                    end_date: start + Duration::days(365),
                },
            )
            .await
            .unwrap()
    }

    pub async fn active_session(&self, tenant_id: Uuid, name: &str) -> AcademicSession {
        let session = self.session(tenant_id, name).await;
        self.sessions
            .activate_session(&admin(tenant_id), tenant_id, session.id)
            .await
            .unwrap()
    }

    pub async fn student(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        class_id: Option<Uuid>,
        admission_no: &str,
    ) -> Student {
        self.students
            .create_student(
                &admin(tenant_id),
                tenant_id,
                NewStudent {
                    session_id: Some(session_id),
                    class_id,
                    admission_no: admission_no.into(),
                    profile: profile(admission_no),
                },
            )
            .await
            .unwrap()
    }
}

pub fn principal(role: Role, tenant_id: Option<Uuid>) -> Principal {
    Principal {
        subject_id: format!("{}-subject", role.as_str().to_lowercase()),
        role,
        tenant_id,
    }
}

/// Context of a tenant-bound principal acting on its own tenant.
pub fn context(role: Role, tenant_id: Uuid) -> AccessContext {
    scope::resolve(
        Some(&principal(role, Some(tenant_id))),
        RequestTenant::default(),
        Operation::Mutate,
    )
    .unwrap()
}

pub fn admin(tenant_id: Uuid) -> AccessContext {
    context(Role::Admin, tenant_id)
}

pub fn teacher(tenant_id: Uuid) -> AccessContext {
    context(Role::Teacher, tenant_id)
}

pub fn profile(tag: &str) -> StudentProfile {
    StudentProfile {
        first_name: format!("Pupil {tag}"),
        last_name: "Flanders".into(),
        email: Some(format!("pupil{tag}@example.com")),
        ..Default::default()
    }
}
