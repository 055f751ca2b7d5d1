//! Services wired to the shared SurrealDB client.

use scholaris_db::repository::{
    SurrealAcademicSessionRepository, SurrealAdmissionCounterRepository, SurrealClassRepository,
    SurrealStudentRepository, SurrealTenantRepository,
};
use scholaris_engine::{
    ClassService, EngineConfig, PromotionEngine, SequentialAdmissionNumbers, SessionService,
    StudentService, TenantRegistry,
};
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::Client;

type Tenants = SurrealTenantRepository<Client>;
type Sessions = SurrealAcademicSessionRepository<Client>;
type Classes = SurrealClassRepository<Client>;
type Students = SurrealStudentRepository<Client>;
type Numbering = SequentialAdmissionNumbers<SurrealAdmissionCounterRepository<Client>>;

/// Every service the request layer dispatches to.
#[derive(Clone)]
pub struct AppState {
    pub tenants: TenantRegistry<Tenants>,
    pub sessions: SessionService<Tenants, Sessions>,
    pub classes: ClassService<Tenants, Sessions, Classes>,
    pub students: StudentService<Tenants, Sessions, Classes, Students>,
    pub promotions: PromotionEngine<Tenants, Sessions, Classes, Students, Numbering>,
}

impl AppState {
    pub fn new(db: &Surreal<Client>, config: EngineConfig) -> Self {
        let tenants = TenantRegistry::new(SurrealTenantRepository::new(db.clone()), config.clone());
        let numbering = SequentialAdmissionNumbers::new(
            SurrealAdmissionCounterRepository::new(db.clone()),
            &config,
        );
        let sessions = SessionService::new(
            tenants.clone(),
            SurrealAcademicSessionRepository::new(db.clone()),
            config,
        );

        Self {
            classes: ClassService::new(sessions.clone(), SurrealClassRepository::new(db.clone())),
            students: StudentService::new(
                sessions.clone(),
                SurrealClassRepository::new(db.clone()),
                SurrealStudentRepository::new(db.clone()),
            ),
            promotions: PromotionEngine::new(
                sessions.clone(),
                SurrealClassRepository::new(db.clone()),
                SurrealStudentRepository::new(db.clone()),
                numbering,
            ),
            tenants,
            sessions,
        }
    }
}
