//! Class creation and the freeze controller.

use scholaris_core::error::ScholarisResult;
use scholaris_core::models::class::{Class, CreateClass};
use scholaris_core::repository::{
    AcademicSessionRepository, ClassRepository, PaginatedResult, TenantRepository,
};
use scholaris_core::scope::{AccessContext, Operation};
use tracing::info;
use uuid::Uuid;

use crate::error::EngineError;
use crate::session::SessionService;

#[derive(Clone)]
pub struct ClassService<T, S, C>
where
    T: TenantRepository,
    S: AcademicSessionRepository,
    C: ClassRepository,
{
    sessions: SessionService<T, S>,
    class_repo: C,
}

impl<T, S, C> ClassService<T, S, C>
where
    T: TenantRepository,
    S: AcademicSessionRepository,
    C: ClassRepository,
{
    pub fn new(sessions: SessionService<T, S>, class_repo: C) -> Self {
        Self {
            sessions,
            class_repo,
        }
    }

    /// Create a class under the tenant's active session.
    pub async fn create_class(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        name: &str,
    ) -> ScholarisResult<Class> {
        ctx.authorize(tenant_id, Operation::Mutate)?;
        self.sessions.tenants().ensure_writable(tenant_id).await?;
        let session = self.sessions.active_session(tenant_id).await?;
        self.insert(tenant_id, session.id, name).await
    }

    /// Create a class under an explicitly named session, which must be
    /// the active one.
    pub async fn create_class_in(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        session_id: Uuid,
        name: &str,
    ) -> ScholarisResult<Class> {
        ctx.authorize(tenant_id, Operation::Mutate)?;
        self.sessions.tenants().ensure_writable(tenant_id).await?;
        let session = self.sessions.load(tenant_id, session_id).await?;
        SessionService::<T, S>::ensure_open(&session)?;
        self.insert(tenant_id, session.id, name).await
    }

    async fn insert(&self, tenant_id: Uuid, session_id: Uuid, name: &str) -> ScholarisResult<Class> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::EmptyName.into());
        }
        let class = self
            .class_repo
            .create(CreateClass {
                tenant_id,
                session_id,
                name: name.to_owned(),
            })
            .await?;
        info!(
            tenant_id = %tenant_id,
            session_id = %session_id,
            class_id = %class.id,
            name = %class.name,
            "Class created"
        );
        Ok(class)
    }

    pub async fn get_class(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        class_id: Uuid,
    ) -> ScholarisResult<Class> {
        ctx.authorize(tenant_id, Operation::Read)?;
        self.sessions.tenants().ensure_readable(tenant_id).await?;
        self.class_repo.get_by_id(tenant_id, class_id).await
    }

    pub async fn list_classes(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        session_id: Uuid,
        page: u64,
        page_size: u64,
    ) -> ScholarisResult<PaginatedResult<Class>> {
        ctx.authorize(tenant_id, Operation::Read)?;
        let pagination = self.sessions.config().pagination(page, page_size)?;
        self.sessions.tenants().ensure_readable(tenant_id).await?;
        self.sessions.load(tenant_id, session_id).await?;
        self.class_repo.list(tenant_id, session_id, pagination).await
    }

    pub async fn freeze_class(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        class_id: Uuid,
    ) -> ScholarisResult<Class> {
        self.set_frozen(ctx, tenant_id, class_id, true).await
    }

    pub async fn unfreeze_class(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        class_id: Uuid,
    ) -> ScholarisResult<Class> {
        self.set_frozen(ctx, tenant_id, class_id, false).await
    }

    async fn set_frozen(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        class_id: Uuid,
        frozen: bool,
    ) -> ScholarisResult<Class> {
        let action = if frozen { "freeze" } else { "unfreeze" };

        ctx.authorize(tenant_id, Operation::Mutate)?;
        self.sessions.tenants().ensure_writable(tenant_id).await?;

        let class = self.class_repo.get_by_id(tenant_id, class_id).await?;
        let session = self.sessions.load(tenant_id, class.session_id).await?;
        if session.archived {
            return Err(EngineError::FreezeArchivedSession { action }.into());
        }
        if !session.is_active {
            return Err(EngineError::FreezeInactiveSession { action }.into());
        }
        match (class.frozen, frozen) {
            (true, true) => return Err(EngineError::AlreadyFrozen.into()),
            (false, false) => return Err(EngineError::AlreadyUnfrozen.into()),
            _ => {}
        }

        let class = self
            .class_repo
            .set_frozen(tenant_id, class_id, class.version, frozen)
            .await?;
        info!(
            tenant_id = %tenant_id,
            class_id = %class_id,
            frozen,
            by = %ctx.subject_id,
            "Class {action} applied"
        );
        Ok(class)
    }
}
