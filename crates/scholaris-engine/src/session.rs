//! Session state machine.
//!
//! ```text
//!   create ──► Inactive ◄──deactivate── Active
//!                │  ▲  ──activate──►      │
//!        archive │  │ unarchive           │ (archive rejected)
//!                ▼  │                     ▼
//!              Archived ◄─────────────────X
//! ```
//!
//! Preconditions are checked here against a freshly read row; the write
//! itself is a version-checked transaction in the repository, so a
//! concurrent transition between the read and the write surfaces as a
//! conflict instead of being overwritten.

use scholaris_core::error::{ErrorKind, ScholarisResult};
use scholaris_core::models::academic_session::{
    AcademicSession, CreateAcademicSession, SessionTransition,
};
use scholaris_core::repository::{AcademicSessionRepository, PaginatedResult, TenantRepository};
use scholaris_core::scope::{AccessContext, Operation};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::tenant::TenantRegistry;

#[derive(Clone)]
pub struct SessionService<T: TenantRepository, S: AcademicSessionRepository> {
    tenants: TenantRegistry<T>,
    session_repo: S,
    config: EngineConfig,
}

impl<T: TenantRepository, S: AcademicSessionRepository> SessionService<T, S> {
    pub fn new(tenants: TenantRegistry<T>, session_repo: S, config: EngineConfig) -> Self {
        Self {
            tenants,
            session_repo,
            config,
        }
    }

    pub fn tenants(&self) -> &TenantRegistry<T> {
        &self.tenants
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The tenant's active session.
    ///
    /// This is the only place that answers "which session is current";
    /// other services call it rather than querying storage themselves.
    pub async fn active_session(&self, tenant_id: Uuid) -> ScholarisResult<AcademicSession> {
        self.session_repo
            .get_active(tenant_id)
            .await?
            .ok_or_else(|| EngineError::NoActiveSession.into())
    }

    /// Load a session of `tenant_id` without authorization checks.
    ///
    /// A session id that exists under another tenant is `Forbidden`;
    /// an id that exists nowhere stays `NotFound`.
    pub(crate) async fn load(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> ScholarisResult<AcademicSession> {
        match self.session_repo.get_by_id(tenant_id, session_id).await {
            Err(err) if err.kind() == ErrorKind::NotFound => {
                match self.session_repo.owner_of(session_id).await? {
                    Some(owner) if owner != tenant_id => {
                        warn!(
                            tenant_id = %tenant_id,
                            session_id = %session_id,
                            owner = %owner,
                            "Session requested across tenants"
                        );
                        Err(EngineError::ForeignSession.into())
                    }
                    _ => Err(err),
                }
            }
            other => other,
        }
    }

    /// Fail unless the session accepts ordinary writes: archived is
    /// `Forbidden`, inactive is `Conflict`.
    pub(crate) fn ensure_open(session: &AcademicSession) -> ScholarisResult<()> {
        if session.archived {
            return Err(EngineError::SessionArchived.into());
        }
        if !session.is_active {
            return Err(EngineError::SessionInactive.into());
        }
        Ok(())
    }

    pub async fn current_session(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
    ) -> ScholarisResult<AcademicSession> {
        ctx.authorize(tenant_id, Operation::Read)?;
        self.tenants.ensure_readable(tenant_id).await?;
        self.active_session(tenant_id).await
    }

    pub async fn get_session(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> ScholarisResult<AcademicSession> {
        ctx.authorize(tenant_id, Operation::Read)?;
        self.tenants.ensure_readable(tenant_id).await?;
        self.load(tenant_id, session_id).await
    }

    /// Sessions of the tenant, newest first.
    pub async fn list_sessions(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        page: u64,
        page_size: u64,
    ) -> ScholarisResult<PaginatedResult<AcademicSession>> {
        ctx.authorize(tenant_id, Operation::Read)?;
        let pagination = self.config.pagination(page, page_size)?;
        self.tenants.ensure_readable(tenant_id).await?;
        self.session_repo.list(tenant_id, pagination).await
    }

    pub async fn create_session(
        &self,
        ctx: &AccessContext,
        input: CreateAcademicSession,
    ) -> ScholarisResult<AcademicSession> {
        ctx.authorize(input.tenant_id, Operation::Mutate)?;
        self.tenants.ensure_writable(input.tenant_id).await?;

        if input.name.trim().is_empty() {
            return Err(EngineError::EmptyName.into());
        }
        if input.end_date <= input.start_date {
            return Err(EngineError::InvalidDateRange.into());
        }

        let session = self.session_repo.create(input).await?;
        info!(
            tenant_id = %session.tenant_id,
            session_id = %session.id,
            name = %session.name,
            "Session created"
        );
        Ok(session)
    }

    /// Make the session the tenant's only active one.
    pub async fn activate_session(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> ScholarisResult<AcademicSession> {
        ctx.authorize(tenant_id, Operation::Mutate)?;
        self.tenants.ensure_writable(tenant_id).await?;

        let session = self.load(tenant_id, session_id).await?;
        if session.archived {
            return Err(EngineError::ActivateArchived.into());
        }
        if session.is_active {
            return Ok(session);
        }

        let session = self
            .session_repo
            .activate(tenant_id, session_id, session.version)
            .await?;
        info!(
            tenant_id = %tenant_id,
            session_id = %session_id,
            by = %ctx.subject_id,
            "Session activated"
        );
        Ok(session)
    }

    pub async fn deactivate_session(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> ScholarisResult<AcademicSession> {
        ctx.authorize(tenant_id, Operation::Mutate)?;
        self.tenants.ensure_writable(tenant_id).await?;

        let session = self.load(tenant_id, session_id).await?;
        if !session.is_active {
            return Ok(session);
        }

        let session = self
            .apply(tenant_id, &session, SessionTransition::Deactivate)
            .await?;
        info!(tenant_id = %tenant_id, session_id = %session_id, "Session deactivated");
        Ok(session)
    }

    pub async fn archive_session(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> ScholarisResult<AcademicSession> {
        ctx.authorize(tenant_id, Operation::Mutate)?;
        self.tenants.ensure_writable(tenant_id).await?;

        let session = self.load(tenant_id, session_id).await?;
        if session.is_active {
            return Err(EngineError::ArchiveActive.into());
        }
        if session.archived {
            return Err(EngineError::AlreadyArchived.into());
        }

        let session = self
            .apply(tenant_id, &session, SessionTransition::Archive)
            .await?;
        info!(tenant_id = %tenant_id, session_id = %session_id, "Session archived");
        Ok(session)
    }

    pub async fn unarchive_session(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> ScholarisResult<AcademicSession> {
        ctx.authorize(tenant_id, Operation::Mutate)?;
        self.tenants.ensure_writable(tenant_id).await?;

        let session = self.load(tenant_id, session_id).await?;
        if !session.archived {
            return Err(EngineError::NotArchived.into());
        }

        let session = self
            .apply(tenant_id, &session, SessionTransition::Unarchive)
            .await?;
        info!(tenant_id = %tenant_id, session_id = %session_id, "Session unarchived");
        Ok(session)
    }

    async fn apply(
        &self,
        tenant_id: Uuid,
        session: &AcademicSession,
        transition: SessionTransition,
    ) -> ScholarisResult<AcademicSession> {
        self.session_repo
            .transition(tenant_id, session.id, session.version, transition)
            .await
    }
}
