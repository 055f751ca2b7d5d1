//! Tenant registry and the frozen/deleted guards every service applies.

use scholaris_core::error::ScholarisResult;
use scholaris_core::models::principal::Role;
use scholaris_core::models::tenant::{CreateTenant, Tenant, UpdateTenant};
use scholaris_core::repository::{PaginatedResult, TenantRepository};
use scholaris_core::scope::{AccessContext, Operation};
use tracing::info;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::EngineError;

fn require_superadmin(ctx: &AccessContext) -> ScholarisResult<()> {
    match ctx.role {
        Role::SuperAdmin => Ok(()),
        Role::Admin | Role::Teacher => Err(EngineError::SuperAdminRequired.into()),
    }
}

#[derive(Clone)]
pub struct TenantRegistry<T: TenantRepository> {
    tenant_repo: T,
    config: EngineConfig,
}

impl<T: TenantRepository> TenantRegistry<T> {
    pub fn new(tenant_repo: T, config: EngineConfig) -> Self {
        Self {
            tenant_repo,
            config,
        }
    }

    /// Load a tenant that may be read: it exists and is not deleted.
    pub async fn ensure_readable(&self, tenant_id: Uuid) -> ScholarisResult<Tenant> {
        let tenant = self.tenant_repo.get_by_id(tenant_id).await?;
        if tenant.is_deleted() {
            return Err(EngineError::TenantDeleted.into());
        }
        Ok(tenant)
    }

    /// Load a tenant that may be mutated: readable and not frozen.
    pub async fn ensure_writable(&self, tenant_id: Uuid) -> ScholarisResult<Tenant> {
        let tenant = self.ensure_readable(tenant_id).await?;
        if tenant.frozen {
            return Err(EngineError::TenantFrozen.into());
        }
        Ok(tenant)
    }

    pub async fn create_tenant(
        &self,
        ctx: &AccessContext,
        input: CreateTenant,
    ) -> ScholarisResult<Tenant> {
        require_superadmin(ctx)?;
        let tenant = self.tenant_repo.create(input).await?;
        info!(tenant_id = %tenant.id, by = %ctx.subject_id, "Tenant created");
        Ok(tenant)
    }

    pub async fn get_tenant(&self, ctx: &AccessContext, tenant_id: Uuid) -> ScholarisResult<Tenant> {
        ctx.authorize(tenant_id, Operation::Read)?;
        self.ensure_readable(tenant_id).await
    }

    /// Change status or the frozen flag. Platform operators only.
    pub async fn update_tenant(
        &self,
        ctx: &AccessContext,
        tenant_id: Uuid,
        input: UpdateTenant,
    ) -> ScholarisResult<Tenant> {
        require_superadmin(ctx)?;
        let tenant = self.tenant_repo.update(tenant_id, input).await?;
        info!(
            tenant_id = %tenant.id,
            frozen = tenant.frozen,
            status = ?tenant.status,
            "Tenant updated"
        );
        Ok(tenant)
    }

    /// Every tenant, oldest first, deleted ones included.
    pub async fn list_tenants(
        &self,
        ctx: &AccessContext,
        page: u64,
        page_size: u64,
    ) -> ScholarisResult<PaginatedResult<Tenant>> {
        require_superadmin(ctx)?;
        let pagination = self.config.pagination(page, page_size)?;
        self.tenant_repo.list(pagination).await
    }
}
