//! Tenant scoping: the authorization boundary every request crosses.
//!
//! [`resolve`] turns an authenticated principal plus the tenant ids a
//! request carries into an [`AccessContext`]. Services then call
//! [`AccessContext::authorize`] with the tenant they are about to touch.
//! Resolution is a pure function; nothing here performs I/O.

use uuid::Uuid;

use crate::error::{ScholarisError, ScholarisResult};
use crate::models::principal::{Principal, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Mutate,
}

/// Tenant ids as they arrived on the request, unparsed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestTenant<'a> {
    /// Out-of-body parameter, e.g. the query string.
    pub query: Option<&'a str>,
    /// Tenant id found in the request body.
    pub body: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantScope {
    Tenant(Uuid),
    /// Superadmin read without a tenant filter.
    AllTenants,
}

#[derive(Debug, Clone)]
pub struct AccessContext {
    pub subject_id: String,
    pub role: Role,
    pub scope: TenantScope,
}

fn parse_tenant_id(raw: &str) -> ScholarisResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ScholarisError::validation(format!("malformed tenant id: {raw}")))
}

/// Derive the effective tenant scope of a request.
pub fn resolve(
    principal: Option<&Principal>,
    request: RequestTenant<'_>,
    operation: Operation,
) -> ScholarisResult<AccessContext> {
    let principal = principal.ok_or(ScholarisError::Unauthenticated)?;
    let query = request.query.map(parse_tenant_id).transpose()?;
    let body = request.body.map(parse_tenant_id).transpose()?;

    let scope = match principal.role {
        Role::SuperAdmin => match (query, operation) {
            (Some(tenant_id), _) => {
                if body.is_some_and(|b| b != tenant_id) {
                    return Err(ScholarisError::forbidden(
                        "body tenant id does not match the requested tenant",
                    ));
                }
                TenantScope::Tenant(tenant_id)
            }
            (None, Operation::Read) => TenantScope::AllTenants,
            (None, Operation::Mutate) => {
                return Err(ScholarisError::validation("tenant id required"));
            }
        },
        Role::Admin | Role::Teacher => {
            if body.is_some() {
                return Err(ScholarisError::forbidden(
                    "tenant id may not be supplied in the request body",
                ));
            }
            let own = principal
                .tenant_id
                .ok_or_else(|| ScholarisError::forbidden("principal is not bound to a tenant"))?;
            if query.is_some_and(|q| q != own) {
                return Err(ScholarisError::forbidden(
                    "requested tenant does not match the principal's tenant",
                ));
            }
            TenantScope::Tenant(own)
        }
    };

    Ok(AccessContext {
        subject_id: principal.subject_id.clone(),
        role: principal.role,
        scope,
    })
}

impl AccessContext {
    /// Check that this context may perform `operation` on `tenant_id`.
    ///
    /// A mismatching tenant is always `Forbidden`, never a silent filter.
    /// Mutations additionally require an administrative role.
    pub fn authorize(&self, tenant_id: Uuid, operation: Operation) -> ScholarisResult<()> {
        match self.scope {
            TenantScope::Tenant(own) if own != tenant_id => {
                return Err(ScholarisError::forbidden(format!(
                    "access to tenant {tenant_id} is not permitted"
                )));
            }
            TenantScope::AllTenants if operation == Operation::Mutate => {
                return Err(ScholarisError::validation("tenant id required"));
            }
            _ => {}
        }

        if operation == Operation::Mutate {
            match self.role {
                Role::SuperAdmin | Role::Admin => {}
                Role::Teacher => {
                    return Err(ScholarisError::forbidden(
                        "role TEACHER may not perform this operation",
                    ));
                }
            }
        }
        Ok(())
    }

    /// The tenant a listing should be restricted to; `None` for a
    /// superadmin cross-tenant read.
    pub fn tenant_filter(&self) -> Option<Uuid> {
        match self.scope {
            TenantScope::Tenant(id) => Some(id),
            TenantScope::AllTenants => None,
        }
    }
}
