//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Tenant-scoped repositories
//! require a `tenant_id` parameter to enforce data isolation: a record
//! owned by another tenant is reported as not found.
//!
//! Lifecycle writes are compare-and-swap: the caller passes the
//! `version` it read, and the write fails with a conflict if the stored
//! row has moved on.

use uuid::Uuid;

use crate::error::ScholarisResult;
use crate::models::{
    academic_session::{AcademicSession, CreateAcademicSession, SessionTransition},
    class::{Class, CreateClass},
    student::{CreateStudent, Student, StudentFilter, UpdateStudent},
    tenant::{CreateTenant, Tenant, UpdateTenant},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

impl Pagination {
    /// Build from a 1-based page number and a page size. Returns `None`
    /// when the offset does not fit in a `u64`.
    pub fn page(page: u64, page_size: u64) -> Option<Self> {
        let offset = page.saturating_sub(1).checked_mul(page_size)?;
        Some(Self {
            offset,
            limit: page_size,
        })
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenant (global scope)
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = ScholarisResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = ScholarisResult<Tenant>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateTenant,
    ) -> impl Future<Output = ScholarisResult<Tenant>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = ScholarisResult<PaginatedResult<Tenant>>> + Send;
}

// ---------------------------------------------------------------------------
// Tenant-scoped repositories
// ---------------------------------------------------------------------------

pub trait AcademicSessionRepository: Send + Sync {
    /// Create an inactive, unarchived session. Duplicate names within a
    /// tenant fail with a conflict.
    fn create(
        &self,
        input: CreateAcademicSession,
    ) -> impl Future<Output = ScholarisResult<AcademicSession>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = ScholarisResult<AcademicSession>> + Send;
    /// The tenant owning session `id`, looked up without a tenant
    /// filter. `None` when no such session exists.
    fn owner_of(&self, id: Uuid) -> impl Future<Output = ScholarisResult<Option<Uuid>>> + Send;
    /// The tenant's active session, if any.
    fn get_active(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = ScholarisResult<Option<AcademicSession>>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = ScholarisResult<PaginatedResult<AcademicSession>>> + Send;

    /// Make `id` the tenant's only active session in one transaction.
    ///
    /// Every other active session of the tenant is deactivated in the
    /// same transaction. Fails with a conflict if the session changed
    /// since `expected_version` or a concurrent activation won.
    fn activate(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: u64,
    ) -> impl Future<Output = ScholarisResult<AcademicSession>> + Send;

    /// Apply a non-activating lifecycle transition as a CAS update.
    fn transition(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: u64,
        transition: SessionTransition,
    ) -> impl Future<Output = ScholarisResult<AcademicSession>> + Send;
}

pub trait ClassRepository: Send + Sync {
    /// Create a class. Rejected if the session is archived or missing,
    /// or the name is taken within the session.
    fn create(&self, input: CreateClass) -> impl Future<Output = ScholarisResult<Class>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = ScholarisResult<Class>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = ScholarisResult<PaginatedResult<Class>>> + Send;

    /// Set the frozen flag as a CAS update. The owning session must
    /// still be active and unarchived when the write commits.
    fn set_frozen(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: u64,
        frozen: bool,
    ) -> impl Future<Output = ScholarisResult<Class>> + Send;
}

pub trait StudentRepository: Send + Sync {
    /// Create a student in its own transaction, enforcing admission
    /// number uniqueness, class/session consistency and the class
    /// freeze.
    fn create(&self, input: CreateStudent)
    -> impl Future<Output = ScholarisResult<Student>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = ScholarisResult<Student>> + Send;
    fn find_by_admission_no(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        admission_no: &str,
    ) -> impl Future<Output = ScholarisResult<Option<Student>>> + Send;
    /// The record in `session_id` that was promoted from `source_id`.
    fn find_promoted_from(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        source_id: Uuid,
    ) -> impl Future<Output = ScholarisResult<Option<Student>>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: u64,
        input: UpdateStudent,
    ) -> impl Future<Output = ScholarisResult<Student>> + Send;
    fn delete(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: u64,
    ) -> impl Future<Output = ScholarisResult<()>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        filter: StudentFilter,
        pagination: Pagination,
    ) -> impl Future<Output = ScholarisResult<PaginatedResult<Student>>> + Send;
    /// Every student of the session matching `filter`, unpaginated.
    fn list_all(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        filter: StudentFilter,
    ) -> impl Future<Output = ScholarisResult<Vec<Student>>> + Send;
}

/// Monotonic per-session counter backing generated admission numbers.
pub trait AdmissionCounterRepository: Send + Sync {
    /// Atomically increment and return the next value (starting at 1).
    fn next_value(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> impl Future<Output = ScholarisResult<u64>> + Send;
}
