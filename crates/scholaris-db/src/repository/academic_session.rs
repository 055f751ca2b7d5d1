//! SurrealDB implementation of [`AcademicSessionRepository`].
//!
//! Lifecycle writes run as transactions that first claim the row with a
//! version-checked UPDATE and THROW when the claim matches nothing, so a
//! stale caller never commits a partial transition. Activation also
//! upserts the tenant's `active_session` pointer record; two concurrent
//! activations of one tenant write the same key and the store lets only
//! one of them commit.

use chrono::{DateTime, Utc};
use scholaris_core::error::{ScholarisError, ScholarisResult};
use scholaris_core::models::academic_session::{
    AcademicSession, CreateAcademicSession, SessionTransition,
};
use scholaris_core::repository::{AcademicSessionRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, warn};
use uuid::Uuid;

use super::CountRow;
use crate::error::{DbError, parse_uuid};

const ACTIVATE_QUERY: &str = "\
BEGIN TRANSACTION;
LET $claimed = (UPDATE type::record('academic_session', $id) SET \
    is_active = true, version += 1, updated_at = time::now() \
    WHERE tenant_id = $tenant_id AND archived = false AND version = $version \
    RETURN AFTER);
IF array::len($claimed) = 0 { THROW 'session claim failed'; };
UPDATE academic_session SET \
    is_active = false, version += 1, updated_at = time::now() \
    WHERE tenant_id = $tenant_id AND is_active = true AND meta::id(id) != $id;
UPSERT type::record('active_session', $tenant_id) SET \
    session_id = $id, updated_at = time::now();
COMMIT TRANSACTION;";

const DEACTIVATE_QUERY: &str = "\
BEGIN TRANSACTION;
LET $claimed = (UPDATE type::record('academic_session', $id) SET \
    is_active = false, version += 1, updated_at = time::now() \
    WHERE tenant_id = $tenant_id AND version = $version \
    RETURN AFTER);
IF array::len($claimed) = 0 { THROW 'session claim failed'; };
DELETE type::record('active_session', $tenant_id) WHERE session_id = $id;
COMMIT TRANSACTION;";

const ARCHIVE_QUERY: &str = "\
BEGIN TRANSACTION;
LET $claimed = (UPDATE type::record('academic_session', $id) SET \
    archived = true, archived_at = time::now(), \
    version += 1, updated_at = time::now() \
    WHERE tenant_id = $tenant_id AND is_active = false AND version = $version \
    RETURN AFTER);
IF array::len($claimed) = 0 { THROW 'session claim failed'; };
COMMIT TRANSACTION;";

const UNARCHIVE_QUERY: &str = "\
BEGIN TRANSACTION;
LET $claimed = (UPDATE type::record('academic_session', $id) SET \
    archived = false, archived_at = NONE, \
    version += 1, updated_at = time::now() \
    WHERE tenant_id = $tenant_id AND archived = true AND version = $version \
    RETURN AFTER);
IF array::len($claimed) = 0 { THROW 'session claim failed'; };
COMMIT TRANSACTION;";

#[derive(Debug, SurrealValue)]
struct SessionRow {
    tenant_id: String,
    name: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    is_active: bool,
    archived: bool,
    archived_at: Option<DateTime<Utc>>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct OwnerRow {
    tenant_id: String,
}

#[derive(Debug, SurrealValue)]
struct SessionRowWithId {
    record_id: String,
    tenant_id: String,
    name: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    is_active: bool,
    archived: bool,
    archived_at: Option<DateTime<Utc>>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self, id: Uuid) -> Result<AcademicSession, DbError> {
        Ok(AcademicSession {
            id,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            name: self.name,
            start_date: self.start_date,
            end_date: self.end_date,
            is_active: self.is_active,
            archived: self.archived,
            archived_at: self.archived_at,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl SessionRowWithId {
    fn try_into_session(self) -> Result<AcademicSession, DbError> {
        let id = parse_uuid(&self.record_id, "session")?;
        SessionRow {
            tenant_id: self.tenant_id,
            name: self.name,
            start_date: self.start_date,
            end_date: self.end_date,
            is_active: self.is_active,
            archived: self.archived,
            archived_at: self.archived_at,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_session(id)
    }
}

/// SurrealDB implementation of the academic session repository.
#[derive(Clone)]
pub struct SurrealAcademicSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAcademicSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn name_taken(&self, tenant_id: Uuid, name: &str) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM academic_session \
                 WHERE tenant_id = $tenant_id AND name = $name GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("name", name.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }

    /// Reload the row after an aborted write to report why it failed.
    async fn explain_failed_write(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: u64,
        cause: String,
    ) -> ScholarisError {
        match self.get_by_id(tenant_id, id).await {
            Err(e) => e,
            Ok(current) if current.version != expected_version => {
                debug!(
                    session_id = %id,
                    expected_version,
                    current_version = current.version,
                    "Session changed before write committed"
                );
                ScholarisError::conflict("session was modified concurrently")
            }
            Ok(_) => DbError::TransactionAborted(cause).into(),
        }
    }

    async fn run_transition(
        &self,
        query: &'static str,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: u64,
    ) -> ScholarisResult<AcademicSession> {
        let response = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("version", expected_version))
            .await
            .map_err(DbError::from)?;

        if let Err(e) = response.check() {
            return Err(self
                .explain_failed_write(tenant_id, id, expected_version, e.to_string())
                .await);
        }

        self.get_by_id(tenant_id, id).await
    }
}

impl<C: Connection> AcademicSessionRepository for SurrealAcademicSessionRepository<C> {
    async fn create(&self, input: CreateAcademicSession) -> ScholarisResult<AcademicSession> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let tenant_id = input.tenant_id;
        let name = input.name.clone();

        let result = self
            .db
            .query(
                "CREATE type::record('academic_session', $id) SET \
                 tenant_id = $tenant_id, name = $name, \
                 start_date = $start_date, end_date = $end_date, \
                 is_active = false, archived = false, \
                 archived_at = NONE, version = 0",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("name", input.name))
            .bind(("start_date", input.start_date))
            .bind(("end_date", input.end_date))
            .await
            .map_err(DbError::from)?;

        let mut result = match result.check() {
            Ok(r) => r,
            Err(e) => {
                if self.name_taken(tenant_id, &name).await? {
                    return Err(DbError::Conflict(format!(
                        "session named '{name}' already exists"
                    ))
                    .into());
                }
                return Err(DbError::from(e).into());
            }
        };

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "academic_session".into(),
            id: id_str,
        })?;

        Ok(row.into_session(id)?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> ScholarisResult<AcademicSession> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('academic_session', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "academic_session".into(),
            id: id_str,
        })?;

        Ok(row.into_session(id)?)
    }

    async fn owner_of(&self, id: Uuid) -> ScholarisResult<Option<Uuid>> {
        let mut result = self
            .db
            .query("SELECT tenant_id FROM type::record('academic_session', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OwnerRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .next()
            .map(|row| parse_uuid(&row.tenant_id, "tenant"))
            .transpose()
            .map_err(Into::into)
    }

    async fn get_active(&self, tenant_id: Uuid) -> ScholarisResult<Option<AcademicSession>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM academic_session \
                 WHERE tenant_id = $tenant_id AND is_active = true",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRowWithId> = result.take(0).map_err(DbError::from)?;
        if rows.len() > 1 {
            warn!(
                tenant_id = %tenant_id,
                count = rows.len(),
                "More than one active session found"
            );
            return Err(ScholarisError::Internal(format!(
                "tenant {tenant_id} has {} active sessions",
                rows.len()
            )));
        }

        rows.into_iter()
            .next()
            .map(|row| row.try_into_session())
            .transpose()
            .map_err(Into::into)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> ScholarisResult<PaginatedResult<AcademicSession>> {
        let tenant_id_str = tenant_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM academic_session \
                 WHERE tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM academic_session \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY start_date DESC \
                 LIMIT $limit START $offset",
            )
            .bind(("tenant_id", tenant_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_session())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn activate(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: u64,
    ) -> ScholarisResult<AcademicSession> {
        self.run_transition(ACTIVATE_QUERY, tenant_id, id, expected_version)
            .await
    }

    async fn transition(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: u64,
        transition: SessionTransition,
    ) -> ScholarisResult<AcademicSession> {
        let query = match transition {
            SessionTransition::Deactivate => DEACTIVATE_QUERY,
            SessionTransition::Archive => ARCHIVE_QUERY,
            SessionTransition::Unarchive => UNARCHIVE_QUERY,
        };
        self.run_transition(query, tenant_id, id, expected_version)
            .await
    }
}
