//! SurrealDB implementation of [`ClassRepository`].

use chrono::{DateTime, Utc};
use scholaris_core::error::{ScholarisError, ScholarisResult};
use scholaris_core::models::class::{Class, CreateClass};
use scholaris_core::repository::{ClassRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::CountRow;
use crate::error::{DbError, parse_uuid};

const CREATE_QUERY: &str = "\
BEGIN TRANSACTION;
LET $session = (SELECT archived FROM type::record('academic_session', $session_id) \
    WHERE tenant_id = $tenant_id)[0];
IF $session IS NONE OR $session.archived = true { THROW 'session not writable'; };
CREATE type::record('class', $id) SET \
    tenant_id = $tenant_id, session_id = $session_id, name = $name, \
    frozen = false, version = 0;
COMMIT TRANSACTION;";

const SET_FROZEN_QUERY: &str = "\
BEGIN TRANSACTION;
LET $class = (SELECT session_id FROM type::record('class', $id) \
    WHERE tenant_id = $tenant_id)[0];
IF $class IS NONE { THROW 'class not found'; };
LET $session = (SELECT is_active, archived \
    FROM type::record('academic_session', $class.session_id))[0];
IF $session IS NONE OR $session.is_active != true OR $session.archived = true \
    { THROW 'session not active'; };
LET $claimed = (UPDATE type::record('class', $id) SET \
    frozen = $frozen, version += 1, updated_at = time::now() \
    WHERE tenant_id = $tenant_id AND frozen != $frozen AND version = $version \
    RETURN AFTER);
IF array::len($claimed) = 0 { THROW 'class claim failed'; };
COMMIT TRANSACTION;";

#[derive(Debug, SurrealValue)]
struct ClassRow {
    tenant_id: String,
    session_id: String,
    name: String,
    frozen: bool,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct ClassRowWithId {
    record_id: String,
    tenant_id: String,
    session_id: String,
    name: String,
    frozen: bool,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn row_to_class(row: ClassRow, id: Uuid) -> Result<Class, DbError> {
    Ok(Class {
        id,
        tenant_id: parse_uuid(&row.tenant_id, "tenant")?,
        session_id: parse_uuid(&row.session_id, "session")?,
        name: row.name,
        frozen: row.frozen,
        version: row.version,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

impl ClassRowWithId {
    fn try_into_class(self) -> Result<Class, DbError> {
        let id = parse_uuid(&self.record_id, "class")?;
        row_to_class(
            ClassRow {
                tenant_id: self.tenant_id,
                session_id: self.session_id,
                name: self.name,
                frozen: self.frozen,
                version: self.version,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            id,
        )
    }
}

#[derive(Debug, SurrealValue)]
struct SessionFlags {
    is_active: bool,
    archived: bool,
}

/// SurrealDB implementation of the Class repository.
#[derive(Clone)]
pub struct SurrealClassRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealClassRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn session_flags(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<SessionFlags>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT is_active, archived FROM type::record('academic_session', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", session_id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await?;
        let rows: Vec<SessionFlags> = result.take(0)?;
        Ok(rows.into_iter().next())
    }

    async fn name_taken(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        name: &str,
    ) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM class \
                 WHERE tenant_id = $tenant_id AND session_id = $session_id \
                 AND name = $name GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("session_id", session_id.to_string()))
            .bind(("name", name.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }

    async fn explain_failed_create(
        &self,
        input: &CreateClass,
        cause: String,
    ) -> Result<ScholarisError, DbError> {
        let Some(flags) = self.session_flags(input.tenant_id, input.session_id).await? else {
            return Ok(ScholarisError::not_found(
                "academic_session",
                input.session_id,
            ));
        };
        if flags.archived {
            return Ok(ScholarisError::forbidden("session is archived"));
        }
        if self
            .name_taken(input.tenant_id, input.session_id, &input.name)
            .await?
        {
            return Ok(ScholarisError::conflict(format!(
                "class named '{}' already exists in this session",
                input.name
            )));
        }
        Ok(DbError::TransactionAborted(cause).into())
    }

    async fn explain_failed_freeze(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: u64,
        frozen: bool,
        cause: String,
    ) -> ScholarisResult<ScholarisError> {
        let current = match self.get_by_id(tenant_id, id).await {
            Ok(c) => c,
            Err(e) => return Ok(e),
        };
        if current.version != expected_version {
            return Ok(ScholarisError::conflict("class was modified concurrently"));
        }
        let flags = self.session_flags(tenant_id, current.session_id).await?;
        let err = match flags {
            Some(f) if f.is_active && !f.archived => {
                if current.frozen == frozen {
                    ScholarisError::conflict(if frozen {
                        "class is already frozen"
                    } else {
                        "class is already unfrozen"
                    })
                } else {
                    DbError::TransactionAborted(cause).into()
                }
            }
            _ => ScholarisError::conflict("session of class is not active"),
        };
        Ok(err)
    }
}

impl<C: Connection> ClassRepository for SurrealClassRepository<C> {
    async fn create(&self, input: CreateClass) -> ScholarisResult<Class> {
        let id = Uuid::new_v4();

        let response = self
            .db
            .query(CREATE_QUERY)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("session_id", input.session_id.to_string()))
            .bind(("name", input.name.clone()))
            .await
            .map_err(DbError::from)?;

        if let Err(e) = response.check() {
            return Err(self.explain_failed_create(&input, e.to_string()).await?);
        }

        self.get_by_id(input.tenant_id, id).await
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> ScholarisResult<Class> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('class', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ClassRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "class".into(),
            id: id_str,
        })?;

        Ok(row_to_class(row, id)?)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        pagination: Pagination,
    ) -> ScholarisResult<PaginatedResult<Class>> {
        let tenant_id_str = tenant_id.to_string();
        let session_id_str = session_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM class \
                 WHERE tenant_id = $tenant_id AND session_id = $session_id \
                 GROUP ALL",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .bind(("session_id", session_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM class \
                 WHERE tenant_id = $tenant_id AND session_id = $session_id \
                 ORDER BY name ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("tenant_id", tenant_id_str))
            .bind(("session_id", session_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ClassRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_class())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn set_frozen(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: u64,
        frozen: bool,
    ) -> ScholarisResult<Class> {
        let response = self
            .db
            .query(SET_FROZEN_QUERY)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("version", expected_version))
            .bind(("frozen", frozen))
            .await
            .map_err(DbError::from)?;

        if let Err(e) = response.check() {
            return Err(self
                .explain_failed_freeze(tenant_id, id, expected_version, frozen, e.to_string())
                .await?);
        }

        self.get_by_id(tenant_id, id).await
    }
}
