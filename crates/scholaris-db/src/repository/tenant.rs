//! SurrealDB implementation of [`TenantRepository`].

use chrono::{DateTime, Utc};
use scholaris_core::error::ScholarisResult;
use scholaris_core::models::tenant::{CreateTenant, Tenant, TenantStatus, UpdateTenant};
use scholaris_core::repository::{PaginatedResult, Pagination, TenantRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::CountRow;
use crate::error::{DbError, parse_uuid};

/// Every statement projects the record key as `record_id`.
const PROJECTION: &str = "meta::id(id) AS record_id, name, status, frozen, created_at, updated_at";

#[derive(Debug, SurrealValue)]
struct TenantRow {
    record_id: String,
    name: String,
    status: String,
    frozen: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn status_label(status: TenantStatus) -> &'static str {
    match status {
        TenantStatus::Active => "Active",
        TenantStatus::Deleted => "Deleted",
    }
}

fn parse_status(raw: &str) -> Result<TenantStatus, DbError> {
    match raw {
        "Active" => Ok(TenantStatus::Active),
        "Deleted" => Ok(TenantStatus::Deleted),
        other => Err(DbError::Decode(format!("unknown tenant status: {other}"))),
    }
}

impl TryFrom<TenantRow> for Tenant {
    type Error = DbError;

    fn try_from(row: TenantRow) -> Result<Self, DbError> {
        Ok(Tenant {
            id: parse_uuid(&row.record_id, "tenant")?,
            name: row.name,
            status: parse_status(&row.status)?,
            frozen: row.frozen,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn single(rows: Vec<TenantRow>, id: Uuid) -> ScholarisResult<Tenant> {
    let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
        entity: "tenant".into(),
        id: id.to_string(),
    })?;
    Ok(Tenant::try_from(row)?)
}

/// Tenants live in the global scope; every other table references them
/// by `tenant_id`.
#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: CreateTenant) -> ScholarisResult<Tenant> {
        let id = Uuid::new_v4();

        let mut result = self
            .db
            .query(format!(
                "CREATE type::record('tenant', $id) SET \
                 name = $name, status = $status, frozen = false; \
                 SELECT {PROJECTION} FROM type::record('tenant', $id);"
            ))
            .bind(("id", id.to_string()))
            .bind(("name", input.name))
            .bind(("status", status_label(TenantStatus::Active)))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        single(result.take(1).map_err(DbError::from)?, id)
    }

    async fn get_by_id(&self, id: Uuid) -> ScholarisResult<Tenant> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {PROJECTION} FROM type::record('tenant', $id)"
            ))
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        single(result.take(0).map_err(DbError::from)?, id)
    }

    async fn update(&self, id: Uuid, input: UpdateTenant) -> ScholarisResult<Tenant> {
        let UpdateTenant {
            name,
            status,
            frozen,
        } = input;

        let mut sets = vec!["updated_at = time::now()"];
        if name.is_some() {
            sets.push("name = $name");
        }
        if status.is_some() {
            sets.push("status = $status");
        }
        if frozen.is_some() {
            sets.push("frozen = $frozen");
        }

        // UPDATE never creates the record; a missing tenant leaves the
        // trailing SELECT empty.
        let query = format!(
            "UPDATE type::record('tenant', $id) SET {}; \
             SELECT {PROJECTION} FROM type::record('tenant', $id);",
            sets.join(", ")
        );
        let mut builder = self.db.query(query).bind(("id", id.to_string()));
        if let Some(name) = name {
            builder = builder.bind(("name", name));
        }
        if let Some(status) = status {
            builder = builder.bind(("status", status_label(status)));
        }
        if let Some(frozen) = frozen {
            builder = builder.bind(("frozen", frozen));
        }

        let mut result = builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        single(result.take(1).map_err(DbError::from)?, id)
    }

    async fn list(&self, pagination: Pagination) -> ScholarisResult<PaginatedResult<Tenant>> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM tenant GROUP ALL")
            .query(format!(
                "SELECT {PROJECTION} FROM tenant \
                 ORDER BY created_at ASC LIMIT $limit START $offset"
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let counts: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<TenantRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(Tenant::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PaginatedResult {
            items,
            total: counts.first().map_or(0, |c| c.total),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
