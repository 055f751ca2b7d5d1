//! SurrealDB implementation of [`AdmissionCounterRepository`].

use scholaris_core::error::ScholarisResult;
use scholaris_core::repository::AdmissionCounterRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct CounterRow {
    seq: u64,
}

/// One counter record per `(tenant, session)`, incremented with a single
/// UPSERT so concurrent callers never observe the same value.
#[derive(Clone)]
pub struct SurrealAdmissionCounterRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAdmissionCounterRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AdmissionCounterRepository for SurrealAdmissionCounterRepository<C> {
    async fn next_value(&self, tenant_id: Uuid, session_id: Uuid) -> ScholarisResult<u64> {
        let key = format!("{tenant_id}_{session_id}");

        let result = self
            .db
            .query(
                "UPSERT type::record('admission_counter', $key) SET \
                 tenant_id = $tenant_id, session_id = $session_id, \
                 seq += 1 \
                 RETURN AFTER",
            )
            .bind(("key", key.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("session_id", session_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<CounterRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "admission_counter".into(),
            id: key,
        })?;

        Ok(row.seq)
    }
}
