//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode. UUIDs are stored as
//! strings. Uniqueness invariants are unique indexes so the store, not
//! the application, arbitrates concurrent writers.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "admission_counters",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1: tenants, sessions, classes, students
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants (global scope)
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD status ON TABLE tenant TYPE string \
    ASSERT $value IN ['Active', 'Deleted'];
DEFINE FIELD frozen ON TABLE tenant TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Academic sessions (tenant scope)
-- =======================================================================
DEFINE TABLE academic_session SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE academic_session TYPE string;
DEFINE FIELD name ON TABLE academic_session TYPE string;
DEFINE FIELD start_date ON TABLE academic_session TYPE datetime;
DEFINE FIELD end_date ON TABLE academic_session TYPE datetime;
DEFINE FIELD is_active ON TABLE academic_session TYPE bool DEFAULT false;
DEFINE FIELD archived ON TABLE academic_session TYPE bool DEFAULT false;
DEFINE FIELD archived_at ON TABLE academic_session TYPE option<datetime>;
DEFINE FIELD version ON TABLE academic_session TYPE int DEFAULT 0;
DEFINE FIELD created_at ON TABLE academic_session TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE academic_session TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_academic_session_tenant_name ON TABLE academic_session \
    COLUMNS tenant_id, name UNIQUE;
DEFINE INDEX idx_academic_session_tenant_active ON TABLE academic_session \
    COLUMNS tenant_id, is_active;

-- Per-tenant pointer to the active session. The record id is the tenant
-- id, so concurrent activations of one tenant write the same key.
DEFINE TABLE active_session SCHEMAFULL;
DEFINE FIELD session_id ON TABLE active_session TYPE string;
DEFINE FIELD updated_at ON TABLE active_session TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Classes (tenant + session scope)
-- =======================================================================
DEFINE TABLE class SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE class TYPE string;
DEFINE FIELD session_id ON TABLE class TYPE string;
DEFINE FIELD name ON TABLE class TYPE string;
DEFINE FIELD frozen ON TABLE class TYPE bool DEFAULT false;
DEFINE FIELD version ON TABLE class TYPE int DEFAULT 0;
DEFINE FIELD created_at ON TABLE class TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE class TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_class_tenant_session_name ON TABLE class \
    COLUMNS tenant_id, session_id, name UNIQUE;

-- =======================================================================
-- Students (tenant + session scope)
-- =======================================================================
DEFINE TABLE student SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE student TYPE string;
DEFINE FIELD session_id ON TABLE student TYPE string;
DEFINE FIELD class_id ON TABLE student TYPE option<string>;
DEFINE FIELD admission_no ON TABLE student TYPE string;
DEFINE FIELD profile ON TABLE student TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD promoted_from ON TABLE student TYPE option<string>;
DEFINE FIELD version ON TABLE student TYPE int DEFAULT 0;
DEFINE FIELD created_at ON TABLE student TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE student TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_student_tenant_session_admission ON TABLE student \
    COLUMNS tenant_id, session_id, admission_no UNIQUE;
DEFINE INDEX idx_student_tenant_session_class ON TABLE student \
    COLUMNS tenant_id, session_id, class_id;
DEFINE INDEX idx_student_promoted_from ON TABLE student \
    COLUMNS tenant_id, session_id, promoted_from;
";

// -----------------------------------------------------------------------
// Schema v2: admission number counters
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
DEFINE TABLE admission_counter SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE admission_counter TYPE string;
DEFINE FIELD session_id ON TABLE admission_counter TYPE string;
DEFINE FIELD seq ON TABLE admission_counter TYPE int DEFAULT 0;
";

async fn applied_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT version, name FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    Ok(records.first().map_or(0, |m| m.version))
}

/// Apply one migration, then record it in `_migration`.
async fn apply<C: Connection>(db: &Surreal<C>, migration: &Migration) -> Result<(), DbError> {
    let failed = |stage: &str, e: surrealdb::Error| {
        DbError::Migration(format!(
            "v{} ({}) {stage}: {e}",
            migration.version, migration.name
        ))
    };

    db.query(migration.sql)
        .await?
        .check()
        .map_err(|e| failed("did not apply", e))?;
    db.query("CREATE _migration SET version = $version, name = $name")
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| failed("could not be recorded", e))?;
    Ok(())
}

/// Bring the database up to [`latest_schema_version`].
///
/// Safe to call on every start: versions already recorded in
/// `_migration` are skipped.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(format!("migration table: {e}")))?;

    let current = applied_version(db).await?;
    let pending = MIGRATIONS.iter().filter(|m| m.version > current);
    for migration in pending {
        info!(
            from = current,
            version = migration.version,
            name = migration.name,
            "Applying schema migration"
        );
        apply(db, migration).await?;
    }

    Ok(())
}

/// Latest schema version known to this build.
pub fn latest_schema_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}
