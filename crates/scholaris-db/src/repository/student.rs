//! SurrealDB implementation of [`StudentRepository`].
//!
//! Every write runs in its own transaction that re-checks, at commit
//! time, that the session is not archived and that the class involved
//! belongs to the same tenant and session and is not frozen. Admission
//! number uniqueness is a unique index. When a transaction aborts the
//! repository reloads the relevant rows to report a precise error.

use chrono::{DateTime, Utc};
use scholaris_core::error::{ScholarisError, ScholarisResult};
use scholaris_core::models::student::{
    CreateStudent, Student, StudentFilter, StudentProfile, UpdateStudent,
};
use scholaris_core::repository::{PaginatedResult, Pagination, StudentRepository};
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
IF $class_id IS NOT NONE {
    LET $class = (SELECT session_id, frozen FROM type::record('class', $class_id) \
        WHERE tenant_id = $tenant_id)[0];
    IF $class IS NONE OR $class.session_id != $session_id OR $class.frozen = true \
        { THROW 'class not writable'; };
};
CREATE type::record('student', $id) SET \
    tenant_id = $tenant_id, session_id = $session_id, class_id = $class_id, \
    admission_no = $admission_no, profile = $profile, \
    promoted_from = $promoted_from, version = 0;
COMMIT TRANSACTION;";

/// Guards shared by update and delete. Expects `$id`, `$tenant_id` and
/// leaves the current row in `$current`.
const EXISTING_GUARDS: &str = "\
LET $current = (SELECT session_id, class_id FROM type::record('student', $id) \
    WHERE tenant_id = $tenant_id)[0];
IF $current IS NONE { THROW 'student not found'; };
LET $session = (SELECT archived FROM type::record('academic_session', $current.session_id))[0];
IF $session IS NONE OR $session.archived = true { THROW 'session not writable'; };
IF $current.class_id IS NOT NONE {
    LET $old_class = (SELECT frozen FROM type::record('class', $current.class_id))[0];
    IF $old_class.frozen = true { THROW 'class frozen'; };
};";

const MOVE_GUARD: &str = "\
IF $class_id IS NOT NONE {
    LET $new_class = (SELECT session_id, frozen FROM type::record('class', $class_id) \
        WHERE tenant_id = $tenant_id)[0];
    IF $new_class IS NONE OR $new_class.session_id != $current.session_id \
        OR $new_class.frozen = true { THROW 'class not writable'; };
};";

#[derive(Debug, SurrealValue)]
struct StudentRow {
    tenant_id: String,
    session_id: String,
    class_id: Option<String>,
    admission_no: String,
    profile: serde_json::Value,
    promoted_from: Option<String>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct StudentRowWithId {
    record_id: String,
    tenant_id: String,
    session_id: String,
    class_id: Option<String>,
    admission_no: String,
    profile: serde_json::Value,
    promoted_from: Option<String>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct ClassGuardRow {
    session_id: String,
    frozen: bool,
}

#[derive(Debug, SurrealValue)]
struct SessionGuardRow {
    archived: bool,
}

fn parse_optional_uuid(raw: Option<String>, what: &str) -> Result<Option<Uuid>, DbError> {
    raw.map(|s| parse_uuid(&s, what)).transpose()
}

fn profile_to_value(profile: &StudentProfile) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(profile).map_err(|e| DbError::Decode(format!("profile encode: {e}")))
}

impl StudentRow {
    fn into_student(self, id: Uuid) -> Result<Student, DbError> {
        let profile: StudentProfile = serde_json::from_value(self.profile)
            .map_err(|e| DbError::Decode(format!("profile decode: {e}")))?;
        Ok(Student {
            id,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            session_id: parse_uuid(&self.session_id, "session")?,
            class_id: parse_optional_uuid(self.class_id, "class")?,
            admission_no: self.admission_no,
            profile,
            promoted_from: parse_optional_uuid(self.promoted_from, "student")?,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl StudentRowWithId {
    fn try_into_student(self) -> Result<Student, DbError> {
        let id = parse_uuid(&self.record_id, "student")?;
        StudentRow {
            tenant_id: self.tenant_id,
            session_id: self.session_id,
            class_id: self.class_id,
            admission_no: self.admission_no,
            profile: self.profile,
            promoted_from: self.promoted_from,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_student(id)
    }
}

/// What a write touched, for explaining an aborted transaction.
struct WriteTarget<'a> {
    tenant_id: Uuid,
    session_id: Uuid,
    class_id: Option<Uuid>,
    admission_no: Option<&'a str>,
    /// Student being written, excluded from the admission number check.
    student_id: Option<Uuid>,
}

/// SurrealDB implementation of the Student repository.
#[derive(Clone)]
pub struct SurrealStudentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealStudentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_one(
        &self,
        condition: &str,
        tenant_id: Uuid,
        session_id: Uuid,
        value: String,
    ) -> ScholarisResult<Option<Student>> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM student \
             WHERE tenant_id = $tenant_id AND session_id = $session_id \
             AND {condition} LIMIT 1"
        );
        let mut result = self
            .db
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("session_id", session_id.to_string()))
            .bind(("value", value))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StudentRowWithId> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .next()
            .map(|row| row.try_into_student())
            .transpose()
            .map_err(Into::into)
    }

    async fn explain_failed_write(
        &self,
        target: WriteTarget<'_>,
        cause: String,
    ) -> ScholarisResult<ScholarisError> {
        let mut result = self
            .db
            .query(
                "SELECT archived FROM type::record('academic_session', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", target.session_id.to_string()))
            .bind(("tenant_id", target.tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let sessions: Vec<SessionGuardRow> = result.take(0).map_err(DbError::from)?;
        match sessions.first() {
            None => {
                return Ok(ScholarisError::not_found(
                    "academic_session",
                    target.session_id,
                ));
            }
            Some(s) if s.archived => return Ok(ScholarisError::forbidden("session is archived")),
            Some(_) => {}
        }

        if let Some(class_id) = target.class_id {
            let mut result = self
                .db
                .query(
                    "SELECT session_id, frozen FROM type::record('class', $id) \
                     WHERE tenant_id = $tenant_id",
                )
                .bind(("id", class_id.to_string()))
                .bind(("tenant_id", target.tenant_id.to_string()))
                .await
                .map_err(DbError::from)?;
            let classes: Vec<ClassGuardRow> = result.take(0).map_err(DbError::from)?;
            match classes.first() {
                None => {
                    return Ok(ScholarisError::validation(format!(
                        "class {class_id} does not exist"
                    )));
                }
                Some(c) if c.session_id != target.session_id.to_string() => {
                    return Ok(ScholarisError::validation(format!(
                        "class {class_id} belongs to a different session"
                    )));
                }
                Some(c) if c.frozen => return Ok(ScholarisError::forbidden("class is frozen")),
                Some(_) => {}
            }
        }

        if let Some(admission_no) = target.admission_no {
            let existing = self
                .find_by_admission_no(target.tenant_id, target.session_id, admission_no)
                .await?;
            if existing.is_some_and(|s| Some(s.id) != target.student_id) {
                return Ok(ScholarisError::conflict(format!(
                    "admission number '{admission_no}' already exists in this session"
                )));
            }
        }

        Ok(DbError::TransactionAborted(cause).into())
    }

    /// Reload the student after an aborted update/delete and explain it.
    async fn explain_failed_change(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: u64,
        new_class: Option<Uuid>,
        admission_no: Option<&str>,
        cause: String,
    ) -> ScholarisResult<ScholarisError> {
        let current = match self.get_by_id(tenant_id, id).await {
            Ok(s) => s,
            Err(e) => return Ok(e),
        };
        if current.version != expected_version {
            return Ok(ScholarisError::conflict("student was modified concurrently"));
        }
        if let Some(old_class) = current.class_id {
            let explained = self
                .explain_failed_write(
                    WriteTarget {
                        tenant_id,
                        session_id: current.session_id,
                        class_id: Some(old_class),
                        admission_no: None,
                        student_id: Some(id),
                    },
                    cause.clone(),
                )
                .await?;
            if !matches!(explained, ScholarisError::Conflict { .. }) {
                return Ok(explained);
            }
        }
        self.explain_failed_write(
            WriteTarget {
                tenant_id,
                session_id: current.session_id,
                class_id: new_class,
                admission_no,
                student_id: Some(id),
            },
            cause,
        )
        .await
    }
}

impl<C: Connection> StudentRepository for SurrealStudentRepository<C> {
    async fn create(&self, input: CreateStudent) -> ScholarisResult<Student> {
        let id = Uuid::new_v4();
        let profile = profile_to_value(&input.profile)?;

        let response = self
            .db
            .query(CREATE_QUERY)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("session_id", input.session_id.to_string()))
            .bind(("class_id", input.class_id.map(|c| c.to_string())))
            .bind(("admission_no", input.admission_no.clone()))
            .bind(("profile", profile))
            .bind(("promoted_from", input.promoted_from.map(|p| p.to_string())))
            .await
            .map_err(DbError::from)?;

        if let Err(e) = response.check() {
            return Err(self
                .explain_failed_write(
                    WriteTarget {
                        tenant_id: input.tenant_id,
                        session_id: input.session_id,
                        class_id: input.class_id,
                        admission_no: Some(&input.admission_no),
                        student_id: None,
                    },
                    e.to_string(),
                )
                .await?);
        }

        self.get_by_id(input.tenant_id, id).await
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> ScholarisResult<Student> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('student', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StudentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "student".into(),
            id: id_str,
        })?;

        Ok(row.into_student(id)?)
    }

    async fn find_by_admission_no(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        admission_no: &str,
    ) -> ScholarisResult<Option<Student>> {
        self.find_one(
            "admission_no = $value",
            tenant_id,
            session_id,
            admission_no.to_string(),
        )
        .await
    }

    async fn find_promoted_from(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        source_id: Uuid,
    ) -> ScholarisResult<Option<Student>> {
        self.find_one(
            "promoted_from = $value",
            tenant_id,
            session_id,
            source_id.to_string(),
        )
        .await
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: u64,
        input: UpdateStudent,
    ) -> ScholarisResult<Student> {
        let mut sets = Vec::new();
        if input.class_id.is_some() {
            sets.push("class_id = $class_id");
        }
        if input.admission_no.is_some() {
            sets.push("admission_no = $admission_no");
        }
        if input.profile.is_some() {
            sets.push("profile = $profile");
        }
        sets.push("version += 1");
        sets.push("updated_at = time::now()");

        let query = format!(
            "BEGIN TRANSACTION;\n{EXISTING_GUARDS}\n{MOVE_GUARD}\n\
             LET $claimed = (UPDATE type::record('student', $id) SET {} \
             WHERE tenant_id = $tenant_id AND version = $version RETURN AFTER);\n\
             IF array::len($claimed) = 0 {{ THROW 'student claim failed'; }};\n\
             COMMIT TRANSACTION;",
            sets.join(", ")
        );

        let new_class = input.class_id.flatten();
        let admission_no = input.admission_no.clone();

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("version", expected_version))
            .bind(("class_id", new_class.map(|c| c.to_string())));

        if let Some(admission_no) = input.admission_no {
            builder = builder.bind(("admission_no", admission_no));
        }
        if let Some(profile) = input.profile {
            builder = builder.bind(("profile", profile_to_value(&profile)?));
        }

        let response = builder.await.map_err(DbError::from)?;
        if let Err(e) = response.check() {
            return Err(self
                .explain_failed_change(
                    tenant_id,
                    id,
                    expected_version,
                    new_class,
                    admission_no.as_deref(),
                    e.to_string(),
                )
                .await?);
        }

        self.get_by_id(tenant_id, id).await
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid, expected_version: u64) -> ScholarisResult<()> {
        let query = format!(
            "BEGIN TRANSACTION;\n{EXISTING_GUARDS}\n\
             LET $removed = (DELETE type::record('student', $id) \
             WHERE tenant_id = $tenant_id AND version = $version RETURN BEFORE);\n\
             IF array::len($removed) = 0 {{ THROW 'student claim failed'; }};\n\
             COMMIT TRANSACTION;"
        );

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
                .explain_failed_change(tenant_id, id, expected_version, None, None, e.to_string())
                .await?);
        }

        Ok(())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        filter: StudentFilter,
        pagination: Pagination,
    ) -> ScholarisResult<PaginatedResult<Student>> {
        let class_clause = if filter.class_id.is_some() {
            " AND class_id = $class_id"
        } else {
            ""
        };
        let class_id = filter.class_id.map(|c| c.to_string());

        let mut count_result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM student \
                 WHERE tenant_id = $tenant_id AND session_id = $session_id{class_clause} \
                 GROUP ALL"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("session_id", session_id.to_string()))
            .bind(("class_id", class_id.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM student \
                 WHERE tenant_id = $tenant_id AND session_id = $session_id{class_clause} \
                 ORDER BY admission_no ASC \
                 LIMIT $limit START $offset"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("session_id", session_id.to_string()))
            .bind(("class_id", class_id))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StudentRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_student())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_all(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        filter: StudentFilter,
    ) -> ScholarisResult<Vec<Student>> {
        let class_clause = if filter.class_id.is_some() {
            " AND class_id = $class_id"
        } else {
            ""
        };

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM student \
                 WHERE tenant_id = $tenant_id AND session_id = $session_id{class_clause}"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("session_id", session_id.to_string()))
            .bind(("class_id", filter.class_id.map(|c| c.to_string())))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StudentRowWithId> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| row.try_into_student())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }
}
