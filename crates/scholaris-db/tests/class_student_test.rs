//! Integration tests for Class, Student and admission counter
//! repositories.

use chrono::{Duration, Utc};
use scholaris_core::error::ErrorKind;
use scholaris_core::models::academic_session::{
    AcademicSession, CreateAcademicSession, SessionTransition,
};
use scholaris_core::models::class::CreateClass;
use scholaris_core::models::student::{
    CreateStudent, Guardian, StudentFilter, StudentProfile, UpdateStudent,
};
use scholaris_core::models::tenant::CreateTenant;
use scholaris_core::repository::{
    AcademicSessionRepository, AdmissionCounterRepository, ClassRepository, Pagination,
    StudentRepository, TenantRepository,
};
use scholaris_db::{DbConfig, DbManager};
use scholaris_db::repository::{
    SurrealAcademicSessionRepository, SurrealAdmissionCounterRepository, SurrealClassRepository,
    SurrealStudentRepository, SurrealTenantRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use uuid::Uuid;

/// Helper: in-memory DB with one tenant and one active session.
async fn setup() -> (Surreal<Db>, Uuid, AcademicSession) {
    let db = DbManager::in_memory(&DbConfig::default())
        .await
        .unwrap()
        .into_client();

    let tenant = SurrealTenantRepository::new(db.clone())
        .create(CreateTenant {
            name: "Shelbyville High".into(),
        })
        .await
        .unwrap();

    let sessions = SurrealAcademicSessionRepository::new(db.clone());
    let session = sessions
        .create(CreateAcademicSession {
            tenant_id: tenant.id,
            name: "2025-26".into(),
            start_date: Utc::now(),
            end_date: Utc::now() + Duration::days(300),
        })
        .await
        .unwrap();
    let session = sessions
        .activate(tenant.id, session.id, session.version)
        .await
        .unwrap();

    (db, tenant.id, session)
}

fn profile(first: &str) -> StudentProfile {
    StudentProfile {
        first_name: first.into(),
        last_name: "Simpson".into(),
        guardians: vec![Guardian {
            name: "Marge Simpson".into(),
            relation: "mother".into(),
            phone: Some("555-0100".into()),
        }],
        address: Some("742 Evergreen Terrace".into()),
        ..Default::default()
    }
}

fn student(tenant_id: Uuid, session_id: Uuid, class_id: Option<Uuid>, no: &str) -> CreateStudent {
    CreateStudent {
        tenant_id,
        session_id,
        class_id,
        admission_no: no.into(),
        profile: profile("Lisa"),
        promoted_from: None,
    }
}

// -----------------------------------------------------------------------
// Class tests
// -----------------------------------------------------------------------

#[tokio::test]
async fn create_class_and_reject_duplicate_name() {
    let (db, tenant_id, session) = setup().await;
    let repo = SurrealClassRepository::new(db);

    let class = repo
        .create(CreateClass {
            tenant_id,
            session_id: session.id,
            name: "Grade 2".into(),
        })
        .await
        .unwrap();
    assert!(!class.frozen);
    assert_eq!(class.session_id, session.id);

    let err = repo
        .create(CreateClass {
            tenant_id,
            session_id: session.id,
            name: "Grade 2".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let page = repo
        .list(tenant_id, session.id, Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn class_cannot_be_created_in_archived_session() {
    let (db, tenant_id, session) = setup().await;
    let sessions = SurrealAcademicSessionRepository::new(db.clone());
    let s = sessions
        .transition(tenant_id, session.id, session.version, SessionTransition::Deactivate)
        .await
        .unwrap();
    sessions
        .transition(tenant_id, s.id, s.version, SessionTransition::Archive)
        .await
        .unwrap();

    let err = SurrealClassRepository::new(db)
        .create(CreateClass {
            tenant_id,
            session_id: session.id,
            name: "Grade 3".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn freeze_twice_is_conflict() {
    let (db, tenant_id, session) = setup().await;
    let repo = SurrealClassRepository::new(db);

    let class = repo
        .create(CreateClass {
            tenant_id,
            session_id: session.id,
            name: "Grade 4".into(),
        })
        .await
        .unwrap();

    let frozen = repo
        .set_frozen(tenant_id, class.id, class.version, true)
        .await
        .unwrap();
    assert!(frozen.frozen);

    let err = repo
        .set_frozen(tenant_id, class.id, frozen.version, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.to_string().contains("already frozen"));

    let thawed = repo
        .set_frozen(tenant_id, class.id, frozen.version, false)
        .await
        .unwrap();
    assert!(!thawed.frozen);
}

#[tokio::test]
async fn freeze_requires_active_session() {
    let (db, tenant_id, session) = setup().await;
    let classes = SurrealClassRepository::new(db.clone());
    let class = classes
        .create(CreateClass {
            tenant_id,
            session_id: session.id,
            name: "Grade 5".into(),
        })
        .await
        .unwrap();

    SurrealAcademicSessionRepository::new(db)
        .transition(tenant_id, session.id, session.version, SessionTransition::Deactivate)
        .await
        .unwrap();

    let err = classes
        .set_frozen(tenant_id, class.id, class.version, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(!classes.get_by_id(tenant_id, class.id).await.unwrap().frozen);
}

// -----------------------------------------------------------------------
// Student tests
// -----------------------------------------------------------------------

#[tokio::test]
async fn create_student_round_trips_profile() {
    let (db, tenant_id, session) = setup().await;
    let repo = SurrealStudentRepository::new(db);

    let created = repo
        .create(student(tenant_id, session.id, None, "1001"))
        .await
        .unwrap();
    let fetched = repo.get_by_id(tenant_id, created.id).await.unwrap();

    assert_eq!(fetched.admission_no, "1001");
    assert_eq!(fetched.profile, profile("Lisa"));
    assert_eq!(fetched.class_id, None);
    assert_eq!(fetched.promoted_from, None);
}

#[tokio::test]
async fn duplicate_admission_number_is_conflict() {
    let (db, tenant_id, session) = setup().await;
    let repo = SurrealStudentRepository::new(db);

    repo.create(student(tenant_id, session.id, None, "1001"))
        .await
        .unwrap();
    let err = repo
        .create(student(tenant_id, session.id, None, "1001"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn student_class_must_belong_to_same_session() {
    let (db, tenant_id, session) = setup().await;
    let sessions = SurrealAcademicSessionRepository::new(db.clone());
    let other = sessions
        .create(CreateAcademicSession {
            tenant_id,
            name: "2026-27".into(),
            start_date: Utc::now(),
            end_date: Utc::now() + Duration::days(300),
        })
        .await
        .unwrap();

    let class = SurrealClassRepository::new(db.clone())
        .create(CreateClass {
            tenant_id,
            session_id: other.id,
            name: "Grade 1".into(),
        })
        .await
        .unwrap();

    let err = SurrealStudentRepository::new(db)
        .create(student(tenant_id, session.id, Some(class.id), "2001"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn frozen_class_blocks_student_writes() {
    let (db, tenant_id, session) = setup().await;
    let classes = SurrealClassRepository::new(db.clone());
    let students = SurrealStudentRepository::new(db);

    let class = classes
        .create(CreateClass {
            tenant_id,
            session_id: session.id,
            name: "Grade 6".into(),
        })
        .await
        .unwrap();
    let existing = students
        .create(student(tenant_id, session.id, Some(class.id), "3001"))
        .await
        .unwrap();
    classes
        .set_frozen(tenant_id, class.id, class.version, true)
        .await
        .unwrap();

    let err = students
        .create(student(tenant_id, session.id, Some(class.id), "3002"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = students
        .update(
            tenant_id,
            existing.id,
            existing.version,
            UpdateStudent {
                profile: Some(profile("Maggie")),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = students
        .delete(tenant_id, existing.id, existing.version)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn update_and_delete_student() {
    let (db, tenant_id, session) = setup().await;
    let repo = SurrealStudentRepository::new(db);

    let s = repo
        .create(student(tenant_id, session.id, None, "4001"))
        .await
        .unwrap();
    let updated = repo
        .update(
            tenant_id,
            s.id,
            s.version,
            UpdateStudent {
                admission_no: Some("4002".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.admission_no, "4002");
    assert_eq!(updated.version, s.version + 1);

    let err = repo
        .update(tenant_id, s.id, s.version, UpdateStudent::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict, "stale version must conflict");

    repo.delete(tenant_id, s.id, updated.version).await.unwrap();
    assert!(repo.get_by_id(tenant_id, s.id).await.is_err());
}

#[tokio::test]
async fn list_students_paginates_and_filters() {
    let (db, tenant_id, session) = setup().await;
    let class = SurrealClassRepository::new(db.clone())
        .create(CreateClass {
            tenant_id,
            session_id: session.id,
            name: "Grade 7".into(),
        })
        .await
        .unwrap();
    let repo = SurrealStudentRepository::new(db);

    for i in 0..5 {
        let class_id = if i % 2 == 0 { Some(class.id) } else { None };
        repo.create(student(tenant_id, session.id, class_id, &format!("50{i}")))
            .await
            .unwrap();
    }

    let page = repo
        .list(
            tenant_id,
            session.id,
            StudentFilter::default(),
            Pagination { offset: 0, limit: 2 },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].admission_no, "500");

    let in_class = repo
        .list_all(
            tenant_id,
            session.id,
            StudentFilter {
                class_id: Some(class.id),
            },
        )
        .await
        .unwrap();
    assert_eq!(in_class.len(), 3);

    let found = repo
        .find_by_admission_no(tenant_id, session.id, "503")
        .await
        .unwrap();
    assert!(found.is_some());
    let missing = repo
        .find_by_admission_no(Uuid::new_v4(), session.id, "503")
        .await
        .unwrap();
    assert!(missing.is_none(), "other tenants must not see the student");
}

// -----------------------------------------------------------------------
// Admission counter tests
// -----------------------------------------------------------------------

#[tokio::test]
async fn admission_counter_is_monotonic_per_session() {
    let (db, tenant_id, session) = setup().await;
    let repo = SurrealAdmissionCounterRepository::new(db);

    assert_eq!(repo.next_value(tenant_id, session.id).await.unwrap(), 1);
    assert_eq!(repo.next_value(tenant_id, session.id).await.unwrap(), 2);
    assert_eq!(repo.next_value(tenant_id, Uuid::new_v4()).await.unwrap(), 1);
}
