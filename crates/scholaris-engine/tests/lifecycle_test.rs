//! Integration tests for sessions, classes, students and tenant scoping.

mod common;

use chrono::{Duration, Utc};
use common::{Harness, admin, principal, profile, teacher};
use scholaris_core::error::ErrorKind;
use scholaris_core::models::academic_session::{CreateAcademicSession, SessionState};
use scholaris_core::models::principal::Role;
use scholaris_core::models::student::UpdateStudent;
use scholaris_core::models::tenant::{TenantStatus, UpdateTenant};
use scholaris_core::scope::{self, Operation, RequestTenant};
use scholaris_engine::NewStudent;
use uuid::Uuid;

// -----------------------------------------------------------------------
// Session state machine
// -----------------------------------------------------------------------

#[tokio::test]
async fn activating_a_session_deactivates_the_previous_one() {
    let h = Harness::new().await;
    let t = h.tenant("Springfield Elementary").await;
    let ctx = admin(t);

    let s1 = h.active_session(t, "2024-25").await;
    let s2 = h.session(t, "2025-26").await;
    assert_eq!(s2.state(), SessionState::Inactive);

    let s2 = h.sessions.activate_session(&ctx, t, s2.id).await.unwrap();
    assert!(s2.is_active);

    let s1 = h.sessions.get_session(&ctx, t, s1.id).await.unwrap();
    assert!(!s1.is_active);
    let current = h.sessions.current_session(&ctx, t).await.unwrap();
    assert_eq!(current.id, s2.id);
}

#[tokio::test]
async fn activating_the_active_session_is_a_no_op() {
    let h = Harness::new().await;
    let t = h.tenant("Springfield Elementary").await;
    let s = h.active_session(t, "2024-25").await;

    let again = h.sessions.activate_session(&admin(t), t, s.id).await.unwrap();
    assert!(again.is_active);
    assert_eq!(again.version, s.version);
}

#[tokio::test]
async fn current_session_is_not_found_without_an_active_session() {
    let h = Harness::new().await;
    let t = h.tenant("Springfield Elementary").await;
    h.session(t, "2024-25").await;

    let err = h.sessions.current_session(&admin(t), t).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn session_input_is_validated() {
    let h = Harness::new().await;
    let t = h.tenant("Springfield Elementary").await;
    let now = Utc::now();

    let err = h
        .sessions
        .create_session(
            &admin(t),
            CreateAcademicSession {
                tenant_id: t,
                name: "   ".into(),
                start_date: now,
                end_date: now + Duration::days(1),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .sessions
        .create_session(
            &admin(t),
            CreateAcademicSession {
                tenant_id: t,
                name: "2025-26".into(),
                start_date: now,
                end_date: now - Duration::days(1),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    h.session(t, "2025-26").await;
    let err = h
        .sessions
        .create_session(
            &admin(t),
            CreateAcademicSession {
                tenant_id: t,
                name: "2025-26".into(),
                start_date: now,
                end_date: now + Duration::days(1),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn archive_and_unarchive_rules() {
    let h = Harness::new().await;
    let t = h.tenant("Springfield Elementary").await;
    let ctx = admin(t);
    let s = h.active_session(t, "2024-25").await;

    let err = h.sessions.archive_session(&ctx, t, s.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.to_string().contains("cannot archive an active session"));

    let err = h.sessions.unarchive_session(&ctx, t, s.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    h.sessions.deactivate_session(&ctx, t, s.id).await.unwrap();
    let archived = h.sessions.archive_session(&ctx, t, s.id).await.unwrap();
    assert_eq!(archived.state(), SessionState::Archived);
    assert!(archived.archived_at.is_some());

    let err = h.sessions.archive_session(&ctx, t, s.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = h.sessions.activate_session(&ctx, t, s.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let restored = h.sessions.unarchive_session(&ctx, t, s.id).await.unwrap();
    assert_eq!(restored.state(), SessionState::Inactive);
    assert!(restored.archived_at.is_none());
    let active = h.sessions.activate_session(&ctx, t, s.id).await.unwrap();
    assert!(active.is_active);
}

#[tokio::test]
async fn concurrent_activations_leave_one_active_session() {
    let h = Harness::new().await;
    let t = h.tenant("Springfield Elementary").await;

    let mut ids = Vec::new();
    for name in ["A", "B", "C", "D", "E"] {
        ids.push(h.session(t, name).await.id);
    }

    let handles: Vec<_> = ids
        .iter()
        .map(|&id| {
            let sessions = h.sessions.clone();
            tokio::spawn(async move {
                let ctx = admin(t);
                sessions.activate_session(&ctx, t, id).await
            })
        })
        .collect();
    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            wins += 1;
        }
    }
    assert!(wins >= 1);

    let page = h.sessions.list_sessions(&admin(t), t, 1, 50).await.unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.iter().filter(|s| s.is_active).count(), 1);
}

#[tokio::test]
async fn session_listing_rejects_page_zero() {
    let h = Harness::new().await;
    let t = h.tenant("Springfield Elementary").await;
    let err = h.sessions.list_sessions(&admin(t), t, 0, 10).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

// -----------------------------------------------------------------------
// Class freeze controller
// -----------------------------------------------------------------------

#[tokio::test]
async fn freezing_a_class_of_an_inactive_session_is_rejected() {
    let h = Harness::new().await;
    let t = h.tenant("Springfield Elementary").await;
    let ctx = admin(t);

    let s2 = h.active_session(t, "2025-26").await;
    let class = h.classes.create_class(&ctx, t, "Grade 4").await.unwrap();
    assert_eq!(class.session_id, s2.id);
    h.active_session(t, "2026-27").await;

    let err = h.classes.freeze_class(&ctx, t, class.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(
        err.to_string()
            .contains("cannot freeze class from an inactive session")
    );
    let class = h.classes.get_class(&ctx, t, class.id).await.unwrap();
    assert!(!class.frozen);
}

#[tokio::test]
async fn freeze_and_unfreeze_are_not_idempotent() {
    let h = Harness::new().await;
    let t = h.tenant("Springfield Elementary").await;
    let ctx = admin(t);
    h.active_session(t, "2025-26").await;
    let class = h.classes.create_class(&ctx, t, "Grade 4").await.unwrap();

    assert!(h.classes.freeze_class(&ctx, t, class.id).await.unwrap().frozen);
    let err = h.classes.freeze_class(&ctx, t, class.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.to_string().contains("already frozen"));

    assert!(!h.classes.unfreeze_class(&ctx, t, class.id).await.unwrap().frozen);
    let err = h.classes.unfreeze_class(&ctx, t, class.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.to_string().contains("already unfrozen"));
}

#[tokio::test]
async fn class_creation_requires_an_active_session() {
    let h = Harness::new().await;
    let t = h.tenant("Springfield Elementary").await;
    let ctx = admin(t);

    let err = h.classes.create_class(&ctx, t, "Grade 1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let s = h.active_session(t, "2025-26").await;
    h.classes.create_class(&ctx, t, "Grade 1").await.unwrap();
    let err = h.classes.create_class(&ctx, t, "Grade 1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let page = h.classes.list_classes(&ctx, t, s.id, 1, 10).await.unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn archived_session_is_immutable_until_unarchived() {
    let h = Harness::new().await;
    let t = h.tenant("Springfield Elementary").await;
    let ctx = admin(t);

    let s1 = h.active_session(t, "2024-25").await;
    let class = h.classes.create_class(&ctx, t, "Grade 2").await.unwrap();
    let pupil = h.student(t, s1.id, Some(class.id), "100").await;

    h.active_session(t, "2025-26").await;
    h.sessions.archive_session(&ctx, t, s1.id).await.unwrap();

    let err = h
        .classes
        .create_class_in(&ctx, t, s1.id, "Grade 3")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = h
        .students
        .create_student(
            &ctx,
            t,
            NewStudent {
                session_id: Some(s1.id),
                class_id: None,
                admission_no: "101".into(),
                profile: profile("101"),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = h
        .students
        .update_student(
            &ctx,
            t,
            pupil.id,
            UpdateStudent {
                profile: Some(profile("renamed")),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = h.classes.freeze_class(&ctx, t, class.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.to_string().contains("archived session"));

    let err = h.sessions.activate_session(&ctx, t, s1.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // Historical reads stay available.
    let page = h
        .students
        .list_students(&ctx, t, s1.id, Some(class.id), 1, 10)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, pupil.id);

    h.sessions.unarchive_session(&ctx, t, s1.id).await.unwrap();
    h.sessions.activate_session(&ctx, t, s1.id).await.unwrap();
    h.classes
        .create_class_in(&ctx, t, s1.id, "Grade 3")
        .await
        .unwrap();
}

// -----------------------------------------------------------------------
// Student registry
// -----------------------------------------------------------------------

#[tokio::test]
async fn student_writes_respect_class_rules() {
    let h = Harness::new().await;
    let t = h.tenant("Springfield Elementary").await;
    let ctx = admin(t);

    let s1 = h.active_session(t, "2024-25").await;
    let open = h.classes.create_class(&ctx, t, "Grade 5").await.unwrap();
    let locked = h.classes.create_class(&ctx, t, "Grade 6").await.unwrap();
    h.classes.freeze_class(&ctx, t, locked.id).await.unwrap();

    let pupil = h.student(t, s1.id, Some(open.id), "200").await;

    let err = h
        .students
        .update_student(
            &ctx,
            t,
            pupil.id,
            UpdateStudent {
                class_id: Some(Some(locked.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = h
        .students
        .update_student(
            &ctx,
            t,
            pupil.id,
            UpdateStudent {
                class_id: Some(Some(Uuid::new_v4())),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .students
        .update_student(
            &ctx,
            t,
            pupil.id,
            UpdateStudent {
                admission_no: Some(" ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let moved = h
        .students
        .update_student(
            &ctx,
            t,
            pupil.id,
            UpdateStudent {
                class_id: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.class_id, None);

    h.students.delete_student(&ctx, t, pupil.id).await.unwrap();
    let err = h.students.get_student(&ctx, t, pupil.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn updated_admission_numbers_are_trimmed() {
    let h = Harness::new().await;
    let t = h.tenant("Springfield Elementary").await;
    let ctx = admin(t);
    let s = h.active_session(t, "2025-26").await;

    h.student(t, s.id, None, "7").await;
    let pupil = h.student(t, s.id, None, "8").await;

    let renumber = |no: &str| UpdateStudent {
        admission_no: Some(no.into()),
        ..Default::default()
    };

    let err = h
        .students
        .update_student(&ctx, t, pupil.id, renumber(" 7 "))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let pupil = h
        .students
        .update_student(&ctx, t, pupil.id, renumber("  9\t"))
        .await
        .unwrap();
    assert_eq!(pupil.admission_no, "9");
}

#[tokio::test]
async fn student_defaults_to_the_active_session() {
    let h = Harness::new().await;
    let t = h.tenant("Springfield Elementary").await;
    let ctx = admin(t);
    let s = h.active_session(t, "2025-26").await;

    let pupil = h
        .students
        .create_student(
            &ctx,
            t,
            NewStudent {
                session_id: None,
                class_id: None,
                admission_no: "300".into(),
                profile: profile("300"),
            },
        )
        .await
        .unwrap();
    assert_eq!(pupil.session_id, s.id);
    assert_eq!(pupil.tenant_id, t);
}

// -----------------------------------------------------------------------
// Scoping and tenant guards
// -----------------------------------------------------------------------

#[tokio::test]
async fn foreign_body_tenant_is_forbidden_and_nothing_is_written() {
    let h = Harness::new().await;
    let t1 = h.tenant("Springfield Elementary").await;
    let t2 = h.tenant("Shelbyville Elementary").await;

    let body = t1.to_string();
    let err = scope::resolve(
        Some(&principal(Role::Admin, Some(t2))),
        RequestTenant {
            query: None,
            body: Some(&body),
        },
        Operation::Mutate,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // A context resolved for T2 cannot be pointed at T1 either.
    let now = Utc::now();
    let err = h
        .sessions
        .create_session(
            &admin(t2),
            CreateAcademicSession {
                tenant_id: t1,
                name: "2025-26".into(),
                start_date: now,
                end_date: now + Duration::days(300),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let page = h.sessions.list_sessions(&admin(t1), t1, 1, 10).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn another_tenants_session_is_forbidden() {
    let h = Harness::new().await;
    let t1 = h.tenant("Springfield Elementary").await;
    let t2 = h.tenant("Shelbyville Elementary").await;
    let s = h.session(t1, "2025-26").await;

    let err = h
        .sessions
        .activate_session(&admin(t2), t2, s.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let err = h.sessions.get_session(&admin(t2), t2, s.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let untouched = h.sessions.get_session(&admin(t1), t1, s.id).await.unwrap();
    assert!(!untouched.is_active);

    let err = h
        .sessions
        .get_session(&admin(t2), t2, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn teachers_may_read_but_not_mutate() {
    let h = Harness::new().await;
    let t = h.tenant("Springfield Elementary").await;
    let s = h.active_session(t, "2025-26").await;
    let ctx = teacher(t);

    let current = h.sessions.current_session(&ctx, t).await.unwrap();
    assert_eq!(current.id, s.id);

    let err = h.classes.create_class(&ctx, t, "Grade 1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let err = h.sessions.deactivate_session(&ctx, t, s.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn frozen_tenant_rejects_writes_but_allows_reads() {
    let h = Harness::new().await;
    let t = h.tenant("Springfield Elementary").await;
    h.active_session(t, "2025-26").await;

    h.tenants
        .update_tenant(
            &h.root,
            t,
            UpdateTenant {
                frozen: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = h.classes.create_class(&admin(t), t, "Grade 1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert!(h.sessions.current_session(&admin(t), t).await.is_ok());
}

#[tokio::test]
async fn deleted_tenant_is_not_found() {
    let h = Harness::new().await;
    let t = h.tenant("Springfield Elementary").await;

    h.tenants
        .update_tenant(
            &h.root,
            t,
            UpdateTenant {
                status: Some(TenantStatus::Deleted),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = h.tenants.get_tenant(&admin(t), t).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn tenant_administration_requires_superadmin() {
    let h = Harness::new().await;
    let t = h.tenant("Springfield Elementary").await;

    let err = h
        .tenants
        .update_tenant(&admin(t), t, UpdateTenant::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = h.tenants.list_tenants(&admin(t), 1, 10).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let page = h.tenants.list_tenants(&h.root, 1, 10).await.unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn tenant_listing_is_paged_through_engine_limits() {
    let h = Harness::new().await;
    for name in ["Springfield", "Shelbyville", "Capital City"] {
        h.tenant(name).await;
    }

    let page = h.tenants.list_tenants(&h.root, 2, 2).await.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!((page.offset, page.limit), (2, 2));
    assert_eq!(page.items.len(), 1);

    let page = h.tenants.list_tenants(&h.root, 1, 10_000).await.unwrap();
    assert_eq!(page.limit, h.sessions.config().max_page_size);

    let err = h.tenants.list_tenants(&h.root, 0, 10).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = h
        .tenants
        .list_tenants(&h.root, u64::MAX, 10)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
