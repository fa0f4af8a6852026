//! Schema-level invariants that the services rely on: composite keys,
//! the partial unique index on active sessions, and record ownership.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};

use crate::models::attendance_record;
use crate::models::attendance_session::{self, BiometricMethod, SessionStatus};
use crate::models::student::Cohort;
use crate::test_utils::{seed_student, setup_test_db};

async fn insert_session(
    db: &DatabaseConnection,
    lecturer_id: i64,
    course_id: i64,
    status: SessionStatus,
) -> attendance_session::Model {
    let now = Utc::now();
    attendance_session::ActiveModel {
        lecturer_id: Set(lecturer_id),
        course_id: Set(course_id),
        option_id: Set(1),
        year_level: Set(2),
        session_date: Set(now.date_naive()),
        start_time: Set(now),
        end_time: Set(None),
        biometric_method: Set(BiometricMethod::Fingerprint),
        status: Set(status),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

async fn insert_record(
    db: &DatabaseConnection,
    session_id: i64,
    internal_id: i64,
    cohort: Cohort,
) -> attendance_record::Model {
    let now = Utc::now();
    attendance_record::ActiveModel {
        session_id: Set(session_id),
        student_internal_id: Set(internal_id),
        student_cohort: Set(cohort),
        status: Set(attendance_record::RecordStatus::Present),
        method: Set(BiometricMethod::Fingerprint),
        confidence: Set(Some(0.9)),
        recorded_at: Set(now),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
}

#[tokio::test]
async fn students_with_equal_ids_coexist_across_cohorts() {
    let db = setup_test_db().await;
    seed_student(&db, 42, Cohort::Regular, "22RP05419").await;
    seed_student(&db, 42, Cohort::Test, "TEST-42").await;

    let regular = crate::models::student::Entity::find_by_id((42, Cohort::Regular))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    let test = crate::models::student::Entity::find_by_id((42, Cohort::Test))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(regular.registration_number, test.registration_number);
}

#[tokio::test]
async fn registration_number_is_unique_across_cohorts() {
    let db = setup_test_db().await;
    seed_student(&db, 42, Cohort::Regular, "22RP05419").await;

    let now = Utc::now();
    let duplicate = crate::models::student::ActiveModel {
        internal_id: Set(99),
        cohort: Set(Cohort::Test),
        registration_number: Set("22RP05419".to_owned()),
        first_name: Set("Dup".to_owned()),
        last_name: Set("Licate".to_owned()),
        option_id: Set(1),
        year_level: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&db)
    .await;
    assert!(duplicate.is_err());
}

#[tokio::test]
async fn partial_index_blocks_second_active_session_only() {
    let db = setup_test_db().await;
    insert_session(&db, 7, 11, SessionStatus::Active).await;

    // Same pair, still active: blocked by the partial unique index.
    let now = Utc::now();
    let blocked = attendance_session::ActiveModel {
        lecturer_id: Set(7),
        course_id: Set(11),
        option_id: Set(1),
        year_level: Set(2),
        session_date: Set(now.date_naive()),
        start_time: Set(now),
        end_time: Set(None),
        biometric_method: Set(BiometricMethod::Fingerprint),
        status: Set(SessionStatus::Active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&db)
    .await;
    assert!(blocked.is_err());

    // Completed sessions for the same pair are unconstrained.
    insert_session(&db, 7, 11, SessionStatus::Completed).await;
    insert_session(&db, 7, 11, SessionStatus::Completed).await;
}

#[tokio::test]
async fn deleting_a_session_cascades_to_its_records() {
    let db = setup_test_db().await;
    seed_student(&db, 42, Cohort::Regular, "22RP05419").await;
    let session = insert_session(&db, 7, 11, SessionStatus::Active).await;
    insert_record(&db, session.id, 42, Cohort::Regular).await;

    attendance_session::Entity::delete_by_id(session.id)
        .exec(&db)
        .await
        .unwrap();

    let remaining = attendance_record::Entity::find().count(&db).await.unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn record_key_rejects_duplicate_check_in_rows() {
    let db = setup_test_db().await;
    seed_student(&db, 42, Cohort::Regular, "22RP05419").await;
    seed_student(&db, 42, Cohort::Test, "TEST-42").await;
    let session = insert_session(&db, 7, 11, SessionStatus::Active).await;

    insert_record(&db, session.id, 42, Cohort::Regular).await;
    // Same student again: the composite key refuses a second row.
    let now = Utc::now();
    let duplicate = attendance_record::ActiveModel {
        session_id: Set(session.id),
        student_internal_id: Set(42),
        student_cohort: Set(Cohort::Regular),
        status: Set(attendance_record::RecordStatus::Late),
        method: Set(BiometricMethod::Fingerprint),
        confidence: Set(None),
        recorded_at: Set(now),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&db)
    .await;
    assert!(duplicate.is_err());

    // The colliding test-cohort student is a different key.
    insert_record(&db, session.id, 42, Cohort::Test).await;
    let rows = attendance_record::Entity::find().count(&db).await.unwrap();
    assert_eq!(rows, 2);
}
