use chrono::Utc;
use migration::Migrator;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;

use crate::models::{course_enrollment, student, student::Cohort};

/// In-memory SQLite with the full schema applied. The pool is pinned to a
/// single connection because each pooled connection to `sqlite::memory:`
/// would otherwise get its own empty database.
pub async fn setup_test_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1);

    let db = Database::connect(opts)
        .await
        .expect("Failed to connect to in-memory db");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Inserts a student row for tests.
pub async fn seed_student(
    db: &DatabaseConnection,
    internal_id: i64,
    cohort: Cohort,
    registration_number: &str,
) -> student::Model {
    let now = Utc::now();
    student::ActiveModel {
        internal_id: Set(internal_id),
        cohort: Set(cohort),
        registration_number: Set(registration_number.to_owned()),
        first_name: Set("Test".to_owned()),
        last_name: Set(format!("Student{internal_id}")),
        option_id: Set(1),
        year_level: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("Failed to seed student")
}

/// Enrolls a seeded student in a course.
pub async fn seed_enrollment(
    db: &DatabaseConnection,
    course_id: i64,
    internal_id: i64,
    cohort: Cohort,
) -> course_enrollment::Model {
    course_enrollment::ActiveModel {
        course_id: Set(course_id),
        student_internal_id: Set(internal_id),
        student_cohort: Set(cohort),
        enrolled_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("Failed to seed enrollment")
}
