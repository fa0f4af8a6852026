use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202608240001_create_students::Migration),
            Box::new(migrations::m202608240002_create_course_enrollments::Migration),
            Box::new(migrations::m202608240003_create_attendance_sessions::Migration),
            Box::new(migrations::m202608240004_create_attendance_records::Migration),
        ]
    }
}
