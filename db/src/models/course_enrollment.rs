use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use super::student::Cohort;

/// Enrollment of a student in a course. Read-only to the attendance engine;
/// the aggregator uses it to derive absence by set difference.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "course_enrollments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub course_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub student_internal_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub student_cohort: Cohort,
    pub enrolled_at: DateTime<Utc>,
}

/// This enum would define relations if any exist. Currently unused.
#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        panic!("No RelationDef implemented")
    }
}

impl ActiveModelBehavior for ActiveModel {}
