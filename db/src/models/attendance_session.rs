use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A bounded window during which one lecturer accepts attendance check-ins
/// for one course/cohort.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub lecturer_id: i64,
    pub course_id: i64,
    pub option_id: i64,
    pub year_level: i32,
    pub session_date: Date,
    pub start_time: DateTime<Utc>,
    /// Null while the session is open; stamped on close or cancel.
    pub end_time: Option<DateTime<Utc>>,
    pub biometric_method: BiometricMethod,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "session_status")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SessionStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// How check-ins are verified for this session.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "biometric_method")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum BiometricMethod {
    #[sea_orm(string_value = "face_recognition")]
    FaceRecognition,
    #[sea_orm(string_value = "fingerprint")]
    Fingerprint,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    Records,
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// A session counts toward reporting denominators only once it has an
    /// end time, i.e. it was completed.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.status == SessionStatus::Completed && self.end_time.is_some()
    }
}
