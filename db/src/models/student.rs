use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A student row in the identity store. The attendance engine only ever
/// reads this table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "students")]
pub struct Model {
    /// Numeric id, unique only within a cohort.
    #[sea_orm(primary_key, auto_increment = false)]
    pub internal_id: i64,
    /// Identity space this student lives in. Part of the primary key because
    /// numeric ids may collide across cohorts.
    #[sea_orm(primary_key, auto_increment = false)]
    pub cohort: Cohort,
    /// Human-facing registration number (e.g. "22RP05419"), unique across
    /// all cohorts.
    pub registration_number: String,
    pub first_name: String,
    pub last_name: String,
    /// Program option the student is registered under.
    pub option_id: i64,
    pub year_level: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partition of the student identity space. Test-cohort students exist in a
/// parallel id range that may numerically collide with regular ids.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "student_cohort")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Cohort {
    #[sea_orm(string_value = "regular")]
    Regular,
    #[sea_orm(string_value = "test")]
    Test,
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

impl Model {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
