//! Resolves raw student references to canonical identities.
//!
//! The legacy record set keyed students inconsistently: sometimes by
//! registration number, sometimes by numeric id, and test-cohort ids may
//! numerically collide with regular ones. Everything downstream of this
//! module carries a [`ResolvedIdentity`] instead of a bare string or int.

use db::models::student::{self, Cohort};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::debug;

use crate::error::AttendanceError;

/// Canonical student key: a numeric id qualified by its cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct ResolvedIdentity {
    pub internal_id: i64,
    pub cohort: Cohort,
}

impl From<&student::Model> for ResolvedIdentity {
    fn from(s: &student::Model) -> Self {
        Self {
            internal_id: s.internal_id,
            cohort: s.cohort,
        }
    }
}

/// Read-only identity lookup against the student store.
#[derive(Clone)]
pub struct IdentityResolver {
    db: DatabaseConnection,
}

impl IdentityResolver {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Maps a raw reference to exactly one student.
    ///
    /// The registration number is the stable human-facing key, so it is tried
    /// first regardless of cohort. Only if that fails is the reference parsed
    /// as a numeric id, scoped to the hinted cohort when one is given. With
    /// no hint, a numeric id matching students in both cohorts is refused
    /// rather than guessed at.
    pub async fn resolve(
        &self,
        raw_reference: &str,
        cohort_hint: Option<Cohort>,
    ) -> Result<ResolvedIdentity, AttendanceError> {
        let raw = raw_reference.trim();

        if let Some(s) = student::Entity::find()
            .filter(student::Column::RegistrationNumber.eq(raw))
            .one(&self.db)
            .await?
        {
            return Ok(ResolvedIdentity::from(&s));
        }

        let Ok(numeric_id) = raw.parse::<i64>() else {
            return Err(AttendanceError::IdentityNotFound(raw.to_owned()));
        };
        debug!(reference = raw, "registration number miss, trying numeric id");

        match cohort_hint {
            Some(cohort) => self
                .find_in_cohort(numeric_id, cohort)
                .await?
                .map(|s| ResolvedIdentity::from(&s))
                .ok_or_else(|| AttendanceError::IdentityNotFound(raw.to_owned())),
            None => {
                let regular = self.find_in_cohort(numeric_id, Cohort::Regular).await?;
                let test = self.find_in_cohort(numeric_id, Cohort::Test).await?;
                match (regular, test) {
                    (Some(_), Some(_)) => {
                        Err(AttendanceError::AmbiguousIdentity(raw.to_owned()))
                    }
                    (Some(s), None) | (None, Some(s)) => Ok(ResolvedIdentity::from(&s)),
                    (None, None) => Err(AttendanceError::IdentityNotFound(raw.to_owned())),
                }
            }
        }
    }

    /// Full student row for a resolved identity, for reporting callers.
    pub async fn lookup(
        &self,
        identity: &ResolvedIdentity,
    ) -> Result<student::Model, AttendanceError> {
        student::Entity::find_by_id((identity.internal_id, identity.cohort))
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                AttendanceError::IdentityNotFound(format!(
                    "{}/{}",
                    identity.internal_id, identity.cohort
                ))
            })
    }

    async fn find_in_cohort(
        &self,
        internal_id: i64,
        cohort: Cohort,
    ) -> Result<Option<student::Model>, AttendanceError> {
        Ok(student::Entity::find_by_id((internal_id, cohort))
            .one(&self.db)
            .await?)
    }
}
