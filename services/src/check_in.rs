//! Biometric check-in against an active session.
//!
//! The recorder trusts the external biometric capability for match/no-match
//! and confidence, resolves the subject through [`IdentityResolver`], and
//! upserts one record per `(session, identity)`. Lateness is purely temporal:
//! a check-in past the grace period is `late` no matter how confident the
//! match was.

use chrono::{Duration, Utc};
use db::models::attendance_record::{self, RecordStatus};
use db::models::attendance_session::Entity as SessionEntity;
use db::models::student::Cohort;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, Set, SqlErr,
    TransactionTrait,
};
use tracing::{info, warn};

use crate::error::AttendanceError;
use crate::identity::{IdentityResolver, ResolvedIdentity};

pub use db::models::attendance_record::Model as AttendanceRecord;

/// Outcome of one verification attempt by the external biometric capability.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BiometricVerdict {
    pub matched: bool,
    /// In `[0, 1]`.
    pub confidence: f64,
    /// Reference the matcher believes it saw, when it reports one.
    pub matched_reference: Option<String>,
}

/// Tunables for the recorder.
#[derive(Debug, Clone)]
pub struct CheckInPolicy {
    /// How far past `start_time` a check-in still counts as `present`.
    pub grace_period: Duration,
    /// Verdicts below this confidence are rejected outright.
    pub min_confidence: f64,
}

impl Default for CheckInPolicy {
    fn default() -> Self {
        Self {
            grace_period: Duration::minutes(15),
            min_confidence: 0.6,
        }
    }
}

impl CheckInPolicy {
    /// Policy values from the application environment.
    pub fn from_config() -> Self {
        Self {
            grace_period: Duration::minutes(util::config::checkin_grace_minutes()),
            min_confidence: util::config::biometric_min_confidence(),
        }
    }
}

pub struct CheckInRecorder {
    db: DatabaseConnection,
    resolver: IdentityResolver,
    policy: CheckInPolicy,
}

impl CheckInRecorder {
    pub fn new(db: DatabaseConnection, resolver: IdentityResolver, policy: CheckInPolicy) -> Self {
        Self {
            db,
            resolver,
            policy,
        }
    }

    /// Records one check-in, creating or updating the record for the
    /// resolved student within the session.
    ///
    /// Preconditions, in order: the session exists and is `active`; the
    /// verdict is a match at acceptable confidence; the raw reference
    /// resolves to exactly one student. Each failure maps to its own
    /// [`AttendanceError`] variant and leaves the record set untouched.
    pub async fn check_in(
        &self,
        session_id: i64,
        raw_reference: &str,
        cohort_hint: Option<Cohort>,
        verdict: BiometricVerdict,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let session = SessionEntity::find_by_id(session_id)
            .one(&self.db)
            .await?
            .ok_or(AttendanceError::SessionNotFound(session_id))?;
        if !session.is_active() {
            warn!(session_id, "check-in against a non-active session");
            return Err(AttendanceError::SessionNotActive(session_id));
        }

        if !verdict.matched || verdict.confidence < self.policy.min_confidence {
            warn!(
                session_id,
                matched = verdict.matched,
                confidence = verdict.confidence,
                "biometric verdict rejected"
            );
            return Err(AttendanceError::BiometricMismatch {
                confidence: verdict.confidence,
            });
        }

        if let Some(reported) = verdict.matched_reference.as_deref() {
            if reported != raw_reference {
                warn!(
                    session_id,
                    raw_reference,
                    reported,
                    "matcher reported a different reference than submitted"
                );
            }
        }

        let identity = self.resolver.resolve(raw_reference, cohort_hint).await?;

        let now = Utc::now();
        let status = if now - session.start_time > self.policy.grace_period {
            RecordStatus::Late
        } else {
            RecordStatus::Present
        };

        // Insert-or-update under one transaction. The composite primary key
        // turns a concurrent retry's lost insert into an in-place update.
        let txn = self.db.begin().await?;
        let key = (session_id, identity.internal_id, identity.cohort);
        let record = match attendance_record::Entity::find_by_id(key).one(&txn).await? {
            Some(existing) => {
                self.apply(existing, status, verdict.confidence, now)
                    .update(&txn)
                    .await?
            }
            None => {
                let insert = attendance_record::ActiveModel {
                    session_id: Set(session_id),
                    student_internal_id: Set(identity.internal_id),
                    student_cohort: Set(identity.cohort),
                    status: Set(status),
                    method: Set(session.biometric_method),
                    confidence: Set(Some(verdict.confidence)),
                    recorded_at: Set(now),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                match insert.insert(&txn).await {
                    Ok(record) => record,
                    Err(err)
                        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
                    {
                        // A concurrent retry inserted first; converge on its row.
                        let existing = attendance_record::Entity::find_by_id(key)
                            .one(&txn)
                            .await?
                            .ok_or_else(|| {
                                AttendanceError::StorageConflict(format!(
                                    "record for session {session_id} vanished during upsert"
                                ))
                            })?;
                        self.apply(existing, status, verdict.confidence, now)
                            .update(&txn)
                            .await?
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        };
        txn.commit().await?;

        info!(
            session_id,
            student_internal_id = identity.internal_id,
            cohort = %identity.cohort,
            status = %record.status,
            "attendance recorded"
        );
        Ok(record)
    }

    /// Convenience lookup mirroring the resolver, for callers that need the
    /// student behind a freshly written record.
    pub async fn resolved_student(
        &self,
        identity: &ResolvedIdentity,
    ) -> Result<db::models::student::Model, AttendanceError> {
        self.resolver.lookup(identity).await
    }

    fn apply(
        &self,
        existing: AttendanceRecord,
        status: RecordStatus,
        confidence: f64,
        now: chrono::DateTime<Utc>,
    ) -> attendance_record::ActiveModel {
        let mut active = existing.into_active_model();
        active.status = Set(status);
        active.confidence = Set(Some(confidence));
        active.recorded_at = Set(now);
        active.updated_at = Set(now);
        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{OpenSession, SessionService};
    use db::models::attendance_session::{self, BiometricMethod};
    use db::test_utils::{seed_student, setup_test_db};
    use sea_orm::{ColumnTrait, PaginatorTrait, QueryFilter};

    fn verdict(confidence: f64) -> BiometricVerdict {
        BiometricVerdict {
            matched: true,
            confidence,
            matched_reference: None,
        }
    }

    fn recorder(db: &DatabaseConnection) -> CheckInRecorder {
        CheckInRecorder::new(
            db.clone(),
            IdentityResolver::new(db.clone()),
            CheckInPolicy::default(),
        )
    }

    async fn open_session(db: &DatabaseConnection) -> attendance_session::Model {
        SessionService::new(db.clone())
            .open(OpenSession {
                lecturer_id: 7,
                course_id: 11,
                option_id: 1,
                year_level: 2,
                biometric_method: BiometricMethod::Fingerprint,
            })
            .await
            .unwrap()
    }

    async fn record_count(db: &DatabaseConnection, session_id: i64) -> u64 {
        attendance_record::Entity::find()
            .filter(attendance_record::Column::SessionId.eq(session_id))
            .count(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn match_within_grace_is_present() {
        let db = setup_test_db().await;
        seed_student(&db, 42, Cohort::Regular, "22RP05419").await;
        let session = open_session(&db).await;

        let record = recorder(&db)
            .check_in(session.id, "22RP05419", None, verdict(0.93))
            .await
            .unwrap();

        assert_eq!(record.status, RecordStatus::Present);
        assert_eq!(record.student_internal_id, 42);
        assert_eq!(record.student_cohort, Cohort::Regular);
        assert_eq!(record.method, BiometricMethod::Fingerprint);
        assert_eq!(record.confidence, Some(0.93));
    }

    #[tokio::test]
    async fn repeated_check_in_updates_the_same_record() {
        let db = setup_test_db().await;
        seed_student(&db, 42, Cohort::Regular, "22RP05419").await;
        let session = open_session(&db).await;
        let rec = recorder(&db);

        let first = rec
            .check_in(session.id, "22RP05419", None, verdict(0.71))
            .await
            .unwrap();
        // Flaky scan retried a few times: still exactly one row.
        for _ in 0..3 {
            rec.check_in(session.id, "22RP05419", None, verdict(0.95))
                .await
                .unwrap();
        }

        assert_eq!(record_count(&db, session.id).await, 1);
        let current = attendance_record::Entity::find_by_id((
            session.id,
            first.student_internal_id,
            first.student_cohort,
        ))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
        assert_eq!(current.confidence, Some(0.95));
        assert!(current.recorded_at >= first.recorded_at);
    }

    #[tokio::test]
    async fn check_in_past_grace_period_is_late() {
        let db = setup_test_db().await;
        seed_student(&db, 42, Cohort::Regular, "22RP05419").await;
        let session = open_session(&db).await;

        // Backdate the session start well past the 15 minute default grace.
        let mut backdated = session.clone().into_active_model();
        backdated.start_time = Set(Utc::now() - Duration::minutes(30));
        backdated.update(&db).await.unwrap();

        let record = recorder(&db)
            .check_in(session.id, "22RP05419", None, verdict(0.9))
            .await
            .unwrap();
        assert_eq!(record.status, RecordStatus::Late);
    }

    #[tokio::test]
    async fn closed_session_accepts_no_check_ins() {
        let db = setup_test_db().await;
        seed_student(&db, 42, Cohort::Regular, "22RP05419").await;
        let session = open_session(&db).await;
        SessionService::new(db.clone())
            .close(session.id)
            .await
            .unwrap();

        let err = recorder(&db)
            .check_in(session.id, "22RP05419", None, verdict(0.9))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::SessionNotActive(_)));
        assert_eq!(record_count(&db, session.id).await, 0);
    }

    #[tokio::test]
    async fn non_match_verdict_is_rejected_without_a_record() {
        let db = setup_test_db().await;
        seed_student(&db, 42, Cohort::Regular, "22RP05419").await;
        let session = open_session(&db).await;

        let err = recorder(&db)
            .check_in(
                session.id,
                "22RP05419",
                None,
                BiometricVerdict {
                    matched: false,
                    confidence: 0.2,
                    matched_reference: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::BiometricMismatch { .. }));
        assert_eq!(record_count(&db, session.id).await, 0);
    }

    #[tokio::test]
    async fn low_confidence_match_is_rejected() {
        let db = setup_test_db().await;
        seed_student(&db, 42, Cohort::Regular, "22RP05419").await;
        let session = open_session(&db).await;

        let err = recorder(&db)
            .check_in(session.id, "22RP05419", None, verdict(0.3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::BiometricMismatch { confidence } if confidence == 0.3
        ));
        assert_eq!(record_count(&db, session.id).await, 0);
    }

    #[tokio::test]
    async fn identity_errors_propagate_unchanged() {
        let db = setup_test_db().await;
        seed_student(&db, 42, Cohort::Regular, "22RP05419").await;
        seed_student(&db, 42, Cohort::Test, "TEST-42").await;
        let session = open_session(&db).await;
        let rec = recorder(&db);

        let err = rec
            .check_in(session.id, "99RP99999", None, verdict(0.9))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::IdentityNotFound(_)));

        let err = rec
            .check_in(session.id, "42", None, verdict(0.9))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::AmbiguousIdentity(_)));

        assert_eq!(record_count(&db, session.id).await, 0);
    }

    #[tokio::test]
    async fn cohort_hint_checks_in_the_test_student() {
        let db = setup_test_db().await;
        seed_student(&db, 42, Cohort::Regular, "22RP05419").await;
        seed_student(&db, 42, Cohort::Test, "TEST-42").await;
        let session = open_session(&db).await;

        let record = recorder(&db)
            .check_in(session.id, "42", Some(Cohort::Test), verdict(0.9))
            .await
            .unwrap();
        assert_eq!(record.student_cohort, Cohort::Test);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let db = setup_test_db().await;
        seed_student(&db, 42, Cohort::Regular, "22RP05419").await;

        let err = recorder(&db)
            .check_in(404, "22RP05419", None, verdict(0.9))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::SessionNotFound(404)));
    }
}
