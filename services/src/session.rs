//! Attendance session lifecycle.
//!
//! Sessions serialize on `(lecturer_id, course_id)` rather than a global
//! lock: different lecturers and courses run concurrently, but a lecturer
//! cannot double-open the same course. The invariant is enforced twice —
//! an advisory pre-check for a useful error, and a partial unique index on
//! the table for the race between two concurrent opens.

use chrono::Utc;
use db::models::attendance_record;
use db::models::attendance_session::{
    ActiveModel, BiometricMethod, Column, Entity, SessionStatus,
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr, TransactionTrait,
};
use tracing::info;

use crate::error::AttendanceError;

pub use db::models::attendance_session::Model as AttendanceSession;

/// Parameters for opening a session.
#[derive(Debug, Clone)]
pub struct OpenSession {
    pub lecturer_id: i64,
    pub course_id: i64,
    pub option_id: i64,
    pub year_level: i32,
    pub biometric_method: BiometricMethod,
}

#[derive(Clone)]
pub struct SessionService {
    db: DatabaseConnection,
}

impl SessionService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Opens a session in the `active` state with `end_time` unset.
    ///
    /// Fails with [`AttendanceError::ConflictingActiveSession`] when the
    /// lecturer already has an active session for the course. Two racing
    /// opens are decided by the storage constraint; the loser gets the same
    /// error, carrying the winner's id.
    pub async fn open(&self, params: OpenSession) -> Result<AttendanceSession, AttendanceError> {
        if let Some(existing) = self
            .find_active(params.lecturer_id, params.course_id)
            .await?
        {
            return Err(AttendanceError::ConflictingActiveSession {
                existing_session_id: existing.id,
            });
        }

        let now = Utc::now();
        let insert = ActiveModel {
            lecturer_id: Set(params.lecturer_id),
            course_id: Set(params.course_id),
            option_id: Set(params.option_id),
            year_level: Set(params.year_level),
            session_date: Set(now.date_naive()),
            start_time: Set(now),
            end_time: Set(None),
            biometric_method: Set(params.biometric_method),
            status: Set(SessionStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        match insert.insert(&self.db).await {
            Ok(session) => {
                info!(
                    session_id = session.id,
                    lecturer_id = session.lecturer_id,
                    course_id = session.course_id,
                    "attendance session opened"
                );
                Ok(session)
            }
            Err(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    // Lost the open race. Report the surviving session if it
                    // is still visible, otherwise surface the conflict as-is.
                    match self
                        .find_active(params.lecturer_id, params.course_id)
                        .await?
                    {
                        Some(existing) => Err(AttendanceError::ConflictingActiveSession {
                            existing_session_id: existing.id,
                        }),
                        None => Err(AttendanceError::StorageConflict(format!(
                            "concurrent open for lecturer {} course {}",
                            params.lecturer_id, params.course_id
                        ))),
                    }
                }
                _ => Err(err.into()),
            },
        }
    }

    /// `active → completed`. The session stops accepting check-ins and starts
    /// counting toward reporting denominators.
    pub async fn close(&self, session_id: i64) -> Result<AttendanceSession, AttendanceError> {
        self.transition(session_id, SessionStatus::Completed, "close")
            .await
    }

    /// `active → cancelled` (administrative override). The session's records
    /// are deleted in the same transaction so a cancelled session never
    /// contributes rows to reporting.
    pub async fn cancel(&self, session_id: i64) -> Result<AttendanceSession, AttendanceError> {
        let session = self.session(session_id).await?;
        if !session.is_active() {
            return Err(AttendanceError::InvalidTransition {
                from: session.status,
                attempted: "cancel",
            });
        }

        let now = Utc::now();
        let txn = self.db.begin().await?;

        attendance_record::Entity::delete_many()
            .filter(attendance_record::Column::SessionId.eq(session_id))
            .exec(&txn)
            .await?;

        let mut active: ActiveModel = session.into();
        active.status = Set(SessionStatus::Cancelled);
        active.end_time = Set(Some(now));
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        info!(session_id, "cancelled attendance session, records discarded");
        Ok(updated)
    }

    /// Bulk `active → completed` for recovery from stale locked sessions.
    /// One UPDATE statement, so atomic as a set; a no-op when nothing is
    /// active. Returns the number of sessions closed.
    pub async fn force_close_all_active(&self) -> Result<u64, AttendanceError> {
        let now = Utc::now();
        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(SessionStatus::Completed))
            .col_expr(Column::EndTime, Expr::value(now))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Status.eq(SessionStatus::Active))
            .exec(&self.db)
            .await?;

        if result.rows_affected > 0 {
            info!(
                closed = result.rows_affected,
                "force-closed all active attendance sessions"
            );
        }
        Ok(result.rows_affected)
    }

    pub async fn session(&self, session_id: i64) -> Result<AttendanceSession, AttendanceError> {
        Entity::find_by_id(session_id)
            .one(&self.db)
            .await?
            .ok_or(AttendanceError::SessionNotFound(session_id))
    }

    /// The active session for a `(lecturer, course)` pair, if any.
    pub async fn find_active(
        &self,
        lecturer_id: i64,
        course_id: i64,
    ) -> Result<Option<AttendanceSession>, AttendanceError> {
        Ok(Entity::find()
            .filter(Column::LecturerId.eq(lecturer_id))
            .filter(Column::CourseId.eq(course_id))
            .filter(Column::Status.eq(SessionStatus::Active))
            .one(&self.db)
            .await?)
    }

    /// All of a lecturer's currently active sessions, oldest first.
    pub async fn active_for_lecturer(
        &self,
        lecturer_id: i64,
    ) -> Result<Vec<AttendanceSession>, AttendanceError> {
        Ok(Entity::find()
            .filter(Column::LecturerId.eq(lecturer_id))
            .filter(Column::Status.eq(SessionStatus::Active))
            .order_by_asc(Column::StartTime)
            .all(&self.db)
            .await?)
    }

    async fn transition(
        &self,
        session_id: i64,
        to: SessionStatus,
        attempted: &'static str,
    ) -> Result<AttendanceSession, AttendanceError> {
        let session = self.session(session_id).await?;
        if !session.is_active() {
            return Err(AttendanceError::InvalidTransition {
                from: session.status,
                attempted,
            });
        }

        let now = Utc::now();
        let mut active: ActiveModel = session.into();
        active.status = Set(to);
        active.end_time = Set(Some(now));
        active.updated_at = Set(now);
        let updated = active.update(&self.db).await?;

        info!(session_id, status = %updated.status, "attendance session transition");
        Ok(updated)
    }
}
