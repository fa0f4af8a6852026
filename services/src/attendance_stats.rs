//! Read-side aggregation over the attendance record set.
//!
//! Absence is derived, never stored: an enrolled student with no record in a
//! finished session was absent from it. Only completed sessions enter the
//! denominators; an open session has not yet given anyone the chance to
//! attend, and a cancelled one administratively never happened (its records
//! are deleted when it is cancelled).

use std::collections::HashMap;

use db::models::attendance_record::{self, RecordStatus};
use db::models::attendance_session::{self, SessionStatus};
use db::models::course_enrollment;
use db::models::student::{self, Cohort};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use serde::Serialize;

use crate::error::AttendanceError;
use crate::identity::ResolvedIdentity;

/// One student's standing in one course.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StudentCourseSummary {
    pub present_count: u64,
    pub absent_count: u64,
    pub late_count: u64,
    pub total_sessions: u64,
    /// `present / total * 100`, one decimal, `0.0` when no session has
    /// finished. Late check-ins are reported separately and do not count
    /// toward the percentage.
    pub attendance_percentage: f64,
}

impl StudentCourseSummary {
    fn empty() -> Self {
        Self {
            present_count: 0,
            absent_count: 0,
            late_count: 0,
            total_sessions: 0,
            attendance_percentage: 0.0,
        }
    }
}

/// Class-level counts for a single session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionBreakdown {
    pub session_id: i64,
    pub session_date: chrono::NaiveDate,
    pub status: SessionStatus,
    pub present: u64,
    pub late: u64,
    pub absent: u64,
    pub enrolled: u64,
}

/// Course-wide report row: one enrolled student plus their summary.
#[derive(Debug, Clone, Serialize)]
pub struct StudentCourseOverview {
    pub internal_id: i64,
    pub cohort: Cohort,
    pub registration_number: String,
    pub full_name: String,
    pub summary: StudentCourseSummary,
}

/// Pure reads over sessions, records and enrollments. Nothing here writes.
#[derive(Clone)]
pub struct AttendanceStats {
    db: DatabaseConnection,
}

impl AttendanceStats {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Presence/absence/lateness counts for one student in one course.
    pub async fn per_student_summary(
        &self,
        course_id: i64,
        identity: &ResolvedIdentity,
    ) -> Result<StudentCourseSummary, AttendanceError> {
        let session_ids = self.finished_session_ids(course_id).await?;
        let total_sessions = session_ids.len() as u64;
        if total_sessions == 0 {
            return Ok(StudentCourseSummary::empty());
        }

        let records = attendance_record::Entity::find()
            .filter(attendance_record::Column::SessionId.is_in(session_ids))
            .filter(attendance_record::Column::StudentInternalId.eq(identity.internal_id))
            .filter(attendance_record::Column::StudentCohort.eq(identity.cohort))
            .all(&self.db)
            .await?;

        let present_count = records
            .iter()
            .filter(|r| r.status == RecordStatus::Present)
            .count() as u64;
        let late_count = records
            .iter()
            .filter(|r| r.status == RecordStatus::Late)
            .count() as u64;

        Ok(StudentCourseSummary {
            present_count,
            late_count,
            absent_count: total_sessions.saturating_sub(present_count + late_count),
            total_sessions,
            attendance_percentage: percentage(present_count, total_sessions),
        })
    }

    /// Per-session class counts for a course, oldest session first.
    /// Cancelled sessions are omitted; an open session shows its counts so
    /// far, with `absent` meaning "not yet recorded".
    pub async fn per_session_breakdown(
        &self,
        course_id: i64,
    ) -> Result<Vec<SessionBreakdown>, AttendanceError> {
        let sessions = attendance_session::Entity::find()
            .filter(attendance_session::Column::CourseId.eq(course_id))
            .filter(attendance_session::Column::Status.ne(SessionStatus::Cancelled))
            .order_by_asc(attendance_session::Column::StartTime)
            .all(&self.db)
            .await?;
        if sessions.is_empty() {
            return Ok(Vec::new());
        }

        let enrolled = course_enrollment::Entity::find()
            .filter(course_enrollment::Column::CourseId.eq(course_id))
            .count(&self.db)
            .await?;

        let session_ids: Vec<i64> = sessions.iter().map(|s| s.id).collect();
        let records = attendance_record::Entity::find()
            .filter(attendance_record::Column::SessionId.is_in(session_ids))
            .all(&self.db)
            .await?;

        let mut counts: HashMap<i64, (u64, u64)> = HashMap::new();
        for record in &records {
            let entry = counts.entry(record.session_id).or_default();
            match record.status {
                RecordStatus::Present => entry.0 += 1,
                RecordStatus::Late => entry.1 += 1,
            }
        }

        Ok(sessions
            .into_iter()
            .map(|session| {
                let (present, late) = counts.get(&session.id).copied().unwrap_or_default();
                SessionBreakdown {
                    session_id: session.id,
                    session_date: session.session_date,
                    status: session.status,
                    present,
                    late,
                    absent: enrolled.saturating_sub(present + late),
                    enrolled,
                }
            })
            .collect())
    }

    /// Summaries for every student enrolled in the course, ordered by
    /// registration number.
    pub async fn course_overview(
        &self,
        course_id: i64,
    ) -> Result<Vec<StudentCourseOverview>, AttendanceError> {
        let enrollments = course_enrollment::Entity::find()
            .filter(course_enrollment::Column::CourseId.eq(course_id))
            .all(&self.db)
            .await?;
        if enrollments.is_empty() {
            return Ok(Vec::new());
        }

        let session_ids = self.finished_session_ids(course_id).await?;
        let total_sessions = session_ids.len() as u64;

        let mut counts: HashMap<(i64, Cohort), (u64, u64)> = HashMap::new();
        if total_sessions > 0 {
            let records = attendance_record::Entity::find()
                .filter(attendance_record::Column::SessionId.is_in(session_ids))
                .all(&self.db)
                .await?;
            for record in &records {
                let key = (record.student_internal_id, record.student_cohort);
                let entry = counts.entry(key).or_default();
                match record.status {
                    RecordStatus::Present => entry.0 += 1,
                    RecordStatus::Late => entry.1 += 1,
                }
            }
        }

        let mut pair_filter = Condition::any();
        for e in &enrollments {
            pair_filter = pair_filter.add(
                Condition::all()
                    .add(student::Column::InternalId.eq(e.student_internal_id))
                    .add(student::Column::Cohort.eq(e.student_cohort)),
            );
        }
        let students: HashMap<(i64, Cohort), student::Model> = student::Entity::find()
            .filter(pair_filter)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|s| ((s.internal_id, s.cohort), s))
            .collect();

        let mut rows: Vec<StudentCourseOverview> = enrollments
            .iter()
            .filter_map(|e| {
                let key = (e.student_internal_id, e.student_cohort);
                let student = students.get(&key)?;
                let (present_count, late_count) = counts.get(&key).copied().unwrap_or_default();
                Some(StudentCourseOverview {
                    internal_id: student.internal_id,
                    cohort: student.cohort,
                    registration_number: student.registration_number.clone(),
                    full_name: student.full_name(),
                    summary: StudentCourseSummary {
                        present_count,
                        late_count,
                        absent_count: total_sessions.saturating_sub(present_count + late_count),
                        total_sessions,
                        attendance_percentage: percentage(present_count, total_sessions),
                    },
                })
            })
            .collect();
        rows.sort_by(|a, b| a.registration_number.cmp(&b.registration_number));
        Ok(rows)
    }

    /// Sessions that count toward denominators: completed, end time set.
    async fn finished_session_ids(&self, course_id: i64) -> Result<Vec<i64>, AttendanceError> {
        let sessions = attendance_session::Entity::find()
            .filter(attendance_session::Column::CourseId.eq(course_id))
            .filter(attendance_session::Column::Status.eq(SessionStatus::Completed))
            .all(&self.db)
            .await?;
        Ok(sessions.into_iter().map(|s| s.id).collect())
    }
}

fn percentage(present: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = present as f64 / total as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}
