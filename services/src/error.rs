use db::models::attendance_session::SessionStatus;
use sea_orm::DbErr;
use thiserror::Error;

/// Failure taxonomy of the attendance engine. Every variant is returned to
/// the caller; nothing is swallowed and nothing is retried internally.
#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("lecturer already has an active session for this course (session {existing_session_id})")]
    ConflictingActiveSession { existing_session_id: i64 },

    #[error("cannot {attempted} a session in the '{from}' state")]
    InvalidTransition {
        from: SessionStatus,
        attempted: &'static str,
    },

    #[error("attendance session {0} is not active")]
    SessionNotActive(i64),

    #[error("attendance session {0} not found")]
    SessionNotFound(i64),

    #[error("no student matches reference '{0}'")]
    IdentityNotFound(String),

    #[error("reference '{0}' matches students in more than one cohort")]
    AmbiguousIdentity(String),

    #[error("biometric verdict rejected (confidence {confidence:.2})")]
    BiometricMismatch { confidence: f64 },

    #[error("storage conflict: {0}")]
    StorageConflict(String),

    #[error(transparent)]
    Db(#[from] DbErr),
}
