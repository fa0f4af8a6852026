pub mod attendance_stats;
pub mod check_in;
pub mod error;
pub mod identity;
pub mod session;

pub use attendance_stats::AttendanceStats;
pub use db::models::student::Cohort;
pub use check_in::{BiometricVerdict, CheckInPolicy, CheckInRecorder};
pub use error::AttendanceError;
pub use identity::{IdentityResolver, ResolvedIdentity};
pub use session::{OpenSession, SessionService};
