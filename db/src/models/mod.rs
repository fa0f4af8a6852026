pub mod attendance_record;
pub mod attendance_session;
pub mod course_enrollment;
pub mod student;

pub use attendance_record::Entity as AttendanceRecord;
pub use attendance_session::Entity as AttendanceSession;
pub use course_enrollment::Entity as CourseEnrollment;
pub use student::Entity as Student;
