pub mod m202608240001_create_students;
pub mod m202608240002_create_course_enrollments;
pub mod m202608240003_create_attendance_sessions;
pub mod m202608240004_create_attendance_records;
