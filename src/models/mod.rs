pub mod attendance;
pub mod notification;
pub mod pending;
pub mod roster;

pub use attendance::{AttendanceRecord, AttendanceStatus, SubmitRequest, SubmitResponse};
pub use notification::NotificationMessage;
pub use pending::{NewScanEvent, PendingScanEvent, ScanKind};
pub use roster::{AbsentRequest, RosterStudent, Student, Teacher};
