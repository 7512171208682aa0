pub mod db;
pub mod error;
pub mod manager;
pub mod record;
pub mod report;
pub mod storage;
pub mod view;

pub use error::AttendanceError;
pub use manager::{AttendanceManager, ALL_OUT_COMMAND};
pub use record::{AttendanceRecord, Scan, Session, ToggleOutcome};
pub use storage::{MemoryStorage, SqliteStorage, Storage};
pub use view::{AttendanceView, Confirmation, PresentEntry};
