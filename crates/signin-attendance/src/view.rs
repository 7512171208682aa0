use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use signin_core::types::Role;

use crate::record::AttendanceRecord;

/// One row of the "currently present" list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentEntry {
    pub name: String,
    pub role: Role,
    /// When the open session started.
    pub since: NaiveDateTime,
}

impl PresentEntry {
    /// Snapshot `record` if it is currently signed in.
    pub fn from_record(record: &AttendanceRecord) -> Option<Self> {
        if !record.is_present() {
            return None;
        }
        let since = record.last_scan()?.at;
        Some(Self {
            name: record.name().to_string(),
            role: record.role(),
            since,
        })
    }
}

/// Display sink notified by the manager. Calls are fire-and-forget and are
/// made while the manager's state lock is held, so implementations must not
/// call back into the manager.
pub trait AttendanceView: Send + Sync {
    /// Full replacement of the "currently present" list, sorted by name.
    fn present_changed(&self, present: &[PresentEntry]);

    /// A line for the status display. An empty string clears it.
    fn status(&self, text: &str);

    /// Running total across everyone since `since`.
    fn total_time(&self, total: Duration, since: NaiveDate);
}

/// Asks an operator whether a destructive bulk action may proceed.
pub type Confirmation = Arc<dyn Fn() -> bool + Send + Sync>;

/// A view that discards everything. Useful for batch tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullView;

impl AttendanceView for NullView {
    fn present_changed(&self, _present: &[PresentEntry]) {}
    fn status(&self, _text: &str) {}
    fn total_time(&self, _total: Duration, _since: NaiveDate) {}
}
