/// A timer slot. Each variant holds at most one pending deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedEvent {
    /// Forget the last accepted badge so the same person can scan again.
    ResetLastScan,
    /// Recompute the running attendance total.
    UpdateTotalTime,
    /// Sign out everyone still in (end-of-day sweep).
    SignOutRemaining,
    /// Blank the status line on a display.
    ClearDisplayStatus,
}

impl NamedEvent {
    /// Every event, in the order a clock tick polls them.
    pub const ALL: [NamedEvent; 4] = [
        NamedEvent::ResetLastScan,
        NamedEvent::UpdateTotalTime,
        NamedEvent::SignOutRemaining,
        NamedEvent::ClearDisplayStatus,
    ];
}

impl std::fmt::Display for NamedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NamedEvent::ResetLastScan => "reset_last_scan",
            NamedEvent::UpdateTotalTime => "update_total_time",
            NamedEvent::SignOutRemaining => "sign_out_remaining",
            NamedEvent::ClearDisplayStatus => "clear_display_status",
        };
        write!(f, "{s}")
    }
}
