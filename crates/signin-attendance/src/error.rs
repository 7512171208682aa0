use thiserror::Error;

/// Errors that can occur while tracking attendance.
#[derive(Debug, Error)]
pub enum AttendanceError {
    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Writing the summary report failed.
    #[error("report error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored row could not be turned back into a record.
    #[error("invalid stored record for {name}: {reason}")]
    InvalidRecord { name: String, reason: String },

    /// An all-out was requested but no confirmation source was installed.
    ///
    /// This is a setup bug, not a user error; callers should treat it as fatal.
    #[error("sign-all-out invoked without a confirmation source")]
    MissingConfirmation,
}

pub type Result<T> = std::result::Result<T, AttendanceError>;
