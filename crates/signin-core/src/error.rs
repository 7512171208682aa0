use thiserror::Error;

#[derive(Debug, Error)]
pub enum SigninError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SigninError {
    /// Short error code string used in log fields.
    pub fn code(&self) -> &'static str {
        match self {
            SigninError::Config(_) => "CONFIG_ERROR",
            SigninError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, SigninError>;
