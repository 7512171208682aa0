//! `signin-core`: configuration, shared error type and the small domain
//! enums used by every other crate in the workspace.

pub mod config;
pub mod error;
pub mod types;

pub use config::{AttendanceSettings, SigninConfig};
pub use error::{Result, SigninError};
pub use types::{Location, Role};
