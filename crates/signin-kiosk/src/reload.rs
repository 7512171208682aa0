//! Live settings reload. On unix a SIGHUP re-reads the config file and the
//! attendance settings are handed to the running manager.

use chrono::NaiveDate;
use signin_attendance::AttendanceManager;
use signin_core::config::SigninConfig;
use tracing::{info, warn};

/// Reload trigger. Fires on SIGHUP on unix and never elsewhere.
pub struct ReloadSignal {
    #[cfg(unix)]
    hangup: Option<tokio::signal::unix::Signal>,
}

impl ReloadSignal {
    /// Must be called from within a Tokio runtime.
    pub fn install() -> Self {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let hangup = match signal(SignalKind::hangup()) {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!(error = %e, "cannot install SIGHUP handler; live reload disabled");
                    None
                }
            };
            Self { hangup }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }

    /// Wait for the next reload request.
    pub async fn recv(&mut self) {
        #[cfg(unix)]
        if let Some(hangup) = self.hangup.as_mut() {
            if hangup.recv().await.is_some() {
                return;
            }
            self.hangup = None;
        }
        std::future::pending::<()>().await
    }
}

/// Re-read the config and apply its attendance settings to `manager`.
///
/// A config that fails to load leaves the current settings in place.
pub fn reload_settings(
    manager: &AttendanceManager,
    config_path: Option<&str>,
    today: NaiveDate,
) -> bool {
    match SigninConfig::load(config_path) {
        Ok(config) => {
            manager.apply_settings(config.attendance.settings(today));
            info!(path = config_path.unwrap_or("(default)"), "settings reloaded");
            true
        }
        Err(e) => {
            warn!(error = %e, code = e.code(), "settings reload failed; keeping current settings");
            false
        }
    }
}
