use chrono::{Datelike, Duration, NaiveDate};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DEBOUNCE_WINDOW_SECS: u64 = 5;
pub const DEFAULT_TOTAL_TIME_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_SIGN_OUT_OFFSET_SECS: u64 = 60 * 60; // 01:00 the morning after
pub const DEFAULT_CLOCK_INTERVAL_MS: u64 = 200;

/// Top-level config (signin.toml + SIGNIN_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SigninConfig {
    #[serde(default)]
    pub attendance: AttendanceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Timeouts and accounting window for the attendance manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceConfig {
    /// How long the same badge is ignored after being accepted.
    #[serde(default = "default_debounce_window_secs")]
    pub debounce_window_secs: u64,
    /// Cadence of the running-total recompute.
    #[serde(default = "default_total_time_interval_secs")]
    pub total_time_interval_secs: u64,
    /// Delay after local midnight before everyone still in is signed out.
    #[serde(default = "default_sign_out_offset_secs")]
    pub sign_out_offset_secs: u64,
    /// Start of the accounting window. Unset means 1 January of the current year.
    #[serde(default)]
    pub count_since: Option<NaiveDate>,
    /// Polling period of the scheduler clock.
    #[serde(default = "default_clock_interval_ms")]
    pub clock_interval_ms: u64,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            debounce_window_secs: DEFAULT_DEBOUNCE_WINDOW_SECS,
            total_time_interval_secs: DEFAULT_TOTAL_TIME_INTERVAL_SECS,
            sign_out_offset_secs: DEFAULT_SIGN_OUT_OFFSET_SECS,
            count_since: None,
            clock_interval_ms: DEFAULT_CLOCK_INTERVAL_MS,
        }
    }
}

impl AttendanceConfig {
    /// Resolve the file-level values into the runtime settings the manager uses.
    ///
    /// `today` fills in the default `count_since` when none is configured.
    pub fn settings(&self, today: NaiveDate) -> AttendanceSettings {
        let count_since = self
            .count_since
            .or_else(|| NaiveDate::from_ymd_opt(today.year(), 1, 1))
            .unwrap_or(today);
        AttendanceSettings {
            debounce_window: secs(self.debounce_window_secs),
            total_time_interval: secs(self.total_time_interval_secs),
            sign_out_offset: secs(self.sign_out_offset_secs),
            count_since,
            clock_interval: std::time::Duration::from_millis(self.clock_interval_ms.max(1)),
        }
    }
}

/// Live, resolved settings. Handed to the manager at startup and again
/// whenever the surrounding application observes a settings change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceSettings {
    pub debounce_window: Duration,
    pub total_time_interval: Duration,
    pub sign_out_offset: Duration,
    pub count_since: NaiveDate,
    pub clock_interval: std::time::Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Per-person summary written on shutdown and by `report`.
    #[serde(default = "default_report_path")]
    pub path: String,
    /// Per-session export written by `report --sessions`.
    #[serde(default = "default_sessions_path")]
    pub sessions_path: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: default_report_path(),
            sessions_path: default_sessions_path(),
        }
    }
}

/// Longest window any timer accepts; larger values are clamped.
const MAX_WINDOW_SECS: u64 = 366 * 24 * 60 * 60;

fn secs(n: u64) -> Duration {
    Duration::seconds(n.min(MAX_WINDOW_SECS) as i64)
}

fn default_debounce_window_secs() -> u64 {
    DEFAULT_DEBOUNCE_WINDOW_SECS
}
fn default_total_time_interval_secs() -> u64 {
    DEFAULT_TOTAL_TIME_INTERVAL_SECS
}
fn default_sign_out_offset_secs() -> u64 {
    DEFAULT_SIGN_OUT_OFFSET_SECS
}
fn default_clock_interval_ms() -> u64 {
    DEFAULT_CLOCK_INTERVAL_MS
}
fn default_db_path() -> String {
    format!("{}/signin.db", data_dir())
}
fn default_report_path() -> String {
    format!("{}/summary.csv", data_dir())
}
fn default_sessions_path() -> String {
    format!("{}/sessions.csv", data_dir())
}

fn data_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.signin", home)
}

impl SigninConfig {
    /// Load config from a TOML file with SIGNIN_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `SIGNIN_ATTENDANCE__DEBOUNCE_WINDOW_SECS=10`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::from_figment(
            Figment::new()
                .merge(Toml::file(&path))
                .merge(Env::prefixed("SIGNIN_").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> crate::error::Result<Self> {
        figment
            .extract()
            .map_err(|e| crate::error::SigninError::Config(e.to_string()))
    }
}

fn default_config_path() -> String {
    format!("{}/signin.toml", data_dir())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_yields_defaults() {
        let config = SigninConfig::from_figment(Figment::new()).expect("extract failed");
        assert_eq!(config.attendance.debounce_window_secs, DEFAULT_DEBOUNCE_WINDOW_SECS);
        assert_eq!(config.attendance.clock_interval_ms, DEFAULT_CLOCK_INTERVAL_MS);
        assert!(config.attendance.count_since.is_none());
        assert!(config.database.path.ends_with("signin.db"));
        assert!(config.report.sessions_path.ends_with("sessions.csv"));
    }

    #[test]
    fn toml_overrides_attendance_section() {
        let toml = r#"
            [attendance]
            debounce_window_secs = 30
            count_since = "2026-09-01"

            [database]
            path = "/tmp/club.db"
        "#;
        let config = SigninConfig::from_figment(Figment::new().merge(Toml::string(toml)))
            .expect("extract failed");
        assert_eq!(config.attendance.debounce_window_secs, 30);
        assert_eq!(config.attendance.total_time_interval_secs, DEFAULT_TOTAL_TIME_INTERVAL_SECS);
        assert_eq!(config.attendance.count_since, NaiveDate::from_ymd_opt(2026, 9, 1));
        assert_eq!(config.database.path, "/tmp/club.db");
    }

    #[test]
    fn settings_default_count_since_to_new_year() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let settings = AttendanceConfig::default().settings(today);
        assert_eq!(settings.count_since, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(settings.debounce_window, Duration::seconds(5));
        assert_eq!(settings.sign_out_offset, Duration::hours(1));
        assert_eq!(settings.clock_interval, std::time::Duration::from_millis(200));
    }

    #[test]
    fn oversized_windows_are_clamped() {
        let config = AttendanceConfig {
            sign_out_offset_secs: u64::MAX,
            ..AttendanceConfig::default()
        };
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(config.settings(today).sign_out_offset, Duration::days(366));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = SigninConfig::from_figment(
            Figment::new().merge(Toml::string("[attendance]\ndebounce_window_secs = \"soon\"")),
        )
        .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
