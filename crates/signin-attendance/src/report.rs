//! CSV reports: a per-person summary of hours since a start date, and a
//! per-session export with optional name and date filters.

use std::io::Write;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use csv::WriterBuilder;
use tracing::{info, instrument};

use crate::error::Result;
use crate::record::{AttendanceRecord, Session};

const HEADER: [&str; 5] = ["Name", "Role", "Hours", "Present", "LastScan"];
const SESSION_HEADER: [&str; 4] = ["Name", "Start", "End", "Elapsed"];
const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Write the attendance summary for `records` to `out`.
///
/// Rows are sorted by name. Hours include open sessions up to `now`.
#[instrument(skip(records, out), fields(count = records.len()))]
pub fn write_summary<W: Write>(
    records: &[AttendanceRecord],
    since: NaiveDate,
    now: NaiveDateTime,
    out: W,
) -> Result<()> {
    let since = since.and_time(NaiveTime::MIN);
    let mut sorted: Vec<&AttendanceRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.name().cmp(b.name()));

    let mut writer = WriterBuilder::new().from_writer(out);
    writer.write_record(HEADER)?;
    for record in sorted {
        let seconds = record.total_time_since(since, now).num_seconds();
        let hours = format!("{:.2}", seconds as f64 / 3600.0);
        let last_scan = record
            .last_scan()
            .map(|s| s.at.format(STAMP_FORMAT).to_string())
            .unwrap_or_default();
        let role = record.role().to_string();
        let present = if record.is_present() { "yes" } else { "no" };
        let row: [&str; 5] = [record.name(), &role, &hours, present, &last_scan];
        writer.write_record(row)?;
    }
    writer.flush()?;
    info!(%since, "summary report written");
    Ok(())
}

/// Write the summary to a file, creating parent directories as needed.
pub fn write_summary_file(
    records: &[AttendanceRecord],
    since: NaiveDate,
    now: NaiveDateTime,
    path: &str,
) -> Result<()> {
    write_summary(records, since, now, create_report_file(path)?)
}

/// Which sessions a session export includes. Empty filter means all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    name: Option<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

impl SessionFilter {
    /// `name` may be badge text (`Last, First`) or a display name; the
    /// dates bound the day a session starts on, both inclusive.
    pub fn new(name: Option<&str>, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        let name = name.map(|n| match AttendanceRecord::parse(n) {
            Some(parsed) => parsed.name().to_string(),
            None => n.split_whitespace().collect::<Vec<_>>().join(" "),
        });
        Self { name, from, to }
    }

    fn includes_person(&self, name: &str) -> bool {
        self.name
            .as_deref()
            .map_or(true, |wanted| wanted.eq_ignore_ascii_case(name))
    }

    fn includes_session(&self, session: &Session) -> bool {
        let day = session.start.date();
        self.from.map_or(true, |from| day >= from) && self.to.map_or(true, |to| day <= to)
    }
}

/// Write one row per completed session to `out`. Returns the row count.
///
/// Rows are sorted by name, then start. Open sessions are left out until
/// they close.
#[instrument(skip(records, out), fields(count = records.len()))]
pub fn write_sessions<W: Write>(
    records: &[AttendanceRecord],
    filter: &SessionFilter,
    out: W,
) -> Result<usize> {
    let mut sorted: Vec<&AttendanceRecord> = records
        .iter()
        .filter(|r| filter.includes_person(r.name()))
        .collect();
    sorted.sort_by(|a, b| a.name().cmp(b.name()));

    let mut writer = WriterBuilder::new().from_writer(out);
    writer.write_record(SESSION_HEADER)?;
    let mut rows = 0;
    for record in sorted {
        for session in record.sessions() {
            let Some(end) = session.end else { continue };
            if !filter.includes_session(&session) {
                continue;
            }
            let start = session.start.format(STAMP_FORMAT).to_string();
            let end_text = end.format(STAMP_FORMAT).to_string();
            let elapsed = format_elapsed(session.elapsed(end));
            let row: [&str; 4] = [record.name(), &start, &end_text, &elapsed];
            writer.write_record(row)?;
            rows += 1;
        }
    }
    writer.flush()?;
    info!(rows, "session export written");
    Ok(rows)
}

/// Write the session export to a file, creating parent directories as needed.
pub fn write_sessions_file(
    records: &[AttendanceRecord],
    filter: &SessionFilter,
    path: &str,
) -> Result<usize> {
    write_sessions(records, filter, create_report_file(path)?)
}

fn create_report_file(path: &str) -> Result<std::fs::File> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(std::fs::File::create(path)?)
}

/// `H:MM:SS`, hours unbounded.
fn format_elapsed(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use signin_core::types::Role;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn render(records: &[AttendanceRecord], since: NaiveDate, now: NaiveDateTime) -> String {
        let mut buf = Vec::new();
        write_summary(records, since, now, &mut buf).expect("report failed");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn empty_report_has_only_header() {
        let since = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(render(&[], since, at(18, 12, 0)), "Name,Role,Hours,Present,LastScan\n");
    }

    #[test]
    fn rows_are_sorted_and_include_open_sessions() {
        let mut grace = AttendanceRecord::new("Grace Hopper", Role::Mentor);
        grace.toggle(at(18, 9, 0));
        grace.toggle(at(18, 10, 30));
        let mut ada = AttendanceRecord::new("Ada Lovelace", Role::Student);
        ada.toggle(at(18, 11, 0));

        let since = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        let csv = render(&[grace, ada], since, at(18, 11, 15));
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "Ada Lovelace,student,0.25,yes,2026-10-18 11:00");
        assert_eq!(lines[2], "Grace Hopper,mentor,1.50,no,2026-10-18 10:30");
    }

    #[test]
    fn never_scanned_person_has_blank_last_scan() {
        let rec = AttendanceRecord::new("Alan Turing", Role::Student);
        let since = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let csv = render(&[rec], since, at(18, 12, 0));
        assert!(csv.ends_with("Alan Turing,student,0.00,no,\n"));
    }

    fn ada_history() -> AttendanceRecord {
        let mut ada = AttendanceRecord::new("Ada Lovelace", Role::Student);
        ada.toggle(at(16, 9, 0));
        ada.toggle(at(16, 11, 30));
        ada.toggle(at(17, 14, 0));
        ada.toggle(at(17, 14, 45));
        ada.toggle(at(18, 9, 0));
        ada
    }

    fn render_sessions(records: &[AttendanceRecord], filter: &SessionFilter) -> (usize, String) {
        let mut buf = Vec::new();
        let rows = write_sessions(records, filter, &mut buf).expect("export failed");
        (rows, String::from_utf8(buf).expect("utf8"))
    }

    #[test]
    fn session_export_lists_completed_sessions() {
        let mut grace = AttendanceRecord::new("Grace Hopper", Role::Mentor);
        grace.toggle(at(16, 18, 0));
        grace.toggle(at(16, 19, 0));

        let (rows, csv) = render_sessions(&[grace, ada_history()], &SessionFilter::default());
        assert_eq!(rows, 3);
        assert_eq!(
            csv,
            "Name,Start,End,Elapsed\n\
             Ada Lovelace,2026-10-16 09:00,2026-10-16 11:30,2:30:00\n\
             Ada Lovelace,2026-10-17 14:00,2026-10-17 14:45,0:45:00\n\
             Grace Hopper,2026-10-16 18:00,2026-10-16 19:00,1:00:00\n"
        );
    }

    #[test]
    fn session_export_filters_by_name_and_day() {
        let mut grace = AttendanceRecord::new("Grace Hopper", Role::Mentor);
        grace.toggle(at(17, 18, 0));
        grace.toggle(at(17, 19, 0));
        let records = [ada_history(), grace];

        let by_badge = SessionFilter::new(Some("LOVELACE, ada"), None, None);
        assert_eq!(render_sessions(&records, &by_badge).0, 2);

        let by_display = SessionFilter::new(Some("grace  hopper"), None, None);
        assert_eq!(render_sessions(&records, &by_display).0, 1);

        let day = NaiveDate::from_ymd_opt(2026, 10, 17);
        let (rows, csv) = render_sessions(&records, &SessionFilter::new(None, day, day));
        assert_eq!(rows, 2);
        assert!(!csv.contains("2026-10-16"));
    }
}
