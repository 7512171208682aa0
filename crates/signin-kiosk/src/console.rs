//! Terminal front-end: prints manager notifications and asks for confirmation.

use std::io::{self, BufRead, Write};

use chrono::{Duration, NaiveDate};
use signin_attendance::{AttendanceView, PresentEntry};
use signin_core::types::Role;

/// Writes every notification to stdout as a single line.
pub struct ConsoleView;

impl AttendanceView for ConsoleView {
    fn present_changed(&self, present: &[PresentEntry]) {
        let names: Vec<String> = present.iter().map(present_label).collect();
        println!("present ({}): {}", present.len(), names.join(", "));
    }

    fn status(&self, text: &str) {
        if !text.is_empty() {
            println!("{text}");
        }
    }

    fn total_time(&self, total: Duration, since: NaiveDate) {
        println!("total since {since}: {}", format_duration(total));
    }
}

/// Mentors are starred, as on the paper sign-in sheet.
fn present_label(entry: &PresentEntry) -> String {
    let star = if entry.role == Role::Mentor { "*" } else { "" };
    format!("{star}{} ({})", entry.name, entry.since.format("%H:%M"))
}

/// `H:MM`, hours unbounded.
pub fn format_duration(d: Duration) -> String {
    let minutes = d.num_minutes().max(0);
    format!("{}:{:02}", minutes / 60, minutes % 60)
}

/// Prompt on stderr and read one answer from `input`. Only `y`/`yes` confirm.
pub fn ask_yes_no<R: BufRead>(prompt: &str, mut input: R) -> bool {
    eprint!("{prompt} [y/N] ");
    let _ = io::stderr().flush();
    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(0) | Err(_) => false,
        Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
    }
}
