use chrono::{Duration, NaiveDate, NaiveDateTime};
use signin_core::types::{Location, Role};

/// Case-insensitive badge prefix that marks a mentor.
const MENTOR_PREFIX: &str = "mentor";

/// One badge read: when it happened and where it left the person.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scan {
    pub at: NaiveDateTime,
    pub location: Location,
}

/// Result of a scan-driven transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub succeeded: bool,
    /// Human-readable line for the status display.
    pub status: String,
    pub location: Location,
}

/// A counted stretch of time in. `end` is `None` while still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
}

impl Session {
    /// Length of the session, running up to `now` if still open.
    pub fn elapsed(&self, now: NaiveDateTime) -> Duration {
        let end = self.end.unwrap_or(now);
        if end > self.start {
            end - self.start
        } else {
            Duration::zero()
        }
    }
}

/// One person's scan history.
///
/// Scans are kept in non-decreasing time order; everything else (current
/// location, time totals) is derived from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    name: String,
    role: Role,
    scans: Vec<Scan>,
}

impl AttendanceRecord {
    /// A record that has never scanned.
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            scans: Vec::new(),
        }
    }

    /// Rebuild a record from stored parts. Scans are re-sorted by time.
    pub fn from_parts(name: impl Into<String>, role: Role, mut scans: Vec<Scan>) -> Self {
        scans.sort_by_key(|s| s.at);
        Self {
            name: name.into(),
            role,
            scans,
        }
    }

    /// Parse raw badge text into an empty record.
    ///
    /// Accepts `Last, First` with an optional `Mentor` prefix (separated by
    /// spaces or dashes). Name parts may contain letters, spaces and
    /// apostrophes. Anything else returns `None`; this never fails loudly
    /// because misreads are routine.
    pub fn parse(text: &str) -> Option<Self> {
        let (role, rest) = strip_mentor_prefix(text.trim());
        let (last, first) = rest.split_once(',')?;
        let last = normalize_name_part(last)?;
        let first = normalize_name_part(first)?;
        Some(Self::new(format!("{first} {last}"), role))
    }

    /// Full name, "First Last". This is the record's identity.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    pub fn scans(&self) -> &[Scan] {
        &self.scans
    }

    pub fn last_scan(&self) -> Option<&Scan> {
        self.scans.last()
    }

    /// Location implied by the most recent scan.
    pub fn current_location(&self) -> Location {
        self.scans
            .last()
            .map(|s| s.location)
            .unwrap_or(Location::NEVER_SCANNED)
    }

    pub fn is_present(&self) -> bool {
        self.current_location() == Location::In
    }

    /// The normal scan transition: in becomes out, anything else becomes in.
    pub fn toggle(&mut self, now: NaiveDateTime) -> ToggleOutcome {
        let next = if self.is_present() {
            Location::Out
        } else {
            Location::In
        };
        let at = self.push(next, now);
        let verb = if next == Location::In { "in" } else { "out" };
        ToggleOutcome {
            succeeded: true,
            status: format!("{} signed {verb} at {}", self.name, at.format("%H:%M")),
            location: next,
        }
    }

    /// Append a scan at `location` regardless of the current state.
    ///
    /// Used by administrative sign-outs. Returns the stored timestamp.
    pub fn sign_in_or_out(&mut self, location: Location, now: NaiveDateTime) -> NaiveDateTime {
        self.push(location, now)
    }

    /// Counted sessions in time order, pairing each In with the next close.
    ///
    /// In→Uncounted closes a session without counting it, a repeated In
    /// keeps the original start and a close with nothing open is ignored.
    /// The last session is open if the person is still in.
    pub fn sessions(&self) -> Vec<Session> {
        let mut sessions = Vec::new();
        let mut open: Option<NaiveDateTime> = None;

        for scan in &self.scans {
            match scan.location {
                Location::In => {
                    open.get_or_insert(scan.at);
                }
                Location::Out => {
                    if let Some(start) = open.take() {
                        sessions.push(Session {
                            start,
                            end: Some(scan.at),
                        });
                    }
                }
                Location::Uncounted => open = None,
            }
        }

        if let Some(start) = open {
            sessions.push(Session { start, end: None });
        }
        sessions
    }

    /// Time spent in since `since`, counting an open session up to `now`.
    ///
    /// Sessions that straddle `since` are clamped to start there.
    pub fn total_time_since(&self, since: NaiveDateTime, now: NaiveDateTime) -> Duration {
        self.sessions()
            .iter()
            .fold(Duration::zero(), |acc, session| {
                acc + clamped(session.start, session.end.unwrap_or(now), since)
            })
    }

    /// Drop every scan dated before `cutoff`. Returns how many were removed.
    ///
    /// Closing scans left at the head of the history lost their opening In,
    /// so they are dropped too. An emptied record is back to never-scanned.
    pub fn prune(&mut self, cutoff: NaiveDate) -> usize {
        let before = self.scans.len();
        self.scans.retain(|s| s.at.date() >= cutoff);
        if self.scans.len() != before {
            let dangling = self
                .scans
                .iter()
                .take_while(|s| s.location.closes_session())
                .count();
            self.scans.drain(..dangling);
        }
        before - self.scans.len()
    }

    fn push(&mut self, location: Location, now: NaiveDateTime) -> NaiveDateTime {
        // Never let a clock step backwards break the ordering.
        let at = match self.scans.last() {
            Some(last) if last.at > now => last.at,
            _ => now,
        };
        self.scans.push(Scan { at, location });
        at
    }
}

fn clamped(start: NaiveDateTime, end: NaiveDateTime, since: NaiveDateTime) -> Duration {
    let start = start.max(since);
    if end > start {
        end - start
    } else {
        Duration::zero()
    }
}

fn strip_mentor_prefix(text: &str) -> (Role, &str) {
    let Some(head) = text.get(..MENTOR_PREFIX.len()) else {
        return (Role::Student, text);
    };
    if !head.eq_ignore_ascii_case(MENTOR_PREFIX) {
        return (Role::Student, text);
    }
    let rest = &text[MENTOR_PREFIX.len()..];
    let stripped = rest.trim_start_matches([' ', '-']);
    // "Mentorson, Al" is a surname, not a prefix.
    if stripped.len() == rest.len() {
        return (Role::Student, text);
    }
    (Role::Mentor, stripped)
}

/// Validate one side of `Last, First` and normalise it to "Word Word".
fn normalize_name_part(part: &str) -> Option<String> {
    if !part
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c == ' ' || c == '\'')
    {
        return None;
    }
    let words: Vec<String> = part.split_whitespace().map(capitalize).collect();
    if words.is_empty() || !words.iter().any(|w| w.chars().any(|c| c.is_ascii_alphabetic())) {
        return None;
    }
    Some(words.join(" "))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_ascii_uppercase()
            .to_string()
            + &chars.as_str().to_ascii_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        day(d).and_hms_opt(h, m, 0).unwrap()
    }

    fn scan(at: NaiveDateTime, location: Location) -> Scan {
        Scan { at, location }
    }

    #[test]
    fn parses_student_badge() {
        let rec = AttendanceRecord::parse("Lovelace, Ada").expect("should parse");
        assert_eq!(rec.name(), "Ada Lovelace");
        assert_eq!(rec.role(), Role::Student);
        assert!(rec.scans().is_empty());
        assert_eq!(rec.current_location(), Location::NEVER_SCANNED);
    }

    #[test]
    fn parse_normalises_case_and_spacing() {
        let rec = AttendanceRecord::parse("  van  ROSSUM ,   guido \r\n").expect("should parse");
        assert_eq!(rec.name(), "Guido Van Rossum");
        let rec = AttendanceRecord::parse("o'brien, MILES").expect("should parse");
        assert_eq!(rec.name(), "Miles O'brien");
    }

    #[test]
    fn parses_mentor_prefix_variants() {
        for text in ["Mentor Hopper, Grace", "MENTOR-Hopper, Grace", "mentor - Hopper,Grace"] {
            let rec = AttendanceRecord::parse(text).expect(text);
            assert_eq!(rec.name(), "Grace Hopper", "{text}");
            assert_eq!(rec.role(), Role::Mentor, "{text}");
        }
    }

    #[test]
    fn mentor_prefix_needs_a_separator() {
        // Without a space or dash the word is read as part of the surname.
        let rec = AttendanceRecord::parse("MentorHopper, Grace").expect("should parse");
        assert_eq!(rec.name(), "Grace Mentorhopper");
        assert_eq!(rec.role(), Role::Student);
    }

    #[test]
    fn surname_starting_with_mentor_is_not_a_prefix() {
        let rec = AttendanceRecord::parse("Mentorson, Al").expect("should parse");
        assert_eq!(rec.name(), "Al Mentorson");
        assert_eq!(rec.role(), Role::Student);
    }

    #[test]
    fn malformed_text_is_not_a_person() {
        for text in [
            "",
            "   ",
            "Lovelace Ada",
            ",",
            "Lovelace,",
            ", Ada",
            "L0velace, Ada",
            "Lovelace, Ada, Countess",
            "%%%%",
            "Mentor",
            "Mentor ,",
            "' , '",
            "Lövelace, Ada",
        ] {
            assert!(AttendanceRecord::parse(text).is_none(), "{text:?} parsed");
        }
    }

    #[test]
    fn toggle_parity_decides_location() {
        let mut rec = AttendanceRecord::new("Ada Lovelace", Role::Student);
        for n in 1..=9u32 {
            let outcome = rec.toggle(at(18, 8, n));
            assert!(outcome.succeeded);
            let expected = if n % 2 == 1 { Location::In } else { Location::Out };
            assert_eq!(outcome.location, expected);
            assert_eq!(rec.current_location(), expected);
        }
    }

    #[test]
    fn toggle_status_names_person_and_time() {
        let mut rec = AttendanceRecord::new("Ada Lovelace", Role::Student);
        assert_eq!(rec.toggle(at(18, 9, 5)).status, "Ada Lovelace signed in at 09:05");
        assert_eq!(rec.toggle(at(18, 17, 30)).status, "Ada Lovelace signed out at 17:30");
    }

    #[test]
    fn toggle_from_uncounted_signs_in() {
        let mut rec = AttendanceRecord::new("Ada Lovelace", Role::Student);
        rec.sign_in_or_out(Location::Uncounted, at(18, 9, 0));
        assert_eq!(rec.toggle(at(18, 10, 0)).location, Location::In);
    }

    #[test]
    fn backwards_clock_keeps_scans_ordered() {
        let mut rec = AttendanceRecord::new("Ada Lovelace", Role::Student);
        rec.toggle(at(18, 10, 0));
        let stored = rec.sign_in_or_out(Location::Out, at(18, 9, 0));
        assert_eq!(stored, at(18, 10, 0));
        assert!(rec.scans().windows(2).all(|w| w[0].at <= w[1].at));
    }

    #[test]
    fn total_counts_closed_and_open_sessions() {
        let rec = AttendanceRecord::from_parts(
            "Ada Lovelace",
            Role::Student,
            vec![
                scan(at(18, 10, 0), Location::In),
                scan(at(18, 12, 0), Location::Out),
                scan(at(18, 14, 0), Location::In),
            ],
        );
        let now = at(18, 15, 0);
        assert_eq!(rec.total_time_since(at(18, 0, 0), now), Duration::hours(3));
        assert_eq!(rec.total_time_since(at(18, 11, 0), now), Duration::hours(2));
    }

    #[test]
    fn total_excludes_sessions_before_since() {
        let rec = AttendanceRecord::from_parts(
            "Ada Lovelace",
            Role::Student,
            vec![
                scan(at(17, 10, 0), Location::In),
                scan(at(17, 12, 0), Location::Out),
                scan(at(18, 10, 0), Location::In),
                scan(at(18, 10, 30), Location::Out),
            ],
        );
        assert_eq!(
            rec.total_time_since(at(18, 0, 0), at(18, 20, 0)),
            Duration::minutes(30)
        );
    }

    #[test]
    fn uncounted_session_adds_nothing() {
        let rec = AttendanceRecord::from_parts(
            "Ada Lovelace",
            Role::Student,
            vec![
                scan(at(18, 9, 0), Location::In),
                scan(at(18, 23, 0), Location::Uncounted),
                scan(at(19, 9, 0), Location::In),
                scan(at(19, 10, 0), Location::Out),
            ],
        );
        assert_eq!(rec.total_time_since(at(1, 0, 0), at(19, 12, 0)), Duration::hours(1));
    }

    #[test]
    fn sessions_pair_scans_and_skip_uncounted() {
        let rec = AttendanceRecord::from_parts(
            "Ada Lovelace",
            Role::Student,
            vec![
                scan(at(17, 8, 0), Location::Out),
                scan(at(17, 9, 0), Location::In),
                scan(at(17, 9, 30), Location::In),
                scan(at(17, 12, 0), Location::Out),
                scan(at(17, 13, 0), Location::In),
                scan(at(17, 23, 0), Location::Uncounted),
                scan(at(18, 9, 0), Location::In),
            ],
        );
        assert_eq!(
            rec.sessions(),
            vec![
                Session {
                    start: at(17, 9, 0),
                    end: Some(at(17, 12, 0)),
                },
                Session {
                    start: at(18, 9, 0),
                    end: None,
                },
            ]
        );
        assert_eq!(rec.sessions()[1].elapsed(at(18, 9, 45)), Duration::minutes(45));
    }

    #[test]
    fn from_parts_sorts_scans() {
        let rec = AttendanceRecord::from_parts(
            "Ada Lovelace",
            Role::Mentor,
            vec![
                scan(at(18, 12, 0), Location::Out),
                scan(at(18, 10, 0), Location::In),
            ],
        );
        assert_eq!(rec.scans()[0].location, Location::In);
        assert_eq!(rec.current_location(), Location::Out);
    }

    #[test]
    fn prune_removes_earlier_dates_and_rederives_location() {
        let mut rec = AttendanceRecord::from_parts(
            "Ada Lovelace",
            Role::Student,
            vec![
                scan(at(16, 9, 0), Location::In),
                scan(at(16, 17, 0), Location::Out),
                scan(at(18, 0, 5), Location::In),
            ],
        );
        assert_eq!(rec.prune(day(18)), 2);
        assert_eq!(rec.scans().len(), 1);
        assert_eq!(rec.current_location(), Location::In);
    }

    #[test]
    fn prune_ignores_time_of_day() {
        let mut rec = AttendanceRecord::from_parts(
            "Ada Lovelace",
            Role::Student,
            vec![scan(at(18, 0, 1), Location::In)],
        );
        // A cutoff later the same day still keeps the scan.
        assert_eq!(rec.prune(day(18)), 0);
        assert!(rec.is_present());
    }

    #[test]
    fn prune_drops_dangling_close() {
        let mut rec = AttendanceRecord::from_parts(
            "Ada Lovelace",
            Role::Student,
            vec![
                scan(at(17, 22, 0), Location::In),
                scan(at(18, 1, 0), Location::Out),
                scan(at(18, 9, 0), Location::In),
                scan(at(18, 10, 0), Location::Out),
            ],
        );
        assert_eq!(rec.prune(day(18)), 2);
        assert_eq!(rec.scans()[0].location, Location::In);
        assert_eq!(rec.current_location(), Location::Out);
    }

    #[test]
    fn prune_everything_reverts_to_never_scanned() {
        let mut rec = AttendanceRecord::from_parts(
            "Ada Lovelace",
            Role::Student,
            vec![scan(at(10, 9, 0), Location::In)],
        );
        rec.prune(day(18));
        assert!(rec.scans().is_empty());
        assert_eq!(rec.current_location(), Location::NEVER_SCANNED);
        assert_eq!(rec.toggle(at(18, 9, 0)).location, Location::In);
    }
}
