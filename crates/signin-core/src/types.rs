use std::fmt;

/// Where a person is according to their most recent scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// Signed in; an open session is accruing time.
    In,
    /// Signed out normally; the closed session counts toward totals.
    Out,
    /// Force-closed without counting toward totals (administrative sign-out).
    Uncounted,
}

impl Location {
    /// Location reported for a record that has never scanned.
    pub const NEVER_SCANNED: Location = Location::Out;

    /// True for the two locations that close an open session.
    pub fn closes_session(self) -> bool {
        matches!(self, Location::Out | Location::Uncounted)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Location::In => "in",
            Location::Out => "out",
            Location::Uncounted => "uncounted",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Location {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "in" => Ok(Location::In),
            "out" => Ok(Location::Out),
            "uncounted" => Ok(Location::Uncounted),
            other => Err(format!("unknown location: {other}")),
        }
    }
}

/// Role derived from the badge text. Mentors carry a `Mentor` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    Student,
    Mentor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Student => "student",
            Role::Mentor => "mentor",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "mentor" => Ok(Role::Mentor),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_parses_its_own_display() {
        for loc in [Location::In, Location::Out, Location::Uncounted] {
            assert_eq!(loc.to_string().parse::<Location>(), Ok(loc));
        }
        assert!("sideways".parse::<Location>().is_err());
    }

    #[test]
    fn only_out_and_uncounted_close_a_session() {
        assert!(!Location::In.closes_session());
        assert!(Location::Out.closes_session());
        assert!(Location::Uncounted.closes_session());
    }

    #[test]
    fn role_defaults_to_student() {
        assert_eq!(Role::default(), Role::Student);
        assert_eq!("mentor".parse::<Role>(), Ok(Role::Mentor));
    }
}
