use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use signin_core::types::{Location, Role};
use tracing::{debug, info, instrument};

use crate::db::init_db;
use crate::error::{AttendanceError, Result};
use crate::record::{AttendanceRecord, Scan};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Durable home of the attendance records.
///
/// `save` always receives the full record set; implementations replace
/// whatever they held before.
pub trait Storage: Send + Sync {
    fn load(&self) -> Result<Vec<AttendanceRecord>>;
    fn save(&self, records: &[AttendanceRecord]) -> Result<()>;
}

/// SQLite-backed storage.
///
/// The connection sits behind a `Mutex` so concurrent saves are serialised
/// and each save is a single transaction: readers never see half a write.
pub struct SqliteStorage {
    db: Mutex<Connection>,
}

impl SqliteStorage {
    /// Wrap an open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Open (or create) the database file at `path`.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        info!(%path, "attendance database opened");
        Self::new(conn)
    }
}

impl Storage for SqliteStorage {
    #[instrument(skip(self))]
    fn load(&self) -> Result<Vec<AttendanceRecord>> {
        let db = self.db.lock().unwrap();

        let mut people: BTreeMap<String, (Role, Vec<Scan>)> = BTreeMap::new();
        {
            let mut stmt = db.prepare("SELECT name, role FROM people")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (name, role_str) = row?;
                let role = role_str
                    .parse::<Role>()
                    .map_err(|reason| AttendanceError::InvalidRecord {
                        name: name.clone(),
                        reason,
                    })?;
                people.insert(name, (role, Vec::new()));
            }
        }

        let mut stmt = db.prepare(
            "SELECT name, scanned_at, location FROM scans
             ORDER BY name, scanned_at, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?, // name
                row.get::<_, String>(1)?, // scanned_at
                row.get::<_, String>(2)?, // location
            ))
        })?;
        for row in rows {
            let (name, at_str, loc_str) = row?;
            let invalid = |reason: String| AttendanceError::InvalidRecord {
                name: name.clone(),
                reason,
            };
            let at = at_str
                .parse::<NaiveDateTime>()
                .map_err(|e| invalid(format!("bad timestamp {at_str:?}: {e}")))?;
            let location = loc_str.parse::<Location>().map_err(invalid)?;
            people
                .entry(name.clone())
                .or_insert_with(|| (Role::default(), Vec::new()))
                .1
                .push(Scan { at, location });
        }

        let records: Vec<AttendanceRecord> = people
            .into_iter()
            .map(|(name, (role, scans))| AttendanceRecord::from_parts(name, role, scans))
            .collect();
        debug!(count = records.len(), "records loaded");
        Ok(records)
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    fn save(&self, records: &[AttendanceRecord]) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        tx.execute("DELETE FROM scans", [])?;
        tx.execute("DELETE FROM people", [])?;
        {
            let mut person = tx.prepare("INSERT INTO people (name, role) VALUES (?1, ?2)")?;
            let mut scan = tx.prepare(
                "INSERT INTO scans (name, scanned_at, location) VALUES (?1, ?2, ?3)",
            )?;
            for record in records {
                person.execute(rusqlite::params![record.name(), record.role().to_string()])?;
                for s in record.scans() {
                    scan.execute(rusqlite::params![
                        record.name(),
                        s.at.format(TIMESTAMP_FORMAT).to_string(),
                        s.location.to_string(),
                    ])?;
                }
            }
        }
        tx.commit()?;
        debug!("records saved");
        Ok(())
    }
}

/// In-process storage for tests and dry runs.
#[derive(Default)]
pub struct MemoryStorage {
    records: Mutex<Vec<AttendanceRecord>>,
    saves: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<AttendanceRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    /// Number of successful saves so far.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make every following save fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Copy of what the last successful save wrote.
    pub fn snapshot(&self) -> Vec<AttendanceRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Vec<AttendanceRecord>> {
        Ok(self.snapshot())
    }

    fn save(&self, records: &[AttendanceRecord]) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AttendanceError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "storage unavailable",
            )));
        }
        *self.records.lock().unwrap() = records.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
