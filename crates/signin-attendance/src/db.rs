use rusqlite::Connection;

use crate::error::Result;

/// Initialise the attendance tables and their index.
///
/// Safe to call on every startup; uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS people (
            name        TEXT PRIMARY KEY,
            role        TEXT NOT NULL DEFAULT 'student'
        );
        CREATE TABLE IF NOT EXISTS scans (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL REFERENCES people(name) ON DELETE CASCADE,
            scanned_at  TEXT NOT NULL,   -- local time, %Y-%m-%dT%H:%M:%S
            location    TEXT NOT NULL    -- in | out | uncounted
        );
        CREATE INDEX IF NOT EXISTS idx_scans_name
            ON scans(name, scanned_at);",
    )?;
    Ok(())
}
