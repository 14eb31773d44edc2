//! SQLite-backed persistence.
//!
//! The store owns the connection and hands out the two repositories that the
//! engine writes through. The schema is applied idempotently at open, so a
//! database file can be reused across runs and crashes.

use crate::error::GatherError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// `checks` repository
pub mod checks;

/// `banned` repository
pub mod bans;

pub use bans::BanRepository;
pub use checks::CheckRepository;

const MIGRATION: &str = "
CREATE TABLE IF NOT EXISTS checks (
  domain TEXT PRIMARY KEY,
  code INTEGER NULL,           -- verdict code (NULL until first attempt)
  checked_at TEXT NULL         -- last attempt time (NULL until first attempt)
);
CREATE INDEX IF NOT EXISTS idx_checks_code ON checks(code);

CREATE TABLE IF NOT EXISTS banned (
  domain TEXT PRIMARY KEY,
  reason TEXT NOT NULL,
  banned_at TEXT NOT NULL
);
";

/// Handle on the backing SQLite database.
///
/// Cheap to clone; all clones and the repositories derived from them share
/// one serialized connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GatherError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database. Mainly useful in tests.
    pub fn open_in_memory() -> Result<Self, GatherError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, GatherError> {
        apply_pragmas(&conn)?;
        conn.execute_batch(MIGRATION)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Repository over the `checks` table.
    pub fn checks(&self) -> CheckRepository {
        CheckRepository::new(self.conn.clone())
    }

    /// Repository over the `banned` table.
    pub fn bans(&self) -> BanRepository {
        BanRepository::new(self.conn.clone())
    }
}

fn apply_pragmas(conn: &Connection) -> Result<(), GatherError> {
    // WAL is unsupported on :memory: databases; fall through silently there
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

pub(crate) fn lock_conn(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    // a poisoned lock means a panic elsewhere; the database itself is fine
    conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Format a timestamp the way the store expects: UTC RFC 3339 with
/// nanosecond precision.
pub(crate) fn to_store_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a stored timestamp back to the same instant.
pub(crate) fn parse_store_ts(s: &str) -> Result<DateTime<Utc>, GatherError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            GatherError::storage_with_source(format!("invalid stored timestamp '{}'", s), e.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_applies_schema() {
        let store = Store::open_in_memory().unwrap();
        // both repositories must see their tables
        assert!(store.checks().load_all().unwrap().is_empty());
        assert!(store.bans().list_all().unwrap().is_empty());
    }

    #[test]
    fn test_open_file_is_reusable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("domains.sqlite");

        {
            let store = Store::open(&path).unwrap();
            store
                .checks()
                .bulk_ensure(&["a.net".to_string()])
                .unwrap();
        }

        // reopening must not clobber existing rows
        let store = Store::open(&path).unwrap();
        let rows = store.checks().load_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].domain, "a.net");
    }

    #[test]
    fn test_timestamp_roundtrip_preserves_nanos() {
        let at = Utc::now();
        let parsed = parse_store_ts(&to_store_ts(at)).unwrap();
        assert_eq!(parsed, at);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_store_ts("not a time").is_err());
    }
}
