//! Repository over the `checks` table.
//!
//! One row per candidate domain the system has ever generated. Enqueue is
//! insert-if-absent so re-running a generation pass never clobbers earlier
//! verdicts, which is what makes enumeration resumable across crashes.

use crate::error::GatherError;
use crate::store::{lock_conn, parse_store_ts, to_store_ts};
use crate::types::CheckRecord;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

/// Idempotent store of per-candidate verdicts.
#[derive(Clone)]
pub struct CheckRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CheckRepository {
    pub(crate) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Insert a fresh row for every domain not already present, in a single
    /// transaction. Existing rows are left untouched.
    pub fn bulk_ensure(&self, domains: &[String]) -> Result<(), GatherError> {
        let mut conn = lock_conn(&self.conn);
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("INSERT OR IGNORE INTO checks(domain) VALUES (?1)")?;
            for domain in domains {
                stmt.execute([domain])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Record a verdict. `(code, checked_at)` are written together in one
    /// statement; the last write wins.
    pub fn save(&self, domain: &str, code: u16, at: DateTime<Utc>) -> Result<(), GatherError> {
        let conn = lock_conn(&self.conn);
        conn.execute(
            "INSERT INTO checks(domain, code, checked_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(domain) DO UPDATE SET code = excluded.code, checked_at = excluded.checked_at",
            params![domain, code, to_store_ts(at)],
        )?;
        Ok(())
    }

    /// All rows that have not reached a final verdict, ordered by domain.
    ///
    /// The stable ordering keeps batch shuffles reproducible in tests.
    pub fn load_pending(&self) -> Result<Vec<CheckRecord>, GatherError> {
        self.query(
            "SELECT domain, code, checked_at FROM checks
             WHERE code IS NULL OR code NOT IN (200, 404) ORDER BY domain ASC",
        )
    }

    /// All rows with the available verdict (404), ordered by domain.
    pub fn load_available(&self) -> Result<Vec<CheckRecord>, GatherError> {
        self.query(
            "SELECT domain, code, checked_at FROM checks WHERE code = 404 ORDER BY domain ASC",
        )
    }

    /// Every row, ordered by domain.
    pub fn load_all(&self) -> Result<Vec<CheckRecord>, GatherError> {
        self.query("SELECT domain, code, checked_at FROM checks ORDER BY domain ASC")
    }

    fn query(&self, sql: &str) -> Result<Vec<CheckRecord>, GatherError> {
        let conn = lock_conn(&self.conn);
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], unpack_check_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row??);
        }
        Ok(records)
    }
}

fn unpack_check_row(row: &Row<'_>) -> rusqlite::Result<Result<CheckRecord, GatherError>> {
    let domain: String = row.get(0)?;
    let code: Option<u16> = row.get(1)?;
    let checked_at: Option<String> = row.get(2)?;

    Ok(checked_at
        .map(|s| parse_store_ts(&s))
        .transpose()
        .map(|checked_at| CheckRecord {
            domain,
            code,
            checked_at,
        }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use crate::types::code;

    fn repo() -> CheckRepository {
        Store::open_in_memory().unwrap().checks()
    }

    fn domains(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_bulk_ensure_is_idempotent() {
        let repo = repo();
        let at = Utc::now();

        repo.bulk_ensure(&domains(&["a.net"])).unwrap();
        repo.save("a.net", code::AVAILABLE, at).unwrap();

        // a second ensure must not reset the verdict
        repo.bulk_ensure(&domains(&["a.net"])).unwrap();

        let rows = repo.load_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].code, Some(code::AVAILABLE));
        assert_eq!(rows[0].checked_at, Some(at));
    }

    #[test]
    fn test_save_does_not_perturb_other_rows() {
        let repo = repo();
        let at = Utc::now();
        repo.bulk_ensure(&domains(&["a.net", "b.net"])).unwrap();

        repo.save("a.net", code::TAKEN, at).unwrap();

        let rows = repo.load_all().unwrap();
        let b = rows.iter().find(|r| r.domain == "b.net").unwrap();
        assert_eq!(b.code, None);
        assert_eq!(b.checked_at, None);
    }

    #[test]
    fn test_save_upserts_unknown_domain() {
        let repo = repo();
        let at = Utc::now();

        repo.save("new.net", code::NO_WORKING_SERVERS, at).unwrap();
        let rows = repo.load_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].code, Some(code::NO_WORKING_SERVERS));
    }

    #[test]
    fn test_pending_excludes_final_codes() {
        let repo = repo();
        let at = Utc::now();
        repo.bulk_ensure(&domains(&["a.net", "b.net", "c.net", "d.net"]))
            .unwrap();
        repo.save("a.net", code::TAKEN, at).unwrap();
        repo.save("b.net", code::AVAILABLE, at).unwrap();
        repo.save("c.net", code::UPSTREAM_ERROR, at).unwrap();

        let pending: Vec<_> = repo
            .load_pending()
            .unwrap()
            .into_iter()
            .map(|r| r.domain)
            .collect();
        assert_eq!(pending, vec!["c.net", "d.net"]);
    }

    #[test]
    fn test_available_roundtrip() {
        let repo = repo();
        let at = Utc::now();
        repo.bulk_ensure(&domains(&["zzz.net", "err.net"])).unwrap();
        repo.save("zzz.net", code::AVAILABLE, at).unwrap();
        repo.save("err.net", code::UPSTREAM_ERROR, at).unwrap();

        let available: Vec<_> = repo
            .load_available()
            .unwrap()
            .into_iter()
            .map(|r| r.domain)
            .collect();
        assert_eq!(available, vec!["zzz.net"]);

        let pending: Vec<_> = repo
            .load_pending()
            .unwrap()
            .into_iter()
            .map(|r| r.domain)
            .collect();
        assert!(pending.contains(&"err.net".to_string()));
        assert!(!pending.contains(&"zzz.net".to_string()));
    }

    #[test]
    fn test_load_orders_by_domain() {
        let repo = repo();
        repo.bulk_ensure(&domains(&["c.net", "a.net", "b.net"])).unwrap();

        let pending: Vec<_> = repo
            .load_pending()
            .unwrap()
            .into_iter()
            .map(|r| r.domain)
            .collect();
        assert_eq!(pending, vec!["a.net", "b.net", "c.net"]);
    }
}
