//! Repository over the `banned` table.
//!
//! A banned domain is skipped by future batches. Banning again overwrites
//! the reason and timestamp.

use crate::error::GatherError;
use crate::store::{lock_conn, parse_store_ts, to_store_ts};
use crate::types::{BanReason, BanRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// Store of domains excluded from verification.
#[derive(Clone)]
pub struct BanRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BanRepository {
    pub(crate) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Ban a domain, overwriting any previous reason and timestamp.
    pub fn ban(&self, domain: &str, reason: BanReason, at: DateTime<Utc>) -> Result<(), GatherError> {
        let conn = lock_conn(&self.conn);
        conn.execute(
            "INSERT INTO banned(domain, reason, banned_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(domain) DO UPDATE SET reason = excluded.reason, banned_at = excluded.banned_at",
            params![domain, reason.as_str(), to_store_ts(at)],
        )?;
        Ok(())
    }

    /// Every banned domain.
    pub fn list_all(&self) -> Result<Vec<BanRecord>, GatherError> {
        let conn = lock_conn(&self.conn);
        let mut stmt = conn.prepare("SELECT domain, reason, banned_at FROM banned")?;
        let rows = stmt.query_map([], |row| {
            let domain: String = row.get(0)?;
            let reason: String = row.get(1)?;
            let banned_at: String = row.get(2)?;
            Ok((domain, reason, banned_at))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (domain, reason, banned_at) = row?;
            records.push(BanRecord {
                domain,
                reason,
                banned_at: parse_store_ts(&banned_at)?,
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn test_ban_and_list() {
        let repo = Store::open_in_memory().unwrap().bans();
        let at = Utc::now();

        repo.ban("a.net", BanReason::Timeout, at).unwrap();

        let bans = repo.list_all().unwrap();
        assert_eq!(bans.len(), 1);
        assert_eq!(bans[0].domain, "a.net");
        assert_eq!(bans[0].reason, "timeout");
        assert_eq!(bans[0].banned_at, at);
    }

    #[test]
    fn test_ban_overwrites_reason_and_time() {
        let repo = Store::open_in_memory().unwrap().bans();
        let first = Utc::now();
        let second = first + chrono::Duration::seconds(5);

        repo.ban("a.net", BanReason::Timeout, first).unwrap();
        repo.ban("a.net", BanReason::TemporaryDnsFailure, second)
            .unwrap();

        let bans = repo.list_all().unwrap();
        assert_eq!(bans.len(), 1);
        assert_eq!(bans[0].reason, "temporary DNS failure");
        assert_eq!(bans[0].banned_at, second);
    }
}
