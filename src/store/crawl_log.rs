//! Per-URL crawl outcome log.

use crate::model::{CrawlRecord, CrawlStatus};
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct CrawlLog {
    conn: Arc<Mutex<Connection>>,
}

impl CrawlLog {
    pub(crate) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn record(
        &self,
        url: &str,
        last_checked: DateTime<Utc>,
        response_time_ms: u64,
        outcome: &str,
        status: CrawlStatus,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO crawl_log (url, last_checked, response_time_ms, outcome, status)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(url) DO UPDATE SET
                last_checked = excluded.last_checked,
                response_time_ms = excluded.response_time_ms,
                outcome = excluded.outcome,
                status = excluded.status",
            params![
                url,
                last_checked.to_rfc3339(),
                response_time_ms as i64,
                outcome,
                status.as_str()
            ],
        )?;
        Ok(())
    }

    pub fn set_status(&self, url: &str, status: CrawlStatus) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO crawl_log (url, status) VALUES (?1, ?2)
             ON CONFLICT(url) DO UPDATE SET status = excluded.status",
            params![url, status.as_str()],
        )?;
        Ok(())
    }

    pub fn get(&self, url: &str) -> Result<Option<CrawlRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT url, last_checked, response_time_ms, outcome, status FROM crawl_log WHERE url = ?1",
            params![url],
            Self::row_to_record,
        )
        .optional()
        .map_err(StoreError::from)
    }

    /// Resets every `crawled` status back to `pending` (used by `restart_cycle`).
    pub fn reset_crawled_to_pending(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE crawl_log SET status = 'pending' WHERE status = 'crawled'",
            [],
        )?;
        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<CrawlRecord> {
        let url: String = row.get(0)?;
        let last_checked: Option<String> = row.get(1)?;
        let response_time_ms: Option<i64> = row.get(2)?;
        let outcome: String = row.get(3)?;
        let status: String = row.get(4)?;

        Ok(CrawlRecord {
            url,
            last_checked: last_checked
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            response_time_ms: response_time_ms.map(|ms| ms as u64),
            outcome,
            status: CrawlStatus::from_str(&status).unwrap_or(CrawlStatus::Pending),
        })
    }
}
