//! Append-only mapping URL → DocId with per-document metadata.

use crate::model::{DocId, DocRecord};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("malformed metadata for doc {0}: {1}")]
    MalformedMeta(i64, String),
}

/// Append-only document store.
///
/// Insertion of a URL already present returns the existing DocId and leaves
/// the record untouched; re-crawl support is out of scope for the core.
pub struct DocStore {
    conn: Arc<Mutex<Connection>>,
}

impl DocStore {
    pub(crate) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Inserts a URL, returning its DocId. If the URL is already present,
    /// returns the existing DocId and ignores the new fields.
    pub fn insert(
        &self,
        url: &str,
        content: &str,
        title: Option<&str>,
        date: Option<&str>,
        meta: &HashMap<String, String>,
    ) -> Result<DocId, StoreError> {
        let conn = self.conn.lock().unwrap();

        if let Some(id) = Self::lookup_id(&conn, url)? {
            return Ok(id);
        }

        let meta_json = serde_json::to_string(meta).unwrap_or_else(|_| "{}".to_string());

        conn.execute(
            "INSERT INTO docs (url, content, title, date, meta) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(url) DO NOTHING",
            params![url, content, title, date, meta_json],
        )?;

        let id = Self::lookup_id(&conn, url)?.ok_or_else(|| {
            StoreError::Database(rusqlite::Error::QueryReturnedNoRows)
        })?;

        Ok(id)
    }

    fn lookup_id(conn: &Connection, url: &str) -> Result<Option<DocId>, StoreError> {
        conn.query_row("SELECT id FROM docs WHERE url = ?1", params![url], |row| {
            row.get::<_, i64>(0)
        })
        .optional()
        .map(|opt| opt.map(DocId))
        .map_err(StoreError::from)
    }

    pub fn get_id(&self, url: &str) -> Result<Option<DocId>, StoreError> {
        let conn = self.conn.lock().unwrap();
        Self::lookup_id(&conn, url)
    }

    pub fn get_by_id(&self, id: DocId) -> Result<Option<DocRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, url, content, title, date, meta FROM docs WHERE id = ?1",
            params![id.0],
            Self::row_to_record,
        )
        .optional()
        .map_err(StoreError::from)
    }

    /// All documents in ascending DocId order.
    pub fn iter_all(&self) -> Result<Vec<DocRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, url, content, title, date, meta FROM docs ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map([], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM docs", [], |row| row.get(0))
            .map_err(StoreError::from)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<DocRecord> {
        let id: i64 = row.get(0)?;
        let url: String = row.get(1)?;
        let content: String = row.get(2)?;
        let title: Option<String> = row.get(3)?;
        let date: Option<String> = row.get(4)?;
        let meta_json: String = row.get(5)?;
        let meta: HashMap<String, String> = serde_json::from_str(&meta_json).unwrap_or_default();

        Ok(DocRecord {
            id: DocId(id),
            url,
            content,
            title,
            date,
            meta,
        })
    }
}
