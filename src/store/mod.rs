//! Persistence layer: DocStore, InvertedIndex, LinkGraph, and the crawl log.
//!
//! All four share one SQLite connection behind a mutex. DocStore and the
//! crawl log read/write straight through to SQLite; InvertedIndex and
//! LinkGraph additionally keep an in-memory, concurrency-friendly copy that
//! is populated from disk on open and kept in lockstep with every write.

mod crawl_log;
mod docstore;
mod inverted_index;
mod link_graph;
pub mod schema;

pub use crawl_log::CrawlLog;
pub use docstore::{DocStore, StoreError};
pub use inverted_index::{IndexError, InvertedIndex};
pub use link_graph::{GraphError, LinkGraph};

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Bundles the four persistent components behind one connection.
pub struct Store {
    pub docs: DocStore,
    pub index: InvertedIndex,
    pub graph: LinkGraph,
    pub crawl_log: CrawlLog,
}

/// Opens (creating if absent) the SQLite-backed store at `path`.
///
/// If the file exists but fails to open as a valid database, it is logged
/// and replaced with a fresh, empty one rather than causing a crash.
pub fn open_store(path: &Path) -> Result<Store, StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = match Connection::open(path) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!("failed to open store at {:?}: {}; resetting", path, e);
            let _ = std::fs::remove_file(path);
            Connection::open(path)?
        }
    };

    // WAL mode is the first operation that actually touches the file header,
    // so a garbage (non-SQLite) file fails here, not at `Connection::open`.
    // Treat that failure the same as a corrupt schema: reset to empty rather
    // than propagate a crash (§6, §7 item 4).
    if let Err(e) = conn
        .pragma_update(None, "journal_mode", "WAL")
        .map_err(StoreError::from)
        .and_then(|()| schema::initialize_schema(&conn).map_err(StoreError::from))
    {
        tracing::warn!(
            "store at {:?} failed to open ({}); resetting to empty",
            path,
            e
        );
        drop(conn);
        std::fs::remove_file(path)?;
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        schema::initialize_schema(&conn)?;
        return build_store(conn);
    }

    build_store(conn)
}

fn build_store(conn: Connection) -> Result<Store, StoreError> {
    let conn = Arc::new(Mutex::new(conn));
    let docs = DocStore::new(conn.clone());
    let index = InvertedIndex::load(conn.clone()).map_err(IndexError::into_store_error)?;
    let graph = LinkGraph::load(conn.clone()).map_err(|GraphError::Database(inner)| {
        StoreError::Database(inner)
    })?;
    let crawl_log = CrawlLog::new(conn);

    Ok(Store {
        docs,
        index,
        graph,
        crawl_log,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_store_creates_file_and_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");
        let store = open_store(&path).unwrap();
        assert_eq!(store.docs.count().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_open_store_resets_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        std::fs::write(&path, b"not a sqlite database").unwrap();

        let store = open_store(&path).unwrap();
        assert_eq!(store.docs.count().unwrap(), 0);
    }
}
