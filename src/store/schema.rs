//! SQL schema for the document store, inverted index, link graph, and crawl log.

/// Schema definitions for the engine's SQLite-backed persistence layer.
///
/// The five logical files of the external interface (`docs`, `inverted`,
/// `graph`, `crawl_log`, `discovered`) map onto these tables; `discovered` is
/// not a separate table since DocStore's `url` column already records every
/// URL from the moment it is first seen (see DESIGN.md).
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS docs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    content TEXT NOT NULL DEFAULT '',
    title TEXT,
    date TEXT,
    meta TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_docs_url ON docs(url);

-- Marks a DocId as already indexed, enforcing add_document idempotency.
CREATE TABLE IF NOT EXISTS indexed_docs (
    doc_id INTEGER PRIMARY KEY REFERENCES docs(id)
);

CREATE TABLE IF NOT EXISTS postings (
    term TEXT NOT NULL,
    doc_id INTEGER NOT NULL REFERENCES docs(id),
    position INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_postings_term ON postings(term);
CREATE INDEX IF NOT EXISTS idx_postings_doc ON postings(doc_id);

CREATE TABLE IF NOT EXISTS links (
    src INTEGER NOT NULL REFERENCES docs(id),
    dst INTEGER NOT NULL REFERENCES docs(id),
    UNIQUE(src, dst)
);

CREATE INDEX IF NOT EXISTS idx_links_src ON links(src);
CREATE INDEX IF NOT EXISTS idx_links_dst ON links(dst);

CREATE TABLE IF NOT EXISTS crawl_log (
    url TEXT PRIMARY KEY,
    last_checked TEXT,
    response_time_ms INTEGER,
    outcome TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'pending'
);

CREATE INDEX IF NOT EXISTS idx_crawl_log_status ON crawl_log(status);
"#;

/// Initializes the schema on a fresh or existing connection. Idempotent.
pub fn initialize_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
