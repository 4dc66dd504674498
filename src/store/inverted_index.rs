//! Mapping term → (DocId → ordered token positions), sharded for concurrency.
//!
//! Writes to different terms usually land in different shards and do not
//! contend with each other; the shard itself still serializes writes to the
//! same term, which is the only contention that matters in practice.

use crate::model::{DocId, Term};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;

const DEFAULT_SHARD_COUNT: usize = 16;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("doc {0} is already indexed")]
    AlreadyIndexed(i64),
}

impl IndexError {
    /// Converts a load-time error into a `StoreError`.
    ///
    /// `AlreadyIndexed` can only come from `add_document`, never from
    /// loading postings off disk, so it is unreachable here.
    pub(crate) fn into_store_error(self) -> super::StoreError {
        match self {
            Self::Database(inner) => super::StoreError::Database(inner),
            Self::AlreadyIndexed(id) => {
                unreachable!("load() does not call add_document, got doc {id}")
            }
        }
    }
}

type Shard = RwLock<HashMap<Term, HashMap<DocId, Vec<usize>>>>;

pub struct InvertedIndex {
    shards: Vec<Shard>,
    conn: Arc<Mutex<Connection>>,
    corpus_size: RwLock<usize>,
    /// Per-document term -> occurrence count, the authoritative source for
    /// building a document's TF-IDF vector (see `RankerSnapshot::vector_for_doc`).
    /// Keyed separately from the term-sharded postings since the ranker walks
    /// it by DocId, not by term.
    doc_terms: RwLock<HashMap<DocId, HashMap<Term, usize>>>,
}

impl InvertedIndex {
    pub(crate) fn load(conn: Arc<Mutex<Connection>>) -> Result<Self, IndexError> {
        Self::load_with_shards(conn, DEFAULT_SHARD_COUNT)
    }

    pub(crate) fn load_with_shards(
        conn: Arc<Mutex<Connection>>,
        shard_count: usize,
    ) -> Result<Self, IndexError> {
        let shards = (0..shard_count.max(1)).map(|_| RwLock::new(HashMap::new())).collect();
        let index = Self {
            shards,
            conn,
            corpus_size: RwLock::new(0),
            doc_terms: RwLock::new(HashMap::new()),
        };
        index.reload_from_disk()?;
        Ok(index)
    }

    fn reload_from_disk(&self) -> Result<(), IndexError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT term, doc_id, position FROM postings ORDER BY term, doc_id, position")?;
        let rows = stmt.query_map([], |row| {
            let term: String = row.get(0)?;
            let doc_id: i64 = row.get(1)?;
            let position: i64 = row.get(2)?;
            Ok((term, DocId(doc_id), position as usize))
        })?;

        let mut doc_terms: HashMap<DocId, HashMap<Term, usize>> = HashMap::new();
        for row in rows {
            let (term, doc_id, position) = row?;
            *doc_terms.entry(doc_id).or_default().entry(term.clone()).or_insert(0) += 1;
            let shard = &self.shards[self.shard_for(&term)];
            let mut guard = shard.write().unwrap();
            guard.entry(term).or_default().entry(doc_id).or_default().push(position);
        }
        drop(conn);
        *self.doc_terms.write().unwrap() = doc_terms;

        let count: i64 = self
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM indexed_docs", [], |row| row.get(0))?;
        *self.corpus_size.write().unwrap() = count as usize;

        Ok(())
    }

    fn shard_for(&self, term: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        term.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    /// Indexes a document's token stream. Rejects re-insertion of an already
    /// indexed DocId rather than silently replacing it (see DESIGN.md).
    pub fn add_document(&self, doc_id: DocId, tokens: &[Term]) -> Result<(), IndexError> {
        {
            let conn = self.conn.lock().unwrap();
            let already: bool = conn
                .query_row(
                    "SELECT 1 FROM indexed_docs WHERE doc_id = ?1",
                    params![doc_id.0],
                    |_| Ok(true),
                )
                .unwrap_or(false);
            if already {
                return Err(IndexError::AlreadyIndexed(doc_id.0));
            }
        }

        let mut per_term: HashMap<Term, Vec<usize>> = HashMap::new();
        for (position, term) in tokens.iter().enumerate() {
            per_term.entry(term.clone()).or_default().push(position);
        }

        {
            let conn = self.conn.lock().unwrap();
            conn.execute("INSERT INTO indexed_docs (doc_id) VALUES (?1)", params![doc_id.0])?;
            for (term, positions) in &per_term {
                for position in positions {
                    conn.execute(
                        "INSERT INTO postings (term, doc_id, position) VALUES (?1, ?2, ?3)",
                        params![term, doc_id.0, *position as i64],
                    )?;
                }
            }
        }

        let mut term_counts: HashMap<Term, usize> = HashMap::with_capacity(per_term.len());
        for (term, positions) in per_term {
            term_counts.insert(term.clone(), positions.len());
            let shard = &self.shards[self.shard_for(&term)];
            let mut guard = shard.write().unwrap();
            guard.entry(term).or_default().insert(doc_id, positions);
        }
        self.doc_terms.write().unwrap().insert(doc_id, term_counts);

        *self.corpus_size.write().unwrap() += 1;

        Ok(())
    }

    pub fn posting(&self, term: &str) -> HashMap<DocId, Vec<usize>> {
        let shard = &self.shards[self.shard_for(term)];
        shard
            .read()
            .unwrap()
            .get(term)
            .cloned()
            .unwrap_or_default()
    }

    /// The authoritative term -> occurrence-count map for an indexed document,
    /// used to build its TF-IDF vector without re-deriving tokens from the
    /// DocStore's `content` column (which a placeholder never gets past "").
    /// Empty for a DocId that was never indexed (including placeholders).
    pub fn doc_term_counts(&self, doc_id: DocId) -> HashMap<Term, usize> {
        self.doc_terms.read().unwrap().get(&doc_id).cloned().unwrap_or_default()
    }

    /// Total token count for an indexed document (sum of `doc_term_counts`).
    pub fn doc_token_count(&self, doc_id: DocId) -> usize {
        self.doc_terms
            .read()
            .unwrap()
            .get(&doc_id)
            .map(|counts| counts.values().sum())
            .unwrap_or(0)
    }

    pub fn doc_frequency(&self, term: &str) -> usize {
        self.posting(term).len()
    }

    /// Number of documents that have had `add_document` called on them.
    pub fn corpus_size(&self) -> usize {
        *self.corpus_size.read().unwrap()
    }
}
