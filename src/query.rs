//! QueryEngine: tokenizes a query, unions candidate posting lists, scores
//! with the Ranker's combined score, and returns the top-K results.

use crate::model::DocId;
use crate::normalizer::normalize;
use crate::ranker::{RankerSnapshot, Vector};
use crate::store::{DocStore, InvertedIndex, StoreError};
use std::collections::{HashMap, HashSet};

/// Whether candidate documents are the union or the intersection of per-term
/// posting lists. Union is the default, ranked-retrieval behavior (§9); an
/// operator may opt into intersection mode for AND semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntersectionMode {
    #[default]
    Off,
    On,
}

/// One ranked result: the document's URL, its combined score, and the
/// in-query-document term frequency for every matched query term.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub url: String,
    pub score: f64,
    pub per_term_freq: HashMap<String, usize>,
}

pub struct QueryEngine<'a> {
    docs: &'a DocStore,
    index: &'a InvertedIndex,
}

impl<'a> QueryEngine<'a> {
    pub fn new(docs: &'a DocStore, index: &'a InvertedIndex) -> Self {
        Self { docs, index }
    }

    /// Union-mode query (the default ranked-retrieval behavior).
    pub fn query(
        &self,
        text: &str,
        k: usize,
        snapshot: &RankerSnapshot,
    ) -> Result<Vec<QueryResult>, StoreError> {
        self.query_with_mode(text, k, snapshot, IntersectionMode::Off)
    }

    pub fn query_with_mode(
        &self,
        text: &str,
        k: usize,
        snapshot: &RankerSnapshot,
        mode: IntersectionMode,
    ) -> Result<Vec<QueryResult>, StoreError> {
        let tokens = normalize(text);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let postings: Vec<(String, HashMap<DocId, Vec<usize>>)> = tokens
            .iter()
            .map(|term| (term.clone(), self.index.posting(term)))
            .collect();

        let candidates = self.candidate_set(&postings, mode);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector: Vector =
            RankerSnapshot::vector_for_tokens(&tokens, self.index, self.index.corpus_size());

        let mut scored: Vec<(DocId, f64)> = candidates
            .into_iter()
            .map(|doc| (doc, snapshot.score(&query_vector, doc)))
            .collect();

        // Descending score, ties broken by ascending DocId.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)));
        scored.truncate(k);

        let mut results = Vec::with_capacity(scored.len());
        for (doc_id, score) in scored {
            let Some(record) = self.docs.get_by_id(doc_id)? else {
                continue;
            };
            let mut per_term_freq = HashMap::new();
            for (term, posting) in &postings {
                if let Some(positions) = posting.get(&doc_id) {
                    per_term_freq.insert(term.clone(), positions.len());
                }
            }
            results.push(QueryResult {
                url: record.url,
                score,
                per_term_freq,
            });
        }

        Ok(results)
    }

    fn candidate_set(
        &self,
        postings: &[(String, HashMap<DocId, Vec<usize>>)],
        mode: IntersectionMode,
    ) -> HashSet<DocId> {
        match mode {
            IntersectionMode::Off => {
                let mut set = HashSet::new();
                for (_, posting) in postings {
                    set.extend(posting.keys().copied());
                }
                set
            }
            IntersectionMode::On => {
                let mut iter = postings.iter();
                let Some((_, first)) = iter.next() else {
                    return HashSet::new();
                };
                let mut set: HashSet<DocId> = first.keys().copied().collect();
                for (_, posting) in iter {
                    let keys: HashSet<DocId> = posting.keys().copied().collect();
                    set.retain(|id| keys.contains(id));
                }
                set
            }
        }
    }
}
