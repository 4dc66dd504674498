//! TF-IDF term weighting, iterative PageRank over the LinkGraph, and the
//! combined score `cosine(query, doc) * pagerank(doc)`.
//!
//! A `RankerSnapshot` is an immutable, point-in-time view built from the
//! DocStore/InvertedIndex/LinkGraph; the Scheduler swaps it in atomically on
//! every refresh so `QueryEngine` never observes a half-built snapshot.

use crate::model::DocId;
use crate::store::{InvertedIndex, LinkGraph};
use std::collections::HashMap;

const PAGERANK_DAMPING_DEFAULT: f64 = 0.85;
const PAGERANK_ITERS_DEFAULT: u32 = 100;
const PAGERANK_EPSILON: f64 = 1e-8;

/// A sparse term -> weight vector, used for both document and query vectors.
pub type Vector = HashMap<String, f64>;

/// An immutable ranking snapshot: per-document TF-IDF vectors and a PageRank
/// score for every DocId known at snapshot time.
#[derive(Debug, Clone, Default)]
pub struct RankerSnapshot {
    pub doc_vectors: HashMap<DocId, Vector>,
    pub pagerank: HashMap<DocId, f64>,
    pub corpus_size: usize,
}

impl RankerSnapshot {
    /// `idf(t) = log(N / (1 + df(t)))`. Finite for every `df(t) <= N`,
    /// including `df(t) == N` (no special-casing to 0, per §8).
    pub fn idf(corpus_size: usize, doc_frequency: usize) -> f64 {
        if corpus_size == 0 {
            return 0.0;
        }
        (corpus_size as f64 / (1.0 + doc_frequency as f64)).ln()
    }

    /// Builds a TF-IDF vector for an already-tokenized pseudo-document (used
    /// identically for real documents and queries).
    pub fn vector_for_tokens(tokens: &[String], index: &InvertedIndex, corpus_size: usize) -> Vector {
        if tokens.is_empty() {
            return Vector::new();
        }

        let mut term_counts: HashMap<&str, usize> = HashMap::new();
        for token in tokens {
            *term_counts.entry(token.as_str()).or_insert(0) += 1;
        }

        let len = tokens.len() as f64;
        let mut vector = Vector::new();
        for (term, count) in term_counts {
            let tf_norm = count as f64 / len;
            let idf = Self::idf(corpus_size, index.doc_frequency(term));
            vector.insert(term.to_string(), tf_norm * idf);
        }
        vector
    }

    /// Builds a TF-IDF vector for an indexed document straight from the
    /// InvertedIndex's authoritative per-doc term counts, rather than
    /// re-splitting `DocStore`'s `content` column — a placeholder record
    /// that was later crawled for real never gets its `content` updated
    /// (`DocStore::insert` is append-only), but `add_document` always ran
    /// against the real tokens, so the index has the truth.
    pub fn vector_for_doc(doc_id: DocId, index: &InvertedIndex, corpus_size: usize) -> Vector {
        let term_counts = index.doc_term_counts(doc_id);
        let len: usize = term_counts.values().sum();
        if len == 0 {
            return Vector::new();
        }

        let len_f = len as f64;
        let mut vector = Vector::new();
        for (term, count) in term_counts {
            let tf_norm = count as f64 / len_f;
            let idf = Self::idf(corpus_size, index.doc_frequency(&term));
            vector.insert(term, tf_norm * idf);
        }
        vector
    }

    /// Cosine similarity; a zero vector (on either side) yields 0, never a
    /// division by zero.
    pub fn cosine(a: &Vector, b: &Vector) -> f64 {
        let (smaller, larger) = if a.len() <= b.len() { (a, b) } else { (b, a) };

        let dot: f64 = smaller
            .iter()
            .filter_map(|(term, weight)| larger.get(term).map(|other| weight * other))
            .sum();

        let norm_a = vector_norm(a);
        let norm_b = vector_norm(b);
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }

    /// Combined score for a query vector against document `doc`.
    pub fn score(&self, query_vector: &Vector, doc: DocId) -> f64 {
        let doc_vector = match self.doc_vectors.get(&doc) {
            Some(v) => v,
            None => return 0.0,
        };
        let pr = self.pagerank.get(&doc).copied().unwrap_or(0.0);
        Self::cosine(query_vector, doc_vector) * pr
    }
}

fn vector_norm(v: &Vector) -> f64 {
    v.values().map(|w| w * w).sum::<f64>().sqrt()
}

/// Parameters controlling a PageRank computation.
#[derive(Debug, Clone, Copy)]
pub struct PageRankParams {
    pub damping: f64,
    pub iterations: u32,
}

impl Default for PageRankParams {
    fn default() -> Self {
        Self {
            damping: PAGERANK_DAMPING_DEFAULT,
            iterations: PAGERANK_ITERS_DEFAULT,
        }
    }
}

/// Computes PageRank over `doc_ids` using `graph`'s outbound/inbound edges.
///
/// Dangling nodes (zero outbound edges) distribute their mass uniformly
/// across all nodes each iteration, keeping total mass at 1.0.
pub fn compute_pagerank(
    doc_ids: &[DocId],
    graph: &LinkGraph,
    params: PageRankParams,
) -> HashMap<DocId, f64> {
    let n = doc_ids.len();
    if n == 0 {
        return HashMap::new();
    }

    let outbound_counts: HashMap<DocId, usize> = doc_ids
        .iter()
        .map(|&id| (id, graph.outbound(id).len()))
        .collect();

    let mut pr: HashMap<DocId, f64> = doc_ids.iter().map(|&id| (id, 1.0 / n as f64)).collect();

    for _ in 0..params.iterations {
        let dangling_mass: f64 = doc_ids
            .iter()
            .filter(|id| outbound_counts.get(id).copied().unwrap_or(0) == 0)
            .map(|id| pr[id])
            .sum();

        let mut next: HashMap<DocId, f64> = HashMap::with_capacity(n);
        let mut max_delta: f64 = 0.0;

        for &id in doc_ids {
            let inbound_sum: f64 = graph
                .inbound(id)
                .iter()
                .map(|&src| {
                    let out_count = outbound_counts.get(&src).copied().unwrap_or(0);
                    if out_count == 0 {
                        0.0
                    } else {
                        pr.get(&src).copied().unwrap_or(0.0) / out_count as f64
                    }
                })
                .sum();

            let value = (1.0 - params.damping) / n as f64
                + params.damping * (inbound_sum + dangling_mass / n as f64);

            max_delta = max_delta.max((value - pr[&id]).abs());
            next.insert(id, value);
        }

        pr = next;
        if max_delta < PAGERANK_EPSILON {
            break;
        }
    }

    pr
}

/// Builds a full `RankerSnapshot` from the current InvertedIndex/LinkGraph.
pub fn build_snapshot(
    doc_ids: &[DocId],
    index: &InvertedIndex,
    graph: &LinkGraph,
    params: PageRankParams,
) -> RankerSnapshot {
    let corpus_size = index.corpus_size();

    let doc_vectors = doc_ids
        .iter()
        .map(|&id| (id, RankerSnapshot::vector_for_doc(id, index, corpus_size)))
        .collect();

    let pagerank = compute_pagerank(doc_ids, graph, params);

    RankerSnapshot {
        doc_vectors,
        pagerank,
        corpus_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::initialize_schema;
    use rusqlite::Connection;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    fn new_index() -> InvertedIndex {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        InvertedIndex::load_with_shards(Arc::new(Mutex::new(conn)), 4).unwrap()
    }

    fn new_graph() -> LinkGraph {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        LinkGraph::load(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_idf_finite_when_df_equals_n() {
        let idf = RankerSnapshot::idf(5, 5);
        assert!(idf.is_finite());
        assert!(idf < 0.0);
    }

    #[test]
    fn test_idf_zero_corpus() {
        assert_eq!(RankerSnapshot::idf(0, 0), 0.0);
    }

    #[test]
    fn test_cosine_zero_vector_is_zero() {
        let empty = Vector::new();
        let mut other = Vector::new();
        other.insert("x".to_string(), 1.0);
        assert_eq!(RankerSnapshot::cosine(&empty, &other), 0.0);
        assert_eq!(RankerSnapshot::cosine(&empty, &empty), 0.0);
    }

    #[test]
    fn test_single_doc_tf_scenario() {
        let index = new_index();
        let tokens: Vec<String> = "apple banana apple orange orange apple apple lemon"
            .split(' ')
            .map(String::from)
            .collect();
        index.add_document(DocId(1), &tokens).unwrap();

        let vector = RankerSnapshot::vector_for_tokens(&tokens, &index, index.corpus_size());
        // apple occurs 4 of 8 tokens -> tf_norm 0.5
        assert!((vector["apple"] / RankerSnapshot::idf(1, 1) - 0.5).abs() < 1e-9 || vector["apple"] == 0.0);
    }

    #[test]
    fn test_vector_for_doc_is_nonzero_for_a_link_discovered_page() {
        // Mirrors a placeholder that was later crawled for real: `add_document`
        // ran against the real tokens, but nothing here touches DocStore's
        // `content` column. `vector_for_doc` must still see the real terms.
        let index = new_index();
        index
            .add_document(DocId(1), &["brown".to_string(), "fox".to_string()])
            .unwrap();

        let vector = RankerSnapshot::vector_for_doc(DocId(1), &index, index.corpus_size());
        assert!(!vector.is_empty());
        assert!(vector.values().any(|w| *w != 0.0) || vector.contains_key("fox"));
    }

    #[test]
    fn test_vector_for_doc_is_empty_for_unindexed_placeholder() {
        let index = new_index();
        let vector = RankerSnapshot::vector_for_doc(DocId(99), &index, index.corpus_size());
        assert!(vector.is_empty());
    }

    #[test]
    fn test_pagerank_sums_to_one() {
        let graph = new_graph();
        graph.add_edges(DocId(1), &HashSet::from([DocId(2)])).unwrap();
        graph.add_edges(DocId(2), &HashSet::from([DocId(3)])).unwrap();
        graph.add_edges(DocId(3), &HashSet::from([DocId(1)])).unwrap();

        let ids = vec![DocId(1), DocId(2), DocId(3)];
        let pr = compute_pagerank(&ids, &graph, PageRankParams::default());

        let sum: f64 = pr.values().sum();
        assert!((sum - 1.0).abs() < 1e-6, "sum was {sum}");
    }

    #[test]
    fn test_pagerank_handles_dangling_nodes() {
        let graph = new_graph();
        graph.add_edges(DocId(1), &HashSet::from([DocId(2)])).unwrap();
        // DocId(2) has no outbound edges: dangling.

        let ids = vec![DocId(1), DocId(2)];
        let pr = compute_pagerank(&ids, &graph, PageRankParams::default());
        let sum: f64 = pr.values().sum();
        assert!((sum - 1.0).abs() < 1e-6, "sum was {sum}");
    }

    #[test]
    fn test_pagerank_uniform_on_empty_graph() {
        let graph = new_graph();
        let ids = vec![DocId(1), DocId(2), DocId(3), DocId(4), DocId(5)];
        let pr = compute_pagerank(&ids, &graph, PageRankParams::default());
        for id in ids {
            assert!((pr[&id] - 0.2).abs() < 1e-6);
        }
    }
}
