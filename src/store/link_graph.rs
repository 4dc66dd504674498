//! Mapping DocId → set of outbound DocIds, with a reverse inbound index
//! maintained in lockstep.

use crate::model::DocId;
use rusqlite::{params, Connection};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

struct Graph {
    outgoing: HashMap<DocId, HashSet<DocId>>,
    incoming: HashMap<DocId, HashSet<DocId>>,
}

/// Link graph between documents, edges recorded by DocId.
///
/// Self-loops are allowed and counted; edges are a set per source DocId, so
/// duplicate `add_edges` calls never grow `outbound(src)`.
pub struct LinkGraph {
    graph: RwLock<Graph>,
    conn: Arc<Mutex<Connection>>,
}

impl LinkGraph {
    pub(crate) fn load(conn: Arc<Mutex<Connection>>) -> Result<Self, GraphError> {
        let mut outgoing: HashMap<DocId, HashSet<DocId>> = HashMap::new();
        let mut incoming: HashMap<DocId, HashSet<DocId>> = HashMap::new();

        {
            let c = conn.lock().unwrap();
            let mut stmt = c.prepare("SELECT src, dst FROM links")?;
            let rows = stmt.query_map([], |row| {
                let src: i64 = row.get(0)?;
                let dst: i64 = row.get(1)?;
                Ok((DocId(src), DocId(dst)))
            })?;
            for row in rows {
                let (src, dst) = row?;
                outgoing.entry(src).or_default().insert(dst);
                incoming.entry(dst).or_default().insert(src);
            }
        }

        Ok(Self {
            graph: RwLock::new(Graph { outgoing, incoming }),
            conn,
        })
    }

    /// Adds edges `src -> dst` for each `dst` in `dsts`, set-union semantics.
    pub fn add_edges(&self, src: DocId, dsts: &HashSet<DocId>) -> Result<(), GraphError> {
        let mut new_edges = Vec::new();
        {
            let mut g = self.graph.write().unwrap();
            let out = g.outgoing.entry(src).or_default();
            for &dst in dsts {
                if out.insert(dst) {
                    new_edges.push(dst);
                }
            }
            for &dst in &new_edges {
                g.incoming.entry(dst).or_default().insert(src);
            }
        }

        if !new_edges.is_empty() {
            let conn = self.conn.lock().unwrap();
            for dst in new_edges {
                conn.execute(
                    "INSERT OR IGNORE INTO links (src, dst) VALUES (?1, ?2)",
                    params![src.0, dst.0],
                )?;
            }
        }

        Ok(())
    }

    pub fn outbound(&self, doc: DocId) -> HashSet<DocId> {
        self.graph
            .read()
            .unwrap()
            .outgoing
            .get(&doc)
            .cloned()
            .unwrap_or_default()
    }

    pub fn inbound(&self, doc: DocId) -> HashSet<DocId> {
        self.graph
            .read()
            .unwrap()
            .incoming
            .get(&doc)
            .cloned()
            .unwrap_or_default()
    }

    /// All source DocIds that have at least one outbound edge.
    pub fn sources(&self) -> Vec<DocId> {
        self.graph.read().unwrap().outgoing.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_graph() -> LinkGraph {
        let conn = Connection::open_in_memory().unwrap();
        crate::store::schema::initialize_schema(&conn).unwrap();
        LinkGraph::load(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_link_graph_dedup() {
        let graph = new_graph();
        graph.add_edges(DocId(1), &HashSet::from([DocId(2)])).unwrap();
        graph.add_edges(DocId(1), &HashSet::from([DocId(2)])).unwrap();
        graph.add_edges(DocId(1), &HashSet::from([DocId(3)])).unwrap();

        let out = graph.outbound(DocId(1));
        assert_eq!(out.len(), 2);
        assert!(out.contains(&DocId(2)));
        assert!(out.contains(&DocId(3)));
    }

    #[test]
    fn test_inbound_tracks_reverse() {
        let graph = new_graph();
        graph.add_edges(DocId(1), &HashSet::from([DocId(2)])).unwrap();
        graph.add_edges(DocId(3), &HashSet::from([DocId(2)])).unwrap();

        let inbound = graph.inbound(DocId(2));
        assert_eq!(inbound, HashSet::from([DocId(1), DocId(3)]));
    }

    #[test]
    fn test_self_loop_is_allowed() {
        let graph = new_graph();
        graph.add_edges(DocId(1), &HashSet::from([DocId(1)])).unwrap();
        assert!(graph.outbound(DocId(1)).contains(&DocId(1)));
    }
}
