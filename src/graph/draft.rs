//! Draft graph store: the short-lived accumulator used while building one asset's graph

use super::edge::{Edge, LendingPosition};
use super::node::Node;
use super::snapshot::GraphSnapshot;
use std::collections::HashMap;
use tracing::{debug, warn};

type EdgeKey = (String, String, Option<LendingPosition>);

/// Mutable node/edge accumulator for a single asset.
///
/// The root node is fixed at creation. Leaves are keyed by normalized id with
/// last-write-wins semantics; insertion order is preserved so snapshots are
/// stable across runs. Edges are keyed by `(from, to, lendingPosition)`, also
/// last-write-wins.
#[derive(Debug, Clone)]
pub struct DraftGraphStore {
    root: Node,
    nodes: Vec<Node>,
    node_index: HashMap<String, usize>,
    edges: Vec<Edge>,
    edge_index: HashMap<EdgeKey, usize>,
    sources: Vec<String>,
}

impl DraftGraphStore {
    pub fn new(root: Node) -> Self {
        Self {
            root,
            nodes: Vec::new(),
            node_index: HashMap::new(),
            edges: Vec::new(),
            edge_index: HashMap::new(),
            sources: Vec::new(),
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Insert or overwrite a leaf node. Returns true when the id was new.
    ///
    /// A node carrying the root's id is ignored; the root is owned by the store.
    pub fn upsert_node(&mut self, node: Node) -> bool {
        if self.root.id.matches(node.id.as_str()) {
            debug!(id = %node.id, "ignoring leaf that repeats the root id");
            return false;
        }
        let key = node.id.normalized();
        match self.node_index.get(&key) {
            Some(&idx) => {
                self.nodes[idx] = node;
                false
            }
            None => {
                self.node_index.insert(key, self.nodes.len());
                self.nodes.push(node);
                true
            }
        }
    }

    /// Insert or overwrite an edge. Returns true when the edge key was new.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        let key = edge.dedup_key();
        match self.edge_index.get(&key) {
            Some(&idx) => {
                self.edges[idx] = edge;
                false
            }
            None => {
                self.edge_index.insert(key, self.edges.len());
                self.edges.push(edge);
                true
            }
        }
    }

    /// Merge a one-hop expansion into the store.
    pub fn merge(&mut self, nodes: Vec<Node>, edges: Vec<Edge>) {
        for node in nodes {
            self.upsert_node(node);
        }
        for edge in edges {
            self.add_edge(edge);
        }
    }

    /// Record a contributing source (adapter id) once.
    pub fn add_source(&mut self, source: impl Into<String>) {
        let source = source.into();
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }
    }

    /// Contributing sources in first-seen order
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len() + 1
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn contains(&self, id: &str) -> bool {
        self.root.id.matches(id) || self.node_index.contains_key(&super::normalize_node_id(id))
    }

    /// Freeze into a snapshot with the root at `nodes[0]`.
    ///
    /// Edges whose endpoints never made it into the store are dropped.
    pub fn into_snapshot(self) -> GraphSnapshot {
        let edges: Vec<Edge> = self
            .edges
            .iter()
            .filter(|e| {
                let resolvable = self.contains(e.from.as_str()) && self.contains(e.to.as_str());
                if !resolvable {
                    warn!(from = %e.from, to = %e.to, "dropping edge with unknown endpoint");
                }
                resolvable
            })
            .cloned()
            .collect();

        let mut nodes = Vec::with_capacity(self.nodes.len() + 1);
        nodes.push(self.root);
        nodes.extend(self.nodes);

        GraphSnapshot {
            nodes,
            edges,
            sources: self.sources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Node {
        Node::new("eth:ethena:0xroot", "eth", "USDe").with_tvl(Some(100.0))
    }

    #[test]
    fn root_is_first_in_snapshot() {
        let mut store = DraftGraphStore::new(root());
        store.merge(
            vec![Node::new("global:ethena:a", "global", "A")],
            vec![Edge::new("eth:ethena:0xroot", "global:ethena:a", 10.0)],
        );
        let snapshot = store.into_snapshot();
        assert_eq!(snapshot.nodes[0].id.as_str(), "eth:ethena:0xroot");
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.edges.len(), 1);
    }

    #[test]
    fn last_write_wins_on_duplicate_ids() {
        let mut store = DraftGraphStore::new(root());
        assert!(store.upsert_node(Node::new("eth:x:leaf", "eth", "First")));
        assert!(!store.upsert_node(Node::new("ETH:X:LEAF", "eth", "Second")));
        let snapshot = store.into_snapshot();
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.nodes[1].name, "Second");
    }

    #[test]
    fn root_is_never_duplicated() {
        let mut store = DraftGraphStore::new(root());
        assert!(!store.upsert_node(Node::new("eth:ethena:0xROOT", "eth", "Imposter")));
        let snapshot = store.into_snapshot();
        assert_eq!(snapshot.nodes.len(), 1);
        assert_eq!(snapshot.nodes[0].name, "USDe");
    }

    #[test]
    fn edges_dedupe_on_endpoints_and_side() {
        let mut store = DraftGraphStore::new(root());
        store.upsert_node(Node::new("eth:x:leaf", "eth", "Leaf"));
        assert!(store.add_edge(Edge::new("eth:ethena:0xroot", "eth:x:leaf", 1.0)));
        assert!(!store.add_edge(Edge::new("eth:ethena:0xroot", "eth:x:leaf", 2.0)));
        assert!(store.add_edge(
            Edge::new("eth:ethena:0xroot", "eth:x:leaf", 3.0)
                .with_lending_position(LendingPosition::Borrow)
        ));
        let snapshot = store.into_snapshot();
        assert_eq!(snapshot.edges.len(), 2);
        assert_eq!(snapshot.edges[0].allocation_usd, 2.0);
    }

    #[test]
    fn dangling_edges_are_dropped() {
        let mut store = DraftGraphStore::new(root());
        store.add_edge(Edge::new("eth:ethena:0xroot", "eth:x:missing", 5.0));
        assert!(store.into_snapshot().edges.is_empty());
    }

    #[test]
    fn sources_are_recorded_once() {
        let mut store = DraftGraphStore::new(root());
        store.add_source("ethena");
        store.add_source("ethena");
        store.add_source("euler");
        assert_eq!(store.into_snapshot().sources, vec!["ethena", "euler"]);
    }
}
