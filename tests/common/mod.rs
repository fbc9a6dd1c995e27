//! Shared helpers for end-to-end tests
//!
//! Builds small snapshots by hand and persists them into a throwaway output
//! directory.

#![allow(dead_code)]

use exposure_graph::{Edge, FileSnapshotStore, GraphSnapshot, Node, OpenStore, SnapshotStore};
use tempfile::TempDir;

/// Fluent builder for a snapshot rooted at the first node added
#[derive(Debug)]
pub struct SnapshotBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    sources: Vec<String>,
}

impl SnapshotBuilder {
    pub fn root(root: Node) -> Self {
        Self {
            nodes: vec![root],
            edges: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn root_id(&self) -> String {
        self.nodes[0].id.as_str().to_string()
    }

    /// Add `node` with an edge from the root.
    pub fn child(self, node: Node, allocation_usd: f64) -> Self {
        let from = self.root_id();
        self.edge_to(&from, node, allocation_usd)
    }

    /// Add `node` with an edge from `from`.
    pub fn edge_to(mut self, from: &str, node: Node, allocation_usd: f64) -> Self {
        self.edges.push(Edge::new(from, node.id.clone(), allocation_usd));
        self.nodes.push(node);
        self
    }

    /// Add `node` without connecting it.
    pub fn node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn source(mut self, source: &str) -> Self {
        self.sources.push(source.to_string());
        self
    }

    pub fn build(self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes,
            edges: self.edges,
            sources: self.sources,
        }
    }
}

/// A leaf on `chain` under a fixed test protocol.
pub fn leaf(key: &str, name: &str) -> Node {
    Node::new(format!("eth:test:{key}"), "eth", name)
}

/// An output directory that is deleted when the test ends
pub struct TestStore {
    pub store: FileSnapshotStore,
    _dir: TempDir,
}

impl TestStore {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let store = FileSnapshotStore::open(dir.path()).expect("open store");
        Self { store, _dir: dir }
    }

    pub fn with(snapshots: &[(&str, GraphSnapshot)]) -> Self {
        let test_store = Self::new();
        for (protocol, snapshot) in snapshots {
            test_store
                .store
                .save_snapshot(protocol, snapshot)
                .expect("save snapshot");
        }
        test_store
    }
}
