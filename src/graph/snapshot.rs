//! Immutable graph snapshots and a lookup view over them

use super::edge::Edge;
use super::id::normalize_node_id;
use super::node::Node;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A self-contained, immutable view of one asset's exposure graph.
///
/// By convention `nodes[0]` is the root: the asset the snapshot was built for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl GraphSnapshot {
    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }

    /// Find a node by id, ignoring case.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id.matches(id))
    }

    /// Edges leaving `id`, ignoring case.
    pub fn outgoing<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        let key = normalize_node_id(id);
        self.edges.iter().filter(move |e| e.from.normalized() == key)
    }

    /// Edges arriving at `id`, ignoring case.
    pub fn incoming<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        let key = normalize_node_id(id);
        self.edges.iter().filter(move |e| e.to.normalized() == key)
    }

    pub fn has_outgoing(&self, id: &str) -> bool {
        self.outgoing(id).next().is_some()
    }

    /// Sum of `|allocationUsd|` over edges leaving `id`.
    pub fn total_outgoing_usd(&self, id: &str) -> f64 {
        self.outgoing(id).map(Edge::weight).sum()
    }
}

/// Normalized-id indexes over a snapshot, built once per render.
#[derive(Debug)]
pub struct SnapshotView<'a> {
    snapshot: &'a GraphSnapshot,
    nodes_by_id: HashMap<String, &'a Node>,
    edges_by_from: HashMap<String, Vec<&'a Edge>>,
}

impl<'a> SnapshotView<'a> {
    pub fn new(snapshot: &'a GraphSnapshot) -> Self {
        let mut nodes_by_id = HashMap::with_capacity(snapshot.nodes.len());
        for node in &snapshot.nodes {
            nodes_by_id.entry(node.id.normalized()).or_insert(node);
        }

        let mut edges_by_from: HashMap<String, Vec<&'a Edge>> = HashMap::new();
        for edge in &snapshot.edges {
            edges_by_from.entry(edge.from.normalized()).or_default().push(edge);
        }

        Self {
            snapshot,
            nodes_by_id,
            edges_by_from,
        }
    }

    pub fn snapshot(&self) -> &'a GraphSnapshot {
        self.snapshot
    }

    pub fn node(&self, id: &str) -> Option<&'a Node> {
        self.nodes_by_id.get(&normalize_node_id(id)).copied()
    }

    pub fn outgoing(&self, id: &str) -> &[&'a Edge] {
        self.edges_by_from
            .get(&normalize_node_id(id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// No outgoing edges inside this snapshot.
    pub fn is_leaf(&self, id: &str) -> bool {
        self.outgoing(id).is_empty()
    }
}
