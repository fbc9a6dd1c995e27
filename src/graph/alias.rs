//! Deployment aliasing
//!
//! Many assets are deployed identically at different addresses or chains and
//! share one upstream data source. Rather than re-fetching, the canonical
//! snapshot is cloned under each alternate root id. The clone reports the
//! canonical deployment's TVL and APY, so it means "same economics, different
//! address" and nothing more.

use super::id::{normalize_node_id, NodeId};
use super::snapshot::GraphSnapshot;
use std::borrow::Cow;

/// A set of addresses an asset is deployed at, keyed by chain slug
#[derive(Debug, Clone, Copy)]
pub struct DeploymentTable {
    pub protocol: &'static str,
    pub canonical_root_id: &'static str,
    pub deployments: &'static [(&'static str, &'static str)],
}

impl DeploymentTable {
    /// Alias ids for this table, canonical deployment excluded.
    pub fn alias_ids(&self) -> Vec<NodeId> {
        deployment_node_ids(self.protocol, self.canonical_root_id, self.deployments)
    }
}

/// Build `<chain>:<protocol>:<address>` ids for every deployment except the canonical one.
pub fn deployment_node_ids(
    protocol: &str,
    canonical_root_id: &str,
    chain_to_address: &[(&str, &str)],
) -> Vec<NodeId> {
    let canonical = normalize_node_id(canonical_root_id);
    chain_to_address
        .iter()
        .map(|(chain, address)| NodeId::canonical(chain, protocol, address))
        .filter(|id| id.as_str() != canonical)
        .collect()
}

/// Look up the alias ids for `root_id` among `tables`.
pub fn aliases_for(tables: &[DeploymentTable], root_id: &NodeId) -> Vec<NodeId> {
    tables
        .iter()
        .find(|t| root_id.matches(t.canonical_root_id))
        .map(DeploymentTable::alias_ids)
        .unwrap_or_default()
}

/// Clone `snapshot` with its root re-identified as `next_root_id`.
///
/// Only `nodes[0]` changes (id, plus chain taken from the new id's first
/// segment) and every edge endpoint equal to the old root id is rewritten.
/// A clone onto the same id, or of an empty snapshot, borrows the input.
pub fn clone_snapshot_with_root_id<'a>(
    snapshot: &'a GraphSnapshot,
    next_root_id: &NodeId,
) -> Cow<'a, GraphSnapshot> {
    let Some(root) = snapshot.root() else {
        return Cow::Borrowed(snapshot);
    };
    let base_root_id = &root.id;
    if next_root_id == base_root_id {
        return Cow::Borrowed(snapshot);
    }

    let mut next_root = root.clone();
    next_root.id = next_root_id.clone();
    if let Some(chain) = next_root_id.chain() {
        next_root.chain = chain;
    }

    let mut nodes = Vec::with_capacity(snapshot.nodes.len());
    nodes.push(next_root);
    nodes.extend(snapshot.nodes.iter().skip(1).cloned());

    let edges = snapshot
        .edges
        .iter()
        .map(|edge| {
            let mut edge = edge.clone();
            if &edge.from == base_root_id {
                edge.from = next_root_id.clone();
            }
            if &edge.to == base_root_id {
                edge.to = next_root_id.clone();
            }
            edge
        })
        .collect();

    Cow::Owned(GraphSnapshot {
        nodes,
        edges,
        sources: snapshot.sources.clone(),
    })
}
