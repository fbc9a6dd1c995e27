//! Search index construction
//!
//! One entry per persisted snapshot, projected from its root node. The index
//! is always rebuilt in full; entries are never patched.

use super::logo::{infer_logo_keys, normalize_protocol_key};
use crate::graph::{lenient_number, GraphSnapshot, NodeId};
use crate::storage::{SnapshotStore, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// A searchable projection of one snapshot's root node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchIndexEntry {
    pub id: NodeId,
    pub chain: String,
    pub protocol: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Empty when the entry omits it; `id` stands in
    #[serde(default)]
    pub node_id: NodeId,
    #[serde(default, deserialize_with = "lenient_number")]
    pub apy: Option<f64>,
    #[serde(default)]
    pub curator: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub tvl_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_label: Option<String>,
}

impl SearchIndexEntry {
    /// `protocol|chain|id`
    pub fn dedup_key(&self) -> String {
        format!("{}|{}|{}", self.protocol, self.chain, self.id)
    }
}

/// Project a snapshot's root into an index entry.
///
/// Returns `None` when the snapshot has no root, or the root has no id or name.
pub fn entry_from_snapshot(snapshot: &GraphSnapshot) -> Option<SearchIndexEntry> {
    let root = snapshot.root()?;
    if root.id.as_str().trim().is_empty() || root.name.trim().is_empty() {
        return None;
    }

    let mut segments = root.id.as_str().split(':');
    let chain = segments
        .next()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "global".to_string());
    let protocol_from_id = segments.next().unwrap_or("unknown");
    let protocol = root
        .protocol
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(protocol_from_id);

    let logo_keys = infer_logo_keys(snapshot, root);
    let type_label = root.type_label();

    Some(SearchIndexEntry {
        id: root.id.clone(),
        chain,
        protocol: normalize_protocol_key(protocol),
        name: root.name.clone(),
        display_name: root
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        node_id: root.id.clone(),
        apy: root.apy,
        curator: root.curator().map(str::to_string),
        tvl_usd: root.tvl_usd,
        logo_keys: (!logo_keys.is_empty()).then_some(logo_keys),
        type_label: (!type_label.is_empty()).then_some(type_label),
    })
}

/// Accumulates entries; first entry for a `protocol|chain|id` key wins.
#[derive(Debug, Default)]
pub struct SearchIndexBuilder {
    seen: HashSet<String>,
    entries: Vec<SearchIndexEntry>,
    skipped: usize,
}

impl SearchIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a snapshot. Returns true when it contributed a new entry.
    pub fn add(&mut self, snapshot: &GraphSnapshot) -> bool {
        let Some(entry) = entry_from_snapshot(snapshot) else {
            self.skipped += 1;
            return false;
        };
        self.add_entry(entry)
    }

    pub fn add_entry(&mut self, entry: SearchIndexEntry) -> bool {
        if !self.seen.insert(entry.dedup_key()) {
            debug!(key = %entry.dedup_key(), "duplicate index entry dropped");
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Snapshots that had no usable root
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Entries sorted by name.
    pub fn finish(mut self) -> Vec<SearchIndexEntry> {
        self.entries.sort_by(|a, b| a.name.cmp(&b.name));
        self.entries
    }
}

/// Build the index from in-memory snapshots.
pub fn build_search_index<'a>(snapshots: impl IntoIterator<Item = &'a GraphSnapshot>) -> Vec<SearchIndexEntry> {
    let mut builder = SearchIndexBuilder::new();
    for snapshot in snapshots {
        builder.add(snapshot);
    }
    builder.finish()
}

/// Build the index from every snapshot in `store`.
///
/// An unreadable snapshot is logged and skipped.
pub fn build_from_store(store: &dyn SnapshotStore) -> StorageResult<Vec<SearchIndexEntry>> {
    let mut builder = SearchIndexBuilder::new();
    for key in store.list_snapshots()? {
        match store.load_snapshot(key.root_id.as_str(), Some(&key.protocol)) {
            Ok(Some(snapshot)) => {
                builder.add(&snapshot);
            }
            Ok(None) => {}
            Err(e) => warn!(protocol = %key.protocol, id = %key.root_id, error = %e, "unreadable snapshot skipped"),
        }
    }
    let skipped = builder.skipped();
    let entries = builder.finish();
    info!(entries = entries.len(), skipped, "search index built");
    Ok(entries)
}

/// Rebuild and persist the search index. Returns the entry count.
pub fn rebuild_search_index(store: &dyn SnapshotStore) -> StorageResult<usize> {
    let entries = build_from_store(store)?;
    store.save_search_index(&entries)?;
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node, NodeDetails};
    use crate::storage::{FileSnapshotStore, OpenStore};
    use serde_json::json;

    fn snapshot(root: Node) -> GraphSnapshot {
        GraphSnapshot {
            nodes: vec![root],
            edges: vec![],
            sources: vec![],
        }
    }

    #[test]
    fn projects_root_node() {
        let root = Node::new("ETH:Midas-RWA:0xABC", "eth", "mTBILL")
            .with_protocol("Midas-RWA")
            .with_apy(Some(0.045))
            .with_tvl(Some(1_000_000.0))
            .with_details(NodeDetails::with_kind("Yield").subtype(" ").curator(Some("Steakhouse".into())));
        let mut root = root;
        root.display_name = Some("  ".into());

        let entry = entry_from_snapshot(&snapshot(root)).unwrap();
        assert_eq!(entry.chain, "eth");
        assert_eq!(entry.protocol, "midas");
        assert_eq!(entry.node_id, entry.id);
        assert_eq!(entry.display_name, None);
        assert_eq!(entry.curator.as_deref(), Some("Steakhouse"));
        assert_eq!(entry.type_label.as_deref(), Some("Yield"));
        assert_eq!(entry.logo_keys, Some(vec!["mTBILL".to_string()]));
    }

    #[test]
    fn protocol_falls_back_to_id_segment() {
        let entry = entry_from_snapshot(&snapshot(Node::new("base:resolv:0x1", "base", "Resolv USR vault"))).unwrap();
        assert_eq!(entry.protocol, "resolv");
        assert_eq!(entry.chain, "base");
        assert_eq!(entry.logo_keys, None);
        assert_eq!(entry.type_label, None);

        let entry = entry_from_snapshot(&snapshot(Node::new("lonely", "", "Lonely Vault"))).unwrap();
        assert_eq!(entry.protocol, "unknown");
        assert_eq!(entry.chain, "lonely");
    }

    #[test]
    fn skips_unusable_roots() {
        assert!(entry_from_snapshot(&GraphSnapshot::default()).is_none());
        assert!(entry_from_snapshot(&snapshot(Node::new("eth:x:1", "eth", " "))).is_none());
        assert!(entry_from_snapshot(&snapshot(Node::new("", "eth", "Name"))).is_none());
    }

    #[test]
    fn dedups_and_sorts_by_name() {
        let a = snapshot(Node::new("eth:euler:0x1", "eth", "b vault").with_tvl(Some(1.0)));
        let a_again = snapshot(Node::new("eth:euler:0x1", "eth", "b vault").with_tvl(Some(2.0)));
        let b = snapshot(Node::new("eth:euler:0x2", "eth", "A vault"));
        let c = snapshot(Node::new("eth:euler:0x3", "eth", "a vault"));

        let entries = build_search_index([&a, &b, &a_again, &c]);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A vault", "a vault", "b vault"]);
        assert_eq!(entries[2].tvl_usd, Some(1.0));
    }

    #[test]
    fn serializes_nulls_and_omits_optionals() {
        let entry = entry_from_snapshot(&snapshot(Node::new("eth:x:1", "eth", "Some Vault"))).unwrap();
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "eth:x:1",
                "chain": "eth",
                "protocol": "x",
                "name": "Some Vault",
                "nodeId": "eth:x:1",
                "apy": null,
                "curator": null,
                "tvlUsd": null
            })
        );
    }

    #[test]
    fn rebuilds_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let usde = GraphSnapshot {
            nodes: vec![
                Node::new("eth:ethena:0xusde", "eth", "USDe Vault").with_protocol("ethena"),
                Node::new("global:ethena:binance:btc", "global", "BTC"),
            ],
            edges: vec![Edge::new("eth:ethena:0xusde", "global:ethena:binance:btc", 10.0)],
            sources: vec!["ethena".into()],
        };
        store.save_snapshot("ethena", &usde).unwrap();
        std::fs::create_dir_all(dir.path().join("broken")).unwrap();
        std::fs::write(dir.path().join("broken").join("eth:broken:0x1.json"), "{not json").unwrap();

        assert_eq!(rebuild_search_index(&store).unwrap(), 1);
        let index = store.load_search_index().unwrap().unwrap();
        assert_eq!(index[0].logo_keys, Some(vec!["BTC".to_string()]));
    }
}
