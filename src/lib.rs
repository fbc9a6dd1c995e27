//! Exposure graphs for DeFi assets
//!
//! Builds a directed graph of where an asset's capital is deployed: a root
//! asset fans out into the vaults, markets and positions holding it, and each
//! of those may in turn be the root of its own graph.
//!
//! # Pipeline
//!
//! - **Adapters** turn one protocol's data into canonical root nodes and
//!   their one-hop allocation leaves.
//! - The **orchestrator** merges adapter output per asset into a draft store
//!   and freezes it into an immutable [`GraphSnapshot`].
//! - **Storage** persists snapshots (plus deployment aliases) as flat JSON.
//! - The **index** derives a searchable summary of every persisted root.
//! - The **explorer** navigates snapshots as a treemap, routing into other
//!   snapshots when a node has one of its own.
//!
//! # Example
//!
//! ```
//! use exposure_graph::{DraftGraphStore, Edge, Node};
//!
//! let mut draft = DraftGraphStore::new(Node::new("eth:ethena:0xusde", "eth", "USDe"));
//! draft.merge(
//!     vec![Node::new("global:ethena:binance:btc", "global", "Binance: BTC")],
//!     vec![Edge::new("eth:ethena:0xusde", "global:ethena:binance:btc", 1_000.0)],
//! );
//! let snapshot = draft.into_snapshot();
//! assert_eq!(snapshot.root().unwrap().name, "USDe");
//! ```

pub mod adapter;
pub mod config;
pub mod explore;
mod graph;
pub mod index;
pub mod orchestrator;
pub mod storage;

pub use adapter::{AdapterError, AdapterRegistry, AssetSource, FetchError, ProtocolAdapter};
pub use config::{ConfigError, ExposureConfig};
pub use graph::{
    aliases_for, clone_snapshot_with_root_id, deployment_node_ids, normalize_node_id, slug, DeploymentTable,
    DraftGraphStore, Edge, GraphError, GraphResult, GraphSnapshot, LendingPosition, Node, NodeCategory,
    NodeDetails, NodeId, SnapshotView,
};
pub use index::{RootIdSet, SearchIndexEntry, SearchQuery};
pub use orchestrator::{build_draft_graphs_by_asset, persist_build, BuildReport, DraftBuild, PersistReport};
pub use storage::{FileSnapshotStore, OpenStore, SnapshotKey, SnapshotStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
