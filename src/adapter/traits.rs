//! Protocol adapter trait: the contract every data source implements
//!
//! An adapter fetches a provider-specific catalog once per build, groups it
//! by asset, and expands each asset into a root node plus its one-hop leaves.
//! The orchestrator only ever sees the type-erased [`AssetSource`] view.

use super::fetch::FetchError;
use crate::graph::{Edge, Node, NodeId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Canonical asset identity an adapter groups its catalog by.
pub type AssetKey = String;

/// Errors an adapter surfaces to the orchestrator
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{adapter}: no catalog fetched (first error: {first_error})")]
    NoCatalog { adapter: String, first_error: String },

    #[error("adapter error: {0}")]
    Internal(String),
}

/// One asset's one-hop expansion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Leaves {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Leaves {
    pub fn push(&mut self, node: Node, edge: Edge) {
        self.nodes.push(node);
        self.edges.push(edge);
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// The contract protocol adapters implement.
///
/// Everything after `fetch_catalog` is pure: no I/O, no shared state.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// Raw provider data for one build
    type Catalog: Send + Sync;
    /// One allocation entry of an asset
    type Allocation: Send + Sync;

    /// Protocol id; also the directory snapshots are persisted under.
    fn id(&self) -> &str;

    /// Fetch the catalog. Partial failure across chains or providers is
    /// tolerated; an error means nothing usable was fetched.
    async fn fetch_catalog(&self) -> Result<Self::Catalog, AdapterError>;

    /// Group the catalog by asset.
    fn asset_allocations(&self, catalog: &Self::Catalog) -> BTreeMap<AssetKey, Vec<Self::Allocation>>;

    /// Canonical root node for an asset, or `None` to skip it.
    fn build_root_node(&self, asset: &str, allocations: &[Self::Allocation]) -> Option<Node>;

    /// Edge from the root to one leaf.
    fn build_edge(&self, root: &Node, leaf: &Node, allocation_usd: f64) -> Edge {
        Edge::new(root.id.clone(), leaf.id.clone(), allocation_usd)
    }

    /// Expand an asset's allocations into leaves with USD weights.
    fn normalize_leaves(&self, root: &Node, allocations: &[Self::Allocation]) -> Leaves;

    /// Alternate root ids the asset is deployed under (canonical excluded).
    fn deployments(&self, _root_id: &NodeId) -> Vec<NodeId> {
        Vec::new()
    }
}

/// An asset's root and leaves as contributed by one adapter
#[derive(Debug, Clone, PartialEq)]
pub struct AssetContribution {
    pub asset: AssetKey,
    pub root: Node,
    pub leaves: Leaves,
}

/// Everything one adapter contributed to a build
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contributions {
    pub assets: Vec<AssetContribution>,
    /// Assets the adapter declined to build a root for
    pub skipped: Vec<AssetKey>,
}

/// Object-safe view of a [`ProtocolAdapter`], used by the registry.
#[async_trait]
pub trait AssetSource: Send + Sync {
    fn id(&self) -> &str;

    /// Fetch the catalog and expand every asset it contains.
    async fn contributions(&self) -> Result<Contributions, AdapterError>;

    fn deployments(&self, root_id: &NodeId) -> Vec<NodeId>;
}

#[async_trait]
impl<A: ProtocolAdapter> AssetSource for A {
    fn id(&self) -> &str {
        ProtocolAdapter::id(self)
    }

    async fn contributions(&self) -> Result<Contributions, AdapterError> {
        let catalog = self.fetch_catalog().await?;
        let grouped = self.asset_allocations(&catalog);

        let mut out = Contributions::default();
        for (asset, allocations) in grouped {
            let Some(root) = self.build_root_node(&asset, &allocations) else {
                debug!(adapter = ProtocolAdapter::id(self), %asset, "no root node, skipping asset");
                out.skipped.push(asset);
                continue;
            };
            let leaves = self.normalize_leaves(&root, &allocations);
            out.assets.push(AssetContribution { asset, root, leaves });
        }
        Ok(out)
    }

    fn deployments(&self, root_id: &NodeId) -> Vec<NodeId> {
        ProtocolAdapter::deployments(self, root_id)
    }
}

/// Settle-all helper for chain/provider scoped sub-fetches: keep every
/// success, fail only when there are none.
pub fn settle_all<T>(
    adapter: &str,
    results: impl IntoIterator<Item = (String, Result<T, AdapterError>)>,
) -> Result<Vec<T>, AdapterError> {
    let mut ok = Vec::new();
    let mut first_error = None;
    for (scope, result) in results {
        match result {
            Ok(value) => ok.push(value),
            Err(e) => {
                tracing::warn!(adapter, %scope, error = %e, "sub-fetch failed, skipping");
                first_error.get_or_insert_with(|| format!("{scope}: {e}"));
            }
        }
    }
    if ok.is_empty() {
        return Err(AdapterError::NoCatalog {
            adapter: adapter.to_string(),
            first_error: first_error.unwrap_or_else(|| "nothing configured".to_string()),
        });
    }
    Ok(ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl ProtocolAdapter for Fixed {
        type Catalog = Vec<(String, f64)>;
        type Allocation = f64;

        fn id(&self) -> &str {
            "fixed"
        }

        async fn fetch_catalog(&self) -> Result<Self::Catalog, AdapterError> {
            Ok(vec![
                ("a".to_string(), 10.0),
                ("a".to_string(), 5.0),
                ("skip".to_string(), 1.0),
            ])
        }

        fn asset_allocations(&self, catalog: &Self::Catalog) -> BTreeMap<AssetKey, Vec<f64>> {
            let mut map: BTreeMap<AssetKey, Vec<f64>> = BTreeMap::new();
            for (key, usd) in catalog {
                map.entry(key.clone()).or_default().push(*usd);
            }
            map
        }

        fn build_root_node(&self, asset: &str, _allocations: &[f64]) -> Option<Node> {
            (asset != "skip").then(|| Node::new(format!("eth:fixed:{asset}"), "eth", asset))
        }

        fn normalize_leaves(&self, root: &Node, allocations: &[f64]) -> Leaves {
            let mut leaves = Leaves::default();
            for (i, usd) in allocations.iter().enumerate() {
                let leaf = Node::new(format!("eth:fixed:leaf{i}"), "eth", format!("leaf{i}"));
                let edge = self.build_edge(root, &leaf, *usd);
                leaves.push(leaf, edge);
            }
            leaves
        }
    }

    #[tokio::test]
    async fn contributions_skip_assets_without_root() {
        let contributions = Fixed.contributions().await.unwrap();
        assert_eq!(contributions.assets.len(), 1);
        assert_eq!(contributions.skipped, vec!["skip".to_string()]);
        let a = &contributions.assets[0];
        assert_eq!(a.root.id.as_str(), "eth:fixed:a");
        assert_eq!(a.leaves.edges.len(), 2);
        assert_eq!(a.leaves.edges[0].from.as_str(), "eth:fixed:a");
        assert_eq!(a.leaves.edges[1].allocation_usd, 5.0);
        assert!(AssetSource::deployments(&Fixed, &a.root.id).is_empty());
    }

    #[test]
    fn settle_all_keeps_successes() {
        let ok = settle_all(
            "t",
            vec![
                ("eth".to_string(), Ok(1)),
                ("base".to_string(), Err(AdapterError::Internal("down".into()))),
            ],
        )
        .unwrap();
        assert_eq!(ok, vec![1]);
    }

    #[test]
    fn settle_all_reports_first_error() {
        let err = settle_all::<u8>(
            "t",
            vec![
                ("eth".to_string(), Err(AdapterError::Internal("first".into()))),
                ("base".to_string(), Err(AdapterError::Internal("second".into()))),
            ],
        )
        .unwrap_err();
        match err {
            AdapterError::NoCatalog { adapter, first_error } => {
                assert_eq!(adapter, "t");
                assert!(first_error.contains("eth"));
                assert!(first_error.contains("first"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
