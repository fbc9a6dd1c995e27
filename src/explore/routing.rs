//! Cross-snapshot drilldown routing
//!
//! A clicked node may be the root of a richer snapshot of its own. Before
//! drilling locally the explorer probes for one; lending positions are never
//! probed since they only exist inside their parent snapshot.

use super::client::{SnapshotRequest, SnapshotSource};
use super::navigation::LoadedView;
use crate::graph::{normalize_node_id, LendingPosition, Node, NodeId};
use tracing::debug;

/// What a click on a node resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drilldown {
    /// Replace the view with another snapshot
    Route(SnapshotRequest),
    /// Drill into the node inside the current snapshot
    Local(NodeId),
    /// Nothing further downstream
    Terminal { name: String },
}

/// The request to probe for `node`, if it may have a snapshot of its own.
pub fn route_candidate(view: &LoadedView, node: &Node, via: Option<LendingPosition>) -> Option<SnapshotRequest> {
    let id = node.id.normalized();
    if id.is_empty() || id == view.request().normalized_id() {
        return None;
    }
    if via.is_some() || node.is_lending() {
        return None;
    }

    let current = view.request();
    let protocol = node.protocol.clone().or_else(|| current.protocol.clone());
    let chain = Some(node.chain.clone())
        .filter(|c| !c.trim().is_empty())
        .or_else(|| current.chain.clone());
    let origin = current.origin.clone().unwrap_or_else(|| current.id.clone());

    Some(
        SnapshotRequest::new(id)
            .with_protocol(protocol)
            .with_chain(chain)
            .with_origin(Some(origin)),
    )
}

/// Local drilldown when the node has children here, otherwise terminal.
pub fn local_fallback(view: &LoadedView, node: &Node) -> Drilldown {
    if view.snapshot().has_outgoing(node.id.as_str()) {
        Drilldown::Local(node.id.clone())
    } else {
        Drilldown::Terminal {
            name: node.name.clone(),
        }
    }
}

/// Decide where a click on `node_id` leads, probing `source` when the node
/// might be a root elsewhere. A failed probe counts as "no snapshot".
pub async fn route_drilldown(
    view: &LoadedView,
    node_id: &str,
    via: Option<LendingPosition>,
    source: &dyn SnapshotSource,
) -> Drilldown {
    let Some(node) = view.snapshot().node(node_id) else {
        return Drilldown::Terminal {
            name: normalize_node_id(node_id),
        };
    };

    if let Some(request) = route_candidate(view, node, via) {
        match source.probe_snapshot(&request).await {
            Ok(true) => return Drilldown::Route(request),
            Ok(false) => debug!(id = %request.id, "no snapshot for node, drilling locally"),
            Err(e) => debug!(id = %request.id, error = %e, "probe failed, drilling locally"),
        }
    }
    local_fallback(view, node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explore::client::ClientResult;
    use crate::graph::{Edge, GraphSnapshot, NodeDetails};
    use crate::index::SearchIndexEntry;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Knows which ids have snapshots and records every probe.
    #[derive(Default)]
    struct Probe {
        roots: HashSet<String>,
        probed: Mutex<Vec<SnapshotRequest>>,
    }

    #[async_trait]
    impl SnapshotSource for Probe {
        async fn fetch_snapshot(&self, _request: &SnapshotRequest) -> ClientResult<Option<GraphSnapshot>> {
            Ok(None)
        }

        async fn probe_snapshot(&self, request: &SnapshotRequest) -> ClientResult<bool> {
            self.probed.lock().unwrap().push(request.clone());
            Ok(self.roots.contains(&request.id))
        }

        async fn fetch_search_index(&self) -> ClientResult<Vec<SearchIndexEntry>> {
            Ok(Vec::new())
        }
    }

    fn view(origin: Option<&str>) -> LoadedView {
        let snapshot = GraphSnapshot {
            nodes: vec![
                Node::new("eth:resolv:0xusr", "eth", "USR").with_protocol("resolv"),
                Node::new("eth:ethena:0xsusde", "eth", "sUSDe").with_protocol("ethena"),
                Node::new("eth:aave3:pool", "eth", "Aave V3").with_details(NodeDetails::with_kind("Lending")),
                Node::new("eth:token:weth", "eth", "WETH"),
                Node::new("global:x:leaf", "", "Leaf"),
            ],
            edges: vec![
                Edge::new("eth:resolv:0xusr", "eth:ethena:0xsusde", 900.0),
                Edge::new("eth:resolv:0xusr", "eth:aave3:pool", 600.0),
                Edge::new("eth:resolv:0xusr", "global:x:leaf", 10.0),
                Edge::new("eth:aave3:pool", "eth:token:weth", 1000.0)
                    .with_lending_position(LendingPosition::Collateral),
            ],
            sources: vec![],
        };
        let request = SnapshotRequest::new("eth:resolv:0xusr")
            .with_chain(Some("eth".into()))
            .with_origin(origin.map(str::to_string));
        LoadedView::new(request, snapshot, None).unwrap()
    }

    fn probe(roots: &[&str]) -> Probe {
        Probe {
            roots: roots.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn known_root_routes_with_hints_and_origin() {
        let source = probe(&["eth:ethena:0xsusde"]);
        let decision = route_drilldown(&view(None), "ETH:ETHENA:0xSUSDE", None, &source).await;
        match decision {
            Drilldown::Route(request) => {
                assert_eq!(request.id, "eth:ethena:0xsusde");
                assert_eq!(request.protocol.as_deref(), Some("ethena"));
                assert_eq!(request.chain.as_deref(), Some("eth"));
                assert_eq!(request.origin.as_deref(), Some("eth:resolv:0xusr"));
            }
            other => panic!("expected a route, got {other:?}"),
        }

        let decision = route_drilldown(&view(Some("eth:ethena:0xusde")), "eth:ethena:0xsusde", None, &source).await;
        match decision {
            Drilldown::Route(request) => assert_eq!(request.origin.as_deref(), Some("eth:ethena:0xusde")),
            other => panic!("expected a route, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn lending_nodes_and_edges_are_never_probed() {
        let source = probe(&["eth:aave3:pool", "eth:token:weth"]);
        let v = view(None);

        let decision = route_drilldown(&v, "eth:aave3:pool", None, &source).await;
        assert_eq!(decision, Drilldown::Local(NodeId::from("eth:aave3:pool")));

        let decision = route_drilldown(&v, "eth:token:weth", Some(LendingPosition::Collateral), &source).await;
        assert_eq!(
            decision,
            Drilldown::Terminal {
                name: "WETH".into()
            }
        );
        assert!(source.probed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_leaf_is_terminal_after_probe() {
        let source = probe(&[]);
        let decision = route_drilldown(&view(None), "global:x:leaf", None, &source).await;
        assert_eq!(
            decision,
            Drilldown::Terminal {
                name: "Leaf".into()
            }
        );
        let probed = source.probed.lock().unwrap();
        assert_eq!(probed.len(), 1);
        // blank node chain falls back to the page's chain hint
        assert_eq!(probed[0].chain.as_deref(), Some("eth"));
    }

    #[tokio::test]
    async fn current_asset_is_not_probed() {
        let source = probe(&["eth:resolv:0xusr"]);
        let decision = route_drilldown(&view(None), "eth:resolv:0xusr", None, &source).await;
        assert_eq!(decision, Drilldown::Local(NodeId::from("eth:resolv:0xusr")));
        assert!(source.probed.lock().unwrap().is_empty());
    }
}
