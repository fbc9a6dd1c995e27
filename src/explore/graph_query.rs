//! Read-only queries over a loaded snapshot

use crate::graph::{normalize_node_id, Edge, GraphSnapshot, Node, SnapshotView};

fn chain_matches(node: &Node, chain: Option<&str>) -> bool {
    chain.is_some_and(|c| node.chain.trim().eq_ignore_ascii_case(c.trim()))
}

/// Resolve the node a page is about.
///
/// Exact (normalized) id matches win; among several, the one on `chain` is
/// preferred. Failing that, nodes whose id starts with the requested id are
/// considered with the same chain preference.
pub fn resolve_root_node<'a>(nodes: &'a [Node], id: &str, chain: Option<&str>) -> Option<&'a Node> {
    let target = normalize_node_id(id);
    if target.is_empty() {
        return None;
    }

    let pick = |candidates: Vec<&'a Node>| {
        candidates
            .iter()
            .find(|n| chain_matches(n, chain))
            .or_else(|| candidates.first())
            .copied()
    };

    let exact: Vec<&Node> = nodes.iter().filter(|n| n.id.normalized() == target).collect();
    if !exact.is_empty() {
        return pick(exact);
    }

    let prefixed: Vec<&Node> = nodes
        .iter()
        .filter(|n| n.id.normalized().starts_with(&target))
        .collect();
    pick(prefixed)
}

/// Aggregates shown next to a selected node
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeContext {
    /// Σ|allocationUsd| over outgoing edges
    pub total_outgoing_usd: f64,
    pub total_incoming_usd: f64,
    pub outgoing_count: usize,
    /// Fraction of the root's outgoing allocation that goes directly to this node
    pub share_of_root: Option<f64>,
}

pub fn node_context(snapshot: &GraphSnapshot, node_id: &str) -> NodeContext {
    let total_outgoing_usd = snapshot.total_outgoing_usd(node_id);
    let outgoing_count = snapshot.outgoing(node_id).count();
    let total_incoming_usd = snapshot.incoming(node_id).map(|e| e.allocation_usd).sum();

    let share_of_root = snapshot.root().and_then(|root| {
        if root.id.matches(node_id) {
            return None;
        }
        let root_total = snapshot.total_outgoing_usd(root.id.as_str());
        if root_total <= 0.0 {
            return None;
        }
        let direct: f64 = snapshot
            .outgoing(root.id.as_str())
            .filter(|e| e.to.matches(node_id))
            .map(Edge::weight)
            .sum();
        Some(direct / root_total)
    });

    NodeContext {
        total_outgoing_usd,
        total_incoming_usd,
        outgoing_count,
        share_of_root,
    }
}

/// One outgoing edge of the focused node, with its target resolved
#[derive(Debug, Clone, Copy)]
pub struct Child<'a> {
    pub node: &'a Node,
    pub edge: &'a Edge,
    /// Signed `allocationUsd`
    pub value: f64,
    /// `|value|` over the focus's total outgoing `|allocationUsd|`
    pub percent: f64,
}

impl Child<'_> {
    pub fn id(&self) -> &str {
        self.node.id.as_str()
    }
}

/// Direct children of `focus_id`, one per outgoing edge, in edge order.
///
/// Edges pointing at nodes missing from the snapshot are skipped.
pub fn direct_children<'a>(snapshot: &'a GraphSnapshot, focus_id: &str) -> Vec<Child<'a>> {
    let view = SnapshotView::new(snapshot);
    let edges = view.outgoing(focus_id);
    let total: f64 = edges.iter().map(|e| e.weight()).sum();
    edges
        .iter()
        .filter_map(|&edge| {
            let node = view.node(edge.to.as_str())?;
            let percent = if total > 0.0 { edge.weight() / total } else { 0.0 };
            Some(Child {
                node,
                edge,
                value: edge.allocation_usd,
                percent,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> GraphSnapshot {
        GraphSnapshot {
            nodes: vec![
                Node::new("eth:euler:0xvault", "eth", "Vault"),
                Node::new("eth:euler:0xa", "eth", "A"),
                Node::new("eth:euler:0xb", "eth", "B"),
                Node::new("arb:euler:0xvault", "arb", "Vault on Arbitrum"),
            ],
            edges: vec![
                Edge::new("eth:euler:0xvault", "eth:euler:0xa", 750.0),
                Edge::new("eth:euler:0xvault", "eth:euler:0xb", -250.0),
                Edge::new("eth:euler:0xvault", "eth:euler:0xmissing", 1.0),
            ],
            sources: vec![],
        }
    }

    #[test]
    fn root_resolution_prefers_exact_then_chain() {
        let s = snapshot();
        assert_eq!(resolve_root_node(&s.nodes, "ETH:EULER:0xVAULT", None).unwrap().name, "Vault");

        let mut dupes = s.nodes.clone();
        dupes.push(Node::new("eth:euler:0xvault", "base", "Vault on Base"));
        assert_eq!(
            resolve_root_node(&dupes, "eth:euler:0xvault", Some("BASE")).unwrap().name,
            "Vault on Base"
        );
        assert_eq!(resolve_root_node(&dupes, "eth:euler:0xvault", Some("op")).unwrap().name, "Vault");
    }

    #[test]
    fn root_resolution_falls_back_to_prefix() {
        let s = snapshot();
        assert_eq!(resolve_root_node(&s.nodes, "eth:euler:0xv", None).unwrap().name, "Vault");
        assert!(resolve_root_node(&s.nodes, "sol:", None).is_none());
        assert!(resolve_root_node(&s.nodes, "  ", None).is_none());
    }

    #[test]
    fn children_carry_signed_value_and_absolute_share() {
        let s = snapshot();
        let children = direct_children(&s, "eth:euler:0xvault");
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].id(), "eth:euler:0xa");
        assert!((children[0].percent - 750.0 / 1001.0).abs() < 1e-12);
        assert_eq!(children[1].value, -250.0);
        assert!(direct_children(&s, "eth:euler:0xa").is_empty());
    }

    #[test]
    fn children_outlive_the_focus_key() {
        let s = snapshot();
        let children = {
            let focus = String::from("ETH:EULER:0xVAULT");
            direct_children(&s, &focus)
        };
        let ids: Vec<&str> = children.iter().map(Child::id).collect();
        assert_eq!(ids, ["eth:euler:0xa", "eth:euler:0xb"]);
    }

    #[test]
    fn context_sums_both_directions() {
        let s = snapshot();
        let root = node_context(&s, "eth:euler:0xvault");
        assert_eq!(root.total_outgoing_usd, 1001.0);
        assert_eq!(root.outgoing_count, 3);
        assert_eq!(root.share_of_root, None);

        let b = node_context(&s, "eth:euler:0xb");
        assert_eq!(b.total_incoming_usd, -250.0);
        assert!((b.share_of_root.unwrap() - 250.0 / 1001.0).abs() < 1e-12);
    }
}
