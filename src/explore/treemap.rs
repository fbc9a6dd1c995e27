//! Treemap tiles: small-slice aggregation and terminal classification
//!
//! Tiny children would render as slivers, so children below a minimum share
//! are folded into one synthetic OTHERS tile. The share threshold follows
//! from the container size: a tile should cover roughly
//! [`MIN_TILE_AREA_PX`] square pixels.

use super::graph_query::Child;
use crate::graph::{GraphSnapshot, LendingPosition, Node, NodeId, SnapshotView};
use crate::index::RootIdSet;

/// About 53×53 px
pub const MIN_TILE_AREA_PX: f64 = 2800.0;
pub const MIN_PERCENT_FLOOR: f64 = 0.001;
pub const MIN_PERCENT_CEILING: f64 = 0.02;
/// Threshold used before the container has been measured
pub const UNMEASURED_MIN_PERCENT: f64 = 0.005;
/// Fewer minor children than this are left as individual tiles
pub const OTHERS_MIN_COUNT: usize = 3;
/// Children kept visible when every child is below the threshold
pub const OTHERS_MIN_MAJOR_COUNT: usize = 6;

pub const OTHERS_ID: &str = "others";
pub const OTHERS_NAME: &str = "OTHERS";

/// Minimum share for a child to get its own tile.
pub fn min_percent(container_area_px: f64, min_tile_area_px: f64) -> f64 {
    let by_area = if container_area_px > 0.0 && container_area_px.is_finite() {
        min_tile_area_px / container_area_px
    } else {
        UNMEASURED_MIN_PERCENT
    };
    by_area.clamp(MIN_PERCENT_FLOOR, MIN_PERCENT_CEILING)
}

#[derive(Debug, Clone, PartialEq)]
pub enum TileKind {
    Node {
        id: NodeId,
        /// Tag of the connecting edge, if it is a lending leg
        lending_position: Option<LendingPosition>,
        terminal: bool,
    },
    Others {
        child_ids: Vec<NodeId>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub name: String,
    /// Tile area weight, always non-negative
    pub value: f64,
    /// Signed `allocationUsd` of the connecting edge (sum for OTHERS)
    pub original_value: f64,
    pub percent: f64,
    pub kind: TileKind,
}

impl Tile {
    pub fn id(&self) -> &str {
        match &self.kind {
            TileKind::Node { id, .. } => id.as_str(),
            TileKind::Others { .. } => OTHERS_ID,
        }
    }

    pub fn is_others(&self) -> bool {
        matches!(self.kind, TileKind::Others { .. })
    }

    /// OTHERS is never terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, TileKind::Node { terminal: true, .. })
    }

    pub fn child_ids(&self) -> &[NodeId] {
        match &self.kind {
            TileKind::Others { child_ids } => child_ids,
            TileKind::Node { .. } => &[],
        }
    }

    pub fn child_count(&self) -> usize {
        self.child_ids().len()
    }
}

/// No outgoing edges here and no snapshot of its own anywhere.
///
/// Without a root-id set nothing is classified terminal.
pub fn is_terminal(view: &SnapshotView<'_>, node_id: &str, roots: Option<&RootIdSet>) -> bool {
    match roots {
        Some(roots) => view.is_leaf(node_id) && !roots.contains(node_id),
        None => false,
    }
}

fn top_leg_name<'a>(view: &SnapshotView<'a>, node: &Node, side: LendingPosition) -> Option<&'a str> {
    view.outgoing(node.id.as_str())
        .iter()
        .filter(|e| e.lending_position == Some(side))
        .max_by(|a, b| a.weight().total_cmp(&b.weight()))
        .and_then(|e| view.node(e.to.as_str()))
        .map(|n| n.name.as_str())
}

/// Tile label: `COLLATERAL/BORROW` for lending positions, the node name otherwise.
pub fn display_name(view: &SnapshotView<'_>, node: &Node) -> String {
    if node.is_lending() {
        let collateral = top_leg_name(view, node, LendingPosition::Collateral);
        let borrow = top_leg_name(view, node, LendingPosition::Borrow);
        match (collateral, borrow) {
            (Some(c), Some(b)) => return format!("{c}/{b}"),
            (Some(side), None) | (None, Some(side)) => return side.to_string(),
            (None, None) => {}
        }
    }
    node.name.clone()
}

fn node_tile(view: &SnapshotView<'_>, child: &Child<'_>, roots: Option<&RootIdSet>) -> Tile {
    Tile {
        name: display_name(view, child.node),
        value: child.value.abs(),
        original_value: child.edge.allocation_usd,
        percent: child.percent,
        kind: TileKind::Node {
            id: child.node.id.clone(),
            lending_position: child.edge.lending_position,
            terminal: is_terminal(view, child.id(), roots),
        },
    }
}

fn sorted_tiles(view: &SnapshotView<'_>, children: &[Child<'_>], roots: Option<&RootIdSet>) -> Vec<Tile> {
    let mut tiles: Vec<Tile> = children.iter().map(|c| node_tile(view, c, roots)).collect();
    tiles.sort_by(|a, b| b.value.total_cmp(&a.value));
    tiles
}

/// Split sorted tiles into those kept and those folded into OTHERS.
fn partition(sorted: Vec<Tile>, min_percent: f64) -> (Vec<Tile>, Vec<Tile>) {
    let total = sorted.len();
    let (major, minor): (Vec<Tile>, Vec<Tile>) = sorted.into_iter().partition(|t| t.percent >= min_percent);
    if major.is_empty() && total > OTHERS_MIN_MAJOR_COUNT {
        let mut minor = minor;
        let rest = minor.split_off(OTHERS_MIN_MAJOR_COUNT);
        return (minor, rest);
    }
    (major, minor)
}

/// Tiles for the focused node's children, aggregating small ones.
pub fn build_tiles(
    snapshot: &GraphSnapshot,
    children: &[Child<'_>],
    min_percent: f64,
    roots: Option<&RootIdSet>,
) -> Vec<Tile> {
    let view = SnapshotView::new(snapshot);
    let sorted = sorted_tiles(&view, children, roots);
    let (mut major, minor) = partition(sorted, min_percent);

    if minor.len() < OTHERS_MIN_COUNT {
        major.extend(minor);
        return major;
    }

    let others = Tile {
        name: OTHERS_NAME.to_string(),
        value: minor.iter().map(|t| t.value).sum(),
        original_value: minor.iter().map(|t| t.value).sum(),
        percent: minor.iter().map(|t| t.percent).sum(),
        kind: TileKind::Others {
            child_ids: minor
                .iter()
                .filter_map(|t| match &t.kind {
                    TileKind::Node { id, .. } => Some(id.clone()),
                    TileKind::Others { .. } => None,
                })
                .collect(),
        },
    };
    major.push(others);
    major
}

/// Tiles for an expanded OTHERS bucket: only `scope`, never aggregated.
pub fn build_others_tiles(
    snapshot: &GraphSnapshot,
    children: &[Child<'_>],
    scope: &[NodeId],
    roots: Option<&RootIdSet>,
) -> Vec<Tile> {
    let view = SnapshotView::new(snapshot);
    let scoped: Vec<Child<'_>> = children
        .iter()
        .filter(|c| scope.iter().any(|id| id.matches(c.id())))
        .copied()
        .collect();
    sorted_tiles(&view, &scoped, roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explore::graph_query::direct_children;
    use crate::graph::{Edge, NodeDetails};

    fn fan_out(values: &[f64]) -> GraphSnapshot {
        let mut nodes = vec![Node::new("eth:test:root", "eth", "Root").with_tvl(Some(values.iter().sum()))];
        let mut edges = Vec::new();
        for (i, v) in values.iter().enumerate() {
            let id = format!("eth:test:c{i}");
            nodes.push(Node::new(id.as_str(), "eth", format!("Child {i}")));
            edges.push(Edge::new("eth:test:root", id.as_str(), *v));
            // every child has somewhere to go
            let sink = format!("eth:test:s{i}");
            nodes.push(Node::new(sink.as_str(), "eth", "Sink"));
            edges.push(Edge::new(id.as_str(), sink.as_str(), 1.0));
        }
        GraphSnapshot {
            nodes,
            edges,
            sources: vec![],
        }
    }

    fn tiles(snapshot: &GraphSnapshot, min_percent: f64, roots: Option<&RootIdSet>) -> Vec<Tile> {
        let children = direct_children(snapshot, "eth:test:root");
        build_tiles(snapshot, &children, min_percent, roots)
    }

    #[test]
    fn threshold_is_clamped() {
        assert_eq!(min_percent(280_000.0, MIN_TILE_AREA_PX), 0.01);
        assert_eq!(min_percent(100.0, MIN_TILE_AREA_PX), MIN_PERCENT_CEILING);
        assert_eq!(min_percent(1e12, MIN_TILE_AREA_PX), MIN_PERCENT_FLOOR);
        assert_eq!(min_percent(0.0, MIN_TILE_AREA_PX), UNMEASURED_MIN_PERCENT);
    }

    #[test]
    fn child_at_threshold_is_major() {
        // the three 10s sit exactly on the threshold, the last child just under it
        let snapshot = fan_out(&[10.0, 10.0, 10.0, 960.0, 9.999]);
        let children = direct_children(&snapshot, "eth:test:root");
        let p = children[0].percent;
        let out = build_tiles(&snapshot, &children, p, None);
        let others = out.iter().find(|t| t.is_others());
        assert!(others.is_none());
        assert!(out.iter().any(|t| t.id() == "eth:test:c0"));

        let (major, minor) = partition(sorted_tiles(&SnapshotView::new(&snapshot), &children, None), p);
        assert_eq!(major.len(), 4);
        assert_eq!(minor.len(), 1);
        assert_eq!(minor[0].id(), "eth:test:c4");
    }

    #[test]
    fn two_minor_children_stay_separate_three_collapse() {
        let two = fan_out(&[500.0, 480.0, 10.0, 10.0]);
        let out = tiles(&two, 0.05, None);
        assert_eq!(out.len(), 4);
        assert!(!out.iter().any(Tile::is_others));

        let three = fan_out(&[500.0, 470.0, 10.0, 10.0, 10.0]);
        let out = tiles(&three, 0.05, None);
        assert_eq!(out.len(), 3);
        let others = out.last().unwrap();
        assert!(others.is_others());
        assert_eq!(others.name, OTHERS_NAME);
        assert_eq!(others.id(), OTHERS_ID);
        assert_eq!(others.child_count(), 3);
        assert_eq!(others.value, 30.0);
        assert!((others.percent - 0.03).abs() < 1e-12);
        assert!(!others.is_terminal());
    }

    #[test]
    fn all_tiny_children_keep_six_largest() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let out = tiles(&fan_out(&values), 0.5, None);
        assert_eq!(out.len(), 7);
        assert_eq!(out[0].id(), "eth:test:c9");
        assert_eq!(out[6].child_count(), 4);

        // exactly six tiny children: no promotion, all folded
        let out = tiles(&fan_out(&[1.0; 6]), 0.5, None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].child_count(), 6);
    }

    #[test]
    fn terminal_needs_both_local_leaf_and_no_global_root() {
        let snapshot = GraphSnapshot {
            nodes: vec![
                Node::new("eth:test:root", "eth", "Root"),
                Node::new("eth:test:known", "eth", "Known"),
                Node::new("eth:test:dead", "eth", "Dead"),
            ],
            edges: vec![
                Edge::new("eth:test:root", "eth:test:known", 60.0),
                Edge::new("eth:test:root", "eth:test:dead", 40.0),
            ],
            sources: vec![],
        };
        let roots: RootIdSet = ["ETH:TEST:KNOWN".to_string()].into_iter().collect();

        let out = tiles(&snapshot, 0.01, Some(&roots));
        assert!(!out[0].is_terminal());
        assert!(out[1].is_terminal());

        let out = tiles(&snapshot, 0.01, None);
        assert!(out.iter().all(|t| !t.is_terminal()));
    }

    #[test]
    fn lending_positions_show_collateral_over_borrow() {
        let snapshot = GraphSnapshot {
            nodes: vec![
                Node::new("eth:resolv:usr", "eth", "USR"),
                Node::new("eth:aave3:pool", "eth", "Aave V3").with_details(NodeDetails::with_kind("Lending")),
                Node::new("eth:token:weth", "eth", "WETH"),
                Node::new("eth:token:wbtc", "eth", "WBTC"),
                Node::new("eth:token:usdc", "eth", "USDC"),
                Node::new("eth:morpho:pool", "eth", "Morpho").with_details(NodeDetails::with_kind("lending")),
            ],
            edges: vec![
                Edge::new("eth:resolv:usr", "eth:aave3:pool", 600.0),
                Edge::new("eth:resolv:usr", "eth:morpho:pool", 100.0),
                Edge::new("eth:aave3:pool", "eth:token:weth", 900.0).with_lending_position(LendingPosition::Collateral),
                Edge::new("eth:aave3:pool", "eth:token:wbtc", 1200.0).with_lending_position(LendingPosition::Collateral),
                Edge::new("eth:aave3:pool", "eth:token:usdc", -800.0).with_lending_position(LendingPosition::Borrow),
                Edge::new("eth:morpho:pool", "eth:token:usdc", -50.0).with_lending_position(LendingPosition::Borrow),
            ],
            sources: vec![],
        };
        let children = direct_children(&snapshot, "eth:resolv:usr");
        let out = build_tiles(&snapshot, &children, 0.01, None);
        assert_eq!(out[0].name, "WBTC/USDC");
        assert_eq!(out[1].name, "USDC");
    }

    #[test]
    fn others_view_is_scoped_and_flat() {
        let snapshot = fan_out(&[500.0, 470.0, 10.0, 12.0, 8.0]);
        let children = direct_children(&snapshot, "eth:test:root");
        let folded = build_tiles(&snapshot, &children, 0.05, None);
        let scope = folded.last().unwrap().child_ids().to_vec();

        let out = build_others_tiles(&snapshot, &children, &scope, None);
        let ids: Vec<&str> = out.iter().map(Tile::id).collect();
        assert_eq!(ids, vec!["eth:test:c3", "eth:test:c2", "eth:test:c4"]);
    }
}
