//! Directed capital-allocation edges

use super::id::NodeId;
use serde::{Deserialize, Serialize};

/// Side of a lending market an edge describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LendingPosition {
    Collateral,
    Borrow,
}

/// Capital allocated from one node into another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    /// Signed USD notional; the magnitude is the weight
    #[serde(default)]
    pub allocation_usd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lending_position: Option<LendingPosition>,
}

impl Edge {
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>, allocation_usd: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            allocation_usd,
            lending_position: None,
        }
    }

    pub fn with_lending_position(mut self, position: LendingPosition) -> Self {
        self.lending_position = Some(position);
        self
    }

    /// Absolute USD weight.
    pub fn weight(&self) -> f64 {
        self.allocation_usd.abs()
    }

    /// Key under which edges are deduplicated: normalized endpoints plus lending side.
    pub fn dedup_key(&self) -> (String, String, Option<LendingPosition>) {
        (self.from.normalized(), self.to.normalized(), self.lending_position)
    }
}
