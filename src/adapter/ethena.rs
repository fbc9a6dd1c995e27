//! Ethena: USDe and sUSDe backed by exchange-held collateral

use super::fetch::{get_typed, JsonFetcher};
use super::traits::{AdapterError, AssetKey, Leaves, ProtocolAdapter};
use super::units::{round_to_two_decimals, scale_by_decimals};
use crate::config::EthenaConfig;
use crate::graph::{aliases_for, slug, DeploymentTable, Node, NodeDetails, NodeId};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const PROTOCOL: &str = "ethena";

const ASSET_USDE: &str = "USDe";
const ASSET_SUSDE: &str = "sUSDe";

pub const USDE_ROOT_ID: &str = "eth:ethena:0x4c9edd5852cd905f086c759e8383e09bff1e68b3";
pub const SUSDE_ROOT_ID: &str = "eth:ethena:0x9d39a5de30e57443bff2a8307a4256c8797a3497";

pub const DEPLOYMENTS: &[DeploymentTable] = &[
    DeploymentTable {
        protocol: PROTOCOL,
        canonical_root_id: USDE_ROOT_ID,
        deployments: &[
            ("eth", "0x4c9edd5852cd905f086c759e8383e09bff1e68b3"),
            ("arb", "0x5d3a1ff2b6bab83b63cd9ad0787074081a52ef34"),
        ],
    },
    DeploymentTable {
        protocol: PROTOCOL,
        canonical_root_id: SUSDE_ROOT_ID,
        deployments: &[
            ("eth", "0x9d39a5de30e57443bff2a8307a4256c8797a3497"),
            ("arb", "0x211cc4dd073734da055fbf44a2b4667d5e5fe5d2"),
        ],
    },
];

#[derive(Debug, Clone, Default, Deserialize)]
struct Latest<T> {
    latest: LatestData<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LatestData<T> {
    data: T,
}

/// Supplies are wei amounts; providers send them as strings or numbers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainMetrics {
    #[serde(default)]
    pub total_usde_supply: Value,
    #[serde(default)]
    pub usde_price: Value,
    #[serde(default)]
    pub total_susde_supply: Value,
    #[serde(default)]
    pub susde_price: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CollateralList {
    #[serde(default)]
    collateral: Vec<CollateralEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollateralEntry {
    pub exchange: String,
    pub asset: String,
    #[serde(default)]
    pub usd_amount: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YieldResponse {
    staking_yield: Option<YieldValue>,
}

#[derive(Debug, Clone, Deserialize)]
struct YieldValue {
    value: Value,
}

/// Everything Ethena publishes about its backing, fetched once per build
#[derive(Debug, Clone, Default)]
pub struct EthenaCatalog {
    pub chain_metrics: Option<ChainMetrics>,
    pub collateral: Vec<CollateralEntry>,
    /// sUSDe staking yield as published
    pub susde_apy: Option<f64>,
}

fn number(value: &Value) -> Option<f64> {
    let n: f64 = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Wei supply times price.
fn supply_usd(supply: &Value, price: &Value) -> Option<f64> {
    let supply = match supply {
        Value::String(s) => scale_by_decimals(s, 18)?,
        other => number(other)? / 1e18,
    };
    let price = number(price)?;
    Some(round_to_two_decimals(supply * price))
}

/// `global:ethena:<exchange>:<asset>`
fn backing_node_id(exchange: &str, asset: &str) -> NodeId {
    NodeId::from_string(format!("global:{PROTOCOL}:{}:{}", slug(exchange), slug(asset)))
}

pub struct EthenaAdapter {
    config: EthenaConfig,
    fetcher: Arc<dyn JsonFetcher>,
}

impl EthenaAdapter {
    pub fn new(config: EthenaConfig, fetcher: Arc<dyn JsonFetcher>) -> Self {
        Self { config, fetcher }
    }
}

#[async_trait]
impl ProtocolAdapter for EthenaAdapter {
    type Catalog = EthenaCatalog;
    type Allocation = Arc<EthenaCatalog>;

    fn id(&self) -> &str {
        PROTOCOL
    }

    async fn fetch_catalog(&self) -> Result<EthenaCatalog, AdapterError> {
        let fetcher = self.fetcher.as_ref();
        let (metrics, collateral, yields) = tokio::join!(
            get_typed::<Latest<ChainMetrics>>(fetcher, &self.config.chain_metrics_url, &[]),
            get_typed::<Latest<CollateralList>>(fetcher, &self.config.collateral_metrics_url, &[]),
            get_typed::<YieldResponse>(fetcher, &self.config.yield_url, &[]),
        );

        // Each provider is optional on its own; only a total blackout is fatal.
        let mut catalog = EthenaCatalog::default();
        let mut failures = Vec::new();
        match metrics {
            Ok(m) => catalog.chain_metrics = m.map(|m| m.latest.data),
            Err(e) => failures.push(("chain-metrics", e)),
        }
        match collateral {
            Ok(c) => catalog.collateral = c.map(|c| c.latest.data.collateral).unwrap_or_default(),
            Err(e) => failures.push(("collateral", e)),
        }
        match yields {
            Ok(y) => {
                catalog.susde_apy = y.and_then(|y| y.staking_yield).and_then(|v| number(&v.value));
            }
            Err(e) => failures.push(("yield", e)),
        }

        if failures.len() == 3 {
            let (scope, e) = &failures[0];
            return Err(AdapterError::NoCatalog {
                adapter: PROTOCOL.to_string(),
                first_error: format!("{scope}: {e}"),
            });
        }
        for (scope, e) in &failures {
            warn!(adapter = PROTOCOL, %scope, error = %e, "provider unavailable");
        }
        Ok(catalog)
    }

    fn asset_allocations(&self, catalog: &EthenaCatalog) -> BTreeMap<AssetKey, Vec<Arc<EthenaCatalog>>> {
        // Both assets share the same backing.
        let shared = Arc::new(catalog.clone());
        BTreeMap::from([
            (ASSET_USDE.to_string(), vec![shared.clone()]),
            (ASSET_SUSDE.to_string(), vec![shared]),
        ])
    }

    fn build_root_node(&self, asset: &str, allocations: &[Arc<EthenaCatalog>]) -> Option<Node> {
        let catalog = allocations.first()?;
        let metrics = catalog.chain_metrics.as_ref();

        match asset {
            ASSET_USDE => Some(
                Node::new(USDE_ROOT_ID, "eth", ASSET_USDE)
                    .with_protocol(PROTOCOL)
                    .with_details(NodeDetails::with_kind("Deposit"))
                    .with_tvl(metrics.and_then(|m| supply_usd(&m.total_usde_supply, &m.usde_price))),
            ),
            ASSET_SUSDE => Some(
                Node::new(SUSDE_ROOT_ID, "eth", ASSET_SUSDE)
                    .with_protocol(PROTOCOL)
                    .with_details(NodeDetails::with_kind("Staked"))
                    .with_apy(catalog.susde_apy)
                    .with_tvl(metrics.and_then(|m| supply_usd(&m.total_susde_supply, &m.susde_price))),
            ),
            _ => None,
        }
    }

    fn normalize_leaves(&self, root: &Node, allocations: &[Arc<EthenaCatalog>]) -> Leaves {
        let mut leaves = Leaves::default();
        let Some(catalog) = allocations.first() else {
            return leaves;
        };

        for entry in &catalog.collateral {
            let usd = number(&entry.usd_amount).unwrap_or(0.0);
            if usd <= 0.0 {
                debug!(exchange = %entry.exchange, asset = %entry.asset, "no positive backing, skipping");
                continue;
            }
            let leaf = Node::new(
                backing_node_id(&entry.exchange, &entry.asset),
                "global",
                format!("{}: {}", entry.exchange, entry.asset),
            )
            .with_details(NodeDetails::with_kind("Investment"));
            let edge = self.build_edge(root, &leaf, round_to_two_decimals(usd));
            leaves.push(leaf, edge);
        }
        leaves
    }

    fn deployments(&self, root_id: &NodeId) -> Vec<NodeId> {
        aliases_for(DEPLOYMENTS, root_id)
    }
}
