//! Resolv: USR backed by treasury positions reported by DeBank
//!
//! Each treasury wallet's complex protocol positions become leaves of the
//! USR root. Lending positions carry their own collateral and borrow edges
//! down to the tokens involved.

use super::fetch::{get_typed, FetchError, JsonFetcher};
use super::traits::{settle_all, AdapterError, AssetKey, Leaves, ProtocolAdapter};
use super::units::round_to_two_decimals;
use crate::config::ResolvConfig;
use crate::graph::{aliases_for, DeploymentTable, Edge, LendingPosition, Node, NodeDetails, NodeId};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub const PROTOCOL: &str = "resolv";

const ASSET_USR: &str = "USR";

pub const USR_ROOT_ID: &str = "eth:resolv:0x66a1e37c9b0eaddca17d3662d6c05f4decf3e110";
pub const WSTUSR_ROOT_ID: &str = "eth:resolv:0x1202f5c7b4b9e47a1a484e8b270be34dbbc75055";
pub const RLP_ROOT_ID: &str = "eth:resolv:0x4956b52ae2ff65d74ca2d61207523288e4528f96";

pub const DEPLOYMENTS: &[DeploymentTable] = &[
    DeploymentTable {
        protocol: PROTOCOL,
        canonical_root_id: USR_ROOT_ID,
        deployments: &[
            ("eth", "0x66a1e37c9b0eaddca17d3662d6c05f4decf3e110"),
            ("base", "0x35e5db674d8e93a03d814fa0ada70731efe8a4b9"),
            ("bsc", "0x2492d0006411af6c8bbb1c8afc1b0197350a79e9"),
            ("bera", "0x2492d0006411af6c8bbb1c8afc1b0197350a79e9"),
            ("hyperevm", "0x0ad339d66bf4aed5ce31c64bc37b3244b6394a77"),
            ("soneium", "0xb1b385542b6e80f77b94393ba8342c3af699f15c"),
            ("tac", "0xb1b385542b6e80f77b94393ba8342c3af699f15c"),
            ("arb", "0x2492d0006411af6c8bbb1c8afc1b0197350a79e9"),
            ("plasma", "0xb1b385542b6e80f77b94393ba8342c3af699f15c"),
        ],
    },
    DeploymentTable {
        protocol: PROTOCOL,
        canonical_root_id: WSTUSR_ROOT_ID,
        deployments: &[
            ("eth", "0x1202f5c7b4b9e47a1a484e8b270be34dbbc75055"),
            ("base", "0xb67675158b412d53fe6b68946483ba920b135ba1"),
            ("soneium", "0x2a52b289ba68bbd02676640aa9f605700c9e5699"),
            ("hyperevm", "0x46c1c168ca597b9e5423aa7081a0dce782caeaab"),
            ("tac", "0x2a52b289ba68bbd02676640aa9f605700c9e5699"),
            ("arb", "0x66cfbd79257dc5217903a36293120282548e2254"),
            ("plasma", "0x2a52b289ba68bbd02676640aa9f605700c9e5699"),
        ],
    },
    DeploymentTable {
        protocol: PROTOCOL,
        canonical_root_id: RLP_ROOT_ID,
        deployments: &[
            ("eth", "0x4956b52ae2ff65d74ca2d61207523288e4528f96"),
            ("base", "0xc31389794ffac23331e0d9f611b7953f90aa5fdc"),
            ("bsc", "0x35e5db674d8e93a03d814fa0ada70731efe8a4b9"),
            ("bera", "0x35e5db674d8e93a03d814fa0ada70731efe8a4b9"),
            ("hyperevm", "0x0a3d8466f5de586fa5f6de117301e2f90bcc5c48"),
            ("soneium", "0x35533f54740f1f1aa4179e57ba37039dfa16868b"),
            ("tac", "0x35533f54740f1f1aa4179e57ba37039dfa16868b"),
            ("arb", "0x35e5db674d8e93a03d814fa0ada70731efe8a4b9"),
            ("plasma", "0x35533f54740f1f1aa4179e57ba37039dfa16868b"),
        ],
    },
];

/// One protocol entry of DeBank's `all_complex_protocol_list`
#[derive(Debug, Clone, Deserialize)]
pub struct DebankProtocol {
    pub id: String,
    pub chain: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub portfolio_item_list: Vec<PortfolioItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioItem {
    /// Position type as DeBank names it: `Lending`, `Staked`, `Yield`, ...
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stats: PortfolioStats,
    #[serde(default)]
    pub pool: Option<Pool>,
    #[serde(default)]
    pub detail: PortfolioDetail,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortfolioStats {
    #[serde(default)]
    pub net_usd_value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pool {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortfolioDetail {
    #[serde(default)]
    pub supply_token_list: Vec<DebankToken>,
    #[serde(default)]
    pub borrow_token_list: Vec<DebankToken>,
    #[serde(default)]
    pub health_rate: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DebankToken {
    pub id: String,
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub price: f64,
}

impl DebankToken {
    fn usd(&self) -> Option<f64> {
        let usd = self.amount * self.price;
        (usd.is_finite() && usd != 0.0).then_some(usd)
    }
}

/// One wallet's positions
#[derive(Debug, Clone)]
pub struct WalletPositions {
    pub wallet: String,
    pub protocols: Vec<DebankProtocol>,
}

/// A token leg of a lending position
#[derive(Debug, Clone, PartialEq)]
pub struct TokenLeg {
    pub id: NodeId,
    pub chain: String,
    pub symbol: String,
    pub usd: f64,
}

/// A treasury position, summed across wallets
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: NodeId,
    pub chain: String,
    pub protocol: String,
    pub name: String,
    pub kind: String,
    pub net_usd: f64,
    pub health_rate: Option<f64>,
    pub collateral: BTreeMap<NodeId, TokenLeg>,
    pub borrow: BTreeMap<NodeId, TokenLeg>,
}

impl Position {
    fn is_lending(&self) -> bool {
        self.kind.eq_ignore_ascii_case("lending")
    }
}

fn add_legs(legs: &mut BTreeMap<NodeId, TokenLeg>, tokens: &[DebankToken], fallback_chain: &str) {
    for token in tokens {
        let Some(usd) = token.usd() else {
            continue;
        };
        let chain = token.chain.clone().unwrap_or_else(|| fallback_chain.to_string());
        let id = NodeId::canonical(&chain, "token", &token.id);
        legs.entry(id.clone())
            .and_modify(|leg| leg.usd += usd)
            .or_insert(TokenLeg {
                id,
                chain,
                symbol: token.symbol.clone(),
                usd,
            });
    }
}

pub struct ResolvAdapter {
    config: ResolvConfig,
    fetcher: Arc<dyn JsonFetcher>,
    access_key: Option<String>,
    require_access_key: bool,
}

impl ResolvAdapter {
    pub fn new(config: ResolvConfig, fetcher: Arc<dyn JsonFetcher>) -> Self {
        let access_key = std::env::var(&config.access_key_env).ok();
        Self {
            config,
            fetcher,
            access_key,
            require_access_key: true,
        }
    }

    pub fn with_access_key(mut self, key: Option<String>) -> Self {
        self.access_key = key;
        self
    }

    /// Recorded fixtures need no credentials.
    pub fn without_access_key(mut self) -> Self {
        self.access_key = None;
        self.require_access_key = false;
        self
    }

    async fn fetch_wallet(&self, wallet: &str) -> Result<WalletPositions, AdapterError> {
        let headers: Vec<(&str, &str)> = match &self.access_key {
            Some(key) => vec![("AccessKey", key.as_str())],
            None if self.require_access_key => {
                return Err(FetchError::MissingCredential(self.config.access_key_env.clone()).into())
            }
            None => Vec::new(),
        };
        let url = self.config.positions_url(wallet);
        let protocols = get_typed::<Vec<DebankProtocol>>(self.fetcher.as_ref(), &url, &headers)
            .await?
            .unwrap_or_default();
        Ok(WalletPositions {
            wallet: wallet.to_lowercase(),
            protocols,
        })
    }
}

#[async_trait]
impl ProtocolAdapter for ResolvAdapter {
    type Catalog = Vec<WalletPositions>;
    type Allocation = Position;

    fn id(&self) -> &str {
        PROTOCOL
    }

    async fn fetch_catalog(&self) -> Result<Self::Catalog, AdapterError> {
        let mut results = Vec::with_capacity(self.config.wallets.len());
        for wallet in &self.config.wallets {
            results.push((wallet.clone(), self.fetch_wallet(wallet).await));
        }
        settle_all(PROTOCOL, results)
    }

    fn asset_allocations(&self, catalog: &Self::Catalog) -> BTreeMap<AssetKey, Vec<Position>> {
        let mut positions: BTreeMap<NodeId, Position> = BTreeMap::new();

        for wallet in catalog {
            for protocol in &wallet.protocols {
                for item in &protocol.portfolio_item_list {
                    let Some(pool) = &item.pool else {
                        debug!(wallet = %wallet.wallet, protocol = %protocol.id, "position without pool, skipping");
                        continue;
                    };
                    let id = NodeId::canonical(&protocol.chain, &protocol.id, &pool.id);
                    let position = positions.entry(id.clone()).or_insert_with(|| Position {
                        id,
                        chain: protocol.chain.to_lowercase(),
                        protocol: protocol.id.to_lowercase(),
                        name: if protocol.name.trim().is_empty() {
                            protocol.id.clone()
                        } else {
                            protocol.name.trim().to_string()
                        },
                        kind: item.name.clone(),
                        net_usd: 0.0,
                        health_rate: None,
                        collateral: BTreeMap::new(),
                        borrow: BTreeMap::new(),
                    });
                    if item.stats.net_usd_value.is_finite() {
                        position.net_usd += item.stats.net_usd_value;
                    }
                    if item.detail.health_rate.is_some() {
                        position.health_rate = item.detail.health_rate;
                    }
                    if position.is_lending() {
                        add_legs(&mut position.collateral, &item.detail.supply_token_list, &protocol.chain);
                        add_legs(&mut position.borrow, &item.detail.borrow_token_list, &protocol.chain);
                    }
                }
            }
        }

        BTreeMap::from([(ASSET_USR.to_string(), positions.into_values().collect())])
    }

    fn build_root_node(&self, asset: &str, allocations: &[Position]) -> Option<Node> {
        if asset != ASSET_USR {
            return None;
        }
        let tvl = (!allocations.is_empty())
            .then(|| round_to_two_decimals(allocations.iter().map(|p| p.net_usd).sum()));
        Some(
            Node::new(USR_ROOT_ID, "eth", ASSET_USR)
                .with_protocol(PROTOCOL)
                .with_details(NodeDetails::with_kind("Deposit"))
                .with_tvl(tvl),
        )
    }

    fn normalize_leaves(&self, root: &Node, allocations: &[Position]) -> Leaves {
        let mut leaves = Leaves::default();

        for position in allocations {
            let net = round_to_two_decimals(position.net_usd);
            if net == 0.0 {
                continue;
            }
            let mut details = NodeDetails::with_kind(position.kind.clone());
            details.health_rate = position.health_rate;
            let node = Node::new(position.id.clone(), position.chain.clone(), position.name.clone())
                .with_protocol(position.protocol.clone())
                .with_details(details);
            let edge = self.build_edge(root, &node, net);
            leaves.push(node.clone(), edge);

            let legs = position
                .collateral
                .values()
                .map(|leg| (leg, LendingPosition::Collateral, leg.usd))
                .chain(position.borrow.values().map(|leg| (leg, LendingPosition::Borrow, -leg.usd)));
            for (leg, side, usd) in legs {
                let token = Node::new(leg.id.clone(), leg.chain.clone(), leg.symbol.clone())
                    .with_details(NodeDetails {
                        underlying_symbol: Some(leg.symbol.clone()),
                        ..NodeDetails::with_kind("Token")
                    });
                let edge = Edge::new(node.id.clone(), token.id.clone(), round_to_two_decimals(usd))
                    .with_lending_position(side);
                leaves.push(token, edge);
            }
        }
        leaves
    }

    fn deployments(&self, root_id: &NodeId) -> Vec<NodeId> {
        aliases_for(DEPLOYMENTS, root_id)
    }
}
