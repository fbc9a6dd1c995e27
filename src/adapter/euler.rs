//! Euler: governed Earn vaults and EVK lending markets across chains
//!
//! Earn vaults fan out to the EVK strategy vaults they allocate to. EVK
//! vaults fan out to the collateral vaults borrowers post against them,
//! weighted by the indexer's open-interest USD figures.
//!
//! Node ids are address based (`<chain>:euler:<address>`) so two vaults with
//! the same display name never collide.

use super::fetch::{get_typed, graphql, JsonFetcher};
use super::traits::{settle_all, AdapterError, AssetKey, Leaves, ProtocolAdapter};
use super::units::{parse_ray, round_to_two_decimals, scale_by_decimals};
use crate::config::{EulerChain, EulerConfig};
use crate::graph::{Node, NodeDetails, NodeId};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

pub const PROTOCOL: &str = "euler";

const EVK_PAGE_SIZE: usize = 1000;
const DEFAULT_DECIMALS: u32 = 18;
const LENDING_MARKET: &str = "Lending Market";

const EARN_VAULTS_QUERY: &str = r#"{
  eulerEarnVaults(
    first: 100
    orderBy: totalAssets
    orderDirection: desc
    where: { perspectives_contains: ["eulerEarnGovernedPerspective"] }
  ) {
    id
    name
    symbol
    asset
    curator
    totalAssets
    strategies {
      strategy
      allocatedAssets
    }
  }
}"#;

const EVK_VAULTS_QUERY: &str = r#"query ($ids: [Bytes!]!) {
  eulerVaults(where: { id_in: $ids }, first: 1000) {
    id
    name
    symbol
    asset
    decimals
    state {
      totalBorrows
      cash
      supplyApy
    }
  }
}"#;

fn lenient_decimals<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|d| u32::try_from(d).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .unwrap_or(DEFAULT_DECIMALS))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarnVault {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub asset: String,
    #[serde(default)]
    pub curator: Option<String>,
    #[serde(default)]
    pub total_assets: String,
    #[serde(default)]
    pub strategies: Vec<EarnStrategy>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarnStrategy {
    pub strategy: String,
    #[serde(default)]
    pub allocated_assets: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvkVault {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub asset: String,
    #[serde(default = "default_decimals", deserialize_with = "lenient_decimals")]
    pub decimals: u32,
    #[serde(default)]
    pub state: Option<EvkState>,
}

fn default_decimals() -> u32 {
    DEFAULT_DECIMALS
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvkState {
    #[serde(default)]
    pub total_borrows: Option<String>,
    #[serde(default)]
    pub cash: Option<String>,
    #[serde(default)]
    pub supply_apy: Option<String>,
}

impl EvkVault {
    fn supply_apy(&self) -> Option<f64> {
        self.state.as_ref()?.supply_apy.as_deref().and_then(parse_ray)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    One(String),
    Many(Vec<String>),
}

impl EntityRef {
    fn ids(&self) -> Vec<&str> {
        match self {
            EntityRef::One(id) => vec![id.as_str()],
            EntityRef::Many(ids) => ids.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VaultLabel {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub entity: Option<EntityRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelEntity {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub addresses: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct PriceRecord {
    #[serde(default)]
    price: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EarnVaultsData {
    euler_earn_vaults: Vec<EarnVault>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvkVaultsData {
    euler_vaults: Vec<EvkVault>,
}

/// Everything fetched for one chain. Address keys are lowercase.
#[derive(Debug, Clone, Default)]
pub struct ChainCatalog {
    pub chain_key: String,
    pub earn_vaults: Vec<EarnVault>,
    pub evk_vaults: HashMap<String, EvkVault>,
    pub labels: HashMap<String, VaultLabel>,
    pub entities: HashMap<String, LabelEntity>,
    pub entity_name_by_address: HashMap<String, String>,
    pub prices: HashMap<String, f64>,
    /// liability vault → collateral vault → open interest USD
    pub open_interest: BTreeMap<String, BTreeMap<String, f64>>,
}

impl ChainCatalog {
    fn node_id(&self, address: &str) -> NodeId {
        NodeId::canonical(&self.chain_key, PROTOCOL, address)
    }

    fn label_name(&self, address: &str) -> Option<&str> {
        self.labels
            .get(&address.to_lowercase())
            .and_then(|l| l.name.as_deref())
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    fn display_name<'a>(&'a self, address: &str, onchain: &'a str) -> &'a str {
        self.label_name(address).unwrap_or(onchain)
    }

    fn price(&self, asset: &str) -> Option<f64> {
        self.prices.get(&asset.to_lowercase()).copied()
    }

    fn evk(&self, address: &str) -> Option<&EvkVault> {
        self.evk_vaults.get(&address.to_lowercase())
    }

    /// Entity names from the vault's label, joined with `, `.
    fn evk_curator(&self, address: &str) -> Option<String> {
        let entity = self.labels.get(&address.to_lowercase())?.entity.as_ref()?;
        let names: Vec<&str> = entity
            .ids()
            .into_iter()
            .map(|id| {
                self.entities
                    .get(id)
                    .and_then(|e| e.name.as_deref())
                    .unwrap_or(id)
                    .trim()
            })
            .filter(|n| !n.is_empty())
            .collect();
        (!names.is_empty()).then(|| names.join(", "))
    }

    fn earn_curator(&self, vault: &EarnVault) -> Option<String> {
        let curator = vault.curator.as_deref()?;
        self.entity_name_by_address.get(&curator.to_lowercase()).cloned()
    }

    /// Earn vaults don't expose underlying decimals; borrow them from a
    /// strategy vault holding the same asset.
    fn earn_decimals(&self, vault: &EarnVault) -> u32 {
        vault
            .strategies
            .iter()
            .filter_map(|s| self.evk(&s.strategy))
            .find(|evk| evk.asset.eq_ignore_ascii_case(&vault.asset))
            .map(|evk| evk.decimals)
            .unwrap_or(DEFAULT_DECIMALS)
    }

    fn vault_node(&self, evk: &EvkVault) -> Node {
        Node::new(self.node_id(&evk.id), self.chain_key.clone(), self.display_name(&evk.id, &evk.name))
            .with_protocol(PROTOCOL)
            .with_details(
                NodeDetails::with_kind("Yield")
                    .subtype(LENDING_MARKET)
                    .curator(self.evk_curator(&evk.id)),
            )
            .with_apy(evk.supply_apy())
    }
}

/// One asset's slice of a chain catalog
#[derive(Debug, Clone)]
pub enum EulerAllocation {
    Earn {
        chain: Arc<ChainCatalog>,
        vault: EarnVault,
    },
    Evk {
        chain: Arc<ChainCatalog>,
        vault: EvkVault,
        collateral: BTreeMap<String, f64>,
    },
}

fn token_usd(raw: &str, decimals: u32, price: f64) -> Option<f64> {
    let amount = scale_by_decimals(raw, decimals)?;
    let usd = amount * price;
    usd.is_finite().then(|| round_to_two_decimals(usd))
}

async fn fetch_evk_vaults(
    fetcher: &dyn JsonFetcher,
    subgraph_url: &str,
    ids: &[String],
) -> Result<Vec<EvkVault>, AdapterError> {
    let mut vaults = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(EVK_PAGE_SIZE) {
        let page: EvkVaultsData =
            graphql(fetcher, subgraph_url, EVK_VAULTS_QUERY, json!({ "ids": chunk })).await?;
        vaults.extend(page.euler_vaults);
    }
    Ok(vaults)
}

async fn fetch_chain(
    fetcher: Arc<dyn JsonFetcher>,
    config: Arc<EulerConfig>,
    chain: EulerChain,
) -> Result<ChainCatalog, AdapterError> {
    let fetcher = fetcher.as_ref();
    let subgraph_url = config.subgraph_url(&chain);
    let labels_url = config.labels_vaults_url(chain.chain_id);
    let entities_url = config.labels_entities_url(chain.chain_id);
    let price_url = config.price_url(chain.chain_id);
    let open_interest_url = config.open_interest_url(chain.chain_id);

    let (earn, labels, entities, prices, open_interest) = tokio::try_join!(
        graphql::<EarnVaultsData>(fetcher, &subgraph_url, EARN_VAULTS_QUERY, json!({})),
        get_typed::<HashMap<String, VaultLabel>>(fetcher, &labels_url, &[]),
        get_typed::<HashMap<String, LabelEntity>>(fetcher, &entities_url, &[]),
        get_typed::<HashMap<String, PriceRecord>>(fetcher, &price_url, &[]),
        get_typed::<HashMap<String, HashMap<String, f64>>>(fetcher, &open_interest_url, &[]),
    )?;

    let mut catalog = ChainCatalog {
        chain_key: chain.chain_key.clone(),
        earn_vaults: earn.euler_earn_vaults,
        entities: entities.unwrap_or_default(),
        ..Default::default()
    };

    catalog.labels = labels
        .unwrap_or_default()
        .into_iter()
        .map(|(address, label)| (address.to_lowercase(), label))
        .collect();

    for entity in catalog.entities.values() {
        let Some(name) = entity.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
            continue;
        };
        for address in entity.addresses.keys() {
            catalog
                .entity_name_by_address
                .insert(address.to_lowercase(), name.to_string());
        }
    }

    for (asset, record) in prices.unwrap_or_default() {
        let price = match &record.price {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        if let Some(price) = price.filter(|p: &f64| p.is_finite()) {
            catalog.prices.insert(asset.to_lowercase(), price);
        }
    }

    for (liability, collaterals) in open_interest.unwrap_or_default() {
        let collaterals = collaterals
            .into_iter()
            .map(|(address, usd)| (address.to_lowercase(), usd))
            .collect();
        catalog.open_interest.insert(liability.to_lowercase(), collaterals);
    }

    // Only the EVK vaults something points at: open-interest liabilities and
    // their collateral, plus every Earn strategy.
    let mut ids: Vec<String> = catalog
        .open_interest
        .iter()
        .flat_map(|(liability, collaterals)| {
            std::iter::once(liability.clone()).chain(collaterals.keys().cloned())
        })
        .chain(
            catalog
                .earn_vaults
                .iter()
                .flat_map(|v| v.strategies.iter().map(|s| s.strategy.to_lowercase())),
        )
        .collect();
    ids.sort();
    ids.dedup();

    for vault in fetch_evk_vaults(fetcher, &subgraph_url, &ids).await? {
        catalog.evk_vaults.insert(vault.id.to_lowercase(), vault);
    }

    debug!(
        chain = %chain.chain_key,
        earn = catalog.earn_vaults.len(),
        evk = catalog.evk_vaults.len(),
        "fetched euler chain catalog"
    );
    Ok(catalog)
}

pub struct EulerAdapter {
    config: Arc<EulerConfig>,
    fetcher: Arc<dyn JsonFetcher>,
    max_parallel: usize,
}

impl EulerAdapter {
    pub fn new(config: EulerConfig, fetcher: Arc<dyn JsonFetcher>) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            max_parallel: 4,
        }
    }

    /// Limit how many chains are fetched at once
    pub fn with_max_parallel(mut self, limit: usize) -> Self {
        self.max_parallel = limit.max(1);
        self
    }
}

#[async_trait]
impl ProtocolAdapter for EulerAdapter {
    type Catalog = Vec<Arc<ChainCatalog>>;
    type Allocation = EulerAllocation;

    fn id(&self) -> &str {
        PROTOCOL
    }

    async fn fetch_catalog(&self) -> Result<Self::Catalog, AdapterError> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut tasks = JoinSet::new();

        for (index, chain) in self.config.chains.iter().cloned().enumerate() {
            let semaphore = semaphore.clone();
            let fetcher = self.fetcher.clone();
            let config = self.config.clone();
            tasks.spawn(async move {
                let key = chain.chain_key.clone();
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => fetch_chain(fetcher, config, chain).await,
                    Err(e) => Err(AdapterError::Internal(format!("semaphore error: {e}"))),
                };
                (index, key, result)
            });
        }

        let mut settled = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => settled.push(outcome),
                Err(e) => settled.push((
                    usize::MAX,
                    "task".to_string(),
                    Err(AdapterError::Internal(format!("chain task failed: {e}"))),
                )),
            }
        }
        // Keep configuration order regardless of completion order.
        settled.sort_by_key(|(index, _, _)| *index);

        let catalogs = settle_all(
            PROTOCOL,
            settled
                .into_iter()
                .map(|(_, key, result)| (key, result.map(Arc::new))),
        )?;
        info!(chains = catalogs.len(), "euler catalogs fetched");
        Ok(catalogs)
    }

    fn asset_allocations(&self, catalog: &Self::Catalog) -> BTreeMap<AssetKey, Vec<EulerAllocation>> {
        let mut grouped = BTreeMap::new();

        for chain in catalog {
            for vault in &chain.earn_vaults {
                if vault.strategies.is_empty() {
                    continue;
                }
                grouped.insert(
                    chain.node_id(&vault.id).to_string(),
                    vec![EulerAllocation::Earn {
                        chain: chain.clone(),
                        vault: vault.clone(),
                    }],
                );
            }

            for (liability, collateral) in &chain.open_interest {
                let Some(vault) = chain.evk(liability) else {
                    debug!(chain = %chain.chain_key, %liability, "no vault state, skipping market");
                    continue;
                };
                grouped.insert(
                    chain.node_id(&vault.id).to_string(),
                    vec![EulerAllocation::Evk {
                        chain: chain.clone(),
                        vault: vault.clone(),
                        collateral: collateral.clone(),
                    }],
                );
            }
        }
        grouped
    }

    fn build_root_node(&self, _asset: &str, allocations: &[EulerAllocation]) -> Option<Node> {
        match allocations.first()? {
            EulerAllocation::Earn { chain, vault } => {
                let decimals = chain.earn_decimals(vault);
                let tvl = chain
                    .price(&vault.asset)
                    .and_then(|price| token_usd(&vault.total_assets, decimals, price));

                // Earn APY: supply APY of each strategy weighted by what is allocated to it.
                let (weighted, total) = vault
                    .strategies
                    .iter()
                    .filter_map(|s| {
                        let apy = chain.evk(&s.strategy)?.supply_apy()?;
                        let allocated = scale_by_decimals(&s.allocated_assets, decimals)?;
                        Some((apy * allocated, allocated))
                    })
                    .fold((0.0, 0.0), |(w, t), (a, b)| (w + a, t + b));
                let apy = (total > 0.0).then(|| weighted / total);

                Some(
                    Node::new(chain.node_id(&vault.id), chain.chain_key.clone(), chain.display_name(&vault.id, &vault.name))
                        .with_protocol(PROTOCOL)
                        .with_details(NodeDetails::with_kind("Yield").curator(chain.earn_curator(vault)))
                        .with_tvl(tvl)
                        .with_apy(apy),
                )
            }
            EulerAllocation::Evk { chain, vault, .. } => {
                let tvl = chain.price(&vault.asset).and_then(|price| {
                    let state = vault.state.clone().unwrap_or_default();
                    let cash = scale_by_decimals(state.cash.as_deref().unwrap_or("0"), vault.decimals)?;
                    let borrows =
                        scale_by_decimals(state.total_borrows.as_deref().unwrap_or("0"), vault.decimals)?;
                    Some(round_to_two_decimals((cash + borrows) * price))
                });
                Some(chain.vault_node(vault).with_tvl(tvl))
            }
        }
    }

    fn normalize_leaves(&self, root: &Node, allocations: &[EulerAllocation]) -> Leaves {
        let mut leaves = Leaves::default();

        match allocations.first() {
            Some(EulerAllocation::Earn { chain, vault }) => {
                let decimals = chain.earn_decimals(vault);
                let price = chain.price(&vault.asset);

                for strategy in &vault.strategies {
                    let Some(evk) = chain.evk(&strategy.strategy) else {
                        debug!(strategy = %strategy.strategy, "strategy vault unknown, dropping leaf");
                        continue;
                    };
                    let Some(usd) = price.and_then(|p| token_usd(&strategy.allocated_assets, decimals, p)) else {
                        debug!(vault = %vault.id, asset = %vault.asset, "no price, dropping leaf");
                        continue;
                    };
                    let leaf = chain.vault_node(evk);
                    let edge = self.build_edge(root, &leaf, usd);
                    leaves.push(leaf, edge);
                }
            }
            Some(EulerAllocation::Evk { chain, collateral, .. }) => {
                for (address, usd) in collateral {
                    let Some(evk) = chain.evk(address) else {
                        debug!(collateral = %address, "collateral vault unknown, dropping leaf");
                        continue;
                    };
                    let leaf = chain.vault_node(evk);
                    let edge = self.build_edge(root, &leaf, round_to_two_decimals(*usd));
                    leaves.push(leaf, edge);
                }
            }
            None => {}
        }
        leaves
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::fetch::FixtureFetcher;

    const EARN: &str = "0xEa00000000000000000000000000000000000001";
    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
    const WETH: &str = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2";
    const EVK_USDC: &str = "0xe000000000000000000000000000000000000001";
    const EVK_USDC_2: &str = "0xe000000000000000000000000000000000000002";
    const EVK_WETH: &str = "0xe000000000000000000000000000000000000003";

    fn config() -> EulerConfig {
        EulerConfig {
            chains: vec![
                EulerChain {
                    chain_id: 1,
                    chain_key: "eth".into(),
                    subgraph_network: "mainnet".into(),
                },
                EulerChain {
                    chain_id: 8453,
                    chain_key: "base".into(),
                    subgraph_network: "base".into(),
                },
            ],
            ..EulerConfig::default()
        }
    }

    fn mainnet(fetcher: FixtureFetcher) -> FixtureFetcher {
        let config = config();
        let chain = &config.chains[0];
        let subgraph = config.subgraph_url(chain);
        fetcher
            .with_graphql(
                &subgraph,
                "eulerEarnVaults",
                json!({"eulerEarnVaults": [
                    {
                        "id": EARN, "name": "onchain earn", "symbol": "eUSDC", "asset": USDC,
                        "curator": "0xCURATOR", "totalAssets": "3000000000",
                        "strategies": [
                            {"strategy": EVK_USDC, "allocatedAssets": "2000000000"},
                            {"strategy": EVK_USDC_2, "allocatedAssets": "1000000000"}
                        ]
                    },
                    {
                        "id": "0xea00000000000000000000000000000000000002", "name": "idle",
                        "asset": USDC, "curator": null, "totalAssets": "0", "strategies": []
                    }
                ]}),
            )
            .with_graphql(
                &subgraph,
                "eulerVaults",
                json!({"eulerVaults": [
                    {"id": EVK_USDC, "name": "EVK USDC", "asset": USDC, "decimals": "6",
                     "state": {"totalBorrows": "500000000", "cash": "1500000000",
                               "supplyApy": "40000000000000000000000000"}},
                    {"id": EVK_USDC_2, "name": "EVK USDC 2", "asset": USDC, "decimals": 6,
                     "state": {"totalBorrows": "0", "cash": "0",
                               "supplyApy": "10000000000000000000000000"}},
                    {"id": EVK_WETH, "name": "EVK WETH", "asset": WETH, "decimals": 18, "state": null}
                ]}),
            )
            .with_get(
                &config.labels_vaults_url(1),
                json!({
                    EARN: {"name": "Prime USDC"},
                    EVK_USDC: {"name": "Euler Prime USDC", "entity": ["gauntlet", "euler-dao"]},
                    EVK_WETH: {"name": "Prime WETH", "entity": "unknown-curator"}
                }),
            )
            .with_get(
                &config.labels_entities_url(1),
                json!({
                    "gauntlet": {"name": "Gauntlet", "addresses": {"0xcurator": "multisig"}},
                    "euler-dao": {"name": " Euler DAO "}
                }),
            )
            .with_get(&config.price_url(1), json!({ USDC: {"price": 1.0}, WETH: {"price": "2500"} }))
            .with_get(
                &config.open_interest_url(1),
                json!({ EVK_USDC: { EVK_WETH: 1234.567 } }),
            )
    }

    fn adapter(fetcher: FixtureFetcher) -> EulerAdapter {
        EulerAdapter::new(config(), Arc::new(fetcher)).with_max_parallel(2)
    }

    #[tokio::test]
    async fn failed_chain_is_skipped() {
        let config = config();
        let base_subgraph = config.subgraph_url(&config.chains[1]);
        let fetcher = mainnet(FixtureFetcher::in_memory()).with_failure(&base_subgraph);
        let catalog = adapter(fetcher).fetch_catalog().await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].chain_key, "eth");
        assert_eq!(catalog[0].evk_vaults.len(), 3);
    }

    #[tokio::test]
    async fn all_chains_failing_is_an_error() {
        let config = config();
        let fetcher = FixtureFetcher::in_memory()
            .with_failure(&config.subgraph_url(&config.chains[0]))
            .with_failure(&config.subgraph_url(&config.chains[1]));
        let err = adapter(fetcher).fetch_catalog().await.unwrap_err();
        assert!(matches!(err, AdapterError::NoCatalog { ref adapter, .. } if adapter == "euler"));
    }

    #[tokio::test]
    async fn earn_vault_root_and_strategy_leaves() {
        let config = config();
        let base_subgraph = config.subgraph_url(&config.chains[1]);
        let adapter = adapter(mainnet(FixtureFetcher::in_memory()).with_failure(&base_subgraph));
        let catalog = adapter.fetch_catalog().await.unwrap();
        let grouped = adapter.asset_allocations(&catalog);

        let key = format!("eth:euler:{}", EARN.to_lowercase());
        // The idle vault without strategies is not an asset.
        assert!(grouped.contains_key(&key));
        assert!(!grouped.contains_key("eth:euler:0xea00000000000000000000000000000000000002"));

        let root = adapter.build_root_node(&key, &grouped[&key]).unwrap();
        assert_eq!(root.id.as_str(), key);
        assert_eq!(root.name, "Prime USDC");
        assert_eq!(root.curator(), Some("Gauntlet"));
        assert_eq!(root.tvl_usd, Some(3000.0));
        // (0.04 * 2000 + 0.01 * 1000) / 3000
        let apy = root.apy.unwrap();
        assert!((apy - 0.03).abs() < 1e-9);

        let leaves = adapter.normalize_leaves(&root, &grouped[&key]);
        assert_eq!(leaves.nodes.len(), 2);
        assert_eq!(leaves.nodes[0].name, "Euler Prime USDC");
        assert_eq!(leaves.nodes[0].curator(), Some("Gauntlet, Euler DAO"));
        assert_eq!(leaves.nodes[0].type_label(), "Lending Market");
        assert_eq!(leaves.edges[0].allocation_usd, 2000.0);
        assert_eq!(leaves.edges[1].allocation_usd, 1000.0);
    }

    #[tokio::test]
    async fn evk_market_fans_out_to_collateral() {
        let config = config();
        let base_subgraph = config.subgraph_url(&config.chains[1]);
        let adapter = adapter(mainnet(FixtureFetcher::in_memory()).with_failure(&base_subgraph));
        let catalog = adapter.fetch_catalog().await.unwrap();
        let grouped = adapter.asset_allocations(&catalog);

        let key = format!("eth:euler:{EVK_USDC}");
        let root = adapter.build_root_node(&key, &grouped[&key]).unwrap();
        assert_eq!(root.tvl_usd, Some(2000.0));
        assert!((root.apy.unwrap() - 0.04).abs() < 1e-12);
        assert_eq!(root.type_label(), "Lending Market");

        let leaves = adapter.normalize_leaves(&root, &grouped[&key]);
        assert_eq!(leaves.nodes.len(), 1);
        assert_eq!(leaves.nodes[0].id.as_str(), format!("eth:euler:{EVK_WETH}"));
        // Unknown entity ids fall back to the id itself.
        assert_eq!(leaves.nodes[0].curator(), Some("unknown-curator"));
        assert_eq!(leaves.nodes[0].apy, None);
        assert_eq!(leaves.edges[0].allocation_usd, 1234.57);
    }

    #[tokio::test]
    async fn missing_price_drops_leaf_and_tvl() {
        let config = config();
        let base_subgraph = config.subgraph_url(&config.chains[1]);
        let fetcher = mainnet(FixtureFetcher::in_memory())
            .with_failure(&base_subgraph)
            .with_get(&config.price_url(1), json!({}));
        let adapter = adapter(fetcher);
        let catalog = adapter.fetch_catalog().await.unwrap();
        let grouped = adapter.asset_allocations(&catalog);

        let key = format!("eth:euler:{}", EARN.to_lowercase());
        let root = adapter.build_root_node(&key, &grouped[&key]).unwrap();
        assert_eq!(root.tvl_usd, None);
        assert!(adapter.normalize_leaves(&root, &grouped[&key]).is_empty());
    }
}
