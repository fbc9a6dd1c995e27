//! Pipeline tests: adapters through orchestration, persistence and indexing,
//! all against recorded provider payloads.

use super::ethena::{SUSDE_ROOT_ID, USDE_ROOT_ID};
use super::resolv::USR_ROOT_ID;
use super::{AdapterRegistry, EthenaAdapter, EulerAdapter, FixtureFetcher, JsonFetcher, ResolvAdapter};
use crate::config::{EulerChain, ExposureConfig, ResolvConfig};
use crate::index::{rebuild_search_index, RootIdSet, SearchQuery};
use crate::orchestrator::{build_draft_graphs_by_asset, persist_build};
use crate::storage::{FileSnapshotStore, OpenStore, SnapshotStore};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

const TREASURY: &str = "0x1111000000000000000000000000000000000001";

fn config() -> ExposureConfig {
    let mut config = ExposureConfig::default();
    config.resolv = ResolvConfig {
        wallets: vec![TREASURY.into()],
        ..ResolvConfig::default()
    };
    config.euler.chains = vec![EulerChain {
        chain_id: 1,
        chain_key: "eth".into(),
        subgraph_network: "mainnet".into(),
    }];
    config
}

fn fixtures(config: &ExposureConfig) -> FixtureFetcher {
    FixtureFetcher::in_memory()
        .with_get(
            &config.ethena.chain_metrics_url,
            json!({"latest": {"data": {
                "totalUsdeSupply": "5000000000000000000000000",
                "usdePrice": 1.0,
                "totalSusdeSupply": "2000000000000000000000000",
                "susdePrice": 1.15
            }}}),
        )
        .with_get(
            &config.ethena.collateral_metrics_url,
            json!({"latest": {"data": {"collateral": [
                {"exchange": "Binance", "asset": "BTC", "usdAmount": 3000000},
                {"exchange": "Bybit", "asset": "ETH", "usdAmount": 1500000}
            ]}}}),
        )
        .with_get(&config.ethena.yield_url, json!({"stakingYield": {"value": 6.2}}))
        .with_get(
            &config.resolv.positions_url(TREASURY),
            json!([{
                "id": "ethena", "chain": "eth", "name": "Ethena",
                "portfolio_item_list": [{
                    "name": "Staked",
                    "stats": {"net_usd_value": 900000.0},
                    "pool": {"id": SUSDE_ROOT_ID.rsplit(':').next()},
                    "detail": {}
                }]
            }]),
        )
}

async fn build_into(dir: &TempDir) -> (FileSnapshotStore, crate::orchestrator::BuildReport) {
    let config = config();
    let fetcher: Arc<dyn JsonFetcher> = Arc::new(fixtures(&config));
    let registry = AdapterRegistry::new()
        .with(EthenaAdapter::new(config.ethena.clone(), fetcher.clone()))
        .with(EulerAdapter::new(config.euler.clone(), fetcher.clone()))
        .with(ResolvAdapter::new(config.resolv.clone(), fetcher).without_access_key());
    let store = FileSnapshotStore::open(dir.path()).unwrap();

    let build = build_draft_graphs_by_asset(registry.adapters(), config.max_parallel_fetches).await;
    let report = build.report.clone();
    persist_build(&store, build).unwrap();
    (store, report)
}

#[tokio::test]
async fn unreachable_protocol_does_not_block_the_others() {
    let dir = TempDir::new().unwrap();
    let (_, report) = build_into(&dir).await;

    assert_eq!(report.succeeded, vec!["ethena", "resolv"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "euler");
    assert_eq!(report.assets_built, 3);
}

#[tokio::test]
async fn snapshots_and_aliases_land_on_disk() {
    let dir = TempDir::new().unwrap();
    let (store, _) = build_into(&dir).await;

    let usde = store.load_snapshot(USDE_ROOT_ID, Some("ethena")).unwrap().unwrap();
    assert_eq!(usde.nodes[0].id.as_str(), USDE_ROOT_ID);
    assert_eq!(usde.nodes[0].tvl_usd, Some(5_000_000.0));
    assert_eq!(usde.edges.len(), 2);
    assert_eq!(usde.sources, vec!["ethena"]);

    let arb = store
        .load_snapshot("arb:ethena:0x5d3a1ff2b6bab83b63cd9ad0787074081a52ef34", None)
        .unwrap()
        .unwrap();
    assert_eq!(arb.nodes[0].chain, "arb");
    assert_eq!(arb.nodes[0].tvl_usd, usde.nodes[0].tvl_usd);
    assert!(arb.edges.iter().all(|e| e.from == arb.nodes[0].id));

    let usr = store.load_snapshot(USR_ROOT_ID, Some("resolv")).unwrap().unwrap();
    assert!(usr.edges.iter().any(|e| e.to.matches(SUSDE_ROOT_ID)));
    assert!(store
        .contains_snapshot("base:resolv:0x35e5db674d8e93a03d814fa0ada70731efe8a4b9", Some("resolv"))
        .unwrap());
}

#[tokio::test]
async fn index_covers_every_persisted_root() {
    let dir = TempDir::new().unwrap();
    let (store, _) = build_into(&dir).await;

    let count = rebuild_search_index(&store).unwrap();
    let entries = store.load_search_index().unwrap().unwrap();
    assert_eq!(entries.len(), count);
    assert_eq!(entries.len(), store.list_snapshots().unwrap().len());

    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);

    let susde = entries
        .iter()
        .find(|e| e.id.matches(SUSDE_ROOT_ID))
        .unwrap();
    assert_eq!(susde.protocol, "ethena");
    assert_eq!(susde.apy, Some(6.2));
    assert_eq!(susde.logo_keys.as_deref(), Some(&["sUSDe".to_string()][..]));

    let roots = RootIdSet::from_entries(&entries);
    assert!(roots.contains(SUSDE_ROOT_ID));
    assert!(roots.contains("ARB:ETHENA:0x5d3a1ff2b6bab83b63cd9ad0787074081a52ef34"));

    let on_arbitrum = SearchQuery::new().with_chain("arb").with_protocol("ethena").apply(&entries);
    assert_eq!(on_arbitrum.len(), 2);
}
