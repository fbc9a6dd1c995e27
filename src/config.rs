//! Runtime configuration
//!
//! Loaded from YAML. Every field has a default so an empty file, or no file
//! at all, yields a working configuration against the public endpoints.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExposureConfig {
    /// Where snapshots and the search index are written
    pub output_dir: PathBuf,
    /// Upper bound on concurrent catalog fetches (adapters, chains, wallets)
    pub max_parallel_fetches: usize,
    pub user_agent: String,
    /// When set, provider payloads are read from this directory instead of the network
    pub fixtures_dir: Option<PathBuf>,
    pub ethena: EthenaConfig,
    pub euler: EulerConfig,
    pub resolv: ResolvConfig,
    pub explorer: ExplorerConfig,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("fixtures/output"),
            max_parallel_fetches: 4,
            user_agent: format!("exposure-graph/{}", env!("CARGO_PKG_VERSION")),
            fixtures_dir: None,
            ethena: EthenaConfig::default(),
            euler: EulerConfig::default(),
            resolv: ResolvConfig::default(),
            explorer: ExplorerConfig::default(),
        }
    }
}

impl ExposureConfig {
    /// Parse a config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Explicit path if given, else `<config dir>/exposure/config.yaml` when it exists, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }
}

/// Default config location (~/.config/exposure/config.yaml on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("exposure").join("config.yaml"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EthenaConfig {
    /// USDe/sUSDe supply and price
    pub chain_metrics_url: String,
    /// Backing collateral by exchange and asset
    pub collateral_metrics_url: String,
    /// sUSDe staking yield
    pub yield_url: String,
}

impl Default for EthenaConfig {
    fn default() -> Self {
        Self {
            chain_metrics_url: "https://app.ethena.fi/api/solvency/chain-metrics".into(),
            collateral_metrics_url: "https://app.ethena.fi/api/positions/current/collateral".into(),
            yield_url: "https://ethena.fi/api/yields/protocol-and-staking-yield".into(),
        }
    }
}

/// One chain Euler is deployed on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EulerChain {
    pub chain_id: u64,
    /// Canonical chain slug used in node ids
    pub chain_key: String,
    /// Network name in the subgraph URL
    pub subgraph_network: String,
}

impl EulerChain {
    fn new(chain_id: u64, chain_key: &str, subgraph_network: &str) -> Self {
        Self {
            chain_id,
            chain_key: chain_key.into(),
            subgraph_network: subgraph_network.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EulerConfig {
    pub subgraph_base_url: String,
    pub labels_base_url: String,
    pub indexer_base_url: String,
    pub app_base_url: String,
    pub chains: Vec<EulerChain>,
}

impl EulerConfig {
    pub fn subgraph_url(&self, chain: &EulerChain) -> String {
        format!(
            "{}/euler-v2-{}/latest/gn",
            self.subgraph_base_url.trim_end_matches('/'),
            chain.subgraph_network
        )
    }

    pub fn labels_vaults_url(&self, chain_id: u64) -> String {
        format!("{}/{}/vaults.json", self.labels_base_url.trim_end_matches('/'), chain_id)
    }

    pub fn labels_entities_url(&self, chain_id: u64) -> String {
        format!("{}/{}/entities.json", self.labels_base_url.trim_end_matches('/'), chain_id)
    }

    pub fn open_interest_url(&self, chain_id: u64) -> String {
        format!(
            "{}/v1/vault/open-interest?chainId={}",
            self.indexer_base_url.trim_end_matches('/'),
            chain_id
        )
    }

    pub fn price_url(&self, chain_id: u64) -> String {
        format!("{}/api/v1/price?chainId={}", self.app_base_url.trim_end_matches('/'), chain_id)
    }
}

impl Default for EulerConfig {
    fn default() -> Self {
        Self {
            subgraph_base_url:
                "https://api.goldsky.com/api/public/project_cm4iagnemt1wp01xn4gh1agft/subgraphs"
                    .into(),
            labels_base_url: "https://raw.githubusercontent.com/euler-xyz/euler-labels/master".into(),
            indexer_base_url: "https://indexer-main.euler.finance".into(),
            app_base_url: "https://app.euler.finance".into(),
            chains: vec![
                EulerChain::new(1, "eth", "mainnet"),
                EulerChain::new(8453, "base", "base"),
                EulerChain::new(1923, "swell", "swell"),
                EulerChain::new(146, "sonic", "sonic"),
                EulerChain::new(60808, "bob", "bob"),
                EulerChain::new(80094, "bera", "berachain"),
                EulerChain::new(43114, "avax", "avalanche"),
                EulerChain::new(42161, "arb", "arbitrum"),
                EulerChain::new(130, "uni", "unichain"),
                EulerChain::new(57073, "ink", "ink"),
                EulerChain::new(56, "bsc", "bsc"),
                EulerChain::new(999, "hyperevm", "hyperevm"),
                EulerChain::new(10, "op", "optimism"),
                EulerChain::new(100, "gnosis", "gnosis"),
                EulerChain::new(480, "worldchain", "worldchain"),
                EulerChain::new(239, "tac", "tac"),
                EulerChain::new(9745, "plasma", "plasma"),
                EulerChain::new(5000, "mantle", "mantle"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolvConfig {
    pub debank_base_url: String,
    /// Environment variable holding the DeBank access key
    pub access_key_env: String,
    /// Treasury wallets whose protocol positions back USR
    pub wallets: Vec<String>,
}

impl Default for ResolvConfig {
    fn default() -> Self {
        Self {
            debank_base_url: "https://pro-openapi.debank.com".into(),
            access_key_env: "DEBANK_ACCESS_KEY".into(),
            wallets: Vec::new(),
        }
    }
}

impl ResolvConfig {
    pub fn positions_url(&self, wallet: &str) -> String {
        format!(
            "{}/v1/user/all_complex_protocol_list?id={}",
            self.debank_base_url.trim_end_matches('/'),
            wallet.trim().to_lowercase()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExplorerConfig {
    /// Base URL serving `/graph/{id}` and `/search-index`
    pub api_base_url: String,
    /// Target minimum treemap tile area in px²
    pub min_tile_area_px: f64,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api".into(),
            min_tile_area_px: 2800.0,
        }
    }
}
