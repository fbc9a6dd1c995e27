//! Adapter registry: protocol id → adapter
//!
//! Dispatch is by iteration over registered adapters, in registration
//! order. Registering a second adapter with an id already present is a
//! no-op.

use super::ethena::EthenaAdapter;
use super::euler::EulerAdapter;
use super::fetch::{FetchError, FixtureFetcher, HttpFetcher, JsonFetcher};
use super::resolv::ResolvAdapter;
use super::traits::AssetSource;
use crate::config::ExposureConfig;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn AssetSource>>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry").field("ids", &self.ids()).finish()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter. Returns false when its id is already taken.
    pub fn register(&mut self, adapter: Arc<dyn AssetSource>) -> bool {
        if self.get(adapter.id()).is_some() {
            return false;
        }
        self.adapters.push(adapter);
        true
    }

    pub fn with(mut self, adapter: impl AssetSource + 'static) -> Self {
        self.register(Arc::new(adapter));
        self
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn AssetSource>> {
        self.adapters.iter().find(|a| a.id().eq_ignore_ascii_case(id))
    }

    /// Registered ids in registration order
    pub fn ids(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.id()).collect()
    }

    pub fn adapters(&self) -> &[Arc<dyn AssetSource>] {
        &self.adapters
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Adapters for the requested ids, in request order.
    ///
    /// Unknown ids are returned as the error.
    pub fn select(&self, ids: &[String]) -> Result<Vec<Arc<dyn AssetSource>>, Vec<String>> {
        let mut selected = Vec::with_capacity(ids.len());
        let mut unknown = Vec::new();
        for id in ids {
            match self.get(id) {
                Some(adapter) => selected.push(adapter.clone()),
                None => unknown.push(id.clone()),
            }
        }
        if unknown.is_empty() {
            Ok(selected)
        } else {
            Err(unknown)
        }
    }

    /// Every adapter, sorted by id.
    pub fn sorted(&self) -> Vec<Arc<dyn AssetSource>> {
        let mut all = self.adapters.clone();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    /// The built-in adapters wired to `fetcher`.
    pub fn builtin(config: &ExposureConfig, fetcher: Arc<dyn JsonFetcher>) -> Self {
        let resolv = ResolvAdapter::new(config.resolv.clone(), fetcher.clone());
        let resolv = if config.fixtures_dir.is_some() {
            resolv.without_access_key()
        } else {
            resolv
        };
        Self::new()
            .with(EthenaAdapter::new(config.ethena.clone(), fetcher.clone()))
            .with(
                EulerAdapter::new(config.euler.clone(), fetcher)
                    .with_max_parallel(config.max_parallel_fetches),
            )
            .with(resolv)
    }

    /// Built-in adapters reading from fixtures when `fixtures_dir` is set,
    /// otherwise from the network.
    pub fn from_config(config: &ExposureConfig) -> Result<Self, FetchError> {
        let fetcher: Arc<dyn JsonFetcher> = match &config.fixtures_dir {
            Some(dir) => Arc::new(FixtureFetcher::from_dir(dir)),
            None => Arc::new(HttpFetcher::new(&config.user_agent)?),
        };
        Ok(Self::builtin(config, fetcher))
    }
}
