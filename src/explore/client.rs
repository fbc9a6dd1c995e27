//! Snapshot retrieval for the exploration client
//!
//! The explorer only ever needs three things from the outside world: a
//! snapshot, a cheap "does a snapshot exist for this id" probe, and the
//! search index. [`SnapshotSource`] covers exactly those.

use crate::adapter::FetchError;
use crate::graph::{normalize_node_id, GraphSnapshot};
use crate::index::{build_from_store, SearchIndexEntry};
use crate::storage::{FileSnapshotStore, SnapshotStore, StorageError};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid api url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// What to load: an id plus the hints carried in the page URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub id: String,
    pub protocol: Option<String>,
    pub chain: Option<String>,
    /// Asset the user started exploring from, for breadcrumbs
    pub origin: Option<String>,
}

impl SnapshotRequest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_protocol(mut self, protocol: Option<String>) -> Self {
        self.protocol = non_blank(protocol);
        self
    }

    pub fn with_chain(mut self, chain: Option<String>) -> Self {
        self.chain = non_blank(chain);
        self
    }

    pub fn with_origin(mut self, origin: Option<String>) -> Self {
        self.origin = non_blank(origin);
        self
    }

    pub fn normalized_id(&self) -> String {
        normalize_node_id(&self.id)
    }

    /// `protocol` and `chain` query pairs, omitting absent hints
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::with_capacity(2);
        if let Some(protocol) = &self.protocol {
            pairs.push(("protocol", protocol.as_str()));
        }
        if let Some(chain) = &self.chain {
            pairs.push(("chain", chain.as_str()));
        }
        pairs
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// `None` when no snapshot exists for the request.
    async fn fetch_snapshot(&self, request: &SnapshotRequest) -> ClientResult<Option<GraphSnapshot>>;

    /// Existence check only; never transfers the snapshot.
    async fn probe_snapshot(&self, request: &SnapshotRequest) -> ClientResult<bool>;

    async fn fetch_search_index(&self) -> ClientResult<Vec<SearchIndexEntry>>;
}

/// Reads snapshots from the HTTP API
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSnapshotSource {
    pub fn new(base_url: impl Into<String>, user_agent: &str) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let invalid = |reason: String| ClientError::InvalidUrl {
            url: self.base_url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `{base}/graph/{normalized id}`; the id is percent-encoded as one segment.
    pub fn graph_url(&self, request: &SnapshotRequest) -> ClientResult<Url> {
        self.endpoint(&["graph", &request.normalized_id()])
    }

    /// Graph URL for a HEAD existence check, with `origin` alongside the routing hints.
    pub fn existence_check_url(&self, request: &SnapshotRequest) -> ClientResult<Url> {
        let mut url = self.graph_url(request)?;
        let mut pairs = request.query_pairs();
        if let Some(origin) = &request.origin {
            pairs.push(("origin", origin.as_str()));
        }
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    pub fn search_index_url(&self) -> ClientResult<Url> {
        self.endpoint(&["search-index"])
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> ClientResult<Option<T>> {
        let shown = url.to_string();
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: shown.clone(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: shown,
                status: status.as_u16(),
            }
            .into());
        }
        let bytes = response.bytes().await.map_err(|source| FetchError::Transport {
            url: shown.clone(),
            source,
        })?;
        let value = serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode { url: shown, source })?;
        Ok(Some(value))
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch_snapshot(&self, request: &SnapshotRequest) -> ClientResult<Option<GraphSnapshot>> {
        let url = self.graph_url(request)?;
        self.get_json(url, &request.query_pairs()).await
    }

    async fn probe_snapshot(&self, request: &SnapshotRequest) -> ClientResult<bool> {
        let url = self.existence_check_url(request)?;
        let shown = url.to_string();
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport { url: shown.clone(), source })?;
        debug!(url = %shown, status = response.status().as_u16(), "probed snapshot");
        Ok(response.status().is_success())
    }

    async fn fetch_search_index(&self) -> ClientResult<Vec<SearchIndexEntry>> {
        let url = self.search_index_url()?;
        Ok(self.get_json(url, &[]).await?.unwrap_or_default())
    }
}

/// Reads snapshots straight from a build output directory
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    store: FileSnapshotStore,
}

impl FileSnapshotSource {
    pub fn new(store: FileSnapshotStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &FileSnapshotStore {
        &self.store
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    async fn fetch_snapshot(&self, request: &SnapshotRequest) -> ClientResult<Option<GraphSnapshot>> {
        Ok(self
            .store
            .load_snapshot(&request.normalized_id(), request.protocol.as_deref())?)
    }

    async fn probe_snapshot(&self, request: &SnapshotRequest) -> ClientResult<bool> {
        Ok(self
            .store
            .contains_snapshot(&request.normalized_id(), request.protocol.as_deref())?)
    }

    /// Falls back to deriving the index when none has been written yet.
    async fn fetch_search_index(&self) -> ClientResult<Vec<SearchIndexEntry>> {
        match self.store.load_search_index()? {
            Some(entries) => Ok(entries),
            None => {
                debug!(root = %self.store.path().display(), "no search index on disk, deriving one");
                Ok(build_from_store(&self.store)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node};
    use crate::storage::OpenStore;
    use tempfile::TempDir;

    #[test]
    fn graph_url_encodes_the_normalized_id() {
        let source = HttpSnapshotSource::with_client(reqwest::Client::new(), "https://api.example.com/v1/");
        let request = SnapshotRequest::new("  ETH:Euler:0xABC ")
            .with_protocol(Some("euler".into()))
            .with_chain(Some(" ".into()));

        let url = source.graph_url(&request).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/graph/eth:euler:0xabc");
        assert_eq!(request.query_pairs(), vec![("protocol", "euler")]);
        assert_eq!(
            source.search_index_url().unwrap().as_str(),
            "https://api.example.com/v1/search-index"
        );
    }

    #[test]
    fn existence_check_url_carries_origin() {
        let source = HttpSnapshotSource::with_client(reqwest::Client::new(), "https://api.example.com");
        let request = SnapshotRequest::new("eth:ethena:0xsusde")
            .with_protocol(Some("ethena".into()))
            .with_chain(Some("eth".into()))
            .with_origin(Some("eth:resolv:0xusr".into()));
        assert_eq!(
            source.existence_check_url(&request).unwrap().as_str(),
            "https://api.example.com/graph/eth:ethena:0xsusde?protocol=ethena&chain=eth&origin=eth%3Aresolv%3A0xusr"
        );

        let bare = SnapshotRequest::new("eth:ethena:0xsusde");
        assert_eq!(
            source.existence_check_url(&bare).unwrap().as_str(),
            "https://api.example.com/graph/eth:ethena:0xsusde"
        );
    }

    #[test]
    fn bad_base_url_is_reported() {
        let source = HttpSnapshotSource::with_client(reqwest::Client::new(), "not a url");
        assert!(matches!(
            source.graph_url(&SnapshotRequest::new("eth:x:1")),
            Err(ClientError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn file_source_serves_snapshots_and_derives_index() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let snapshot = GraphSnapshot {
            nodes: vec![
                Node::new("eth:ethena:0xusde", "eth", "USDe").with_protocol("ethena"),
                Node::new("global:ethena:binance:btc", "global", "Binance: BTC"),
            ],
            edges: vec![Edge::new("eth:ethena:0xusde", "global:ethena:binance:btc", 10.0)],
            sources: vec!["ethena".into()],
        };
        store.save_snapshot("ethena", &snapshot).unwrap();

        let source = FileSnapshotSource::new(store);
        let request = SnapshotRequest::new("ETH:ETHENA:0xUSDE");
        assert_eq!(source.fetch_snapshot(&request).await.unwrap(), Some(snapshot));
        assert!(source.probe_snapshot(&request).await.unwrap());
        assert!(!source
            .probe_snapshot(&SnapshotRequest::new("global:ethena:binance:btc"))
            .await
            .unwrap());

        let index = source.fetch_search_index().await.unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].name, "USDe");
    }
}
