//! JSON transport for adapters
//!
//! Adapters never talk to `reqwest` directly; they go through [`JsonFetcher`]
//! so catalogs can be built from recorded fixture payloads as well as from
//! live endpoints.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors from a single upstream request
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cannot build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("cannot decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("graphql error from {url}: {message}")]
    GraphQl { url: String, message: String },

    #[error("environment variable {0} is not set")]
    MissingCredential(String),

    #[error("cannot read fixture {path}: {source}")]
    Fixture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Minimal JSON-over-HTTP capability used by adapters.
#[async_trait]
pub trait JsonFetcher: Send + Sync {
    /// GET a JSON document. A 404 yields `Ok(None)`.
    async fn get_json(&self, url: &str, headers: &[(&str, &str)]) -> Result<Option<Value>, FetchError>;

    /// POST a GraphQL document and return the raw response body.
    async fn post_graphql(&self, url: &str, query: &str, variables: &Value) -> Result<Value, FetchError>;
}

/// GET and deserialize. A 404 yields `Ok(None)`.
pub async fn get_typed<T: DeserializeOwned>(
    fetcher: &dyn JsonFetcher,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<Option<T>, FetchError> {
    match fetcher.get_json(url, headers).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| FetchError::Decode {
                url: url.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Run a GraphQL query and deserialize its `data` member.
pub async fn graphql<T: DeserializeOwned>(
    fetcher: &dyn JsonFetcher,
    url: &str,
    query: &str,
    variables: Value,
) -> Result<T, FetchError> {
    let body = fetcher.post_graphql(url, query, &variables).await?;

    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let message = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(FetchError::GraphQl {
                url: url.to_string(),
                message,
            });
        }
    }

    let data = body.get("data").cloned().unwrap_or(Value::Null);
    serde_json::from_value(data).map_err(|source| FetchError::Decode {
        url: url.to_string(),
        source,
    })
}

/// Live fetcher backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn read_json(url: &str, response: reqwest::Response) -> Result<Value, FetchError> {
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl JsonFetcher for HttpFetcher {
    async fn get_json(&self, url: &str, headers: &[(&str, &str)]) -> Result<Option<Value>, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(url, "upstream returned 404");
            return Ok(None);
        }
        Self::read_json(url, response).await.map(Some)
    }

    async fn post_graphql(&self, url: &str, query: &str, variables: &Value) -> Result<Value, FetchError> {
        let response = self
            .client
            .post(url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        Self::read_json(url, response).await
    }
}

/// First field selected by a GraphQL document, e.g. `eulerVaults`.
fn graphql_operation(query: &str) -> &str {
    query
        .split_once('{')
        .map(|(_, rest)| rest.trim_start())
        .map(|rest| {
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            &rest[..end]
        })
        .unwrap_or("")
}

/// File name a recorded payload is stored under.
///
/// The scheme is dropped, every character outside `[A-Za-z0-9._-]` becomes
/// `_`, and GraphQL payloads get the operation name appended.
pub fn fixture_key(url: &str, operation: Option<&str>) -> String {
    let bare = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    let mut key: String = bare
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-') { c } else { '_' })
        .collect();
    if let Some(op) = operation.filter(|op| !op.is_empty()) {
        key.push_str("__");
        key.push_str(op);
    }
    key.push_str(".json");
    key
}

/// Offline fetcher serving recorded payloads.
///
/// Payloads come either from a directory of files named by [`fixture_key`]
/// or from values registered in memory. A missing payload reads as 404.
#[derive(Debug, Default)]
pub struct FixtureFetcher {
    dir: Option<PathBuf>,
    payloads: HashMap<String, Value>,
    failing: HashSet<String>,
}

impl FixtureFetcher {
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: Some(dir.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Register a GET payload.
    pub fn with_get(mut self, url: &str, payload: Value) -> Self {
        self.payloads.insert(fixture_key(url, None), payload);
        self
    }

    /// Register a GraphQL payload (`{"data": ...}`) for an operation.
    pub fn with_graphql(mut self, url: &str, operation: &str, data: Value) -> Self {
        self.payloads
            .insert(fixture_key(url, Some(operation)), json!({ "data": data }));
        self
    }

    /// Make every request to `url` fail with a 500.
    pub fn with_failure(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    fn lookup(&self, url: &str, key: &str) -> Result<Option<Value>, FetchError> {
        if self.failing.contains(url) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 500,
            });
        }
        if let Some(value) = self.payloads.get(key) {
            return Ok(Some(value.clone()));
        }
        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        let path = dir.join(key);
        match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|source| FetchError::Decode {
                    url: url.to_string(),
                    source,
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no fixture recorded");
                Ok(None)
            }
            Err(source) => Err(FetchError::Fixture { path, source }),
        }
    }
}

#[async_trait]
impl JsonFetcher for FixtureFetcher {
    async fn get_json(&self, url: &str, _headers: &[(&str, &str)]) -> Result<Option<Value>, FetchError> {
        self.lookup(url, &fixture_key(url, None))
    }

    async fn post_graphql(&self, url: &str, query: &str, _variables: &Value) -> Result<Value, FetchError> {
        let key = fixture_key(url, Some(graphql_operation(query)));
        self.lookup(url, &key)?.ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}
