//! Canonical node identity
//!
//! Ids take the form `<chain>:<protocol>:<address-or-key>`, lowercase and
//! colon-delimited, so independently fetched subgraphs can reference the same
//! entity. Equality across snapshots is case-insensitive.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when an id string cannot be used as a canonical id
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node id is empty")]
    EmptyId,

    #[error("node id contains whitespace: {0:?}")]
    Whitespace(String),

    #[error("node id needs at least <chain>:<protocol> segments: {0:?}")]
    MissingSegments(String),
}

/// Result type for identity operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Trim and lowercase an id for comparison and lookup.
pub fn normalize_node_id(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Lowercase slug: runs of non-alphanumerics collapse into a single `-`.
pub fn slug(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Identifier of a node in a graph snapshot
///
/// Serializes as a plain string. The stored text is kept as given so that
/// snapshots round-trip byte for byte; comparisons that cross snapshot
/// boundaries go through [`NodeId::matches`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Build `<chain>:<protocol>:<key>` with every segment trimmed and lowercased.
    pub fn canonical(chain: &str, protocol: &str, key: &str) -> Self {
        Self(format!(
            "{}:{}:{}",
            normalize_node_id(chain),
            normalize_node_id(protocol),
            normalize_node_id(key)
        ))
    }

    /// Wrap an existing id string without validation.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Validate and normalize an id coming from user input.
    pub fn parse(raw: &str) -> GraphResult<Self> {
        let normalized = normalize_node_id(raw);
        if normalized.is_empty() {
            return Err(GraphError::EmptyId);
        }
        if normalized.chars().any(char::is_whitespace) {
            return Err(GraphError::Whitespace(normalized));
        }
        let segments: Vec<&str> = normalized.split(':').collect();
        if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
            return Err(GraphError::MissingSegments(normalized));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Trimmed, lowercased form used for lookups.
    pub fn normalized(&self) -> String {
        normalize_node_id(&self.0)
    }

    /// Case-insensitive comparison against another id string.
    pub fn matches(&self, other: &str) -> bool {
        normalize_node_id(&self.0) == normalize_node_id(other)
    }

    /// First colon-delimited segment, lowercased.
    pub fn chain(&self) -> Option<String> {
        self.segment(0)
    }

    /// Second colon-delimited segment, lowercased.
    pub fn protocol_segment(&self) -> Option<String> {
        self.segment(1)
    }

    fn segment(&self, index: usize) -> Option<String> {
        self.0
            .split(':')
            .nth(index)
            .map(normalize_node_id)
            .filter(|s| !s.is_empty())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
