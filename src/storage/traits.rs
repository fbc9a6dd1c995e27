//! Storage trait definitions

use crate::graph::{GraphSnapshot, NodeId};
use crate::index::SearchIndexEntry;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid path component: {0:?}")]
    InvalidPath(String),

    #[error("Snapshot has no root node")]
    EmptySnapshot,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Where a persisted snapshot lives: its protocol and root id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotKey {
    pub protocol: String,
    pub root_id: NodeId,
}

/// Trait for snapshot storage backends
///
/// Snapshots are whole-file artifacts: a save replaces any previous
/// snapshot for the same `(protocol, root id)` wholesale.
pub trait SnapshotStore: Send + Sync {
    /// Persist a snapshot under its root node's id
    fn save_snapshot(&self, protocol: &str, snapshot: &GraphSnapshot) -> StorageResult<SnapshotKey>;

    /// Load a snapshot by root id (case-insensitive). The protocol hint is
    /// tried first; other protocols are searched when it misses.
    fn load_snapshot(&self, root_id: &str, protocol: Option<&str>) -> StorageResult<Option<GraphSnapshot>>;

    /// Whether a snapshot exists, without reading it
    fn contains_snapshot(&self, root_id: &str, protocol: Option<&str>) -> StorageResult<bool>;

    /// All persisted snapshots, ordered by protocol then root id
    fn list_snapshots(&self) -> StorageResult<Vec<SnapshotKey>>;

    fn save_search_index(&self, entries: &[SearchIndexEntry]) -> StorageResult<()>;

    fn load_search_index(&self) -> StorageResult<Option<Vec<SearchIndexEntry>>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: SnapshotStore + Sized {
    /// Open a store rooted at `path`, creating it if needed
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Open a store that must already exist
    fn open_existing(path: impl AsRef<Path>) -> StorageResult<Self>;

    fn root(&self) -> &Path;
}

/// Reject anything that could escape the store directory.
pub(crate) fn checked_component(value: &str) -> StorageResult<&str> {
    let trimmed = value.trim();
    let bad = trimmed.is_empty()
        || trimmed == "."
        || trimmed.contains("..")
        || trimmed.contains(|c: char| matches!(c, '/' | '\\' | '\0'));
    if bad {
        return Err(StorageError::InvalidPath(value.to_string()));
    }
    Ok(trimmed)
}

pub(crate) fn snapshot_file_name(root_id: &str) -> StorageResult<PathBuf> {
    let id = checked_component(root_id)?;
    Ok(PathBuf::from(format!("{}.json", id.to_lowercase())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_components_are_validated() {
        assert!(checked_component("euler").is_ok());
        assert!(checked_component("eth:euler:0xabc").is_ok());
        for bad in ["", "  ", ".", "..", "a/b", "a\\b", "../etc", "x\0y"] {
            assert!(
                matches!(checked_component(bad), Err(StorageError::InvalidPath(_))),
                "{bad:?} accepted"
            );
        }
    }

    #[test]
    fn file_names_are_normalized() {
        assert_eq!(
            snapshot_file_name(" ETH:Ethena:0xABC ").unwrap(),
            PathBuf::from("eth:ethena:0xabc.json")
        );
    }
}
