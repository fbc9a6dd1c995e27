//! Flat-file snapshot store
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<protocol>/<rootNodeId>.json
//! <root>/search-index.json
//! ```
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! reader never observes a half-written snapshot.

use super::traits::{
    checked_component, snapshot_file_name, OpenStore, SnapshotKey, SnapshotStore, StorageError,
    StorageResult,
};
use crate::graph::{normalize_node_id, GraphSnapshot, NodeId};
use crate::index::SearchIndexEntry;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SEARCH_INDEX_FILE: &str = "search-index.json";

#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    fn protocol_dir(&self, protocol: &str) -> StorageResult<PathBuf> {
        Ok(self.root.join(checked_component(protocol)?.to_lowercase()))
    }

    /// Protocol directories, sorted by name
    fn protocols(&self) -> StorageResult<Vec<String>> {
        let mut protocols = Vec::new();
        if !self.root.is_dir() {
            return Ok(protocols);
        }
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    protocols.push(name.to_string());
                }
            }
        }
        protocols.sort();
        Ok(protocols)
    }

    /// Candidate paths for `root_id`, protocol hint first.
    fn locate(&self, root_id: &str, protocol: Option<&str>) -> StorageResult<Option<PathBuf>> {
        let file = snapshot_file_name(root_id)?;

        if let Some(protocol) = protocol.map(str::trim).filter(|p| !p.is_empty()) {
            let path = self.protocol_dir(protocol)?.join(&file);
            if path.is_file() {
                return Ok(Some(path));
            }
        }
        for protocol in self.protocols()? {
            let path = self.root.join(protocol).join(&file);
            if path.is_file() {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// Directory this store reads and writes
    pub fn path(&self) -> &Path {
        &self.root
    }
}

/// Serialize pretty JSON to `path` via a temp file and rename.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut json = serde_json::to_vec_pretty(value)?;
    json.push(b'\n');

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::InvalidPath(path.display().to_string()))?;
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));
    fs::write(&tmp, &json)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl SnapshotStore for FileSnapshotStore {
    fn save_snapshot(&self, protocol: &str, snapshot: &GraphSnapshot) -> StorageResult<SnapshotKey> {
        let root = snapshot.root().ok_or(StorageError::EmptySnapshot)?;
        let path = self
            .protocol_dir(protocol)?
            .join(snapshot_file_name(root.id.as_str())?);
        write_json_atomic(&path, snapshot)?;
        debug!(path = %path.display(), nodes = snapshot.nodes.len(), "snapshot written");
        Ok(SnapshotKey {
            protocol: protocol.trim().to_lowercase(),
            root_id: NodeId::from_string(normalize_node_id(root.id.as_str())),
        })
    }

    fn load_snapshot(&self, root_id: &str, protocol: Option<&str>) -> StorageResult<Option<GraphSnapshot>> {
        match self.locate(root_id, protocol)? {
            Some(path) => read_json(&path).map(Some),
            None => Ok(None),
        }
    }

    fn contains_snapshot(&self, root_id: &str, protocol: Option<&str>) -> StorageResult<bool> {
        Ok(self.locate(root_id, protocol)?.is_some())
    }

    fn list_snapshots(&self) -> StorageResult<Vec<SnapshotKey>> {
        let mut keys = Vec::new();
        for protocol in self.protocols()? {
            let dir = self.root.join(&protocol);
            let mut ids = Vec::new();
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if stem.starts_with('.') {
                    continue;
                }
                ids.push(NodeId::from_string(stem));
            }
            ids.sort();
            keys.extend(ids.into_iter().map(|root_id| SnapshotKey {
                protocol: protocol.clone(),
                root_id,
            }));
        }
        Ok(keys)
    }

    fn save_search_index(&self, entries: &[SearchIndexEntry]) -> StorageResult<()> {
        write_json_atomic(&self.root.join(SEARCH_INDEX_FILE), entries)
    }

    fn load_search_index(&self) -> StorageResult<Option<Vec<SearchIndexEntry>>> {
        let path = self.root.join(SEARCH_INDEX_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }
}

impl OpenStore for FileSnapshotStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn open_existing(path: impl AsRef<Path>) -> StorageResult<Self> {
        let root = path.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(StorageError::NotFound(root.display().to_string()));
        }
        Ok(Self { root })
    }

    fn root(&self) -> &Path {
        &self.root
    }
}
