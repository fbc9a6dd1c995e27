//! Snapshot persistence
//!
//! Snapshots and the search index are flat JSON artifacts. The
//! `SnapshotStore` trait abstracts where they live; `FileSnapshotStore`
//! keeps them in a directory tree.

mod file;
mod traits;

pub use file::{FileSnapshotStore, SEARCH_INDEX_FILE};
pub use traits::{OpenStore, SnapshotKey, SnapshotStore, StorageError, StorageResult};
