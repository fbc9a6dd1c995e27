//! Build orchestration
//!
//! Drives a set of adapters, merges their output per asset into a
//! [`DraftGraphStore`], and persists the finalized snapshots together with
//! their deployment aliases.
//!
//! Catalog fetches run concurrently (bounded by a semaphore). Merging is
//! sequential and follows registration order, so when two adapters describe
//! the same leaf the later one wins deterministically.

use crate::adapter::{AdapterError, AssetKey, AssetSource, Contributions};
use crate::graph::{clone_snapshot_with_root_id, DraftGraphStore, GraphSnapshot, NodeId};
use crate::storage::{SnapshotKey, SnapshotStore, StorageResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Outcome of one orchestrator run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub succeeded: Vec<String>,
    /// Adapter id and error text
    pub failed: Vec<(String, String)>,
    pub assets_built: usize,
    /// Adapter id and asset key for every asset without a root
    pub assets_skipped: Vec<(String, AssetKey)>,
}

impl BuildReport {
    pub fn is_empty(&self) -> bool {
        self.assets_built == 0
    }
}

/// Draft stores for every asset, plus what is needed to persist them
#[derive(Debug, Clone, Default)]
pub struct DraftBuild {
    pub drafts: BTreeMap<AssetKey, DraftGraphStore>,
    /// Alias root ids per asset, canonical excluded
    pub deployments: BTreeMap<AssetKey, Vec<NodeId>>,
    pub report: BuildReport,
}

impl DraftBuild {
    /// Freeze every draft, keyed by asset.
    pub fn into_snapshots(self) -> BTreeMap<AssetKey, GraphSnapshot> {
        self.drafts
            .into_iter()
            .map(|(asset, draft)| (asset, draft.into_snapshot()))
            .collect()
    }
}

/// Fetch every adapter's contributions and merge them per asset.
///
/// An adapter whose catalog fetch fails is reported and skipped; the run
/// carries on with the others.
pub async fn build_draft_graphs_by_asset(
    adapters: &[Arc<dyn AssetSource>],
    max_parallel: usize,
) -> DraftBuild {
    let fetched = fetch_all(adapters, max_parallel).await;

    let mut build = DraftBuild::default();
    for (adapter, outcome) in adapters.iter().zip(fetched) {
        let id = adapter.id().to_string();
        match outcome {
            Ok(contributions) => {
                merge_contributions(&mut build, adapter.as_ref(), contributions);
                build.report.succeeded.push(id);
            }
            Err(e) => {
                warn!(adapter = %id, error = %e, "adapter failed, skipping its contribution");
                build.report.failed.push((id, e.to_string()));
            }
        }
    }
    build.report.assets_built = build.drafts.len();

    info!(
        assets = build.report.assets_built,
        succeeded = build.report.succeeded.len(),
        failed = build.report.failed.len(),
        "draft graphs built"
    );
    build
}

async fn fetch_all(
    adapters: &[Arc<dyn AssetSource>],
    max_parallel: usize,
) -> Vec<Result<Contributions, AdapterError>> {
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut tasks = JoinSet::new();

    for (index, adapter) in adapters.iter().cloned().enumerate() {
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => {
                    debug!(adapter = adapter.id(), "fetching catalog");
                    adapter.contributions().await
                }
                Err(e) => Err(AdapterError::Internal(format!("semaphore error: {e}"))),
            };
            (index, result)
        });
    }

    let mut slots: Vec<Option<Result<Contributions, AdapterError>>> =
        (0..adapters.len()).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = Some(result),
            Err(e) => warn!(error = %e, "adapter task panicked"),
        }
    }

    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(AdapterError::Internal("adapter task aborted".into()))))
        .collect()
}

fn merge_contributions(build: &mut DraftBuild, adapter: &dyn AssetSource, contributions: Contributions) {
    for asset in contributions.skipped {
        build.report.assets_skipped.push((adapter.id().to_string(), asset));
    }

    for contribution in contributions.assets {
        let asset = contribution.asset;
        let draft = build.drafts.entry(asset.clone()).or_insert_with(|| {
            let aliases = adapter.deployments(&contribution.root.id);
            if !aliases.is_empty() {
                build.deployments.insert(asset.clone(), aliases);
            }
            DraftGraphStore::new(contribution.root)
        });
        draft.merge(contribution.leaves.nodes, contribution.leaves.edges);
        draft.add_source(adapter.id());
        debug!(
            adapter = adapter.id(),
            %asset,
            nodes = draft.node_count(),
            edges = draft.edge_count(),
            "merged contribution"
        );
    }
}

/// What `persist_build` wrote
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistReport {
    pub snapshots: Vec<SnapshotKey>,
    pub aliases: Vec<SnapshotKey>,
}

impl PersistReport {
    pub fn total(&self) -> usize {
        self.snapshots.len() + self.aliases.len()
    }
}

/// Directory a snapshot is filed under: the root's protocol field, then the
/// protocol segment of its id, then the first contributing source.
pub fn snapshot_protocol(snapshot: &GraphSnapshot) -> Option<String> {
    let root = snapshot.root()?;
    root.protocol
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_lowercase)
        .or_else(|| root.id.protocol_segment())
        .or_else(|| snapshot.sources.first().map(|s| s.to_lowercase()))
}

/// Write every finalized snapshot and its deployment clones.
pub fn persist_build(store: &dyn SnapshotStore, build: DraftBuild) -> StorageResult<PersistReport> {
    let mut deployments = build.deployments;
    let mut report = PersistReport::default();

    for (asset, draft) in build.drafts {
        let snapshot = draft.into_snapshot();
        let Some(protocol) = snapshot_protocol(&snapshot) else {
            warn!(%asset, "snapshot has no resolvable protocol, not persisted");
            continue;
        };

        report.snapshots.push(store.save_snapshot(&protocol, &snapshot)?);

        for alias in deployments.remove(&asset).unwrap_or_default() {
            let clone = clone_snapshot_with_root_id(&snapshot, &alias);
            report.aliases.push(store.save_snapshot(&protocol, &clone)?);
        }
    }

    info!(
        snapshots = report.snapshots.len(),
        aliases = report.aliases.len(),
        "persisted build"
    );
    Ok(report)
}
