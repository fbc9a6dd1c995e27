//! Core graph data structures

mod alias;
mod draft;
mod edge;
mod id;
mod node;
mod snapshot;


pub use alias::{aliases_for, clone_snapshot_with_root_id, deployment_node_ids, DeploymentTable};
pub use draft::DraftGraphStore;
pub use edge::{Edge, LendingPosition};
pub use id::{normalize_node_id, slug, GraphError, GraphResult, NodeId};
pub use node::{Node, NodeCategory, NodeDetails};
pub use snapshot::{GraphSnapshot, SnapshotView};

pub(crate) use node::lenient_number;
