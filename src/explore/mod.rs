//! Exploration client
//!
//! Everything an asset page needs: snapshot retrieval, root resolution, the
//! navigation state machine, drilldown routing, treemap tiles and terminal
//! notices. Rendering itself is left to the caller.

mod client;
pub mod format;
mod graph_query;
mod navigation;
mod notices;
mod routing;
pub mod treemap;

pub use client::{
    ClientError, ClientResult, FileSnapshotSource, HttpSnapshotSource, SnapshotRequest, SnapshotSource,
};
pub use graph_query::{direct_children, node_context, resolve_root_node, Child, NodeContext};
pub use navigation::{Breadcrumb, ExplorerSession, LoadTicket, LoadedView, ViewState};
pub use notices::{terminal_message, TerminalNotice, TerminalNotices};
pub use routing::{local_fallback, route_candidate, route_drilldown, Drilldown};
pub use treemap::{build_others_tiles, build_tiles, display_name, is_terminal, min_percent, Tile, TileKind};
