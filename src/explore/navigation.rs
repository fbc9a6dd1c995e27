//! Explorer session: the navigation state machine behind an asset page
//!
//! A session moves through `Idle → Loading → Loaded | NotFound`. Inside a
//! loaded view the user drills forward (pushing the previous focus on a
//! stack), steps back, and opens or closes the OTHERS bucket.
//!
//! Every load is tagged with a [`LoadTicket`]. Only the most recently issued
//! ticket may apply its result; anything older was cancelled by a newer
//! load or by [`ExplorerSession::cancel`] and is discarded.

use super::client::{ClientResult, SnapshotRequest, SnapshotSource};
use super::format::chain_label;
use super::graph_query::{direct_children, node_context, resolve_root_node, Child, NodeContext};
use super::notices::TerminalNotices;
use super::routing::{route_drilldown, Drilldown};
use super::treemap::{build_others_tiles, build_tiles, min_percent, Tile};
use crate::graph::{normalize_node_id, GraphSnapshot, LendingPosition, Node, NodeId};
use crate::index::{RootIdSet, SearchIndexEntry};
use std::time::Instant;
use tracing::{debug, warn};

/// Proof of which load a result belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    request: SnapshotRequest,
}

impl LoadTicket {
    pub fn request(&self) -> &SnapshotRequest {
        &self.request
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
    pub label: String,
    /// Link target; `None` for the current page
    pub id: Option<String>,
}

/// A snapshot with a resolved root and the user's position in it
#[derive(Debug, Clone)]
pub struct LoadedView {
    request: SnapshotRequest,
    snapshot: GraphSnapshot,
    root_id: NodeId,
    focus: NodeId,
    focus_stack: Vec<NodeId>,
    /// Node shown in the detail panel; follows clicks, not only drilldowns
    selected: NodeId,
    others: Option<Vec<NodeId>>,
    title: String,
}

impl LoadedView {
    /// `None` when no node in the snapshot resolves as the requested root.
    pub fn new(request: SnapshotRequest, snapshot: GraphSnapshot, focus: Option<&str>) -> Option<Self> {
        let root = resolve_root_node(&snapshot.nodes, &request.id, request.chain.as_deref())?;
        let focus_node = focus
            .map(normalize_node_id)
            .filter(|f| !f.is_empty())
            .and_then(|f| snapshot.node(&f))
            .unwrap_or(root);

        let chain = if root.chain.trim().is_empty() {
            request.chain.as_deref()
        } else {
            Some(root.chain.as_str())
        };
        let title = format!("{} {}", chain_label(chain), focus_node.name);
        let root_id = root.id.clone();
        let focus = focus_node.id.clone();

        Some(Self {
            request,
            snapshot,
            root_id,
            selected: focus.clone(),
            focus,
            focus_stack: Vec::new(),
            others: None,
            title,
        })
    }

    pub fn request(&self) -> &SnapshotRequest {
        &self.request
    }

    pub fn snapshot(&self) -> &GraphSnapshot {
        &self.snapshot
    }

    pub fn root(&self) -> Option<&Node> {
        self.snapshot.node(self.root_id.as_str())
    }

    pub fn root_id(&self) -> &NodeId {
        &self.root_id
    }

    pub fn focus(&self) -> &NodeId {
        &self.focus
    }

    pub fn focus_node(&self) -> Option<&Node> {
        self.snapshot.node(self.focus.as_str())
    }

    pub fn focus_stack(&self) -> &[NodeId] {
        &self.focus_stack
    }

    pub fn selected(&self) -> &NodeId {
        &self.selected
    }

    pub fn selected_node(&self) -> Option<&Node> {
        self.snapshot.node(self.selected.as_str())
    }

    /// Select `node_id` without moving the focus. Returns false when the node
    /// is not in this snapshot.
    pub fn select(&mut self, node_id: &str) -> bool {
        match self.snapshot.node(node_id) {
            Some(node) => {
                self.selected = node.id.clone();
                true
            }
            None => false,
        }
    }

    pub fn is_at_root(&self) -> bool {
        self.focus == self.root_id
    }

    pub fn origin(&self) -> Option<&str> {
        self.request.origin.as_deref()
    }

    /// Root TVL, or the root's total outgoing allocation when it has none.
    pub fn tvl(&self) -> f64 {
        self.root()
            .and_then(|r| r.tvl_usd)
            .unwrap_or_else(|| self.snapshot.total_outgoing_usd(self.root_id.as_str()))
    }

    pub fn page_title(&self) -> &str {
        &self.title
    }

    /// Value for the `focus` URL parameter; omitted at the root.
    pub fn focus_param(&self) -> Option<&str> {
        (!self.is_at_root()).then(|| self.focus.as_str())
    }

    /// Origin first (when it is a different asset), then the current page.
    ///
    /// The origin is labelled with its indexed name when `index` knows it.
    pub fn breadcrumbs(&self, index: &[SearchIndexEntry]) -> Vec<Breadcrumb> {
        let mut crumbs = Vec::with_capacity(2);
        if let Some(origin) = self.origin() {
            if normalize_node_id(origin) != self.request.normalized_id() {
                let label = index
                    .iter()
                    .find(|e| e.node_id.matches(origin) || e.id.matches(origin))
                    .map(|e| format!("{} {}", chain_label(Some(&e.chain)), e.name))
                    .unwrap_or_else(|| origin.to_string());
                crumbs.push(Breadcrumb {
                    label: label.to_uppercase(),
                    id: Some(origin.to_string()),
                });
            }
        }
        crumbs.push(Breadcrumb {
            label: self.title.to_uppercase(),
            id: None,
        });
        crumbs
    }

    pub fn is_others_expanded(&self) -> bool {
        self.others.is_some()
    }

    pub fn others(&self) -> Option<&[NodeId]> {
        self.others.as_deref()
    }

    pub fn children(&self) -> Vec<Child<'_>> {
        direct_children(&self.snapshot, self.focus.as_str())
    }

    pub fn context(&self, node_id: &str) -> NodeContext {
        node_context(&self.snapshot, node_id)
    }

    /// Tiles for the current focus, sized for a container of `container_area_px`.
    pub fn tiles(&self, container_area_px: f64, min_tile_area_px: f64, roots: Option<&RootIdSet>) -> Vec<Tile> {
        let children = self.children();
        match &self.others {
            Some(scope) => build_others_tiles(&self.snapshot, &children, scope, roots),
            None => build_tiles(
                &self.snapshot,
                &children,
                min_percent(container_area_px, min_tile_area_px),
                roots,
            ),
        }
    }

    fn set_focus(&mut self, id: NodeId) {
        if id != self.focus {
            self.others = None;
        }
        self.focus = id;
    }

    /// Drill into `node_id` inside this snapshot.
    ///
    /// Returns false when the node is unknown or already focused.
    pub fn apply_local_drilldown(&mut self, node_id: &str) -> bool {
        let Some(target) = self.snapshot.node(node_id).map(|n| n.id.clone()) else {
            debug!(node_id, "drilldown target not in snapshot");
            return false;
        };
        self.selected = target.clone();
        if target == self.focus {
            return false;
        }
        let previous = self.focus.clone();
        self.focus_stack.push(previous);
        self.set_focus(target);
        true
    }

    /// Close OTHERS if open, else pop the focus stack (root when empty).
    ///
    /// Returns false when already at the root with nothing to undo.
    pub fn back_one_step(&mut self) -> bool {
        if self.others.take().is_some() {
            return true;
        }
        match self.focus_stack.pop() {
            Some(previous) => {
                self.selected = previous.clone();
                self.set_focus(previous);
                true
            }
            None if !self.is_at_root() => {
                let root = self.root_id.clone();
                self.selected = root.clone();
                self.set_focus(root);
                true
            }
            None => false,
        }
    }

    /// Restrict the view to the children absorbed into OTHERS.
    pub fn expand_others(&mut self, child_ids: Vec<NodeId>) {
        self.others = Some(child_ids);
    }

    pub fn collapse_others(&mut self) {
        self.others = None;
    }
}

#[derive(Debug, Clone, Default)]
pub enum ViewState {
    #[default]
    Idle,
    Loading,
    Loaded(Box<LoadedView>),
    NotFound,
}

/// Navigation state for one explorer page
#[derive(Debug, Default)]
pub struct ExplorerSession {
    generation: u64,
    state: ViewState,
    notices: TerminalNotices,
}

impl ExplorerSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn view(&self) -> Option<&LoadedView> {
        match &self.state {
            ViewState::Loaded(view) => Some(view.as_ref()),
            _ => None,
        }
    }

    pub fn view_mut(&mut self) -> Option<&mut LoadedView> {
        match &mut self.state {
            ViewState::Loaded(view) => Some(view.as_mut()),
            _ => None,
        }
    }

    pub fn notices(&self) -> &TerminalNotices {
        &self.notices
    }

    pub fn notices_mut(&mut self) -> &mut TerminalNotices {
        &mut self.notices
    }

    /// Start a load, invalidating any load still in flight.
    pub fn begin_load(&mut self, request: SnapshotRequest) -> LoadTicket {
        self.generation += 1;
        self.state = ViewState::Loading;
        LoadTicket {
            generation: self.generation,
            request,
        }
    }

    /// Drop whatever is in flight; its result will be ignored.
    pub fn cancel(&mut self) {
        self.generation += 1;
        if matches!(self.state, ViewState::Loading) {
            self.state = ViewState::Idle;
        }
    }

    /// Apply a fetch result. Returns false when the ticket is stale.
    ///
    /// A missing snapshot, a failed fetch and an unresolvable root all end in
    /// `NotFound`; nothing is retried.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: ClientResult<Option<GraphSnapshot>>,
        focus: Option<&str>,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!(id = %ticket.request.id, "discarding stale snapshot result");
            return false;
        }
        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(id = %ticket.request.id, error = %e, "snapshot fetch failed");
                None
            }
        };
        self.state = match snapshot.and_then(|s| LoadedView::new(ticket.request, s, focus)) {
            Some(view) => ViewState::Loaded(Box::new(view)),
            None => ViewState::NotFound,
        };
        true
    }

    /// Fetch and apply a snapshot in one go.
    pub async fn load(
        &mut self,
        source: &dyn SnapshotSource,
        request: SnapshotRequest,
        focus: Option<&str>,
    ) -> &ViewState {
        let ticket = self.begin_load(request);
        let result = source.fetch_snapshot(ticket.request()).await;
        self.complete_load(ticket, result, focus);
        &self.state
    }

    /// Handle a click on `node_id`: follow a route to another snapshot,
    /// drill locally, or raise a terminal notice.
    pub async fn drill(
        &mut self,
        source: &dyn SnapshotSource,
        node_id: &str,
        via: Option<LendingPosition>,
        now: Instant,
    ) -> Option<Drilldown> {
        let decision = route_drilldown(self.view()?, node_id, via, source).await;
        match &decision {
            Drilldown::Route(request) => {
                self.load(source, request.clone(), None).await;
            }
            Drilldown::Local(id) => {
                if let Some(view) = self.view_mut() {
                    view.apply_local_drilldown(id.as_str());
                }
            }
            Drilldown::Terminal { name } => {
                if let Some(view) = self.view_mut() {
                    view.select(node_id);
                }
                self.notices.show(name, now);
            }
        }
        Some(decision)
    }
}
