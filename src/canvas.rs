//! The view session: one displayed group, its stores, viewport and selection.
//!
//! [`FlowCanvas`] owns everything scoped to the group on screen and is replaced
//! wholesale (through [`FlowCanvas::show_contents`]) when the user navigates elsewhere.
//! Store mutations happen only here, and only after the authority acknowledged the
//! request that produced them.

use crate::config::CanvasConfig;
use crate::editing::Gesture;
use crate::error::{CanvasError, Result};
use crate::graph::FlowGraph;
use crate::notify::Notifier;
use crate::render::{CanvasRenderer, RenderOptions};
use crate::services::{
    Clock, ConnectionConfigurator, GroupContents, GroupLoader, History, SnippetService,
};
use crate::store::{Incoming, Reconciliation, SetOptions};
use crate::transport::{self, BulletinBoard, ConnectionPatch, PositionPatch, Transport, UpdateRequest};
use crate::types::{ConnectionEntity, EntityId, GroupContext, NodeEntity, Revision, Selection};
use crate::viewport::Viewport;
use egui::{Pos2, Vec2};
use indexmap::IndexSet;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

/// External collaborators a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Requests to the flow authority
    pub transport: Rc<dyn Transport>,
    /// Drawing
    pub renderer: Rc<dyn CanvasRenderer>,
    /// Blocking notices
    pub notifier: Rc<dyn Notifier>,
    /// Connection configuration dialogs
    pub configurator: Rc<dyn ConnectionConfigurator>,
    /// Snippet based group moves
    pub snippets: Rc<dyn SnippetService>,
    /// Group loading
    pub groups: Rc<dyn GroupLoader>,
    /// Address bar
    pub history: Rc<dyn History>,
    /// Time source for the store caches
    pub clock: Rc<dyn Clock>,
    /// Key/value storage for per-group view state
    pub storage: Rc<RefCell<dyn eframe::Storage>>,
}

/// A canvas session.
///
/// Shared state sits behind `RefCell`s so that gesture handlers and request
/// continuations can all work from `&FlowCanvas`. No borrow is held across an `.await`.
pub struct FlowCanvas {
    pub(crate) config: CanvasConfig,
    pub(crate) client_id: String,
    pub(crate) graph: RefCell<FlowGraph>,
    pub(crate) viewport: RefCell<Viewport>,
    pub(crate) selected: RefCell<IndexSet<EntityId>>,
    pub(crate) gesture: RefCell<Gesture>,
    pub(crate) container: Cell<Vec2>,
    pub(crate) services: Collaborators,
}

impl FlowCanvas {
    /// Creates a session showing an empty `group`.
    pub fn new(config: CanvasConfig, group: GroupContext, services: Collaborators) -> Self {
        let client_id = uuid::Uuid::new_v4().to_string();
        log::info!("starting canvas session {client_id} in group {}", group.group_id);
        Self {
            viewport: RefCell::new(Viewport::new(&config)),
            config,
            client_id,
            graph: RefCell::new(FlowGraph::new(group)),
            selected: RefCell::new(IndexSet::new()),
            gesture: RefCell::new(Gesture::Idle),
            container: Cell::new(Vec2::ZERO),
            services,
        }
    }

    /// Session settings.
    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    /// Id stamped on every revision this session sends.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The displayed graph.
    pub fn graph(&self) -> Ref<'_, FlowGraph> {
        self.graph.borrow()
    }

    /// The displayed group.
    pub fn group(&self) -> GroupContext {
        self.graph.borrow().group.clone()
    }

    /// The current transform.
    pub fn viewport(&self) -> Ref<'_, Viewport> {
        self.viewport.borrow()
    }

    /// Mutable access to the transform, for panning and zooming.
    pub fn viewport_mut(&self) -> RefMut<'_, Viewport> {
        self.viewport.borrow_mut()
    }

    /// Records the size of the element the canvas is drawn into.
    pub fn set_container_size(&self, size: Vec2) {
        self.container.set(size);
    }

    pub(crate) fn now(&self) -> u64 {
        self.services.clock.now_millis()
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Ids of the selected members, in selection order.
    pub fn selected_ids(&self) -> Vec<EntityId> {
        self.selected.borrow().iter().cloned().collect()
    }

    /// The selected members.
    pub fn selection(&self) -> Selection {
        let ids = self.selected_ids();
        self.graph.borrow().selection(ids)
    }

    /// Replaces the selection with the held members among `ids`.
    pub fn select<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        {
            let graph = self.graph.borrow();
            let mut selected = self.selected.borrow_mut();
            selected.clear();
            selected.extend(
                ids.into_iter()
                    .map(|id| id.as_ref().to_string())
                    .filter(|id| graph.nodes.contains(id) || graph.connections.contains(id)),
            );
        }
        self.selection_changed();
    }

    /// Adds the held members among `ids` to the selection.
    pub fn add_to_selection<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut all = self.selected_ids();
        all.extend(ids.into_iter().map(|id| id.as_ref().to_string()));
        self.select(all);
    }

    /// Removes `ids` from the selection.
    pub fn deselect<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let changed = {
            let mut selected = self.selected.borrow_mut();
            let before = selected.len();
            for id in ids {
                selected.shift_remove(id.as_ref());
            }
            before != selected.len()
        };
        if changed {
            self.selection_changed();
        }
    }

    /// Clears the selection.
    pub fn clear_selection(&self) {
        let ids = self.selected_ids();
        self.deselect(ids);
    }

    fn selection_changed(&self) {
        let ids = self.selected_ids();
        self.services.renderer.selection_changed(&ids);
        self.update_url();
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Inserts connections known to be new, e.g. the response to a create.
    pub fn add_connections(&self, connections: Vec<ConnectionEntity>, select_all: bool) {
        let now = self.now();
        let result = self.graph.borrow_mut().connections.add(connections, now);
        self.render_connection_changes(&result, select_all, false);
        if select_all {
            self.select(result.entered.iter().chain(&result.applied));
        }
    }

    /// Reconciles incoming connections with the store and redraws what changed.
    ///
    /// Removed connections are cleaned up and their neighbors reloaded.
    pub async fn set_connections(
        &self,
        incoming: Incoming<ConnectionEntity>,
        options: SetOptions,
    ) -> Reconciliation<ConnectionEntity> {
        let result = self
            .graph
            .borrow_mut()
            .connections
            .set(incoming, options.override_revision_check);
        self.render_connection_changes(&result, options.select_all, options.transition);
        if options.select_all && !result.entered.is_empty() {
            self.select(&result.entered);
        }
        self.connections_removed(&result.removed).await;
        result
    }

    /// Deletes connections and cleans up after them.
    pub async fn remove_connections<I, S>(&self, ids: I) -> Vec<ConnectionEntity>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let now = self.now();
        let removed = self.graph.borrow_mut().connections.remove(ids, now);
        self.connections_removed(&removed).await;
        removed
    }

    /// Deletes every connection.
    pub async fn remove_all_connections(&self) -> Vec<ConnectionEntity> {
        let now = self.now();
        let removed = self.graph.borrow_mut().connections.remove_all(now);
        self.connections_removed(&removed).await;
        removed
    }

    async fn connections_removed(&self, removed: &[ConnectionEntity]) {
        if removed.is_empty() {
            return;
        }

        let group_id = self.graph.borrow().group_id().to_string();
        for connection in removed {
            self.services.renderer.connection_removed(&connection.id);
        }
        self.deselect(removed.iter().map(|c| c.id.as_str()));

        for connection in removed {
            self.reload_neighbors(
                Some(connection.effective_source_id(&group_id)),
                Some(connection.effective_destination_id(&group_id)),
            )
            .await;
        }
    }

    /// Re-derives geometry for one connection, or all of them, without touching stored data.
    pub fn refresh_connections(&self, id: Option<&str>) {
        let ids = match id {
            Some(id) => vec![id.to_string()],
            None => self.graph.borrow().connections.ids(),
        };
        for id in ids {
            self.render_connection(&id, RenderOptions::FULL);
        }
    }

    /// Redraws connection `id` from its stored state.
    pub(crate) fn render_connection(&self, id: &str, options: RenderOptions) {
        let path = {
            let graph = self.graph.borrow();
            graph.connections.get(id).and_then(|c| graph.connection_path(c))
        };
        if let Some(path) = path {
            self.services.renderer.connection_updated(&path, options);
        }
    }

    fn render_connection_changes(
        &self,
        result: &Reconciliation<ConnectionEntity>,
        select_all: bool,
        transition: bool,
    ) {
        let renderer = &self.services.renderer;
        if !result.entered.is_empty() {
            renderer.connections_entered(&result.entered, select_all);
        }

        let options = RenderOptions {
            transition,
            ..RenderOptions::FULL
        };
        for id in result.entered.iter().chain(&result.applied) {
            self.render_connection(id, options);
        }

        if !result.entered.is_empty() || !result.applied.is_empty() {
            let order: Vec<EntityId> = self
                .graph
                .borrow()
                .connections
                .sorted()
                .iter()
                .map(|c| c.id.clone())
                .collect();
            renderer.order_connections(&order);
        }
    }

    /// Fetches connection `id` and applies it.
    pub async fn reload_connection(&self, id: &str) -> Result<()> {
        let uri = self.connection_uri(id)?;
        let connection = transport::fetch_entity(self.services.transport.as_ref(), &uri).await?;
        self.set_connections(Incoming::One(connection), SetOptions::default())
            .await;
        Ok(())
    }

    /// Fetches and applies only the live status of connection `id`.
    pub async fn reload_connection_status(&self, id: &str) -> Result<()> {
        self.connection_uri(id)?;
        let status = transport::fetch_status(
            self.services.transport.as_ref(),
            &self.config.api_base,
            crate::types::EntityKind::Connection,
            id,
        )
        .await?;

        let Some(status) = status else {
            return Ok(());
        };
        let updated = {
            let mut graph = self.graph.borrow_mut();
            if graph.connections.update_status(id, status) {
                graph.connections.get(id).cloned()
            } else {
                None
            }
        };
        if let Some(connection) = updated {
            self.services.renderer.connection_status_changed(&connection);
        }
        Ok(())
    }

    fn connection_uri(&self, id: &str) -> Result<String> {
        self.graph
            .borrow()
            .connections
            .get(id)
            .map(|c| c.uri.clone())
            .ok_or_else(|| CanvasError::UnknownComponent(id.to_string()))
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Inserts nodes known to be new.
    pub fn add_nodes(&self, nodes: Vec<NodeEntity>, select_all: bool) {
        let now = self.now();
        let result = self.graph.borrow_mut().nodes.add(nodes, now);
        self.render_node_changes(&result, select_all, false);
        if select_all {
            self.select(result.entered.iter().chain(&result.applied));
        }
    }

    /// Reconciles incoming nodes with the store and redraws what changed.
    pub fn set_nodes(&self, incoming: Incoming<NodeEntity>, options: SetOptions) -> Reconciliation<NodeEntity> {
        let result = self
            .graph
            .borrow_mut()
            .nodes
            .set(incoming, options.override_revision_check);
        self.render_node_changes(&result, options.select_all, options.transition);
        if options.select_all && !result.entered.is_empty() {
            self.select(&result.entered);
        }
        self.nodes_removed(&result.removed);
        result
    }

    /// Deletes nodes.
    pub fn remove_nodes<I, S>(&self, ids: I) -> Vec<NodeEntity>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let now = self.now();
        let removed = self.graph.borrow_mut().nodes.remove(ids, now);
        self.nodes_removed(&removed);
        removed
    }

    fn nodes_removed(&self, removed: &[NodeEntity]) {
        for node in removed {
            self.services.renderer.node_removed(&node.id);
        }
        if !removed.is_empty() {
            self.deselect(removed.iter().map(|n| n.id.as_str()));
        }
    }

    fn render_node_changes(&self, result: &Reconciliation<NodeEntity>, select_all: bool, transition: bool) {
        if !result.entered.is_empty() {
            self.services.renderer.nodes_entered(&result.entered, select_all);
        }
        let updated: Vec<NodeEntity> = {
            let graph = self.graph.borrow();
            result
                .entered
                .iter()
                .chain(&result.applied)
                .filter_map(|id| graph.nodes.get(id).cloned())
                .collect()
        };
        for node in &updated {
            self.services.renderer.node_updated(node, transition);
        }
    }

    /// Fetches node `id` and applies it.
    pub async fn reload_node(&self, id: &str) -> Result<()> {
        let uri = self
            .graph
            .borrow()
            .nodes
            .get(id)
            .map(|n| n.uri.clone())
            .ok_or_else(|| CanvasError::UnknownComponent(id.to_string()))?;
        let node = transport::fetch_entity(self.services.transport.as_ref(), &uri).await?;
        self.set_nodes(Incoming::One(node), SetOptions::default());
        Ok(())
    }

    /// Fetches and applies only the live status of node `id`.
    pub async fn reload_node_status(&self, id: &str) -> Result<()> {
        let kind = self
            .graph
            .borrow()
            .nodes
            .get(id)
            .map(|n| n.kind)
            .ok_or_else(|| CanvasError::UnknownComponent(id.to_string()))?;
        let status = transport::fetch_status(
            self.services.transport.as_ref(),
            &self.config.api_base,
            kind,
            id,
        )
        .await?;

        let Some(status) = status else {
            return Ok(());
        };
        let updated = {
            let mut graph = self.graph.borrow_mut();
            if graph.nodes.update_status(id, status) {
                graph.nodes.get(id).cloned()
            } else {
                None
            }
        };
        if let Some(node) = updated {
            self.services.renderer.node_updated(&node, false);
        }
        Ok(())
    }

    /// Reloads whichever of `source` and `destination` are on the canvas.
    ///
    /// Failures are logged; the neighbors simply keep their previous state.
    pub(crate) async fn reload_neighbors(&self, source: Option<&str>, destination: Option<&str>) {
        let mut ids: Vec<&str> = source.into_iter().chain(destination).collect();
        ids.dedup();
        for id in ids {
            if !self.graph.borrow().nodes.contains(id) {
                continue;
            }
            if let Err(e) = self.reload_node(id).await {
                log::warn!("unable to reload {id}: {e}");
            }
        }
    }

    /// Sweeps recently added/removed ids older than the configured TTL from both stores.
    pub fn expire_caches(&self) {
        let cutoff = self.now().saturating_sub(self.config.cache_ttl_millis);
        let mut graph = self.graph.borrow_mut();
        graph.connections.expire_caches(cutoff);
        graph.nodes.expire_caches(cutoff);
    }

    // ------------------------------------------------------------------
    // Structural updates
    // ------------------------------------------------------------------

    /// `revision` stamped with this session's client id.
    pub(crate) fn revision_for(&self, revision: &Revision) -> Revision {
        Revision {
            client_id: Some(self.client_id.clone()),
            ..revision.clone()
        }
    }

    fn update_request<P>(&self, revision: &Revision, component: P) -> UpdateRequest<P> {
        UpdateRequest {
            revision: self.revision_for(revision),
            disconnected_node_acknowledged: self.config.disconnected_node_acknowledged,
            component,
        }
    }

    /// Sends `patch` for a held connection and applies the returned entity.
    pub(crate) async fn save_connection(&self, patch: ConnectionPatch) -> Result<ConnectionEntity> {
        let (uri, revision) = {
            let graph = self.graph.borrow();
            let connection = graph
                .connections
                .get(&patch.id)
                .ok_or_else(|| CanvasError::UnknownComponent(patch.id.clone()))?;
            (connection.uri.clone(), connection.revision.clone())
        };

        let request = self.update_request(&revision, patch);
        let updated: ConnectionEntity =
            transport::update_entity(self.services.transport.as_ref(), &uri, request).await?;
        self.set_connections(Incoming::One(updated.clone()), SetOptions::authored())
            .await;
        Ok(updated)
    }

    /// Moves a held node to `position` and applies the returned entity.
    pub(crate) async fn save_node_position(&self, id: &str, position: Pos2) -> Result<NodeEntity> {
        let (uri, revision) = {
            let graph = self.graph.borrow();
            let node = graph
                .nodes
                .get(id)
                .ok_or_else(|| CanvasError::UnknownComponent(id.to_string()))?;
            (node.uri.clone(), node.revision.clone())
        };

        let patch = PositionPatch {
            id: id.to_string(),
            position,
        };
        let request = self.update_request(&revision, patch);
        let updated: NodeEntity =
            transport::update_entity(self.services.transport.as_ref(), &uri, request).await?;
        self.set_nodes(Incoming::One(updated.clone()), SetOptions::authored());
        Ok(updated)
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Loads group `group_id` (or `"root"`) and shows it.
    pub async fn enter_group(&self, group_id: &str) -> Result<()> {
        let contents = self.services.groups.load_group(group_id).await?;
        self.persist_view();
        self.show_contents(contents);
        Ok(())
    }

    /// Replaces everything on the canvas with `contents`.
    ///
    /// The stores and selection are reset, the members applied as authoritative lists
    /// and the view state saved for the group is restored when present.
    pub fn show_contents(&self, contents: GroupContents) {
        log::info!(
            "showing group {} ({} nodes, {} connections)",
            contents.group.group_id,
            contents.nodes.len(),
            contents.connections.len()
        );

        *self.gesture.borrow_mut() = Gesture::Idle;
        self.selected.borrow_mut().clear();
        *self.graph.borrow_mut() = FlowGraph::new(contents.group.clone());

        let nodes = self
            .graph
            .borrow_mut()
            .nodes
            .set(Incoming::All(contents.nodes), false);
        self.render_node_changes(&nodes, false, false);

        let connections = self
            .graph
            .borrow_mut()
            .connections
            .set(Incoming::All(contents.connections), false);
        self.render_connection_changes(&connections, false, false);

        {
            let mut viewport = self.viewport.borrow_mut();
            *viewport = Viewport::new(&self.config);
            let storage = self.services.storage.borrow();
            if !viewport.restore(&*storage, &self.config.view_storage_prefix, &contents.group.group_id) {
                log::debug!("no saved view for group {}", contents.group.group_id);
            }
        }

        self.services.renderer.overview_changed();
        self.selection_changed();
    }

    /// Saves the current transform for the displayed group.
    pub fn persist_view(&self) {
        let group_id = self.graph.borrow().group_id().to_string();
        let viewport = self.viewport.borrow();
        let mut storage = self.services.storage.borrow_mut();
        if let Err(e) = viewport.persist(&mut *storage, &self.config.view_storage_prefix, &group_id) {
            log::warn!("unable to save view for group {group_id}: {e}");
        }
    }

    /// Zooms so the whole graph is visible.
    pub fn fit(&self) {
        let bounds = self.graph.borrow().bounds();
        if let Some(bounds) = bounds {
            self.viewport.borrow_mut().fit(bounds, self.container.get());
            self.persist_view();
        }
    }

    /// Resets to scale 1, centered on the selection when there is one.
    pub fn actual_size(&self) {
        let selection = self.selection();
        let bounds = self.graph.borrow().selection_bounds(&selection);
        self.viewport.borrow_mut().actual_size(bounds, self.container.get());
        self.persist_view();
    }

    /// Selects `ids` and centers the view on them.
    pub fn show(&self, ids: &[EntityId]) {
        self.select(ids);
        let selection = self.selection();
        let bounds = self.graph.borrow().selection_bounds(&selection);
        if let Some(bounds) = bounds {
            let mut viewport = self.viewport.borrow_mut();
            let scale = viewport.scale();
            viewport.center_on(bounds, self.container.get(), scale);
        }
    }

    // ------------------------------------------------------------------
    // Bulletins
    // ------------------------------------------------------------------

    /// Bulletins for `ids`, sharded to the configured URL length.
    pub async fn query_bulletins(&self, ids: &[EntityId]) -> Result<BulletinBoard> {
        transport::query_bulletins(
            self.services.transport.as_ref(),
            &self.config.api_base,
            ids,
            self.config.max_url_length,
        )
        .await
    }
}
