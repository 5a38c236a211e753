//! Recording fakes and fixtures shared by the unit and gesture tests.

use crate::canvas::{Collaborators, FlowCanvas};
use crate::config::CanvasConfig;
use crate::error::{CanvasError, TransportError};
use crate::graph::{ConnectionPath, FlowGraph};
use crate::notify::Notifier;
use crate::render::{CanvasRenderer, ConnectPreview, RenderOptions};
use crate::services::{
    Clock, ConnectionConfigurator, GroupContents, GroupLoader, History, SnippetService,
};
use crate::store::Incoming;
use crate::types::{
    ConnectionEntity, Dimensions, EntityId, EntityKind, GroupContext, NodeEntity, Permissions,
    Revision, Selection,
};
use async_trait::async_trait;
use egui::{Pos2, Rect};
use serde::Serialize;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A connection `id` from `source` to `destination`, both inside group `pg`.
pub fn connection(id: &str, source: &str, destination: &str) -> ConnectionEntity {
    ConnectionEntity {
        id: id.to_string(),
        uri: format!("/connections/{id}"),
        revision: Revision::at(1),
        permissions: Permissions::FULL,
        source_id: source.to_string(),
        source_group_id: "pg".to_string(),
        source_type: None,
        destination_id: destination.to_string(),
        destination_group_id: "pg".to_string(),
        destination_type: None,
        bends: Vec::new(),
        label_index: 0,
        z_index: 0,
        name: None,
        selected_relationships: Default::default(),
        status: Default::default(),
    }
}

/// A node of `kind` occupying `body`.
pub fn node(id: &str, kind: EntityKind, body: Rect) -> NodeEntity {
    NodeEntity {
        id: id.to_string(),
        kind,
        uri: format!("/nodes/{id}"),
        revision: Revision::at(1),
        permissions: Permissions::FULL,
        operate_permissions: None,
        position: body.min,
        dimensions: Some(Dimensions {
            width: body.width(),
            height: body.height(),
        }),
        status: Default::default(),
        input_requirement: None,
        z_index: 0,
    }
}

/// A node of `kind` at `(x, y)` with the kind's default size.
pub fn node_at(id: &str, kind: EntityKind, x: f32, y: f32) -> NodeEntity {
    let mut n = node(id, kind, Rect::from_min_size(egui::pos2(x, y), kind.default_size()));
    n.dimensions = None;
    n
}

/// A root graph `pg` holding the given members.
pub fn graph_with(nodes: Vec<NodeEntity>, connections: Vec<ConnectionEntity>) -> FlowGraph {
    let mut graph = FlowGraph::new(GroupContext::root("pg"));
    graph.nodes.set(Incoming::All(nodes), false);
    graph.connections.set(Incoming::All(connections), false);
    graph
}

/// One request seen by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: &'static str,
    pub url: String,
    pub body: Option<Value>,
}

/// In-memory flow authority.
///
/// Canned responses answer `GET`s. Served entities answer both `GET` and `PUT`: a `PUT`
/// merges the patch into the served entity, bumps its version and returns the envelope.
#[derive(Default)]
pub struct MockTransport {
    responses: RefCell<HashMap<String, Value>>,
    entities: RefCell<HashMap<String, Value>>,
    failures: RefCell<HashMap<String, TransportError>>,
    requests: RefCell<Vec<Request>>,
}

impl MockTransport {
    pub fn respond(&self, url: &str, body: Value) {
        self.responses.borrow_mut().insert(url.to_string(), body);
    }

    pub fn serve<T: Serialize>(&self, uri: &str, entity: &T) {
        let value = serde_json::to_value(entity).unwrap();
        self.entities.borrow_mut().insert(uri.to_string(), value);
    }

    pub fn fail(&self, url: &str, error: TransportError) {
        self.failures.borrow_mut().insert(url.to_string(), error);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.borrow().clone()
    }

    pub fn puts(&self) -> Vec<Request> {
        self.requests().into_iter().filter(|r| r.method == "PUT").collect()
    }

    pub fn gets(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == "GET")
            .map(|r| r.url)
            .collect()
    }

    fn envelope(entity: &Value, client_id: Option<&Value>) -> Value {
        let mut revision = entity["revision"].clone();
        if let Some(client_id) = client_id {
            revision["clientId"] = client_id.clone();
        }
        json!({"revision": revision, "component": entity})
    }
}

#[async_trait(?Send)]
impl crate::transport::Transport for MockTransport {
    async fn get(&self, url: &str) -> Result<Value, TransportError> {
        self.requests.borrow_mut().push(Request {
            method: "GET",
            url: url.to_string(),
            body: None,
        });
        if let Some(error) = self.failures.borrow().get(url) {
            return Err(error.clone());
        }
        if let Some(body) = self.responses.borrow().get(url) {
            return Ok(body.clone());
        }
        match self.entities.borrow().get(url) {
            Some(entity) => Ok(Self::envelope(entity, None)),
            None => Err(TransportError::new(404, format!("{url} not found"))),
        }
    }

    async fn put(&self, url: &str, body: Value) -> Result<Value, TransportError> {
        self.requests.borrow_mut().push(Request {
            method: "PUT",
            url: url.to_string(),
            body: Some(body.clone()),
        });
        if let Some(error) = self.failures.borrow().get(url) {
            return Err(error.clone());
        }

        let mut entities = self.entities.borrow_mut();
        let Some(entity) = entities.get_mut(url) else {
            return Err(TransportError::new(404, format!("{url} not found")));
        };
        if let Some(patch) = body["component"].as_object() {
            for (key, value) in patch {
                if key == "destination" {
                    entity["destinationId"] = value["id"].clone();
                    entity["destinationGroupId"] = value["groupId"].clone();
                    entity["destinationType"] = value["type"].clone();
                } else {
                    entity[key.as_str()] = value.clone();
                }
            }
        }
        let version = entity["revision"]["version"].as_u64().unwrap_or(0) + 1;
        entity["revision"]["version"] = json!(version);
        Ok(Self::envelope(entity, body["revision"].get("clientId")))
    }
}

/// Everything a [`RecordingRenderer`] was asked to draw.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    ConnectionsEntered(Vec<EntityId>, bool),
    ConnectionUpdated(ConnectionPath, RenderOptions),
    ConnectionRemoved(EntityId),
    ConnectionStatus(EntityId),
    OrderConnections(Vec<EntityId>),
    NodesEntered(Vec<EntityId>, bool),
    NodeUpdated(EntityId),
    NodeRemoved(EntityId),
    SelectionChanged(Vec<EntityId>),
    ConnectPreview(Option<ConnectPreview>),
    LabelOutline(Option<Rect>),
    Overview,
}

#[derive(Default)]
pub struct RecordingRenderer {
    events: RefCell<Vec<RenderEvent>>,
}

impl RecordingRenderer {
    pub fn events(&self) -> Vec<RenderEvent> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// Paths drawn for connection `id`, oldest first.
    pub fn paths(&self, id: &str) -> Vec<(ConnectionPath, RenderOptions)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                RenderEvent::ConnectionUpdated(path, options) if path.id == id => {
                    Some((path.clone(), *options))
                }
                _ => None,
            })
            .collect()
    }

    pub fn last_path(&self, id: &str) -> Option<ConnectionPath> {
        self.paths(id).pop().map(|(path, _)| path)
    }

    pub fn last_preview(&self) -> Option<Option<ConnectPreview>> {
        self.events.borrow().iter().rev().find_map(|e| match e {
            RenderEvent::ConnectPreview(preview) => Some(preview.clone()),
            _ => None,
        })
    }

    pub fn overview_refreshes(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, RenderEvent::Overview))
            .count()
    }

    fn push(&self, event: RenderEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl CanvasRenderer for RecordingRenderer {
    fn connections_entered(&self, ids: &[EntityId], selected: bool) {
        self.push(RenderEvent::ConnectionsEntered(ids.to_vec(), selected));
    }

    fn connection_updated(&self, path: &ConnectionPath, options: RenderOptions) {
        self.push(RenderEvent::ConnectionUpdated(path.clone(), options));
    }

    fn connection_removed(&self, id: &str) {
        self.push(RenderEvent::ConnectionRemoved(id.to_string()));
    }

    fn connection_status_changed(&self, connection: &ConnectionEntity) {
        self.push(RenderEvent::ConnectionStatus(connection.id.clone()));
    }

    fn order_connections(&self, ids: &[EntityId]) {
        self.push(RenderEvent::OrderConnections(ids.to_vec()));
    }

    fn nodes_entered(&self, ids: &[EntityId], selected: bool) {
        self.push(RenderEvent::NodesEntered(ids.to_vec(), selected));
    }

    fn node_updated(&self, node: &NodeEntity, _transition: bool) {
        self.push(RenderEvent::NodeUpdated(node.id.clone()));
    }

    fn node_removed(&self, id: &str) {
        self.push(RenderEvent::NodeRemoved(id.to_string()));
    }

    fn selection_changed(&self, ids: &[EntityId]) {
        self.push(RenderEvent::SelectionChanged(ids.to_vec()));
    }

    fn connect_preview(&self, preview: Option<&ConnectPreview>) {
        self.push(RenderEvent::ConnectPreview(preview.cloned()));
    }

    fn label_drag_outline(&self, outline: Option<Rect>) {
        self.push(RenderEvent::LabelOutline(outline));
    }

    fn overview_changed(&self) {
        self.push(RenderEvent::Overview);
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: RefCell<Vec<(String, String)>>,
    transport_errors: RefCell<Vec<TransportError>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<(String, String)> {
        self.notices.borrow().clone()
    }

    pub fn transport_errors(&self) -> Vec<TransportError> {
        self.transport_errors.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn show_notice(&self, header: &str, message: &str) {
        self.notices
            .borrow_mut()
            .push((header.to_string(), message.to_string()));
    }

    fn transport_error(&self, error: &TransportError) {
        self.transport_errors.borrow_mut().push(error.clone());
    }
}

/// Configurator whose next answers are queued by the test; dismisses when nothing is queued.
#[derive(Default)]
pub struct ScriptedConfigurator {
    created: RefCell<Option<Result<ConnectionEntity, CanvasError>>>,
    chosen: RefCell<Option<Result<ConnectionEntity, CanvasError>>>,
    create_calls: RefCell<Vec<(EntityId, EntityId)>>,
    port_calls: RefCell<Vec<(EntityId, EntityId)>>,
}

impl ScriptedConfigurator {
    pub fn will_create(&self, result: Result<ConnectionEntity, CanvasError>) {
        *self.created.borrow_mut() = Some(result);
    }

    pub fn will_choose(&self, result: Result<ConnectionEntity, CanvasError>) {
        *self.chosen.borrow_mut() = Some(result);
    }

    pub fn create_calls(&self) -> Vec<(EntityId, EntityId)> {
        self.create_calls.borrow().clone()
    }

    pub fn port_calls(&self) -> Vec<(EntityId, EntityId)> {
        self.port_calls.borrow().clone()
    }
}

#[async_trait(?Send)]
impl ConnectionConfigurator for ScriptedConfigurator {
    async fn create_connection(
        &self,
        source_id: &str,
        destination_id: &str,
    ) -> Result<ConnectionEntity, CanvasError> {
        self.create_calls
            .borrow_mut()
            .push((source_id.to_string(), destination_id.to_string()));
        self.created.borrow_mut().take().unwrap_or(Err(CanvasError::Cancelled))
    }

    async fn choose_port(
        &self,
        connection: &ConnectionEntity,
        destination: &NodeEntity,
    ) -> Result<ConnectionEntity, CanvasError> {
        self.port_calls
            .borrow_mut()
            .push((connection.id.clone(), destination.id.clone()));
        self.chosen.borrow_mut().take().unwrap_or(Err(CanvasError::Cancelled))
    }
}

/// Snippet service recording every move.
#[derive(Default)]
pub struct RecordingSnippets {
    moves: RefCell<Vec<(Vec<EntityId>, EntityId, EntityId)>>,
    failure: RefCell<Option<TransportError>>,
}

impl RecordingSnippets {
    pub fn moves(&self) -> Vec<(Vec<EntityId>, EntityId, EntityId)> {
        self.moves.borrow().clone()
    }

    pub fn fail_with(&self, error: TransportError) {
        *self.failure.borrow_mut() = Some(error);
    }
}

#[async_trait(?Send)]
impl SnippetService for RecordingSnippets {
    async fn move_snippet(
        &self,
        selection: &Selection,
        parent_group_id: &str,
        destination_group_id: &str,
    ) -> Result<(), CanvasError> {
        self.moves.borrow_mut().push((
            selection.ids(),
            parent_group_id.to_string(),
            destination_group_id.to_string(),
        ));
        match self.failure.borrow_mut().take() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

/// Group loader serving canned group contents.
#[derive(Default)]
pub struct StaticGroups {
    groups: RefCell<HashMap<EntityId, GroupContents>>,
    loads: RefCell<Vec<EntityId>>,
}

impl StaticGroups {
    pub fn insert(&self, id: &str, contents: GroupContents) {
        self.groups.borrow_mut().insert(id.to_string(), contents);
    }

    pub fn loads(&self) -> Vec<EntityId> {
        self.loads.borrow().clone()
    }
}

#[async_trait(?Send)]
impl GroupLoader for StaticGroups {
    async fn load_group(&self, group_id: &str) -> Result<GroupContents, CanvasError> {
        self.loads.borrow_mut().push(group_id.to_string());
        self.groups
            .borrow()
            .get(group_id)
            .cloned()
            .ok_or_else(|| CanvasError::GroupUnavailable(group_id.to_string()))
    }
}

pub struct RecordingHistory {
    current: RefCell<String>,
    replaced: RefCell<Vec<String>>,
}

impl Default for RecordingHistory {
    fn default() -> Self {
        Self {
            current: RefCell::new("https://localhost:8443/nifi/".to_string()),
            replaced: RefCell::new(Vec::new()),
        }
    }
}

impl RecordingHistory {
    pub fn set_current(&self, url: &str) {
        *self.current.borrow_mut() = url.to_string();
    }

    pub fn replaced(&self) -> Vec<String> {
        self.replaced.borrow().clone()
    }
}

impl History for RecordingHistory {
    fn current_url(&self) -> String {
        self.current.borrow().clone()
    }

    fn replace_url(&self, url: &str) {
        *self.current.borrow_mut() = url.to_string();
        self.replaced.borrow_mut().push(url.to_string());
    }
}

#[derive(Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn set(&self, now: u64) {
        self.now.set(now);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.get()
    }
}

/// Key/value storage backed by a shared map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: Rc<RefCell<HashMap<String, String>>>,
}

impl eframe::Storage for MemoryStorage {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn set_string(&mut self, key: &str, value: String) {
        self.values.borrow_mut().insert(key.to_string(), value);
    }

    fn flush(&mut self) {}
}

/// A canvas wired to recording fakes.
pub struct Harness {
    pub canvas: FlowCanvas,
    pub transport: Rc<MockTransport>,
    pub renderer: Rc<RecordingRenderer>,
    pub notifier: Rc<RecordingNotifier>,
    pub configurator: Rc<ScriptedConfigurator>,
    pub snippets: Rc<RecordingSnippets>,
    pub groups: Rc<StaticGroups>,
    pub history: Rc<RecordingHistory>,
    pub clock: Rc<ManualClock>,
    pub storage: MemoryStorage,
}

impl Harness {
    /// A canvas showing root group `pg` with the given members, each also served by the
    /// mock transport at its uri.
    pub fn new(nodes: Vec<NodeEntity>, connections: Vec<ConnectionEntity>) -> Self {
        Self::in_group(GroupContext::root("pg"), nodes, connections)
    }

    pub fn in_group(
        group: GroupContext,
        nodes: Vec<NodeEntity>,
        connections: Vec<ConnectionEntity>,
    ) -> Self {
        init_logging();

        let transport = Rc::new(MockTransport::default());
        let renderer = Rc::new(RecordingRenderer::default());
        let notifier = Rc::new(RecordingNotifier::default());
        let configurator = Rc::new(ScriptedConfigurator::default());
        let snippets = Rc::new(RecordingSnippets::default());
        let groups = Rc::new(StaticGroups::default());
        let history = Rc::new(RecordingHistory::default());
        let clock = Rc::new(ManualClock::default());
        let storage = MemoryStorage::default();

        for n in &nodes {
            transport.serve(&n.uri, n);
        }
        for c in &connections {
            transport.serve(&c.uri, c);
        }

        let canvas = FlowCanvas::new(
            CanvasConfig::default(),
            group.clone(),
            Collaborators {
                transport: transport.clone(),
                renderer: renderer.clone(),
                notifier: notifier.clone(),
                configurator: configurator.clone(),
                snippets: snippets.clone(),
                groups: groups.clone(),
                history: history.clone(),
                clock: clock.clone(),
                storage: Rc::new(RefCell::new(storage.clone())),
            },
        );
        canvas.show_contents(GroupContents {
            group,
            nodes,
            connections,
        });
        renderer.clear();

        Self {
            canvas,
            transport,
            renderer,
            notifier,
            configurator,
            snippets,
            groups,
            history,
            clock,
            storage,
        }
    }

    /// Body of the side-by-side pair used across the gesture tests.
    pub fn pair() -> (NodeEntity, NodeEntity) {
        (
            node("A", EntityKind::Processor, Rect::from_min_size(Pos2::ZERO, egui::vec2(100.0, 100.0))),
            node(
                "B",
                EntityKind::Processor,
                Rect::from_min_size(egui::pos2(300.0, 0.0), egui::vec2(100.0, 100.0)),
            ),
        )
    }
}
