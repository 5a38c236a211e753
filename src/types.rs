//! Core data types mirrored from the flow authority.
//!
//! This module defines the entities placed on the canvas (processors, ports, groups,
//! funnels, labels and the connections between them), their permissions and revisions,
//! and the transient [`Selection`] that command eligibility is evaluated against.

use crate::constants;
use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identifier of any addressable entity on the canvas.
pub type EntityId = String;

/// The kind of a graph member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A processor
    Processor,
    /// An input port of the displayed group
    InputPort,
    /// An output port of the displayed group
    OutputPort,
    /// A child process group
    ProcessGroup,
    /// A remote process group
    RemoteProcessGroup,
    /// A funnel
    Funnel,
    /// A free-text label
    Label,
    /// A connection between two connectable components
    Connection,
}

impl EntityKind {
    /// Whether this is a connection rather than a node.
    pub fn is_connection(self) -> bool {
        self == EntityKind::Connection
    }

    /// Whether this is a processor, input port or output port: the kinds whose
    /// run state gates modification.
    pub fn is_schedulable(self) -> bool {
        matches!(
            self,
            EntityKind::Processor | EntityKind::InputPort | EntityKind::OutputPort
        )
    }

    /// Whether this is a local or remote process group.
    pub fn is_group(self) -> bool {
        matches!(
            self,
            EntityKind::ProcessGroup | EntityKind::RemoteProcessGroup
        )
    }

    /// Flow API collection and response field for the kind's live status, if it has one.
    pub fn status_resource(self) -> Option<(&'static str, &'static str)> {
        match self {
            EntityKind::Processor => Some(("processors", "processorStatus")),
            EntityKind::InputPort => Some(("input-ports", "portStatus")),
            EntityKind::OutputPort => Some(("output-ports", "portStatus")),
            EntityKind::ProcessGroup => Some(("process-groups", "processGroupStatus")),
            EntityKind::RemoteProcessGroup => {
                Some(("remote-process-groups", "remoteProcessGroupStatus"))
            }
            EntityKind::Connection => Some(("connections", "connectionStatus")),
            EntityKind::Funnel | EntityKind::Label => None,
        }
    }

    /// The body size used when an entity does not report its own dimensions.
    pub fn default_size(self) -> Vec2 {
        let (w, h) = match self {
            EntityKind::Processor => constants::PROCESSOR_SIZE,
            EntityKind::InputPort | EntityKind::OutputPort => constants::PORT_SIZE,
            EntityKind::ProcessGroup => constants::PROCESS_GROUP_SIZE,
            EntityKind::RemoteProcessGroup => constants::REMOTE_PROCESS_GROUP_SIZE,
            EntityKind::Funnel => constants::FUNNEL_SIZE,
            EntityKind::Label => constants::LABEL_SIZE,
            EntityKind::Connection => (0.0, 0.0),
        };
        egui::vec2(w, h)
    }
}

/// Read/write access granted to the current user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    /// The entity's configuration may be read
    pub can_read: bool,
    /// The entity may be modified
    pub can_write: bool,
}

impl Permissions {
    /// Full read and write access.
    pub const FULL: Permissions = Permissions {
        can_read: true,
        can_write: true,
    };

    /// Read-only access.
    pub const READ_ONLY: Permissions = Permissions {
        can_read: true,
        can_write: false,
    };

    /// No access at all.
    pub const NONE: Permissions = Permissions {
        can_read: false,
        can_write: false,
    };
}

/// Optimistic-concurrency stamp issued by the flow authority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    /// Client that last mutated the entity, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Monotonic version assigned by the authority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// User that last modified the entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modifier: Option<String>,
}

impl Revision {
    /// A revision at the given version with no client identity.
    pub fn at(version: u64) -> Self {
        Self {
            version: Some(version),
            ..Self::default()
        }
    }

    /// Whether `self` is strictly newer than `current`.
    ///
    /// A versioned revision is always newer than an unversioned one; two unversioned
    /// revisions are never ordered.
    pub fn is_newer_than(&self, current: &Revision) -> bool {
        match (current.version, self.version) {
            (Some(current), Some(proposed)) => proposed > current,
            (None, Some(_)) => true,
            (Some(_), None) | (None, None) => false,
        }
    }
}

/// Scheduled state of a processor or port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Not scheduled
    Stopped,
    /// Scheduled to run
    Running,
    /// Disabled: must be enabled before it can be started
    Disabled,
    /// Invalid configuration
    Invalid,
}

/// Transmission state of a remote process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransmissionStatus {
    /// Site-to-site transmission is active
    Transmitting,
    /// Site-to-site transmission is stopped
    NotTransmitting,
}

/// Whether a processor accepts incoming connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputRequirement {
    /// The processor requires an incoming connection
    InputRequired,
    /// The processor may have incoming connections
    InputAllowed,
    /// The processor does not accept incoming connections
    InputForbidden,
}

/// Live metrics aggregated over the entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregateSnapshot {
    /// Scheduled state, for processors and ports
    pub run_status: Option<RunStatus>,
    /// Human readable queue summary, e.g. `"12 (3.4 KB)"`
    pub queued: Option<String>,
    /// Queue fill relative to the object-count back pressure threshold
    pub percent_use_count: Option<u32>,
    /// Queue fill relative to the data-size back pressure threshold
    pub percent_use_bytes: Option<u32>,
    /// Threads currently executing
    pub active_thread_count: u32,
    /// Threads terminated but not yet finished
    pub terminated_thread_count: u32,
}

/// Status sub-object, refreshable independently of the structural revision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComponentStatus {
    /// Aggregated live metrics
    pub aggregate_snapshot: AggregateSnapshot,
    /// Transmission state, for remote process groups
    pub transmission_status: Option<TransmissionStatus>,
}

/// Body size reported for a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in canvas units
    pub width: f32,
    /// Height in canvas units
    pub height: f32,
}

/// A non-connection member of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEntity {
    /// Unique identifier
    pub id: EntityId,
    /// What kind of node this is
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Resource the entity is updated through
    pub uri: String,
    /// Current revision
    #[serde(default)]
    pub revision: Revision,
    /// Access to the entity itself
    #[serde(default)]
    pub permissions: Permissions,
    /// Separate access for starting/stopping/enabling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operate_permissions: Option<Permissions>,
    /// Top-left corner in canvas space
    pub position: Pos2,
    /// Explicit body size, for kinds whose size varies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    /// Live status
    #[serde(default)]
    pub status: ComponentStatus,
    /// Whether a processor accepts incoming connections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_requirement: Option<InputRequirement>,
    /// Stacking order
    #[serde(default)]
    pub z_index: i64,
}

impl NodeEntity {
    /// The node's body size.
    pub fn size(&self) -> Vec2 {
        match self.dimensions {
            Some(d) => egui::vec2(d.width, d.height),
            None => self.kind.default_size(),
        }
    }

    /// The node's body in canvas space.
    pub fn bounding_box(&self) -> Rect {
        Rect::from_min_size(self.position, self.size())
    }

    /// Center of the node's body.
    pub fn center(&self) -> Pos2 {
        self.bounding_box().center()
    }

    /// Scheduled state, if the node has one.
    pub fn run_status(&self) -> Option<RunStatus> {
        self.status.aggregate_snapshot.run_status
    }
}

/// Connectable kind recorded on each end of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectableType {
    /// A processor
    Processor,
    /// A port inside a remote process group that receives data
    RemoteInputPort,
    /// A port inside a remote process group that emits data
    RemoteOutputPort,
    /// An input port
    InputPort,
    /// An output port
    OutputPort,
    /// A funnel
    Funnel,
}

/// A directed connection between two connectable components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionEntity {
    /// Unique identifier
    pub id: EntityId,
    /// Resource the entity is updated through
    pub uri: String,
    /// Current revision
    #[serde(default)]
    pub revision: Revision,
    /// Access to the connection
    #[serde(default)]
    pub permissions: Permissions,
    /// Raw source component id
    pub source_id: EntityId,
    /// Group owning the raw source
    pub source_group_id: EntityId,
    /// Kind of the raw source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<ConnectableType>,
    /// Raw destination component id
    pub destination_id: EntityId,
    /// Group owning the raw destination
    pub destination_group_id: EntityId,
    /// Kind of the raw destination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_type: Option<ConnectableType>,
    /// Server-confirmed routing points, in order from source to destination
    #[serde(default)]
    pub bends: Vec<Pos2>,
    /// Bend the label is anchored to
    #[serde(default)]
    pub label_index: usize,
    /// Stacking order
    #[serde(default)]
    pub z_index: i64,
    /// Optional user supplied name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Relationships routed over this connection
    #[serde(default)]
    pub selected_relationships: BTreeSet<String>,
    /// Live queue status
    #[serde(default)]
    pub status: ComponentStatus,
}

impl ConnectionEntity {
    /// The component the connection visually starts at when `group_id` is displayed.
    ///
    /// A source living in another group is represented by that group.
    pub fn effective_source_id(&self, group_id: &str) -> &str {
        if self.source_group_id != group_id {
            &self.source_group_id
        } else {
            &self.source_id
        }
    }

    /// The component the connection visually ends at when `group_id` is displayed.
    pub fn effective_destination_id(&self, group_id: &str) -> &str {
        if self.destination_group_id != group_id {
            &self.destination_group_id
        } else {
            &self.destination_id
        }
    }

    /// Whether both effective endpoints are the same component.
    pub fn is_self_loop(&self, group_id: &str) -> bool {
        self.effective_source_id(group_id) == self.effective_destination_id(group_id)
    }

    /// Whether either effective endpoint is `component_id`.
    pub fn touches(&self, component_id: &str, group_id: &str) -> bool {
        self.effective_source_id(group_id) == component_id
            || self.effective_destination_id(group_id) == component_id
    }

    /// Display name: the explicit name, else the selected relationships.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self
                .selected_relationships
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Any addressable graph member.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    /// A processor, port, group, funnel or label
    Node(NodeEntity),
    /// A connection
    Connection(ConnectionEntity),
}

impl Component {
    /// The member's id.
    pub fn id(&self) -> &str {
        match self {
            Component::Node(node) => &node.id,
            Component::Connection(connection) => &connection.id,
        }
    }

    /// The member's kind.
    pub fn kind(&self) -> EntityKind {
        match self {
            Component::Node(node) => node.kind,
            Component::Connection(_) => EntityKind::Connection,
        }
    }

    /// Access granted on the member.
    pub fn permissions(&self) -> Permissions {
        match self {
            Component::Node(node) => node.permissions,
            Component::Connection(connection) => connection.permissions,
        }
    }

    /// Separate operate access, if granted.
    pub fn operate_permissions(&self) -> Option<Permissions> {
        match self {
            Component::Node(node) => node.operate_permissions,
            Component::Connection(_) => None,
        }
    }

    /// The member's revision.
    pub fn revision(&self) -> &Revision {
        match self {
            Component::Node(node) => &node.revision,
            Component::Connection(connection) => &connection.revision,
        }
    }

    /// The node, if this is one.
    pub fn as_node(&self) -> Option<&NodeEntity> {
        match self {
            Component::Node(node) => Some(node),
            Component::Connection(_) => None,
        }
    }

    /// The connection, if this is one.
    pub fn as_connection(&self) -> Option<&ConnectionEntity> {
        match self {
            Component::Connection(connection) => Some(connection),
            Component::Node(_) => None,
        }
    }
}

/// A transient set of graph members that a command is evaluated against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    members: Vec<Component>,
}

impl Selection {
    /// Builds a selection from the given members.
    pub fn new(members: Vec<Component>) -> Self {
        Self { members }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// All members.
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.members.iter()
    }

    /// Non-connection members.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeEntity> {
        self.members.iter().filter_map(Component::as_node)
    }

    /// Connection members.
    pub fn connections(&self) -> impl Iterator<Item = &ConnectionEntity> {
        self.members.iter().filter_map(Component::as_connection)
    }

    /// Whether a member has the given id.
    pub fn contains(&self, id: &str) -> bool {
        self.members.iter().any(|m| m.id() == id)
    }

    /// The single member, when exactly one is selected.
    pub fn single(&self) -> Option<&Component> {
        match self.members.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Member ids in selection order.
    pub fn ids(&self) -> Vec<EntityId> {
        self.members.iter().map(|m| m.id().to_string()).collect()
    }

    /// Keeps only the members matching `predicate`.
    pub fn filter(&self, mut predicate: impl FnMut(&Component) -> bool) -> Selection {
        Selection::new(
            self.members
                .iter()
                .filter(|m| predicate(m))
                .cloned()
                .collect(),
        )
    }
}

impl FromIterator<Component> for Selection {
    fn from_iter<I: IntoIterator<Item = Component>>(iter: I) -> Self {
        Selection::new(iter.into_iter().collect())
    }
}

/// The process group currently displayed on the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupContext {
    /// Displayed group id
    pub group_id: EntityId,
    /// Parent of the displayed group; `None` for the topmost group
    #[serde(default)]
    pub parent_group_id: Option<EntityId>,
    /// Access to the displayed group
    #[serde(default)]
    pub permissions: Permissions,
}

impl GroupContext {
    /// Context for the topmost group.
    pub fn root(group_id: impl Into<EntityId>) -> Self {
        Self {
            group_id: group_id.into(),
            parent_group_id: None,
            permissions: Permissions::FULL,
        }
    }

    /// Context for a nested group.
    pub fn child(group_id: impl Into<EntityId>, parent_group_id: impl Into<EntityId>) -> Self {
        Self {
            group_id: group_id.into(),
            parent_group_id: Some(parent_group_id.into()),
            permissions: Permissions::FULL,
        }
    }

    /// Whether the displayed group is the topmost one.
    pub fn is_root(&self) -> bool {
        self.parent_group_id.is_none()
    }
}
