//! Whether a command may be applied to a selection as a whole.
//!
//! Every predicate here is a pure function of entity state and permissions. Predicates
//! that look at a single component return `false` unless exactly one is selected.
//! Process groups (local, not remote) are treated as always eligible for run-state and
//! connection commands: those act through batch endpoints that enforce per-child
//! permissions themselves.

use crate::graph::FlowGraph;
use crate::types::{
    Component, ConnectableType, EntityKind, InputRequirement, NodeEntity, RunStatus, Selection,
    TransmissionStatus,
};

/// Whether every member may be modified.
pub fn can_modify(selection: &Selection) -> bool {
    selection.iter().all(|c| c.permissions().can_write)
}

/// Whether every member may be read.
pub fn can_read(selection: &Selection) -> bool {
    selection.iter().all(|c| c.permissions().can_read)
}

/// Whether every member may be started, stopped, enabled or disabled.
pub fn can_operate(selection: &Selection) -> bool {
    selection.iter().all(component_can_operate)
}

fn component_can_operate(component: &Component) -> bool {
    component.permissions().can_write
        || component
            .operate_permissions()
            .is_some_and(|p| p.can_write)
}

fn is_kind(selection: &Selection, kind: EntityKind) -> bool {
    selection.single().is_some_and(|c| c.kind() == kind)
}

/// Whether a node is idle enough to be changed.
fn node_supports_modification(node: &NodeEntity) -> bool {
    let snapshot = &node.status.aggregate_snapshot;
    match node.kind {
        EntityKind::Processor | EntityKind::InputPort | EntityKind::OutputPort => {
            !(snapshot.run_status == Some(RunStatus::Running) || snapshot.active_thread_count > 0)
        }
        EntityKind::RemoteProcessGroup => {
            !(node.status.transmission_status == Some(TransmissionStatus::Transmitting)
                || snapshot.active_thread_count > 0)
        }
        EntityKind::ProcessGroup | EntityKind::Funnel | EntityKind::Label => true,
        EntityKind::Connection => false,
    }
}

/// Whether the single selected member is in a state that allows modification.
///
/// Running processors and ports, and transmitting remote groups, are not modifiable
/// while active. A connection is modifiable when both of its effective endpoints are on
/// the canvas and are either group boundaries or modifiable themselves.
pub fn supports_modification(graph: &FlowGraph, selection: &Selection) -> bool {
    match selection.single() {
        Some(Component::Node(node)) => node_supports_modification(node),
        Some(Component::Connection(connection)) => {
            let group_id = graph.group_id();
            let endpoint_ok = |id: &str| match graph.nodes.get(id) {
                Some(node) if node.kind.is_group() => true,
                Some(node) => node_supports_modification(node),
                None => false,
            };
            endpoint_ok(connection.effective_source_id(group_id))
                && endpoint_ok(connection.effective_destination_id(group_id))
        }
        None => false,
    }
}

fn run_status(component: &Component) -> Option<RunStatus> {
    component.as_node().and_then(NodeEntity::run_status)
}

/// Whether the single selected member can be started.
pub fn is_runnable(graph: &FlowGraph, selection: &Selection) -> bool {
    let Some(component) = selection.single() else {
        return false;
    };
    if component.kind() == EntityKind::ProcessGroup {
        return true;
    }
    if !can_operate(selection) || !component.kind().is_schedulable() {
        return false;
    }
    supports_modification(graph, selection) && run_status(component) == Some(RunStatus::Stopped)
}

/// Whether every member can be started. Vacuously true for an empty selection.
pub fn are_runnable(graph: &FlowGraph, selection: &Selection) -> bool {
    each_single(selection, |single| is_runnable(graph, single))
}

/// Whether the single selected member can be stopped.
pub fn is_stoppable(selection: &Selection) -> bool {
    let Some(component) = selection.single() else {
        return false;
    };
    if component.kind() == EntityKind::ProcessGroup {
        return true;
    }
    if !can_operate(selection) || !component.kind().is_schedulable() {
        return false;
    }
    run_status(component) == Some(RunStatus::Running)
}

/// Whether every member can be stopped. Vacuously true for an empty selection.
pub fn are_stoppable(selection: &Selection) -> bool {
    each_single(selection, is_stoppable)
}

/// Members that can be enabled.
pub fn filter_enable(graph: &FlowGraph, selection: &Selection) -> Selection {
    selection.filter(|c| {
        run_state_filter(graph, c, |status| status == Some(RunStatus::Disabled))
    })
}

/// Members that can be disabled.
pub fn filter_disable(graph: &FlowGraph, selection: &Selection) -> Selection {
    selection.filter(|c| {
        run_state_filter(graph, c, |status| {
            matches!(status, Some(RunStatus::Stopped) | Some(RunStatus::Invalid))
        })
    })
}

fn run_state_filter(
    graph: &FlowGraph,
    component: &Component,
    accepts: impl Fn(Option<RunStatus>) -> bool,
) -> bool {
    if component.kind() == EntityKind::ProcessGroup {
        return true;
    }
    if !component_can_operate(component) || !component.kind().is_schedulable() {
        return false;
    }
    let single = Selection::new(vec![component.clone()]);
    supports_modification(graph, &single) && accepts(run_status(component))
}

/// Whether every member can be enabled. Vacuously true for an empty selection.
pub fn can_enable(graph: &FlowGraph, selection: &Selection) -> bool {
    selection.is_empty() || filter_enable(graph, selection).len() == selection.len()
}

/// Whether every member can be disabled. Vacuously true for an empty selection.
pub fn can_disable(graph: &FlowGraph, selection: &Selection) -> bool {
    selection.is_empty() || filter_disable(graph, selection).len() == selection.len()
}

fn transmission_permitted(selection: &Selection) -> bool {
    (can_modify(selection) && can_read(selection)) || can_operate(selection)
}

/// Whether the single selected remote group can start transmitting.
pub fn can_start_transmitting(selection: &Selection) -> bool {
    selection.len() == 1
        && transmission_permitted(selection)
        && is_kind(selection, EntityKind::RemoteProcessGroup)
}

/// Whether the single selected remote group can stop transmitting.
pub fn can_stop_transmitting(selection: &Selection) -> bool {
    can_start_transmitting(selection)
}

/// Whether every member can start transmitting. False for an empty selection.
pub fn can_all_start_transmitting(selection: &Selection) -> bool {
    !selection.is_empty() && each_single(selection, can_start_transmitting)
}

/// Whether every member can stop transmitting. False for an empty selection.
pub fn can_all_stop_transmitting(selection: &Selection) -> bool {
    !selection.is_empty() && each_single(selection, can_stop_transmitting)
}

/// Whether the single selected member can be deleted from the displayed group.
pub fn is_deletable(graph: &FlowGraph, selection: &Selection) -> bool {
    selection.len() == 1
        && graph.group.permissions.can_write
        && can_modify(selection)
        && supports_modification(graph, selection)
}

/// Whether every member can be deleted. False for an empty selection.
pub fn are_deletable(graph: &FlowGraph, selection: &Selection) -> bool {
    !selection.is_empty() && each_single(selection, |single| is_deletable(graph, single))
}

/// Whether the configuration dialog applies.
///
/// An empty selection configures the displayed group, so it is configurable; several
/// members never are.
pub fn is_configurable(graph: &FlowGraph, selection: &Selection) -> bool {
    match selection.len() {
        0 => return true,
        1 => {}
        _ => return false,
    }
    if is_kind(selection, EntityKind::ProcessGroup) {
        return true;
    }
    if !can_read(selection) || !can_modify(selection) {
        return false;
    }
    if is_kind(selection, EntityKind::Funnel) {
        return false;
    }
    supports_modification(graph, selection)
}

/// Whether the read-only details dialog applies to the single selected member.
pub fn has_details(graph: &FlowGraph, selection: &Selection) -> bool {
    let Some(component) = selection.single() else {
        return false;
    };
    if !can_read(selection) {
        return false;
    }
    let has_dialog = matches!(
        component.kind(),
        EntityKind::Processor
            | EntityKind::InputPort
            | EntityKind::OutputPort
            | EntityKind::RemoteProcessGroup
            | EntityKind::Connection
    );
    if can_modify(selection) {
        has_dialog && !is_configurable(graph, selection)
    } else {
        has_dialog
    }
}

/// Whether the single selected member can originate a connection.
pub fn is_valid_connection_source(selection: &Selection) -> bool {
    let Some(component) = selection.single() else {
        return false;
    };
    if component.kind() == EntityKind::ProcessGroup {
        return true;
    }
    if !can_read(selection) || !can_modify(selection) {
        return false;
    }
    matches!(
        component.kind(),
        EntityKind::Processor
            | EntityKind::RemoteProcessGroup
            | EntityKind::InputPort
            | EntityKind::Funnel
    )
}

/// Whether the single selected member can terminate a connection.
pub fn is_valid_connection_destination(selection: &Selection) -> bool {
    let Some(component) = selection.single() else {
        return false;
    };
    if component.kind() == EntityKind::ProcessGroup {
        return true;
    }
    if !can_modify(selection) {
        return false;
    }
    match component {
        Component::Node(node) => match node.kind {
            EntityKind::RemoteProcessGroup | EntityKind::OutputPort | EntityKind::Funnel => true,
            EntityKind::Processor => node.input_requirement != Some(InputRequirement::InputForbidden),
            _ => false,
        },
        Component::Connection(_) => false,
    }
}

/// Connectable type recorded when `kind` is the source of a connection.
pub fn connectable_type_for_source(kind: EntityKind) -> Option<ConnectableType> {
    match kind {
        EntityKind::Processor => Some(ConnectableType::Processor),
        EntityKind::RemoteProcessGroup => Some(ConnectableType::RemoteOutputPort),
        EntityKind::ProcessGroup => Some(ConnectableType::OutputPort),
        EntityKind::InputPort => Some(ConnectableType::InputPort),
        EntityKind::Funnel => Some(ConnectableType::Funnel),
        _ => None,
    }
}

/// Connectable type recorded when `kind` is the destination of a connection.
pub fn connectable_type_for_destination(kind: EntityKind) -> Option<ConnectableType> {
    match kind {
        EntityKind::Processor => Some(ConnectableType::Processor),
        EntityKind::RemoteProcessGroup => Some(ConnectableType::RemoteInputPort),
        EntityKind::ProcessGroup => Some(ConnectableType::InputPort),
        EntityKind::OutputPort => Some(ConnectableType::OutputPort),
        EntityKind::Funnel => Some(ConnectableType::Funnel),
        _ => None,
    }
}

/// Whether the selection can be aligned: two or more nodes, all modifiable.
pub fn can_align(selection: &Selection) -> bool {
    selection.nodes().count() >= 2 && can_modify(selection)
}

/// Whether the selection can be recolored: all processors or all labels, read+write.
pub fn is_colorable(selection: &Selection) -> bool {
    if selection.is_empty() || !can_read(selection) || !can_modify(selection) {
        return false;
    }
    let all = |kind: EntityKind| selection.iter().all(|c| c.kind() == kind);
    all(EntityKind::Processor) || all(EntityKind::Label)
}

/// Whether the selection can be copied.
///
/// Every member must be readable and each selected connection must have both effective
/// endpoints in the selection.
pub fn is_copyable(graph: &FlowGraph, selection: &Selection) -> bool {
    if selection.is_empty() || !can_read(selection) {
        return false;
    }
    let group_id = graph.group_id();
    selection.connections().all(|c| {
        selection.contains(c.effective_source_id(group_id))
            && selection.contains(c.effective_destination_id(group_id))
    })
}

/// Whether a paste into the displayed group is possible.
pub fn is_pastable(graph: &FlowGraph, clipboard_has_content: bool) -> bool {
    graph.group.permissions.can_write && clipboard_has_content
}

/// Drops selected connections whose effective endpoints are not both selected.
pub fn trim_dangling_edges(graph: &FlowGraph, selection: &Selection) -> Selection {
    let group_id = graph.group_id();
    selection.filter(|c| match c {
        Component::Connection(connection) => {
            selection.contains(connection.effective_source_id(group_id))
                && selection.contains(connection.effective_destination_id(group_id))
        }
        Component::Node(_) => true,
    })
}

fn each_single(selection: &Selection, mut predicate: impl FnMut(&Selection) -> bool) -> bool {
    selection
        .iter()
        .all(|c| predicate(&Selection::new(vec![c.clone()])))
}
