//! The graph currently displayed: its group context plus node and connection stores.

use crate::geometry;
use crate::store::{ConnectionStore, NodeStore};
use crate::types::{Component, ConnectionEntity, EntityId, GroupContext, NodeEntity, Selection};
use egui::{Pos2, Rect};
use std::collections::HashSet;

/// Rendered geometry of one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionPath {
    /// Connection id
    pub id: EntityId,
    /// Where the line leaves the source
    pub start: Pos2,
    /// Routing points between start and end
    pub bends: Vec<Pos2>,
    /// Where the line meets the destination, or the pointer while the end is dragged
    pub end: Pos2,
    /// Where the label is drawn
    pub label_anchor: Pos2,
}

impl ConnectionPath {
    /// The full polyline `[start] ++ bends ++ [end]`.
    pub fn points(&self) -> Vec<Pos2> {
        let mut points = Vec::with_capacity(self.bends.len() + 2);
        points.push(self.start);
        points.extend_from_slice(&self.bends);
        points.push(self.end);
        points
    }
}

/// Everything the canvas shows for one process group.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    /// The displayed group
    pub group: GroupContext,
    /// Processors, ports, groups, funnels and labels
    pub nodes: NodeStore,
    /// Connections
    pub connections: ConnectionStore,
}

impl FlowGraph {
    /// Creates an empty graph for `group`.
    pub fn new(group: GroupContext) -> Self {
        Self {
            group,
            nodes: NodeStore::new(),
            connections: ConnectionStore::new(),
        }
    }

    /// Id of the displayed group.
    pub fn group_id(&self) -> &str {
        &self.group.group_id
    }

    /// The member with `id`, node or connection.
    pub fn component(&self, id: &str) -> Option<Component> {
        if let Some(node) = self.nodes.get(id) {
            return Some(Component::Node(node.clone()));
        }
        self.connections
            .get(id)
            .map(|c| Component::Connection(c.clone()))
    }

    /// Builds a selection from ids; ids that are not held are skipped.
    pub fn selection<I, S>(&self, ids: I) -> Selection
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ids.into_iter()
            .filter_map(|id| self.component(id.as_ref()))
            .collect()
    }

    /// Body of the node with `id`.
    pub fn node_bounds(&self, id: &str) -> Option<Rect> {
        self.nodes.get(id).map(NodeEntity::bounding_box)
    }

    /// Connections whose effective source or destination is `component_id`.
    pub fn component_connections(&self, component_id: &str) -> Vec<&ConnectionEntity> {
        let group_id = self.group_id();
        self.connections
            .iter()
            .filter(|c| c.touches(component_id, group_id))
            .collect()
    }

    /// Whether `selection` can be moved without severing any connection.
    ///
    /// Every connection of every selected node must be selected, and every selected
    /// connection must have both effective endpoints selected. An empty selection is
    /// never disconnected.
    pub fn is_disconnected(&self, selection: &Selection) -> bool {
        if selection.is_empty() {
            return false;
        }

        let connection_ids: HashSet<&str> = selection.connections().map(|c| c.id.as_str()).collect();
        let node_ids: HashSet<&str> = selection.nodes().map(|n| n.id.as_str()).collect();

        let nodes_closed = node_ids.iter().all(|node_id| {
            self.component_connections(node_id)
                .iter()
                .all(|c| connection_ids.contains(c.id.as_str()))
        });
        if !nodes_closed {
            return false;
        }

        let group_id = self.group_id();
        selection.connections().all(|c| {
            node_ids.contains(c.effective_source_id(group_id))
                && node_ids.contains(c.effective_destination_id(group_id))
        })
    }

    /// Topmost node whose body contains `point`.
    pub fn node_at(&self, point: Pos2) -> Option<&NodeEntity> {
        self.nodes
            .sorted()
            .into_iter()
            .rev()
            .find(|n| n.bounding_box().contains(point))
    }

    /// Bounding box of every node body and connection bend.
    pub fn bounds(&self) -> Option<Rect> {
        let bodies = self.nodes.iter().map(NodeEntity::bounding_box);
        let bends = self
            .connections
            .iter()
            .flat_map(|c| c.bends.iter().map(|b| Rect::from_min_max(*b, *b)));
        geometry::union_all(bodies.chain(bends))
    }

    /// Bounding box of the selected node bodies and selected connection bends.
    pub fn selection_bounds(&self, selection: &Selection) -> Option<Rect> {
        let bodies = selection.nodes().map(NodeEntity::bounding_box);
        let bends = selection
            .connections()
            .flat_map(|c| c.bends.iter().map(|b| Rect::from_min_max(*b, *b)));
        geometry::union_all(bodies.chain(bends))
    }

    /// Path of a held connection using its confirmed bends and label index.
    pub fn connection_path(&self, connection: &ConnectionEntity) -> Option<ConnectionPath> {
        self.route(connection, &connection.bends, connection.label_index, None)
    }

    /// Path of `connection` with the given bends, label index and optional end point.
    ///
    /// The end is aimed at the last bend (or the source center) and the start at the
    /// first bend (or the end point). `end_override` replaces the computed end while the
    /// endpoint is being dragged. Returns `None` when an endpoint is not on the canvas.
    pub fn route(
        &self,
        connection: &ConnectionEntity,
        bends: &[Pos2],
        label_index: usize,
        end_override: Option<Pos2>,
    ) -> Option<ConnectionPath> {
        let group_id = self.group_id();
        let source = self.node_bounds(connection.effective_source_id(group_id))?;

        let end = match end_override {
            Some(end) => end,
            None => {
                let destination = self.node_bounds(connection.effective_destination_id(group_id))?;
                let end_anchor = bends.last().copied().unwrap_or_else(|| source.center());
                geometry::perimeter_point(end_anchor, destination)
            }
        };

        let start_anchor = bends.first().copied().unwrap_or(end);
        let start = geometry::perimeter_point(start_anchor, source);

        let label_anchor = if bends.is_empty() {
            start.lerp(end, 0.5)
        } else {
            bends[label_index.min(bends.len() - 1)]
        };

        Some(ConnectionPath {
            id: connection.id.clone(),
            start,
            bends: bends.to_vec(),
            end,
            label_anchor,
        })
    }

    /// Top-left corner of the selected nodes, if any node is selected.
    pub fn origin(selection: &Selection) -> Option<Pos2> {
        selection.nodes().map(|n| n.position).reduce(|a, b| a.min(b))
    }
}
