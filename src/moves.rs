//! Moving the selection, either across the canvas or into another process group.

use crate::canvas::FlowCanvas;
use crate::eligibility;
use crate::error::{CanvasError, Result};
use crate::geometry;
use crate::notify::report_update_error;
use crate::transport::ConnectionPatch;
use crate::types::{EntityId, EntityKind, NodeEntity, Selection};
use egui::{Pos2, Rect, Vec2};
use futures::future::join_all;
use indexmap::IndexSet;

const COMPONENT_POSITION: &str = "Component Position";
const PROCESS_GROUP: &str = "Process Group";

/// The outline dragged around while the selected nodes are moved.
///
/// The outline snaps to the alignment grid unless the free modifier is held; the
/// accumulated pointer movement is kept separately so snapping never loses distance.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSelection {
    original: Pos2,
    raw: Pos2,
    placed: Pos2,
    size: Vec2,
}

impl DragSelection {
    /// Starts an outline over `bounds`.
    pub fn new(bounds: Rect) -> Self {
        Self {
            original: bounds.min,
            raw: bounds.min,
            placed: bounds.min,
            size: bounds.size(),
        }
    }

    /// Moves the outline by `delta` and returns where it is drawn.
    ///
    /// # Arguments
    ///
    /// * `delta` - Pointer movement since the last step, canvas space
    /// * `free` - Skip snapping for this step
    /// * `alignment` - Grid spacing
    pub fn drag(&mut self, delta: Vec2, free: bool, alignment: f32) -> Rect {
        self.raw += delta;
        self.placed = if free {
            self.raw
        } else {
            geometry::snap_to_grid(self.raw, alignment)
        };
        self.outline()
    }

    /// The outline as currently drawn.
    pub fn outline(&self) -> Rect {
        Rect::from_min_size(self.placed, self.size)
    }

    /// Net movement of the outline since it was created.
    pub fn delta(&self) -> Vec2 {
        self.placed - self.original
    }
}

impl FlowCanvas {
    /// An outline around the selected nodes, or `None` when no node is selected.
    pub fn begin_selection_drag(&self) -> Option<DragSelection> {
        let selection = self.selection();
        geometry::union_all(selection.nodes().map(NodeEntity::bounding_box)).map(DragSelection::new)
    }

    /// Releases a selection drag.
    ///
    /// Dropped on a process group the selection moves into it; anywhere else it is
    /// repositioned by the outline's net movement.
    pub async fn end_selection_drag(&self, drag: DragSelection, drop_group: Option<&str>) -> Result<()> {
        match drop_group {
            Some(group_id) => self.update_components_group(group_id).await,
            None => self.update_components_position(drag.delta()).await.map(|_| ()),
        }
    }

    /// Shifts every selected member by `delta`.
    ///
    /// Selected nodes move, selected connections have every bend shifted, and self-loops
    /// of selected nodes come along even when the loop itself is not selected. Each
    /// member is one independent update; failures are reported and leave that member
    /// where it was. Once all updates settle, the remaining connections of moved nodes
    /// are redrawn.
    ///
    /// # Returns
    ///
    /// The number of updates the authority accepted.
    pub async fn update_components_position(&self, delta: Vec2) -> Result<usize> {
        if delta == Vec2::ZERO {
            return Ok(0);
        }

        let selection = self.selection();
        if !eligibility::can_modify(&selection) {
            return Err(self.refuse(
                COMPONENT_POSITION,
                "Must be authorized to modify every component selected.",
            ));
        }

        let (bend_updates, position_updates) = self.plan_move(&selection, delta);
        if bend_updates.is_empty() && position_updates.is_empty() {
            return Ok(0);
        }
        log::debug!(
            "moving {} nodes and {} connections by {delta:?}",
            position_updates.len(),
            bend_updates.len()
        );

        let connection_saves = bend_updates.into_iter().map(|(id, bends)| {
            let mut patch = ConnectionPatch::new(id);
            patch.bends = Some(bends);
            self.save_connection(patch)
        });
        let node_saves = position_updates
            .iter()
            .map(|(id, position)| self.save_node_position(id, *position));
        let (connections, nodes) = futures::join!(join_all(connection_saves), join_all(node_saves));

        let mut updated_connections = IndexSet::new();
        let mut moved_nodes = Vec::new();
        let mut accepted = 0;
        for result in connections {
            match result {
                Ok(connection) => {
                    updated_connections.insert(connection.id);
                    accepted += 1;
                }
                Err(e) => self.report_move_failure(&e),
            }
        }
        for result in nodes {
            match result {
                Ok(node) => {
                    moved_nodes.push(node.id);
                    accepted += 1;
                }
                Err(e) => self.report_move_failure(&e),
            }
        }

        let dependents: IndexSet<EntityId> = {
            let graph = self.graph.borrow();
            moved_nodes
                .iter()
                .flat_map(|id| graph.component_connections(id))
                .map(|c| c.id.clone())
                .filter(|id| !updated_connections.contains(id))
                .collect()
        };
        for id in &dependents {
            self.refresh_connections(Some(id));
        }

        self.services.renderer.overview_changed();
        Ok(accepted)
    }

    /// Bend updates per connection and new positions per node for moving `selection`.
    fn plan_move(&self, selection: &Selection, delta: Vec2) -> (Vec<(EntityId, Vec<Pos2>)>, Vec<(EntityId, Pos2)>) {
        let graph = self.graph.borrow();
        let group_id = graph.group_id();
        let shifted = |bends: &[Pos2]| bends.iter().map(|b| *b + delta).collect::<Vec<_>>();

        let mut planned: IndexSet<EntityId> = IndexSet::new();
        let mut bend_updates = Vec::new();
        for connection in selection.connections() {
            if !connection.bends.is_empty() && planned.insert(connection.id.clone()) {
                bend_updates.push((connection.id.clone(), shifted(&connection.bends)));
            }
        }

        let mut position_updates = Vec::new();
        for node in selection.nodes() {
            for connection in graph.component_connections(&node.id) {
                if connection.is_self_loop(group_id)
                    && !connection.bends.is_empty()
                    && planned.insert(connection.id.clone())
                {
                    bend_updates.push((connection.id.clone(), shifted(&connection.bends)));
                }
            }
            position_updates.push((node.id.clone(), node.position + delta));
        }

        (bend_updates, position_updates)
    }

    fn report_move_failure(&self, error: &CanvasError) {
        log::warn!("unable to move component: {error}");
        report_update_error(self.services.notifier.as_ref(), COMPONENT_POSITION, error);
    }

    /// Moves the selection into the child group `group_id`.
    ///
    /// The selection is cleared first. Both the selection and the destination group
    /// must be modifiable. Afterwards the destination group is reloaded so its summary
    /// reflects the new contents.
    pub async fn update_components_group(&self, group_id: &str) -> Result<()> {
        let selection = self.selection();
        self.clear_selection();

        if !eligibility::can_modify(&selection) {
            return Err(self.refuse(
                COMPONENT_POSITION,
                "Must be authorized to modify every component selected.",
            ));
        }

        let destination = self.graph.borrow().selection([group_id]);
        match destination.single() {
            Some(group) if group.kind() == EntityKind::ProcessGroup => {}
            _ => return Err(CanvasError::UnknownComponent(group_id.to_string())),
        }
        if !eligibility::can_modify(&destination) {
            return Err(self.refuse(
                COMPONENT_POSITION,
                "Not authorized to modify the destination group.",
            ));
        }

        self.move_components(&selection, group_id).await?;
        if let Err(e) = self.reload_node(group_id).await {
            log::warn!("unable to reload group {group_id}: {e}");
        }
        Ok(())
    }

    /// Moves the selection into the parent of the displayed group.
    pub async fn move_components_to_parent(&self) -> Result<()> {
        let Some(parent_id) = self.group().parent_group_id else {
            self.services
                .notifier
                .show_notice(PROCESS_GROUP, "Components are already in the topmost group.");
            return Err(CanvasError::AlreadyTopmost);
        };

        let selection = self.selection();
        self.clear_selection();
        self.move_components(&selection, &parent_id).await
    }

    /// Hands `selection` to the snippet service and drops the moved members locally.
    async fn move_components(&self, selection: &Selection, destination_group_id: &str) -> Result<()> {
        if selection.is_empty() {
            return Ok(());
        }

        let parent_group_id = self.graph.borrow().group_id().to_string();
        log::info!(
            "moving {} components from {parent_group_id} to {destination_group_id}",
            selection.len()
        );
        if let Err(e) = self
            .services
            .snippets
            .move_snippet(selection, &parent_group_id, destination_group_id)
            .await
        {
            report_update_error(self.services.notifier.as_ref(), PROCESS_GROUP, &e);
            return Err(e);
        }

        let node_ids: Vec<&str> = selection.nodes().map(|n| n.id.as_str()).collect();
        let connection_ids: Vec<&str> = selection.connections().map(|c| c.id.as_str()).collect();
        self.remove_nodes(node_ids);
        self.remove_connections(connection_ids).await;

        self.services.renderer.overview_changed();
        Ok(())
    }

    /// Shows a permission notice and builds the matching error.
    fn refuse(&self, header: &str, message: &str) -> CanvasError {
        self.services.notifier.show_notice(header, message);
        CanvasError::not_authorized(header, message)
    }
}
