//! Dragging a connection's destination end onto another component.

use super::{report_update_error, Gesture, CONNECTION};
use crate::canvas::FlowCanvas;
use crate::eligibility;
use crate::error::{CanvasError, Result};
use crate::geometry;
use crate::render::RenderOptions;
use crate::store::{Incoming, SetOptions};
use crate::transport::{ConnectionPatch, DestinationPatch};
use crate::types::{EntityId, NodeEntity};
use egui::Pos2;

#[derive(Debug)]
pub(crate) struct EndpointDrag {
    pub(super) connection_id: EntityId,
    /// Valid destination under the pointer at the last step
    destination: Option<EntityId>,
}

/// How an endpoint drag ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReattachOutcome {
    /// The connection now ends at the new destination
    Reattached,
    /// The connection was left as it was
    Reverted,
}

impl FlowCanvas {
    /// Starts dragging the destination end of `connection_id`.
    pub fn begin_endpoint_drag(&self, connection_id: &str) -> Result<()> {
        self.modifiable_connection(connection_id)?;
        self.start_gesture(Gesture::EndpointDragging(EndpointDrag {
            connection_id: connection_id.to_string(),
            destination: None,
        }));
        Ok(())
    }

    /// Moves the dragged end to `pointer` and returns the valid destination under it.
    ///
    /// The end follows the pointer, snapping to the perimeter of a valid destination
    /// while one is hovered. Only the path is redrawn.
    pub fn endpoint_drag(&self, pointer: Pos2) -> Result<Option<EntityId>> {
        let connection_id = match &*self.gesture.borrow() {
            Gesture::EndpointDragging(drag) => drag.connection_id.clone(),
            _ => return Err(CanvasError::NoGesture("endpoint")),
        };

        let (destination, path) = {
            let graph = self.graph.borrow();
            let connection = graph
                .connections
                .get(&connection_id)
                .ok_or_else(|| CanvasError::UnknownComponent(connection_id.clone()))?;

            let candidate = graph.node_at(pointer).filter(|hovered| {
                eligibility::is_valid_connection_destination(&graph.selection([hovered.id.as_str()]))
            });

            let end = match candidate {
                Some(node) => {
                    let anchor = match connection.bends.last() {
                        Some(bend) => *bend,
                        None => graph
                            .node_bounds(connection.effective_source_id(graph.group_id()))
                            .map_or(pointer, |source| source.center()),
                    };
                    geometry::perimeter_point(anchor, node.bounding_box())
                }
                None => pointer,
            };
            let path = graph.route(connection, &connection.bends, connection.label_index, Some(end));
            (candidate.map(|n| n.id.clone()), path)
        };

        if let Gesture::EndpointDragging(drag) = &mut *self.gesture.borrow_mut() {
            drag.destination = destination.clone();
        }
        if let Some(path) = &path {
            self.services.renderer.connection_updated(path, RenderOptions::PATH_ONLY);
        }
        Ok(destination)
    }

    /// Releases the dragged end.
    ///
    /// Over a local or remote group the port is chosen through the configuration
    /// collaborator. Over any other valid destination the connection is updated to end
    /// there; a connection that becomes a self-loop with fewer than two bends is given
    /// two. Anywhere else, or when the update fails, the connection is redrawn as it was.
    pub async fn end_endpoint_drag(&self) -> Result<ReattachOutcome> {
        let drag = match self.take_gesture() {
            Gesture::EndpointDragging(drag) => drag,
            other => {
                *self.gesture.borrow_mut() = other;
                return Err(CanvasError::NoGesture("endpoint"));
            }
        };

        let (connection, destination, group_id) = {
            let graph = self.graph.borrow();
            let connection = graph.connections.get(&drag.connection_id).cloned();
            let destination = drag.destination.as_deref().and_then(|id| graph.nodes.get(id)).cloned();
            (connection, destination, graph.group_id().to_string())
        };
        let Some(connection) = connection else {
            return Err(CanvasError::UnknownComponent(drag.connection_id));
        };
        let Some(destination) = destination else {
            self.revert_endpoint(&connection.id);
            return Ok(ReattachOutcome::Reverted);
        };

        let previous_destination = connection.effective_destination_id(&group_id).to_string();

        if destination.kind.is_group() {
            return self
                .choose_destination_port(&connection.id, &destination, &previous_destination)
                .await;
        }

        let Some(kind) = eligibility::connectable_type_for_destination(destination.kind) else {
            self.revert_endpoint(&connection.id);
            return Ok(ReattachOutcome::Reverted);
        };

        let mut patch = ConnectionPatch::new(connection.id.clone());
        patch.destination = Some(DestinationPatch {
            id: destination.id.clone(),
            group_id: group_id.clone(),
            kind,
        });
        if connection.bends.len() < 2 && connection.source_id == destination.id {
            let bends = geometry::self_loop_bends(
                destination.bounding_box(),
                self.config.self_loop_x_offset,
                self.config.self_loop_y_offset,
            );
            patch.bends = Some(bends.to_vec());
        }

        match self.save_connection(patch).await {
            Ok(updated) => {
                self.reload_neighbors(None, Some(&previous_destination)).await;
                self.reload_neighbors(
                    Some(updated.effective_source_id(&group_id)),
                    Some(updated.effective_destination_id(&group_id)),
                )
                .await;
                Ok(ReattachOutcome::Reattached)
            }
            Err(e) => {
                log::warn!("unable to reattach connection {}: {e}", connection.id);
                report_update_error(self.services.notifier.as_ref(), CONNECTION, &e);
                self.revert_endpoint(&connection.id);
                Err(e)
            }
        }
    }

    async fn choose_destination_port(
        &self,
        connection_id: &str,
        group: &NodeEntity,
        previous_destination: &str,
    ) -> Result<ReattachOutcome> {
        let Some(connection) = self.graph.borrow().connections.get(connection_id).cloned() else {
            return Err(CanvasError::UnknownComponent(connection_id.to_string()));
        };

        match self.services.configurator.choose_port(&connection, group).await {
            Ok(updated) => {
                self.set_connections(Incoming::One(updated), SetOptions::authored())
                    .await;
                self.reload_neighbors(None, Some(previous_destination)).await;
                Ok(ReattachOutcome::Reattached)
            }
            Err(CanvasError::Cancelled) => {
                self.revert_endpoint(connection_id);
                Ok(ReattachOutcome::Reverted)
            }
            Err(e) => {
                report_update_error(self.services.notifier.as_ref(), CONNECTION, &e);
                self.revert_endpoint(connection_id);
                Err(e)
            }
        }
    }

    fn revert_endpoint(&self, connection_id: &str) {
        self.render_connection(connection_id, RenderOptions::PATH_ONLY);
    }
}
