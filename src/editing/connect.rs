//! Dragging a new connection out of a source component.

use super::{report_update_error, Gesture, CONNECTION};
use crate::canvas::FlowCanvas;
use crate::eligibility;
use crate::error::{CanvasError, Result};
use crate::geometry;
use crate::render::ConnectPreview;
use crate::types::EntityId;
use egui::Pos2;

#[derive(Debug)]
pub(crate) struct ConnectDrag {
    source_id: EntityId,
    /// Where the drag started, canvas space
    origin: Pos2,
    /// Valid destination under the pointer at the last step
    destination: Option<EntityId>,
}

/// How a connect gesture ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A connection with this id was created
    Created(EntityId),
    /// Released back over the source; nothing happened
    Reset,
    /// Released over nothing connectable
    Discarded,
    /// The user dismissed the configuration dialog
    Cancelled,
}

impl FlowCanvas {
    /// Starts dragging a connection out of `source_id` with the pointer at `pointer`.
    pub fn begin_connect(&self, source_id: &str, pointer: Pos2) -> Result<()> {
        let selection = self.graph.borrow().selection([source_id]);
        if selection.is_empty() {
            return Err(CanvasError::UnknownComponent(source_id.to_string()));
        }
        if !eligibility::is_valid_connection_source(&selection) {
            return Err(CanvasError::not_authorized(
                CONNECTION,
                "The selected component cannot be the source of a connection.",
            ));
        }

        self.start_gesture(Gesture::Connecting(ConnectDrag {
            source_id: source_id.to_string(),
            origin: pointer,
            destination: None,
        }));
        self.services.renderer.connect_preview(Some(&ConnectPreview::Line {
            from: pointer,
            to: pointer,
        }));
        Ok(())
    }

    /// Follows the pointer and returns the preview that was drawn.
    ///
    /// The component under the pointer becomes the candidate destination once the
    /// pointer has left the dead zone around the drag origin and the component accepts
    /// incoming connections.
    pub fn connect_drag(&self, pointer: Pos2) -> Result<ConnectPreview> {
        let preview = {
            let mut gesture = self.gesture.borrow_mut();
            let Gesture::Connecting(drag) = &mut *gesture else {
                return Err(CanvasError::NoGesture("connect"));
            };

            let moved = pointer - drag.origin;
            let dead_zone = self.config.connect_dead_zone;
            let outside_dead_zone = moved.x.abs() > dead_zone || moved.y.abs() > dead_zone;

            let graph = self.graph.borrow();
            let candidate = graph.node_at(pointer).filter(|hovered| {
                outside_dead_zone
                    && eligibility::is_valid_connection_destination(
                        &graph.selection([hovered.id.as_str()]),
                    )
            });
            drag.destination = candidate.map(|c| c.id.clone());

            match candidate {
                Some(destination) if destination.id == drag.source_id => {
                    let x = drag.origin.x + destination.size().x / 2.0 + self.config.self_loop_x_offset;
                    let y_offset = self.config.self_loop_y_offset;
                    ConnectPreview::SelfLoop {
                        points: [
                            drag.origin,
                            egui::pos2(x, drag.origin.y - y_offset),
                            egui::pos2(x, drag.origin.y + y_offset),
                        ],
                    }
                }
                Some(destination) => ConnectPreview::Snapped {
                    from: drag.origin,
                    to: geometry::perimeter_point(drag.origin, destination.bounding_box()),
                    destination_id: destination.id.clone(),
                },
                None => ConnectPreview::Line {
                    from: drag.origin,
                    to: pointer,
                },
            }
        };

        self.services.renderer.connect_preview(Some(&preview));
        Ok(preview)
    }

    /// Releases the connect gesture at `pointer`.
    ///
    /// Over a valid destination the configuration collaborator is asked to create the
    /// connection, which is then added and selected. Otherwise nothing is requested.
    pub async fn end_connect(&self, pointer: Pos2) -> Result<ConnectOutcome> {
        let drag = match self.take_gesture() {
            Gesture::Connecting(drag) => drag,
            other => {
                *self.gesture.borrow_mut() = other;
                return Err(CanvasError::NoGesture("connect"));
            }
        };
        self.services.renderer.connect_preview(None);

        let Some(destination_id) = drag.destination else {
            let over_source = self
                .graph
                .borrow()
                .node_bounds(&drag.source_id)
                .is_some_and(|body| body.contains(pointer));
            return Ok(if over_source {
                ConnectOutcome::Reset
            } else {
                ConnectOutcome::Discarded
            });
        };

        log::debug!("creating connection {} -> {destination_id}", drag.source_id);
        let created = self
            .services
            .configurator
            .create_connection(&drag.source_id, &destination_id)
            .await;

        match created {
            Ok(connection) => {
                let id = connection.id.clone();
                self.add_connections(vec![connection], true);
                self.reload_neighbors(Some(&drag.source_id), Some(&destination_id))
                    .await;
                Ok(ConnectOutcome::Created(id))
            }
            Err(CanvasError::Cancelled) => Ok(ConnectOutcome::Cancelled),
            Err(e) => {
                report_update_error(self.services.notifier.as_ref(), CONNECTION, &e);
                Err(e)
            }
        }
    }
}
