//! Dragging a connection label between bends.

use super::{Gesture, CONFIGURATION_ERROR};
use crate::canvas::FlowCanvas;
use crate::error::{CanvasError, Result};
use crate::geometry;
use crate::render::RenderOptions;
use crate::transport::ConnectionPatch;
use crate::types::EntityId;
use egui::{Rect, Vec2};

#[derive(Debug)]
pub(crate) struct LabelDrag {
    pub(super) connection_id: EntityId,
    outline: Rect,
    label_index: usize,
}

impl FlowCanvas {
    /// Starts dragging the label of `connection_id`.
    ///
    /// Labels only move between bends, so nothing starts unless the connection has at
    /// least two. Returns whether the gesture started.
    pub fn begin_label_drag(&self, connection_id: &str, label_height: f32) -> Result<bool> {
        let connection = self.modifiable_connection(connection_id)?;
        if connection.bends.len() < 2 {
            return Ok(false);
        }

        let anchor = self
            .graph
            .borrow()
            .connection_path(&connection)
            .map(|path| path.label_anchor)
            .ok_or_else(|| CanvasError::UnknownComponent(connection_id.to_string()))?;
        let outline = Rect::from_center_size(anchor, egui::vec2(self.config.label_width, label_height));

        self.start_gesture(Gesture::LabelDragging(LabelDrag {
            connection_id: connection_id.to_string(),
            outline,
            label_index: connection.label_index,
        }));
        self.services.renderer.label_drag_outline(Some(outline));
        Ok(true)
    }

    /// Moves the drag outline by `delta` and returns the bend the label would attach to.
    pub fn label_drag(&self, delta: Vec2) -> Result<usize> {
        let (connection_id, outline, previous) = {
            let mut gesture = self.gesture.borrow_mut();
            let Gesture::LabelDragging(drag) = &mut *gesture else {
                return Err(CanvasError::NoGesture("label"));
            };
            drag.outline = drag.outline.translate(delta);
            (drag.connection_id.clone(), drag.outline, drag.label_index)
        };
        self.services.renderer.label_drag_outline(Some(outline));

        let (label_index, path) = {
            let graph = self.graph.borrow();
            let connection = graph
                .connections
                .get(&connection_id)
                .ok_or_else(|| CanvasError::UnknownComponent(connection_id.clone()))?;
            let nearest = geometry::nearest_point(outline.center(), &connection.bends).unwrap_or(previous);
            let path = (nearest != previous)
                .then(|| graph.route(connection, &connection.bends, nearest, None))
                .flatten();
            (nearest, path)
        };

        if let Gesture::LabelDragging(drag) = &mut *self.gesture.borrow_mut() {
            drag.label_index = label_index;
        }
        if let Some(path) = &path {
            self.services.renderer.connection_updated(path, RenderOptions::FULL);
        }
        Ok(label_index)
    }

    /// Releases the label.
    ///
    /// The new index is saved only when it differs from the last saved one. Returns
    /// whether an update was made; a failed update puts the label back.
    pub async fn end_label_drag(&self) -> Result<bool> {
        let drag = match self.take_gesture() {
            Gesture::LabelDragging(drag) => drag,
            other => {
                *self.gesture.borrow_mut() = other;
                return Err(CanvasError::NoGesture("label"));
            }
        };
        self.services.renderer.label_drag_outline(None);

        let saved = self
            .graph
            .borrow()
            .connections
            .get(&drag.connection_id)
            .map(|c| c.label_index)
            .ok_or_else(|| CanvasError::UnknownComponent(drag.connection_id.clone()))?;
        if saved == drag.label_index {
            return Ok(false);
        }

        let mut patch = ConnectionPatch::new(drag.connection_id);
        patch.label_index = Some(drag.label_index);
        self.save_or_revert(patch, CONFIGURATION_ERROR).await?;
        Ok(true)
    }
}
