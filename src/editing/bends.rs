//! Adding, removing and dragging bend points.

use super::{Gesture, CONFIGURATION_ERROR, CONNECTION};
use crate::canvas::FlowCanvas;
use crate::error::{CanvasError, Result};
use crate::geometry;
use crate::render::RenderOptions;
use crate::transport::ConnectionPatch;
use crate::types::{ConnectionEntity, EntityId};
use egui::Pos2;

#[derive(Debug)]
pub(crate) struct BendDrag {
    pub(super) connection_id: EntityId,
    index: usize,
    /// Working copy, including the dragged bend's current position
    bends: Vec<Pos2>,
}

/// Label index after inserting a bend at `inserted`; `bend_count` includes the new bend.
fn label_index_after_insert(label_index: usize, inserted: usize, bend_count: usize) -> usize {
    if bend_count == 1 {
        0
    } else if inserted <= label_index {
        label_index + 1
    } else {
        label_index
    }
}

/// Label index after removing the bend at `removed`; `bend_count` excludes it.
fn label_index_after_remove(label_index: usize, removed: usize, bend_count: usize) -> usize {
    if bend_count <= 1 {
        0
    } else if removed <= label_index {
        label_index.saturating_sub(1)
    } else {
        label_index
    }
}

impl FlowCanvas {
    /// Inserts a bend at `point` into the segment of the path nearest to it.
    ///
    /// # Arguments
    ///
    /// * `connection_id` - The connection to bend
    /// * `point` - Where the bend goes, canvas space
    ///
    /// # Returns
    ///
    /// The updated connection as returned by the authority.
    pub async fn add_bend(&self, connection_id: &str, point: Pos2) -> Result<ConnectionEntity> {
        let connection = self.modifiable_connection(connection_id)?;
        let path = self
            .graph
            .borrow()
            .connection_path(&connection)
            .ok_or_else(|| CanvasError::UnknownComponent(connection_id.to_string()))?;

        let index = geometry::nearest_segment(point, path.start, &connection.bends, path.end);
        let mut bends = connection.bends.clone();
        bends.insert(index, point);

        let mut patch = ConnectionPatch::new(connection_id);
        patch.label_index = Some(label_index_after_insert(
            connection.label_index,
            index,
            bends.len(),
        ));
        patch.bends = Some(bends);
        self.save_or_revert(patch, CONFIGURATION_ERROR).await
    }

    /// Removes the bend at `index`.
    ///
    /// A self-loop must keep at least two bends. The check uses the bends last saved
    /// with the authority; when it fails a notice is shown and nothing is requested.
    pub async fn remove_bend(&self, connection_id: &str, index: usize) -> Result<ConnectionEntity> {
        let connection = self.modifiable_connection(connection_id)?;
        if index >= connection.bends.len() {
            return Err(CanvasError::NoSuchBend {
                connection_id: connection_id.to_string(),
                index,
            });
        }

        let group_id = self.graph.borrow().group_id().to_string();
        if connection.is_self_loop(&group_id) && connection.bends.len() <= 2 {
            self.services.notifier.show_notice(
                CONNECTION,
                "Looping connections must have at least two bend points.",
            );
            return Err(CanvasError::SelfLoopBendMinimum);
        }

        let mut bends = connection.bends.clone();
        bends.remove(index);

        let mut patch = ConnectionPatch::new(connection_id);
        patch.label_index = Some(label_index_after_remove(
            connection.label_index,
            index,
            bends.len(),
        ));
        patch.bends = Some(bends);
        self.save_or_revert(patch, CONFIGURATION_ERROR).await
    }

    /// Starts dragging the bend at `index`.
    pub fn begin_bend_drag(&self, connection_id: &str, index: usize) -> Result<()> {
        let connection = self.modifiable_connection(connection_id)?;
        if index >= connection.bends.len() {
            return Err(CanvasError::NoSuchBend {
                connection_id: connection_id.to_string(),
                index,
            });
        }
        self.start_gesture(Gesture::BendDragging(BendDrag {
            connection_id: connection_id.to_string(),
            index,
            bends: connection.bends,
        }));
        Ok(())
    }

    /// Moves the dragged bend under `pointer` and redraws the path.
    ///
    /// The bend snaps to the alignment grid unless `free` is set. Returns where the bend
    /// was placed.
    pub fn bend_drag(&self, pointer: Pos2, free: bool) -> Result<Pos2> {
        let placed = if free {
            pointer
        } else {
            geometry::snap_to_grid(pointer, self.config.snap_alignment_pixels)
        };
        let (connection_id, bends) = {
            let mut gesture = self.gesture.borrow_mut();
            let Gesture::BendDragging(drag) = &mut *gesture else {
                return Err(CanvasError::NoGesture("bend"));
            };
            drag.bends[drag.index] = placed;
            (drag.connection_id.clone(), drag.bends.clone())
        };

        let path = {
            let graph = self.graph.borrow();
            graph
                .connections
                .get(&connection_id)
                .and_then(|c| graph.route(c, &bends, c.label_index, None))
        };
        if let Some(path) = &path {
            self.services.renderer.connection_updated(path, RenderOptions::PATH_ONLY);
        }
        Ok(placed)
    }

    /// Releases the dragged bend.
    ///
    /// Returns `Ok(false)` without a request when the bends are unchanged from the last
    /// saved ones. A failed update restores the saved bends.
    pub async fn end_bend_drag(&self) -> Result<bool> {
        let drag = match self.take_gesture() {
            Gesture::BendDragging(drag) => drag,
            other => {
                *self.gesture.borrow_mut() = other;
                return Err(CanvasError::NoGesture("bend"));
            }
        };

        let saved = self
            .graph
            .borrow()
            .connections
            .get(&drag.connection_id)
            .map(|c| c.bends.clone())
            .ok_or_else(|| CanvasError::UnknownComponent(drag.connection_id.clone()))?;

        if saved == drag.bends {
            self.revert_connection(&drag.connection_id);
            return Ok(false);
        }

        let mut patch = ConnectionPatch::new(drag.connection_id);
        patch.bends = Some(drag.bends);
        self.save_or_revert(patch, CONFIGURATION_ERROR).await?;
        Ok(true)
    }
}
