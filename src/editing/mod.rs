//! Pointer gestures that edit connections.
//!
//! At most one gesture is active per session. Each gesture follows the same shape: a
//! `begin_*` call validates the target and enters the state, drag steps only re-render,
//! and the `end_*` call issues at most one structural update. A failed update leaves the
//! store untouched and redraws the connection from its last saved state.

mod bends;
mod connect;
mod endpoint;
mod label;

#[cfg(test)]
mod tests;

pub use connect::ConnectOutcome;
pub use endpoint::ReattachOutcome;

use crate::canvas::FlowCanvas;
use crate::error::{CanvasError, Result};
use crate::notify::report_update_error;
use crate::transport::ConnectionPatch;
use crate::types::{ConnectionEntity, Permissions};
use bends::BendDrag;
use connect::ConnectDrag;
use endpoint::EndpointDrag;
use label::LabelDrag;

/// Notice header for failed bend and label updates.
const CONFIGURATION_ERROR: &str = "Configuration Error";

/// Notice header for connect and reattach failures.
const CONNECTION: &str = "Connection";

/// The gesture in progress, with its working state.
#[derive(Debug, Default)]
pub(crate) enum Gesture {
    #[default]
    Idle,
    Connecting(ConnectDrag),
    BendDragging(BendDrag),
    EndpointDragging(EndpointDrag),
    LabelDragging(LabelDrag),
}

/// Which gesture is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    /// Nothing
    Idle,
    /// Dragging out a new connection
    Connecting,
    /// Dragging a bend point
    BendDragging,
    /// Dragging a connection's destination end
    EndpointDragging,
    /// Dragging a connection label
    LabelDragging,
}

impl Gesture {
    fn kind(&self) -> GestureKind {
        match self {
            Gesture::Idle => GestureKind::Idle,
            Gesture::Connecting(_) => GestureKind::Connecting,
            Gesture::BendDragging(_) => GestureKind::BendDragging,
            Gesture::EndpointDragging(_) => GestureKind::EndpointDragging,
            Gesture::LabelDragging(_) => GestureKind::LabelDragging,
        }
    }
}

impl FlowCanvas {
    /// Which gesture is in progress.
    pub fn active_gesture(&self) -> GestureKind {
        self.gesture.borrow().kind()
    }

    /// Abandons the gesture in progress and redraws whatever it touched.
    pub fn cancel_gesture(&self) {
        let gesture = std::mem::take(&mut *self.gesture.borrow_mut());
        let renderer = &self.services.renderer;
        match gesture {
            Gesture::Idle => {}
            Gesture::Connecting(_) => renderer.connect_preview(None),
            Gesture::BendDragging(drag) => self.revert_connection(&drag.connection_id),
            Gesture::EndpointDragging(drag) => self.revert_connection(&drag.connection_id),
            Gesture::LabelDragging(drag) => {
                renderer.label_drag_outline(None);
                self.revert_connection(&drag.connection_id);
            }
        }
    }

    /// Ends the gesture in progress and hands back its state.
    fn take_gesture(&self) -> Gesture {
        std::mem::take(&mut *self.gesture.borrow_mut())
    }

    fn start_gesture(&self, gesture: Gesture) {
        let previous = self.active_gesture();
        if previous != GestureKind::Idle {
            log::debug!("{previous:?} superseded by {:?}", gesture.kind());
            self.cancel_gesture();
        }
        *self.gesture.borrow_mut() = gesture;
    }

    /// Redraws a connection from its last saved state.
    fn revert_connection(&self, connection_id: &str) {
        self.render_connection(connection_id, crate::render::RenderOptions::FULL);
    }

    /// A held connection the user may modify.
    fn modifiable_connection(&self, connection_id: &str) -> Result<ConnectionEntity> {
        let connection = self
            .graph
            .borrow()
            .connections
            .get(connection_id)
            .cloned()
            .ok_or_else(|| CanvasError::UnknownComponent(connection_id.to_string()))?;
        if connection.permissions != Permissions::FULL {
            return Err(CanvasError::not_authorized(
                CONNECTION,
                "Not authorized to modify this connection.",
            ));
        }
        Ok(connection)
    }

    /// Saves `patch`, reporting a failure under `header` and redrawing the last saved state.
    async fn save_or_revert(&self, patch: ConnectionPatch, header: &str) -> Result<ConnectionEntity> {
        let connection_id = patch.id.clone();
        match self.save_connection(patch).await {
            Ok(updated) => Ok(updated),
            Err(e) => {
                log::warn!("unable to update connection {connection_id}: {e}");
                report_update_error(self.services.notifier.as_ref(), header, &e);
                self.revert_connection(&connection_id);
                Err(e)
            }
        }
    }
}
