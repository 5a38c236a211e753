//! Hooks through which the canvas asks the host to redraw.
//!
//! Drawing itself belongs to the host application. Every hook has a no-op default so a
//! host only implements what it actually renders.

use crate::graph::ConnectionPath;
use crate::types::{ConnectionEntity, EntityId, NodeEntity};
use egui::{Pos2, Rect};

/// Which parts of a connection need redrawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Redraw the path and its endpoints
    pub update_path: bool,
    /// Redraw the label text
    pub update_label: bool,
    /// Animate the change
    pub transition: bool,
}

impl RenderOptions {
    /// Path and label, no animation.
    pub const FULL: RenderOptions = RenderOptions {
        update_path: true,
        update_label: true,
        transition: false,
    };

    /// Path only; used while a gesture is in progress.
    pub const PATH_ONLY: RenderOptions = RenderOptions {
        update_path: true,
        update_label: false,
        transition: false,
    };
}

/// The rubber-band line drawn while dragging out a new connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectPreview {
    /// Straight line to wherever the pointer is
    Line {
        /// Drag origin
        from: Pos2,
        /// Pointer position
        to: Pos2,
    },
    /// Straight line to the perimeter of a valid destination
    Snapped {
        /// Drag origin
        from: Pos2,
        /// Perimeter point of the destination
        to: Pos2,
        /// Destination id
        destination_id: EntityId,
    },
    /// Closed triangle looping back into the source
    SelfLoop {
        /// The triangle's three corners
        points: [Pos2; 3],
    },
}

/// Receives redraw requests from the canvas.
pub trait CanvasRenderer {
    /// Connections seen for the first time; `selected` when they should be selected.
    fn connections_entered(&self, _ids: &[EntityId], _selected: bool) {}

    /// A connection's geometry or label changed.
    fn connection_updated(&self, _path: &ConnectionPath, _options: RenderOptions) {}

    /// A connection left the canvas.
    fn connection_removed(&self, _id: &str) {}

    /// A connection's live queue status changed.
    fn connection_status_changed(&self, _connection: &ConnectionEntity) {}

    /// Connections should be stacked in this order, bottom first.
    fn order_connections(&self, _ids: &[EntityId]) {}

    /// Nodes seen for the first time.
    fn nodes_entered(&self, _ids: &[EntityId], _selected: bool) {}

    /// A node changed.
    fn node_updated(&self, _node: &NodeEntity, _transition: bool) {}

    /// A node left the canvas.
    fn node_removed(&self, _id: &str) {}

    /// The current selection changed.
    fn selection_changed(&self, _ids: &[EntityId]) {}

    /// Preview of a connection being dragged out, `None` to clear it.
    fn connect_preview(&self, _preview: Option<&ConnectPreview>) {}

    /// Outline dragged while repositioning a label, `None` to clear it.
    fn label_drag_outline(&self, _outline: Option<Rect>) {}

    /// The miniature overview of the whole graph is stale.
    fn overview_changed(&self) {}
}

/// A renderer that draws nothing.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl CanvasRenderer for NullRenderer {}
