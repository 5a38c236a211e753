//! # Flow Canvas
//!
//! The interaction core of a dataflow canvas: components placed on a pannable, zoomable
//! surface and joined by directional connections that the user routes with bends.
//!
//! The crate owns the parts of the canvas that are independent of drawing:
//! - **Geometry**: perimeter points, segment hit-testing and grid snapping
//! - **Viewport**: the screen/canvas transform, fitting and persisted view state
//! - **Entity stores**: revision-checked mirrors of the flow authority's components
//! - **Eligibility**: pure predicates deciding which commands a selection allows
//! - **Connection editing**: connect, bend, endpoint and label gestures
//! - **Moves**: repositioning the selection or moving it between groups
//! - **Deep links**: the displayed group and selection mirrored in the address bar
//!
//! Drawing, dialogs, HTTP and storage belong to the host, which plugs them in through
//! the traits in [`render`], [`notify`], [`transport`] and [`services`].

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod canvas;
pub mod config;
pub mod constants;
mod deep_link;
mod editing;
pub mod eligibility;
mod error;
pub mod geometry;
pub mod graph;
mod moves;
pub mod notify;
pub mod render;
pub mod services;
pub mod store;
pub mod transport;
mod types;
pub mod viewport;

#[cfg(test)]
mod testing;

// Re-export public types and functions
pub use canvas::{Collaborators, FlowCanvas};
pub use config::CanvasConfig;
pub use deep_link::DeepLink;
pub use editing::{ConnectOutcome, GestureKind, ReattachOutcome};
pub use error::{CanvasError, Result, TransportError};
pub use graph::{ConnectionPath, FlowGraph};
pub use moves::DragSelection;
pub use types::*;
pub use viewport::{ViewState, Viewport};
