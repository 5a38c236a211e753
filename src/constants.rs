//! Shared canvas-wide constants.
//! Centralizes the default values used by geometry, gestures and synchronization.

// Connection label
/// Width of a rendered connection label, in canvas units.
pub const LABEL_WIDTH: f32 = 224.0;
/// Horizontal distance from a component's right edge to the bends of a freshly seeded self-loop.
pub const SELF_LOOP_X_OFFSET: f32 = LABEL_WIDTH / 2.0 + 5.0;
/// Vertical distance from a component's middle to each bend of a freshly seeded self-loop.
pub const SELF_LOOP_Y_OFFSET: f32 = 25.0;

// Gestures
/// Grid size that dragged bends and selections snap to unless a modifier is held.
pub const SNAP_ALIGNMENT_PIXELS: f32 = 8.0;
/// Distance the pointer must travel before a drag-to-connect considers any destination.
pub const CONNECT_DEAD_ZONE: f32 = 10.0;

// Viewport
/// Multiplicative step applied by a single zoom in/out.
pub const ZOOM_INCREMENT: f32 = 1.2;
/// Smallest allowed scale.
pub const MIN_SCALE: f32 = 0.2;
/// Largest allowed scale.
pub const MAX_SCALE: f32 = 8.0;
/// Screen padding kept around the graph when fitting it into the container.
pub const FIT_PADDING: f32 = 10.0;

// Synchronization
/// Longest URL considered safe across browsers and application servers.
pub const MAX_URL_LENGTH: usize = 2000;
/// Age (ms) after which the recently added/removed caches may be swept.
pub const CACHE_TTL_MILLIS: u64 = 30_000;
/// Key prefix for persisted per-group view state.
pub const VIEW_STORAGE_PREFIX: &str = "nifi-view-";
/// Alias used in deep links for the topmost group.
pub const ROOT_GROUP_ALIAS: &str = "root";

// Default component dimensions (canvas units)
/// Processor body size.
pub const PROCESSOR_SIZE: (f32, f32) = (350.0, 130.0);
/// Input/output port body size.
pub const PORT_SIZE: (f32, f32) = (240.0, 50.0);
/// Process group body size.
pub const PROCESS_GROUP_SIZE: (f32, f32) = (380.0, 176.0);
/// Remote process group body size.
pub const REMOTE_PROCESS_GROUP_SIZE: (f32, f32) = (380.0, 158.0);
/// Funnel body size.
pub const FUNNEL_SIZE: (f32, f32) = (48.0, 48.0);
/// Label size when the entity does not carry its own.
pub const LABEL_SIZE: (f32, f32) = (148.0, 148.0);
