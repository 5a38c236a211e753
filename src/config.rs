//! Tunable settings for a canvas session.

use crate::constants;
use serde::{Deserialize, Serialize};

/// Settings shared by every part of a canvas session.
///
/// Missing fields fall back to the compile-time defaults in [`crate::constants`], so a
/// partial JSON document such as `{"apiBase": "/nifi-api"}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanvasConfig {
    /// Base URL of the flow API, without a trailing slash
    pub api_base: String,
    /// Key prefix for persisted per-group view state
    pub view_storage_prefix: String,
    /// Grid size dragged bends and selections snap to
    pub snap_alignment_pixels: f32,
    /// Distance the pointer must travel before a connect gesture looks for a destination
    pub connect_dead_zone: f32,
    /// Horizontal offset of seeded self-loop bends from the component's right edge
    pub self_loop_x_offset: f32,
    /// Vertical offset of seeded self-loop bends from the component's middle
    pub self_loop_y_offset: f32,
    /// Width of a rendered connection label
    pub label_width: f32,
    /// Longest URL that will be issued or written to the address bar
    pub max_url_length: usize,
    /// Multiplicative zoom step
    pub zoom_increment: f32,
    /// Smallest allowed scale
    pub min_scale: f32,
    /// Largest allowed scale
    pub max_scale: f32,
    /// Screen padding kept around the graph when fitting
    pub fit_padding: f32,
    /// Age (ms) after which recently added/removed ids stop shielding the store
    pub cache_ttl_millis: u64,
    /// Sent with every structural update; acknowledges edits made while a node is disconnected
    pub disconnected_node_acknowledged: bool,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            api_base: "../nifi-api".to_string(),
            view_storage_prefix: constants::VIEW_STORAGE_PREFIX.to_string(),
            snap_alignment_pixels: constants::SNAP_ALIGNMENT_PIXELS,
            connect_dead_zone: constants::CONNECT_DEAD_ZONE,
            self_loop_x_offset: constants::SELF_LOOP_X_OFFSET,
            self_loop_y_offset: constants::SELF_LOOP_Y_OFFSET,
            label_width: constants::LABEL_WIDTH,
            max_url_length: constants::MAX_URL_LENGTH,
            zoom_increment: constants::ZOOM_INCREMENT,
            min_scale: constants::MIN_SCALE,
            max_scale: constants::MAX_SCALE,
            fit_padding: constants::FIT_PADDING,
            cache_ttl_millis: constants::CACHE_TTL_MILLIS,
            disconnected_node_acknowledged: false,
        }
    }
}

impl CanvasConfig {
    /// Serialize the configuration to a JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Clamps a scale into the configured zoom range.
    pub fn clamp_scale(&self, scale: f32) -> f32 {
        scale.clamp(self.min_scale, self.max_scale)
    }
}
