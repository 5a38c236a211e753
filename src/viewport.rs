//! Scale/translate state of the canvas and the conversions derived from it.

use crate::config::CanvasConfig;
use crate::geometry;
use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Persisted form of a [`Viewport`], stored per group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    /// Zoom factor
    pub scale: f32,
    /// Horizontal pan in screen pixels
    pub translate_x: f32,
    /// Vertical pan in screen pixels
    pub translate_y: f32,
}

impl ViewState {
    fn is_valid(&self) -> bool {
        self.scale.is_finite()
            && self.scale > 0.0
            && self.translate_x.is_finite()
            && self.translate_y.is_finite()
    }
}

/// The mapping between screen space and canvas space.
///
/// `canvas = (screen - translate) / scale`. This is the single source of truth for the
/// transform: nothing else caches scale or translate beyond one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    scale: f32,
    translate: Vec2,
    min_scale: f32,
    max_scale: f32,
    zoom_increment: f32,
    fit_padding: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(&CanvasConfig::default())
    }
}

impl Viewport {
    /// Creates an identity viewport using the zoom limits from `config`.
    pub fn new(config: &CanvasConfig) -> Self {
        Self {
            scale: 1.0,
            translate: Vec2::ZERO,
            min_scale: config.min_scale,
            max_scale: config.max_scale,
            zoom_increment: config.zoom_increment,
            fit_padding: config.fit_padding,
        }
    }

    /// Current zoom factor.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Current pan in screen pixels.
    pub fn translate(&self) -> Vec2 {
        self.translate
    }

    /// Replaces the transform. The scale is clamped into the configured range.
    pub fn set_transform(&mut self, translate: Vec2, scale: f32) {
        self.translate = translate;
        self.scale = scale.clamp(self.min_scale, self.max_scale);
    }

    /// Pans by a screen-space delta.
    pub fn translate_by(&mut self, delta: Vec2) {
        self.translate += delta;
    }

    /// Zooms in one step, keeping the middle of the container fixed.
    pub fn zoom_in(&mut self, container: Vec2) {
        self.zoom_around(self.scale * self.zoom_increment, (container / 2.0).to_pos2());
    }

    /// Zooms out one step, keeping the middle of the container fixed.
    pub fn zoom_out(&mut self, container: Vec2) {
        self.zoom_around(self.scale / self.zoom_increment, (container / 2.0).to_pos2());
    }

    /// Sets the scale while keeping the canvas point under `anchor` (screen space) in place.
    pub fn zoom_around(&mut self, scale: f32, anchor: Pos2) {
        let fixed = self.screen_to_canvas(anchor);
        self.scale = scale.clamp(self.min_scale, self.max_scale);
        self.translate = anchor.to_vec2() - fixed.to_vec2() * self.scale;
    }

    /// Chooses a transform that shows all of `graph` inside `container`.
    ///
    /// Graphs that already fit are shown at scale 1; larger graphs are scaled down so
    /// the whole bounding box is visible with padding. The graph is then centered.
    pub fn fit(&mut self, graph: Rect, container: Vec2) {
        let available = container - Vec2::splat(self.fit_padding * 2.0);
        let scale = if graph.width() > available.x || graph.height() > available.y {
            (available.x / graph.width()).min(available.y / graph.height())
        } else {
            1.0
        };
        self.center_on(graph, container, scale);
    }

    /// Resets to scale 1, centered on `selection` when given, else at the origin.
    pub fn actual_size(&mut self, selection: Option<Rect>, container: Vec2) {
        match selection {
            Some(bbox) => self.center_on(bbox, container, 1.0),
            None => self.set_transform(Vec2::ZERO, 1.0),
        }
    }

    /// Centers `bbox` in `container` at `scale`.
    pub fn center_on(&mut self, bbox: Rect, container: Vec2, scale: f32) {
        let scale = scale.clamp(self.min_scale, self.max_scale);
        let screen = container / scale;
        let center = screen / 2.0 - bbox.size() / 2.0;
        self.set_transform((center - bbox.min.to_vec2()) * scale, scale);
    }

    /// Converts a screen position to canvas space.
    pub fn screen_to_canvas(&self, screen: Pos2) -> Pos2 {
        ((screen.to_vec2() - self.translate) / self.scale).to_pos2()
    }

    /// Converts a canvas position to screen space.
    pub fn canvas_to_screen(&self, canvas: Pos2) -> Pos2 {
        (canvas.to_vec2() * self.scale + self.translate).to_pos2()
    }

    /// The canvas-space rectangle currently visible in `container`.
    pub fn visible_canvas_rect(&self, container: Vec2) -> Rect {
        Rect::from_min_size(self.screen_to_canvas(Pos2::ZERO), container / self.scale)
    }

    /// Whether `bbox` is visible in `container`; see [`geometry::viewport_contains`].
    pub fn contains(&self, bbox: Rect, container: Vec2, strict: bool) -> bool {
        geometry::viewport_contains(bbox, self.translate, self.scale, container, strict)
    }

    /// Snapshot of the transform for persistence.
    pub fn view_state(&self) -> ViewState {
        ViewState {
            scale: self.scale,
            translate_x: self.translate.x,
            translate_y: self.translate.y,
        }
    }

    /// Writes the transform to `storage` under `prefix + group_id`.
    pub fn persist<S: eframe::Storage + ?Sized>(
        &self,
        storage: &mut S,
        prefix: &str,
        group_id: &str,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_string(&self.view_state())?;
        storage.set_string(&format!("{prefix}{group_id}"), value);
        storage.flush();
        Ok(())
    }

    /// Restores the transform saved for `group_id`.
    ///
    /// Best effort: a missing, unparsable or non-finite entry leaves the viewport
    /// untouched and returns `false`.
    pub fn restore<S: eframe::Storage + ?Sized>(
        &mut self,
        storage: &S,
        prefix: &str,
        group_id: &str,
    ) -> bool {
        let Some(raw) = storage.get_string(&format!("{prefix}{group_id}")) else {
            return false;
        };
        match serde_json::from_str::<ViewState>(&raw) {
            Ok(state) if state.is_valid() => {
                self.set_transform(egui::vec2(state.translate_x, state.translate_y), state.scale);
                true
            }
            Ok(_) => {
                log::debug!("ignoring invalid view state for group {group_id}");
                false
            }
            Err(e) => {
                log::debug!("unable to parse view state for group {group_id}: {e}");
                false
            }
        }
    }
}
