//! Pure geometry used to route connections between arbitrarily sized nodes.
//!
//! Everything in here works in canvas space and is free of state: the connection
//! editing code, the store and the viewport all call into these functions rather than
//! caching derived geometry.

use egui::{Pos2, Rect, Vec2};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// Returns the point where the ray from the center of `bbox` toward `p` leaves the box.
///
/// The box is split into four wedges by its diagonals. `alpha` (the angle of `p` around
/// the center, normalized to `[0, 2π)`) is compared against the diagonal angle `theta`
/// to pick the edge, and the intersection is solved with `tan(alpha)` on the vertical
/// edges and `tan(π/2 − alpha)` on the horizontal ones.
///
/// # Arguments
///
/// * `p` - The point the connector is aimed at
/// * `bbox` - The box the connector leaves from; must not be empty
///
/// # Returns
///
/// A point on the boundary of `bbox`
pub fn perimeter_point(p: Pos2, bbox: Rect) -> Pos2 {
    let center = bbox.center();
    let x_radius = bbox.width() / 2.0;
    let y_radius = bbox.height() / 2.0;

    let mut alpha = (p.y - center.y).atan2(p.x - center.x);
    if alpha < 0.0 {
        alpha += TAU;
    }

    let theta = bbox.height().atan2(bbox.width());
    let tan_alpha = alpha.tan();
    let tan_beta = (FRAC_PI_2 - alpha).tan();

    if alpha < theta || alpha >= TAU - theta {
        // right
        egui::pos2(bbox.max.x, center.y + tan_alpha * x_radius)
    } else if alpha < PI - theta {
        // bottom
        egui::pos2(center.x + tan_beta * y_radius, bbox.max.y)
    } else if alpha < PI + theta {
        // left
        egui::pos2(bbox.min.x, center.y - tan_alpha * x_radius)
    } else {
        // top
        egui::pos2(center.x - tan_beta * y_radius, bbox.min.y)
    }
}

/// Calculates the shortest distance from a point to a line segment.
///
/// Uses vector projection to find the closest point on the segment. A zero length
/// segment degenerates to the distance to its start.
///
/// # Arguments
///
/// * `p` - The point to measure from
/// * `s1` - Start of the segment
/// * `s2` - End of the segment
///
/// # Returns
///
/// The minimum distance from the point to the segment
pub fn distance_to_segment(p: Pos2, s1: Pos2, s2: Pos2) -> f32 {
    let segment = s2 - s1;
    let length_sq = segment.length_sq();
    if length_sq == 0.0 {
        return p.distance(s1);
    }

    let t = (p - s1).dot(segment) / length_sq;
    if t < 0.0 {
        p.distance(s1)
    } else if t > 1.0 {
        p.distance(s2)
    } else {
        p.distance(s1 + segment * t)
    }
}

/// Finds the segment of `[start] ++ bends ++ [end]` closest to `p`.
///
/// Segment `i` runs from `line[i]` to `line[i + 1]`, so the result is also the index a
/// new bend inserted near `p` should take. Ties resolve to the lowest index.
///
/// # Returns
///
/// The segment index, or 0 when there are no bends
pub fn nearest_segment(p: Pos2, start: Pos2, bends: &[Pos2], end: Pos2) -> usize {
    if bends.is_empty() {
        return 0;
    }

    let line: Vec<Pos2> = std::iter::once(start)
        .chain(bends.iter().copied())
        .chain(std::iter::once(end))
        .collect();

    let mut nearest = 0;
    let mut nearest_distance = f32::INFINITY;
    for (i, pair) in line.windows(2).enumerate() {
        let distance = distance_to_segment(p, pair[0], pair[1]);
        if distance < nearest_distance {
            nearest = i;
            nearest_distance = distance;
        }
    }
    nearest
}

/// Index of the point in `points` closest to `p`, lowest index on ties.
pub fn nearest_point(p: Pos2, points: &[Pos2]) -> Option<usize> {
    let mut nearest = None;
    let mut nearest_distance = f32::INFINITY;
    for (i, point) in points.iter().enumerate() {
        let distance = p.distance(*point);
        if distance < nearest_distance {
            nearest = Some(i);
            nearest_distance = distance;
        }
    }
    nearest
}

/// Rounds a single coordinate to the nearest multiple of `alignment`.
pub fn snap_value(value: f32, alignment: f32) -> f32 {
    (value / alignment).round() * alignment
}

/// Snaps a position to the nearest grid point.
///
/// # Arguments
///
/// * `pos` - Position to snap
/// * `alignment` - Grid spacing in canvas units
///
/// # Returns
///
/// The snapped position on the grid
pub fn snap_to_grid(pos: Pos2, alignment: f32) -> Pos2 {
    egui::pos2(snap_value(pos.x, alignment), snap_value(pos.y, alignment))
}

/// Whether `bbox` is visible in a container showing the canvas at `translate`/`scale`.
///
/// The visible area is measured in whole canvas units. With `strict` the box must lie
/// entirely inside it; otherwise some horizontal and some vertical edge of the box must
/// fall strictly inside.
pub fn viewport_contains(
    bbox: Rect,
    translate: Vec2,
    scale: f32,
    container: Vec2,
    strict: bool,
) -> bool {
    let screen_width = (container.x / scale).floor();
    let screen_height = (container.y / scale).floor();
    let screen_left = (-translate.x / scale).ceil();
    let screen_top = (-translate.y / scale).ceil();
    let screen_right = screen_left + screen_width;
    let screen_bottom = screen_top + screen_height;

    let left = bbox.min.x.ceil();
    let right = bbox.max.x.floor();
    let top = bbox.min.y.ceil();
    let bottom = bbox.max.y.floor();

    if strict {
        !(left < screen_left || right > screen_right || top < screen_top || bottom > screen_bottom)
    } else {
        let horizontal = (left > screen_left && left < screen_right)
            || (right < screen_right && right > screen_left);
        let vertical =
            (top > screen_top && top < screen_bottom) || (bottom < screen_bottom && bottom > screen_top);
        horizontal && vertical
    }
}

/// Smallest rectangle containing every input rectangle, or `None` for no input.
pub fn union_all(rects: impl IntoIterator<Item = Rect>) -> Option<Rect> {
    rects.into_iter().reduce(|acc, r| acc.union(r))
}

/// The two bends that keep a new self-loop on `bbox` visibly looped.
///
/// Both sit `x_offset` to the right of the box's right edge, mirrored `y_offset` above
/// and below its vertical middle.
pub fn self_loop_bends(bbox: Rect, x_offset: f32, y_offset: f32) -> [Pos2; 2] {
    let right_center = egui::pos2(bbox.max.x, bbox.min.y + bbox.height() / 2.0);
    [
        egui::pos2(right_center.x + x_offset, right_center.y - y_offset),
        egui::pos2(right_center.x + x_offset, right_center.y + y_offset),
    ]
}

/// Largest `n` in `0..=len` with `width_of(n) <= budget`.
///
/// `width_of` must be monotonically non-decreasing in `n`; it is called O(log len) times.
pub fn largest_fitting_prefix(len: usize, budget: f32, mut width_of: impl FnMut(usize) -> f32) -> usize {
    let mut low = 0;
    let mut high = len;
    while low < high {
        let mid = low + (high - low + 1) / 2;
        if width_of(mid) <= budget {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    low
}

/// Trims `text` so that it fits `budget`, appending an ellipsis when anything was cut.
///
/// `measure` reports the rendered width of a string.
pub fn ellipsize(text: &str, budget: f32, measure: impl Fn(&str) -> f32) -> String {
    let text = text.trim();
    if measure(text) <= budget {
        return text.to_string();
    }

    let chars: Vec<char> = text.chars().collect();
    let room = budget - measure("\u{2026}");
    let keep = largest_fitting_prefix(chars.len(), room, |n| {
        measure(&chars[..n].iter().collect::<String>())
    });
    let mut trimmed: String = chars[..keep].iter().collect();
    trimmed.push('\u{2026}');
    trimmed
}
