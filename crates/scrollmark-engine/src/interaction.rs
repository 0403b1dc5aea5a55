#![forbid(unsafe_code)]

//! Pointer-facing models: the proportional slider, tooltip placement, and
//! the per-anchor context menu.
//!
//! All three are plain state and arithmetic; the engine feeds them pointer
//! events and pushes their results to the surface.

use std::time::Duration;

use scrollmark_core::gesture::DragTracker;
use scrollmark_core::text;
use web_time::Instant;

use crate::anchor::Level;
use crate::config::TooltipConfig;
use crate::host::{SliderState, Translate};

// ---------------------------------------------------------------------------
// Slider
// ---------------------------------------------------------------------------

/// Thumb height for a viewport over a track, never below `min_thumb`.
#[must_use]
pub fn thumb_height(viewport: f64, track_height: f64, min_thumb: f64) -> f64 {
    if track_height <= 0.0 || viewport <= 0.0 {
        return 0.0;
    }
    (viewport * viewport / track_height).clamp(min_thumb.min(viewport), viewport)
}

/// The proportional slider over the minimap track.
#[derive(Debug, Clone)]
pub struct SliderModel {
    drag: DragTracker,
    visible: bool,
    fade_at: Option<Instant>,
    fade_delay: Duration,
    min_thumb: f64,
}

impl SliderModel {
    #[must_use]
    pub fn new(fade_delay: Duration, min_thumb: f64) -> Self {
        Self {
            drag: DragTracker::new(),
            visible: false,
            fade_at: None,
            fade_delay,
            min_thumb,
        }
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    #[must_use]
    pub fn fade_deadline(&self) -> Option<Instant> {
        self.fade_at
    }

    /// Thumb geometry for the current track scroll.
    ///
    /// The slider shows while dragging, while a fade is pending, or whenever
    /// the track is taller than its viewport.
    #[must_use]
    pub fn state(&self, viewport: f64, track_height: f64, track_scroll: f64) -> SliderState {
        let height = thumb_height(viewport, track_height, self.min_thumb);
        let track_max = (track_height - viewport).max(0.0);
        let travel = (viewport - height).max(0.0);
        let top = if track_max > 0.0 {
            (track_scroll / track_max).clamp(0.0, 1.0) * travel
        } else {
            0.0
        };
        SliderState {
            top,
            height,
            visible: self.visible || track_height > viewport,
        }
    }

    /// Capture the pointer at `pointer_y` over a track scrolled to `track_scroll`.
    pub fn pointer_down(&mut self, pointer_y: f64, track_scroll: f64) {
        self.drag.begin(pointer_y, track_scroll);
        self.visible = true;
        self.fade_at = None;
    }

    /// New track scroll for a pointer at `pointer_y`, if dragging.
    #[must_use]
    pub fn pointer_move(&self, pointer_y: f64, viewport: f64, track_height: f64) -> Option<f64> {
        let (dy, start) = self.drag.delta(pointer_y)?;
        let track_max = (track_height - viewport).max(0.0);
        let travel = (viewport - thumb_height(viewport, track_height, self.min_thumb)).max(0.0);
        if travel <= 0.0 || track_max <= 0.0 {
            return Some(0.0);
        }
        Some((start + dy * track_max / travel).clamp(0.0, track_max))
    }

    /// Release the pointer. Returns `true` if a drag ended.
    pub fn pointer_up(&mut self, now: Instant) -> bool {
        if !self.drag.end() {
            return false;
        }
        self.fade_at = Some(now + self.fade_delay);
        true
    }

    /// Reveal the slider briefly, as wheel input does.
    pub fn touch(&mut self, now: Instant) {
        self.visible = true;
        if !self.is_dragging() {
            self.fade_at = Some(now + self.fade_delay);
        }
    }

    /// Hide the slider once the fade is due. Returns `true` on change.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.fade_at {
            Some(at) if now >= at && !self.is_dragging() => {
                self.fade_at = None;
                self.visible = false;
                true
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.drag.end();
        self.visible = false;
        self.fade_at = None;
    }
}

/// Track scroll after a wheel delta.
#[must_use]
pub fn wheel_scroll(track_scroll: f64, delta_y: f64, track_max: f64) -> f64 {
    (track_scroll + delta_y).clamp(0.0, track_max.max(0.0))
}

// ---------------------------------------------------------------------------
// Tooltip
// ---------------------------------------------------------------------------

/// Measures rendered text.
pub trait TextMeasure {
    /// Height of `text` laid out at `width` pixels.
    fn height(&self, text: &str, width: f64) -> f64;

    fn line_height(&self) -> f64;
}

/// Fixed-size cells: one column per display-width unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMeasure {
    pub cell_width: f64,
    pub line_height: f64,
}

impl Default for CellMeasure {
    fn default() -> Self {
        Self {
            cell_width: 7.0,
            line_height: 18.0,
        }
    }
}

impl TextMeasure for CellMeasure {
    fn height(&self, text: &str, width: f64) -> f64 {
        let columns = if self.cell_width > 0.0 {
            (width / self.cell_width).floor().max(1.0) as usize
        } else {
            1
        };
        text::wrapped_line_count(text, columns) as f64 * self.line_height
    }

    fn line_height(&self) -> f64 {
        self.line_height
    }
}

/// Side of the marker the tooltip opens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// A placed tooltip.
#[derive(Debug, Clone, PartialEq)]
pub struct TooltipLayout {
    pub side: Side,
    /// Left edge in surface pixels.
    pub x: f64,
    pub width: f64,
    pub text: String,
    pub truncated: bool,
}

/// Place a tooltip for a marker spanning `marker_left..marker_right`.
pub fn place_tooltip(
    marker_left: f64,
    marker_right: f64,
    viewport_width: f64,
    summary: &str,
    measure: &dyn TextMeasure,
    config: &TooltipConfig,
) -> TooltipLayout {
    let room_left = marker_left - config.gap - config.edge_margin;
    let room_right = viewport_width - marker_right - config.gap - config.edge_margin;
    let (side, room) = if room_right >= room_left {
        (Side::Right, room_right)
    } else {
        (Side::Left, room_left)
    };

    let width = config
        .width_tiers
        .iter()
        .copied()
        .find(|&w| w <= room)
        .unwrap_or_else(|| {
            let narrowest = config.width_tiers.last().copied().unwrap_or(room);
            narrowest.min(room).max(0.0)
        });

    let x = match side {
        Side::Right => marker_right + config.gap,
        Side::Left => marker_left - config.gap - width,
    };

    let max_height = config.max_lines as f64 * measure.line_height();
    let (text, truncated) = truncate_to_height(summary, width, max_height, measure, &config.ellipsis);
    TooltipLayout {
        side,
        x,
        width,
        text,
        truncated,
    }
}

/// Longest grapheme prefix of `summary` that, with `ellipsis`, fits in
/// `max_height` at `width`. Returns the text unchanged when it already fits.
pub fn truncate_to_height(
    summary: &str,
    width: f64,
    max_height: f64,
    measure: &dyn TextMeasure,
    ellipsis: &str,
) -> (String, bool) {
    if measure.height(summary, width) <= max_height {
        return (summary.to_string(), false);
    }
    let candidate = |count: usize| {
        let mut s = text::take_graphemes(summary, count).trim_end().to_string();
        s.push_str(ellipsis);
        s
    };
    // Largest `count` whose candidate fits; 0 always qualifies.
    let (mut lo, mut hi) = (0, text::grapheme_count(summary));
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if measure.height(&candidate(mid), width) <= max_height {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    (candidate(lo), true)
}

// ---------------------------------------------------------------------------
// Context menu
// ---------------------------------------------------------------------------

/// An action offered for one anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    ToggleStar,
    ToggleCollapse,
    SetLevel(Level),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub action: MenuAction,
    pub label: String,
    pub checked: bool,
}

/// Menu entries for an anchor in the given state.
#[must_use]
pub fn build_menu(
    starred: bool,
    collapsed: bool,
    collapsible: bool,
    level: Level,
    labels: &dyn Translate,
) -> Vec<MenuItem> {
    let mut items = vec![MenuItem {
        action: MenuAction::ToggleStar,
        label: labels.translate(if starred { "menu.unstar" } else { "menu.star" }),
        checked: starred,
    }];
    if collapsible || collapsed {
        items.push(MenuItem {
            action: MenuAction::ToggleCollapse,
            label: labels.translate(if collapsed { "menu.expand" } else { "menu.collapse" }),
            checked: collapsed,
        });
    }
    let prefix = labels.translate("menu.level");
    items.extend((Level::TOP.get()..=Level::MAX.get()).map(|raw| MenuItem {
        action: MenuAction::SetLevel(Level::new(raw)),
        label: format!("{prefix} {raw}"),
        checked: level.get() == raw,
    }));
    items
}
