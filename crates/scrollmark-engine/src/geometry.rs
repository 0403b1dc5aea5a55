#![forbid(unsafe_code)]

//! Track layout: anchor order to pixel positions.
//!
//! [`compute_layout`] is a pure function of each anchor's `base_n`, level and
//! collapsed flag plus the pane height. It:
//!
//! 1. Sizes the track so every visible marker fits at the minimum gap.
//! 2. Hides the descendants of collapsed anchors.
//! 3. Moves each collapsed anchor forward by a decayed share of the span it
//!    hides ([`effective_base_n`]).
//! 4. Maps visible anchors onto `[pad, pad + usable]` and enforces the
//!    minimum gap with a forward pass, then a backward pass if the last
//!    marker overflowed.
//!
//! # Invariants
//!
//! 1. Every visible `n` is within [0, 1]; hidden anchors have no position.
//! 2. `ys` is non-decreasing and aligned with `order`.
//! 3. Consecutive visible markers are at least `min_gap` apart whenever the
//!    track is tall enough to hold them, which [`compute_track_height`]
//!    guarantees.

use crate::anchor::Level;
use crate::config::GeometryConfig;

/// Normalized range below which visible anchors are spaced uniformly.
const MIN_RANGE: f64 = 1e-9;

/// Per-anchor input to the layout, in registry order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutEntry {
    pub base_n: f64,
    pub level: Level,
    pub collapsed: bool,
}

/// Result of a layout pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    pub track_height: f64,
    /// Track height minus padding at both ends.
    pub usable: f64,
    /// Visible anchor indices in track order.
    pub order: Vec<usize>,
    /// Pixel positions aligned with `order`.
    pub ys: Vec<f64>,
    /// Pixel position per anchor index; `None` when hidden.
    pub y: Vec<Option<f64>>,
    /// Effective normalized position per anchor index; `None` when hidden.
    pub n: Vec<Option<f64>>,
    /// Whether each anchor has descendants it could collapse.
    pub collapsible: Vec<bool>,
}

impl Layout {
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_hidden(&self, index: usize) -> bool {
        self.y.get(index).is_none_or(Option::is_none)
    }

    /// Pixel position of anchor `index`.
    #[must_use]
    pub fn y_of(&self, index: usize) -> Option<f64> {
        self.y.get(index).copied().flatten()
    }

    /// Nearest visible anchor at or before `index`, else the first visible one after.
    #[must_use]
    pub fn visible_at_or_before(&self, index: usize) -> Option<usize> {
        let upto = index.min(self.y.len().saturating_sub(1));
        (0..=upto)
            .rev()
            .find(|&i| !self.is_hidden(i))
            .or_else(|| self.order.first().copied())
    }
}

/// Track height needed for `visible` markers.
#[must_use]
pub fn compute_track_height(visible: usize, pane_height: f64, pad: f64, min_gap: f64) -> f64 {
    let span = visible.saturating_sub(1) as f64 * min_gap;
    pane_height.max(2.0 * pad + span)
}

/// Exclusive end of the group headed by `index`: the next anchor whose level
/// is at or above `levels[index]`.
#[must_use]
pub fn group_end(levels: &[Level], index: usize) -> usize {
    let head = levels[index].get();
    levels[index + 1..]
        .iter()
        .position(|l| l.get() <= head)
        .map_or(levels.len(), |p| index + 1 + p)
}

/// Which anchors are hidden by a collapsed ancestor.
#[must_use]
pub fn hidden_mask(entries: &[LayoutEntry]) -> Vec<bool> {
    let levels: Vec<Level> = entries.iter().map(|e| e.level).collect();
    hidden_mask_with(entries, &levels)
}

fn hidden_mask_with(entries: &[LayoutEntry], levels: &[Level]) -> Vec<bool> {
    let mut hidden = vec![false; entries.len()];
    let mut i = 0;
    while i < entries.len() {
        if entries[i].collapsed && !hidden[i] {
            let end = group_end(levels, i);
            hidden[i + 1..end].iter_mut().for_each(|h| *h = true);
            i = end;
        } else {
            i += 1;
        }
    }
    hidden
}

/// `base_n` of anchor `index`, plus the decayed span of its hidden group
/// when it is collapsed. `levels` holds each entry's level.
#[must_use]
pub fn effective_base_n(
    entries: &[LayoutEntry],
    levels: &[Level],
    index: usize,
    decay: f64,
) -> f64 {
    let head = entries[index];
    if !head.collapsed {
        return head.base_n;
    }
    let end = group_end(levels, index);
    let absorbed: f64 = (index + 1..end)
        .map(|j| {
            let span = entries[j].base_n - entries[j - 1].base_n;
            let depth = i32::from(entries[j].level.get()) - i32::from(head.level.get());
            span * decay.powi(depth)
        })
        .sum();
    head.base_n + absorbed
}

/// Lay out `entries` on a track for a pane of `pane_height` pixels.
#[must_use]
pub fn compute_layout(entries: &[LayoutEntry], pane_height: f64, config: &GeometryConfig) -> Layout {
    let levels: Vec<Level> = entries.iter().map(|e| e.level).collect();
    let hidden = hidden_mask_with(entries, &levels);
    let collapsible: Vec<bool> = (0..entries.len())
        .map(|i| group_end(&levels, i) > i + 1)
        .collect();

    let mut visible: Vec<(usize, f64)> = (0..entries.len())
        .filter(|&i| !hidden[i])
        .map(|i| (i, effective_base_n(entries, &levels, i, config.collapse_decay)))
        .collect();
    visible.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    let pad = config.pad;
    let track_height = compute_track_height(visible.len(), pane_height, pad, config.min_gap);
    let usable = (track_height - 2.0 * pad).max(0.0);
    let top = pad;
    let bottom = pad + usable;

    let lo = visible.first().map_or(0.0, |v| v.1);
    let hi = visible.last().map_or(0.0, |v| v.1);
    let range = hi - lo;
    let count = visible.len();
    let mut ys: Vec<f64> = visible
        .iter()
        .enumerate()
        .map(|(rank, &(_, eff))| {
            let norm = if range > MIN_RANGE {
                (eff - lo) / range
            } else if count > 1 {
                rank as f64 / (count - 1) as f64
            } else {
                0.0
            };
            top + norm.clamp(0.0, 1.0) * usable
        })
        .collect();

    enforce_min_gap(&mut ys, config.min_gap, top, bottom);

    let mut y = vec![None; entries.len()];
    let mut n = vec![None; entries.len()];
    for (&(index, _), &pos) in visible.iter().zip(&ys) {
        y[index] = Some(pos);
        n[index] = Some(if usable > 0.0 {
            ((pos - top) / usable).clamp(0.0, 1.0)
        } else {
            0.0
        });
    }

    Layout {
        track_height,
        usable,
        order: visible.into_iter().map(|(i, _)| i).collect(),
        ys,
        y,
        n,
        collapsible,
    }
}

/// Push markers apart to `gap`, pulling back from `bottom` if the forward
/// pass overflowed, then clamp to `[top, bottom]`.
pub fn enforce_min_gap(ys: &mut [f64], gap: f64, top: f64, bottom: f64) {
    for i in 1..ys.len() {
        ys[i] = ys[i].max(ys[i - 1] + gap);
    }
    let overflow = ys.last().is_some_and(|&last| last > bottom);
    if overflow {
        let last = ys.len() - 1;
        ys[last] = bottom;
        for i in (0..last).rev() {
            ys[i] = ys[i].min(ys[i + 1] - gap);
        }
    }
    for y in ys.iter_mut() {
        *y = y.clamp(top, bottom);
    }
}
