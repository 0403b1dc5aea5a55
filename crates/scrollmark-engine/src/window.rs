#![forbid(unsafe_code)]

//! Virtualization window over the track.
//!
//! Only markers whose pixel position lies within
//! `[track_scroll - buffer, track_scroll + viewport + buffer]` are rendered,
//! with `buffer = max(min_buffer, viewport)`. The range is found by binary
//! search over the layout's sorted positions.
//!
//! [`VirtualWindow::sync`] diffs the new range against what is rendered and
//! reports which anchors leave, enter, or stay. Markers that stay are updated
//! in place, never recreated.

use std::ops::Range;

use crate::geometry::Layout;

/// Index of the first position `>= x`, or `ys.len()` if none.
#[must_use]
pub fn first_at_or_after(ys: &[f64], x: f64) -> usize {
    ys.partition_point(|&y| y < x)
}

/// Index of the last position `<= x`.
#[must_use]
pub fn last_at_or_before(ys: &[f64], x: f64) -> Option<usize> {
    ys.partition_point(|&y| y <= x).checked_sub(1)
}

/// Render buffer for a viewport of `viewport` pixels.
#[must_use]
pub fn buffer_for(viewport: f64, min_buffer: f64) -> f64 {
    viewport.max(min_buffer)
}

/// Positions in `ys` inside the buffered viewport, as a half-open range.
#[must_use]
pub fn visible_range(ys: &[f64], track_scroll: f64, viewport: f64, buffer: f64) -> Range<usize> {
    let lo = track_scroll - buffer;
    let hi = track_scroll + viewport + buffer;
    let start = first_at_or_after(ys, lo);
    let end = last_at_or_before(ys, hi).map_or(0, |i| i + 1);
    start..end.max(start)
}

/// Anchor indices changed by a window update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowDiff {
    /// Rendered before, outside now: destroy their markers.
    pub leave: Vec<usize>,
    /// Newly inside: create markers.
    pub enter: Vec<usize>,
    /// Inside before and now: update in place.
    pub stay: Vec<usize>,
}

impl WindowDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leave.is_empty() && self.enter.is_empty() && self.stay.is_empty()
    }
}

/// The set of anchors currently rendered.
#[derive(Debug, Clone, Default)]
pub struct VirtualWindow {
    range: Range<usize>,
    /// Sorted anchor indices with a live marker.
    rendered: Vec<usize>,
    /// Registry version the rendered indices belong to.
    version: u64,
}

impl VirtualWindow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current range over the layout's visible order.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    #[must_use]
    pub fn rendered(&self) -> &[usize] {
        &self.rendered
    }

    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.rendered.binary_search(&index).is_ok()
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Move the window to `range` of `layout.order`.
    ///
    /// Rendered indices from an older registry version no longer name the
    /// same anchors; their markers were retired by the registry, so they are
    /// forgotten rather than reported as leaving.
    pub fn sync(&mut self, layout: &Layout, range: Range<usize>, version: u64) -> WindowDiff {
        if version != self.version {
            self.rendered.clear();
            self.version = version;
        }
        let end = range.end.min(layout.order.len());
        let start = range.start.min(end);
        let mut next: Vec<usize> = layout.order[start..end].to_vec();
        next.sort_unstable();

        let mut diff = WindowDiff::default();
        let (mut a, mut b) = (0, 0);
        while a < self.rendered.len() || b < next.len() {
            match (self.rendered.get(a), next.get(b)) {
                (Some(&old), Some(&new)) if old == new => {
                    diff.stay.push(old);
                    a += 1;
                    b += 1;
                }
                (Some(&old), Some(&new)) if old < new => {
                    diff.leave.push(old);
                    a += 1;
                }
                (Some(_), Some(&new)) => {
                    diff.enter.push(new);
                    b += 1;
                }
                (Some(&old), None) => {
                    diff.leave.push(old);
                    a += 1;
                }
                (None, Some(&new)) => {
                    diff.enter.push(new);
                    b += 1;
                }
                (None, None) => break,
            }
        }

        self.range = start..end;
        self.rendered = next;
        diff
    }

    /// Forget everything; returns the indices that were rendered.
    pub fn clear(&mut self) -> Vec<usize> {
        self.range = 0..0;
        std::mem::take(&mut self.rendered)
    }

    /// Start over for a new registry version.
    pub fn reset(&mut self, version: u64) {
        self.clear();
        self.version = version;
    }

    /// Carry the rendered set over to `version` when the anchor set kept
    /// its ids and markers.
    pub fn retag(&mut self, version: u64) {
        self.version = version;
    }
}
