#![forbid(unsafe_code)]

//! Content ↔ minimap synchronization.
//!
//! Content → minimap: a reference line at `scroll_top + ratio * viewport`
//! selects the last anchor whose offset is at or above it. The result goes
//! through [`ActiveTracker`], which rate-limits changes: a candidate arriving
//! within the minimum interval of the last change waits in a single pending
//! slot, and a newer candidate replaces it.
//!
//! The minimap follows the same reference line: [`TrackMap`] maps it onto
//! the track through the anchor pixel table, and [`follow_track_scroll`]
//! keeps the active marker inside the minimap viewport.
//!
//! Minimap → content: wheel and slider input go back through the inverse
//! of that map; that path is not rate-limited.

use std::time::Duration;

use scrollmark_core::animation::lerp;
use tracing::trace;
use web_time::Instant;

use crate::anchor::{Anchor, AnchorId};
use crate::host::ContentPanel;

/// Content offset the active anchor is chosen against.
#[must_use]
pub fn reference_point(scroll_top: f64, viewport: f64, ratio: f64) -> f64 {
    scroll_top + ratio * viewport
}

/// Index of the last offset `<= reference`; the first anchor when the
/// reference is above every offset. `None` for an empty table.
#[must_use]
pub fn active_index(offsets: &[f64], reference: f64) -> Option<usize> {
    if offsets.is_empty() {
        return None;
    }
    Some(offsets.partition_point(|&o| o <= reference).saturating_sub(1))
}

/// Same selection as [`active_index`], measuring each anchor live.
///
/// Used when the offset table has not been built for the current registry
/// version.
#[must_use]
pub fn active_index_linear(
    anchors: &[Anchor],
    panel: &dyn ContentPanel,
    reference: f64,
) -> Option<usize> {
    if anchors.is_empty() {
        return None;
    }
    let mut best = 0;
    for (i, anchor) in anchors.iter().enumerate() {
        match panel.node_offset(anchor.node) {
            Some(offset) if offset <= reference => best = i,
            Some(_) => break,
            None => {}
        }
    }
    Some(best)
}

/// Piecewise-linear map between content offsets and track pixels.
///
/// Each visible anchor is a knot `(offset, y)`; the content's top and bottom
/// map to the track's. Min-gap spacing and collapsed groups make the track
/// non-proportional to the content, so the minimap follows the content
/// through this map rather than through the raw scroll fraction.
#[derive(Debug, Clone, Default)]
pub struct TrackMap {
    points: Vec<(f64, f64)>,
}

impl TrackMap {
    /// Knots for the visible anchors, `order` and `ys` as in a layout.
    pub fn rebuild(&mut self, anchors: &[Anchor], order: &[usize], ys: &[f64]) {
        self.points.clear();
        self.points.extend(
            order
                .iter()
                .zip(ys)
                .filter_map(|(&i, &y)| anchors.get(i).map(|a| (a.offset, y))),
        );
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Track pixel for content offset `offset`.
    #[must_use]
    pub fn track_y(&self, offset: f64, content_height: f64, track_height: f64) -> f64 {
        interpolate(&self.points, offset, |&p| p, (content_height, track_height))
    }

    /// Content offset for track pixel `y`.
    #[must_use]
    pub fn content_offset(&self, y: f64, content_height: f64, track_height: f64) -> f64 {
        interpolate(
            &self.points,
            y,
            |&(offset, y)| (y, offset),
            (track_height, content_height),
        )
    }
}

/// Linear interpolation over knots sorted by `key(..).0`, starting from the
/// origin and ending at `end`.
fn interpolate(
    points: &[(f64, f64)],
    x: f64,
    key: fn(&(f64, f64)) -> (f64, f64),
    end: (f64, f64),
) -> f64 {
    let i = points.partition_point(|p| key(p).0 <= x);
    let below = i.checked_sub(1).map_or((0.0, 0.0), |j| key(&points[j]));
    let above = points.get(i).map_or(end, key);
    let span = above.0 - below.0;
    if span <= 0.0 {
        return below.1;
    }
    lerp(below.1, above.1, ((x - below.0) / span).clamp(0.0, 1.0))
}

/// Track scroll placing `reference_y` at `ratio` of the minimap viewport,
/// adjusted so `active_y` stays at least `margin` inside it.
#[must_use]
pub fn follow_track_scroll(
    reference_y: f64,
    active_y: Option<f64>,
    ratio: f64,
    viewport: f64,
    margin: f64,
    track_max: f64,
) -> f64 {
    let mut target = reference_y - ratio * viewport;
    if let Some(y) = active_y {
        let hi = y - margin;
        let lo = (y + margin - viewport).min(hi);
        target = target.clamp(lo, hi);
    }
    target.clamp(0.0, track_max.max(0.0))
}

/// Offsets of the anchors, stamped with the registry version they match.
#[derive(Debug, Clone, Default)]
pub struct OffsetTable {
    offsets: Vec<f64>,
    version: u64,
}

impl OffsetTable {
    pub fn rebuild(&mut self, anchors: &[Anchor], version: u64) {
        self.offsets.clear();
        self.offsets.extend(anchors.iter().map(|a| a.offset));
        self.version = version;
    }

    /// Offsets if they match `version`.
    #[must_use]
    pub fn current(&self, version: u64) -> Option<&[f64]> {
        (self.version == version && !self.offsets.is_empty()).then_some(self.offsets.as_slice())
    }

    pub fn clear(&mut self) {
        self.offsets.clear();
    }
}

/// An applied change of the active anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveChange {
    pub previous: Option<AnchorId>,
    pub current: Option<AnchorId>,
}

/// What [`ActiveTracker::propose`] did with a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proposal {
    /// Candidate is already active.
    Unchanged,
    Applied(ActiveChange),
    /// Buffered until `due`.
    Deferred { due: Instant },
}

#[derive(Debug, Clone)]
struct Pending {
    id: AnchorId,
    version: u64,
    due: Instant,
}

/// Rate-limited active anchor.
#[derive(Debug, Clone)]
pub struct ActiveTracker {
    current: Option<AnchorId>,
    last_change: Option<Instant>,
    pending: Option<Pending>,
    interval: Duration,
}

impl ActiveTracker {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            current: None,
            last_change: None,
            pending: None,
            interval,
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<&AnchorId> {
        self.current.as_ref()
    }

    /// When the buffered candidate becomes due.
    #[must_use]
    pub fn pending_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.due)
    }

    /// Offer a scroll-derived candidate computed against registry `version`.
    pub fn propose(&mut self, candidate: AnchorId, version: u64, now: Instant) -> Proposal {
        if self.current.as_ref() == Some(&candidate) {
            self.pending = None;
            return Proposal::Unchanged;
        }
        let due = self.last_change.map(|t| t + self.interval);
        match due {
            Some(due) if now < due => {
                trace!(id = %candidate, "active change deferred");
                self.pending = Some(Pending {
                    id: candidate,
                    version,
                    due,
                });
                Proposal::Deferred { due }
            }
            _ => {
                self.pending = None;
                Proposal::Applied(self.apply(Some(candidate), now))
            }
        }
    }

    /// Apply the buffered candidate once due. Candidates from an older
    /// registry version are dropped.
    pub fn poll(&mut self, version: u64, now: Instant) -> Option<ActiveChange> {
        let pending = self.pending.as_ref()?;
        if pending.version != version {
            self.pending = None;
            return None;
        }
        if now < pending.due {
            return None;
        }
        let pending = self.pending.take()?;
        if self.current.as_ref() == Some(&pending.id) {
            return None;
        }
        Some(self.apply(Some(pending.id), now))
    }

    /// Set the active anchor immediately, bypassing the interval.
    pub fn force(&mut self, candidate: Option<AnchorId>, now: Instant) -> Option<ActiveChange> {
        self.pending = None;
        if self.current == candidate {
            return None;
        }
        Some(self.apply(candidate, now))
    }

    /// Drop the active anchor without touching the interval timer.
    pub fn clear(&mut self) -> Option<ActiveChange> {
        self.pending = None;
        let previous = self.current.take()?;
        Some(ActiveChange {
            previous: Some(previous),
            current: None,
        })
    }

    /// Forget all state.
    pub fn reset(&mut self) {
        self.current = None;
        self.last_change = None;
        self.pending = None;
    }

    fn apply(&mut self, candidate: Option<AnchorId>, now: Instant) -> ActiveChange {
        let previous = std::mem::replace(&mut self.current, candidate);
        self.last_change = Some(now);
        ActiveChange {
            previous,
            current: self.current.clone(),
        }
    }
}
