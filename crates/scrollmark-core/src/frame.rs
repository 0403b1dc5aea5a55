#![forbid(unsafe_code)]

//! Once-per-frame coalescing of recomputation work.
//!
//! Scroll, resize, and mutation signals can arrive many times between two
//! animation frames. Each signal only *schedules* work; the host runs one
//! ordered pass when its frame callback fires.
//!
//! # Design
//!
//! Pending work is a [`FrameWork`] bit set, so scheduling the same work twice
//! is free ("latest wins" degenerates to "already pending"). The coalescer
//! also remembers whether a frame has been requested from the host so that
//! bursts of signals issue a single request.
//!
//! # Usage
//!
//! ```
//! use scrollmark_core::frame::{FrameCoalescer, FrameWork};
//!
//! let mut frames = FrameCoalescer::new();
//! assert!(frames.schedule(FrameWork::ACTIVE));          // request a frame
//! assert!(!frames.schedule(FrameWork::MINIMAP_SCROLL)); // already requested
//!
//! let work = frames.take();
//! assert!(work.contains(FrameWork::ACTIVE | FrameWork::MINIMAP_SCROLL));
//! assert!(frames.take().is_empty());
//! ```
//!
//! # Ordering
//!
//! [`FrameWork::ordered`] yields the stages in their required order:
//! geometry before window, window before active-anchor recomputation.
//! Animation runs right after geometry so scroll writes it makes are seen
//! by the window and active stages of the same pass.

use bitflags::bitflags;

bitflags! {
    /// Stages of a frame pass.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FrameWork: u8 {
        /// Recompute anchor positions and track height.
        const GEOMETRY       = 0b0000_0001;
        /// Recompute the virtualization window and patch markers.
        const WINDOW         = 0b0000_0010;
        /// Recompute the active anchor from the content scroll offset.
        const ACTIVE         = 0b0000_0100;
        /// Follow the content scroll offset with the minimap track.
        const MINIMAP_SCROLL = 0b0000_1000;
        /// Refresh slider thumb geometry and visibility.
        const SLIDER         = 0b0001_0000;
        /// Advance the in-flight navigation and dispatch queued requests.
        const ANIMATION      = 0b0010_0000;
    }
}

impl FrameWork {
    /// Everything a layout change invalidates.
    pub const LAYOUT: Self = Self::GEOMETRY
        .union(Self::WINDOW)
        .union(Self::ACTIVE)
        .union(Self::SLIDER);

    /// Everything a content scroll invalidates.
    pub const SCROLL: Self = Self::ACTIVE.union(Self::MINIMAP_SCROLL).union(Self::WINDOW);

    /// Stages in execution order.
    pub fn ordered(self) -> impl Iterator<Item = FrameWork> {
        [
            Self::GEOMETRY,
            Self::ANIMATION,
            Self::MINIMAP_SCROLL,
            Self::WINDOW,
            Self::ACTIVE,
            Self::SLIDER,
        ]
        .into_iter()
        .filter(move |stage| self.contains(*stage))
    }
}

/// Accumulates [`FrameWork`] until the next frame callback.
///
/// Not thread-safe; owned by the single event loop that drives the engine.
#[derive(Debug, Clone, Default)]
pub struct FrameCoalescer {
    pending: FrameWork,
    requested: bool,
    frames_run: u64,
}

impl FrameCoalescer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add work. Returns `true` when the caller must request a frame.
    pub fn schedule(&mut self, work: FrameWork) -> bool {
        self.pending |= work;
        if self.requested || self.pending.is_empty() {
            return false;
        }
        self.requested = true;
        true
    }

    /// Drain pending work for a frame pass.
    #[must_use]
    pub fn take(&mut self) -> FrameWork {
        self.requested = false;
        if !self.pending.is_empty() {
            self.frames_run += 1;
        }
        std::mem::take(&mut self.pending)
    }

    #[must_use]
    pub fn pending(&self) -> FrameWork {
        self.pending
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Whether a frame has been requested and not yet run.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested
    }

    /// Number of non-empty passes drained so far.
    #[must_use]
    pub fn frames_run(&self) -> u64 {
        self.frames_run
    }

    /// Discard pending work without running it.
    pub fn clear(&mut self) {
        self.pending = FrameWork::empty();
        self.requested = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_requests_single_frame() {
        let mut frames = FrameCoalescer::new();
        let requests = (0..50)
            .filter(|_| frames.schedule(FrameWork::SCROLL))
            .count();
        assert_eq!(requests, 1);
        assert_eq!(frames.take(), FrameWork::SCROLL);
        assert_eq!(frames.frames_run(), 1);
    }

    #[test]
    fn schedule_after_take_requests_again() {
        let mut frames = FrameCoalescer::new();
        assert!(frames.schedule(FrameWork::GEOMETRY));
        let _ = frames.take();
        assert!(frames.schedule(FrameWork::GEOMETRY));
    }

    #[test]
    fn empty_schedule_does_not_request() {
        let mut frames = FrameCoalescer::new();
        assert!(!frames.schedule(FrameWork::empty()));
        assert!(!frames.is_requested());
    }

    #[test]
    fn ordered_stages_follow_pipeline() {
        let order: Vec<_> = FrameWork::all().ordered().collect();
        assert_eq!(
            order,
            vec![
                FrameWork::GEOMETRY,
                FrameWork::ANIMATION,
                FrameWork::MINIMAP_SCROLL,
                FrameWork::WINDOW,
                FrameWork::ACTIVE,
                FrameWork::SLIDER,
            ]
        );
    }

    #[test]
    fn ordered_skips_unscheduled() {
        let order: Vec<_> = (FrameWork::ACTIVE | FrameWork::GEOMETRY).ordered().collect();
        assert_eq!(order, vec![FrameWork::GEOMETRY, FrameWork::ACTIVE]);
    }

    #[test]
    fn clear_discards() {
        let mut frames = FrameCoalescer::new();
        frames.schedule(FrameWork::LAYOUT);
        frames.clear();
        assert!(!frames.has_pending());
        assert!(frames.take().is_empty());
        assert_eq!(frames.frames_run(), 0);
    }
}
