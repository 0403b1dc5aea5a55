#![forbid(unsafe_code)]

//! Navigation requests and flow animation.
//!
//! A navigation is `Idle → Animating → Idle`. Jump mode writes the target
//! offset at once; flow mode runs a [`Flight`]: one [`Tween`] for content
//! scroll and one for the runner on the track, both sharing a duration scaled
//! by travel distance ([`flow_duration`]).
//!
//! Keyboard steps go through a bounded queue. A repeat event is dropped when
//! anything is already queued, and a request is only dispatched once the
//! previous flight has ended. A flight is never cut short mid-way: it either
//! completes or is snapped to its target by [`NavigationController::finalize`].

use std::collections::VecDeque;
use std::time::Duration;

use scrollmark_core::animation::{Animation, SpringProfile, Tween};
use tracing::trace;
use web_time::Instant;

use crate::anchor::{Anchor, AnchorId, ContainerId};
use crate::config::NavigationConfig;
use crate::geometry::Layout;
use crate::host::{ContentPanel, KeyAction, Step};

/// Flow duration for `distance` pixels of travel on a track of `track_height`.
#[must_use]
pub fn flow_duration(distance: f64, track_height: f64, config: &NavigationConfig) -> Duration {
    let ratio = if track_height > 0.0 {
        (distance.abs() / track_height).clamp(config.min_distance_ratio, config.max_distance_ratio)
    } else {
        config.min_distance_ratio
    };
    let ms = (config.base_duration_ms as f64 * ratio).clamp(
        config.min_duration_ms as f64,
        config.max_duration_ms.max(config.min_duration_ms) as f64,
    );
    Duration::from_millis(ms.round() as u64)
}

/// Where a keyboard step lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTarget {
    Anchor(usize),
    /// Already at the first or last visible anchor.
    Boundary,
}

/// Resolve a step from anchor `from` over the layout's visible anchors.
///
/// With no origin, both directions land on the first visible anchor.
#[must_use]
pub fn resolve_step(layout: &Layout, from: Option<usize>, step: Step) -> StepTarget {
    let Some(from) = from else {
        return layout
            .order
            .first()
            .map_or(StepTarget::Boundary, |&i| StepTarget::Anchor(i));
    };
    let target = match step {
        Step::Next => layout.order.iter().copied().filter(|&i| i > from).min(),
        Step::Previous => layout.order.iter().copied().filter(|&i| i < from).max(),
    };
    target.map_or(StepTarget::Boundary, StepTarget::Anchor)
}

/// What the anchor source reports, either at the last scan or right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSnapshot {
    /// Raw candidate count, before detached, nested, and duplicate
    /// candidates are dropped. `None` when the source cannot say cheaply.
    pub candidates: Option<usize>,
    /// Scrollable container the anchors belong to.
    pub container: Option<ContainerId>,
}

/// Whether the anchor list no longer reflects the content.
///
/// Checks, cheapest first: the candidate count, the owning container, and
/// whether every anchor node is still attached.
#[must_use]
pub fn is_stale(
    anchors: &[Anchor],
    panel: &dyn ContentPanel,
    live: SourceSnapshot,
    scanned: SourceSnapshot,
) -> bool {
    if live
        .candidates
        .zip(scanned.candidates)
        .is_some_and(|(now, then)| now != then)
    {
        return true;
    }
    if scanned.container.is_some() && live.container != scanned.container {
        return true;
    }
    anchors.iter().any(|a| panel.node_offset(a.node).is_none())
}

/// Scroll and runner positions produced by one flight tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightFrame {
    pub scroll: f64,
    pub runner: Option<f64>,
    pub done: bool,
}

/// An in-progress flow animation toward one anchor.
#[derive(Debug, Clone)]
pub struct Flight {
    target: AnchorId,
    scroll: Tween,
    runner: Option<Tween>,
    last_tick: Instant,
}

impl Flight {
    #[must_use]
    pub fn new(
        target: AnchorId,
        scroll_from: f64,
        scroll_to: f64,
        runner: Option<(f64, f64)>,
        duration: Duration,
        profile: SpringProfile,
        now: Instant,
    ) -> Self {
        Self {
            target,
            scroll: Tween::new(scroll_from, scroll_to, duration, profile),
            runner: runner.map(|(from, to)| Tween::new(from, to, duration, profile)),
            last_tick: now,
        }
    }

    #[must_use]
    pub fn target(&self) -> &AnchorId {
        &self.target
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.scroll.duration()
    }

    #[must_use]
    pub fn destination(&self) -> f64 {
        self.scroll.end()
    }

    /// Advance to `now`.
    pub fn advance(&mut self, now: Instant) -> FlightFrame {
        let dt = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.scroll.tick(dt);
        if let Some(runner) = &mut self.runner {
            runner.tick(dt);
        }
        self.frame()
    }

    /// Jump both tweens to their ends.
    pub fn snap(&mut self) -> FlightFrame {
        self.scroll.finish();
        if let Some(runner) = &mut self.runner {
            runner.finish();
        }
        self.frame()
    }

    fn frame(&self) -> FlightFrame {
        FlightFrame {
            scroll: self.scroll.current(),
            runner: self.runner.as_ref().map(Tween::current),
            done: self.scroll.is_complete(),
        }
    }
}

/// Keyboard queue, cursor, and the current flight.
#[derive(Debug, Clone)]
pub struct NavigationController {
    queue: VecDeque<Step>,
    depth: usize,
    cursor: Option<AnchorId>,
    flight: Option<Flight>,
    dispatched: u64,
}

impl NavigationController {
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(depth),
            depth: depth.max(1),
            cursor: None,
            flight: None,
            dispatched: 0,
        }
    }

    /// Queue a keyboard step. Returns `false` if it was dropped.
    pub fn enqueue(&mut self, action: KeyAction) -> bool {
        if action.repeat && !self.queue.is_empty() {
            trace!(step = ?action.step, "repeat dropped");
            return false;
        }
        if self.queue.len() >= self.depth {
            trace!(step = ?action.step, queued = self.queue.len(), "queue full");
            return false;
        }
        self.queue.push_back(action.step);
        true
    }

    /// Next step to run, if nothing is animating.
    pub fn next_request(&mut self) -> Option<Step> {
        if self.flight.is_some() {
            return None;
        }
        let step = self.queue.pop_front()?;
        self.dispatched += 1;
        Some(step)
    }

    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn has_queued(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Requests taken from the queue so far.
    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// The last navigation target.
    #[must_use]
    pub fn cursor(&self) -> Option<&AnchorId> {
        self.cursor.as_ref()
    }

    pub fn set_cursor(&mut self, id: Option<AnchorId>) {
        self.cursor = id;
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.flight.is_some()
    }

    #[must_use]
    pub fn flight(&self) -> Option<&Flight> {
        self.flight.as_ref()
    }

    pub fn begin(&mut self, flight: Flight) {
        self.cursor = Some(flight.target.clone());
        self.flight = Some(flight);
    }

    /// Advance the flight; returns the finished flight alongside its last
    /// frame once it completes.
    pub fn advance(&mut self, now: Instant) -> Option<(FlightFrame, Option<Flight>)> {
        let flight = self.flight.as_mut()?;
        let frame = flight.advance(now);
        if frame.done {
            return Some((frame, self.flight.take()));
        }
        Some((frame, None))
    }

    /// Snap the current flight to its target and end it.
    pub fn finalize(&mut self) -> Option<(FlightFrame, Flight)> {
        let mut flight = self.flight.take()?;
        let frame = flight.snap();
        Some((frame, flight))
    }

    /// Drop queued requests and any flight without applying it.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.flight = None;
        self.cursor = None;
    }
}
