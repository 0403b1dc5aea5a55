#![forbid(unsafe_code)]

//! Pointer gesture recognition: long press and drag.
//!
//! # State Machines
//!
//! - **Long press**: pointer-down arms the detector for a target. Moving
//!   further than the tolerance, or releasing, disarms it. Once the pointer
//!   has been held for the threshold, [`LongPressDetector::poll`] fires once
//!   and opens a click-suppression window so the release that follows does
//!   not also count as a click.
//! - **Drag**: [`DragTracker`] captures the pointer on press, remembers the
//!   origin and the value being dragged (e.g. a scroll offset), and reports
//!   the accumulated delta on each move until release.
//!
//! # Invariants
//!
//! 1. A long press fires at most once per pointer-down.
//! 2. After a fire, `suppresses_click(now)` is true until the grace window ends.
//! 3. A released or cancelled drag reports no further deltas.

use std::time::Duration;

use web_time::Instant;

/// A pointer position in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Thresholds for long-press recognition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LongPressConfig {
    /// Hold duration before the press fires (default: 550ms).
    pub threshold: Duration,
    /// Movement allowed before the press is cancelled (default: 6px).
    pub tolerance: f64,
    /// Window after a fire during which clicks are swallowed (default: 350ms).
    pub click_grace: Duration,
}

impl Default for LongPressConfig {
    fn default() -> Self {
        Self {
            threshold: Duration::from_millis(550),
            tolerance: 6.0,
            click_grace: Duration::from_millis(350),
        }
    }
}

#[derive(Debug, Clone)]
struct Armed<T> {
    target: T,
    origin: Point,
    since: Instant,
}

/// Detects stationary presses on a target of type `T`.
#[derive(Debug, Clone)]
pub struct LongPressDetector<T> {
    config: LongPressConfig,
    armed: Option<Armed<T>>,
    suppress_until: Option<Instant>,
}

impl<T: Clone> LongPressDetector<T> {
    #[must_use]
    pub fn new(config: LongPressConfig) -> Self {
        Self {
            config,
            armed: None,
            suppress_until: None,
        }
    }

    /// Arm for `target`. Replaces any previously armed press.
    pub fn pointer_down(&mut self, target: T, origin: Point, now: Instant) {
        self.armed = Some(Armed {
            target,
            origin,
            since: now,
        });
    }

    /// Cancel if the pointer strayed beyond the tolerance.
    pub fn pointer_move(&mut self, pos: Point) {
        if let Some(armed) = &self.armed
            && armed.origin.distance(pos) > self.config.tolerance
        {
            self.armed = None;
        }
    }

    /// Disarm on release.
    pub fn pointer_up(&mut self) {
        self.armed = None;
    }

    /// Disarm without firing (focus loss, scroll, drag start).
    pub fn cancel(&mut self) {
        self.armed = None;
    }

    /// Fire if the armed press has been held long enough.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let held = self
            .armed
            .as_ref()
            .is_some_and(|a| now.saturating_duration_since(a.since) >= self.config.threshold);
        if !held {
            return None;
        }
        let armed = self.armed.take()?;
        self.suppress_until = Some(now + self.config.click_grace);
        Some(armed.target)
    }

    /// Whether a click at `now` should be ignored because a press just fired.
    #[must_use]
    pub fn suppresses_click(&self, now: Instant) -> bool {
        self.suppress_until.is_some_and(|until| now < until)
    }

    /// When the armed press would fire, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.armed.as_ref().map(|a| a.since + self.config.threshold)
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

/// Tracks a captured pointer drag along one axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct DragTracker {
    active: Option<DragOrigin>,
}

#[derive(Debug, Clone, Copy)]
struct DragOrigin {
    pointer_y: f64,
    start_value: f64,
}

impl DragTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the pointer at `pointer_y`, remembering the dragged value.
    pub fn begin(&mut self, pointer_y: f64, start_value: f64) {
        self.active = Some(DragOrigin {
            pointer_y,
            start_value,
        });
    }

    /// Pointer delta since capture, with the value captured at start.
    #[must_use]
    pub fn delta(&self, pointer_y: f64) -> Option<(f64, f64)> {
        self.active
            .map(|origin| (pointer_y - origin.pointer_y, origin.start_value))
    }

    /// Release the pointer. Returns `true` if a drag was in progress.
    pub fn end(&mut self) -> bool {
        self.active.take().is_some()
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }
}
