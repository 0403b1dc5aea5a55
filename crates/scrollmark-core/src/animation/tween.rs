#![forbid(unsafe_code)]

//! Fixed-duration scalar tween shaped by a [`SpringProfile`].
//!
//! A [`Tween`] drives a value from `from` to `to` over `duration`. Progress
//! is the response of the profile's unit spring, advanced incrementally so a
//! tick costs O(dt) rather than re-simulating from zero.
//!
//! # Invariants
//!
//! 1. `current()` equals `from` before the first tick.
//! 2. Once elapsed time reaches `duration`, `current()` equals `to` exactly
//!    and `is_complete()` is true, regardless of residual spring motion.
//! 3. A zero duration completes on the first tick.

use std::time::Duration;

use super::spring::{PROFILE_HORIZON_SECS, Spring, SpringProfile};
use super::{Animation, lerp};

/// A time-based interpolation between two scalars.
#[derive(Debug, Clone)]
pub struct Tween {
    from: f64,
    to: f64,
    duration: Duration,
    elapsed: Duration,
    profile: SpringProfile,
    spring: Spring,
}

impl Tween {
    #[must_use]
    pub fn new(from: f64, to: f64, duration: Duration, profile: SpringProfile) -> Self {
        Self {
            from,
            to,
            duration,
            elapsed: Duration::ZERO,
            profile,
            spring: profile.spring(),
        }
    }

    #[must_use]
    pub fn start(&self) -> f64 {
        self.from
    }

    #[must_use]
    pub fn end(&self) -> f64 {
        self.to
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    #[must_use]
    pub fn profile(&self) -> SpringProfile {
        self.profile
    }

    /// Shaped progress; may exceed 1.0 mid-flight for underdamped profiles.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.is_complete() {
            1.0
        } else {
            self.spring.position()
        }
    }

    /// Current interpolated value.
    #[must_use]
    pub fn current(&self) -> f64 {
        if self.is_complete() {
            self.to
        } else {
            lerp(self.from, self.to, self.spring.position())
        }
    }

    /// Jump to the end state.
    pub fn finish(&mut self) {
        self.elapsed = self.duration;
    }
}

impl Animation for Tween {
    fn tick(&mut self, dt: Duration) {
        if self.is_complete() {
            return;
        }
        let step = dt.min(self.duration - self.elapsed);
        self.elapsed += step;
        let total = self.duration.as_secs_f64();
        if total > 0.0 {
            self.spring
                .advance_secs(step.as_secs_f64() / total * PROFILE_HORIZON_SECS);
        }
    }

    fn is_complete(&self) -> bool {
        self.elapsed >= self.duration
    }

    fn value(&self) -> f32 {
        (self.progress() as f32).clamp(0.0, 1.0)
    }

    fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
        self.spring = self.profile.spring();
    }
}
