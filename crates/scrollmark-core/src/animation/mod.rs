#![forbid(unsafe_code)]

//! Time-based animation primitives.
//!
//! Every animation is advanced explicitly with [`Animation::tick`]; nothing
//! here reads a clock. Hosts feed frame deltas, tests feed fixed steps.
//!
//! # Invariants
//!
//! 1. `value()` is always within [0.0, 1.0].
//! 2. Easing functions map 0.0 → 0.0 and 1.0 → 1.0.
//! 3. `reset()` returns an animation to its initial state.

use std::time::Duration;

pub mod spring;
pub mod tween;

pub use spring::{Spring, SpringProfile};
pub use tween::Tween;

/// An easing curve over normalized time.
pub type EasingFn = fn(f64) -> f64;

/// A value that evolves over time.
pub trait Animation {
    /// Advance by `dt`.
    fn tick(&mut self, dt: Duration);

    /// Whether the animation has reached its end state.
    fn is_complete(&self) -> bool;

    /// Current progress in [0.0, 1.0].
    fn value(&self) -> f32;

    /// Return to the initial state.
    fn reset(&mut self);
}

/// Identity curve.
#[must_use]
pub fn linear(t: f64) -> f64 {
    t.clamp(0.0, 1.0)
}

/// Quadratic ease-in.
#[must_use]
pub fn ease_in(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t
}

/// Quadratic ease-out.
#[must_use]
pub fn ease_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}

/// Cubic ease-in-out: slow start, fast middle, slow end.
#[must_use]
pub fn ease_in_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        let u = -2.0 * t + 2.0;
        1.0 - u * u * u / 2.0
    }
}

/// Linear interpolation between `from` and `to`.
#[inline]
#[must_use]
pub fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}
