#![forbid(unsafe_code)]

//! Damped harmonic oscillator and the named spring profiles built on it.
//!
//! The spring follows the classical damped equation
//!
//!   F = -stiffness × (position - target) - damping × velocity
//!
//! integrated with semi-implicit Euler. Large deltas are subdivided into
//! [`MAX_STEP_SECS`] steps so high stiffness stays stable.
//!
//! # Profiles
//!
//! A [`SpringProfile`] is a shaping curve over normalized time: the response
//! of a unit spring sampled over a one-second horizon. Profiles trade
//! overshoot against smoothness:
//!
//! | Profile | Damping ratio | Overshoot |
//! |---------|---------------|-----------|
//! | `Smooth` | 1.0 (critical) | none |
//! | `Balanced` | ~0.84 | < 1% |
//! | `Springy` | ~0.55 | ~12% |
//!
//! # Invariants
//!
//! 1. Stiffness is at least [`MIN_STIFFNESS`]; damping is non-negative.
//! 2. A spring at rest stays at rest until `set_target()` or `reset()`.
//! 3. `SpringProfile::shape(0.0) == 0.0` and `shape(1.0) == 1.0`.

use std::time::Duration;

use super::Animation;

/// Maximum dt per integration step (4ms).
pub const MAX_STEP_SECS: f64 = 0.004;

/// Minimum stiffness to prevent degenerate springs.
pub const MIN_STIFFNESS: f64 = 0.1;

const DEFAULT_REST_THRESHOLD: f64 = 0.001;
const DEFAULT_VELOCITY_THRESHOLD: f64 = 0.01;

/// Virtual time a profile spring is simulated over for t ∈ [0, 1].
pub(crate) const PROFILE_HORIZON_SECS: f64 = 1.0;

/// A damped harmonic oscillator.
#[derive(Debug, Clone)]
pub struct Spring {
    position: f64,
    velocity: f64,
    target: f64,
    initial: f64,
    stiffness: f64,
    damping: f64,
    rest_threshold: f64,
    velocity_threshold: f64,
    at_rest: bool,
}

impl Spring {
    /// Create a spring starting at `initial` and targeting `target`
    /// (stiffness 170, damping 26).
    #[must_use]
    pub fn new(initial: f64, target: f64) -> Self {
        Self {
            position: initial,
            velocity: 0.0,
            target,
            initial,
            stiffness: 170.0,
            damping: 26.0,
            rest_threshold: DEFAULT_REST_THRESHOLD,
            velocity_threshold: DEFAULT_VELOCITY_THRESHOLD,
            at_rest: false,
        }
    }

    /// A spring from 0.0 to 1.0.
    #[must_use]
    pub fn normalized() -> Self {
        Self::new(0.0, 1.0)
    }

    /// Set stiffness. Clamped to [`MIN_STIFFNESS`].
    #[must_use]
    pub fn with_stiffness(mut self, k: f64) -> Self {
        self.stiffness = k.max(MIN_STIFFNESS);
        self
    }

    /// Set damping. Clamped to 0.0.
    #[must_use]
    pub fn with_damping(mut self, c: f64) -> Self {
        self.damping = c.max(0.0);
        self
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> f64 {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> f64 {
        self.target
    }

    #[inline]
    #[must_use]
    pub fn is_at_rest(&self) -> bool {
        self.at_rest
    }

    /// Change the target. Wakes the spring if it was at rest.
    pub fn set_target(&mut self, target: f64) {
        if (self.target - target).abs() > self.rest_threshold {
            self.target = target;
            self.at_rest = false;
        }
    }

    /// Damping coefficient at which the spring converges without overshoot.
    #[must_use]
    pub fn critical_damping(&self) -> f64 {
        2.0 * self.stiffness.sqrt()
    }

    fn step(&mut self, dt: f64) {
        let displacement = self.position - self.target;
        let acceleration = -self.stiffness * displacement - self.damping * self.velocity;
        self.velocity += acceleration * dt;
        self.position += self.velocity * dt;
    }

    /// Advance by `secs` of simulated time, subdividing for stability.
    pub fn advance_secs(&mut self, secs: f64) {
        if self.at_rest || secs <= 0.0 {
            return;
        }
        let mut remaining = secs;
        while remaining > 0.0 {
            let dt = remaining.min(MAX_STEP_SECS);
            self.step(dt);
            remaining -= dt;
        }
        if (self.position - self.target).abs() < self.rest_threshold
            && self.velocity.abs() < self.velocity_threshold
        {
            self.position = self.target;
            self.velocity = 0.0;
            self.at_rest = true;
        }
    }
}

impl Animation for Spring {
    fn tick(&mut self, dt: Duration) {
        self.advance_secs(dt.as_secs_f64());
    }

    fn is_complete(&self) -> bool {
        self.at_rest
    }

    fn value(&self) -> f32 {
        (self.position as f32).clamp(0.0, 1.0)
    }

    fn reset(&mut self) {
        self.position = self.initial;
        self.velocity = 0.0;
        self.at_rest = false;
    }
}

/// Named shaping curves for flow navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SpringProfile {
    /// Critically damped: no overshoot, softest arrival.
    Smooth,
    /// Slightly underdamped: a barely visible settle.
    #[default]
    Balanced,
    /// Underdamped: a visible overshoot before settling.
    Springy,
}

impl SpringProfile {
    /// All profiles, in order of increasing overshoot.
    pub const ALL: [SpringProfile; 3] = [Self::Smooth, Self::Balanced, Self::Springy];

    /// Unit spring (0 → 1) configured for this profile.
    #[must_use]
    pub fn spring(self) -> Spring {
        match self {
            Self::Smooth => {
                let k: f64 = 170.0;
                Spring::normalized()
                    .with_stiffness(k)
                    .with_damping(2.0 * k.sqrt())
            }
            Self::Balanced => Spring::normalized().with_stiffness(170.0).with_damping(22.0),
            Self::Springy => Spring::normalized().with_stiffness(210.0).with_damping(16.0),
        }
    }

    /// Shaped progress for normalized time `t`.
    ///
    /// Values between the endpoints may exceed 1.0 for underdamped profiles.
    #[must_use]
    pub fn shape(self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }
        let mut spring = self.spring();
        spring.advance_secs(t * PROFILE_HORIZON_SECS);
        spring.position()
    }

    /// Stable lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Smooth => "smooth",
            Self::Balanced => "balanced",
            Self::Springy => "springy",
        }
    }

    /// Parse a name produced by [`name`](Self::name).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name().eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS_16: Duration = Duration::from_millis(16);

    fn peak(profile: SpringProfile) -> f64 {
        (1..100)
            .map(|i| profile.shape(f64::from(i) / 100.0))
            .fold(0.0, f64::max)
    }

    #[test]
    fn spring_reaches_target() {
        let mut spring = Spring::new(0.0, 100.0);
        for _ in 0..200 {
            spring.tick(MS_16);
        }
        assert!((spring.position() - 100.0).abs() < 0.1);
        assert!(spring.is_complete());
    }

    #[test]
    fn stiffness_is_clamped() {
        let spring = Spring::normalized().with_stiffness(0.0);
        assert!(spring.critical_damping() > 0.0);
    }

    #[test]
    fn reset_returns_to_initial() {
        let mut spring = Spring::new(5.0, 10.0);
        spring.tick(MS_16);
        spring.reset();
        assert!((spring.position() - 5.0).abs() < f64::EPSILON);
        assert!(!spring.is_complete());
    }

    #[test]
    fn profile_endpoints() {
        for profile in SpringProfile::ALL {
            assert_eq!(profile.shape(0.0), 0.0);
            assert_eq!(profile.shape(1.0), 1.0);
        }
    }

    #[test]
    fn smooth_profile_never_overshoots() {
        assert!(peak(SpringProfile::Smooth) <= 1.0 + 1e-3);
    }

    #[test]
    fn springy_overshoots_more_than_balanced() {
        let springy = peak(SpringProfile::Springy);
        let balanced = peak(SpringProfile::Balanced);
        assert!(springy > 1.05, "springy peak {springy}");
        assert!(springy > balanced);
    }

    #[test]
    fn profile_is_nearly_settled_before_end() {
        for profile in SpringProfile::ALL {
            let late = profile.shape(0.98);
            assert!((late - 1.0).abs() < 0.01, "{profile:?} at 0.98: {late}");
        }
    }

    #[test]
    fn profile_names_round_trip() {
        for profile in SpringProfile::ALL {
            assert_eq!(SpringProfile::from_name(profile.name()), Some(profile));
        }
        assert_eq!(SpringProfile::from_name("wobbly"), None);
    }
}
