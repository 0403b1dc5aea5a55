#![forbid(unsafe_code)]

//! Engine configuration as data.
//!
//! Every tunable of the minimap lives in [`EngineConfig`]. Defaults match the
//! constants the engine was tuned with, so `EngineConfig::default()` is the
//! reference behavior. With the `config-file` feature the whole structure
//! (or any subset of it) can be loaded from TOML or JSON:
//!
//! ```toml
//! [geometry]
//! min_gap = 16.0
//!
//! [navigation]
//! mode = "flow"
//! profile = "springy"
//! base_duration_ms = 700
//! ```
//!
//! Durations are stored as integer milliseconds and exposed as
//! [`Duration`] through accessor methods.

#[cfg(feature = "config-file")]
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "config-file")]
use serde::{Deserialize, Serialize};

use scrollmark_core::animation::SpringProfile;
use scrollmark_core::gesture::LongPressConfig;

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct EngineConfig {
    pub registry: RegistryConfig,
    pub geometry: GeometryConfig,
    pub window: WindowConfig,
    pub sync: SyncConfig,
    pub navigation: NavigationConfig,
    pub interaction: InteractionConfig,
}

/// Anchor discovery and identity.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct RegistryConfig {
    /// Element classes whose text is excluded from anchor text.
    pub hidden_classes: Vec<String>,
    /// Accessibility labels stripped from the start of anchor text.
    pub label_prefixes: Vec<String>,
    /// Delay before retrying a scan that found nothing.
    pub retry_delay_ms: u64,
    /// Retries before giving up until the next content change.
    pub max_retries: u32,
    /// Quiet period after a content-change signal before rescanning.
    pub change_debounce_ms: u64,
    /// Offsets closer than this (px) are treated as the same position.
    pub offset_epsilon: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            hidden_classes: vec!["sr-only".into(), "visually-hidden".into()],
            label_prefixes: vec!["You said:".into(), "ChatGPT said:".into()],
            retry_delay_ms: 300,
            max_retries: 10,
            change_debounce_ms: 250,
            offset_epsilon: 0.5,
        }
    }
}

impl RegistryConfig {
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    #[must_use]
    pub fn change_debounce(&self) -> Duration {
        Duration::from_millis(self.change_debounce_ms)
    }
}

/// Track layout.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct GeometryConfig {
    /// Padding at both ends of the track (px).
    pub pad: f64,
    /// Minimum distance between consecutive visible markers (px).
    pub min_gap: f64,
    /// Weight per level of depth applied to a collapsed descendant's span.
    pub collapse_decay: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            pad: 12.0,
            min_gap: 12.0,
            collapse_decay: 0.5,
        }
    }
}

/// Virtualization window.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct WindowConfig {
    /// Lower bound for the render buffer above and below the viewport (px).
    pub min_buffer: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { min_buffer: 200.0 }
    }
}

/// Content ↔ minimap synchronization.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct SyncConfig {
    /// Fraction of the content viewport where the reference line sits.
    pub reference_ratio: f64,
    /// Minimum time between two applied active-anchor changes.
    pub min_active_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reference_ratio: 0.45,
            min_active_interval_ms: 120,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn min_active_interval(&self) -> Duration {
        Duration::from_millis(self.min_active_interval_ms)
    }
}

/// How a navigation moves the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(rename_all = "lowercase"))]
pub enum NavMode {
    /// Instant scroll.
    Jump,
    /// Animated scroll with a runner on the track.
    #[default]
    Flow,
}

/// Navigation and animation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct NavigationConfig {
    pub mode: NavMode,
    pub profile: SpringProfile,
    pub base_duration_ms: u64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    /// Clamp applied to pixel distance / track height before scaling.
    pub min_distance_ratio: f64,
    pub max_distance_ratio: f64,
    /// Maximum queued keyboard requests.
    pub queue_depth: usize,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            mode: NavMode::Flow,
            profile: SpringProfile::Balanced,
            base_duration_ms: 650,
            min_duration_ms: 300,
            max_duration_ms: 1800,
            min_distance_ratio: 0.6,
            max_distance_ratio: 1.6,
            queue_depth: 3,
        }
    }
}

impl NavigationConfig {
    #[must_use]
    pub fn base_duration(&self) -> Duration {
        Duration::from_millis(self.base_duration_ms)
    }
}

/// Tooltip placement.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct TooltipConfig {
    /// Candidate widths, widest first (px).
    pub width_tiers: Vec<f64>,
    /// Distance between the marker and the tooltip (px).
    pub gap: f64,
    /// Space kept free at the viewport edge (px).
    pub edge_margin: f64,
    pub max_lines: usize,
    pub ellipsis: String,
}

impl Default for TooltipConfig {
    fn default() -> Self {
        Self {
            width_tiers: vec![288.0, 240.0, 200.0, 160.0],
            gap: 12.0,
            edge_margin: 8.0,
            max_lines: 3,
            ellipsis: "…".into(),
        }
    }
}

/// Pointer interaction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct InteractionConfig {
    pub long_press_ms: u64,
    /// Pointer travel that cancels a long press (px).
    pub long_press_tolerance: f64,
    /// Clicks are ignored for this long after a long press fires.
    pub click_suppress_ms: u64,
    /// Idle time after a slider drag before the slider fades.
    pub slider_fade_ms: u64,
    /// Smallest slider thumb height (px).
    pub min_thumb: f64,
    pub tooltip: TooltipConfig,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            long_press_ms: 550,
            long_press_tolerance: 6.0,
            click_suppress_ms: 350,
            slider_fade_ms: 1000,
            min_thumb: 24.0,
            tooltip: TooltipConfig::default(),
        }
    }
}

impl InteractionConfig {
    #[must_use]
    pub fn long_press(&self) -> LongPressConfig {
        LongPressConfig {
            threshold: Duration::from_millis(self.long_press_ms),
            tolerance: self.long_press_tolerance,
            click_grace: Duration::from_millis(self.click_suppress_ms),
        }
    }

    #[must_use]
    pub fn slider_fade(&self) -> Duration {
        Duration::from_millis(self.slider_fade_ms)
    }
}

impl EngineConfig {
    /// Load from a TOML string.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(ConfigError::Toml)?;
        config.validated()
    }

    /// Load from a TOML file.
    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config-file")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s).map_err(ConfigError::Json)?;
        config.validated()
    }

    /// Load from a JSON file.
    #[cfg(feature = "config-file")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Return `self` if valid, otherwise every problem found.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Check every parameter. An empty list means the config is usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let g = &self.geometry;
        if !non_negative(g.pad) {
            errors.push(format!("geometry.pad must be >= 0, got {}", g.pad));
        }
        if !non_negative(g.min_gap) {
            errors.push(format!("geometry.min_gap must be >= 0, got {}", g.min_gap));
        }
        if !(g.collapse_decay > 0.0 && g.collapse_decay < 1.0) {
            errors.push(format!(
                "geometry.collapse_decay must be in (0, 1), got {}",
                g.collapse_decay
            ));
        }
        if !non_negative(self.window.min_buffer) {
            errors.push(format!(
                "window.min_buffer must be >= 0, got {}",
                self.window.min_buffer
            ));
        }
        let r = self.sync.reference_ratio;
        if !(0.0..=1.0).contains(&r) {
            errors.push(format!("sync.reference_ratio must be in [0, 1], got {r}"));
        }
        let n = &self.navigation;
        if n.min_duration_ms > n.max_duration_ms {
            errors.push(format!(
                "navigation.min_duration_ms ({}) exceeds max_duration_ms ({})",
                n.min_duration_ms, n.max_duration_ms
            ));
        }
        if !(n.min_distance_ratio > 0.0 && n.min_distance_ratio <= n.max_distance_ratio) {
            errors.push(format!(
                "navigation distance ratio clamp [{}, {}] is invalid",
                n.min_distance_ratio, n.max_distance_ratio
            ));
        }
        if n.queue_depth == 0 {
            errors.push("navigation.queue_depth must be >= 1".to_string());
        }
        let t = &self.interaction.tooltip;
        if t.width_tiers.is_empty() {
            errors.push("interaction.tooltip.width_tiers must not be empty".to_string());
        }
        if t.width_tiers.windows(2).any(|w| w[0] < w[1]) {
            errors.push("interaction.tooltip.width_tiers must be descending".to_string());
        }
        if t.max_lines == 0 {
            errors.push("interaction.tooltip.max_lines must be >= 1".to_string());
        }
        errors
    }
}

/// False for negative values and NaN.
fn non_negative(v: f64) -> bool {
    v >= 0.0
}
