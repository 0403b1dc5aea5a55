#![forbid(unsafe_code)]

//! Anchor identity and per-anchor state.

use std::fmt;

/// Stable identifier of an anchor, derived from its content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(String);

impl AnchorId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AnchorId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Opaque handle to a node in the host's content panel.
///
/// The engine never owns the node; it only asks the panel about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(pub u64);

/// Identity of the scrollable container that owns the anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(pub u64);

/// Handle to a marker rendered on the minimap surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerHandle(pub u64);

/// Outline depth of an anchor: 1, 2 or 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Level(u8);

impl Level {
    pub const TOP: Level = Level(1);
    pub const MAX: Level = Level(3);

    /// Clamp `raw` into 1..=3.
    #[must_use]
    pub fn new(raw: u8) -> Self {
        Self(raw.clamp(Self::TOP.0, Self::MAX.0))
    }

    #[must_use]
    pub fn get(self) -> u8 {
        // Default-constructed levels are treated as top level.
        self.0.max(1)
    }

    /// Parse a persisted level; out-of-range values are clamped.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        s.trim().parse::<u8>().ok().map(Self::new)
    }
}

/// A tracked point of interest in the content panel.
#[derive(Debug, Clone)]
pub struct Anchor {
    pub id: AnchorId,
    pub node: NodeRef,
    pub summary: String,
    /// Content scroll offset at which the anchor's node reaches the top.
    pub offset: f64,
    /// Proportional document position in [0, 1], non-decreasing in order.
    pub base_n: f64,
    /// Effective position after collapse and min-gap; `None` while hidden.
    pub n: Option<f64>,
    pub level: Level,
    pub starred: bool,
    /// Marker currently rendered for this anchor, if inside the window.
    pub visual: Option<MarkerHandle>,
}

impl Anchor {
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.n.is_none()
    }
}
