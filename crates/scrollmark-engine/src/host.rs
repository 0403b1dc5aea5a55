#![forbid(unsafe_code)]

//! Collaborator interfaces between the engine and its host.
//!
//! The engine is a pure state machine over these narrow traits:
//!
//! - [`ContentPanel`]: the scrollable content (read scroll, write scroll,
//!   measure nodes).
//! - [`MinimapSurface`]: where markers, the runner, and the slider are drawn.
//! - [`AnchorSource`]: discovers candidate anchor nodes and their text.
//! - [`Translate`]: static UI labels.
//! - [`PreviewPanel`]: an optional list view kept in step with the engine.
//!
//! Persistence lives in [`crate::persistence`].

use crate::anchor::{AnchorId, ContainerId, Level, MarkerHandle, NodeRef};
use crate::error::SourceError;

/// The scrollable content the minimap summarizes.
pub trait ContentPanel {
    fn scroll_top(&self) -> f64;

    /// Write the scroll offset. Implementations clamp to the scrollable range.
    fn set_scroll_top(&mut self, offset: f64);

    fn viewport_height(&self) -> f64;

    fn scroll_height(&self) -> f64;

    /// Scroll offset at which `node` reaches the top; `None` if detached.
    fn node_offset(&self, node: NodeRef) -> Option<f64>;

    /// Whether `node` is a strict descendant of `ancestor`.
    fn contains(&self, ancestor: NodeRef, node: NodeRef) -> bool;

    /// The scrollable container currently owning the content.
    fn container(&self) -> Option<ContainerId> {
        None
    }

    /// Largest reachable scroll offset.
    fn max_scroll(&self) -> f64 {
        (self.scroll_height() - self.viewport_height()).max(0.0)
    }
}

/// Attributes a rendered marker reflects.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerAttrs {
    pub id: AnchorId,
    /// Accessible label built from the summary text.
    pub label: String,
    /// Effective normalized position.
    pub n: f64,
    /// Pixel position on the track.
    pub y: f64,
    pub level: Level,
    pub active: bool,
    pub starred: bool,
    pub collapsed: bool,
    /// Whether the anchor has descendants it could collapse.
    pub collapsible: bool,
}

/// Proportional slider thumb state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SliderState {
    pub top: f64,
    pub height: f64,
    pub visible: bool,
}

/// The minimap track and everything drawn on it.
pub trait MinimapSurface {
    fn viewport_height(&self) -> f64;

    fn viewport_width(&self) -> f64;

    fn set_track_height(&mut self, height: f64);

    fn track_scroll(&self) -> f64;

    fn set_track_scroll(&mut self, offset: f64);

    fn create_marker(&mut self, attrs: &MarkerAttrs) -> MarkerHandle;

    fn update_marker(&mut self, handle: MarkerHandle, attrs: &MarkerAttrs);

    fn destroy_marker(&mut self, handle: MarkerHandle);

    fn show_runner(&mut self, y: f64);

    fn move_runner(&mut self, y: f64);

    fn hide_runner(&mut self);

    fn set_slider(&mut self, slider: SliderState);

    /// Ask the host to call [`crate::TimelineEngine::on_frame`] on its next frame.
    fn request_frame(&mut self);
}

/// A run of text inside a candidate node, with the classes of its element.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSegment {
    pub text: String,
    pub classes: Vec<String>,
}

impl TextSegment {
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            classes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_class(text: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            classes: vec![class.into()],
        }
    }
}

/// A node that may become an anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorCandidate {
    pub node: NodeRef,
    pub segments: Vec<TextSegment>,
}

impl AnchorCandidate {
    #[must_use]
    pub fn new(node: NodeRef, text: impl Into<String>) -> Self {
        Self {
            node,
            segments: vec![TextSegment::plain(text)],
        }
    }
}

/// Discovers candidate anchors in document order.
pub trait AnchorSource {
    fn candidates(&mut self) -> Result<Vec<AnchorCandidate>, SourceError>;

    /// Number of raw candidates `candidates()` would return now, if cheaply
    /// known. Compared with the count handed to the last scan, so nested
    /// and duplicate candidates need not be filtered out.
    fn live_count(&self) -> Option<usize> {
        None
    }

    /// Container the source is scanning, if known. Falls back to
    /// [`ContentPanel::container`] when `None`.
    fn container(&self) -> Option<ContainerId> {
        None
    }
}

/// Resolves static UI labels.
pub trait Translate {
    fn translate(&self, key: &str) -> String;
}

/// English labels for every key the engine uses.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLabels;

impl Translate for DefaultLabels {
    fn translate(&self, key: &str) -> String {
        match key {
            "menu.star" => "Star",
            "menu.unstar" => "Unstar",
            "menu.collapse" => "Collapse",
            "menu.expand" => "Expand",
            "menu.level" => "Level",
            other => other,
        }
        .to_string()
    }
}

/// One row of the preview list.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewEntry {
    pub id: AnchorId,
    pub summary: String,
    pub index: usize,
    pub starred: bool,
}

/// A list view mirroring the anchors and the active one.
pub trait PreviewPanel {
    fn anchors_changed(&mut self, entries: &[PreviewEntry]);

    fn active_changed(&mut self, active: Option<&AnchorId>);
}

/// Direction of a keyboard navigation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Previous,
    Next,
}

/// An abstract keyboard action from the host's key dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyAction {
    pub step: Step,
    /// Auto-repeat from a held key.
    pub repeat: bool,
}

impl KeyAction {
    #[must_use]
    pub fn press(step: Step) -> Self {
        Self {
            step,
            repeat: false,
        }
    }

    #[must_use]
    pub fn repeat(step: Step) -> Self {
        Self { step, repeat: true }
    }
}
