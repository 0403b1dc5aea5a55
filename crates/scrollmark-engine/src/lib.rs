#![forbid(unsafe_code)]

//! Scrollmark engine: a proportional anchor minimap for long scrollable
//! content.
//!
//! # Role in Scrollmark
//! The engine discovers anchors (points of interest) in a content panel,
//! lays them out on a compact track, renders only the markers near the
//! visible part of the track, keeps an "active" anchor in step with the
//! content scroll, and animates navigation between anchors.
//!
//! # Pipeline
//! ```text
//! AnchorSource ─► AnchorRegistry ─► geometry ─► VirtualWindow ─► MinimapSurface
//!                      │                              ▲
//!                      └─ version ───────────────────┘
//! ContentPanel scroll ─► ActiveTracker ─► marker patches, PreviewPanel
//! keyboard / click    ─► NavigationController ─► ContentPanel scroll, runner
//! ```
//!
//! Everything after the registry is a pure function of the anchor list plus
//! collapse and level state, recomputed at most once per frame through
//! [`scrollmark_core::frame::FrameCoalescer`].
//!
//! # Hosting
//! Implement the traits in [`host`] (or use [`headless`]), build a
//! [`TimelineEngine`] and forward events to it. See the entry-point table on
//! [`TimelineEngine`]'s module.

pub mod anchor;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod headless;
pub mod host;
pub mod interaction;
pub mod navigation;
pub mod persistence;
pub mod registry;
pub mod sync;
pub mod window;

pub use anchor::{Anchor, AnchorId, ContainerId, Level, MarkerHandle, NodeRef};
pub use config::{EngineConfig, NavMode};
pub use engine::{Collaborators, EngineEvent, TimelineEngine};
pub use error::{ConfigError, PersistError, SourceError};
pub use host::{
    AnchorCandidate, AnchorSource, ContentPanel, DefaultLabels, KeyAction, MarkerAttrs,
    MinimapSurface, PreviewEntry, PreviewPanel, SliderState, Step, TextSegment, Translate,
};
pub use persistence::{MemoryBackend, PersistenceBackend, StateStore};
pub use registry::{Remeasured, RescanOutcome};
