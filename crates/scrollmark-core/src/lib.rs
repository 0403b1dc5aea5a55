#![forbid(unsafe_code)]

//! Core: animation, frame coalescing, gestures, events, and anchor text.
//!
//! # Role in Scrollmark
//! `scrollmark-core` holds the primitives the minimap engine is assembled
//! from. Nothing here knows about anchors, tracks, or content panels; every
//! type is a small state machine driven by explicit timestamps so it can be
//! tested without a host event loop.
//!
//! # Primary responsibilities
//! - **Animation**: easing curves, damped springs, spring profiles, tweens.
//! - **FrameCoalescer**: at-most-once-per-frame scheduling of ordered work.
//! - **EventBus**: explicitly owned publish/subscribe with unsubscribe handles.
//! - **Gestures**: long-press detection with click suppression, drag tracking.
//! - **Text**: normalization of anchor text and grapheme-aware measurement.
//!
//! # How it fits in the system
//! `scrollmark-engine` owns one of each of these per minimap instance and
//! wires them to the host's content panel and minimap surface.

pub mod animation;
pub mod event_bus;
pub mod frame;
pub mod gesture;
pub mod logging;
pub mod text;

pub use logging::{debug, debug_span, info, trace, warn};
