#![forbid(unsafe_code)]

//! The [`TimelineEngine`] facade.
//!
//! The engine owns every piece of minimap state and is driven entirely by
//! the host's event loop:
//!
//! | Host event                    | Engine entry point                   |
//! |-------------------------------|--------------------------------------|
//! | content scroll                | [`TimelineEngine::on_content_scroll`] |
//! | pane resize                   | [`TimelineEngine::on_resize`]        |
//! | anchor source mutation        | [`TimelineEngine::notify_content_changed`] |
//! | animation frame               | [`TimelineEngine::on_frame`]         |
//! | timer at `next_deadline()`    | [`TimelineEngine::on_tick`]          |
//! | keyboard previous / next      | [`TimelineEngine::on_keyboard`]      |
//! | marker click / preview click  | [`TimelineEngine::on_marker_click`] / [`TimelineEngine::navigate_to`] |
//!
//! Handlers only record work in a [`FrameCoalescer`]; a single
//! [`on_frame`](TimelineEngine::on_frame) pass then runs the stages in a
//! fixed order: geometry, animation, minimap scroll, window, active anchor,
//! slider. A stage may add work for the stages after it.
//!
//! # Failure Modes
//!
//! Nothing here returns an error. A failing anchor source reads as "no
//! anchors" (with a bounded retry); failing persistence reads as empty state
//! and writes are dropped; both are logged at `warn`.

use std::time::Duration;

use ahash::{AHashMap, AHashSet};
use scrollmark_core::event_bus::{EventBus, SubscriptionHandle};
use scrollmark_core::frame::{FrameCoalescer, FrameWork};
use scrollmark_core::gesture::{LongPressDetector, Point};
use tracing::{debug, debug_span, warn};
use web_time::Instant;

use crate::anchor::{Anchor, AnchorId, ContainerId, Level};
use crate::config::{EngineConfig, NavMode};
use crate::geometry::{Layout, LayoutEntry, compute_layout, group_end};
use crate::host::{
    AnchorSource, ContentPanel, KeyAction, MarkerAttrs, MinimapSurface, PreviewEntry,
    PreviewPanel, Step, Translate,
};
use crate::interaction::{
    MenuAction, MenuItem, SliderModel, TextMeasure, TooltipLayout, build_menu, place_tooltip,
    wheel_scroll,
};
use crate::navigation::{
    Flight, NavigationController, SourceSnapshot, StepTarget, flow_duration, is_stale,
    resolve_step,
};
use crate::persistence::{StateKind, StateStore};
use crate::registry::{AnchorRegistry, Remeasured, RescanOutcome};
use crate::sync::{
    ActiveChange, ActiveTracker, OffsetTable, Proposal, TrackMap, active_index,
    active_index_linear, follow_track_scroll, reference_point,
};
use crate::window::{VirtualWindow, buffer_for, visible_range};

/// Everything the engine talks to.
pub struct Collaborators {
    pub panel: Box<dyn ContentPanel>,
    pub surface: Box<dyn MinimapSurface>,
    pub source: Box<dyn AnchorSource>,
    pub store: StateStore,
    pub labels: Box<dyn Translate>,
}

/// Notifications published on the engine's bus.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    AnchorsChanged { version: u64, count: usize },
    ActiveChanged {
        previous: Option<AnchorId>,
        current: Option<AnchorId>,
    },
    NavigationStarted { target: AnchorId, duration: Duration },
    NavigationFinished { target: AnchorId },
    StarToggled { id: AnchorId, starred: bool },
    CollapseToggled { id: AnchorId, collapsed: bool },
    LevelChanged { id: AnchorId, level: Level },
}

/// A proportional anchor minimap bound to one content panel.
pub struct TimelineEngine {
    config: EngineConfig,
    panel: Box<dyn ContentPanel>,
    surface: Box<dyn MinimapSurface>,
    source: Box<dyn AnchorSource>,
    store: StateStore,
    labels: Box<dyn Translate>,
    preview: Option<Box<dyn PreviewPanel>>,

    registry: AnchorRegistry,
    starred: AHashSet<AnchorId>,
    collapsed: AHashSet<AnchorId>,
    levels: AHashMap<AnchorId, Level>,

    layout: Layout,
    layout_version: u64,
    offsets: OffsetTable,
    track_map: TrackMap,
    window: VirtualWindow,
    active: ActiveTracker,
    nav: NavigationController,
    slider: SliderModel,
    long_press: LongPressDetector<AnchorId>,

    frame: FrameCoalescer,
    bus: EventBus<EngineEvent>,
    subscriptions: Vec<SubscriptionHandle>,
    content_change_due: Option<Instant>,
    remeasure_due: bool,
    scanned: SourceSnapshot,
    torn_down: bool,
}

impl std::fmt::Debug for TimelineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineEngine")
            .field("anchors", &self.registry.len())
            .field("version", &self.registry.version())
            .field("active", &self.active.current())
            .field("animating", &self.nav.is_animating())
            .field("pending", &self.frame.pending())
            .finish_non_exhaustive()
    }
}

impl TimelineEngine {
    /// Build an engine and load persisted state for the store's session.
    #[must_use]
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            panel,
            surface,
            source,
            store,
            labels,
        } = collaborators;
        let persisted = store.load();
        debug!(
            session = store.session(),
            starred = persisted.starred.len(),
            collapsed = persisted.collapsed.len(),
            levels = persisted.levels.len(),
            "loaded anchor state"
        );
        Self {
            active: ActiveTracker::new(config.sync.min_active_interval()),
            nav: NavigationController::new(config.navigation.queue_depth),
            slider: SliderModel::new(
                config.interaction.slider_fade(),
                config.interaction.min_thumb,
            ),
            long_press: LongPressDetector::new(config.interaction.long_press()),
            config,
            panel,
            surface,
            source,
            store,
            labels,
            preview: None,
            registry: AnchorRegistry::new(),
            starred: persisted.starred,
            collapsed: persisted.collapsed,
            levels: persisted.levels,
            layout: Layout::default(),
            layout_version: 0,
            offsets: OffsetTable::default(),
            track_map: TrackMap::default(),
            window: VirtualWindow::new(),
            frame: FrameCoalescer::new(),
            bus: EventBus::new(),
            subscriptions: Vec::new(),
            content_change_due: None,
            remeasure_due: false,
            scanned: SourceSnapshot::default(),
            torn_down: false,
        }
    }

    /// First scan and layout.
    pub fn init(&mut self, now: Instant) {
        self.rescan(now);
        self.schedule(FrameWork::LAYOUT | FrameWork::SCROLL);
    }

    // -- accessors ----------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn anchors(&self) -> &[Anchor] {
        self.registry.anchors()
    }

    #[must_use]
    pub fn registry_version(&self) -> u64 {
        self.registry.version()
    }

    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[must_use]
    pub fn active(&self) -> Option<&AnchorId> {
        self.active.current()
    }

    #[must_use]
    pub fn cursor(&self) -> Option<&AnchorId> {
        self.nav.cursor()
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.nav.is_animating()
    }

    #[must_use]
    pub fn queued_navigations(&self) -> usize {
        self.nav.queued()
    }

    #[must_use]
    pub fn is_starred(&self, id: &AnchorId) -> bool {
        self.starred.contains(id)
    }

    #[must_use]
    pub fn is_collapsed(&self, id: &AnchorId) -> bool {
        self.collapsed.contains(id)
    }

    /// Anchor indices with a live marker.
    #[must_use]
    pub fn rendered(&self) -> &[usize] {
        self.window.rendered()
    }

    /// Work waiting for the next frame.
    #[must_use]
    pub fn pending_work(&self) -> FrameWork {
        self.frame.pending()
    }

    #[must_use]
    pub fn frames_run(&self) -> u64 {
        self.frame.frames_run()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.bus.subscriber_count()
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Earliest time [`on_tick`](Self::on_tick) has something to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.content_change_due,
            self.registry.retry_due(),
            self.active.pending_deadline(),
            self.long_press.deadline(),
            self.slider.fade_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // -- subscriptions ------------------------------------------------------

    /// Register for engine events. The handle is released on teardown.
    pub fn subscribe(&mut self, callback: impl FnMut(&EngineEvent) + 'static) -> SubscriptionHandle {
        let handle = self.bus.subscribe(callback);
        self.subscriptions.push(handle);
        handle
    }

    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.subscriptions.retain(|h| *h != handle);
        self.bus.unsubscribe(handle)
    }

    /// Mirror anchors and the active anchor into `preview`.
    pub fn attach_preview(&mut self, preview: Box<dyn PreviewPanel>) {
        self.preview = Some(preview);
        self.push_preview_entries();
        if let Some(preview) = self.preview.as_mut() {
            preview.active_changed(self.active.current());
        }
    }

    // -- host events --------------------------------------------------------

    pub fn on_content_scroll(&mut self) {
        if self.torn_down {
            return;
        }
        self.schedule(FrameWork::SCROLL | FrameWork::SLIDER);
    }

    /// The pane resized; content may have reflowed. Anchors are remeasured
    /// at the start of the next frame's geometry stage.
    pub fn on_resize(&mut self) {
        if self.torn_down {
            return;
        }
        self.remeasure_due = true;
        self.schedule(FrameWork::LAYOUT | FrameWork::MINIMAP_SCROLL);
    }

    /// The anchor source saw a mutation; rescan once it has been quiet for
    /// the debounce period.
    pub fn notify_content_changed(&mut self, now: Instant) {
        if self.torn_down {
            return;
        }
        self.content_change_due = Some(now + self.config.registry.change_debounce());
    }

    /// Fire due timers.
    pub fn on_tick(&mut self, now: Instant) {
        if self.torn_down {
            return;
        }
        if self.content_change_due.is_some_and(|due| now >= due) {
            self.content_change_due = None;
            self.rescan(now);
        } else if self.registry.take_retry(now) {
            debug!("retrying empty anchor scan");
            self.rescan(now);
        }
        if let Some(change) = self.active.poll(self.registry.version(), now) {
            self.apply_active_change(change);
        }
        if let Some(id) = self.long_press.poll(now) {
            self.toggle_star(&id);
        }
        if self.slider.poll(now) {
            self.schedule(FrameWork::SLIDER);
        }
    }

    /// Run one coalesced frame pass.
    pub fn on_frame(&mut self, now: Instant) {
        if self.torn_down {
            return;
        }
        let mut work = self.frame.take();
        if !work.is_empty() {
            let _span = debug_span!("engine.frame", work = ?work).entered();
            for stage in FrameWork::all().ordered() {
                if work.contains(stage) {
                    work |= self.run_stage(stage, now);
                }
            }
        }
        if self.nav.is_animating() || self.nav.has_queued() {
            self.schedule(FrameWork::ANIMATION);
        }
    }

    /// Queue a keyboard step. Returns `false` if it was dropped.
    pub fn on_keyboard(&mut self, action: KeyAction) -> bool {
        if self.torn_down {
            return false;
        }
        let accepted = self.nav.enqueue(action);
        if accepted {
            self.schedule(FrameWork::ANIMATION);
        }
        accepted
    }

    /// Navigate to a clicked marker. Returns `false` if the click was
    /// swallowed or the anchor is unknown.
    pub fn on_marker_click(&mut self, id: &AnchorId, now: Instant) -> bool {
        if self.torn_down {
            return false;
        }
        if self.long_press.suppresses_click(now) {
            debug!(%id, "click suppressed after long press");
            return false;
        }
        self.long_press.cancel();
        self.navigate_to(id, now)
    }

    /// Navigate to an anchor as a click would, e.g. from the preview list.
    pub fn navigate_to(&mut self, id: &AnchorId, now: Instant) -> bool {
        if self.torn_down {
            return false;
        }
        let Some(index) = self.registry.index_of(id) else {
            return false;
        };
        let origin = self.origin_y();
        if let Some(change) = self.active.clear() {
            self.apply_active_change(change);
        }
        self.start_navigation(index, origin, now);
        true
    }

    pub fn on_marker_pointer_down(&mut self, id: &AnchorId, at: Point, now: Instant) {
        if self.torn_down {
            return;
        }
        self.long_press.pointer_down(id.clone(), at, now);
    }

    pub fn on_marker_pointer_move(&mut self, at: Point) {
        self.long_press.pointer_move(at);
    }

    pub fn on_marker_pointer_up(&mut self) {
        self.long_press.pointer_up();
    }

    /// Capture the slider at `pointer_y`.
    pub fn on_slider_pointer_down(&mut self, pointer_y: f64) {
        if self.torn_down {
            return;
        }
        self.long_press.cancel();
        self.slider
            .pointer_down(pointer_y, self.surface.track_scroll());
        self.schedule(FrameWork::SLIDER);
    }

    /// Drag the slider; scrolls the track and the content directly.
    pub fn on_slider_pointer_move(&mut self, pointer_y: f64) {
        let viewport = self.surface.viewport_height();
        let Some(track_scroll) =
            self.slider
                .pointer_move(pointer_y, viewport, self.layout.track_height)
        else {
            return;
        };
        self.jump_to_track_scroll(track_scroll);
    }

    pub fn on_slider_pointer_up(&mut self, now: Instant) {
        if self.slider.pointer_up(now) {
            self.schedule(FrameWork::SLIDER);
        }
    }

    /// Wheel over the minimap.
    pub fn on_minimap_wheel(&mut self, delta_y: f64, now: Instant) {
        if self.torn_down {
            return;
        }
        let track_max = self.track_max();
        let track_scroll = wheel_scroll(self.surface.track_scroll(), delta_y, track_max);
        self.slider.touch(now);
        self.jump_to_track_scroll(track_scroll);
    }

    // -- anchor state -------------------------------------------------------

    /// Flip the starred flag. Returns the new value.
    pub fn toggle_star(&mut self, id: &AnchorId) -> Option<bool> {
        let index = self.registry.index_of(id)?;
        let starred = !self.starred.contains(id);
        if starred {
            self.starred.insert(id.clone());
        } else {
            self.starred.remove(id);
        }
        self.registry.anchors_mut()[index].starred = starred;
        self.store.save_set(StateKind::Starred, &self.starred);
        self.patch_marker(index);
        self.push_preview_entries();
        self.bus.publish(&EngineEvent::StarToggled {
            id: id.clone(),
            starred,
        });
        Some(starred)
    }

    /// Collapse or expand an anchor's group. Returns the new state, or `None`
    /// if the anchor is unknown or has nothing to collapse.
    pub fn toggle_collapse(&mut self, id: &AnchorId) -> Option<bool> {
        let index = self.registry.index_of(id)?;
        let collapsed = !self.collapsed.contains(id);
        if collapsed {
            if !self.is_collapsible(index) {
                return None;
            }
            self.collapsed.insert(id.clone());
        } else {
            self.collapsed.remove(id);
        }
        self.store.save_set(StateKind::Collapsed, &self.collapsed);
        self.schedule(FrameWork::LAYOUT);
        self.bus.publish(&EngineEvent::CollapseToggled {
            id: id.clone(),
            collapsed,
        });
        Some(collapsed)
    }

    /// Assign an outline level and re-derive collapse groups.
    pub fn set_level(&mut self, id: &AnchorId, level: Level) -> bool {
        let Some(index) = self.registry.index_of(id) else {
            return false;
        };
        let level = Level::new(level.get());
        if level == Level::TOP {
            self.levels.remove(id);
        } else {
            self.levels.insert(id.clone(), level);
        }
        self.registry.anchors_mut()[index].level = level;
        self.store.save_levels(&self.levels);
        self.schedule(FrameWork::LAYOUT);
        self.bus.publish(&EngineEvent::LevelChanged {
            id: id.clone(),
            level,
        });
        true
    }

    /// Actions offered for `id`.
    #[must_use]
    pub fn context_menu(&self, id: &AnchorId) -> Option<Vec<MenuItem>> {
        let index = self.registry.index_of(id)?;
        let anchor = &self.registry.anchors()[index];
        Some(build_menu(
            anchor.starred,
            self.collapsed.contains(id),
            self.is_collapsible(index),
            anchor.level,
            self.labels.as_ref(),
        ))
    }

    pub fn apply_menu_action(&mut self, id: &AnchorId, action: MenuAction) -> bool {
        match action {
            MenuAction::ToggleStar => self.toggle_star(id).is_some(),
            MenuAction::ToggleCollapse => self.toggle_collapse(id).is_some(),
            MenuAction::SetLevel(level) => self.set_level(id, level),
        }
    }

    /// Tooltip for the marker of `id`, drawn between `marker_left` and
    /// `marker_right` on the surface.
    #[must_use]
    pub fn tooltip(
        &self,
        id: &AnchorId,
        marker_left: f64,
        marker_right: f64,
        measure: &dyn TextMeasure,
    ) -> Option<TooltipLayout> {
        let anchor = self.registry.get(id)?;
        Some(place_tooltip(
            marker_left,
            marker_right,
            self.surface.viewport_width(),
            &anchor.summary,
            measure,
            &self.config.interaction.tooltip,
        ))
    }

    /// Release subscriptions and markers and stop reacting to events.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        for handle in self.subscriptions.drain(..) {
            self.bus.unsubscribe(handle);
        }
        self.window.clear();
        for handle in self.registry.clear() {
            self.surface.destroy_marker(handle);
        }
        self.surface.hide_runner();
        self.nav.reset();
        self.active.reset();
        self.slider.reset();
        self.long_press.cancel();
        self.frame.clear();
        self.layout = Layout::default();
        self.offsets.clear();
        self.track_map.clear();
        self.content_change_due = None;
        self.remeasure_due = false;
        self.preview = None;
        self.torn_down = true;
        debug!("engine torn down");
    }

    // -- registry -----------------------------------------------------------

    /// Rescan the anchor source now.
    pub fn rescan(&mut self, now: Instant) -> RescanOutcome {
        let candidates = match self.source.candidates() {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!(%error, "anchor source failed; treating as empty");
                Vec::new()
            }
        };
        self.scanned = SourceSnapshot {
            candidates: Some(candidates.len()),
            container: self.live_container(),
        };
        let outcome =
            self.registry
                .rescan(candidates, self.panel.as_ref(), &self.config.registry, now);
        let version = self.registry.version();
        match &outcome {
            RescanOutcome::Unchanged => {
                self.window.retag(version);
                self.offsets.rebuild(self.registry.anchors(), version);
                self.layout_version = version;
                self.schedule(FrameWork::ACTIVE);
            }
            RescanOutcome::Relaid => {
                self.window.retag(version);
                self.schedule(FrameWork::LAYOUT);
            }
            RescanOutcome::Rebuilt { retired } | RescanOutcome::Empty { retired, .. } => {
                for &handle in retired {
                    self.surface.destroy_marker(handle);
                }
                self.window.reset(version);
                self.registry.apply_state(&self.starred, &self.levels);
                self.push_preview_entries();
                self.bus.publish(&EngineEvent::AnchorsChanged {
                    version,
                    count: self.registry.len(),
                });
                self.schedule(FrameWork::LAYOUT | FrameWork::SCROLL);
            }
        }
        outcome
    }

    // -- frame stages -------------------------------------------------------

    fn schedule(&mut self, work: FrameWork) {
        if self.frame.schedule(work) {
            self.surface.request_frame();
        }
    }

    fn run_stage(&mut self, stage: FrameWork, now: Instant) -> FrameWork {
        if stage == FrameWork::GEOMETRY {
            self.run_remeasure(now);
            self.run_geometry();
        } else if stage == FrameWork::ANIMATION {
            return self.run_animation(now);
        } else if stage == FrameWork::MINIMAP_SCROLL {
            self.run_minimap_scroll();
        } else if stage == FrameWork::WINDOW {
            self.run_window();
        } else if stage == FrameWork::ACTIVE {
            self.run_active(now);
        } else if stage == FrameWork::SLIDER {
            self.run_slider();
        }
        FrameWork::empty()
    }

    fn run_remeasure(&mut self, now: Instant) {
        if !std::mem::take(&mut self.remeasure_due) || self.registry.is_empty() {
            return;
        }
        match self.registry.remeasure(self.panel.as_ref()) {
            Remeasured::InPlace { moved: true } => self.window.retag(self.registry.version()),
            Remeasured::InPlace { moved: false } => {}
            Remeasured::OutOfOrder => {
                debug!("anchors reordered by reflow; rescanning");
                self.rescan(now);
            }
        }
    }

    fn run_geometry(&mut self) {
        let entries: Vec<LayoutEntry> = self
            .registry
            .anchors()
            .iter()
            .map(|a| LayoutEntry {
                base_n: a.base_n,
                level: a.level,
                collapsed: self.collapsed.contains(&a.id),
            })
            .collect();
        let pane = self.surface.viewport_height();
        self.layout = compute_layout(&entries, pane, &self.config.geometry);
        for (anchor, n) in self.registry.anchors_mut().iter_mut().zip(&self.layout.n) {
            anchor.n = *n;
        }
        let version = self.registry.version();
        self.layout_version = version;
        self.offsets.rebuild(self.registry.anchors(), version);
        self.track_map
            .rebuild(self.registry.anchors(), &self.layout.order, &self.layout.ys);
        self.surface.set_track_height(self.layout.track_height);
    }

    fn run_animation(&mut self, now: Instant) -> FrameWork {
        let follow = FrameWork::MINIMAP_SCROLL | FrameWork::WINDOW | FrameWork::SLIDER;
        if let Some((frame, finished)) = self.nav.advance(now) {
            self.panel.set_scroll_top(frame.scroll);
            if let Some(y) = frame.runner {
                self.surface.move_runner(y);
            }
            if let Some(flight) = finished {
                self.complete_flight(&flight, now);
            }
            return follow;
        }
        if let Some(step) = self.nav.next_request() {
            self.dispatch_step(step, now);
            return follow;
        }
        FrameWork::empty()
    }

    fn run_minimap_scroll(&mut self) {
        if self.slider.is_dragging() {
            return;
        }
        let ratio = self.config.sync.reference_ratio;
        let reference = reference_point(
            self.panel.scroll_top(),
            self.panel.viewport_height(),
            ratio,
        );
        let reference_y = self.track_map.track_y(
            reference,
            self.panel.scroll_height(),
            self.layout.track_height,
        );
        let active_y = self.scroll_anchor().and_then(|i| self.layout.y_of(i));
        let target = follow_track_scroll(
            reference_y,
            active_y,
            ratio,
            self.surface.viewport_height(),
            self.config.geometry.pad,
            self.track_max(),
        );
        self.surface.set_track_scroll(target);
    }

    fn run_window(&mut self) {
        let viewport = self.surface.viewport_height();
        let buffer = buffer_for(viewport, self.config.window.min_buffer);
        let range = visible_range(&self.layout.ys, self.surface.track_scroll(), viewport, buffer);
        let diff = self
            .window
            .sync(&self.layout, range, self.registry.version());

        for index in diff.leave {
            let handle = self
                .registry
                .anchors_mut()
                .get_mut(index)
                .and_then(|a| a.visual.take());
            if let Some(handle) = handle {
                self.surface.destroy_marker(handle);
            }
        }
        for index in diff.stay.into_iter().chain(diff.enter) {
            let Some(attrs) = self.marker_attrs(index) else {
                continue;
            };
            match self.registry.anchors()[index].visual {
                Some(handle) => self.surface.update_marker(handle, &attrs),
                None => {
                    let handle = self.surface.create_marker(&attrs);
                    self.registry.anchors_mut()[index].visual = Some(handle);
                }
            }
        }
    }

    fn run_active(&mut self, now: Instant) {
        if self.nav.is_animating() {
            return;
        }
        let version = self.registry.version();
        let candidate = self.scroll_anchor().map(|i| self.registry.anchors()[i].id.clone());
        match candidate {
            Some(id) => {
                if let Proposal::Applied(change) = self.active.propose(id, version, now) {
                    self.apply_active_change(change);
                }
            }
            None => {
                if let Some(change) = self.active.force(None, now) {
                    self.apply_active_change(change);
                }
            }
        }
    }

    fn run_slider(&mut self) {
        let state = self.slider.state(
            self.surface.viewport_height(),
            self.layout.track_height,
            self.surface.track_scroll(),
        );
        self.surface.set_slider(state);
    }

    // -- navigation ---------------------------------------------------------

    fn dispatch_step(&mut self, step: Step, now: Instant) {
        let mut target = resolve_step(&self.layout, self.step_origin(), step);
        if target == StepTarget::Boundary && self.registry_is_stale() {
            warn!(?step, "anchor list is stale at boundary; rescanning");
            self.rescan(now);
            self.run_geometry();
            target = resolve_step(&self.layout, self.step_origin(), step);
        }
        match target {
            StepTarget::Anchor(index) => {
                debug!(?step, index, "keyboard navigation");
                let origin = self.origin_y();
                self.start_navigation(index, origin, now);
            }
            StepTarget::Boundary => debug!(?step, "keyboard navigation at boundary"),
        }
    }

    fn start_navigation(&mut self, index: usize, origin_y: Option<f64>, now: Instant) {
        self.finalize_flight();
        let Some(anchor) = self.registry.anchors().get(index) else {
            return;
        };
        let id = anchor.id.clone();
        let target = self
            .panel
            .node_offset(anchor.node)
            .unwrap_or(anchor.offset)
            .clamp(0.0, self.panel.max_scroll());
        let to_y = self
            .layout
            .visible_at_or_before(index)
            .and_then(|i| self.layout.y_of(i))
            .unwrap_or(self.config.geometry.pad);

        match self.config.navigation.mode {
            NavMode::Jump => {
                self.panel.set_scroll_top(target);
                self.nav.set_cursor(Some(id.clone()));
                if let Some(change) = self.active.force(Some(id), now) {
                    self.apply_active_change(change);
                }
                self.schedule(FrameWork::MINIMAP_SCROLL | FrameWork::WINDOW | FrameWork::SLIDER);
            }
            NavMode::Flow => {
                let from_y = origin_y.unwrap_or(to_y);
                let duration = flow_duration(
                    (to_y - from_y).abs(),
                    self.layout.track_height,
                    &self.config.navigation,
                );
                let flight = Flight::new(
                    id.clone(),
                    self.panel.scroll_top(),
                    target,
                    Some((from_y, to_y)),
                    duration,
                    self.config.navigation.profile,
                    now,
                );
                debug!(anchor = %id, ?duration, "navigation started");
                self.surface.show_runner(from_y);
                self.nav.begin(flight);
                self.bus.publish(&EngineEvent::NavigationStarted {
                    target: id,
                    duration,
                });
                self.schedule(FrameWork::ANIMATION);
            }
        }
    }

    /// Snap an in-flight navigation to its target.
    fn finalize_flight(&mut self) {
        let Some((frame, flight)) = self.nav.finalize() else {
            return;
        };
        self.panel.set_scroll_top(frame.scroll);
        self.surface.hide_runner();
        debug!(anchor = %flight.target(), "navigation finalized early");
        self.bus.publish(&EngineEvent::NavigationFinished {
            target: flight.target().clone(),
        });
    }

    fn complete_flight(&mut self, flight: &Flight, now: Instant) {
        self.surface.hide_runner();
        let shown = self
            .registry
            .index_of(flight.target())
            .and_then(|i| self.layout.visible_at_or_before(i))
            .map(|i| self.registry.anchors()[i].id.clone());
        if let Some(change) = self.active.force(shown, now) {
            self.apply_active_change(change);
        }
        debug!(anchor = %flight.target(), "navigation finished");
        self.bus.publish(&EngineEvent::NavigationFinished {
            target: flight.target().clone(),
        });
    }

    fn step_origin(&self) -> Option<usize> {
        self.active
            .current()
            .or(self.nav.cursor())
            .and_then(|id| self.registry.index_of(id))
    }

    /// Track position a navigation departs from.
    fn origin_y(&self) -> Option<f64> {
        let index = self
            .active
            .current()
            .and_then(|id| self.registry.index_of(id))
            .or_else(|| self.scroll_anchor())?;
        self.layout.y_of(index)
    }

    fn registry_is_stale(&self) -> bool {
        let live = SourceSnapshot {
            candidates: self.source.live_count(),
            container: self.live_container(),
        };
        is_stale(self.registry.anchors(), self.panel.as_ref(), live, self.scanned)
    }

    fn live_container(&self) -> Option<ContainerId> {
        self.source.container().or_else(|| self.panel.container())
    }

    // -- helpers ------------------------------------------------------------

    /// Visible anchor selected by the current content scroll.
    fn scroll_anchor(&self) -> Option<usize> {
        let reference = reference_point(
            self.panel.scroll_top(),
            self.panel.viewport_height(),
            self.config.sync.reference_ratio,
        );
        let index = match self.offsets.current(self.registry.version()) {
            Some(table) => active_index(table, reference),
            None => active_index_linear(self.registry.anchors(), self.panel.as_ref(), reference),
        }?;
        self.layout.visible_at_or_before(index)
    }

    fn jump_to_track_scroll(&mut self, track_scroll: f64) {
        self.surface.set_track_scroll(track_scroll);
        let ratio = self.config.sync.reference_ratio;
        let reference = self.track_map.content_offset(
            track_scroll + ratio * self.surface.viewport_height(),
            self.panel.scroll_height(),
            self.layout.track_height,
        );
        let content = (reference - ratio * self.panel.viewport_height())
            .clamp(0.0, self.panel.max_scroll());
        self.panel.set_scroll_top(content);
        self.schedule(FrameWork::WINDOW | FrameWork::ACTIVE | FrameWork::SLIDER);
    }

    fn track_max(&self) -> f64 {
        (self.layout.track_height - self.surface.viewport_height()).max(0.0)
    }

    fn is_collapsible(&self, index: usize) -> bool {
        let levels: Vec<Level> = self.registry.anchors().iter().map(|a| a.level).collect();
        index < levels.len() && group_end(&levels, index) > index + 1
    }

    fn marker_attrs(&self, index: usize) -> Option<MarkerAttrs> {
        let anchor = self.registry.anchors().get(index)?;
        let y = self.layout.y_of(index)?;
        Some(MarkerAttrs {
            id: anchor.id.clone(),
            label: marker_label(anchor, index),
            n: anchor.n.unwrap_or(0.0),
            y,
            level: anchor.level,
            active: self.active.current() == Some(&anchor.id),
            starred: anchor.starred,
            collapsed: self.collapsed.contains(&anchor.id),
            collapsible: self.layout.collapsible.get(index).copied().unwrap_or(false),
        })
    }

    /// Refresh one marker in place. Skipped while the layout is behind the
    /// registry; the pending frame repaints everything.
    fn patch_marker(&mut self, index: usize) {
        if self.layout_version != self.registry.version() {
            return;
        }
        let Some(handle) = self.registry.anchors().get(index).and_then(|a| a.visual) else {
            return;
        };
        if let Some(attrs) = self.marker_attrs(index) {
            self.surface.update_marker(handle, &attrs);
        }
    }

    fn apply_active_change(&mut self, change: ActiveChange) {
        for id in [&change.previous, &change.current].into_iter().flatten() {
            if let Some(index) = self.registry.index_of(id) {
                self.patch_marker(index);
            }
        }
        if let Some(preview) = self.preview.as_mut() {
            preview.active_changed(change.current.as_ref());
        }
        self.bus.publish(&EngineEvent::ActiveChanged {
            previous: change.previous,
            current: change.current,
        });
    }

    fn push_preview_entries(&mut self) {
        let Some(preview) = self.preview.as_mut() else {
            return;
        };
        let entries: Vec<PreviewEntry> = self
            .registry
            .anchors()
            .iter()
            .enumerate()
            .map(|(index, a)| PreviewEntry {
                id: a.id.clone(),
                summary: a.summary.clone(),
                index,
                starred: a.starred,
            })
            .collect();
        preview.anchors_changed(&entries);
    }
}

fn marker_label(anchor: &Anchor, index: usize) -> String {
    if anchor.summary.is_empty() {
        format!("Anchor {}", index + 1)
    } else {
        anchor.summary.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;

    fn engine_with(count: u64) -> (HeadlessHost, TimelineEngine) {
        let host = HeadlessHost::new(500.0, 10_000.0, 400.0);
        for i in 0..count {
            host.add_anchor(i + 1, i as f64 * 1000.0, &format!("anchor {i}"));
        }
        let mut engine = TimelineEngine::new(EngineConfig::default(), host.collaborators("t"));
        let now = Instant::now();
        engine.init(now);
        engine.on_frame(now);
        (host, engine)
    }

    #[test]
    fn init_renders_markers_and_activates_first() {
        let (host, engine) = engine_with(4);
        assert_eq!(host.surface.markers().len(), 4);
        assert_eq!(engine.active(), Some(&engine.anchors()[0].id));
        assert_eq!(host.surface.active_ids(), vec![engine.anchors()[0].id.clone()]);
    }

    #[test]
    fn handlers_coalesce_into_one_frame() {
        let (host, mut engine) = engine_with(4);
        let before = host.surface.frame_requests();
        for _ in 0..10 {
            engine.on_content_scroll();
            engine.on_resize();
        }
        assert_eq!(host.surface.frame_requests(), before + 1);
        let frames = engine.frames_run();
        engine.on_frame(Instant::now());
        assert_eq!(engine.frames_run(), frames + 1);
    }

    #[test]
    fn star_toggle_updates_marker_in_place() {
        let (host, mut engine) = engine_with(3);
        let id = engine.anchors()[1].id.clone();
        let created = host.surface.created();
        assert_eq!(engine.toggle_star(&id), Some(true));
        assert!(host.surface.marker(&id).unwrap().starred);
        assert_eq!(host.surface.created(), created);
    }

    #[test]
    fn debug_output_is_compact() {
        let (_host, engine) = engine_with(2);
        let text = format!("{engine:?}");
        assert!(text.contains("TimelineEngine"));
        assert!(text.contains("anchors: 2"));
    }
}
