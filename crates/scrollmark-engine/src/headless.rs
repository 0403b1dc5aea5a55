#![forbid(unsafe_code)]

//! In-memory collaborators.
//!
//! Each type is a cheap handle over shared state: clone it, hand one clone to
//! the engine, and keep the other to drive or inspect it. Used by the test
//! suites and by hosts that have no real document (snapshots, replays).

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::anchor::{AnchorId, ContainerId, MarkerHandle, NodeRef};
use crate::engine::Collaborators;
use crate::error::{PersistError, SourceError};
use crate::host::{
    AnchorCandidate, AnchorSource, ContentPanel, DefaultLabels, MarkerAttrs, MinimapSurface,
    PreviewEntry, PreviewPanel, SliderState,
};
use crate::persistence::{MemoryBackend, PersistenceBackend, StateStore};

// ---------------------------------------------------------------------------
// Content panel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct NodeState {
    offset: f64,
    parent: Option<NodeRef>,
    attached: bool,
}

#[derive(Debug, Default)]
struct PanelState {
    scroll_top: f64,
    viewport: f64,
    scroll_height: f64,
    nodes: BTreeMap<NodeRef, NodeState>,
    container: Option<ContainerId>,
    writes: Vec<f64>,
}

/// A scrollable panel with positioned nodes.
#[derive(Debug, Clone, Default)]
pub struct HeadlessPanel {
    state: Rc<RefCell<PanelState>>,
}

impl HeadlessPanel {
    #[must_use]
    pub fn new(viewport: f64, scroll_height: f64) -> Self {
        let panel = Self::default();
        {
            let mut s = panel.state.borrow_mut();
            s.viewport = viewport;
            s.scroll_height = scroll_height;
        }
        panel
    }

    pub fn add_node(&self, node: NodeRef, offset: f64) {
        self.state.borrow_mut().nodes.insert(
            node,
            NodeState {
                offset,
                parent: None,
                attached: true,
            },
        );
    }

    pub fn set_parent(&self, node: NodeRef, parent: NodeRef) {
        if let Some(n) = self.state.borrow_mut().nodes.get_mut(&node) {
            n.parent = Some(parent);
        }
    }

    pub fn move_node(&self, node: NodeRef, offset: f64) {
        if let Some(n) = self.state.borrow_mut().nodes.get_mut(&node) {
            n.offset = offset;
        }
    }

    pub fn detach(&self, node: NodeRef) {
        if let Some(n) = self.state.borrow_mut().nodes.get_mut(&node) {
            n.attached = false;
        }
    }

    pub fn set_container(&self, container: Option<ContainerId>) {
        self.state.borrow_mut().container = container;
    }

    pub fn set_scroll_height(&self, height: f64) {
        self.state.borrow_mut().scroll_height = height;
    }

    pub fn set_viewport(&self, viewport: f64) {
        self.state.borrow_mut().viewport = viewport;
    }

    /// Scroll as the user would; not recorded as an engine write.
    pub fn scroll_to(&self, offset: f64) {
        let mut s = self.state.borrow_mut();
        let max = (s.scroll_height - s.viewport).max(0.0);
        s.scroll_top = offset.clamp(0.0, max);
    }

    #[must_use]
    pub fn scroll(&self) -> f64 {
        self.state.borrow().scroll_top
    }

    /// Offsets written by the engine, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<f64> {
        self.state.borrow().writes.clone()
    }
}

impl ContentPanel for HeadlessPanel {
    fn scroll_top(&self) -> f64 {
        self.state.borrow().scroll_top
    }

    fn set_scroll_top(&mut self, offset: f64) {
        self.scroll_to(offset);
        let mut s = self.state.borrow_mut();
        let applied = s.scroll_top;
        s.writes.push(applied);
    }

    fn viewport_height(&self) -> f64 {
        self.state.borrow().viewport
    }

    fn scroll_height(&self) -> f64 {
        self.state.borrow().scroll_height
    }

    fn node_offset(&self, node: NodeRef) -> Option<f64> {
        let s = self.state.borrow();
        s.nodes.get(&node).filter(|n| n.attached).map(|n| n.offset)
    }

    fn contains(&self, ancestor: NodeRef, node: NodeRef) -> bool {
        let s = self.state.borrow();
        let mut cursor = s.nodes.get(&node).and_then(|n| n.parent);
        while let Some(parent) = cursor {
            if parent == ancestor {
                return true;
            }
            cursor = s.nodes.get(&parent).and_then(|n| n.parent);
        }
        false
    }

    fn container(&self) -> Option<ContainerId> {
        self.state.borrow().container
    }
}

// ---------------------------------------------------------------------------
// Minimap surface
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SurfaceState {
    viewport_height: f64,
    viewport_width: f64,
    track_height: f64,
    track_scroll: f64,
    markers: BTreeMap<MarkerHandle, MarkerAttrs>,
    next_handle: u64,
    created: u64,
    updated: u64,
    destroyed: u64,
    runner: Option<f64>,
    runner_shows: u64,
    slider: SliderState,
    frame_requests: u64,
}

/// Records everything drawn on the minimap.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    state: Rc<RefCell<SurfaceState>>,
}

impl HeadlessSurface {
    #[must_use]
    pub fn new(viewport_height: f64, viewport_width: f64) -> Self {
        let surface = Self::default();
        {
            let mut s = surface.state.borrow_mut();
            s.viewport_height = viewport_height;
            s.viewport_width = viewport_width;
        }
        surface
    }

    pub fn set_viewport_height(&self, height: f64) {
        self.state.borrow_mut().viewport_height = height;
    }

    /// Live markers ordered by track position.
    #[must_use]
    pub fn markers(&self) -> Vec<MarkerAttrs> {
        let mut markers: Vec<MarkerAttrs> = self.state.borrow().markers.values().cloned().collect();
        markers.sort_by(|a, b| a.y.total_cmp(&b.y));
        markers
    }

    #[must_use]
    pub fn marker(&self, id: &AnchorId) -> Option<MarkerAttrs> {
        self.state
            .borrow()
            .markers
            .values()
            .find(|m| &m.id == id)
            .cloned()
    }

    #[must_use]
    pub fn marker_ids(&self) -> BTreeSet<AnchorId> {
        self.state
            .borrow()
            .markers
            .values()
            .map(|m| m.id.clone())
            .collect()
    }

    #[must_use]
    pub fn active_ids(&self) -> Vec<AnchorId> {
        self.markers()
            .into_iter()
            .filter(|m| m.active)
            .map(|m| m.id)
            .collect()
    }

    #[must_use]
    pub fn created(&self) -> u64 {
        self.state.borrow().created
    }

    #[must_use]
    pub fn updated(&self) -> u64 {
        self.state.borrow().updated
    }

    #[must_use]
    pub fn destroyed(&self) -> u64 {
        self.state.borrow().destroyed
    }

    #[must_use]
    pub fn runner(&self) -> Option<f64> {
        self.state.borrow().runner
    }

    #[must_use]
    pub fn runner_shows(&self) -> u64 {
        self.state.borrow().runner_shows
    }

    #[must_use]
    pub fn slider(&self) -> SliderState {
        self.state.borrow().slider
    }

    #[must_use]
    pub fn track_height(&self) -> f64 {
        self.state.borrow().track_height
    }

    #[must_use]
    pub fn frame_requests(&self) -> u64 {
        self.state.borrow().frame_requests
    }
}

impl MinimapSurface for HeadlessSurface {
    fn viewport_height(&self) -> f64 {
        self.state.borrow().viewport_height
    }

    fn viewport_width(&self) -> f64 {
        self.state.borrow().viewport_width
    }

    fn set_track_height(&mut self, height: f64) {
        let mut s = self.state.borrow_mut();
        s.track_height = height;
        let max = (height - s.viewport_height).max(0.0);
        s.track_scroll = s.track_scroll.clamp(0.0, max);
    }

    fn track_scroll(&self) -> f64 {
        self.state.borrow().track_scroll
    }

    fn set_track_scroll(&mut self, offset: f64) {
        let mut s = self.state.borrow_mut();
        let max = (s.track_height - s.viewport_height).max(0.0);
        s.track_scroll = offset.clamp(0.0, max);
    }

    fn create_marker(&mut self, attrs: &MarkerAttrs) -> MarkerHandle {
        let mut s = self.state.borrow_mut();
        s.next_handle += 1;
        s.created += 1;
        let handle = MarkerHandle(s.next_handle);
        s.markers.insert(handle, attrs.clone());
        handle
    }

    fn update_marker(&mut self, handle: MarkerHandle, attrs: &MarkerAttrs) {
        let mut s = self.state.borrow_mut();
        s.updated += 1;
        if let Some(marker) = s.markers.get_mut(&handle) {
            *marker = attrs.clone();
        }
    }

    fn destroy_marker(&mut self, handle: MarkerHandle) {
        let mut s = self.state.borrow_mut();
        if s.markers.remove(&handle).is_some() {
            s.destroyed += 1;
        }
    }

    fn show_runner(&mut self, y: f64) {
        let mut s = self.state.borrow_mut();
        s.runner = Some(y);
        s.runner_shows += 1;
    }

    fn move_runner(&mut self, y: f64) {
        let mut s = self.state.borrow_mut();
        if s.runner.is_some() {
            s.runner = Some(y);
        }
    }

    fn hide_runner(&mut self) {
        self.state.borrow_mut().runner = None;
    }

    fn set_slider(&mut self, slider: SliderState) {
        self.state.borrow_mut().slider = slider;
    }

    fn request_frame(&mut self) {
        self.state.borrow_mut().frame_requests += 1;
    }
}

// ---------------------------------------------------------------------------
// Anchor source
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SourceState {
    candidates: Vec<AnchorCandidate>,
    detached: bool,
    live_count: Option<usize>,
    container: Option<ContainerId>,
    scans: u64,
}

/// Serves a fixed list of candidates.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSource {
    state: Rc<RefCell<SourceState>>,
}

impl HeadlessSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, candidate: AnchorCandidate) {
        self.state.borrow_mut().candidates.push(candidate);
    }

    pub fn set(&self, candidates: Vec<AnchorCandidate>) {
        self.state.borrow_mut().candidates = candidates;
    }

    /// Make scans fail as if the container were gone.
    pub fn set_detached(&self, detached: bool) {
        self.state.borrow_mut().detached = detached;
    }

    pub fn set_live_count(&self, count: Option<usize>) {
        self.state.borrow_mut().live_count = count;
    }

    pub fn set_container(&self, container: Option<ContainerId>) {
        self.state.borrow_mut().container = container;
    }

    /// Number of `candidates()` calls so far.
    #[must_use]
    pub fn scans(&self) -> u64 {
        self.state.borrow().scans
    }
}

impl AnchorSource for HeadlessSource {
    fn candidates(&mut self) -> Result<Vec<AnchorCandidate>, SourceError> {
        let mut s = self.state.borrow_mut();
        s.scans += 1;
        if s.detached {
            return Err(SourceError::Detached);
        }
        Ok(s.candidates.clone())
    }

    fn live_count(&self) -> Option<usize> {
        self.state.borrow().live_count
    }

    fn container(&self) -> Option<ContainerId> {
        self.state.borrow().container
    }
}

// ---------------------------------------------------------------------------
// Preview panel and persistence
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PreviewLog {
    lists: Vec<Vec<PreviewEntry>>,
    active: Vec<Option<AnchorId>>,
}

/// Records what the engine pushes to a preview list.
#[derive(Debug, Clone, Default)]
pub struct RecordingPreview {
    log: Rc<RefCell<PreviewLog>>,
}

impl RecordingPreview {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn last_entries(&self) -> Vec<PreviewEntry> {
        self.log.borrow().lists.last().cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn list_pushes(&self) -> usize {
        self.log.borrow().lists.len()
    }

    #[must_use]
    pub fn active_history(&self) -> Vec<Option<AnchorId>> {
        self.log.borrow().active.clone()
    }
}

impl PreviewPanel for RecordingPreview {
    fn anchors_changed(&mut self, entries: &[PreviewEntry]) {
        self.log.borrow_mut().lists.push(entries.to_vec());
    }

    fn active_changed(&mut self, active: Option<&AnchorId>) {
        self.log.borrow_mut().active.push(active.cloned());
    }
}

/// A backend whose every operation fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingBackend;

impl PersistenceBackend for FailingBackend {
    fn get_string_set(&self, _key: &str) -> Result<BTreeSet<String>, PersistError> {
        Err(PersistError::Unavailable("storage disabled".into()))
    }

    fn set_string_set(&mut self, _key: &str, _set: &BTreeSet<String>) -> Result<(), PersistError> {
        Err(PersistError::Unavailable("storage disabled".into()))
    }

    fn get_string_map(&self, _key: &str) -> Result<BTreeMap<String, String>, PersistError> {
        Err(PersistError::Unavailable("storage disabled".into()))
    }

    fn set_string_map(
        &mut self,
        _key: &str,
        _map: &BTreeMap<String, String>,
    ) -> Result<(), PersistError> {
        Err(PersistError::Unavailable("storage disabled".into()))
    }
}

// ---------------------------------------------------------------------------
// Host bundle
// ---------------------------------------------------------------------------

/// A full set of headless collaborators.
#[derive(Debug, Clone)]
pub struct HeadlessHost {
    pub panel: HeadlessPanel,
    pub surface: HeadlessSurface,
    pub source: HeadlessSource,
    pub backend: MemoryBackend,
}

impl HeadlessHost {
    /// Panel of `viewport` px over `scroll_height` px of content, minimap of
    /// `track_viewport` px.
    #[must_use]
    pub fn new(viewport: f64, scroll_height: f64, track_viewport: f64) -> Self {
        Self {
            panel: HeadlessPanel::new(viewport, scroll_height),
            surface: HeadlessSurface::new(track_viewport, 1200.0),
            source: HeadlessSource::new(),
            backend: MemoryBackend::new(),
        }
    }

    /// Add an anchor node with `text` at content `offset`.
    pub fn add_anchor(&self, node: u64, offset: f64, text: &str) {
        self.panel.add_node(NodeRef(node), offset);
        self.source.push(AnchorCandidate::new(NodeRef(node), text));
    }

    /// Collaborators for `session`, sharing state with this host.
    #[must_use]
    pub fn collaborators(&self, session: &str) -> Collaborators {
        Collaborators {
            panel: Box::new(self.panel.clone()),
            surface: Box::new(self.surface.clone()),
            source: Box::new(self.source.clone()),
            store: StateStore::new(Box::new(self.backend.clone()), session),
            labels: Box::new(DefaultLabels),
        }
    }
}
