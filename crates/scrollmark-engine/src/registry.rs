#![forbid(unsafe_code)]

//! Anchor discovery, identity, and versioning.
//!
//! [`AnchorRegistry::rescan`] turns the anchor source's candidates into the
//! ordered anchor list the rest of the pipeline is a pure function of.
//!
//! # Pipeline
//!
//! 1. Drop candidates whose node is detached.
//! 2. Drop candidates nested inside another candidate (keep the topmost).
//! 3. Build text from segments, skipping visually hidden ones, then
//!    normalize it (invisible characters, whitespace, accessibility labels).
//! 4. Order by content offset and drop `(text, offset)` duplicates.
//! 5. Derive ids from a fingerprint of the text; repeated texts get an
//!    occurrence suffix. Empty texts fall back to `node-index`.
//! 6. Compute `base_n` as the offset's fraction of the first→last span.
//!
//! # Invariants
//!
//! 1. `base_n` is non-decreasing in list order and within [0, 1].
//! 2. `version()` increases on every rescan and on every remeasure that
//!    moved an anchor; work stamped with an older version is stale and must
//!    be dropped by its owner.
//! 3. An id maps to exactly one index (`index_of`).

use std::time::Duration;

use ahash::{AHashMap, AHashSet};
use scrollmark_core::text;
use tracing::{debug, debug_span};
use web_time::Instant;

use crate::anchor::{Anchor, AnchorId, Level, MarkerHandle};
use crate::config::RegistryConfig;
use crate::host::{AnchorCandidate, ContentPanel};

/// Span below which offsets are spaced uniformly instead of proportionally.
const MIN_SPAN: f64 = 1e-6;

/// Positions differing less than this are the same layout.
const BASE_N_EPSILON: f64 = 1e-4;

/// What [`AnchorRegistry::remeasure`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remeasured {
    /// Order held; offsets and `base_n` were updated in place.
    InPlace { moved: bool },
    /// Anchors no longer sit in content order. Nothing was changed; the
    /// caller must rescan.
    OutOfOrder,
}

/// What a rescan changed.
#[derive(Debug, Clone, PartialEq)]
pub enum RescanOutcome {
    /// Same ids at the same positions.
    Unchanged,
    /// Same ids, positions moved; markers stay, geometry must rerun.
    Relaid,
    /// A different anchor set. The returned markers belonged to the old set
    /// and must be destroyed by the caller.
    Rebuilt { retired: Vec<MarkerHandle> },
    /// Nothing found. A retry is due at `retry_at` unless attempts ran out.
    Empty {
        retired: Vec<MarkerHandle>,
        retry_at: Option<Instant>,
    },
}

#[derive(Debug, Clone, Copy, Default)]
struct RetryState {
    attempts: u32,
    due: Option<Instant>,
}

/// The ordered set of anchors currently known.
#[derive(Debug, Default)]
pub struct AnchorRegistry {
    anchors: Vec<Anchor>,
    by_id: AHashMap<AnchorId, usize>,
    version: u64,
    candidates_seen: usize,
    retry: RetryState,
}

/// A candidate that survived filtering, before ids are assigned.
struct Measured {
    candidate: AnchorCandidate,
    text: String,
    offset: f64,
}

impl AnchorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn anchors_mut(&mut self) -> &mut [Anchor] {
        &mut self.anchors
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn index_of(&self, id: &AnchorId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    #[must_use]
    pub fn get(&self, id: &AnchorId) -> Option<&Anchor> {
        self.index_of(id).map(|i| &self.anchors[i])
    }

    /// Candidates handed to the last rescan, before detached, nested, and
    /// duplicate ones were dropped.
    #[must_use]
    pub fn candidates_seen(&self) -> usize {
        self.candidates_seen
    }

    /// When a retry after an empty scan is due.
    #[must_use]
    pub fn retry_due(&self) -> Option<Instant> {
        self.retry.due
    }

    /// Whether `now` has reached the pending retry.
    #[must_use]
    pub fn take_retry(&mut self, now: Instant) -> bool {
        match self.retry.due {
            Some(due) if now >= due => {
                self.retry.due = None;
                true
            }
            _ => false,
        }
    }

    /// Replace the anchor list from fresh candidates.
    pub fn rescan(
        &mut self,
        candidates: Vec<AnchorCandidate>,
        panel: &dyn ContentPanel,
        config: &RegistryConfig,
        now: Instant,
    ) -> RescanOutcome {
        let _span = debug_span!("registry.rescan", candidates = candidates.len()).entered();
        self.version += 1;
        self.candidates_seen = candidates.len();

        let fresh = build_anchors(candidates, panel, config);
        if fresh.is_empty() {
            let retired = self.drain_markers();
            self.anchors.clear();
            self.by_id.clear();
            let retry_at = self.schedule_retry(config.max_retries, config.retry_delay(), now);
            debug!(version = self.version, ?retry_at, "rescan found no anchors");
            return RescanOutcome::Empty { retired, retry_at };
        }
        self.retry = RetryState::default();

        let same_ids = fresh.len() == self.anchors.len()
            && fresh.iter().zip(&self.anchors).all(|(a, b)| a.id == b.id);
        if same_ids {
            let mut moved = false;
            for (old, new) in self.anchors.iter_mut().zip(fresh) {
                moved |= (old.base_n - new.base_n).abs() > BASE_N_EPSILON;
                old.node = new.node;
                old.offset = new.offset;
                old.base_n = new.base_n;
                old.summary = new.summary;
            }
            debug!(version = self.version, moved, "rescan kept anchor set");
            return if moved {
                RescanOutcome::Relaid
            } else {
                RescanOutcome::Unchanged
            };
        }

        let retired = self.drain_markers();
        self.by_id = fresh
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id.clone(), i))
            .collect();
        self.anchors = fresh;
        debug!(
            version = self.version,
            anchors = self.anchors.len(),
            retired = retired.len(),
            "rescan rebuilt anchor set"
        );
        RescanOutcome::Rebuilt { retired }
    }

    /// Re-read every anchor's offset after the content reflowed.
    ///
    /// Ids, markers, and per-anchor state are kept. Detached nodes keep
    /// their last offset. The version advances when anything moved.
    pub fn remeasure(&mut self, panel: &dyn ContentPanel) -> Remeasured {
        let offsets: Vec<f64> = self
            .anchors
            .iter()
            .map(|a| panel.node_offset(a.node).unwrap_or(a.offset))
            .collect();
        if offsets.windows(2).any(|pair| pair[1] < pair[0]) {
            debug!(version = self.version, "remeasured anchors are out of order");
            return Remeasured::OutOfOrder;
        }
        let positions = base_positions(&offsets);
        let mut moved = false;
        for ((anchor, offset), base_n) in self.anchors.iter_mut().zip(offsets).zip(positions) {
            moved |= anchor.offset != offset || (anchor.base_n - base_n).abs() > BASE_N_EPSILON;
            anchor.offset = offset;
            anchor.base_n = base_n;
        }
        if moved {
            self.version += 1;
        }
        debug!(version = self.version, moved, "anchors remeasured");
        Remeasured::InPlace { moved }
    }

    /// Apply persisted per-anchor state.
    pub fn apply_state(
        &mut self,
        starred: &AHashSet<AnchorId>,
        levels: &AHashMap<AnchorId, Level>,
    ) {
        for anchor in &mut self.anchors {
            anchor.starred = starred.contains(&anchor.id);
            anchor.level = levels.get(&anchor.id).copied().unwrap_or(Level::TOP);
        }
    }

    /// Drop every anchor, returning their markers.
    pub fn clear(&mut self) -> Vec<MarkerHandle> {
        let retired = self.drain_markers();
        self.anchors.clear();
        self.by_id.clear();
        self.retry = RetryState::default();
        self.candidates_seen = 0;
        self.version += 1;
        retired
    }

    fn drain_markers(&mut self) -> Vec<MarkerHandle> {
        self.anchors
            .iter_mut()
            .filter_map(|a| a.visual.take())
            .collect()
    }

    fn schedule_retry(&mut self, max: u32, delay: Duration, now: Instant) -> Option<Instant> {
        if self.retry.attempts >= max {
            self.retry.due = None;
            return None;
        }
        self.retry.attempts += 1;
        self.retry.due = Some(now + delay);
        self.retry.due
    }
}

/// 64-bit FNV-1a over the UTF-8 bytes of `text`.
#[must_use]
pub fn fingerprint(text: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    text.bytes()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(b)).wrapping_mul(PRIME))
}

fn visible_text(candidate: &AnchorCandidate, config: &RegistryConfig) -> String {
    let mut raw = String::new();
    for segment in &candidate.segments {
        let hidden = segment
            .classes
            .iter()
            .any(|c| config.hidden_classes.iter().any(|h| h == c));
        if hidden {
            continue;
        }
        if !raw.is_empty() {
            raw.push(' ');
        }
        raw.push_str(&segment.text);
    }
    text::normalize(&raw, &config.label_prefixes)
}

fn build_anchors(
    candidates: Vec<AnchorCandidate>,
    panel: &dyn ContentPanel,
    config: &RegistryConfig,
) -> Vec<Anchor> {
    let attached: Vec<(AnchorCandidate, f64)> = candidates
        .into_iter()
        .filter_map(|c| panel.node_offset(c.node).map(|offset| (c, offset)))
        .collect();

    let topmost: Vec<(AnchorCandidate, f64)> = attached
        .iter()
        .filter(|(c, _)| {
            !attached
                .iter()
                .any(|(other, _)| other.node != c.node && panel.contains(other.node, c.node))
        })
        .cloned()
        .collect();

    let mut measured: Vec<Measured> = topmost
        .into_iter()
        .map(|(candidate, offset)| Measured {
            text: visible_text(&candidate, config),
            candidate,
            offset,
        })
        .collect();
    measured.sort_by(|a, b| a.offset.total_cmp(&b.offset));

    let epsilon = config.offset_epsilon.max(0.0);
    let mut deduped: Vec<Measured> = Vec::with_capacity(measured.len());
    for m in measured {
        let duplicate = deduped
            .iter()
            .rev()
            .take_while(|d| m.offset - d.offset <= epsilon)
            .any(|d| d.text == m.text);
        if !duplicate {
            deduped.push(m);
        }
    }

    let offsets: Vec<f64> = deduped.iter().map(|m| m.offset).collect();
    let positions = base_positions(&offsets);

    let mut occurrences: AHashMap<u64, u32> = AHashMap::new();
    deduped
        .into_iter()
        .zip(positions)
        .enumerate()
        .map(|(index, (m, base_n))| {
            let id = if m.text.is_empty() {
                AnchorId::new(format!("node-{}-{index}", m.candidate.node.0))
            } else {
                let hash = fingerprint(&m.text);
                let seen = occurrences.entry(hash).or_insert(0);
                *seen += 1;
                if *seen == 1 {
                    AnchorId::new(format!("a{hash:016x}"))
                } else {
                    AnchorId::new(format!("a{hash:016x}-{seen}"))
                }
            };
            Anchor {
                id,
                node: m.candidate.node,
                summary: m.text,
                offset: m.offset,
                base_n,
                n: None,
                level: Level::TOP,
                starred: false,
                visual: None,
            }
        })
        .collect()
}

/// `base_n` for ascending `offsets`: the fraction of the first→last span,
/// or uniform spacing when the span is degenerate. Never decreases.
fn base_positions(offsets: &[f64]) -> Vec<f64> {
    let first = offsets.first().copied().unwrap_or(0.0);
    let last = offsets.last().copied().unwrap_or(0.0);
    let span = last - first;
    let count = offsets.len();
    let mut floor = 0.0_f64;
    offsets
        .iter()
        .enumerate()
        .map(|(index, &offset)| {
            let raw_n = if span > MIN_SPAN {
                (offset - first) / span
            } else if count > 1 {
                index as f64 / (count - 1) as f64
            } else {
                0.0
            };
            floor = floor.max(raw_n.clamp(0.0, 1.0));
            floor
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::NodeRef;
    use crate::headless::HeadlessPanel;
    use crate::host::TextSegment;

    fn panel(nodes: &[(u64, f64)]) -> HeadlessPanel {
        let panel = HeadlessPanel::new(600.0, 5000.0);
        for &(id, offset) in nodes {
            panel.add_node(NodeRef(id), offset);
        }
        panel
    }

    fn scan(
        registry: &mut AnchorRegistry,
        panel: &HeadlessPanel,
        candidates: Vec<AnchorCandidate>,
    ) -> RescanOutcome {
        registry.rescan(candidates, panel, &RegistryConfig::default(), Instant::now())
    }

    #[test]
    fn base_n_spans_first_to_last() {
        let p = panel(&[(1, 100.0), (2, 300.0), (3, 1100.0)]);
        let mut reg = AnchorRegistry::new();
        let out = scan(
            &mut reg,
            &p,
            vec![
                AnchorCandidate::new(NodeRef(1), "one"),
                AnchorCandidate::new(NodeRef(2), "two"),
                AnchorCandidate::new(NodeRef(3), "three"),
            ],
        );
        assert!(matches!(out, RescanOutcome::Rebuilt { .. }));
        let ns: Vec<f64> = reg.anchors().iter().map(|a| a.base_n).collect();
        assert_eq!(ns, vec![0.0, 0.2, 1.0]);
    }

    #[test]
    fn nested_candidates_keep_topmost() {
        let p = panel(&[(1, 0.0), (2, 10.0), (3, 400.0)]);
        p.set_parent(NodeRef(2), NodeRef(1));
        let mut reg = AnchorRegistry::new();
        scan(
            &mut reg,
            &p,
            vec![
                AnchorCandidate::new(NodeRef(1), "outer"),
                AnchorCandidate::new(NodeRef(2), "inner"),
                AnchorCandidate::new(NodeRef(3), "next"),
            ],
        );
        let texts: Vec<&str> = reg.anchors().iter().map(|a| a.summary.as_str()).collect();
        assert_eq!(texts, vec!["outer", "next"]);
    }

    #[test]
    fn duplicate_text_at_same_offset_is_dropped() {
        let p = panel(&[(1, 50.0), (2, 50.2), (3, 900.0)]);
        let mut reg = AnchorRegistry::new();
        scan(
            &mut reg,
            &p,
            vec![
                AnchorCandidate::new(NodeRef(1), "same"),
                AnchorCandidate::new(NodeRef(2), "same"),
                AnchorCandidate::new(NodeRef(3), "same"),
            ],
        );
        assert_eq!(reg.len(), 2);
        assert_ne!(reg.anchors()[0].id, reg.anchors()[1].id);
        assert!(reg.anchors()[1].id.as_str().ends_with("-2"));
    }

    #[test]
    fn hidden_segments_and_labels_do_not_affect_id() {
        let p = panel(&[(1, 0.0), (2, 0.0)]);
        let mut a = AnchorRegistry::new();
        scan(
            &mut a,
            &p,
            vec![AnchorCandidate {
                node: NodeRef(1),
                segments: vec![
                    TextSegment::with_class("You said:", "sr-only"),
                    TextSegment::plain("How\u{200B} do  I?"),
                ],
            }],
        );
        let mut b = AnchorRegistry::new();
        scan(&mut b, &p, vec![AnchorCandidate::new(NodeRef(2), "You said: How do I?")]);
        assert_eq!(a.anchors()[0].id, b.anchors()[0].id);
        assert_eq!(a.anchors()[0].summary, "How do I?");
    }

    #[test]
    fn ids_survive_append_only_growth() {
        let p = panel(&[(1, 0.0), (2, 500.0), (3, 1000.0)]);
        let mut reg = AnchorRegistry::new();
        scan(
            &mut reg,
            &p,
            vec![
                AnchorCandidate::new(NodeRef(1), "a"),
                AnchorCandidate::new(NodeRef(2), "b"),
            ],
        );
        let before: Vec<AnchorId> = reg.anchors().iter().map(|a| a.id.clone()).collect();
        scan(
            &mut reg,
            &p,
            vec![
                AnchorCandidate::new(NodeRef(1), "a"),
                AnchorCandidate::new(NodeRef(2), "b"),
                AnchorCandidate::new(NodeRef(3), "c"),
            ],
        );
        let after: Vec<AnchorId> = reg.anchors().iter().map(|a| a.id.clone()).collect();
        assert_eq!(&after[..2], &before[..]);
    }

    #[test]
    fn empty_text_falls_back_to_node_index() {
        let p = panel(&[(7, 0.0)]);
        let mut reg = AnchorRegistry::new();
        scan(&mut reg, &p, vec![AnchorCandidate::new(NodeRef(7), "\u{200B} ")]);
        assert_eq!(reg.anchors()[0].id.as_str(), "node-7-0");
    }

    #[test]
    fn zero_span_spaces_uniformly() {
        let p = panel(&[(1, 40.0), (2, 40.0), (3, 40.0)]);
        let mut reg = AnchorRegistry::new();
        scan(
            &mut reg,
            &p,
            vec![
                AnchorCandidate::new(NodeRef(1), "x"),
                AnchorCandidate::new(NodeRef(2), "y"),
                AnchorCandidate::new(NodeRef(3), "z"),
            ],
        );
        let ns: Vec<f64> = reg.anchors().iter().map(|a| a.base_n).collect();
        assert_eq!(ns, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn empty_scan_schedules_bounded_retries() {
        let p = panel(&[]);
        let mut reg = AnchorRegistry::new();
        let config = RegistryConfig {
            max_retries: 2,
            ..RegistryConfig::default()
        };
        let t0 = Instant::now();
        let mut retries = Vec::new();
        for i in 0..4 {
            let now = t0 + Duration::from_secs(i);
            if let RescanOutcome::Empty { retry_at, .. } = reg.rescan(Vec::new(), &p, &config, now)
            {
                retries.push(retry_at);
            }
        }
        assert_eq!(retries.len(), 4);
        assert!(retries[0].is_some() && retries[1].is_some());
        assert!(retries[2].is_none() && retries[3].is_none());
    }

    #[test]
    fn retry_fires_once() {
        let p = panel(&[]);
        let mut reg = AnchorRegistry::new();
        let t0 = Instant::now();
        reg.rescan(Vec::new(), &p, &RegistryConfig::default(), t0);
        assert!(!reg.take_retry(t0));
        assert!(reg.take_retry(t0 + Duration::from_millis(300)));
        assert!(!reg.take_retry(t0 + Duration::from_millis(600)));
    }

    #[test]
    fn version_increases_every_rescan() {
        let p = panel(&[(1, 0.0)]);
        let mut reg = AnchorRegistry::new();
        let c = vec![AnchorCandidate::new(NodeRef(1), "a")];
        scan(&mut reg, &p, c.clone());
        let v1 = reg.version();
        assert_eq!(scan(&mut reg, &p, c), RescanOutcome::Unchanged);
        assert!(reg.version() > v1);
    }

    #[test]
    fn moved_offsets_relay() {
        let p = panel(&[(1, 0.0), (2, 100.0), (3, 200.0)]);
        let mut reg = AnchorRegistry::new();
        let c = vec![
            AnchorCandidate::new(NodeRef(1), "a"),
            AnchorCandidate::new(NodeRef(2), "b"),
            AnchorCandidate::new(NodeRef(3), "c"),
        ];
        scan(&mut reg, &p, c.clone());
        p.move_node(NodeRef(2), 150.0);
        assert_eq!(scan(&mut reg, &p, c), RescanOutcome::Relaid);
        assert_eq!(reg.anchors()[1].base_n, 0.75);
    }

    #[test]
    fn remeasure_follows_reflow_in_place() {
        let p = panel(&[(1, 0.0), (2, 1000.0), (3, 3000.0)]);
        let mut reg = AnchorRegistry::new();
        let c = vec![
            AnchorCandidate::new(NodeRef(1), "a"),
            AnchorCandidate::new(NodeRef(2), "b"),
            AnchorCandidate::new(NodeRef(3), "c"),
        ];
        scan(&mut reg, &p, c);
        let ids: Vec<AnchorId> = reg.anchors().iter().map(|a| a.id.clone()).collect();
        let v1 = reg.version();

        p.move_node(NodeRef(2), 2000.0);
        p.move_node(NodeRef(3), 6000.0);
        assert_eq!(
            reg.remeasure(&p),
            Remeasured::InPlace { moved: true }
        );
        let offsets: Vec<f64> = reg.anchors().iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0.0, 2000.0, 6000.0]);
        assert!((reg.anchors()[1].base_n - 1.0 / 3.0).abs() < 1e-12);
        assert!(reg.version() > v1);
        let after: Vec<AnchorId> = reg.anchors().iter().map(|a| a.id.clone()).collect();
        assert_eq!(after, ids);

        let v2 = reg.version();
        assert_eq!(
            reg.remeasure(&p),
            Remeasured::InPlace { moved: false }
        );
        assert_eq!(reg.version(), v2);
    }

    #[test]
    fn remeasure_reports_reordering() {
        let p = panel(&[(1, 0.0), (2, 100.0), (3, 200.0)]);
        let mut reg = AnchorRegistry::new();
        let c = vec![
            AnchorCandidate::new(NodeRef(1), "a"),
            AnchorCandidate::new(NodeRef(2), "b"),
            AnchorCandidate::new(NodeRef(3), "c"),
        ];
        scan(&mut reg, &p, c);
        p.move_node(NodeRef(2), 500.0);
        assert_eq!(reg.remeasure(&p), Remeasured::OutOfOrder);
        assert_eq!(reg.anchors()[1].offset, 100.0);
    }

    #[test]
    fn candidates_seen_counts_before_dedup() {
        let p = panel(&[(1, 0.0), (2, 0.0), (3, 50.0)]);
        p.set_parent(NodeRef(3), NodeRef(1));
        let mut reg = AnchorRegistry::new();
        scan(
            &mut reg,
            &p,
            vec![
                AnchorCandidate::new(NodeRef(1), "same"),
                AnchorCandidate::new(NodeRef(2), "same"),
                AnchorCandidate::new(NodeRef(3), "nested"),
            ],
        );
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.candidates_seen(), 3);
    }

    #[test]
    fn detached_candidates_are_skipped() {
        let p = panel(&[(1, 0.0), (2, 10.0)]);
        p.detach(NodeRef(2));
        let mut reg = AnchorRegistry::new();
        scan(
            &mut reg,
            &p,
            vec![
                AnchorCandidate::new(NodeRef(1), "a"),
                AnchorCandidate::new(NodeRef(2), "b"),
            ],
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn fingerprint_is_fnv1a() {
        assert_eq!(fingerprint(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fingerprint("a"), 0xaf63_dc4c_8601_ec8c);
    }
}
