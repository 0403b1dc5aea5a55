//! End-to-end scenarios driving a [`TimelineEngine`] through headless
//! collaborators.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::Duration;

use scrollmark_core::gesture::Point;
use scrollmark_engine::headless::{FailingBackend, HeadlessHost, RecordingPreview};
use scrollmark_engine::persistence::StateStore;
use scrollmark_engine::{
    AnchorId, Collaborators, ContainerId, DefaultLabels, EngineConfig, EngineEvent, KeyAction,
    Level, MinimapSurface, NavMode, NodeRef, Step, TimelineEngine,
};
use web_time::Instant;

const FRAME: Duration = Duration::from_millis(16);

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Host with anchors every `spacing` px of content.
fn host_with(count: u64, spacing: f64) -> HeadlessHost {
    let host = HeadlessHost::new(500.0, 10_000.0, 400.0);
    for i in 0..count {
        host.add_anchor(i + 1, i as f64 * spacing, &format!("anchor {i}"));
    }
    host
}

fn start(host: &HeadlessHost, config: EngineConfig, now: Instant) -> TimelineEngine {
    let mut engine = TimelineEngine::new(config, host.collaborators("session"));
    engine.init(now);
    engine.on_frame(now);
    engine
}

fn id(engine: &TimelineEngine, index: usize) -> AnchorId {
    engine.anchors()[index].id.clone()
}

/// Run frames until nothing is animating or queued; returns the final time.
fn settle(engine: &mut TimelineEngine, mut now: Instant) -> Instant {
    for _ in 0..1000 {
        if !engine.is_animating() && engine.queued_navigations() == 0 {
            break;
        }
        now += FRAME;
        engine.on_frame(now);
    }
    now
}

fn record_events(engine: &mut TimelineEngine) -> Rc<RefCell<Vec<EngineEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let _handle = engine.subscribe(move |event| sink.borrow_mut().push(event.clone()));
    log
}

#[test]
fn keyboard_burst_runs_three_steps_in_order() {
    let host = host_with(6, 1000.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    let events = record_events(&mut engine);
    assert_eq!(engine.active(), Some(&id(&engine, 0)));

    let accepted = (0..5)
        .filter(|_| engine.on_keyboard(KeyAction::press(Step::Next)))
        .count();
    assert_eq!(accepted, 3);

    settle(&mut engine, t0 + ms(50));

    let started: Vec<AnchorId> = events
        .borrow()
        .iter()
        .filter_map(|e| match e {
            EngineEvent::NavigationStarted { target, .. } => Some(target.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![id(&engine, 1), id(&engine, 2), id(&engine, 3)]);
    assert_eq!(engine.active(), Some(&id(&engine, 3)));
    assert_eq!(host.panel.scroll(), 3000.0);
    assert_eq!(host.surface.runner(), None);
}

#[test]
fn held_key_repeat_does_not_pile_up() {
    let host = host_with(6, 1000.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    assert!(engine.on_keyboard(KeyAction::press(Step::Next)));
    for _ in 0..10 {
        assert!(!engine.on_keyboard(KeyAction::repeat(Step::Next)));
    }
    settle(&mut engine, t0);
    assert_eq!(engine.active(), Some(&id(&engine, 1)));
}

#[test]
fn click_clears_active_and_scales_duration() {
    let host = host_with(6, 1000.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    let events = record_events(&mut engine);
    let target = id(&engine, 5);

    assert!(engine.on_marker_click(&target, t0 + ms(10)));
    assert_eq!(engine.active(), None);
    assert!(host.surface.active_ids().is_empty());
    assert_eq!(host.surface.runner(), Some(12.0));

    // 6 markers on a 400px track: first at 12, last at 388.
    let duration = events.borrow().iter().find_map(|e| match e {
        EngineEvent::NavigationStarted { duration, .. } => Some(*duration),
        _ => None,
    });
    assert_eq!(duration, Some(ms(611)));

    settle(&mut engine, t0 + ms(10));
    assert_eq!(engine.active(), Some(&target));
    assert_eq!(host.surface.active_ids(), vec![target]);
    assert_eq!(host.panel.scroll(), 5000.0);
}

#[test]
fn short_hop_uses_minimum_ratio() {
    let host = host_with(6, 1000.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    let events = record_events(&mut engine);
    engine.on_marker_click(&id(&engine, 1), t0);
    let duration = events.borrow().iter().find_map(|e| match e {
        EngineEvent::NavigationStarted { duration, .. } => Some(*duration),
        _ => None,
    });
    assert_eq!(duration, Some(ms(390)));
}

#[test]
fn new_click_snaps_flight_in_progress() {
    let host = host_with(6, 1000.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    engine.on_marker_click(&id(&engine, 3), t0);
    engine.on_frame(t0 + FRAME);
    assert!(engine.is_animating());

    engine.on_marker_click(&id(&engine, 5), t0 + FRAME * 2);
    assert!(host.panel.writes().contains(&3000.0));
    settle(&mut engine, t0 + FRAME * 2);
    assert_eq!(host.panel.scroll(), 5000.0);
}

#[test]
fn jump_mode_scrolls_at_once() {
    let host = host_with(4, 1000.0);
    let t0 = Instant::now();
    let config = EngineConfig {
        navigation: scrollmark_engine::config::NavigationConfig {
            mode: NavMode::Jump,
            ..Default::default()
        },
        ..EngineConfig::default()
    };
    let mut engine = start(&host, config, t0);
    engine.on_marker_click(&id(&engine, 2), t0);
    assert_eq!(host.panel.scroll(), 2000.0);
    assert_eq!(engine.active(), Some(&id(&engine, 2)));
    assert!(!engine.is_animating());
    assert_eq!(host.surface.runner_shows(), 0);
}

#[test]
fn collapsing_hides_descendants_until_expanded() {
    let host = HeadlessHost::new(500.0, 10_000.0, 400.0);
    for (node, (offset, text)) in [(0.0, "A"), (1000.0, "B"), (1500.0, "C"), (2000.0, "D"), (4000.0, "E")]
        .into_iter()
        .enumerate()
    {
        host.add_anchor(node as u64 + 1, offset, text);
    }
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    let [a, b, c, d, e] = [0, 1, 2, 3, 4].map(|i| id(&engine, i));
    assert!(engine.set_level(&c, Level::new(2)));
    assert!(engine.set_level(&d, Level::new(2)));
    engine.on_frame(t0);
    let expanded: Vec<Option<f64>> = engine.anchors().iter().map(|x| x.n).collect();

    assert_eq!(engine.toggle_collapse(&b), Some(true));
    engine.on_frame(t0);
    let shown = host.surface.marker_ids();
    let expected: BTreeSet<AnchorId> = [a.clone(), b.clone(), e].into_iter().collect();
    assert_eq!(shown, expected);
    assert!(host.surface.marker(&b).unwrap().collapsed);
    assert!(engine.anchors()[2].is_hidden());

    assert_eq!(engine.toggle_collapse(&b), Some(false));
    engine.on_frame(t0);
    assert_eq!(host.surface.marker_ids().len(), 5);
    let restored: Vec<Option<f64>> = engine.anchors().iter().map(|x| x.n).collect();
    for (x, y) in expanded.iter().zip(&restored) {
        assert!((x.unwrap() - y.unwrap()).abs() < 1e-9);
    }

    // Leaves have nothing to collapse.
    assert_eq!(engine.toggle_collapse(&a), None);
    assert_eq!(engine.toggle_collapse(&d), None);
}

#[test]
fn hidden_active_maps_to_collapsed_parent() {
    let host = HeadlessHost::new(500.0, 10_000.0, 400.0);
    host.add_anchor(1, 0.0, "parent");
    host.add_anchor(2, 1000.0, "child");
    host.add_anchor(3, 5000.0, "next");
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    let (parent, child) = (id(&engine, 0), id(&engine, 1));
    engine.set_level(&child, Level::new(2));
    engine.toggle_collapse(&parent);
    engine.on_frame(t0);

    host.panel.scroll_to(5000.0);
    engine.on_content_scroll();
    engine.on_frame(t0 + ms(500));
    assert_eq!(engine.active(), Some(&id(&engine, 2)));

    // The reference line falls on the hidden child.
    host.panel.scroll_to(1000.0);
    engine.on_content_scroll();
    engine.on_frame(t0 + ms(1000));
    assert_eq!(engine.active(), Some(&parent));
}

#[test]
fn active_changes_are_rate_limited() {
    let host = host_with(10, 300.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    let events = record_events(&mut engine);

    // Reference line sits at scroll + 225.
    host.panel.scroll_to(75.0);
    engine.on_content_scroll();
    engine.on_frame(t0 + ms(10));
    host.panel.scroll_to(375.0);
    engine.on_content_scroll();
    engine.on_frame(t0 + ms(20));
    assert_eq!(engine.active(), Some(&id(&engine, 0)));
    assert_eq!(engine.next_deadline(), Some(t0 + ms(120)));

    engine.on_tick(t0 + ms(130));
    assert_eq!(engine.active(), Some(&id(&engine, 2)));
    let changes = events
        .borrow()
        .iter()
        .filter(|e| matches!(e, EngineEvent::ActiveChanged { .. }))
        .count();
    assert_eq!(changes, 1);
}

#[test]
fn long_press_stars_and_swallows_click() {
    let host = host_with(4, 1000.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    let target = id(&engine, 2);

    engine.on_marker_pointer_down(&target, Point::new(4.0, 100.0), t0);
    engine.on_marker_pointer_move(Point::new(6.0, 102.0));
    assert_eq!(engine.next_deadline(), Some(t0 + ms(550)));
    engine.on_tick(t0 + ms(600));
    engine.on_marker_pointer_up();
    assert!(engine.is_starred(&target));
    assert!(host.surface.marker(&target).unwrap().starred);

    assert!(!engine.on_marker_click(&target, t0 + ms(700)));
    assert!(!engine.is_animating());
    assert!(engine.on_marker_click(&target, t0 + ms(1000)));
}

#[test]
fn moving_pointer_cancels_long_press() {
    let host = host_with(4, 1000.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    let target = id(&engine, 1);
    engine.on_marker_pointer_down(&target, Point::new(0.0, 0.0), t0);
    engine.on_marker_pointer_move(Point::new(0.0, 20.0));
    engine.on_tick(t0 + ms(600));
    assert!(!engine.is_starred(&target));
}

#[test]
fn state_survives_a_new_engine() {
    let host = HeadlessHost::new(500.0, 10_000.0, 400.0);
    host.add_anchor(1, 0.0, "intro");
    host.add_anchor(2, 1000.0, "detail");
    host.add_anchor(3, 2000.0, "outro");
    let t0 = Instant::now();
    let mut first = start(&host, EngineConfig::default(), t0);
    let (intro, detail) = (id(&first, 0), id(&first, 1));
    first.toggle_star(&intro);
    first.set_level(&detail, Level::new(3));
    first.toggle_collapse(&intro);
    first.teardown();

    let second = start(&host, EngineConfig::default(), t0);
    assert!(second.is_starred(&intro));
    assert!(second.is_collapsed(&intro));
    assert!(second.anchors()[0].starred);
    assert_eq!(second.anchors()[1].level, Level::new(3));
    assert!(second.anchors()[1].is_hidden());
}

#[test]
fn failing_storage_is_not_fatal() {
    let host = host_with(3, 1000.0);
    let collaborators = Collaborators {
        store: StateStore::new(Box::new(FailingBackend), "s"),
        ..host.collaborators("s")
    };
    let t0 = Instant::now();
    let mut engine = TimelineEngine::new(EngineConfig::default(), collaborators);
    engine.init(t0);
    engine.on_frame(t0);
    let target = id(&engine, 1);
    assert_eq!(engine.toggle_star(&target), Some(true));
    assert!(engine.is_starred(&target));
    assert_eq!(host.surface.markers().len(), 3);
}

#[test]
fn empty_scan_retries_until_content_appears() {
    let host = HeadlessHost::new(500.0, 10_000.0, 400.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    assert!(engine.anchors().is_empty());
    assert_eq!(engine.next_deadline(), Some(t0 + ms(300)));

    host.add_anchor(1, 0.0, "late arrival");
    engine.on_tick(t0 + ms(299));
    assert!(engine.anchors().is_empty());
    engine.on_tick(t0 + ms(300));
    assert_eq!(engine.anchors().len(), 1);
    assert_eq!(host.source.scans(), 2);
    engine.on_frame(t0 + ms(300));
    assert_eq!(host.surface.markers().len(), 1);
}

#[test]
fn detached_source_reads_as_empty() {
    let host = host_with(3, 1000.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    host.source.set_detached(true);
    engine.rescan(t0);
    engine.on_frame(t0);
    assert!(engine.anchors().is_empty());
    assert!(host.surface.markers().is_empty());
    assert_eq!(engine.active(), None);
}

#[test]
fn content_changes_are_debounced() {
    let host = host_with(2, 1000.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    for i in 0..3 {
        engine.notify_content_changed(t0 + ms(i * 100));
    }
    engine.on_tick(t0 + ms(300));
    assert_eq!(host.source.scans(), 1);
    engine.on_tick(t0 + ms(450));
    assert_eq!(host.source.scans(), 2);
}

#[test]
fn unchanged_rescan_keeps_markers() {
    let host = host_with(3, 1000.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    let created = host.surface.created();
    engine.rescan(t0);
    engine.on_frame(t0);
    assert_eq!(host.surface.created(), created);
    assert_eq!(host.surface.destroyed(), 0);
}

#[test]
fn appended_anchor_keeps_existing_ids() {
    let host = host_with(3, 1000.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    let before: Vec<AnchorId> = engine.anchors().iter().map(|a| a.id.clone()).collect();
    host.add_anchor(10, 3000.0, "fresh");
    engine.rescan(t0);
    let after: Vec<AnchorId> = engine.anchors().iter().map(|a| a.id.clone()).collect();
    assert_eq!(&after[..3], &before[..]);
    assert_eq!(after.len(), 4);
}

#[test]
fn stale_registry_is_rescanned_at_boundary() {
    let host = host_with(3, 1000.0);
    let t0 = Instant::now();
    let config = EngineConfig {
        navigation: scrollmark_engine::config::NavigationConfig {
            mode: NavMode::Jump,
            ..Default::default()
        },
        ..EngineConfig::default()
    };
    let mut engine = start(&host, config, t0);
    engine.navigate_to(&id(&engine, 2), t0);

    host.add_anchor(4, 3000.0, "streamed in");
    host.source.set_live_count(Some(4));
    assert!(engine.on_keyboard(KeyAction::press(Step::Next)));
    engine.on_frame(t0 + FRAME);

    assert_eq!(engine.anchors().len(), 4);
    assert_eq!(host.panel.scroll(), 3000.0);
    assert_eq!(engine.active(), Some(&id(&engine, 3)));
}

#[test]
fn boundary_without_staleness_is_a_no_op() {
    let host = host_with(3, 1000.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    engine.on_keyboard(KeyAction::press(Step::Previous));
    engine.on_frame(t0 + FRAME);
    assert!(!engine.is_animating());
    assert_eq!(host.source.scans(), 1);
}

#[test]
fn slider_drag_wins_over_content_sync() {
    let host = host_with(100, 90.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    assert!(host.surface.slider().visible);

    engine.on_slider_pointer_down(100.0);
    engine.on_slider_pointer_move(150.0);
    engine.on_frame(t0);
    let dragged = host.surface.track_scroll();
    assert!(dragged > 0.0);
    assert!(host.panel.scroll() > 0.0);

    host.panel.scroll_to(0.0);
    engine.on_content_scroll();
    engine.on_frame(t0 + FRAME);
    assert_eq!(host.surface.track_scroll(), dragged);

    engine.on_slider_pointer_up(t0 + FRAME);
    engine.on_content_scroll();
    engine.on_frame(t0 + FRAME * 2);
    assert_eq!(host.surface.track_scroll(), 0.0);
}

#[test]
fn wheel_over_minimap_scrolls_content() {
    let host = host_with(100, 90.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    engine.on_minimap_wheel(200.0, t0);
    assert_eq!(host.surface.track_scroll(), 200.0);
    assert!(host.panel.scroll() > 0.0);

    // the content scroll the wheel caused maps back to the same track scroll
    engine.on_content_scroll();
    engine.on_frame(t0 + FRAME);
    assert!((host.surface.track_scroll() - 200.0).abs() < 1e-6);
}

#[test]
fn reflow_after_resize_moves_active_selection() {
    let host = host_with(4, 1000.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    let ids: Vec<AnchorId> = (0..4).map(|i| id(&engine, i)).collect();

    for (node, offset) in [(2, 2000.0), (3, 4000.0), (4, 6000.0)] {
        host.panel.move_node(NodeRef(node), offset);
    }
    engine.on_resize();
    engine.on_frame(t0 + ms(200));
    let offsets: Vec<f64> = engine.anchors().iter().map(|a| a.offset).collect();
    assert_eq!(offsets, vec![0.0, 2000.0, 4000.0, 6000.0]);
    let after: Vec<AnchorId> = (0..4).map(|i| id(&engine, i)).collect();
    assert_eq!(after, ids);
    assert_eq!(host.source.scans(), 1);

    // reference line at 4225
    host.panel.scroll_to(4000.0);
    engine.on_content_scroll();
    engine.on_frame(t0 + ms(400));
    assert_eq!(engine.active(), Some(&ids[2]));
}

#[test]
fn reordering_reflow_triggers_rescan() {
    let host = host_with(3, 1000.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    host.panel.move_node(NodeRef(1), 5000.0);
    engine.on_resize();
    engine.on_frame(t0 + ms(200));
    assert_eq!(host.source.scans(), 2);
    let offsets: Vec<f64> = engine.anchors().iter().map(|a| a.offset).collect();
    assert_eq!(offsets, vec![1000.0, 2000.0, 5000.0]);
}

#[test]
fn clustered_anchors_keep_active_marker_in_view() {
    let host = HeadlessHost::new(500.0, 10_000.0, 400.0);
    host.add_anchor(1, 0.0, "intro");
    for k in 1..100u64 {
        host.add_anchor(k + 1, 9000.0 + (k - 1) as f64 * 10.0, &format!("cluster {k}"));
    }
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    assert_eq!(engine.layout().track_height, 1212.0);

    // reference line at 9495, just past anchor 50
    host.panel.scroll_to(9270.0);
    engine.on_content_scroll();
    engine.on_frame(t0 + ms(200));
    let active = id(&engine, 50);
    assert_eq!(engine.active(), Some(&active));

    let y = engine.layout().y_of(50).unwrap();
    let track_scroll = host.surface.track_scroll();
    assert!(
        y >= track_scroll && y <= track_scroll + 400.0,
        "active marker at {y} outside [{track_scroll}, {}]",
        track_scroll + 400.0
    );
    assert!(host.surface.marker(&active).is_some());
}

#[test]
fn container_swap_is_stale_at_boundary() {
    let host = host_with(3, 1000.0);
    host.source.set_container(Some(ContainerId(1)));
    let t0 = Instant::now();
    let config = EngineConfig {
        navigation: scrollmark_engine::config::NavigationConfig {
            mode: NavMode::Jump,
            ..Default::default()
        },
        ..EngineConfig::default()
    };
    let mut engine = start(&host, config, t0);
    engine.navigate_to(&id(&engine, 2), t0);

    host.source.set_container(Some(ContainerId(2)));
    engine.on_keyboard(KeyAction::press(Step::Next));
    engine.on_frame(t0 + FRAME);
    assert_eq!(host.source.scans(), 2);
}

#[test]
fn duplicate_candidates_do_not_force_rescans() {
    let host = host_with(3, 1000.0);
    host.add_anchor(4, 2000.0, "anchor 2");
    host.source.set_live_count(Some(4));
    let t0 = Instant::now();
    let config = EngineConfig {
        navigation: scrollmark_engine::config::NavigationConfig {
            mode: NavMode::Jump,
            ..Default::default()
        },
        ..EngineConfig::default()
    };
    let mut engine = start(&host, config, t0);
    assert_eq!(engine.anchors().len(), 3);
    engine.navigate_to(&id(&engine, 2), t0);

    engine.on_keyboard(KeyAction::press(Step::Next));
    engine.on_frame(t0 + FRAME);
    assert_eq!(host.source.scans(), 1);
}

#[test]
fn markers_are_virtualized() {
    let host = HeadlessHost::new(500.0, 100_000.0, 400.0);
    for i in 0..300 {
        host.add_anchor(i + 1, i as f64 * 300.0, &format!("item {i}"));
    }
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    let markers = host.surface.markers();
    assert!(!markers.is_empty() && markers.len() < 300);
    assert!(markers.iter().all(|m| m.y <= 400.0 + 400.0));

    host.panel.scroll_to(100_000.0);
    engine.on_content_scroll();
    engine.on_frame(t0 + FRAME);
    let track_scroll = host.surface.track_scroll();
    assert!(track_scroll > 0.0);
    let markers = host.surface.markers();
    assert!(markers.iter().all(|m| m.y >= track_scroll - 400.0));
    assert!(host.surface.destroyed() > 0);
    assert_eq!(
        host.surface.created() - host.surface.destroyed(),
        markers.len() as u64
    );
}

#[test]
fn preview_mirrors_anchors_and_active() {
    let host = host_with(3, 1000.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    let preview = RecordingPreview::new();
    engine.attach_preview(Box::new(preview.clone()));
    assert_eq!(preview.last_entries().len(), 3);

    let target = id(&engine, 2);
    engine.toggle_star(&target);
    assert!(preview.last_entries()[2].starred);

    engine.navigate_to(&target, t0);
    settle(&mut engine, t0);
    let history = preview.active_history();
    assert_eq!(history.last(), Some(&Some(target)));
    assert!(history.contains(&None));
}

#[test]
fn context_menu_actions_apply() {
    let host = host_with(3, 1000.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    let target = id(&engine, 0);
    let menu = engine.context_menu(&target).unwrap();
    assert_eq!(menu[0].label, "Star");
    engine.apply_menu_action(&target, menu[0].action);
    assert!(engine.is_starred(&target));

    let level_two = menu
        .iter()
        .find(|item| item.label == "Level 2")
        .map(|item| item.action)
        .unwrap();
    engine.apply_menu_action(&id(&engine, 1), level_two);
    let menu = engine.context_menu(&target).unwrap();
    assert!(menu.iter().any(|item| item.label == "Collapse"));
    assert_eq!(menu[0].label, "Unstar");
}

#[test]
fn tooltip_uses_summary() {
    let host = host_with(2, 1000.0);
    let t0 = Instant::now();
    let engine = start(&host, EngineConfig::default(), t0);
    let measure = scrollmark_engine::interaction::CellMeasure::default();
    let tip = engine.tooltip(&id(&engine, 1), 0.0, 10.0, &measure).unwrap();
    assert_eq!(tip.text, "anchor 1");
    assert!(!tip.truncated);
}

#[test]
fn teardown_releases_everything() {
    let host = host_with(4, 1000.0);
    let t0 = Instant::now();
    let mut engine = start(&host, EngineConfig::default(), t0);
    let _events = record_events(&mut engine);
    let _more = record_events(&mut engine);
    assert_eq!(engine.subscriber_count(), 2);
    engine.on_marker_click(&id(&engine, 3), t0);

    engine.teardown();
    assert_eq!(engine.subscriber_count(), 0);
    assert!(host.surface.markers().is_empty());
    assert_eq!(host.surface.runner(), None);
    assert!(!engine.on_keyboard(KeyAction::press(Step::Next)));
    engine.on_frame(t0 + FRAME);
    assert!(host.surface.markers().is_empty());
    assert!(engine.is_torn_down());
}

#[test]
fn default_labels_translate_menu() {
    use scrollmark_engine::Translate;
    assert_eq!(DefaultLabels.translate("menu.expand"), "Expand");
}
