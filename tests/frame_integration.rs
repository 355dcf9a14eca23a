//! Frame loop integration tests.
//!
//! Drive `World` through the scripted device, host and render doubles and
//! check what reaches the engine and the host, frame by frame.

use vrshell::device::{Eye, GestureKind};
use vrshell::host::{EventCategory, HostEvent, PointerEvent};
use vrshell::render::{CameraHandle, NodeKind};
use vrshell::scripted::{
    Call, DeviceEvent, DeviceProbe, RecordingHost, RecordingRenderContext, RenderProbe, ScriptedDevice, Timeline,
};
use vrshell::vr::math::{Mat4, Quat, Vec3};
use vrshell::vr::widget::{WidgetHandle, WidgetKind};
use vrshell::{SetupError, World, WorldConfig};

struct Harness {
    world: World,
    host: RecordingHost,
    render: RenderProbe,
    device: DeviceProbe,
    timeline: Timeline,
}

fn harness_with(device: ScriptedDevice, render: RecordingRenderContext, mut host: RecordingHost) -> Harness {
    let timeline = Timeline::new();
    let render = render.with_timeline(timeline.clone());
    let render_probe = render.probe();
    let mut world = World::new(Box::new(render), WorldConfig::default());
    world.initialize_host(&mut host).expect("host binds");

    let device = device.with_timeline(timeline.clone());
    let device_probe = device.probe();
    world.register_device(Some(Box::new(device)));
    world.resume();

    Harness {
        world,
        host,
        render: render_probe,
        device: device_probe,
        timeline,
    }
}

fn harness(controllers: usize) -> Harness {
    harness_with(
        ScriptedDevice::new(controllers),
        RecordingRenderContext::new(),
        RecordingHost::new(),
    )
}

fn pointer_events(host: &RecordingHost) -> Vec<PointerEvent> {
    host.take_events()
        .into_iter()
        .filter_map(|e| match e {
            HostEvent::Pointer(p) => Some(p),
            _ => None,
        })
        .collect()
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 0.01
}

// ── Gates ───────────────────────────────────────────────────

#[test]
fn test_paused_frame_touches_nothing() {
    let mut h = harness(1);
    h.world.draw();
    h.host.take_events();
    h.timeline.clear();

    h.world.pause();
    h.device.push_frame(vec![DeviceEvent::Button { controller: 0, pressed: true }]);
    h.world.draw();

    assert!(h.timeline.is_empty(), "paused frame made calls: {:?}", h.timeline.calls());
    assert!(h.host.events().is_empty());
    assert_eq!(h.device.remaining_frames(), 1);
    assert_eq!(h.world.frame_count(), 1);
}

#[test]
fn test_world_starts_paused() {
    let render = RecordingRenderContext::new();
    let probe = render.probe();
    let mut world = World::new(Box::new(render), WorldConfig::default());
    world.register_device(Some(Box::new(ScriptedDevice::new(1))));
    let before = probe.calls().len();

    world.draw();
    assert_eq!(probe.calls().len(), before);
    assert!(!world.is_gl_initialized());
}

#[test]
fn test_no_device_skips_frame() {
    let render = RecordingRenderContext::new();
    let probe = render.probe();
    let mut world = World::new(Box::new(render), WorldConfig::default());
    let mut host = RecordingHost::new();
    world.initialize_host(&mut host).expect("host");
    world.resume();
    let before = probe.calls().len();

    world.draw();
    assert_eq!(probe.calls().len(), before);
    assert!(host.events().is_empty());
    assert_eq!(world.frame_count(), 0);
}

#[test]
fn test_gl_failure_retries_next_frame() {
    let mut h = harness_with(
        ScriptedDevice::new(1),
        RecordingRenderContext::new().failing_gl(1),
        RecordingHost::new(),
    );
    h.timeline.clear();

    h.world.draw();
    assert_eq!(h.timeline.calls(), vec![Call::InitializeGl(false)]);
    assert!(!h.world.is_gl_initialized());

    h.world.draw();
    assert!(h.world.is_gl_initialized());
    assert!(h.timeline.calls().contains(&Call::EndFrame));
    assert_eq!(h.world.frame_count(), 1);
}

// ── Frame composition ───────────────────────────────────────

fn frame_skeleton(calls: &[Call]) -> Vec<Call> {
    calls
        .iter()
        .filter(|c| {
            matches!(
                c,
                Call::ProcessEvents
                    | Call::Update
                    | Call::Cull(_)
                    | Call::StartFrame
                    | Call::BindEye(_)
                    | Call::Draw(..)
                    | Call::EndFrame
            )
        })
        .map(|c| match c {
            Call::Cull(_) => Call::Cull(0),
            Call::Draw(camera, _) => Call::Draw(*camera, 0),
            other => other.clone(),
        })
        .collect()
}

#[cfg(not(feature = "mono"))]
#[test]
fn test_cull_once_then_left_then_right() {
    let mut h = harness(1);
    h.world.draw();

    assert_eq!(
        frame_skeleton(&h.timeline.calls()),
        vec![
            Call::ProcessEvents,
            Call::Update,
            Call::Cull(0),
            Call::StartFrame,
            Call::BindEye(Eye::Left),
            Call::Draw(CameraHandle(1), 0),
            Call::BindEye(Eye::Right),
            Call::Draw(CameraHandle(2), 0),
            Call::EndFrame,
        ]
    );

    let draws = h.render.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].1, draws[1].1, "both eyes share one draw list");
    assert!(!draws[0].1.is_empty());
}

#[cfg(feature = "mono")]
#[test]
fn test_mono_draws_left_only() {
    let mut h = harness(1);
    h.world.draw();

    assert_eq!(
        frame_skeleton(&h.timeline.calls()),
        vec![
            Call::ProcessEvents,
            Call::Update,
            Call::Cull(0),
            Call::StartFrame,
            Call::BindEye(Eye::Left),
            Call::Draw(CameraHandle(1), 0),
            Call::EndFrame,
        ]
    );
}

#[test]
fn test_controller_pass_runs_before_cull() {
    let mut h = harness(1);
    h.world.draw();
    let calls = h.timeline.calls();
    let controller_node = h.world.controllers()[0].node;

    let pose_at = calls
        .iter()
        .position(|c| *c == Call::SetTransform(controller_node))
        .expect("controller pose mirrored");
    let cull_at = calls.iter().position(|c| matches!(c, Call::Cull(_))).expect("cull");
    assert!(pose_at < cull_at);
}

// ── Pointer and scroll ──────────────────────────────────────

#[test]
fn test_pointer_on_browser_is_edge_triggered() {
    let mut h = harness(1);

    h.world.draw();
    let events = pointer_events(&h.host);
    assert_eq!(events.len(), 1);
    let first = events[0];
    assert_eq!(first.widget, WidgetHandle(1));
    assert_eq!(first.controller, 0);
    assert!(!first.pressed);
    // Straight ahead lands a third of the way up the browser panel.
    assert!(approx(first.x, 960.0), "x={}", first.x);
    assert!(approx(first.y, 720.0), "y={}", first.y);

    h.world.draw();
    assert!(pointer_events(&h.host).is_empty());

    h.device.push_frame(vec![DeviceEvent::Button { controller: 0, pressed: true }]);
    h.world.draw();
    let events = pointer_events(&h.host);
    assert_eq!(events.len(), 1);
    assert!(events[0].pressed);
    assert_eq!((events[0].x, events[0].y), (first.x, first.y));
}

#[test]
fn test_pointer_highlight_tracks_hit() {
    let mut h = harness(1);
    h.world.draw();
    let browser = &h.world.widgets()[0];
    let url_bar = &h.world.widgets()[1];
    assert!(browser.is_pointer_active());
    assert!(h.render.is_enabled(browser.pointer_node()));
    assert!(!url_bar.is_pointer_active());

    // Aim up at the URL bar.
    let up = Mat4::from_quat(&Quat::from_euler(0.0, 0.42, 0.0));
    h.device.push_frame(vec![DeviceEvent::Pose { controller: 0, transform: up }]);
    h.world.draw();
    let browser = &h.world.widgets()[0];
    let url_bar = &h.world.widgets()[1];
    assert!(!browser.is_pointer_active());
    assert!(url_bar.is_pointer_active());
    let events = pointer_events(&h.host);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].widget, url_bar.handle());
}

#[test]
fn test_scroll_after_baseline_frame() {
    let mut h = harness(1);
    h.device.push_frame(vec![DeviceEvent::Touchpad { controller: 0, position: Some((0.1, 0.0)) }]);
    h.device.push_frame(vec![DeviceEvent::Touchpad { controller: 0, position: Some((0.15, 0.0)) }]);

    h.world.draw();
    assert!(h.host.events_of(EventCategory::Scroll).is_empty());

    h.world.draw();
    let scrolls = h.host.events_of(EventCategory::Scroll);
    assert_eq!(scrolls.len(), 1);
    match &scrolls[0] {
        HostEvent::Scroll(scroll) => {
            assert_eq!(scroll.widget, WidgetHandle(1));
            assert_eq!(scroll.controller, 0);
            assert!((scroll.dx - 0.05 * 20.0).abs() < 1e-3, "dx={}", scroll.dx);
            assert_eq!(scroll.dy, 0.0);
        }
        other => panic!("expected scroll, got {:?}", other),
    }
}

#[test]
fn test_missing_scroll_callback_disables_only_scroll() {
    let mut h = harness_with(
        ScriptedDevice::new(1),
        RecordingRenderContext::new(),
        RecordingHost::new().without(EventCategory::Scroll),
    );
    h.device.push_frame(vec![DeviceEvent::Touchpad { controller: 0, position: Some((0.1, 0.0)) }]);
    h.device.push_frame(vec![DeviceEvent::Touchpad { controller: 0, position: Some((0.3, 0.0)) }]);

    h.world.draw();
    h.world.draw();

    assert!(h.host.events_of(EventCategory::Scroll).is_empty());
    assert_eq!(h.host.events_of(EventCategory::Pointer).len(), 1);
    assert_eq!(h.host.events_of(EventCategory::HeadPose).len(), 2);
    let record = &h.world.controllers()[0];
    assert!(record.touched);
    assert!((record.touchpad_x - 0.3).abs() < 1e-6);
}

#[test]
fn test_gestures_forwarded_once() {
    let mut h = harness(2);
    h.device.push_frame(vec![
        DeviceEvent::Gesture(GestureKind::SwipeLeft),
        DeviceEvent::Gesture(GestureKind::SwipeDown),
        DeviceEvent::Gesture(GestureKind::SwipeRight),
    ]);
    h.world.draw();
    let codes: Vec<i32> = h
        .host
        .events_of(EventCategory::Gesture)
        .into_iter()
        .filter_map(|e| match e {
            HostEvent::Gesture(g) => Some(g.code),
            _ => None,
        })
        .collect();
    assert_eq!(codes, vec![0, 1]);

    h.host.take_events();
    h.world.draw();
    assert!(h.host.events_of(EventCategory::Gesture).is_empty());
}

#[test]
fn test_device_without_gesture_source_still_draws() {
    let mut h = harness_with(
        ScriptedDevice::new(1).without_gestures(),
        RecordingRenderContext::new(),
        RecordingHost::new(),
    );
    h.device.push_frame(vec![DeviceEvent::Gesture(GestureKind::SwipeLeft)]);
    h.world.draw();

    assert!(h.host.events_of(EventCategory::Gesture).is_empty());
    assert_eq!(h.host.events_of(EventCategory::Pointer).len(), 1);
    assert!(h.timeline.calls().contains(&Call::EndFrame));
    assert_eq!(h.device.frames_started(), 1);
}

#[test]
fn test_head_pose_reported_after_frame() {
    let mut h = harness(0);
    let rotation = Quat::from_euler(0.5, 0.0, 0.0);
    let position = Vec3::new(0.1, 1.6, 0.2);
    h.device.push_frame(vec![DeviceEvent::Head(Mat4::from_pose(position, &rotation))]);
    h.world.draw();

    let poses = h.host.events_of(EventCategory::HeadPose);
    assert_eq!(poses.len(), 1);
    let HostEvent::HeadPose(pose) = &poses[0] else {
        panic!("expected head pose");
    };
    let r = pose.rotation;
    let dot = r.x * rotation.x + r.y * rotation.y + r.z * rotation.z + r.w * rotation.w;
    assert!((dot.abs() - 1.0).abs() < 1e-4, "rotation={:?}", r);
    assert!((r.length() - 1.0).abs() < 1e-4);
    assert!(pose.position.distance(position) < 1e-5);
}

#[test]
fn test_head_pose_skipped_without_callback() {
    let mut h = harness_with(
        ScriptedDevice::new(1),
        RecordingRenderContext::new(),
        RecordingHost::new().without(EventCategory::HeadPose),
    );
    h.world.draw();
    assert!(h.host.events_of(EventCategory::HeadPose).is_empty());
    assert_eq!(h.host.events_of(EventCategory::Pointer).len(), 1);
}

// ── Device lifecycle ────────────────────────────────────────

#[test]
fn test_deregistering_device_removes_controllers() {
    let mut h = harness_with(
        ScriptedDevice::new(2).with_model(0, "left.obj").with_model(1, "right.obj"),
        RecordingRenderContext::new(),
        RecordingHost::new(),
    );
    let nodes: Vec<_> = h.world.controllers().iter().map(|r| r.node).collect();
    assert_eq!(nodes.len(), 2);
    for node in &nodes {
        assert!(h.render.in_root(*node));
        assert!(matches!(h.render.node_kind(*node), Some(NodeKind::Controller { .. })));
    }

    h.world.register_device(None);
    assert!(h.world.controllers().is_empty());
    assert_eq!(h.world.controller_count(), 0);
    assert!(h.world.cameras().is_none());
    for node in &nodes {
        assert!(!h.render.in_root(*node));
    }

    h.timeline.clear();
    h.world.draw();
    assert!(h.timeline.is_empty());
}

#[test]
fn test_setup_failure_is_reported() {
    let render = RecordingRenderContext::new();
    let mut world = World::new(Box::new(render), WorldConfig::default());
    let mut host = RecordingHost::new().failing(SetupError::ActivityMissing);
    assert_eq!(world.initialize_host(&mut host), Err(SetupError::ActivityMissing));
    assert!(!world.has_host());
}

#[test]
fn test_shutdown_host_silences_events() {
    let mut h = harness(1);
    h.world.shutdown_host();
    h.world.draw();
    assert!(h.host.events().is_empty());
    // Records still advance without a host.
    assert_eq!(h.world.controllers()[0].widget, Some(WidgetHandle(1)));
}

// ── Surfaces ────────────────────────────────────────────────

#[test]
fn test_existing_surface_announced_at_gl_init() {
    let render = RecordingRenderContext::new();
    let probe = render.probe();
    let mut world = World::new(Box::new(render), WorldConfig::default());
    let mut host = RecordingHost::new();
    world.initialize_host(&mut host).expect("host");

    let surface = probe.create_surface("widget-1");
    assert!(host.events().is_empty());
    assert!(world.initialize_gl());
    // The queued creation notice does not announce the surface again.
    world.dispatch_surface_events();

    let ready = host.events_of(EventCategory::SurfaceReady);
    assert_eq!(ready.len(), 1);
    match &ready[0] {
        HostEvent::SurfaceReady(e) => {
            assert_eq!(e.kind, WidgetKind::Browser);
            assert_eq!(e.kind.code(), 0);
            assert_eq!(e.widget, WidgetHandle(1));
            assert_eq!(e.surface, Some(surface));
            assert_eq!((e.width, e.height), (1920, 1080));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_surface_gone_before_gl_init_is_not_announced() {
    let render = RecordingRenderContext::new();
    let surfaces = render.probe();
    let mut world = World::new(Box::new(render), WorldConfig::default());
    let mut host = RecordingHost::new();
    world.initialize_host(&mut host).expect("host");

    surfaces.create_surface("widget-1");
    surfaces.destroy_surface("widget-1");
    assert!(world.initialize_gl());
    world.dispatch_surface_events();

    assert!(host.events_of(EventCategory::SurfaceReady).is_empty());

    // Later changes are still delivered.
    surfaces.create_surface("widget-1");
    world.dispatch_surface_events();
    assert_eq!(host.events_of(EventCategory::SurfaceReady).len(), 1);
}

#[test]
fn test_surface_changes_delivered_on_frame() {
    let mut h = harness(1);
    h.world.draw();
    h.host.take_events();

    let surface = h.render.create_surface("widget-2");
    assert!(h.host.events_of(EventCategory::SurfaceReady).is_empty());
    h.world.draw();
    let ready = h.host.events_of(EventCategory::SurfaceReady);
    assert_eq!(ready.len(), 1);
    match &ready[0] {
        HostEvent::SurfaceReady(e) => {
            assert_eq!(e.kind, WidgetKind::UrlBar);
            assert_eq!(e.kind.code(), 1);
            assert_eq!(e.surface, Some(surface));
            assert_eq!((e.width, e.height), (1920, 275));
        }
        other => panic!("unexpected {:?}", other),
    }

    h.host.take_events();
    h.render.destroy_surface("widget-2");
    h.render.fail_surface("widget-1", "out of memory");
    h.render.create_surface("unrelated");
    h.world.dispatch_surface_events();
    let ready = h.host.events_of(EventCategory::SurfaceReady);
    assert_eq!(ready.len(), 1);
    assert!(matches!(&ready[0], HostEvent::SurfaceReady(e) if e.surface.is_none() && e.widget == WidgetHandle(2)));
}
