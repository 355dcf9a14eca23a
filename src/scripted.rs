//! Scripted device, host and render doubles for integration testing and
//! the headless driver.
//!
//! Each double keeps its state behind a shared handle so a test can keep
//! inspecting (and steering) it after the double itself has been moved
//! into a `World`. Device and render calls can be logged to one
//! [`Timeline`] to check cross-layer ordering.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::rc::Rc;

use crate::device::{ButtonState, DeviceDelegate, Eye, GestureKind, GestureSource};
use crate::error::SetupError;
use crate::host::{EventCategory, HostCallbacks, HostEnvironment, HostEvent};
use crate::render::{CameraHandle, DrawList, NodeId, NodeKind, RenderContext, SurfaceRef, SurfaceTextureObserver};
use crate::vr::math::Mat4;

// ── Timeline ─────────────────────────────────────────────────

/// A mutating call made by the frame loop into a device or render double.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetClearColor([f32; 4]),
    SetClipPlanes(f32, f32),
    ProcessEvents,
    StartFrame,
    BindEye(Eye),
    EndFrame,
    InitializeGl(bool),
    ShutdownGl,
    Update,
    CreateNode(NodeId),
    AddChild(NodeId, NodeId),
    AddToRoot(NodeId),
    RemoveFromRoot(NodeId),
    SetTransform(NodeId),
    SetEnabled(NodeId, bool),
    Cull(usize),
    Draw(CameraHandle, usize),
}

/// Shared, append-only call log.
#[derive(Debug, Clone, Default)]
pub struct Timeline(Rc<RefCell<Vec<Call>>>);

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

// ── Device ───────────────────────────────────────────────────

/// One scripted state change, applied when the device processes events.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Pose { controller: usize, transform: Mat4 },
    Button { controller: usize, pressed: bool },
    /// `None` lifts the finger off the touchpad.
    Touchpad { controller: usize, position: Option<(f32, f32)> },
    Head(Mat4),
    Gesture(GestureKind),
}

#[derive(Debug, Clone)]
struct ScriptedController {
    transform: Mat4,
    pressed: bool,
    changed: bool,
    touchpad: Option<(f32, f32)>,
    model: Option<String>,
}

impl Default for ScriptedController {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            pressed: false,
            changed: false,
            touchpad: None,
            model: None,
        }
    }
}

/// Gestures recognized during the current frame.
#[derive(Debug, Default)]
pub struct ScriptedGestures {
    frame: RefCell<Vec<GestureKind>>,
}

impl ScriptedGestures {
    pub fn push(&self, kind: GestureKind) {
        self.frame.borrow_mut().push(kind);
    }

    pub fn clear(&self) {
        self.frame.borrow_mut().clear();
    }
}

impl GestureSource for ScriptedGestures {
    fn gesture_count(&self) -> usize {
        self.frame.borrow().len()
    }

    fn gesture_kind(&self, index: usize) -> GestureKind {
        self.frame.borrow()[index]
    }
}

struct DeviceState {
    controllers: Vec<ScriptedController>,
    head: Mat4,
    frames: VecDeque<Vec<DeviceEvent>>,
    clear_color: Option<[f32; 4]>,
    clip_planes: Option<(f32, f32)>,
    frames_started: usize,
}

impl DeviceState {
    fn apply(&mut self, event: DeviceEvent, gestures: &ScriptedGestures) {
        match event {
            DeviceEvent::Pose { controller, transform } => {
                if let Some(c) = self.controllers.get_mut(controller) {
                    c.transform = transform;
                }
            }
            DeviceEvent::Button { controller, pressed } => {
                if let Some(c) = self.controllers.get_mut(controller) {
                    c.changed = c.pressed != pressed;
                    c.pressed = pressed;
                }
            }
            DeviceEvent::Touchpad { controller, position } => {
                if let Some(c) = self.controllers.get_mut(controller) {
                    c.touchpad = position;
                }
            }
            DeviceEvent::Head(transform) => self.head = transform,
            DeviceEvent::Gesture(kind) => gestures.push(kind),
        }
    }
}

/// Device whose controllers follow a per-frame event script.
///
/// Every `process_events` call pops one frame of events. Controllers start
/// at the origin pointing down -Z with nothing pressed.
pub struct ScriptedDevice {
    state: Rc<RefCell<DeviceState>>,
    gestures: Rc<ScriptedGestures>,
    timeline: Timeline,
    with_gestures: bool,
}

impl ScriptedDevice {
    pub fn new(controller_count: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(DeviceState {
                controllers: vec![ScriptedController::default(); controller_count],
                head: Mat4::IDENTITY,
                frames: VecDeque::new(),
                clear_color: None,
                clip_planes: None,
                frames_started: 0,
            })),
            gestures: Rc::new(ScriptedGestures::default()),
            timeline: Timeline::new(),
            with_gestures: true,
        }
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = timeline;
        self
    }

    pub fn with_model(self, controller: usize, name: &str) -> Self {
        if let Some(c) = self.state.borrow_mut().controllers.get_mut(controller) {
            c.model = Some(name.to_string());
        }
        self
    }

    /// Report no gesture source.
    pub fn without_gestures(mut self) -> Self {
        self.with_gestures = false;
        self
    }

    /// Queue frames of events, one entry per `process_events` call.
    pub fn with_script(self, frames: Vec<Vec<DeviceEvent>>) -> Self {
        self.state.borrow_mut().frames.extend(frames);
        self
    }

    /// Apply an event immediately, outside the script.
    pub fn apply(&mut self, event: DeviceEvent) {
        self.state.borrow_mut().apply(event, &self.gestures);
    }

    pub fn probe(&self) -> DeviceProbe {
        DeviceProbe {
            state: self.state.clone(),
            gestures: self.gestures.clone(),
            timeline: self.timeline.clone(),
        }
    }
}

impl DeviceDelegate for ScriptedDevice {
    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.state.borrow_mut().clear_color = Some(color);
        self.timeline.record(Call::SetClearColor(color));
    }

    fn camera(&self, eye: Eye) -> CameraHandle {
        match eye {
            Eye::Left => CameraHandle(1),
            Eye::Right => CameraHandle(2),
        }
    }

    fn set_clip_planes(&mut self, near: f32, far: f32) {
        self.state.borrow_mut().clip_planes = Some((near, far));
        self.timeline.record(Call::SetClipPlanes(near, far));
    }

    fn gesture_source(&self) -> Option<Rc<dyn GestureSource>> {
        if self.with_gestures {
            let source: Rc<dyn GestureSource> = self.gestures.clone();
            Some(source)
        } else {
            None
        }
    }

    fn controller_count(&self) -> usize {
        self.state.borrow().controllers.len()
    }

    fn controller_transform(&self, index: usize) -> Mat4 {
        self.state
            .borrow()
            .controllers
            .get(index)
            .map_or(Mat4::IDENTITY, |c| c.transform)
    }

    fn controller_button_state(&self, index: usize, button: u32) -> ButtonState {
        if button != 0 {
            return ButtonState::default();
        }
        self.state
            .borrow()
            .controllers
            .get(index)
            .map_or(ButtonState::default(), |c| ButtonState {
                pressed: c.pressed,
                changed: c.changed,
            })
    }

    fn controller_scrolled(&self, index: usize) -> Option<(f32, f32)> {
        self.state.borrow().controllers.get(index).and_then(|c| c.touchpad)
    }

    fn controller_model_name(&self, index: usize) -> Option<String> {
        self.state.borrow().controllers.get(index).and_then(|c| c.model.clone())
    }

    fn head_transform(&self) -> Mat4 {
        self.state.borrow().head
    }

    fn process_events(&mut self) {
        self.timeline.record(Call::ProcessEvents);
        self.gestures.clear();
        let mut state = self.state.borrow_mut();
        for c in state.controllers.iter_mut() {
            c.changed = false;
        }
        if let Some(frame) = state.frames.pop_front() {
            for event in frame {
                state.apply(event, &self.gestures);
            }
        }
    }

    fn start_frame(&mut self) {
        self.state.borrow_mut().frames_started += 1;
        self.timeline.record(Call::StartFrame);
    }

    fn bind_eye(&mut self, eye: Eye) {
        self.timeline.record(Call::BindEye(eye));
    }

    fn end_frame(&mut self) {
        self.timeline.record(Call::EndFrame);
    }
}

/// Test-side view of a [`ScriptedDevice`].
#[derive(Clone)]
pub struct DeviceProbe {
    state: Rc<RefCell<DeviceState>>,
    gestures: Rc<ScriptedGestures>,
    timeline: Timeline,
}

impl DeviceProbe {
    pub fn push_frame(&self, events: Vec<DeviceEvent>) {
        self.state.borrow_mut().frames.push_back(events);
    }

    pub fn apply(&self, event: DeviceEvent) {
        self.state.borrow_mut().apply(event, &self.gestures);
    }

    pub fn remaining_frames(&self) -> usize {
        self.state.borrow().frames.len()
    }

    pub fn frames_started(&self) -> usize {
        self.state.borrow().frames_started
    }

    pub fn clear_color(&self) -> Option<[f32; 4]> {
        self.state.borrow().clear_color
    }

    pub fn clip_planes(&self) -> Option<(f32, f32)> {
        self.state.borrow().clip_planes
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }
}

// ── Render ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct NodeRecord {
    kind: NodeKind,
    enabled: bool,
    parent: Option<NodeId>,
    transform: Option<Mat4>,
}

#[derive(Default)]
struct RenderState {
    next_node: u32,
    nodes: BTreeMap<NodeId, NodeRecord>,
    root: Vec<NodeId>,
    surfaces: HashMap<String, SurfaceRef>,
    next_surface: u64,
    observers: Vec<Rc<dyn SurfaceTextureObserver>>,
    gl_failures: usize,
    gl_ready: bool,
    draws: Vec<(CameraHandle, Vec<NodeId>)>,
}

/// In-memory scene that records every mutating call.
pub struct RecordingRenderContext {
    state: Rc<RefCell<RenderState>>,
    timeline: Timeline,
}

impl Default for RecordingRenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingRenderContext {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(RenderState {
                next_node: 1,
                next_surface: 1,
                ..RenderState::default()
            })),
            timeline: Timeline::new(),
        }
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = timeline;
        self
    }

    /// Make the next `count` GL initialization attempts fail.
    pub fn failing_gl(self, count: usize) -> Self {
        self.state.borrow_mut().gl_failures = count;
        self
    }

    pub fn probe(&self) -> RenderProbe {
        RenderProbe {
            state: self.state.clone(),
            timeline: self.timeline.clone(),
        }
    }
}

impl RenderContext for RecordingRenderContext {
    fn initialize_gl(&mut self) -> bool {
        let ok = {
            let mut state = self.state.borrow_mut();
            if state.gl_failures > 0 {
                state.gl_failures -= 1;
                false
            } else {
                state.gl_ready = true;
                true
            }
        };
        self.timeline.record(Call::InitializeGl(ok));
        ok
    }

    fn shutdown_gl(&mut self) {
        self.state.borrow_mut().gl_ready = false;
        self.timeline.record(Call::ShutdownGl);
    }

    fn update(&mut self) {
        self.timeline.record(Call::Update);
    }

    fn lookup_surface(&self, name: &str) -> Option<SurfaceRef> {
        self.state.borrow().surfaces.get(name).copied()
    }

    fn add_surface_observer(&mut self, observer: Rc<dyn SurfaceTextureObserver>) {
        self.state.borrow_mut().observers.push(observer);
    }

    fn remove_surface_observer(&mut self, observer: &Rc<dyn SurfaceTextureObserver>) {
        self.state.borrow_mut().observers.retain(|o| !Rc::ptr_eq(o, observer));
    }

    fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = NodeId(state.next_node);
            state.next_node += 1;
            state.nodes.insert(
                id,
                NodeRecord {
                    kind,
                    enabled: true,
                    parent: None,
                    transform: None,
                },
            );
            id
        };
        self.timeline.record(Call::CreateNode(id));
        id
    }

    fn add_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.state.borrow_mut().nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        self.timeline.record(Call::AddChild(parent, child));
    }

    fn add_to_root(&mut self, node: NodeId) {
        {
            let mut state = self.state.borrow_mut();
            if !state.root.contains(&node) {
                state.root.push(node);
            }
        }
        self.timeline.record(Call::AddToRoot(node));
    }

    fn remove_from_root(&mut self, node: NodeId) {
        self.state.borrow_mut().root.retain(|n| *n != node);
        self.timeline.record(Call::RemoveFromRoot(node));
    }

    fn set_transform(&mut self, node: NodeId, transform: &Mat4) {
        if let Some(record) = self.state.borrow_mut().nodes.get_mut(&node) {
            record.transform = Some(*transform);
        }
        self.timeline.record(Call::SetTransform(node));
    }

    fn set_enabled(&mut self, node: NodeId, enabled: bool) {
        if let Some(record) = self.state.borrow_mut().nodes.get_mut(&node) {
            record.enabled = enabled;
        }
        self.timeline.record(Call::SetEnabled(node, enabled));
    }

    /// Collects enabled root nodes and their enabled children.
    fn cull(&mut self, draw_list: &mut DrawList) {
        {
            let state = self.state.borrow();
            for root in &state.root {
                let visible = state.nodes.get(root).map_or(false, |n| n.enabled);
                if !visible {
                    continue;
                }
                draw_list.push(*root);
                for (id, node) in &state.nodes {
                    if node.parent == Some(*root) && node.enabled {
                        draw_list.push(*id);
                    }
                }
            }
        }
        self.timeline.record(Call::Cull(draw_list.len()));
    }

    fn draw(&mut self, draw_list: &DrawList, camera: CameraHandle) {
        self.state
            .borrow_mut()
            .draws
            .push((camera, draw_list.nodes().to_vec()));
        self.timeline.record(Call::Draw(camera, draw_list.len()));
    }
}

/// Test-side view of a [`RecordingRenderContext`].
#[derive(Clone)]
pub struct RenderProbe {
    state: Rc<RefCell<RenderState>>,
    timeline: Timeline,
}

impl RenderProbe {
    pub fn calls(&self) -> Vec<Call> {
        self.timeline.calls()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn is_enabled(&self, node: NodeId) -> bool {
        self.state.borrow().nodes.get(&node).map_or(false, |n| n.enabled)
    }

    pub fn in_root(&self, node: NodeId) -> bool {
        self.state.borrow().root.contains(&node)
    }

    pub fn node_kind(&self, node: NodeId) -> Option<NodeKind> {
        self.state.borrow().nodes.get(&node).map(|n| n.kind.clone())
    }

    pub fn children_of(&self, parent: NodeId) -> Vec<NodeId> {
        self.state
            .borrow()
            .nodes
            .iter()
            .filter(|(_, n)| n.parent == Some(parent))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn transform_of(&self, node: NodeId) -> Option<Mat4> {
        self.state.borrow().nodes.get(&node).and_then(|n| n.transform)
    }

    pub fn is_gl_ready(&self) -> bool {
        self.state.borrow().gl_ready
    }

    /// Draw lists handed to `draw`, with the camera they were drawn from.
    pub fn draws(&self) -> Vec<(CameraHandle, Vec<NodeId>)> {
        self.state.borrow().draws.clone()
    }

    pub fn observer_count(&self) -> usize {
        self.state.borrow().observers.len()
    }

    /// Create a platform surface and notify observers.
    pub fn create_surface(&self, name: &str) -> SurfaceRef {
        let (surface, observers) = {
            let mut state = self.state.borrow_mut();
            let surface = SurfaceRef(state.next_surface);
            state.next_surface += 1;
            state.surfaces.insert(name.to_string(), surface);
            (surface, state.observers.clone())
        };
        for observer in observers {
            observer.surface_created(name, surface);
        }
        surface
    }

    pub fn destroy_surface(&self, name: &str) {
        let observers = {
            let mut state = self.state.borrow_mut();
            state.surfaces.remove(name);
            state.observers.clone()
        };
        for observer in observers {
            observer.surface_destroyed(name);
        }
    }

    pub fn fail_surface(&self, name: &str, reason: &str) {
        let observers = self.state.borrow().observers.clone();
        for observer in observers {
            observer.surface_creation_failed(name, reason);
        }
    }
}

// ── Host ─────────────────────────────────────────────────────

/// Host environment that records every delivered event.
#[derive(Default)]
pub struct RecordingHost {
    events: Rc<RefCell<Vec<HostEvent>>>,
    missing: HashSet<EventCategory>,
    failure: Option<SetupError>,
    density: Option<f32>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave the slot for `category` unbound.
    pub fn without(mut self, category: EventCategory) -> Self {
        self.missing.insert(category);
        self
    }

    /// Fail binding with `error`.
    pub fn failing(mut self, error: SetupError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = Some(density);
        self
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.borrow().clone()
    }

    pub fn take_events(&self) -> Vec<HostEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn events_of(&self, category: EventCategory) -> Vec<HostEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.category() == category)
            .cloned()
            .collect()
    }
}

impl HostEnvironment for RecordingHost {
    fn bind(&mut self) -> Result<HostCallbacks, SetupError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let mut callbacks = HostCallbacks::new();
        for category in EventCategory::ALL {
            if self.missing.contains(&category) {
                continue;
            }
            let sink = self.events.clone();
            callbacks = match category {
                EventCategory::SurfaceReady => {
                    callbacks.on_surface_ready(move |e| sink.borrow_mut().push(HostEvent::SurfaceReady(e.clone())))
                }
                EventCategory::Pointer => callbacks.on_pointer(move |e| sink.borrow_mut().push(HostEvent::Pointer(*e))),
                EventCategory::Scroll => callbacks.on_scroll(move |e| sink.borrow_mut().push(HostEvent::Scroll(*e))),
                EventCategory::Gesture => callbacks.on_gesture(move |e| sink.borrow_mut().push(HostEvent::Gesture(*e))),
                EventCategory::HeadPose => {
                    callbacks.on_head_pose(move |e| sink.borrow_mut().push(HostEvent::HeadPose(*e)))
                }
            };
        }
        Ok(callbacks)
    }

    fn display_density(&self) -> Option<f32> {
        self.density
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_pops_one_frame_per_process() {
        let mut device = ScriptedDevice::new(1).with_script(vec![
            vec![DeviceEvent::Button { controller: 0, pressed: true }],
            vec![DeviceEvent::Touchpad { controller: 0, position: Some((0.5, 0.5)) }],
        ]);
        let probe = device.probe();
        assert_eq!(probe.remaining_frames(), 2);

        device.process_events();
        assert!(device.controller_button_state(0, 0).pressed);
        assert!(device.controller_button_state(0, 0).changed);
        assert!(device.controller_scrolled(0).is_none());

        device.process_events();
        assert!(!device.controller_button_state(0, 0).changed);
        assert_eq!(device.controller_scrolled(0), Some((0.5, 0.5)));
        assert_eq!(probe.remaining_frames(), 0);
    }

    #[test]
    fn test_gestures_last_one_frame() {
        let mut device = ScriptedDevice::new(0).with_script(vec![vec![DeviceEvent::Gesture(GestureKind::SwipeLeft)]]);
        let source = device.gesture_source().expect("gesture source");
        device.process_events();
        assert_eq!(source.gesture_count(), 1);
        device.process_events();
        assert_eq!(source.gesture_count(), 0);
    }

    #[test]
    fn test_shared_timeline_orders_layers() {
        let timeline = Timeline::new();
        let mut device = ScriptedDevice::new(0).with_timeline(timeline.clone());
        let mut render = RecordingRenderContext::new().with_timeline(timeline.clone());

        device.start_frame();
        render.draw(&DrawList::new(), CameraHandle(1));
        device.end_frame();
        assert_eq!(
            timeline.calls(),
            vec![Call::StartFrame, Call::Draw(CameraHandle(1), 0), Call::EndFrame]
        );
    }

    #[test]
    fn test_cull_skips_disabled_nodes() {
        let mut render = RecordingRenderContext::new();
        let a = render.create_node(NodeKind::Floor);
        let b = render.create_node(NodeKind::WidgetPointer);
        let c = render.create_node(NodeKind::Floor);
        render.add_child(a, b);
        render.add_to_root(a);
        render.add_to_root(c);
        render.set_enabled(c, false);

        let mut list = DrawList::new();
        render.cull(&mut list);
        assert_eq!(list.nodes(), &[a, b]);
    }

    #[test]
    fn test_failing_gl_recovers() {
        let mut render = RecordingRenderContext::new().failing_gl(1);
        assert!(!render.initialize_gl());
        assert!(render.initialize_gl());
        assert!(render.probe().is_gl_ready());
    }

    #[test]
    fn test_recording_host_skips_missing_slot() {
        let mut host = RecordingHost::new().without(EventCategory::Scroll);
        let callbacks = host.bind().expect("bind");
        assert!(!callbacks.has(EventCategory::Scroll));
        assert!(callbacks.has(EventCategory::Pointer));
    }

    #[test]
    fn test_recording_host_failure() {
        let mut host = RecordingHost::new().failing(SetupError::ActivityMissing);
        assert_eq!(host.bind().err(), Some(SetupError::ActivityMissing));
    }
}
