//! Frame orchestrator and lifecycle gate.
//!
//! `World` owns the scene state (widgets, controller records, camera
//! handles) and drives one stereo frame per `draw()` call:
//!
//! 1. gate on device presence, pause state and GL readiness
//! 2. pump device events and advance the scene
//! 3. run the controller pass and deliver its events to the host
//! 4. cull once, draw the left eye, then the right eye
//! 5. report the head pose
//!
//! Nothing on this path returns an error. Missing capabilities degrade to
//! a skipped frame or a dropped event category.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::{Rc, Weak};

use tracing::{debug, info, trace, warn};

use crate::config::WorldConfig;
use crate::device::{DeviceDelegate, Eye, GestureSource};
use crate::error::SetupError;
use crate::host::{EventCategory, HeadPoseEvent, HostCallbacks, HostEnvironment, HostEvent, SurfaceReadyEvent};
use crate::render::{CameraHandle, DrawList, NodeId, NodeKind, RenderContext, SurfaceRef, SurfaceTextureObserver};
use crate::vr::controller::ControllerRecord;
use crate::vr::interaction;
use crate::vr::math::{Mat4, Quat};
use crate::vr::widget::{Widget, WidgetHandle, WidgetKind, WidgetParams};

/// Eye passes drawn each frame, in order.
#[cfg(not(feature = "mono"))]
const EYES: [Eye; 2] = [Eye::Left, Eye::Right];
#[cfg(feature = "mono")]
const EYES: [Eye; 1] = [Eye::Left];

/// Camera handles captured from the device, one per eye.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StereoCameras {
    pub left: CameraHandle,
    pub right: CameraHandle,
}

/// Platform surface change waiting to be applied on the frame thread.
#[derive(Debug, Clone, PartialEq)]
enum SurfaceNotice {
    Created { name: String, surface: SurfaceRef },
    Destroyed { name: String },
    Failed { name: String, reason: String },
}

type SurfaceInbox = Rc<RefCell<VecDeque<SurfaceNotice>>>;

/// Registered with the render context's surface factory. Holds only a weak
/// reference so it never keeps a dropped world's state alive.
struct SurfaceObserver {
    inbox: Weak<RefCell<VecDeque<SurfaceNotice>>>,
}

impl SurfaceObserver {
    fn post(&self, notice: SurfaceNotice) {
        match self.inbox.upgrade() {
            Some(inbox) => inbox.borrow_mut().push_back(notice),
            None => trace!("surface notice for a dropped world: {:?}", notice),
        }
    }
}

impl SurfaceTextureObserver for SurfaceObserver {
    fn surface_created(&self, name: &str, surface: SurfaceRef) {
        self.post(SurfaceNotice::Created {
            name: name.to_string(),
            surface,
        });
    }

    fn surface_destroyed(&self, name: &str) {
        self.post(SurfaceNotice::Destroyed { name: name.to_string() });
    }

    fn surface_creation_failed(&self, name: &str, reason: &str) {
        self.post(SurfaceNotice::Failed {
            name: name.to_string(),
            reason: reason.to_string(),
        });
    }
}

pub struct World {
    config: WorldConfig,
    render: Box<dyn RenderContext>,
    device: Option<Box<dyn DeviceDelegate>>,
    host: Option<HostCallbacks>,
    widgets: Vec<Widget>,
    controllers: Vec<ControllerRecord>,
    controller_count: usize,
    cameras: Option<StereoCameras>,
    gestures: Option<Rc<dyn GestureSource>>,
    floor: Option<NodeId>,
    draw_list: DrawList,
    paused: bool,
    gl_initialized: bool,
    display_density: Option<f32>,
    next_handle: u32,
    surface_inbox: SurfaceInbox,
    observer: Rc<dyn SurfaceTextureObserver>,
    frame_count: u64,
}

impl World {
    /// Create a paused world with an empty scene. The surface observer is
    /// registered with `render` immediately.
    pub fn new(mut render: Box<dyn RenderContext>, config: WorldConfig) -> Self {
        let surface_inbox: SurfaceInbox = Rc::new(RefCell::new(VecDeque::new()));
        let observer: Rc<dyn SurfaceTextureObserver> = Rc::new(SurfaceObserver {
            inbox: Rc::downgrade(&surface_inbox),
        });
        render.add_surface_observer(observer.clone());

        Self {
            config,
            render,
            device: None,
            host: None,
            widgets: Vec::new(),
            controllers: Vec::new(),
            controller_count: 0,
            cameras: None,
            gestures: None,
            floor: None,
            draw_list: DrawList::new(),
            paused: true,
            gl_initialized: false,
            display_density: None,
            next_handle: 1,
            surface_inbox,
            observer,
            frame_count: 0,
        }
    }

    // ── Lifecycle ────────────────────────────────────────────

    pub fn pause(&mut self) {
        if !self.paused {
            info!("world paused");
        }
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            info!("world resumed");
        }
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_gl_initialized(&self) -> bool {
        self.gl_initialized
    }

    /// Attach (`Some`) or detach (`None`) the device layer.
    ///
    /// Attaching replaces any previous device; its controller nodes are
    /// removed from the scene first.
    pub fn register_device(&mut self, device: Option<Box<dyn DeviceDelegate>>) {
        if self.device.is_some() {
            self.release_device();
        }
        let Some(mut device) = device else {
            return;
        };

        device.set_clear_color(self.config.clear_color);
        self.cameras = Some(StereoCameras {
            left: device.camera(Eye::Left),
            right: device.camera(Eye::Right),
        });
        self.controller_count = device.controller_count();
        device.set_clip_planes(self.config.near_clip, self.config.far_clip);
        self.gestures = device.gesture_source();
        if self.gestures.is_none() {
            debug!("device has no gesture source");
        }

        for index in 0..self.controller_count {
            let model = device.controller_model_name(index);
            let node = self.render.create_node(NodeKind::Controller {
                index,
                model: model.clone(),
            });
            let pointer = self.render.create_node(NodeKind::ControllerPointer);
            self.render.add_child(node, pointer);

            let mut record = ControllerRecord::new(index, node);
            if model.is_some() {
                self.render.add_to_root(node);
                record.in_scene = true;
            }
            self.controllers.push(record);
        }

        info!("device registered: {} controller(s)", self.controller_count);
        self.device = Some(device);
    }

    fn release_device(&mut self) {
        for record in self.controllers.drain(..) {
            if record.in_scene {
                self.render.remove_from_root(record.node);
            }
        }
        self.cameras = None;
        self.controller_count = 0;
        self.gestures = None;
        self.device = None;
        info!("device released");
    }

    /// Bind the host callback table, read the display density and build
    /// the scene on first call. Unresolved callbacks only disable their
    /// own category.
    pub fn initialize_host(&mut self, env: &mut dyn HostEnvironment) -> Result<(), SetupError> {
        let callbacks = env.bind()?;
        for category in EventCategory::ALL {
            if !callbacks.has(category) {
                warn!("host callback '{}' unresolved, those events are disabled", category.as_str());
            }
        }
        debug!("host bound: {:?}", callbacks);
        self.host = Some(callbacks);
        self.display_density = env.display_density();

        if self.floor.is_none() {
            self.initialize_scene();
        }
        info!("host initialized");
        Ok(())
    }

    /// Drop the callback table. Every event category is disabled afterwards.
    pub fn shutdown_host(&mut self) {
        if self.host.take().is_some() {
            info!("host shut down");
        }
    }

    fn initialize_scene(&mut self) {
        let browser = self.config.browser;
        let params = WidgetParams::sized(
            WidgetKind::Browser,
            browser.pixel_width,
            browser.pixel_height,
            browser.world_width,
        );
        self.add_widget(&params, Mat4::position(browser.position));

        let url_bar = self.config.url_bar;
        let (width, height) = self.config.url_bar_pixels(self.display_density);
        let params = WidgetParams::sized(WidgetKind::UrlBar, width, height, url_bar.world_width);
        self.add_widget(&params, Mat4::position(url_bar.position));

        let floor = self.render.create_node(NodeKind::Floor);
        self.render.add_to_root(floor);
        self.floor = Some(floor);

        info!(
            "scene initialized: {} widget(s), url bar {}x{} px",
            self.widgets.len(),
            width,
            height
        );
    }

    /// Create a widget, place it and attach it to the scene. Widgets created
    /// after GL initialization announce their surface immediately when one
    /// already exists.
    pub fn add_widget(&mut self, params: &WidgetParams, transform: Mat4) -> WidgetHandle {
        let handle = WidgetHandle(self.next_handle);
        self.next_handle += 1;

        let mut widget = Widget::create(handle, params, &mut *self.render);
        widget.set_transform(transform, &mut *self.render);
        self.render.add_to_root(widget.root());
        self.widgets.push(widget);

        if self.gl_initialized {
            self.announce_surface(handle);
        }
        handle
    }

    /// Set up GL. On the first success every widget's existing surface is
    /// announced to the host.
    pub fn initialize_gl(&mut self) -> bool {
        if self.gl_initialized {
            return true;
        }
        if !self.render.initialize_gl() {
            warn!("GL initialization failed, retrying next frame");
            return false;
        }
        self.gl_initialized = true;
        info!("GL initialized");

        // Lookup below covers every surface that already exists. A surface
        // created and destroyed before now was never announced.
        let mut unannounced: HashSet<String> = HashSet::new();
        self.surface_inbox.borrow_mut().retain(|n| match n {
            SurfaceNotice::Created { name, .. } => {
                unannounced.insert(name.clone());
                false
            }
            SurfaceNotice::Destroyed { name } => !unannounced.remove(name),
            SurfaceNotice::Failed { .. } => true,
        });
        let handles: Vec<WidgetHandle> = self.widgets.iter().map(|w| w.handle()).collect();
        for handle in handles {
            self.announce_surface(handle);
        }
        true
    }

    pub fn shutdown_gl(&mut self) {
        self.render.shutdown_gl();
        if self.gl_initialized {
            info!("GL shut down");
        }
        self.gl_initialized = false;
    }

    fn announce_surface(&mut self, handle: WidgetHandle) {
        let Some(widget) = self.widget(handle) else {
            return;
        };
        let name = widget.surface_name().to_string();
        match self.render.lookup_surface(&name) {
            Some(surface) => self.set_surface_texture(&name, Some(surface)),
            None => debug!("no surface yet for {}", name),
        }
    }

    // ── Surfaces ─────────────────────────────────────────────

    /// Tell the host that the surface for the widget named `name` is
    /// available (`Some`) or gone (`None`).
    pub fn set_surface_texture(&mut self, name: &str, surface: Option<SurfaceRef>) {
        let Some(widget) = self.widgets.iter().find(|w| w.surface_name() == name) else {
            debug!("surface {} matches no widget", name);
            return;
        };
        let (width, height) = widget.surface_size();
        debug!(
            "surface {} for widget {} (type {}): {}",
            name,
            widget.handle().get(),
            widget.kind().code(),
            if surface.is_some() { "ready" } else { "gone" }
        );
        let event = HostEvent::SurfaceReady(SurfaceReadyEvent {
            kind: widget.kind(),
            widget: widget.handle(),
            surface,
            width,
            height,
        });
        deliver(&mut self.host, &event);
    }

    /// Apply surface notices queued by the observer.
    pub fn dispatch_surface_events(&mut self) {
        loop {
            let notice = self.surface_inbox.borrow_mut().pop_front();
            let Some(notice) = notice else {
                break;
            };
            match notice {
                SurfaceNotice::Created { name, surface } => self.set_surface_texture(&name, Some(surface)),
                SurfaceNotice::Destroyed { name } => self.set_surface_texture(&name, None),
                SurfaceNotice::Failed { name, reason } => {
                    warn!("surface texture {} failed: {}", name, reason);
                }
            }
        }
    }

    // ── Frame ────────────────────────────────────────────────

    /// Render one frame. Does nothing without a device, while paused, or
    /// while GL cannot be initialized.
    pub fn draw(&mut self) {
        if self.device.is_none() {
            debug!("draw skipped: no device registered");
            return;
        }
        if self.paused {
            debug!("draw skipped: paused");
            return;
        }
        if !self.initialize_gl() {
            return;
        }
        self.dispatch_surface_events();

        let (Some(device), Some(cameras)) = (self.device.as_mut(), self.cameras) else {
            return;
        };

        device.process_events();
        self.render.update();

        let events = interaction::update_controllers(
            &**device,
            self.gestures.as_deref(),
            &mut self.controllers,
            &mut self.widgets,
            &mut *self.render,
            &self.config.interaction(),
        );
        for event in &events {
            deliver(&mut self.host, event);
        }

        self.draw_list.reset();
        self.render.cull(&mut self.draw_list);

        device.start_frame();
        for eye in EYES {
            let camera = match eye {
                Eye::Left => cameras.left,
                Eye::Right => cameras.right,
            };
            trace!("drawing {} eye", eye.as_str());
            device.bind_eye(eye);
            self.render.draw(&self.draw_list, camera);
        }
        device.end_frame();

        let wants_head_pose = self.host.as_ref().map_or(false, |h| h.has(EventCategory::HeadPose));
        if wants_head_pose {
            let head = device.head_transform();
            let event = HostEvent::HeadPose(HeadPoseEvent {
                rotation: Quat::from_rotation(&head).normalize(),
                position: head.translation_part(),
            });
            deliver(&mut self.host, &event);
        }

        self.frame_count += 1;
        trace!("frame {} drawn, {} node(s)", self.frame_count, self.draw_list.len());
    }

    // ── Accessors ────────────────────────────────────────────

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    pub fn widget(&self, handle: WidgetHandle) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.handle() == handle)
    }

    pub fn controllers(&self) -> &[ControllerRecord] {
        &self.controllers
    }

    pub fn controller_count(&self) -> usize {
        self.controller_count
    }

    pub fn cameras(&self) -> Option<StereoCameras> {
        self.cameras
    }

    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    pub fn has_host(&self) -> bool {
        self.host.is_some()
    }

    pub fn display_density(&self) -> Option<f32> {
        self.display_density
    }

    pub fn floor(&self) -> Option<NodeId> {
        self.floor
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.render.remove_surface_observer(&self.observer);
    }
}

fn deliver(host: &mut Option<HostCallbacks>, event: &HostEvent) {
    match host {
        Some(callbacks) => {
            callbacks.dispatch(event);
        }
        None => trace!("no host bound, {} event dropped", event.category().as_str()),
    }
}
