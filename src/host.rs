//! Event dispatch bridge to the host application.
//!
//! The host hands over a typed callback table when it is bound. Every slot
//! is optional: an unresolved slot silently disables that one category of
//! event, everything else keeps flowing.

use std::fmt;

use tracing::trace;

use crate::error::SetupError;
use crate::render::SurfaceRef;
use crate::vr::math::{Quat, Vec3};
use crate::vr::widget::{WidgetHandle, WidgetKind};

// ── Events ───────────────────────────────────────────────────

/// A widget's platform surface became available (or went away).
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceReadyEvent {
    pub kind: WidgetKind,
    pub widget: WidgetHandle,
    pub surface: Option<SurfaceRef>,
    pub width: u32,
    pub height: u32,
}

/// Pointer moved, pressed or released over a widget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub widget: WidgetHandle,
    pub controller: usize,
    pub pressed: bool,
    pub x: f32,
    pub y: f32,
}

/// Touchpad scroll over a widget, already scaled to UI units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollEvent {
    pub widget: WidgetHandle,
    pub controller: usize,
    pub dx: f32,
    pub dy: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureEvent {
    pub code: i32,
}

/// Head orientation (unit quaternion) and position, for spatial audio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadPoseEvent {
    pub rotation: Quat,
    pub position: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    SurfaceReady(SurfaceReadyEvent),
    Pointer(PointerEvent),
    Scroll(ScrollEvent),
    Gesture(GestureEvent),
    HeadPose(HeadPoseEvent),
}

impl HostEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            Self::SurfaceReady(_) => EventCategory::SurfaceReady,
            Self::Pointer(_) => EventCategory::Pointer,
            Self::Scroll(_) => EventCategory::Scroll,
            Self::Gesture(_) => EventCategory::Gesture,
            Self::HeadPose(_) => EventCategory::HeadPose,
        }
    }
}

/// One slot of the callback table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    SurfaceReady,
    Pointer,
    Scroll,
    Gesture,
    HeadPose,
}

impl EventCategory {
    pub const ALL: [Self; 5] = [
        Self::SurfaceReady,
        Self::Pointer,
        Self::Scroll,
        Self::Gesture,
        Self::HeadPose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SurfaceReady => "surface-ready",
            Self::Pointer => "pointer",
            Self::Scroll => "scroll",
            Self::Gesture => "gesture",
            Self::HeadPose => "head-pose",
        }
    }
}

// ── Callback table ───────────────────────────────────────────

pub type Callback<E> = Box<dyn FnMut(&E)>;

/// Host callbacks resolved at bind time.
#[derive(Default)]
pub struct HostCallbacks {
    pub surface_ready: Option<Callback<SurfaceReadyEvent>>,
    pub pointer: Option<Callback<PointerEvent>>,
    pub scroll: Option<Callback<ScrollEvent>>,
    pub gesture: Option<Callback<GestureEvent>>,
    pub head_pose: Option<Callback<HeadPoseEvent>>,
}

impl HostCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_surface_ready(mut self, f: impl FnMut(&SurfaceReadyEvent) + 'static) -> Self {
        self.surface_ready = Some(Box::new(f));
        self
    }

    pub fn on_pointer(mut self, f: impl FnMut(&PointerEvent) + 'static) -> Self {
        self.pointer = Some(Box::new(f));
        self
    }

    pub fn on_scroll(mut self, f: impl FnMut(&ScrollEvent) + 'static) -> Self {
        self.scroll = Some(Box::new(f));
        self
    }

    pub fn on_gesture(mut self, f: impl FnMut(&GestureEvent) + 'static) -> Self {
        self.gesture = Some(Box::new(f));
        self
    }

    pub fn on_head_pose(mut self, f: impl FnMut(&HeadPoseEvent) + 'static) -> Self {
        self.head_pose = Some(Box::new(f));
        self
    }

    /// Whether the slot for `category` is bound.
    pub fn has(&self, category: EventCategory) -> bool {
        match category {
            EventCategory::SurfaceReady => self.surface_ready.is_some(),
            EventCategory::Pointer => self.pointer.is_some(),
            EventCategory::Scroll => self.scroll.is_some(),
            EventCategory::Gesture => self.gesture.is_some(),
            EventCategory::HeadPose => self.head_pose.is_some(),
        }
    }

    /// Deliver an event to its slot. Returns false when the slot is unbound
    /// and the event was dropped.
    pub fn dispatch(&mut self, event: &HostEvent) -> bool {
        let delivered = match event {
            HostEvent::SurfaceReady(e) => call(&mut self.surface_ready, e),
            HostEvent::Pointer(e) => call(&mut self.pointer, e),
            HostEvent::Scroll(e) => call(&mut self.scroll, e),
            HostEvent::Gesture(e) => call(&mut self.gesture, e),
            HostEvent::HeadPose(e) => call(&mut self.head_pose, e),
        };
        if delivered {
            trace!("host event delivered: {:?}", event);
        } else {
            trace!("host event dropped, {} unbound", event.category().as_str());
        }
        delivered
    }
}

fn call<E>(slot: &mut Option<Callback<E>>, event: &E) -> bool {
    match slot {
        Some(f) => {
            f(event);
            true
        }
        None => false,
    }
}

impl fmt::Debug for HostCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound: Vec<&str> = EventCategory::ALL
            .iter()
            .filter(|c| self.has(**c))
            .map(|c| c.as_str())
            .collect();
        f.debug_struct("HostCallbacks").field("bound", &bound).finish()
    }
}

// ── Environment ──────────────────────────────────────────────

/// The host side, consulted once at setup.
pub trait HostEnvironment {
    /// Resolve the callback table. An `Err` means the host itself could not
    /// be reached and setup must fail; missing individual callbacks are
    /// expressed as empty slots instead.
    fn bind(&mut self) -> Result<HostCallbacks, SetupError>;

    /// Display density in dpi, used to scale UI widgets.
    fn display_density(&self) -> Option<f32> {
        None
    }
}
