//! Device layer interface: tracked controllers, head pose, eye buffers and
//! the gesture source. Implemented by the platform VR backend.

use std::rc::Rc;

use crate::render::CameraHandle;
use crate::vr::math::Mat4;

/// Eye buffer selector for the stereo pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// Button sample. `changed` is reported by the device but edge detection is
/// done against the controller record, not this flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonState {
    pub pressed: bool,
    pub changed: bool,
}

/// Discrete gestures classified by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    SwipeLeft,
    SwipeRight,
    SwipeUp,
    SwipeDown,
}

impl GestureKind {
    /// Gesture code understood by the host, if the host handles this kind.
    pub fn host_code(&self) -> Option<i32> {
        match self {
            Self::SwipeLeft => Some(0),
            Self::SwipeRight => Some(1),
            Self::SwipeUp | Self::SwipeDown => None,
        }
    }
}

/// Polled source of recognized gestures for the current frame.
pub trait GestureSource {
    fn gesture_count(&self) -> usize;
    fn gesture_kind(&self, index: usize) -> GestureKind;
}

/// Platform VR device. All calls are synchronous and expected to return
/// quickly; a stall here stalls the frame.
pub trait DeviceDelegate {
    fn set_clear_color(&mut self, color: [f32; 4]);
    fn camera(&self, eye: Eye) -> CameraHandle;
    fn set_clip_planes(&mut self, near: f32, far: f32);
    fn gesture_source(&self) -> Option<Rc<dyn GestureSource>>;

    fn controller_count(&self) -> usize;
    fn controller_transform(&self, index: usize) -> Mat4;
    fn controller_button_state(&self, index: usize, button: u32) -> ButtonState;
    /// Touchpad position while the pad is touched, `None` otherwise.
    fn controller_scrolled(&self, index: usize) -> Option<(f32, f32)>;
    /// Model asset for the controller; `None` when the device has no model.
    fn controller_model_name(&self, index: usize) -> Option<String>;
    fn head_transform(&self) -> Mat4;

    fn process_events(&mut self);
    fn start_frame(&mut self);
    fn bind_eye(&mut self, eye: Eye);
    fn end_frame(&mut self);
}
