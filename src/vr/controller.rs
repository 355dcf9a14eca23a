//! Per-controller interaction record with edge-triggered event production.
//!
//! The pointer fields hold the last values produced for the host. A new
//! pointer event is only produced when the current sample differs from
//! them, so a controller resting on a widget generates no traffic.

use crate::host::PointerEvent;
use crate::render::NodeId;

use super::widget::WidgetHandle;

/// Current-frame pointer observation for one controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub widget: WidgetHandle,
    pub pressed: bool,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerRecord {
    pub index: usize,
    pub widget: Option<WidgetHandle>,
    pub pressed: bool,
    pub x: f32,
    pub y: f32,
    pub touched: bool,
    pub touchpad_x: f32,
    pub touchpad_y: f32,
    /// Engine node mirroring the controller pose.
    pub node: NodeId,
    /// Whether `node` was attached to the scene root.
    pub in_scene: bool,
}

impl ControllerRecord {
    pub fn new(index: usize, node: NodeId) -> Self {
        Self {
            index,
            widget: None,
            pressed: false,
            x: 0.0,
            y: 0.0,
            touched: false,
            touchpad_x: 0.0,
            touchpad_y: 0.0,
            node,
            in_scene: false,
        }
    }

    /// Compare against the last reported state; on any difference adopt the
    /// sample and return the event carrying all current fields.
    pub fn update_pointer(&mut self, sample: PointerSample) -> Option<PointerEvent> {
        let unchanged = self.widget == Some(sample.widget)
            && self.pressed == sample.pressed
            && self.x == sample.x
            && self.y == sample.y;
        if unchanged {
            return None;
        }

        self.widget = Some(sample.widget);
        self.pressed = sample.pressed;
        self.x = sample.x;
        self.y = sample.y;

        Some(PointerEvent {
            widget: sample.widget,
            controller: self.index,
            pressed: sample.pressed,
            x: sample.x,
            y: sample.y,
        })
    }

    /// Track the touchpad. Returns the scaled scroll delta when the pad was
    /// already touched last frame and the button is up. The first touched
    /// frame only records a baseline; an untouched frame clears it.
    pub fn update_scroll(&mut self, touchpad: Option<(f32, f32)>, scroll_factor: f32) -> Option<(f32, f32)> {
        let Some((x, y)) = touchpad else {
            self.touched = false;
            return None;
        };

        let delta = if self.touched && !self.pressed {
            Some((
                (x - self.touchpad_x) * scroll_factor,
                (y - self.touchpad_y) * scroll_factor,
            ))
        } else {
            None
        };

        self.touched = true;
        self.touchpad_x = x;
        self.touchpad_y = y;
        delta
    }
}
