//! Controller update pass: pose mirroring, ray casting against widgets,
//! pointer/scroll edge detection, gesture draining and pointer highlights.
//!
//! Runs once per frame. Produces host events in a fixed order: for each
//! controller its pointer event then its scroll event, then all gestures.

use std::collections::HashSet;

use tracing::{debug, trace};

use super::controller::{ControllerRecord, PointerSample};
use super::geometry::Ray;
use super::math::Vec3;
use super::widget::{Widget, WidgetHandle};
use crate::device::{DeviceDelegate, GestureSource};
use crate::host::{GestureEvent, HostEvent, ScrollEvent};
use crate::render::RenderContext;

/// Tuning for the update pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionConfig {
    /// Hits at or beyond this distance are ignored.
    pub far_clip: f32,
    /// Multiplier from touchpad units to UI scroll units.
    pub scroll_factor: f32,
    pub primary_button: u32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            far_clip: 100.0,
            scroll_factor: 20.0,
            primary_button: 0,
        }
    }
}

/// Nearest widget under a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    /// Position in the widget list.
    pub index: usize,
    pub widget: WidgetHandle,
    pub distance: f32,
    pub point: Vec3,
}

/// Find the nearest in-bounds hit closer than `max_distance`.
///
/// Disabled widgets are skipped. On equal distance the widget that comes
/// first in `widgets` wins.
pub fn nearest_hit(ray: &Ray, widgets: &[Widget], max_distance: f32) -> Option<HitResult> {
    let mut closest: Option<HitResult> = None;
    let mut limit = max_distance;

    for (index, widget) in widgets.iter().enumerate() {
        if !widget.is_enabled() {
            continue;
        }
        let Some(hit) = widget.test_intersection(ray.origin, ray.direction) else {
            continue;
        };
        if hit.inside_bounds && hit.distance < limit {
            limit = hit.distance;
            closest = Some(HitResult {
                index,
                widget: widget.handle(),
                distance: hit.distance,
                point: hit.point,
            });
        }
    }

    closest
}

/// One gesture event per recognized gesture with a host code.
pub fn drain_gestures(source: &dyn GestureSource) -> Vec<GestureEvent> {
    (0..source.gesture_count())
        .filter_map(|i| {
            let kind = source.gesture_kind(i);
            match kind.host_code() {
                Some(code) => Some(GestureEvent { code }),
                None => {
                    trace!("gesture {:?} has no host code, dropped", kind);
                    None
                }
            }
        })
        .collect()
}

/// Run the per-frame controller pass and return the events it produced.
///
/// Controller records are updated whether or not the host will accept the
/// events; filtering by bound callbacks happens at dispatch.
pub fn update_controllers(
    device: &dyn DeviceDelegate,
    gestures: Option<&dyn GestureSource>,
    records: &mut [ControllerRecord],
    widgets: &mut [Widget],
    render: &mut dyn RenderContext,
    config: &InteractionConfig,
) -> Vec<HostEvent> {
    let mut events = Vec::new();
    let mut active: HashSet<WidgetHandle> = HashSet::new();

    for record in records.iter_mut() {
        let pose = device.controller_transform(record.index);
        render.set_transform(record.node, &pose);

        let ray = Ray::from_pose(&pose);
        let hit = if ray.is_degenerate() {
            None
        } else {
            nearest_hit(&ray, widgets, config.far_clip)
        };

        if let Some(hit) = &hit {
            active.insert(hit.widget);
            let (x, y) = widgets[hit.index].convert_to_local(hit.point);
            let pressed = device
                .controller_button_state(record.index, config.primary_button)
                .pressed;
            let sample = PointerSample {
                widget: hit.widget,
                pressed,
                x,
                y,
            };
            if let Some(event) = record.update_pointer(sample) {
                debug!(
                    "controller {} -> widget {} at ({:.1}, {:.1}) pressed={}",
                    record.index,
                    hit.widget.get(),
                    x,
                    y,
                    pressed
                );
                events.push(HostEvent::Pointer(event));
            }
        }

        let delta = record.update_scroll(device.controller_scrolled(record.index), config.scroll_factor);
        if let (Some((dx, dy)), Some(_), Some(widget)) = (delta, &hit, record.widget) {
            events.push(HostEvent::Scroll(ScrollEvent {
                widget,
                controller: record.index,
                dx,
                dy,
            }));
        }
    }

    if let Some(source) = gestures {
        events.extend(drain_gestures(source).into_iter().map(HostEvent::Gesture));
    }

    for widget in widgets.iter_mut() {
        let lit = active.contains(&widget.handle());
        widget.toggle_pointer(lit, render);
    }

    events
}
