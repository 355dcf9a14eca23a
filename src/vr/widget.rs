//! Widgets: positioned rectangular surfaces (browser content, URL bar) that
//! controller rays are tested against.
//!
//! A widget's local space has its bounds on the z = 0 plane (flat) or on a
//! cylinder arc whose edges curve toward +Z (curved, centre of curvature at
//! `(0, 0, radius)`). Widgets face +Z. Local coordinates are converted to
//! pixels with the origin at the top-left corner of the rendered content.

use std::f32::consts::FRAC_PI_2;

use tracing::debug;

use super::geometry::{ray_cylinder_y, ray_plane_z0, Aabb, Ray};
use super::math::{Mat4, Vec3};
use crate::render::{NodeId, NodeKind, RenderContext};

/// Stable, non-zero widget identity shared with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetHandle(pub u32);

impl WidgetHandle {
    pub fn get(self) -> u32 {
        self.0
    }
}

/// Widget type tag. Codes must match the host's widget types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Browser,
    UrlBar,
}

impl WidgetKind {
    pub fn code(&self) -> i32 {
        match self {
            Self::Browser => 0,
            Self::UrlBar => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::UrlBar => "url-bar",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WidgetShape {
    Flat,
    /// Cylinder arc; local X is measured as arc length.
    Curved { radius: f32 },
}

/// Where the widget's local extent comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WidgetExtent {
    /// Bottom-centred at the origin, height from the pixel aspect ratio.
    WorldWidth(f32),
    Bounds { min: Vec3, max: Vec3 },
}

/// Creation parameters for a widget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidgetParams {
    pub kind: WidgetKind,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub extent: WidgetExtent,
    pub shape: WidgetShape,
}

impl WidgetParams {
    pub const DEFAULT_PIXEL_WIDTH: u32 = 1920;
    pub const DEFAULT_PIXEL_HEIGHT: u32 = 1080;
    pub const DEFAULT_WORLD_WIDTH: f32 = 16.0;

    pub fn new(kind: WidgetKind) -> Self {
        Self::sized(
            kind,
            Self::DEFAULT_PIXEL_WIDTH,
            Self::DEFAULT_PIXEL_HEIGHT,
            Self::DEFAULT_WORLD_WIDTH,
        )
    }

    pub fn sized(kind: WidgetKind, pixel_width: u32, pixel_height: u32, world_width: f32) -> Self {
        Self {
            kind,
            pixel_width,
            pixel_height,
            extent: WidgetExtent::WorldWidth(world_width),
            shape: WidgetShape::Flat,
        }
    }

    pub fn bounded(kind: WidgetKind, pixel_width: u32, pixel_height: u32, min: Vec3, max: Vec3) -> Self {
        Self {
            kind,
            pixel_width,
            pixel_height,
            extent: WidgetExtent::Bounds { min, max },
            shape: WidgetShape::Flat,
        }
    }

    pub fn curved(mut self, radius: f32) -> Self {
        self.shape = WidgetShape::Curved { radius };
        self
    }

    /// Local bounds envelope.
    pub fn bounds(&self) -> Aabb {
        match self.extent {
            WidgetExtent::WorldWidth(width) => {
                let aspect = if self.pixel_width == 0 {
                    0.0
                } else {
                    self.pixel_height as f32 / self.pixel_width as f32
                };
                let height = width * aspect;
                Aabb::new(Vec3::new(-width * 0.5, 0.0, 0.0), Vec3::new(width * 0.5, height, 0.0))
            }
            WidgetExtent::Bounds { min, max } => Aabb::new(min, max),
        }
    }
}

/// Ray/widget intersection. Present only when the ray meets the widget's
/// supporting surface at `t >= 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub point: Vec3,
    pub distance: f32,
    pub inside_bounds: bool,
}

#[derive(Debug)]
pub struct Widget {
    handle: WidgetHandle,
    kind: WidgetKind,
    shape: WidgetShape,
    pixel_width: u32,
    pixel_height: u32,
    bounds: Aabb,
    transform: Mat4,
    inverse: Option<Mat4>,
    surface_name: String,
    root: NodeId,
    pointer: NodeId,
    enabled: bool,
    pointer_active: bool,
}

impl Widget {
    /// Build the widget and its engine nodes. The root is not attached to
    /// the scene; the caller decides where it goes.
    pub fn create(handle: WidgetHandle, params: &WidgetParams, render: &mut dyn RenderContext) -> Self {
        let bounds = params.bounds();
        let surface_name = format!("widget-{}", handle.get());
        let curve_radius = match params.shape {
            WidgetShape::Flat => None,
            WidgetShape::Curved { radius } => Some(radius),
        };

        let root = render.create_node(NodeKind::WidgetPanel {
            surface_name: surface_name.clone(),
            bounds,
            curve_radius,
        });
        let pointer = render.create_node(NodeKind::WidgetPointer);
        render.add_child(root, pointer);
        render.set_enabled(pointer, false);

        debug!(
            "widget {} ({}) created: {}x{} px, {:.2}x{:.2} world",
            handle.get(),
            params.kind.as_str(),
            params.pixel_width,
            params.pixel_height,
            bounds.width(),
            bounds.height(),
        );

        Self {
            handle,
            kind: params.kind,
            shape: params.shape,
            pixel_width: params.pixel_width,
            pixel_height: params.pixel_height,
            bounds,
            transform: Mat4::IDENTITY,
            inverse: Some(Mat4::IDENTITY),
            surface_name,
            root,
            pointer,
            enabled: true,
            pointer_active: false,
        }
    }

    pub fn handle(&self) -> WidgetHandle {
        self.handle
    }

    pub fn kind(&self) -> WidgetKind {
        self.kind
    }

    pub fn surface_name(&self) -> &str {
        &self.surface_name
    }

    /// Rendered content size in pixels.
    pub fn surface_size(&self) -> (u32, u32) {
        (self.pixel_width, self.pixel_height)
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn pointer_node(&self) -> NodeId {
        self.pointer
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_pointer_active(&self) -> bool {
        self.pointer_active
    }

    pub fn set_transform(&mut self, transform: Mat4, render: &mut dyn RenderContext) {
        self.transform = transform;
        self.inverse = transform.inverse();
        render.set_transform(self.root, &transform);
    }

    pub fn toggle_widget(&mut self, enabled: bool, render: &mut dyn RenderContext) {
        if self.enabled != enabled {
            self.enabled = enabled;
            render.set_enabled(self.root, enabled);
        }
    }

    /// Show or hide the pointer highlight.
    pub fn toggle_pointer(&mut self, active: bool, render: &mut dyn RenderContext) {
        if self.pointer_active != active {
            self.pointer_active = active;
            render.set_enabled(self.pointer, active);
        }
    }

    /// Intersect the ray `origin + t * direction` with the widget surface.
    pub fn test_intersection(&self, origin: Vec3, direction: Vec3) -> Option<Intersection> {
        let inverse = self.inverse.as_ref()?;
        let ray = Ray::new(origin, direction);
        if ray.is_degenerate() {
            return None;
        }
        let local_ray = ray.transformed(inverse);

        let (local_point, inside_bounds) = match self.shape {
            WidgetShape::Flat => {
                let (_, point) = ray_plane_z0(&local_ray)?;
                (point, self.bounds.contains_xy(point))
            }
            WidgetShape::Curved { radius } => self.intersect_arc(&local_ray, radius)?,
        };

        let point = self.transform.multiply_position(local_point);
        Some(Intersection {
            point,
            distance: origin.distance(point),
            inside_bounds,
        })
    }

    fn intersect_arc(&self, local_ray: &Ray, radius: f32) -> Option<(Vec3, bool)> {
        let roots = ray_cylinder_y(local_ray, radius, radius);
        let nearest = local_ray.at(*roots.first()?);

        // Skip the per-root arc checks when the ray misses the arc's box.
        if self.arc_envelope(radius).intersect_ray(local_ray).is_some() {
            for t in &roots {
                let point = local_ray.at(*t);
                if point.z <= radius && self.bounds.contains_xy(arc_coordinates(point, radius)) {
                    return Some((point, true));
                }
            }
        }
        Some((nearest, false))
    }

    /// Local box enclosing the visible part of a curved widget.
    fn arc_envelope(&self, radius: f32) -> Aabb {
        const SLACK: f32 = 1e-4;
        let theta_min = (self.bounds.min.x / radius).clamp(-FRAC_PI_2, FRAC_PI_2);
        let theta_max = (self.bounds.max.x / radius).clamp(-FRAC_PI_2, FRAC_PI_2);
        let depth = radius * (1.0 - theta_min.abs().max(theta_max.abs()).cos());
        Aabb::new(
            Vec3::new(radius * theta_min.sin() - SLACK, self.bounds.min.y - SLACK, -SLACK),
            Vec3::new(radius * theta_max.sin() + SLACK, self.bounds.max.y + SLACK, depth + SLACK),
        )
    }

    /// Map a world-space point inside the bounds to content pixels.
    /// The result is meaningless for points outside the bounds.
    pub fn convert_to_local(&self, point: Vec3) -> (f32, f32) {
        let local = match &self.inverse {
            Some(inverse) => inverse.multiply_position(point),
            None => return (0.0, 0.0),
        };
        let surface = match self.shape {
            WidgetShape::Flat => local,
            WidgetShape::Curved { radius } => arc_coordinates(local, radius),
        };

        let x = (surface.x - self.bounds.min.x) / self.bounds.width() * self.pixel_width as f32;
        let y = (self.bounds.max.y - surface.y) / self.bounds.height() * self.pixel_height as f32;
        (x, y)
    }

    /// Map a point in widget-local space to world space.
    pub fn convert_to_world(&self, point: Vec3) -> Vec3 {
        self.transform.multiply_position(point)
    }
}

/// Unroll a point on the cylinder into (arc length, height, 0).
fn arc_coordinates(point: Vec3, radius: f32) -> Vec3 {
    let theta = point.x.atan2(radius - point.z);
    Vec3::new(radius * theta, point.y, 0.0)
}
