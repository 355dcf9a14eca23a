//! Ray casting primitives: rays, ray-plane, ray-cylinder and ray-box
//! intersection. All intersections are computed in the local space of the
//! surface being tested; callers transform the ray first.

use super::math::{Mat4, Vec3};

const PARALLEL_EPSILON: f32 = 1e-8;

// ── Ray ──────────────────────────────────────────────────────

/// A ray in 3D space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Forward ray of a tracked pose: origin at the pose position, pointing
    /// down the pose's -Z axis.
    pub fn from_pose(pose: &Mat4) -> Self {
        Self::new(
            pose.multiply_position(Vec3::ZERO),
            pose.multiply_direction(Vec3::FORWARD),
        )
    }

    /// Evaluate the point at parameter t along the ray.
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Re-express the ray in another space. The direction is re-normalized,
    /// so `t` values are measured in the target space's units.
    pub fn transformed(&self, m: &Mat4) -> Self {
        Self::new(
            m.multiply_position(self.origin),
            m.multiply_direction(self.direction),
        )
    }

    pub fn is_degenerate(&self) -> bool {
        self.direction == Vec3::ZERO
    }
}

// ── Plane ────────────────────────────────────────────────────

/// Intersect with the local plane z = 0. Returns `(t, point)`; `None` when
/// the ray is parallel to the plane or the plane is behind the origin.
pub fn ray_plane_z0(ray: &Ray) -> Option<(f32, Vec3)> {
    if ray.direction.z.abs() < PARALLEL_EPSILON {
        return None;
    }

    let t = -ray.origin.z / ray.direction.z;
    if t < 0.0 {
        return None;
    }

    let mut point = ray.at(t);
    point.z = 0.0;
    Some((t, point))
}

// ── Cylinder ─────────────────────────────────────────────────

/// Intersect with the infinite cylinder of `radius` whose axis is parallel
/// to Y and passes through `(0, 0, axis_z)`. Returns the non-negative roots
/// in ascending order.
pub fn ray_cylinder_y(ray: &Ray, radius: f32, axis_z: f32) -> Vec<f32> {
    let ox = ray.origin.x;
    let oz = ray.origin.z - axis_z;
    let dx = ray.direction.x;
    let dz = ray.direction.z;

    let a = dx * dx + dz * dz;
    if a < PARALLEL_EPSILON {
        // Ray runs along the axis; it never crosses the wall.
        return Vec::new();
    }
    let b = 2.0 * (ox * dx + oz * dz);
    let c = ox * ox + oz * oz - radius * radius;

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return Vec::new();
    }

    let sqrt_d = discriminant.sqrt();
    let t1 = (-b - sqrt_d) / (2.0 * a);
    let t2 = (-b + sqrt_d) / (2.0 * a);

    [t1, t2].into_iter().filter(|t| *t >= 0.0).collect()
}

// ── Axis-aligned box ─────────────────────────────────────────

/// Axis-aligned box, also used as a widget's local bounds envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Whether `point` lies within the X/Y extent (edges inclusive).
    pub fn contains_xy(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Slab test. Returns the entry and exit parameters of the ray through
    /// the box, with entry clamped to 0 when the origin is inside.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<(f32, f32)> {
        let mut t_min = 0.0f32;
        let mut t_max = f32::INFINITY;

        let axes = [
            (ray.origin.x, ray.direction.x, self.min.x, self.max.x),
            (ray.origin.y, ray.direction.y, self.min.y, self.max.y),
            (ray.origin.z, ray.direction.z, self.min.z, self.max.z),
        ];
        for (origin, dir, lo, hi) in axes {
            if dir.abs() < PARALLEL_EPSILON {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / dir;
            let (t0, t1) = {
                let a = (lo - origin) * inv;
                let b = (hi - origin) * inv;
                if a <= b { (a, b) } else { (b, a) }
            };
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some((t_min, t_max))
    }
}
