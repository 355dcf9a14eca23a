//! Math types for the interaction core: vectors, quaternions and
//! column-major 4x4 affine matrices.
//!
//! Widget and controller transforms are plain `Mat4`s as delivered by the
//! device layer; the helpers here cover exactly what hit-testing and
//! head-pose reporting need.

use std::ops::{Add, Mul, Sub};

// ── Vec3 ─────────────────────────────────────────────────────

/// 3D vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
    /// Controller and head forward axis (OpenGL convention).
    pub const FORWARD: Self = Self {
        x: 0.0,
        y: 0.0,
        z: -1.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    pub fn normalize(self) -> Self {
        let len = self.length();
        if len < 1e-10 {
            return Self::ZERO;
        }
        self * (1.0 / len)
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

// ── Quat ─────────────────────────────────────────────────────

/// Quaternion for rotations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Create quaternion from Euler angles (yaw, pitch, roll) in radians.
    pub fn from_euler(yaw: f32, pitch: f32, roll: f32) -> Self {
        let (sy, cy) = (yaw * 0.5).sin_cos();
        let (sp, cp) = (pitch * 0.5).sin_cos();
        let (sr, cr) = (roll * 0.5).sin_cos();

        Self {
            x: cr * sp * cy + sr * cp * sy,
            y: cr * cp * sy - sr * sp * cy,
            z: sr * cp * cy - cr * sp * sy,
            w: cr * cp * cy + sr * sp * sy,
        }
    }

    /// Extract the rotation of an affine matrix. Scale is divided out of
    /// the basis columns first, so the result is always a unit quaternion
    /// (identity for a degenerate matrix).
    pub fn from_rotation(m: &Mat4) -> Self {
        let sx = m.column(0).length();
        let sy = m.column(1).length();
        let sz = m.column(2).length();
        if sx < 1e-10 || sy < 1e-10 || sz < 1e-10 {
            return Self::IDENTITY;
        }
        let r = |row: usize, col: usize| {
            let scale = [sx, sy, sz][col];
            m.get(row, col) / scale
        };

        let trace = r(0, 0) + r(1, 1) + r(2, 2);
        let q = if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Self {
                w: 0.25 * s,
                x: (r(2, 1) - r(1, 2)) / s,
                y: (r(0, 2) - r(2, 0)) / s,
                z: (r(1, 0) - r(0, 1)) / s,
            }
        } else if r(0, 0) > r(1, 1) && r(0, 0) > r(2, 2) {
            let s = (1.0 + r(0, 0) - r(1, 1) - r(2, 2)).sqrt() * 2.0;
            Self {
                w: (r(2, 1) - r(1, 2)) / s,
                x: 0.25 * s,
                y: (r(0, 1) + r(1, 0)) / s,
                z: (r(0, 2) + r(2, 0)) / s,
            }
        } else if r(1, 1) > r(2, 2) {
            let s = (1.0 + r(1, 1) - r(0, 0) - r(2, 2)).sqrt() * 2.0;
            Self {
                w: (r(0, 2) - r(2, 0)) / s,
                x: (r(0, 1) + r(1, 0)) / s,
                y: 0.25 * s,
                z: (r(1, 2) + r(2, 1)) / s,
            }
        } else {
            let s = (1.0 + r(2, 2) - r(0, 0) - r(1, 1)).sqrt() * 2.0;
            Self {
                w: (r(1, 0) - r(0, 1)) / s,
                x: (r(0, 2) + r(2, 0)) / s,
                y: (r(1, 2) + r(2, 1)) / s,
                z: 0.25 * s,
            }
        };
        q.normalize()
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    pub fn normalize(self) -> Self {
        let len = self.length();
        if len < 1e-10 {
            return Self::IDENTITY;
        }
        Self {
            x: self.x / len,
            y: self.y / len,
            z: self.z / len,
            w: self.w / len,
        }
    }
}

// ── Mat4 ─────────────────────────────────────────────────────

/// 4x4 matrix (column-major, OpenGL convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4 {
    pub data: [f32; 16],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Self = Self {
        data: [
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        ],
    };

    /// Create translation matrix.
    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        let mut m = Self::IDENTITY;
        m.data[12] = x;
        m.data[13] = y;
        m.data[14] = z;
        m
    }

    /// Translation matrix placing the origin at `position`.
    pub fn position(position: Vec3) -> Self {
        Self::translation(position.x, position.y, position.z)
    }

    /// Create scale matrix.
    pub fn scale(x: f32, y: f32, z: f32) -> Self {
        let mut m = Self::IDENTITY;
        m.data[0] = x;
        m.data[5] = y;
        m.data[10] = z;
        m
    }

    /// Create rotation matrix from quaternion.
    pub fn from_quat(q: &Quat) -> Self {
        let (x, y, z, w) = (q.x, q.y, q.z, q.w);
        let x2 = x + x;
        let y2 = y + y;
        let z2 = z + z;
        let xx = x * x2;
        let xy = x * y2;
        let xz = x * z2;
        let yy = y * y2;
        let yz = y * z2;
        let zz = z * z2;
        let wx = w * x2;
        let wy = w * y2;
        let wz = w * z2;

        Self {
            data: [
                1.0 - (yy + zz),
                xy + wz,
                xz - wy,
                0.0,
                xy - wz,
                1.0 - (xx + zz),
                yz + wx,
                0.0,
                xz + wy,
                yz - wx,
                1.0 - (xx + yy),
                0.0,
                0.0,
                0.0,
                0.0,
                1.0,
            ],
        }
    }

    /// Rigid pose: rotation then translation.
    pub fn from_pose(position: Vec3, rotation: &Quat) -> Self {
        Self::position(position).mul(&Self::from_quat(rotation))
    }

    /// Element at `row`, `col`.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[col * 4 + row]
    }

    /// First three components of a column.
    pub fn column(&self, col: usize) -> Vec3 {
        Vec3::new(
            self.data[col * 4],
            self.data[col * 4 + 1],
            self.data[col * 4 + 2],
        )
    }

    pub fn translation_part(&self) -> Vec3 {
        self.column(3)
    }

    /// Multiply two matrices.
    pub fn mul(&self, other: &Self) -> Self {
        let mut out = [0.0f32; 16];
        for col in 0..4 {
            for row in 0..4 {
                let mut sum = 0.0;
                for k in 0..4 {
                    sum += self.data[k * 4 + row] * other.data[col * 4 + k];
                }
                out[col * 4 + row] = sum;
            }
        }
        Self { data: out }
    }

    /// Transform a point (w = 1).
    pub fn multiply_position(&self, p: Vec3) -> Vec3 {
        let d = &self.data;
        Vec3::new(
            d[0] * p.x + d[4] * p.y + d[8] * p.z + d[12],
            d[1] * p.x + d[5] * p.y + d[9] * p.z + d[13],
            d[2] * p.x + d[6] * p.y + d[10] * p.z + d[14],
        )
    }

    /// Transform a direction (w = 0), ignoring translation.
    pub fn multiply_direction(&self, v: Vec3) -> Vec3 {
        let d = &self.data;
        Vec3::new(
            d[0] * v.x + d[4] * v.y + d[8] * v.z,
            d[1] * v.x + d[5] * v.y + d[9] * v.z,
            d[2] * v.x + d[6] * v.y + d[10] * v.z,
        )
    }

    /// Inverse of an affine matrix (bottom row `0 0 0 1`). Returns `None`
    /// when the linear part is singular.
    pub fn inverse(&self) -> Option<Self> {
        let a = |row: usize, col: usize| self.get(row, col);

        let c00 = a(1, 1) * a(2, 2) - a(1, 2) * a(2, 1);
        let c10 = a(1, 2) * a(2, 0) - a(1, 0) * a(2, 2);
        let c20 = a(1, 0) * a(2, 1) - a(1, 1) * a(2, 0);
        let det = a(0, 0) * c00 + a(0, 1) * c10 + a(0, 2) * c20;
        if det.abs() < 1e-12 {
            return None;
        }
        let inv_det = 1.0 / det;

        let inv = [
            [
                c00,
                a(0, 2) * a(2, 1) - a(0, 1) * a(2, 2),
                a(0, 1) * a(1, 2) - a(0, 2) * a(1, 1),
            ],
            [
                c10,
                a(0, 0) * a(2, 2) - a(0, 2) * a(2, 0),
                a(0, 2) * a(1, 0) - a(0, 0) * a(1, 2),
            ],
            [
                c20,
                a(0, 1) * a(2, 0) - a(0, 0) * a(2, 1),
                a(0, 0) * a(1, 1) - a(0, 1) * a(1, 0),
            ],
        ];

        let mut out = Self::IDENTITY;
        for (row, values) in inv.iter().enumerate() {
            for (col, value) in values.iter().enumerate() {
                out.data[col * 4 + row] = value * inv_det;
            }
        }

        let t = self.translation_part();
        let it = out.multiply_direction(t);
        out.data[12] = -it.x;
        out.data[13] = -it.y;
        out.data[14] = -it.z;
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-4, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_mat4_mul_identity() {
        let a = Mat4::translation(1.0, 2.0, 3.0);
        let result = a.mul(&Mat4::IDENTITY);
        assert_eq!(result.translation_part(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_position_and_direction() {
        let m = Mat4::translation(0.0, -3.0, -18.0);
        assert_vec_eq(m.multiply_position(Vec3::ZERO), Vec3::new(0.0, -3.0, -18.0));
        // Directions ignore translation.
        assert_vec_eq(m.multiply_direction(Vec3::FORWARD), Vec3::FORWARD);
    }

    #[test]
    fn test_inverse_round_trip_with_scale() {
        let rot = Quat::from_euler(0.4, -0.2, 0.1);
        let m = Mat4::from_pose(Vec3::new(1.0, 2.0, -5.0), &rot).mul(&Mat4::scale(2.0, 0.5, 1.0));
        let inv = m.inverse().expect("invertible");
        let p = Vec3::new(0.3, -0.7, 4.0);
        assert_vec_eq(inv.multiply_position(m.multiply_position(p)), p);
        assert_vec_eq(m.multiply_position(inv.multiply_position(p)), p);
    }

    #[test]
    fn test_inverse_singular() {
        assert!(Mat4::scale(1.0, 0.0, 1.0).inverse().is_none());
    }

    #[test]
    fn test_quat_from_rotation_recovers_quat() {
        let q = Quat::from_euler(std::f32::consts::FRAC_PI_2, 0.3, 0.0);
        let back = Quat::from_rotation(&Mat4::from_pose(Vec3::new(4.0, 5.0, 6.0), &q));
        // q and -q describe the same rotation.
        let sign = if back.w * q.w < 0.0 { -1.0 } else { 1.0 };
        assert!((back.x * sign - q.x).abs() < 1e-4);
        assert!((back.y * sign - q.y).abs() < 1e-4);
        assert!((back.z * sign - q.z).abs() < 1e-4);
        assert!((back.w * sign - q.w).abs() < 1e-4);
    }

    #[test]
    fn test_quat_from_rotation_is_normalized_under_scale() {
        let m = Mat4::from_quat(&Quat::from_euler(2.5, 0.0, 0.0)).mul(&Mat4::scale(3.0, 3.0, 3.0));
        let q = Quat::from_rotation(&m);
        assert!((q.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_quat_from_identity() {
        assert_eq!(Quat::from_rotation(&Mat4::IDENTITY), Quat::IDENTITY);
    }
}
