//! Mathematical types shared between client and server.
//!
//! These are the canonical representations used in the network protocol
//! and in the shared movement code.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// 3D Vector - position, velocity, direction
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Creates a new Vec3
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Length squared (avoids sqrt)
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Length
    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Distance to another point
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Distance squared (avoids sqrt)
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        (self - other).length_squared()
    }

    /// Squared distance ignoring the vertical axis.
    #[must_use]
    pub fn horizontal_distance_squared(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        dx * dx + dz * dz
    }

    /// Linear interpolation toward `other` by `t`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }

    /// True when no component is NaN or infinite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Integer block position in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    /// X coordinate
    pub x: i32,
    /// Y coordinate
    pub y: i32,
    /// Z coordinate
    pub z: i32,
}

impl BlockPos {
    /// Creates a new block position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Offsets this position by another one.
    #[must_use]
    pub const fn offset(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Center of the cell in world space.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn center(self) -> Vec3 {
        Vec3::new(self.x as f32 + 0.5, self.y as f32 + 0.5, self.z as f32 + 0.5)
    }

    /// True when exactly one component is +-1 and the others are zero.
    #[must_use]
    pub const fn is_unit_axis(self) -> bool {
        let sum = self.x.abs() + self.y.abs() + self.z.abs();
        sum == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        let sum = a + b;
        assert_eq!(sum, Vec3::new(5.0, 7.0, 9.0));

        let diff = b - a;
        assert_eq!(diff, Vec3::new(3.0, 3.0, 3.0));

        let dot = a.dot(b);
        assert!((dot - 32.0).abs() < 0.001);
    }

    #[test]
    fn test_vec3_bytemuck() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let bytes: &[u8] = bytemuck::bytes_of(&v);
        assert_eq!(bytes.len(), 12);
        let back: Vec3 = *bytemuck::from_bytes(bytes);
        assert_eq!(v, back);
    }

    #[test]
    fn test_lerp_and_horizontal_distance() {
        let a = Vec3::new(0.0, 10.0, 0.0);
        let b = Vec3::new(4.0, 0.0, 0.0);
        assert_eq!(a.lerp(b, 0.5), Vec3::new(2.0, 5.0, 0.0));
        assert!((a.horizontal_distance_squared(b) - 16.0).abs() < 1e-6);
        assert!(!Vec3::new(f32::NAN, 0.0, 0.0).is_finite());
    }

    #[test]
    fn test_unit_axis() {
        assert!(BlockPos::new(0, 1, 0).is_unit_axis());
        assert!(BlockPos::new(-1, 0, 0).is_unit_axis());
        assert!(!BlockPos::new(1, 1, 0).is_unit_axis());
        assert!(!BlockPos::new(0, 0, 0).is_unit_axis());
        assert!(!BlockPos::new(0, 0, 2).is_unit_axis());
    }
}
