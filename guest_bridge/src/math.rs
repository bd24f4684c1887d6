// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Small math aggregates stored inline in tagged values.
//!
//! Components are 32-bit, matching the guest-side layout. The helpers here back the math and
//! vector operation groups of the dispatcher; they use `libm` so the crate stays `no_std`.

use core::ops::{Add, Div, Mul, Neg, Sub};

/// 2D vector with `f32` components.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Vector2 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
}

/// 2D vector with `i32` components.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Vector2i {
    /// X component.
    pub x: i32,
    /// Y component.
    pub y: i32,
}

/// 3D vector with `f32` components.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Vector3 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

/// 3D vector with `i32` components.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Vector3i {
    /// X component.
    pub x: i32,
    /// Y component.
    pub y: i32,
    /// Z component.
    pub z: i32,
}

/// 4D vector with `f32` components.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Vector4 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
    /// W component.
    pub w: f32,
}

/// 4D vector with `i32` components.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Vector4i {
    /// X component.
    pub x: i32,
    /// Y component.
    pub y: i32,
    /// Z component.
    pub z: i32,
    /// W component.
    pub w: i32,
}

/// Axis-aligned rectangle with `f32` position and size.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Rect2 {
    /// Top-left corner.
    pub position: Vector2,
    /// Extent.
    pub size: Vector2,
}

/// Axis-aligned rectangle with `i32` position and size.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect2i {
    /// Top-left corner.
    pub position: Vector2i,
    /// Extent.
    pub size: Vector2i,
}

/// RGBA color with `f32` channels.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Color {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl Vector2 {
    /// Creates a vector.
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(self) -> f32 {
        libm::sqrtf(self.x * self.x + self.y * self.y)
    }

    /// Unit vector in the same direction, or zero for a zero vector.
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len == 0.0 {
            return Self::default();
        }
        Self::new(self.x / len, self.y / len)
    }

    /// Rotates counter-clockwise by `angle` radians.
    #[must_use]
    pub fn rotated(self, angle: f32) -> Self {
        let (sin, cos) = (libm::sinf(angle), libm::cosf(angle));
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }
}

impl Vector3 {
    /// Creates a vector.
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Dot product.
    #[must_use]
    #[inline]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product.
    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Squared length.
    #[must_use]
    #[inline]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(self) -> f32 {
        libm::sqrtf(self.length_squared())
    }

    /// Unit vector in the same direction, or zero for a zero vector.
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len == 0.0 {
            return Self::default();
        }
        self / len
    }

    /// Distance to `other`.
    #[must_use]
    pub fn distance_to(self, other: Self) -> f32 {
        (other - self).length()
    }

    /// Squared distance to `other`.
    #[must_use]
    pub fn distance_squared_to(self, other: Self) -> f32 {
        (other - self).length_squared()
    }

    /// Unsigned angle to `other`, in radians.
    #[must_use]
    pub fn angle_to(self, other: Self) -> f32 {
        libm::atan2f(self.cross(other).length(), self.dot(other))
    }

    /// Projection onto `onto`; zero when `onto` is a zero vector.
    #[must_use]
    pub fn project(self, onto: Self) -> Self {
        let denom = onto.length_squared();
        if denom == 0.0 {
            return Self::default();
        }
        onto * (self.dot(onto) / denom)
    }

    /// Reflection across the plane defined by `normal` (expected to be normalized).
    #[must_use]
    pub fn reflect(self, normal: Self) -> Self {
        normal * (2.0 * self.dot(normal)) - self
    }

    /// Rotates about `axis` (expected to be normalized) by `angle` radians.
    #[must_use]
    pub fn rotated(self, axis: Self, angle: f32) -> Self {
        // Rodrigues' rotation formula.
        let (sin, cos) = (libm::sinf(angle), libm::cosf(angle));
        self * cos + axis.cross(self) * sin + axis * (axis.dot(self) * (1.0 - cos))
    }

    /// Stable 32-bit hash of the component bit patterns (FNV-1a).
    #[must_use]
    pub fn stable_hash(self) -> u32 {
        let mut hash: u32 = 0x811c_9dc5;
        for component in [self.x, self.y, self.z] {
            for byte in component.to_bits().to_le_bytes() {
                hash ^= u32::from(byte);
                hash = hash.wrapping_mul(0x0100_0193);
            }
        }
        hash
    }
}

impl Vector4 {
    /// Creates a vector.
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

impl Vector2i {
    /// Creates a vector.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Vector3i {
    /// Creates a vector.
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl Vector4i {
    /// Creates a vector.
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32, w: i32) -> Self {
        Self { x, y, z, w }
    }
}

impl Rect2 {
    /// Creates a rectangle from position and size components.
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            position: Vector2::new(x, y),
            size: Vector2::new(width, height),
        }
    }
}

impl Rect2i {
    /// Creates a rectangle from position and size components.
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            position: Vector2i::new(x, y),
            size: Vector2i::new(width, height),
        }
    }
}

impl Color {
    /// Creates a color.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

macro_rules! componentwise {
    ($ty:ident { $($field:ident),+ }, $scalar:ty) => {
        impl Add for $ty {
            type Output = Self;
            #[inline]
            fn add(self, rhs: Self) -> Self {
                Self { $($field: self.$field + rhs.$field),+ }
            }
        }

        impl Sub for $ty {
            type Output = Self;
            #[inline]
            fn sub(self, rhs: Self) -> Self {
                Self { $($field: self.$field - rhs.$field),+ }
            }
        }

        impl Mul for $ty {
            type Output = Self;
            #[inline]
            fn mul(self, rhs: Self) -> Self {
                Self { $($field: self.$field * rhs.$field),+ }
            }
        }

        impl Mul<$scalar> for $ty {
            type Output = Self;
            #[inline]
            fn mul(self, rhs: $scalar) -> Self {
                Self { $($field: self.$field * rhs),+ }
            }
        }

        impl Div<$scalar> for $ty {
            type Output = Self;
            #[inline]
            fn div(self, rhs: $scalar) -> Self {
                Self { $($field: self.$field / rhs),+ }
            }
        }

        impl Neg for $ty {
            type Output = Self;
            #[inline]
            fn neg(self) -> Self {
                Self { $($field: -self.$field),+ }
            }
        }
    };
}

componentwise!(Vector2 { x, y }, f32);
componentwise!(Vector3 { x, y, z }, f32);
componentwise!(Vector4 { x, y, z, w }, f32);

/// Linear interpolation.
#[inline]
pub fn lerp(from: f64, to: f64, weight: f64) -> f64 {
    from + (to - from) * weight
}

/// Hermite smoothstep of `x` between `from` and `to`.
pub fn smoothstep(from: f64, to: f64, x: f64) -> f64 {
    if from == to {
        return if x < from { 0.0 } else { 1.0 };
    }
    let t = ((x - from) / (to - from)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Interpolates between two angles (radians) along the shortest arc.
pub fn lerp_angle(from: f64, to: f64, weight: f64) -> f64 {
    let tau = core::f64::consts::TAU;
    let difference = libm::fmod(to - from, tau);
    let distance = libm::fmod(2.0 * difference, tau) - difference;
    from + distance * weight
}

/// Single-precision [`lerp`].
#[inline]
pub fn lerpf(from: f32, to: f32, weight: f32) -> f32 {
    from + (to - from) * weight
}

/// Single-precision [`smoothstep`].
pub fn smoothstepf(from: f32, to: f32, x: f32) -> f32 {
    if from == to {
        return if x < from { 0.0 } else { 1.0 };
    }
    let t = ((x - from) / (to - from)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Single-precision [`lerp_angle`].
pub fn lerp_anglef(from: f32, to: f32, weight: f32) -> f32 {
    let tau = core::f32::consts::TAU;
    let difference = libm::fmodf(to - from, tau);
    let distance = libm::fmodf(2.0 * difference, tau) - difference;
    from + distance * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn vector2_rotate_quarter_turn() {
        let v = Vector2::new(1.0, 0.0).rotated(core::f32::consts::FRAC_PI_2);
        assert!(close(v.x, 0.0) && close(v.y, 1.0), "got {v:?}");
    }

    #[test]
    fn vector3_cross_and_angle() {
        let x = Vector3::new(1.0, 0.0, 0.0);
        let y = Vector3::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(y), Vector3::new(0.0, 0.0, 1.0));
        assert!(close(x.angle_to(y), core::f32::consts::FRAC_PI_2));
    }

    #[test]
    fn vector3_rotated_about_z() {
        let z = Vector3::new(0.0, 0.0, 1.0);
        let v = Vector3::new(1.0, 0.0, 0.0).rotated(z, core::f32::consts::FRAC_PI_2);
        assert!(close(v.x, 0.0) && close(v.y, 1.0) && close(v.z, 0.0), "got {v:?}");
    }

    #[test]
    fn zero_vectors_normalize_to_zero() {
        assert_eq!(Vector2::default().normalized(), Vector2::default());
        assert_eq!(Vector3::default().normalized(), Vector3::default());
    }

    #[test]
    fn lerp_angle_takes_short_way_round() {
        let tau = core::f64::consts::TAU;
        let mid = lerp_angle(0.1, tau - 0.1, 0.5);
        assert!(mid.abs() < 1e-9, "got {mid}");
    }

    #[test]
    fn smoothstep_clamps() {
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
        assert_eq!(smoothstep(0.0, 1.0, 0.5), 0.5);
    }
}
