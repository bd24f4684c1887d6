// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tagged value model shared by the registry and the dispatcher.
//!
//! [`TaggedValue`] is small and `Copy`: primitive kinds and math aggregates live inline, every
//! other kind is a [`Handle`] into a sandbox's [`Registry`](crate::registry::Registry). Host-side
//! owned values are [`Variant`](crate::variant::Variant)s.

use core::fmt;

use crate::math::{Color, Rect2, Rect2i, Vector2, Vector2i, Vector3, Vector3i, Vector4, Vector4i};

/// A registry handle.
///
/// Handles are issued by one registry, start at 1 and are never reused while that registry is
/// alive. `0` is never a valid handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u32);

impl Handle {
    /// Wraps a raw handle value.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity token of a host object, assigned by the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Wraps a host identity token.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identity token.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object:{}", self.0)
    }
}

macro_rules! kinds {
    ($($(#[$meta:meta])* $variant:ident = $value:literal => $label:literal, inline = $inline:literal;)*) => {
        /// Value kind with its stable wire discriminant.
        #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(u32)]
        pub enum Kind {
            $($(#[$meta])* $variant = $value,)*
        }

        impl Kind {
            /// Every kind in discriminant order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)*];

            /// Decodes a wire discriminant.
            #[must_use]
            pub const fn from_wire(raw: u32) -> Option<Self> {
                match raw {
                    $($value => Some(Self::$variant),)*
                    _ => None,
                }
            }

            /// Returns `true` for kinds stored directly in a tagged value.
            #[must_use]
            pub const fn is_inline(self) -> bool {
                match self {
                    $(Self::$variant => $inline,)*
                }
            }

            /// Human-readable kind name.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)*
                }
            }
        }
    };
}

kinds! {
    /// No value.
    Nil = 0 => "Nil", inline = true;
    /// Boolean.
    Bool = 1 => "bool", inline = true;
    /// Signed 64-bit integer.
    Int = 2 => "int", inline = true;
    /// 64-bit float.
    Float = 3 => "float", inline = true;
    /// Owned text.
    String = 4 => "String", inline = false;
    /// [`Vector2`].
    Vector2 = 5 => "Vector2", inline = true;
    /// [`Vector2i`].
    Vector2i = 6 => "Vector2i", inline = true;
    /// [`Rect2`].
    Rect2 = 7 => "Rect2", inline = true;
    /// [`Rect2i`].
    Rect2i = 8 => "Rect2i", inline = true;
    /// [`Vector3`].
    Vector3 = 9 => "Vector3", inline = true;
    /// [`Vector3i`].
    Vector3i = 10 => "Vector3i", inline = true;
    /// 2D transform (not supported across the boundary).
    Transform2D = 11 => "Transform2D", inline = false;
    /// [`Vector4`].
    Vector4 = 12 => "Vector4", inline = true;
    /// [`Vector4i`].
    Vector4i = 13 => "Vector4i", inline = true;
    /// Plane (not supported across the boundary).
    Plane = 14 => "Plane", inline = false;
    /// Quaternion (not supported across the boundary).
    Quaternion = 15 => "Quaternion", inline = false;
    /// AABB (not supported across the boundary).
    Aabb = 16 => "AABB", inline = false;
    /// Basis (not supported across the boundary).
    Basis = 17 => "Basis", inline = false;
    /// 3D transform (not supported across the boundary).
    Transform3D = 18 => "Transform3D", inline = false;
    /// Projection (not supported across the boundary).
    Projection = 19 => "Projection", inline = false;
    /// [`Color`].
    Color = 20 => "Color", inline = true;
    /// Interned name.
    StringName = 21 => "StringName", inline = false;
    /// Scene path.
    NodePath = 22 => "NodePath", inline = false;
    /// Resource id (not supported across the boundary).
    Rid = 23 => "RID", inline = false;
    /// Host object.
    Object = 24 => "Object", inline = false;
    /// Callable.
    Callable = 25 => "Callable", inline = false;
    /// Signal.
    Signal = 26 => "Signal", inline = false;
    /// Ordered key/value map.
    Dictionary = 27 => "Dictionary", inline = false;
    /// Heterogeneous array.
    Array = 28 => "Array", inline = false;
    /// Packed `u8` array.
    PackedByteArray = 29 => "PackedByteArray", inline = false;
    /// Packed `i32` array.
    PackedInt32Array = 30 => "PackedInt32Array", inline = false;
    /// Packed `i64` array.
    PackedInt64Array = 31 => "PackedInt64Array", inline = false;
    /// Packed `f32` array.
    PackedFloat32Array = 32 => "PackedFloat32Array", inline = false;
    /// Packed `f64` array.
    PackedFloat64Array = 33 => "PackedFloat64Array", inline = false;
    /// Packed string array (not supported across the boundary).
    PackedStringArray = 34 => "PackedStringArray", inline = false;
    /// Packed [`Vector2`] array.
    PackedVector2Array = 35 => "PackedVector2Array", inline = false;
    /// Packed [`Vector3`] array.
    PackedVector3Array = 36 => "PackedVector3Array", inline = false;
    /// Packed [`Color`] array.
    PackedColorArray = 37 => "PackedColorArray", inline = false;
}

impl Kind {
    /// Returns the wire discriminant.
    #[inline]
    pub const fn wire(self) -> u32 {
        self as u32
    }

    /// Returns `true` for kinds that may be carried in a tagged value at all.
    ///
    /// Transforms, planes, quaternions, bounding boxes, bases, projections, RIDs and packed string
    /// arrays have no boundary representation.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        !matches!(
            self,
            Self::Transform2D
                | Self::Plane
                | Self::Quaternion
                | Self::Aabb
                | Self::Basis
                | Self::Transform3D
                | Self::Projection
                | Self::Rid
                | Self::PackedStringArray
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value as seen by the guest side of the boundary.
///
/// Complex kinds carry a registry [`Handle`]; the handle is only meaningful for the registry that
/// issued it.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum TaggedValue {
    /// No value.
    #[default]
    Nil,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// 2D float vector.
    Vector2(Vector2),
    /// 2D integer vector.
    Vector2i(Vector2i),
    /// Float rectangle.
    Rect2(Rect2),
    /// Integer rectangle.
    Rect2i(Rect2i),
    /// 3D float vector.
    Vector3(Vector3),
    /// 3D integer vector.
    Vector3i(Vector3i),
    /// 4D float vector.
    Vector4(Vector4),
    /// 4D integer vector.
    Vector4i(Vector4i),
    /// RGBA color.
    Color(Color),
    /// Text handle.
    String(Handle),
    /// Interned-name handle.
    StringName(Handle),
    /// Scene-path handle.
    NodePath(Handle),
    /// Host object handle.
    Object(Handle),
    /// Callable handle.
    Callable(Handle),
    /// Signal handle.
    Signal(Handle),
    /// Dictionary handle.
    Dictionary(Handle),
    /// Array handle.
    Array(Handle),
    /// Packed byte array handle.
    PackedByteArray(Handle),
    /// Packed `i32` array handle.
    PackedInt32Array(Handle),
    /// Packed `i64` array handle.
    PackedInt64Array(Handle),
    /// Packed `f32` array handle.
    PackedFloat32Array(Handle),
    /// Packed `f64` array handle.
    PackedFloat64Array(Handle),
    /// Packed [`Vector2`] array handle.
    PackedVector2Array(Handle),
    /// Packed [`Vector3`] array handle.
    PackedVector3Array(Handle),
    /// Packed [`Color`] array handle.
    PackedColorArray(Handle),
}

impl TaggedValue {
    /// Returns the kind of this value.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Nil => Kind::Nil,
            Self::Bool(_) => Kind::Bool,
            Self::Int(_) => Kind::Int,
            Self::Float(_) => Kind::Float,
            Self::Vector2(_) => Kind::Vector2,
            Self::Vector2i(_) => Kind::Vector2i,
            Self::Rect2(_) => Kind::Rect2,
            Self::Rect2i(_) => Kind::Rect2i,
            Self::Vector3(_) => Kind::Vector3,
            Self::Vector3i(_) => Kind::Vector3i,
            Self::Vector4(_) => Kind::Vector4,
            Self::Vector4i(_) => Kind::Vector4i,
            Self::Color(_) => Kind::Color,
            Self::String(_) => Kind::String,
            Self::StringName(_) => Kind::StringName,
            Self::NodePath(_) => Kind::NodePath,
            Self::Object(_) => Kind::Object,
            Self::Callable(_) => Kind::Callable,
            Self::Signal(_) => Kind::Signal,
            Self::Dictionary(_) => Kind::Dictionary,
            Self::Array(_) => Kind::Array,
            Self::PackedByteArray(_) => Kind::PackedByteArray,
            Self::PackedInt32Array(_) => Kind::PackedInt32Array,
            Self::PackedInt64Array(_) => Kind::PackedInt64Array,
            Self::PackedFloat32Array(_) => Kind::PackedFloat32Array,
            Self::PackedFloat64Array(_) => Kind::PackedFloat64Array,
            Self::PackedVector2Array(_) => Kind::PackedVector2Array,
            Self::PackedVector3Array(_) => Kind::PackedVector3Array,
            Self::PackedColorArray(_) => Kind::PackedColorArray,
        }
    }

    /// Returns the registry handle carried by a complex value.
    #[must_use]
    pub const fn handle(&self) -> Option<Handle> {
        match *self {
            Self::String(h)
            | Self::StringName(h)
            | Self::NodePath(h)
            | Self::Object(h)
            | Self::Callable(h)
            | Self::Signal(h)
            | Self::Dictionary(h)
            | Self::Array(h)
            | Self::PackedByteArray(h)
            | Self::PackedInt32Array(h)
            | Self::PackedInt64Array(h)
            | Self::PackedFloat32Array(h)
            | Self::PackedFloat64Array(h)
            | Self::PackedVector2Array(h)
            | Self::PackedVector3Array(h)
            | Self::PackedColorArray(h) => Some(h),
            _ => None,
        }
    }

    /// Builds a handle-carrying value of `kind`.
    ///
    /// Returns `None` when `kind` is inline or unsupported.
    #[must_use]
    pub const fn from_handle(kind: Kind, handle: Handle) -> Option<Self> {
        Some(match kind {
            Kind::String => Self::String(handle),
            Kind::StringName => Self::StringName(handle),
            Kind::NodePath => Self::NodePath(handle),
            Kind::Object => Self::Object(handle),
            Kind::Callable => Self::Callable(handle),
            Kind::Signal => Self::Signal(handle),
            Kind::Dictionary => Self::Dictionary(handle),
            Kind::Array => Self::Array(handle),
            Kind::PackedByteArray => Self::PackedByteArray(handle),
            Kind::PackedInt32Array => Self::PackedInt32Array(handle),
            Kind::PackedInt64Array => Self::PackedInt64Array(handle),
            Kind::PackedFloat32Array => Self::PackedFloat32Array(handle),
            Kind::PackedFloat64Array => Self::PackedFloat64Array(handle),
            Kind::PackedVector2Array => Self::PackedVector2Array(handle),
            Kind::PackedVector3Array => Self::PackedVector3Array(handle),
            Kind::PackedColorArray => Self::PackedColorArray(handle),
            _ => return None,
        })
    }

    /// Returns `true` for [`TaggedValue::Nil`].
    #[inline]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Integer view: integers as-is, floats truncated toward zero, booleans as 0/1.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            #[allow(clippy::cast_possible_truncation, reason = "float-to-int narrowing saturates")]
            Self::Float(v) => Some(v as i64),
            Self::Bool(v) => Some(i64::from(v)),
            _ => None,
        }
    }

    /// Narrowed integer view; the upper bits are dropped silently.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, reason = "narrowing truncates by contract")]
    pub fn to_i32(&self) -> Option<i32> {
        self.as_int().map(|v| v as i32)
    }

    /// Float view: floats as-is, integers converted.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Self::Float(v) => Some(v),
            #[allow(clippy::cast_precision_loss, reason = "integer arguments to float math")]
            Self::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    /// Truthiness: `Nil`, `false`, `0` and `0.0` are false; handles and other inline values are
    /// true unless they are all-zero aggregates.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match *self {
            Self::Nil => false,
            Self::Bool(v) => v,
            Self::Int(v) => v != 0,
            Self::Float(v) => v != 0.0,
            Self::Vector2(v) => v != Vector2::default(),
            Self::Vector2i(v) => v != Vector2i::default(),
            Self::Vector3(v) => v != Vector3::default(),
            Self::Vector3i(v) => v != Vector3i::default(),
            Self::Vector4(v) => v != Vector4::default(),
            Self::Vector4i(v) => v != Vector4i::default(),
            Self::Rect2(v) => v != Rect2::default(),
            Self::Rect2i(v) => v != Rect2i::default(),
            Self::Color(v) => v != Color::default(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_value_is_copy_and_small() {
        fn assert_copy<T: Copy>() {}
        assert_copy::<TaggedValue>();
        assert_eq!(core::mem::size_of::<TaggedValue>(), 24);
    }

    #[test]
    fn kind_wire_values_round_trip() {
        for &kind in Kind::ALL {
            assert_eq!(Kind::from_wire(kind.wire()), Some(kind));
        }
        assert_eq!(Kind::from_wire(38), None);
        assert_eq!(Kind::Object.wire(), 24);
        assert_eq!(Kind::PackedColorArray.wire(), 37);
    }

    #[test]
    fn inline_kinds_never_build_from_handles() {
        for &kind in Kind::ALL {
            let built = TaggedValue::from_handle(kind, Handle::new(3));
            if kind.is_inline() || !kind.is_supported() {
                assert_eq!(built, None, "{kind}");
            } else {
                let built = built.unwrap();
                assert_eq!(built.kind(), kind);
                assert_eq!(built.handle(), Some(Handle::new(3)));
            }
        }
    }

    #[test]
    fn numeric_views() {
        assert_eq!(TaggedValue::Float(-2.7).as_int(), Some(-2));
        assert_eq!(TaggedValue::Int(4).as_float(), Some(4.0));
        assert_eq!(TaggedValue::Nil.as_int(), None);
        assert_eq!(TaggedValue::Int(0x1_0000_0005).to_i32(), Some(5));
        assert!(!TaggedValue::Vector2(Vector2::default()).truthy());
        assert!(TaggedValue::Array(Handle::new(1)).truthy());
    }
}
