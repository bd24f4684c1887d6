// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host-owned values.
//!
//! A [`Variant`] owns its contents outright (strings, nested arrays, dictionaries) and refers to
//! host objects by [`ObjectId`]. It is what the host passes into guest calls and what it receives
//! back; the registry converts between variants and [`TaggedValue`](crate::value::TaggedValue)s.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::call::GuestCallable;
use crate::math::{Color, Rect2, Rect2i, Vector2, Vector2i, Vector3, Vector3i, Vector4, Vector4i};
use crate::value::{Kind, ObjectId};

/// Something invocable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Callable {
    /// A method bound to a host object.
    Method {
        /// Receiver.
        object: ObjectId,
        /// Method name.
        method: String,
    },
    /// A function inside a guest program.
    Guest(GuestCallable),
}

/// A named signal on a host object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signal {
    /// Emitting object.
    pub object: ObjectId,
    /// Signal name.
    pub name: String,
}

/// Insertion-ordered key/value map.
///
/// Lookups compare keys structurally; containers are expected to stay small.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dictionary {
    entries: Vec<(Variant, Variant)>,
}

impl Dictionary {
    /// Creates an empty dictionary.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up `key`.
    pub fn get(&self, key: &Variant) -> Option<&Variant> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Inserts or replaces `key`, returning the previous value.
    pub fn insert(&mut self, key: Variant, value: Variant) -> Option<Variant> {
        if let Some((_, slot)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            return Some(core::mem::replace(slot, value));
        }
        self.entries.push((key, value));
        None
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &Variant) -> Option<Variant> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Variant, &Variant)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl FromIterator<(Variant, Variant)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (Variant, Variant)>>(iter: I) -> Self {
        let mut dict = Self::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}

impl IntoIterator for Dictionary {
    type Item = (Variant, Variant);
    type IntoIter = alloc::vec::IntoIter<(Variant, Variant)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A host-owned value.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Variant {
    /// No value.
    #[default]
    Nil,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Text.
    String(String),
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
    /// Interned name.
    StringName(String),
    /// Scene path.
    NodePath(String),
    /// Host object reference.
    Object(ObjectId),
    /// Callable.
    Callable(Callable),
    /// Signal.
    Signal(Signal),
    /// Dictionary.
    Dictionary(Dictionary),
    /// Array.
    Array(Vec<Variant>),
    /// Packed bytes.
    PackedByteArray(Vec<u8>),
    /// Packed `i32`s.
    PackedInt32Array(Vec<i32>),
    /// Packed `i64`s.
    PackedInt64Array(Vec<i64>),
    /// Packed `f32`s.
    PackedFloat32Array(Vec<f32>),
    /// Packed `f64`s.
    PackedFloat64Array(Vec<f64>),
    /// Packed [`Vector2`]s.
    PackedVector2Array(Vec<Vector2>),
    /// Packed [`Vector3`]s.
    PackedVector3Array(Vec<Vector3>),
    /// Packed [`Color`]s.
    PackedColorArray(Vec<Color>),
}

impl Variant {
    /// Returns the kind of this value.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Nil => Kind::Nil,
            Self::Bool(_) => Kind::Bool,
            Self::Int(_) => Kind::Int,
            Self::Float(_) => Kind::Float,
            Self::String(_) => Kind::String,
            Self::Vector2(_) => Kind::Vector2,
            Self::Vector2i(_) => Kind::Vector2i,
            Self::Rect2(_) => Kind::Rect2,
            Self::Rect2i(_) => Kind::Rect2i,
            Self::Vector3(_) => Kind::Vector3,
            Self::Vector3i(_) => Kind::Vector3i,
            Self::Vector4(_) => Kind::Vector4,
            Self::Vector4i(_) => Kind::Vector4i,
            Self::Color(_) => Kind::Color,
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

    /// Text view of string-like values.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::StringName(s) | Self::NodePath(s) => Some(s),
            _ => None,
        }
    }

    /// Object view.
    #[must_use]
    pub const fn as_object(&self) -> Option<ObjectId> {
        match *self {
            Self::Object(id) => Some(id),
            _ => None,
        }
    }

    /// Integer view: integers as-is, floats truncated toward zero.
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
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Self::String(String::from(v))
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<ObjectId> for Variant {
    fn from(v: ObjectId) -> Self {
        Self::Object(v)
    }
}

impl From<Vector2> for Variant {
    fn from(v: Vector2) -> Self {
        Self::Vector2(v)
    }
}

impl From<Vector3> for Variant {
    fn from(v: Vector3) -> Self {
        Self::Vector3(v)
    }
}

impl From<Vec<Self>> for Variant {
    fn from(v: Vec<Self>) -> Self {
        Self::Array(v)
    }
}

impl From<Dictionary> for Variant {
    fn from(v: Dictionary) -> Self {
        Self::Dictionary(v)
    }
}

fn write_list<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: impl IntoIterator<Item = T>,
) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("]")
}

impl fmt::Display for Vector2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl fmt::Display for Vector2i {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl fmt::Display for Vector3i {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl fmt::Display for Vector4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x, self.y, self.z, self.w)
    }
}

impl fmt::Display for Vector4i {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x, self.y, self.z, self.w)
    }
}

impl fmt::Display for Rect2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[P: {}, S: {}]", self.position, self.size)
    }
}

impl fmt::Display for Rect2i {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[P: {}, S: {}]", self.position, self.size)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method { object, method } => write!(f, "<{object}>::{method}"),
            Self::Guest(callable) => write!(f, "<guest function {:#x}>", callable.address()),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("<null>"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) | Self::StringName(s) | Self::NodePath(s) => f.write_str(s),
            Self::Vector2(v) => write!(f, "{v}"),
            Self::Vector2i(v) => write!(f, "{v}"),
            Self::Rect2(v) => write!(f, "{v}"),
            Self::Rect2i(v) => write!(f, "{v}"),
            Self::Vector3(v) => write!(f, "{v}"),
            Self::Vector3i(v) => write!(f, "{v}"),
            Self::Vector4(v) => write!(f, "{v}"),
            Self::Vector4i(v) => write!(f, "{v}"),
            Self::Color(v) => write!(f, "{v}"),
            Self::Object(id) => write!(f, "<{id}>"),
            Self::Callable(c) => write!(f, "{c}"),
            Self::Signal(s) => write!(f, "<{}>::[signal]{}", s.object, s.name),
            Self::Dictionary(d) => {
                if d.is_empty() {
                    return f.write_str("{  }");
                }
                f.write_str("{ ")?;
                for (i, (k, v)) in d.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str(" }")
            }
            Self::Array(items) => write_list(f, items),
            Self::PackedByteArray(items) => write_list(f, items),
            Self::PackedInt32Array(items) => write_list(f, items),
            Self::PackedInt64Array(items) => write_list(f, items),
            Self::PackedFloat32Array(items) => write_list(f, items),
            Self::PackedFloat64Array(items) => write_list(f, items),
            Self::PackedVector2Array(items) => write_list(f, items),
            Self::PackedVector3Array(items) => write_list(f, items),
            Self::PackedColorArray(items) => write_list(f, items),
        }
    }
}
