// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scoped resource registry.
//!
//! The registry is the only place where the guest's opaque [`Handle`]s meet host state. It keeps
//! two tables:
//!
//! - the *object table* maps handles to host [`ObjectId`]s. It is a weak index: the host owns the
//!   objects, the registry never extends their lifetime.
//! - the *value table* owns complex values (strings, arrays, dictionaries, callables, signals,
//!   packed arrays) created on behalf of the guest.
//!
//! Both tables draw from one monotonically increasing counter, so a handle is never valid in both
//! tables and is never reused while the registry is alive, not even after [`Registry::clear`].
//!
//! Multi-step updates are made atomic with [`Registry::mark`] / [`Registry::rollback`]: everything
//! allocated after a mark can be dropped again in one step.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;

use hashbrown::HashMap;

use crate::error::BridgeError;
use crate::math::{Color, Vector2, Vector3};
use crate::value::{Handle, Kind, ObjectId, TaggedValue};
use crate::variant::{Callable, Dictionary, Signal, Variant};

/// Nesting bound for structural comparison of containers.
const MAX_COMPARE_DEPTH: usize = 32;

/// A packed array of plain scalars or math aggregates.
#[derive(Clone, Debug, PartialEq)]
pub enum PackedArray {
    /// Bytes.
    Byte(Vec<u8>),
    /// `i32`s.
    Int32(Vec<i32>),
    /// `i64`s.
    Int64(Vec<i64>),
    /// `f32`s.
    Float32(Vec<f32>),
    /// `f64`s.
    Float64(Vec<f64>),
    /// 2D vectors.
    Vector2(Vec<Vector2>),
    /// 3D vectors.
    Vector3(Vec<Vector3>),
    /// Colors.
    Color(Vec<Color>),
}

impl PackedArray {
    /// Empty packed array of `kind`, or `None` if `kind` is not a packed kind.
    #[must_use]
    pub fn empty(kind: Kind) -> Option<Self> {
        Self::from_le_bytes(kind, &[])
    }

    /// Kind of this array.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Byte(_) => Kind::PackedByteArray,
            Self::Int32(_) => Kind::PackedInt32Array,
            Self::Int64(_) => Kind::PackedInt64Array,
            Self::Float32(_) => Kind::PackedFloat32Array,
            Self::Float64(_) => Kind::PackedFloat64Array,
            Self::Vector2(_) => Kind::PackedVector2Array,
            Self::Vector3(_) => Kind::PackedVector3Array,
            Self::Color(_) => Kind::PackedColorArray,
        }
    }

    /// Element count.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Byte(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Vector2(v) => v.len(),
            Self::Vector3(v) => v.len(),
            Self::Color(v) => v.len(),
        }
    }

    /// Returns `true` if there are no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size in bytes of one element of packed `kind`.
    #[must_use]
    pub const fn element_size(kind: Kind) -> Option<usize> {
        Some(match kind {
            Kind::PackedByteArray => 1,
            Kind::PackedInt32Array | Kind::PackedFloat32Array => 4,
            Kind::PackedInt64Array | Kind::PackedFloat64Array | Kind::PackedVector2Array => 8,
            Kind::PackedVector3Array => 12,
            Kind::PackedColorArray => 16,
            _ => return None,
        })
    }

    /// Decodes little-endian element data. A trailing partial element is ignored.
    #[must_use]
    pub fn from_le_bytes(kind: Kind, bytes: &[u8]) -> Option<Self> {
        let size = Self::element_size(kind)?;
        let chunks = bytes.chunks_exact(size);
        Some(match kind {
            Kind::PackedByteArray => Self::Byte(bytes.to_vec()),
            Kind::PackedInt32Array => {
                Self::Int32(chunks.map(|c| i32::from_le_bytes(le4(c))).collect())
            }
            Kind::PackedInt64Array => {
                Self::Int64(chunks.map(|c| i64::from_le_bytes(le8(c))).collect())
            }
            Kind::PackedFloat32Array => {
                Self::Float32(chunks.map(|c| f32::from_le_bytes(le4(c))).collect())
            }
            Kind::PackedFloat64Array => {
                Self::Float64(chunks.map(|c| f64::from_le_bytes(le8(c))).collect())
            }
            Kind::PackedVector2Array => Self::Vector2(
                chunks
                    .map(|c| Vector2::new(f32_at(c, 0), f32_at(c, 1)))
                    .collect(),
            ),
            Kind::PackedVector3Array => Self::Vector3(
                chunks
                    .map(|c| Vector3::new(f32_at(c, 0), f32_at(c, 1), f32_at(c, 2)))
                    .collect(),
            ),
            Kind::PackedColorArray => Self::Color(
                chunks
                    .map(|c| Color::new(f32_at(c, 0), f32_at(c, 1), f32_at(c, 2), f32_at(c, 3)))
                    .collect(),
            ),
            _ => return None,
        })
    }

    /// Encodes the first `count` elements as little-endian data.
    #[must_use]
    pub fn to_le_bytes(&self, count: usize) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Self::Byte(v) => out.extend(v.iter().take(count)),
            Self::Int32(v) => v.iter().take(count).for_each(|x| out.extend(x.to_le_bytes())),
            Self::Int64(v) => v.iter().take(count).for_each(|x| out.extend(x.to_le_bytes())),
            Self::Float32(v) => v.iter().take(count).for_each(|x| out.extend(x.to_le_bytes())),
            Self::Float64(v) => v.iter().take(count).for_each(|x| out.extend(x.to_le_bytes())),
            Self::Vector2(v) => v.iter().take(count).for_each(|p| {
                out.extend(p.x.to_le_bytes());
                out.extend(p.y.to_le_bytes());
            }),
            Self::Vector3(v) => v.iter().take(count).for_each(|p| {
                out.extend(p.x.to_le_bytes());
                out.extend(p.y.to_le_bytes());
                out.extend(p.z.to_le_bytes());
            }),
            Self::Color(v) => v.iter().take(count).for_each(|c| {
                for channel in [c.r, c.g, c.b, c.a] {
                    out.extend(channel.to_le_bytes());
                }
            }),
        }
        out
    }

    fn into_variant(self) -> Variant {
        match self {
            Self::Byte(v) => Variant::PackedByteArray(v),
            Self::Int32(v) => Variant::PackedInt32Array(v),
            Self::Int64(v) => Variant::PackedInt64Array(v),
            Self::Float32(v) => Variant::PackedFloat32Array(v),
            Self::Float64(v) => Variant::PackedFloat64Array(v),
            Self::Vector2(v) => Variant::PackedVector2Array(v),
            Self::Vector3(v) => Variant::PackedVector3Array(v),
            Self::Color(v) => Variant::PackedColorArray(v),
        }
    }
}

fn le4(c: &[u8]) -> [u8; 4] {
    [c[0], c[1], c[2], c[3]]
}

fn le8(c: &[u8]) -> [u8; 8] {
    [c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]
}

fn f32_at(c: &[u8], index: usize) -> f32 {
    f32::from_le_bytes(le4(&c[index * 4..]))
}

/// A value-table entry.
#[derive(Clone, Debug, PartialEq)]
pub enum ScopedValue {
    /// Text.
    String(String),
    /// Interned name.
    StringName(String),
    /// Scene path.
    NodePath(String),
    /// Array of tagged values; nested complex values are handles into the same registry.
    Array(Vec<TaggedValue>),
    /// Insertion-ordered dictionary of tagged values.
    Dictionary(Vec<(TaggedValue, TaggedValue)>),
    /// Callable.
    Callable(Callable),
    /// Signal.
    Signal(Signal),
    /// Packed array.
    Packed(PackedArray),
}

impl ScopedValue {
    /// Kind of this entry.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::String(_) => Kind::String,
            Self::StringName(_) => Kind::StringName,
            Self::NodePath(_) => Kind::NodePath,
            Self::Array(_) => Kind::Array,
            Self::Dictionary(_) => Kind::Dictionary,
            Self::Callable(_) => Kind::Callable,
            Self::Signal(_) => Kind::Signal,
            Self::Packed(p) => p.kind(),
        }
    }
}

/// Result of [`Registry::resolve`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Resolved<'a> {
    /// An object-table entry.
    Object(ObjectId),
    /// A value-table entry.
    Value(&'a ScopedValue),
}

/// A point in the registry's allocation history, see [`Registry::rollback`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegistryMark(u32);

/// Handle tables of one sandbox.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    objects: BTreeMap<Handle, ObjectId>,
    object_index: HashMap<ObjectId, Handle>,
    values: BTreeMap<Handle, ScopedValue>,
    // Last issued handle; 0 before the first allocation.
    last: u32,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> Result<Handle, BridgeError> {
        let next = self
            .last
            .checked_add(1)
            .ok_or(BridgeError::HandleSpaceExhausted)?;
        self.last = next;
        Ok(Handle::new(next))
    }

    /// Exposes a host object, returning its handle.
    ///
    /// Idempotent: exposing the same object again returns the same handle.
    pub fn expose_object(&mut self, object: ObjectId) -> Result<Handle, BridgeError> {
        if let Some(&handle) = self.object_index.get(&object) {
            return Ok(handle);
        }
        let handle = self.allocate()?;
        self.objects.insert(handle, object);
        self.object_index.insert(object, handle);
        Ok(handle)
    }

    /// Handle of an already exposed object.
    #[must_use]
    pub fn object_handle(&self, object: ObjectId) -> Option<Handle> {
        self.object_index.get(&object).copied()
    }

    /// Returns `true` if `object` has been exposed.
    #[must_use]
    pub fn is_exposed(&self, object: ObjectId) -> bool {
        self.object_index.contains_key(&object)
    }

    /// Stores a complex value, returning its new handle.
    pub fn store(&mut self, value: ScopedValue) -> Result<Handle, BridgeError> {
        let handle = self.allocate()?;
        self.values.insert(handle, value);
        Ok(handle)
    }

    /// Looks `handle` up in either table.
    pub fn resolve(&self, handle: Handle) -> Result<Resolved<'_>, BridgeError> {
        if let Some(&object) = self.objects.get(&handle) {
            return Ok(Resolved::Object(object));
        }
        self.values
            .get(&handle)
            .map(Resolved::Value)
            .ok_or_else(|| unknown(handle))
    }

    /// Object behind an object handle.
    pub fn object(&self, handle: Handle) -> Result<ObjectId, BridgeError> {
        match self.resolve(handle)? {
            Resolved::Object(object) => Ok(object),
            Resolved::Value(entry) => Err(BridgeError::type_mismatch("Object", entry.kind())),
        }
    }

    /// Value-table entry behind `handle`.
    pub fn value(&self, handle: Handle) -> Result<&ScopedValue, BridgeError> {
        match self.resolve(handle)? {
            Resolved::Value(entry) => Ok(entry),
            Resolved::Object(_) => Err(BridgeError::type_mismatch("a value", Kind::Object)),
        }
    }

    /// Mutable value-table entry behind `handle`.
    pub fn value_mut(&mut self, handle: Handle) -> Result<&mut ScopedValue, BridgeError> {
        if self.objects.contains_key(&handle) {
            return Err(BridgeError::type_mismatch("a value", Kind::Object));
        }
        self.values.get_mut(&handle).ok_or_else(|| unknown(handle))
    }

    /// Tagged value for `handle`, using the kind of the entry it resolves to.
    pub fn tagged(&self, handle: Handle) -> Result<TaggedValue, BridgeError> {
        let kind = match self.resolve(handle)? {
            Resolved::Object(_) => Kind::Object,
            Resolved::Value(entry) => entry.kind(),
        };
        TaggedValue::from_handle(kind, handle).ok_or(BridgeError::Unsupported("handle kind"))
    }

    /// Tagged value for `handle`, requiring its entry to be of `kind`.
    pub fn tagged_as(&self, kind: Kind, handle: Handle) -> Result<TaggedValue, BridgeError> {
        let value = self.tagged(handle)?;
        if value.kind() != kind {
            return Err(BridgeError::type_mismatch(kind.name(), value.kind()));
        }
        Ok(value)
    }

    /// Releases a value-table entry.
    ///
    /// Object handles cannot be released (objects are host-owned). Releasing a container does not
    /// release the handles it contains.
    pub fn release(&mut self, handle: Handle) -> Result<(), BridgeError> {
        if self.values.remove(&handle).is_some() {
            return Ok(());
        }
        if self.objects.contains_key(&handle) {
            return Err(BridgeError::Unsupported("releasing a host object"));
        }
        Err(unknown(handle))
    }

    /// Copies a value-table entry into a new handle. Nested handles are shared, not copied.
    pub fn duplicate(&mut self, handle: Handle) -> Result<Handle, BridgeError> {
        let copy = self.value(handle)?.clone();
        self.store(copy)
    }

    /// Drops every entry. Handles issued before are never issued again.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.object_index.clear();
        self.values.clear();
    }

    /// Number of object-table entries.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of value-table entries.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when both tables are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.values.is_empty()
    }

    /// Records the current allocation point.
    #[must_use]
    pub fn mark(&self) -> RegistryMark {
        RegistryMark(self.last)
    }

    /// Removes every entry allocated after `mark`.
    ///
    /// In-place mutations of older entries are not undone.
    pub fn rollback(&mut self, mark: RegistryMark) {
        let Some(first) = mark.0.checked_add(1) else {
            return;
        };
        let first = Handle::new(first);
        drop(self.values.split_off(&first));
        for object in self.objects.split_off(&first).into_values() {
            self.object_index.remove(&object);
        }
    }

    /// Array entry.
    pub fn array(&self, handle: Handle) -> Result<&[TaggedValue], BridgeError> {
        match self.value(handle)? {
            ScopedValue::Array(items) => Ok(items),
            other => Err(BridgeError::type_mismatch("Array", other.kind())),
        }
    }

    /// Mutable array entry.
    pub fn array_mut(&mut self, handle: Handle) -> Result<&mut Vec<TaggedValue>, BridgeError> {
        match self.value_mut(handle)? {
            ScopedValue::Array(items) => Ok(items),
            other => Err(BridgeError::type_mismatch("Array", other.kind())),
        }
    }

    /// Dictionary entry.
    pub fn dictionary(&self, handle: Handle) -> Result<&[(TaggedValue, TaggedValue)], BridgeError> {
        match self.value(handle)? {
            ScopedValue::Dictionary(entries) => Ok(entries),
            other => Err(BridgeError::type_mismatch("Dictionary", other.kind())),
        }
    }

    /// Mutable dictionary entry.
    pub fn dictionary_mut(
        &mut self,
        handle: Handle,
    ) -> Result<&mut Vec<(TaggedValue, TaggedValue)>, BridgeError> {
        match self.value_mut(handle)? {
            ScopedValue::Dictionary(entries) => Ok(entries),
            other => Err(BridgeError::type_mismatch("Dictionary", other.kind())),
        }
    }

    /// Text of a string, string-name or node-path entry.
    pub fn text(&self, handle: Handle) -> Result<&str, BridgeError> {
        match self.value(handle)? {
            ScopedValue::String(s) | ScopedValue::StringName(s) | ScopedValue::NodePath(s) => Ok(s),
            other => Err(BridgeError::type_mismatch("String", other.kind())),
        }
    }

    /// Mutable text of a string, string-name or node-path entry.
    pub fn text_mut(&mut self, handle: Handle) -> Result<&mut String, BridgeError> {
        match self.value_mut(handle)? {
            ScopedValue::String(s) | ScopedValue::StringName(s) | ScopedValue::NodePath(s) => Ok(s),
            other => Err(BridgeError::type_mismatch("String", other.kind())),
        }
    }

    /// Packed array entry.
    pub fn packed(&self, handle: Handle) -> Result<&PackedArray, BridgeError> {
        match self.value(handle)? {
            ScopedValue::Packed(p) => Ok(p),
            other => Err(BridgeError::type_mismatch("a packed array", other.kind())),
        }
    }

    /// Mutable packed array entry.
    pub fn packed_mut(&mut self, handle: Handle) -> Result<&mut PackedArray, BridgeError> {
        match self.value_mut(handle)? {
            ScopedValue::Packed(p) => Ok(p),
            other => Err(BridgeError::type_mismatch("a packed array", other.kind())),
        }
    }

    /// Deep-converts a host value, storing complex parts and exposing objects.
    ///
    /// `gate` is consulted before any object is exposed; if it or any allocation fails, nothing
    /// allocated by this call remains.
    pub fn intern<G>(&mut self, value: Variant, mut gate: G) -> Result<TaggedValue, BridgeError>
    where
        G: FnMut(&Self, ObjectId) -> Result<(), BridgeError>,
    {
        let mark = self.mark();
        let interned = self.intern_inner(value, &mut gate);
        if interned.is_err() {
            self.rollback(mark);
        }
        interned
    }

    fn intern_inner<G>(&mut self, value: Variant, gate: &mut G) -> Result<TaggedValue, BridgeError>
    where
        G: FnMut(&Self, ObjectId) -> Result<(), BridgeError>,
    {
        Ok(match value {
            Variant::Nil => TaggedValue::Nil,
            Variant::Bool(v) => TaggedValue::Bool(v),
            Variant::Int(v) => TaggedValue::Int(v),
            Variant::Float(v) => TaggedValue::Float(v),
            Variant::Vector2(v) => TaggedValue::Vector2(v),
            Variant::Vector2i(v) => TaggedValue::Vector2i(v),
            Variant::Rect2(v) => TaggedValue::Rect2(v),
            Variant::Rect2i(v) => TaggedValue::Rect2i(v),
            Variant::Vector3(v) => TaggedValue::Vector3(v),
            Variant::Vector3i(v) => TaggedValue::Vector3i(v),
            Variant::Vector4(v) => TaggedValue::Vector4(v),
            Variant::Vector4i(v) => TaggedValue::Vector4i(v),
            Variant::Color(v) => TaggedValue::Color(v),
            Variant::String(s) => TaggedValue::String(self.store(ScopedValue::String(s))?),
            Variant::StringName(s) => {
                TaggedValue::StringName(self.store(ScopedValue::StringName(s))?)
            }
            Variant::NodePath(s) => TaggedValue::NodePath(self.store(ScopedValue::NodePath(s))?),
            Variant::Object(object) => {
                gate(self, object)?;
                TaggedValue::Object(self.expose_object(object)?)
            }
            Variant::Callable(c) => TaggedValue::Callable(self.store(ScopedValue::Callable(c))?),
            Variant::Signal(s) => TaggedValue::Signal(self.store(ScopedValue::Signal(s))?),
            Variant::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.intern_inner(item, gate)?);
                }
                TaggedValue::Array(self.store(ScopedValue::Array(out))?)
            }
            Variant::Dictionary(dict) => {
                let mut out = Vec::with_capacity(dict.len());
                for (k, v) in dict {
                    let k = self.intern_inner(k, gate)?;
                    let v = self.intern_inner(v, gate)?;
                    out.push((k, v));
                }
                TaggedValue::Dictionary(self.store(ScopedValue::Dictionary(out))?)
            }
            Variant::PackedByteArray(v) => self.store_packed(PackedArray::Byte(v))?,
            Variant::PackedInt32Array(v) => self.store_packed(PackedArray::Int32(v))?,
            Variant::PackedInt64Array(v) => self.store_packed(PackedArray::Int64(v))?,
            Variant::PackedFloat32Array(v) => self.store_packed(PackedArray::Float32(v))?,
            Variant::PackedFloat64Array(v) => self.store_packed(PackedArray::Float64(v))?,
            Variant::PackedVector2Array(v) => self.store_packed(PackedArray::Vector2(v))?,
            Variant::PackedVector3Array(v) => self.store_packed(PackedArray::Vector3(v))?,
            Variant::PackedColorArray(v) => self.store_packed(PackedArray::Color(v))?,
        })
    }

    fn store_packed(&mut self, packed: PackedArray) -> Result<TaggedValue, BridgeError> {
        let kind = packed.kind();
        let handle = self.store(ScopedValue::Packed(packed))?;
        TaggedValue::from_handle(kind, handle).ok_or(BridgeError::Unsupported("packed kind"))
    }

    /// Deep-converts a tagged value back into a host value.
    ///
    /// Containers nested deeper than `max_depth` (including self-containing ones) fail with
    /// [`BridgeError::LimitExceeded`].
    pub fn materialize(
        &self,
        value: TaggedValue,
        max_depth: usize,
    ) -> Result<Variant, BridgeError> {
        self.materialize_at(value, max_depth, 0)
    }

    fn materialize_at(
        &self,
        value: TaggedValue,
        max_depth: usize,
        depth: usize,
    ) -> Result<Variant, BridgeError> {
        if depth > max_depth {
            return Err(BridgeError::LimitExceeded {
                what: "value nesting depth",
                limit: max_depth,
            });
        }
        if let Some(inline) = inline_variant(value) {
            return Ok(inline);
        }
        if let TaggedValue::Object(handle) = value {
            return Ok(Variant::Object(self.object(handle)?));
        }
        let handle = value
            .handle()
            .ok_or(BridgeError::Unsupported("value kind"))?;
        Ok(match self.value(handle)? {
            ScopedValue::String(s) => Variant::String(s.clone()),
            ScopedValue::StringName(s) => Variant::StringName(s.clone()),
            ScopedValue::NodePath(s) => Variant::NodePath(s.clone()),
            ScopedValue::Callable(c) => Variant::Callable(c.clone()),
            ScopedValue::Signal(s) => Variant::Signal(s.clone()),
            ScopedValue::Packed(p) => p.clone().into_variant(),
            ScopedValue::Array(items) => Variant::Array(
                items
                    .iter()
                    .map(|item| self.materialize_at(*item, max_depth, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            ScopedValue::Dictionary(entries) => {
                let mut dict = Dictionary::new();
                for (k, v) in entries {
                    dict.insert(
                        self.materialize_at(*k, max_depth, depth + 1)?,
                        self.materialize_at(*v, max_depth, depth + 1)?,
                    );
                }
                Variant::Dictionary(dict)
            }
        })
    }

    /// Structural equality.
    ///
    /// Integers and floats compare numerically; string-like kinds compare by text; objects by
    /// identity; containers element-wise.
    #[must_use]
    pub fn values_equal(&self, a: &TaggedValue, b: &TaggedValue) -> bool {
        self.equal_at(a, b, 0)
    }

    fn equal_at(&self, a: &TaggedValue, b: &TaggedValue, depth: usize) -> bool {
        if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
            return x == y;
        }
        let (Some(ha), Some(hb)) = (a.handle(), b.handle()) else {
            return a == b;
        };
        if ha == hb {
            return true;
        }
        if depth >= MAX_COMPARE_DEPTH {
            return false;
        }
        if let (Ok(x), Ok(y)) = (self.text(ha), self.text(hb)) {
            return x == y;
        }
        if a.kind() != b.kind() {
            return false;
        }
        match (self.value(ha), self.value(hb)) {
            (Ok(ScopedValue::Array(x)), Ok(ScopedValue::Array(y))) => {
                x.len() == y.len()
                    && x.iter()
                        .zip(y)
                        .all(|(p, q)| self.equal_at(p, q, depth + 1))
            }
            (Ok(ScopedValue::Dictionary(x)), Ok(ScopedValue::Dictionary(y))) => {
                x.len() == y.len()
                    && x.iter().all(|(k, v)| {
                        y.iter().any(|(k2, v2)| {
                            self.equal_at(k, k2, depth + 1) && self.equal_at(v, v2, depth + 1)
                        })
                    })
            }
            (Ok(x), Ok(y)) => x == y,
            _ => false,
        }
    }

    /// Total order used for sorting: nil, bools, numbers, text, then everything else by kind and
    /// handle.
    #[must_use]
    pub fn compare(&self, a: &TaggedValue, b: &TaggedValue) -> Ordering {
        let rank = |v: &TaggedValue| -> u8 {
            match v {
                TaggedValue::Nil => 0,
                TaggedValue::Bool(_) => 1,
                TaggedValue::Int(_) | TaggedValue::Float(_) => 2,
                TaggedValue::String(_) | TaggedValue::StringName(_) | TaggedValue::NodePath(_) => 3,
                _ => 4,
            }
        };
        rank(a).cmp(&rank(b)).then_with(|| match (a, b) {
            (TaggedValue::Bool(x), TaggedValue::Bool(y)) => x.cmp(y),
            _ => {
                if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
                    return x.total_cmp(&y);
                }
                if let (Some(x), Some(y)) = (
                    a.handle().and_then(|h| self.text(h).ok()),
                    b.handle().and_then(|h| self.text(h).ok()),
                ) {
                    return x.cmp(y);
                }
                a.kind()
                    .cmp(&b.kind())
                    .then_with(|| a.handle().cmp(&b.handle()))
            }
        })
    }

    /// Position of `key` in a dictionary entry.
    pub fn dictionary_position(
        &self,
        handle: Handle,
        key: &TaggedValue,
    ) -> Result<Option<usize>, BridgeError> {
        Ok(self
            .dictionary(handle)?
            .iter()
            .position(|(k, _)| self.values_equal(k, key)))
    }
}

fn unknown(handle: Handle) -> BridgeError {
    BridgeError::UnknownHandle(u64::from(handle.as_u32()))
}

fn numeric(value: &TaggedValue) -> Option<f64> {
    match value {
        TaggedValue::Int(_) | TaggedValue::Float(_) => value.as_float(),
        _ => None,
    }
}

/// Host form of an inline tagged value.
pub(crate) fn inline_variant(value: TaggedValue) -> Option<Variant> {
    Some(match value {
        TaggedValue::Nil => Variant::Nil,
        TaggedValue::Bool(v) => Variant::Bool(v),
        TaggedValue::Int(v) => Variant::Int(v),
        TaggedValue::Float(v) => Variant::Float(v),
        TaggedValue::Vector2(v) => Variant::Vector2(v),
        TaggedValue::Vector2i(v) => Variant::Vector2i(v),
        TaggedValue::Rect2(v) => Variant::Rect2(v),
        TaggedValue::Rect2i(v) => Variant::Rect2i(v),
        TaggedValue::Vector3(v) => Variant::Vector3(v),
        TaggedValue::Vector3i(v) => Variant::Vector3i(v),
        TaggedValue::Vector4(v) => Variant::Vector4(v),
        TaggedValue::Vector4i(v) => Variant::Vector4i(v),
        TaggedValue::Color(v) => Variant::Color(v),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn allow_all(_: &Registry, _: ObjectId) -> Result<(), BridgeError> {
        Ok(())
    }

    #[test]
    fn exposing_twice_yields_the_same_handle() {
        let mut registry = Registry::new();
        let a = registry.expose_object(ObjectId::new(5)).unwrap();
        let b = registry.expose_object(ObjectId::new(5)).unwrap();
        assert_eq!(a, b);
        assert_eq!(registry.object_count(), 1);
        assert_ne!(a.as_u32(), 0);
    }

    #[test]
    fn tables_share_one_counter() {
        let mut registry = Registry::new();
        let value = registry.store(ScopedValue::Array(vec![])).unwrap();
        let object = registry.expose_object(ObjectId::new(1)).unwrap();
        assert_ne!(value, object);
        assert!(matches!(registry.resolve(value), Ok(Resolved::Value(_))));
        assert!(matches!(registry.resolve(object), Ok(Resolved::Object(_))));
        assert!(matches!(
            registry.object(value),
            Err(BridgeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn handles_are_not_reused_after_release_or_clear() {
        let mut registry = Registry::new();
        let first = registry.store(ScopedValue::String("a".into())).unwrap();
        registry.release(first).unwrap();
        let second = registry.store(ScopedValue::String("b".into())).unwrap();
        assert!(second > first);
        registry.clear();
        let third = registry.store(ScopedValue::String("c".into())).unwrap();
        assert!(third > second);
        assert_eq!(
            registry.resolve(first),
            Err(BridgeError::UnknownHandle(u64::from(first.as_u32())))
        );
    }

    #[test]
    fn release_rules() {
        let mut registry = Registry::new();
        let object = registry.expose_object(ObjectId::new(3)).unwrap();
        assert_eq!(
            registry.release(object),
            Err(BridgeError::Unsupported("releasing a host object"))
        );
        assert_eq!(
            registry.release(Handle::new(40)),
            Err(BridgeError::UnknownHandle(40))
        );
    }

    #[test]
    fn rollback_removes_everything_after_the_mark() {
        let mut registry = Registry::new();
        let kept = registry.store(ScopedValue::Array(vec![])).unwrap();
        let mark = registry.mark();
        let obj = registry.expose_object(ObjectId::new(9)).unwrap();
        registry.store(ScopedValue::String("x".into())).unwrap();
        registry.rollback(mark);
        assert_eq!(registry.value_count(), 1);
        assert_eq!(registry.object_count(), 0);
        assert!(!registry.is_exposed(ObjectId::new(9)));
        assert!(registry.array(kept).is_ok());
        // Re-exposing after rollback issues a fresh handle.
        assert_ne!(registry.expose_object(ObjectId::new(9)).unwrap(), obj);
    }

    #[test]
    fn intern_and_materialize_nested_values() {
        let mut registry = Registry::new();
        let mut dict = Dictionary::new();
        dict.insert(Variant::from("pos"), Variant::from(Vector2::new(1.0, 2.0)));
        dict.insert(Variant::Int(1), Variant::Object(ObjectId::new(4)));
        let value = Variant::Array(vec![
            Variant::from("a"),
            Variant::Dictionary(dict),
            Variant::PackedInt32Array(vec![1, 2, 3]),
        ]);
        let tagged = registry.intern(value.clone(), allow_all).unwrap();
        assert_eq!(tagged.kind(), Kind::Array);
        assert!(registry.is_exposed(ObjectId::new(4)));
        assert_eq!(registry.materialize(tagged, 8).unwrap(), value);
    }

    #[test]
    fn rejected_gate_leaves_no_trace() {
        let mut registry = Registry::new();
        let value = Variant::Array(vec![
            Variant::from("first"),
            Variant::Object(ObjectId::new(12)),
        ]);
        let err = registry
            .intern(value, |_, object| {
                Err(BridgeError::AccessDenied {
                    object: Some(object),
                })
            })
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::AccessDenied {
                object: Some(ObjectId::new(12))
            }
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn self_containing_arrays_hit_the_depth_limit() {
        let mut registry = Registry::new();
        let handle = registry.store(ScopedValue::Array(vec![])).unwrap();
        registry
            .array_mut(handle)
            .unwrap()
            .push(TaggedValue::Array(handle));
        let err = registry.materialize(TaggedValue::Array(handle), 4).unwrap_err();
        assert_eq!(
            err,
            BridgeError::LimitExceeded {
                what: "value nesting depth",
                limit: 4
            }
        );
    }

    #[test]
    fn structural_equality_and_order() {
        let mut registry = Registry::new();
        let a = registry.store(ScopedValue::String("abc".into())).unwrap();
        let b = registry.store(ScopedValue::StringName("abc".into())).unwrap();
        let c = registry.store(ScopedValue::String("abd".into())).unwrap();
        assert!(registry.values_equal(&TaggedValue::String(a), &TaggedValue::StringName(b)));
        assert!(registry.values_equal(&TaggedValue::Int(2), &TaggedValue::Float(2.0)));
        assert_eq!(
            registry.compare(&TaggedValue::String(a), &TaggedValue::String(c)),
            Ordering::Less
        );
        assert_eq!(
            registry.compare(&TaggedValue::Int(10), &TaggedValue::Nil),
            Ordering::Greater
        );
    }

    #[test]
    fn typed_accessors_report_the_entry_kind() {
        let mut registry = Registry::new();
        let dict = registry.store(ScopedValue::Dictionary(vec![])).unwrap();
        assert_eq!(
            registry.array(dict).unwrap_err(),
            BridgeError::TypeMismatch {
                expected: "Array",
                found: Kind::Dictionary.wire()
            }
        );
    }

    #[test]
    fn packed_bytes_round_trip() {
        let packed = PackedArray::Vector2(vec![Vector2::new(1.0, 2.0), Vector2::new(3.0, 4.0)]);
        let bytes = packed.to_le_bytes(usize::MAX);
        assert_eq!(bytes.len(), 16);
        assert_eq!(
            PackedArray::from_le_bytes(Kind::PackedVector2Array, &bytes),
            Some(packed)
        );
        assert_eq!(PackedArray::from_le_bytes(Kind::Array, &bytes), None);
    }
}
