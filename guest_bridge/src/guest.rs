// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Guest-side value layout.
//!
//! A [`GuestVariant`] is the exact 24-byte mirror of a tagged value in guest memory:
//!
//! | offset | size | contents |
//! |---|---|---|
//! | 0 | 4 | kind discriminant, little-endian `u32` |
//! | 4 | 4 | zero |
//! | 8 | 16 | payload |
//!
//! Payloads hold guest-width scalars only: a bool in byte 0, `i64`/`f64` little-endian, vector,
//! rect and color components as consecutive little-endian `f32`/`i32`, and handles as a
//! zero-extended `u64`. A guest variant never carries a host address.

use alloc::vec::Vec;

use crate::error::BridgeError;
use crate::machine::{GuestAddr, GuestMemory};
use crate::math::{Color, Rect2, Rect2i, Vector2, Vector2i, Vector3, Vector3i, Vector4, Vector4i};
use crate::registry::Registry;
use crate::value::{Handle, Kind, TaggedValue};

/// Size of one guest variant in guest memory.
pub const GUEST_VARIANT_SIZE: usize = 24;

const PAYLOAD_OFFSET: usize = 8;

/// A tagged value as laid out in guest memory.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GuestVariant {
    kind: u32,
    payload: [u8; 16],
}

impl GuestVariant {
    /// The nil value.
    pub const NIL: Self = Self {
        kind: 0,
        payload: [0; 16],
    };

    /// Builds a guest variant from raw parts.
    #[inline]
    pub const fn from_raw(kind: u32, payload: [u8; 16]) -> Self {
        Self { kind, payload }
    }

    /// Raw kind discriminant.
    #[inline]
    pub const fn kind_raw(&self) -> u32 {
        self.kind
    }

    /// Raw payload bytes.
    #[inline]
    pub const fn payload(&self) -> &[u8; 16] {
        &self.payload
    }

    /// Decodes the guest memory image.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; GUEST_VARIANT_SIZE]) -> Self {
        let mut kind = [0_u8; 4];
        kind.copy_from_slice(&bytes[..4]);
        let mut payload = [0_u8; 16];
        payload.copy_from_slice(&bytes[PAYLOAD_OFFSET..]);
        Self {
            kind: u32::from_le_bytes(kind),
            payload,
        }
    }

    /// Encodes the guest memory image.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; GUEST_VARIANT_SIZE] {
        let mut out = [0_u8; GUEST_VARIANT_SIZE];
        out[..4].copy_from_slice(&self.kind.to_le_bytes());
        out[PAYLOAD_OFFSET..].copy_from_slice(&self.payload);
        out
    }

    /// Integer guest variant.
    #[must_use]
    pub fn int(value: i64) -> Self {
        Self::lower(TaggedValue::Int(value))
    }

    /// Float guest variant.
    #[must_use]
    pub fn float(value: f64) -> Self {
        Self::lower(TaggedValue::Float(value))
    }

    /// Handle-carrying guest variant with an arbitrary kind tag.
    #[must_use]
    pub fn with_handle(kind: Kind, handle: Handle) -> Self {
        let mut payload = [0_u8; 16];
        payload[..8].copy_from_slice(&u64::from(handle.as_u32()).to_le_bytes());
        Self {
            kind: kind.wire(),
            payload,
        }
    }

    /// Lowers a tagged value. This is a pure bit copy and never fails.
    #[must_use]
    pub fn lower(value: TaggedValue) -> Self {
        let mut payload = [0_u8; 16];
        match value {
            TaggedValue::Nil => {}
            TaggedValue::Bool(v) => payload[0] = u8::from(v),
            TaggedValue::Int(v) => payload[..8].copy_from_slice(&v.to_le_bytes()),
            TaggedValue::Float(v) => payload[..8].copy_from_slice(&v.to_le_bytes()),
            TaggedValue::Vector2(v) => put_f32s(&mut payload, &[v.x, v.y]),
            TaggedValue::Vector2i(v) => put_i32s(&mut payload, &[v.x, v.y]),
            TaggedValue::Rect2(r) => put_f32s(
                &mut payload,
                &[r.position.x, r.position.y, r.size.x, r.size.y],
            ),
            TaggedValue::Rect2i(r) => put_i32s(
                &mut payload,
                &[r.position.x, r.position.y, r.size.x, r.size.y],
            ),
            TaggedValue::Vector3(v) => put_f32s(&mut payload, &[v.x, v.y, v.z]),
            TaggedValue::Vector3i(v) => put_i32s(&mut payload, &[v.x, v.y, v.z]),
            TaggedValue::Vector4(v) => put_f32s(&mut payload, &[v.x, v.y, v.z, v.w]),
            TaggedValue::Vector4i(v) => put_i32s(&mut payload, &[v.x, v.y, v.z, v.w]),
            TaggedValue::Color(c) => put_f32s(&mut payload, &[c.r, c.g, c.b, c.a]),
            other => {
                if let Some(handle) = other.handle() {
                    return Self::with_handle(other.kind(), handle);
                }
            }
        }
        Self {
            kind: value.kind().wire(),
            payload,
        }
    }

    /// Decodes an inline kind without consulting a registry.
    ///
    /// Returns `None` for complex, unsupported or unknown kinds.
    #[must_use]
    pub fn inline_value(&self) -> Option<TaggedValue> {
        let kind = Kind::from_wire(self.kind)?;
        let p = &self.payload;
        Some(match kind {
            Kind::Nil => TaggedValue::Nil,
            Kind::Bool => TaggedValue::Bool(p[0] != 0),
            Kind::Int => TaggedValue::Int(i64::from_le_bytes(word(p))),
            Kind::Float => TaggedValue::Float(f64::from_le_bytes(word(p))),
            Kind::Vector2 => {
                let [x, y] = get_f32s(p);
                TaggedValue::Vector2(Vector2::new(x, y))
            }
            Kind::Vector2i => {
                let [x, y] = get_i32s(p);
                TaggedValue::Vector2i(Vector2i::new(x, y))
            }
            Kind::Rect2 => {
                let [x, y, w, h] = get_f32s(p);
                TaggedValue::Rect2(Rect2::new(x, y, w, h))
            }
            Kind::Rect2i => {
                let [x, y, w, h] = get_i32s(p);
                TaggedValue::Rect2i(Rect2i::new(x, y, w, h))
            }
            Kind::Vector3 => {
                let [x, y, z] = get_f32s(p);
                TaggedValue::Vector3(Vector3::new(x, y, z))
            }
            Kind::Vector3i => {
                let [x, y, z] = get_i32s(p);
                TaggedValue::Vector3i(Vector3i::new(x, y, z))
            }
            Kind::Vector4 => {
                let [x, y, z, w] = get_f32s(p);
                TaggedValue::Vector4(Vector4::new(x, y, z, w))
            }
            Kind::Vector4i => {
                let [x, y, z, w] = get_i32s(p);
                TaggedValue::Vector4i(Vector4i::new(x, y, z, w))
            }
            Kind::Color => {
                let [r, g, b, a] = get_f32s(p);
                TaggedValue::Color(Color::new(r, g, b, a))
            }
            _ => return None,
        })
    }

    /// Raw handle bits of a complex kind.
    #[inline]
    pub fn handle_bits(&self) -> u64 {
        u64::from_le_bytes(word(&self.payload))
    }

    /// Lifts into a tagged value, validating handles against `registry`.
    ///
    /// Unknown or unsupported discriminants fail with [`BridgeError::TypeMismatch`]; handles that
    /// resolve nowhere fail with [`BridgeError::UnknownHandle`].
    pub fn lift(&self, registry: &Registry) -> Result<TaggedValue, BridgeError> {
        if let Some(value) = self.inline_value() {
            return Ok(value);
        }
        let kind = Kind::from_wire(self.kind)
            .filter(|kind| kind.is_supported())
            .ok_or(BridgeError::TypeMismatch {
                expected: "a supported kind",
                found: self.kind,
            })?;
        let raw = self.handle_bits();
        let handle = u32::try_from(raw)
            .map(Handle::new)
            .map_err(|_| BridgeError::UnknownHandle(raw))?;
        registry.tagged_as(kind, handle)
    }
}

impl From<TaggedValue> for GuestVariant {
    fn from(value: TaggedValue) -> Self {
        Self::lower(value)
    }
}

fn word(payload: &[u8; 16]) -> [u8; 8] {
    let mut out = [0_u8; 8];
    out.copy_from_slice(&payload[..8]);
    out
}

fn put_f32s(payload: &mut [u8; 16], values: &[f32]) {
    for (chunk, v) in payload.chunks_exact_mut(4).zip(values) {
        chunk.copy_from_slice(&v.to_le_bytes());
    }
}

fn put_i32s(payload: &mut [u8; 16], values: &[i32]) {
    for (chunk, v) in payload.chunks_exact_mut(4).zip(values) {
        chunk.copy_from_slice(&v.to_le_bytes());
    }
}

fn get_f32s<const N: usize>(payload: &[u8; 16]) -> [f32; N] {
    let mut out = [0.0_f32; N];
    for (slot, chunk) in out.iter_mut().zip(payload.chunks_exact(4)) {
        *slot = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    out
}

fn get_i32s<const N: usize>(payload: &[u8; 16]) -> [i32; N] {
    let mut out = [0_i32; N];
    for (slot, chunk) in out.iter_mut().zip(payload.chunks_exact(4)) {
        *slot = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    out
}

/// Reads `count` consecutive guest variants starting at `address`.
pub fn read_variants(
    memory: &dyn GuestMemory,
    address: GuestAddr,
    count: usize,
) -> Result<Vec<GuestVariant>, BridgeError> {
    let mut out = Vec::with_capacity(count);
    let mut buf = [0_u8; GUEST_VARIANT_SIZE];
    let mut cursor = address;
    for _ in 0..count {
        memory.read(cursor, &mut buf)?;
        out.push(GuestVariant::from_bytes(&buf));
        cursor = advance(cursor)?;
    }
    Ok(out)
}

/// Writes consecutive guest variants starting at `address`.
pub fn write_variants(
    memory: &mut dyn GuestMemory,
    address: GuestAddr,
    values: &[GuestVariant],
) -> Result<(), BridgeError> {
    let mut cursor = address;
    for value in values {
        memory.write(cursor, &value.to_bytes())?;
        cursor = advance(cursor)?;
    }
    Ok(())
}

fn advance(address: GuestAddr) -> Result<GuestAddr, BridgeError> {
    address
        .checked_add(GUEST_VARIANT_SIZE as u64)
        .ok_or(BridgeError::MemoryAccess {
            address,
            len: GUEST_VARIANT_SIZE,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::FlatMemory;
    use crate::registry::ScopedValue;
    use crate::value::ObjectId;
    use alloc::string::String;
    use alloc::vec;

    fn inline_samples() -> Vec<TaggedValue> {
        vec![
            TaggedValue::Nil,
            TaggedValue::Bool(true),
            TaggedValue::Int(-42),
            TaggedValue::Int(i64::MIN),
            TaggedValue::Float(3.5),
            TaggedValue::Float(-0.0),
            TaggedValue::Vector2(Vector2::new(1.5, -2.0)),
            TaggedValue::Vector2i(Vector2i::new(-7, 9)),
            TaggedValue::Rect2(Rect2::new(0.5, 1.0, 10.0, 20.0)),
            TaggedValue::Rect2i(Rect2i::new(1, 2, 3, 4)),
            TaggedValue::Vector3(Vector3::new(1.0, 2.0, 3.0)),
            TaggedValue::Vector3i(Vector3i::new(i32::MIN, 0, i32::MAX)),
            TaggedValue::Vector4(Vector4::new(0.1, 0.2, 0.3, 0.4)),
            TaggedValue::Vector4i(Vector4i::new(1, -1, 2, -2)),
            TaggedValue::Color(Color::new(1.0, 0.5, 0.25, 1.0)),
        ]
    }

    #[test]
    fn inline_kinds_survive_lower_then_lift() {
        let registry = Registry::new();
        for value in inline_samples() {
            let guest = GuestVariant::lower(value);
            let image = guest.to_bytes();
            assert_eq!(&image[4..8], &[0; 4], "padding must stay zero");
            let lifted = GuestVariant::from_bytes(&image).lift(&registry).unwrap();
            assert_eq!(lifted.kind(), value.kind());
            // Bitwise comparison so -0.0 is distinguished from 0.0.
            assert_eq!(GuestVariant::lower(lifted).to_bytes(), image);
        }
    }

    #[test]
    fn layout_matches_wire_format() {
        let image = GuestVariant::int(0x0102_0304_0506_0708).to_bytes();
        assert_eq!(&image[..4], &2_u32.to_le_bytes());
        assert_eq!(&image[8..16], &0x0102_0304_0506_0708_i64.to_le_bytes());
        assert_eq!(&image[16..], &[0; 8]);
    }

    #[test]
    fn unknown_or_unsupported_kinds_are_type_mismatches() {
        let registry = Registry::new();
        for raw in [11_u32, 34, 99] {
            let err = GuestVariant::from_raw(raw, [0; 16]).lift(&registry).unwrap_err();
            assert_eq!(
                err,
                BridgeError::TypeMismatch {
                    expected: "a supported kind",
                    found: raw
                }
            );
        }
    }

    #[test]
    fn complex_kinds_validate_handles() {
        let mut registry = Registry::new();
        let text = registry.store(ScopedValue::String(String::from("hi"))).unwrap();
        let object = registry.expose_object(ObjectId::new(77)).unwrap();

        let lifted = GuestVariant::with_handle(Kind::String, text).lift(&registry).unwrap();
        assert_eq!(lifted, TaggedValue::String(text));
        let lifted = GuestVariant::with_handle(Kind::Object, object).lift(&registry).unwrap();
        assert_eq!(lifted, TaggedValue::Object(object));

        // Right handle, wrong tag.
        let err = GuestVariant::with_handle(Kind::Array, text).lift(&registry).unwrap_err();
        assert!(matches!(err, BridgeError::TypeMismatch { .. }), "{err:?}");

        // Nothing there.
        let err = GuestVariant::with_handle(Kind::Array, Handle::new(999))
            .lift(&registry)
            .unwrap_err();
        assert_eq!(err, BridgeError::UnknownHandle(999));

        // Wider than any handle.
        let mut payload = [0_u8; 16];
        payload[..8].copy_from_slice(&(1_u64 << 40).to_le_bytes());
        let err = GuestVariant::from_raw(Kind::String.wire(), payload)
            .lift(&registry)
            .unwrap_err();
        assert_eq!(err, BridgeError::UnknownHandle(1 << 40));
    }

    #[test]
    fn variant_arrays_round_trip_through_memory() {
        let mut memory = FlatMemory::new(256);
        let values = [GuestVariant::int(1), GuestVariant::float(2.0), GuestVariant::NIL];
        write_variants(&mut memory, 16, &values).unwrap();
        assert_eq!(read_variants(&memory, 16, 3).unwrap(), values.to_vec());
        assert!(read_variants(&memory, 240, 1).is_err());
    }
}
