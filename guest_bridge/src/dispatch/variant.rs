// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Generic value operations: print, call, evaluate, create, clone, fetch, store, free, throw.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write as _;

use super::{Args, DispatchContext, eval};
use crate::error::BridgeError;
use crate::host::Host;
use crate::machine::{GuestMemory, write_bytes};
use crate::ops::VariantOperator;
use crate::policy::ObjectAccess;
use crate::registry::{PackedArray, ScopedValue};
use crate::value::{Kind, TaggedValue};
use crate::variant::Callable;

impl<H: Host> DispatchContext<'_, H> {
    /// `PRINT(values…)`: concatenates the values and prints them, prefixing each new line with
    /// the sandbox name.
    pub(super) fn print(&mut self, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
        let mut text = String::new();
        for value in self.host_args(args, 0)? {
            // Writing into a String cannot fail.
            let _ = write!(text, "{value}");
        }
        let mut line = String::new();
        if self.session.at_line_start {
            let _ = write!(line, "[{}] says: ", self.session.name);
        }
        line.push_str(&text);
        self.session.at_line_start = text.ends_with('\n');
        self.host.print(&line);
        Ok(TaggedValue::Nil)
    }

    /// `VCALL(receiver, method, args…)`.
    ///
    /// Objects are called through reflection; any other receiver goes to the host's builtin
    /// method hook and sees a copy of the receiver.
    pub(super) fn vcall(&mut self, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
        let method = String::from(args.text(1, &*self.registry)?);
        let call_args = self.host_args(args, 2)?;
        let receiver = args.value(0, &*self.registry)?;
        let result = if let TaggedValue::Object(_) = receiver {
            let object = self.target(args, 0, ObjectAccess::Call { method: &method })?;
            self.host.call_method(object, &method, &call_args)?
        } else {
            let receiver = self.to_host(receiver)?;
            self.host.call_builtin(&receiver, &method, &call_args)?
        };
        self.admit(result)
    }

    /// `VEVAL(op, a, b)`.
    pub(super) fn veval(&mut self, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
        let code = args.int(0)?;
        let op = u32::try_from(code)
            .ok()
            .and_then(VariantOperator::from_code)
            .ok_or(BridgeError::arg(0, "operator"))?;
        let a = args.value(1, &*self.registry)?;
        let b = args.value_or_nil(2, &*self.registry)?;
        eval::evaluate(self.registry, op, a, b)
    }

    /// `VFREE(value)`.
    pub(super) fn vfree(&mut self, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
        let value = args.value(0, &*self.registry)?;
        let handle = value
            .handle()
            .ok_or(BridgeError::Unsupported("freeing an inline value"))?;
        self.registry.release(handle)?;
        Ok(TaggedValue::Nil)
    }

    /// `VCREATE(kind, …)`.
    ///
    /// | kind | arguments |
    /// |---|---|
    /// | string-like | `ptr, len` (UTF-8 bytes) |
    /// | array | `ptr, count` (guest variants) |
    /// | dictionary | none |
    /// | packed array | `ptr, count` (little-endian elements) |
    /// | callable | guest function address |
    pub(super) fn vcreate(
        &mut self,
        memory: &mut dyn GuestMemory,
        args: &Args<'_>,
    ) -> Result<TaggedValue, BridgeError> {
        let raw_kind = args.int(0)?;
        let kind = u32::try_from(raw_kind)
            .ok()
            .and_then(Kind::from_wire)
            .ok_or(BridgeError::arg(0, "kind"))?;
        let entry = match kind {
            Kind::String | Kind::StringName | Kind::NodePath => {
                let bytes = self.guest_bytes(memory, args.address(1)?, args.count(2)?)?;
                let text = String::from_utf8_lossy(&bytes).into_owned();
                match kind {
                    Kind::String => ScopedValue::String(text),
                    Kind::StringName => ScopedValue::StringName(text),
                    _ => ScopedValue::NodePath(text),
                }
            }
            Kind::Array => {
                let items = if args.is_nil(1) {
                    Vec::new()
                } else {
                    self.guest_variants(memory, args.address(1)?, args.count(2)?)?
                };
                ScopedValue::Array(items)
            }
            Kind::Dictionary => ScopedValue::Dictionary(Vec::new()),
            Kind::Callable => {
                let callable = self.guest_callable(args.address(1)?);
                ScopedValue::Callable(Callable::Guest(callable))
            }
            _ => match PackedArray::element_size(kind) {
                Some(size) => {
                    let packed = if args.is_nil(1) {
                        PackedArray::empty(kind)
                    } else {
                        let count = args.count(2)?;
                        self.copy_allowed(count, size)?;
                        let bytes = self.guest_bytes(memory, args.address(1)?, count * size)?;
                        PackedArray::from_le_bytes(kind, &bytes)
                    };
                    ScopedValue::Packed(packed.ok_or(BridgeError::Unsupported("packed kind"))?)
                }
                None => return Err(BridgeError::Unsupported("creating this kind")),
            },
        };
        let handle = self.registry.store(entry)?;
        TaggedValue::from_handle(kind, handle).ok_or(BridgeError::Unsupported("creating this kind"))
    }

    /// `VCLONE(value)`: a shallow copy into a new handle. Inline values and objects are returned
    /// unchanged.
    pub(super) fn vclone(&mut self, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
        let value = args.value(0, &*self.registry)?;
        match value.handle() {
            Some(handle) if !matches!(value, TaggedValue::Object(_)) => {
                let copy = self.registry.duplicate(handle)?;
                self.registry.tagged(copy)
            }
            _ => Ok(value),
        }
    }

    /// `VFETCH(value, dst, capacity)`: copies at most `capacity` elements (bytes for text) and
    /// returns the full length.
    pub(super) fn vfetch(
        &mut self,
        memory: &mut dyn GuestMemory,
        args: &Args<'_>,
    ) -> Result<TaggedValue, BridgeError> {
        let handle = args.container(0)?;
        let dst = args.address(1)?;
        let capacity = args.count(2)?;
        let limit = self.limits.max_guest_copy;
        let len = match self.registry.value(handle)? {
            ScopedValue::String(s) | ScopedValue::StringName(s) | ScopedValue::NodePath(s) => {
                let n = s.len().min(capacity);
                write_bytes(memory, dst, &s.as_bytes()[..n], limit)?;
                s.len()
            }
            ScopedValue::Array(items) => {
                let n = items.len().min(capacity);
                self.put_guest_variants(memory, dst, &items[..n])?;
                items.len()
            }
            ScopedValue::Packed(packed) => {
                write_bytes(memory, dst, &packed.to_le_bytes(capacity), limit)?;
                packed.len()
            }
            other => return Err(BridgeError::type_mismatch("a sequence", other.kind())),
        };
        Ok(TaggedValue::Int(i64::try_from(len).unwrap_or(i64::MAX)))
    }

    /// `VSTORE(value, src, len)`: replaces the contents; `len` counts elements (bytes for text).
    pub(super) fn vstore(
        &mut self,
        memory: &mut dyn GuestMemory,
        args: &Args<'_>,
    ) -> Result<TaggedValue, BridgeError> {
        let handle = args.container(0)?;
        let src = args.address(1)?;
        let len = args.count(2)?;
        let kind = self.registry.value(handle)?.kind();
        let replacement = match kind {
            Kind::String | Kind::StringName | Kind::NodePath => {
                let bytes = self.guest_bytes(memory, src, len)?;
                let text = String::from_utf8_lossy(&bytes).into_owned();
                match kind {
                    Kind::String => ScopedValue::String(text),
                    Kind::StringName => ScopedValue::StringName(text),
                    _ => ScopedValue::NodePath(text),
                }
            }
            Kind::Array => ScopedValue::Array(self.guest_variants(memory, src, len)?),
            _ => {
                let size = PackedArray::element_size(kind)
                    .ok_or(BridgeError::type_mismatch("a sequence", kind))?;
                self.copy_allowed(len, size)?;
                let bytes = self.guest_bytes(memory, src, len * size)?;
                let packed = PackedArray::from_le_bytes(kind, &bytes)
                    .ok_or(BridgeError::type_mismatch("a sequence", kind))?;
                ScopedValue::Packed(packed)
            }
        };
        *self.registry.value_mut(handle)? = replacement;
        Ok(TaggedValue::Nil)
    }

    /// `THROW(kind, message)`.
    pub(super) fn throw(&mut self, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
        let kind = String::from(args.text(0, &*self.registry)?);
        let message = if args.is_nil(1) {
            String::new()
        } else {
            String::from(args.text(1, &*self.registry)?)
        };
        log::warn!("[{}] guest threw {kind}: {message}", self.session.name);
        Err(BridgeError::GuestThrow { kind, message })
    }
}
