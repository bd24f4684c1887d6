// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! String operations.
//!
//! Lengths and indices count characters; only the guest-memory copies work in bytes.

use alloc::string::String;

use super::{Args, DispatchContext, element_index, insertion_index};
use crate::error::BridgeError;
use crate::host::Host;
use crate::machine::{GuestMemory, write_bytes};
use crate::ops::StringOp;
use crate::registry::ScopedValue;
use crate::value::TaggedValue;

/// Byte offset of character `index`, or the text length past the end.
fn byte_offset(text: &str, index: usize) -> usize {
    text.char_indices().nth(index).map_or(text.len(), |(i, _)| i)
}

fn int(value: usize) -> TaggedValue {
    TaggedValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
}

impl<H: Host> DispatchContext<'_, H> {
    /// `STRING_CREATE(ptr, len)`.
    pub(super) fn string_create(
        &mut self,
        memory: &mut dyn GuestMemory,
        args: &Args<'_>,
    ) -> Result<TaggedValue, BridgeError> {
        let bytes = self.guest_bytes(memory, args.address(0)?, args.count(1)?)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(TaggedValue::String(self.registry.store(ScopedValue::String(text))?))
    }

    /// `STRING_OPS(string, …)`.
    pub(super) fn string_op(
        &mut self,
        memory: &mut dyn GuestMemory,
        op: StringOp,
        args: &Args<'_>,
    ) -> Result<TaggedValue, BridgeError> {
        let handle = args.container(0)?;
        let text = self.registry.text(handle)?;
        let chars = text.chars().count();
        match op {
            StringOp::Copy => {
                let copy = self.registry.duplicate(handle)?;
                self.registry.tagged(copy)
            }
            StringOp::GetLength => Ok(int(chars)),
            StringOp::GetChar => {
                let index = element_index(args.int(1)?, chars)?;
                let ch = text.chars().nth(index).unwrap_or_default();
                Ok(TaggedValue::Int(i64::from(u32::from(ch))))
            }
            StringOp::Append => {
                let suffix = String::from(args.text(1, &*self.registry)?);
                self.registry.text_mut(handle)?.push_str(&suffix);
                Ok(TaggedValue::Nil)
            }
            StringOp::Insert => {
                // (string, index, other)
                let at = byte_offset(text, insertion_index(args.int(1)?, chars)?);
                let insert = String::from(args.text(2, &*self.registry)?);
                self.registry.text_mut(handle)?.insert_str(at, &insert);
                Ok(TaggedValue::Nil)
            }
            StringOp::Find => {
                // (string, needle, from = 0)
                let needle = args.text(1, &*self.registry)?;
                let from = if args.is_nil(2) {
                    0
                } else {
                    insertion_index(args.int(2)?, chars)?
                };
                let start = byte_offset(text, from);
                Ok(match text[start..].find(needle) {
                    Some(found) => int(text[..start + found].chars().count()),
                    None => TaggedValue::Int(-1),
                })
            }
            StringOp::Erase => {
                // (string, index, count); the range is clamped to the end
                let index = insertion_index(args.int(1)?, chars)?;
                let count = args.count(2)?;
                let start = byte_offset(text, index);
                let end = byte_offset(text, index.saturating_add(count));
                self.registry.text_mut(handle)?.replace_range(start..end, "");
                Ok(TaggedValue::Nil)
            }
            StringOp::ToStdString => {
                // (string, dst, capacity) -> byte length
                let dst = args.address(1)?;
                let capacity = args.count(2)?;
                let n = text.len().min(capacity);
                write_bytes(memory, dst, &text.as_bytes()[..n], self.limits.max_guest_copy)?;
                Ok(int(text.len()))
            }
        }
    }

    /// `STRING_AT(string, index)`: the character as a new one-character string.
    pub(super) fn string_at(&mut self, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
        let text = self.registry.text(args.container(0)?)?;
        let index = element_index(args.int(1)?, text.chars().count())?;
        let ch = String::from(text.chars().nth(index).unwrap_or_default());
        Ok(TaggedValue::String(self.registry.store(ScopedValue::String(ch))?))
    }

    /// `STRING_SIZE(string)` in characters.
    pub(super) fn string_size(&mut self, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
        Ok(int(self.registry.text(args.container(0)?)?.chars().count()))
    }

    /// `STRING_APPEND(string, ptr, len)`.
    pub(super) fn string_append(
        &mut self,
        memory: &mut dyn GuestMemory,
        args: &Args<'_>,
    ) -> Result<TaggedValue, BridgeError> {
        let handle = args.container(0)?;
        self.registry.text(handle)?;
        let bytes = self.guest_bytes(memory, args.address(1)?, args.count(2)?)?;
        let suffix = String::from_utf8_lossy(&bytes);
        self.registry.text_mut(handle)?.push_str(&suffix);
        Ok(TaggedValue::Nil)
    }
}

#[cfg(test)]
mod tests {
    use super::byte_offset;

    #[test]
    fn byte_offsets_follow_characters() {
        assert_eq!(byte_offset("héllo", 0), 0);
        assert_eq!(byte_offset("héllo", 2), 3);
        assert_eq!(byte_offset("héllo", 5), 6);
        assert_eq!(byte_offset("héllo", 9), 6);
    }
}
