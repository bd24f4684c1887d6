// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Array operations.

use alloc::vec;

use super::{Args, DispatchContext, element_index, insertion_index};
use crate::error::BridgeError;
use crate::host::Host;
use crate::machine::GuestMemory;
use crate::ops::ArrayOp;
use crate::registry::ScopedValue;
use crate::value::TaggedValue;

fn length(len: usize) -> TaggedValue {
    TaggedValue::Int(i64::try_from(len).unwrap_or(i64::MAX))
}

impl<H: Host> DispatchContext<'_, H> {
    /// `ARRAY_OPS(array, …)`. [`ArrayOp::Create`] takes an optional length instead of an array
    /// and pads with nil.
    pub(super) fn array_op(
        &mut self,
        memory: &mut dyn GuestMemory,
        op: ArrayOp,
        args: &Args<'_>,
    ) -> Result<TaggedValue, BridgeError> {
        let target = || args.container(0);
        match op {
            ArrayOp::Create => {
                let len = if args.is_nil(0) { 0 } else { args.count(0)? };
                self.copy_allowed(len, size_of::<TaggedValue>())?;
                let handle = self
                    .registry
                    .store(ScopedValue::Array(vec![TaggedValue::Nil; len]))?;
                Ok(TaggedValue::Array(handle))
            }
            ArrayOp::PushBack | ArrayOp::PushFront => {
                let handle = target()?;
                self.registry.array(handle)?;
                let value = args.value(1, &*self.registry)?;
                let items = self.registry.array_mut(handle)?;
                if op == ArrayOp::PushBack {
                    items.push(value);
                } else {
                    items.insert(0, value);
                }
                Ok(TaggedValue::Nil)
            }
            ArrayOp::PopAt => {
                let handle = target()?;
                let len = self.registry.array(handle)?.len();
                let index = element_index(args.int(1)?, len)?;
                Ok(self.registry.array_mut(handle)?.remove(index))
            }
            ArrayOp::PopBack => Ok(self
                .registry
                .array_mut(target()?)?
                .pop()
                .unwrap_or_default()),
            ArrayOp::PopFront => {
                let items = self.registry.array_mut(target()?)?;
                if items.is_empty() {
                    return Ok(TaggedValue::Nil);
                }
                Ok(items.remove(0))
            }
            ArrayOp::Insert => {
                let handle = target()?;
                let len = self.registry.array(handle)?.len();
                let index = insertion_index(args.int(1)?, len)?;
                let value = args.value(2, &*self.registry)?;
                self.registry.array_mut(handle)?.insert(index, value);
                Ok(TaggedValue::Nil)
            }
            ArrayOp::Erase => {
                let handle = target()?;
                let len = self.registry.array(handle)?.len();
                let index = element_index(args.int(1)?, len)?;
                self.registry.array_mut(handle)?.remove(index);
                Ok(TaggedValue::Nil)
            }
            ArrayOp::Resize => {
                let handle = target()?;
                self.registry.array(handle)?;
                let new_len = args.count(1)?;
                self.copy_allowed(new_len, size_of::<TaggedValue>())?;
                self.registry
                    .array_mut(handle)?
                    .resize(new_len, TaggedValue::Nil);
                Ok(TaggedValue::Nil)
            }
            ArrayOp::Clear => {
                self.registry.array_mut(target()?)?.clear();
                Ok(TaggedValue::Nil)
            }
            ArrayOp::Sort => {
                let handle = target()?;
                let mut sorted = self.registry.array(handle)?.to_vec();
                sorted.sort_by(|a, b| self.registry.compare(a, b));
                *self.registry.array_mut(handle)? = sorted;
                Ok(TaggedValue::Nil)
            }
            ArrayOp::FetchToVector => {
                // (array, dst, capacity)
                let dst = args.address(1)?;
                let capacity = args.count(2)?;
                let items = self.registry.array(target()?)?;
                self.put_guest_variants(memory, dst, &items[..items.len().min(capacity)])?;
                Ok(length(items.len()))
            }
        }
    }

    /// `ARRAY_AT(array, index)`; negative indices count from the end.
    pub(super) fn array_at(&mut self, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
        let items = self.registry.array(args.container(0)?)?;
        let index = element_index(args.int(1)?, items.len())?;
        Ok(items[index])
    }

    /// `ARRAY_SIZE(array)`.
    pub(super) fn array_size(&mut self, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
        Ok(length(self.registry.array(args.container(0)?)?.len()))
    }
}
