// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dictionary operations. Keys compare structurally and keep insertion order.

use alloc::vec::Vec;

use super::{Args, DispatchContext};
use crate::error::BridgeError;
use crate::host::Host;
use crate::ops::DictionaryOp;
use crate::registry::ScopedValue;
use crate::value::TaggedValue;

impl<H: Host> DispatchContext<'_, H> {
    /// `DICTIONARY_OPS(dictionary, …)`.
    pub(super) fn dictionary_op(
        &mut self,
        op: DictionaryOp,
        args: &Args<'_>,
    ) -> Result<TaggedValue, BridgeError> {
        let handle = args.container(0)?;
        let len = self.registry.dictionary(handle)?.len();
        let key = || args.value(1, &*self.registry);
        match op {
            DictionaryOp::Get => {
                let key = key()?;
                Ok(match self.registry.dictionary_position(handle, &key)? {
                    Some(i) => self.registry.dictionary(handle)?[i].1,
                    None => TaggedValue::Nil,
                })
            }
            DictionaryOp::Set => {
                let (key, value) = (key()?, args.value(2, &*self.registry)?);
                let position = self.registry.dictionary_position(handle, &key)?;
                let entries = self.registry.dictionary_mut(handle)?;
                match position {
                    Some(i) => entries[i].1 = value,
                    None => entries.push((key, value)),
                }
                Ok(TaggedValue::Nil)
            }
            DictionaryOp::Erase => {
                let key = key()?;
                let position = self.registry.dictionary_position(handle, &key)?;
                if let Some(i) = position {
                    self.registry.dictionary_mut(handle)?.remove(i);
                }
                Ok(TaggedValue::Bool(position.is_some()))
            }
            DictionaryOp::Has => {
                let key = key()?;
                let position = self.registry.dictionary_position(handle, &key)?;
                Ok(TaggedValue::Bool(position.is_some()))
            }
            DictionaryOp::GetKeys | DictionaryOp::GetValues => {
                let entries = self.registry.dictionary(handle)?;
                let items: Vec<_> = if op == DictionaryOp::GetKeys {
                    entries.iter().map(|(k, _)| *k).collect()
                } else {
                    entries.iter().map(|(_, v)| *v).collect()
                };
                Ok(TaggedValue::Array(self.registry.store(ScopedValue::Array(items))?))
            }
            DictionaryOp::GetSize => Ok(TaggedValue::Int(
                i64::try_from(len).unwrap_or(i64::MAX),
            )),
            DictionaryOp::Clear => {
                self.registry.dictionary_mut(handle)?.clear();
                Ok(TaggedValue::Nil)
            }
            DictionaryOp::Merge => {
                // (dictionary, other, overwrite = false)
                let other = args.container(1)?;
                let overwrite = args.flag(2, false)?;
                let incoming = self.registry.dictionary(other)?.to_vec();
                let mut merged = self.registry.dictionary(handle)?.to_vec();
                for (key, value) in incoming {
                    match merged
                        .iter()
                        .position(|(k, _)| self.registry.values_equal(k, &key))
                    {
                        Some(i) if overwrite => merged[i].1 = value,
                        Some(_) => {}
                        None => merged.push((key, value)),
                    }
                }
                *self.registry.dictionary_mut(handle)? = merged;
                Ok(TaggedValue::Nil)
            }
            DictionaryOp::GetOrAdd => {
                // (dictionary, key, default)
                let key = key()?;
                if let Some(i) = self.registry.dictionary_position(handle, &key)? {
                    return Ok(self.registry.dictionary(handle)?[i].1);
                }
                let default = args.value_or_nil(2, &*self.registry)?;
                self.registry.dictionary_mut(handle)?.push((key, default));
                Ok(default)
            }
        }
    }
}
