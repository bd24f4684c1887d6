// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use guest_bridge::machine::{GuestAddr, SymbolLookup};
use guest_bridge::ops::Syscall;
use std::collections::HashMap;
use std::string::String;

/// Optional label resolver for profiling scopes.
///
/// Return `None` to fall back to the default address/code-based labels.
pub trait LabelResolver {
    /// Resolve a label for a host-to-guest call scope.
    fn guest_call_label(
        &mut self,
        _address: GuestAddr,
        _symbols: &dyn SymbolLookup,
    ) -> Option<String> {
        None
    }

    /// Resolve a label for a dispatched operation scope.
    fn dispatch_label(&mut self, _code: u32, _sub_op: u32) -> Option<String> {
        None
    }
}

/// Default resolver that keeps stable address/code-based labels.
#[derive(Default, Debug)]
pub struct DefaultLabelResolver;

impl LabelResolver for DefaultLabelResolver {}

/// Resolver that uses guest symbols and operation names when available.
#[derive(Default, Debug)]
pub struct SymbolLabelResolver {
    call_cache: HashMap<GuestAddr, String>,
    dispatch_cache: HashMap<(u32, u32), String>,
}

impl LabelResolver for SymbolLabelResolver {
    fn guest_call_label(
        &mut self,
        address: GuestAddr,
        symbols: &dyn SymbolLookup,
    ) -> Option<String> {
        if let Some(label) = self.call_cache.get(&address) {
            return Some(label.clone());
        }
        let symbol = symbols.symbol_at(address)?;
        let label = if symbol.address == address {
            format!("call:{}", symbol.name)
        } else {
            format!("call:{}+{:#x}", symbol.name, address - symbol.address)
        };
        self.call_cache.insert(address, label.clone());
        Some(label)
    }

    fn dispatch_label(&mut self, code: u32, sub_op: u32) -> Option<String> {
        if let Some(label) = self.dispatch_cache.get(&(code, sub_op)) {
            return Some(label.clone());
        }
        let call = Syscall::from_code(code)?;
        let label = match call.sub_op_name(sub_op) {
            Some(sub) => format!("op:{}.{sub}", call.name()),
            None if call.is_grouped() => format!("op:{}.{sub_op}", call.name()),
            None => format!("op:{}", call.name()),
        };
        self.dispatch_cache.insert((code, sub_op), label.clone());
        Some(label)
    }
}

pub(crate) fn default_guest_call_label(address: GuestAddr) -> String {
    format!("call:{address:#x}")
}

pub(crate) fn default_dispatch_label(code: u32, sub_op: u32) -> String {
    format!("op:{code}/{sub_op}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use guest_bridge::machine::{NoSymbols, Symbol};

    struct OneSymbol;

    impl SymbolLookup for OneSymbol {
        fn symbol_at(&self, address: GuestAddr) -> Option<Symbol> {
            (0x1000..0x1100).contains(&address).then(|| Symbol {
                name: "on_ready".into(),
                address: 0x1000,
            })
        }
    }

    #[test]
    fn symbol_labels() {
        let mut resolver = SymbolLabelResolver::default();
        assert_eq!(
            resolver.guest_call_label(0x1000, &OneSymbol).as_deref(),
            Some("call:on_ready")
        );
        assert_eq!(
            resolver.guest_call_label(0x1010, &OneSymbol).as_deref(),
            Some("call:on_ready+0x10")
        );
        assert_eq!(resolver.guest_call_label(0x2000, &NoSymbols), None);
        // Cached labels do not consult the lookup again.
        assert_eq!(
            resolver.guest_call_label(0x1000, &NoSymbols).as_deref(),
            Some("call:on_ready")
        );
    }

    #[test]
    fn dispatch_labels() {
        let mut resolver = SymbolLabelResolver::default();
        let push_back = Syscall::ArrayOps.code();
        assert_eq!(
            resolver.dispatch_label(push_back, 1).as_deref(),
            Some("op:array_ops.push_back")
        );
        assert_eq!(
            resolver.dispatch_label(push_back, 77).as_deref(),
            Some("op:array_ops.77")
        );
        assert_eq!(
            resolver.dispatch_label(Syscall::Print.code(), 0).as_deref(),
            Some("op:print")
        );
        assert_eq!(resolver.dispatch_label(9999, 0), None);
        assert_eq!(default_dispatch_label(9999, 0), "op:9999/0");
        assert_eq!(default_guest_call_label(0x40), "call:0x40");
    }
}
