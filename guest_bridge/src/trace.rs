// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scope tracing hooks.
//!
//! A [`TraceSink`] sees one enter/exit pair per host-to-guest call and per dispatched guest
//! operation. Sinks choose what they want with a [`TraceMask`]; with no sink installed nothing is
//! computed.

use core::ops::BitOr;

use crate::machine::{GuestAddr, SymbolLookup};

/// Selects which scopes a sink receives.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct TraceMask(u8);

impl TraceMask {
    /// No scopes.
    pub const NONE: Self = Self(0);
    /// Host-to-guest calls.
    pub const CALL: Self = Self(1 << 0);
    /// Dispatched guest operations.
    pub const DISPATCH: Self = Self(1 << 1);
    /// Everything.
    pub const ALL: Self = Self(Self::CALL.0 | Self::DISPATCH.0);

    /// Returns `true` if every bit of `other` is set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for TraceMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A traced scope.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// A host-initiated call into the guest.
    GuestCall {
        /// Called address.
        address: GuestAddr,
    },
    /// A guest operation request.
    Dispatch {
        /// Operation code.
        code: u32,
        /// Sub-operation.
        sub_op: u32,
    },
}

impl ScopeKind {
    /// The mask bit that enables this scope.
    #[must_use]
    pub const fn mask(self) -> TraceMask {
        match self {
            Self::GuestCall { .. } => TraceMask::CALL,
            Self::Dispatch { .. } => TraceMask::DISPATCH,
        }
    }
}

/// Receives scope enter/exit events.
pub trait TraceSink {
    /// Scopes this sink wants.
    fn mask(&self) -> TraceMask;

    /// A scope starts. `depth` is the nesting depth of the scope itself (0 for outermost).
    fn scope_enter(&mut self, symbols: &dyn SymbolLookup, kind: ScopeKind, depth: usize);

    /// The matching scope ends.
    fn scope_exit(&mut self, kind: ScopeKind, depth: usize);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_bits() {
        let mask = TraceMask::CALL | TraceMask::DISPATCH;
        assert_eq!(mask, TraceMask::ALL);
        assert!(mask.contains(TraceMask::CALL));
        assert!(!TraceMask::CALL.contains(TraceMask::DISPATCH));
        assert!(TraceMask::NONE.contains(TraceMask::NONE));
        assert_eq!(
            ScopeKind::Dispatch { code: 500, sub_op: 0 }.mask(),
            TraceMask::DISPATCH
        );
    }
}
