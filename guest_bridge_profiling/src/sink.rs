// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::resolver::{
    DefaultLabelResolver, LabelResolver, default_dispatch_label, default_guest_call_label,
};
use guest_bridge::machine::SymbolLookup;
use guest_bridge::trace::{ScopeKind, TraceMask, TraceSink};
use std::string::String;
use std::vec::Vec;

/// An open scope. The span is `None` while no Tracy client runs.
struct OpenScope {
    kind: ScopeKind,
    depth: usize,
    span: Option<tracy_client::Span>,
}

/// A `TraceSink` that emits Tracy scopes via `tracy-client`.
///
/// Guest calls and dispatched operations nest: a call at depth `n` contains the operations its
/// traps dispatch at depth `n + 1`. When the guest stops inside an operation (a timeout or a
/// fault), the operation never reports its exit; it is closed together with the enclosing call.
pub struct ProfilingTraceSink<R = DefaultLabelResolver> {
    resolver: R,
    mask: TraceMask,
    open: Vec<OpenScope>,
}

impl ProfilingTraceSink<DefaultLabelResolver> {
    /// Create a new sink with address/code-based labels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: LabelResolver> ProfilingTraceSink<R> {
    /// Create a new sink with a custom label resolver.
    #[must_use]
    pub fn with_resolver(resolver: R) -> Self {
        Self {
            resolver,
            mask: TraceMask::ALL,
            open: Vec::new(),
        }
    }

    /// Restrict the scopes this sink asks for.
    #[must_use]
    pub fn with_mask(mut self, mask: TraceMask) -> Self {
        self.mask = mask;
        self
    }

    /// Number of currently open scopes.
    #[must_use]
    pub fn open_scopes(&self) -> usize {
        self.open.len()
    }

    fn label(&mut self, symbols: &dyn SymbolLookup, kind: ScopeKind) -> String {
        match kind {
            ScopeKind::GuestCall { address } => self
                .resolver
                .guest_call_label(address, symbols)
                .unwrap_or_else(|| default_guest_call_label(address)),
            ScopeKind::Dispatch { code, sub_op } => self
                .resolver
                .dispatch_label(code, sub_op)
                .unwrap_or_else(|| default_dispatch_label(code, sub_op)),
        }
    }

    fn start_scope(&self, kind: ScopeKind, label: &str) -> Option<tracy_client::Span> {
        let (function_name, line) = match kind {
            ScopeKind::GuestCall { .. } => ("guest_bridge.guest_call", 0),
            ScopeKind::Dispatch { code, .. } => ("guest_bridge.dispatch", code),
        };
        let client = tracy_client::Client::running()?;
        // `span_alloc` copies the label, so it need not outlive the span.
        Some(client.span_alloc(Some(label), function_name, "guest_bridge", line, 0))
    }

    /// Closes every scope above `len`, innermost first.
    fn close_to(&mut self, len: usize) {
        while self.open.len() > len {
            if let Some(scope) = self.open.pop() {
                drop(scope.span);
            }
        }
    }
}

impl<R: LabelResolver> TraceSink for ProfilingTraceSink<R> {
    fn mask(&self) -> TraceMask {
        self.mask
    }

    fn scope_enter(&mut self, symbols: &dyn SymbolLookup, kind: ScopeKind, depth: usize) {
        let label = self.label(symbols, kind);
        let span = self.start_scope(kind, &label);
        self.open.push(OpenScope { kind, depth, span });
    }

    fn scope_exit(&mut self, kind: ScopeKind, depth: usize) {
        let matching = self
            .open
            .iter()
            .rposition(|scope| scope.kind == kind && scope.depth == depth);
        // An exit that matches nothing open was never entered here (it was masked, or the sink
        // was installed mid-call); it closes nothing.
        if let Some(at) = matching {
            self.close_to(at);
        }
    }
}

impl<R> Drop for ProfilingTraceSink<R> {
    fn drop(&mut self) {
        while let Some(scope) = self.open.pop() {
            drop(scope.span);
        }
    }
}

impl<R> Default for ProfilingTraceSink<R>
where
    R: LabelResolver + Default,
{
    fn default() -> Self {
        Self::with_resolver(R::default())
    }
}

impl<R> std::fmt::Debug for ProfilingTraceSink<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfilingTraceSink")
            .field("mask", &self.mask)
            .field("open_scopes", &self.open.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::ProfilingTraceSink;
    use guest_bridge::machine::NoSymbols;
    use guest_bridge::trace::{ScopeKind, TraceMask, TraceSink};

    const CALL: ScopeKind = ScopeKind::GuestCall { address: 0x1000 };
    const OP: ScopeKind = ScopeKind::Dispatch {
        code: 521,
        sub_op: 1,
    };

    #[test]
    fn start_scope_without_tracy_client_does_not_panic() {
        let sink = ProfilingTraceSink::new();
        let _span = sink.start_scope(CALL, "test");
    }

    #[test]
    fn nested_scopes_close_in_order() {
        let mut sink = ProfilingTraceSink::new().with_mask(TraceMask::DISPATCH);
        assert_eq!(sink.mask(), TraceMask::DISPATCH);
        sink.scope_enter(&NoSymbols, CALL, 0);
        sink.scope_enter(&NoSymbols, OP, 1);
        assert_eq!(sink.open_scopes(), 2);
        sink.scope_exit(OP, 1);
        assert_eq!(sink.open_scopes(), 1);
        sink.scope_exit(CALL, 0);
        assert_eq!(sink.open_scopes(), 0);
    }

    #[test]
    fn exiting_a_call_closes_operations_left_open() {
        let mut sink = ProfilingTraceSink::new();
        sink.scope_enter(&NoSymbols, CALL, 0);
        sink.scope_enter(&NoSymbols, OP, 1);
        sink.scope_exit(CALL, 0);
        assert_eq!(sink.open_scopes(), 0);
    }

    #[test]
    fn unmatched_exits_close_nothing() {
        let mut sink = ProfilingTraceSink::new();
        sink.scope_enter(&NoSymbols, CALL, 0);
        sink.scope_exit(OP, 7);
        sink.scope_exit(CALL, 3);
        assert_eq!(sink.open_scopes(), 1);
    }
}
