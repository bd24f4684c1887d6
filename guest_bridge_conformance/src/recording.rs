// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::cell::RefCell;
use std::rc::Rc;

use guest_bridge::diagnostics::{DiagnosticEvent, DiagnosticKind, DiagnosticSink};
use guest_bridge::machine::{GuestAddr, SymbolLookup};
use guest_bridge::trace::{ScopeKind, TraceMask, TraceSink};

/// An owned copy of one diagnostic event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recorded {
    /// Sandbox name.
    pub sandbox: String,
    /// Called address.
    pub address: GuestAddr,
    /// Symbol, if resolved.
    pub symbol: Option<String>,
    /// `timeout`, `fault` or `trap`.
    pub kind: &'static str,
    /// Timeout count, fault message or error text.
    pub detail: String,
}

/// Collects diagnostic events; clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct RecordingDiagnostics {
    events: Rc<RefCell<Vec<Recorded>>>,
}

impl RecordingDiagnostics {
    /// Events recorded so far.
    pub fn events(&self) -> Vec<Recorded> {
        self.events.borrow().clone()
    }
}

impl DiagnosticSink for RecordingDiagnostics {
    fn report(&mut self, event: &DiagnosticEvent<'_>) {
        let (kind, detail) = match &event.kind {
            DiagnosticKind::Timeout { count, .. } => ("timeout", count.to_string()),
            DiagnosticKind::Fault(report) => ("fault", report.message.clone()),
            DiagnosticKind::Trap(err) => ("trap", err.to_string()),
        };
        self.events.borrow_mut().push(Recorded {
            sandbox: event.sandbox.into(),
            address: event.address,
            symbol: event.symbol.map(String::from),
            kind,
            detail,
        });
    }
}

/// Collects trace scopes as `enter`/`exit` lines; clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct RecordingTrace {
    mask: TraceMask,
    lines: Rc<RefCell<Vec<String>>>,
}

impl RecordingTrace {
    /// A recorder asking for `mask`.
    pub fn new(mask: TraceMask) -> Self {
        Self {
            mask,
            lines: Rc::default(),
        }
    }

    /// Lines recorded so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}

fn describe(kind: ScopeKind) -> String {
    match kind {
        ScopeKind::GuestCall { address } => format!("call {address:#x}"),
        ScopeKind::Dispatch { code, sub_op } => format!("op {code}/{sub_op}"),
    }
}

impl TraceSink for RecordingTrace {
    fn mask(&self) -> TraceMask {
        self.mask
    }

    fn scope_enter(&mut self, symbols: &dyn SymbolLookup, kind: ScopeKind, depth: usize) {
        let name = match kind {
            ScopeKind::GuestCall { address } => symbols.symbol_at(address).map(|s| s.name),
            ScopeKind::Dispatch { .. } => None,
        };
        let line = match name {
            Some(name) => format!("enter {} {name} @{depth}", describe(kind)),
            None => format!("enter {} @{depth}", describe(kind)),
        };
        self.lines.borrow_mut().push(line);
    }

    fn scope_exit(&mut self, kind: ScopeKind, depth: usize) {
        self.lines
            .borrow_mut()
            .push(format!("exit {} @{depth}", describe(kind)));
    }
}
