// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structured reports for abandoned guest calls.

use crate::error::BridgeError;
use crate::machine::{FaultReport, GuestAddr};

/// What went wrong.
#[derive(Clone, Debug, PartialEq)]
pub enum DiagnosticKind<'a> {
    /// The step budget ran out.
    Timeout {
        /// Value of the sandbox's timeout counter after this timeout.
        count: u64,
        /// Program counter when the budget ran out.
        pc: GuestAddr,
    },
    /// The engine raised a fault.
    Fault(&'a FaultReport),
    /// A trap handler failed and the run was abandoned.
    Trap(&'a BridgeError),
}

/// One abandoned call.
#[derive(Clone, Debug, PartialEq)]
pub struct DiagnosticEvent<'a> {
    /// Sandbox name.
    pub sandbox: &'a str,
    /// Called guest address.
    pub address: GuestAddr,
    /// Symbol of the called address, if known.
    pub symbol: Option<&'a str>,
    /// Details.
    pub kind: DiagnosticKind<'a>,
}

/// Receives diagnostic events.
pub trait DiagnosticSink {
    /// Reports one event.
    fn report(&mut self, event: &DiagnosticEvent<'_>);
}

/// Writes events to the `log` facade.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogDiagnostics;

impl DiagnosticSink for LogDiagnostics {
    fn report(&mut self, event: &DiagnosticEvent<'_>) {
        let symbol = event.symbol.unwrap_or("<unknown>");
        match &event.kind {
            DiagnosticKind::Timeout { count, pc } => log::warn!(
                "[{}] execution timed out in {symbol} ({:#x}) at pc {pc:#x}; {count} timeouts so far",
                event.sandbox,
                event.address,
            ),
            DiagnosticKind::Fault(report) => {
                log::error!(
                    "[{}] exception in {symbol} ({:#x}): {} (data: {:#x})",
                    event.sandbox,
                    event.address,
                    report.message,
                    report.data,
                );
                log::error!("[{}] -> instruction: {}", event.sandbox, report.instruction);
                log::error!("[{}] -> registers: {}", event.sandbox, report.registers);
                log::error!("[{}] -> program page: {}", event.sandbox, report.program_page);
                log::error!("[{}] -> stack page: {}", event.sandbox, report.stack_page);
            }
            DiagnosticKind::Trap(err) => log::error!(
                "[{}] operation failed in {symbol} ({:#x}): {err}",
                event.sandbox,
                event.address,
            ),
        }
    }
}
