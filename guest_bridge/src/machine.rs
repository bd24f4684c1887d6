// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Execution engine contract.
//!
//! The instruction-level emulator lives outside this crate. It implements [`GuestMachine`], runs
//! guest code under a step budget and reports every trap to a [`TrapHandler`]. The bridge only
//! ever sees guest memory through [`GuestMemory`] byte ranges.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::error::BridgeError;

/// A guest address.
pub type GuestAddr = u64;

/// A guest memory range that could not be accessed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryFault {
    /// Start of the range.
    pub address: GuestAddr,
    /// Range length.
    pub len: usize,
}

impl From<MemoryFault> for BridgeError {
    fn from(fault: MemoryFault) -> Self {
        Self::MemoryAccess {
            address: fault.address,
            len: fault.len,
        }
    }
}

/// Byte-range access to guest memory.
pub trait GuestMemory {
    /// Fills `out` from guest memory at `address`.
    fn read(&self, address: GuestAddr, out: &mut [u8]) -> Result<(), MemoryFault>;

    /// Writes `bytes` to guest memory at `address`.
    fn write(&mut self, address: GuestAddr, bytes: &[u8]) -> Result<(), MemoryFault>;
}

/// Reads `len` bytes, refusing copies larger than `limit`.
pub fn read_bytes(
    memory: &dyn GuestMemory,
    address: GuestAddr,
    len: usize,
    limit: usize,
) -> Result<Vec<u8>, BridgeError> {
    if len > limit {
        return Err(BridgeError::LimitExceeded {
            what: "guest copy length",
            limit,
        });
    }
    let mut out = vec![0_u8; len];
    memory.read(address, &mut out)?;
    Ok(out)
}

/// Writes `bytes`, refusing copies larger than `limit`.
pub fn write_bytes(
    memory: &mut dyn GuestMemory,
    address: GuestAddr,
    bytes: &[u8],
    limit: usize,
) -> Result<(), BridgeError> {
    if bytes.len() > limit {
        return Err(BridgeError::LimitExceeded {
            what: "guest copy length",
            limit,
        });
    }
    memory.write(address, bytes)?;
    Ok(())
}

/// A guest symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    /// Symbol name.
    pub name: String,
    /// Start address.
    pub address: GuestAddr,
}

/// Symbol lookup by address.
pub trait SymbolLookup {
    /// Returns the symbol containing `address`.
    fn symbol_at(&self, address: GuestAddr) -> Option<Symbol>;
}

/// A lookup that knows no symbols.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoSymbols;

impl SymbolLookup for NoSymbols {
    fn symbol_at(&self, _address: GuestAddr) -> Option<Symbol> {
        None
    }
}

/// Engine-provided context for a fault.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FaultReport {
    /// Program counter at the fault.
    pub pc: GuestAddr,
    /// Engine message.
    pub message: String,
    /// Fault-specific data word (faulting address, bad instruction bits, ...).
    pub data: u64,
    /// Disassembly of the faulting instruction.
    pub instruction: String,
    /// Register dump.
    pub registers: String,
    /// Description of the page holding `pc`.
    pub program_page: String,
    /// Description of the page holding the stack pointer.
    pub stack_page: String,
}

/// How a run ended when it did not return normally.
#[derive(Clone, Debug, PartialEq)]
pub enum MachineStop {
    /// The step budget ran out.
    Timeout {
        /// Program counter when the budget ran out.
        pc: GuestAddr,
    },
    /// The engine raised a fault.
    Fault(FaultReport),
    /// A trap handler failed; the run was abandoned.
    Trap(BridgeError),
}

/// A trap raised by the guest to request a host operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TrapFrame {
    /// Operation code.
    pub code: u32,
    /// Sub-operation within the code's group (zero for ungrouped codes).
    pub sub_op: u32,
    /// Guest address of the argument array.
    pub args: GuestAddr,
    /// Number of arguments.
    pub argc: u32,
    /// Guest address receiving the single result value.
    pub result: GuestAddr,
}

/// Receives traps while the guest runs.
pub trait TrapHandler {
    /// Handles one trap. An error stops the run with [`MachineStop::Trap`].
    fn on_trap(
        &mut self,
        memory: &mut dyn GuestMemory,
        frame: TrapFrame,
    ) -> Result<(), BridgeError>;
}

/// The execution engine running one loaded guest program.
pub trait GuestMachine: GuestMemory + SymbolLookup {
    /// Resets registers and the stack pointer for a fresh call.
    fn prepare_call(&mut self);

    /// Pushes `bytes` onto the guest stack and returns their address.
    fn push_stack(&mut self, bytes: &[u8]) -> Result<GuestAddr, MemoryFault>;

    /// Sets integer argument register `slot`.
    fn set_int_arg(&mut self, slot: usize, value: u64);

    /// Sets float argument register `slot`.
    fn set_float_arg(&mut self, slot: usize, value: f64);

    /// Runs from `address` until it returns, for at most `max_steps` steps.
    fn run(
        &mut self,
        address: GuestAddr,
        max_steps: u64,
        traps: &mut dyn TrapHandler,
    ) -> Result<(), MachineStop>;

    /// Integer return register.
    fn return_value(&self) -> u64;

    /// Program entry point.
    fn entry_point(&self) -> GuestAddr;

    /// Resolves an exported symbol by name.
    fn address_of(&self, name: &str) -> Option<GuestAddr>;
}

/// A flat, zero-based guest memory.
///
/// Useful for engines without paging and for tests.
#[derive(Clone, Debug, Default)]
pub struct FlatMemory {
    bytes: Vec<u8>,
}

impl FlatMemory {
    /// Creates `size` bytes of zeroed memory.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    /// Memory size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for zero-sized memory.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn range(
        &self,
        address: GuestAddr,
        len: usize,
    ) -> Result<core::ops::Range<usize>, MemoryFault> {
        let fault = MemoryFault { address, len };
        let start = usize::try_from(address).map_err(|_| fault)?;
        let end = start.checked_add(len).ok_or(fault)?;
        if end > self.bytes.len() {
            return Err(fault);
        }
        Ok(start..end)
    }
}

impl GuestMemory for FlatMemory {
    fn read(&self, address: GuestAddr, out: &mut [u8]) -> Result<(), MemoryFault> {
        let range = self.range(address, out.len())?;
        out.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write(&mut self, address: GuestAddr, bytes: &[u8]) -> Result<(), MemoryFault> {
        let range = self.range(address, bytes.len())?;
        self.bytes[range].copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_memory_bounds() {
        let mut mem = FlatMemory::new(16);
        mem.write(12, &[1, 2, 3, 4]).unwrap();
        let mut out = [0_u8; 4];
        mem.read(12, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(
            mem.write(13, &[0; 4]),
            Err(MemoryFault {
                address: 13,
                len: 4
            })
        );
        assert!(mem.read(u64::MAX, &mut out).is_err());
    }

    #[test]
    fn copies_respect_limit() {
        let mem = FlatMemory::new(64);
        assert_eq!(
            read_bytes(&mem, 0, 33, 32),
            Err(BridgeError::LimitExceeded {
                what: "guest copy length",
                limit: 32
            })
        );
        assert_eq!(read_bytes(&mem, 0, 32, 32).unwrap().len(), 32);
    }
}
