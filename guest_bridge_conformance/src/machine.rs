// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use guest_bridge::background::{TaskSpawner, Translator};
use guest_bridge::guest::{GuestVariant, read_variants, write_variants};
use guest_bridge::machine::{
    FaultReport, FlatMemory, GuestAddr, GuestMachine, GuestMemory, MachineStop, MemoryFault,
    Symbol, SymbolLookup, TrapFrame, TrapHandler,
};
use guest_bridge::ops::Syscall;

/// Size of the fake guest memory.
pub const MEMORY_SIZE: usize = 0x1_0000;
/// Where traps place their argument buffer.
pub const ARGS_AT: GuestAddr = 0x1000;
/// Where traps receive their result.
pub const RESULT_AT: GuestAddr = 0x1800;
/// Start of scratch memory free for test data (up to the stack floor).
pub const HEAP_AT: GuestAddr = 0x2000;
/// Address of the first defined function.
pub const CODE_BASE: GuestAddr = 0x10_0000;

const FUNCTION_STRIDE: GuestAddr = 0x100;
const STACK_FLOOR: GuestAddr = 0x8000;
const ARG_REGISTERS: usize = 8;

type GuestFn = Box<dyn FnMut(&mut GuestCpu<'_>) -> Result<u64, MachineStop>>;

struct Function {
    name: String,
    // Taken out while the function runs.
    body: Option<GuestFn>,
    translated: Option<String>,
}

/// A fake execution engine whose guest functions are Rust closures.
///
/// Functions live at `CODE_BASE + n * 0x100` in definition order. The entry point is the
/// function named `_start`, or the first one.
pub struct ScriptedMachine {
    memory: FlatMemory,
    functions: Vec<Function>,
    int_args: [u64; ARG_REGISTERS],
    float_args: [f64; ARG_REGISTERS],
    sp: GuestAddr,
    ret: u64,
    steps_used: u64,
    calls: u64,
    translator: Option<Translator<String, Box<dyn TaskSpawner>>>,
}

impl ScriptedMachine {
    /// Creates a machine with no functions.
    pub fn new() -> Self {
        Self {
            memory: FlatMemory::new(MEMORY_SIZE),
            functions: Vec::new(),
            int_args: [0; ARG_REGISTERS],
            float_args: [0.0; ARG_REGISTERS],
            sp: MEMORY_SIZE as GuestAddr,
            ret: 0,
            steps_used: 0,
            calls: 0,
            translator: None,
        }
    }

    /// Translates each function in the background the first time it runs.
    ///
    /// A finished translation is picked up when execution next enters the function.
    #[must_use]
    pub fn with_translation(mut self, spawner: impl TaskSpawner + 'static) -> Self {
        let spawner: Box<dyn TaskSpawner> = Box::new(spawner);
        self.translator = Some(Translator::new(spawner));
        self
    }

    /// The translation installed for the function at `address`, if any.
    pub fn translation(&self, address: GuestAddr) -> Option<&str> {
        let function = self.functions.get(Self::index_of(address)?)?;
        function.translated.as_deref()
    }

    /// Defines a guest function and returns its address.
    pub fn define<F>(&mut self, name: &str, body: F) -> GuestAddr
    where
        F: FnMut(&mut GuestCpu<'_>) -> Result<u64, MachineStop> + 'static,
    {
        let address = CODE_BASE + FUNCTION_STRIDE * self.functions.len() as GuestAddr;
        self.functions.push(Function {
            name: name.into(),
            body: Some(Box::new(body)),
            translated: None,
        });
        address
    }

    /// Builder form of [`ScriptedMachine::define`].
    #[must_use]
    pub fn with_function<F>(mut self, name: &str, body: F) -> Self
    where
        F: FnMut(&mut GuestCpu<'_>) -> Result<u64, MachineStop> + 'static,
    {
        self.define(name, body);
        self
    }

    /// Integer argument registers as set up for the last call.
    pub fn int_args(&self) -> &[u64] {
        &self.int_args
    }

    /// Float argument registers as set up for the last call.
    pub fn float_args(&self) -> &[f64] {
        &self.float_args
    }

    /// Guest memory.
    pub fn memory(&self) -> &FlatMemory {
        &self.memory
    }

    /// Mutable guest memory.
    pub fn memory_mut(&mut self) -> &mut FlatMemory {
        &mut self.memory
    }

    /// Steps consumed by the last run.
    pub fn steps_used(&self) -> u64 {
        self.steps_used
    }

    /// Number of runs started.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Installs a finished translation for `index`, or starts one.
    fn translate_on_entry(&mut self, index: usize, address: GuestAddr) {
        let (Some(translator), Some(function)) =
            (self.translator.as_mut(), self.functions.get_mut(index))
        else {
            return;
        };
        if function.translated.is_some() {
            return;
        }
        if let Some(done) = translator.poll(address) {
            function.translated = Some(done);
            return;
        }
        let name = function.name.clone();
        translator.submit(address, move || format!("{name}@{address:#x}"));
    }

    fn index_of(address: GuestAddr) -> Option<usize> {
        let offset = address.checked_sub(CODE_BASE)?;
        if offset % FUNCTION_STRIDE != 0 {
            return None;
        }
        usize::try_from(offset / FUNCTION_STRIDE).ok()
    }
}

impl Default for ScriptedMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptedMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedMachine")
            .field("functions", &self.functions.len())
            .field("sp", &self.sp)
            .field("calls", &self.calls)
            .finish_non_exhaustive()
    }
}

impl GuestMemory for ScriptedMachine {
    fn read(&self, address: GuestAddr, out: &mut [u8]) -> Result<(), MemoryFault> {
        self.memory.read(address, out)
    }

    fn write(&mut self, address: GuestAddr, bytes: &[u8]) -> Result<(), MemoryFault> {
        self.memory.write(address, bytes)
    }
}

impl SymbolLookup for ScriptedMachine {
    fn symbol_at(&self, address: GuestAddr) -> Option<Symbol> {
        let offset = address.checked_sub(CODE_BASE)?;
        let index = usize::try_from(offset / FUNCTION_STRIDE).ok()?;
        let function = self.functions.get(index)?;
        Some(Symbol {
            name: function.name.clone(),
            address: address - offset % FUNCTION_STRIDE,
        })
    }
}

impl GuestMachine for ScriptedMachine {
    fn prepare_call(&mut self) {
        self.int_args = [0; ARG_REGISTERS];
        self.float_args = [0.0; ARG_REGISTERS];
        self.sp = MEMORY_SIZE as GuestAddr;
    }

    fn push_stack(&mut self, bytes: &[u8]) -> Result<GuestAddr, MemoryFault> {
        let fault = MemoryFault {
            address: self.sp,
            len: bytes.len(),
        };
        let aligned = (bytes.len() as GuestAddr + 15) & !15;
        let sp = self
            .sp
            .checked_sub(aligned)
            .filter(|sp| *sp >= STACK_FLOOR)
            .ok_or(fault)?;
        self.memory.write(sp, bytes)?;
        self.sp = sp;
        Ok(sp)
    }

    fn set_int_arg(&mut self, slot: usize, value: u64) {
        if let Some(register) = self.int_args.get_mut(slot) {
            *register = value;
        }
    }

    fn set_float_arg(&mut self, slot: usize, value: f64) {
        if let Some(register) = self.float_args.get_mut(slot) {
            *register = value;
        }
    }

    fn run(
        &mut self,
        address: GuestAddr,
        max_steps: u64,
        traps: &mut dyn TrapHandler,
    ) -> Result<(), MachineStop> {
        self.calls += 1;
        self.steps_used = 0;
        let fetch_fault = || {
            MachineStop::Fault(FaultReport {
                pc: address,
                message: "instruction fetch fault".into(),
                data: address,
                ..FaultReport::default()
            })
        };
        let index = Self::index_of(address).ok_or_else(fetch_fault)?;
        self.translate_on_entry(index, address);
        let mut body = self
            .functions
            .get_mut(index)
            .and_then(|f| f.body.take())
            .ok_or_else(fetch_fault)?;
        let mut cpu = GuestCpu {
            memory: &mut self.memory,
            traps,
            int_args: self.int_args,
            float_args: self.float_args,
            pc: address,
            steps_left: max_steps,
        };
        let outcome = body(&mut cpu);
        self.steps_used = max_steps - cpu.steps_left;
        self.functions[index].body = Some(body);
        self.ret = outcome?;
        Ok(())
    }

    fn return_value(&self) -> u64 {
        self.ret
    }

    fn entry_point(&self) -> GuestAddr {
        self.address_of("_start").unwrap_or(CODE_BASE)
    }

    fn address_of(&self, name: &str) -> Option<GuestAddr> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(|i| CODE_BASE + FUNCTION_STRIDE * i as GuestAddr)
    }
}

/// What a scripted guest function sees while it runs.
pub struct GuestCpu<'a> {
    memory: &'a mut FlatMemory,
    traps: &'a mut dyn TrapHandler,
    int_args: [u64; ARG_REGISTERS],
    float_args: [f64; ARG_REGISTERS],
    pc: GuestAddr,
    steps_left: u64,
}

impl GuestCpu<'_> {
    /// Integer argument register `slot`.
    pub fn int_arg(&self, slot: usize) -> u64 {
        self.int_args.get(slot).copied().unwrap_or(0)
    }

    /// Float argument register `slot`.
    pub fn float_arg(&self, slot: usize) -> f64 {
        self.float_args.get(slot).copied().unwrap_or(0.0)
    }

    /// Reads a `(pointer, length)` string passed in integer slots `slot` and `slot + 1`.
    pub fn string_arg(&self, slot: usize) -> Result<String, MachineStop> {
        let len = usize::try_from(self.int_arg(slot + 1)).map_err(|_| self.fault("bad length"))?;
        let mut bytes = vec![0_u8; len];
        self.memory
            .read(self.int_arg(slot), &mut bytes)
            .map_err(|_| self.fault("load access fault"))?;
        String::from_utf8(bytes).map_err(|_| self.fault("invalid utf-8"))
    }

    /// Consumes `n` steps, or runs out of budget.
    pub fn step(&mut self, n: u64) -> Result<(), MachineStop> {
        if self.steps_left < n {
            self.pc += 4 * self.steps_left;
            self.steps_left = 0;
            return Err(MachineStop::Timeout { pc: self.pc });
        }
        self.steps_left -= n;
        self.pc += 4 * n;
        Ok(())
    }

    /// Loops until the step budget runs out.
    pub fn spin(&mut self) -> MachineStop {
        match self.step(self.steps_left.saturating_add(1)) {
            Err(stop) => stop,
            Ok(()) => MachineStop::Timeout { pc: self.pc },
        }
    }

    /// An engine fault at the current program counter.
    pub fn fault(&self, message: &str) -> MachineStop {
        MachineStop::Fault(FaultReport {
            pc: self.pc,
            message: message.into(),
            data: self.pc,
            instruction: "unimp".into(),
            registers: format!("a0={:#x} a1={:#x}", self.int_arg(0), self.int_arg(1)),
            program_page: "r-x".into(),
            stack_page: "rw-".into(),
        })
    }

    /// Raises a trap for `call` and returns the single result.
    pub fn trap(
        &mut self,
        call: Syscall,
        sub_op: u32,
        args: &[GuestVariant],
    ) -> Result<GuestVariant, MachineStop> {
        self.trap_raw(call.code(), sub_op, args)
    }

    /// Raises a trap with a raw operation code.
    pub fn trap_raw(
        &mut self,
        code: u32,
        sub_op: u32,
        args: &[GuestVariant],
    ) -> Result<GuestVariant, MachineStop> {
        self.step(1)?;
        write_variants(&mut *self.memory, ARGS_AT, args).map_err(MachineStop::Trap)?;
        write_variants(&mut *self.memory, RESULT_AT, &[GuestVariant::NIL])
            .map_err(MachineStop::Trap)?;
        let frame = TrapFrame {
            code,
            sub_op,
            args: ARGS_AT,
            argc: u32::try_from(args.len()).unwrap_or(u32::MAX),
            result: RESULT_AT,
        };
        self.traps
            .on_trap(&mut *self.memory, frame)
            .map_err(MachineStop::Trap)?;
        let result = read_variants(&*self.memory, RESULT_AT, 1).map_err(MachineStop::Trap)?;
        Ok(result.first().copied().unwrap_or(GuestVariant::NIL))
    }

    /// Guest memory.
    pub fn memory(&mut self) -> &mut FlatMemory {
        &mut *self.memory
    }
}

impl std::fmt::Debug for GuestCpu<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestCpu")
            .field("pc", &self.pc)
            .field("steps_left", &self.steps_left)
            .finish_non_exhaustive()
    }
}
