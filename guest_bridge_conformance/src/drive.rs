// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Running single operations through a sandbox, the way a trapping guest would.

use guest_bridge::guest::{GuestVariant, read_variants, write_variants};
use guest_bridge::host::Host;
use guest_bridge::machine::{GuestAddr, GuestMemory, TrapFrame};
use guest_bridge::ops::Syscall;
use guest_bridge::value::TaggedValue;
use guest_bridge::variant::Variant;
use guest_bridge::{BridgeError, Sandbox};

use crate::machine::{ARGS_AT, RESULT_AT, ScriptedMachine};
use crate::scene::SceneHost;

/// The sandbox type most tests use.
pub type TestSandbox = Sandbox<ScriptedMachine, SceneHost>;

/// A sandbox named `test` over an empty machine and a fresh scene.
pub fn sandbox() -> TestSandbox {
    Sandbox::new(ScriptedMachine::new(), SceneHost::new()).with_name("test")
}

/// Dispatches `call` with guest-layout `args` and returns the raw result.
pub fn trap<H: Host>(
    sandbox: &mut Sandbox<ScriptedMachine, H>,
    call: Syscall,
    sub_op: u32,
    args: &[GuestVariant],
) -> Result<GuestVariant, BridgeError> {
    trap_raw(sandbox, call.code(), sub_op, args)
}

/// Like [`trap`], with a raw operation code.
pub fn trap_raw<H: Host>(
    sandbox: &mut Sandbox<ScriptedMachine, H>,
    code: u32,
    sub_op: u32,
    args: &[GuestVariant],
) -> Result<GuestVariant, BridgeError> {
    let memory = sandbox.machine_mut().memory_mut();
    write_variants(&mut *memory, ARGS_AT, args)?;
    write_variants(memory, RESULT_AT, &[GuestVariant::NIL])?;
    sandbox.handle_trap(TrapFrame {
        code,
        sub_op,
        args: ARGS_AT,
        argc: u32::try_from(args.len()).unwrap_or(u32::MAX),
        result: RESULT_AT,
    })?;
    let out = read_variants(sandbox.machine().memory(), RESULT_AT, 1)?;
    Ok(out.first().copied().unwrap_or(GuestVariant::NIL))
}

/// Dispatches `call` and converts the result into a host value.
pub fn call<H: Host>(
    sandbox: &mut Sandbox<ScriptedMachine, H>,
    call: Syscall,
    sub_op: u32,
    args: &[GuestVariant],
) -> Result<Variant, BridgeError> {
    let raw = trap(sandbox, call, sub_op, args)?;
    result(sandbox, raw)
}

/// Like [`call`], with a raw operation code.
pub fn call_raw<H: Host>(
    sandbox: &mut Sandbox<ScriptedMachine, H>,
    code: u32,
    sub_op: u32,
    args: &[GuestVariant],
) -> Result<Variant, BridgeError> {
    let raw = trap_raw(sandbox, code, sub_op, args)?;
    result(sandbox, raw)
}

/// Hands a host value to the guest and returns its guest layout.
pub fn arg<H: Host>(
    sandbox: &mut Sandbox<ScriptedMachine, H>,
    value: impl Into<Variant>,
) -> Result<GuestVariant, BridgeError> {
    sandbox.expose_value(value.into()).map(GuestVariant::lower)
}

/// Writes `text` into guest memory at `address` and returns `(pointer, length)` arguments.
pub fn text_arg<H: Host>(
    sandbox: &mut Sandbox<ScriptedMachine, H>,
    address: GuestAddr,
    text: &str,
) -> Result<[GuestVariant; 2], BridgeError> {
    sandbox
        .machine_mut()
        .memory_mut()
        .write(address, text.as_bytes())?;
    Ok([
        GuestVariant::int(address as i64),
        GuestVariant::int(text.len() as i64),
    ])
}

/// Lifts a raw result and converts it into a host value.
pub fn result<H: Host>(
    sandbox: &Sandbox<ScriptedMachine, H>,
    raw: GuestVariant,
) -> Result<Variant, BridgeError> {
    let value: TaggedValue = raw.lift(sandbox.registry())?;
    sandbox.resolve(value)
}
