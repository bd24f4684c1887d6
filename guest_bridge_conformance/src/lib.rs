// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test harness for `guest_bridge`.
//!
//! [`ScriptedMachine`] stands in for the execution engine: guest functions are closures over a
//! [`GuestCpu`] that count steps and raise traps. [`SceneHost`] is a small scene tree. [`trap`]
//! and [`call`] run single operations through a sandbox's dispatcher without a guest
//! program.

mod drive;
mod machine;
mod recording;
mod scene;

pub use drive::{TestSandbox, arg, call, call_raw, result, sandbox, text_arg, trap, trap_raw};
pub use machine::{
    ARGS_AT, CODE_BASE, GuestCpu, HEAP_AT, MEMORY_SIZE, RESULT_AT, ScriptedMachine,
};
pub use recording::{Recorded, RecordingDiagnostics, RecordingTrace};
pub use scene::{HostCall, SceneHost, Timer};
