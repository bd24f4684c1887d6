// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Background translation picked up on re-entry into guest code.

use std::time::{Duration, Instant};

use guest_bridge::background::{InlineSpawner, ThreadSpawner};
use guest_bridge::{Sandbox, Variant};
use guest_bridge_conformance::{CODE_BASE, SceneHost, ScriptedMachine, TestSandbox};

fn translating(machine: ScriptedMachine) -> TestSandbox {
    Sandbox::new(machine, SceneHost::new()).with_name("test")
}

#[test]
fn translations_are_installed_on_the_next_entry() {
    let machine = ScriptedMachine::new()
        .with_function("tick", |cpu| {
            cpu.step(1)?;
            Ok(1)
        })
        .with_function("idle", |_| Ok(0))
        .with_translation(InlineSpawner);
    let mut sandbox = translating(machine);
    let tick = sandbox.address_of("tick").unwrap();
    let idle = sandbox.address_of("idle").unwrap();
    assert_eq!(tick, CODE_BASE);

    assert_eq!(sandbox.vmcall("tick", &[]), Ok(Variant::Int(1)));
    assert_eq!(sandbox.machine().translation(tick), None);

    assert_eq!(sandbox.vmcall("tick", &[]), Ok(Variant::Int(1)));
    assert_eq!(sandbox.machine().translation(tick), Some("tick@0x100000"));
    assert_eq!(sandbox.machine().translation(idle), None);

    // Installed translations stay put.
    assert_eq!(sandbox.vmcall("tick", &[]), Ok(Variant::Int(1)));
    assert_eq!(sandbox.machine().translation(tick), Some("tick@0x100000"));
}

#[test]
fn threaded_translation_never_blocks_a_call() {
    let machine = ScriptedMachine::new()
        .with_function("work", |_| Ok(7))
        .with_translation(ThreadSpawner::default());
    let mut sandbox = translating(machine);
    let work = sandbox.address_of("work").unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut calls = 0;
    while sandbox.machine().translation(work).is_none() {
        assert_eq!(sandbox.vmcall("work", &[]), Ok(Variant::Int(7)));
        calls += 1;
        assert!(Instant::now() < deadline, "translation never arrived");
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(calls >= 2, "the first call can only start the job");
    assert_eq!(sandbox.machine().translation(work), Some("work@0x100000"));
}
