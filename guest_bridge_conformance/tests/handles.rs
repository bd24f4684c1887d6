// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Handle identity, round trips, namespaces and teardown.

use guest_bridge::guest::GuestVariant;
use guest_bridge::math::{Color, Vector2, Vector3, Vector3i};
use guest_bridge::ops::Syscall;
use guest_bridge::policy::AllowAll;
use guest_bridge::variant::Dictionary;
use guest_bridge::{BridgeError, Kind, Sandbox, TaggedValue, Variant};
use guest_bridge_conformance::{
    HEAP_AT, SceneHost, ScriptedMachine, arg, result, sandbox, text_arg, trap,
};

#[test]
fn exposing_an_object_twice_yields_one_handle() {
    let mut sandbox = sandbox();
    let root = sandbox.host().root();
    let first = sandbox.expose_object(root).unwrap();
    let second = sandbox.expose_object(root).unwrap();
    assert_eq!(first, second);
    assert_eq!(sandbox.registry().object_count(), 1);
}

#[test]
fn looking_up_an_object_twice_yields_one_handle() {
    let mut sandbox = sandbox().with_policy(AllowAll);
    let root = sandbox.host().root();
    let game = sandbox.host_mut().add_node(root, "Game", "Node");
    sandbox.host_mut().set_global("Game", game);

    let name = arg(&mut sandbox, "Game").unwrap();
    let first = trap(&mut sandbox, Syscall::GetObj, 0, &[name]).unwrap();
    let second = trap(&mut sandbox, Syscall::GetObj, 0, &[name]).unwrap();
    assert_eq!(first, second);
    assert_eq!(result(&sandbox, first).unwrap(), Variant::Object(game));
    assert_eq!(sandbox.registry().object_count(), 1);
}

#[test]
fn missing_globals_are_nil() {
    let mut sandbox = sandbox();
    let name = arg(&mut sandbox, "Nowhere").unwrap();
    let found = trap(&mut sandbox, Syscall::GetObj, 0, &[name]).unwrap();
    assert_eq!(found, GuestVariant::NIL);
}

#[test]
fn object_handles_survive_lowering_and_lifting() {
    let mut sandbox = sandbox();
    let root = sandbox.host().root();
    let handle = sandbox.expose_object(root).unwrap();
    let raw = GuestVariant::lower(TaggedValue::Object(handle));
    let lifted = raw.lift(sandbox.registry()).unwrap();
    assert_eq!(lifted, TaggedValue::Object(handle));
    assert_eq!(GuestVariant::lower(lifted), raw);
    assert_eq!(sandbox.resolve(lifted).unwrap(), Variant::Object(root));
}

#[test]
fn inline_values_round_trip_without_the_registry() {
    let sandbox = sandbox();
    let values = [
        TaggedValue::Nil,
        TaggedValue::Bool(true),
        TaggedValue::Int(-7),
        TaggedValue::Float(2.5),
        TaggedValue::Vector2(Vector2::new(1.0, -2.0)),
        TaggedValue::Vector3(Vector3::new(0.5, 1.5, 2.5)),
        TaggedValue::Vector3i(Vector3i::new(1, 2, 3)),
        TaggedValue::Color(Color::new(0.25, 0.5, 0.75, 1.0)),
    ];
    for value in values {
        let lifted = GuestVariant::lower(value).lift(sandbox.registry()).unwrap();
        assert_eq!(lifted, value);
    }
    assert!(sandbox.registry().is_empty());
}

#[test]
fn host_values_round_trip_through_the_registry() {
    let mut sandbox = sandbox();
    let root = sandbox.host().root();
    let mut dict = Dictionary::new();
    dict.insert(Variant::from("name"), Variant::from("root"));
    dict.insert(Variant::Int(1), Variant::Object(root));
    let values = [
        Variant::from("hello"),
        Variant::StringName("ready".into()),
        Variant::NodePath("/root/Level".into()),
        Variant::from(vec![Variant::Int(1), Variant::from("two"), Variant::Nil]),
        Variant::from(dict),
        Variant::PackedInt32Array(vec![3, 1, 2]),
    ];
    for value in values {
        let tagged = sandbox.expose_value(value.clone()).unwrap();
        assert_eq!(sandbox.resolve(tagged).unwrap(), value);
    }
}

#[test]
fn objects_and_values_never_share_a_handle() {
    let mut sandbox = sandbox();
    let root = sandbox.host().root();
    let object = sandbox.expose_object(root).unwrap();
    let text = sandbox.expose_value(Variant::from("hi")).unwrap();
    let value = text.handle().unwrap();
    assert_ne!(object, value);

    let object_as_text = GuestVariant::with_handle(Kind::String, object);
    assert_eq!(
        object_as_text.lift(sandbox.registry()),
        Err(BridgeError::TypeMismatch {
            expected: "String",
            found: Kind::Object.wire(),
        })
    );
    let text_as_object = GuestVariant::with_handle(Kind::Object, value);
    assert_eq!(
        text_as_object.lift(sandbox.registry()),
        Err(BridgeError::TypeMismatch {
            expected: "Object",
            found: Kind::String.wire(),
        })
    );
}

#[test]
fn unissued_handles_do_not_resolve() {
    let sandbox = sandbox();
    let forged = GuestVariant::with_handle(Kind::Array, guest_bridge::Handle::new(77));
    assert_eq!(
        forged.lift(sandbox.registry()),
        Err(BridgeError::UnknownHandle(77))
    );
}

#[test]
fn teardown_invalidates_every_handle() {
    let mut sandbox = sandbox();
    let root = sandbox.host().root();
    let object = sandbox.expose_object(root).unwrap();
    let text = sandbox.expose_value(Variant::from("kept")).unwrap();
    let old_epoch = sandbox.epoch();

    sandbox.teardown();
    assert!(sandbox.is_torn_down());
    assert_eq!(sandbox.epoch(), old_epoch + 1);
    assert!(sandbox.registry().is_empty());
    assert_eq!(
        sandbox.registry().object(object),
        Err(BridgeError::UnknownHandle(u64::from(object.as_u32())))
    );
    assert!(sandbox.resolve(text).is_err());
}

#[test]
fn teardown_is_idempotent() {
    let mut sandbox = sandbox();
    sandbox.teardown();
    let epoch = sandbox.epoch();
    sandbox.teardown();
    assert_eq!(sandbox.epoch(), epoch);
}

#[test]
#[should_panic(expected = "called after teardown")]
fn guest_calls_after_teardown_panic() {
    let machine = ScriptedMachine::new().with_function("noop", |_| Ok(0));
    let mut sandbox = Sandbox::new(machine, SceneHost::new());
    sandbox.teardown();
    let _ = sandbox.vmcall_address(guest_bridge_conformance::CODE_BASE, &[]);
}

#[test]
#[should_panic(expected = "called after teardown")]
fn traps_after_teardown_panic() {
    let mut sandbox = sandbox();
    sandbox.teardown();
    let [ptr, len] = text_arg(&mut sandbox, HEAP_AT, "zombie").unwrap();
    let _ = trap(&mut sandbox, Syscall::StringCreate, 0, &[ptr, len]);
}

#[test]
#[should_panic(expected = "called after teardown")]
fn exposing_objects_after_teardown_panics() {
    let mut sandbox = sandbox();
    let root = sandbox.host().root();
    sandbox.teardown();
    let _ = sandbox.expose_object(root);
}

#[test]
#[should_panic(expected = "called after teardown")]
fn exposing_values_after_teardown_panics() {
    let mut sandbox = sandbox();
    sandbox.teardown();
    let _ = sandbox.expose_value(Variant::from("late"));
}

#[test]
#[should_panic(expected = "torn down")]
fn callables_from_an_earlier_epoch_panic() {
    let machine = ScriptedMachine::new().with_function("noop", |_| Ok(0));
    let mut sandbox = Sandbox::new(machine, SceneHost::new());
    let callable = sandbox.vmcallable("noop").unwrap();
    assert_eq!(sandbox.invoke(&callable, &[]), Ok(Variant::Int(0)));
    sandbox.teardown();
    let _ = sandbox.invoke(&callable, &[]);
}

#[test]
#[should_panic(expected = "foreign sandbox")]
fn callables_are_bound_to_their_sandbox() {
    let machine = ScriptedMachine::new().with_function("noop", |_| Ok(0));
    let mut first = Sandbox::new(machine, SceneHost::new());
    let callable = first.vmcallable("noop").unwrap();
    let mut second = sandbox();
    let _ = second.invoke(&callable, &[]);
}
