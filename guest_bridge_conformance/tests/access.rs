// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Access policy enforcement on object operations.

use guest_bridge::guest::GuestVariant;
use guest_bridge::ops::{NodeOp, ObjectOp, Syscall};
use guest_bridge::policy::{AllowAll, ObjectAccess};
use guest_bridge::{BridgeError, Handle, Kind, ObjectId, TaggedValue, Variant};
use guest_bridge_conformance::{TestSandbox, arg, call, sandbox, trap};

/// A scene `root/{Level/Player, Secret}` with the sandbox owned by `Level`.
fn level(sandbox: TestSandbox) -> (TestSandbox, ObjectId, ObjectId, ObjectId) {
    let mut sandbox = sandbox;
    let root = sandbox.host().root();
    let level = sandbox.host_mut().add_node(root, "Level", "Node2D");
    let player = sandbox.host_mut().add_node(level, "Player", "Node2D");
    let secret = sandbox.host_mut().add_node(root, "Secret", "Node");
    (sandbox.with_owner(level), level, player, secret)
}

fn object_arg(sandbox: &mut TestSandbox, object: ObjectId) -> GuestVariant {
    let handle = sandbox.expose_object(object).unwrap();
    GuestVariant::lower(TaggedValue::Object(handle))
}

fn no_reflection(_: ObjectId, access: ObjectAccess<'_>) -> bool {
    access != ObjectAccess::Reflect
}

fn read_only(_: ObjectId, access: ObjectAccess<'_>) -> bool {
    !matches!(access, ObjectAccess::Set { .. })
}

#[test]
fn nodes_below_the_owner_are_reachable() {
    let (mut sandbox, _, player, _) = level(sandbox());
    let path = arg(&mut sandbox, "Player").unwrap();
    let found = call(&mut sandbox, Syscall::GetNode, 0, &[GuestVariant::NIL, path]).unwrap();
    assert_eq!(found, Variant::Object(player));
}

#[test]
fn nodes_outside_the_owner_are_denied() {
    let (mut sandbox, _, _, secret) = level(sandbox());
    let path = arg(&mut sandbox, "../Secret").unwrap();
    let objects = sandbox.registry().object_count();
    let values = sandbox.registry().value_count();

    let denied = trap(&mut sandbox, Syscall::GetNode, 0, &[GuestVariant::NIL, path]);
    assert_eq!(denied, Err(BridgeError::AccessDenied {
            object: Some(secret)
        }));
    assert_eq!(sandbox.registry().object_count(), objects);
    assert_eq!(sandbox.registry().value_count(), values);
    assert!(!sandbox.registry().is_exposed(secret));
}

#[test]
fn allow_all_reaches_anything() {
    let (sandbox, _, _, secret) = level(sandbox());
    let mut sandbox = sandbox.with_policy(AllowAll);
    let path = arg(&mut sandbox, "../Secret").unwrap();
    let found = call(&mut sandbox, Syscall::GetNode, 0, &[GuestVariant::NIL, path]).unwrap();
    assert_eq!(found, Variant::Object(secret));
}

#[test]
fn denied_reflection_changes_nothing() {
    let (sandbox, level, _, _) = level(sandbox());
    let mut sandbox = sandbox.with_policy(no_reflection);
    let target = object_arg(&mut sandbox, level);
    let objects = sandbox.registry().object_count();
    let values = sandbox.registry().value_count();

    for op in [
        ObjectOp::GetMethodList,
        ObjectOp::GetPropertyList,
        ObjectOp::GetSignalList,
    ] {
        let denied = trap(&mut sandbox, Syscall::Obj, op.code(), &[target]);
        assert_eq!(denied, Err(BridgeError::AccessDenied {
            object: Some(level)
        }));
    }
    assert_eq!(sandbox.registry().object_count(), objects);
    assert_eq!(sandbox.registry().value_count(), values);
    assert!(sandbox.host().calls().is_empty());

    // Other access kinds still pass.
    let name = arg(&mut sandbox, "name").unwrap();
    let got = call(&mut sandbox, Syscall::Obj, ObjectOp::Get.code(), &[target, name]).unwrap();
    assert_eq!(got, Variant::StringName("Level".into()));
}

#[test]
fn reflection_is_allowed_by_default_on_exposed_objects() {
    let (mut sandbox, level, _, _) = level(sandbox());
    let target = object_arg(&mut sandbox, level);
    let signals = call(
        &mut sandbox,
        Syscall::Obj,
        ObjectOp::GetSignalList.code(),
        &[target],
    )
    .unwrap();
    assert_eq!(
        signals,
        Variant::from(vec![
            Variant::from("ready"),
            Variant::from("tree_exited"),
            Variant::from("renamed"),
        ])
    );
}

#[test]
fn denied_writes_leave_the_host_untouched() {
    let (sandbox, _, player, _) = level(sandbox());
    let mut sandbox = sandbox.with_policy(read_only);
    let target = object_arg(&mut sandbox, player);
    let property = arg(&mut sandbox, "rotation").unwrap();
    let denied = trap(
        &mut sandbox,
        Syscall::Obj,
        ObjectOp::Set.code(),
        &[target, property, GuestVariant::float(1.0)],
    );
    assert_eq!(denied, Err(BridgeError::AccessDenied {
            object: Some(player)
        }));
    assert_eq!(
        sandbox.host().property(player, "rotation"),
        Some(&Variant::Float(0.0))
    );
}

/// Arguments for `op` with `target` in front and valid operands after it.
fn reflection_args(
    sandbox: &mut TestSandbox,
    op: ObjectOp,
    target: GuestVariant,
    listener: GuestVariant,
) -> Vec<GuestVariant> {
    match op {
        ObjectOp::GetMethodList | ObjectOp::GetPropertyList | ObjectOp::GetSignalList => {
            vec![target]
        }
        ObjectOp::Get => vec![target, arg(sandbox, "name").unwrap()],
        ObjectOp::Set => vec![
            target,
            arg(sandbox, "rotation").unwrap(),
            GuestVariant::float(1.0),
        ],
        ObjectOp::Connect | ObjectOp::Disconnect => vec![
            target,
            arg(sandbox, "ready").unwrap(),
            listener,
            arg(sandbox, "on_ready").unwrap(),
        ],
    }
}

const REFLECTION_OPS: [ObjectOp; 7] = [
    ObjectOp::GetMethodList,
    ObjectOp::Get,
    ObjectOp::Set,
    ObjectOp::GetPropertyList,
    ObjectOp::Connect,
    ObjectOp::Disconnect,
    ObjectOp::GetSignalList,
];

#[test]
fn reflection_on_unresolved_handles_is_denied() {
    let (mut sandbox, level, _, _) = level(sandbox());
    let listener = object_arg(&mut sandbox, level);
    let text = sandbox.expose_value(Variant::from("not an object")).unwrap();
    let forged = GuestVariant::with_handle(Kind::Object, Handle::new(999));
    let retagged = GuestVariant::with_handle(Kind::Object, text.handle().unwrap());

    for op in REFLECTION_OPS {
        for target in [forged, retagged] {
            let args = reflection_args(&mut sandbox, op, target, listener);
            let objects = sandbox.registry().object_count();
            let values = sandbox.registry().value_count();
            let denied = trap(&mut sandbox, Syscall::Obj, op.code(), &args);
            assert_eq!(
                denied,
                Err(BridgeError::AccessDenied { object: None }),
                "{op:?} on {target:?}"
            );
            assert_eq!(sandbox.registry().object_count(), objects);
            assert_eq!(sandbox.registry().value_count(), values);
        }
    }
    assert!(sandbox.host().calls().is_empty());
}

#[test]
fn reflection_on_dead_objects_is_denied() {
    let (mut sandbox, _, player, _) = level(sandbox());
    let target = object_arg(&mut sandbox, player);
    sandbox.host_mut().free(player);
    let denied = trap(
        &mut sandbox,
        Syscall::Obj,
        ObjectOp::GetPropertyList.code(),
        &[target],
    );
    assert_eq!(
        denied,
        Err(BridgeError::AccessDenied {
            object: Some(player)
        })
    );
}

#[test]
fn children_must_be_object_references() {
    let (mut sandbox, level, _, secret) = level(sandbox());
    let parent = object_arg(&mut sandbox, level);
    let raw_id = GuestVariant::int(i64::try_from(secret.as_u64()).unwrap());
    let rejected = trap(
        &mut sandbox,
        Syscall::Node,
        NodeOp::AddChild.code(),
        &[parent, raw_id],
    );
    assert_eq!(
        rejected,
        Err(BridgeError::ArgumentTypeMismatch {
            position: 1,
            expected: "Object",
        })
    );

    let forged = GuestVariant::with_handle(Kind::Object, Handle::new(999));
    let unknown = trap(
        &mut sandbox,
        Syscall::Node,
        NodeOp::AddChild.code(),
        &[parent, forged],
    );
    assert_eq!(unknown, Err(BridgeError::UnknownHandle(999)));
    assert!(!sandbox.host().children_of(level).contains(&secret));
}

#[test]
fn dead_objects_read_as_unknown_handles() {
    let (mut sandbox, _, player, _) = level(sandbox());
    let target = object_arg(&mut sandbox, player);
    let handle = sandbox.registry().object_handle(player).unwrap();
    sandbox.host_mut().free(player);
    let gone = trap(&mut sandbox, Syscall::Node, NodeOp::GetName.code(), &[target]);
    assert_eq!(gone, Err(BridgeError::UnknownHandle(u64::from(handle.as_u32()))));
}
