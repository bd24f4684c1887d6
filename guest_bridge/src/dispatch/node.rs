// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene-tree node operations, mapped onto host reflection.

use alloc::string::String;
use alloc::vec::Vec;

use super::{Args, DispatchContext};
use crate::error::BridgeError;
use crate::host::Host;
use crate::ops::{Node2DOp, Node3DOp, NodeCreate, NodeOp};
use crate::policy::ObjectAccess;
use crate::value::TaggedValue;
use crate::variant::Variant;

impl<H: Host> DispatchContext<'_, H> {
    /// `NODE(node, …)` hierarchy group.
    pub(super) fn node_op(
        &mut self,
        op: NodeOp,
        args: &Args<'_>,
    ) -> Result<TaggedValue, BridgeError> {
        let method = op.name();
        let (method, deferred) = match op {
            NodeOp::AddChildDeferred => ("add_child", true),
            NodeOp::AddSiblingDeferred => ("add_sibling", true),
            NodeOp::RemoveChildDeferred => ("remove_child", true),
            _ => (method, false),
        };
        let mut call_args = Vec::new();
        match op {
            NodeOp::GetChild => call_args.push(Variant::Int(args.int(1)?)),
            NodeOp::AddChild
            | NodeOp::AddChildDeferred
            | NodeOp::AddSibling
            | NodeOp::AddSiblingDeferred
            | NodeOp::RemoveChild
            | NodeOp::RemoveChildDeferred => {
                call_args.push(Variant::Object(self.target(args, 1, ObjectAccess::Expose)?));
            }
            NodeOp::MoveChild => {
                call_args.push(Variant::Object(self.target(args, 1, ObjectAccess::Expose)?));
                call_args.push(Variant::Int(args.int(2)?));
            }
            NodeOp::SetName => {
                let name = String::from(args.text(1, &*self.registry)?);
                call_args.push(Variant::StringName(name));
            }
            _ => {}
        }
        let node = self.target(args, 0, ObjectAccess::Call { method })?;
        if deferred {
            self.host.call_deferred(node, method, &call_args)?;
            return Ok(TaggedValue::Nil);
        }
        let result = self.host.call_method(node, method, &call_args)?;
        match op {
            NodeOp::QueueFree
            | NodeOp::AddChild
            | NodeOp::AddSibling
            | NodeOp::MoveChild
            | NodeOp::RemoveChild
            | NodeOp::SetName => Ok(TaggedValue::Nil),
            NodeOp::Duplicate => match result.as_object() {
                Some(copy) => self.admit_created(copy),
                None => Ok(TaggedValue::Nil),
            },
            _ => self.admit(result),
        }
    }

    /// `NODE2D(node[, value])` property group.
    pub(super) fn node2d_op(
        &mut self,
        op: Node2DOp,
        args: &Args<'_>,
    ) -> Result<TaggedValue, BridgeError> {
        let (property, set) = match op {
            Node2DOp::GetPosition => ("position", false),
            Node2DOp::SetPosition => ("position", true),
            Node2DOp::GetRotation => ("rotation", false),
            Node2DOp::SetRotation => ("rotation", true),
            Node2DOp::GetScale => ("scale", false),
            Node2DOp::SetScale => ("scale", true),
            Node2DOp::GetSkew => ("skew", false),
            Node2DOp::SetSkew => ("skew", true),
            Node2DOp::GetTransform | Node2DOp::SetTransform => {
                return Err(BridgeError::Unsupported("2D transforms"));
            }
        };
        self.node_property(args, property, set)
    }

    /// `NODE3D(node[, value])` property group.
    pub(super) fn node3d_op(
        &mut self,
        op: Node3DOp,
        args: &Args<'_>,
    ) -> Result<TaggedValue, BridgeError> {
        let (property, set) = match op {
            Node3DOp::GetPosition => ("position", false),
            Node3DOp::SetPosition => ("position", true),
            Node3DOp::GetRotation => ("rotation", false),
            Node3DOp::SetRotation => ("rotation", true),
            Node3DOp::GetScale => ("scale", false),
            Node3DOp::SetScale => ("scale", true),
            Node3DOp::GetTransform | Node3DOp::SetTransform => {
                return Err(BridgeError::Unsupported("3D transforms"));
            }
            Node3DOp::GetQuaternion | Node3DOp::SetQuaternion => {
                return Err(BridgeError::Unsupported("quaternions"));
            }
        };
        self.node_property(args, property, set)
    }

    fn node_property(
        &mut self,
        args: &Args<'_>,
        property: &str,
        set: bool,
    ) -> Result<TaggedValue, BridgeError> {
        if set {
            let value = self.to_host(args.value(1, &*self.registry)?)?;
            let node = self.target(args, 0, ObjectAccess::Set { property })?;
            self.host.set_property(node, property, value)?;
            return Ok(TaggedValue::Nil);
        }
        let node = self.target(args, 0, ObjectAccess::Get { property })?;
        let value = self.host.get_property(node, property)?;
        self.admit(value)
    }

    /// `NODE_CREATE(class, name)`; `class` is only read for [`NodeCreate::ClassDb`] and `name` is
    /// optional.
    pub(super) fn node_create(
        &mut self,
        shortlist: NodeCreate,
        args: &Args<'_>,
    ) -> Result<TaggedValue, BridgeError> {
        let class = match shortlist {
            NodeCreate::ClassDb => String::from(args.text(0, &*self.registry)?),
            NodeCreate::Node => String::from("Node"),
            NodeCreate::Node2D => String::from("Node2D"),
            NodeCreate::Node3D => String::from("Node3D"),
        };
        let name = if args.is_nil(1) {
            None
        } else {
            Some(String::from(args.text(1, &*self.registry)?))
        };
        let node = self.host.create_object(&class)?;
        if let Some(name) = name {
            self.host
                .call_method(node, "set_name", &[Variant::StringName(name)])?;
        }
        log::debug!("[{}] created {class} {node}", self.session.name);
        self.admit_created(node)
    }
}
