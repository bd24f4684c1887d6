// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Object lookup, reflection and timers.

use alloc::string::String;
use alloc::vec::Vec;

use super::{Args, DispatchContext};
use crate::error::BridgeError;
use crate::host::Host;
use crate::ops::ObjectOp;
use crate::policy::ObjectAccess;
use crate::value::TaggedValue;
use crate::variant::{Callable, Variant};

fn names(list: Vec<String>) -> Variant {
    Variant::Array(list.into_iter().map(Variant::String).collect())
}

impl<H: Host> DispatchContext<'_, H> {
    /// `GET_OBJ(name)`: a globally reachable object, or nil.
    pub(super) fn get_obj(&mut self, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
        let name = args.text(0, &*self.registry)?;
        match self.host.find_object(name) {
            Some(object) => self.admit(Variant::Object(object)),
            None => Ok(TaggedValue::Nil),
        }
    }

    /// `OBJ(object, …)` reflection group.
    pub(super) fn object_op(
        &mut self,
        op: ObjectOp,
        args: &Args<'_>,
    ) -> Result<TaggedValue, BridgeError> {
        match op {
            ObjectOp::GetMethodList => {
                let object = self.reflection_target(args, ObjectAccess::Reflect)?;
                let list = self.host.method_list(object)?;
                self.admit(names(list))
            }
            ObjectOp::GetPropertyList => {
                let object = self.reflection_target(args, ObjectAccess::Reflect)?;
                let list = self.host.property_list(object)?;
                self.admit(names(list))
            }
            ObjectOp::GetSignalList => {
                let object = self.reflection_target(args, ObjectAccess::Reflect)?;
                let list = self.host.signal_list(object)?;
                self.admit(names(list))
            }
            ObjectOp::Get => {
                let property = String::from(args.text(1, &*self.registry)?);
                let access = ObjectAccess::Get {
                    property: &property,
                };
                let object = self.reflection_target(args, access)?;
                let value = self.host.get_property(object, &property)?;
                self.admit(value)
            }
            ObjectOp::Set => {
                let property = String::from(args.text(1, &*self.registry)?);
                let value = self.to_host(args.value(2, &*self.registry)?)?;
                let access = ObjectAccess::Set {
                    property: &property,
                };
                let object = self.reflection_target(args, access)?;
                self.host.set_property(object, &property, value)?;
                Ok(TaggedValue::Nil)
            }
            ObjectOp::Connect | ObjectOp::Disconnect => {
                // (object, signal, target, method)
                let signal = String::from(args.text(1, &*self.registry)?);
                let method = String::from(args.text(3, &*self.registry)?);
                let access = if op == ObjectOp::Connect {
                    ObjectAccess::Connect { signal: &signal }
                } else {
                    ObjectAccess::Disconnect { signal: &signal }
                };
                let object = self.reflection_target(args, access)?;
                let target = self.target(args, 2, ObjectAccess::Call { method: &method })?;
                let callable = Callable::Method {
                    object: target,
                    method,
                };
                if op == ObjectOp::Connect {
                    self.host.connect(object, &signal, callable)?;
                } else {
                    self.host.disconnect(object, &signal, callable)?;
                }
                Ok(TaggedValue::Nil)
            }
        }
    }

    /// `OBJ_CALLP(object, method, deferred, args…)`.
    pub(super) fn obj_callp(&mut self, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
        let method = String::from(args.text(1, &*self.registry)?);
        let deferred = args.flag(2, false)?;
        let call_args = self.host_args(args, 3)?;
        let object = self.target(args, 0, ObjectAccess::Call { method: &method })?;
        if deferred {
            self.host.call_deferred(object, &method, &call_args)?;
            return Ok(TaggedValue::Nil);
        }
        let result = self.host.call_method(object, &method, &call_args)?;
        self.admit(result)
    }

    /// `GET_NODE(base, path)`; a nil base means the sandbox owner, which needs no access check.
    pub(super) fn get_node(&mut self, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
        let path = String::from(args.text(1, &*self.registry)?);
        let base = if args.is_nil(0) {
            self.session
                .owner
                .ok_or(BridgeError::Unsupported("node lookup without an owner"))?
        } else {
            self.target(args, 0, ObjectAccess::Call { method: "get_node" })?
        };
        match self.host.get_node(base, &path)? {
            Some(node) => self.admit(Variant::Object(node)),
            None => Ok(TaggedValue::Nil),
        }
    }

    /// `TIMER_PERIODIC(interval, oneshot, callback)`: a started host timer that calls back into
    /// the guest function at `callback`.
    pub(super) fn timer_periodic(&mut self, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
        let interval = args.float(0)?;
        let oneshot = args.flag(1, false)?;
        let callback = self.guest_callable(args.address(2)?);
        let timer = self.host.create_timer(interval, oneshot, callback)?;
        self.admit_created(timer)
    }

    /// `TIMER_STOP(timer)`.
    pub(super) fn timer_stop(&mut self, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
        let timer = self.target(args, 0, ObjectAccess::Call { method: "stop" })?;
        self.host.call_method(timer, "stop", &[])?;
        Ok(TaggedValue::Nil)
    }
}
