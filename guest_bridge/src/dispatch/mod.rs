// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Operation dispatcher.
//!
//! Each trap names an operation code (and, for grouped codes, a sub-operation) plus a buffer of
//! guest variants. The dispatcher decodes arguments positionally, routes to the handler for the
//! code's group and writes exactly one result back to guest memory.
//!
//! Every request runs inside a registry mark. If anything fails (decoding, access checks, the host
//! call, or writing the result) every handle allocated by the request is dropped again, so a
//! failed request is never partially visible to the guest.

mod array;
mod dictionary;
mod eval;
mod math;
mod node;
mod object;
mod string;
mod variant;

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use crate::call::GuestCallable;
use crate::error::BridgeError;
use crate::guest::{self, GUEST_VARIANT_SIZE, GuestVariant};
use crate::host::Host;
use crate::limits::Limits;
use crate::machine::{GuestAddr, GuestMemory, NoSymbols, TrapFrame, TrapHandler};
use crate::math::{Vector2, Vector3};
use crate::ops::Syscall;
use crate::policy::{AccessPolicy, ObjectAccess, PolicyScope};
use crate::registry::Registry;
use crate::sandbox::SandboxId;
use crate::trace::{ScopeKind, TraceSink};
use crate::value::{Handle, Kind, ObjectId, TaggedValue};
use crate::variant::Variant;

/// A decoded guest operation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct OperationRequest {
    /// Operation code.
    pub(crate) code: u32,
    /// Sub-operation within the code's group.
    pub(crate) sub_op: u32,
    /// Arguments, in guest layout.
    pub(crate) args: Vec<GuestVariant>,
}

/// Per-sandbox state the dispatcher reads and updates.
#[derive(Clone, Debug)]
pub(crate) struct Session {
    pub(crate) name: String,
    pub(crate) owner: Option<ObjectId>,
    pub(crate) id: SandboxId,
    pub(crate) epoch: u32,
    pub(crate) at_line_start: bool,
}

impl Session {
    pub(crate) fn new(name: String, id: SandboxId) -> Self {
        Self {
            name,
            owner: None,
            id,
            epoch: 0,
            at_line_start: true,
        }
    }
}

/// Borrowed view of a sandbox while the guest runs.
pub(crate) struct DispatchContext<'a, H: Host> {
    pub(crate) registry: &'a mut Registry,
    pub(crate) host: &'a mut H,
    pub(crate) policy: &'a dyn AccessPolicy,
    pub(crate) limits: &'a Limits,
    pub(crate) session: &'a mut Session,
    pub(crate) trace: &'a mut Option<Box<dyn TraceSink>>,
    pub(crate) depth: usize,
}

impl<H: Host> TrapHandler for DispatchContext<'_, H> {
    fn on_trap(
        &mut self,
        memory: &mut dyn GuestMemory,
        frame: TrapFrame,
    ) -> Result<(), BridgeError> {
        self.handle(memory, frame)
    }
}

impl<H: Host> DispatchContext<'_, H> {
    /// Handles one trap: read arguments, dispatch, write the result.
    pub(crate) fn handle(
        &mut self,
        memory: &mut dyn GuestMemory,
        frame: TrapFrame,
    ) -> Result<(), BridgeError> {
        let argc = usize::try_from(frame.argc).unwrap_or(usize::MAX);
        if argc > self.limits.max_trap_args {
            return Err(BridgeError::LimitExceeded {
                what: "trap arguments",
                limit: self.limits.max_trap_args,
            });
        }
        let request = OperationRequest {
            code: frame.code,
            sub_op: frame.sub_op,
            args: guest::read_variants(memory, frame.args, argc)?,
        };

        let scope = ScopeKind::Dispatch {
            code: frame.code,
            sub_op: frame.sub_op,
        };
        let traced = self.trace_enter(scope);
        let mark = self.registry.mark();
        let result = self.dispatch(memory, &request).and_then(|value| {
            guest::write_variants(memory, frame.result, &[GuestVariant::lower(value)])
        });
        if let Err(err) = &result {
            self.registry.rollback(mark);
            log::debug!(
                "[{}] {} failed: {err}",
                self.session.name,
                Syscall::from_code(frame.code).map_or("unknown operation", Syscall::name),
            );
        }
        if traced {
            self.trace_exit(scope);
        }
        result
    }

    /// Routes one request to its handler and returns its single result.
    pub(crate) fn dispatch(
        &mut self,
        memory: &mut dyn GuestMemory,
        request: &OperationRequest,
    ) -> Result<TaggedValue, BridgeError> {
        let unknown = || BridgeError::UnknownOperation {
            code: request.code,
            sub_op: request.sub_op,
        };
        let call = Syscall::from_code(request.code).ok_or_else(unknown)?;
        let args = Args::new(&request.args);
        let sub_op = request.sub_op;
        match call {
            Syscall::Print => self.print(&args),
            Syscall::VCall => self.vcall(&args),
            Syscall::VEval => self.veval(&args),
            Syscall::VFree => self.vfree(&args),
            Syscall::GetObj => self.get_obj(&args),
            Syscall::Obj => self.object_op(decode(sub_op).ok_or_else(unknown)?, &args),
            Syscall::ObjCallp => self.obj_callp(&args),
            Syscall::GetNode => self.get_node(&args),
            Syscall::Node => self.node_op(decode(sub_op).ok_or_else(unknown)?, &args),
            Syscall::Node2D => self.node2d_op(decode(sub_op).ok_or_else(unknown)?, &args),
            Syscall::Node3D => self.node3d_op(decode(sub_op).ok_or_else(unknown)?, &args),
            Syscall::Throw => self.throw(&args),
            Syscall::IsEditor => Ok(TaggedValue::Bool(self.host.is_editor())),
            Syscall::SinCos => math::sincos(&args),
            Syscall::Vec2Length => math::vec2_length(&args),
            Syscall::Vec2Normalized => math::vec2_normalized(&args),
            Syscall::Vec2Rotated => math::vec2_rotated(&args),
            Syscall::VCreate => self.vcreate(memory, &args),
            Syscall::VClone => self.vclone(&args),
            Syscall::VFetch => self.vfetch(memory, &args),
            Syscall::VStore => self.vstore(memory, &args),
            Syscall::ArrayOps => self.array_op(memory, decode(sub_op).ok_or_else(unknown)?, &args),
            Syscall::ArrayAt => self.array_at(&args),
            Syscall::ArraySize => self.array_size(&args),
            Syscall::DictionaryOps => self.dictionary_op(decode(sub_op).ok_or_else(unknown)?, &args),
            Syscall::StringCreate => self.string_create(memory, &args),
            Syscall::StringOps => self.string_op(memory, decode(sub_op).ok_or_else(unknown)?, &args),
            Syscall::StringAt => self.string_at(&args),
            Syscall::StringSize => self.string_size(&args),
            Syscall::StringAppend => self.string_append(memory, &args),
            Syscall::TimerPeriodic => self.timer_periodic(&args),
            Syscall::TimerStop => self.timer_stop(&args),
            Syscall::NodeCreate => self.node_create(decode(sub_op).ok_or_else(unknown)?, &args),
            Syscall::MathOp32 => math::math_op32(decode(sub_op).ok_or_else(unknown)?, &args),
            Syscall::MathOp64 => math::math_op64(decode(sub_op).ok_or_else(unknown)?, &args),
            Syscall::LerpOp32 => math::lerp_op32(decode(sub_op).ok_or_else(unknown)?, &args),
            Syscall::LerpOp64 => math::lerp_op64(decode(sub_op).ok_or_else(unknown)?, &args),
            Syscall::Vec3Ops => math::vec3_op(decode(sub_op).ok_or_else(unknown)?, &args),
        }
    }

    fn trace_enter(&mut self, scope: ScopeKind) -> bool {
        let depth = self.depth;
        match self.trace.as_deref_mut() {
            Some(sink) if sink.mask().contains(scope.mask()) => {
                sink.scope_enter(&NoSymbols, scope, depth);
                true
            }
            _ => false,
        }
    }

    fn trace_exit(&mut self, scope: ScopeKind) {
        let depth = self.depth;
        if let Some(sink) = self.trace.as_deref_mut() {
            sink.scope_exit(scope, depth);
        }
    }

    /// Checks `access` on `object` against the policy.
    fn check(&self, object: ObjectId, access: ObjectAccess<'_>) -> Result<(), BridgeError> {
        let scope = PolicyScope::new(&*self.registry, &*self.host);
        if self.policy.allows(&scope, object, access) {
            return Ok(());
        }
        log::debug!("[{}] denied {access:?} on {object}", self.session.name);
        Err(BridgeError::AccessDenied {
            object: Some(object),
        })
    }

    /// Resolves the object argument at `position` and checks `access` on it.
    fn target(
        &self,
        args: &Args<'_>,
        position: usize,
        access: ObjectAccess<'_>,
    ) -> Result<ObjectId, BridgeError> {
        let handle = args.object(position)?;
        let object = self.registry.object(handle)?;
        if !self.host.is_alive(object) {
            return Err(BridgeError::UnknownHandle(u64::from(handle.as_u32())));
        }
        self.check(object, access)?;
        Ok(object)
    }

    /// Resolves the target of a reflection operation (argument 0).
    ///
    /// Unlike [`Self::target`], a handle that is not in the object table, or whose object is
    /// gone, is denied instead of reported as a registry miss.
    fn reflection_target(
        &self,
        args: &Args<'_>,
        access: ObjectAccess<'_>,
    ) -> Result<ObjectId, BridgeError> {
        let handle = args.object(0)?;
        let Ok(object) = self.registry.object(handle) else {
            log::debug!(
                "[{}] denied {access:?} on unresolved handle {handle}",
                self.session.name
            );
            return Err(BridgeError::AccessDenied { object: None });
        };
        if !self.host.is_alive(object) {
            return Err(BridgeError::AccessDenied {
                object: Some(object),
            });
        }
        self.check(object, access)?;
        Ok(object)
    }

    /// Converts a host result into a guest value; objects pass the expose check.
    fn admit(&mut self, value: Variant) -> Result<TaggedValue, BridgeError> {
        let policy = self.policy;
        let host: &H = &*self.host;
        self.registry.intern(value, |registry, object| {
            if policy.allows(&PolicyScope::new(registry, host), object, ObjectAccess::Expose) {
                Ok(())
            } else {
                Err(BridgeError::AccessDenied {
                    object: Some(object),
                })
            }
        })
    }

    /// Exposes a freshly created host object without consulting the policy.
    fn admit_created(&mut self, object: ObjectId) -> Result<TaggedValue, BridgeError> {
        Ok(TaggedValue::Object(self.registry.expose_object(object)?))
    }

    fn to_host(&self, value: TaggedValue) -> Result<Variant, BridgeError> {
        self.registry.materialize(value, self.limits.max_nesting)
    }

    /// Lifts and materializes every argument from `from` on.
    fn host_args(&self, args: &Args<'_>, from: usize) -> Result<Vec<Variant>, BridgeError> {
        (from..args.len())
            .map(|i| self.to_host(args.value(i, &*self.registry)?))
            .collect()
    }

    fn guest_callable(&self, address: GuestAddr) -> GuestCallable {
        GuestCallable::new(self.session.id, self.session.epoch, address)
    }

    fn guest_bytes(
        &self,
        memory: &dyn GuestMemory,
        address: GuestAddr,
        len: usize,
    ) -> Result<Vec<u8>, BridgeError> {
        crate::machine::read_bytes(memory, address, len, self.limits.max_guest_copy)
    }

    fn guest_variants(
        &self,
        memory: &dyn GuestMemory,
        address: GuestAddr,
        count: usize,
    ) -> Result<Vec<TaggedValue>, BridgeError> {
        self.copy_allowed(count, GUEST_VARIANT_SIZE)?;
        guest::read_variants(memory, address, count)?
            .iter()
            .map(|v| v.lift(&*self.registry))
            .collect()
    }

    fn put_guest_variants(
        &self,
        memory: &mut dyn GuestMemory,
        address: GuestAddr,
        values: &[TaggedValue],
    ) -> Result<(), BridgeError> {
        self.copy_allowed(values.len(), GUEST_VARIANT_SIZE)?;
        let lowered: Vec<_> = values.iter().map(|v| GuestVariant::lower(*v)).collect();
        guest::write_variants(memory, address, &lowered)
    }

    fn copy_allowed(&self, count: usize, size: usize) -> Result<(), BridgeError> {
        let limit = self.limits.max_guest_copy;
        match count.checked_mul(size) {
            Some(bytes) if bytes <= limit => Ok(()),
            _ => Err(BridgeError::LimitExceeded {
                what: "guest copy length",
                limit,
            }),
        }
    }
}

fn decode<T: TryFrom<u32>>(sub_op: u32) -> Option<T> {
    T::try_from(sub_op).ok()
}

/// Positional argument decoder.
pub(crate) struct Args<'r> {
    raw: &'r [GuestVariant],
}

impl<'r> Args<'r> {
    pub(crate) fn new(raw: &'r [GuestVariant]) -> Self {
        Self { raw }
    }

    pub(crate) fn len(&self) -> usize {
        self.raw.len()
    }

    fn require(
        &self,
        position: usize,
        expected: &'static str,
    ) -> Result<&'r GuestVariant, BridgeError> {
        self.raw
            .get(position)
            .ok_or(BridgeError::arg(position, expected))
    }

    fn inline(&self, position: usize, expected: &'static str) -> Result<TaggedValue, BridgeError> {
        self.require(position, expected)?
            .inline_value()
            .ok_or(BridgeError::arg(position, expected))
    }

    /// Missing or nil.
    pub(crate) fn is_nil(&self, position: usize) -> bool {
        self.raw
            .get(position)
            .is_none_or(|v| v.kind_raw() == Kind::Nil.wire())
    }

    pub(crate) fn int(&self, position: usize) -> Result<i64, BridgeError> {
        match self.inline(position, "int")? {
            v @ (TaggedValue::Int(_) | TaggedValue::Float(_) | TaggedValue::Bool(_)) => {
                v.as_int().ok_or(BridgeError::arg(position, "int"))
            }
            _ => Err(BridgeError::arg(position, "int")),
        }
    }

    pub(crate) fn float(&self, position: usize) -> Result<f64, BridgeError> {
        self.inline(position, "float")?
            .as_float()
            .ok_or(BridgeError::arg(position, "float"))
    }

    pub(crate) fn boolean(&self, position: usize) -> Result<bool, BridgeError> {
        match self.inline(position, "bool")? {
            TaggedValue::Bool(v) => Ok(v),
            TaggedValue::Int(v) => Ok(v != 0),
            _ => Err(BridgeError::arg(position, "bool")),
        }
    }

    /// Boolean that defaults when missing or nil.
    pub(crate) fn flag(&self, position: usize, default: bool) -> Result<bool, BridgeError> {
        if self.is_nil(position) {
            return Ok(default);
        }
        self.boolean(position)
    }

    pub(crate) fn count(&self, position: usize) -> Result<usize, BridgeError> {
        usize::try_from(self.int(position)?).map_err(|_| BridgeError::arg(position, "count"))
    }

    pub(crate) fn address(&self, position: usize) -> Result<GuestAddr, BridgeError> {
        self.int(position).map(|v| v as GuestAddr)
    }

    pub(crate) fn vector2(&self, position: usize) -> Result<Vector2, BridgeError> {
        match self.inline(position, "Vector2")? {
            TaggedValue::Vector2(v) => Ok(v),
            _ => Err(BridgeError::arg(position, "Vector2")),
        }
    }

    pub(crate) fn vector3(&self, position: usize) -> Result<Vector3, BridgeError> {
        match self.inline(position, "Vector3")? {
            TaggedValue::Vector3(v) => Ok(v),
            _ => Err(BridgeError::arg(position, "Vector3")),
        }
    }

    /// Any value, validated against the registry.
    pub(crate) fn value(
        &self,
        position: usize,
        registry: &Registry,
    ) -> Result<TaggedValue, BridgeError> {
        self.require(position, "value")?.lift(registry)
    }

    /// Value that defaults to nil when missing.
    pub(crate) fn value_or_nil(
        &self,
        position: usize,
        registry: &Registry,
    ) -> Result<TaggedValue, BridgeError> {
        if position >= self.raw.len() {
            return Ok(TaggedValue::Nil);
        }
        self.value(position, registry)
    }

    /// Handle of an `Object`-tagged argument.
    pub(crate) fn object(&self, position: usize) -> Result<Handle, BridgeError> {
        let raw = self.require(position, "Object")?;
        if raw.kind_raw() != Kind::Object.wire() {
            return Err(BridgeError::arg(position, "Object"));
        }
        handle_of(raw)
    }

    /// Handle of a container argument, whatever its tag says.
    ///
    /// The registry entry's own kind decides whether the operation applies.
    pub(crate) fn container(&self, position: usize) -> Result<Handle, BridgeError> {
        let raw = self.require(position, "handle")?;
        match Kind::from_wire(raw.kind_raw()) {
            Some(kind) if !kind.is_inline() || kind == Kind::Int => handle_of(raw),
            _ => Err(BridgeError::arg(position, "handle")),
        }
    }

    /// Text of a string-like argument.
    pub(crate) fn text<'g>(
        &self,
        position: usize,
        registry: &'g Registry,
    ) -> Result<&'g str, BridgeError> {
        let raw = self.require(position, "String")?;
        match Kind::from_wire(raw.kind_raw()) {
            Some(Kind::String | Kind::StringName | Kind::NodePath) => {
                registry.text(handle_of(raw)?)
            }
            _ => Err(BridgeError::arg(position, "String")),
        }
    }
}

fn handle_of(raw: &GuestVariant) -> Result<Handle, BridgeError> {
    let bits = raw.handle_bits();
    u32::try_from(bits)
        .map(Handle::new)
        .map_err(|_| BridgeError::UnknownHandle(bits))
}

/// Resolves a possibly negative index against `len`.
pub(crate) fn element_index(index: i64, len: usize) -> Result<usize, BridgeError> {
    let out_of_bounds = BridgeError::IndexOutOfBounds { index, len };
    let len_i = i64::try_from(len).map_err(|_| out_of_bounds.clone())?;
    let resolved = if index < 0 { index + len_i } else { index };
    if resolved < 0 || resolved >= len_i {
        return Err(out_of_bounds);
    }
    usize::try_from(resolved).map_err(|_| out_of_bounds)
}

/// Like [`element_index`], but `len` itself is a valid insertion point.
pub(crate) fn insertion_index(index: i64, len: usize) -> Result<usize, BridgeError> {
    if usize::try_from(index).is_ok_and(|i| i == len) {
        return Ok(len);
    }
    element_index(index, len)
}
