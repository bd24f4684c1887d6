// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The sandbox context.
//!
//! A [`Sandbox`] owns everything one loaded guest program needs: the execution engine, the host
//! collaborator, the handle registry, the access policy and the diagnostic sinks. Every call into
//! the guest and every trap coming back out is threaded through it explicitly; there is no
//! process-wide "current sandbox".
//!
//! A sandbox has a single owner. The host serializes calls into it; several sandboxes can run
//! side by side without sharing anything but the id counter.

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;

use crate::call::{self, GuestCallable, ReturnConvention};
use crate::diagnostics::{DiagnosticEvent, DiagnosticKind, DiagnosticSink, LogDiagnostics};
use crate::dispatch::{DispatchContext, Session};
use crate::error::BridgeError;
use crate::guest;
use crate::host::Host;
use crate::limits::Limits;
use crate::machine::{GuestAddr, GuestMachine, MachineStop, TrapFrame};
use crate::policy::{AccessPolicy, ScopedPolicy};
use crate::registry::Registry;
use crate::trace::{ScopeKind, TraceSink};
use crate::value::{Handle, ObjectId, TaggedValue};
use crate::variant::Variant;

static NEXT_SANDBOX: AtomicU64 = AtomicU64::new(1);

/// Process-unique sandbox identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SandboxId(u64);

impl SandboxId {
    fn next() -> Self {
        Self(NEXT_SANDBOX.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SandboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sandbox:{}", self.0)
    }
}

/// One loaded guest program and its boundary state.
pub struct Sandbox<M: GuestMachine, H: Host> {
    machine: M,
    host: H,
    registry: Registry,
    policy: Box<dyn AccessPolicy>,
    limits: Limits,
    session: Session,
    symbols: HashMap<String, GuestAddr>,
    timeouts: u64,
    diagnostics: Box<dyn DiagnosticSink>,
    trace: Option<Box<dyn TraceSink>>,
    return_convention: ReturnConvention,
    depth: usize,
    torn_down: bool,
}

impl<M: GuestMachine, H: Host> Sandbox<M, H> {
    /// Creates a sandbox with the default policy, limits and diagnostics.
    pub fn new(machine: M, host: H) -> Self {
        let id = SandboxId::next();
        Self {
            machine,
            host,
            registry: Registry::new(),
            policy: Box::new(ScopedPolicy::default()),
            limits: Limits::default(),
            session: Session::new(String::from("guest"), id),
            symbols: HashMap::new(),
            timeouts: 0,
            diagnostics: Box::new(LogDiagnostics),
            trace: None,
            return_convention: ReturnConvention::default(),
            depth: 0,
            torn_down: false,
        }
    }

    /// Sets the name used in console output and diagnostics.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.session.name = name.into();
        self
    }

    /// Replaces the access policy.
    #[must_use]
    pub fn with_policy(mut self, policy: impl AccessPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Sets the object this program belongs to and exposes it.
    ///
    /// The owner is the base of node lookups without an explicit base.
    #[must_use]
    pub fn with_owner(mut self, owner: ObjectId) -> Self {
        self.session.owner = Some(owner);
        if let Err(err) = self.registry.expose_object(owner) {
            log::warn!("[{}] could not expose owner {owner}: {err}", self.session.name);
        }
        self
    }

    /// Replaces the resource limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Replaces the diagnostic sink.
    #[must_use]
    pub fn with_diagnostics(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.diagnostics = Box::new(sink);
        self
    }

    /// Installs a trace sink.
    #[must_use]
    pub fn with_trace(mut self, sink: impl TraceSink + 'static) -> Self {
        self.trace = Some(Box::new(sink));
        self
    }

    /// Sets how return values of guest calls are read.
    #[must_use]
    pub fn with_return_convention(mut self, convention: ReturnConvention) -> Self {
        self.return_convention = convention;
        self
    }

    /// Sandbox identity.
    #[inline]
    pub fn id(&self) -> SandboxId {
        self.session.id
    }

    /// Sandbox name.
    pub fn name(&self) -> &str {
        &self.session.name
    }

    /// Teardown generation; bumped by [`Sandbox::teardown`].
    #[inline]
    pub fn epoch(&self) -> u32 {
        self.session.epoch
    }

    /// Active limits.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Handle registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Host collaborator.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host collaborator.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Execution engine.
    pub fn machine(&self) -> &M {
        &self.machine
    }

    /// Mutable execution engine.
    pub fn machine_mut(&mut self) -> &mut M {
        &mut self.machine
    }

    /// Number of guest calls abandoned for exceeding the step budget. Never decreases.
    #[inline]
    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    /// Returns `true` once [`Sandbox::teardown`] ran.
    #[inline]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Exposes a host object to the guest. The host is trusted; the policy is not consulted.
    ///
    /// # Panics
    ///
    /// Panics when the sandbox has been torn down.
    pub fn expose_object(&mut self, object: ObjectId) -> Result<Handle, BridgeError> {
        self.assert_live();
        self.registry.expose_object(object)
    }

    /// Hands a host value to the guest, storing its complex parts. Objects inside it are exposed
    /// without consulting the policy.
    ///
    /// # Panics
    ///
    /// Panics when the sandbox has been torn down.
    pub fn expose_value(&mut self, value: Variant) -> Result<TaggedValue, BridgeError> {
        self.assert_live();
        self.registry.intern(value, |_, _| Ok(()))
    }

    /// Converts a guest value back into a host value.
    pub fn resolve(&self, value: TaggedValue) -> Result<Variant, BridgeError> {
        self.registry.materialize(value, self.limits.max_nesting)
    }

    /// Resolves an exported guest function, caching the result.
    pub fn address_of(&mut self, name: &str) -> Result<GuestAddr, BridgeError> {
        if let Some(&address) = self.symbols.get(name) {
            return Ok(address);
        }
        let address = self
            .machine
            .address_of(name)
            .ok_or_else(|| BridgeError::UnknownSymbol(String::from(name)))?;
        self.symbols.insert(String::from(name), address);
        Ok(address)
    }

    /// Runs the program from its entry point.
    pub fn run_entry(&mut self) -> Result<Variant, BridgeError> {
        let entry = self.machine.entry_point();
        self.vmcall_with(entry, &[], ReturnConvention::Integer)
    }

    /// Calls an exported guest function by name.
    pub fn vmcall(&mut self, name: &str, args: &[Variant]) -> Result<Variant, BridgeError> {
        let address = self.address_of(name)?;
        self.vmcall_address(address, args)
    }

    /// Calls a guest function by address, bypassing the symbol cache.
    pub fn vmcall_address(
        &mut self,
        address: GuestAddr,
        args: &[Variant],
    ) -> Result<Variant, BridgeError> {
        self.vmcall_with(address, args, self.return_convention)
    }

    /// Calls a guest function by address with an explicit return convention.
    ///
    /// A call that runs out of steps, faults, or fails inside a trap is abandoned; it is
    /// reported to the diagnostic sink and returned as an error.
    ///
    /// # Panics
    ///
    /// Panics when the sandbox has been torn down.
    pub fn vmcall_with(
        &mut self,
        address: GuestAddr,
        args: &[Variant],
        convention: ReturnConvention,
    ) -> Result<Variant, BridgeError> {
        self.assert_live();
        let plan = call::plan_arguments(args)?;
        self.machine.prepare_call();
        call::place_arguments(&mut self.machine, &plan)?;

        let scope = ScopeKind::GuestCall { address };
        let traced = self.trace_enter(scope);
        let ran = self.run(address);
        if traced {
            self.trace_exit(scope);
        }

        match ran {
            Ok(()) => self.return_value(convention),
            Err(stop) => Err(self.abandon(address, stop)),
        }
    }

    #[track_caller]
    fn assert_live(&self) {
        assert!(
            !self.torn_down,
            "sandbox `{}` called after teardown",
            self.session.name
        );
    }

    fn run(&mut self, address: GuestAddr) -> Result<(), MachineStop> {
        let Self {
            machine,
            host,
            registry,
            policy,
            limits,
            session,
            trace,
            depth,
            ..
        } = self;
        let mut context = DispatchContext {
            registry,
            host,
            policy: &**policy,
            limits,
            session,
            trace,
            depth: *depth + 1,
        };
        machine.run(address, limits.max_steps, &mut context)
    }

    fn return_value(&mut self, convention: ReturnConvention) -> Result<Variant, BridgeError> {
        let raw = self.machine.return_value();
        match convention {
            #[allow(clippy::cast_possible_wrap, reason = "a0 holds a signed integer")]
            ReturnConvention::Integer => Ok(Variant::Int(raw as i64)),
            ReturnConvention::Variant => {
                let slot = guest::read_variants(&self.machine, raw, 1)?;
                let value = match slot.first() {
                    Some(raw_value) => raw_value.lift(&self.registry)?,
                    None => TaggedValue::Nil,
                };
                self.resolve(value)
            }
        }
    }

    /// Records a stopped run and turns it into the caller's error.
    fn abandon(&mut self, address: GuestAddr, stop: MachineStop) -> BridgeError {
        let symbol = self.machine.symbol_at(address).map(|s| s.name);
        match stop {
            MachineStop::Timeout { pc } => {
                self.timeouts += 1;
                self.report(address, symbol.as_deref(), DiagnosticKind::Timeout {
                    count: self.timeouts,
                    pc,
                });
                BridgeError::ExecutionTimeout { address, symbol }
            }
            MachineStop::Fault(report) => {
                self.report(address, symbol.as_deref(), DiagnosticKind::Fault(&report));
                BridgeError::GuestFault {
                    address,
                    symbol,
                    report: Box::new(report),
                }
            }
            MachineStop::Trap(err) => {
                self.report(address, symbol.as_deref(), DiagnosticKind::Trap(&err));
                err
            }
        }
    }

    fn report(&mut self, address: GuestAddr, symbol: Option<&str>, kind: DiagnosticKind<'_>) {
        self.diagnostics.report(&DiagnosticEvent {
            sandbox: &self.session.name,
            address,
            symbol,
            kind,
        });
    }

    fn trace_enter(&mut self, scope: ScopeKind) -> bool {
        match self.trace.as_deref_mut() {
            Some(sink) if sink.mask().contains(scope.mask()) => {
                sink.scope_enter(&self.machine, scope, self.depth);
                true
            }
            _ => false,
        }
    }

    fn trace_exit(&mut self, scope: ScopeKind) {
        if let Some(sink) = self.trace.as_deref_mut() {
            sink.scope_exit(scope, self.depth);
        }
    }

    /// Handles one trap outside of [`GuestMachine::run`], reading and writing the machine's
    /// memory.
    ///
    /// For engines that deliver traps through their own event loop.
    ///
    /// # Panics
    ///
    /// Panics when the sandbox has been torn down.
    pub fn handle_trap(&mut self, frame: TrapFrame) -> Result<(), BridgeError> {
        self.assert_live();
        let Self {
            machine,
            host,
            registry,
            policy,
            limits,
            session,
            trace,
            depth,
            ..
        } = self;
        let mut context = DispatchContext {
            registry,
            host,
            policy: &**policy,
            limits,
            session,
            trace,
            depth: *depth + 1,
        };
        context.handle(machine, frame)
    }

    /// Resolves `name` into a reusable guest callable.
    pub fn vmcallable(&mut self, name: &str) -> Result<GuestCallable, BridgeError> {
        let address = self.address_of(name)?;
        Ok(self.callable_at(address))
    }

    /// A guest callable for a raw address.
    pub fn callable_at(&self, address: GuestAddr) -> GuestCallable {
        GuestCallable::new(self.session.id, self.session.epoch, address)
    }

    /// Invokes a guest callable created by this sandbox.
    ///
    /// # Panics
    ///
    /// Panics when `callable` belongs to another sandbox or to an earlier epoch of this one.
    pub fn invoke(
        &mut self,
        callable: &GuestCallable,
        args: &[Variant],
    ) -> Result<Variant, BridgeError> {
        assert_eq!(
            callable.sandbox(),
            self.session.id,
            "guest callable invoked on a foreign sandbox"
        );
        assert_eq!(
            callable.epoch(),
            self.session.epoch,
            "guest callable invoked after its sandbox was torn down"
        );
        self.vmcall_address(callable.address(), args)
    }

    /// Drops every handle and cached symbol and invalidates outstanding guest callables.
    ///
    /// After teardown, handles issued before never resolve again. Further guest calls, traps and
    /// exposures panic.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.registry.clear();
        self.symbols.clear();
        self.session.epoch = self.session.epoch.wrapping_add(1);
        self.session.at_line_start = true;
        self.torn_down = true;
        log::debug!("[{}] torn down", self.session.name);
    }
}

impl<M: GuestMachine, H: Host> Drop for Sandbox<M, H> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<M: GuestMachine, H: Host> fmt::Debug for Sandbox<M, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sandbox")
            .field("id", &self.session.id)
            .field("name", &self.session.name)
            .field("epoch", &self.session.epoch)
            .field("objects", &self.registry.object_count())
            .field("values", &self.registry.value_count())
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}
