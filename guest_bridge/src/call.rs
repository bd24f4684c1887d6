// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host-to-guest call marshalling.
//!
//! Arguments follow the RISC-V calling convention: integer-class values go to `a0..a7`,
//! floating-point values to `fa0..fa7`, counted independently. Strings are copied onto the guest
//! stack, zero-terminated, and passed as two integer slots (pointer, byte length).
//!
//! `Nil` and `Object` arguments take no slot at all. The callee cannot observe them; objects reach
//! guest code through handles handed out by other means.

use alloc::vec::Vec;

use crate::error::BridgeError;
use crate::machine::{GuestAddr, GuestMachine};
use crate::sandbox::SandboxId;
use crate::variant::Variant;

/// Integer argument registers available for a call.
pub const MAX_INT_SLOTS: usize = 8;

/// Float argument registers available for a call.
pub const MAX_FLOAT_SLOTS: usize = 8;

/// One planned argument.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ArgSlot<'a> {
    /// Text copied onto the guest stack; takes two integer slots.
    Text(&'a str),
    /// One integer slot.
    Int(i64),
    /// One float slot.
    Float(f64),
}

impl ArgSlot<'_> {
    const fn int_slots(&self) -> usize {
        match self {
            Self::Text(_) => 2,
            Self::Int(_) => 1,
            Self::Float(_) => 0,
        }
    }
}

/// Maps arguments onto argument slots.
///
/// Fails with [`BridgeError::Unsupported`] for kinds that have no calling-convention mapping and
/// with [`BridgeError::LimitExceeded`] when the registers run out.
pub fn plan_arguments(args: &[Variant]) -> Result<Vec<ArgSlot<'_>>, BridgeError> {
    let mut plan = Vec::with_capacity(args.len());
    let (mut ints, mut floats) = (0_usize, 0_usize);
    for arg in args {
        let slot = match arg {
            Variant::Nil | Variant::Object(_) => continue,
            Variant::String(s) | Variant::StringName(s) | Variant::NodePath(s) => ArgSlot::Text(s),
            Variant::Int(v) => ArgSlot::Int(*v),
            Variant::Bool(v) => ArgSlot::Int(i64::from(*v)),
            Variant::Float(v) => ArgSlot::Float(*v),
            _ => return Err(BridgeError::Unsupported("argument kind for guest calls")),
        };
        ints += slot.int_slots();
        if matches!(slot, ArgSlot::Float(_)) {
            floats += 1;
        }
        if ints > MAX_INT_SLOTS {
            return Err(BridgeError::LimitExceeded {
                what: "integer argument slots",
                limit: MAX_INT_SLOTS,
            });
        }
        if floats > MAX_FLOAT_SLOTS {
            return Err(BridgeError::LimitExceeded {
                what: "float argument slots",
                limit: MAX_FLOAT_SLOTS,
            });
        }
        plan.push(slot);
    }
    Ok(plan)
}

/// Register contents produced by [`place_arguments`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Placement {
    /// Values written to `a0..`, in order.
    pub int_slots: Vec<u64>,
    /// Values written to `fa0..`, in order.
    pub float_slots: Vec<f64>,
}

/// Writes a plan into a freshly prepared machine.
pub fn place_arguments<M>(machine: &mut M, plan: &[ArgSlot<'_>]) -> Result<Placement, BridgeError>
where
    M: GuestMachine + ?Sized,
{
    let mut placement = Placement::default();
    for slot in plan {
        match *slot {
            ArgSlot::Text(text) => {
                let mut bytes = Vec::with_capacity(text.len() + 1);
                bytes.extend_from_slice(text.as_bytes());
                bytes.push(0);
                let address = machine.push_stack(&bytes)?;
                placement.int_slots.push(address);
                placement.int_slots.push(text.len() as u64);
            }
            ArgSlot::Int(v) => placement.int_slots.push(v as u64),
            ArgSlot::Float(v) => placement.float_slots.push(v),
        }
    }
    for (i, value) in placement.int_slots.iter().enumerate() {
        machine.set_int_arg(i, *value);
    }
    for (i, value) in placement.float_slots.iter().enumerate() {
        machine.set_float_arg(i, *value);
    }
    Ok(placement)
}

/// How the guest's return register is interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ReturnConvention {
    /// `a0` is a signed integer.
    #[default]
    Integer,
    /// `a0` is the guest address of a guest variant.
    Variant,
}

/// A guest function the host can invoke any number of times.
///
/// Bound to the sandbox (and sandbox epoch) that created it; invoking it anywhere else panics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GuestCallable {
    sandbox: SandboxId,
    epoch: u32,
    address: GuestAddr,
}

impl GuestCallable {
    pub(crate) const fn new(sandbox: SandboxId, epoch: u32, address: GuestAddr) -> Self {
        Self {
            sandbox,
            epoch,
            address,
        }
    }

    /// Guest function address.
    #[inline]
    pub const fn address(&self) -> GuestAddr {
        self.address
    }

    /// Owning sandbox.
    #[inline]
    pub const fn sandbox(&self) -> SandboxId {
        self.sandbox
    }

    /// Sandbox epoch at creation.
    #[inline]
    pub const fn epoch(&self) -> u32 {
        self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectId;
    use alloc::vec;

    #[test]
    fn strings_take_two_int_slots_and_floats_count_separately() {
        let args = [Variant::from("hello"), Variant::Int(42), Variant::Float(3.5)];
        let plan = plan_arguments(&args).unwrap();
        assert_eq!(
            plan,
            vec![ArgSlot::Text("hello"), ArgSlot::Int(42), ArgSlot::Float(3.5)]
        );
    }

    #[test]
    fn nil_and_objects_take_no_slot() {
        let args = [
            Variant::Nil,
            Variant::Object(ObjectId::new(1)),
            Variant::Bool(true),
        ];
        assert_eq!(plan_arguments(&args).unwrap(), vec![ArgSlot::Int(1)]);
    }

    #[test]
    fn unsupported_kinds_and_register_exhaustion() {
        assert_eq!(
            plan_arguments(&[Variant::Array(vec![])]),
            Err(BridgeError::Unsupported("argument kind for guest calls"))
        );
        let many = vec![Variant::from("s"); 5];
        assert_eq!(
            plan_arguments(&many),
            Err(BridgeError::LimitExceeded {
                what: "integer argument slots",
                limit: MAX_INT_SLOTS
            })
        );
        let floats = vec![Variant::Float(1.0); 9];
        assert!(plan_arguments(&floats).is_err());
        assert!(plan_arguments(&floats[..8]).is_ok());
    }
}
