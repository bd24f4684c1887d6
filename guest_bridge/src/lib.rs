// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `guest_bridge`: the value and call boundary between a trusted host and a sandboxed guest
//! program.
//!
//! The guest runs inside an execution engine (not part of this crate) and never sees host
//! memory. Everything it touches crosses the boundary as a 24-byte [`guest::GuestVariant`]:
//! inline math values travel by copy, everything else by an opaque [`value::Handle`] into the
//! sandbox's [`registry::Registry`].
//!
//! Two directions:
//! - **guest to host**: the guest raises a trap naming an operation ([`ops::Syscall`]); the
//!   dispatcher decodes its arguments, checks object access against the
//!   [`policy::AccessPolicy`], calls the [`host::Host`] and writes back exactly one result.
//! - **host to guest**: [`sandbox::Sandbox::vmcall`] marshals host values into the RISC-V calling
//!   convention ([`call`]) and runs the guest under a step budget.
//!
//! Failures are [`error::BridgeError`] values. A failed operation leaves the registry as it was.
//!
//! ## Features
//! - `std` (off by default): enables [`background`] translation jobs and `std` support in `log`.

#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

#[cfg(feature = "std")]
pub mod background;
pub mod call;
pub mod diagnostics;
mod dispatch;
pub mod error;
pub mod guest;
pub mod host;
pub mod limits;
pub mod machine;
pub mod math;
pub mod ops;
pub mod policy;
pub mod registry;
pub mod sandbox;
pub mod trace;
pub mod value;
pub mod variant;

pub use error::BridgeError;
pub use host::{Host, HostError};
pub use sandbox::{Sandbox, SandboxId};
pub use value::{Handle, Kind, ObjectId, TaggedValue};
pub use variant::Variant;
