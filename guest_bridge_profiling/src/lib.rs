// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Profiling adapters for `guest_bridge` (currently Tracy).
//!
//! This crate is `std`-only and keeps `guest_bridge` itself free of profiling dependencies.
//! It listens for scope enter/exit callbacks and emits matching profiling scopes.
//!
//! ## Backend
//! This crate currently supports the Tracy backend via `tracy-client`.
//!
//! ## Example
//! ```ignore
//! use guest_bridge::Sandbox;
//! use guest_bridge_profiling::ProfilingTraceSink;
//!
//! let mut sandbox = Sandbox::new(machine, host).with_trace(ProfilingTraceSink::new());
//! sandbox.vmcall("on_ready", &[])?;
//! # Ok::<(), guest_bridge::BridgeError>(())
//! ```

mod resolver;
mod sink;

pub use resolver::{DefaultLabelResolver, LabelResolver, SymbolLabelResolver};
pub use sink::ProfilingTraceSink;
