// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resource limits of a sandbox.

/// Caps applied to every guest call and operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Step budget of one host-to-guest call.
    pub max_steps: u64,
    /// Maximum argument count of one trap.
    pub max_trap_args: usize,
    /// Maximum bytes copied from or to guest memory by one operation.
    pub max_guest_copy: usize,
    /// Maximum container nesting when converting guest values into host values.
    pub max_nesting: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 8_000_000,
            max_trap_args: 16,
            max_guest_copy: 16 << 20,
            max_nesting: 64,
        }
    }
}
