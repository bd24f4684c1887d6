// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type for conversion, dispatch and call marshalling.

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

use crate::host::HostError;
use crate::machine::{FaultReport, GuestAddr};
use crate::value::ObjectId;

/// Failure of a boundary operation.
///
/// Every failure is local to the call that produced it; the registry is left exactly as it was
/// before the failed operation started.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum BridgeError {
    /// A value had the wrong kind for the requested access.
    #[error("type mismatch: expected {expected}, found kind {found}")]
    TypeMismatch {
        /// What the operation needed.
        expected: &'static str,
        /// Wire discriminant actually found.
        found: u32,
    },
    /// A handle did not resolve in the registry.
    #[error("unknown handle {0}")]
    UnknownHandle(u64),
    /// The access policy rejected an object/operation pair, or a reflection target did not name
    /// a live exposed object.
    #[error("access denied to {}", .object.map_or(Denied::Unresolved, Denied::Object))]
    AccessDenied {
        /// Object the guest tried to reach; `None` when its handle did not resolve.
        object: Option<ObjectId>,
    },
    /// The operation code or sub-operation is not part of the wire contract.
    #[error("unknown operation {code} (sub-op {sub_op})")]
    UnknownOperation {
        /// Operation code.
        code: u32,
        /// Sub-operation code.
        sub_op: u32,
    },
    /// A positional argument was missing or had the wrong kind.
    #[error("argument {position} has the wrong type, expected {expected}")]
    ArgumentTypeMismatch {
        /// Zero-based argument position.
        position: usize,
        /// What the operation needed.
        expected: &'static str,
    },
    /// A guest call exceeded its step budget.
    #[error("execution timed out calling {} ({address:#x})", .symbol.as_deref().unwrap_or("<unknown>"))]
    ExecutionTimeout {
        /// Called guest address.
        address: GuestAddr,
        /// Symbol name of the called address, if known.
        symbol: Option<String>,
    },
    /// The execution engine reported a fault.
    #[error("guest fault calling {} ({address:#x}): {}", .symbol.as_deref().unwrap_or("<unknown>"), .report.message)]
    GuestFault {
        /// Called guest address.
        address: GuestAddr,
        /// Symbol name of the called address, if known.
        symbol: Option<String>,
        /// Engine-provided context.
        report: Box<FaultReport>,
    },
    /// A recognized kind or operation that is intentionally not implemented on this path.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    /// A guest symbol could not be resolved.
    #[error("unknown guest symbol `{0}`")]
    UnknownSymbol(String),
    /// A container index was out of range.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested index.
        index: i64,
        /// Container length.
        len: usize,
    },
    /// A guest memory range was not accessible.
    #[error("guest memory access failed at {address:#x} ({len} bytes)")]
    MemoryAccess {
        /// Start of the range.
        address: GuestAddr,
        /// Range length.
        len: usize,
    },
    /// A configured limit was exceeded.
    #[error("{what} exceeds the limit of {limit}")]
    LimitExceeded {
        /// Limited quantity.
        what: &'static str,
        /// Configured limit.
        limit: usize,
    },
    /// The guest raised an exception.
    #[error("guest threw {kind}: {message}")]
    GuestThrow {
        /// Exception kind reported by the guest.
        kind: String,
        /// Exception message.
        message: String,
    },
    /// The handle counter wrapped.
    #[error("registry handle space exhausted")]
    HandleSpaceExhausted,
    /// A host collaborator failed.
    #[error(transparent)]
    Host(#[from] HostError),
}

impl BridgeError {
    pub(crate) fn type_mismatch(expected: &'static str, found: crate::value::Kind) -> Self {
        Self::TypeMismatch {
            expected,
            found: found.wire(),
        }
    }

    pub(crate) fn arg(position: usize, expected: &'static str) -> Self {
        Self::ArgumentTypeMismatch { position, expected }
    }
}

enum Denied {
    Object(ObjectId),
    Unresolved,
}

impl fmt::Display for Denied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(object) => write!(f, "{object}"),
            Self::Unresolved => f.write_str("an unresolved object handle"),
        }
    }
}
