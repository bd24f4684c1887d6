// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Access capability checks.
//!
//! The bridge does not define a policy language. Every object access the guest requests passes
//! through one predicate, [`AccessPolicy::allows`], and embedders layer whatever policy they need
//! on top of it.

use core::fmt;

use crate::host::Host;
use crate::registry::Registry;
use crate::value::ObjectId;

/// The kind of access requested on an object.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectAccess<'a> {
    /// Hand the guest a handle to the object.
    Expose,
    /// Call a method.
    Call {
        /// Method name.
        method: &'a str,
    },
    /// Read a property.
    Get {
        /// Property name.
        property: &'a str,
    },
    /// Write a property.
    Set {
        /// Property name.
        property: &'a str,
    },
    /// Enumerate methods, properties or signals.
    Reflect,
    /// Connect to a signal.
    Connect {
        /// Signal name.
        signal: &'a str,
    },
    /// Disconnect from a signal.
    Disconnect {
        /// Signal name.
        signal: &'a str,
    },
}

/// What a policy may inspect while deciding.
pub struct PolicyScope<'a> {
    registry: &'a Registry,
    host: &'a dyn Host,
}

impl<'a> PolicyScope<'a> {
    /// Creates a scope over a registry and its host.
    pub fn new(registry: &'a Registry, host: &'a dyn Host) -> Self {
        Self { registry, host }
    }

    /// Returns `true` if `object` already has a handle.
    #[must_use]
    pub fn is_exposed(&self, object: ObjectId) -> bool {
        self.registry.is_exposed(object)
    }

    /// Parent of `object` in the host hierarchy.
    #[must_use]
    pub fn parent_of(&self, object: ObjectId) -> Option<ObjectId> {
        self.host.parent_of(object)
    }

    /// The sandbox registry.
    #[must_use]
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// The host.
    #[must_use]
    pub fn host(&self) -> &'a dyn Host {
        self.host
    }
}

impl fmt::Debug for PolicyScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyScope")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Decides whether the guest may perform an access on an object.
pub trait AccessPolicy {
    /// Returns `true` to allow `access` on `object`.
    fn allows(&self, scope: &PolicyScope<'_>, object: ObjectId, access: ObjectAccess<'_>) -> bool;
}

impl<F> AccessPolicy for F
where
    F: Fn(ObjectId, ObjectAccess<'_>) -> bool,
{
    fn allows(&self, _scope: &PolicyScope<'_>, object: ObjectId, access: ObjectAccess<'_>) -> bool {
        self(object, access)
    }
}

/// Default policy: the guest may use anything it has been handed, and may receive objects that
/// live below something it has been handed.
///
/// Exposure walks at most `max_ancestors` parents.
#[derive(Copy, Clone, Debug)]
pub struct ScopedPolicy {
    max_ancestors: usize,
}

impl ScopedPolicy {
    /// Creates the policy with an explicit ancestor walk bound.
    #[must_use]
    pub const fn new(max_ancestors: usize) -> Self {
        Self { max_ancestors }
    }
}

impl Default for ScopedPolicy {
    fn default() -> Self {
        Self::new(64)
    }
}

impl AccessPolicy for ScopedPolicy {
    fn allows(&self, scope: &PolicyScope<'_>, object: ObjectId, access: ObjectAccess<'_>) -> bool {
        if scope.is_exposed(object) {
            return true;
        }
        if access != ObjectAccess::Expose {
            return false;
        }
        let mut cursor = object;
        for _ in 0..self.max_ancestors {
            match scope.parent_of(cursor) {
                Some(parent) if scope.is_exposed(parent) => return true,
                Some(parent) => cursor = parent,
                None => return false,
            }
        }
        false
    }
}

/// Allows everything. For trusted guests and tests.
#[derive(Copy, Clone, Debug, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn allows(&self, _: &PolicyScope<'_>, _: ObjectId, _: ObjectAccess<'_>) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostError;
    use crate::variant::Variant;

    // Objects form a chain: n's parent is n - 1, object 0 is the root.
    struct Chain;

    impl Host for Chain {
        fn is_alive(&self, _object: ObjectId) -> bool {
            true
        }

        fn parent_of(&self, object: ObjectId) -> Option<ObjectId> {
            object.as_u64().checked_sub(1).map(ObjectId::new)
        }

        fn call_method(
            &mut self,
            _object: ObjectId,
            method: &str,
            _args: &[Variant],
        ) -> Result<Variant, HostError> {
            Err(HostError::UnknownMethod(method.into()))
        }

        fn get_property(
            &mut self,
            _object: ObjectId,
            property: &str,
        ) -> Result<Variant, HostError> {
            Err(HostError::UnknownProperty(property.into()))
        }

        fn set_property(
            &mut self,
            _object: ObjectId,
            property: &str,
            _value: Variant,
        ) -> Result<(), HostError> {
            Err(HostError::UnknownProperty(property.into()))
        }
    }

    #[test]
    fn scoped_policy_allows_descendants_of_exposed_objects() {
        let mut registry = Registry::new();
        registry.expose_object(ObjectId::new(10)).unwrap();
        let host = Chain;
        let scope = PolicyScope::new(&registry, &host);
        let policy = ScopedPolicy::default();

        assert!(policy.allows(&scope, ObjectId::new(10), ObjectAccess::Reflect));
        assert!(policy.allows(&scope, ObjectId::new(12), ObjectAccess::Expose));
        // Ancestors are not reachable from below.
        assert!(!policy.allows(&scope, ObjectId::new(9), ObjectAccess::Expose));
        // Unexposed objects cannot be used directly.
        assert!(!policy.allows(&scope, ObjectId::new(12), ObjectAccess::Reflect));
    }

    #[test]
    fn ancestor_walk_is_bounded() {
        let mut registry = Registry::new();
        registry.expose_object(ObjectId::new(0)).unwrap();
        let host = Chain;
        let scope = PolicyScope::new(&registry, &host);
        assert!(ScopedPolicy::new(5).allows(&scope, ObjectId::new(5), ObjectAccess::Expose));
        assert!(!ScopedPolicy::new(5).allows(&scope, ObjectId::new(6), ObjectAccess::Expose));
    }

    #[test]
    fn closures_are_policies() {
        let registry = Registry::new();
        let host = Chain;
        let scope = PolicyScope::new(&registry, &host);
        let deny_writes = |_: ObjectId, access: ObjectAccess<'_>| {
            !matches!(access, ObjectAccess::Set { .. })
        };
        assert!(deny_writes.allows(&scope, ObjectId::new(1), ObjectAccess::Get { property: "x" }));
        assert!(!deny_writes.allows(&scope, ObjectId::new(1), ObjectAccess::Set { property: "x" }));
        assert!(AllowAll.allows(&scope, ObjectId::new(1), ObjectAccess::Expose));
    }
}
