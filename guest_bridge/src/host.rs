// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host object model contract.
//!
//! The host owns every long-lived object; the bridge only needs liveness, a parent relation for
//! access checks, and reflective method/property access. Most operations have defaults that route
//! through [`Host::call_method`] using the conventional reflective method names, so a minimal host
//! implements four methods.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::call::GuestCallable;
use crate::value::ObjectId;
use crate::variant::{Callable, Variant};

/// Failure reported by a [`Host`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum HostError {
    /// The object has been freed.
    #[error("{0} is no longer alive")]
    DeadObject(ObjectId),
    /// The object has no such method.
    #[error("unknown method `{0}`")]
    UnknownMethod(String),
    /// The object has no such property.
    #[error("unknown property `{0}`")]
    UnknownProperty(String),
    /// The host rejected an argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The host does not implement this capability.
    #[error("not supported by this host: {0}")]
    Unsupported(&'static str),
}

/// The trusted host object graph.
pub trait Host {
    /// Returns `true` while `object` has not been freed.
    fn is_alive(&self, object: ObjectId) -> bool;

    /// Parent of `object` in the host hierarchy, if any.
    fn parent_of(&self, _object: ObjectId) -> Option<ObjectId> {
        None
    }

    /// Calls `method` on `object`.
    fn call_method(
        &mut self,
        object: ObjectId,
        method: &str,
        args: &[Variant],
    ) -> Result<Variant, HostError>;

    /// Queues `method` on `object` for the end of the current frame.
    ///
    /// The default calls it immediately.
    fn call_deferred(
        &mut self,
        object: ObjectId,
        method: &str,
        args: &[Variant],
    ) -> Result<(), HostError> {
        self.call_method(object, method, args).map(drop)
    }

    /// Reads a property.
    fn get_property(&mut self, object: ObjectId, property: &str) -> Result<Variant, HostError>;

    /// Writes a property.
    fn set_property(
        &mut self,
        object: ObjectId,
        property: &str,
        value: Variant,
    ) -> Result<(), HostError>;

    /// Method names of `object`.
    fn method_list(&mut self, object: ObjectId) -> Result<Vec<String>, HostError> {
        let listed = self.call_method(object, "get_method_list", &[])?;
        Ok(names_of(listed))
    }

    /// Property names of `object`.
    fn property_list(&mut self, object: ObjectId) -> Result<Vec<String>, HostError> {
        let listed = self.call_method(object, "get_property_list", &[])?;
        Ok(names_of(listed))
    }

    /// Signal names of `object`.
    fn signal_list(&mut self, object: ObjectId) -> Result<Vec<String>, HostError> {
        let listed = self.call_method(object, "get_signal_list", &[])?;
        Ok(names_of(listed))
    }

    /// Connects `signal` of `object` to `target`.
    fn connect(
        &mut self,
        object: ObjectId,
        signal: &str,
        target: Callable,
    ) -> Result<(), HostError> {
        let args = [Variant::StringName(signal.into()), Variant::Callable(target)];
        self.call_method(object, "connect", &args).map(drop)
    }

    /// Disconnects `signal` of `object` from `target`.
    fn disconnect(
        &mut self,
        object: ObjectId,
        signal: &str,
        target: Callable,
    ) -> Result<(), HostError> {
        let args = [Variant::StringName(signal.into()), Variant::Callable(target)];
        self.call_method(object, "disconnect", &args).map(drop)
    }

    /// Looks up a globally reachable object by name.
    fn find_object(&mut self, _name: &str) -> Option<ObjectId> {
        None
    }

    /// Resolves `path` relative to `base`.
    fn get_node(&mut self, base: ObjectId, path: &str) -> Result<Option<ObjectId>, HostError> {
        let found = self.call_method(base, "get_node_or_null", &[Variant::NodePath(path.into())])?;
        Ok(found.as_object())
    }

    /// Instantiates an object of `class`.
    fn create_object(&mut self, _class: &str) -> Result<ObjectId, HostError> {
        Err(HostError::Unsupported("create_object"))
    }

    /// Creates a started timer that invokes `callback` every `interval` seconds (or once).
    fn create_timer(
        &mut self,
        _interval: f64,
        _oneshot: bool,
        _callback: GuestCallable,
    ) -> Result<ObjectId, HostError> {
        Err(HostError::Unsupported("create_timer"))
    }

    /// Calls a builtin method on a non-object value.
    fn call_builtin(
        &mut self,
        _receiver: &Variant,
        method: &str,
        _args: &[Variant],
    ) -> Result<Variant, HostError> {
        Err(HostError::UnknownMethod(method.into()))
    }

    /// Guest console output.
    fn print(&mut self, text: &str) {
        log::info!("{text}");
    }

    /// Returns `true` when running inside an editor rather than a game.
    fn is_editor(&self) -> bool {
        false
    }
}

/// Extracts names from a reflective listing: plain strings, or dictionaries with a `name` entry.
fn names_of(listed: Variant) -> Vec<String> {
    let Variant::Array(items) = listed else {
        return vec![];
    };
    let key = Variant::String("name".into());
    items
        .into_iter()
        .filter_map(|item| match item {
            Variant::String(s) | Variant::StringName(s) => Some(s),
            Variant::Dictionary(entry) => {
                entry.get(&key).and_then(Variant::as_str).map(String::from)
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::Dictionary;

    struct Reflective;

    impl Host for Reflective {
        fn is_alive(&self, _object: ObjectId) -> bool {
            true
        }

        fn call_method(
            &mut self,
            _object: ObjectId,
            method: &str,
            _args: &[Variant],
        ) -> Result<Variant, HostError> {
            match method {
                "get_method_list" => {
                    let mut entry = Dictionary::new();
                    entry.insert(Variant::from("name"), Variant::from("jump"));
                    Ok(Variant::Array(vec![
                        Variant::Dictionary(entry),
                        Variant::StringName("run".into()),
                        Variant::Int(7),
                    ]))
                }
                "get_node_or_null" => Ok(Variant::Object(ObjectId::new(9))),
                _ => Err(HostError::UnknownMethod(method.into())),
            }
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
    fn default_reflection_routes_through_call_method() {
        let mut host = Reflective;
        let names = host.method_list(ObjectId::new(1)).unwrap();
        assert_eq!(names, vec![String::from("jump"), String::from("run")]);
        assert_eq!(
            host.get_node(ObjectId::new(1), "Child").unwrap(),
            Some(ObjectId::new(9))
        );
        assert_eq!(
            host.signal_list(ObjectId::new(1)),
            Err(HostError::UnknownMethod("get_signal_list".into()))
        );
        assert!(!host.is_editor());
    }
}
