// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::{BTreeMap, HashMap};

use guest_bridge::call::GuestCallable;
use guest_bridge::host::{Host, HostError};
use guest_bridge::math::{Vector2, Vector3};
use guest_bridge::value::ObjectId;
use guest_bridge::variant::{Callable, Variant};

const METHODS: &[&str] = &[
    "get_name",
    "set_name",
    "get_path",
    "get_parent",
    "queue_free",
    "duplicate",
    "get_child_count",
    "get_child",
    "add_child",
    "add_sibling",
    "move_child",
    "remove_child",
    "get_children",
    "get_node_or_null",
    "echo",
];

const SIGNALS: &[&str] = &["ready", "tree_exited", "renamed"];

#[derive(Clone, Debug)]
struct Node {
    name: String,
    class: String,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
    properties: BTreeMap<String, Variant>,
    alive: bool,
}

impl Node {
    fn new(name: &str, class: &str) -> Self {
        let mut properties = BTreeMap::new();
        match class {
            "Node2D" => {
                properties.insert("position".into(), Variant::Vector2(Vector2::default()));
                properties.insert("rotation".into(), Variant::Float(0.0));
                properties.insert("scale".into(), Variant::Vector2(Vector2::new(1.0, 1.0)));
                properties.insert("skew".into(), Variant::Float(0.0));
            }
            "Node3D" => {
                properties.insert("position".into(), Variant::Vector3(Vector3::default()));
                properties.insert("rotation".into(), Variant::Vector3(Vector3::default()));
                properties.insert("scale".into(), Variant::Vector3(Vector3::new(1.0, 1.0, 1.0)));
            }
            _ => {}
        }
        Self {
            name: name.into(),
            class: class.into(),
            parent: None,
            children: Vec::new(),
            properties,
            alive: true,
        }
    }
}

/// A method call the host received.
#[derive(Clone, Debug, PartialEq)]
pub struct HostCall {
    /// Receiver.
    pub object: ObjectId,
    /// Method name.
    pub method: String,
    /// Arguments.
    pub args: Vec<Variant>,
    /// Queued rather than run.
    pub deferred: bool,
}

/// A timer created through the host.
#[derive(Clone, Debug, PartialEq)]
pub struct Timer {
    /// Timer object.
    pub object: ObjectId,
    /// Period in seconds.
    pub interval: f64,
    /// Fires once.
    pub oneshot: bool,
    /// Guest function to call.
    pub callback: GuestCallable,
    /// Stopped by the guest.
    pub stopped: bool,
}

/// A small scene tree implementing [`Host`].
///
/// Node 1 is the root, named `root`. Nodes know `Node`, `Node2D` and `Node3D` transforms as
/// plain properties.
#[derive(Debug)]
pub struct SceneHost {
    nodes: BTreeMap<ObjectId, Node>,
    last_id: u64,
    globals: HashMap<String, ObjectId>,
    output: String,
    calls: Vec<HostCall>,
    connections: Vec<(ObjectId, String, Callable)>,
    timers: Vec<Timer>,
    editor: bool,
}

impl SceneHost {
    /// Creates a scene holding only the root node.
    pub fn new() -> Self {
        let mut host = Self {
            nodes: BTreeMap::new(),
            last_id: 0,
            globals: HashMap::new(),
            output: String::new(),
            calls: Vec::new(),
            connections: Vec::new(),
            timers: Vec::new(),
            editor: false,
        };
        host.spawn("root", "Node");
        host
    }

    fn spawn(&mut self, name: &str, class: &str) -> ObjectId {
        self.last_id += 1;
        let id = ObjectId::new(self.last_id);
        self.nodes.insert(id, Node::new(name, class));
        id
    }

    /// The root node.
    pub fn root(&self) -> ObjectId {
        ObjectId::new(1)
    }

    /// Adds a node of `class` below `parent`.
    pub fn add_node(&mut self, parent: ObjectId, name: &str, class: &str) -> ObjectId {
        let id = self.spawn(name, class);
        self.attach(id, parent, None);
        id
    }

    /// Adds a node that is not part of the tree.
    pub fn add_detached(&mut self, name: &str, class: &str) -> ObjectId {
        self.spawn(name, class)
    }

    /// Makes `object` reachable through [`Host::find_object`].
    pub fn set_global(&mut self, name: &str, object: ObjectId) {
        self.globals.insert(name.into(), object);
    }

    /// Frees `object` and its subtree.
    pub fn free(&mut self, object: ObjectId) {
        self.detach(object);
        let mut pending = vec![object];
        while let Some(id) = pending.pop() {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.alive = false;
                pending.extend(node.children.iter().copied());
            }
        }
    }

    /// Switches editor mode.
    pub fn set_editor(&mut self, editor: bool) {
        self.editor = editor;
    }

    /// Everything printed so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Method calls received so far.
    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    /// Live signal connections.
    pub fn connections(&self) -> &[(ObjectId, String, Callable)] {
        &self.connections
    }

    /// Timers created so far.
    pub fn timers(&self) -> &[Timer] {
        &self.timers
    }

    /// Name of `object`.
    pub fn name_of(&self, object: ObjectId) -> Option<&str> {
        self.nodes.get(&object).map(|n| n.name.as_str())
    }

    /// Class of `object`.
    pub fn class_of(&self, object: ObjectId) -> Option<&str> {
        self.nodes.get(&object).map(|n| n.class.as_str())
    }

    /// Children of `object` in order.
    pub fn children_of(&self, object: ObjectId) -> &[ObjectId] {
        self.nodes.get(&object).map_or(&[], |n| n.children.as_slice())
    }

    /// Current value of a property.
    pub fn property(&self, object: ObjectId, property: &str) -> Option<&Variant> {
        self.nodes.get(&object)?.properties.get(property)
    }

    fn live(&self, object: ObjectId) -> Result<&Node, HostError> {
        self.nodes
            .get(&object)
            .filter(|n| n.alive)
            .ok_or(HostError::DeadObject(object))
    }

    fn live_mut(&mut self, object: ObjectId) -> Result<&mut Node, HostError> {
        self.nodes
            .get_mut(&object)
            .filter(|n| n.alive)
            .ok_or(HostError::DeadObject(object))
    }

    fn detach(&mut self, object: ObjectId) {
        let parent = self.nodes.get_mut(&object).and_then(|n| n.parent.take());
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != object);
        }
    }

    fn attach(&mut self, object: ObjectId, parent: ObjectId, at: Option<usize>) {
        self.detach(object);
        if let Some(node) = self.nodes.get_mut(&object) {
            node.parent = Some(parent);
        }
        if let Some(parent) = self.nodes.get_mut(&parent) {
            let at = at.unwrap_or(parent.children.len()).min(parent.children.len());
            parent.children.insert(at, object);
        }
    }

    fn path_of(&self, object: ObjectId) -> String {
        let mut names = Vec::new();
        let mut cursor = Some(object);
        while let Some(id) = cursor {
            let Some(node) = self.nodes.get(&id) else {
                break;
            };
            names.push(node.name.as_str());
            cursor = node.parent;
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    fn resolve(&self, base: ObjectId, path: &str) -> Option<ObjectId> {
        let (mut cursor, rest) = match path.strip_prefix('/') {
            Some(rest) => {
                let (first, rest) = rest.split_once('/').unwrap_or((rest, ""));
                let root = self.root();
                (self.live(root).ok().filter(|n| n.name == first).map(|_| root)?, rest)
            }
            None => (base, path),
        };
        for part in rest.split('/').filter(|p| !p.is_empty()) {
            let node = self.live(cursor).ok()?;
            cursor = match part {
                "." => cursor,
                ".." => node.parent?,
                name => *node
                    .children
                    .iter()
                    .find(|c| self.nodes.get(*c).is_some_and(|n| n.alive && n.name == name))?,
            };
        }
        self.live(cursor).ok().map(|_| cursor)
    }

    fn object_arg(args: &[Variant], position: usize) -> Result<ObjectId, HostError> {
        args.get(position)
            .and_then(Variant::as_object)
            .ok_or_else(|| HostError::InvalidArgument(format!("argument {position} is not an object")))
    }

    fn int_arg(args: &[Variant], position: usize) -> Result<i64, HostError> {
        args.get(position)
            .and_then(Variant::as_int)
            .ok_or_else(|| HostError::InvalidArgument(format!("argument {position} is not an int")))
    }

    fn run(&mut self, object: ObjectId, method: &str, args: &[Variant]) -> Result<Variant, HostError> {
        let node = self.live(object)?;
        Ok(match method {
            "get_name" => Variant::StringName(node.name.clone()),
            "set_name" => {
                let name = args
                    .first()
                    .and_then(Variant::as_str)
                    .ok_or_else(|| HostError::InvalidArgument("name".into()))?
                    .to_owned();
                self.live_mut(object)?.name = name;
                Variant::Nil
            }
            "get_path" => Variant::NodePath(self.path_of(object)),
            "get_parent" => node.parent.map_or(Variant::Nil, Variant::Object),
            "queue_free" => {
                self.free(object);
                Variant::Nil
            }
            "duplicate" => {
                let copy = node.clone();
                let id = self.spawn(&copy.name, &copy.class);
                if let Some(fresh) = self.nodes.get_mut(&id) {
                    fresh.properties = copy.properties;
                }
                Variant::Object(id)
            }
            "get_child_count" => Variant::Int(node.children.len() as i64),
            "get_child" => {
                let index = Self::int_arg(args, 0)?;
                let len = node.children.len() as i64;
                let index = if index < 0 { index + len } else { index };
                usize::try_from(index)
                    .ok()
                    .and_then(|i| node.children.get(i))
                    .map_or(Variant::Nil, |c| Variant::Object(*c))
            }
            "get_children" => {
                Variant::Array(node.children.iter().map(|c| Variant::Object(*c)).collect())
            }
            "add_child" => {
                let child = Self::object_arg(args, 0)?;
                self.live(child)?;
                self.attach(child, object, None);
                Variant::Nil
            }
            "add_sibling" => {
                let sibling = Self::object_arg(args, 0)?;
                self.live(sibling)?;
                let parent = node
                    .parent
                    .ok_or_else(|| HostError::InvalidArgument("node has no parent".into()))?;
                let at = self
                    .children_of(parent)
                    .iter()
                    .position(|c| *c == object)
                    .map(|i| i + 1);
                self.attach(sibling, parent, at);
                Variant::Nil
            }
            "move_child" => {
                let child = Self::object_arg(args, 0)?;
                let to = usize::try_from(Self::int_arg(args, 1)?)
                    .map_err(|_| HostError::InvalidArgument("index".into()))?;
                if self.nodes.get(&child).and_then(|c| c.parent) != Some(object) {
                    return Err(HostError::InvalidArgument("not a child".into()));
                }
                self.attach(child, object, Some(to));
                Variant::Nil
            }
            "remove_child" => {
                let child = Self::object_arg(args, 0)?;
                if self.nodes.get(&child).and_then(|c| c.parent) == Some(object) {
                    self.detach(child);
                }
                Variant::Nil
            }
            "get_node_or_null" => {
                let path = args.first().and_then(Variant::as_str).unwrap_or_default();
                self.resolve(object, path).map_or(Variant::Nil, Variant::Object)
            }
            "get_method_list" => {
                Variant::Array(METHODS.iter().map(|m| Variant::from(*m)).collect())
            }
            "get_signal_list" => {
                Variant::Array(SIGNALS.iter().map(|s| Variant::from(*s)).collect())
            }
            "get_property_list" => {
                let mut names = vec![Variant::from("name")];
                names.extend(node.properties.keys().map(|k| Variant::from(k.as_str())));
                Variant::Array(names)
            }
            "stop" => {
                let timer = self
                    .timers
                    .iter_mut()
                    .find(|t| t.object == object)
                    .ok_or_else(|| HostError::UnknownMethod(method.into()))?;
                timer.stopped = true;
                Variant::Nil
            }
            "echo" => args.first().cloned().unwrap_or_default(),
            _ => return Err(HostError::UnknownMethod(method.into())),
        })
    }
}

impl Default for SceneHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for SceneHost {
    fn is_alive(&self, object: ObjectId) -> bool {
        self.live(object).is_ok()
    }

    fn parent_of(&self, object: ObjectId) -> Option<ObjectId> {
        self.nodes.get(&object)?.parent
    }

    fn call_method(
        &mut self,
        object: ObjectId,
        method: &str,
        args: &[Variant],
    ) -> Result<Variant, HostError> {
        self.calls.push(HostCall {
            object,
            method: method.into(),
            args: args.to_vec(),
            deferred: false,
        });
        self.run(object, method, args)
    }

    fn call_deferred(
        &mut self,
        object: ObjectId,
        method: &str,
        args: &[Variant],
    ) -> Result<(), HostError> {
        self.calls.push(HostCall {
            object,
            method: method.into(),
            args: args.to_vec(),
            deferred: true,
        });
        // The frame ends right away in this host.
        self.run(object, method, args).map(drop)
    }

    fn get_property(&mut self, object: ObjectId, property: &str) -> Result<Variant, HostError> {
        let node = self.live(object)?;
        if property == "name" {
            return Ok(Variant::StringName(node.name.clone()));
        }
        node.properties
            .get(property)
            .cloned()
            .ok_or_else(|| HostError::UnknownProperty(property.into()))
    }

    fn set_property(
        &mut self,
        object: ObjectId,
        property: &str,
        value: Variant,
    ) -> Result<(), HostError> {
        let node = self.live_mut(object)?;
        if property == "name" {
            node.name = value
                .as_str()
                .ok_or_else(|| HostError::InvalidArgument("name".into()))?
                .to_owned();
            return Ok(());
        }
        node.properties.insert(property.into(), value);
        Ok(())
    }

    fn connect(
        &mut self,
        object: ObjectId,
        signal: &str,
        target: Callable,
    ) -> Result<(), HostError> {
        self.live(object)?;
        if !SIGNALS.contains(&signal) {
            return Err(HostError::InvalidArgument(format!("unknown signal `{signal}`")));
        }
        self.connections.push((object, signal.into(), target));
        Ok(())
    }

    fn disconnect(
        &mut self,
        object: ObjectId,
        signal: &str,
        target: Callable,
    ) -> Result<(), HostError> {
        self.live(object)?;
        self.connections
            .retain(|(o, s, t)| !(*o == object && s == signal && *t == target));
        Ok(())
    }

    fn find_object(&mut self, name: &str) -> Option<ObjectId> {
        self.globals.get(name).copied().filter(|o| self.is_alive(*o))
    }

    fn get_node(&mut self, base: ObjectId, path: &str) -> Result<Option<ObjectId>, HostError> {
        self.live(base)?;
        Ok(self.resolve(base, path))
    }

    fn create_object(&mut self, class: &str) -> Result<ObjectId, HostError> {
        match class {
            "Node" | "Node2D" | "Node3D" | "Timer" => Ok(self.spawn(class, class)),
            _ => Err(HostError::InvalidArgument(format!("unknown class `{class}`"))),
        }
    }

    fn create_timer(
        &mut self,
        interval: f64,
        oneshot: bool,
        callback: GuestCallable,
    ) -> Result<ObjectId, HostError> {
        if interval <= 0.0 {
            return Err(HostError::InvalidArgument("timer interval".into()));
        }
        let object = self.spawn("Timer", "Timer");
        if let Some(node) = self.nodes.get_mut(&object) {
            node.properties.insert("wait_time".into(), Variant::Float(interval));
            node.properties.insert("one_shot".into(), Variant::Bool(oneshot));
        }
        self.timers.push(Timer {
            object,
            interval,
            oneshot,
            callback,
            stopped: false,
        });
        Ok(object)
    }

    fn call_builtin(
        &mut self,
        receiver: &Variant,
        method: &str,
        _args: &[Variant],
    ) -> Result<Variant, HostError> {
        match (receiver, method) {
            (Variant::String(s), "length") => Ok(Variant::Int(s.chars().count() as i64)),
            (Variant::String(s), "to_upper") => Ok(Variant::String(s.to_uppercase())),
            (Variant::Array(items), "size") => Ok(Variant::Int(items.len() as i64)),
            _ => Err(HostError::UnknownMethod(method.into())),
        }
    }

    fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn is_editor(&self) -> bool {
        self.editor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_resolve_through_the_tree() {
        let mut host = SceneHost::new();
        let root = host.root();
        let level = host.add_node(root, "Level", "Node2D");
        let player = host.add_node(level, "Player", "Node2D");
        assert_eq!(host.get_node(root, "Level/Player"), Ok(Some(player)));
        assert_eq!(host.get_node(player, ".."), Ok(Some(level)));
        assert_eq!(host.get_node(player, "/root/Level"), Ok(Some(level)));
        assert_eq!(host.get_node(level, "Missing"), Ok(None));
        assert_eq!(host.path_of(player), "/root/Level/Player");
    }

    #[test]
    fn freeing_kills_the_subtree() {
        let mut host = SceneHost::new();
        let level = host.add_node(host.root(), "Level", "Node");
        let child = host.add_node(level, "Child", "Node");
        host.free(level);
        assert!(!host.is_alive(level));
        assert!(!host.is_alive(child));
        assert!(host.children_of(host.root()).is_empty());
        assert_eq!(
            host.call_method(child, "get_name", &[]),
            Err(HostError::DeadObject(child))
        );
    }
}
