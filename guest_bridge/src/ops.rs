// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Operation code space.
//!
//! This table is the wire contract between guest programs and the host. Codes are dense, start at
//! [`API_BASE`] and are only ever appended; existing numbers never change. Grouped codes carry a
//! sub-operation from one of the closed enums below, numbered from zero.

/// First operation code.
pub const API_BASE: u32 = 500;

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:expr => $label:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        #[repr(u32)]
        $vis enum $name {
            $($(#[$vmeta])* $variant = $value,)*
        }

        impl $name {
            /// Every code in wire order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)*];

            /// Wire code.
            #[inline]
            pub const fn code(self) -> u32 {
                self as u32
            }

            /// Short stable label for diagnostics and profiling.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)*
                }
            }

            /// Decodes a wire code.
            pub const fn from_code(code: u32) -> Option<Self> {
                $(if code == $value {
                    return Some(Self::$variant);
                })*
                None
            }
        }

        impl TryFrom<u32> for $name {
            type Error = u32;

            fn try_from(code: u32) -> Result<Self, u32> {
                Self::from_code(code).ok_or(code)
            }
        }
    };
}

wire_enum! {
    /// Top-level operation codes.
    pub enum Syscall {
        /// Print values to the host console.
        Print = API_BASE => "print",
        /// Call a method on any value.
        VCall = API_BASE + 1 => "vcall",
        /// Evaluate an operator on two values.
        VEval = API_BASE + 2 => "veval",
        /// Release a value handle.
        VFree = API_BASE + 3 => "vfree",
        /// Look up a global object by name.
        GetObj = API_BASE + 4 => "get_obj",
        /// Object reflection group ([`ObjectOp`]).
        Obj = API_BASE + 5 => "obj",
        /// Call a method on an object, optionally deferred.
        ObjCallp = API_BASE + 6 => "obj_callp",
        /// Look up a node by path.
        GetNode = API_BASE + 7 => "get_node",
        /// Node hierarchy group ([`NodeOp`]).
        Node = API_BASE + 8 => "node",
        /// 2D node group ([`Node2DOp`]).
        Node2D = API_BASE + 9 => "node2d",
        /// 3D node group ([`Node3DOp`]).
        Node3D = API_BASE + 10 => "node3d",
        /// Raise a guest exception.
        Throw = API_BASE + 11 => "throw",
        /// Editor-mode query.
        IsEditor = API_BASE + 12 => "is_editor",
        /// Sine and cosine of an angle.
        SinCos = API_BASE + 13 => "sincos",
        /// 2D vector length.
        Vec2Length = API_BASE + 14 => "vec2_length",
        /// Normalized 2D vector.
        Vec2Normalized = API_BASE + 15 => "vec2_normalized",
        /// Rotated 2D vector.
        Vec2Rotated = API_BASE + 16 => "vec2_rotated",
        /// Create a value.
        VCreate = API_BASE + 17 => "vcreate",
        /// Shallow-copy a value.
        VClone = API_BASE + 18 => "vclone",
        /// Copy a value's contents into guest memory.
        VFetch = API_BASE + 19 => "vfetch",
        /// Replace a value's contents from guest memory.
        VStore = API_BASE + 20 => "vstore",
        /// Array group ([`ArrayOp`]).
        ArrayOps = API_BASE + 21 => "array_ops",
        /// Indexed array read.
        ArrayAt = API_BASE + 22 => "array_at",
        /// Array length.
        ArraySize = API_BASE + 23 => "array_size",
        /// Dictionary group ([`DictionaryOp`]).
        DictionaryOps = API_BASE + 24 => "dictionary_ops",
        /// Create a string from guest bytes.
        StringCreate = API_BASE + 25 => "string_create",
        /// String group ([`StringOp`]).
        StringOps = API_BASE + 26 => "string_ops",
        /// Indexed string read.
        StringAt = API_BASE + 27 => "string_at",
        /// String length.
        StringSize = API_BASE + 28 => "string_size",
        /// Append guest bytes to a string.
        StringAppend = API_BASE + 29 => "string_append",
        /// Create a periodic or one-shot timer.
        TimerPeriodic = API_BASE + 30 => "timer_periodic",
        /// Stop a timer.
        TimerStop = API_BASE + 31 => "timer_stop",
        /// Create a node ([`NodeCreate`]).
        NodeCreate = API_BASE + 32 => "node_create",
        /// Batched 32-bit math ([`MathOp`]).
        MathOp32 = API_BASE + 33 => "math_op32",
        /// Batched 64-bit math ([`MathOp`]).
        MathOp64 = API_BASE + 34 => "math_op64",
        /// Batched 32-bit interpolation ([`LerpOp`]).
        LerpOp32 = API_BASE + 35 => "lerp_op32",
        /// Batched 64-bit interpolation ([`LerpOp`]).
        LerpOp64 = API_BASE + 36 => "lerp_op64",
        /// 3D vector group ([`Vec3Op`]).
        Vec3Ops = API_BASE + 37 => "vec3_ops",
    }
}

wire_enum! {
    /// Object reflection operations.
    pub enum ObjectOp {
        /// List method names.
        GetMethodList = 0 => "get_method_list",
        /// Read a property.
        Get = 1 => "get",
        /// Write a property.
        Set = 2 => "set",
        /// List property names.
        GetPropertyList = 3 => "get_property_list",
        /// Connect a signal to a method of another object.
        Connect = 4 => "connect",
        /// Disconnect a signal.
        Disconnect = 5 => "disconnect",
        /// List signal names.
        GetSignalList = 6 => "get_signal_list",
    }
}

wire_enum! {
    /// Node creation shortcuts.
    pub enum NodeCreate {
        /// Any class by name.
        ClassDb = 0 => "classdb",
        /// Plain node.
        Node = 1 => "node",
        /// 2D node.
        Node2D = 2 => "node2d",
        /// 3D node.
        Node3D = 3 => "node3d",
    }
}

wire_enum! {
    /// Node hierarchy operations.
    pub enum NodeOp {
        /// Node name.
        GetName = 0 => "get_name",
        /// Absolute path.
        GetPath = 1 => "get_path",
        /// Parent node.
        GetParent = 2 => "get_parent",
        /// Free at end of frame.
        QueueFree = 3 => "queue_free",
        /// Copy the node.
        Duplicate = 4 => "duplicate",
        /// Number of children.
        GetChildCount = 5 => "get_child_count",
        /// Child by index.
        GetChild = 6 => "get_child",
        /// Add a child.
        AddChild = 7 => "add_child",
        /// Add a child at end of frame.
        AddChildDeferred = 8 => "add_child_deferred",
        /// Add a sibling.
        AddSibling = 9 => "add_sibling",
        /// Add a sibling at end of frame.
        AddSiblingDeferred = 10 => "add_sibling_deferred",
        /// Reorder a child.
        MoveChild = 11 => "move_child",
        /// Remove a child.
        RemoveChild = 12 => "remove_child",
        /// Remove a child at end of frame.
        RemoveChildDeferred = 13 => "remove_child_deferred",
        /// All children.
        GetChildren = 14 => "get_children",
        /// Rename.
        SetName = 15 => "set_name",
    }
}

wire_enum! {
    /// 2D node operations.
    pub enum Node2DOp {
        /// Read position.
        GetPosition = 0 => "get_position",
        /// Write position.
        SetPosition = 1 => "set_position",
        /// Read rotation.
        GetRotation = 2 => "get_rotation",
        /// Write rotation.
        SetRotation = 3 => "set_rotation",
        /// Read scale.
        GetScale = 4 => "get_scale",
        /// Write scale.
        SetScale = 5 => "set_scale",
        /// Read skew.
        GetSkew = 6 => "get_skew",
        /// Write skew.
        SetSkew = 7 => "set_skew",
        /// Read transform.
        GetTransform = 8 => "get_transform",
        /// Write transform.
        SetTransform = 9 => "set_transform",
    }
}

wire_enum! {
    /// 3D node operations.
    pub enum Node3DOp {
        /// Read position.
        GetPosition = 0 => "get_position",
        /// Write position.
        SetPosition = 1 => "set_position",
        /// Read rotation.
        GetRotation = 2 => "get_rotation",
        /// Write rotation.
        SetRotation = 3 => "set_rotation",
        /// Read scale.
        GetScale = 4 => "get_scale",
        /// Write scale.
        SetScale = 5 => "set_scale",
        /// Read transform.
        GetTransform = 6 => "get_transform",
        /// Write transform.
        SetTransform = 7 => "set_transform",
        /// Read quaternion.
        GetQuaternion = 8 => "get_quaternion",
        /// Write quaternion.
        SetQuaternion = 9 => "set_quaternion",
    }
}

wire_enum! {
    /// Array operations.
    pub enum ArrayOp {
        /// New array.
        Create = 0 => "create",
        /// Append.
        PushBack = 1 => "push_back",
        /// Prepend.
        PushFront = 2 => "push_front",
        /// Remove at index.
        PopAt = 3 => "pop_at",
        /// Remove last.
        PopBack = 4 => "pop_back",
        /// Remove first.
        PopFront = 5 => "pop_front",
        /// Insert at index.
        Insert = 6 => "insert",
        /// Remove by index.
        Erase = 7 => "erase",
        /// Change length.
        Resize = 8 => "resize",
        /// Remove all.
        Clear = 9 => "clear",
        /// Sort ascending.
        Sort = 10 => "sort",
        /// Copy elements into guest memory.
        FetchToVector = 11 => "fetch_to_vector",
    }
}

wire_enum! {
    /// Dictionary operations.
    pub enum DictionaryOp {
        /// Read a key.
        Get = 0 => "get",
        /// Write a key.
        Set = 1 => "set",
        /// Remove a key.
        Erase = 2 => "erase",
        /// Key presence.
        Has = 3 => "has",
        /// All keys.
        GetKeys = 4 => "get_keys",
        /// All values.
        GetValues = 5 => "get_values",
        /// Entry count.
        GetSize = 6 => "get_size",
        /// Remove all.
        Clear = 7 => "clear",
        /// Merge another dictionary.
        Merge = 8 => "merge",
        /// Read a key, inserting a default when absent.
        GetOrAdd = 9 => "get_or_add",
    }
}

wire_enum! {
    /// String operations.
    pub enum StringOp {
        /// Copy into a new string.
        Copy = 0 => "copy",
        /// Length in characters.
        GetLength = 1 => "get_length",
        /// Character at index.
        GetChar = 2 => "get_char",
        /// Append another string.
        Append = 3 => "append",
        /// Insert another string.
        Insert = 4 => "insert",
        /// Find a substring.
        Find = 5 => "find",
        /// Remove characters.
        Erase = 6 => "erase",
        /// Copy UTF-8 bytes into guest memory.
        ToStdString = 7 => "to_std_string",
    }
}

wire_enum! {
    /// Batched scalar math.
    pub enum MathOp {
        /// Sine.
        Sin = 0 => "sin",
        /// Cosine.
        Cos = 1 => "cos",
        /// Tangent.
        Tan = 2 => "tan",
        /// Arc sine.
        Asin = 3 => "asin",
        /// Arc cosine.
        Acos = 4 => "acos",
        /// Arc tangent.
        Atan = 5 => "atan",
        /// Two-argument arc tangent.
        Atan2 = 6 => "atan2",
        /// Power.
        Pow = 7 => "pow",
    }
}

wire_enum! {
    /// Batched interpolation.
    pub enum LerpOp {
        /// Linear interpolation.
        Lerp = 0 => "lerp",
        /// Hermite smoothstep.
        Smoothstep = 1 => "smoothstep",
        /// Clamp.
        Clamp = 2 => "clamp",
        /// Shortest-arc angle interpolation.
        Slerp = 3 => "slerp",
    }
}

wire_enum! {
    /// 3D vector operations.
    pub enum Vec3Op {
        /// Stable hash.
        Hash = 0 => "hash",
        /// Length.
        Length = 1 => "length",
        /// Normalize.
        Normalize = 2 => "normalize",
        /// Dot product.
        Dot = 3 => "dot",
        /// Cross product.
        Cross = 4 => "cross",
        /// Distance.
        DistanceTo = 5 => "distance_to",
        /// Squared distance.
        DistanceSqTo = 6 => "distance_sq_to",
        /// Angle between.
        AngleTo = 7 => "angle_to",
        /// Projection.
        Project = 8 => "project",
        /// Reflection.
        Reflect = 9 => "reflect",
        /// Rotation about an axis.
        Rotated = 10 => "rotated",
    }
}

wire_enum! {
    /// Operators evaluated by [`Syscall::VEval`].
    pub enum VariantOperator {
        /// `==`
        Equal = 0 => "==",
        /// `!=`
        NotEqual = 1 => "!=",
        /// `<`
        Less = 2 => "<",
        /// `<=`
        LessEqual = 3 => "<=",
        /// `>`
        Greater = 4 => ">",
        /// `>=`
        GreaterEqual = 5 => ">=",
        /// `+`
        Add = 6 => "+",
        /// `-`
        Subtract = 7 => "-",
        /// `*`
        Multiply = 8 => "*",
        /// `/`
        Divide = 9 => "/",
        /// Unary `-`
        Negate = 10 => "neg",
        /// Unary `+`
        Positive = 11 => "pos",
        /// `%`
        Module = 12 => "%",
        /// `**`
        Power = 13 => "**",
        /// `<<`
        ShiftLeft = 14 => "<<",
        /// `>>`
        ShiftRight = 15 => ">>",
        /// `&`
        BitAnd = 16 => "&",
        /// `|`
        BitOr = 17 => "|",
        /// `^`
        BitXor = 18 => "^",
        /// `~`
        BitNegate = 19 => "~",
        /// `and`
        And = 20 => "and",
        /// `or`
        Or = 21 => "or",
        /// `xor`
        Xor = 22 => "xor",
        /// `not`
        Not = 23 => "not",
        /// `in`
        In = 24 => "in",
    }
}

impl Syscall {
    /// Returns `true` for codes that carry a sub-operation.
    pub const fn is_grouped(self) -> bool {
        matches!(
            self,
            Self::Obj
                | Self::Node
                | Self::Node2D
                | Self::Node3D
                | Self::ArrayOps
                | Self::DictionaryOps
                | Self::StringOps
                | Self::NodeCreate
                | Self::MathOp32
                | Self::MathOp64
                | Self::LerpOp32
                | Self::LerpOp64
                | Self::Vec3Ops
        )
    }

    /// Label of `sub_op` within this code's group.
    ///
    /// `None` for ungrouped codes and unknown sub-operations.
    pub fn sub_op_name(self, sub_op: u32) -> Option<&'static str> {
        match self {
            Self::Obj => ObjectOp::from_code(sub_op).map(ObjectOp::name),
            Self::Node => NodeOp::from_code(sub_op).map(NodeOp::name),
            Self::Node2D => Node2DOp::from_code(sub_op).map(Node2DOp::name),
            Self::Node3D => Node3DOp::from_code(sub_op).map(Node3DOp::name),
            Self::ArrayOps => ArrayOp::from_code(sub_op).map(ArrayOp::name),
            Self::DictionaryOps => DictionaryOp::from_code(sub_op).map(DictionaryOp::name),
            Self::StringOps => StringOp::from_code(sub_op).map(StringOp::name),
            Self::NodeCreate => NodeCreate::from_code(sub_op).map(NodeCreate::name),
            Self::MathOp32 | Self::MathOp64 => MathOp::from_code(sub_op).map(MathOp::name),
            Self::LerpOp32 | Self::LerpOp64 => LerpOp::from_code(sub_op).map(LerpOp::name),
            Self::Vec3Ops => Vec3Op::from_code(sub_op).map(Vec3Op::name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_op_names_follow_the_group() {
        assert_eq!(Syscall::ArrayOps.sub_op_name(1), Some("push_back"));
        assert_eq!(Syscall::MathOp64.sub_op_name(7), Some("pow"));
        assert_eq!(Syscall::Print.sub_op_name(0), None);
        assert_eq!(Syscall::Obj.sub_op_name(99), None);
        let grouped = Syscall::ALL.iter().filter(|c| c.is_grouped()).count();
        assert_eq!(grouped, 13);
        assert!(Syscall::ALL.iter().all(|c| c.is_grouped() == c.sub_op_name(0).is_some()));
    }

    #[test]
    fn syscall_codes_are_dense_from_the_base() {
        for (i, call) in Syscall::ALL.iter().enumerate() {
            assert_eq!(call.code(), API_BASE + u32::try_from(i).unwrap());
        }
        assert_eq!(Syscall::ALL.len(), 38);
        assert_eq!(Syscall::Vec3Ops.code(), 537);
        assert_eq!(Syscall::StringCreate.code(), 525);
        assert_eq!(Syscall::from_code(API_BASE - 1), None);
        assert_eq!(Syscall::try_from(538), Err(538));
    }

    #[test]
    fn sub_op_enums_are_dense_from_zero() {
        fn dense<T: Copy>(all: &[T], code: impl Fn(T) -> u32) {
            for (i, op) in all.iter().enumerate() {
                assert_eq!(code(*op), u32::try_from(i).unwrap());
            }
        }
        dense(ObjectOp::ALL, ObjectOp::code);
        dense(NodeOp::ALL, NodeOp::code);
        dense(Node2DOp::ALL, Node2DOp::code);
        dense(Node3DOp::ALL, Node3DOp::code);
        dense(ArrayOp::ALL, ArrayOp::code);
        dense(DictionaryOp::ALL, DictionaryOp::code);
        dense(StringOp::ALL, StringOp::code);
        dense(MathOp::ALL, MathOp::code);
        dense(LerpOp::ALL, LerpOp::code);
        dense(Vec3Op::ALL, Vec3Op::code);
        dense(VariantOperator::ALL, VariantOperator::code);
        assert_eq!(NodeOp::ALL.len(), 16);
        assert_eq!(ArrayOp::ALL.len(), 12);
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(Syscall::ObjCallp.name(), "obj_callp");
        assert_eq!(ArrayOp::try_from(11).map(ArrayOp::name), Ok("fetch_to_vector"));
    }
}
