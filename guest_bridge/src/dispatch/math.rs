// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Math and geometry helpers. None of these touch the registry or the host.

use super::Args;
use crate::error::BridgeError;
use crate::math::{self, Vector2};
use crate::ops::{LerpOp, MathOp, Vec3Op};
use crate::value::TaggedValue;

#[allow(clippy::cast_possible_truncation, reason = "single-precision math by contract")]
fn narrow(value: f64) -> f32 {
    value as f32
}

fn float32(args: &Args<'_>, position: usize) -> Result<f32, BridgeError> {
    args.float(position).map(narrow)
}

/// `SINCOS(angle) -> Vector2(sin, cos)`.
pub(super) fn sincos(args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
    let angle = float32(args, 0)?;
    Ok(TaggedValue::Vector2(Vector2::new(
        libm::sinf(angle),
        libm::cosf(angle),
    )))
}

pub(super) fn vec2_length(args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
    Ok(TaggedValue::Float(f64::from(args.vector2(0)?.length())))
}

pub(super) fn vec2_normalized(args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
    Ok(TaggedValue::Vector2(args.vector2(0)?.normalized()))
}

pub(super) fn vec2_rotated(args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
    let v = args.vector2(0)?;
    Ok(TaggedValue::Vector2(v.rotated(float32(args, 1)?)))
}

/// `MATH_OP32(x[, y])`, computed in single precision.
pub(super) fn math_op32(op: MathOp, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
    let x = float32(args, 0)?;
    let y = || float32(args, 1);
    let result = match op {
        MathOp::Sin => libm::sinf(x),
        MathOp::Cos => libm::cosf(x),
        MathOp::Tan => libm::tanf(x),
        MathOp::Asin => libm::asinf(x),
        MathOp::Acos => libm::acosf(x),
        MathOp::Atan => libm::atanf(x),
        MathOp::Atan2 => libm::atan2f(x, y()?),
        MathOp::Pow => libm::powf(x, y()?),
    };
    Ok(TaggedValue::Float(f64::from(result)))
}

/// `MATH_OP64(x[, y])`.
pub(super) fn math_op64(op: MathOp, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
    let x = args.float(0)?;
    let y = || args.float(1);
    let result = match op {
        MathOp::Sin => libm::sin(x),
        MathOp::Cos => libm::cos(x),
        MathOp::Tan => libm::tan(x),
        MathOp::Asin => libm::asin(x),
        MathOp::Acos => libm::acos(x),
        MathOp::Atan => libm::atan(x),
        MathOp::Atan2 => libm::atan2(x, y()?),
        MathOp::Pow => libm::pow(x, y()?),
    };
    Ok(TaggedValue::Float(result))
}

/// `LERP_OP32(a, b, t)`; for `Clamp` the arguments are `(value, min, max)`.
pub(super) fn lerp_op32(op: LerpOp, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
    let (a, b, t) = (float32(args, 0)?, float32(args, 1)?, float32(args, 2)?);
    let result = match op {
        LerpOp::Lerp => math::lerpf(a, b, t),
        LerpOp::Smoothstep => math::smoothstepf(a, b, t),
        LerpOp::Clamp => a.max(b).min(t),
        LerpOp::Slerp => math::lerp_anglef(a, b, t),
    };
    Ok(TaggedValue::Float(f64::from(result)))
}

/// `LERP_OP64(a, b, t)`; for `Clamp` the arguments are `(value, min, max)`.
pub(super) fn lerp_op64(op: LerpOp, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
    let (a, b, t) = (args.float(0)?, args.float(1)?, args.float(2)?);
    let result = match op {
        LerpOp::Lerp => math::lerp(a, b, t),
        LerpOp::Smoothstep => math::smoothstep(a, b, t),
        LerpOp::Clamp => a.max(b).min(t),
        LerpOp::Slerp => math::lerp_angle(a, b, t),
    };
    Ok(TaggedValue::Float(result))
}

/// `VEC3_OPS(a[, b[, angle]])`.
pub(super) fn vec3_op(op: Vec3Op, args: &Args<'_>) -> Result<TaggedValue, BridgeError> {
    let a = args.vector3(0)?;
    let b = || args.vector3(1);
    let scalar = |v: f32| TaggedValue::Float(f64::from(v));
    Ok(match op {
        Vec3Op::Hash => TaggedValue::Int(i64::from(a.stable_hash())),
        Vec3Op::Length => scalar(a.length()),
        Vec3Op::Normalize => TaggedValue::Vector3(a.normalized()),
        Vec3Op::Dot => scalar(a.dot(b()?)),
        Vec3Op::Cross => TaggedValue::Vector3(a.cross(b()?)),
        Vec3Op::DistanceTo => scalar(a.distance_to(b()?)),
        Vec3Op::DistanceSqTo => scalar(a.distance_squared_to(b()?)),
        Vec3Op::AngleTo => scalar(a.angle_to(b()?)),
        Vec3Op::Project => TaggedValue::Vector3(a.project(b()?)),
        Vec3Op::Reflect => TaggedValue::Vector3(a.reflect(b()?)),
        Vec3Op::Rotated => TaggedValue::Vector3(a.rotated(b()?, float32(args, 2)?)),
    })
}
