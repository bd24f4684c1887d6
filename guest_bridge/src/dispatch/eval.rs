// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Operator evaluation for `VEVAL`.

use alloc::string::String;
use core::cmp::Ordering;

use crate::error::BridgeError;
use crate::ops::VariantOperator;
use crate::registry::{Registry, ScopedValue};
use crate::value::TaggedValue;

const BAD_OPERANDS: BridgeError = BridgeError::Unsupported("operands of this operator");

/// Evaluates `a op b`. Unary operators ignore `b`.
///
/// String and array `+` store their result as a new value.
pub(crate) fn evaluate(
    registry: &mut Registry,
    op: VariantOperator,
    a: TaggedValue,
    b: TaggedValue,
) -> Result<TaggedValue, BridgeError> {
    use TaggedValue as T;
    use VariantOperator as Op;

    Ok(match op {
        Op::Equal => T::Bool(registry.values_equal(&a, &b)),
        Op::NotEqual => T::Bool(!registry.values_equal(&a, &b)),
        Op::Less => T::Bool(order(registry, &a, &b)?.is_lt()),
        Op::LessEqual => T::Bool(order(registry, &a, &b)?.is_le()),
        Op::Greater => T::Bool(order(registry, &a, &b)?.is_gt()),
        Op::GreaterEqual => T::Bool(order(registry, &a, &b)?.is_ge()),
        Op::Add => match (a, b) {
            (T::Int(x), T::Int(y)) => T::Int(x.wrapping_add(y)),
            (T::Vector2(x), T::Vector2(y)) => T::Vector2(x + y),
            (T::Vector3(x), T::Vector3(y)) => T::Vector3(x + y),
            (T::Vector4(x), T::Vector4(y)) => T::Vector4(x + y),
            (T::String(x) | T::StringName(x), T::String(y) | T::StringName(y)) => {
                let mut joined = String::from(registry.text(x)?);
                joined.push_str(registry.text(y)?);
                T::String(registry.store(ScopedValue::String(joined))?)
            }
            (T::Array(x), T::Array(y)) => {
                let mut joined = registry.array(x)?.to_vec();
                joined.extend_from_slice(registry.array(y)?);
                T::Array(registry.store(ScopedValue::Array(joined))?)
            }
            _ => T::Float(float_of(&a)? + float_of(&b)?),
        },
        Op::Subtract => match (a, b) {
            (T::Int(x), T::Int(y)) => T::Int(x.wrapping_sub(y)),
            (T::Vector2(x), T::Vector2(y)) => T::Vector2(x - y),
            (T::Vector3(x), T::Vector3(y)) => T::Vector3(x - y),
            (T::Vector4(x), T::Vector4(y)) => T::Vector4(x - y),
            _ => T::Float(float_of(&a)? - float_of(&b)?),
        },
        Op::Multiply => match (a, b) {
            (T::Int(x), T::Int(y)) => T::Int(x.wrapping_mul(y)),
            (T::Vector2(x), T::Vector2(y)) => T::Vector2(x * y),
            (T::Vector3(x), T::Vector3(y)) => T::Vector3(x * y),
            (T::Vector4(x), T::Vector4(y)) => T::Vector4(x * y),
            (T::Vector2(v), s) | (s, T::Vector2(v)) => T::Vector2(v * scalar_of(&s)?),
            (T::Vector3(v), s) | (s, T::Vector3(v)) => T::Vector3(v * scalar_of(&s)?),
            (T::Vector4(v), s) | (s, T::Vector4(v)) => T::Vector4(v * scalar_of(&s)?),
            _ => T::Float(float_of(&a)? * float_of(&b)?),
        },
        Op::Divide => match (a, b) {
            (T::Int(x), T::Int(y)) => T::Int(x.checked_div(y).ok_or(DIVISION_BY_ZERO)?),
            (T::Vector2(v), s) => T::Vector2(v / scalar_of(&s)?),
            (T::Vector3(v), s) => T::Vector3(v / scalar_of(&s)?),
            (T::Vector4(v), s) => T::Vector4(v / scalar_of(&s)?),
            _ => T::Float(float_of(&a)? / float_of(&b)?),
        },
        Op::Module => match (a, b) {
            (T::Int(x), T::Int(y)) => T::Int(x.checked_rem(y).ok_or(DIVISION_BY_ZERO)?),
            _ => T::Float(libm::fmod(float_of(&a)?, float_of(&b)?)),
        },
        Op::Power => match (a, b) {
            (T::Int(x), T::Int(y)) if (0..=i64::from(u32::MAX)).contains(&y) => {
                T::Int(x.wrapping_pow(u32::try_from(y).map_err(|_| BAD_OPERANDS)?))
            }
            _ => T::Float(libm::pow(float_of(&a)?, float_of(&b)?)),
        },
        Op::Negate => match a {
            T::Int(x) => T::Int(x.wrapping_neg()),
            T::Float(x) => T::Float(-x),
            T::Vector2(v) => T::Vector2(-v),
            T::Vector3(v) => T::Vector3(-v),
            T::Vector4(v) => T::Vector4(-v),
            _ => return Err(BAD_OPERANDS),
        },
        Op::Positive => match a {
            T::Int(_) | T::Float(_) | T::Vector2(_) | T::Vector3(_) | T::Vector4(_) => a,
            _ => return Err(BAD_OPERANDS),
        },
        Op::ShiftLeft | Op::ShiftRight => {
            let (T::Int(x), T::Int(y)) = (a, b) else {
                return Err(BAD_OPERANDS);
            };
            let amount = u32::try_from(y).map_err(|_| BAD_OPERANDS)?;
            let shifted = if op == Op::ShiftLeft {
                x.checked_shl(amount)
            } else {
                x.checked_shr(amount)
            };
            T::Int(shifted.ok_or(BAD_OPERANDS)?)
        }
        Op::BitAnd | Op::BitOr | Op::BitXor => {
            let (T::Int(x), T::Int(y)) = (a, b) else {
                return Err(BAD_OPERANDS);
            };
            T::Int(match op {
                Op::BitAnd => x & y,
                Op::BitOr => x | y,
                _ => x ^ y,
            })
        }
        Op::BitNegate => match a {
            T::Int(x) => T::Int(!x),
            _ => return Err(BAD_OPERANDS),
        },
        Op::And => T::Bool(a.truthy() && b.truthy()),
        Op::Or => T::Bool(a.truthy() || b.truthy()),
        Op::Xor => T::Bool(a.truthy() != b.truthy()),
        Op::Not => T::Bool(!a.truthy()),
        Op::In => T::Bool(contains(registry, &b, &a)?),
    })
}

const DIVISION_BY_ZERO: BridgeError = BridgeError::Unsupported("integer division by zero");

fn float_of(value: &TaggedValue) -> Result<f64, BridgeError> {
    match value {
        TaggedValue::Int(_) | TaggedValue::Float(_) => value.as_float().ok_or(BAD_OPERANDS),
        _ => Err(BAD_OPERANDS),
    }
}

#[allow(clippy::cast_possible_truncation, reason = "vector components are single precision")]
fn scalar_of(value: &TaggedValue) -> Result<f32, BridgeError> {
    float_of(value).map(|v| v as f32)
}

/// Ordering for the relational operators: numbers, text and booleans only.
fn order(registry: &Registry, a: &TaggedValue, b: &TaggedValue) -> Result<Ordering, BridgeError> {
    let textual = |v: &TaggedValue| {
        v.handle()
            .filter(|_| matches!(v, TaggedValue::String(_) | TaggedValue::StringName(_)))
            .and_then(|h| registry.text(h).ok())
    };
    if let (Ok(x), Ok(y)) = (float_of(a), float_of(b)) {
        return x.partial_cmp(&y).ok_or(BAD_OPERANDS);
    }
    if let (TaggedValue::Bool(x), TaggedValue::Bool(y)) = (a, b) {
        return Ok(x.cmp(y));
    }
    match (textual(a), textual(b)) {
        (Some(x), Some(y)) => Ok(x.cmp(y)),
        _ => Err(BAD_OPERANDS),
    }
}

fn contains(
    registry: &Registry,
    container: &TaggedValue,
    needle: &TaggedValue,
) -> Result<bool, BridgeError> {
    match container {
        TaggedValue::Array(h) => Ok(registry
            .array(*h)?
            .iter()
            .any(|item| registry.values_equal(item, needle))),
        TaggedValue::Dictionary(h) => Ok(registry.dictionary_position(*h, needle)?.is_some()),
        TaggedValue::String(h) | TaggedValue::StringName(h) => {
            let haystack = registry.text(*h)?;
            match needle {
                TaggedValue::String(n) | TaggedValue::StringName(n) => {
                    Ok(haystack.contains(registry.text(*n)?))
                }
                _ => Err(BAD_OPERANDS),
            }
        }
        _ => Err(BAD_OPERANDS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector2;
    use alloc::vec;

    fn eval(
        registry: &mut Registry,
        op: VariantOperator,
        a: TaggedValue,
        b: TaggedValue,
    ) -> TaggedValue {
        evaluate(registry, op, a, b).unwrap()
    }

    #[test]
    fn integer_arithmetic_wraps_and_mixes_with_floats() {
        let mut r = Registry::new();
        use TaggedValue::{Float, Int};
        assert_eq!(eval(&mut r, VariantOperator::Add, Int(i64::MAX), Int(1)), Int(i64::MIN));
        assert_eq!(eval(&mut r, VariantOperator::Add, Int(1), Float(0.5)), Float(1.5));
        assert_eq!(eval(&mut r, VariantOperator::Divide, Int(7), Int(2)), Int(3));
        assert_eq!(eval(&mut r, VariantOperator::Module, Int(7), Int(4)), Int(3));
        assert_eq!(eval(&mut r, VariantOperator::Power, Int(2), Int(10)), Int(1024));
        assert_eq!(eval(&mut r, VariantOperator::ShiftLeft, Int(1), Int(4)), Int(16));
        assert_eq!(
            evaluate(&mut r, VariantOperator::Divide, Int(1), Int(0)),
            Err(DIVISION_BY_ZERO)
        );
    }

    #[test]
    fn vectors_scale_and_compare() {
        let mut r = Registry::new();
        let v = TaggedValue::Vector2(Vector2::new(1.0, 2.0));
        assert_eq!(
            eval(&mut r, VariantOperator::Multiply, v, TaggedValue::Int(2)),
            TaggedValue::Vector2(Vector2::new(2.0, 4.0))
        );
        assert_eq!(
            eval(&mut r, VariantOperator::Equal, v, v),
            TaggedValue::Bool(true)
        );
        assert_eq!(
            evaluate(&mut r, VariantOperator::Less, v, v),
            Err(BAD_OPERANDS)
        );
    }

    #[test]
    fn string_concatenation_allocates_a_new_string() {
        let mut r = Registry::new();
        let a = r.store(ScopedValue::String("foo".into())).unwrap();
        let b = r.store(ScopedValue::StringName("bar".into())).unwrap();
        let joined = eval(
            &mut r,
            VariantOperator::Add,
            TaggedValue::String(a),
            TaggedValue::StringName(b),
        );
        let TaggedValue::String(h) = joined else {
            panic!("expected a string, got {joined:?}");
        };
        assert_eq!(r.text(h).unwrap(), "foobar");
        assert_eq!(
            eval(&mut r, VariantOperator::In, TaggedValue::StringName(b), joined),
            TaggedValue::Bool(true)
        );
    }

    #[test]
    fn containment_in_arrays_and_dictionaries() {
        let mut r = Registry::new();
        let array = r
            .store(ScopedValue::Array(vec![TaggedValue::Int(1), TaggedValue::Float(2.0)]))
            .unwrap();
        let dict = r
            .store(ScopedValue::Dictionary(vec![(TaggedValue::Int(5), TaggedValue::Nil)]))
            .unwrap();
        assert_eq!(
            eval(&mut r, VariantOperator::In, TaggedValue::Int(2), TaggedValue::Array(array)),
            TaggedValue::Bool(true)
        );
        assert_eq!(
            eval(&mut r, VariantOperator::In, TaggedValue::Int(6), TaggedValue::Dictionary(dict)),
            TaggedValue::Bool(false)
        );
    }

    #[test]
    fn logic_uses_truthiness() {
        let mut r = Registry::new();
        assert_eq!(
            eval(&mut r, VariantOperator::And, TaggedValue::Int(3), TaggedValue::Nil),
            TaggedValue::Bool(false)
        );
        assert_eq!(
            eval(&mut r, VariantOperator::Not, TaggedValue::Float(0.0), TaggedValue::Nil),
            TaggedValue::Bool(true)
        );
    }
}
