//! Constant folding of builtin operations.
//!
//! Folding must agree bit for bit with what the generated code computes:
//! integer arithmetic wraps at the receiver's width, float arithmetic on
//! `Float32` rounds to single precision after every step, and float to int
//! conversion saturates with NaN mapping to zero. Division or remainder by a
//! zero literal is left to run time.

use kestrel_core::PrimitiveKind;
use kestrel_registry::BuiltinOp;

use super::typed::ConstValue;

/// Fold `op` applied to `receiver` and `args`.
///
/// `kind` is the receiver's primitive kind, `None` for `String`. Returns
/// `None` when the operation must not be folded.
pub fn fold(
    op: BuiltinOp,
    kind: Option<PrimitiveKind>,
    receiver: &ConstValue,
    args: &[&ConstValue],
) -> Option<ConstValue> {
    match (receiver, args) {
        (ConstValue::Int(a), []) => fold_int_unary(op, kind?, *a),
        (ConstValue::Int(a), [ConstValue::Int(b)]) => fold_int_binary(op, kind?, *a, *b),
        (ConstValue::Float(a), []) => fold_float_unary(op, kind?, *a),
        (ConstValue::Float(a), [ConstValue::Float(b)]) => fold_float_binary(op, kind?, *a, *b),
        (ConstValue::Bool(a), []) => match op {
            BuiltinOp::Not => Some(ConstValue::Bool(!a)),
            _ => None,
        },
        (ConstValue::Bool(a), [ConstValue::Bool(b)]) => fold_bool(op, *a, *b),
        (ConstValue::Str(a), [ConstValue::Str(b)]) => match op {
            BuiltinOp::Concat => Some(ConstValue::Str(format!("{a}{b}"))),
            BuiltinOp::StrEq => Some(ConstValue::Bool(a == b)),
            _ => None,
        },
        _ => None,
    }
}

fn fold_int_unary(op: BuiltinOp, kind: PrimitiveKind, a: i64) -> Option<ConstValue> {
    match op {
        BuiltinOp::Neg => Some(ConstValue::Int(kind.wrap(a.wrapping_neg()))),
        BuiltinOp::Convert(target) => Some(convert(target, a as f64, Some(a))),
        _ => None,
    }
}

fn fold_int_binary(op: BuiltinOp, kind: PrimitiveKind, a: i64, b: i64) -> Option<ConstValue> {
    let value = match op {
        BuiltinOp::Add => a.wrapping_add(b),
        BuiltinOp::Sub => a.wrapping_sub(b),
        BuiltinOp::Mul => a.wrapping_mul(b),
        BuiltinOp::Div if b == 0 => return None,
        BuiltinOp::Div => a.wrapping_div(b),
        BuiltinOp::Rem if b == 0 => return None,
        BuiltinOp::Rem => a.wrapping_rem(b),
        BuiltinOp::And => a & b,
        BuiltinOp::Or => a | b,
        BuiltinOp::Xor => a ^ b,
        op if op.is_comparison() => return Some(ConstValue::Bool(compare(op, a.cmp(&b)))),
        _ => return None,
    };
    Some(ConstValue::Int(kind.wrap(value)))
}

fn fold_float_unary(op: BuiltinOp, kind: PrimitiveKind, a: f64) -> Option<ConstValue> {
    match op {
        BuiltinOp::Neg => Some(ConstValue::Float(round(kind, -a))),
        BuiltinOp::Convert(target) => Some(convert(target, a, None)),
        _ => None,
    }
}

fn fold_float_binary(op: BuiltinOp, kind: PrimitiveKind, a: f64, b: f64) -> Option<ConstValue> {
    let value = match op {
        BuiltinOp::Add => a + b,
        BuiltinOp::Sub => a - b,
        BuiltinOp::Mul => a * b,
        BuiltinOp::Div | BuiltinOp::Rem if b == 0.0 => return None,
        BuiltinOp::Div => a / b,
        BuiltinOp::Rem => a % b,
        op if op.is_comparison() => {
            // NaN compares unequal to everything
            let result = match a.partial_cmp(&b) {
                Some(ordering) => compare(op, ordering),
                None => op == BuiltinOp::Ne,
            };
            return Some(ConstValue::Bool(result));
        }
        _ => return None,
    };
    Some(ConstValue::Float(round(kind, value)))
}

fn fold_bool(op: BuiltinOp, a: bool, b: bool) -> Option<ConstValue> {
    let value = match op {
        BuiltinOp::And => a & b,
        BuiltinOp::Or => a | b,
        BuiltinOp::Xor => a ^ b,
        BuiltinOp::Eq => a == b,
        BuiltinOp::Ne => a != b,
        _ => return None,
    };
    Some(ConstValue::Bool(value))
}

fn compare(op: BuiltinOp, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        BuiltinOp::Eq => ordering == Equal,
        BuiltinOp::Ne => ordering != Equal,
        BuiltinOp::Lt => ordering == Less,
        BuiltinOp::Le => ordering != Greater,
        BuiltinOp::Gt => ordering == Greater,
        BuiltinOp::Ge => ordering != Less,
        _ => false,
    }
}

fn round(kind: PrimitiveKind, value: f64) -> f64 {
    if kind == PrimitiveKind::Float32 {
        value as f32 as f64
    } else {
        value
    }
}

/// Numeric conversion; `exact` carries the source value when it is an
/// integer, so 64-bit values convert without passing through `f64`.
fn convert(target: PrimitiveKind, value: f64, exact: Option<i64>) -> ConstValue {
    match (target, exact) {
        (PrimitiveKind::Float32, Some(i)) => ConstValue::Float(i as f32 as f64),
        (PrimitiveKind::Float64, Some(i)) => ConstValue::Float(i as f64),
        (PrimitiveKind::Float32, None) => ConstValue::Float(value as f32 as f64),
        (PrimitiveKind::Float64, None) => ConstValue::Float(value),
        (PrimitiveKind::Int64, Some(i)) => ConstValue::Int(i),
        (PrimitiveKind::Int64, None) => ConstValue::Int(value as i64),
        (target, Some(i)) => ConstValue::Int(target.wrap(i)),
        (target, None) => ConstValue::Int(target.wrap(value as i32 as i64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> ConstValue {
        ConstValue::Int(v)
    }

    #[test]
    fn int_addition() {
        assert_eq!(
            fold(BuiltinOp::Add, Some(PrimitiveKind::Int32), &int(1), &[&int(2)]),
            Some(int(3))
        );
    }

    #[test]
    fn wraps_at_width() {
        assert_eq!(
            fold(
                BuiltinOp::Add,
                Some(PrimitiveKind::Int32),
                &int(i32::MAX as i64),
                &[&int(1)]
            ),
            Some(int(i32::MIN as i64))
        );
        assert_eq!(
            fold(BuiltinOp::Mul, Some(PrimitiveKind::UInt8), &int(16), &[&int(16)]),
            Some(int(0))
        );
        assert_eq!(
            fold(BuiltinOp::Div, Some(PrimitiveKind::Int64), &int(i64::MIN), &[&int(-1)]),
            Some(int(i64::MIN))
        );
    }

    #[test]
    fn division_by_zero_is_not_folded() {
        assert_eq!(
            fold(BuiltinOp::Div, Some(PrimitiveKind::Int32), &int(1), &[&int(0)]),
            None
        );
        assert_eq!(
            fold(BuiltinOp::Rem, Some(PrimitiveKind::Int32), &int(1), &[&int(0)]),
            None
        );
        assert_eq!(
            fold(
                BuiltinOp::Div,
                Some(PrimitiveKind::Float64),
                &ConstValue::Float(1.0),
                &[&ConstValue::Float(0.0)]
            ),
            None
        );
    }

    #[test]
    fn truncating_division() {
        assert_eq!(
            fold(BuiltinOp::Div, Some(PrimitiveKind::Int32), &int(-7), &[&int(2)]),
            Some(int(-3))
        );
        assert_eq!(
            fold(BuiltinOp::Rem, Some(PrimitiveKind::Int32), &int(-7), &[&int(2)]),
            Some(int(-1))
        );
    }

    #[test]
    fn comparisons_and_nan() {
        assert_eq!(
            fold(BuiltinOp::Le, Some(PrimitiveKind::Int32), &int(2), &[&int(2)]),
            Some(ConstValue::Bool(true))
        );
        let nan = ConstValue::Float(f64::NAN);
        assert_eq!(
            fold(BuiltinOp::Eq, Some(PrimitiveKind::Float64), &nan, &[&nan]),
            Some(ConstValue::Bool(false))
        );
        assert_eq!(
            fold(BuiltinOp::Ne, Some(PrimitiveKind::Float64), &nan, &[&nan]),
            Some(ConstValue::Bool(true))
        );
    }

    #[test]
    fn conversions_saturate_and_truncate() {
        assert_eq!(
            fold(
                BuiltinOp::Convert(PrimitiveKind::Int32),
                Some(PrimitiveKind::Float64),
                &ConstValue::Float(1e20),
                &[]
            ),
            Some(int(i32::MAX as i64))
        );
        assert_eq!(
            fold(
                BuiltinOp::Convert(PrimitiveKind::Int8),
                Some(PrimitiveKind::Int32),
                &int(300),
                &[]
            ),
            Some(int(44))
        );
        assert_eq!(
            fold(
                BuiltinOp::Convert(PrimitiveKind::Float64),
                Some(PrimitiveKind::Int32),
                &int(3),
                &[]
            ),
            Some(ConstValue::Float(3.0))
        );
    }

    #[test]
    fn strings_and_bools() {
        assert_eq!(
            fold(
                BuiltinOp::Concat,
                None,
                &ConstValue::Str("a".into()),
                &[&ConstValue::Str("b".into())]
            ),
            Some(ConstValue::Str("ab".into()))
        );
        assert_eq!(
            fold(BuiltinOp::Not, Some(PrimitiveKind::Bool), &ConstValue::Bool(true), &[]),
            Some(ConstValue::Bool(false))
        );
    }
}
