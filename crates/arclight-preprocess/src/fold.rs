//! Constant folding over literal operands.
//!
//! Ordinary arithmetic per operand kind; comparisons produce bools;
//! `&&`/`||` are folded here only when both sides are literal — the
//! short-circuit cases are handled by the rewriter before both sides
//! exist. Division (or modulo) by a literal zero is a hard error.

use arclight_ast::{BinaryOp, ConstantValue, UnaryOp};

use crate::PreprocessError;

/// Folds a unary operation, if the operand kind supports it.
/// Increment/decrement mutate storage and are never folded.
pub(crate) fn fold_unary(op: UnaryOp, value: &ConstantValue) -> Option<ConstantValue> {
    match (op, value) {
        (UnaryOp::Negate, ConstantValue::Float(v)) => Some(ConstantValue::Float(-v)),
        (UnaryOp::Negate, ConstantValue::Int(v)) => Some(ConstantValue::Int(v.wrapping_neg())),
        (UnaryOp::LogicalNot, ConstantValue::Bool(v)) => Some(ConstantValue::Bool(!v)),
        _ => None,
    }
}

/// Folds a binary operation over two literals.
///
/// Returns `Ok(None)` when the combination is not foldable (mixed or
/// composite operands); mismatched kinds are left for the backend's
/// type checking rather than guessed at here.
pub(crate) fn fold_binary(
    op: BinaryOp,
    left: &ConstantValue,
    right: &ConstantValue,
) -> Result<Option<ConstantValue>, PreprocessError> {
    if matches!(op, BinaryOp::Divide | BinaryOp::Modulo) && right.is_zero() {
        return Err(PreprocessError::DivisionByZero);
    }
    Ok(match (left, right) {
        (ConstantValue::Float(l), ConstantValue::Float(r)) => fold_float(op, *l, *r),
        (ConstantValue::Int(l), ConstantValue::Int(r)) => fold_int(op, *l, *r),
        (ConstantValue::UInt(l), ConstantValue::UInt(r)) => fold_uint(op, *l, *r),
        (ConstantValue::Bool(l), ConstantValue::Bool(r)) => fold_bool(op, *l, *r),
        _ => None,
    })
}

fn fold_float(op: BinaryOp, l: f32, r: f32) -> Option<ConstantValue> {
    Some(match op {
        BinaryOp::Add => ConstantValue::Float(l + r),
        BinaryOp::Subtract => ConstantValue::Float(l - r),
        BinaryOp::Multiply => ConstantValue::Float(l * r),
        BinaryOp::Divide => ConstantValue::Float(l / r),
        BinaryOp::Modulo => ConstantValue::Float(l % r),
        BinaryOp::Less => ConstantValue::Bool(l < r),
        BinaryOp::Greater => ConstantValue::Bool(l > r),
        BinaryOp::LessEqual => ConstantValue::Bool(l <= r),
        BinaryOp::GreaterEqual => ConstantValue::Bool(l >= r),
        BinaryOp::Equal => ConstantValue::Bool(l == r),
        BinaryOp::NotEqual => ConstantValue::Bool(l != r),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => return None,
    })
}

fn fold_int(op: BinaryOp, l: i32, r: i32) -> Option<ConstantValue> {
    Some(match op {
        BinaryOp::Add => ConstantValue::Int(l.wrapping_add(r)),
        BinaryOp::Subtract => ConstantValue::Int(l.wrapping_sub(r)),
        BinaryOp::Multiply => ConstantValue::Int(l.wrapping_mul(r)),
        BinaryOp::Divide => ConstantValue::Int(l.wrapping_div(r)),
        BinaryOp::Modulo => ConstantValue::Int(l.wrapping_rem(r)),
        BinaryOp::Less => ConstantValue::Bool(l < r),
        BinaryOp::Greater => ConstantValue::Bool(l > r),
        BinaryOp::LessEqual => ConstantValue::Bool(l <= r),
        BinaryOp::GreaterEqual => ConstantValue::Bool(l >= r),
        BinaryOp::Equal => ConstantValue::Bool(l == r),
        BinaryOp::NotEqual => ConstantValue::Bool(l != r),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => return None,
    })
}

fn fold_uint(op: BinaryOp, l: u32, r: u32) -> Option<ConstantValue> {
    Some(match op {
        BinaryOp::Add => ConstantValue::UInt(l.wrapping_add(r)),
        BinaryOp::Subtract => ConstantValue::UInt(l.wrapping_sub(r)),
        BinaryOp::Multiply => ConstantValue::UInt(l.wrapping_mul(r)),
        BinaryOp::Divide => ConstantValue::UInt(l / r),
        BinaryOp::Modulo => ConstantValue::UInt(l % r),
        BinaryOp::Less => ConstantValue::Bool(l < r),
        BinaryOp::Greater => ConstantValue::Bool(l > r),
        BinaryOp::LessEqual => ConstantValue::Bool(l <= r),
        BinaryOp::GreaterEqual => ConstantValue::Bool(l >= r),
        BinaryOp::Equal => ConstantValue::Bool(l == r),
        BinaryOp::NotEqual => ConstantValue::Bool(l != r),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => return None,
    })
}

fn fold_bool(op: BinaryOp, l: bool, r: bool) -> Option<ConstantValue> {
    Some(match op {
        BinaryOp::Equal => ConstantValue::Bool(l == r),
        BinaryOp::NotEqual => ConstantValue::Bool(l != r),
        BinaryOp::LogicalAnd => ConstantValue::Bool(l && r),
        BinaryOp::LogicalOr => ConstantValue::Bool(l || r),
        _ => return None,
    })
}
