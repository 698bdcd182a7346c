//! Operator semantics over dynamic values.

use super::{BinaryOp, UnaryOp};
use crate::error::{CoreError, CoreResult};
use quarry_codec::Value;
use std::cmp::Ordering;

pub(super) fn unary(op: UnaryOp, v: Value) -> CoreResult<Value> {
    match (op, v) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, Value::Int(n)) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| CoreError::eval("integer overflow")),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Not, v) => Err(CoreError::eval(format!(
            "invalid operation: !{} (mismatched type {})",
            v,
            v.type_name()
        ))),
        (UnaryOp::Neg, v) => Err(CoreError::eval(format!(
            "invalid operation: -{} (mismatched type {})",
            v,
            v.type_name()
        ))),
    }
}

/// Operand of `&&` / `||`: `None` stands for NULL.
pub(super) fn logical_operand(op: BinaryOp, v: Value) -> CoreResult<Option<bool>> {
    match v {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b)),
        v => Err(CoreError::eval(format!(
            "invalid operation: operator {} not defined on {}",
            op.symbol(),
            v.type_name()
        ))),
    }
}

fn mismatch(op: BinaryOp, l: &Value, r: &Value) -> CoreError {
    CoreError::eval(format!(
        "invalid operation: {} {} {} (mismatched types {} and {})",
        l,
        op.symbol(),
        r,
        l.type_name(),
        r.type_name()
    ))
}

pub(super) fn binary(op: BinaryOp, l: Value, r: Value) -> CoreResult<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    match op {
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            compare(op, &l, &r)
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, l, r)
        }
        BinaryOp::And | BinaryOp::Or => Err(CoreError::invalid_operation(format!(
            "{} evaluated as arithmetic",
            op.symbol()
        ))),
    }
}

fn compare(op: BinaryOp, l: &Value, r: &Value) -> CoreResult<Value> {
    let comparable = matches!(
        (l, r),
        (Value::Bool(_), Value::Bool(_))
            | (Value::Text(_), Value::Text(_))
            | (Value::Blob(_), Value::Blob(_))
    ) || (l.is_numeric() && r.is_numeric());
    if !comparable {
        return Err(mismatch(op, l, r));
    }
    let ord = l.collate(r);
    let result = match op {
        BinaryOp::Eq => ord == Ordering::Equal,
        BinaryOp::Ne => ord != Ordering::Equal,
        BinaryOp::Lt => ord == Ordering::Less,
        BinaryOp::Le => ord != Ordering::Greater,
        BinaryOp::Gt => ord == Ordering::Greater,
        _ => ord != Ordering::Less,
    };
    Ok(Value::Bool(result))
}

fn arithmetic(op: BinaryOp, l: Value, r: Value) -> CoreResult<Value> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => int_arithmetic(op, a, b),
        (Value::Text(a), Value::Text(b)) if op == BinaryOp::Add => Ok(Value::Text(a + &b)),
        (l, r) => match (l.as_float(), r.as_float()) {
            (Some(a), Some(b)) => Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            })),
            _ => Err(mismatch(op, &l, &r)),
        },
    }
}

fn int_arithmetic(op: BinaryOp, a: i64, b: i64) -> CoreResult<Value> {
    if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b == 0 {
        return Err(CoreError::eval("division by zero"));
    }
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => a.checked_div(b),
        _ => a.checked_rem(b),
    };
    result
        .map(Value::Int)
        .ok_or_else(|| CoreError::eval("integer overflow"))
}

pub(super) fn len(v: Value) -> CoreResult<Value> {
    match v {
        Value::Null => Ok(Value::Null),
        Value::Text(s) => Ok(Value::Int(count(s.chars().count()))),
        Value::Blob(b) => Ok(Value::Int(count(b.len()))),
        v => Err(CoreError::eval(format!(
            "invalid argument to len: {}",
            v.type_name()
        ))),
    }
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
