//! Arithmetic, comparison and concatenation operators.

use std::cmp::Ordering;

use super::error::Result;
use super::eval::OperationEvaluationContext;
use super::token::{BinaryOp, UnaryOp};
use super::value::{ErrorCode, ValueEval, try_value};

/// Reduce a reference to the single value an operator works on.
///
/// A single-column area yields the cell on the evaluating row, a single-row
/// area the cell in the evaluating column. Anything else is `#VALUE!`.
pub fn single_value(ctx: &OperationEvaluationContext<'_, '_>, value: ValueEval) -> Result<ValueEval> {
    match value {
        ValueEval::Ref(reference) => reference.inner_value(ctx),
        ValueEval::Area(area) => {
            // Arrays in a scalar position use their first element.
            if area.is_single_cell() || area.values().is_some() {
                return area.relative_value(ctx, 0, 0);
            }
            let bounds = area.bounds();
            if bounds.width() == 1 && bounds.contains_row(ctx.row()) {
                return area.absolute_value(ctx, ctx.row(), bounds.first_col);
            }
            if bounds.height() == 1 && bounds.contains_column(ctx.column()) {
                return area.absolute_value(ctx, bounds.first_row, ctx.column());
            }
            Ok(ValueEval::Error(ErrorCode::ValueInvalid))
        }
        other => Ok(other),
    }
}

pub(crate) fn binary(
    ctx: &OperationEvaluationContext<'_, '_>,
    op: BinaryOp,
    lhs: ValueEval,
    rhs: ValueEval,
) -> Result<ValueEval> {
    let lhs = single_value(ctx, lhs)?;
    let rhs = single_value(ctx, rhs)?;
    if let Some(code) = lhs.error_code() {
        return Ok(ValueEval::Error(code));
    }
    if let Some(code) = rhs.error_code() {
        return Ok(ValueEval::Error(code));
    }
    let value = match op {
        BinaryOp::Concat => {
            let mut text = try_value!(lhs.to_text());
            text.push_str(&try_value!(rhs.to_text()));
            ValueEval::Text(text)
        }
        BinaryOp::Equal => ValueEval::Boolean(compare(&lhs, &rhs) == Ordering::Equal),
        BinaryOp::NotEqual => ValueEval::Boolean(compare(&lhs, &rhs) != Ordering::Equal),
        BinaryOp::Less => ValueEval::Boolean(compare(&lhs, &rhs) == Ordering::Less),
        BinaryOp::LessEqual => ValueEval::Boolean(compare(&lhs, &rhs) != Ordering::Greater),
        BinaryOp::Greater => ValueEval::Boolean(compare(&lhs, &rhs) == Ordering::Greater),
        BinaryOp::GreaterEqual => ValueEval::Boolean(compare(&lhs, &rhs) != Ordering::Less),
        _ => {
            let a = try_value!(lhs.to_number());
            let b = try_value!(rhs.to_number());
            arithmetic(op, a, b)
        }
    };
    Ok(value)
}

fn arithmetic(op: BinaryOp, a: f64, b: f64) -> ValueEval {
    match op {
        BinaryOp::Add => ValueEval::checked_number(a + b),
        BinaryOp::Subtract => ValueEval::checked_number(a - b),
        BinaryOp::Multiply => ValueEval::checked_number(a * b),
        BinaryOp::Divide if b == 0.0 => ValueEval::Error(ErrorCode::DivZero),
        BinaryOp::Divide => ValueEval::checked_number(a / b),
        BinaryOp::Power => power(a, b),
        _ => ValueEval::Error(ErrorCode::ValueInvalid),
    }
}

pub(crate) fn power(base: f64, exponent: f64) -> ValueEval {
    if base == 0.0 && exponent < 0.0 {
        ValueEval::Error(ErrorCode::DivZero)
    } else {
        ValueEval::checked_number(base.powf(exponent))
    }
}

pub(crate) fn unary(
    ctx: &OperationEvaluationContext<'_, '_>,
    op: UnaryOp,
    operand: ValueEval,
) -> Result<ValueEval> {
    let operand = single_value(ctx, operand)?;
    if let Some(code) = operand.error_code() {
        return Ok(ValueEval::Error(code));
    }
    let value = match op {
        UnaryOp::Plus => operand,
        UnaryOp::Minus => ValueEval::checked_number(-try_value!(operand.to_number())),
        UnaryOp::Percent => ValueEval::checked_number(try_value!(operand.to_number()) / 100.0),
    };
    Ok(value)
}

fn type_rank(value: &ValueEval) -> u8 {
    match value {
        ValueEval::Text(_) => 1,
        ValueEval::Boolean(_) => 2,
        _ => 0,
    }
}

/// Order two scalars.
///
/// Blank takes the role of 0, "" or FALSE depending on the other side.
/// Across types numbers sort before text and text before booleans. Text is
/// compared without regard to case.
pub fn compare(lhs: &ValueEval, rhs: &ValueEval) -> Ordering {
    match (lhs, rhs) {
        (ValueEval::Blank, ValueEval::Blank) => Ordering::Equal,
        (ValueEval::Blank, other) => compare(&blank_as(other), other),
        (other, ValueEval::Blank) => compare(other, &blank_as(other)),
        (ValueEval::Number(a), ValueEval::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (ValueEval::Text(a), ValueEval::Text(b)) => a.to_uppercase().cmp(&b.to_uppercase()),
        (ValueEval::Boolean(a), ValueEval::Boolean(b)) => a.cmp(b),
        (a, b) => type_rank(a).cmp(&type_rank(b)),
    }
}

fn blank_as(other: &ValueEval) -> ValueEval {
    match other {
        ValueEval::Text(_) => ValueEval::Text(String::new()),
        ValueEval::Boolean(_) => ValueEval::Boolean(false),
        _ => ValueEval::Number(0.0),
    }
}
