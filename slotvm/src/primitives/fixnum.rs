use crate::{Value, VmError};

use super::{first, PrimitiveContext, PrimitiveOutcome};

enum Operand {
    Fixnum(i64),
    Float(f64),
}

fn operand(ctx: &PrimitiveContext<'_>, args: &[Value]) -> Result<Operand, VmError> {
    let rhs = first(args)?;
    match rhs.as_fixnum() {
        Some(number) => Ok(Operand::Fixnum(number)),
        None => ctx
            .heap
            .as_float(rhs)
            .map(Operand::Float)
            .ok_or_else(|| ctx.type_error("number", rhs)),
    }
}

fn fixnum_result(name: &'static str, value: Option<i64>) -> Result<PrimitiveOutcome, VmError> {
    value
        .and_then(Value::try_from_fixnum)
        .map(PrimitiveOutcome::Return)
        .ok_or(VmError::PrimitiveFailed {
            name,
            reason: "fixnum overflow".into(),
        })
}

fn arithmetic(
    ctx: &mut PrimitiveContext<'_>,
    name: &'static str,
    receiver: Value,
    args: &[Value],
    exact: fn(i64, i64) -> Option<i64>,
    inexact: fn(f64, f64) -> f64,
) -> Result<PrimitiveOutcome, VmError> {
    let a = ctx.expect_fixnum(receiver)?;
    match operand(ctx, args)? {
        Operand::Fixnum(b) => fixnum_result(name, exact(a, b)),
        Operand::Float(b) => Ok(PrimitiveOutcome::Return(ctx.new_float(inexact(a as f64, b))?)),
    }
}

fn compare(
    ctx: &mut PrimitiveContext<'_>,
    receiver: Value,
    args: &[Value],
    exact: fn(&i64, &i64) -> bool,
    inexact: fn(&f64, &f64) -> bool,
) -> Result<PrimitiveOutcome, VmError> {
    let a = ctx.expect_fixnum(receiver)?;
    let result = match operand(ctx, args)? {
        Operand::Fixnum(b) => exact(&a, &b),
        Operand::Float(b) => inexact(&(a as f64), &b),
    };
    Ok(PrimitiveOutcome::Return(ctx.boolean(result)))
}

fn division_by_zero(name: &'static str) -> VmError {
    VmError::PrimitiveFailed {
        name,
        reason: "division by zero".into(),
    }
}

pub fn fixnum_add(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    arithmetic(ctx, "+", receiver, args, i64::checked_add, |a, b| a + b)
}

pub fn fixnum_sub(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    arithmetic(ctx, "-", receiver, args, i64::checked_sub, |a, b| a - b)
}

pub fn fixnum_mul(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    arithmetic(ctx, "*", receiver, args, i64::checked_mul, |a, b| a * b)
}

pub fn fixnum_div(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    if first(args)?.as_fixnum() == Some(0) {
        return Err(division_by_zero("/"));
    }
    arithmetic(ctx, "/", receiver, args, i64::checked_div, |a, b| a / b)
}

pub fn fixnum_rem(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    if first(args)?.as_fixnum() == Some(0) {
        return Err(division_by_zero("%"));
    }
    arithmetic(ctx, "%", receiver, args, i64::checked_rem, |a, b| a % b)
}

pub fn fixnum_lt(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    compare(ctx, receiver, args, i64::lt, f64::lt)
}

pub fn fixnum_gt(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    compare(ctx, receiver, args, i64::gt, f64::gt)
}

pub fn fixnum_le(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    compare(ctx, receiver, args, i64::le, f64::le)
}

pub fn fixnum_ge(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    compare(ctx, receiver, args, i64::ge, f64::ge)
}

pub fn fixnum_eq(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    compare(ctx, receiver, args, i64::eq, f64::eq)
}
