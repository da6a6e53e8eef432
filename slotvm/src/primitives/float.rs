use crate::{Value, VmError};

use super::{first, PrimitiveContext, PrimitiveOutcome};

fn arithmetic(
    ctx: &mut PrimitiveContext<'_>,
    receiver: Value,
    args: &[Value],
    op: fn(f64, f64) -> f64,
) -> Result<PrimitiveOutcome, VmError> {
    let a = ctx.expect_float(receiver)?;
    let b = ctx.expect_number(first(args)?)?;
    Ok(PrimitiveOutcome::Return(ctx.new_float(op(a, b))?))
}

fn compare(
    ctx: &mut PrimitiveContext<'_>,
    receiver: Value,
    args: &[Value],
    op: fn(&f64, &f64) -> bool,
) -> Result<PrimitiveOutcome, VmError> {
    let a = ctx.expect_float(receiver)?;
    let b = ctx.expect_number(first(args)?)?;
    Ok(PrimitiveOutcome::Return(ctx.boolean(op(&a, &b))))
}

pub fn float_add(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    arithmetic(ctx, receiver, args, |a, b| a + b)
}

pub fn float_sub(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    arithmetic(ctx, receiver, args, |a, b| a - b)
}

pub fn float_mul(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    arithmetic(ctx, receiver, args, |a, b| a * b)
}

pub fn float_div(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    arithmetic(ctx, receiver, args, |a, b| a / b)
}

pub fn float_lt(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    compare(ctx, receiver, args, f64::lt)
}

pub fn float_gt(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    compare(ctx, receiver, args, f64::gt)
}

pub fn float_eq(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    compare(ctx, receiver, args, f64::eq)
}
