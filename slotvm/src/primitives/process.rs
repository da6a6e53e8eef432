//! The `interpreter` namespace: process control natives.
use crate::{Value, VmError};

use super::{first, PrimitiveContext, PrimitiveOutcome};

pub fn halt(_ctx: &mut PrimitiveContext<'_>, _receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    Ok(PrimitiveOutcome::Halt(first(args)?))
}

pub fn error(_ctx: &mut PrimitiveContext<'_>, _receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    Ok(PrimitiveOutcome::Raise(first(args)?))
}

pub fn set_error_handler(ctx: &mut PrimitiveContext<'_>, _receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    let handler = first(args)?;
    let is_block = ctx
        .heap
        .get(handler)
        .is_some_and(|object| object.map().is_block());
    if !is_block {
        return Err(ctx.type_error("block", handler));
    }
    Ok(PrimitiveOutcome::SetHandler(handler))
}

pub fn restore_process(_ctx: &mut PrimitiveContext<'_>, _receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    match args {
        [token, value] => Ok(PrimitiveOutcome::Restore {
            token: *token,
            value: *value,
        }),
        _ => Err(VmError::StackUnderflow),
    }
}
