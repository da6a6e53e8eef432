use crate::{Value, VmError};

use super::{first, PrimitiveContext, PrimitiveOutcome};

pub fn string_concat(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    let lhs = ctx.expect_str(receiver)?;
    let rhs = ctx.expect_str(first(args)?)?;
    let joined = format!("{lhs}{rhs}");
    Ok(PrimitiveOutcome::Return(ctx.new_string(&joined)?))
}

pub fn string_eq(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    let lhs = ctx.expect_str(receiver)?;
    let equal = ctx.heap.as_str(first(args)?) == Some(&*lhs);
    Ok(PrimitiveOutcome::Return(ctx.boolean(equal)))
}

pub fn string_size(ctx: &mut PrimitiveContext<'_>, receiver: Value, _args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    let text = ctx.expect_str(receiver)?;
    let size = i64::try_from(text.chars().count()).unwrap_or(i64::MAX);
    Value::try_from_fixnum(size)
        .map(PrimitiveOutcome::Return)
        .ok_or(VmError::IntegerOverflow(size.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Heap, HeapCreateInfo, SpecialObjects};

    #[test]
    fn concatenates_and_compares() {
        let mut heap = Heap::new(HeapCreateInfo::default());
        let specials = SpecialObjects::new(&mut heap).unwrap();
        let left = specials.new_string(&mut heap, "ab").unwrap();
        let right = specials.new_string(&mut heap, "c").unwrap();
        let mut ctx = PrimitiveContext {
            heap: &mut heap,
            specials: &specials,
        };

        let Ok(PrimitiveOutcome::Return(joined)) = string_concat(&mut ctx, left, &[right]) else {
            panic!("concatenation should succeed");
        };
        assert_eq!(ctx.heap.as_str(joined), Some("abc"));
        assert_eq!(
            string_size(&mut ctx, joined, &[]),
            Ok(PrimitiveOutcome::Return(Value::from_fixnum(3)))
        );

        let copy = ctx.new_string("ab").unwrap();
        assert_eq!(
            string_eq(&mut ctx, left, &[copy]),
            Ok(PrimitiveOutcome::Return(specials.true_object))
        );
        assert_eq!(
            string_eq(&mut ctx, left, &[Value::from_fixnum(1)]),
            Ok(PrimitiveOutcome::Return(specials.false_object))
        );
    }
}
