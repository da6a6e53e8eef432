use crate::{format, Value, VmError};

use super::{first, PrimitiveContext, PrimitiveOutcome};

/// `is:`, identity of the receiver and the argument.
pub fn identical(ctx: &mut PrimitiveContext<'_>, receiver: Value, args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    let other = first(args)?;
    Ok(PrimitiveOutcome::Return(ctx.boolean(receiver == other)))
}

pub fn print_string(ctx: &mut PrimitiveContext<'_>, receiver: Value, _args: &[Value]) -> Result<PrimitiveOutcome, VmError> {
    let text = format::format_value(ctx.heap, ctx.specials, receiver);
    Ok(PrimitiveOutcome::Return(ctx.new_string(&text)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Heap, HeapCreateInfo, SpecialObjects};

    #[test]
    fn identity_is_by_reference() {
        let mut heap = Heap::new(HeapCreateInfo::default());
        let specials = SpecialObjects::new(&mut heap).unwrap();
        let a = specials.new_string(&mut heap, "x").unwrap();
        let b = specials.new_string(&mut heap, "x").unwrap();
        let mut ctx = PrimitiveContext {
            heap: &mut heap,
            specials: &specials,
        };

        assert_eq!(
            identical(&mut ctx, a, &[a]),
            Ok(PrimitiveOutcome::Return(specials.true_object))
        );
        assert_eq!(
            identical(&mut ctx, a, &[b]),
            Ok(PrimitiveOutcome::Return(specials.false_object))
        );
        assert_eq!(
            identical(&mut ctx, Value::from_fixnum(4), &[Value::from_fixnum(4)]),
            Ok(PrimitiveOutcome::Return(specials.true_object))
        );
    }

    #[test]
    fn false_prints_its_name() {
        let mut heap = Heap::new(HeapCreateInfo::default());
        let specials = SpecialObjects::new(&mut heap).unwrap();
        let mut ctx = PrimitiveContext {
            heap: &mut heap,
            specials: &specials,
        };
        let Ok(PrimitiveOutcome::Return(text)) = print_string(&mut ctx, specials.false_object, &[]) else {
            panic!("printString should succeed");
        };
        assert_eq!(ctx.heap.as_str(text), Some("false"));
    }
}
