use std::fmt::Write;

use crate::{Behavior, Heap, Payload, SpecialObjects, Value};

/// Short name of a value's kind, used in type errors.
pub fn type_name(heap: &Heap, specials: &SpecialObjects, value: Value) -> &'static str {
    if value.is_fixnum() {
        return "fixnum";
    }
    if value == specials.nil {
        return "nil";
    }
    if value == specials.true_object || value == specials.false_object {
        return "boolean";
    }

    let Some(object) = heap.get(value) else {
        return "unknown";
    };
    match (object.payload(), object.map().behavior()) {
        (Payload::Str(_), _) => "string",
        (Payload::Float(_), _) => "float",
        (Payload::ErrorToken { .. }, _) => "error token",
        (Payload::Activation { .. }, _) => "activation",
        (_, Behavior::Method(method)) if method.is_block => "block",
        (_, Behavior::Method(_)) => "method",
        (_, Behavior::Native(_)) => "primitive",
        (_, Behavior::Assignment) => "assignment",
        (_, Behavior::Data) => "object",
    }
}

/// Printable form of `value`, the result of `printString`.
pub fn format_value(heap: &Heap, specials: &SpecialObjects, value: Value) -> String {
    if let Some(number) = value.as_fixnum() {
        return number.to_string();
    }
    if value == specials.nil {
        return "nil".into();
    }
    if value == specials.true_object {
        return "true".into();
    }
    if value == specials.false_object {
        return "false".into();
    }

    let Some(object) = heap.get(value) else {
        return "<invalid>".into();
    };
    match object.payload() {
        Payload::Str(text) => return text.to_string(),
        Payload::Float(number) => return format_float(*number),
        Payload::ErrorToken { .. } => return "<error token>".into(),
        _ => {}
    }

    match object.map().behavior() {
        Behavior::Native(desc) => format!("<primitive {}>", desc.name),
        Behavior::Assignment => "<assignment>".into(),
        Behavior::Method(method) => {
            let kind = if method.is_block { "block" } else { "method" };
            if method.params.is_empty() {
                format!("<{kind}>")
            } else {
                format!("<{kind} :{}>", method.params.join(" :"))
            }
        }
        Behavior::Data => {
            let mut output = String::from("(|");
            for name in object.map().slot_names() {
                let _ = write!(output, " {name}.");
            }
            for name in object.map().parent_names() {
                let _ = write!(output, " {name}*.");
            }
            output.push_str(" |)");
            output
        }
    }
}

fn format_float(number: f64) -> String {
    if number.is_finite() && number.fract() == 0.0 {
        format!("{number:.1}")
    } else {
        number.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeapCreateInfo;

    #[test]
    fn formats_immediates_and_singletons() {
        let mut heap = Heap::new(HeapCreateInfo::default());
        let specials = SpecialObjects::new(&mut heap).unwrap();
        assert_eq!(format_value(&heap, &specials, Value::from_fixnum(-3)), "-3");
        assert_eq!(format_value(&heap, &specials, specials.nil), "nil");
        assert_eq!(format_value(&heap, &specials, specials.false_object), "false");
        let number = specials.new_float(&mut heap, 2.0).unwrap();
        assert_eq!(format_value(&heap, &specials, number), "2.0");
        let text = specials.new_string(&mut heap, "hi").unwrap();
        assert_eq!(format_value(&heap, &specials, text), "hi");
        assert_eq!(type_name(&heap, &specials, text), "string");
    }

    #[test]
    fn formats_plain_objects_by_slot_names() {
        let mut heap = Heap::new(HeapCreateInfo::default());
        let specials = SpecialObjects::new(&mut heap).unwrap();
        let object = heap.new_object().unwrap();
        heap.add_slot(object, "a", Value::from_fixnum(1));
        heap.add_slot(object, "a:", specials.assignment);
        heap.add_parent(object, "p", specials.nil);
        assert_eq!(format_value(&heap, &specials, object.into()), "(| a. a:. p*. |)");
        assert_eq!(type_name(&heap, &specials, object.into()), "object");
    }
}
