use crate::{primitives, Behavior, Heap, ObjectId, Payload, Value, VmError};

/// Objects the runtime itself refers to. Created once per VM and shared by
/// identity between all processes.
#[derive(Debug, Clone)]
pub struct SpecialObjects {
    pub nil: Value,
    pub true_object: Value,
    pub false_object: Value,
    /// marker held by `name:` assignment slots
    pub assignment: Value,
    pub fixnum_traits: ObjectId,
    pub float_traits: ObjectId,
    pub string_traits: ObjectId,
    pub float_prototype: ObjectId,
    pub string_prototype: ObjectId,
    /// namespace holding `halt:`, `error:` and friends
    pub interpreter: ObjectId,
    pub primitives: ObjectId,
    /// `self` of top-level code
    pub universe: ObjectId,
}

impl SpecialObjects {
    pub fn new(heap: &mut Heap) -> Result<Self, VmError> {
        let nil = heap.new_object()?;
        let true_object = heap.new_object()?;
        let false_object = heap.new_object()?;
        let assignment = heap.new_object_with(Behavior::Assignment)?;

        let fixnum_traits = heap.new_object()?;
        let float_traits = heap.new_object()?;
        let string_traits = heap.new_object()?;

        let float_prototype = heap.new_object()?;
        heap.add_parent(float_prototype, "traits", float_traits.into());
        heap.object_mut(float_prototype).payload = Payload::Float(0.0);

        let string_prototype = heap.new_object()?;
        heap.add_parent(string_prototype, "traits", string_traits.into());
        heap.object_mut(string_prototype).payload = Payload::Str("".into());

        let interpreter = heap.new_object()?;
        let primitives = heap.new_object()?;
        heap.add_slot(primitives, "interpreter", interpreter.into());
        heap.add_slot(primitives, "nil", nil.into());
        heap.add_slot(primitives, "true", true_object.into());
        heap.add_slot(primitives, "false", false_object.into());

        let universe = heap.new_object()?;
        heap.add_slot(universe, "primitives", primitives.into());

        let specials = Self {
            nil: nil.into(),
            true_object: true_object.into(),
            false_object: false_object.into(),
            assignment: assignment.into(),
            fixnum_traits,
            float_traits,
            string_traits,
            float_prototype,
            string_prototype,
            interpreter,
            primitives,
            universe,
        };
        primitives::install_all(heap, &specials)?;
        Ok(specials)
    }

    pub fn boolean(&self, value: bool) -> Value {
        if value {
            self.true_object
        } else {
            self.false_object
        }
    }

    /// Fresh string object.
    pub fn new_string(&self, heap: &mut Heap, text: &str) -> Result<Value, VmError> {
        let id = heap.clone_with_payload(self.string_prototype, Payload::Str(text.into()))?;
        Ok(id.into())
    }

    /// Canonical string object for `text`, used for literals and selectors.
    pub fn intern(&self, heap: &mut Heap, text: &str) -> Result<Value, VmError> {
        if let Some(value) = heap.interned(text) {
            return Ok(value);
        }
        let text: std::rc::Rc<str> = text.into();
        let value: Value = heap
            .clone_with_payload(self.string_prototype, Payload::Str(text.clone()))?
            .into();
        heap.remember_interned(text, value);
        Ok(value)
    }

    pub fn new_float(&self, heap: &mut Heap, value: f64) -> Result<Value, VmError> {
        let id = heap.clone_with_payload(self.float_prototype, Payload::Float(value))?;
        Ok(id.into())
    }
}
