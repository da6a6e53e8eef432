use std::rc::Rc;

use crate::{format, Behavior, Heap, ObjectId, SpecialObjects, Value, VmError};

pub mod fixnum;
pub mod float;
pub mod object;
pub mod process;
pub mod string;

/// What a native asks the interpreter to do once it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveOutcome {
    /// push the value as the send's result
    Return(Value),
    /// end the process successfully
    Halt(Value),
    /// run the error-handler protocol with the value
    Raise(Value),
    /// install a handler block on the sending frame
    SetHandler(Value),
    /// replace the frame stack with the one behind `token`
    Restore { token: Value, value: Value },
}

pub struct PrimitiveContext<'a> {
    pub heap: &'a mut Heap,
    pub specials: &'a SpecialObjects,
}

impl PrimitiveContext<'_> {
    pub fn type_error(&self, expected: &'static str, value: Value) -> VmError {
        VmError::TypeMismatch {
            expected,
            got: format::type_name(self.heap, self.specials, value).into(),
        }
    }

    pub fn expect_fixnum(&self, value: Value) -> Result<i64, VmError> {
        value
            .as_fixnum()
            .ok_or_else(|| self.type_error("fixnum", value))
    }

    pub fn expect_float(&self, value: Value) -> Result<f64, VmError> {
        self.heap
            .as_float(value)
            .ok_or_else(|| self.type_error("float", value))
    }

    pub fn expect_str(&self, value: Value) -> Result<Rc<str>, VmError> {
        self.heap
            .as_str(value)
            .map(Rc::from)
            .ok_or_else(|| self.type_error("string", value))
    }

    /// A fixnum or float argument widened to `f64`.
    pub fn expect_number(&self, value: Value) -> Result<f64, VmError> {
        match value.as_fixnum() {
            Some(number) => Ok(number as f64),
            None => self.expect_float(value),
        }
    }

    pub fn new_string(&mut self, text: &str) -> Result<Value, VmError> {
        self.specials.new_string(self.heap, text)
    }

    pub fn new_float(&mut self, value: f64) -> Result<Value, VmError> {
        self.specials.new_float(self.heap, value)
    }

    pub fn boolean(&self, value: bool) -> Value {
        self.specials.boolean(value)
    }
}

pub type PrimitiveFn = fn(&mut PrimitiveContext<'_>, Value, &[Value]) -> Result<PrimitiveOutcome, VmError>;

#[derive(Debug, Clone, Copy)]
pub struct PrimitiveDesc {
    /// selector the native is installed under
    pub name: &'static str,
    pub arity: u8,
    pub func: PrimitiveFn,
}

impl PrimitiveDesc {
    pub const fn new(name: &'static str, arity: u8, func: PrimitiveFn) -> Self {
        Self { name, arity, func }
    }
}

pub fn fixnum_primitives() -> Vec<PrimitiveDesc> {
    vec![
        PrimitiveDesc::new("+", 1, fixnum::fixnum_add),
        PrimitiveDesc::new("-", 1, fixnum::fixnum_sub),
        PrimitiveDesc::new("*", 1, fixnum::fixnum_mul),
        PrimitiveDesc::new("/", 1, fixnum::fixnum_div),
        PrimitiveDesc::new("%", 1, fixnum::fixnum_rem),
        PrimitiveDesc::new("<", 1, fixnum::fixnum_lt),
        PrimitiveDesc::new(">", 1, fixnum::fixnum_gt),
        PrimitiveDesc::new("<=", 1, fixnum::fixnum_le),
        PrimitiveDesc::new(">=", 1, fixnum::fixnum_ge),
        PrimitiveDesc::new("==", 1, fixnum::fixnum_eq),
        PrimitiveDesc::new("printString", 0, object::print_string),
        PrimitiveDesc::new("is:", 1, object::identical),
    ]
}

pub fn float_primitives() -> Vec<PrimitiveDesc> {
    vec![
        PrimitiveDesc::new("+", 1, float::float_add),
        PrimitiveDesc::new("-", 1, float::float_sub),
        PrimitiveDesc::new("*", 1, float::float_mul),
        PrimitiveDesc::new("/", 1, float::float_div),
        PrimitiveDesc::new("<", 1, float::float_lt),
        PrimitiveDesc::new(">", 1, float::float_gt),
        PrimitiveDesc::new("==", 1, float::float_eq),
        PrimitiveDesc::new("printString", 0, object::print_string),
        PrimitiveDesc::new("is:", 1, object::identical),
    ]
}

pub fn string_primitives() -> Vec<PrimitiveDesc> {
    vec![
        PrimitiveDesc::new("+", 1, string::string_concat),
        PrimitiveDesc::new("==", 1, string::string_eq),
        PrimitiveDesc::new("size", 0, string::string_size),
        PrimitiveDesc::new("printString", 0, object::print_string),
        PrimitiveDesc::new("is:", 1, object::identical),
    ]
}

/// Installed on nil, true and false.
pub fn singleton_primitives() -> Vec<PrimitiveDesc> {
    vec![
        PrimitiveDesc::new("printString", 0, object::print_string),
        PrimitiveDesc::new("is:", 1, object::identical),
    ]
}

pub fn interpreter_primitives() -> Vec<PrimitiveDesc> {
    vec![
        PrimitiveDesc::new("halt:", 1, process::halt),
        PrimitiveDesc::new("error:", 1, process::error),
        PrimitiveDesc::new("setErrorHandler:", 1, process::set_error_handler),
        PrimitiveDesc::new("restoreProcess:With:", 2, process::restore_process),
    ]
}

/// Adds one native object per descriptor as a slot of `target`.
pub fn install(heap: &mut Heap, target: ObjectId, primitives: &[PrimitiveDesc]) -> Result<(), VmError> {
    for desc in primitives {
        let native = heap.new_object_with(Behavior::Native(*desc))?;
        heap.add_slot(target, desc.name, native.into());
    }
    Ok(())
}

pub(crate) fn install_all(heap: &mut Heap, specials: &SpecialObjects) -> Result<(), VmError> {
    install(heap, specials.fixnum_traits, &fixnum_primitives())?;
    install(heap, specials.float_traits, &float_primitives())?;
    install(heap, specials.string_traits, &string_primitives())?;
    install(heap, specials.interpreter, &interpreter_primitives())?;

    let singletons = singleton_primitives();
    for singleton in [specials.nil, specials.true_object, specials.false_object] {
        if let Some(id) = singleton.as_object() {
            install(heap, id, &singletons)?;
        }
    }
    Ok(())
}

/// First argument, the interpreter checks arity before calling a native.
pub(crate) fn first(args: &[Value]) -> Result<Value, VmError> {
    args.first().copied().ok_or(VmError::StackUnderflow)
}
