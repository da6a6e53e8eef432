//! Bytecode dispatch for one process.
//!
//! Every call pushes a [`Frame`] owning a fresh activation object: a clone
//! of the method (or block) object, so its local slots are private to the
//! call. The activation's scope parent is the binding object holding the
//! arguments, or the lexical parent directly when there are none. For a
//! method the lexical parent is the receiver, for a block it is the
//! activation the block literal was evaluated in. Receivers are never
//! modified by a send.
//!
//! An activation is only ever a value on its own frame's stack. Whatever
//! stores, binds, returns or hands it to a native sees the receiver
//! instead, so once the frame returns its activation and binding go back
//! to the heap unless an object literal captured them as its scope.
use std::rc::Rc;

use log::{debug, info, trace, warn};

use crate::{
    format, lookup, process::{Frame, FrameKind}, Behavior, Instruction, Literal, LiteralType,
    LookupResult, Method, ObjectId, ObjectKind, ObjectLiteral, Payload, PrimitiveContext,
    PrimitiveDesc, PrimitiveOutcome, Process, SendType, SlotType, Value, VmError, VM,
};

/// Why [`Interpreter::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Finished,
    /// the instruction budget ran out
    Preempted,
}

pub struct Interpreter<'a> {
    vm: &'a mut VM,
    process: &'a mut Process,
    max_frames: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(vm: &'a mut VM, process: &'a mut Process, max_frames: usize) -> Self {
        Self {
            vm,
            process,
            max_frames,
        }
    }

    /// Executes at most `budget` instructions, `0` runs to completion.
    pub fn run(&mut self, budget: usize) -> Turn {
        let mut executed = 0;
        while !self.process.is_finished() {
            if budget != 0 && executed == budget {
                return Turn::Preempted;
            }
            if let Err(error) = self.step() {
                self.fail(error);
            }
            executed += 1;
        }
        Turn::Finished
    }

    fn step(&mut self) -> Result<(), VmError> {
        let id = self.process.id();
        let frame = self.frame()?;
        let instruction = Instruction::decode(frame.code.bytecodes(), frame.ip)?;
        trace!("{id} {:04} {instruction}", frame.ip);
        frame.ip += instruction.len();

        match instruction {
            Instruction::PushSelf => {
                let activation = frame.activation;
                frame.push(activation);
            }
            Instruction::PushLiteral { kind, index } => {
                let value = self.literal(kind, index)?;
                self.push(value)?;
            }
            Instruction::Pop => {
                frame.pop()?;
            }
            Instruction::Send { kind, count } => self.send(kind, count)?,
            Instruction::ReturnTop => self.return_top()?,
            Instruction::AddSlot { kind } => self.add_slot(kind)?,
        }
        Ok(())
    }

    fn frame(&mut self) -> Result<&mut Frame, VmError> {
        self.process.frames.last_mut().ok_or(VmError::StackUnderflow)
    }

    fn push(&mut self, value: Value) -> Result<(), VmError> {
        self.frame()?.push(value);
        Ok(())
    }

    fn nil(&self) -> Value {
        self.vm.specials.nil
    }

    fn literal(&mut self, kind: LiteralType, index: u8) -> Result<Value, VmError> {
        match kind {
            LiteralType::Nil => return Ok(self.vm.specials.nil),
            LiteralType::Assignment => return Ok(self.vm.specials.assignment),
            _ => {}
        }

        let code = self.frame()?.code.clone();
        let literal = code.literal(index as usize)?;
        if literal.kind() != kind {
            return Err(VmError::LiteralMismatch { expected: kind });
        }

        let VM { heap, specials } = &mut *self.vm;
        Ok(match literal {
            Literal::Int(number) => {
                Value::try_from_fixnum(*number).ok_or(VmError::IntegerOverflow((*number).into()))?
            }
            Literal::Float(number) => specials.new_float(heap, *number)?,
            Literal::Str(text) => specials.intern(heap, text)?,
            Literal::Object(object) => self.instantiate(object)?,
        })
    }

    /// Clones the template built for `literal` into the current activation.
    fn instantiate(&mut self, literal: &Rc<ObjectLiteral>) -> Result<Value, VmError> {
        let heap = &mut self.vm.heap;
        let template = match heap.template(literal) {
            Some(template) => template,
            None => {
                let template = match literal.kind {
                    ObjectKind::Plain => heap.new_object()?,
                    ObjectKind::Method | ObjectKind::Block => {
                        let mut code = literal.code.clone().unwrap_or_default();
                        if !code.is_finalized() {
                            Rc::make_mut(&mut code).finalize();
                        }
                        let is_block = literal.kind == ObjectKind::Block;
                        heap.new_method(Method::new(code, literal.params.clone(), is_block))?
                    }
                };
                heap.remember_template(literal, template);
                template
            }
        };

        let frame = self.frame()?;
        frame.captured = true;
        let scope = frame.activation;
        Ok(self.vm.heap.instantiate(template, scope)?.into())
    }

    fn name(&self, value: Value) -> Result<Rc<str>, VmError> {
        self.vm
            .heap
            .as_str(value)
            .map(Rc::from)
            .ok_or_else(|| VmError::TypeMismatch {
                expected: "string",
                got: format::type_name(&self.vm.heap, &self.vm.specials, value).into(),
            })
    }

    fn send(&mut self, kind: SendType, count: u8) -> Result<(), VmError> {
        let frame = self.frame()?;
        let selector = frame.pop()?;
        let parent = if kind.is_resend() { Some(frame.pop()?) } else { None };
        let argc = kind.arg_count(count);
        if frame.stack.len() < argc + 1 {
            return Err(VmError::StackUnderflow);
        }
        let args = frame.stack.split_off(frame.stack.len() - argc);
        let receiver = frame.pop()?;

        let selector = self.name(selector)?;
        let parent = parent.map(|parent| self.name(parent)).transpose()?;
        trace!("{} send `{selector}` to {receiver:?}", self.process.id());
        self.dispatch(receiver, &selector, parent.as_deref(), &args)
    }

    fn dispatch(&mut self, receiver: Value, selector: &str, parent: Option<&str>, args: &[Value]) -> Result<(), VmError> {
        if parent.is_none() && is_block_call(selector, args.len()) {
            if let Some(block) = self.block(receiver) {
                return self.call_block(block, selector, args, FrameKind::Method);
            }
        }

        let found = match parent {
            None => self.vm.lookup(receiver, selector),
            Some(parent) => self.resend_lookup(receiver, parent, selector)?,
        };
        let (holder, value) = match found {
            LookupResult::Found { holder, value } => (holder, value),
            LookupResult::None => {
                return Err(VmError::MissingSlot {
                    name: selector.into(),
                })
            }
            LookupResult::Ambiguous { first, second } => {
                trace!("`{selector}` defined by both {first} and {second}");
                return Err(VmError::AmbiguousSlot {
                    name: selector.into(),
                });
            }
        };

        let behavior = match self.vm.heap.get(value) {
            // a running activation is never entered again through a slot
            Some(object) if matches!(object.payload(), Payload::Activation { .. }) => Behavior::Data,
            Some(object) => object.map().behavior().clone(),
            None => Behavior::Data,
        };
        match (behavior, value.as_object()) {
            (Behavior::Assignment, _) => self.assign(holder, selector, receiver, args),
            (Behavior::Native(desc), _) => self.call_native(desc, selector, receiver, args),
            (Behavior::Method(method), Some(method_object)) if !method.is_block => {
                let receiver = self.effective_receiver(receiver);
                self.activate(method_object, &method, selector, receiver, receiver, args, FrameKind::Method)
            }
            // a block held in a slot is data until it gets `value`
            _ => {
                let value = self.effective_receiver(value);
                self.push(value)
            }
        }
    }

    /// The method a resend names: `parent` is searched from the receiver,
    /// `selector` from that parent's value.
    fn resend_lookup(&self, receiver: Value, parent: &str, selector: &str) -> Result<LookupResult, VmError> {
        let start = lookup::lookup_start(&self.vm.specials, receiver);
        match lookup::parent_slot_lookup(&self.vm.heap, &self.vm.specials, start, parent) {
            LookupResult::Found { value, .. } => Ok(self.vm.lookup(value, selector)),
            LookupResult::Ambiguous { .. } => Err(VmError::AmbiguousSlot { name: parent.into() }),
            LookupResult::None => Err(VmError::MissingParent { name: parent.into() }),
        }
    }

    /// `self` as seen by natives and callers: an activation stands for its
    /// receiver.
    fn effective_receiver(&self, value: Value) -> Value {
        match self.vm.heap.get(value).map(|object| object.payload()) {
            Some(Payload::Activation { receiver }) => *receiver,
            _ => value,
        }
    }

    /// A block object proper, activations of blocks do not count.
    fn block(&self, value: Value) -> Option<ObjectId> {
        let id = value.as_object()?;
        let object = self.vm.heap.object(id);
        let is_block = object.map().is_block() && !matches!(object.payload(), Payload::Activation { .. });
        is_block.then_some(id)
    }

    fn assign(&mut self, holder: ObjectId, selector: &str, receiver: Value, args: &[Value]) -> Result<(), VmError> {
        let &[value] = args else {
            return Err(VmError::ArityMismatch {
                selector: selector.into(),
                expected: 1,
                got: args.len(),
            });
        };
        let target = selector.strip_suffix(':').unwrap_or(selector);
        let value = self.effective_receiver(value);
        if !self.vm.heap.set_slot(holder, target, value) {
            return Err(VmError::MissingSlot {
                name: target.into(),
            });
        }
        let receiver = self.effective_receiver(receiver);
        self.push(receiver)
    }

    fn call_native(&mut self, desc: PrimitiveDesc, selector: &str, receiver: Value, args: &[Value]) -> Result<(), VmError> {
        if args.len() != desc.arity as usize {
            return Err(VmError::ArityMismatch {
                selector: selector.into(),
                expected: desc.arity as usize,
                got: args.len(),
            });
        }

        let receiver = self.effective_receiver(receiver);
        let args: Vec<Value> = args.iter().map(|&arg| self.effective_receiver(arg)).collect();
        let mut ctx = PrimitiveContext {
            heap: &mut self.vm.heap,
            specials: &self.vm.specials,
        };
        let outcome = (desc.func)(&mut ctx, receiver, &args)?;
        self.apply(outcome)
    }

    fn apply(&mut self, outcome: PrimitiveOutcome) -> Result<(), VmError> {
        match outcome {
            PrimitiveOutcome::Return(value) => self.push(value),
            PrimitiveOutcome::Halt(value) => {
                info!("{} halted", self.process.id());
                self.finish(value);
                Ok(())
            }
            PrimitiveOutcome::Raise(value) => self.raise(value, None),
            PrimitiveOutcome::SetHandler(handler) => {
                let nil = self.nil();
                let frame = self.frame()?;
                frame.handler = Some(handler);
                frame.push(nil);
                Ok(())
            }
            PrimitiveOutcome::Restore { token, value } => self.restore(token, value),
        }
    }

    fn call_block(&mut self, block: ObjectId, selector: &str, args: &[Value], kind: FrameKind) -> Result<(), VmError> {
        let object = self.vm.heap.object(block);
        let Some(method) = object.map().method().cloned() else {
            return Err(VmError::TypeMismatch {
                expected: "block",
                got: format::type_name(&self.vm.heap, &self.vm.specials, block.into()).into(),
            });
        };
        let lexical = object.scope_parent().unwrap_or(self.vm.specials.nil);
        let receiver = self.effective_receiver(lexical);
        self.activate(block, &method, selector, receiver, lexical, args, kind)
    }

    #[allow(clippy::too_many_arguments)]
    fn activate(
        &mut self,
        method_object: ObjectId,
        method: &Method,
        selector: &str,
        receiver: Value,
        lexical: Value,
        args: &[Value],
        kind: FrameKind,
    ) -> Result<(), VmError> {
        if args.len() > method.arity() {
            return Err(VmError::ArityMismatch {
                selector: selector.into(),
                expected: method.arity(),
                got: args.len(),
            });
        }
        if self.process.depth() >= self.max_frames {
            return Err(VmError::StackOverflow {
                limit: self.max_frames,
            });
        }

        let args: Vec<Value> = args.iter().map(|&arg| self.effective_receiver(arg)).collect();
        let nil = self.nil();
        let heap = &mut self.vm.heap;
        let binding = if method.params.is_empty() {
            None
        } else {
            Some(heap.new_binding(method, &args, nil, lexical)?)
        };
        let scope = binding.map_or(lexical, Value::from);
        let activation = match heap.new_activation(method_object, scope, receiver) {
            Ok(activation) => activation,
            Err(error) => {
                if let Some(binding) = binding {
                    heap.release(binding);
                }
                return Err(error);
            }
        };
        trace!("{} activate `{selector}` as {activation}", self.process.id());

        let mut frame = Frame::new(method.code.clone(), activation.into(), receiver, kind);
        frame.records.push(activation);
        frame.records.extend(binding);
        self.process.frames.push(frame);
        Ok(())
    }

    fn return_top(&mut self) -> Result<(), VmError> {
        let mut frame = self.process.frames.pop().ok_or(VmError::StackUnderflow)?;
        let value = frame.stack.pop().unwrap_or(self.vm.specials.nil);
        let value = self.effective_receiver(value);
        self.release(&frame);

        if let FrameKind::Handler { error } = frame.kind {
            debug!("{} handler returned without resuming", self.process.id());
            self.finish_with_error(error, None);
            return Ok(());
        }

        match self.process.frames.last_mut() {
            Some(caller) => caller.push(value),
            None => self.finish(value),
        }
        Ok(())
    }

    fn add_slot(&mut self, kind: SlotType) -> Result<(), VmError> {
        let frame = self.frame()?;
        let value = frame.pop()?;
        let name = frame.pop()?;
        let target = frame.pop()?;

        let name = self.name(name)?;
        let Some(id) = target.as_object() else {
            return Err(VmError::TypeMismatch {
                expected: "object",
                got: "fixnum".into(),
            });
        };
        let value = self.effective_receiver(value);
        match kind {
            SlotType::Normal => self.vm.heap.add_slot(id, &name, value),
            SlotType::Parent => self.vm.heap.add_parent(id, &name, value),
        }
        self.push(target)
    }

    /// Hands `value` to the innermost installed handler, parking the
    /// frame stack behind an error token.
    fn raise(&mut self, value: Value, cause: Option<VmError>) -> Result<(), VmError> {
        let handler = self
            .process
            .frames
            .iter()
            .rev()
            .find_map(|frame| frame.handler);
        let Some(block) = handler.and_then(|handler| self.block(handler)) else {
            debug!("{} raised without handler", self.process.id());
            self.finish_with_error(value, cause);
            return Ok(());
        };

        let index = self.process.suspend();
        let token = self.vm.heap.new_with_payload(Payload::ErrorToken {
            process: self.process.id(),
            index,
        })?;
        debug!("{} raised, suspended as token {index}", self.process.id());

        let arity = self
            .vm
            .heap
            .object(block)
            .map()
            .method()
            .map_or(0, |method| method.arity());
        let args = [value, token.into()];
        let args = &args[..arity.min(args.len())];
        self.call_block(block, "handler", args, FrameKind::Handler { error: value })
    }

    fn restore(&mut self, token: Value, value: Value) -> Result<(), VmError> {
        let index = match self.vm.heap.get(token).map(|object| object.payload()) {
            Some(&Payload::ErrorToken { process, index }) if process == self.process.id() => index,
            _ => return Err(VmError::InvalidErrorToken),
        };
        let frames = self
            .process
            .take_suspended(index)
            .ok_or(VmError::InvalidErrorToken)?;

        debug!("{} resumed token {index}", self.process.id());
        for frame in std::mem::replace(&mut self.process.frames, frames) {
            self.release(&frame);
        }
        self.push(value)
    }

    /// Hands a finished frame's records back to the heap.
    fn release(&mut self, frame: &Frame) {
        for &record in frame.releasable() {
            self.vm.heap.release(record);
        }
    }

    fn release_all(&mut self) {
        for frame in self.process.take_all_frames() {
            self.release(&frame);
        }
    }

    /// Lookup failures go through the handler protocol, everything else
    /// ends the process.
    fn fail(&mut self, error: VmError) {
        if error.is_recoverable() {
            let raised = self
                .vm
                .new_string(&error.to_string())
                .and_then(|message| self.raise(message, Some(error)));
            if let Err(error) = raised {
                self.terminate(error);
            }
            return;
        }
        self.terminate(error);
    }

    fn terminate(&mut self, error: VmError) {
        warn!("{} failed: {error}", self.process.id());
        self.release_all();
        let message = self.vm.new_string(&error.to_string()).unwrap_or(self.vm.specials.nil);
        self.finish_with_error(message, Some(error));
    }

    fn finish(&mut self, value: Value) {
        self.release_all();
        let display = self.vm.format(value);
        debug!("{} finished with {display}", self.process.id());
        self.process.finish(value, display);
    }

    fn finish_with_error(&mut self, value: Value, cause: Option<VmError>) {
        self.release_all();
        let display = self.vm.format(value);
        debug!("{} finished with error {display}", self.process.id());
        self.process.finish_with_error(value, display, cause);
    }
}

/// Selectors that invoke a block: `value`, or `value:`/`with:` followed by
/// one `With:` part per further argument.
pub fn is_block_call(selector: &str, argc: usize) -> bool {
    if argc == 0 {
        return selector == "value";
    }
    if !selector.ends_with(':') || selector.matches(':').count() != argc {
        return false;
    }

    let mut parts = selector.split_terminator(':');
    matches!(parts.next(), Some("value" | "with")) && parts.all(|part| part == "With")
}
