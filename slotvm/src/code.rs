use std::{fmt::Write, rc::Rc};

use rustc_hash::FxHashMap;

use crate::{
    Instruction, LiteralType, Op, PADDING_LEN, SendType, SlotType, Value, VmError,
};

#[derive(Debug, Clone)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Object(Rc<ObjectLiteral>),
}

impl Literal {
    pub fn kind(&self) -> LiteralType {
        match self {
            Literal::Int(_) => LiteralType::Int,
            Literal::Float(_) => LiteralType::Float,
            Literal::Str(_) => LiteralType::Str,
            Literal::Object(_) => LiteralType::Obj,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Plain,
    Method,
    Block,
}

/// Template for an object literal. Evaluating it clones an object built
/// once from this description.
#[derive(Debug, Clone)]
pub struct ObjectLiteral {
    pub kind: ObjectKind,
    pub params: Vec<Rc<str>>,
    pub code: Option<Rc<CodeContext>>,
}

impl ObjectLiteral {
    pub fn plain() -> Self {
        Self {
            kind: ObjectKind::Plain,
            params: Vec::new(),
            code: None,
        }
    }

    pub fn method(code: CodeContext, params: &[&str]) -> Self {
        Self::with_code(ObjectKind::Method, code, params)
    }

    pub fn block(code: CodeContext, params: &[&str]) -> Self {
        Self::with_code(ObjectKind::Block, code, params)
    }

    fn with_code(kind: ObjectKind, code: CodeContext, params: &[&str]) -> Self {
        Self {
            kind,
            params: params.iter().map(|&name| name.into()).collect(),
            code: Some(Rc::new(code)),
        }
    }
}

/// Output of the compiler consumed by the interpreter.
pub trait Compile {
    fn compile(&self, code: &mut CodeContext) -> Result<(), VmError>;
}

/// A compiled unit: bytecode plus literal pool.
#[derive(Debug, Clone, Default)]
pub struct CodeContext {
    bytecodes: Vec<u8>,
    literals: Vec<Literal>,
    str_literals: FxHashMap<Rc<str>, u8>,
    finalized: bool,
}

impl CodeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `nodes` into a fresh, finalized unit.
    pub fn compile<C: Compile>(nodes: &[C]) -> Result<Self, VmError> {
        let mut code = Self::new();
        for node in nodes {
            node.compile(&mut code)?;
        }
        code.finalize();
        Ok(code)
    }

    pub fn bytecodes(&self) -> &[u8] {
        &self.bytecodes
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn literal(&self, index: usize) -> Result<&Literal, VmError> {
        self.literals
            .get(index)
            .ok_or(VmError::LiteralOutOfRange { index })
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Adds `literal` to the pool, equal strings share one entry.
    pub fn add_literal(&mut self, literal: Literal) -> Result<u8, VmError> {
        if let Literal::Str(text) = &literal {
            if let Some(&index) = self.str_literals.get(text) {
                return Ok(index);
            }
        }

        let index = u8::try_from(self.literals.len()).map_err(|_| VmError::LiteralPoolOverflow)?;
        if let Literal::Str(text) = &literal {
            self.str_literals.insert(text.clone(), index);
        }
        self.literals.push(literal);
        Ok(index)
    }

    pub fn emit(&mut self, instruction: Instruction) {
        debug_assert!(!self.finalized, "emit into finalized code");
        instruction.encode(&mut self.bytecodes);
    }

    pub fn push_self(&mut self) {
        self.emit(Instruction::PushSelf);
    }

    pub fn push_nil(&mut self) {
        self.emit(Instruction::PushLiteral {
            kind: LiteralType::Nil,
            index: 0,
        });
    }

    pub fn push_assignment(&mut self) {
        self.emit(Instruction::PushLiteral {
            kind: LiteralType::Assignment,
            index: 0,
        });
    }

    fn push_literal(&mut self, literal: Literal) -> Result<(), VmError> {
        let kind = literal.kind();
        let index = self.add_literal(literal)?;
        self.emit(Instruction::PushLiteral { kind, index });
        Ok(())
    }

    pub fn push_int(&mut self, value: i64) -> Result<(), VmError> {
        if Value::try_from_fixnum(value).is_none() {
            return Err(VmError::IntegerOverflow(value.into()));
        }
        self.push_literal(Literal::Int(value))
    }

    pub fn push_float(&mut self, value: f64) -> Result<(), VmError> {
        self.push_literal(Literal::Float(value))
    }

    pub fn push_str(&mut self, value: &str) -> Result<(), VmError> {
        self.push_literal(Literal::Str(value.into()))
    }

    pub fn push_object(&mut self, object: ObjectLiteral) -> Result<(), VmError> {
        self.push_literal(Literal::Object(Rc::new(object)))
    }

    pub fn pop(&mut self) {
        self.emit(Instruction::Pop);
    }

    pub fn send(&mut self, kind: SendType, count: u8) {
        self.emit(Instruction::Send { kind, count });
    }

    pub fn return_top(&mut self) {
        self.emit(Instruction::ReturnTop);
    }

    pub fn add_slot(&mut self, kind: SlotType) {
        self.emit(Instruction::AddSlot { kind });
    }

    /// Freezes the unit: appends `RETURN_TOP` padding so decoding never runs
    /// off the end, and finalizes nested literal code. Repeated calls do
    /// nothing.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }

        self.bytecodes.extend([Op::ReturnTop as u8; PADDING_LEN]);
        for literal in &mut self.literals {
            let Literal::Object(object) = literal else {
                continue;
            };
            if object.code.as_ref().is_none_or(|code| code.is_finalized()) {
                continue;
            }
            if let Some(code) = &mut Rc::make_mut(object).code {
                Rc::make_mut(code).finalize();
            }
        }
        self.finalized = true;
    }

    /// One instruction per line, nested code indented below its literal.
    pub fn disassemble(&self) -> String {
        let mut output = String::new();
        self.disassemble_into(&mut output, 0);
        output
    }

    fn disassemble_into(&self, output: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let mut ip = 0;
        while ip < self.bytecodes.len() {
            let instruction = match Instruction::decode(&self.bytecodes, ip) {
                Ok(instruction) => instruction,
                Err(error) => {
                    let _ = writeln!(output, "{indent}{ip:04} <{error}>");
                    return;
                }
            };
            let _ = write!(output, "{indent}{ip:04} {instruction}");

            if let Instruction::PushLiteral { index, .. } = instruction {
                match self.literals.get(index as usize) {
                    Some(Literal::Int(value)) => {
                        let _ = write!(output, " ; {value}");
                    }
                    Some(Literal::Float(value)) => {
                        let _ = write!(output, " ; {value}");
                    }
                    Some(Literal::Str(text)) => {
                        let _ = write!(output, " ; {text:?}");
                    }
                    Some(Literal::Object(object)) => {
                        let _ = writeln!(output, " ; {:?} {:?}", object.kind, object.params);
                        if let Some(code) = &object.code {
                            code.disassemble_into(output, depth + 1);
                        }
                        ip += instruction.len();
                        continue;
                    }
                    None => {}
                }
            }
            output.push('\n');
            ip += instruction.len();
        }
    }
}
