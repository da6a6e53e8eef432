//! A small expression tree compiled into bytecode, enough to write test
//! programs without a parser.
use crate::{
    CodeContext, Compile, ObjectKind, ObjectLiteral, ProcessHandle, Scheduler, SendType, SlotType,
    VMCreateInfo, VmError,
};

#[derive(Debug, Clone)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(&'static str),
    Nil,
    SelfRef,
    Send {
        /// `None` sends to the current activation
        receiver: Option<Box<Expr>>,
        selector: &'static str,
        args: Vec<Expr>,
    },
    Resend {
        parent: &'static str,
        selector: &'static str,
        args: Vec<Expr>,
    },
    Object(ObjectExpr),
    Return(Box<Expr>),
}

#[derive(Debug, Clone)]
pub struct ObjectExpr {
    pub kind: ObjectKind,
    pub params: Vec<&'static str>,
    pub slots: Vec<Slot>,
    pub body: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub enum Slot {
    Constant(&'static str, Expr),
    /// `name <- value`: the slot plus its `name:` assignment slot
    Assignable(&'static str, Expr),
    Parent(&'static str, Expr),
}

fn send_type(selector: &str, argc: usize) -> SendType {
    if argc == 0 {
        SendType::Unary
    } else if selector.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
        SendType::Keyword
    } else {
        SendType::Binary
    }
}

fn arg_count(args: &[Expr]) -> Result<u8, VmError> {
    u8::try_from(args.len()).map_err(|_| VmError::LiteralPoolOverflow)
}

impl Compile for Expr {
    fn compile(&self, code: &mut CodeContext) -> Result<(), VmError> {
        match self {
            Expr::Int(value) => code.push_int(*value)?,
            Expr::Float(value) => code.push_float(*value)?,
            Expr::Str(text) => code.push_str(text)?,
            Expr::Nil => code.push_nil(),
            Expr::SelfRef => code.push_self(),
            Expr::Send {
                receiver,
                selector,
                args,
            } => {
                match receiver {
                    Some(receiver) => receiver.compile(code)?,
                    None => code.push_self(),
                }
                for arg in args {
                    arg.compile(code)?;
                }
                code.push_str(selector)?;
                code.send(send_type(selector, args.len()), arg_count(args)?);
            }
            Expr::Resend {
                parent,
                selector,
                args,
            } => {
                code.push_self();
                for arg in args {
                    arg.compile(code)?;
                }
                code.push_str(parent)?;
                code.push_str(selector)?;
                let kind = if args.is_empty() {
                    SendType::UnaryResend
                } else {
                    SendType::KeywordResend
                };
                code.send(kind, arg_count(args)?);
            }
            Expr::Object(object) => object.compile(code)?,
            Expr::Return(value) => {
                value.compile(code)?;
                code.return_top();
            }
        }
        Ok(())
    }
}

impl Compile for ObjectExpr {
    fn compile(&self, code: &mut CodeContext) -> Result<(), VmError> {
        let literal = match self.kind {
            ObjectKind::Plain => ObjectLiteral::plain(),
            kind => {
                let mut body = CodeContext::new();
                for (index, statement) in self.body.iter().enumerate() {
                    if index > 0 {
                        body.pop();
                    }
                    statement.compile(&mut body)?;
                }
                match kind {
                    ObjectKind::Block => ObjectLiteral::block(body, &self.params),
                    _ => ObjectLiteral::method(body, &self.params),
                }
            }
        };
        code.push_object(literal)?;

        for slot in &self.slots {
            match slot {
                Slot::Constant(name, value) => {
                    code.push_str(name)?;
                    value.compile(code)?;
                    code.add_slot(SlotType::Normal);
                }
                Slot::Assignable(name, value) => {
                    code.push_str(name)?;
                    value.compile(code)?;
                    code.add_slot(SlotType::Normal);
                    code.push_str(&format!("{name}:"))?;
                    code.push_assignment();
                    code.add_slot(SlotType::Normal);
                }
                Slot::Parent(name, value) => {
                    code.push_str(name)?;
                    value.compile(code)?;
                    code.add_slot(SlotType::Parent);
                }
            }
        }
        Ok(())
    }
}

pub fn int(value: i64) -> Expr {
    Expr::Int(value)
}

pub fn float(value: f64) -> Expr {
    Expr::Float(value)
}

pub fn string(text: &'static str) -> Expr {
    Expr::Str(text)
}

pub fn nil() -> Expr {
    Expr::Nil
}

pub fn this() -> Expr {
    Expr::SelfRef
}

pub fn send(receiver: Expr, selector: &'static str, args: Vec<Expr>) -> Expr {
    Expr::Send {
        receiver: Some(Box::new(receiver)),
        selector,
        args,
    }
}

/// Send to the current activation.
pub fn msg(selector: &'static str, args: Vec<Expr>) -> Expr {
    Expr::Send {
        receiver: None,
        selector,
        args,
    }
}

pub fn resend(parent: &'static str, selector: &'static str, args: Vec<Expr>) -> Expr {
    Expr::Resend {
        parent,
        selector,
        args,
    }
}

pub fn ret(value: Expr) -> Expr {
    Expr::Return(Box::new(value))
}

pub fn object(slots: Vec<Slot>) -> Expr {
    Expr::Object(ObjectExpr {
        kind: ObjectKind::Plain,
        params: Vec::new(),
        slots,
        body: Vec::new(),
    })
}

pub fn method(params: &[&'static str], slots: Vec<Slot>, body: Vec<Expr>) -> Expr {
    code_object(ObjectKind::Method, params, slots, body)
}

pub fn block(params: &[&'static str], slots: Vec<Slot>, body: Vec<Expr>) -> Expr {
    code_object(ObjectKind::Block, params, slots, body)
}

fn code_object(kind: ObjectKind, params: &[&'static str], slots: Vec<Slot>, body: Vec<Expr>) -> Expr {
    Expr::Object(ObjectExpr {
        kind,
        params: params.to_vec(),
        slots,
        body,
    })
}

pub fn constant(name: &'static str, value: Expr) -> Slot {
    Slot::Constant(name, value)
}

pub fn assignable(name: &'static str, value: Expr) -> Slot {
    Slot::Assignable(name, value)
}

pub fn parent(name: &'static str, value: Expr) -> Slot {
    Slot::Parent(name, value)
}

pub fn compile(program: Expr) -> CodeContext {
    CodeContext::compile(&[program]).expect("test program compiles")
}

/// Runs `program` alone on a default scheduler.
pub fn run(program: Expr) -> (Scheduler, ProcessHandle) {
    let mut scheduler = Scheduler::new(VMCreateInfo::default()).expect("bootstrap fits the heap");
    let handle = scheduler.add_process(compile(program));
    scheduler.interpret();
    (scheduler, handle)
}
