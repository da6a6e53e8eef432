use std::fmt;

use crate::VmError;

/// Bytecode opcodes.
///
/// Operands are single bytes following the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    /// Push the current activation.
    PushSelf = 0,

    /// Push a literal from the pool.
    /// Operands: `type:u8`, `index:u8`
    PushLiteral,

    /// Discard the top of the stack.
    Pop,

    /// Pop message name (and parent name for resends), arguments and
    /// receiver, then dispatch.
    /// Operands: `send_type:u8`, `count:u8`
    Send,

    /// Return the top of the stack (or nil) from the current activation.
    ReturnTop,

    /// Pop value, slot name and receiver, add the slot, push the receiver.
    /// Operands: `slot_type:u8`
    AddSlot,
}

/// Length in bytes of the widest instruction.
pub const MAX_INSTRUCTION_LEN: usize = 3;

/// Number of `RETURN_TOP` bytes appended by finalization.
pub const PADDING_LEN: usize = MAX_INSTRUCTION_LEN + 1;

impl Op {
    pub const fn len(self) -> usize {
        match self {
            Op::PushLiteral | Op::Send => 3,
            Op::AddSlot => 2,
            Op::PushSelf | Op::Pop | Op::ReturnTop => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Op::PushSelf => "PUSH_SELF",
            Op::PushLiteral => "PUSH_LITERAL",
            Op::Pop => "POP",
            Op::Send => "SEND",
            Op::ReturnTop => "RETURN_TOP",
            Op::AddSlot => "ADD_SLOT",
        }
    }
}

impl TryFrom<u8> for Op {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        Ok(match byte {
            0 => Op::PushSelf,
            1 => Op::PushLiteral,
            2 => Op::Pop,
            3 => Op::Send,
            4 => Op::ReturnTop,
            5 => Op::AddSlot,
            _ => return Err(byte),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LiteralType {
    Nil = 0,
    Int,
    Float,
    Str,
    Obj,
    Assignment,
}

impl TryFrom<u8> for LiteralType {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        Ok(match byte {
            0 => LiteralType::Nil,
            1 => LiteralType::Int,
            2 => LiteralType::Float,
            3 => LiteralType::Str,
            4 => LiteralType::Obj,
            5 => LiteralType::Assignment,
            _ => return Err(byte),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SendType {
    Unary = 0,
    Binary,
    Keyword,
    UnaryResend,
    KeywordResend,
}

impl SendType {
    pub fn is_resend(self) -> bool {
        matches!(self, SendType::UnaryResend | SendType::KeywordResend)
    }

    /// Number of arguments popped for a send encoded with `count`.
    pub fn arg_count(self, count: u8) -> usize {
        match self {
            SendType::Unary | SendType::UnaryResend => 0,
            SendType::Binary => 1,
            SendType::Keyword | SendType::KeywordResend => count as usize,
        }
    }
}

impl TryFrom<u8> for SendType {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        Ok(match byte {
            0 => SendType::Unary,
            1 => SendType::Binary,
            2 => SendType::Keyword,
            3 => SendType::UnaryResend,
            4 => SendType::KeywordResend,
            _ => return Err(byte),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SlotType {
    Normal = 0,
    Parent,
}

impl TryFrom<u8> for SlotType {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        match byte {
            0 => Ok(SlotType::Normal),
            1 => Ok(SlotType::Parent),
            _ => Err(byte),
        }
    }
}

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    PushSelf,
    PushLiteral { kind: LiteralType, index: u8 },
    Pop,
    Send { kind: SendType, count: u8 },
    ReturnTop,
    AddSlot { kind: SlotType },
}

impl Instruction {
    pub fn op(&self) -> Op {
        match self {
            Instruction::PushSelf => Op::PushSelf,
            Instruction::PushLiteral { .. } => Op::PushLiteral,
            Instruction::Pop => Op::Pop,
            Instruction::Send { .. } => Op::Send,
            Instruction::ReturnTop => Op::ReturnTop,
            Instruction::AddSlot { .. } => Op::AddSlot,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.op().len()
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.op() as u8);
        match *self {
            Instruction::PushLiteral { kind, index } => out.extend([kind as u8, index]),
            Instruction::Send { kind, count } => out.extend([kind as u8, count]),
            Instruction::AddSlot { kind } => out.push(kind as u8),
            Instruction::PushSelf | Instruction::Pop | Instruction::ReturnTop => {}
        }
    }

    /// Decodes the instruction starting at `ip`.
    #[inline]
    pub fn decode(bytes: &[u8], ip: usize) -> Result<Self, VmError> {
        let byte = operand(bytes, ip)?;
        let op = Op::try_from(byte).map_err(VmError::InvalidOpcode)?;

        Ok(match op {
            Op::PushSelf => Instruction::PushSelf,
            Op::Pop => Instruction::Pop,
            Op::ReturnTop => Instruction::ReturnTop,
            Op::PushLiteral => Instruction::PushLiteral {
                kind: decode_operand(bytes, ip + 1)?,
                index: operand(bytes, ip + 2)?,
            },
            Op::Send => Instruction::Send {
                kind: decode_operand(bytes, ip + 1)?,
                count: operand(bytes, ip + 2)?,
            },
            Op::AddSlot => Instruction::AddSlot {
                kind: decode_operand(bytes, ip + 1)?,
            },
        })
    }
}

fn operand(bytes: &[u8], offset: usize) -> Result<u8, VmError> {
    bytes
        .get(offset)
        .copied()
        .ok_or(VmError::TruncatedBytecode { offset })
}

fn decode_operand<T: TryFrom<u8, Error = u8>>(bytes: &[u8], offset: usize) -> Result<T, VmError> {
    let byte = operand(bytes, offset)?;
    T::try_from(byte).map_err(|byte| VmError::InvalidOperand { offset, byte })
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.op().name();
        match self {
            Instruction::PushLiteral { kind, index } => write!(f, "{name} {kind:?} {index}"),
            Instruction::Send { kind, count } => write!(f, "{name} {kind:?} {count}"),
            Instruction::AddSlot { kind } => write!(f, "{name} {kind:?}"),
            _ => f.write_str(name),
        }
    }
}
