use thiserror::Error;

use crate::LiteralType;

/// Host-level failures of a running process.
///
/// Lookup failures are recoverable: the interpreter raises them as a string
/// through the error-handler protocol. Everything else ends the process.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    #[error("missing slot `{name}`")]
    MissingSlot { name: String },

    #[error("too many parent slots define `{name}`, use resend")]
    AmbiguousSlot { name: String },

    #[error("missing parent slot `{name}` for resend")]
    MissingParent { name: String },

    #[error("`{selector}` takes {expected} parameters, got {got}")]
    ArityMismatch {
        selector: String,
        expected: usize,
        got: usize,
    },

    #[error("primitive `{name}` failed: {reason}")]
    PrimitiveFailed { name: &'static str, reason: String },

    #[error("expected {expected}, got {got}")]
    TypeMismatch { expected: &'static str, got: String },

    #[error("evaluation stack underflow")]
    StackUnderflow,

    #[error("frame stack exceeded {limit} activations")]
    StackOverflow { limit: usize },

    #[error("invalid opcode {0:#04x}")]
    InvalidOpcode(u8),

    #[error("invalid operand {byte:#04x} at offset {offset}")]
    InvalidOperand { offset: usize, byte: u8 },

    #[error("bytecode ends inside an instruction at offset {offset}")]
    TruncatedBytecode { offset: usize },

    #[error("literal index {index} out of range")]
    LiteralOutOfRange { index: usize },

    #[error("literal is not of type {expected:?}")]
    LiteralMismatch { expected: LiteralType },

    #[error("literal pool is full")]
    LiteralPoolOverflow,

    #[error("integer {0} does not fit in a fixnum")]
    IntegerOverflow(i128),

    #[error("invalid or already used error token")]
    InvalidErrorToken,

    #[error("heap is full, {limit} objects are live")]
    HeapExhausted { limit: usize },
}

impl VmError {
    /// Failures a handler installed with `setErrorHandler:` may intercept.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VmError::MissingSlot { .. } | VmError::AmbiguousSlot { .. } | VmError::MissingParent { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_lookup_failures_are_recoverable() {
        assert!(VmError::MissingSlot { name: "x".into() }.is_recoverable());
        assert!(VmError::AmbiguousSlot { name: "x".into() }.is_recoverable());
        assert!(VmError::MissingParent { name: "p".into() }.is_recoverable());
        assert!(!VmError::StackUnderflow.is_recoverable());
        assert!(
            !VmError::ArityMismatch {
                selector: "a:".into(),
                expected: 1,
                got: 2
            }
            .is_recoverable()
        );
    }

    #[test]
    fn messages_name_the_slot() {
        let error = VmError::AmbiguousSlot { name: "xex".into() };
        assert_eq!(error.to_string(), "too many parent slots define `xex`, use resend");
    }
}
