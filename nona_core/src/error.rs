//! The runtime error taxonomy.
//!
//! Every failure the execution engine can produce is a [`VmError`] with a
//! [`VmErrorKind`] and a human-readable message. Errors unwind all active
//! frames up to the outer `run` entry point; there is no automatic recovery.

use std::fmt;

/// Result alias used across the workspace.
pub type VmResult<T> = Result<T, VmError>;

/// The kind of a runtime error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VmErrorKind {
    /// Arity mismatch or unresolvable target at the outer entry.
    BadFunctionCall,
    /// The operand stack cursor would exceed capacity.
    StackOverflow,
    /// The operand stack cursor would drop below its base.
    StackUnderflow,
    /// An opcode byte outside the instruction set.
    InvalidOpcode,
    /// Arithmetic on a non-integer, or field access on a non-object.
    TypeMismatch,
    /// Slot read from an object that does not carry the slot.
    MissingSlot,
    /// Integer division with a zero divisor.
    DivideByZero,
    /// Register-mode native transition beyond the supported arity.
    ArityUnsupported,
    /// An end-of-section sentinel reached without a return.
    FellOffFunction,
    /// The code generator refused to start.
    JitInitFailed,
    /// A usage error or broken internal invariant.
    Internal,
}

impl VmErrorKind {
    /// Stable name used as the error's display prefix.
    pub fn name(self) -> &'static str {
        match self {
            Self::BadFunctionCall => "BadFunctionCall",
            Self::StackOverflow => "StackOverflow",
            Self::StackUnderflow => "StackUnderflow",
            Self::InvalidOpcode => "InvalidOpcode",
            Self::TypeMismatch => "TypeMismatch",
            Self::MissingSlot => "MissingSlot",
            Self::DivideByZero => "DivideByZero",
            Self::ArityUnsupported => "ArityUnsupported",
            Self::FellOffFunction => "FellOffFunction",
            Self::JitInitFailed => "JitInitFailed",
            Self::Internal => "Internal",
        }
    }
}

/// A runtime error carrying its kind and a diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmError {
    kind: VmErrorKind,
    message: String,
}

impl VmError {
    /// Build an error from a kind and message.
    pub fn new(kind: VmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn bad_function_call(message: impl Into<String>) -> Self {
        Self::new(VmErrorKind::BadFunctionCall, message)
    }

    pub fn stack_overflow() -> Self {
        Self::new(VmErrorKind::StackOverflow, "operand stack exceeded capacity")
    }

    pub fn stack_underflow() -> Self {
        Self::new(VmErrorKind::StackUnderflow, "operand stack is empty")
    }

    pub fn invalid_opcode(byte: u8) -> Self {
        Self::new(
            VmErrorKind::InvalidOpcode,
            format!("unknown opcode byte 0x{byte:02x}"),
        )
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(VmErrorKind::TypeMismatch, message)
    }

    pub fn missing_slot(slot_id: u32) -> Self {
        Self::new(
            VmErrorKind::MissingSlot,
            format!("object has no slot {slot_id}"),
        )
    }

    pub fn divide_by_zero() -> Self {
        Self::new(VmErrorKind::DivideByZero, "division by zero")
    }

    pub fn arity_unsupported(nargs: u32) -> Self {
        Self::new(
            VmErrorKind::ArityUnsupported,
            format!("too many arguments for native transition: {nargs}"),
        )
    }

    pub fn fell_off_function(name: &str) -> Self {
        Self::new(
            VmErrorKind::FellOffFunction,
            format!("fell off end of function '{name}'"),
        )
    }

    pub fn jit_init_failed(message: impl Into<String>) -> Self {
        Self::new(VmErrorKind::JitInitFailed, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(VmErrorKind::Internal, message)
    }

    /// The error's kind.
    #[inline]
    pub fn kind(&self) -> VmErrorKind {
        self.kind
    }

    /// The diagnostic message, without the kind prefix.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.name(), self.message)
    }
}

impl std::error::Error for VmError {}
