//! Core types for the Nona virtual machine.
//!
//! This crate holds the leaf types shared by every other crate in the
//! workspace:
//!
//! - **Value**: a fixed-width tagged cell carrying one runtime value
//! - **Instruction**: the packed 32-bit instruction word and its opcode
//!   enumeration
//! - **VmError**: the error taxonomy surfaced by the execution engine
//!
//! The instruction encoding is wire-visible: modules serialized elsewhere
//! decode through [`Instruction`], so its bit layout must not change.

pub mod error;
pub mod instruction;
pub mod value;

pub use error::{VmError, VmErrorKind, VmResult};
pub use instruction::{Instruction, Opcode, RawInstruction};
pub use value::{ObjectRef, Tag, Value};
