//! Execution engine for the Nona virtual machine.
//!
//! Nona executes a compact stack bytecode and optionally transitions to
//! natively generated code for individual functions. This crate is the
//! engine: the operand stack discipline, the dispatch loop, the activation
//! model and the bidirectional transition between interpreted and native
//! frames.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │                  VirtualMachine                    │
//! │  config · code generator · module (loaded once)    │
//! ├────────────────────────────────────────────────────┤
//! │               ExecutionContext                     │
//! │  ┌──────────────┐  ┌─────────────────────────────┐ │
//! │  │ OperandStack │  │ CompiledCodeTable           │ │
//! │  │ 1000 cells   │  │ fn index -> native entry?   │ │
//! │  └──────────────┘  └─────────────────────────────┘ │
//! │  ┌──────────────┐  ┌─────────────────────────────┐ │
//! │  │ Heap         │  │ Module view                 │ │
//! │  │ (nona_runtime)│ │ functions·primitives·strings│ │
//! │  └──────────────┘  └─────────────────────────────┘ │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! `call_function` consults the compiled-code table: an absent entry enters
//! the interpreter, a present one transitions through the calling-convention
//! shim. Native code calls back into possibly-interpreted functions through
//! [`interpreter_trampoline`].
//!
//! Execution is strictly single-threaded; a machine and its context belong
//! to one thread for their whole lifetime.
//!
//! # Example
//!
//! ```
//! use nona_vm::{Config, FunctionSpec, Instruction, Module, Opcode, Value, VirtualMachine};
//!
//! let mut module = Module::new();
//! module.add_function(FunctionSpec::new(
//!     "add",
//!     2,
//!     0,
//!     vec![
//!         Instruction::new(Opcode::PushFromVar, 0),
//!         Instruction::new(Opcode::PushFromVar, 1),
//!         Instruction::bare(Opcode::Add),
//!         Instruction::bare(Opcode::FunctionReturn),
//!         Instruction::END_SECTION,
//!     ],
//! ));
//!
//! let mut vm = VirtualMachine::new(Config::default())?;
//! vm.load(module)?;
//! let result = vm.run_named("add", &[Value::integer(3), Value::integer(4)])?;
//! assert_eq!(result, Value::integer(7));
//! # Ok::<(), nona_vm::VmError>(())
//! ```

pub mod config;
pub mod context;
pub mod jit;
pub mod module;
pub mod primitives;
pub mod stack;
pub mod vm;

mod interpreter;

pub use config::{CallingConvention, Config};
pub use context::ExecutionContext;
pub use jit::{
    interpreter_trampoline, CodeGenerator, CompiledCodeTable, NativeEntry, RegisterEntry,
    StackEntry, MAX_REGISTER_ARGS,
};
pub use module::{FunctionSpec, Module, PrimitiveFunction};
pub use stack::{OperandStack, STACK_CAPACITY};
pub use vm::VirtualMachine;

// Core types, re-exported for hosts assembling modules and arguments.
pub use nona_core::{Instruction, Opcode, Value, VmError, VmErrorKind, VmResult};
