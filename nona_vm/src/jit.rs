//! Native-code transition machinery.
//!
//! The machine supports two execution modes per function: interpreted, and
//! native through a generated entry. This module holds the pieces that sit
//! between them:
//!
//! - [`NativeEntry`]: the entry point of generated code, in one of the two
//!   calling conventions of [`CallingConvention`]
//! - [`CompiledCodeTable`]: the dense per-module table of entries, absent
//!   meaning "interpret"
//! - the transition shim on [`ExecutionContext`], which adapts the uniform
//!   stack ABI to the selected native convention
//! - [`CodeGenerator`], the seam behind which code generation lives, and
//!   [`interpreter_trampoline`], the fixed callback native code uses to call
//!   back into a function that may itself be interpreted
//!
//! In register mode the shim pops exactly `nargs` cells, first-pushed
//! argument first, and passes them positionally. The baseline contract
//! supports arities 0 through [`MAX_REGISTER_ARGS`]; beyond that the
//! transition fails with `ArityUnsupported`.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use nona_core::{Value, VmError, VmResult};

use crate::config::CallingConvention;
use crate::context::ExecutionContext;
use crate::module::Module;

/// Largest arity the register calling convention supports.
pub const MAX_REGISTER_ARGS: u32 = 7;

/// Stack-convention entry: invoked with the arguments still on the operand
/// stack, returns the single result with the machine left in the
/// interpreter's post-return state.
pub type StackEntry = Arc<dyn Fn(&mut ExecutionContext, usize) -> VmResult<Value>>;

/// The entry point of generated native code for one function.
#[derive(Clone)]
pub enum NativeEntry {
    Stack(StackEntry),
    Register(RegisterEntry),
}

/// Register-convention entries, one signature per supported arity.
#[derive(Clone)]
#[allow(clippy::type_complexity)]
pub enum RegisterEntry {
    Args0(Arc<dyn Fn(&mut ExecutionContext) -> VmResult<Value>>),
    Args1(Arc<dyn Fn(&mut ExecutionContext, Value) -> VmResult<Value>>),
    Args2(Arc<dyn Fn(&mut ExecutionContext, Value, Value) -> VmResult<Value>>),
    Args3(Arc<dyn Fn(&mut ExecutionContext, Value, Value, Value) -> VmResult<Value>>),
    Args4(Arc<dyn Fn(&mut ExecutionContext, Value, Value, Value, Value) -> VmResult<Value>>),
    Args5(Arc<dyn Fn(&mut ExecutionContext, Value, Value, Value, Value, Value) -> VmResult<Value>>),
    Args6(
        Arc<dyn Fn(&mut ExecutionContext, Value, Value, Value, Value, Value, Value) -> VmResult<Value>>,
    ),
    Args7(
        Arc<
            dyn Fn(
                &mut ExecutionContext,
                Value,
                Value,
                Value,
                Value,
                Value,
                Value,
                Value,
            ) -> VmResult<Value>,
        >,
    ),
}

impl RegisterEntry {
    /// The arity this entry was generated for.
    pub fn arity(&self) -> u32 {
        match self {
            Self::Args0(_) => 0,
            Self::Args1(_) => 1,
            Self::Args2(_) => 2,
            Self::Args3(_) => 3,
            Self::Args4(_) => 4,
            Self::Args5(_) => 5,
            Self::Args6(_) => 6,
            Self::Args7(_) => 7,
        }
    }
}

impl fmt::Debug for NativeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stack(_) => write!(f, "NativeEntry::Stack"),
            Self::Register(entry) => write!(f, "NativeEntry::Register(arity {})", entry.arity()),
        }
    }
}

// =============================================================================
// Compiled-Code Table
// =============================================================================

/// The module-scoped table of native entries, indexed by function index.
///
/// `None` means "interpret". Entries are installed before the first run and
/// never removed while the module is loaded.
pub struct CompiledCodeTable {
    entries: Vec<Option<NativeEntry>>,
}

impl CompiledCodeTable {
    /// A table sized to the module's function count, every entry absent.
    pub(crate) fn with_capacity(function_count: usize) -> Self {
        Self {
            entries: vec![None; function_count],
        }
    }

    /// Install the entry for a function.
    pub fn install(&mut self, index: usize, entry: NativeEntry) -> VmResult<()> {
        match self.entries.get_mut(index) {
            Some(slot) => {
                *slot = Some(entry);
                Ok(())
            }
            None => Err(VmError::internal(format!(
                "compiled-code index {index} out of range"
            ))),
        }
    }

    /// The entry for a function, if one has been installed.
    #[inline]
    pub fn entry(&self, index: usize) -> Option<&NativeEntry> {
        self.entries.get(index).and_then(|entry| entry.as_ref())
    }

    /// Whether a function has an installed entry.
    #[inline]
    pub fn is_compiled(&self, index: usize) -> bool {
        self.entry(index).is_some()
    }

    /// Number of installed entries.
    pub fn compiled_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }
}

// =============================================================================
// Code Generator Seam
// =============================================================================

/// The code generator the façade drives. The machine is oblivious to how
/// entries are produced; it stores them in the compiled-code table and
/// invokes them through the transition shim.
pub trait CodeGenerator {
    /// Start the generator. Failure aborts VM construction.
    fn initialize(&mut self) -> VmResult<()>;

    /// Tear down the generator. Called when the VM is dropped.
    fn shutdown(&mut self);

    /// Produce the native entry for the function at `index`, honoring the
    /// instance's calling convention.
    fn generate_code(
        &mut self,
        module: &Module,
        index: usize,
        convention: CallingConvention,
    ) -> VmResult<NativeEntry>;
}

/// Fixed callback through which native code calls a function that may itself
/// be interpreted. Re-enters the machine's normal dispatch.
pub fn interpreter_trampoline(ctx: &mut ExecutionContext, index: usize) -> VmResult<Value> {
    ctx.call_function(index)
}

// =============================================================================
// Transition Shim
// =============================================================================

impl ExecutionContext {
    /// Transition to a native entry.
    ///
    /// Stack convention: the entry takes over with the arguments in place.
    /// Register convention: pop `nargs` cells so the first-pushed argument
    /// becomes the first positional parameter, then dispatch per arity. The
    /// returned result is not pushed here; the caller's dispatch decides.
    pub(crate) fn call_native(
        &mut self,
        entry: NativeEntry,
        index: usize,
        nargs: u32,
    ) -> VmResult<Value> {
        if self.config().verbose {
            eprintln!("vm: transition to native code for function {index}");
        }
        match entry {
            NativeEntry::Stack(native) => native(self, index),
            NativeEntry::Register(native) => self.call_register_entry(native, nargs),
        }
    }

    fn call_register_entry(&mut self, entry: RegisterEntry, nargs: u32) -> VmResult<Value> {
        if nargs > MAX_REGISTER_ARGS {
            return Err(VmError::arity_unsupported(nargs));
        }
        if entry.arity() != nargs {
            return Err(VmError::internal(format!(
                "native entry arity {} does not match function arity {nargs}",
                entry.arity()
            )));
        }

        // Pop in reverse so the first-pushed argument lands first.
        let mut args: SmallVec<[Value; MAX_REGISTER_ARGS as usize]> =
            SmallVec::from_elem(Value::ZERO, nargs as usize);
        for slot in args.iter_mut().rev() {
            *slot = self.pop()?;
        }

        match entry {
            RegisterEntry::Args0(f) => f(self),
            RegisterEntry::Args1(f) => f(self, args[0]),
            RegisterEntry::Args2(f) => f(self, args[0], args[1]),
            RegisterEntry::Args3(f) => f(self, args[0], args[1], args[2]),
            RegisterEntry::Args4(f) => f(self, args[0], args[1], args[2], args[3]),
            RegisterEntry::Args5(f) => f(self, args[0], args[1], args[2], args[3], args[4]),
            RegisterEntry::Args6(f) => {
                f(self, args[0], args[1], args[2], args[3], args[4], args[5])
            }
            RegisterEntry::Args7(f) => f(
                self, args[0], args[1], args[2], args[3], args[4], args[5], args[6],
            ),
        }
    }
}
