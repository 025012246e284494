//! Read-only module view.
//!
//! A [`Module`] is the immutable snapshot the execution engine runs against:
//! function specifications, the primitive table and the interned string
//! pool, plus a name lookup for entry-point resolution. Parsing the on-disk
//! format is the loader's responsibility; hosts and tests assemble modules
//! through the `add_*` methods.

use nona_core::{Instruction, VmError, VmResult};
use rustc_hash::FxHashMap;

use crate::context::ExecutionContext;

/// A host primitive. Primitives manipulate the operand stack directly
/// through the execution context; the engine does not inspect their arity.
pub type PrimitiveFunction = fn(&mut ExecutionContext) -> VmResult<()>;

/// The read-only specification of one function.
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    /// Function name, used for entry-point resolution and diagnostics.
    pub name: String,
    /// Number of arguments the caller pushes.
    pub nargs: u32,
    /// Number of local-variable slots reserved on entry.
    pub nregs: u32,
    /// Instruction array, terminated by the end-of-section sentinel.
    pub instructions: Vec<Instruction>,
}

impl FunctionSpec {
    /// Create a function specification.
    ///
    /// The instruction array must be terminated by the end-of-section
    /// sentinel; the loader guarantees this for modules read from disk.
    pub fn new(
        name: impl Into<String>,
        nargs: u32,
        nregs: u32,
        instructions: Vec<Instruction>,
    ) -> Self {
        debug_assert!(
            instructions.last().is_some_and(|i| i.is_end_section()),
            "instruction array must end with the end-of-section sentinel"
        );
        Self {
            name: name.into(),
            nargs,
            nregs,
            instructions,
        }
    }
}

/// An immutable module: functions, primitives, strings and a name index.
#[derive(Default)]
pub struct Module {
    functions: Vec<FunctionSpec>,
    primitives: Vec<PrimitiveFunction>,
    strings: Vec<String>,
    names: FxHashMap<String, usize>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a function, returning its dense index.
    pub fn add_function(&mut self, spec: FunctionSpec) -> usize {
        let index = self.functions.len();
        self.names.insert(spec.name.clone(), index);
        self.functions.push(spec);
        index
    }

    /// Append a primitive, returning its table index.
    pub fn add_primitive(&mut self, primitive: PrimitiveFunction) -> usize {
        let index = self.primitives.len();
        self.primitives.push(primitive);
        index
    }

    /// Intern a string, returning its pool index.
    pub fn add_string(&mut self, string: impl Into<String>) -> u32 {
        let index = self.strings.len() as u32;
        self.strings.push(string.into());
        index
    }

    /// The function at `index`.
    pub fn function(&self, index: usize) -> VmResult<&FunctionSpec> {
        self.functions
            .get(index)
            .ok_or_else(|| VmError::internal(format!("function index {index} out of range")))
    }

    /// The primitive at `index`.
    pub fn primitive(&self, index: usize) -> VmResult<PrimitiveFunction> {
        self.primitives
            .get(index)
            .copied()
            .ok_or_else(|| VmError::internal(format!("primitive index {index} out of range")))
    }

    /// The pooled string at `index`.
    pub fn string(&self, index: usize) -> VmResult<&str> {
        self.strings
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| VmError::internal(format!("string index {index} out of range")))
    }

    /// Resolve a function name to its index.
    pub fn find_function(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// Number of functions in the module.
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("functions", &self.functions.len())
            .field("primitives", &self.primitives.len())
            .field("strings", &self.strings.len())
            .finish()
    }
}
