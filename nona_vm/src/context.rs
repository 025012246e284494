//! The execution context.
//!
//! An [`ExecutionContext`] owns everything one thread of execution needs:
//! the operand stack, the heap, the program counter, the module view and the
//! compiled-code table. The module is immutable after load and the compiled
//! table is only populated before the first run, so the context can read
//! both without coordination. Contexts are never shared between threads.
//!
//! [`ExecutionContext::call_function`] is the single entry for invoking a
//! function: it consults the compiled-code table and either transitions to
//! the native entry or enters the interpreter.

use std::io::{self, Write};
use std::sync::Arc;

use nona_core::{Value, VmResult};
use nona_runtime::Heap;

use crate::config::Config;
use crate::jit::CompiledCodeTable;
use crate::module::Module;
use crate::stack::OperandStack;

/// One thread of execution against a loaded module.
pub struct ExecutionContext {
    stack: OperandStack,
    heap: Heap,
    /// Instructions retired since the last reset. Diagnostics only.
    program_counter: u64,
    module: Arc<Module>,
    compiled: CompiledCodeTable,
    config: Config,
    /// Sink for host primitives that produce output.
    output: Box<dyn Write>,
}

impl ExecutionContext {
    /// Create a context for a loaded module. The compiled-code table is
    /// reserved to the module's function count, every entry absent.
    pub(crate) fn new(module: Arc<Module>, config: Config) -> Self {
        let function_count = module.function_count();
        Self {
            stack: OperandStack::new(),
            heap: Heap::new(),
            program_counter: 0,
            module,
            compiled: CompiledCodeTable::with_capacity(function_count),
            config,
            output: Box::new(io::stdout()),
        }
    }

    // =========================================================================
    // Stack Access
    // =========================================================================

    /// Push a value onto the operand stack.
    #[inline]
    pub fn push(&mut self, value: Value) -> VmResult<()> {
        self.stack.push(value)
    }

    /// Pop the top value off the operand stack.
    #[inline]
    pub fn pop(&mut self) -> VmResult<Value> {
        self.stack.pop()
    }

    /// Read the top value without popping.
    #[inline]
    pub fn peek(&self) -> VmResult<Value> {
        self.stack.peek()
    }

    /// The operand stack, read-only.
    #[inline]
    pub fn stack(&self) -> &OperandStack {
        &self.stack
    }

    #[inline]
    pub(crate) fn stack_mut(&mut self) -> &mut OperandStack {
        &mut self.stack
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Call the function at `index` with its arguments already on the stack.
    ///
    /// Consults the compiled-code table first: a present entry transitions
    /// to native code through the shim, an absent one interprets. Returns
    /// the function's single result; the caller decides whether to push it.
    pub fn call_function(&mut self, index: usize) -> VmResult<Value> {
        match self.compiled.entry(index).cloned() {
            Some(entry) => {
                let nargs = self.module.function(index)?.nargs;
                self.call_native(entry, index, nargs)
            }
            None => self.interpret(index),
        }
    }

    /// Invoke the primitive at `index`. The primitive reads and writes the
    /// operand stack directly.
    pub fn call_primitive(&mut self, index: usize) -> VmResult<()> {
        let primitive = self.module.primitive(index)?;
        primitive(self)
    }

    // =========================================================================
    // Machine State
    // =========================================================================

    /// Empty the operand stack and zero the program counter.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.program_counter = 0;
    }

    /// Instructions retired since the last reset.
    #[inline]
    pub fn program_counter(&self) -> u64 {
        self.program_counter
    }

    #[inline]
    pub(crate) fn retire_instruction(&mut self) {
        self.program_counter += 1;
    }

    /// The loaded module view.
    #[inline]
    pub fn module(&self) -> &Module {
        &self.module
    }

    #[inline]
    pub(crate) fn module_handle(&self) -> Arc<Module> {
        Arc::clone(&self.module)
    }

    /// The instance configuration.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The managed heap.
    #[inline]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    #[inline]
    pub(crate) fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Allocate a fresh empty object. Allocation is a safe point: the
    /// collector may run first, with the live stack prefix as roots.
    pub fn allocate_object(&mut self) -> nona_core::ObjectRef {
        self.heap.allocate(self.stack.live())
    }

    /// Force a full collection with the live stack prefix as roots.
    pub fn collect_garbage(&mut self) {
        if self.config.verbose {
            eprintln!("vm: system collect, {} live objects", self.heap.live_count());
        }
        self.heap.collect(self.stack.live());
    }

    /// The compiled-code table.
    #[inline]
    pub fn compiled(&self) -> &CompiledCodeTable {
        &self.compiled
    }

    #[inline]
    pub(crate) fn compiled_mut(&mut self) -> &mut CompiledCodeTable {
        &mut self.compiled
    }

    // =========================================================================
    // Host Output
    // =========================================================================

    /// The sink host primitives write to. Defaults to stdout.
    #[inline]
    pub fn host_output(&mut self) -> &mut dyn Write {
        &mut *self.output
    }

    /// Replace the host output sink. Tests use this to capture primitive
    /// side effects.
    pub fn set_host_output(&mut self, output: Box<dyn Write>) {
        self.output = output;
    }
}
