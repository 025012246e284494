//! Baseline code generator for the Nona virtual machine.
//!
//! The [`ThunkCompiler`] is the simplest generator that exercises the whole
//! native-transition path: for every function it emits an entry that
//! re-enters the interpreter for that function's body. The entries are real
//! [`NativeEntry`] values in either calling convention, so the façade, the
//! compiled-code table and the transition shim all run exactly as they
//! would with a machine-code backend, and results are identical to pure
//! interpretation by construction.
//!
//! In register mode the emitted entry receives its arguments positionally,
//! pushes them back in order to rebuild the callee's frame, and interprets.
//! Register arities beyond the shim's supported maximum cannot be emitted;
//! generating such a function fails up front rather than at the first call.

use std::sync::Arc;

use nona_core::{VmError, VmResult};
use nona_vm::{
    CallingConvention, CodeGenerator, Module, NativeEntry, RegisterEntry, MAX_REGISTER_ARGS,
};

/// A code generator that emits interpreter-reentry thunks.
pub struct ThunkCompiler {
    initialized: bool,
    /// Entries emitted since initialization.
    generated: u64,
}

impl ThunkCompiler {
    pub fn new() -> Self {
        Self {
            initialized: false,
            generated: 0,
        }
    }

    /// Number of entries emitted since initialization.
    pub fn generated(&self) -> u64 {
        self.generated
    }
}

impl Default for ThunkCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGenerator for ThunkCompiler {
    fn initialize(&mut self) -> VmResult<()> {
        self.initialized = true;
        self.generated = 0;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.initialized = false;
    }

    fn generate_code(
        &mut self,
        module: &Module,
        index: usize,
        convention: CallingConvention,
    ) -> VmResult<NativeEntry> {
        if !self.initialized {
            return Err(VmError::internal("code generator used before initialize"));
        }
        let function = module.function(index)?;

        let entry = match convention {
            // The arguments are already on the stack; the interpreter lays
            // out the frame from them as usual.
            CallingConvention::Stack => {
                NativeEntry::Stack(Arc::new(|ctx, index| ctx.interpret(index)))
            }

            // Rebuild the frame from the positional arguments, then
            // interpret. Pushing in order restores the stack layout the
            // caller produced.
            CallingConvention::Register => {
                if function.nargs > MAX_REGISTER_ARGS {
                    return Err(VmError::arity_unsupported(function.nargs));
                }
                NativeEntry::Register(match function.nargs {
                    0 => RegisterEntry::Args0(Arc::new(move |ctx| ctx.interpret(index))),
                    1 => RegisterEntry::Args1(Arc::new(move |ctx, a1| {
                        ctx.push(a1)?;
                        ctx.interpret(index)
                    })),
                    2 => RegisterEntry::Args2(Arc::new(move |ctx, a1, a2| {
                        ctx.push(a1)?;
                        ctx.push(a2)?;
                        ctx.interpret(index)
                    })),
                    3 => RegisterEntry::Args3(Arc::new(move |ctx, a1, a2, a3| {
                        ctx.push(a1)?;
                        ctx.push(a2)?;
                        ctx.push(a3)?;
                        ctx.interpret(index)
                    })),
                    4 => RegisterEntry::Args4(Arc::new(move |ctx, a1, a2, a3, a4| {
                        ctx.push(a1)?;
                        ctx.push(a2)?;
                        ctx.push(a3)?;
                        ctx.push(a4)?;
                        ctx.interpret(index)
                    })),
                    5 => RegisterEntry::Args5(Arc::new(move |ctx, a1, a2, a3, a4, a5| {
                        ctx.push(a1)?;
                        ctx.push(a2)?;
                        ctx.push(a3)?;
                        ctx.push(a4)?;
                        ctx.push(a5)?;
                        ctx.interpret(index)
                    })),
                    6 => RegisterEntry::Args6(Arc::new(move |ctx, a1, a2, a3, a4, a5, a6| {
                        ctx.push(a1)?;
                        ctx.push(a2)?;
                        ctx.push(a3)?;
                        ctx.push(a4)?;
                        ctx.push(a5)?;
                        ctx.push(a6)?;
                        ctx.interpret(index)
                    })),
                    _ => RegisterEntry::Args7(Arc::new(move |ctx, a1, a2, a3, a4, a5, a6, a7| {
                        ctx.push(a1)?;
                        ctx.push(a2)?;
                        ctx.push(a3)?;
                        ctx.push(a4)?;
                        ctx.push(a5)?;
                        ctx.push(a6)?;
                        ctx.push(a7)?;
                        ctx.interpret(index)
                    })),
                })
            }
        };

        self.generated += 1;
        Ok(entry)
    }
}
