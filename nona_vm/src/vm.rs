//! The virtual machine façade.
//!
//! A [`VirtualMachine`] binds a configuration, an optional code generator
//! and, once loaded, a module and its execution context. The lifecycle is
//! strict: construct, `load` exactly once, optionally `generate_all_code`,
//! then any number of `run` calls. Reloading is not supported; running
//! before loading is a usage error.

use std::sync::Arc;

use nona_core::{Value, VmError, VmResult};

use crate::config::Config;
use crate::context::ExecutionContext;
use crate::jit::CodeGenerator;
use crate::module::Module;

/// One virtual machine instance. Owned by a single thread for its lifetime.
pub struct VirtualMachine {
    config: Config,
    generator: Option<Box<dyn CodeGenerator>>,
    context: Option<ExecutionContext>,
}

impl std::fmt::Debug for VirtualMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualMachine")
            .field("config", &self.config)
            .field("has_generator", &self.generator.is_some())
            .field("loaded", &self.context.is_some())
            .finish()
    }
}

impl VirtualMachine {
    /// Create an interpreter-only instance.
    ///
    /// Fails if the configuration enables the JIT: running generated code
    /// requires a code generator, supplied through
    /// [`VirtualMachine::with_code_generator`].
    pub fn new(config: Config) -> VmResult<Self> {
        if config.jit {
            return Err(VmError::jit_init_failed(
                "jit enabled but no code generator supplied",
            ));
        }
        Ok(Self {
            config,
            generator: None,
            context: None,
        })
    }

    /// Create an instance backed by a code generator.
    ///
    /// The generator is initialized here; if it refuses to start the
    /// construction fails with `JitInitFailed`.
    pub fn with_code_generator(
        config: Config,
        mut generator: Box<dyn CodeGenerator>,
    ) -> VmResult<Self> {
        generator.initialize()?;
        Ok(Self {
            config,
            generator: Some(generator),
            context: None,
        })
    }

    /// Install a module. May only be called once per instance.
    pub fn load(&mut self, module: Module) -> VmResult<()> {
        if self.context.is_some() {
            return Err(VmError::internal("a module is already loaded"));
        }
        self.context = Some(ExecutionContext::new(Arc::new(module), self.config));
        Ok(())
    }

    /// Generate and install native code for the function at `index`.
    pub fn generate_code(&mut self, index: usize) -> VmResult<()> {
        let generator = self
            .generator
            .as_mut()
            .ok_or_else(|| VmError::internal("no code generator configured"))?;
        let context = self
            .context
            .as_mut()
            .ok_or_else(|| VmError::internal("generate_code called before load"))?;

        let module = context.module_handle();
        if self.config.debug {
            eprintln!("vm: generating code for '{}'", module.function(index)?.name);
        }
        let entry = generator.generate_code(&module, index, self.config.convention())?;
        context.compiled_mut().install(index, entry)
    }

    /// Ask the code generator for every function in the module and install
    /// the resulting entries in the compiled-code table.
    pub fn generate_all_code(&mut self) -> VmResult<()> {
        let count = self
            .context
            .as_ref()
            .ok_or_else(|| VmError::internal("generate_all_code called before load"))?
            .module()
            .function_count();
        for index in 0..count {
            self.generate_code(index)?;
        }
        Ok(())
    }

    /// Resolve `name` and run that function. See [`VirtualMachine::run`].
    pub fn run_named(&mut self, name: &str, args: &[Value]) -> VmResult<Value> {
        let context = self
            .context
            .as_ref()
            .ok_or_else(|| VmError::internal("run called before load"))?;
        let index = context
            .module()
            .find_function(name)
            .ok_or_else(|| VmError::bad_function_call(format!("no function named '{name}'")))?;
        self.run(index, args)
    }

    /// Run the function at `index` with `args`, returning its single result.
    ///
    /// Arguments are pushed in order, so `args[0]` lands at the lowest
    /// address of the callee's frame. The context is reset on exit whether
    /// the run succeeded or failed.
    pub fn run(&mut self, index: usize, args: &[Value]) -> VmResult<Value> {
        let context = self
            .context
            .as_mut()
            .ok_or_else(|| VmError::internal("run called before load"))?;

        let module = context.module_handle();
        let function = module.function(index)?;
        if function.nargs as usize != args.len() {
            return Err(VmError::bad_function_call(format!(
                "{}: expected {} arguments, got {}",
                function.name,
                function.nargs,
                args.len()
            )));
        }
        if self.config.verbose {
            eprintln!(
                "vm: running '{}' with {} arguments",
                function.name,
                args.len()
            );
        }

        let outcome = (|| {
            for &arg in args {
                context.push(arg)?;
            }
            context.call_function(index)
        })();
        context.reset();
        outcome
    }

    /// The execution context, once a module is loaded.
    pub fn context(&self) -> Option<&ExecutionContext> {
        self.context.as_ref()
    }

    /// Mutable access to the execution context, once a module is loaded.
    pub fn context_mut(&mut self) -> Option<&mut ExecutionContext> {
        self.context.as_mut()
    }

    /// The instance configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether a module has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.context.is_some()
    }
}

impl Drop for VirtualMachine {
    fn drop(&mut self) {
        if let Some(generator) = self.generator.as_mut() {
            generator.shutdown();
        }
    }
}
