//! Virtual machine configuration.
//!
//! A [`Config`] is resolved once by the host and immutable for the lifetime
//! of the VM instance; the execution engine reads it without any
//! per-operation cost.

use std::fmt;

/// Calling convention used when transitioning to native code.
///
/// Selected for the whole VM instance through [`Config::pass_param`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingConvention {
    /// Arguments remain on the operand stack; the native entry consumes them
    /// in place.
    Stack,
    /// The transition shim pops the arguments and passes them positionally.
    Register,
}

/// Complete runtime configuration for one VM instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    /// Run generated native code where available.
    pub jit: bool,
    /// Pass arguments positionally on native transitions (register mode)
    /// instead of leaving them on the operand stack.
    pub pass_param: bool,
    /// Enable debug tracing of code generation.
    pub debug: bool,
    /// Enable verbose tracing of runs, transitions and collections.
    pub verbose: bool,
}

impl Config {
    /// The native calling convention this configuration selects.
    #[inline]
    pub fn convention(&self) -> CallingConvention {
        if self.pass_param {
            CallingConvention::Register
        } else {
            CallingConvention::Stack
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "mode:      {}", if self.jit { "jit" } else { "interpreter" })?;
        writeln!(f, "passparam: {}", self.pass_param)?;
        writeln!(f, "debug:     {}", self.debug)?;
        write!(f, "verbose:   {}", self.verbose)
    }
}
