//! Host primitives.
//!
//! A primitive manipulates the operand stack directly through the execution
//! context; the machine does not inspect its arity. Every primitive here
//! follows the host contract of popping its operands and pushing a sentinel
//! zero result, so the net stack effect of a primitive call site is
//! determined by the bytecode around it.

use std::io;

use nona_core::{Value, VmError, VmResult};

use crate::context::ExecutionContext;

/// Pop a pooled-string reference and print the string to the host output,
/// followed by a newline. Pushes the sentinel zero.
pub fn print_string(ctx: &mut ExecutionContext) -> VmResult<()> {
    let value = ctx.pop()?;
    let index = value
        .as_string()
        .ok_or_else(|| VmError::type_mismatch("print_string on a non-string value"))?;
    let text = ctx.module().string(index as usize)?.to_owned();
    writeln!(ctx.host_output(), "{text}").map_err(host_output_error)?;
    ctx.push(Value::ZERO)
}

/// Pop an integer and print it to the host output, followed by a newline.
/// Pushes the sentinel zero.
pub fn print_number(ctx: &mut ExecutionContext) -> VmResult<()> {
    let value = ctx.pop()?;
    let number = value
        .as_integer()
        .ok_or_else(|| VmError::type_mismatch("print_number on a non-integer value"))?;
    writeln!(ctx.host_output(), "{number}").map_err(host_output_error)?;
    ctx.push(Value::ZERO)
}

fn host_output_error(err: io::Error) -> VmError {
    VmError::internal(format!("host output error: {err}"))
}
