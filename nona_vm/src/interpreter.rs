//! The bytecode interpreter loop.
//!
//! [`ExecutionContext::interpret`] runs one function body: it lays out the
//! activation frame on the operand stack, then decodes and dispatches packed
//! instruction words until a return unwinds the frame.
//!
//! Frame layout, low addresses first: the `nargs` cells the caller pushed,
//! then `nregs` zero-initialized locals, then the working operand area.
//! There is no frame header; the frame base is the entry cursor minus
//! `nargs`, and a return is a single cursor restore to that base.
//!
//! Jump immediates are measured in instruction words and applied before the
//! post-dispatch increment: a jump with delta `d` taken at index `i` retires
//! index `i + d + 1` next. A delta of zero falls through.
//!
//! Control flow inside the loop never uses unwinding; every semantic failure
//! is an explicit [`VmError`] propagated out of the loop.

use nona_core::{Opcode, Value, VmError, VmResult};
use nona_runtime::SlotId;

use crate::context::ExecutionContext;
use crate::module::FunctionSpec;

impl ExecutionContext {
    /// Interpret the function at `index`, bypassing the compiled-code table.
    ///
    /// The caller must already have pushed `nargs` arguments. Native entries
    /// produced by the baseline code generator re-enter the machine through
    /// here.
    pub fn interpret(&mut self, index: usize) -> VmResult<Value> {
        let module = self.module_handle();
        let function = module.function(index)?;

        // The frame base; everything from here up belongs to the callee.
        let args_base = self
            .stack()
            .depth()
            .checked_sub(function.nargs as usize)
            .ok_or_else(VmError::stack_underflow)?;
        self.stack_mut().reserve(function.nregs as usize)?;

        let instructions = &function.instructions;
        // Signed so that a backward jump can pass through -1 before the
        // post-dispatch increment brings it back in range.
        let mut ip: i64 = 0;

        loop {
            let instruction = usize::try_from(ip)
                .ok()
                .and_then(|i| instructions.get(i))
                .copied()
                .ok_or_else(|| {
                    VmError::internal(format!(
                        "instruction pointer {ip} out of range in '{}'",
                        function.name
                    ))
                })?;
            let opcode = instruction
                .opcode()
                .ok_or_else(|| VmError::invalid_opcode(instruction.opcode_byte()))?;

            match opcode {
                Opcode::EndSection => {
                    return Err(VmError::fell_off_function(&function.name));
                }

                Opcode::FunctionCall => {
                    let target = parameter_index(instruction.parameter(), "function_call")?;
                    let result = self.call_function(target)?;
                    self.push(result)?;
                }

                Opcode::FunctionReturn => {
                    let result = self.pop()?;
                    self.stack_mut().restore(args_base);
                    return Ok(result);
                }

                Opcode::PrimitiveCall => {
                    let target = parameter_index(instruction.parameter(), "primitive_call")?;
                    self.call_primitive(target)?;
                }

                Opcode::Duplicate => {
                    let top = self.peek()?;
                    self.push(top)?;
                }

                Opcode::Drop => {
                    self.pop()?;
                }

                Opcode::PushFromVar => {
                    let slot = frame_slot(args_base, instruction.parameter(), function)?;
                    let value = self
                        .stack()
                        .get(slot)
                        .ok_or_else(|| VmError::internal("variable slot above the cursor"))?;
                    self.push(value)?;
                }

                Opcode::PopIntoVar => {
                    let slot = frame_slot(args_base, instruction.parameter(), function)?;
                    let value = self.pop()?;
                    if !self.stack_mut().set(slot, value) {
                        return Err(VmError::internal("variable slot above the cursor"));
                    }
                }

                Opcode::Add => self.binary_integer_op("add", i32::wrapping_add)?,
                Opcode::Sub => self.binary_integer_op("sub", i32::wrapping_sub)?,
                Opcode::Mul => self.binary_integer_op("mul", i32::wrapping_mul)?,

                Opcode::Div => {
                    let (left, right) = self.pop_integer_pair("div")?;
                    if right == 0 {
                        return Err(VmError::divide_by_zero());
                    }
                    self.push(Value::integer(left.wrapping_div(right)))?;
                }

                Opcode::IntPushConstant => {
                    self.push(Value::integer(instruction.parameter()))?;
                }

                Opcode::Not => {
                    let operand = self.pop_integer("not")?;
                    self.push(Value::integer(if operand == 0 { 1 } else { 0 }))?;
                }

                Opcode::Jmp => {
                    ip += i64::from(instruction.parameter());
                }

                Opcode::JmpEq => {
                    let (left, right) = self.pop_integer_pair("jmp_eq")?;
                    if left == right {
                        ip += i64::from(instruction.parameter());
                    }
                }
                Opcode::JmpNeq => {
                    let (left, right) = self.pop_integer_pair("jmp_neq")?;
                    if left != right {
                        ip += i64::from(instruction.parameter());
                    }
                }
                Opcode::JmpGt => {
                    let (left, right) = self.pop_integer_pair("jmp_gt")?;
                    if left > right {
                        ip += i64::from(instruction.parameter());
                    }
                }
                Opcode::JmpGe => {
                    let (left, right) = self.pop_integer_pair("jmp_ge")?;
                    if left >= right {
                        ip += i64::from(instruction.parameter());
                    }
                }
                Opcode::JmpLt => {
                    let (left, right) = self.pop_integer_pair("jmp_lt")?;
                    if left < right {
                        ip += i64::from(instruction.parameter());
                    }
                }
                Opcode::JmpLe => {
                    let (left, right) = self.pop_integer_pair("jmp_le")?;
                    if left <= right {
                        ip += i64::from(instruction.parameter());
                    }
                }

                Opcode::StrPushConstant => {
                    let index = parameter_index(instruction.parameter(), "str_push_constant")?;
                    // Validate against the pool before publishing the reference.
                    self.module().string(index)?;
                    self.push(Value::string(index as u32))?;
                }

                Opcode::NewObject => {
                    let handle = self.allocate_object();
                    self.push(Value::object(handle))?;
                }

                Opcode::PushFromObject => {
                    let slot = SlotId(instruction.parameter() as u32);
                    let receiver = self.pop()?;
                    let object = receiver.as_object().ok_or_else(|| {
                        VmError::type_mismatch("push_from_object on a non-object value")
                    })?;
                    let descriptor = self
                        .heap()
                        .lookup(object, slot)?
                        .ok_or_else(|| VmError::missing_slot(slot.raw()))?;
                    let value = self.heap().get_slot(object, descriptor)?;
                    self.push(value)?;
                }

                Opcode::PopIntoObject => {
                    let slot = SlotId(instruction.parameter() as u32);
                    let value = self.pop()?;
                    let receiver = self.pop()?;
                    let object = receiver.as_object().ok_or_else(|| {
                        VmError::type_mismatch("pop_into_object on a non-object receiver")
                    })?;
                    let descriptor = match self.heap().lookup(object, slot)? {
                        Some(descriptor) => descriptor,
                        None => self.heap_mut().transition(object, slot)?,
                    };
                    self.heap_mut().set_slot(object, descriptor, value)?;
                }

                Opcode::CallIndirect => {
                    return Err(VmError::internal("call_indirect is reserved"));
                }

                Opcode::SystemCollect => {
                    self.collect_garbage();
                }
            }

            self.retire_instruction();
            ip += 1;
        }
    }

    fn pop_integer(&mut self, op: &str) -> VmResult<i32> {
        self.pop()?
            .as_integer()
            .ok_or_else(|| VmError::type_mismatch(format!("{op} on a non-integer value")))
    }

    /// Pop the right operand, then the left. `( left right -- )`
    fn pop_integer_pair(&mut self, op: &str) -> VmResult<(i32, i32)> {
        let right = self.pop_integer(op)?;
        let left = self.pop_integer(op)?;
        Ok((left, right))
    }

    fn binary_integer_op(&mut self, op: &str, apply: fn(i32, i32) -> i32) -> VmResult<()> {
        let (left, right) = self.pop_integer_pair(op)?;
        self.push(Value::integer(apply(left, right)))
    }
}

/// Convert a non-negative instruction parameter into an index.
fn parameter_index(parameter: i32, what: &str) -> VmResult<usize> {
    usize::try_from(parameter)
        .map_err(|_| VmError::internal(format!("negative {what} index {parameter}")))
}

/// Resolve a variable slot to an absolute stack depth, bounds-checked
/// against the frame's `nargs + nregs` addressable slots.
fn frame_slot(args_base: usize, parameter: i32, function: &FunctionSpec) -> VmResult<usize> {
    let slot = u32::try_from(parameter)
        .ok()
        .filter(|&k| k < function.nargs + function.nregs)
        .ok_or_else(|| {
            VmError::internal(format!(
                "variable slot {parameter} out of range in '{}'",
                function.name
            ))
        })?;
    Ok(args_base + slot as usize)
}
