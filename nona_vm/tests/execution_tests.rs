//! End-to-end execution scenarios through the public façade.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use nona_vm::{
    Config, FunctionSpec, Instruction, Module, Opcode, Value, VirtualMachine, VmErrorKind,
};

fn push_const(v: i32) -> Instruction {
    Instruction::new(Opcode::IntPushConstant, v)
}

fn bare(op: Opcode) -> Instruction {
    Instruction::bare(op)
}

fn add_function() -> FunctionSpec {
    FunctionSpec::new(
        "add",
        2,
        0,
        vec![
            Instruction::new(Opcode::PushFromVar, 0),
            Instruction::new(Opcode::PushFromVar, 1),
            bare(Opcode::Add),
            bare(Opcode::FunctionReturn),
            Instruction::END_SECTION,
        ],
    )
}

/// Recursive factorial calling itself through the given index.
fn factorial_function(self_index: usize) -> FunctionSpec {
    FunctionSpec::new(
        "fact",
        1,
        0,
        vec![
            Instruction::new(Opcode::PushFromVar, 0),
            push_const(1),
            Instruction::new(Opcode::JmpGt, 2),
            push_const(1),
            bare(Opcode::FunctionReturn),
            Instruction::new(Opcode::PushFromVar, 0),
            Instruction::new(Opcode::PushFromVar, 0),
            push_const(1),
            bare(Opcode::Sub),
            Instruction::new(Opcode::FunctionCall, self_index as i32),
            bare(Opcode::Mul),
            bare(Opcode::FunctionReturn),
            Instruction::END_SECTION,
        ],
    )
}

fn abs_function() -> FunctionSpec {
    FunctionSpec::new(
        "abs",
        1,
        0,
        vec![
            Instruction::new(Opcode::PushFromVar, 0),
            push_const(0),
            Instruction::new(Opcode::JmpLt, 2),
            Instruction::new(Opcode::PushFromVar, 0),
            bare(Opcode::FunctionReturn),
            push_const(0),
            Instruction::new(Opcode::PushFromVar, 0),
            bare(Opcode::Sub),
            bare(Opcode::FunctionReturn),
            Instruction::END_SECTION,
        ],
    )
}

fn loaded_vm(module: Module) -> VirtualMachine {
    let mut vm = VirtualMachine::new(Config::default()).unwrap();
    vm.load(module).unwrap();
    vm
}

#[test]
fn test_s1_add() {
    let mut module = Module::new();
    module.add_function(add_function());
    let mut vm = loaded_vm(module);

    let result = vm
        .run_named("add", &[Value::integer(3), Value::integer(4)])
        .unwrap();
    assert_eq!(result, Value::integer(7));
}

#[test]
fn test_s2_factorial() {
    let mut module = Module::new();
    module.add_function(factorial_function(0));
    let mut vm = loaded_vm(module);

    assert_eq!(
        vm.run_named("fact", &[Value::integer(6)]).unwrap(),
        Value::integer(720)
    );
    assert_eq!(
        vm.run_named("fact", &[Value::integer(0)]).unwrap(),
        Value::integer(1)
    );
}

#[test]
fn test_s3_branch_abs() {
    let mut module = Module::new();
    module.add_function(abs_function());
    let mut vm = loaded_vm(module);

    assert_eq!(
        vm.run_named("abs", &[Value::integer(-5)]).unwrap(),
        Value::integer(5)
    );
    assert_eq!(
        vm.run_named("abs", &[Value::integer(7)]).unwrap(),
        Value::integer(7)
    );
}

// =============================================================================
// S4: Primitive Side Effect
// =============================================================================

struct Sink(Arc<Mutex<Vec<u8>>>);

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_s4_primitive_prints_and_leaves_sentinel() {
    let mut module = Module::new();
    let string_index = module.add_string("hello from bytecode");
    let primitive_index = module.add_primitive(nona_vm::primitives::print_string);
    module.add_function(FunctionSpec::new(
        "greet",
        0,
        0,
        vec![
            Instruction::new(Opcode::StrPushConstant, string_index as i32),
            Instruction::new(Opcode::PrimitiveCall, primitive_index as i32),
            bare(Opcode::FunctionReturn),
            Instruction::END_SECTION,
        ],
    ));

    let buffer = Arc::new(Mutex::new(Vec::new()));
    let mut vm = loaded_vm(module);
    vm.context_mut()
        .unwrap()
        .set_host_output(Box::new(Sink(Arc::clone(&buffer))));

    // The primitive pops its operand and pushes the sentinel zero, so the
    // function returns that sentinel.
    let result = vm.run_named("greet", &[]).unwrap();
    assert_eq!(result, Value::ZERO);
    assert_eq!(
        String::from_utf8(buffer.lock().clone()).unwrap(),
        "hello from bytecode\n"
    );
}

// =============================================================================
// S5: Object Round Trip
// =============================================================================

#[test]
fn test_s5_object_round_trip() {
    let mut module = Module::new();
    module.add_function(FunctionSpec::new(
        "round_trip",
        0,
        0,
        vec![
            bare(Opcode::NewObject),
            bare(Opcode::Duplicate),
            push_const(42),
            Instruction::new(Opcode::PopIntoObject, 1),
            Instruction::new(Opcode::PushFromObject, 1),
            bare(Opcode::FunctionReturn),
            Instruction::END_SECTION,
        ],
    ));
    let mut vm = loaded_vm(module);
    assert_eq!(vm.run_named("round_trip", &[]).unwrap(), Value::integer(42));
}

#[test]
fn test_s6_arity_mismatch() {
    let mut module = Module::new();
    module.add_function(add_function());
    let mut vm = loaded_vm(module);

    let err = vm.run_named("add", &[Value::integer(1)]).unwrap_err();
    assert_eq!(err.kind(), VmErrorKind::BadFunctionCall);
    let message = err.to_string();
    assert!(message.contains("expected 2"), "message: {message}");
    assert!(message.contains("got 1"), "message: {message}");
}

// =============================================================================
// Bounds and Recovery
// =============================================================================

#[test]
fn test_unbounded_pushing_overflows_the_stack() {
    // 0: push_constant 1
    // 1: jmp -2  -> 0
    let mut module = Module::new();
    module.add_function(FunctionSpec::new(
        "spin",
        0,
        0,
        vec![
            push_const(1),
            Instruction::new(Opcode::Jmp, -2),
            Instruction::END_SECTION,
        ],
    ));
    let mut vm = loaded_vm(module);

    let err = vm.run_named("spin", &[]).unwrap_err();
    assert_eq!(err.kind(), VmErrorKind::StackOverflow);
    // The failed run still reset the context.
    assert_eq!(vm.context().unwrap().stack().depth(), 0);
}

#[test]
fn test_errors_unwind_through_nested_calls() {
    // outer calls fact, fact divides by zero at the base case instead of
    // returning; the error surfaces from the outer run call.
    let mut module = Module::new();
    module.add_function(FunctionSpec::new(
        "divide",
        1,
        0,
        vec![
            Instruction::new(Opcode::PushFromVar, 0),
            push_const(0),
            bare(Opcode::Div),
            bare(Opcode::FunctionReturn),
            Instruction::END_SECTION,
        ],
    ));
    module.add_function(FunctionSpec::new(
        "outer",
        0,
        0,
        vec![
            push_const(9),
            Instruction::new(Opcode::FunctionCall, 0),
            bare(Opcode::FunctionReturn),
            Instruction::END_SECTION,
        ],
    ));
    let mut vm = loaded_vm(module);

    let err = vm.run_named("outer", &[]).unwrap_err();
    assert_eq!(err.kind(), VmErrorKind::DivideByZero);
}

#[test]
fn test_successive_runs_are_independent() {
    let mut module = Module::new();
    module.add_function(factorial_function(0));
    let mut vm = loaded_vm(module);

    for (input, expected) in [(1, 1), (5, 120), (6, 720), (3, 6)] {
        assert_eq!(
            vm.run_named("fact", &[Value::integer(input)]).unwrap(),
            Value::integer(expected)
        );
    }
}
