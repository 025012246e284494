//! Interpreter hot-loop benchmarks.
//!
//! Run with `cargo bench -p nona_vm`.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use nona_vm::{Config, FunctionSpec, Instruction, Module, Opcode, Value, VirtualMachine};

fn push_const(v: i32) -> Instruction {
    Instruction::new(Opcode::IntPushConstant, v)
}

fn bare(op: Opcode) -> Instruction {
    Instruction::bare(op)
}

fn bench_module() -> Module {
    let mut module = Module::new();

    // fact(n), recursive.
    module.add_function(FunctionSpec::new(
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
            Instruction::new(Opcode::FunctionCall, 0),
            bare(Opcode::Mul),
            bare(Opcode::FunctionReturn),
            Instruction::END_SECTION,
        ],
    ));

    // sum_to(n): acc = 0; while n != 0 { acc += n; n -= 1 }; acc
    //
    //   0: push_from_var 0
    //   1: push_constant 0
    //   2: jmp_eq +9        -> 12
    //   3: push_from_var 1
    //   4: push_from_var 0
    //   5: add
    //   6: pop_into_var 1
    //   7: push_from_var 0
    //   8: push_constant 1
    //   9: sub
    //  10: pop_into_var 0
    //  11: jmp -12          -> 0
    //  12: push_from_var 1
    //  13: function_return
    module.add_function(FunctionSpec::new(
        "sum_to",
        1,
        1,
        vec![
            Instruction::new(Opcode::PushFromVar, 0),
            push_const(0),
            Instruction::new(Opcode::JmpEq, 9),
            Instruction::new(Opcode::PushFromVar, 1),
            Instruction::new(Opcode::PushFromVar, 0),
            bare(Opcode::Add),
            Instruction::new(Opcode::PopIntoVar, 1),
            Instruction::new(Opcode::PushFromVar, 0),
            push_const(1),
            bare(Opcode::Sub),
            Instruction::new(Opcode::PopIntoVar, 0),
            Instruction::new(Opcode::Jmp, -12),
            Instruction::new(Opcode::PushFromVar, 1),
            bare(Opcode::FunctionReturn),
            Instruction::END_SECTION,
        ],
    ));

    module
}

fn bench_factorial(c: &mut Criterion) {
    let mut vm = VirtualMachine::new(Config::default()).unwrap();
    vm.load(bench_module()).unwrap();

    c.bench_function("interpret/fact_12", |b| {
        b.iter(|| {
            vm.run_named("fact", &[Value::integer(black_box(12))])
                .unwrap()
        })
    });
}

fn bench_counting_loop(c: &mut Criterion) {
    let mut vm = VirtualMachine::new(Config::default()).unwrap();
    vm.load(bench_module()).unwrap();

    c.bench_function("interpret/sum_to_1000", |b| {
        b.iter(|| {
            vm.run_named("sum_to", &[Value::integer(black_box(1000))])
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_factorial, bench_counting_loop);
criterion_main!(benches);
