//! Throughput of the three translation stages on synthetic programs.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use jack::{compiler, hack, vm};

/// A Jack class with `n` small methods exercising every statement kind.
fn synthetic_class(n: usize) -> String {
    let mut out = String::from("class Bench { field int acc;\n");
    for i in 0..n {
        out.push_str(&format!(
            "method int step{i}(int x) {{\n\
             var int i, sum;\n\
             let sum = 0; let i = 0;\n\
             while (i < x) {{\n\
                 if (i > 2) {{ let sum = sum + (i * 2); }}\n\
                 else {{ let sum = sum - acc; }}\n\
                 let i = i + 1;\n\
             }}\n\
             do Output.printInt(sum);\n\
             return sum;\n\
             }}\n"
        ));
    }
    out.push('}');
    out
}

fn bench_jack_compiler(c: &mut Criterion) {
    let small = synthetic_class(4);
    let large = synthetic_class(32);

    let mut group = c.benchmark_group("jack_compile");
    group.bench_function("4_methods", |b| {
        b.iter(|| compiler::compile_source(black_box(&small), 0).unwrap())
    });
    group.bench_function("32_methods", |b| {
        b.iter(|| compiler::compile_source(black_box(&large), 0).unwrap())
    });
    group.finish();
}

fn bench_vm_translator(c: &mut Criterion) {
    let vm_code = compiler::compile_source(&synthetic_class(16), 0).unwrap();

    c.bench_function("vm_translate_16_methods", |b| {
        b.iter(|| vm::translate_sources(black_box(&[("Bench", vm_code.as_str())]), true).unwrap())
    });
}

fn bench_assembler(c: &mut Criterion) {
    let vm_code = compiler::compile_source(&synthetic_class(16), 0).unwrap();
    let asm = vm::translate_sources(&[("Bench", vm_code.as_str())], true).unwrap();

    c.bench_function("assemble_16_methods", |b| {
        b.iter(|| hack::assemble(black_box(&asm), 0).unwrap())
    });
}

criterion_group!(
    benches,
    bench_jack_compiler,
    bench_vm_translator,
    bench_assembler
);
criterion_main!(benches);
