//! Type Checker Performance Benchmarks
//!
//! - Whole-program throughput, parallel and sequential
//! - Deep dependency chains (one level per function)
//! - Local let-generalization and handler masking
//! - Raw unification of large types

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vela_benchmarks::{call_chain, independent_functions, many_locals, nested_handlers};
use vela_types::{unify, CheckerConfig, Type, TypeChecker, TypeVar};

// ============================================================================
// Whole-program Benchmarks
// ============================================================================

fn bench_check_program(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_program");

    for &count in &[10, 100, 500] {
        let program = independent_functions(count);
        group.throughput(Throughput::Elements(count as u64));

        for (mode, config) in [
            ("parallel", CheckerConfig::default()),
            ("sequential", CheckerConfig::sequential()),
        ] {
            let checker = TypeChecker::new(config);
            group.bench_with_input(BenchmarkId::new(mode, count), &program, |b, program| {
                b.iter(|| black_box(checker.check_program(black_box(program))))
            });
        }
    }

    group.finish();
}

// ============================================================================
// Inference Stress Tests
// ============================================================================

fn bench_inference_stress(c: &mut Criterion) {
    let mut group = c.benchmark_group("inference_stress");
    let checker = TypeChecker::new(CheckerConfig::sequential());

    for &count in &[10, 50, 100] {
        let program = call_chain(count);
        group.bench_with_input(BenchmarkId::new("call_chain", count), &program, |b, program| {
            b.iter(|| black_box(checker.check_program(black_box(program))))
        });
    }

    for &count in &[10, 50, 100] {
        let program = many_locals(count);
        group.bench_with_input(BenchmarkId::new("local_lets", count), &program, |b, program| {
            b.iter(|| black_box(checker.check_program(black_box(program))))
        });
    }

    for &depth in &[1, 5, 10] {
        let program = nested_handlers(depth);
        group.bench_with_input(BenchmarkId::new("nested_handlers", depth), &program, |b, program| {
            b.iter(|| black_box(checker.check_program(black_box(program))))
        });
    }

    group.finish();
}

// ============================================================================
// Unification
// ============================================================================

/// `(v0, (v1, (v2, ...)))` against `(Int, (Int, (Int, ...)))`
fn nested_tuples(depth: u32) -> (Type, Type) {
    let mut open = Type::Unit;
    let mut ground = Type::Unit;
    for i in (0..depth).rev() {
        open = Type::Tuple(vec![Type::Var(TypeVar(i)), open]);
        ground = Type::Tuple(vec![Type::Int, ground]);
    }
    (open, ground)
}

fn bench_unify(c: &mut Criterion) {
    let mut group = c.benchmark_group("unify");

    for &depth in &[8, 32, 128] {
        let (open, ground) = nested_tuples(depth);
        group.bench_with_input(BenchmarkId::new("nested_tuples", depth), &(open, ground), |b, (open, ground)| {
            b.iter(|| black_box(unify(black_box(open), black_box(ground))))
        });
    }

    group.finish();
}

// ============================================================================
// Criterion Main
// ============================================================================

criterion_group!(benches, bench_check_program, bench_inference_stress, bench_unify);

criterion_main!(benches);
