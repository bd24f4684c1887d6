// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use guest_bridge::guest::GuestVariant;
use guest_bridge::math::Vector3;
use guest_bridge::ops::{ArrayOp, Syscall, VariantOperator};
use guest_bridge::{Kind, TaggedValue, Variant};
use guest_bridge_conformance::{HEAP_AT, TestSandbox, sandbox, text_arg, trap};

/// Entry point for `guest_bridge` dispatch benchmarks.
///
/// Each scenario drives one operation through the trap path the way a guest would, so the
/// numbers include argument reads, lifting, the access check and the result write.
fn bench_dispatch(c: &mut Criterion) {
    bench_lift_lower(c);
    bench_eval(c);
    bench_array_reads(c);
    bench_array_build(c);
    bench_string_create(c);
}

fn int(value: i64) -> GuestVariant {
    GuestVariant::int(value)
}

fn filled_array(sandbox: &mut TestSandbox, len: i64) -> GuestVariant {
    let array = trap(sandbox, Syscall::ArrayOps, ArrayOp::Create.code(), &[]).unwrap();
    for i in 0..len {
        trap(
            sandbox,
            Syscall::ArrayOps,
            ArrayOp::PushBack.code(),
            &[array, int(i)],
        )
        .unwrap();
    }
    array
}

fn bench_lift_lower(c: &mut Criterion) {
    let mut group = c.benchmark_group("lift_lower");
    let mut sandbox = sandbox();
    let root = sandbox.host().root();
    let object = sandbox.expose_object(root).unwrap();
    let text = sandbox.expose_value(Variant::from("payload")).unwrap();

    let cases = [
        ("int", TaggedValue::Int(42)),
        ("vector3", TaggedValue::Vector3(Vector3::new(1.0, 2.0, 3.0))),
        ("object", TaggedValue::Object(object)),
        ("string", text),
    ];
    for (name, value) in cases {
        group.bench_function(BenchmarkId::new("round_trip", name), |b| {
            b.iter(|| {
                let raw = GuestVariant::lower(black_box(value));
                black_box(raw.lift(sandbox.registry()).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_eval(c: &mut Criterion) {
    let mut sandbox = sandbox();
    let add = int(i64::from(VariantOperator::Add.code()));
    c.bench_function("veval/int_add", |b| {
        b.iter(|| {
            let args = [add, int(2), black_box(int(3))];
            black_box(trap(&mut sandbox, Syscall::VEval, 0, &args).unwrap())
        });
    });
}

fn bench_array_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_at");
    for len in [16_i64, 1024] {
        let mut sandbox = sandbox();
        let array = filled_array(&mut sandbox, len);
        group.bench_function(BenchmarkId::from_parameter(len), |b| {
            let mut i = 0;
            b.iter(|| {
                i = (i + 7) % len;
                black_box(trap(&mut sandbox, Syscall::ArrayAt, 0, &[array, int(i)]).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_array_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_build");
    for len in [16_i64, 256] {
        group.bench_function(BenchmarkId::from_parameter(len), |b| {
            b.iter_batched_ref(
                sandbox,
                |sandbox| black_box(filled_array(sandbox, len)),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_string_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("string_create");
    for len in [8_usize, 512] {
        let text = "x".repeat(len);
        group.bench_function(BenchmarkId::from_parameter(len), |b| {
            b.iter_batched_ref(
                || {
                    let mut sandbox = sandbox();
                    let args = text_arg(&mut sandbox, HEAP_AT, &text).unwrap();
                    (sandbox, args)
                },
                |(sandbox, args)| {
                    black_box(trap(sandbox, Syscall::StringCreate, 0, &args[..]).unwrap())
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_vcreate(c: &mut Criterion) {
    let mut sandbox = sandbox();
    let kind = int(i64::from(Kind::Dictionary.wire()));
    c.bench_function("vcreate_then_free/dictionary", |b| {
        b.iter(|| {
            let made = trap(&mut sandbox, Syscall::VCreate, 0, &[kind]).unwrap();
            trap(&mut sandbox, Syscall::VFree, 0, &[made]).unwrap();
        });
    });
}

criterion_group!(benches, bench_dispatch, bench_vcreate);
criterion_main!(benches);
