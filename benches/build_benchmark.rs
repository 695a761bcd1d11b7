use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use gobuild::{BasicKind, BinaryOp, CodeBuilder, Config, Pos};
use std::hint::black_box as bb;

fn fresh() -> CodeBuilder {
    CodeBuilder::new("bench/pkg", "pkg", Config::default())
}

/// package pkg; func f() int { return 1 + 2 }
fn build_small(cb: &mut CodeBuilder) {
    let int = cb.type_store().basic(BasicKind::Int);
    let r = cb.new_param(Pos::NONE, "", int);
    let f = cb.new_func(None, "f", vec![], vec![r], false).unwrap();
    cb.body_start(f)
        .val(1)
        .val(2)
        .binary_op(BinaryOp::Add)
        .return_(1)
        .end();
}

/// A function with declarations, a counted loop, and a conditional.
fn build_medium(cb: &mut CodeBuilder) {
    let int = cb.type_store().basic(BasicKind::Int);
    let r = cb.new_param(Pos::NONE, "", int);
    let f = cb.new_func(None, "sum", vec![], vec![r], false).unwrap();
    cb.body_start(f);
    cb.new_var(int, &["acc"]);
    let acc = cb.lookup("acc").unwrap();
    cb.for_();
    cb.define_var_start(Pos::NONE, &["i"]).val(0).end_init(1);
    let i = cb.lookup("i").unwrap();
    cb.val(i).val(100).binary_op(BinaryOp::Lt).then();
    cb.if_();
    cb.val(i).val(1).binary_op(BinaryOp::And).val(0).binary_op(BinaryOp::Eq).then();
    cb.var_ref(Some(acc)).val(i).assign_op(gobuild::AssignOp::AddAssign);
    cb.end();
    cb.post();
    cb.var_ref(Some(i)).inc_dec(gobuild::IncDecOp::Inc);
    cb.end();
    cb.val(acc).return_(1);
    cb.end();
}

fn bench_builders(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.throughput(Throughput::Elements(1));

    group.bench_function("small_func", |b| {
        b.iter_batched(
            fresh,
            |mut cb| {
                build_small(&mut cb);
                bb(cb.file_decls(false))
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("medium_func", |b| {
        b.iter_batched(
            fresh,
            |mut cb| {
                build_medium(&mut cb);
                bb(cb.file_decls(false))
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("constant_folding_chain", |b| {
        b.iter_batched(
            fresh,
            |mut cb| {
                cb.val(0);
                for i in 0..256 {
                    cb.val(i).binary_op(BinaryOp::Add);
                }
                bb(cb.get(-1).cval.clone())
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_builders);
criterion_main!(benches);
