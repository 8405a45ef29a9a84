//! Benchmarks for verdict-storage using criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use verdict_core::schema::{Table, TableBuilder};
use verdict_core::{DataType, Value};
use verdict_storage::{CompareOp, Condition, Engine, TableHandle};

fn reading_schema() -> Table {
    TableBuilder::new("reading")
        .unwrap()
        .add_column("sensor", DataType::Integer, 0)
        .unwrap()
        .add_column("zone", DataType::Varchar, 8)
        .unwrap()
        .add_column("level", DataType::Integer, 0)
        .unwrap()
        .add_index("reading_sensor", &["sensor"], true)
        .add_index("reading_zone", &["zone"], false)
        .build()
        .unwrap()
}

fn populate(engine: &mut Engine, count: i32) -> TableHandle {
    let zones = ["front", "rear", "left", "right"];
    let table = engine.create_table(reading_schema()).unwrap();
    let rows = (0..count)
        .map(|i| vec![Value::Integer(i), zones[i as usize % zones.len()].into(), Value::Integer(i % 100)])
        .collect();
    engine.insert_many(table, None, rows).unwrap();
    table
}

fn insert_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_insert");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut engine = Engine::new();
                black_box(populate(&mut engine, size))
            });
        });
    }

    group.finish();
}

fn select_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_select");

    for size in [1000, 10000].iter() {
        let mut engine = Engine::new();
        let table = populate(&mut engine, *size);

        group.bench_with_input(BenchmarkId::new("index_eq", size), size, |b, &size| {
            let cond = Condition::eq("sensor", size / 2);
            b.iter(|| black_box(engine.select(table, &cond, None, 8192, 0).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("scan_range", size), size, |b, _| {
            let cond = Condition::compare("level", CompareOp::Lt, 10);
            b.iter(|| black_box(engine.count(table, &cond).unwrap()));
        });
    }

    group.finish();
}

fn rollback_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_rollback");

    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut engine = Engine::new();
            let table = populate(&mut engine, size);
            b.iter(|| {
                let tx = engine.begin().unwrap();
                engine
                    .update(table, &Condition::eq("zone", "front"), &[("level", Value::Integer(0))])
                    .unwrap();
                engine.rollback(tx).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, insert_benchmark, select_benchmark, rollback_benchmark);
criterion_main!(benches);
