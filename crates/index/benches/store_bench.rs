//! Benchmarks for verdict-index using criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use verdict_core::{DataType, Value};
use verdict_index::{Cursor, KeyOps, KeyedStore, Order, OrderedStore, Store};

fn keyed_insert_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_insert");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut store = KeyedStore::with_capacity(16, KeyOps::for_type(DataType::Integer));
                for i in 0..size {
                    store.add(Value::Integer(i), i).unwrap();
                }
                black_box(store)
            });
        });
    }

    group.finish();
}

fn keyed_get_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_get");

    for size in [100, 1000, 10000].iter() {
        let mut store = KeyedStore::with_capacity(*size as usize, KeyOps::for_type(DataType::Integer));
        for i in 0..*size {
            store.add(Value::Integer(i), i).unwrap();
        }

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                for i in (0..100).map(|x| x * size / 100) {
                    black_box(store.get(&Value::Integer(i)));
                }
            });
        });
    }

    group.finish();
}

fn keyed_iterate_benchmark(c: &mut Criterion) {
    let mut store = KeyedStore::with_capacity(10000, KeyOps::natural());
    for i in 0..10000u32 {
        store.add(i, i).unwrap();
    }

    c.bench_function("keyed_iterate_10000", |b| {
        b.iter(|| {
            let mut cursor = Cursor::new();
            let mut sum = 0u64;
            while let Ok(Some((_, v))) = store.iterate(&mut cursor) {
                sum += u64::from(*v);
            }
            black_box(sum)
        });
    });
}

fn ordered_insert_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("ordered_insert");

    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut store = OrderedStore::new(Order::Key, KeyOps::composite());
                for i in (0..size).rev() {
                    store.add(vec![Value::Integer(i % 10), Value::Integer(i)], i).unwrap();
                }
                black_box(store)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    keyed_insert_benchmark,
    keyed_get_benchmark,
    keyed_iterate_benchmark,
    ordered_insert_benchmark
);
criterion_main!(benches);
