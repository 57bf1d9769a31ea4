// QueryHeap benchmarks - insert/delete-min throughput across index backings.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mlcrp::{Cost, EdgeDistance, EdgeDuration, EdgeWeight, HeapBacking, NodeID, QueryHeap};

fn cost(w: i64) -> Cost {
    Cost {
        weight: EdgeWeight::new(w).unwrap(),
        duration: EdgeDuration::ZERO,
        distance: EdgeDistance::ZERO,
    }
}

fn bench_insert_then_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_heap_insert_then_drain");

    for size in [100usize, 1_000, 10_000].iter() {
        for backing in [
            HeapBacking::Array,
            HeapBacking::UnorderedMap,
            HeapBacking::Map,
            HeapBacking::TwoLevel,
            HeapBacking::Generation,
        ] {
            let label = format!("{size}/{backing:?}");
            group.bench_with_input(BenchmarkId::from_parameter(label), size, |b, &size| {
                let keys: Vec<i64> = (0..size as i64).rev().collect();
                b.iter(|| {
                    let mut heap: QueryHeap<()> = QueryHeap::new(size, backing);
                    for (i, &w) in keys.iter().enumerate() {
                        heap.insert(NodeID::new(i as u32).unwrap(), cost(w), ());
                    }
                    while let Some(entry) = heap.delete_min() {
                        black_box(entry);
                    }
                });
            });
        }
    }

    group.finish();
}

fn bench_decrease_key_heavy(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_heap_decrease_key_heavy");

    for size in [1_000usize, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut heap: QueryHeap<()> = QueryHeap::new(size, HeapBacking::Array);
                for i in 0..size as u32 {
                    heap.insert(NodeID::new(i).unwrap(), cost(1_000_000), ());
                }
                // Every node gets progressively cheaper keys, forcing a
                // sift-up on each decrease_key call -- the customizer's
                // actual access pattern during edge relaxation.
                for round in (0..1000i64).rev() {
                    for i in 0..size as u32 {
                        heap.decrease_key(NodeID::new(i).unwrap(), cost(round), ());
                    }
                }
                black_box(heap.min())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert_then_drain, bench_decrease_key_heavy);
criterion_main!(benches);
