//! Extended benchmark suite.
//!
//! Covers the paths the basic latency suite leaves out:
//! - matching across multiple price levels
//! - sweeping through tombstone backlogs
//! - end-to-end throughput over the request ring

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pulse_lob::{
    Engine, MatchingEngine, Order, OrderId, OrderRequest, OrderType, Price, Quantity, Side,
};

fn gtc(id: OrderId, side: Side, price: Price, qty: Quantity) -> OrderRequest {
    OrderRequest::Add(Order::new(id, 1, OrderType::GoodTillCancel, price, qty, side))
}

/// Benchmark: one aggressor consuming one maker per level across N levels.
fn bench_multi_level_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_level_match");

    for levels in [1u64, 5, 10, 20] {
        group.bench_with_input(BenchmarkId::from_parameter(levels), &levels, |b, &levels| {
            let mut eng = MatchingEngine::new(1_000_000, None);
            eng.warm_up();

            for i in 0..levels {
                let _ = eng.process(gtc(i, Side::Sell, 10_000 + i * 10, 10));
            }

            let mut id = 1_000u64;

            b.iter(|| {
                id += levels + 1;
                let result = eng.process(gtc(
                    id,
                    Side::Buy,
                    10_000 + (levels - 1) * 10,
                    levels * 10,
                ));

                // Replenish one maker per consumed level.
                for i in 0..levels {
                    let _ = eng.process(gtc(id + 1 + i, Side::Sell, 10_000 + i * 10, 10));
                }

                black_box(result)
            })
        });
    }

    group.finish();
}

/// Benchmark: aggressor sweeping a level where half the queue is
/// tombstoned, measuring the lazy-reclamation path.
fn bench_tombstone_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("tombstone_sweep");
    group.sample_size(20);

    for queue_len in [100u64, 1_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(queue_len),
            &queue_len,
            |b, &queue_len| {
                b.iter_with_setup(
                    || {
                        let mut eng = MatchingEngine::new(1_000_000, None);
                        eng.warm_up();
                        for i in 0..queue_len {
                            let _ = eng.process(gtc(i, Side::Sell, 10_000, 10));
                        }
                        // Tombstone every second record behind the front.
                        for i in (1..queue_len).step_by(2) {
                            let _ = eng.process(OrderRequest::Cancel(i));
                        }
                        eng
                    },
                    |mut eng| {
                        black_box(eng.process(gtc(
                            queue_len,
                            Side::Buy,
                            10_000,
                            queue_len * 10,
                        )))
                    },
                )
            },
        );
    }

    group.finish();
}

/// Benchmark: end-to-end submission throughput over the ring, worker
/// running on its own thread.
fn bench_ring_throughput(c: &mut Criterion) {
    const BATCH: u64 = 1_000;

    let mut group = c.benchmark_group("ring_throughput");
    group.throughput(Throughput::Elements(BATCH));

    group.bench_function("submit_1000", |b| {
        let engine = Engine::new(1 << 20).unwrap();
        let mut id = 0u64;

        b.iter(|| {
            for _ in 0..BATCH {
                id += 1;
                let side = if id % 2 == 0 { Side::Buy } else { Side::Sell };
                // Crossing bands: the books keep churning instead of growing.
                engine.submit(gtc(id, side, 10_000, 10));
            }
            black_box(engine.matched_trades())
        });
        // Dropping the engine enqueues Stop behind the submissions, so the
        // worker drains everything before joining.
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_multi_level_match,
    bench_tombstone_sweep,
    bench_ring_throughput,
);

criterion_main!(benches);
