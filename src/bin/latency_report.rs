//! End-to-end latency report: submit through the ring, measure percentiles.

use hdrhistogram::Histogram;
use pulse_lob::{Engine, EngineConfig, Order, OrderRequest, OrderType, Side};
use std::time::Instant;

const ITERATIONS: u64 = 1_000_000;
const BUFFER_SIZE: u64 = 10_000;

fn main() {
    tracing_subscriber::fmt::init();

    let config = EngineConfig::from_env().unwrap_or_default();
    println!(
        "Preparing latency report (pool = {}, core = {:?})...",
        config.max_orders, config.core_id
    );

    let engine = match Engine::with_config(config, None) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("engine construction failed: {e}");
            std::process::exit(1);
        }
    };

    let mut histogram = Histogram::<u64>::new_with_bounds(1, 100_000_000, 3).unwrap();

    // Pre-generate a cycle of non-crossing requests: bids 9_000..9_099,
    // asks 11_000..11_099. RNG and allocation stay out of the hot loop.
    let mut requests = Vec::with_capacity(BUFFER_SIZE as usize);
    for i in 0..BUFFER_SIZE {
        let (side, price) = if i % 2 == 0 {
            (Side::Buy, 9_000 + i % 100)
        } else {
            (Side::Sell, 11_000 + i % 100)
        };
        requests.push(OrderRequest::Add(Order::new(
            i + 1,
            1,
            OrderType::GoodTillCancel,
            price,
            10,
            side,
        )));
    }

    // Warm the branch predictor and the worker's caches, then cancel the
    // warm-up orders so the pool starts the measured run near-empty.
    println!("Warming up ({} ops)...", BUFFER_SIZE);
    for request in &requests {
        engine.submit(*request);
    }
    for i in 0..BUFFER_SIZE {
        engine.submit(OrderRequest::Cancel(i + 1));
    }

    println!("Running {} iterations...", ITERATIONS);
    let mut next_id = BUFFER_SIZE + 1;
    let run_start = Instant::now();

    for n in 0..ITERATIONS {
        let mut request = requests[(n % BUFFER_SIZE) as usize];
        if let OrderRequest::Add(ref mut order) = request {
            order.id = next_id;
            next_id += 1;
        }

        let start = Instant::now();
        engine.submit(request);
        histogram.record(start.elapsed().as_nanos() as u64).unwrap_or(());

        // Keep the pool bounded: retire each order once it is a full
        // buffer behind the head.
        if n >= BUFFER_SIZE {
            engine.submit(OrderRequest::Cancel(next_id - BUFFER_SIZE));
        }
    }

    let total = run_start.elapsed();

    println!("\n=== Submit Latency (ns) ===");
    println!("Total Ops:  {}", ITERATIONS);
    println!(
        "Throughput: {:.2} ops/sec",
        ITERATIONS as f64 / total.as_secs_f64()
    );
    println!("---------------------------");
    println!("Min:    {:6} ns", histogram.min());
    println!("P50:    {:6} ns", histogram.value_at_quantile(0.50));
    println!("P90:    {:6} ns", histogram.value_at_quantile(0.90));
    println!("P99:    {:6} ns", histogram.value_at_quantile(0.99));
    println!("P99.9:  {:6} ns", histogram.value_at_quantile(0.999));
    println!("Max:    {:6} ns", histogram.max());
    println!("---------------------------");
    println!(
        "Final book: size={} bid={} ask={} trades={}",
        engine.size(),
        engine.top_bid_price(),
        engine.top_ask_price(),
        engine.matched_trades()
    );
}
