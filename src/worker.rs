//! Worker - the dedicated engine thread.
//!
//! Exactly one worker mutates engine state: it drains the request ring,
//! dispatches on the request tag, and exits when the `Stop` sentinel is
//! consumed. There is no timed wait; shutdown is cooperative through the
//! sentinel the engine destructor enqueues.

use std::io;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use crate::matching::{MatchingEngine, Step};
use crate::order::OrderRequest;
use crate::ring::Consumer;

/// Thread name of the engine worker.
pub const WORKER_THREAD_NAME: &str = "lob-worker";

/// Spawn the worker thread.
///
/// The worker optionally pins itself to `core_id`, pre-faults the pool
/// pages, then loops `pop -> process` until `Stop`. A fatal engine error
/// (pool exhaustion) terminates the loop; requests still in flight after
/// that point are never processed.
pub fn spawn(
    mut engine: MatchingEngine,
    mut consumer: Consumer<OrderRequest>,
    core_id: Option<usize>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(WORKER_THREAD_NAME.into())
        .spawn(move || {
            if let Some(id) = core_id {
                pin_to_core(id);
            }
            engine.warm_up();
            debug!(ring_capacity = consumer.capacity(), "worker ready");

            loop {
                let request = consumer.pop();
                match engine.process(request) {
                    Ok(Step::Continue) => {}
                    Ok(Step::Stop) => {
                        info!("worker stopping");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "fatal engine error, worker exiting");
                        break;
                    }
                }
            }
        })
}

fn pin_to_core(id: usize) {
    let pinned = core_affinity::get_core_ids()
        .and_then(|cores| cores.into_iter().find(|core| core.id == id))
        .map(core_affinity::set_for_current)
        .unwrap_or(false);

    if pinned {
        debug!(core = id, "worker pinned");
    } else {
        error!(core = id, "failed to pin worker thread");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Order, OrderType, Side};
    use crate::ring::RingBuffer;

    #[test]
    fn test_worker_processes_and_stops() {
        let engine = MatchingEngine::new(1024, None);
        let stats = engine.stats();
        let (producer, consumer) = RingBuffer::with_capacity(1024).unwrap();

        let handle = spawn(engine, consumer, None).unwrap();

        producer.push(OrderRequest::Add(Order::new(
            1,
            1,
            OrderType::GoodTillCancel,
            100,
            10,
            Side::Sell,
        )));
        producer.push(OrderRequest::Add(Order::new(
            2,
            2,
            OrderType::GoodTillCancel,
            100,
            10,
            Side::Buy,
        )));
        producer.push(OrderRequest::Stop);

        handle.join().unwrap();
        assert_eq!(stats.matched_trades(), 1);
        assert_eq!(stats.size(), 0);
    }

    #[test]
    fn test_worker_exits_on_pool_exhaustion() {
        let engine = MatchingEngine::new(1, None);
        let (producer, consumer) = RingBuffer::with_capacity(8).unwrap();
        let handle = spawn(engine, consumer, None).unwrap();

        producer.push(OrderRequest::Add(Order::new(
            1,
            1,
            OrderType::GoodTillCancel,
            100,
            10,
            Side::Buy,
        )));
        producer.push(OrderRequest::Add(Order::new(
            2,
            1,
            OrderType::GoodTillCancel,
            99,
            10,
            Side::Buy,
        )));

        // The second add exhausts the pool; the worker terminates without
        // needing a Stop.
        handle.join().unwrap();
    }
}
