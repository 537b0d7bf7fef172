//! Engine facade - construction, submission, observation, shutdown.
//!
//! Wires the order pool, the request ring, and the worker thread together
//! behind a handle that many producer threads can share. Producers never
//! touch book state: every mutation flows through the ring to the single
//! worker.

use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::debug;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::matching::{BookStats, MatchingEngine};
use crate::order::{OrderRequest, Price, TradeListener};
use crate::ring::{Producer, RingBuffer};
use crate::worker;

/// A running matching engine.
///
/// Submissions are processed on a dedicated worker thread in per-producer
/// FIFO order. Dropping the engine enqueues a `Stop` sentinel and joins
/// the worker; producers must quiesce first, since pushes after `Stop`
/// stall forever.
pub struct Engine {
    producer: Producer<OrderRequest>,
    stats: Arc<BookStats>,
    worker: Option<JoinHandle<()>>,
}

impl Engine {
    /// Create an engine with the given pool capacity, no CPU pin and no
    /// trade listener.
    pub fn new(max_orders: usize) -> Result<Self, EngineError> {
        Self::with_config(EngineConfig::with_max_orders(max_orders), None)
    }

    /// Create an engine from a full configuration.
    ///
    /// `max_orders` must be positive; the ring is sized to the smallest
    /// power of two covering it. `on_trade` fires synchronously on the
    /// worker thread, once per fill, in match order.
    pub fn with_config(
        config: EngineConfig,
        on_trade: Option<TradeListener>,
    ) -> Result<Self, EngineError> {
        if config.max_orders == 0 || config.max_orders >= u32::MAX as usize {
            return Err(EngineError::InvalidPoolCapacity);
        }

        let engine = MatchingEngine::new(config.max_orders as u32, on_trade);
        let stats = engine.stats();
        let (producer, consumer) = RingBuffer::with_capacity(config.ring_capacity())?;

        let handle = worker::spawn(engine, consumer, config.core_id)?;

        debug!(
            max_orders = config.max_orders,
            ring_capacity = config.ring_capacity(),
            core_id = ?config.core_id,
            "engine started"
        );

        Ok(Self {
            producer,
            stats,
            worker: Some(handle),
        })
    }

    /// Submit a request. Non-blocking except for ring back-pressure.
    ///
    /// Callable from any number of producer threads; requests from one
    /// producer are processed in submission order.
    #[inline]
    pub fn submit(&self, request: OrderRequest) {
        self.producer.push(request);
    }

    // ========================================================================
    // Observability reads - callable from any thread, informational only;
    // they may lag concurrent submissions.
    // ========================================================================

    /// Current resting order count.
    #[inline]
    pub fn size(&self) -> usize {
        self.stats.size()
    }

    /// Best bid price, 0 if the bid book is empty.
    #[inline]
    pub fn top_bid_price(&self) -> Price {
        self.stats.top_bid_price()
    }

    /// Best ask price, 0 if the ask book is empty.
    #[inline]
    pub fn top_ask_price(&self) -> Price {
        self.stats.top_ask_price()
    }

    /// Monotonic count of fills since construction.
    #[inline]
    pub fn matched_trades(&self) -> u64 {
        self.stats.matched_trades()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.producer.push(OrderRequest::Stop);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Order, OrderId, OrderType, Quantity, Side, Trade};
    use std::time::{Duration, Instant};

    fn gtc(id: OrderId, side: Side, price: Price, qty: Quantity) -> OrderRequest {
        OrderRequest::Add(Order::new(id, 1, OrderType::GoodTillCancel, price, qty, side))
    }

    /// Poll an observability read until it reaches `target` or time out.
    fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        check()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            Engine::new(0),
            Err(EngineError::InvalidPoolCapacity)
        ));
    }

    #[test]
    fn test_submit_and_observe() {
        let engine = Engine::new(1024).unwrap();
        engine.submit(gtc(1, Side::Buy, 100, 10));
        engine.submit(gtc(2, Side::Sell, 105, 10));

        assert!(wait_until(Duration::from_secs(5), || engine.size() == 2));
        assert_eq!(engine.top_bid_price(), 100);
        assert_eq!(engine.top_ask_price(), 105);
        assert_eq!(engine.matched_trades(), 0);
    }

    #[test]
    fn test_cross_counts_trade() {
        let engine = Engine::new(1024).unwrap();
        engine.submit(gtc(1, Side::Sell, 100, 10));
        engine.submit(gtc(2, Side::Buy, 100, 10));

        assert!(wait_until(Duration::from_secs(5), || {
            engine.matched_trades() == 1
        }));
        assert!(wait_until(Duration::from_secs(5), || engine.size() == 0));
    }

    #[test]
    fn test_drop_joins_worker() {
        let engine = Engine::new(64).unwrap();
        engine.submit(gtc(1, Side::Buy, 100, 10));
        drop(engine); // must not hang
    }

    #[test]
    fn test_listener_fires_per_fill() {
        use std::sync::atomic::{AtomicU64, Ordering};

        let fills = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&fills);
        let listener: TradeListener = Box::new(move |t: Trade<'_>| {
            sink.fetch_add(t.qty, Ordering::Relaxed);
        });

        let engine =
            Engine::with_config(EngineConfig::with_max_orders(1024), Some(listener)).unwrap();
        engine.submit(gtc(1, Side::Sell, 100, 4));
        engine.submit(gtc(2, Side::Sell, 100, 6));
        engine.submit(gtc(3, Side::Buy, 100, 10));

        assert!(wait_until(Duration::from_secs(5), || {
            engine.matched_trades() == 2
        }));
        drop(engine);
        assert_eq!(fills.load(Ordering::Relaxed), 10);
    }
}
