//! Matching engine - serial processor of order requests.
//!
//! Exactly one thread (the worker) drives [`MatchingEngine::process`], so
//! the books, the pool, and the order index need no locking. The only
//! state visible to other threads is the [`BookStats`] snapshot, published
//! through relaxed atomics after every request.
//!
//! The match loop implements strict price-time priority: drain the front
//! of the best opposite level, then the next, until the aggressor is
//! filled or prices no longer cross. Cancelled records are tombstoned in
//! place and reclaimed when the loop reaches them.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::book::HalfBook;
use crate::error::EngineError;
use crate::order::{Order, OrderId, OrderRequest, OrderType, Price, Quantity, Side, Trade, TradeListener};
use crate::pool::{OrderHandle, OrderPool};

/// Outcome of processing one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Keep consuming requests.
    Continue,
    /// A `Stop` sentinel was processed; the worker loop should exit.
    Stop,
}

/// Book state snapshot shared with reader threads.
///
/// All fields are relaxed atomics: reads are informational and may lag
/// concurrent submissions, never tear.
#[derive(Debug, Default)]
pub struct BookStats {
    size: AtomicUsize,
    top_bid: AtomicU64,
    top_ask: AtomicU64,
    matched_trades: AtomicU64,
}

impl BookStats {
    /// Current resting order count.
    #[inline]
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Best bid price, 0 if the bid book is empty.
    #[inline]
    pub fn top_bid_price(&self) -> Price {
        self.top_bid.load(Ordering::Relaxed)
    }

    /// Best ask price, 0 if the ask book is empty.
    #[inline]
    pub fn top_ask_price(&self) -> Price {
        self.top_ask.load(Ordering::Relaxed)
    }

    /// Monotonic count of fills since construction.
    #[inline]
    pub fn matched_trades(&self) -> u64 {
        self.matched_trades.load(Ordering::Relaxed)
    }
}

/// The matching engine core.
pub struct MatchingEngine {
    pool: OrderPool,
    bids: HalfBook,
    asks: HalfBook,
    /// Resting orders only: an id is present iff its record is valid and
    /// queued in one of the half-books.
    index: FxHashMap<OrderId, OrderHandle>,
    listener: Option<TradeListener>,
    stats: Arc<BookStats>,
    resting: usize,
}

impl MatchingEngine {
    /// Create an engine backed by a pool of `max_orders` records.
    pub fn new(max_orders: u32, listener: Option<TradeListener>) -> Self {
        Self {
            pool: OrderPool::new(max_orders),
            bids: HalfBook::new(Side::Buy),
            asks: HalfBook::new(Side::Sell),
            index: FxHashMap::with_capacity_and_hasher(max_orders as usize, Default::default()),
            listener,
            stats: Arc::new(BookStats::default()),
            resting: 0,
        }
    }

    /// Shared handle to the observable state snapshot.
    pub fn stats(&self) -> Arc<BookStats> {
        Arc::clone(&self.stats)
    }

    /// Process one request and publish the stats snapshot.
    pub fn process(&mut self, request: OrderRequest) -> Result<Step, EngineError> {
        let result = match request {
            OrderRequest::Add(order) => self.add_order(order),
            OrderRequest::Cancel(id) => {
                self.cancel_order(id);
                Ok(())
            }
            OrderRequest::Modify(order) => self.modify_order(order),
            OrderRequest::Stop => {
                self.publish_stats();
                return Ok(Step::Stop);
            }
        };
        self.publish_stats();
        result.map(|()| Step::Continue)
    }

    /// Add algorithm: acquire a record, run the match loop, rest or
    /// release the residual.
    fn add_order(&mut self, order: Order) -> Result<(), EngineError> {
        // Zero quantity would rest forever un-matchable; duplicate ids are
        // silently dropped with no state change.
        if order.remaining_qty == 0 || self.index.contains_key(&order.id) {
            trace!(id = order.id, "add dropped");
            return Ok(());
        }

        let Some(handle) = self.pool.acquire(order) else {
            return Err(EngineError::PoolExhausted(self.pool.capacity()));
        };

        self.match_incoming(handle);

        let record = self.pool.get(handle);
        let rests = !record.is_filled()
            && record.kind == OrderType::GoodTillCancel
            && record.price > 0;

        if rests {
            let (id, price, qty, side) =
                (record.id, record.price, record.remaining_qty, record.side);
            self.book_mut(side).push_back(price, handle, qty);
            self.index.insert(id, handle);
            self.resting += 1;
        } else {
            // Fully filled, FAK residual, or an unrestable zero price.
            self.pool.release(handle);
        }
        Ok(())
    }

    /// Match loop: the aggressor record walks the opposite book.
    fn match_incoming(&mut self, aggressor: OrderHandle) {
        let side = self.pool.get(aggressor).side;

        loop {
            if self.pool.get(aggressor).is_filled() {
                break;
            }

            let opposite = self.book(side.opposite());
            let Some((best_price, level)) = opposite.best() else {
                break;
            };
            let Some(&front) = level.queue.front() else {
                debug_assert!(false, "empty level queue should have been erased");
                break;
            };

            // Lazy reclamation of cancelled records.
            if !self.pool.get(front).valid {
                self.book_mut(side.opposite()).drop_front(best_price);
                self.pool.release(front);
                continue;
            }

            let agg_price = self.pool.get(aggressor).price;
            let crosses = match side {
                Side::Buy => agg_price >= best_price,
                Side::Sell => agg_price <= best_price,
            };
            if !crosses {
                break;
            }

            let fill = self
                .pool
                .get(aggressor)
                .remaining_qty
                .min(self.pool.get(front).remaining_qty);

            self.pool.get_mut(aggressor).fill(fill);
            self.pool.get_mut(front).fill(fill);
            self.book_mut(side.opposite()).reduce(best_price, fill);

            // Listener fires before any structural mutation could move the
            // records it borrows.
            let (bid, ask) = match side {
                Side::Buy => (aggressor, front),
                Side::Sell => (front, aggressor),
            };
            self.emit_trade(bid, ask, fill);

            if self.pool.get(front).is_filled() {
                let maker_id = self.pool.get(front).id;
                self.index.remove(&maker_id);
                self.book_mut(side.opposite()).drop_front(best_price);
                self.pool.release(front);
                self.resting -= 1;
            }
        }
    }

    fn emit_trade(&mut self, bid: OrderHandle, ask: OrderHandle, qty: Quantity) {
        self.stats.matched_trades.fetch_add(1, Ordering::Relaxed);
        if let Some(listener) = self.listener.as_mut() {
            listener(Trade {
                bid: self.pool.get(bid),
                ask: self.pool.get(ask),
                qty,
            });
        }
    }

    /// Cancel algorithm: O(1) on the index; physical removal is deferred
    /// unless the record is cheaply discoverable.
    fn cancel_order(&mut self, id: OrderId) {
        // Unknown id: no-op.
        let Some(handle) = self.index.remove(&id) else {
            trace!(id, "cancel of unknown id");
            return;
        };

        let (price, side, remaining) = {
            let record = self.pool.get(handle);
            (record.price, record.side, record.remaining_qty)
        };

        self.pool.get_mut(handle).cancel();
        self.resting -= 1;

        let book = self.book_mut(side);
        book.reduce(price, remaining);

        if book.level_total(price) == 0 {
            // Only tombstones left at this level: drain it instead of
            // leaving a dead price level behind.
            while let Some(husk) = self.book_mut(side).drop_front(price) {
                self.pool.release(husk);
            }
        } else if self.book(side).front(price) == Some(handle) {
            // Front of queue is cheap to unlink; deeper records stay as
            // tombstones for the match loop.
            self.book_mut(side).drop_front(price);
            self.pool.release(handle);
        }
    }

    /// Modify algorithm: cancel-then-add, preserving the original order
    /// type. A Modify whose cancel finds nothing is a no-op.
    fn modify_order(&mut self, order: Order) -> Result<(), EngineError> {
        let Some(&handle) = self.index.get(&order.id) else {
            return Ok(());
        };
        let original_kind = self.pool.get(handle).kind;

        self.cancel_order(order.id);
        self.add_order(Order::new(
            order.id,
            order.owner,
            original_kind,
            order.price,
            order.initial_qty,
            order.side,
        ))
    }

    fn publish_stats(&self) {
        self.stats.size.store(self.resting, Ordering::Relaxed);
        self.stats
            .top_bid
            .store(self.bids.best_price().unwrap_or(0), Ordering::Relaxed);
        self.stats
            .top_ask
            .store(self.asks.best_price().unwrap_or(0), Ordering::Relaxed);
    }

    #[inline]
    fn book(&self, side: Side) -> &HalfBook {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    #[inline]
    fn book_mut(&mut self, side: Side) -> &mut HalfBook {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    // ========================================================================
    // Synchronous observers (worker thread / single-threaded tests)
    // ========================================================================

    /// Current resting order count.
    #[inline]
    pub fn size(&self) -> usize {
        self.resting
    }

    /// Best bid price.
    #[inline]
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    /// Best ask price.
    #[inline]
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    /// Total valid quantity resting at `price` on `side`.
    #[inline]
    pub fn level_total(&self, side: Side, price: Price) -> Quantity {
        self.book(side).level_total(price)
    }

    /// Number of fills so far.
    #[inline]
    pub fn matched_trades(&self) -> u64 {
        self.stats.matched_trades()
    }

    /// The backing pool (usage inspection).
    #[inline]
    pub fn pool(&self) -> &OrderPool {
        &self.pool
    }

    /// Pre-fault the pool's pages.
    pub fn warm_up(&mut self) {
        self.pool.warm_up();
    }

    /// Walk both books and cross-check the structural invariants:
    /// level totals, index membership, resting count, and pool accounting.
    /// O(book size); meant for tests and debug sweeps, not the hot path.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut valid_count = 0usize;
        let mut queued_count = 0u32;

        for book in [&self.bids, &self.asks] {
            for (price, level) in book.iter() {
                if level.queue.is_empty() {
                    return Err(format!("empty level retained at {price}"));
                }
                let mut valid_total = 0;
                for &handle in &level.queue {
                    queued_count += 1;
                    let record = self.pool.get(handle);
                    if record.price != price {
                        return Err(format!(
                            "record {} queued at {price} but priced {}",
                            record.id, record.price
                        ));
                    }
                    if record.side != book.side() {
                        return Err(format!(
                            "record {} queued on the wrong side",
                            record.id
                        ));
                    }
                    if record.valid {
                        valid_count += 1;
                        valid_total += record.remaining_qty;
                        if record.remaining_qty == 0 {
                            return Err(format!("valid record {} with zero remainder", record.id));
                        }
                        if self.index.get(&record.id) != Some(&handle) {
                            return Err(format!("valid record {} missing from index", record.id));
                        }
                    } else if self.index.get(&record.id) == Some(&handle) {
                        // The id may legitimately be live again under a new
                        // record (cancel-then-re-add); only this husk must
                        // not be the one indexed.
                        return Err(format!("tombstone {} still indexed", record.id));
                    }
                }
                if valid_total != level.total {
                    return Err(format!(
                        "level {price}: total {} != sum of valid remainders {valid_total}",
                        level.total
                    ));
                }
            }
        }

        if valid_count != self.resting {
            return Err(format!(
                "resting count {} != valid queued records {valid_count}",
                self.resting
            ));
        }
        if self.index.len() != valid_count {
            return Err(format!(
                "index size {} != valid queued records {valid_count}",
                self.index.len()
            ));
        }
        if queued_count != self.pool.in_use() {
            return Err(format!(
                "pool in_use {} != queued records {queued_count}",
                self.pool.in_use()
            ));
        }
        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            if bid > ask {
                return Err(format!("book crossed at rest: bid {bid} > ask {ask}"));
            }
        }
        Ok(())
    }

    /// Hash of the observable state, for determinism checks.
    pub fn state_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.best_bid().hash(&mut hasher);
        self.best_ask().hash(&mut hasher);
        self.resting.hash(&mut hasher);
        self.pool.in_use().hash(&mut hasher);
        self.matched_trades().hash(&mut hasher);
        hasher.finish()
    }
}
