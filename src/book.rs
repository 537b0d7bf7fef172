//! Half-book - one price-sorted side of the order book.
//!
//! Each price level holds a FIFO queue of order handles in arrival order
//! plus the running total of remaining quantity across the *valid* records
//! at that price. Price-time priority then collapses to "drain the front
//! of the best level, then the next, until no longer crossable".
//!
//! Tombstoned records may linger in a queue until the match loop pops
//! them, so a queue can be temporarily longer than the level total
//! suggests; the total itself is always current.

use std::collections::{BTreeMap, VecDeque};

use crate::order::{Price, Quantity, Side};
use crate::pool::OrderHandle;

/// All resting orders at a single price on one side.
#[derive(Debug, Default)]
pub struct Level {
    /// Handles in arrival (priority) order. May contain tombstones.
    pub queue: VecDeque<OrderHandle>,
    /// Sum of remaining quantity over the valid records at this price.
    pub total: Quantity,
}

/// One side of the book: bids sort best (highest) first, asks sort best
/// (lowest) first. Empty levels are never retained.
pub struct HalfBook {
    side: Side,
    levels: BTreeMap<Price, Level>,
}

impl HalfBook {
    /// Create an empty half-book for the given side.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    /// The side this half-book holds.
    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Best price level, if any: highest for bids, lowest for asks.
    #[inline]
    pub fn best(&self) -> Option<(Price, &Level)> {
        match self.side {
            Side::Buy => self.levels.iter().next_back(),
            Side::Sell => self.levels.iter().next(),
        }
        .map(|(price, level)| (*price, level))
    }

    /// Best price, if any.
    #[inline]
    pub fn best_price(&self) -> Option<Price> {
        self.best().map(|(price, _)| price)
    }

    /// Total valid quantity at `price`; 0 if the level is absent.
    #[inline]
    pub fn level_total(&self, price: Price) -> Quantity {
        self.levels.get(&price).map_or(0, |level| level.total)
    }

    /// Handle at the front of the queue at `price`, if the level exists.
    #[inline]
    pub fn front(&self, price: Price) -> Option<OrderHandle> {
        self.levels
            .get(&price)
            .and_then(|level| level.queue.front().copied())
    }

    /// Append a handle to the queue at `price`, creating the level if
    /// absent, and add `qty` to the level total.
    pub fn push_back(&mut self, price: Price, handle: OrderHandle, qty: Quantity) {
        let level = self.levels.entry(price).or_default();
        level.queue.push_back(handle);
        level.total += qty;
    }

    /// Pop the queue head at `price`, erasing the level if it empties.
    ///
    /// Does not touch the level total: quantity accounting happens when a
    /// record fills or is cancelled, not when its husk leaves the queue.
    pub fn drop_front(&mut self, price: Price) -> Option<OrderHandle> {
        let level = self.levels.get_mut(&price)?;
        let handle = level.queue.pop_front();
        if level.queue.is_empty() {
            self.levels.remove(&price);
        }
        handle
    }

    /// Subtract `qty` from the level total at `price`.
    pub fn reduce(&mut self, price: Price, qty: Quantity) {
        if let Some(level) = self.levels.get_mut(&price) {
            debug_assert!(level.total >= qty, "level total underflow");
            level.total -= qty;
        }
    }

    /// Iterate levels in ascending price order.
    pub fn iter(&self) -> impl Iterator<Item = (Price, &Level)> {
        self.levels.iter().map(|(price, level)| (*price, level))
    }

    /// Number of price levels.
    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// True when no level exists.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl std::fmt::Debug for HalfBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HalfBook")
            .field("side", &self.side)
            .field("levels", &self.levels.len())
            .field("best", &self.best_price())
            .finish()
    }
}
