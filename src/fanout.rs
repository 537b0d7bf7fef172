//! Trade fan-out - routes each fill to the two involved owners.
//!
//! The engine exposes a single trade listener slot; the fan-out adapts it
//! into per-owner deliveries so trader agents can reconcile reserved cash
//! and stock. Sinks run synchronously on the worker thread: they must not
//! block for long and must not submit back into the engine from the
//! callback (route follow-ups through the agent's own producer thread).

use rustc_hash::FxHashMap;

use crate::order::{OrderId, OwnerId, Price, Quantity, Side, Trade, TradeListener};

/// An owned copy of one side of a trade, safe to retain after the
/// callback returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fill {
    /// The owner's order that participated in the fill.
    pub order_id: OrderId,
    /// The owner this fill is addressed to.
    pub owner: OwnerId,
    /// Side of the owner's order.
    pub side: Side,
    /// Execution price (the ask record's price tick).
    pub price: Price,
    /// Executed quantity.
    pub qty: Quantity,
}

/// Per-owner callback sink.
///
/// A buying owner typically releases reserved cash and adds position; a
/// selling owner releases reserved stock and adds cash.
pub trait OwnerSink: Send {
    /// One fill on one of this owner's orders.
    fn on_fill(&mut self, fill: Fill);
}

impl<F: FnMut(Fill) + Send> OwnerSink for F {
    fn on_fill(&mut self, fill: Fill) {
        self(fill)
    }
}

/// Registry of owner sinks, convertible into the engine's trade listener.
///
/// Each trade produces two deliveries: a buy fill to the bid owner and a
/// sell fill to the ask owner. Owners without a registered sink are
/// skipped. A self-trade delivers both fills to the same owner.
#[derive(Default)]
pub struct TradeFanout {
    sinks: FxHashMap<OwnerId, Box<dyn OwnerSink>>,
}

impl TradeFanout {
    /// Create an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sink` for `owner`, replacing any previous registration.
    pub fn register(&mut self, owner: OwnerId, sink: Box<dyn OwnerSink>) {
        self.sinks.insert(owner, sink);
    }

    /// Number of registered owners.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// True when no owner is registered.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Convert into the engine's trade listener.
    pub fn into_listener(mut self) -> TradeListener {
        Box::new(move |trade: Trade<'_>| {
            let price = trade.ask.price;
            if let Some(sink) = self.sinks.get_mut(&trade.bid.owner) {
                sink.on_fill(Fill {
                    order_id: trade.bid.id,
                    owner: trade.bid.owner,
                    side: Side::Buy,
                    price,
                    qty: trade.qty,
                });
            }
            if let Some(sink) = self.sinks.get_mut(&trade.ask.owner) {
                sink.on_fill(Fill {
                    order_id: trade.ask.id,
                    owner: trade.ask.owner,
                    side: Side::Sell,
                    price,
                    qty: trade.qty,
                });
            }
        })
    }
}

impl std::fmt::Debug for TradeFanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeFanout")
            .field("owners", &self.sinks.len())
            .finish()
    }
}
