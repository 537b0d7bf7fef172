//! # Pulse-LOB
//!
//! A single-instrument limit order matching engine for high-throughput
//! trading simulations.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: one dedicated worker thread owns all book state (no locks)
//! - **Bounded Resources**: fixed-capacity order pool, fixed-capacity request ring
//! - **Price-Time Priority**: strict price priority, FIFO within a level
//! - **Lazy Cancellation**: cancelled records tombstone in place and are
//!   reclaimed by the match loop
//!
//! ## Architecture
//!
//! ```text
//! [Producer Threads] --> [MPSC Ring Buffer] --> [Worker Thread (Pinned)]
//!                                                      |
//!                                              [Trade Callbacks]
//! ```
//!
//! Producers submit [`OrderRequest`]s through [`Engine::submit`]; the worker
//! drains the ring one request at a time and mutates the books. Each fill is
//! reported synchronously to the registered [`TradeListener`] before any
//! structural mutation invalidates the involved records.

pub mod book;
pub mod config;
pub mod engine;
pub mod error;
pub mod fanout;
pub mod matching;
pub mod order;
pub mod pool;
pub mod ring;
pub mod worker;

// Re-exports for convenience
pub use book::{HalfBook, Level};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::EngineError;
pub use fanout::{Fill, OwnerSink, TradeFanout};
pub use matching::{BookStats, MatchingEngine, Step};
pub use order::{
    Order, OrderId, OrderRequest, OrderType, OwnerId, Price, Quantity, Side, Trade, TradeListener,
};
pub use pool::{OrderHandle, OrderPool, NULL_HANDLE};
pub use ring::{Consumer, Producer, RingBuffer};
