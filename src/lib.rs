//! tickmatch - concurrent core of an in-memory limit-order matching engine
//!
//! Many producer threads submit orders, matching workers cross them against
//! per-symbol price-time priority books, and consumers drain the resulting
//! trades. The whole hot path is lock-free: hand-off happens over bounded
//! MPMC ring buffers and momentary fullness or emptiness is reported to the
//! caller as a boolean, never by blocking.
//!
//! # Modules
//!
//! - [`core_types`] - Semantic type aliases (OrderId, Price, Qty, ...)
//! - [`models`] - Order and Trade types
//! - [`error`] - Engine error taxonomy
//! - [`config`] - Engine sizing configuration
//! - [`ring`] - Bounded lock-free MPMC ring buffer
//! - [`orderbook`] - BTreeMap-based price-time priority order book
//! - [`engine`] - Ingress → match → egress pipeline and lifecycle
//! - [`logging`] - Tracing setup
//!
//! # Quick start
//!
//! ```
//! use tickmatch::{EngineConfig, MatchEngine, Order, Side};
//!
//! let engine = MatchEngine::new(EngineConfig::new(1024, 1024, 1)).unwrap();
//! engine.start().unwrap();
//!
//! engine.submit(Order::new(1, Side::Buy, "ACME", 100, 10, 0)).unwrap();
//! engine.submit(Order::new(2, Side::Sell, "ACME", 100, 10, 0)).unwrap();
//!
//! engine.stop().unwrap();
//!
//! let trade = engine.poll_trade().unwrap();
//! assert_eq!((trade.maker_id, trade.taker_id, trade.qty), (1, 2, 10));
//! ```

pub mod config;
pub mod core_types;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod orderbook;
pub mod ring;

// Convenient re-exports at crate root
pub use config::EngineConfig;
pub use core_types::{OrderId, Price, Qty, TimestampNs};
pub use engine::{EngineStats, EngineStatsSnapshot, MatchEngine, ShutdownSignal};
pub use error::EngineError;
pub use models::{Order, Side, Trade};
pub use orderbook::OrderBook;
pub use ring::LockFreeRing;
