//! Order and Trade types
//!
//! These are the payloads that travel the ingress and egress rings.
//! Orders are handed to the engine by value (the symbol string included);
//! trades are constructed inside the matching kernel and drained by the
//! consumer.

use crate::core_types::{OrderId, Price, Qty, TimestampNs};
use serde::{Deserialize, Serialize};

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side a residual rests on is the taker's own side; the side it
    /// crosses against is this one.
    #[inline]
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// A submitted intent to trade
///
/// `qty` is the original size and never changes; fills accumulate in
/// `filled_qty`, so the live residual is [`Order::remaining_qty`]. Once an
/// order rests in a book, only matching mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Producer-assigned identifier, opaque to the engine
    pub id: OrderId,
    pub side: Side,
    /// Instrument identifier; matching is strictly per-symbol
    pub symbol: String,
    /// Limit price in ticks
    pub price: Price,
    /// Original quantity in lots (> 0 on entry)
    pub qty: Qty,
    /// Quantity consumed by fills so far
    pub filled_qty: Qty,
    /// Event time, propagated to trades; not used for matching priority
    pub ts_ns: TimestampNs,
}

impl Order {
    pub fn new(
        id: OrderId,
        side: Side,
        symbol: impl Into<String>,
        price: Price,
        qty: Qty,
        ts_ns: TimestampNs,
    ) -> Self {
        Self {
            id,
            side,
            symbol: symbol.into(),
            price,
            qty,
            filled_qty: 0,
            ts_ns,
        }
    }

    /// Unfilled residual
    #[inline]
    pub fn remaining_qty(&self) -> Qty {
        self.qty - self.filled_qty
    }

    #[inline]
    pub fn is_filled(&self) -> bool {
        self.filled_qty >= self.qty
    }
}

/// The event emitted when two orders cross
///
/// The trade always executes at the maker's resting price; price
/// improvement accrues to the taker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Resting order that was consumed
    pub maker_id: OrderId,
    /// Incoming order that crossed
    pub taker_id: OrderId,
    pub symbol: String,
    /// The maker's resting price
    pub price: Price,
    /// min of the two residuals at match time
    pub qty: Qty,
    /// Propagated from the taker
    pub ts_ns: TimestampNs,
}
