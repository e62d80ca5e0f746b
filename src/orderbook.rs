//! OrderBook - BTreeMap-based price-time priority order book
//!
//! One book per symbol. Asks iterate ascending (first entry = best ask);
//! bids use the same ascending map read back-to-front, so the last entry is
//! the best bid. Each price level is a FIFO of resting orders, and empty
//! levels are removed eagerly so they never appear in the ladder.
//!
//! The book is single-threaded: exactly one pipeline worker owns it.

use crate::core_types::{Price, Qty};
use crate::error::EngineError;
use crate::models::{Order, Side, Trade};
use std::collections::{BTreeMap, VecDeque};

/// A price level containing orders at the same price (FIFO queue)
type PriceLevel = VecDeque<Order>;

#[derive(Debug, Default)]
pub struct OrderBook {
    /// Sell orders: price -> orders, ascending, first = best ask
    asks: BTreeMap<Price, PriceLevel>,
    /// Buy orders: price -> orders, ascending, last = best bid
    bids: BTreeMap<Price, PriceLevel>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rest an order at the tail of its price level (FIFO within level).
    ///
    /// Callers guarantee a positive residual; a non-positive one is a
    /// matching bug, not a runtime condition.
    pub fn add(&mut self, order: Order) {
        debug_assert!(
            order.remaining_qty() > 0,
            "resting order {} with non-positive residual",
            order.id
        );
        let side = match order.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        side.entry(order.price).or_default().push_back(order);
    }

    /// Cross the taker against the opposite side.
    ///
    /// Returns the trades produced, in the order they occurred. Any
    /// residual quantity is rested on the taker's side at the taker's
    /// price. A taker with `qty <= 0` is rejected with `InvalidOrder`.
    pub fn match_taker(&mut self, mut taker: Order) -> Result<Vec<Trade>, EngineError> {
        if taker.remaining_qty() <= 0 {
            return Err(EngineError::InvalidOrder {
                id: taker.id,
                reason: "quantity must be positive",
            });
        }

        let mut trades = Vec::new();
        match taker.side {
            Side::Buy => self.match_buy(&mut taker, &mut trades),
            Side::Sell => self.match_sell(&mut taker, &mut trades),
        }

        if taker.remaining_qty() > 0 {
            self.add(taker);
        }
        Ok(trades)
    }

    /// Match a buy taker against asks, walking prices upward.
    fn match_buy(&mut self, taker: &mut Order, trades: &mut Vec<Trade>) {
        let mut empty_prices = Vec::new();

        for (&price, level) in self.asks.iter_mut() {
            // Best ask above the limit: no further match possible.
            if price > taker.price {
                break;
            }

            Self::consume_level(price, level, taker, trades);

            if level.is_empty() {
                empty_prices.push(price);
            }
            if taker.is_filled() {
                break;
            }
        }

        for price in empty_prices {
            self.asks.remove(&price);
        }
    }

    /// Match a sell taker against bids, walking prices downward.
    fn match_sell(&mut self, taker: &mut Order, trades: &mut Vec<Trade>) {
        let mut empty_prices = Vec::new();

        for (&price, level) in self.bids.iter_mut().rev() {
            // Best bid below the limit: no further match possible.
            if price < taker.price {
                break;
            }

            Self::consume_level(price, level, taker, trades);

            if level.is_empty() {
                empty_prices.push(price);
            }
            if taker.is_filled() {
                break;
            }
        }

        for price in empty_prices {
            self.bids.remove(&price);
        }
    }

    /// Consume makers from the front of one level until it drains or the
    /// taker fills. Trades execute at the makers' resting price.
    fn consume_level(price: Price, level: &mut PriceLevel, taker: &mut Order, trades: &mut Vec<Trade>) {
        while let Some(maker) = level.front_mut() {
            let fill = Qty::min(maker.remaining_qty(), taker.remaining_qty());

            trades.push(Trade {
                maker_id: maker.id,
                taker_id: taker.id,
                symbol: taker.symbol.clone(),
                price,
                qty: fill,
                ts_ns: taker.ts_ns,
            });

            maker.filled_qty += fill;
            taker.filled_qty += fill;

            if maker.is_filled() {
                level.pop_front();
            }
            if taker.is_filled() {
                break;
            }
        }
    }

    /// Highest resting buy price
    #[inline]
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.last_key_value().map(|(&price, _)| price)
    }

    /// Lowest resting sell price
    #[inline]
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first_key_value().map(|(&price, _)| price)
    }

    /// Difference between best ask and best bid
    pub fn spread(&self) -> Option<Price> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) if ask > bid => Some(ask - bid),
            _ => None,
        }
    }

    /// Total number of price levels across both sides (diagnostic)
    #[inline]
    pub fn depth(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    /// Number of price levels on each side (bid_depth, ask_depth)
    #[inline]
    pub fn side_depth(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }

    /// Total resting quantity at a price level for a side
    pub fn qty_at_price(&self, price: Price, side: Side) -> Qty {
        let book = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        book.get(&price)
            .map(|level| level.iter().map(|o| o.remaining_qty()).sum())
            .unwrap_or(0)
    }

    /// Immutable view of the ask ladder
    #[inline]
    pub fn asks(&self) -> &BTreeMap<Price, VecDeque<Order>> {
        &self.asks
    }

    /// Immutable view of the bid ladder
    #[inline]
    pub fn bids(&self) -> &BTreeMap<Price, VecDeque<Order>> {
        &self.bids
    }

    /// Iterate resting orders, bids first (best price outward), for
    /// inspection and invariant checks.
    pub fn iter_orders(&self) -> impl Iterator<Item = &Order> + '_ {
        self.bids
            .values()
            .rev()
            .flat_map(|level| level.iter())
            .chain(self.asks.values().flat_map(|level| level.iter()))
    }
}
