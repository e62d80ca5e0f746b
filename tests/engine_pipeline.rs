//! End-to-end pipeline tests through the public engine surface
//!
//! Everything here drives the engine the way an embedding venue would:
//! construct, start, submit from producer threads, poll trades, stop,
//! inspect the resting books.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use tickmatch::{EngineConfig, MatchEngine, Order, Side, Trade};

fn run_and_collect(engine: MatchEngine, orders: Vec<Order>) -> (Vec<Trade>, MatchEngine) {
    engine.start().unwrap();
    for order in orders {
        assert!(engine.submit(order).unwrap(), "unexpected backpressure");
    }
    engine.stop().unwrap();

    let mut trades = Vec::new();
    while let Some(trade) = engine.poll_trade() {
        trades.push(trade);
    }
    (trades, engine)
}

#[test]
fn test_resting_then_cross() {
    let engine = MatchEngine::new(EngineConfig::new(64, 64, 1)).unwrap();
    let (trades, engine) = run_and_collect(
        engine,
        vec![
            Order::new(1, Side::Buy, "X", 100, 10, 0),
            Order::new(2, Side::Sell, "X", 100, 5, 0),
        ],
    );

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].maker_id, 1);
    assert_eq!(trades[0].taker_id, 2);
    assert_eq!(trades[0].price, 100);
    assert_eq!(trades[0].qty, 5);

    let books = engine.into_books().unwrap();
    let book = &books["X"];
    assert_eq!(book.best_bid(), Some(100));
    assert_eq!(book.qty_at_price(100, Side::Buy), 5);
    assert_eq!(book.best_ask(), None);
}

#[test]
fn test_walk_multiple_levels() {
    let engine = MatchEngine::new(EngineConfig::new(64, 64, 1)).unwrap();
    let (trades, engine) = run_and_collect(
        engine,
        vec![
            Order::new(1, Side::Sell, "X", 100, 3, 0),
            Order::new(2, Side::Sell, "X", 101, 4, 0),
            Order::new(3, Side::Buy, "X", 102, 6, 0),
        ],
    );

    assert_eq!(trades.len(), 2);
    assert_eq!((trades[0].maker_id, trades[0].price, trades[0].qty), (1, 100, 3));
    assert_eq!((trades[1].maker_id, trades[1].price, trades[1].qty), (2, 101, 3));

    let books = engine.into_books().unwrap();
    let book = &books["X"];
    assert_eq!(book.qty_at_price(101, Side::Sell), 1);
    assert_eq!(book.best_bid(), None);
}

#[test]
fn test_price_time_priority() {
    let engine = MatchEngine::new(EngineConfig::new(64, 64, 1)).unwrap();
    let (trades, engine) = run_and_collect(
        engine,
        vec![
            Order::new(1, Side::Buy, "X", 100, 2, 0),
            Order::new(2, Side::Buy, "X", 100, 2, 0),
            Order::new(3, Side::Sell, "X", 100, 3, 0),
        ],
    );

    assert_eq!(trades.len(), 2);
    assert_eq!((trades[0].maker_id, trades[0].qty), (1, 2));
    assert_eq!((trades[1].maker_id, trades[1].qty), (2, 1));

    let books = engine.into_books().unwrap();
    assert_eq!(books["X"].qty_at_price(100, Side::Buy), 1);
}

#[test]
fn test_no_cross_rests_both_sides() {
    let engine = MatchEngine::new(EngineConfig::new(64, 64, 1)).unwrap();
    let (trades, engine) = run_and_collect(
        engine,
        vec![
            Order::new(1, Side::Buy, "X", 99, 5, 0),
            Order::new(2, Side::Sell, "X", 100, 5, 0),
        ],
    );

    assert!(trades.is_empty());
    let books = engine.into_books().unwrap();
    let book = &books["X"];
    assert_eq!(book.best_bid(), Some(99));
    assert_eq!(book.best_ask(), Some(100));
}

#[test]
fn test_stop_drains_ingress_backlog() {
    // Submit a burst of crossing pairs and stop immediately: drain-on-stop
    // means every accepted order is matched before the workers exit.
    const PAIRS: u64 = 1_000;

    let engine = MatchEngine::new(EngineConfig::new(1 << 12, 1 << 12, 1)).unwrap();
    engine.start().unwrap();

    for i in 0..PAIRS {
        assert!(engine.submit(Order::new(2 * i + 1, Side::Buy, "D", 100, 1, 0)).unwrap());
        assert!(engine.submit(Order::new(2 * i + 2, Side::Sell, "D", 100, 1, 0)).unwrap());
    }

    engine.stop().unwrap();

    let mut trades = 0u64;
    while let Some(trade) = engine.poll_trade() {
        assert_eq!(trade.qty, 1);
        trades += 1;
    }
    assert_eq!(trades, PAIRS);

    let books = engine.into_books().unwrap();
    assert_eq!(books["D"].depth(), 0);
}

#[test]
fn test_multi_symbol_sharded_workers() {
    let symbols = ["AAA", "BBB", "CCC", "DDD", "EEE"];
    let engine = MatchEngine::new(EngineConfig::new(1 << 12, 1 << 14, 4)).unwrap();
    engine.start().unwrap();

    // One crossing pair per symbol; sharding must keep each pair together.
    for (i, symbol) in symbols.iter().enumerate() {
        let base = (i as u64) * 10;
        assert!(engine
            .submit(Order::new(base + 1, Side::Sell, *symbol, 100, 7, 0))
            .unwrap());
        assert!(engine
            .submit(Order::new(base + 2, Side::Buy, *symbol, 100, 7, 0))
            .unwrap());
    }

    engine.stop().unwrap();

    let mut by_symbol: FxHashMap<String, Vec<Trade>> = FxHashMap::default();
    while let Some(trade) = engine.poll_trade() {
        by_symbol.entry(trade.symbol.clone()).or_default().push(trade);
    }

    for (i, symbol) in symbols.iter().enumerate() {
        let base = (i as u64) * 10;
        let trades = &by_symbol[*symbol];
        assert_eq!(trades.len(), 1, "symbol {symbol}");
        assert_eq!((trades[0].maker_id, trades[0].taker_id), (base + 1, base + 2));
    }

    let books = engine.into_books().unwrap();
    for symbol in symbols {
        assert_eq!(books[symbol].depth(), 0, "symbol {symbol} should be flat");
    }
}

#[test]
fn test_throughput_smoke_with_conservation() {
    // Random firehose through the default serialized engine. Checks the
    // global accounting identity: submitted qty = 2 * traded qty + resting
    // residual (each trade consumes its qty from both maker and taker).
    const TOTAL: u64 = 200_000;
    const PRODUCERS: u64 = 4;

    let engine = Arc::new(MatchEngine::new(EngineConfig::new(1 << 14, 1 << 14, 1)).unwrap());
    engine.start().unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let consumer = {
        let engine = Arc::clone(&engine);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut count = 0u64;
            let mut qty = 0i64;
            loop {
                match engine.poll_trade() {
                    Some(trade) => {
                        assert!(trade.qty > 0);
                        count += 1;
                        qty += trade.qty;
                    }
                    None => {
                        if done.load(Ordering::Acquire) {
                            break;
                        }
                        thread::yield_now();
                    }
                }
            }
            (count, qty)
        })
    };

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(7 + p);
                let per_producer = TOTAL / PRODUCERS;
                let mut submitted_qty = 0i64;
                for i in 0..per_producer {
                    let order = Order::new(
                        p * per_producer + i + 1,
                        if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell },
                        "SMOKE",
                        rng.gen_range(95..=105),
                        rng.gen_range(1..=10),
                        i,
                    );
                    submitted_qty += order.qty;
                    while !engine.submit(order.clone()).unwrap() {
                        thread::yield_now();
                    }
                }
                submitted_qty
            })
        })
        .collect();

    let submitted_qty: i64 = producers.into_iter().map(|h| h.join().unwrap()).sum();

    engine.stop().unwrap();
    done.store(true, Ordering::Release);
    let (trade_count, traded_qty) = consumer.join().unwrap();

    assert!(trade_count <= TOTAL);

    let stats = engine.stats();
    assert_eq!(stats.orders_submitted, TOTAL);
    assert_eq!(stats.orders_matched, TOTAL);
    assert_eq!(stats.trades_emitted, trade_count);

    let engine = Arc::into_inner(engine).expect("all clones joined");
    let books = engine.into_books().unwrap();
    let resting_qty: i64 = books
        .values()
        .flat_map(|book| book.iter_orders())
        .map(|order| order.remaining_qty())
        .sum();

    assert_eq!(submitted_qty, 2 * traded_qty + resting_qty);
}
