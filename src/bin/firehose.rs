//! Synthetic order firehose
//!
//! Benchmark driver for the engine: several producer threads blast random
//! limit orders at the ingress while one consumer drains the trade stream,
//! then reports throughput and the final stats snapshot as JSON. It touches
//! the engine only through the public submit/poll/start/stop surface.
//!
//! Usage:
//!   cargo run --release --bin firehose [total_orders]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tickmatch::{EngineConfig, MatchEngine, Order, Side, logging};

const DEFAULT_TOTAL_ORDERS: u64 = 200_000;
const PRODUCERS: u64 = 4;
const SYMBOL: &str = "TEST";

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn main() -> Result<()> {
    logging::init_logging();
    tracing::info!(git = env!("GIT_HASH"), "firehose starting");

    let total: u64 = match std::env::args().nth(1) {
        Some(arg) => arg.parse().context("total_orders must be an integer")?,
        None => DEFAULT_TOTAL_ORDERS,
    };

    let engine = Arc::new(MatchEngine::new(EngineConfig::new(1 << 14, 1 << 14, 1))?);
    engine.start()?;

    let done = Arc::new(AtomicBool::new(false));
    let traded_qty = Arc::new(AtomicU64::new(0));
    let trade_count = Arc::new(AtomicU64::new(0));

    let consumer = {
        let engine = Arc::clone(&engine);
        let done = Arc::clone(&done);
        let traded_qty = Arc::clone(&traded_qty);
        let trade_count = Arc::clone(&trade_count);
        thread::spawn(move || {
            loop {
                match engine.poll_trade() {
                    Some(trade) => {
                        trade_count.fetch_add(1, Ordering::Relaxed);
                        traded_qty.fetch_add(trade.qty as u64, Ordering::Relaxed);
                    }
                    None => {
                        if done.load(Ordering::Acquire) {
                            break;
                        }
                        thread::yield_now();
                    }
                }
            }
        })
    };

    let started = Instant::now();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let engine = Arc::clone(&engine);
            let per_producer = total / PRODUCERS;
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(42 + p);
                for i in 0..per_producer {
                    let order = Order::new(
                        p * per_producer + i + 1,
                        if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell },
                        SYMBOL,
                        rng.gen_range(9_950..=10_050),
                        rng.gen_range(1..=10),
                        now_ns(),
                    );
                    // Busy-wait on momentary fullness to keep the driver simple.
                    while !engine.submit(order.clone()).expect("submit failed") {
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    for handle in producers {
        handle.join().expect("producer panicked");
    }

    // stop() drains the ingress backlog while the consumer keeps pulling
    // trades off the egress.
    engine.stop()?;
    done.store(true, Ordering::Release);
    consumer.join().expect("consumer panicked");

    let elapsed = started.elapsed();
    let rate = total as f64 / elapsed.as_secs_f64();

    let snapshot = engine.stats();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    tracing::info!(
        orders = total,
        trades = trade_count.load(Ordering::Relaxed),
        traded_qty = traded_qty.load(Ordering::Relaxed),
        elapsed_ms = elapsed.as_millis() as u64,
        rate_per_sec = rate as u64,
        "firehose finished"
    );
    Ok(())
}
