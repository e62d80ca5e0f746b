//! Engine pipeline
//!
//! Composes the ingress rings, the matching workers, and the egress ring:
//!
//! ```text
//! producers ──▶ ingress ring (per shard) ──▶ match worker ──▶ egress ring ──▶ consumers
//!   submit()                                  OrderBook                        poll_trade()
//! ```
//!
//! # Concurrency model
//!
//! Books are never shared. `submit` routes each order to a shard by symbol
//! hash; every shard has its own ingress ring and one worker that owns the
//! books for the symbols landing there. One symbol is therefore always
//! matched on one thread, in the FIFO order of its ingress ring. With the
//! default single worker this is fully serialized matching.
//!
//! The hot path has no blocking primitives: fullness and emptiness are
//! booleans, contention is CAS retries in the rings, and workers back off
//! with spin/yield escalation when idle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use rustc_hash::{FxHashMap, FxHasher};
use serde::Serialize;
use std::hash::{Hash, Hasher};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::models::{Order, Trade};
use crate::orderbook::OrderBook;
use crate::ring::LockFreeRing;

/// Consecutive empty polls before a worker yields the CPU
const SPIN_LIMIT: u32 = 100;

// ============================================================
// LIFECYCLE STATE MACHINE
// ============================================================

const STATE_CREATED: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPED: u8 = 2;

fn state_name(state: u8) -> &'static str {
    match state {
        STATE_CREATED => "created",
        STATE_RUNNING => "running",
        _ => "stopped",
    }
}

// ============================================================
// SHUTDOWN SIGNALING
// ============================================================

/// Shutdown signal for graceful pipeline termination
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    shutdown: AtomicBool,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

// ============================================================
// ENGINE STATISTICS
// ============================================================

/// Atomic counters updated by producers and workers
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Orders accepted onto an ingress ring
    pub orders_submitted: AtomicU64,
    /// Orders pulled off ingress and run through a book
    pub orders_matched: AtomicU64,
    /// Trades pushed to the egress ring
    pub trades_emitted: AtomicU64,
    /// Full-ring events observed on submit or on the egress push loop
    pub backpressure_events: AtomicU64,
}

impl EngineStats {
    pub fn incr_submitted(&self) {
        self.orders_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_matched(&self) {
        self.orders_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_trades(&self, count: u64) {
        self.trades_emitted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn incr_backpressure(&self) {
        let count = self.backpressure_events.fetch_add(1, Ordering::Relaxed);
        if count % 10_000 == 0 {
            tracing::warn!(total_backpressure = count + 1, "backpressure detected (1/10000)");
        }
    }

    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            orders_submitted: self.orders_submitted.load(Ordering::Relaxed),
            orders_matched: self.orders_matched.load(Ordering::Relaxed),
            trades_emitted: self.trades_emitted.load(Ordering::Relaxed),
            backpressure_events: self.backpressure_events.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of stats (for reporting)
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatsSnapshot {
    pub orders_submitted: u64,
    pub orders_matched: u64,
    pub trades_emitted: u64,
    pub backpressure_events: u64,
}

impl std::fmt::Display for EngineStatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "engine stats: submitted={}, matched={}, trades={}, backpressure={}",
            self.orders_submitted, self.orders_matched, self.trades_emitted, self.backpressure_events
        )
    }
}

// ============================================================
// QUEUE OPERATIONS WITH BACKPRESSURE
// ============================================================

/// Push with spin-wait backpressure.
///
/// Busy-waits on a momentarily full ring instead of parking, trading CPU
/// for latency variance.
#[inline]
fn push_with_backpressure<T>(ring: &LockFreeRing<T>, item: T, stats: &EngineStats) {
    let mut item = item;
    loop {
        match ring.push(item) {
            Ok(()) => return,
            Err(returned) => {
                item = returned;
                stats.incr_backpressure();
                std::hint::spin_loop();
            }
        }
    }
}

// ============================================================
// MATCHING WORKER
// ============================================================

/// One shard's worker loop. Owns the books for every symbol routed to this
/// shard; returns them at exit so `stop` can collect the resting state.
fn match_worker(
    worker_id: usize,
    ingress: Arc<LockFreeRing<Order>>,
    egress: Arc<LockFreeRing<Trade>>,
    shutdown: Arc<ShutdownSignal>,
    stats: Arc<EngineStats>,
) -> FxHashMap<String, OrderBook> {
    let mut books: FxHashMap<String, OrderBook> = FxHashMap::default();
    let mut spin_count = 0u32;

    tracing::debug!(worker_id, "matching worker started");

    loop {
        let mut did_work = false;

        if let Some(order) = ingress.pop() {
            did_work = true;

            let book = books.entry(order.symbol.clone()).or_default();
            match book.match_taker(order) {
                Ok(trades) => {
                    stats.incr_matched();
                    let count = trades.len() as u64;
                    for trade in trades {
                        push_with_backpressure(&egress, trade, &stats);
                    }
                    stats.add_trades(count);
                }
                Err(err) => {
                    // submit() validates orders before they reach the ring,
                    // so a rejection here is a programming error. Never take
                    // the process down from a worker.
                    debug_assert!(false, "ingressed order rejected by matching: {err}");
                    tracing::error!(%err, worker_id, "order rejected in matching stage");
                }
            }
        }

        // Drain-on-stop: exit only once the shard's backlog is matched.
        if shutdown.is_shutdown_requested() && ingress.is_empty() {
            break;
        }

        if !did_work {
            spin_count += 1;
            if spin_count > SPIN_LIMIT {
                thread::yield_now();
                spin_count = 0;
            } else {
                std::hint::spin_loop();
            }
        } else {
            spin_count = 0;
        }
    }

    tracing::debug!(worker_id, symbols = books.len(), "matching worker exited");
    books
}

// ============================================================
// MATCH ENGINE
// ============================================================

/// The engine: lifecycle, submit/poll surface, worker pool
///
/// All operations take `&self`, so the engine can sit in an `Arc` and be
/// shared by any number of producer and consumer threads. Lifecycle is
/// `created → running → stopped`; `stopped` is terminal.
#[derive(Debug)]
pub struct MatchEngine {
    config: EngineConfig,
    /// One ingress ring per shard/worker
    ingress: Vec<Arc<LockFreeRing<Order>>>,
    egress: Arc<LockFreeRing<Trade>>,
    shutdown: Arc<ShutdownSignal>,
    stats: Arc<EngineStats>,
    state: AtomicU8,
    /// Lifecycle bookkeeping only; never touched on the hot path
    workers: Mutex<Vec<JoinHandle<FxHashMap<String, OrderBook>>>>,
    /// Resting books collected from workers at stop
    books: Mutex<FxHashMap<String, OrderBook>>,
}

impl MatchEngine {
    /// Build an engine in the `created` state.
    ///
    /// Fails with [`EngineError::InvalidCapacity`] if either ring capacity
    /// is zero or not a power of two.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let mut ingress = Vec::with_capacity(config.workers);
        for _ in 0..config.workers {
            ingress.push(Arc::new(LockFreeRing::with_capacity(config.ingress_capacity)?));
        }
        let egress = Arc::new(LockFreeRing::with_capacity(config.egress_capacity)?);

        Ok(Self {
            config,
            ingress,
            egress,
            shutdown: Arc::new(ShutdownSignal::new()),
            stats: Arc::new(EngineStats::default()),
            state: AtomicU8::new(STATE_CREATED),
            workers: Mutex::new(Vec::new()),
            books: Mutex::new(FxHashMap::default()),
        })
    }

    /// Spawn the worker pool. Valid only from `created`.
    pub fn start(&self) -> Result<(), EngineError> {
        self.transition(STATE_CREATED, STATE_RUNNING, "start")?;

        let mut handles = self.lock_workers();
        for (worker_id, ingress) in self.ingress.iter().enumerate() {
            let ingress = Arc::clone(ingress);
            let egress = Arc::clone(&self.egress);
            let shutdown = Arc::clone(&self.shutdown);
            let stats = Arc::clone(&self.stats);

            let handle = thread::Builder::new()
                .name(format!("match-{worker_id}"))
                .spawn(move || match_worker(worker_id, ingress, egress, shutdown, stats))
                .expect("failed to spawn matching worker");
            handles.push(handle);
        }

        tracing::info!(
            workers = self.config.workers,
            ingress_capacity = self.config.ingress_capacity,
            egress_capacity = self.config.egress_capacity,
            "engine started"
        );
        Ok(())
    }

    /// Signal shutdown and join the workers. Valid only from `running`.
    ///
    /// Workers drain their ingress backlog before exiting, so every order
    /// accepted by `submit` is matched. The egress ring may still hold
    /// undrained trades after `stop` returns; consumers keep polling. If
    /// trade volume can exceed the egress capacity, a consumer must keep
    /// draining *while* `stop` runs, since workers spin on a full egress.
    pub fn stop(&self) -> Result<(), EngineError> {
        self.transition(STATE_RUNNING, STATE_STOPPED, "stop")?;

        self.shutdown.request_shutdown();

        let handles: Vec<_> = self.lock_workers().drain(..).collect();
        let mut books = self.books.lock().expect("books lock poisoned");
        for handle in handles {
            let shard_books = handle.join().expect("matching worker panicked");
            books.extend(shard_books);
        }

        tracing::info!(stats = %self.stats.snapshot(), "engine stopped");
        Ok(())
    }

    /// Non-blocking order submission.
    ///
    /// `Ok(false)` is backpressure: the order's shard ring was full and the
    /// caller decides whether to retry, drop, or escalate.
    pub fn submit(&self, order: Order) -> Result<bool, EngineError> {
        let state = self.state.load(Ordering::SeqCst);
        if state != STATE_RUNNING {
            return Err(EngineError::InvalidState {
                op: "submit",
                state: state_name(state),
            });
        }
        if order.remaining_qty() <= 0 {
            return Err(EngineError::InvalidOrder {
                id: order.id,
                reason: "quantity must be positive",
            });
        }

        let shard = self.shard_for(&order.symbol);
        match self.ingress[shard].push(order) {
            Ok(()) => {
                self.stats.incr_submitted();
                Ok(true)
            }
            Err(_rejected) => {
                self.stats.incr_backpressure();
                Ok(false)
            }
        }
    }

    /// Non-blocking trade retrieval.
    ///
    /// Allowed in every state: after `stop` the egress may still hold the
    /// tail of the trade stream.
    pub fn poll_trade(&self) -> Option<Trade> {
        self.egress.pop()
    }

    pub fn stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Extract the resting books after `stop`.
    pub fn into_books(self) -> Result<FxHashMap<String, OrderBook>, EngineError> {
        let state = self.state.load(Ordering::SeqCst);
        if state != STATE_STOPPED {
            return Err(EngineError::InvalidState {
                op: "into_books",
                state: state_name(state),
            });
        }
        Ok(self
            .books
            .lock()
            .expect("books lock poisoned")
            .drain()
            .collect())
    }

    fn transition(&self, from: u8, to: u8, op: &'static str) -> Result<(), EngineError> {
        self.state
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|actual| EngineError::InvalidState {
                op,
                state: state_name(actual),
            })
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<JoinHandle<FxHashMap<String, OrderBook>>>> {
        self.workers.lock().expect("workers lock poisoned")
    }

    fn shard_for(&self, symbol: &str) -> usize {
        if self.ingress.len() == 1 {
            return 0;
        }
        let mut hasher = FxHasher::default();
        symbol.hash(&mut hasher);
        (hasher.finish() as usize) % self.ingress.len()
    }
}

impl Drop for MatchEngine {
    fn drop(&mut self) {
        // Callers stop the engine before dropping it; this path only keeps
        // a leaked-running engine from leaving workers spinning forever.
        if self.state.load(Ordering::SeqCst) == STATE_RUNNING {
            self.shutdown.request_shutdown();
            if let Ok(mut handles) = self.workers.lock() {
                for handle in handles.drain(..) {
                    let _ = handle.join();
                }
            }
        }
    }
}
