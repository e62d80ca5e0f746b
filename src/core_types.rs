//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// Order ID - unique within the system, assigned by the producer
pub type OrderId = u64;

/// Price in ticks (integer lattice, no floating point)
pub type Price = i64;

/// Quantity in lots
///
/// Strictly positive on order entry; fills only ever reduce the residual.
pub type Qty = i64;

/// Event-time timestamp in nanoseconds
pub type TimestampNs = u64;
