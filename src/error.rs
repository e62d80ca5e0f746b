//! Engine error types
//!
//! Construction and lifecycle violations surface here. Momentary ring
//! fullness or emptiness is never an error: `submit` and `poll_trade`
//! report it through their return value and the caller decides whether to
//! retry, drop, or escalate.

use thiserror::Error;

/// Errors surfaced at the engine API boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Ring capacities must be a nonzero power of two, fixed at construction
    #[error("invalid capacity {capacity}: must be a nonzero power of two")]
    InvalidCapacity { capacity: usize },

    /// Lifecycle violation (e.g. submit before start, second start)
    #[error("invalid state for {op}: engine is {state}")]
    InvalidState {
        op: &'static str,
        state: &'static str,
    },

    /// Malformed order (non-positive quantity)
    #[error("invalid order {id}: {reason}")]
    InvalidOrder { id: u64, reason: &'static str },
}
