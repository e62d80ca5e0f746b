//! Engine configuration
//!
//! Sizing knobs for the two rings and the worker pool. Capacities are
//! validated once at engine construction; everything downstream can then
//! rely on the power-of-two mask trick.

use crate::error::EngineError;

/// Default capacity for each ingress shard (orders in flight per worker)
///
/// Should absorb a submit burst without forcing producers to retry, but not
/// so large that a stop has an unbounded backlog to drain.
pub const DEFAULT_INGRESS_CAPACITY: usize = 16384;

/// Default capacity for the egress ring (trades awaiting consumers)
///
/// Larger bursts are possible here because one order may generate many
/// trades.
pub const DEFAULT_EGRESS_CAPACITY: usize = 16384;

/// Sizing for a [`MatchEngine`](crate::engine::MatchEngine)
///
/// `workers` is the number of matching shards; a worker count of zero is
/// clamped to one. The default of a single worker gives fully serialized
/// matching across all symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Capacity of each per-shard ingress ring (power of two)
    pub ingress_capacity: usize,
    /// Capacity of the shared egress ring (power of two)
    pub egress_capacity: usize,
    /// Number of matching workers (= ingress shards)
    pub workers: usize,
}

impl EngineConfig {
    pub fn new(ingress_capacity: usize, egress_capacity: usize, workers: usize) -> Self {
        Self {
            ingress_capacity,
            egress_capacity,
            workers: workers.max(1),
        }
    }

    /// Check both ring capacities.
    ///
    /// The power-of-two requirement is structural (index masking and the
    /// slot sequence protocol depend on it), so violations are construction
    /// errors rather than something to round away silently.
    pub fn validate(&self) -> Result<(), EngineError> {
        for capacity in [self.ingress_capacity, self.egress_capacity] {
            if capacity == 0 || !capacity.is_power_of_two() {
                return Err(EngineError::InvalidCapacity { capacity });
            }
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ingress_capacity: DEFAULT_INGRESS_CAPACITY,
            egress_capacity: DEFAULT_EGRESS_CAPACITY,
            workers: 1,
        }
    }
}
