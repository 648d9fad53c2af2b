//! Simulation strategy and state types.
//!
//! The [`Simulation`](crate::engine::Simulation) is parameterized by a
//! [`SimulationStrategy`] that determines how wall-clock time maps onto
//! solver ticks. Every tick runs the same pipeline with a constant `dt`;
//! strategies only decide how many ticks a call runs.

use crate::command_queue::CommandResult;
use crate::fixed::{Fixed64, Ticks};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Simulation strategy
// ---------------------------------------------------------------------------

/// How the simulation advances time. Chosen at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SimulationStrategy {
    /// One tick of `SimConfig::fixed_step` per `step()` or `advance()` call,
    /// regardless of elapsed time. The driver calls at a fixed rate.
    #[default]
    Tick,

    /// Real-time mode. `advance(elapsed)` accumulates time and runs as many
    /// ticks of `step` seconds as fit, carrying the remainder forward.
    FixedStep {
        /// Seconds per tick.
        step: Fixed64,
    },
}

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable timing state tracked by the simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimState {
    /// Ticks run since construction. Survives resets.
    pub tick: Ticks,

    /// Elapsed seconds not yet consumed by a tick. Unused in tick mode.
    pub accumulator: Fixed64,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Advance result
// ---------------------------------------------------------------------------

/// Result of a `step()`, `advance()` or `tick_with_dt()` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvanceResult {
    /// Number of ticks actually run.
    pub steps_run: u64,
    /// Flux produced across those ticks.
    pub byproduct: Fixed64,
    /// Outcomes of queued commands executed at the start of each tick, in
    /// execution order.
    pub command_results: Vec<CommandResult>,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A deterministic hash of simulation state for desync detection.
///
/// FNV-1a (64-bit). Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write(&[v]);
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_state_starts_at_zero() {
        let state = SimState::new();
        assert_eq!(state.tick, 0);
        assert_eq!(state.accumulator, Fixed64::ZERO);
    }

    #[test]
    fn default_strategy_is_tick() {
        assert_eq!(SimulationStrategy::default(), SimulationStrategy::Tick);
    }

    #[test]
    fn state_hash_deterministic() {
        let mut h1 = StateHash::new();
        h1.write_u64(42);
        h1.write_fixed64(Fixed64::from_num(7.5));

        let mut h2 = StateHash::new();
        h2.write_u64(42);
        h2.write_fixed64(Fixed64::from_num(7.5));

        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn state_hash_differs_for_different_inputs() {
        let mut h1 = StateHash::new();
        h1.write_fixed64(Fixed64::from_num(1));

        let mut h2 = StateHash::new();
        h2.write_fixed64(Fixed64::from_num(2));

        assert_ne!(h1.finish(), h2.finish());
    }

    #[test]
    fn state_hash_order_matters() {
        let mut h1 = StateHash::new();
        h1.write_u32(1);
        h1.write_u32(2);

        let mut h2 = StateHash::new();
        h2.write_u32(2);
        h2.write_u32(1);

        assert_ne!(h1.finish(), h2.finish());
    }

    #[test]
    fn empty_hash_is_fnv_offset() {
        assert_eq!(StateHash::new().finish(), 0xcbf29ce484222325);
    }
}
