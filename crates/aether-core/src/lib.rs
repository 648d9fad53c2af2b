//! Aether Core -- the deterministic flow simulation behind an idle game.
//!
//! Players place nodes (reservoirs of pressure) and connect them with
//! edges. Every tick, pressure flows from high to low along the edges, the
//! friction of that flow produces flux, and flux can be exchanged for
//! prestige. All simulated quantities are Q32.32 fixed-point so a run
//! reproduces bit for bit on every platform.
//!
//! # Tick Pipeline
//!
//! Each call to [`engine::Simulation::step`] runs one tick:
//!
//! 1. **Commands** -- Execute commands queued since the last tick.
//! 2. **Flow** -- [`solver::FlowSolver`] moves pressure along edges, in edge
//!    creation order, and regenerates source nodes.
//! 3. **Economy** -- [`economy::EconomyBridge`] credits the friction
//!    byproduct as flux and the passive build trickle.
//! 4. **Transitions** -- Nodes that became full or empty emit events.
//! 5. **Delivery** -- Buffered events reach subscribers.
//! 6. **Bookkeeping** -- Increment the tick counter and the state hash.
//!
//! # Key Types
//!
//! - [`engine::Simulation`] -- Owns all state and drives the pipeline.
//! - [`graph::GraphStore`] -- Nodes, edges and the resource pool, with
//!   cost-gated [`add_node`](graph::GraphStore::add_node) and
//!   [`add_edge`](graph::GraphStore::add_edge).
//! - [`solver::FlowSolver`] -- Pure pressure/flow transform.
//! - [`economy::EconomyBridge`] -- Flux income and the flux-for-prestige
//!   exchange.
//! - [`config::SimConfig`] -- Every tunable constant.
//! - [`event::EventBus`] -- Buffered events with passive and reactive
//!   subscribers.
//! - [`serialize`] / [`migration`] / [`replay`] -- Versioned snapshots,
//!   upgrades of old saves, and verified playback.

pub mod command_queue;
pub mod config;
pub mod economy;
pub mod engine;
pub mod event;
pub mod fixed;
pub mod graph;
pub mod id;
pub mod migration;
pub mod pool;
pub mod query;
pub mod replay;
pub mod serialize;
pub mod sim;
pub mod solver;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
