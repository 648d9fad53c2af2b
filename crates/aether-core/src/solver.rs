//! Pressure-driven flow solver.
//!
//! Each call moves pressure along edges, regenerates source nodes, and
//! reports how much flux the friction of that movement produced. The solver
//! is a pure transform over the node and edge collections: it owns no state
//! besides its tuning parameters, uses no randomness, and walks collections
//! only in their stored order, so identical inputs always give bit-identical
//! outputs.
//!
//! # Edge priority
//!
//! Edges are processed one at a time in collection (insertion) order and
//! each edge sees the pressures left behind by the edges before it. When
//! several edges compete for the pressure of one node within a tick, the
//! earliest-created edge drains it first. Reordering the edge collection
//! changes results.
//!
//! # Time step
//!
//! `dt` is used as given. Per-edge clamping keeps every node inside
//! `[0, capacity]`, but a very large `dt` saturates each edge at its clamp
//! bound instead of settling smoothly, and the earliest edges win.

use crate::fixed::{clamp_unit_range, Fixed64};
use crate::graph::{Edge, Node, NodeKind};
use crate::id::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tracing::warn;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Tuning constants for the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverParams {
    /// Fraction of velocity lost every tick regardless of topology.
    pub ether_drag: Fixed64,
    /// Scales how quickly pressure differences equalize.
    pub flow_multiplier: Fixed64,
    /// Flux produced per unit of pressure moved.
    pub friction_coefficient: Fixed64,
    /// Moves at or below this magnitude are dropped to avoid flicker near
    /// equilibrium.
    pub dead_zone: Fixed64,
    /// Pressure per second regenerated by source nodes.
    pub source_regen_rate: Fixed64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            ether_drag: Fixed64::from_num(0.1),
            flow_multiplier: Fixed64::from_num(5),
            friction_coefficient: Fixed64::from_num(0.1),
            dead_zone: Fixed64::from_num(0.001),
            source_regen_rate: Fixed64::from_num(20),
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Aggregate figures from one solver pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowReport {
    /// Flux generated by friction this tick.
    pub byproduct: Fixed64,
    /// Sum of the magnitudes moved across all edges.
    pub moved: Fixed64,
    /// Edges whose move cleared the dead zone.
    pub active_edges: u32,
    /// Edges skipped because an endpoint is missing or the edge is malformed.
    pub skipped_edges: u32,
}

/// Output of the pure [`FlowSolver::tick`].
#[derive(Debug, Clone)]
pub struct FlowOutcome {
    pub nodes: SlotMap<NodeId, Node>,
    pub edges: SlotMap<EdgeId, Edge>,
    pub report: FlowReport,
}

impl FlowOutcome {
    /// Flux generated by this tick.
    pub fn byproduct(&self) -> Fixed64 {
        self.report.byproduct
    }
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// Stateless flow solver. Cheap to copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowSolver {
    params: SolverParams,
}

impl FlowSolver {
    pub fn new(params: SolverParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    /// Compute one tick without touching the inputs.
    pub fn tick(
        &self,
        nodes: &SlotMap<NodeId, Node>,
        edges: &SlotMap<EdgeId, Edge>,
        dt: Fixed64,
    ) -> FlowOutcome {
        let mut nodes = nodes.clone();
        let mut edges = edges.clone();
        let report = self.apply(&mut nodes, &mut edges, dt);
        FlowOutcome {
            nodes,
            edges,
            report,
        }
    }

    /// Run one tick in place.
    ///
    /// 1. Edge pass in collection order: move clamped amounts and record
    ///    each edge's flow.
    /// 2. Node pass: source nodes regenerate, clamped to capacity.
    /// 3. Every node's pressure is clamped to `[0, capacity]` so residual
    ///    error cannot accumulate across ticks.
    ///
    /// Only `Node::pressure` and `Edge::flow` are written.
    pub fn apply(
        &self,
        nodes: &mut SlotMap<NodeId, Node>,
        edges: &mut SlotMap<EdgeId, Edge>,
        dt: Fixed64,
    ) -> FlowReport {
        let mut report = FlowReport::default();

        // Phase 1: edges.
        for (id, edge) in edges.iter_mut() {
            let (Some(source), Some(target)) = (nodes.get(edge.source), nodes.get(edge.target))
            else {
                warn!(
                    edge = %id,
                    source = %edge.source,
                    target = %edge.target,
                    "skipping edge with a missing endpoint"
                );
                edge.flow = Fixed64::ZERO;
                report.skipped_edges += 1;
                continue;
            };

            if edge.source == edge.target {
                // Equal pressures on both ends: nothing can move.
                edge.flow = Fixed64::ZERO;
                continue;
            }

            let Some(amount) = self.edge_amount(source, target, edge.resistance, dt) else {
                warn!(
                    edge = %id,
                    resistance = %edge.resistance,
                    "skipping edge with non-positive resistance"
                );
                edge.flow = Fixed64::ZERO;
                report.skipped_edges += 1;
                continue;
            };

            let magnitude = amount.abs();
            if magnitude > self.params.dead_zone {
                if let Some(node) = nodes.get_mut(edge.source) {
                    node.pressure -= amount;
                }
                if let Some(node) = nodes.get_mut(edge.target) {
                    node.pressure += amount;
                }
                edge.flow = amount;
                report.byproduct = report
                    .byproduct
                    .saturating_add(magnitude.saturating_mul(self.params.friction_coefficient));
                report.moved = report.moved.saturating_add(magnitude);
                report.active_edges += 1;
            } else {
                edge.flow = Fixed64::ZERO;
            }
        }

        // Phase 2: nodes.
        let regen = self.params.source_regen_rate.saturating_mul(dt);
        for node in nodes.values_mut() {
            if node.kind == NodeKind::Source {
                node.pressure = node.pressure.saturating_add(regen).min(node.capacity);
            }
        }

        // Phase 3: safety net.
        for node in nodes.values_mut() {
            node.pressure = clamp_unit_range(node.pressure, node.capacity);
        }

        report
    }

    /// The clamped signed amount an edge moves this tick, before the dead
    /// zone. `None` when the resistance is not positive.
    ///
    /// A positive amount is capped by what the source holds and what the
    /// target can still take; a negative amount by the mirror of both.
    fn edge_amount(
        &self,
        source: &Node,
        target: &Node,
        resistance: Fixed64,
        dt: Fixed64,
    ) -> Option<Fixed64> {
        if resistance <= Fixed64::ZERO {
            return None;
        }

        let delta = source.pressure.saturating_sub(target.pressure);
        let velocity = delta
            .saturating_div(resistance)
            .saturating_mul(Fixed64::ONE - self.params.ether_drag);
        let raw = velocity
            .saturating_mul(dt)
            .saturating_mul(self.params.flow_multiplier);

        let amount = if raw > Fixed64::ZERO {
            let cap = source.pressure.max(Fixed64::ZERO).min(target.headroom());
            raw.min(cap)
        } else if raw < Fixed64::ZERO {
            let cap = target.pressure.max(Fixed64::ZERO).min(source.headroom());
            raw.saturating_neg().min(cap).saturating_neg()
        } else {
            Fixed64::ZERO
        };
        Some(amount)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
