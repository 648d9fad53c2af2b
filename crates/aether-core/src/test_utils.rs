//! Shared test helpers for unit tests, integration tests, and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::config::SimConfig;
use crate::engine::Simulation;
use crate::fixed::Fixed64;
use crate::graph::{Edge, GraphParts, Node, NodeKind, Position};
use crate::id::{EdgeId, NodeId};
use crate::pool::ResourcePool;

// ===========================================================================
// Fixed-point helpers
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Assert `actual` is within 1e-6 of `expected`.
#[track_caller]
pub fn assert_approx(actual: Fixed64, expected: f64) {
    let got = actual.to_num::<f64>();
    assert!(
        (got - expected).abs() < 1e-6,
        "expected {expected}, got {got}"
    );
}

// ===========================================================================
// Simulation builders
// ===========================================================================

/// A default-config simulation whose pool starts with `build` currency.
pub fn sim_with_build(build: f64) -> Simulation {
    let config = SimConfig {
        seed: ResourcePool::new(fixed(build), Fixed64::ZERO, Fixed64::ZERO),
        ..SimConfig::default()
    };
    Simulation::new(config).unwrap()
}

/// Place a source, a standard node, and an edge from the source to it.
/// Costs one node and one edge.
pub fn source_and_sink(sim: &mut Simulation) -> (NodeId, NodeId, EdgeId) {
    let a = sim.add_node(0.0, 0.0, NodeKind::Source).unwrap();
    let b = sim.add_node(1.0, 0.0, NodeKind::Standard).unwrap();
    let e = sim.add_edge(a, b).unwrap();
    (a, b, e)
}

/// A node of capacity 100 placed at `(x, 0)`.
pub fn node_at(x: f32, kind: NodeKind, pressure: f64) -> Node {
    let mut n = Node::new(Position { x, y: 0.0 }, kind, fixed(100.0));
    n.pressure = fixed(pressure);
    n
}

/// `len` nodes in a line, first to last. Every `source_every`-th node
/// (starting with the first) is a full source; the rest start empty.
/// `source_every == 0` means no sources.
pub fn chain_parts(len: u32, source_every: u32) -> GraphParts {
    let mut parts = GraphParts::default();
    let ids: Vec<NodeId> = (0..len)
        .map(|i| {
            let node = if source_every > 0 && i % source_every == 0 {
                node_at(i as f32, NodeKind::Source, 100.0)
            } else {
                node_at(i as f32, NodeKind::Standard, 0.0)
            };
            parts.nodes.insert(node)
        })
        .collect();
    for pair in ids.windows(2) {
        parts.edges.insert(Edge::new(pair[0], pair[1], fixed(1.0)));
    }
    parts
}

/// A `width x height` grid with edges to the right and downward
/// neighbours. Node pressures follow a fixed ramp; the top-left corner is
/// a source.
pub fn grid_parts(width: u32, height: u32) -> GraphParts {
    let mut parts = GraphParts::default();
    let mut ids = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let kind = if i == 0 {
                NodeKind::Source
            } else {
                NodeKind::Standard
            };
            let mut n = node_at(x as f32, kind, f64::from((i * 37) % 101));
            n.position.y = y as f32;
            ids.push(parts.nodes.insert(n));
        }
    }

    for y in 0..height {
        for x in 0..width {
            let i = (y * width + x) as usize;
            if x + 1 < width {
                parts.edges.insert(Edge::new(ids[i], ids[i + 1], fixed(1.0)));
            }
            if y + 1 < height {
                let below = i + width as usize;
                parts.edges.insert(Edge::new(ids[i], ids[below], fixed(2.0)));
            }
        }
    }
    parts
}

/// A default-config simulation around `parts`.
pub fn sim_from_parts(parts: GraphParts) -> Simulation {
    Simulation::with_graph(SimConfig::default(), parts).unwrap()
}

// ===========================================================================
// Invariant checks
// ===========================================================================

/// Assert every node holds pressure in `[0, capacity]`.
#[track_caller]
pub fn assert_pressure_invariant(sim: &Simulation) {
    for (id, node) in sim.graph().nodes() {
        assert!(
            node.pressure >= Fixed64::ZERO && node.pressure <= node.capacity,
            "{id} pressure {} outside [0, {}]",
            node.pressure,
            node.capacity
        );
    }
}

/// Ids and node states in iteration order, for whole-graph comparisons.
pub fn node_states(sim: &Simulation) -> Vec<(NodeId, Node)> {
    sim.graph()
        .nodes()
        .iter()
        .map(|(id, node)| (id, node.clone()))
        .collect()
}

/// Node ids in iteration order.
pub fn node_ids(sim: &Simulation) -> Vec<NodeId> {
    sim.graph().nodes().keys().collect()
}
