//! End-to-end tests driving a [`Simulation`] through the public API the way
//! a game client would.

use std::sync::{Arc, Mutex};
use std::thread;

use aether_core::command_queue::{Command, CommandOutcome};
use aether_core::config::SimConfig;
use aether_core::economy::EconomyError;
use aether_core::engine::Simulation;
use aether_core::event::{Event, EventKind};
use aether_core::fixed::Fixed64;
use aether_core::graph::{Edge, GraphError, GraphParts, NodeKind};
use aether_core::id::NodeId;
use aether_core::migration::MigrationRegistry;
use aether_core::pool::{Currency, InsufficientBalance, ResourcePool};
use aether_core::sim::SimulationStrategy;
use aether_core::solver::FlowSolver;
use aether_core::test_utils::*;

// ===========================================================================
// Reference scenario
// ===========================================================================

/// A full source feeding an empty reservoir, plus their ids.
fn reference_parts() -> (GraphParts, NodeId, NodeId) {
    let mut parts = GraphParts {
        pool: ResourcePool::new(fixed(25.0), Fixed64::ZERO, Fixed64::ZERO),
        ..GraphParts::default()
    };
    let a = parts.nodes.insert(node_at(0.0, NodeKind::Source, 100.0));
    let b = parts.nodes.insert(node_at(1.0, NodeKind::Standard, 0.0));
    parts.edges.insert(Edge::new(a, b, fixed(1.0)));
    (parts, a, b)
}

#[test]
fn reference_scenario_solver_only() {
    let (parts, a, b) = reference_parts();
    let out = FlowSolver::default().tick(&parts.nodes, &parts.edges, fixed(1.0 / 60.0));

    let edge = out.edges.values().next().unwrap();
    assert_approx(edge.flow, 7.5);
    assert_approx(out.byproduct(), 0.75);
    assert_approx(out.nodes[a].pressure, 92.5 + 20.0 / 60.0);
    assert_approx(out.nodes[b].pressure, 7.5);

    // Inputs untouched.
    assert_eq!(parts.nodes[b].pressure, Fixed64::ZERO);
}

#[test]
fn reference_scenario_through_simulation() {
    let (parts, _, b) = reference_parts();
    let mut sim = Simulation::with_graph(SimConfig::default(), parts).unwrap();
    sim.step();

    assert_approx(sim.pool().flux(), 0.75);
    assert_eq!(sim.pool().build(), fixed(25.0) + fixed(0.1));
    assert_approx(sim.graph().node(b).unwrap().pressure, 7.5);
}

// ===========================================================================
// Mutation contracts
// ===========================================================================

#[test]
fn reversed_duplicate_edge_is_a_no_op() {
    let mut sim = sim_with_build(100.0);
    let (a, b, e) = source_and_sink(&mut sim);
    let pool = *sim.pool();
    let before = sim.graph().to_parts();

    let err = sim.add_edge(b, a).unwrap_err();

    assert_eq!(
        err,
        GraphError::DuplicateEdge {
            a: b,
            b: a,
            existing: e
        }
    );
    assert_eq!(*sim.pool(), pool);
    assert_eq!(sim.graph().to_parts(), before);
}

#[test]
fn unaffordable_node_changes_nothing() {
    let mut sim = sim_with_build(9.0);
    let before = sim.graph().to_parts();

    assert!(matches!(
        sim.add_node(3.0, 4.0, NodeKind::Standard),
        Err(GraphError::InsufficientFunds(_))
    ));
    assert_eq!(sim.graph().to_parts(), before);
}

#[test]
fn sources_are_free_even_when_broke() {
    let mut sim = sim_with_build(0.0);
    let ids: Vec<NodeId> = (0..5)
        .map(|i| sim.add_node(i as f32, 0.0, NodeKind::Source).unwrap())
        .collect();
    assert_eq!(sim.pool().build(), Fixed64::ZERO);
    assert_eq!(node_ids(&sim), ids);
}

#[test]
fn edges_to_unknown_nodes_are_rejected() {
    let mut sim = sim_with_build(100.0);
    let a = sim.add_node(0.0, 0.0, NodeKind::Source).unwrap();
    let unknown = NodeId::default();
    assert_eq!(
        sim.add_edge(a, unknown),
        Err(GraphError::NodeNotFound(unknown))
    );
    assert_eq!(sim.pool().build(), fixed(100.0));
}

// ===========================================================================
// Idle session
// ===========================================================================

#[test]
fn idle_session_earns_and_exchanges() {
    let mut sim = sim_with_build(25.0);
    let (_, b, _) = source_and_sink(&mut sim);
    assert_eq!(sim.pool().build(), fixed(10.0));

    // A second sink further down the line once it is affordable.
    let c = sim.add_node(2.0, 0.0, NodeKind::Standard).unwrap();
    assert_eq!(
        sim.add_edge(b, c).unwrap_err(),
        GraphError::InsufficientFunds(InsufficientBalance {
            currency: Currency::Build,
            needed: fixed(5.0),
            available: Fixed64::ZERO,
        })
    );

    // 50 trickle ticks pay for the edge.
    for _ in 0..50 {
        sim.step();
    }
    sim.add_edge(b, c).unwrap();

    let before = sim.pool().flux();
    for _ in 0..600 {
        sim.step();
        assert_pressure_invariant(&sim);
    }
    assert!(sim.pool().flux() > before);
    assert_eq!(sim.tick(), 650);
}

#[test]
fn exchange_needs_full_price() {
    let mut sim = Simulation::new(SimConfig {
        seed: ResourcePool::new(Fixed64::ZERO, fixed(250.0), Fixed64::ZERO),
        ..SimConfig::default()
    })
    .unwrap();

    assert_eq!(sim.exchanges_available(), 2);
    sim.exchange().unwrap();
    sim.exchange().unwrap();
    let pool = *sim.pool();
    assert_eq!(
        sim.exchange(),
        Err(EconomyError::InsufficientFlux {
            needed: fixed(100.0),
            available: fixed(50.0),
        })
    );
    assert_eq!(*sim.pool(), pool);
    assert_eq!(sim.pool().prestige(), fixed(2.0));
}

#[test]
fn queued_commands_and_events_line_up() {
    let mut sim = sim_with_build(50.0);
    let a = sim.add_node(0.0, 0.0, NodeKind::Source).unwrap();
    let b = sim.add_node(1.0, 0.0, NodeKind::Standard).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    sim.on_passive(
        EventKind::EdgeAdded,
        Box::new(move |e: &Event| sink.lock().unwrap().push(e.clone())),
    );

    sim.submit_batch([
        Command::AddNode {
            x: 2.0,
            y: 0.0,
            kind: NodeKind::Standard,
        },
        Command::AddEdge {
            source: a,
            target: b,
        },
        Command::AddEdge {
            source: b,
            target: a,
        },
    ]);
    let result = sim.step();

    assert_eq!(result.command_results.len(), 3);
    let edge = sim.graph().edge_between(a, b).unwrap();
    assert_eq!(
        result.command_results[1],
        Ok(CommandOutcome::EdgeAdded(edge))
    );
    assert!(result.command_results[2].is_err());
    assert_eq!(
        *seen.lock().unwrap(),
        vec![Event::EdgeAdded {
            edge,
            source: a,
            target: b,
            tick: 0,
        }]
    );
}

// ===========================================================================
// Time and determinism
// ===========================================================================

#[test]
fn frame_rate_does_not_change_results() {
    let step = fixed(1.0 / 60.0);
    let strategy = SimulationStrategy::FixedStep { step };

    let mut fast = sim_from_parts(chain_parts(6, 3)).with_strategy(strategy);
    let mut slow = sim_from_parts(chain_parts(6, 3)).with_strategy(strategy);

    // 120 Hz vs 30 Hz render frames over one second.
    for _ in 0..120 {
        fast.advance(fixed(1.0 / 120.0));
    }
    for _ in 0..30 {
        slow.advance(fixed(1.0 / 30.0));
    }

    for sim in [&fast, &slow] {
        assert!((59..=60).contains(&sim.tick()));
        let mut reference = sim_from_parts(chain_parts(6, 3));
        for _ in 0..sim.tick() {
            reference.tick_with_dt(step);
        }
        assert_eq!(node_states(&reference), node_states(sim));
    }
}

#[test]
fn save_and_continue_matches_uninterrupted_run() {
    let mut uninterrupted = sim_from_parts(grid_parts(4, 4));
    for _ in 0..90 {
        uninterrupted.step();
    }
    let saved = uninterrupted.serialize().unwrap();
    for _ in 0..90 {
        uninterrupted.step();
    }

    let mut restored = sim_from_parts(chain_parts(2, 1));
    restored
        .load_snapshot(&saved, &MigrationRegistry::with_builtin())
        .unwrap();
    for _ in 0..90 {
        restored.step();
    }

    assert_eq!(restored.tick(), 180);
    assert_eq!(restored.state_hash(), uninterrupted.state_hash());
}

#[test]
fn prestige_cycle_reseeds() {
    let mut sim = sim_with_build(100.0);
    source_and_sink(&mut sim);
    for _ in 0..200 {
        sim.step();
    }
    let resets = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&resets);
    sim.on_passive(
        EventKind::SimulationReset,
        Box::new(move |_: &Event| *counter.lock().unwrap() += 1),
    );

    sim.reset();
    assert_eq!(*sim.pool(), sim.config().seed);
    assert_eq!(sim.graph().node_count(), 0);
    sim.deliver_events();
    assert_eq!(*resets.lock().unwrap(), 1);

    let (a, b, e) = source_and_sink(&mut sim);
    assert_eq!(node_ids(&sim), vec![a, b]);
    assert_eq!(sim.graph().edge_between(a, b), Some(e));
    sim.step();
    assert_pressure_invariant(&sim);
}

// ===========================================================================
// Single writer across threads
// ===========================================================================

#[test]
fn driver_and_player_share_behind_a_mutex() {
    let sim = Arc::new(Mutex::new(sim_with_build(200.0)));
    let mut last = sim
        .lock()
        .unwrap()
        .add_node(0.0, 0.0, NodeKind::Source)
        .unwrap();

    let driver = {
        let sim = Arc::clone(&sim);
        thread::spawn(move || {
            for _ in 0..300 {
                sim.lock().unwrap().step();
            }
        })
    };

    for i in 1..6 {
        let mut guard = sim.lock().unwrap();
        if let Ok(node) = guard.add_node(i as f32, 0.0, NodeKind::Standard) {
            let _ = guard.add_edge(last, node);
            last = node;
        }
        assert_pressure_invariant(&guard);
    }

    driver.join().unwrap();
    let guard = sim.lock().unwrap();
    assert_eq!(guard.tick(), 300);
    assert_pressure_invariant(&guard);
}
