//! Idle loop example: a frame driver feeding wall-clock time into a
//! fixed-step simulation while the player grows the network.
//!
//! Run with: `RUST_LOG=aether_core=debug cargo run -p aether-core --example idle_loop`

use aether_core::config::SimConfig;
use aether_core::engine::Simulation;
use aether_core::event::{Event, EventKind};
use aether_core::fixed::{Fixed64, f64_to_fixed64};
use aether_core::graph::NodeKind;
use aether_core::sim::SimulationStrategy;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = SimConfig::default();
    let mut sim = Simulation::new(config)
        .expect("default config is valid")
        .with_strategy(SimulationStrategy::FixedStep {
            step: config.fixed_step,
        });

    sim.on_passive(
        EventKind::NodeSaturated,
        Box::new(|e: &Event| println!("  saturated: {e:?}")),
    );

    // Sources are free; the starting build currency pays for one sink and
    // one pipe.
    let well = sim.add_node(0.0, 0.0, NodeKind::Source).expect("sources are free");
    let tank = sim.add_node(1.0, 0.0, NodeKind::Standard).expect("seed covers a node");
    sim.add_edge(well, tank).expect("seed covers an edge");

    // Simulate ten minutes of uneven render frames (roughly 45 fps).
    let frame_times = [0.016, 0.033, 0.021, 0.018];
    let mut frames = 0u64;
    let mut next_tank = 2.0f32;
    let mut last = tank;
    while sim.tick() < 10 * 60 * 60 {
        let elapsed = f64_to_fixed64(frame_times[(frames % 4) as usize]);
        sim.advance(elapsed);
        frames += 1;

        // Expand whenever the build currency allows.
        if sim.pool().build() >= Fixed64::from_num(15) {
            let next = sim
                .add_node(next_tank, 0.0, NodeKind::Standard)
                .expect("balance checked");
            sim.add_edge(last, next).expect("balance checked");
            last = next;
            next_tank += 1.0;
        }
        while sim.exchanges_available() > 0 {
            let receipt = sim.exchange().expect("exchange available");
            println!(
                "tick {:>6}: exchanged {} flux for {} prestige",
                sim.tick(),
                receipt.flux_spent,
                receipt.prestige_gained
            );
        }
    }

    let pool = sim.pool_view();
    println!("\n=== After {} frames / {} ticks ===", frames, sim.tick());
    println!("nodes: {}  edges: {}", sim.graph().node_count(), sim.graph().edge_count());
    println!(
        "build: {:.2}  flux: {:.2}  prestige: {:.0}",
        pool.build, pool.flux, pool.prestige
    );
    for node in sim.node_views() {
        println!(
            "  {}: {:>6.2} / {:.0} ({:.0}%)",
            node.id,
            node.pressure,
            node.capacity,
            node.fill * 100.0
        );
    }
}
