//! Save/load example: snapshot a running simulation, keep an undo ring,
//! and restore both into fresh instances.
//!
//! Run with: `cargo run -p aether-core --example save_load`

use aether_core::engine::Simulation;
use aether_core::graph::NodeKind;
use aether_core::migration::MigrationRegistry;
use aether_core::serialize::{SnapshotRingBuffer, read_snapshot_header};

fn main() {
    let mut sim = Simulation::default();
    let a = sim.add_node(0.0, 0.0, NodeKind::Source).expect("sources are free");
    let b = sim.add_node(1.0, 0.0, NodeKind::Standard).expect("seed covers a node");
    sim.add_edge(a, b).expect("seed covers an edge");

    let mut undo = SnapshotRingBuffer::new(4);
    for second in 0..6 {
        for _ in 0..60 {
            sim.step();
        }
        sim.take_snapshot(&mut undo).expect("snapshot encodes");
        println!("second {second}: hash {:016x}", sim.state_hash());
    }

    // --- Save file ---

    let bytes = sim.serialize().expect("snapshot encodes");
    let header = read_snapshot_header(&bytes).expect("fresh snapshot");
    println!(
        "\nsaved {} bytes (format v{}, tick {})",
        bytes.len(),
        header.version,
        header.tick
    );

    let mut loaded = Simulation::default();
    loaded
        .load_snapshot(&bytes, &MigrationRegistry::with_builtin())
        .expect("current format loads");
    assert_eq!(loaded.state_hash(), sim.state_hash());
    println!("loaded: hash matches, tick {}", loaded.tick());

    // --- Undo ---

    println!("\nundo ring holds {} of {} snapshots", undo.len(), undo.total_taken());
    let oldest = Simulation::restore_snapshot(&undo, 0)
        .expect("ring entries decode")
        .expect("ring is not empty");
    println!("oldest undo point: tick {}", oldest.tick());
}
