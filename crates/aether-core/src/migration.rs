//! Snapshot version migrations.
//!
//! Each registered step rewrites a whole snapshot (header included) from
//! version `N` to `N + 1`; the registry chains steps to cross several
//! versions. [`MigrationRegistry::with_builtin`] knows every upgrade this
//! crate has shipped.

use std::collections::BTreeMap;

use crate::config::SimConfig;
use crate::fixed::{Fixed64, clamp_unit_range};
use crate::graph::{Edge, GraphParts, Node, NodeKind, Position};
use crate::id::{EdgeId, NodeId};
use crate::pool::ResourcePool;
use crate::serialize::{
    DeserializeError, SimulationSnapshot, SnapshotHeader, decode_payload, encode_snapshot,
};
use crate::sim::{SimState, SimulationStrategy};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("no migration path from version {from} to version {to}")]
    NoMigrationPath { from: u32, to: u32 },
    #[error("migration from version {from} to version {to} failed: {reason}")]
    MigrationFailed { from: u32, to: u32, reason: String },
    #[error("deserialization error: {0}")]
    Deserialize(#[from] DeserializeError),
}

/// Rewrites a snapshot from one version to the next.
pub type MigrationFn = fn(&[u8]) -> Result<Vec<u8>, MigrationError>;

/// Migration steps keyed by source version.
#[derive(Debug, Default)]
pub struct MigrationRegistry {
    migrations: BTreeMap<u32, MigrationFn>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in upgrade.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(1, migrate_v1_to_v2);
        registry
    }

    /// Register the step from `from_version` to `from_version + 1`,
    /// replacing any earlier registration.
    pub fn register(&mut self, from_version: u32, migrate: MigrationFn) {
        self.migrations.insert(from_version, migrate);
    }

    pub fn can_migrate(&self, from: u32, to: u32) -> bool {
        if from >= to {
            return from == to;
        }
        (from..to).all(|v| self.migrations.contains_key(&v))
    }

    /// Run every step from `from` up to `to`. Returns the data unchanged
    /// when `from == to`. Fails on the first missing or failing step.
    pub fn migrate(&self, data: &[u8], from: u32, to: u32) -> Result<Vec<u8>, MigrationError> {
        if from == to {
            return Ok(data.to_vec());
        }
        if from > to || !self.can_migrate(from, to) {
            return Err(MigrationError::NoMigrationPath { from, to });
        }

        let mut current = data.to_vec();
        for version in from..to {
            let migrate = self
                .migrations
                .get(&version)
                .ok_or(MigrationError::NoMigrationPath { from, to })?;
            current = migrate(&current)?;
            info!(from = version, to = version + 1, "snapshot migrated");
        }
        Ok(current)
    }

    pub fn step_count(&self) -> usize {
        self.migrations.len()
    }
}

// ---------------------------------------------------------------------------
// Version 1 layout
// ---------------------------------------------------------------------------

// Version 1 nodes had no per-node capacity; every node shared the
// configured default.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct NodeV1 {
    pub(crate) position: Position,
    pub(crate) kind: NodeKind,
    pub(crate) pressure: Fixed64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GraphPartsV1 {
    pub(crate) nodes: SlotMap<NodeId, NodeV1>,
    pub(crate) edges: SlotMap<EdgeId, Edge>,
    pub(crate) pool: ResourcePool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SnapshotV1 {
    pub(crate) graph: GraphPartsV1,
    pub(crate) config: SimConfig,
    pub(crate) strategy: SimulationStrategy,
    pub(crate) sim_state: SimState,
    pub(crate) paused: bool,
}

fn v1_failure(reason: String) -> MigrationError {
    MigrationError::MigrationFailed {
        from: 1,
        to: 2,
        reason,
    }
}

/// Give every node the default capacity, clamping pressure into it.
///
/// Nodes are re-inserted in slot order, which hands back the keys they
/// were saved under as long as the saved map has no vacant slots. A map
/// with gaps is refused rather than renumbered, since edges refer to
/// nodes by key.
fn migrate_v1_to_v2(data: &[u8]) -> Result<Vec<u8>, MigrationError> {
    let header = SnapshotHeader::from_bytes(data)?;
    if header.version != 1 {
        return Err(v1_failure(format!(
            "snapshot header says version {}",
            header.version
        )));
    }
    let old: SnapshotV1 = decode_payload(data)?;
    let capacity = old.config.defaults.node_capacity;

    let mut nodes = SlotMap::with_capacity_and_key(old.graph.nodes.len());
    for (saved, n) in old.graph.nodes {
        let mut node = Node::new(n.position, n.kind, capacity);
        node.pressure = clamp_unit_range(n.pressure, capacity);
        let id = nodes.insert(node);
        if id != saved {
            return Err(v1_failure(format!("node {saved} would be renumbered to {id}")));
        }
    }

    let snapshot = SimulationSnapshot {
        graph: GraphParts {
            nodes,
            edges: old.graph.edges,
            pool: old.graph.pool,
        },
        config: old.config,
        strategy: old.strategy,
        sim_state: old.sim_state,
        paused: old.paused,
    };

    let header = SnapshotHeader {
        version: 2,
        ..header
    };
    encode_snapshot(header, &snapshot).map_err(|e| v1_failure(e.to_string()))
}

/// Encode a version 1 snapshot, as an older build would have written it.
#[cfg(test)]
pub(crate) fn encode_v1(snapshot: &SnapshotV1, tick: u64) -> Vec<u8> {
    let header = SnapshotHeader {
        version: 1,
        ..SnapshotHeader::new(tick)
    };
    encode_snapshot(header, snapshot).unwrap()
}

// ===========================================================================
// Tests
// ===========================================================================
