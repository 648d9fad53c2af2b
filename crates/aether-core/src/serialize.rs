//! Snapshot persistence for the simulation.
//!
//! A snapshot is a fixed 16-byte little-endian header (magic, format
//! version, tick) followed by a `bitcode` payload. The header can be read
//! without decoding the payload, so version checks and migrations happen
//! before any state is touched.
//!
//! Event subscribers and queued commands are not persisted.

use crate::config::{ConfigError, SimConfig};
use crate::engine::{Simulation, hash_pool};
use crate::graph::{GraphParts, GraphStore};
use crate::migration::MigrationRegistry;
use crate::sim::{SimState, SimulationStrategy, StateHash};
use serde::{Deserialize, Serialize};
use slotmap::Key;
use tracing::info;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Identifies an Aether snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0xAE7E_0001;

/// Current payload layout. Bump when the wire format changes and register
/// a migration from the previous version.
pub const FORMAT_VERSION: u32 = 2;

/// Bytes before the payload.
pub const HEADER_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("data too short for snapshot header: {0} bytes")]
    TooShort(usize),
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("migration failed: {0}")]
    Migration(String),
    #[error("snapshot carries an invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Tick count when the snapshot was taken.
    pub tick: u64,
}

impl SnapshotHeader {
    /// A header for the current format version.
    pub fn new(tick: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..8].copy_from_slice(&self.version.to_le_bytes());
        out[8..16].copy_from_slice(&self.tick.to_le_bytes());
        out
    }

    /// Parse the first [`HEADER_LEN`] bytes. Does not check magic or version.
    pub fn from_bytes(data: &[u8]) -> Result<Self, DeserializeError> {
        let Some(bytes) = data.get(..HEADER_LEN) else {
            return Err(DeserializeError::TooShort(data.len()));
        };
        let mut magic = [0u8; 4];
        let mut version = [0u8; 4];
        let mut tick = [0u8; 8];
        magic.copy_from_slice(&bytes[0..4]);
        version.copy_from_slice(&bytes[4..8]);
        tick.copy_from_slice(&bytes[8..16]);
        Ok(Self {
            magic: u32::from_le_bytes(magic),
            version: u32::from_le_bytes(version),
            tick: u64::from_le_bytes(tick),
        })
    }

    /// Accept only the current magic and version.
    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// Read and magic-check the header without decoding the payload.
pub fn read_snapshot_header(data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
    let header = SnapshotHeader::from_bytes(data)?;
    if header.magic != SNAPSHOT_MAGIC {
        return Err(DeserializeError::InvalidMagic(header.magic));
    }
    Ok(header)
}

pub(crate) fn encode_snapshot<T: Serialize>(
    header: SnapshotHeader,
    payload: &T,
) -> Result<Vec<u8>, SerializeError> {
    let body = bitcode::serialize(payload).map_err(|e| SerializeError::Encode(e.to_string()))?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

pub(crate) fn decode_payload<'a, T: Deserialize<'a>>(
    data: &'a [u8],
) -> Result<T, DeserializeError> {
    let body = data
        .get(HEADER_LEN..)
        .ok_or(DeserializeError::TooShort(data.len()))?;
    bitcode::deserialize(body).map_err(|e| DeserializeError::Decode(e.to_string()))
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// The persisted portion of a [`Simulation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SimulationSnapshot {
    pub(crate) graph: GraphParts,
    pub(crate) config: SimConfig,
    pub(crate) strategy: SimulationStrategy,
    pub(crate) sim_state: SimState,
    pub(crate) paused: bool,
}

// ---------------------------------------------------------------------------
// SubsystemHashes
// ---------------------------------------------------------------------------

/// Per-part hashes for narrowing down where two runs diverged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsystemHashes {
    pub nodes: u64,
    pub edges: u64,
    pub pool: u64,
    pub sim_state: u64,
}

// ---------------------------------------------------------------------------
// SnapshotRingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity ring of serialized snapshots, for undo. When full, the
/// oldest snapshot is evicted.
#[derive(Debug)]
pub struct SnapshotRingBuffer {
    entries: Vec<Option<SnapshotEntry>>,
    head: usize,
    len: usize,
    total_taken: u64,
}

#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub tick: u64,
    pub data: Vec<u8>,
}

impl SnapshotRingBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_taken: 0,
        }
    }

    pub fn push(&mut self, entry: SnapshotEntry) {
        self.entries[self.head] = Some(entry);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_taken += 1;
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Includes evicted snapshots.
    pub fn total_taken(&self) -> u64 {
        self.total_taken
    }

    /// 0 is the oldest stored snapshot.
    pub fn get(&self, index: usize) -> Option<&SnapshotEntry> {
        if index >= self.len {
            return None;
        }
        let start = if self.len < self.capacity() {
            0
        } else {
            self.head
        };
        self.entries[(start + index) % self.capacity()].as_ref()
    }

    pub fn latest(&self) -> Option<&SnapshotEntry> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            *entry = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// Simulation persistence
// ---------------------------------------------------------------------------

impl Simulation {
    /// Encode the whole simulation state.
    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        let snapshot = SimulationSnapshot {
            graph: self.graph.to_parts(),
            config: self.config,
            strategy: self.strategy,
            sim_state: self.sim_state,
            paused: self.paused,
        };
        encode_snapshot(SnapshotHeader::new(self.sim_state.tick), &snapshot)
    }

    /// Decode a snapshot written by this format version.
    ///
    /// Older versions are refused with `UnsupportedVersion`; use
    /// [`deserialize_with_migrations`](Self::deserialize_with_migrations) to
    /// upgrade them. The event bus starts empty with no subscribers.
    pub fn deserialize(data: &[u8]) -> Result<Self, DeserializeError> {
        SnapshotHeader::from_bytes(data)?.validate()?;
        let snapshot: SimulationSnapshot = decode_payload(data)?;
        Self::from_snapshot(snapshot)
    }

    /// Decode a snapshot, first upgrading it through `migrations` if it was
    /// written by an older version. Fails when no migration chain reaches
    /// the current version.
    pub fn deserialize_with_migrations(
        data: &[u8],
        migrations: &MigrationRegistry,
    ) -> Result<Self, DeserializeError> {
        let header = read_snapshot_header(data)?;
        match header.version {
            v if v > FORMAT_VERSION => Err(DeserializeError::FutureVersion(v)),
            FORMAT_VERSION => Self::deserialize(data),
            old => {
                let migrated = migrations
                    .migrate(data, old, FORMAT_VERSION)
                    .map_err(|e| DeserializeError::Migration(e.to_string()))?;
                Self::deserialize(&migrated)
            }
        }
    }

    fn from_snapshot(snapshot: SimulationSnapshot) -> Result<Self, DeserializeError> {
        snapshot.config.validate()?;
        let config = snapshot.config;
        let graph = GraphStore::from_parts(snapshot.graph, config.prices, config.defaults);
        let mut sim = Simulation::assemble(config, graph).with_strategy(snapshot.strategy);
        sim.sim_state = snapshot.sim_state;
        sim.paused = snapshot.paused;
        sim.last_state_hash = sim.compute_state_hash();
        Ok(sim)
    }

    /// Replace this simulation's state with a snapshot, migrating if needed.
    ///
    /// Everything is decoded before anything is replaced, so a failed load
    /// leaves the simulation untouched. Subscribers and suppression
    /// settings survive; buffered events and queued commands are dropped.
    pub fn load_snapshot(
        &mut self,
        data: &[u8],
        migrations: &MigrationRegistry,
    ) -> Result<(), DeserializeError> {
        let mut loaded = Self::deserialize_with_migrations(data, migrations)?;
        loaded.event_bus = std::mem::take(&mut self.event_bus);
        loaded.event_bus.clear_all();
        *self = loaded;
        info!(
            tick = self.sim_state.tick,
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "snapshot imported"
        );
        Ok(())
    }

    pub fn take_snapshot(&self, buffer: &mut SnapshotRingBuffer) -> Result<(), SerializeError> {
        let data = self.serialize()?;
        buffer.push(SnapshotEntry {
            tick: self.sim_state.tick,
            data,
        });
        Ok(())
    }

    /// Decode snapshot `index` (0 = oldest). `Ok(None)` when out of range.
    pub fn restore_snapshot(
        buffer: &SnapshotRingBuffer,
        index: usize,
    ) -> Result<Option<Simulation>, DeserializeError> {
        let Some(entry) = buffer.get(index) else {
            return Ok(None);
        };
        Simulation::deserialize(&entry.data).map(Some)
    }

    pub fn subsystem_hashes(&self) -> SubsystemHashes {
        let mut nodes = StateHash::new();
        for (id, node) in self.graph.nodes() {
            nodes.write_u64(id.data().as_ffi());
            nodes.write_u8(node.kind as u8);
            nodes.write_fixed64(node.pressure);
            nodes.write_fixed64(node.capacity);
        }

        let mut edges = StateHash::new();
        for (id, edge) in self.graph.edges() {
            edges.write_u64(id.data().as_ffi());
            edges.write_u64(edge.source.data().as_ffi());
            edges.write_u64(edge.target.data().as_ffi());
            edges.write_fixed64(edge.resistance);
            edges.write_fixed64(edge.flow);
        }

        let mut pool = StateHash::new();
        hash_pool(&mut pool, self.graph.pool());

        let mut sim_state = StateHash::new();
        sim_state.write_u64(self.sim_state.tick);
        sim_state.write_fixed64(self.sim_state.accumulator);

        SubsystemHashes {
            nodes: nodes.finish(),
            edges: edges.finish(),
            pool: pool.finish(),
            sim_state: sim_state.finish(),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::Fixed64;
    use crate::graph::NodeKind;
    use crate::test_utils::*;

    fn grown() -> Simulation {
        let mut sim = sim_with_build(100.0);
        let (a, b, _) = source_and_sink(&mut sim);
        let c = sim.add_node(2.0, 0.0, NodeKind::Standard).unwrap();
        sim.add_edge(b, c).unwrap();
        sim.add_edge(c, a).unwrap();
        for _ in 0..45 {
            sim.step();
        }
        sim
    }

    // -----------------------------------------------------------------------
    // Header
    // -----------------------------------------------------------------------

    #[test]
    fn header_layout_is_little_endian() {
        let bytes = SnapshotHeader::new(0x0102).to_bytes();
        assert_eq!(&bytes[0..4], &SNAPSHOT_MAGIC.to_le_bytes());
        assert_eq!(&bytes[4..8], &FORMAT_VERSION.to_le_bytes());
        assert_eq!(bytes[8], 0x02);
        assert_eq!(bytes[9], 0x01);
    }

    #[test]
    fn header_read_without_payload() {
        let sim = grown();
        let data = sim.serialize().unwrap();
        let header = read_snapshot_header(&data).unwrap();
        assert_eq!(header.tick, 45);
        assert_eq!(header.version, FORMAT_VERSION);
    }

    #[test]
    fn short_data_is_rejected() {
        assert!(matches!(
            Simulation::deserialize(&[1, 2, 3]),
            Err(DeserializeError::TooShort(3))
        ));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut data = grown().serialize().unwrap();
        data[0] ^= 0xFF;
        assert!(matches!(
            Simulation::deserialize(&data),
            Err(DeserializeError::InvalidMagic(_))
        ));
    }

    #[test]
    fn future_version_is_rejected() {
        let mut data = grown().serialize().unwrap();
        data[4..8].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
        assert!(matches!(
            Simulation::deserialize(&data),
            Err(DeserializeError::FutureVersion(_))
        ));
        assert!(matches!(
            Simulation::deserialize_with_migrations(&data, &MigrationRegistry::with_builtin()),
            Err(DeserializeError::FutureVersion(_))
        ));
    }

    #[test]
    fn older_version_needs_migration() {
        let mut data = grown().serialize().unwrap();
        data[4..8].copy_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            Simulation::deserialize(&data),
            Err(DeserializeError::UnsupportedVersion(0))
        ));
        // No chain from version 0.
        assert!(matches!(
            Simulation::deserialize_with_migrations(&data, &MigrationRegistry::with_builtin()),
            Err(DeserializeError::Migration(_))
        ));
    }

    #[test]
    fn truncated_payload_fails_to_decode() {
        let data = grown().serialize().unwrap();
        let cut = &data[..HEADER_LEN + 3];
        assert!(matches!(
            Simulation::deserialize(cut),
            Err(DeserializeError::Decode(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Round trip
    // -----------------------------------------------------------------------

    #[test]
    fn restored_simulation_continues_identically() {
        let mut original = grown();
        let data = original.serialize().unwrap();
        let mut restored = Simulation::deserialize(&data).unwrap();

        assert_eq!(restored.state_hash(), original.state_hash());
        assert_eq!(restored.subsystem_hashes(), original.subsystem_hashes());

        for _ in 0..30 {
            original.step();
            restored.step();
        }
        assert_eq!(restored.state_hash(), original.state_hash());
        assert_eq!(node_states(&restored), node_states(&original));
    }

    #[test]
    fn restored_graph_hands_out_fresh_ids() {
        let original = grown();
        let held = node_ids(&original);
        let mut restored = Simulation::deserialize(&original.serialize().unwrap()).unwrap();
        assert_eq!(node_ids(&restored), held);

        let next = restored.add_node(0.0, 0.0, NodeKind::Source).unwrap();
        assert!(!held.contains(&next));
        assert_eq!(node_ids(&restored).last(), Some(&next));
        for id in held {
            assert!(restored.graph().contains_node(id));
        }
    }

    #[test]
    fn invalid_config_in_snapshot_is_rejected() {
        let mut sim = grown();
        sim.config.defaults.edge_resistance = Fixed64::ZERO;
        let data = sim.serialize().unwrap();
        assert!(matches!(
            Simulation::deserialize(&data),
            Err(DeserializeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn load_snapshot_replaces_state_and_keeps_subscribers() {
        let saved = grown();
        let data = saved.serialize().unwrap();

        let mut live = Simulation::default();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(0usize));
        let sink = std::sync::Arc::clone(&seen);
        live.on_passive(
            crate::event::EventKind::NodeAdded,
            Box::new(move |_: &crate::event::Event| *sink.lock().unwrap() += 1),
        );
        live.add_node(0.0, 0.0, NodeKind::Source).unwrap();

        live.load_snapshot(&data, &MigrationRegistry::with_builtin())
            .unwrap();

        assert_eq!(live.state_hash(), saved.state_hash());
        // The pre-load NodeAdded was dropped with the old buffers.
        live.deliver_events();
        assert_eq!(*seen.lock().unwrap(), 0);
        live.add_node(0.0, 0.0, NodeKind::Source).unwrap();
        live.deliver_events();
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn failed_load_leaves_state_untouched() {
        let mut live = grown();
        let hash = live.state_hash();
        assert!(live
            .load_snapshot(&[0u8; 4], &MigrationRegistry::with_builtin())
            .is_err());
        assert_eq!(live.state_hash(), hash);
    }

    // -----------------------------------------------------------------------
    // Ring buffer
    // -----------------------------------------------------------------------

    #[test]
    fn ring_buffer_evicts_oldest() {
        let mut sim = grown();
        let mut ring = SnapshotRingBuffer::new(2);
        for _ in 0..3 {
            sim.take_snapshot(&mut ring).unwrap();
            sim.step();
        }
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.total_taken(), 3);
        assert_eq!(ring.get(0).map(|e| e.tick), Some(46));
        assert_eq!(ring.latest().map(|e| e.tick), Some(47));
        assert!(ring.get(2).is_none());
    }

    #[test]
    fn restore_from_ring_buffer() {
        let mut sim = grown();
        let mut ring = SnapshotRingBuffer::new(4);
        sim.take_snapshot(&mut ring).unwrap();
        let hash = sim.state_hash();
        for _ in 0..10 {
            sim.step();
        }

        let restored = Simulation::restore_snapshot(&ring, 0).unwrap().unwrap();
        assert_eq!(restored.state_hash(), hash);
        assert!(Simulation::restore_snapshot(&ring, 3).unwrap().is_none());

        ring.clear();
        assert!(ring.is_empty());
        assert!(ring.latest().is_none());
    }
}
