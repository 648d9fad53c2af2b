//! Replay recording and playback.
//!
//! A [`ReplayLog`] is a starting snapshot plus the player actions and time
//! steps applied after it. Because every tick is deterministic, playing
//! the log back reproduces the recorded run bit for bit; hash checkpoints
//! recorded along the way pinpoint the first command where a playback
//! diverged.
//!
//! Only the snapshot and the logged calls are replayed. Queued commands and
//! subscribers are not part of a snapshot, so recording refuses to start
//! while commands are pending, and a recorded simulation should not have
//! reactive subscribers whose commands would go unlogged.

use crate::engine::Simulation;
use crate::fixed::Fixed64;
use crate::graph::NodeKind;
use crate::id::NodeId;
use crate::serialize::{DeserializeError, SerializeError};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Commands that would run on the next tick but are not in the snapshot.
    #[error("{0} commands are pending; step or reset before recording")]
    PendingCommands(usize),
    #[error(transparent)]
    Serialize(#[from] SerializeError),
}

// ---------------------------------------------------------------------------
// ReplayCommand
// ---------------------------------------------------------------------------

/// One recorded call on a [`Simulation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplayCommand {
    Step,
    Advance { elapsed: Fixed64 },
    TickWithDt { dt: Fixed64 },
    AddNode { x: f32, y: f32, kind: NodeKind },
    AddEdge { source: NodeId, target: NodeId },
    Exchange,
    Reset,
}

// ---------------------------------------------------------------------------
// ReplayMismatch
// ---------------------------------------------------------------------------

/// Where playback first disagreed with the recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayMismatch {
    pub command_index: usize,
    pub expected_hash: u64,
    pub actual_hash: u64,
}

// ---------------------------------------------------------------------------
// ReplayLog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayLog {
    /// Serialized simulation at the start of recording.
    pub initial_snapshot: Vec<u8>,
    pub commands: Vec<ReplayCommand>,
    /// `(command_index, state_hash after that command)`.
    pub hash_checkpoints: Vec<(usize, u64)>,
}

impl ReplayLog {
    /// Start recording from the current state of `sim`. Refused while
    /// `sim` has commands waiting for the next tick.
    pub fn new(sim: &Simulation) -> Result<Self, RecordError> {
        let pending = sim.pending_command_count();
        if pending > 0 {
            return Err(RecordError::PendingCommands(pending));
        }
        Ok(Self {
            initial_snapshot: sim.serialize()?,
            commands: Vec::new(),
            hash_checkpoints: Vec::new(),
        })
    }

    pub fn record(&mut self, cmd: ReplayCommand) {
        self.commands.push(cmd);
    }

    /// Record a command together with the state hash observed after it ran.
    pub fn record_with_hash(&mut self, cmd: ReplayCommand, hash: u64) {
        let index = self.commands.len();
        self.commands.push(cmd);
        self.hash_checkpoints.push((index, hash));
    }

    /// Run `cmd` on `sim` and record it with the resulting hash.
    pub fn apply_and_record(&mut self, sim: &mut Simulation, cmd: ReplayCommand) {
        apply_command(sim, &cmd);
        self.record_with_hash(cmd, sim.state_hash());
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        bitcode::serialize(self).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, DeserializeError> {
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// ReplayResult
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ReplayResult {
    pub commands_executed: usize,
    /// Every checkpoint matched.
    pub is_verified: bool,
    pub first_mismatch: Option<ReplayMismatch>,
    /// State after the last command.
    pub simulation: Simulation,
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

/// Rejected mutations are part of the recording too: they replay as the
/// same rejections and leave state untouched.
fn apply_command(sim: &mut Simulation, cmd: &ReplayCommand) {
    match *cmd {
        ReplayCommand::Step => {
            sim.step();
        }
        ReplayCommand::Advance { elapsed } => {
            sim.advance(elapsed);
        }
        ReplayCommand::TickWithDt { dt } => {
            sim.tick_with_dt(dt);
        }
        ReplayCommand::AddNode { x, y, kind } => {
            let _ = sim.add_node(x, y, kind);
        }
        ReplayCommand::AddEdge { source, target } => {
            let _ = sim.add_edge(source, target);
        }
        ReplayCommand::Exchange => {
            let _ = sim.exchange();
        }
        ReplayCommand::Reset => sim.reset(),
    }
}

/// Play a log back, checking every hash checkpoint.
pub fn replay_and_verify(log: &ReplayLog) -> Result<ReplayResult, DeserializeError> {
    let mut sim = Simulation::deserialize(&log.initial_snapshot)?;

    let mut first_mismatch: Option<ReplayMismatch> = None;
    let mut checkpoints = log.hash_checkpoints.iter().peekable();

    for (i, cmd) in log.commands.iter().enumerate() {
        apply_command(&mut sim, cmd);

        while let Some(&&(index, expected_hash)) = checkpoints.peek() {
            if index != i {
                break;
            }
            let actual_hash = sim.state_hash();
            if actual_hash != expected_hash && first_mismatch.is_none() {
                first_mismatch = Some(ReplayMismatch {
                    command_index: i,
                    expected_hash,
                    actual_hash,
                });
            }
            checkpoints.next();
        }
    }

    Ok(ReplayResult {
        commands_executed: log.commands.len(),
        is_verified: first_mismatch.is_none(),
        first_mismatch,
        simulation: sim,
    })
}

/// Play a log back without verification.
pub fn replay(log: &ReplayLog) -> Result<Simulation, DeserializeError> {
    let mut sim = Simulation::deserialize(&log.initial_snapshot)?;
    for cmd in &log.commands {
        apply_command(&mut sim, cmd);
    }
    Ok(sim)
}

// ===========================================================================
// Tests
// ===========================================================================
