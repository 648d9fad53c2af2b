//! Input command queue for externally-submitted mutations.
//!
//! Commands are queued by the game client (UI, scripting, network) and
//! executed at the start of the next tick, in submission order, so that
//! several producers never interleave with a running tick.

use crate::economy::{EconomyError, ExchangeReceipt};
use crate::fixed::Ticks;
use crate::graph::{GraphError, NodeKind};
use crate::id::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Command enum
// ---------------------------------------------------------------------------

/// A single player action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    AddNode { x: f32, y: f32, kind: NodeKind },
    AddEdge { source: NodeId, target: NodeId },
    Exchange,
}

/// What a command did when it ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    NodeAdded(NodeId),
    EdgeAdded(EdgeId),
    Exchanged(ExchangeReceipt),
}

/// Why a command was refused. The simulation state is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Economy(#[from] EconomyError),
}

/// Result of executing one queued command.
pub type CommandResult = Result<CommandOutcome, CommandError>;

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

/// Commands waiting for the next tick boundary, with optional history.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Vec<Command>,
    /// (tick, command) for executed commands.
    history: Vec<(Ticks, Command)>,
    /// 0 disables history.
    max_history: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retain up to `max_history` executed commands.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            max_history,
            ..Self::default()
        }
    }

    pub fn push(&mut self, command: Command) {
        self.pending.push(command);
    }

    pub fn push_batch(&mut self, commands: impl IntoIterator<Item = Command>) {
        self.pending.extend(commands);
    }

    /// Take all pending commands in submission order, recording them in
    /// history under `tick`.
    pub fn drain(&mut self, tick: Ticks) -> Vec<Command> {
        let commands: Vec<Command> = self.pending.drain(..).collect();

        if self.max_history > 0 {
            self.history
                .extend(commands.iter().cloned().map(|cmd| (tick, cmd)));
            let excess = self.history.len().saturating_sub(self.max_history);
            if excess > 0 {
                self.history.drain(..excess);
            }
        }

        commands
    }

    /// Drop pending commands without running them.
    pub fn discard_pending(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn history(&self) -> &[(Ticks, Command)] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn add_node() -> Command {
        Command::AddNode {
            x: 1.0,
            y: 2.0,
            kind: NodeKind::Standard,
        }
    }

    fn add_edge() -> Command {
        Command::AddEdge {
            source: NodeId::default(),
            target: NodeId::default(),
        }
    }

    #[test]
    fn new_queue_is_empty() {
        let queue = CommandQueue::new();
        assert_eq!(queue.pending_count(), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_preserves_submission_order() {
        let mut queue = CommandQueue::new();
        queue.push(add_node());
        queue.push(Command::Exchange);
        queue.push(add_edge());

        let drained = queue.drain(0);
        assert_eq!(drained, vec![add_node(), Command::Exchange, add_edge()]);
        assert!(queue.is_empty());
    }

    #[test]
    fn push_batch_extends() {
        let mut queue = CommandQueue::new();
        queue.push_batch([add_node(), add_node()]);
        assert_eq!(queue.pending_count(), 2);
    }

    #[test]
    fn no_history_by_default() {
        let mut queue = CommandQueue::new();
        queue.push(add_node());
        queue.drain(5);
        assert!(queue.history().is_empty());
    }

    #[test]
    fn history_records_tick_and_trims() {
        let mut queue = CommandQueue::with_max_history(2);
        queue.push(add_node());
        queue.drain(1);
        queue.push(add_edge());
        queue.push(Command::Exchange);
        queue.drain(2);

        let history = queue.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], (2, add_edge()));
        assert_eq!(history[1], (2, Command::Exchange));

        queue.clear_history();
        assert!(queue.history().is_empty());
    }

    #[test]
    fn discard_pending_skips_history() {
        let mut queue = CommandQueue::with_max_history(8);
        queue.push(add_node());
        queue.push(add_edge());
        assert_eq!(queue.discard_pending(), 2);
        assert!(queue.is_empty());
        assert!(queue.history().is_empty());
    }

    #[test]
    fn command_error_wraps_sources() {
        let err: CommandError = GraphError::SelfLoop(NodeId::default()).into();
        assert!(matches!(err, CommandError::Graph(GraphError::SelfLoop(_))));
    }
}
