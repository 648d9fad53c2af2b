//! The simulation context: owns the graph, the solver, the economy, and the
//! tick pipeline.
//!
//! # Architecture
//!
//! A [`Simulation`] owns:
//! - A [`GraphStore`] (nodes, edges, resource pool)
//! - A [`FlowSolver`] and an [`EconomyBridge`] configured from [`SimConfig`]
//! - A [`SimState`] (tick counter, time accumulator) and a [`SimulationStrategy`]
//! - An [`EventBus`] and a [`CommandQueue`]
//!
//! There is no global instance. Every writer takes `&mut Simulation`, so one
//! thread mutates at a time; wrap it in a `Mutex` to share across threads.
//!
//! # Tick Pipeline
//!
//! Each tick runs:
//! 1. **Commands** -- execute reactive-handler commands from the previous
//!    tick, then queued commands, in order
//! 2. **Flow** -- the solver moves pressure along edges and regenerates sources
//! 3. **Economy** -- the friction byproduct becomes flux; the passive trickle
//!    adds build currency
//! 4. **Transitions** -- nodes that became full or empty emit events
//! 5. **Delivery** -- buffered events reach subscribers
//! 6. **Bookkeeping** -- tick counter, state hash

use crate::command_queue::{Command, CommandOutcome, CommandQueue, CommandResult};
use crate::config::{ConfigError, SimConfig};
use crate::economy::{EconomyBridge, EconomyError, ExchangeReceipt};
use crate::event::{Event, EventBus, EventKind, PassiveListener, ReactiveHandler};
use crate::fixed::{Fixed64, Ticks};
use crate::graph::{GraphError, GraphParts, GraphStore, NodeKind};
use crate::id::{EdgeId, NodeId};
use crate::pool::ResourcePool;
use crate::query::{EdgeView, NodeView, PoolView};
use crate::sim::{AdvanceResult, SimState, SimulationStrategy, StateHash};
use crate::solver::{FlowReport, FlowSolver};
use slotmap::Key;
use tracing::{debug, info, trace};

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Simulation {
    pub(crate) graph: GraphStore,
    pub(crate) solver: FlowSolver,
    pub(crate) economy: EconomyBridge,
    pub(crate) config: SimConfig,
    pub(crate) strategy: SimulationStrategy,
    pub(crate) sim_state: SimState,
    /// While set, stepping calls are no-ops. Mutations still apply.
    pub(crate) paused: bool,
    pub(crate) last_state_hash: u64,
    pub(crate) last_report: FlowReport,
    pub event_bus: EventBus,
    pub(crate) commands: CommandQueue,
}

impl Simulation {
    /// Create an empty simulation seeded from `config`, in tick mode.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(
            config,
            GraphStore::new(config.seed, config.prices, config.defaults),
        ))
    }

    /// Create a simulation around existing graph state, e.g. a level
    /// authored in an editor. The pool comes from `parts`, not the seed.
    pub fn with_graph(config: SimConfig, parts: GraphParts) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(
            config,
            GraphStore::from_parts(parts, config.prices, config.defaults),
        ))
    }

    pub(crate) fn assemble(config: SimConfig, graph: GraphStore) -> Self {
        let mut sim = Self {
            graph,
            solver: FlowSolver::new(config.solver),
            economy: EconomyBridge::new(config.economy),
            config,
            strategy: SimulationStrategy::Tick,
            sim_state: SimState::new(),
            paused: false,
            last_state_hash: 0,
            last_report: FlowReport::default(),
            event_bus: EventBus::default(),
            commands: CommandQueue::new(),
        };
        sim.last_state_hash = sim.compute_state_hash();
        sim
    }

    /// Replace the time strategy.
    pub fn with_strategy(mut self, strategy: SimulationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Keep up to `max` executed commands in the queue's history.
    pub fn with_command_history(mut self, max: usize) -> Self {
        self.commands = CommandQueue::with_max_history(max);
        self
    }

    // -----------------------------------------------------------------------
    // Player actions
    // -----------------------------------------------------------------------

    /// Place a node now. See [`GraphStore::add_node`].
    pub fn add_node(&mut self, x: f32, y: f32, kind: NodeKind) -> Result<NodeId, GraphError> {
        match self.graph.add_node(x, y, kind) {
            Ok(node) => {
                let tick = self.sim_state.tick;
                self.event_bus.emit(Event::NodeAdded { node, kind, tick });
                self.last_state_hash = self.compute_state_hash();
                Ok(node)
            }
            Err(error) => Err(self.reject(error)),
        }
    }

    /// Connect two nodes now. See [`GraphStore::add_edge`].
    pub fn add_edge(&mut self, source: NodeId, target: NodeId) -> Result<EdgeId, GraphError> {
        match self.graph.add_edge(source, target) {
            Ok(edge) => {
                let tick = self.sim_state.tick;
                self.event_bus.emit(Event::EdgeAdded {
                    edge,
                    source,
                    target,
                    tick,
                });
                self.last_state_hash = self.compute_state_hash();
                Ok(edge)
            }
            Err(error) => Err(self.reject(error)),
        }
    }

    fn reject(&mut self, error: GraphError) -> GraphError {
        debug!(%error, tick = self.sim_state.tick, "mutation rejected");
        self.event_bus.emit(Event::MutationRejected {
            error: error.clone(),
            tick: self.sim_state.tick,
        });
        error
    }

    /// Trade flux for prestige now.
    pub fn exchange(&mut self) -> Result<ExchangeReceipt, EconomyError> {
        let tick = self.sim_state.tick;
        let result = self.economy.exchange(self.graph.pool_mut());
        let event = match &result {
            Ok(receipt) => {
                self.last_state_hash = self.compute_state_hash();
                Event::FluxExchanged {
                    flux_spent: receipt.flux_spent,
                    prestige_gained: receipt.prestige_gained,
                    tick,
                }
            }
            Err(EconomyError::InsufficientFlux { needed, available }) => Event::ExchangeRejected {
                needed: *needed,
                available: *available,
                tick,
            },
        };
        self.event_bus.emit(event);
        result
    }

    /// Run a command immediately.
    pub fn execute(&mut self, command: Command) -> CommandResult {
        match command {
            Command::AddNode { x, y, kind } => {
                Ok(CommandOutcome::NodeAdded(self.add_node(x, y, kind)?))
            }
            Command::AddEdge { source, target } => {
                Ok(CommandOutcome::EdgeAdded(self.add_edge(source, target)?))
            }
            Command::Exchange => Ok(CommandOutcome::Exchanged(self.exchange()?)),
        }
    }

    /// Queue a command for the start of the next tick.
    pub fn submit(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn submit_batch(&mut self, commands: impl IntoIterator<Item = Command>) {
        self.commands.push_batch(commands);
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Seconds per tick under the current strategy.
    pub fn step_dt(&self) -> Fixed64 {
        match self.strategy {
            SimulationStrategy::FixedStep { step } if step > Fixed64::ZERO => step,
            _ => self.config.fixed_step,
        }
    }

    /// Run exactly one tick of [`step_dt`](Self::step_dt), whatever the
    /// strategy. The accumulator is left alone.
    pub fn step(&mut self) -> AdvanceResult {
        let mut result = AdvanceResult::default();
        if !self.paused {
            self.run_tick(self.step_dt(), &mut result);
        }
        result
    }

    /// Advance by `elapsed` seconds of wall-clock time.
    ///
    /// - **Tick**: `elapsed` is ignored; one tick runs.
    /// - **FixedStep**: `elapsed` is accumulated and as many whole steps run
    ///   as fit. The remainder carries to the next call. Negative `elapsed`
    ///   counts as zero.
    pub fn advance(&mut self, elapsed: Fixed64) -> AdvanceResult {
        let mut result = AdvanceResult::default();
        if self.paused {
            return result;
        }

        match self.strategy {
            SimulationStrategy::Tick => self.run_tick(self.config.fixed_step, &mut result),
            SimulationStrategy::FixedStep { .. } => {
                let step = self.step_dt();
                self.sim_state.accumulator = self
                    .sim_state
                    .accumulator
                    .saturating_add(elapsed.max(Fixed64::ZERO));
                while self.sim_state.accumulator >= step {
                    self.sim_state.accumulator -= step;
                    self.run_tick(step, &mut result);
                }
            }
        }
        result
    }

    /// Run one tick with a caller-chosen `dt`. `dt` is not clamped; large
    /// values saturate edges at their clamp bounds.
    pub fn tick_with_dt(&mut self, dt: Fixed64) -> AdvanceResult {
        let mut result = AdvanceResult::default();
        if !self.paused {
            self.run_tick(dt, &mut result);
        }
        result
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // -----------------------------------------------------------------------
    // Tick pipeline
    // -----------------------------------------------------------------------

    fn run_tick(&mut self, dt: Fixed64, result: &mut AdvanceResult) {
        let tick = self.sim_state.tick;

        // 1. Commands.
        let mut pending = self.event_bus.drain_commands();
        pending.extend(self.commands.drain(tick));
        for command in pending {
            let outcome = self.execute(command);
            result.command_results.push(outcome);
        }

        // 2. Flow.
        let before: Vec<(bool, bool)> = self
            .graph
            .nodes()
            .values()
            .map(|n| (n.is_full(), n.is_empty()))
            .collect();
        let (nodes, edges) = self.graph.flow_state_mut();
        let report = self.solver.apply(nodes, edges, dt);

        // 3. Economy.
        self.economy.apply_tick(self.graph.pool_mut(), report.byproduct);

        // 4. Transitions.
        for ((id, node), &(was_full, was_empty)) in self.graph.nodes().iter().zip(&before) {
            if node.is_full() && !was_full {
                self.event_bus.emit(Event::NodeSaturated { node: id, tick });
            }
            if node.is_empty() && !was_empty {
                self.event_bus.emit(Event::NodeDrained { node: id, tick });
            }
        }

        trace!(
            tick,
            dt = %dt,
            byproduct = %report.byproduct,
            moved = %report.moved,
            active_edges = report.active_edges,
            skipped_edges = report.skipped_edges,
            "tick complete"
        );

        // 5. Delivery.
        self.event_bus.deliver();

        // 6. Bookkeeping.
        self.last_report = report;
        self.sim_state.tick += 1;
        self.last_state_hash = self.compute_state_hash();
        result.steps_run += 1;
        result.byproduct = result.byproduct.saturating_add(report.byproduct);
    }

    /// FNV-1a over the tick counter, pool, nodes and edges. Positions are
    /// display-only and excluded.
    pub(crate) fn compute_state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.sim_state.tick);
        hash_pool(&mut h, self.graph.pool());
        h.write_u64(self.graph.node_count() as u64);
        for (id, node) in self.graph.nodes() {
            h.write_u64(id.data().as_ffi());
            h.write_u8(node.kind as u8);
            h.write_fixed64(node.pressure);
            h.write_fixed64(node.capacity);
        }
        h.write_u64(self.graph.edge_count() as u64);
        for (id, edge) in self.graph.edges() {
            h.write_u64(id.data().as_ffi());
            h.write_u64(edge.source.data().as_ffi());
            h.write_u64(edge.target.data().as_ffi());
            h.write_fixed64(edge.resistance);
            h.write_fixed64(edge.flow);
        }
        h.finish()
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    /// Prestige reset: empty the graph and reseed the pool from the config.
    ///
    /// Pending commands are dropped and the time accumulator cleared. The
    /// tick counter keeps counting. The emptied graph starts a new id space,
    /// so ids held from before the reset are stale.
    pub fn reset(&mut self) {
        let dropped = self.commands.discard_pending() + self.event_bus.drain_commands().len();
        self.graph.reset(self.config.seed);
        self.sim_state.accumulator = Fixed64::ZERO;
        self.last_report = FlowReport::default();
        let tick = self.sim_state.tick;
        self.event_bus.emit(Event::SimulationReset { tick });
        self.last_state_hash = self.compute_state_hash();
        info!(tick, dropped_commands = dropped, "simulation reset");
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.event_bus.suppress(kind);
    }

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.event_bus.on_passive(kind, listener);
    }

    pub fn on_reactive(&mut self, kind: EventKind, handler: ReactiveHandler) {
        self.event_bus.on_reactive(kind, handler);
    }

    /// Deliver events emitted since the last tick (e.g. by direct
    /// mutations) without waiting for the next tick.
    pub fn deliver_events(&mut self) {
        self.event_bus.deliver();
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn pool(&self) -> &ResourcePool {
        self.graph.pool()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn strategy(&self) -> SimulationStrategy {
        self.strategy
    }

    pub fn sim_state(&self) -> &SimState {
        &self.sim_state
    }

    pub fn tick(&self) -> Ticks {
        self.sim_state.tick
    }

    /// Solver report from the most recent tick.
    pub fn last_report(&self) -> &FlowReport {
        &self.last_report
    }

    pub fn command_queue(&self) -> &CommandQueue {
        &self.commands
    }

    /// Queued commands plus commands returned by reactive handlers, all of
    /// which run at the start of the next tick.
    pub fn pending_command_count(&self) -> usize {
        self.commands.pending_count() + self.event_bus.pending_command_count()
    }

    /// Hash of the current state, refreshed after every tick, accepted
    /// mutation, exchange, reset and load.
    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    pub fn exchanges_available(&self) -> u64 {
        self.economy.exchanges_available(self.graph.pool())
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn node_view(&self, id: NodeId) -> Option<NodeView> {
        self.graph.node(id).map(|node| NodeView::new(id, node))
    }

    pub fn node_views(&self) -> Vec<NodeView> {
        self.graph
            .nodes()
            .iter()
            .map(|(id, node)| NodeView::new(id, node))
            .collect()
    }

    pub fn edge_views(&self) -> Vec<EdgeView> {
        self.graph
            .edges()
            .iter()
            .map(|(id, edge)| EdgeView::new(id, edge))
            .collect()
    }

    pub fn pool_view(&self) -> PoolView {
        PoolView::new(self.graph.pool(), self.exchanges_available())
    }
}

impl Default for Simulation {
    fn default() -> Self {
        let config = SimConfig::default();
        Self::assemble(
            config,
            GraphStore::new(config.seed, config.prices, config.defaults),
        )
    }
}

pub(crate) fn hash_pool(h: &mut StateHash, pool: &ResourcePool) {
    h.write_fixed64(pool.build());
    h.write_fixed64(pool.flux());
    h.write_fixed64(pool.prestige());
}

// ===========================================================================
// Tests
// ===========================================================================
