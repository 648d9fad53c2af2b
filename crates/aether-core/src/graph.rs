use crate::fixed::Fixed64;
use crate::id::*;
use crate::pool::{Currency, InsufficientBalance, ResourcePool};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Reasons a graph mutation was refused. A refused mutation never changes
/// the node or edge collections or the resource pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error(transparent)]
    InsufficientFunds(#[from] InsufficientBalance),
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("cannot connect {0} to itself")]
    SelfLoop(NodeId),
    #[error("{a} and {b} are already connected by {existing}")]
    DuplicateEdge {
        a: NodeId,
        b: NodeId,
        existing: EdgeId,
    },
}

// ---------------------------------------------------------------------------
// Core data structures
// ---------------------------------------------------------------------------

/// What a node does during the node pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Plain reservoir. Only changes through edge flow.
    #[default]
    Standard,
    /// Regenerates pressure every tick. Free to place.
    Source,
}

/// Opaque 2D placement, owned by the renderer. The solver never reads it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// A reservoir in the flow graph. Its [`NodeId`] is the key it is stored
/// under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub position: Position,
    pub kind: NodeKind,
    /// Current stored quantity. Kept in `[0, capacity]` by the solver.
    pub pressure: Fixed64,
    pub capacity: Fixed64,
}

impl Node {
    /// Create an empty node.
    pub fn new(position: Position, kind: NodeKind, capacity: Fixed64) -> Self {
        Self {
            position,
            kind,
            pressure: Fixed64::ZERO,
            capacity,
        }
    }

    /// Room left before the node is full. Never negative.
    pub fn headroom(&self) -> Fixed64 {
        self.capacity
            .saturating_sub(self.pressure)
            .max(Fixed64::ZERO)
    }

    pub fn is_full(&self) -> bool {
        self.pressure >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.pressure <= Fixed64::ZERO
    }
}

/// A conduit between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    /// Strictly positive. Fixed at creation.
    pub resistance: Fixed64,
    /// Quantity moved in the last tick; positive means source to target.
    pub flow: Fixed64,
}

impl Edge {
    /// Create an edge with no flow recorded yet.
    pub fn new(source: NodeId, target: NodeId, resistance: Fixed64) -> Self {
        Self {
            source,
            target,
            resistance,
            flow: Fixed64::ZERO,
        }
    }

    /// Whether this edge joins `a` and `b`, in either direction.
    pub fn connects(&self, a: NodeId, b: NodeId) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }

    /// Whether `node` is either endpoint.
    pub fn touches(&self, node: NodeId) -> bool {
        self.source == node || self.target == node
    }
}

/// Build-currency prices for growing the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prices {
    pub node: Fixed64,
    pub edge: Fixed64,
}

impl Default for Prices {
    fn default() -> Self {
        Self {
            node: Fixed64::from_num(10),
            edge: Fixed64::from_num(5),
        }
    }
}

/// Values stamped onto newly created entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefaults {
    pub node_capacity: Fixed64,
    pub edge_resistance: Fixed64,
}

impl Default for EntityDefaults {
    fn default() -> Self {
        Self {
            node_capacity: Fixed64::from_num(100),
            edge_resistance: Fixed64::from_num(1),
        }
    }
}

/// The persisted portion of a [`GraphStore`]. The pair index is rebuilt
/// from it on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphParts {
    pub nodes: SlotMap<NodeId, Node>,
    pub edges: SlotMap<EdgeId, Edge>,
    pub pool: ResourcePool,
}

impl PartialEq for GraphParts {
    fn eq(&self, other: &Self) -> bool {
        self.pool == other.pool
            && self.nodes.iter().eq(other.nodes.iter())
            && self.edges.iter().eq(other.edges.iter())
    }
}

// ---------------------------------------------------------------------------
// GraphStore
// ---------------------------------------------------------------------------

/// Owns the nodes, the edges, and the resource pool.
///
/// Nodes and edges live in slot maps that only ever grow between resets,
/// so slot order is insertion order; that order is the iteration order the
/// solver uses. Duplicate-edge detection goes through an index keyed by
/// the unordered endpoint pair.
#[derive(Debug, Clone)]
pub struct GraphStore {
    nodes: SlotMap<NodeId, Node>,
    edges: SlotMap<EdgeId, Edge>,
    pool: ResourcePool,
    prices: Prices,
    defaults: EntityDefaults,
    pair_index: BTreeMap<(NodeId, NodeId), EdgeId>,
}

/// Order a pair so `{a, b}` and `{b, a}` share one key.
fn pair_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b { (a, b) } else { (b, a) }
}

impl GraphStore {
    /// Create an empty graph with the given starting pool.
    pub fn new(pool: ResourcePool, prices: Prices, defaults: EntityDefaults) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            edges: SlotMap::with_key(),
            pool,
            prices,
            defaults,
            pair_index: BTreeMap::new(),
        }
    }

    /// Rebuild a store from persisted parts.
    ///
    /// Imported data is taken as-is: edges with missing endpoints are kept
    /// (the solver skips them) and, if two edges share an endpoint pair, the
    /// earlier one owns the pair.
    pub fn from_parts(parts: GraphParts, prices: Prices, defaults: EntityDefaults) -> Self {
        let mut store = Self {
            nodes: parts.nodes,
            edges: parts.edges,
            pool: parts.pool,
            prices,
            defaults,
            pair_index: BTreeMap::new(),
        };
        store.rebuild_pair_index();
        store
    }

    /// Copy out the persisted portion of the store.
    pub fn to_parts(&self) -> GraphParts {
        GraphParts {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            pool: self.pool,
        }
    }

    fn rebuild_pair_index(&mut self) {
        self.pair_index.clear();
        for (id, edge) in &self.edges {
            self.pair_index
                .entry(pair_key(edge.source, edge.target))
                .or_insert(id);
        }
    }

    // -----------------------------------------------------------------------
    // Cost-gated mutations
    // -----------------------------------------------------------------------

    /// Place a node at `(x, y)`.
    ///
    /// Standard nodes cost [`Prices::node`] build currency; the call is
    /// refused with no effect when the balance is short. Source nodes are
    /// always placed, at zero cost, whatever the balance.
    pub fn add_node(&mut self, x: f32, y: f32, kind: NodeKind) -> Result<NodeId, GraphError> {
        if kind == NodeKind::Standard {
            self.pool.try_debit(Currency::Build, self.prices.node)?;
        }
        let node = Node::new(Position { x, y }, kind, self.defaults.node_capacity);
        Ok(self.nodes.insert(node))
    }

    /// Connect `a` and `b` with a new edge directed `a -> b`.
    ///
    /// Refused with no effect when `a == b`, when either node is unknown,
    /// when the pair is already connected in either direction, or when the
    /// build balance is below [`Prices::edge`].
    pub fn add_edge(&mut self, a: NodeId, b: NodeId) -> Result<EdgeId, GraphError> {
        if a == b {
            return Err(GraphError::SelfLoop(a));
        }
        for node in [a, b] {
            if !self.nodes.contains_key(node) {
                return Err(GraphError::NodeNotFound(node));
            }
        }
        let key = pair_key(a, b);
        if let Some(&existing) = self.pair_index.get(&key) {
            return Err(GraphError::DuplicateEdge { a, b, existing });
        }
        self.pool.try_debit(Currency::Build, self.prices.edge)?;

        let id = self.edges.insert(Edge::new(a, b, self.defaults.edge_resistance));
        self.pair_index.insert(key, id);
        Ok(id)
    }

    /// Empty the graph and replace the pool.
    ///
    /// Starts from fresh slot maps so new entities iterate in insertion
    /// order again. Ids held from before the reset must be dropped: the new
    /// graph hands the same keys out again.
    pub fn reset(&mut self, seed: ResourcePool) {
        self.nodes = SlotMap::with_key();
        self.edges = SlotMap::with_key();
        self.pair_index.clear();
        self.pool = seed;
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// Nodes, iterated in insertion order.
    pub fn nodes(&self) -> &SlotMap<NodeId, Node> {
        &self.nodes
    }

    /// Edges, iterated in insertion order, which is also solver priority
    /// order.
    pub fn edges(&self) -> &SlotMap<EdgeId, Edge> {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// The edge joining `a` and `b` in either direction, if any.
    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        self.pair_index.get(&pair_key(a, b)).copied()
    }

    /// Edges touching `node`, in insertion order.
    pub fn edges_of(&self, node: NodeId) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.edges.iter().filter(move |(_, e)| e.touches(node))
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub fn prices(&self) -> &Prices {
        &self.prices
    }

    pub fn defaults(&self) -> &EntityDefaults {
        &self.defaults
    }

    /// Total pressure held across all nodes.
    pub fn total_pressure(&self) -> Fixed64 {
        self.nodes
            .values()
            .fold(Fixed64::ZERO, |acc, n| acc.saturating_add(n.pressure))
    }

    // -----------------------------------------------------------------------
    // Crate-internal write access
    // -----------------------------------------------------------------------

    /// Mutable access to the node and edge maps for the solver. Callers
    /// may change `pressure` and `flow` only.
    pub(crate) fn flow_state_mut(
        &mut self,
    ) -> (&mut SlotMap<NodeId, Node>, &mut SlotMap<EdgeId, Edge>) {
        (&mut self.nodes, &mut self.edges)
    }

    pub(crate) fn pool_mut(&mut self) -> &mut ResourcePool {
        &mut self.pool
    }
}

// ===========================================================================
// Tests
// ===========================================================================
