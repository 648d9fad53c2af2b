//! Read-only views for renderers and UI.
//!
//! All types are owned copies with fixed-point values converted to `f64`,
//! so consumers never hold references into simulation storage.

use crate::fixed::fixed64_to_f64;
use crate::graph::{Edge, Node, NodeKind};
use crate::id::{EdgeId, NodeId};
use crate::pool::ResourcePool;

/// One node as a renderer sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub id: NodeId,
    pub x: f32,
    pub y: f32,
    pub kind: NodeKind,
    pub pressure: f64,
    pub capacity: f64,
    /// `pressure / capacity` in `0..=1`. Zero for a zero-capacity node.
    pub fill: f64,
}

impl NodeView {
    pub fn new(id: NodeId, node: &Node) -> Self {
        let pressure = fixed64_to_f64(node.pressure);
        let capacity = fixed64_to_f64(node.capacity);
        let fill = if capacity > 0.0 {
            (pressure / capacity).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            id,
            x: node.position.x,
            y: node.position.y,
            kind: node.kind,
            pressure,
            capacity,
            fill,
        }
    }
}

/// One edge as a renderer sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeView {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub resistance: f64,
    /// Signed; positive means source to target.
    pub flow: f64,
}

impl EdgeView {
    pub fn new(id: EdgeId, edge: &Edge) -> Self {
        Self {
            id,
            source: edge.source,
            target: edge.target,
            resistance: fixed64_to_f64(edge.resistance),
            flow: fixed64_to_f64(edge.flow),
        }
    }
}

/// Pool balances for the HUD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolView {
    pub build: f64,
    pub flux: f64,
    pub prestige: f64,
    /// Whole exchanges the current flux would pay for.
    pub exchanges_available: u64,
}

impl PoolView {
    pub fn new(pool: &ResourcePool, exchanges_available: u64) -> Self {
        Self {
            build: fixed64_to_f64(pool.build()),
            flux: fixed64_to_f64(pool.flux()),
            prestige: fixed64_to_f64(pool.prestige()),
            exchanges_available,
        }
    }
}
