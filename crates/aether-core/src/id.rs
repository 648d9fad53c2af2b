use slotmap::{Key, new_key_type};
use std::fmt;

new_key_type! {
    /// Identifies a node in the flow graph. Unique among the nodes of one
    /// graph; a reset starts a new graph.
    pub struct NodeId;
    /// Identifies an edge in the flow graph.
    pub struct EdgeId;
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{:?}", self.data())
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{:?}", self.data())
    }
}
