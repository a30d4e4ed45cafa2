//! Directed capacity edge between two nodes.

use super::NodeId;

/// Directed link `from -> to`. `capacity` is `min(from.max_flow, to.max_flow)` and is
/// recomputed by the graph whenever either endpoint's bound changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub(super) from: NodeId,
    pub(super) to: NodeId,
    pub(super) capacity: u64,
    pub(super) flow: u64,
}

impl Edge {
    pub fn from(&self) -> NodeId {
        self.from
    }

    pub fn to(&self) -> NodeId {
        self.to
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn flow(&self) -> u64 {
        self.flow
    }

    /// Capacity not yet used.
    pub fn residual(&self) -> u64 {
        self.capacity.saturating_sub(self.flow)
    }

    pub(super) fn set_capacity(&mut self, capacity: u64) {
        self.capacity = capacity;
        self.flow = self.flow.min(capacity);
    }
}
