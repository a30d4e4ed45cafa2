//! Capacity-bounded graph vertex.

use super::{CollectionId, EdgeId};

/// A vertex wrapping one payload (an order item) with a `max_flow` bound.
///
/// Incoming and outgoing edges are kept separately in link order; that order is the
/// priority used when [`super::FlowGraph::push_flow`] rations flow. The owning
/// collection is a plain id, not a reference.
#[derive(Debug, Clone)]
pub struct Node<T> {
    pub(super) data: T,
    pub(super) max_flow: u64,
    pub(super) collection: CollectionId,
    pub(super) incoming: Vec<EdgeId>,
    pub(super) outgoing: Vec<EdgeId>,
}

impl<T> Node<T> {
    pub(super) fn new(data: T, max_flow: u64, collection: CollectionId) -> Self {
        Self {
            data,
            max_flow,
            collection,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn max_flow(&self) -> u64 {
        self.max_flow
    }

    pub fn collection(&self) -> CollectionId {
        self.collection
    }

    pub fn incoming(&self) -> &[EdgeId] {
        &self.incoming
    }

    pub fn outgoing(&self) -> &[EdgeId] {
        &self.outgoing
    }

    /// True if no edge touches this node.
    pub fn is_unlinked(&self) -> bool {
        self.incoming.is_empty() && self.outgoing.is_empty()
    }
}
