//! Capacity-constrained flow graph used to spread an order's quantity over
//! opposing orders.
//!
//! Nodes, edges and collections live in [`slab`] arenas owned by [`FlowGraph`] and
//! are addressed by stable ids, so members can be added or removed while a
//! [`FlowStream`] is being driven. Keys of removed entries may be reused by later
//! inserts.

mod collection;
mod edge;
mod node;

pub use collection::{FlowStep, FlowStream, NodeCollection};
pub use edge::Edge;
pub use node::Node;

use slab::Slab;
use thiserror::Error;

/// Handle of a node in a [`FlowGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Handle of an edge in a [`FlowGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub usize);

/// Handle of a node collection in a [`FlowGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionId(pub usize);

/// Graph errors. An invariant violation means graph construction is broken.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    #[error("unknown edge {0:?}")]
    UnknownEdge(EdgeId),

    #[error("unknown collection {0:?}")]
    UnknownCollection(CollectionId),

    #[error("flow invariant violated: {0}")]
    InvariantViolation(String),
}

pub type FlowResult<T> = std::result::Result<T, FlowError>;

/// Arena of nodes, edges and the collections that own the nodes.
#[derive(Debug)]
pub struct FlowGraph<T> {
    nodes: Slab<Node<T>>,
    edges: Slab<Edge>,
    collections: Slab<NodeCollection>,
}

impl<T> Default for FlowGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FlowGraph<T> {
    pub fn new() -> Self {
        Self {
            nodes: Slab::new(),
            edges: Slab::new(),
            collections: Slab::new(),
        }
    }

    /// Adds an empty collection whose members must together carry `required_flow`.
    pub fn add_collection(&mut self, required_flow: u64) -> CollectionId {
        CollectionId(self.collections.insert(NodeCollection::new(required_flow)))
    }

    /// Adds a node owned by `collection`, appended after the existing members.
    pub fn add_node(
        &mut self,
        collection: CollectionId,
        data: T,
        max_flow: u64,
    ) -> FlowResult<NodeId> {
        if !self.collections.contains(collection.0) {
            return Err(FlowError::UnknownCollection(collection));
        }
        let id = NodeId(self.nodes.insert(Node::new(data, max_flow, collection)));
        self.collections[collection.0].nodes.push(id);
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> FlowResult<&Node<T>> {
        self.nodes.get(id.0).ok_or(FlowError::UnknownNode(id))
    }

    pub fn edge(&self, id: EdgeId) -> FlowResult<&Edge> {
        self.edges.get(id.0).ok_or(FlowError::UnknownEdge(id))
    }

    pub fn collection(&self, id: CollectionId) -> FlowResult<&NodeCollection> {
        self.collections.get(id.0).ok_or(FlowError::UnknownCollection(id))
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.edges.iter().map(|(key, edge)| (EdgeId(key), edge))
    }

    /// Links `from -> to`. The new edge has the lowest priority among `from`'s outgoing edges.
    pub fn link(&mut self, from: NodeId, to: NodeId) -> FlowResult<EdgeId> {
        let capacity = self.node(from)?.max_flow.min(self.node(to)?.max_flow);
        let id = EdgeId(self.edges.insert(Edge {
            from,
            to,
            capacity,
            flow: 0,
        }));
        self.nodes[from.0].outgoing.push(id);
        self.nodes[to.0].incoming.push(id);
        Ok(id)
    }

    /// Removes the edge and its flow from both endpoints. Flow is not redistributed.
    pub fn unlink(&mut self, id: EdgeId) -> FlowResult<()> {
        let edge = self.edges.try_remove(id.0).ok_or(FlowError::UnknownEdge(id))?;
        if let Some(from) = self.nodes.get_mut(edge.from.0) {
            from.outgoing.retain(|e| *e != id);
        }
        if let Some(to) = self.nodes.get_mut(edge.to.0) {
            to.incoming.retain(|e| *e != id);
        }
        Ok(())
    }

    /// Unlinks every edge touching `id`; the node itself stays in its collection.
    pub fn unlink_node(&mut self, id: NodeId) -> FlowResult<()> {
        let node = self.node(id)?;
        let touching: Vec<EdgeId> = node
            .incoming
            .iter()
            .chain(node.outgoing.iter())
            .copied()
            .collect();
        for edge in touching {
            self.unlink(edge)?;
        }
        Ok(())
    }

    /// Unlinks and removes a node from its collection, returning its payload.
    pub fn remove_node(&mut self, id: NodeId) -> FlowResult<T> {
        self.unlink_node(id)?;
        let node = self.nodes.remove(id.0);
        if let Some(collection) = self.collections.get_mut(node.collection.0) {
            collection.nodes.retain(|n| *n != id);
        }
        Ok(node.data)
    }

    /// Unlinks every member of a collection, keeping the members.
    pub fn unlink_collection(&mut self, id: CollectionId) -> FlowResult<()> {
        for node in self.collection(id)?.nodes.clone() {
            self.unlink_node(node)?;
        }
        Ok(())
    }

    /// Changes a node's bound. Dependent edge capacities follow immediately and any
    /// flow above the new bounds is cut, latest-linked edges first.
    pub fn set_max_flow(&mut self, id: NodeId, max_flow: u64) -> FlowResult<()> {
        let node = self.nodes.get_mut(id.0).ok_or(FlowError::UnknownNode(id))?;
        node.max_flow = max_flow;
        let incoming = node.incoming.clone();
        let outgoing = node.outgoing.clone();
        for edge_id in incoming.iter().chain(outgoing.iter()) {
            let edge = &self.edges[edge_id.0];
            let capacity = self.nodes[edge.from.0].max_flow.min(self.nodes[edge.to.0].max_flow);
            self.edges[edge_id.0].set_capacity(capacity);
        }
        self.trim_to(&incoming, max_flow);
        self.trim_to(&outgoing, max_flow);
        Ok(())
    }

    fn trim_to(&mut self, edges: &[EdgeId], bound: u64) {
        let mut excess = self.sum_flow(edges).saturating_sub(bound);
        for edge_id in edges.iter().rev() {
            if excess == 0 {
                break;
            }
            let edge = &mut self.edges[edge_id.0];
            let cut = edge.flow.min(excess);
            edge.flow -= cut;
            excess -= cut;
        }
    }

    fn sum_flow(&self, edges: &[EdgeId]) -> u64 {
        edges.iter().filter_map(|e| self.edges.get(e.0)).map(|e| e.flow).sum()
    }

    pub fn incoming_flow(&self, id: NodeId) -> FlowResult<u64> {
        Ok(self.sum_flow(&self.node(id)?.incoming))
    }

    pub fn outgoing_flow(&self, id: NodeId) -> FlowResult<u64> {
        Ok(self.sum_flow(&self.node(id)?.outgoing))
    }

    pub fn collection_incoming_flow(&self, id: CollectionId) -> FlowResult<u64> {
        let mut total = 0;
        for node in &self.collection(id)?.nodes {
            total += self.incoming_flow(*node)?;
        }
        Ok(total)
    }

    pub fn collection_outgoing_flow(&self, id: CollectionId) -> FlowResult<u64> {
        let mut total = 0;
        for node in &self.collection(id)?.nodes {
            total += self.outgoing_flow(*node)?;
        }
        Ok(total)
    }

    /// How much more flow `id` can receive, bounded by its own and its collection's limits.
    fn inbound_room(&self, id: NodeId) -> FlowResult<u64> {
        let node = self.node(id)?;
        let node_room = node.max_flow.saturating_sub(self.incoming_flow(id)?);
        let collection = self.collection(node.collection)?;
        let collection_room = collection
            .required_flow
            .saturating_sub(self.collection_incoming_flow(node.collection)?);
        Ok(node_room.min(collection_room))
    }

    /// Greedily pushes up to `amount` along `id`'s outgoing edges in link order.
    ///
    /// Each edge takes what it can: its residual capacity, bounded by what the target
    /// node and target collection can still receive. One pass, no backtracking.
    /// Returns the amount actually pushed.
    pub fn push_flow(&mut self, id: NodeId, amount: u64) -> FlowResult<u64> {
        let node = self.node(id)?;
        let headroom = node.max_flow.saturating_sub(self.outgoing_flow(id)?);
        let outgoing = node.outgoing.clone();
        let mut remaining = amount.min(headroom);
        let mut pushed = 0;
        for edge_id in outgoing {
            if remaining == 0 {
                break;
            }
            let edge = self.edge(edge_id)?;
            let take = remaining.min(edge.residual()).min(self.inbound_room(edge.to)?);
            if take == 0 {
                continue;
            }
            self.edges[edge_id.0].flow += take;
            remaining -= take;
            pushed += take;
        }
        Ok(pushed)
    }

    /// Starts a fresh step-wise flow stream for `collection`.
    pub fn stream_flow(&self, collection: CollectionId) -> FlowStream {
        FlowStream::new(collection)
    }

    /// Verifies that no edge, node or collection carries more flow than its bound.
    pub fn check_invariants(&self) -> FlowResult<()> {
        for (key, edge) in self.edges.iter() {
            if edge.flow > edge.capacity {
                return Err(FlowError::InvariantViolation(format!(
                    "edge {} carries {} over capacity {}",
                    key, edge.flow, edge.capacity
                )));
            }
        }
        for (key, node) in self.nodes.iter() {
            let id = NodeId(key);
            let incoming = self.incoming_flow(id)?;
            let outgoing = self.outgoing_flow(id)?;
            if incoming > node.max_flow || outgoing > node.max_flow {
                return Err(FlowError::InvariantViolation(format!(
                    "node {} flow in={} out={} exceeds max {}",
                    key, incoming, outgoing, node.max_flow
                )));
            }
        }
        for (key, collection) in self.collections.iter() {
            let id = CollectionId(key);
            let incoming = self.collection_incoming_flow(id)?;
            let outgoing = self.collection_outgoing_flow(id)?;
            if incoming > collection.required_flow || outgoing > collection.required_flow {
                return Err(FlowError::InvariantViolation(format!(
                    "collection {} flow in={} out={} exceeds required {}",
                    key, incoming, outgoing, collection.required_flow
                )));
            }
        }
        Ok(())
    }
}
