//! Node collections (one per order) and restartable flow streaming.

use super::{CollectionId, FlowGraph, FlowResult, NodeId};

/// The nodes of one order. Members must together carry exactly `required_flow`
/// (the order's `num_items`). Owns its member nodes; edges into other collections
/// are not owned.
#[derive(Debug, Clone)]
pub struct NodeCollection {
    pub(super) required_flow: u64,
    pub(super) nodes: Vec<NodeId>,
}

impl NodeCollection {
    pub(super) fn new(required_flow: u64) -> Self {
        Self {
            required_flow,
            nodes: Vec::new(),
        }
    }

    pub fn required_flow(&self) -> u64 {
        self.required_flow
    }

    /// Members in insertion order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }
}

/// Snapshot after one streaming step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowStep {
    /// Flow added during this step. Zero means the collection is stable.
    pub flow_pushed: u64,
    /// Outgoing flow of the whole collection after this step.
    pub total_flow_pushed: u64,
}

/// Step-wise flow pusher for one collection, driven by the caller.
///
/// Each [`FlowStream::step`] offers every member node, in collection order, the
/// collection's outstanding flow. The step that pushes nothing is still yielded;
/// after it the stream is exhausted and returns `None`. Members may be added or
/// removed between steps; the next step reads the graph afresh.
#[derive(Debug, Clone)]
pub struct FlowStream {
    collection: CollectionId,
    exhausted: bool,
}

impl FlowStream {
    pub(super) fn new(collection: CollectionId) -> Self {
        Self {
            collection,
            exhausted: false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn step<T>(&mut self, graph: &mut FlowGraph<T>) -> FlowResult<Option<FlowStep>> {
        if self.exhausted {
            return Ok(None);
        }
        let collection = graph.collection(self.collection)?;
        let required = collection.required_flow;
        let members = collection.nodes.clone();

        let mut flow_pushed = 0;
        for node in members {
            let remaining =
                required.saturating_sub(graph.collection_outgoing_flow(self.collection)?);
            if remaining == 0 {
                break;
            }
            let max_flow = graph.node(node)?.max_flow();
            flow_pushed += graph.push_flow(node, remaining.min(max_flow))?;
        }
        if flow_pushed == 0 {
            self.exhausted = true;
        }
        Ok(Some(FlowStep {
            flow_pushed,
            total_flow_pushed: graph.collection_outgoing_flow(self.collection)?,
        }))
    }

    /// Drives the stream until a step pushes nothing; returns the collection's total flow.
    pub fn run_to_stable<T>(&mut self, graph: &mut FlowGraph<T>) -> FlowResult<u64> {
        let mut total = graph.collection_outgoing_flow(self.collection)?;
        while let Some(step) = self.step(graph)? {
            total = step.total_flow_pushed;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_yields_zero_step_then_ends() {
        let mut g = FlowGraph::new();
        let root = g.add_collection(3);
        let r = g.add_node(root, "r", 3).unwrap();
        let other = g.add_collection(3);
        let o = g.add_node(other, "o", 3).unwrap();
        g.link(r, o).unwrap();

        let mut stream = g.stream_flow(root);
        assert_eq!(
            stream.step(&mut g).unwrap(),
            Some(FlowStep { flow_pushed: 3, total_flow_pushed: 3 })
        );
        assert_eq!(
            stream.step(&mut g).unwrap(),
            Some(FlowStep { flow_pushed: 0, total_flow_pushed: 3 })
        );
        assert!(stream.is_exhausted());
        assert_eq!(stream.step(&mut g).unwrap(), None);
    }

    #[test]
    fn stream_spreads_required_flow_over_members() {
        let mut g = FlowGraph::new();
        let root = g.add_collection(3);
        let r1 = g.add_node(root, "r1", 1).unwrap();
        let r2 = g.add_node(root, "r2", 1).unwrap();
        let r3 = g.add_node(root, "r3", 1).unwrap();
        let a = g.add_collection(2);
        let a1 = g.add_node(a, "a", 2).unwrap();
        let b = g.add_collection(1);
        let b1 = g.add_node(b, "b", 1).unwrap();
        for r in [r1, r2, r3] {
            g.link(r, a1).unwrap();
            g.link(r, b1).unwrap();
        }
        let total = g.stream_flow(root).run_to_stable(&mut g).unwrap();
        assert_eq!(total, 3);
        assert_eq!(g.incoming_flow(a1).unwrap(), 2);
        assert_eq!(g.incoming_flow(b1).unwrap(), 1);
        g.check_invariants().unwrap();
    }

    #[test]
    fn removing_saturated_node_frees_capacity_for_siblings() {
        let mut g = FlowGraph::new();
        let root = g.add_collection(2);
        let r = g.add_node(root, "r", 2).unwrap();
        let a = g.add_collection(1);
        let a1 = g.add_node(a, "a", 1).unwrap();
        let b = g.add_collection(2);
        let b1 = g.add_node(b, "b", 2).unwrap();
        g.link(r, a1).unwrap();
        g.link(r, b1).unwrap();

        let mut stream = g.stream_flow(root);
        let first = stream.step(&mut g).unwrap().unwrap();
        assert_eq!(first.total_flow_pushed, 2);
        assert_eq!(g.incoming_flow(b1).unwrap(), 1);

        g.remove_node(a1).unwrap();
        let next = stream.step(&mut g).unwrap().unwrap();
        assert_eq!(next.flow_pushed, 1);
        assert_eq!(g.incoming_flow(b1).unwrap(), 2);
    }

    #[test]
    fn stream_without_edges_is_immediately_stable() {
        let mut g: FlowGraph<()> = FlowGraph::new();
        let root = g.add_collection(5);
        g.add_node(root, (), 5).unwrap();
        assert_eq!(g.stream_flow(root).run_to_stable(&mut g).unwrap(), 0);
    }
}
