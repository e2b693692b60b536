//! Computation graph: a node arena plus an ordered layer sequence.
//!
//! The graph is a DAG, not a tree: a tensor node may feed any number of
//! layers, and all of them reference the same arena index. Layers are kept
//! in forward topological order by construction — the serializer depends on
//! that ordering.

use crate::error::{CoreError, Result};
use crate::node::{Node, NodeId, NodeKind, NodePayload};
use crate::params::ParamsBlock;
use crate::tensor::Tensor;
use crate::types::OpKind;

/// A computation graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    layers: Vec<NodeId>,
    inputs: Vec<NodeId>,
    outputs: Vec<NodeId>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an arbitrary node to the arena.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        id
    }

    /// Add a tensor-holder node.
    pub fn add_var(&mut self, tensor: Tensor) -> NodeId {
        self.add_node(Node::var(tensor))
    }

    /// Append an operator layer wired to existing nodes.
    ///
    /// `inputs` must all exist; `outputs` may contain vacant slots for kinds
    /// whose maximum output arity exceeds what this instance uses.
    pub fn add_layer(
        &mut self,
        kind: OpKind,
        name: impl Into<String>,
        params: ParamsBlock,
        inputs: Vec<NodeId>,
        outputs: Vec<Option<NodeId>>,
    ) -> Result<NodeId> {
        let name = name.into();
        if !params.op.matches(kind) {
            return Err(CoreError::ParamsMismatch { name, kind });
        }
        for &id in inputs.iter().chain(outputs.iter().flatten()) {
            if id >= self.nodes.len() {
                return Err(CoreError::NodeOutOfBounds(id));
            }
        }
        let mut node = Node::op(kind, name, params);
        node.inputs = inputs.into_iter().map(Some).collect();
        node.outputs = outputs;
        let id = self.add_node(node);
        self.layers.push(id);
        Ok(id)
    }

    /// Designate the graph's input tensor nodes.
    pub fn set_inputs(&mut self, inputs: Vec<NodeId>) {
        self.inputs = inputs;
    }

    /// Designate the graph's output tensor nodes.
    pub fn set_outputs(&mut self, outputs: Vec<NodeId>) {
        self.outputs = outputs;
    }

    /// Node by arena index.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Mutable node by arena index.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// All nodes in the arena.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of nodes in the arena.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Layer node ids in execution order.
    pub fn layers(&self) -> &[NodeId] {
        &self.layers
    }

    /// Number of layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Layer node by position in the execution order.
    pub fn layer(&self, index: usize) -> Option<&Node> {
        self.layers.get(index).and_then(|&id| self.nodes.get(id))
    }

    /// Designated input node ids.
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// Designated output node ids.
    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    /// Reset every node's traversal flag.
    pub fn clear_visited(&self) {
        for node in &self.nodes {
            node.visited.set(false);
        }
    }

    /// Check the structural invariants the serializer relies on.
    ///
    /// Layers must be operator nodes with in-range edges and parameters
    /// matching their kind; designated inputs must be tensor holders that no
    /// layer produces (an input-only node never appears as an output).
    pub fn validate(&self) -> Result<()> {
        for (pos, &layer_id) in self.layers.iter().enumerate() {
            let node = self
                .nodes
                .get(layer_id)
                .ok_or(CoreError::NodeOutOfBounds(layer_id))?;
            let kind = match node.kind {
                NodeKind::Op(k) => k,
                NodeKind::Tensor => {
                    return Err(CoreError::InvalidGraph(format!(
                        "layer {pos} is a plain tensor node"
                    )))
                }
            };
            match &node.payload {
                NodePayload::Params(p) if p.op.matches(kind) => {}
                NodePayload::Params(_) => {
                    return Err(CoreError::ParamsMismatch {
                        name: node.name.clone(),
                        kind,
                    })
                }
                NodePayload::Tensor(_) => {
                    return Err(CoreError::InvalidGraph(format!(
                        "layer '{}' carries a tensor payload",
                        node.name
                    )))
                }
            }
            for id in node.inputs.iter().chain(node.outputs.iter()).flatten() {
                if *id >= self.nodes.len() {
                    return Err(CoreError::NodeOutOfBounds(*id));
                }
            }
            if node.inputs.iter().any(Option::is_none) {
                return Err(CoreError::InvalidGraph(format!(
                    "layer '{}' has a vacant input slot",
                    node.name
                )));
            }
        }
        for &input in &self.inputs {
            if input >= self.nodes.len() {
                return Err(CoreError::NodeOutOfBounds(input));
            }
            let produced = self.layers.iter().any(|&l| {
                self.nodes[l]
                    .outputs
                    .iter()
                    .any(|slot| *slot == Some(input))
            });
            if produced {
                return Err(CoreError::InvalidGraph(format!(
                    "designated input '{}' is produced by a layer",
                    self.nodes[input].name
                )));
            }
        }
        for &output in &self.outputs {
            if output >= self.nodes.len() {
                return Err(CoreError::NodeOutOfBounds(output));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::OpParams;
    use crate::types::DataType;

    fn relu_block(name: &str) -> ParamsBlock {
        ParamsBlock::new(name, OpParams::Relu { n: 0.0 })
    }

    fn var(graph: &mut Graph, name: &str) -> NodeId {
        graph.add_var(Tensor::new(name, DataType::Float32, vec![1, 4]).unwrap())
    }

    #[test]
    fn build_and_validate_chain() {
        let mut g = Graph::new();
        let a = var(&mut g, "in");
        let b = var(&mut g, "mid");
        let c = var(&mut g, "out");
        g.add_layer(OpKind::Relu, "relu0", relu_block("relu0"), vec![a], vec![Some(b)])
            .unwrap();
        g.add_layer(OpKind::Relu, "relu1", relu_block("relu1"), vec![b], vec![Some(c)])
            .unwrap();
        g.set_inputs(vec![a]);
        g.set_outputs(vec![c]);

        assert_eq!(g.layer_count(), 2);
        assert_eq!(g.node_count(), 5);
        g.validate().unwrap();
    }

    #[test]
    fn params_kind_mismatch_rejected() {
        let mut g = Graph::new();
        let a = var(&mut g, "in");
        let b = var(&mut g, "out");
        let err = g
            .add_layer(
                OpKind::Softmax,
                "sm",
                relu_block("sm"),
                vec![a],
                vec![Some(b)],
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::ParamsMismatch { .. }));
    }

    #[test]
    fn produced_input_rejected() {
        let mut g = Graph::new();
        let a = var(&mut g, "in");
        let b = var(&mut g, "mid");
        g.add_layer(OpKind::Relu, "relu", relu_block("relu"), vec![a], vec![Some(b)])
            .unwrap();
        g.set_inputs(vec![b]);
        assert!(g.validate().is_err());
    }

    #[test]
    fn clear_visited_resets_flags() {
        let mut g = Graph::new();
        let a = var(&mut g, "in");
        g.node(a).unwrap().visited.set(true);
        g.clear_visited();
        assert!(!g.node(a).unwrap().visited.get());
    }
}
