//! Graph nodes: operator layers and plain tensor holders.

use std::cell::Cell;

use crate::params::ParamsBlock;
use crate::tensor::Tensor;
use crate::types::OpKind;

/// Index of a node in its graph's arena.
pub type NodeId = usize;

/// What a node is: an operator invocation or a plain tensor holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Holds a [`Tensor`]; produced or consumed by operator layers.
    Tensor,
    /// An operator layer of the given kind.
    Op(OpKind),
}

/// Payload owned by a node, shaped by its kind.
#[derive(Debug, Clone)]
pub enum NodePayload {
    /// Payload of a tensor-holder node.
    Tensor(Tensor),
    /// Payload of an operator node.
    Params(ParamsBlock),
}

/// One entry in a graph: either an operator layer or a tensor holder.
///
/// Edges are arena indices; `inputs`/`outputs` are meaningful on operator
/// nodes (an output slot may be vacant when a layer uses fewer outputs than
/// its kind allows). `ref_count` and `visited` are transient scratch used by
/// the serializer's traversal and the executor's buffer lifetime pass; they
/// are interior-mutable so those passes can run over a shared graph
/// reference. Running two traversals over one graph concurrently is the
/// caller's bug to avoid.
#[derive(Debug, Clone)]
pub struct Node {
    /// Operator discriminant or the tensor-holder sentinel.
    pub kind: NodeKind,
    /// Node name; tensor holders take their tensor's name.
    pub name: String,
    /// Index of the subgraph this node belongs to; 0 for the main graph.
    pub subgraph_index: i32,
    /// Input edges (operator nodes).
    pub inputs: Vec<Option<NodeId>>,
    /// Output edges (operator nodes).
    pub outputs: Vec<Option<NodeId>>,
    /// Kind-shaped payload.
    pub payload: NodePayload,
    /// Live consumer count, maintained by the executor.
    pub ref_count: Cell<u32>,
    /// Initial consumer count captured at setup.
    pub ref_count_init: u32,
    /// Traversal scratch flag, cleared before and after a dump.
    pub visited: Cell<bool>,
}

impl Node {
    /// Create a tensor-holder node named after its tensor.
    pub fn var(tensor: Tensor) -> Self {
        Self {
            kind: NodeKind::Tensor,
            name: tensor.name.clone(),
            subgraph_index: 0,
            inputs: Vec::new(),
            outputs: Vec::new(),
            payload: NodePayload::Tensor(tensor),
            ref_count: Cell::new(0),
            ref_count_init: 0,
            visited: Cell::new(false),
        }
    }

    /// Create an operator node with no edges attached yet.
    pub fn op(kind: OpKind, name: impl Into<String>, params: ParamsBlock) -> Self {
        Self {
            kind: NodeKind::Op(kind),
            name: name.into(),
            subgraph_index: 0,
            inputs: Vec::new(),
            outputs: Vec::new(),
            payload: NodePayload::Params(params),
            ref_count: Cell::new(0),
            ref_count_init: 0,
            visited: Cell::new(false),
        }
    }

    /// Whether this node is a tensor holder.
    pub fn is_var(&self) -> bool {
        self.kind == NodeKind::Tensor
    }

    /// The operator kind, if this node is an operator.
    pub fn op_kind(&self) -> Option<OpKind> {
        match self.kind {
            NodeKind::Op(k) => Some(k),
            NodeKind::Tensor => None,
        }
    }

    /// The tensor payload, if this node is a tensor holder.
    pub fn tensor(&self) -> Option<&Tensor> {
        match &self.payload {
            NodePayload::Tensor(t) => Some(t),
            NodePayload::Params(_) => None,
        }
    }

    /// Mutable tensor payload, if this node is a tensor holder.
    pub fn tensor_mut(&mut self) -> Option<&mut Tensor> {
        match &mut self.payload {
            NodePayload::Tensor(t) => Some(t),
            NodePayload::Params(_) => None,
        }
    }

    /// The parameter payload, if this node is an operator.
    pub fn params(&self) -> Option<&ParamsBlock> {
        match &self.payload {
            NodePayload::Params(p) => Some(p),
            NodePayload::Tensor(_) => None,
        }
    }
}
