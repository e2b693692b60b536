//! Inference session: global defaults, io tensors and the model reference.

use crate::graph::Graph;
use crate::tensor::{SharedBytes, Tensor};
use crate::types::{Api, DataType, QuantType, RunMode, TensorLayout};

/// What a session executes.
#[derive(Debug, Clone, Default)]
pub enum ModelRef {
    /// No model attached yet.
    #[default]
    None,
    /// A live, interpretable graph.
    Graph(Graph),
    /// An opaque precompiled backend blob, passed through verbatim.
    Blob(SharedBytes),
}

impl ModelRef {
    /// The live graph, if this reference holds one.
    pub fn graph(&self) -> Option<&Graph> {
        match self {
            ModelRef::Graph(g) => Some(g),
            _ => None,
        }
    }
}

/// A runnable inference session.
///
/// The session owns its io tensor descriptors and either a graph or a
/// precompiled blob, depending on [`RunMode`]. Backend kernel bindings are
/// process-local: a freshly imported session must go through the provider
/// registry before it can execute.
#[derive(Debug, Clone)]
pub struct Session {
    /// Default data type for tensors created under this session.
    pub base_dtype: DataType,
    /// Default layout for tensors created under this session.
    pub base_layout: TensorLayout,
    /// Default backend family for operators.
    pub base_api: Api,
    /// Execution mode, deciding which model section a container carries.
    pub run_mode: RunMode,
    /// Default quantization scheme.
    pub base_quant_type: QuantType,
    /// Diagnostic verbosity requested by the builder.
    pub debug_level: i32,
    /// Profiler verbosity requested by the builder.
    pub profiler_level: i32,
    /// Scheduling priority hint for NPU backends.
    pub priority: i32,
    /// Session input tensor descriptors.
    pub inputs: Vec<Tensor>,
    /// Session output tensor descriptors.
    pub outputs: Vec<Tensor>,
    /// The model this session executes.
    pub model: ModelRef,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            base_dtype: DataType::Float32,
            base_layout: TensorLayout::Nchw,
            base_api: Api::Reference,
            run_mode: RunMode::Graph,
            base_quant_type: QuantType::Unset,
            debug_level: 0,
            profiler_level: 0,
            priority: 0,
            inputs: Vec::new(),
            outputs: Vec::new(),
            model: ModelRef::None,
        }
    }
}

impl Session {
    /// Create a session with reference-backend defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the run mode, builder style.
    pub fn with_run_mode(mut self, mode: RunMode) -> Self {
        self.run_mode = mode;
        self
    }

    /// Attach a graph and switch to graph execution.
    pub fn with_graph(mut self, graph: Graph) -> Self {
        self.run_mode = RunMode::Graph;
        self.model = ModelRef::Graph(graph);
        self
    }
}
