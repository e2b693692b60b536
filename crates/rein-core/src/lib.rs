//! REIN core object model.
//!
//! This crate defines the in-memory shape of an inference model for the REIN
//! embedded runtime: tensors, operator nodes, the computation graph, the
//! session that ties them together, and the closed set of operator parameter
//! blocks. The binary (de)serializer lives in `rein-format`; kernel
//! registration and execution live in `rein-providers`.
//!
//! ## Architecture
//!
//! - **Types**: wire-stable enums, quantization records and the byte-size law
//! - **Tensor / Node / Graph**: an arena-indexed DAG with shared consumers
//! - **Session**: io descriptors plus a graph or a precompiled blob
//! - **Params**: one variant per operator family, matched exhaustively
//!
//! ## Example
//!
//! ```rust
//! use rein_core::{DataType, Graph, OpKind, OpParams, ParamsBlock, Tensor};
//!
//! let mut graph = Graph::new();
//! let input = graph.add_var(Tensor::new("in", DataType::Float32, vec![1, 8])?);
//! let output = graph.add_var(Tensor::new("out", DataType::Float32, vec![1, 8])?);
//! graph.add_layer(
//!     OpKind::Relu,
//!     "relu",
//!     ParamsBlock::new("relu", OpParams::Relu { n: 0.0 }),
//!     vec![input],
//!     vec![Some(output)],
//! )?;
//! graph.set_inputs(vec![input]);
//! graph.set_outputs(vec![output]);
//! graph.validate()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod graph;
pub mod logging;
pub mod node;
pub mod params;
pub mod session;
pub mod tensor;
pub mod types;

pub use error::{CoreError, Result};
pub use graph::Graph;
pub use logging::{init_logging, LogLevel, LoggingConfig};
pub use node::{Node, NodeId, NodeKind, NodePayload};
pub use params::{OpParams, PadMode, ParamsBase, ParamsBlock};
pub use session::{ModelRef, Session};
pub use tensor::{SharedBytes, Tensor, TensorData};
pub use types::{
    Api, DataType, MemoryType, OpKind, QuantInfo, QuantType, RunMode, TensorLayout, MAX_DIM,
};
