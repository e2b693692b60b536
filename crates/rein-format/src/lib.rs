//! REIN binary model serializer.
//!
//! Converts a live session — computation graph, tensors, operator
//! parameters, session configuration — into one self-contained,
//! position-independent byte blob, and reloads such blobs into runnable
//! sessions. Every internal reference on the wire is a signed 64-bit offset
//! relative to its containing block, so the blob works at any base address;
//! shared graph nodes are stored once and back-referenced through compact
//! location codes.
//!
//! What is *never* stored: backend kernel pointers. A freshly imported
//! session re-attaches kernels through the `rein-providers` registry.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rein_core::{DataType, Graph, OpKind, OpParams, ParamsBlock, Session, Tensor};
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
//!
//! let session = Session::new().with_graph(graph);
//! let blob = rein_format::dump(&session)?;
//! let reloaded = rein_format::import(Arc::from(blob))?;
//! assert_eq!(reloaded.model.graph().unwrap().layer_count(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(clippy::all)]

pub mod container;
pub mod error;
pub mod graph;
pub mod layer;
pub mod location;
pub mod node;
pub mod offset;
pub mod params;
pub mod session;
pub mod tensor;
pub mod version;
pub mod wire;

pub use container::{dump, import, SECTION_INFO_SIZE};
pub use error::{FormatError, Result};
pub use graph::{dump_graph, load_graph};
pub use location::{find_first_appearance, Direction, LocationCode, LocationIndex};
pub use offset::{offset_to_pointer, pointer_to_offset, pointer_width_check};
pub use tensor::{dump_tensor, load_tensor, load_tensor_into, BlobSource};
pub use version::{check_version, FormatVersion, CURRENT_VERSION, HEADER_SIZE, PAGE_SIZE};
