//! REIN execution providers.
//!
//! The kernel registry maps `(api, operator, dtype)` to runnable kernel
//! bundles; the reference CPU provider fills it with portable f32 kernels,
//! and the graph executor binds a live or freshly imported graph to those
//! kernels and runs it layer by layer.
//!
//! The binary model format never stores kernel pointers, so this crate is
//! the reattach path for imported sessions:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rein_providers::{reference_registry, GraphExecutor};
//!
//! let blob: Arc<[u8]> = Arc::from(std::fs::read("model.rnb")?);
//! let session = rein_format::import(blob)?;
//! let graph = session.model.graph().expect("graph session");
//!
//! let registry = reference_registry();
//! let executor = GraphExecutor::new(graph, &registry)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(clippy::all)]

pub mod cpu;
pub mod executor;
pub mod registry;

pub use executor::GraphExecutor;
pub use registry::{reference_registry, Kernel, KernelKey, KernelRegistry};
