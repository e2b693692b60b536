//! Kernel registry: `(api, operator, dtype)` to kernel bundle.
//!
//! Kernels are registered at process start and looked up after a session is
//! built or imported. The binary model format never stores kernel pointers,
//! so reloading a model always goes through this registry to reattach live
//! callbacks.

use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use dashmap::DashMap;
use rein_core::{Api, DataType, OpKind, ParamsBlock};
use tracing::{debug, info};

/// A runnable kernel for one `(api, operator, dtype)` combination.
///
/// Inputs arrive as decoded element slices in graph edge order; outputs are
/// preallocated to the destination tensor's element count and written in
/// place.
pub trait Kernel: Send + Sync {
    /// Execute the operator.
    fn run(&self, inputs: &[&[f32]], outputs: &mut [Vec<f32>], params: &ParamsBlock) -> Result<()>;
}

/// Lookup key of a registered kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelKey {
    /// Backend family.
    pub api: Api,
    /// Operator kind.
    pub op: OpKind,
    /// Element type the kernel computes in.
    pub dtype: DataType,
}

/// Concurrent registry of kernel bundles.
pub struct KernelRegistry {
    kernels: DashMap<KernelKey, Arc<dyn Kernel>>,
}

impl fmt::Debug for KernelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelRegistry")
            .field("kernels", &self.kernels.len())
            .finish()
    }
}

impl Default for KernelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            kernels: DashMap::new(),
        }
    }

    /// Register a kernel, replacing any previous binding for the key.
    pub fn register(&self, api: Api, op: OpKind, dtype: DataType, kernel: Arc<dyn Kernel>) {
        debug!(?api, ?op, ?dtype, "registered kernel");
        self.kernels.insert(KernelKey { api, op, dtype }, kernel);
    }

    /// Look up a kernel, falling back to the reference backend when the
    /// requested api has no binding.
    pub fn lookup(&self, api: Api, op: OpKind, dtype: DataType) -> Option<Arc<dyn Kernel>> {
        if let Some(k) = self.kernels.get(&KernelKey { api, op, dtype }) {
            return Some(k.clone());
        }
        if api != Api::Reference {
            return self.lookup(Api::Reference, op, dtype);
        }
        None
    }

    /// Like [`KernelRegistry::lookup`], but an absent kernel is an error.
    pub fn require(&self, api: Api, op: OpKind, dtype: DataType) -> Result<Arc<dyn Kernel>> {
        self.lookup(api, op, dtype)
            .ok_or_else(|| anyhow!("no kernel registered for {api:?}/{op:?}/{dtype:?}"))
    }

    /// Number of registered kernels.
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}

/// Build a registry preloaded with the reference CPU kernels.
pub fn reference_registry() -> KernelRegistry {
    let registry = KernelRegistry::new();
    crate::cpu::register_reference_kernels(&registry);
    info!(kernels = registry.len(), "initialized reference kernel registry");
    registry
}
