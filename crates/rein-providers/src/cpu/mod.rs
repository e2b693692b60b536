//! Reference CPU provider: portable f32 kernels.

pub mod kernels;

use std::sync::Arc;

use rein_core::{Api, DataType, OpKind};

use crate::registry::KernelRegistry;
use kernels::{
    AddKernel, LeakyReluKernel, MulKernel, Relu6Kernel, ReluKernel, SigmoidKernel, SoftmaxKernel,
    TanhKernel,
};

/// Register the reference f32 kernels under [`Api::Reference`].
pub fn register_reference_kernels(registry: &KernelRegistry) {
    let dtype = DataType::Float32;
    registry.register(Api::Reference, OpKind::Relu, dtype, Arc::new(ReluKernel));
    registry.register(Api::Reference, OpKind::Relu6, dtype, Arc::new(Relu6Kernel));
    registry.register(
        Api::Reference,
        OpKind::LeakyRelu,
        dtype,
        Arc::new(LeakyReluKernel),
    );
    registry.register(Api::Reference, OpKind::Sigmoid, dtype, Arc::new(SigmoidKernel));
    registry.register(Api::Reference, OpKind::Tanh, dtype, Arc::new(TanhKernel));
    registry.register(Api::Reference, OpKind::Softmax, dtype, Arc::new(SoftmaxKernel));
    registry.register(Api::Reference, OpKind::Add, dtype, Arc::new(AddKernel));
    registry.register(Api::Reference, OpKind::Mul, dtype, Arc::new(MulKernel));
}
