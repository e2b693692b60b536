//! Layer-by-layer graph executor.
//!
//! Construction resolves every layer's kernel through the registry — this is
//! the reattach step a freshly imported session must go through, since the
//! binary model never stores kernel pointers. Execution walks the layer
//! sequence in order, allocating output buffers before each layer and
//! releasing input buffers whose consumer count reaches zero after it.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use rein_core::{DataType, Graph, NodeId, Tensor, TensorData};
use tracing::debug;

use crate::registry::{Kernel, KernelRegistry};

/// A graph bound to live kernels, ready to run.
pub struct GraphExecutor<'g> {
    graph: &'g Graph,
    kernels: Vec<Arc<dyn Kernel>>,
    /// Initial consumer count per arena node, re-applied before each run.
    init_counts: Vec<u32>,
}

impl<'g> GraphExecutor<'g> {
    /// Bind every layer of `graph` to a kernel from `registry`.
    ///
    /// Also derives each node's initial consumer count: one per consuming
    /// edge, plus a pin on every designated graph output and on the last
    /// layer's outputs so result buffers survive the run. Counts stored in
    /// the model are ignored; only consumer edges decide buffer lifetime.
    pub fn new(graph: &'g Graph, registry: &KernelRegistry) -> Result<Self> {
        graph.validate()?;

        let mut init_counts = vec![0u32; graph.node_count()];
        for &layer_id in graph.layers() {
            let layer = graph.node(layer_id).expect("validated");
            for target in layer.inputs.iter().flatten() {
                init_counts[*target] += 1;
            }
        }
        if let Some(&last_id) = graph.layers().last() {
            for target in graph.node(last_id).expect("validated").outputs.iter().flatten() {
                init_counts[*target] += 1;
            }
        }
        for &output in graph.outputs() {
            init_counts[output] += 1;
        }
        for (node, &count) in graph.nodes().iter().zip(&init_counts) {
            node.ref_count.set(count);
        }

        let mut kernels = Vec::with_capacity(graph.layer_count());
        for (li, &layer_id) in graph.layers().iter().enumerate() {
            let layer = graph.node(layer_id).expect("validated");
            let kind = layer
                .op_kind()
                .ok_or_else(|| anyhow!("layer {li} is not an operator"))?;
            let params = layer.params().expect("validated");
            let dtype = layer
                .inputs
                .first()
                .copied()
                .flatten()
                .and_then(|id| graph.node(id))
                .and_then(|n| n.tensor())
                .map(|t| t.dtype)
                .unwrap_or(DataType::Float32);
            let kernel = registry
                .require(params.base.api, kind, dtype)
                .with_context(|| format!("binding layer {li} '{}'", layer.name))?;
            kernels.push(kernel);
        }
        debug!(layers = kernels.len(), "bound graph to kernels");
        Ok(Self {
            graph,
            kernels,
            init_counts,
        })
    }

    /// Execute the graph on `inputs`, one tensor per designated graph input,
    /// returning one tensor per designated graph output.
    pub fn run(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let graph = self.graph;
        if inputs.len() != graph.inputs().len() {
            bail!(
                "graph takes {} inputs, got {}",
                graph.inputs().len(),
                inputs.len()
            );
        }

        // Reset consumer counts for this run.
        for (node, &count) in graph.nodes().iter().zip(&self.init_counts) {
            node.ref_count.set(count);
        }

        let mut buffers: HashMap<NodeId, Vec<f32>> = HashMap::new();
        for (&node_id, tensor) in graph.inputs().iter().zip(inputs) {
            buffers.insert(node_id, decode_f32(tensor)?);
        }

        for (li, &layer_id) in graph.layers().iter().enumerate() {
            let layer = graph.node(layer_id).expect("validated");

            let mut in_slices: Vec<Vec<f32>> = Vec::with_capacity(layer.inputs.len());
            for target in layer.inputs.iter().flatten() {
                if let Some(buf) = buffers.get(target) {
                    in_slices.push(buf.clone());
                    continue;
                }
                let node = graph.node(*target).expect("validated");
                let tensor = node
                    .tensor()
                    .ok_or_else(|| anyhow!("layer {li} consumes a non-tensor node"))?;
                in_slices.push(decode_f32(tensor).with_context(|| {
                    format!("decoding constant '{}' for layer {li}", tensor.name)
                })?);
            }
            let in_refs: Vec<&[f32]> = in_slices.iter().map(|v| v.as_slice()).collect();

            let mut out_bufs: Vec<Vec<f32>> = layer
                .outputs
                .iter()
                .map(|slot| match slot {
                    Some(id) => {
                        let n = graph.node(*id).expect("validated");
                        let count = n.tensor().map(Tensor::element_count).unwrap_or(0);
                        vec![0.0; count]
                    }
                    None => Vec::new(),
                })
                .collect();

            self.kernels[li]
                .run(&in_refs, &mut out_bufs, layer.params().expect("validated"))
                .with_context(|| format!("running layer {li} '{}'", layer.name))?;

            for (slot, buf) in layer.outputs.iter().zip(out_bufs) {
                if let Some(id) = slot {
                    buffers.insert(*id, buf);
                }
            }

            // Release input buffers nothing downstream will read again.
            for target in layer.inputs.iter().flatten() {
                let node = graph.node(*target).expect("validated");
                let remaining = node.ref_count.get().saturating_sub(1);
                node.ref_count.set(remaining);
                if remaining == 0 {
                    buffers.remove(target);
                }
            }
        }

        let mut results = Vec::with_capacity(graph.outputs().len());
        for &output in graph.outputs() {
            let node = graph.node(output).expect("validated");
            let values = buffers
                .get(&output)
                .ok_or_else(|| anyhow!("output '{}' was never produced", node.name))?;
            let template = node
                .tensor()
                .ok_or_else(|| anyhow!("output '{}' is not a tensor node", node.name))?;
            let mut tensor = template.clone();
            tensor.data = Some(TensorData::Owned(encode_f32(values)));
            results.push(tensor);
        }
        Ok(results)
    }
}

fn decode_f32(tensor: &Tensor) -> Result<Vec<f32>> {
    if tensor.dtype != DataType::Float32 {
        bail!(
            "tensor '{}' is {:?}, the reference executor computes in f32",
            tensor.name,
            tensor.dtype
        );
    }
    let bytes = tensor
        .data_bytes()
        .ok_or_else(|| anyhow!("tensor '{}' has no payload", tensor.name))?;
    if bytes.len() % 4 != 0 {
        bail!("tensor '{}' payload is not a whole number of f32", tensor.name);
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
        .collect())
}

fn encode_f32(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::reference_registry;
    use rein_core::{OpKind, OpParams, ParamsBlock};

    fn f32_tensor(name: &str, values: &[f32]) -> Tensor {
        let mut t = Tensor::new(name, DataType::Float32, vec![1, values.len() as i32]).unwrap();
        t.data = Some(TensorData::Owned(encode_f32(values)));
        t
    }

    #[test]
    fn relu_chain_executes() {
        let mut graph = Graph::new();
        let a = graph
            .add_var(Tensor::new("in", DataType::Float32, vec![1, 4]).unwrap());
        let b = graph
            .add_var(Tensor::new("mid", DataType::Float32, vec![1, 4]).unwrap());
        let c = graph
            .add_var(Tensor::new("out", DataType::Float32, vec![1, 4]).unwrap());
        graph
            .add_layer(
                OpKind::Relu,
                "relu",
                ParamsBlock::new("relu", OpParams::Relu { n: 0.0 }),
                vec![a],
                vec![Some(b)],
            )
            .unwrap();
        graph
            .add_layer(
                OpKind::Sigmoid,
                "sig",
                ParamsBlock::new("sig", OpParams::Plain),
                vec![b],
                vec![Some(c)],
            )
            .unwrap();
        graph.set_inputs(vec![a]);
        graph.set_outputs(vec![c]);

        let registry = reference_registry();
        let executor = GraphExecutor::new(&graph, &registry).unwrap();
        let out = executor
            .run(&[f32_tensor("in", &[-2.0, -1.0, 0.0, 2.0])])
            .unwrap();

        let values = decode_f32(&out[0]).unwrap();
        assert_eq!(values[0], 0.5); // sigmoid(relu(-2)) = sigmoid(0)
        assert!(values[3] > 0.8); // sigmoid(2)
    }

    #[test]
    fn missing_kernel_is_a_bind_error() {
        let mut graph = Graph::new();
        let a = graph
            .add_var(Tensor::new("in", DataType::Float32, vec![1, 2]).unwrap());
        let b = graph
            .add_var(Tensor::new("out", DataType::Float32, vec![1, 2]).unwrap());
        graph
            .add_layer(
                OpKind::MatMul,
                "mm",
                ParamsBlock::new(
                    "mm",
                    OpParams::MatMul {
                        trans_a: false,
                        trans_b: false,
                    },
                ),
                vec![a, a],
                vec![Some(b)],
            )
            .unwrap();
        graph.set_inputs(vec![a]);
        graph.set_outputs(vec![b]);

        let registry = reference_registry();
        assert!(GraphExecutor::new(&graph, &registry).is_err());
    }
}
