//! Import-then-execute tests: a serialized model reloads into a session
//! whose kernels are reattached through the registry and produce the same
//! numbers as the original graph.

use std::sync::Arc;

use rein_core::{DataType, Graph, OpKind, OpParams, ParamsBlock, Session, Tensor, TensorData};
use rein_providers::{reference_registry, GraphExecutor};

fn f32_tensor(name: &str, values: &[f32]) -> Tensor {
    let mut t = Tensor::new(name, DataType::Float32, vec![1, values.len() as i32]).unwrap();
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    t.data = Some(TensorData::Owned(bytes));
    t
}

fn to_f32(t: &Tensor) -> Vec<f32> {
    t.data_bytes()
        .unwrap()
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

fn relu_relu_softmax() -> Graph {
    let mut graph = Graph::new();
    let input = graph.add_var(Tensor::new("input", DataType::Float32, vec![1, 4]).unwrap());
    let act0 = graph.add_var(Tensor::new("act0", DataType::Float32, vec![1, 4]).unwrap());
    let act1 = graph.add_var(Tensor::new("act1", DataType::Float32, vec![1, 4]).unwrap());
    let probs = graph.add_var(Tensor::new("probs", DataType::Float32, vec![1, 4]).unwrap());
    graph
        .add_layer(
            OpKind::Relu,
            "relu0",
            ParamsBlock::new("relu0", OpParams::Relu { n: 0.0 }),
            vec![input],
            vec![Some(act0)],
        )
        .unwrap();
    graph
        .add_layer(
            OpKind::Relu,
            "relu1",
            ParamsBlock::new("relu1", OpParams::Relu { n: 0.0 }),
            vec![act0],
            vec![Some(act1)],
        )
        .unwrap();
    graph
        .add_layer(
            OpKind::Softmax,
            "softmax",
            ParamsBlock::new("softmax", OpParams::Softmax { axis: 1 }),
            vec![act1],
            vec![Some(probs)],
        )
        .unwrap();
    graph.set_inputs(vec![input]);
    graph.set_outputs(vec![probs]);
    graph
}

#[test]
fn imported_session_runs_like_the_original() {
    let registry = reference_registry();
    let input = f32_tensor("input", &[-1.0, 0.5, 2.0, -3.0]);

    // Run the graph as built.
    let graph = relu_relu_softmax();
    let direct = GraphExecutor::new(&graph, &registry)
        .unwrap()
        .run(std::slice::from_ref(&input))
        .unwrap();

    // Dump, reimport, reattach kernels, run again.
    let session = Session::new().with_graph(graph);
    let blob = rein_format::dump(&session).unwrap();
    let loaded = rein_format::import(Arc::from(blob)).unwrap();
    let reloaded_graph = loaded.model.graph().unwrap();
    let reloaded = GraphExecutor::new(reloaded_graph, &registry)
        .unwrap()
        .run(std::slice::from_ref(&input))
        .unwrap();

    let a = to_f32(&direct[0]);
    let b = to_f32(&reloaded[0]);
    assert_eq!(a.len(), 4);
    for (x, y) in a.iter().zip(&b) {
        assert!((x - y).abs() < 1e-6, "diverged: {x} vs {y}");
    }
    // Softmax output sums to one.
    let sum: f32 = b.iter().sum();
    assert!((sum - 1.0).abs() < 1e-6);
}

#[test]
fn executor_reads_reloaded_constants() {
    // input + const weights, where the weights round-trip through the blob.
    let mut graph = Graph::new();
    let input = graph.add_var(Tensor::new("input", DataType::Float32, vec![1, 3]).unwrap());
    let weights = graph.add_var({
        let mut t = f32_tensor("weights", &[10.0, 20.0, 30.0]);
        t.is_const = true;
        t
    });
    let out = graph.add_var(Tensor::new("out", DataType::Float32, vec![1, 3]).unwrap());
    graph
        .add_layer(
            OpKind::Add,
            "bias",
            ParamsBlock::new("bias", OpParams::Plain),
            vec![input, weights],
            vec![Some(out)],
        )
        .unwrap();
    graph.set_inputs(vec![input]);
    graph.set_outputs(vec![out]);

    let session = Session::new().with_graph(graph);
    let blob = rein_format::dump(&session).unwrap();
    let loaded = rein_format::import(Arc::from(blob)).unwrap();

    let registry = reference_registry();
    let out = GraphExecutor::new(loaded.model.graph().unwrap(), &registry)
        .unwrap()
        .run(&[f32_tensor("input", &[1.0, 2.0, 3.0])])
        .unwrap();
    assert_eq!(to_f32(&out[0]), vec![11.0, 22.0, 33.0]);
}

#[test]
fn run_twice_is_stable() {
    let registry = reference_registry();
    let graph = relu_relu_softmax();
    let executor = GraphExecutor::new(&graph, &registry).unwrap();
    let input = f32_tensor("input", &[0.0, 1.0, 2.0, 3.0]);
    let first = executor.run(std::slice::from_ref(&input)).unwrap();
    let second = executor.run(std::slice::from_ref(&input)).unwrap();
    assert_eq!(to_f32(&first[0]), to_f32(&second[0]));
}
