//! Graph section dump and load.
//!
//! ```text
//! 0   layer_count   u32
//! 4   input_count   u32
//! 8   output_count  u32
//! 12  reserved      u32
//! 16  layer offsets layer_count x i64
//! ... input codes   input_count x u64
//! ... output codes  output_count x u64
//! ... layer records
//! ```
//!
//! Layers are stored, and must be reloaded, in forward order: a record may
//! back-reference any earlier record (or earlier slots of itself) but never
//! a later one.

use tracing::debug;

use rein_core::Graph;

use crate::error::{FormatError, Result};
use crate::layer::{dump_layer, load_layer, resolve_in_graph};
use crate::location::{find_first_appearance, LocationCode, LocationIndex};
use crate::tensor::BlobSource;
use crate::wire::{BlockReader, BlockWriter};

const GRAPH_HEADER_SIZE: usize = 16;

/// Serialize a whole graph into a self-contained section.
///
/// The traversal uses each node's `visited` scratch flag, cleared before
/// and after; at most one dump per graph may run at a time.
pub fn dump_graph(graph: &Graph) -> Result<Vec<u8>> {
    graph.validate()?;
    graph.clear_visited();

    let index = LocationIndex::build(graph)?;

    let mut w = BlockWriter::new();
    w.put_u32(graph.layer_count() as u32);
    w.put_u32(graph.inputs().len() as u32);
    w.put_u32(graph.outputs().len() as u32);
    w.put_u32(0);
    let layer_table: Vec<usize> = (0..graph.layer_count()).map(|_| w.reserve_i64()).collect();
    debug_assert_eq!(w.pos(), GRAPH_HEADER_SIZE + 8 * graph.layer_count());

    // Designated io nodes must be discoverable; a graph whose input no layer
    // consumes (or whose output no layer produces) cannot be reloaded.
    for &input in graph.inputs() {
        let loc = find_first_appearance(graph, input)?.ok_or_else(|| {
            FormatError::Malformed(format!(
                "graph input '{}' is not consumed by any layer",
                graph.node(input).map(|n| n.name.as_str()).unwrap_or("?")
            ))
        })?;
        w.put_u64(loc.encode());
    }
    for &output in graph.outputs() {
        let loc = find_first_appearance(graph, output)?.ok_or_else(|| {
            FormatError::Malformed(format!(
                "graph output '{}' is not produced by any layer",
                graph.node(output).map(|n| n.name.as_str()).unwrap_or("?")
            ))
        })?;
        w.put_u64(loc.encode());
    }

    for (li, &offset_at) in layer_table.iter().enumerate() {
        w.patch_i64(offset_at, w.pos() as i64);
        let record = dump_layer(graph, li, &index)?;
        w.put_bytes(&record);
    }

    graph.clear_visited();
    debug!(
        layers = graph.layer_count(),
        bytes = w.pos(),
        "dumped graph section"
    );
    Ok(w.into_vec())
}

/// Deserialize a graph section.
///
/// Layer records load strictly in stored order so every back-reference
/// lands on an already-built layer.
pub fn load_graph(block: &[u8], src: &BlobSource) -> Result<Graph> {
    let mut r = BlockReader::new(block);
    let layer_count = r.get_u32()? as usize;
    let input_count = r.get_u32()? as usize;
    let output_count = r.get_u32()? as usize;
    let _reserved = r.get_u32()?;

    let mut layer_offsets = Vec::with_capacity(layer_count);
    for _ in 0..layer_count {
        layer_offsets.push(r.get_i64()?);
    }
    let mut input_codes = Vec::with_capacity(input_count);
    for _ in 0..input_count {
        input_codes.push(r.get_u64()?);
    }
    let mut output_codes = Vec::with_capacity(output_count);
    for _ in 0..output_count {
        output_codes.push(r.get_u64()?);
    }

    let mut graph = Graph::new();
    for (li, &offset) in layer_offsets.iter().enumerate() {
        let record = r.tail_at(offset)?;
        load_layer(record, &mut graph, &src.child(offset as usize)).map_err(|e| {
            debug!(layer = li, "layer load failed");
            e
        })?;
    }

    let mut inputs = Vec::with_capacity(input_count);
    for &raw in &input_codes {
        let code = LocationCode::decode(raw).ok_or(FormatError::UnresolvedLocation {
            code: raw,
            layer: layer_count,
        })?;
        inputs.push(resolve_in_graph(&graph, code, raw)?);
    }
    let mut outputs = Vec::with_capacity(output_count);
    for &raw in &output_codes {
        let code = LocationCode::decode(raw).ok_or(FormatError::UnresolvedLocation {
            code: raw,
            layer: layer_count,
        })?;
        outputs.push(resolve_in_graph(&graph, code, raw)?);
    }
    graph.set_inputs(inputs);
    graph.set_outputs(outputs);

    debug!(layers = layer_count, nodes = graph.node_count(), "loaded graph section");
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rein_core::{DataType, NodeId, OpKind, OpParams, ParamsBlock, Tensor};

    fn var(g: &mut Graph, name: &str) -> NodeId {
        g.add_var(Tensor::new(name, DataType::Float32, vec![1, 4]).unwrap())
    }

    fn relu(name: &str) -> ParamsBlock {
        ParamsBlock::new(name, OpParams::Relu { n: 0.0 })
    }

    /// A diamond: one producer feeding two consumers, joined by an add.
    fn diamond() -> Graph {
        let mut g = Graph::new();
        let a = var(&mut g, "in");
        let b = var(&mut g, "mid");
        let c = var(&mut g, "left");
        let d = var(&mut g, "right");
        let e = var(&mut g, "out");
        g.add_layer(OpKind::Relu, "r0", relu("r0"), vec![a], vec![Some(b)])
            .unwrap();
        g.add_layer(OpKind::Relu, "r1", relu("r1"), vec![b], vec![Some(c)])
            .unwrap();
        g.add_layer(OpKind::Sigmoid, "s0", ParamsBlock::new("s0", OpParams::Plain), vec![b], vec![Some(d)])
            .unwrap();
        g.add_layer(
            OpKind::Add,
            "join",
            ParamsBlock::new("join", OpParams::Plain),
            vec![c, d],
            vec![Some(e)],
        )
        .unwrap();
        g.set_inputs(vec![a]);
        g.set_outputs(vec![e]);
        g
    }

    #[test]
    fn shared_node_loads_as_one_arena_entry() {
        let g = diamond();
        let section = dump_graph(&g).unwrap();
        let loaded = load_graph(&section, &BlobSource::Private).unwrap();

        assert_eq!(loaded.layer_count(), 4);
        // "mid" feeds both r1 and s0; both consumers share one node id.
        let r1_in = loaded.layer(1).unwrap().inputs[0];
        let s0_in = loaded.layer(2).unwrap().inputs[0];
        assert_eq!(r1_in, s0_in);
        // Arena holds exactly the original five tensor nodes plus four ops.
        assert_eq!(loaded.node_count(), g.node_count());
    }

    #[test]
    fn dump_clears_visited_flags() {
        let g = diamond();
        dump_graph(&g).unwrap();
        assert!(g.nodes().iter().all(|n| !n.visited.get()));
    }

    #[test]
    fn unconsumed_input_is_a_dump_error() {
        let mut g = Graph::new();
        let a = var(&mut g, "in");
        let orphan = var(&mut g, "orphan");
        let b = var(&mut g, "out");
        g.add_layer(OpKind::Relu, "r", relu("r"), vec![a], vec![Some(b)])
            .unwrap();
        g.set_inputs(vec![orphan]);
        g.set_outputs(vec![b]);
        assert!(dump_graph(&g).is_err());
    }
}
