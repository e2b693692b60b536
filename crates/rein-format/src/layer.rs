//! Layer record dump and load.
//!
//! One record per operator layer:
//!
//! ```text
//! 0    node header (56 bytes) — the op node's scalars; its payload fields
//!      point at the params block in the tail
//! 56   input entries   in_count x i64
//! ...  output entries  out_count x i64
//! ...  variable tail: name, inlined node blocks, params block
//! ```
//!
//! An input entry is either a location code (top byte 0x81/0x82, negative as
//! i64) naming where the consumed node first appeared, or a positive
//! record-relative offset of a full inlined node block — the latter only at
//! the node's first appearance (graph inputs and constants). An output entry
//! is an inlined node block offset, or 0 for a vacant slot: an output is
//! always first declared at its producing layer.
//!
//! Loading resolves entries strictly in stored order against the graph
//! built so far, which is why layers must load in exactly the order they
//! were stored.

use tracing::debug;

use rein_core::{Graph, NodeId};

use crate::error::{FormatError, Result};
use crate::location::{Direction, LocationCode, LocationIndex};
use crate::node::{
    dump_var_node, load_var_node, read_node_header, write_node_header, NODE_HEADER_SIZE,
};
use crate::params::{dump_params, load_params};
use crate::tensor::BlobSource;
use crate::wire::{BlockReader, BlockWriter};

/// Serialize the layer at `layer_idx` into a self-contained record.
///
/// `index` is the graph's first-appearance map; nodes whose first appearance
/// is this very edge are inlined and marked visited, everything else is
/// written as a back-reference.
pub fn dump_layer(graph: &Graph, layer_idx: usize, index: &LocationIndex) -> Result<Vec<u8>> {
    let node = graph
        .layer(layer_idx)
        .ok_or_else(|| FormatError::Malformed(format!("layer {layer_idx} missing from arena")))?;
    let params = node.params().ok_or_else(|| {
        FormatError::Malformed(format!("layer '{}' carries no operator parameters", node.name))
    })?;
    let kind = node
        .op_kind()
        .ok_or_else(|| FormatError::Malformed(format!("layer '{}' is a plain tensor node", node.name)))?;

    let mut w = BlockWriter::new();
    let (name_at, payload_at, size_at) = write_node_header(&mut w, node);
    debug_assert_eq!(w.pos(), NODE_HEADER_SIZE);

    let in_entries: Vec<usize> = node.inputs.iter().map(|_| w.reserve_i64()).collect();
    let out_entries: Vec<usize> = node.outputs.iter().map(|_| w.reserve_i64()).collect();

    w.patch_i64(name_at, w.pos() as i64);
    w.put_cstr(&node.name);

    for (si, slot) in node.inputs.iter().enumerate() {
        let target_id = slot.ok_or_else(|| {
            FormatError::Malformed(format!("layer '{}' input {si} is vacant", node.name))
        })?;
        let target = graph
            .node(target_id)
            .ok_or_else(|| FormatError::Malformed(format!("dangling input edge {target_id}")))?;
        let loc = index.locate(target_id).ok_or_else(|| {
            FormatError::Malformed(format!("input '{}' has no location in the graph", target.name))
        })?;
        let first_here = loc.direction == Direction::Input
            && loc.layer as usize == layer_idx
            && loc.slot as usize == si;
        if first_here {
            debug_assert!(!target.visited.get(), "first appearance already serialized");
            w.patch_i64(in_entries[si], w.pos() as i64);
            w.put_bytes(&dump_var_node(target)?);
            target.visited.set(true);
        } else {
            w.patch_i64(in_entries[si], loc.encode() as i64);
        }
    }

    for (si, slot) in node.outputs.iter().enumerate() {
        match slot {
            None => w.patch_i64(out_entries[si], 0),
            Some(target_id) => {
                let target = graph
                    .node(*target_id)
                    .ok_or_else(|| FormatError::Malformed(format!("dangling output edge {target_id}")))?;
                w.patch_i64(out_entries[si], w.pos() as i64);
                w.put_bytes(&dump_var_node(target)?);
                target.visited.set(true);
            }
        }
    }

    let params_block = dump_params(kind, params)?;
    w.patch_i64(payload_at, w.pos() as i64);
    w.patch_i64(size_at, params_block.len() as i64);
    w.put_bytes(&params_block);

    debug!(layer = layer_idx, name = %node.name, bytes = w.pos(), "dumped layer");
    Ok(w.into_vec())
}

/// Resolve one stored edge entry while loading layer `layer_idx`.
fn resolve_code(
    graph: &Graph,
    inputs_so_far: &[Option<NodeId>],
    layer_idx: usize,
    code: LocationCode,
    raw: u64,
) -> Result<NodeId> {
    let lj = code.layer as usize;
    let ls = code.slot as usize;
    let unresolved = || FormatError::UnresolvedLocation {
        code: raw,
        layer: layer_idx,
    };

    if lj < graph.layer_count() {
        let layer = graph.layer(lj).ok_or_else(unresolved)?;
        let table = match code.direction {
            Direction::Input => &layer.inputs,
            Direction::Output => &layer.outputs,
        };
        return table.get(ls).copied().flatten().ok_or_else(unresolved);
    }
    // A layer may reference its own earlier input slots (the same node
    // consumed twice); anything further forward is unresolvable.
    if lj == layer_idx && code.direction == Direction::Input {
        return inputs_so_far.get(ls).copied().flatten().ok_or_else(unresolved);
    }
    Err(unresolved())
}

/// Deserialize one layer record into `graph`, which must already hold every
/// earlier layer.
pub fn load_layer(block: &[u8], graph: &mut Graph, src: &BlobSource) -> Result<()> {
    let layer_idx = graph.layer_count();
    let mut r = BlockReader::new(block);
    let header = read_node_header(&mut r)?;
    let kind = match header.node_kind()? {
        rein_core::NodeKind::Op(k) => k,
        rein_core::NodeKind::Tensor => {
            return Err(FormatError::Malformed(format!(
                "layer record {layer_idx} stores a plain tensor node"
            )))
        }
    };
    let name = r.cstr_at(header.name_offset)?.to_owned();

    let mut raw_entries = Vec::with_capacity(header.in_count + header.out_count);
    for _ in 0..header.in_count + header.out_count {
        raw_entries.push(r.get_i64()?);
    }
    let (raw_inputs, raw_outputs) = raw_entries.split_at(header.in_count);

    let mut inputs: Vec<Option<NodeId>> = Vec::with_capacity(header.in_count);
    for (si, &raw) in raw_inputs.iter().enumerate() {
        let bits = raw as u64;
        let id = if LocationCode::is_location(bits) {
            let code = LocationCode::decode(bits).ok_or(FormatError::UnresolvedLocation {
                code: bits,
                layer: layer_idx,
            })?;
            resolve_code(graph, &inputs, layer_idx, code, bits)?
        } else {
            if raw <= 0 {
                return Err(FormatError::Malformed(format!(
                    "layer '{name}' input {si} entry is empty"
                )));
            }
            let node = load_var_node(r.tail_at(raw)?, &src.child(raw as usize))?;
            graph.add_node(node)
        };
        inputs.push(Some(id));
    }

    let mut outputs: Vec<Option<NodeId>> = Vec::with_capacity(header.out_count);
    for &raw in raw_outputs {
        if raw == 0 {
            outputs.push(None);
            continue;
        }
        if raw < 0 {
            return Err(FormatError::Malformed(format!(
                "layer '{name}' output entry {raw:#x} is not an inline node"
            )));
        }
        let node = load_var_node(r.tail_at(raw)?, &src.child(raw as usize))?;
        outputs.push(Some(graph.add_node(node)));
    }

    let size = usize::try_from(header.payload_size).map_err(|_| FormatError::BadOffset {
        offset: header.payload_size,
    })?;
    let params = load_params(kind, r.slice_at(header.payload_offset, size)?)?;

    let id = graph.add_layer(
        kind,
        name,
        params,
        inputs.into_iter().flatten().collect(),
        outputs,
    )?;
    let node = graph.node_mut(id).expect("just added");
    node.subgraph_index = header.subgraph_index;
    node.ref_count.set(header.ref_count);
    node.ref_count_init = header.ref_count_init;
    node.visited.set(header.visited);
    Ok(())
}

/// Restore a node reference from a decoded code against a fully built graph.
///
/// Used for the graph-level input/output tables once every layer is loaded.
pub fn resolve_in_graph(graph: &Graph, code: LocationCode, raw: u64) -> Result<NodeId> {
    let layer = graph
        .layer(code.layer as usize)
        .ok_or(FormatError::UnresolvedLocation {
            code: raw,
            layer: graph.layer_count(),
        })?;
    let table = match code.direction {
        Direction::Input => &layer.inputs,
        Direction::Output => &layer.outputs,
    };
    table
        .get(code.slot as usize)
        .copied()
        .flatten()
        .ok_or(FormatError::UnresolvedLocation {
            code: raw,
            layer: graph.layer_count(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rein_core::{DataType, OpKind, OpParams, ParamsBlock, Tensor};

    fn var(g: &mut Graph, name: &str) -> NodeId {
        g.add_var(Tensor::new(name, DataType::Float32, vec![1, 2]).unwrap())
    }

    #[test]
    fn same_node_consumed_twice_by_one_layer() {
        let mut g = Graph::new();
        let a = var(&mut g, "a");
        let out = var(&mut g, "sum");
        g.add_layer(
            OpKind::Add,
            "double",
            ParamsBlock::new("double", OpParams::Plain),
            vec![a, a],
            vec![Some(out)],
        )
        .unwrap();

        let index = LocationIndex::build(&g).unwrap();
        g.clear_visited();
        let record = dump_layer(&g, 0, &index).unwrap();

        let mut loaded = Graph::new();
        load_layer(&record, &mut loaded, &BlobSource::Private).unwrap();
        let layer = loaded.layer(0).unwrap();
        assert_eq!(layer.inputs.len(), 2);
        // Both slots resolve to the same arena node.
        assert_eq!(layer.inputs[0], layer.inputs[1]);
        // One op node, one shared input, one output.
        assert_eq!(loaded.node_count(), 3);
    }

    #[test]
    fn vacant_output_slot_survives() {
        let mut g = Graph::new();
        let a = var(&mut g, "a");
        let o0 = var(&mut g, "first");
        g.add_layer(
            OpKind::Split,
            "split",
            ParamsBlock::new(
                "split",
                OpParams::Split {
                    split_index: vec![1],
                    axis: 0,
                },
            ),
            vec![a],
            vec![Some(o0), None],
        )
        .unwrap();

        let index = LocationIndex::build(&g).unwrap();
        g.clear_visited();
        let record = dump_layer(&g, 0, &index).unwrap();

        let mut loaded = Graph::new();
        load_layer(&record, &mut loaded, &BlobSource::Private).unwrap();
        let layer = loaded.layer(0).unwrap();
        assert!(layer.outputs[0].is_some());
        assert!(layer.outputs[1].is_none());
    }
}
