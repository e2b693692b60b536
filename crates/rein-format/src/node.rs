//! Node block dump and load.
//!
//! A node block stores a node's scalar fields, name and owned payload. Edge
//! arrays are never serialized — edges are reconstructed by the layer
//! serializer through location codes, which is what keeps shared nodes from
//! being duplicated.
//!
//! ```text
//! 0   kind            i32   (-1 = tensor holder, else operator code)
//! 4   subgraph_index  i32
//! 8   in_count        u32
//! 12  out_count       u32
//! 16  ref_count       u32
//! 20  ref_count_init  u32
//! 24  visited         u32
//! 28  reserved        u32
//! 32  name_offset     i64
//! 40  payload_offset  i64
//! 48  payload_size    i64
//! 56  variable tail
//! ```

use rein_core::{Node, NodeKind, OpKind};

use crate::error::{FormatError, Result};
use crate::tensor::{dump_tensor, load_tensor, BlobSource};
use crate::wire::{BlockReader, BlockWriter};

/// Fixed header size of a node block.
pub const NODE_HEADER_SIZE: usize = 56;

/// Wire code of the tensor-holder sentinel kind.
pub const KIND_TENSOR: i32 = -1;

/// Scalar fields of a node header, shared between the node block and the
/// layer record.
#[derive(Debug, Clone, Copy)]
pub struct NodeHeader {
    /// Operator code or [`KIND_TENSOR`].
    pub kind: i32,
    /// Subgraph the node belongs to.
    pub subgraph_index: i32,
    /// Input slot count.
    pub in_count: usize,
    /// Output slot count.
    pub out_count: usize,
    /// Scratch: live consumer count at dump time.
    pub ref_count: u32,
    /// Scratch: initial consumer count at dump time.
    pub ref_count_init: u32,
    /// Scratch: traversal flag at dump time.
    pub visited: bool,
    /// Block-relative offset of the name.
    pub name_offset: i64,
    /// Block-relative offset of the payload block.
    pub payload_offset: i64,
    /// Payload block size in bytes.
    pub payload_size: i64,
}

/// Wire kind code of a node.
pub fn kind_code(node: &Node) -> i32 {
    match node.kind {
        NodeKind::Tensor => KIND_TENSOR,
        NodeKind::Op(op) => op.code() as i32,
    }
}

/// Write a node's scalar header, reserving the offset fields.
///
/// Returns the positions of `(name_offset, payload_offset, payload_size)`
/// for later patching.
pub fn write_node_header(w: &mut BlockWriter, node: &Node) -> (usize, usize, usize) {
    w.put_i32(kind_code(node));
    w.put_i32(node.subgraph_index);
    w.put_u32(node.inputs.len() as u32);
    w.put_u32(node.outputs.len() as u32);
    w.put_u32(node.ref_count.get());
    w.put_u32(node.ref_count_init);
    w.put_u32(node.visited.get() as u32);
    w.put_u32(0);
    let name_at = w.reserve_i64();
    let payload_at = w.reserve_i64();
    let size_at = w.reserve_i64();
    (name_at, payload_at, size_at)
}

/// Read a node header from the current position.
pub fn read_node_header(r: &mut BlockReader<'_>) -> Result<NodeHeader> {
    let kind = r.get_i32()?;
    let subgraph_index = r.get_i32()?;
    let in_count = r.get_u32()? as usize;
    let out_count = r.get_u32()? as usize;
    let ref_count = r.get_u32()?;
    let ref_count_init = r.get_u32()?;
    let visited = r.get_u32()? != 0;
    let _reserved = r.get_u32()?;
    Ok(NodeHeader {
        kind,
        subgraph_index,
        in_count,
        out_count,
        ref_count,
        ref_count_init,
        visited,
        name_offset: r.get_i64()?,
        payload_offset: r.get_i64()?,
        payload_size: r.get_i64()?,
    })
}

impl NodeHeader {
    /// Interpret the kind field, rejecting unknown operator codes.
    pub fn node_kind(&self) -> Result<NodeKind> {
        if self.kind == KIND_TENSOR {
            return Ok(NodeKind::Tensor);
        }
        let code = u16::try_from(self.kind).map_err(|_| FormatError::UnknownOp { code: self.kind })?;
        OpKind::from_code(code)
            .map(NodeKind::Op)
            .ok_or(FormatError::UnknownOp { code: self.kind })
    }
}

/// Serialize a tensor-holder node into a self-contained block.
pub fn dump_var_node(node: &Node) -> Result<Vec<u8>> {
    let tensor = node.tensor().ok_or_else(|| {
        FormatError::Malformed(format!(
            "node '{}' inlined as a tensor holder but carries operator parameters",
            node.name
        ))
    })?;

    let mut w = BlockWriter::new();
    let (name_at, payload_at, size_at) = write_node_header(&mut w, node);
    debug_assert_eq!(w.pos(), NODE_HEADER_SIZE);

    w.patch_i64(name_at, w.pos() as i64);
    w.put_cstr(&node.name);

    let tensor_block = dump_tensor(tensor)?;
    w.patch_i64(payload_at, w.pos() as i64);
    w.patch_i64(size_at, tensor_block.len() as i64);
    w.put_bytes(&tensor_block);

    Ok(w.into_vec())
}

/// Deserialize a tensor-holder node block.
pub fn load_var_node(block: &[u8], src: &BlobSource) -> Result<Node> {
    let mut r = BlockReader::new(block);
    let header = read_node_header(&mut r)?;
    if header.node_kind()? != NodeKind::Tensor {
        return Err(FormatError::Malformed(format!(
            "expected a tensor-holder node, found kind {}",
            header.kind
        )));
    }

    let size = usize::try_from(header.payload_size).map_err(|_| FormatError::BadOffset {
        offset: header.payload_size,
    })?;
    let tensor_block = r.slice_at(header.payload_offset, size)?;
    let tensor = load_tensor(tensor_block, &src.child(header.payload_offset as usize))?;

    let mut node = Node::var(tensor);
    node.name = r.cstr_at(header.name_offset)?.to_owned();
    node.subgraph_index = header.subgraph_index;
    node.inputs = vec![None; header.in_count];
    node.outputs = vec![None; header.out_count];
    node.ref_count.set(header.ref_count);
    node.ref_count_init = header.ref_count_init;
    node.visited.set(header.visited);
    Ok(node)
}
