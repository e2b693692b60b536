//! Session section dump and load.
//!
//! ```text
//! 0   base_dtype       u32
//! 4   base_layout      u32
//! 8   base_api         u32
//! 12  run_mode         u32
//! 16  base_quant_type  u32
//! 20  debug_level      i32
//! 24  profiler_level   i32
//! 28  priority         i32
//! 32  input_count      u32
//! 36  output_count     u32
//! 40  input_table_offset   i64  -> input_count x i64 tensor block offsets
//! 48  output_table_offset  i64
//! 56  variable tail: tables, then tensor blocks
//! ```
//!
//! Only session scalars and io tensor descriptors live here; the model
//! itself is a separate section, and backend kernel bindings are never
//! written at all — a loaded session re-attaches them through the provider
//! registry.

use rein_core::{Api, DataType, QuantType, RunMode, Session, Tensor, TensorLayout};

use crate::error::{FormatError, Result};
use crate::tensor::{dump_tensor, load_tensor, BlobSource};
use crate::wire::{BlockReader, BlockWriter};

const SESSION_HEADER_SIZE: usize = 56;

/// Serialize session scalars and io tensor arrays into a section.
pub fn dump_session(session: &Session) -> Result<Vec<u8>> {
    let mut w = BlockWriter::new();
    w.put_u32(session.base_dtype.code());
    w.put_u32(session.base_layout.code());
    w.put_u32(session.base_api.code());
    w.put_u32(session.run_mode.code());
    w.put_u32(session.base_quant_type.code());
    w.put_i32(session.debug_level);
    w.put_i32(session.profiler_level);
    w.put_i32(session.priority);
    w.put_u32(session.inputs.len() as u32);
    w.put_u32(session.outputs.len() as u32);
    let in_table_at = w.reserve_i64();
    let out_table_at = w.reserve_i64();
    debug_assert_eq!(w.pos(), SESSION_HEADER_SIZE);

    w.patch_i64(in_table_at, w.pos() as i64);
    let in_entries: Vec<usize> = session.inputs.iter().map(|_| w.reserve_i64()).collect();
    w.patch_i64(out_table_at, w.pos() as i64);
    let out_entries: Vec<usize> = session.outputs.iter().map(|_| w.reserve_i64()).collect();

    for (tensor, &entry_at) in session.inputs.iter().zip(&in_entries) {
        w.patch_i64(entry_at, w.pos() as i64);
        w.put_bytes(&dump_tensor(tensor)?);
    }
    for (tensor, &entry_at) in session.outputs.iter().zip(&out_entries) {
        w.patch_i64(entry_at, w.pos() as i64);
        w.put_bytes(&dump_tensor(tensor)?);
    }

    Ok(w.into_vec())
}

fn load_tensor_table(
    r: &BlockReader<'_>,
    table_offset: i64,
    count: usize,
    src: &BlobSource,
) -> Result<Vec<Tensor>> {
    let mut tr = BlockReader::new(r.slice_at(table_offset, count * 8)?);
    let mut tensors = Vec::with_capacity(count);
    for _ in 0..count {
        let offset = tr.get_i64()?;
        let block = r.tail_at(offset)?;
        tensors.push(load_tensor(block, &src.child(offset as usize))?);
    }
    Ok(tensors)
}

/// Deserialize a session section. The model reference is left unset; the
/// container layer attaches it from its own section.
pub fn load_session(block: &[u8], src: &BlobSource) -> Result<Session> {
    let mut r = BlockReader::new(block);
    let mut session = Session::new();

    let dtype_code = r.get_u32()?;
    session.base_dtype = DataType::from_code(dtype_code).ok_or(FormatError::UnknownEnum {
        what: "dtype",
        code: dtype_code,
    })?;
    let layout_code = r.get_u32()?;
    session.base_layout = TensorLayout::from_code(layout_code).ok_or(FormatError::UnknownEnum {
        what: "layout",
        code: layout_code,
    })?;
    let api_code = r.get_u32()?;
    session.base_api = Api::from_code(api_code).ok_or(FormatError::UnknownEnum {
        what: "api",
        code: api_code,
    })?;
    let mode_code = r.get_u32()?;
    session.run_mode = RunMode::from_code(mode_code).ok_or(FormatError::UnknownEnum {
        what: "run mode",
        code: mode_code,
    })?;
    let quant_code = r.get_u32()?;
    session.base_quant_type = QuantType::from_code(quant_code).ok_or(FormatError::UnknownEnum {
        what: "quant type",
        code: quant_code,
    })?;
    session.debug_level = r.get_i32()?;
    session.profiler_level = r.get_i32()?;
    session.priority = r.get_i32()?;
    let input_count = r.get_u32()? as usize;
    let output_count = r.get_u32()? as usize;
    let in_table = r.get_i64()?;
    let out_table = r.get_i64()?;

    session.inputs = load_tensor_table(&r, in_table, input_count, src)?;
    session.outputs = load_tensor_table(&r, out_table, output_count, src)?;

    Ok(session)
}
