//! Tensor block dump and load.
//!
//! Layout (all offsets relative to the block start):
//!
//! ```text
//! 0   dtype          u32
//! 4   mtype          u32
//! 8   layout         u32
//! 12  is_const       u32
//! 16  dim_count      u32
//! 20  dim[8]         8 x i32
//! 52  quant_channel  u32
//! 56  name_offset    i64    -> NUL-terminated name
//! 64  qinfo_offset   i64    -> quant_channel x 24-byte records
//! 72  data_offset    i64    -> const payload, 0 if absent
//! 80  data_size      i64
//! 88  variable tail
//! ```

use std::sync::Arc;

use tracing::warn;

use rein_core::{
    DataType, MemoryType, QuantInfo, SharedBytes, Tensor, TensorData, TensorLayout, MAX_DIM,
};

use crate::error::{FormatError, Result};
use crate::wire::{BlockReader, BlockWriter};

/// Fixed header size of a tensor block.
pub const TENSOR_HEADER_SIZE: usize = 88;

/// Serialized size of one quantization record.
const QUANT_INFO_SIZE: usize = 24;

/// Where a block being loaded came from, deciding whether constant payloads
/// may alias the source.
///
/// Non-constant payloads always get a private heap copy regardless, so
/// runtime mutation of activations can never touch the source blob.
#[derive(Debug, Clone)]
pub enum BlobSource {
    /// Plain borrowed bytes; everything is copied.
    Private,
    /// The block lives at `base` inside a shared read-only blob; constant
    /// payloads alias it zero-copy.
    Shared {
        /// The whole loaded container.
        blob: Arc<[u8]>,
        /// Absolute offset of the current block within `blob`.
        base: usize,
    },
}

impl BlobSource {
    /// Source for a nested block at `offset` within the current one.
    pub fn child(&self, offset: usize) -> BlobSource {
        match self {
            BlobSource::Private => BlobSource::Private,
            BlobSource::Shared { blob, base } => BlobSource::Shared {
                blob: blob.clone(),
                base: base + offset,
            },
        }
    }
}

/// Serialize one tensor into a self-contained block.
///
/// Constant payloads are length-checked against the byte-size law before
/// being copied out; a mismatch aborts the dump rather than writing a
/// blob that cannot be loaded back.
pub fn dump_tensor(tensor: &Tensor) -> Result<Vec<u8>> {
    if tensor.dims.len() > MAX_DIM {
        return Err(FormatError::Malformed(format!(
            "tensor '{}' has {} dimensions, the format stores at most {}",
            tensor.name,
            tensor.dims.len(),
            MAX_DIM
        )));
    }

    let mut w = BlockWriter::with_capacity(TENSOR_HEADER_SIZE + tensor.name.len() + 1);
    w.put_u32(tensor.dtype.code());
    w.put_u32(tensor.mtype.code());
    w.put_u32(tensor.layout.code());
    w.put_u32(tensor.is_const as u32);
    w.put_u32(tensor.dims.len() as u32);
    for i in 0..MAX_DIM {
        w.put_i32(tensor.dims.get(i).copied().unwrap_or(0));
    }
    w.put_u32(tensor.quant.len() as u32);
    let name_at = w.reserve_i64();
    let qinfo_at = w.reserve_i64();
    let data_at = w.reserve_i64();
    let size_at = w.reserve_i64();
    debug_assert_eq!(w.pos(), TENSOR_HEADER_SIZE);

    w.patch_i64(name_at, w.pos() as i64);
    w.put_cstr(&tensor.name);

    w.patch_i64(qinfo_at, w.pos() as i64);
    for q in &tensor.quant {
        w.put_i32(q.zero_point);
        w.put_f32(q.scale);
        w.put_i32(q.multiplier);
        w.put_i32(q.shift);
        w.put_f32(q.min);
        w.put_f32(q.max);
    }

    if tensor.is_const {
        if let Some(bytes) = tensor.data_bytes() {
            let expect = tensor.byte_size();
            if bytes.len() != expect {
                return Err(FormatError::Malformed(format!(
                    "constant '{}' payload is {} bytes, dtype and shape require {}",
                    tensor.name,
                    bytes.len(),
                    expect
                )));
            }
            w.patch_i64(data_at, w.pos() as i64);
            w.patch_i64(size_at, bytes.len() as i64);
            w.put_bytes(bytes);
        }
    }

    Ok(w.into_vec())
}

/// Deserialize a tensor block into a fresh tensor.
pub fn load_tensor(block: &[u8], src: &BlobSource) -> Result<Tensor> {
    let mut dest = Tensor::new("", DataType::Float32, Vec::new())?;
    load_tensor_into(&mut dest, block, src)?;
    Ok(dest)
}

/// Deserialize a tensor block into an existing tensor.
///
/// The destination's quantization storage is reused when the channel count
/// matches and resized with a warning when it does not — a plausible but
/// imperfect model stays loadable. The destination owns everything it
/// points to afterwards, except that constant payloads alias the shared
/// blob when the source offers one.
pub fn load_tensor_into(dest: &mut Tensor, block: &[u8], src: &BlobSource) -> Result<()> {
    let mut r = BlockReader::new(block);

    let dtype_code = r.get_u32()?;
    dest.dtype = DataType::from_code(dtype_code).ok_or(FormatError::UnknownEnum {
        what: "dtype",
        code: dtype_code,
    })?;
    let mtype_code = r.get_u32()?;
    dest.mtype = MemoryType::from_code(mtype_code).ok_or(FormatError::UnknownEnum {
        what: "memory type",
        code: mtype_code,
    })?;
    let layout_code = r.get_u32()?;
    dest.layout = TensorLayout::from_code(layout_code).ok_or(FormatError::UnknownEnum {
        what: "layout",
        code: layout_code,
    })?;
    dest.is_const = r.get_u32()? != 0;

    let dim_count = r.get_u32()? as usize;
    if dim_count > MAX_DIM {
        return Err(FormatError::Malformed(format!(
            "tensor declares {dim_count} dimensions, the format stores at most {MAX_DIM}"
        )));
    }
    let mut dims = [0i32; MAX_DIM];
    for d in dims.iter_mut() {
        *d = r.get_i32()?;
    }
    dest.dims = dims[..dim_count].to_vec();

    let quant_channel = r.get_u32()? as usize;
    let name_offset = r.get_i64()?;
    let qinfo_offset = r.get_i64()?;
    let data_offset = r.get_i64()?;
    let data_size = r.get_i64()?;

    dest.name = r.cstr_at(name_offset)?.to_owned();

    if quant_channel != dest.quant.len() {
        if !dest.quant.is_empty() {
            warn!(
                tensor = %dest.name,
                have = dest.quant.len(),
                want = quant_channel,
                "quant channel mismatch, resizing destination"
            );
        }
        dest.quant.resize(quant_channel, QuantInfo::default());
    }
    let mut qr = BlockReader::new(r.slice_at(qinfo_offset, quant_channel * QUANT_INFO_SIZE)?);
    for q in dest.quant.iter_mut() {
        q.zero_point = qr.get_i32()?;
        q.scale = qr.get_f32()?;
        q.multiplier = qr.get_i32()?;
        q.shift = qr.get_i32()?;
        q.min = qr.get_f32()?;
        q.max = qr.get_f32()?;
    }

    dest.data = None;
    if dest.is_const && data_offset != 0 {
        let size = usize::try_from(data_size)
            .map_err(|_| FormatError::BadOffset { offset: data_size })?;
        let expect = dest.byte_size();
        if size != expect {
            return Err(FormatError::Malformed(format!(
                "constant '{}' stored {} payload bytes, dtype and shape require {}",
                dest.name, size, expect
            )));
        }
        let bytes = r.slice_at(data_offset, size)?;
        dest.data = Some(match src {
            BlobSource::Private => TensorData::Owned(bytes.to_vec()),
            BlobSource::Shared { blob, base } => TensorData::Shared(SharedBytes::new(
                blob.clone(),
                base + data_offset as usize,
                size,
            )),
        });
    }

    Ok(())
}
