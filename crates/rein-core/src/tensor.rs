//! Tensor type: metadata plus an optional owned or blob-aliased payload.

use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::types::{DataType, MemoryType, QuantInfo, TensorLayout, MAX_DIM};

/// A reference-counted slice of a loaded model blob.
///
/// Constant tensor payloads may alias the source blob directly after a load
/// instead of being copied; the blob stays alive for as long as any slice of
/// it does.
#[derive(Debug, Clone)]
pub struct SharedBytes {
    blob: Arc<[u8]>,
    offset: usize,
    len: usize,
}

impl SharedBytes {
    /// Create a view of `blob[offset..offset + len]`.
    ///
    /// # Panics
    /// Panics if the range is out of bounds for the blob.
    pub fn new(blob: Arc<[u8]>, offset: usize, len: usize) -> Self {
        assert!(
            offset.checked_add(len).is_some_and(|end| end <= blob.len()),
            "shared slice {}..{} out of bounds for blob of {} bytes",
            offset,
            offset + len,
            blob.len()
        );
        Self { blob, offset, len }
    }

    /// Wrap an owned buffer as a shared slice covering all of it.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        Self {
            blob: Arc::from(bytes),
            offset: 0,
            len,
        }
    }

    /// The viewed bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.blob[self.offset..self.offset + self.len]
    }

    /// Length of the view in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The backing blob, for aliasing checks.
    pub fn blob(&self) -> &Arc<[u8]> {
        &self.blob
    }
}

impl PartialEq for SharedBytes {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

/// Payload storage of a tensor.
#[derive(Debug, Clone)]
pub enum TensorData {
    /// Heap buffer owned by this tensor.
    Owned(Vec<u8>),
    /// Zero-copy view into a loaded model blob (constant tensors only).
    Shared(SharedBytes),
}

impl TensorData {
    /// The payload bytes regardless of storage.
    pub fn bytes(&self) -> &[u8] {
        match self {
            TensorData::Owned(v) => v,
            TensorData::Shared(s) => s.as_slice(),
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}

/// Payloads compare by content: an owned buffer and a blob-aliased view of
/// the same bytes are the same payload.
impl PartialEq for TensorData {
    fn eq(&self, other: &Self) -> bool {
        self.bytes() == other.bytes()
    }
}

/// An n-dimensional value: metadata describing shape, type, layout and
/// quantization, plus an optional payload.
///
/// Activation tensors usually carry no payload until execution; constant
/// tensors (weights) carry one at build time and round-trip it through the
/// binary model.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    /// Human-readable identifier, unique within a graph by convention.
    pub name: String,
    /// Element type.
    pub dtype: DataType,
    /// Storage class.
    pub mtype: MemoryType,
    /// Dimension ordering.
    pub layout: TensorLayout,
    /// Extent of each dimension, at most [`MAX_DIM`] entries.
    pub dims: Vec<i32>,
    /// Per-channel quantization records; empty means unquantized.
    pub quant: Vec<QuantInfo>,
    /// Whether the payload is constant (serialized into the model).
    pub is_const: bool,
    /// Optional payload.
    pub data: Option<TensorData>,
}

impl Tensor {
    /// Create an activation tensor with the given name, type and shape.
    pub fn new(name: impl Into<String>, dtype: DataType, dims: Vec<i32>) -> Result<Self> {
        let name = name.into();
        if dims.len() > MAX_DIM {
            return Err(CoreError::TooManyDims {
                name,
                count: dims.len(),
                max: MAX_DIM,
            });
        }
        Ok(Self {
            name,
            dtype,
            mtype: MemoryType::Cpu,
            layout: TensorLayout::Nchw,
            dims,
            quant: Vec::new(),
            is_const: false,
            data: None,
        })
    }

    /// Create a constant tensor owning `bytes` as its payload.
    ///
    /// The payload length must match the byte-size law for the type and
    /// shape.
    pub fn constant(
        name: impl Into<String>,
        dtype: DataType,
        dims: Vec<i32>,
        bytes: Vec<u8>,
    ) -> Result<Self> {
        let mut t = Self::new(name, dtype, dims)?;
        let expect = t.byte_size();
        if bytes.len() != expect {
            return Err(CoreError::InvalidGraph(format!(
                "constant '{}' payload is {} bytes, dtype and shape require {}",
                t.name,
                bytes.len(),
                expect
            )));
        }
        t.is_const = true;
        t.data = Some(TensorData::Owned(bytes));
        Ok(t)
    }

    /// Set the layout, builder style.
    pub fn with_layout(mut self, layout: TensorLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Set per-channel quantization records, builder style.
    pub fn with_quant(mut self, quant: Vec<QuantInfo>) -> Self {
        self.quant = quant;
        self
    }

    /// Number of elements, the product of all dimensions.
    ///
    /// A tensor with no dimensions holds no elements.
    pub fn element_count(&self) -> usize {
        if self.dims.is_empty() {
            return 0;
        }
        self.dims.iter().map(|&d| d.max(0) as usize).product()
    }

    /// Payload size in bytes dictated by dtype and shape.
    pub fn byte_size(&self) -> usize {
        self.dtype.byte_size(self.element_count())
    }

    /// Number of quantization channels.
    pub fn quant_channel(&self) -> usize {
        self.quant.len()
    }

    /// The payload bytes, if a payload is present.
    pub fn data_bytes(&self) -> Option<&[u8]> {
        self.data.as_ref().map(TensorData::bytes)
    }
}
