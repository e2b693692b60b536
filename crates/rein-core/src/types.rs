//! Fundamental enumerations and scalar records of the object model.
//!
//! Every wire-visible enum here carries an explicit, stable discriminant;
//! the serializer stores these codes verbatim, so reordering variants is a
//! format break.

use serde::{Deserialize, Serialize};

/// Maximum number of tensor dimensions the runtime supports.
pub const MAX_DIM: usize = 8;

/// Element data type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum DataType {
    /// Boolean, one byte per element.
    Bool = 0,
    /// Signed 4-bit fixed-point, two elements per byte.
    Int4 = 1,
    /// Unsigned 8-bit fixed-point.
    Uint8 = 2,
    /// Signed 8-bit fixed-point.
    Int8 = 3,
    /// Unsigned 16-bit fixed-point.
    Uint16 = 4,
    /// Signed 16-bit fixed-point.
    Int16 = 5,
    /// Unsigned 32-bit fixed-point.
    Uint32 = 6,
    /// Signed 32-bit fixed-point.
    Int32 = 7,
    /// Half-precision floating-point.
    Float16 = 8,
    /// Brain floating-point.
    BFloat16 = 9,
    /// Single-precision floating-point.
    Float32 = 10,
    /// Double-precision floating-point.
    Float64 = 11,
    /// Signed 64-bit fixed-point.
    Int64 = 12,
    /// Block-quantized 4-bit: packed nibbles plus one i16 scale per 32 elements.
    Q4_0 = 13,
    /// Block-quantized 8-bit: bytes plus one i16 scale per 32 elements.
    Q8_0 = 14,
}

impl DataType {
    /// Number of payload bytes occupied by `elements` values of this type.
    ///
    /// This is the single source of truth for buffer sizing on both the dump
    /// and the load path. Int4 packs two elements per byte and rounds up;
    /// the block-quantized types append one i16 scale per full 32-element
    /// block.
    pub fn byte_size(self, elements: usize) -> usize {
        match self {
            DataType::Bool | DataType::Uint8 | DataType::Int8 => elements,
            DataType::Int4 => elements.div_ceil(2),
            DataType::Uint16 | DataType::Int16 | DataType::Float16 | DataType::BFloat16 => {
                elements * 2
            }
            DataType::Uint32 | DataType::Int32 | DataType::Float32 => elements * 4,
            DataType::Float64 | DataType::Int64 => elements * 8,
            DataType::Q4_0 => elements.div_ceil(2) + (elements / 32) * 2,
            DataType::Q8_0 => elements + (elements / 32) * 2,
        }
    }

    /// Stable wire code of this data type.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Inverse of [`DataType::code`].
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => DataType::Bool,
            1 => DataType::Int4,
            2 => DataType::Uint8,
            3 => DataType::Int8,
            4 => DataType::Uint16,
            5 => DataType::Int16,
            6 => DataType::Uint32,
            7 => DataType::Int32,
            8 => DataType::Float16,
            9 => DataType::BFloat16,
            10 => DataType::Float32,
            11 => DataType::Float64,
            12 => DataType::Int64,
            13 => DataType::Q4_0,
            14 => DataType::Q8_0,
            _ => return None,
        })
    }
}

/// Storage class of a tensor's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum MemoryType {
    /// Ordinary CPU memory.
    Cpu = 0,
    /// Alignment-guaranteed CPU memory.
    CpuAligned = 1,
    /// DMA-capable buffer owned by a device driver.
    Dma = 2,
}

impl MemoryType {
    /// Stable wire code of this memory type.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Inverse of [`MemoryType::code`].
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => MemoryType::Cpu,
            1 => MemoryType::CpuAligned,
            2 => MemoryType::Dma,
            _ => return None,
        })
    }
}

/// Dimension ordering of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum TensorLayout {
    /// Batch only.
    N = 0,
    /// Batch, channel.
    Nc = 1,
    /// Batch, channel, width.
    Ncw = 2,
    /// Batch, channel, height, width.
    Nchw = 3,
    /// Batch, height, width, channel.
    Nhwc = 4,
    /// Batch, channel, depth, height, width.
    Ncdhw = 5,
    /// Output channel, input channel, height, width (weights).
    Oihw = 6,
    /// Output channel, height, width, input channel (weights).
    Ohwi = 7,
}

impl TensorLayout {
    /// Stable wire code of this layout.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Inverse of [`TensorLayout::code`].
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => TensorLayout::N,
            1 => TensorLayout::Nc,
            2 => TensorLayout::Ncw,
            3 => TensorLayout::Nchw,
            4 => TensorLayout::Nhwc,
            5 => TensorLayout::Ncdhw,
            6 => TensorLayout::Oihw,
            7 => TensorLayout::Ohwi,
            _ => return None,
        })
    }
}

/// Backend family an operator is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Api {
    /// Portable reference CPU kernels.
    Reference = 0,
    /// Vector-extension CPU kernels.
    Vector = 1,
    /// NPU offload.
    Npu = 2,
    /// Ahead-of-time compiled code.
    Aot = 3,
}

impl Api {
    /// Stable wire code of this api.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Inverse of [`Api::code`].
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Api::Reference,
            1 => Api::Vector,
            2 => Api::Npu,
            3 => Api::Aot,
            _ => return None,
        })
    }
}

/// Execution mode of a session, deciding which model section a container
/// carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum RunMode {
    /// Interpretable graph executed layer by layer.
    Graph = 0,
    /// Opaque precompiled blob handed verbatim to the backend loader.
    Compiled = 1,
}

impl RunMode {
    /// Stable wire code of this run mode.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Inverse of [`RunMode::code`].
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => RunMode::Graph,
            1 => RunMode::Compiled,
            _ => return None,
        })
    }
}

/// Quantization scheme attached to a tensor or operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum QuantType {
    /// Not quantized / not decided yet.
    Unset = 0,
    /// Asymmetric unsigned 8-bit.
    Uint8Asym = 1,
    /// Symmetric signed 8-bit.
    Int8Sym = 2,
    /// Symmetric signed 16-bit.
    Int16Sym = 3,
    /// Half-precision floating-point.
    Float16 = 4,
    /// Single-precision floating-point (not quantized).
    Float32 = 5,
}

impl QuantType {
    /// Stable wire code of this quantization scheme.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Inverse of [`QuantType::code`].
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => QuantType::Unset,
            1 => QuantType::Uint8Asym,
            2 => QuantType::Int8Sym,
            3 => QuantType::Int16Sym,
            4 => QuantType::Float16,
            5 => QuantType::Float32,
            _ => return None,
        })
    }
}

/// Per-channel quantization record.
///
/// `multiplier` and `shift` are the fixed-point decomposition of `scale`;
/// `min` and `max` record the observed value range of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantInfo {
    /// Zero point of the affine mapping.
    pub zero_point: i32,
    /// Scale of the affine mapping.
    pub scale: f32,
    /// Fixed-point multiplier composing `scale` with `shift`.
    pub multiplier: i32,
    /// Fixed-point shift composing `scale` with `multiplier`.
    pub shift: i32,
    /// Minimum observed value.
    pub min: f32,
    /// Maximum observed value.
    pub max: f32,
}

impl Default for QuantInfo {
    fn default() -> Self {
        Self {
            zero_point: 0,
            scale: 1.0,
            multiplier: 0,
            shift: 0,
            min: 0.0,
            max: 0.0,
        }
    }
}

/// Operator discriminant.
///
/// Codes are wire-stable; new kinds append at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum OpKind {
    Add = 0,
    Sub = 1,
    Mul = 2,
    Div = 3,
    Conv2d = 4,
    DepthwiseConv2d = 5,
    FullyConnected = 6,
    MaxPool2d = 7,
    AvgPool2d = 8,
    GlobalAvgPool2d = 9,
    Relu = 10,
    Relu6 = 11,
    LeakyRelu = 12,
    Sigmoid = 13,
    Tanh = 14,
    Softmax = 15,
    Reshape = 16,
    Transpose = 17,
    Pad = 18,
    Split = 19,
    Concat = 20,
    MatMul = 21,
    Mean = 22,
    ReduceSum = 23,
    ReduceMax = 24,
    ReduceMin = 25,
    ReduceMean = 26,
    BroadcastTo = 27,
    StridedSlice = 28,
    Clip = 29,
}

impl OpKind {
    /// Stable wire code of this operator kind.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Inverse of [`OpKind::code`].
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0 => OpKind::Add,
            1 => OpKind::Sub,
            2 => OpKind::Mul,
            3 => OpKind::Div,
            4 => OpKind::Conv2d,
            5 => OpKind::DepthwiseConv2d,
            6 => OpKind::FullyConnected,
            7 => OpKind::MaxPool2d,
            8 => OpKind::AvgPool2d,
            9 => OpKind::GlobalAvgPool2d,
            10 => OpKind::Relu,
            11 => OpKind::Relu6,
            12 => OpKind::LeakyRelu,
            13 => OpKind::Sigmoid,
            14 => OpKind::Tanh,
            15 => OpKind::Softmax,
            16 => OpKind::Reshape,
            17 => OpKind::Transpose,
            18 => OpKind::Pad,
            19 => OpKind::Split,
            20 => OpKind::Concat,
            21 => OpKind::MatMul,
            22 => OpKind::Mean,
            23 => OpKind::ReduceSum,
            24 => OpKind::ReduceMax,
            25 => OpKind::ReduceMin,
            26 => OpKind::ReduceMean,
            27 => OpKind::BroadcastTo,
            28 => OpKind::StridedSlice,
            29 => OpKind::Clip,
            _ => return None,
        })
    }
}
