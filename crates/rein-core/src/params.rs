//! Operator parameter blocks.
//!
//! The parameter shapes form a closed, enumerable set: one [`OpParams`]
//! variant per family of operator kinds. Both serializer directions match on
//! this enum exhaustively, so adding an operator without wiring its
//! parameters through the format is a compile error rather than a silent
//! truncation.

use serde::{Deserialize, Serialize};

use crate::types::{Api, OpKind, QuantType, TensorLayout};

/// Fields common to every operator, regardless of kind.
///
/// The live runtime also hangs its kernel callback off this structure; that
/// binding is process-local and never serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamsBase {
    /// Operator instance name.
    pub name: String,
    /// Layout the operator computes in.
    pub layout: TensorLayout,
    /// Backend family the operator is assigned to.
    pub api: Api,
    /// Quantization scheme of the operator.
    pub quant_type: QuantType,
}

impl ParamsBase {
    /// Base parameters with reference-backend defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layout: TensorLayout::Nchw,
            api: Api::Reference,
            quant_type: QuantType::Unset,
        }
    }
}

/// Padding semantics for the pad operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum PadMode {
    /// Fill with a constant value.
    Constant = 0,
    /// Repeat the edge value.
    Edge = 1,
    /// Mirror without repeating the edge.
    Reflect = 2,
}

impl PadMode {
    /// Stable wire code of this mode.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Inverse of [`PadMode::code`].
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => PadMode::Constant,
            1 => PadMode::Edge,
            2 => PadMode::Reflect,
            _ => return None,
        })
    }
}

/// Kind-specific operator parameters.
///
/// Variants with `Vec` fields are the pointer-tail shapes; everything else
/// is scalars only.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum OpParams {
    /// Operators with no parameters beyond [`ParamsBase`]
    /// (elementwise arithmetic, sigmoid, tanh).
    Plain,
    /// ReLU family; `n` is the alpha/threshold coefficient of the variants.
    Relu { n: f32 },
    Softmax { axis: i32 },
    Concat { axis: i32, inputs_count: i32 },
    Clip { min_value: f32, max_value: f32 },
    FullyConnected { units: i32 },
    MatMul { trans_a: bool, trans_b: bool },
    Conv2d {
        group: i32,
        stride_height: i32,
        stride_width: i32,
        pad_top: i32,
        pad_left: i32,
        pad_down: i32,
        pad_right: i32,
        dilation_height: i32,
        dilation_width: i32,
    },
    Pool {
        filter_height: i32,
        filter_width: i32,
        stride_height: i32,
        stride_width: i32,
        pad_top: i32,
        pad_left: i32,
        pad_down: i32,
        pad_right: i32,
        count_include_pad: bool,
    },
    Reshape { shape: Vec<i32> },
    Transpose { permute: Vec<i32> },
    Pad {
        pad_before: Vec<i32>,
        pad_after: Vec<i32>,
        pad_value: f32,
        pad_mode: PadMode,
    },
    Split { split_index: Vec<i32>, axis: i32 },
    Reduce {
        out_strides: Vec<i32>,
        out_extents: Vec<i32>,
        inner_strides: Vec<i32>,
        inner_extents: Vec<i32>,
        axis: Vec<i32>,
        keepdims: bool,
    },
    BroadcastTo { shape: Vec<i32> },
    StridedSlice {
        begin: Vec<i32>,
        end: Vec<i32>,
        stride: Vec<i32>,
    },
}

impl OpParams {
    /// Whether this variant is the parameter shape of `kind`.
    pub fn matches(&self, kind: OpKind) -> bool {
        matches!(
            (kind, self),
            (
                OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::Div
                    | OpKind::Sigmoid
                    | OpKind::Tanh,
                OpParams::Plain
            ) | (
                OpKind::Relu | OpKind::Relu6 | OpKind::LeakyRelu,
                OpParams::Relu { .. }
            ) | (OpKind::Softmax, OpParams::Softmax { .. })
                | (OpKind::Concat, OpParams::Concat { .. })
                | (OpKind::Clip, OpParams::Clip { .. })
                | (OpKind::FullyConnected, OpParams::FullyConnected { .. })
                | (OpKind::MatMul, OpParams::MatMul { .. })
                | (
                    OpKind::Conv2d | OpKind::DepthwiseConv2d,
                    OpParams::Conv2d { .. }
                )
                | (
                    OpKind::MaxPool2d | OpKind::AvgPool2d | OpKind::GlobalAvgPool2d,
                    OpParams::Pool { .. }
                )
                | (OpKind::Reshape, OpParams::Reshape { .. })
                | (OpKind::Transpose, OpParams::Transpose { .. })
                | (OpKind::Pad, OpParams::Pad { .. })
                | (OpKind::Split, OpParams::Split { .. })
                | (
                    OpKind::Mean
                        | OpKind::ReduceSum
                        | OpKind::ReduceMax
                        | OpKind::ReduceMin
                        | OpKind::ReduceMean,
                    OpParams::Reduce { .. }
                )
                | (OpKind::BroadcastTo, OpParams::BroadcastTo { .. })
                | (OpKind::StridedSlice, OpParams::StridedSlice { .. })
        )
    }
}

/// A complete operator parameter block: shared base plus kind-specific
/// fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamsBlock {
    /// Fields shared by every operator.
    pub base: ParamsBase,
    /// Kind-specific parameters.
    pub op: OpParams,
}

impl ParamsBlock {
    /// Build a block from a base name and kind-specific parameters.
    pub fn new(name: impl Into<String>, op: OpParams) -> Self {
        Self {
            base: ParamsBase::new(name),
            op,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_shape_matching() {
        assert!(OpParams::Plain.matches(OpKind::Add));
        assert!(OpParams::Relu { n: 0.0 }.matches(OpKind::Relu6));
        assert!(OpParams::Reduce {
            out_strides: vec![],
            out_extents: vec![],
            inner_strides: vec![],
            inner_extents: vec![],
            axis: vec![0],
            keepdims: false,
        }
        .matches(OpKind::Mean));
        assert!(!OpParams::Plain.matches(OpKind::Softmax));
        assert!(!OpParams::Softmax { axis: 1 }.matches(OpKind::Relu));
    }
}
