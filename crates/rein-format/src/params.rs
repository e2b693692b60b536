//! Operator parameter block dump and load.
//!
//! Layout: a fixed prefix sized to the largest known operator, then a
//! variable tail holding the array fields.
//!
//! ```text
//! 0    api          u32
//! 4    layout       u32
//! 8    quant_type   u32
//! 12   reserved     u32
//! 16   name_offset  i64   -> NUL-terminated name in the tail
//! 24   scalar area  96 bytes, per-kind layout, zero-filled
//! 120  reserved     8 bytes
//! 128  variable tail
//! ```
//!
//! Array fields occupy a 16-byte slot in the scalar area:
//! `{offset i64, count u32, reserved u32}`, offset relative to the block
//! start. Both directions are one exhaustive `match`, so a new operator kind
//! cannot be added without deciding its wire shape here.

use rein_core::{Api, OpKind, OpParams, PadMode, ParamsBase, ParamsBlock, QuantType, TensorLayout};

use crate::error::{FormatError, Result};
use crate::wire::{BlockReader, BlockWriter};

/// Fixed prefix size of a params block; the scalar area is sized by the
/// Reduce family, the largest known operator.
pub const PARAMS_PREFIX_SIZE: usize = 128;

/// Offset of the per-kind scalar area within the block.
const SCALAR_AREA: usize = 24;

/// Writer-side handle for one array slot in the scalar area.
struct ArraySlot {
    offset_at: usize,
    values: Vec<i32>,
}

struct ParamsWriter {
    w: BlockWriter,
    arrays: Vec<ArraySlot>,
}

impl ParamsWriter {
    fn new(base: &ParamsBase) -> Self {
        let mut w = BlockWriter::with_capacity(PARAMS_PREFIX_SIZE + base.name.len() + 1);
        w.put_u32(base.api.code());
        w.put_u32(base.layout.code());
        w.put_u32(base.quant_type.code());
        w.put_u32(0);
        w.reserve_i64(); // name_offset, patched in finish()
        debug_assert_eq!(w.pos(), SCALAR_AREA);
        Self {
            w,
            arrays: Vec::new(),
        }
    }

    fn scalar_i32(&mut self, v: i32) {
        self.w.put_i32(v);
    }

    fn scalar_f32(&mut self, v: f32) {
        self.w.put_f32(v);
    }

    fn scalar_u32(&mut self, v: u32) {
        self.w.put_u32(v);
    }

    fn array(&mut self, values: &[i32]) {
        let offset_at = self.w.reserve_i64();
        self.w.put_u32(values.len() as u32);
        self.w.put_u32(0);
        self.arrays.push(ArraySlot {
            offset_at,
            values: values.to_vec(),
        });
    }

    fn finish(mut self, name: &str) -> Vec<u8> {
        self.w.pad_to(PARAMS_PREFIX_SIZE);
        self.w.patch_i64(16, self.w.pos() as i64);
        self.w.put_cstr(name);
        for slot in &self.arrays {
            self.w.patch_i64(slot.offset_at, self.w.pos() as i64);
            for &v in &slot.values {
                self.w.put_i32(v);
            }
        }
        self.w.into_vec()
    }
}

/// Serialize an operator's parameter block.
///
/// The parameter shape must match `kind`; a mismatch is a dump-time error,
/// never a truncated copy.
pub fn dump_params(kind: OpKind, params: &ParamsBlock) -> Result<Vec<u8>> {
    if !params.op.matches(kind) {
        return Err(FormatError::ParamsShape {
            name: params.base.name.clone(),
            kind,
        });
    }

    let mut p = ParamsWriter::new(&params.base);
    match &params.op {
        OpParams::Plain => {}
        OpParams::Relu { n } => p.scalar_f32(*n),
        OpParams::Softmax { axis } => p.scalar_i32(*axis),
        OpParams::Concat { axis, inputs_count } => {
            p.scalar_i32(*axis);
            p.scalar_i32(*inputs_count);
        }
        OpParams::Clip { min_value, max_value } => {
            p.scalar_f32(*min_value);
            p.scalar_f32(*max_value);
        }
        OpParams::FullyConnected { units } => p.scalar_i32(*units),
        OpParams::MatMul { trans_a, trans_b } => {
            p.scalar_u32(*trans_a as u32);
            p.scalar_u32(*trans_b as u32);
        }
        OpParams::Conv2d {
            group,
            stride_height,
            stride_width,
            pad_top,
            pad_left,
            pad_down,
            pad_right,
            dilation_height,
            dilation_width,
        } => {
            for v in [
                group,
                stride_height,
                stride_width,
                pad_top,
                pad_left,
                pad_down,
                pad_right,
                dilation_height,
                dilation_width,
            ] {
                p.scalar_i32(*v);
            }
        }
        OpParams::Pool {
            filter_height,
            filter_width,
            stride_height,
            stride_width,
            pad_top,
            pad_left,
            pad_down,
            pad_right,
            count_include_pad,
        } => {
            for v in [
                filter_height,
                filter_width,
                stride_height,
                stride_width,
                pad_top,
                pad_left,
                pad_down,
                pad_right,
            ] {
                p.scalar_i32(*v);
            }
            p.scalar_u32(*count_include_pad as u32);
        }
        OpParams::Reshape { shape } => p.array(shape),
        OpParams::Transpose { permute } => p.array(permute),
        OpParams::Pad {
            pad_before,
            pad_after,
            pad_value,
            pad_mode,
        } => {
            p.array(pad_before);
            p.array(pad_after);
            p.scalar_f32(*pad_value);
            p.scalar_u32(pad_mode.code());
        }
        OpParams::Split { split_index, axis } => {
            p.array(split_index);
            p.scalar_i32(*axis);
        }
        OpParams::Reduce {
            out_strides,
            out_extents,
            inner_strides,
            inner_extents,
            axis,
            keepdims,
        } => {
            p.array(out_strides);
            p.array(out_extents);
            p.array(inner_strides);
            p.array(inner_extents);
            p.array(axis);
            p.scalar_u32(*keepdims as u32);
        }
        OpParams::BroadcastTo { shape } => p.array(shape),
        OpParams::StridedSlice { begin, end, stride } => {
            p.array(begin);
            p.array(end);
            p.array(stride);
        }
    }
    Ok(p.finish(&params.base.name))
}

fn read_array(r: &mut BlockReader<'_>) -> Result<Vec<i32>> {
    let offset = r.get_i64()?;
    let count = r.get_u32()? as usize;
    let _reserved = r.get_u32()?;
    let mut vr = BlockReader::new(r.slice_at(offset, count * 4)?);
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(vr.get_i32()?);
    }
    Ok(values)
}

/// Deserialize the parameter block of an operator of `kind`.
pub fn load_params(kind: OpKind, block: &[u8]) -> Result<ParamsBlock> {
    let mut r = BlockReader::new(block);

    let api_code = r.get_u32()?;
    let api = Api::from_code(api_code).ok_or(FormatError::UnknownEnum {
        what: "api",
        code: api_code,
    })?;
    let layout_code = r.get_u32()?;
    let layout = TensorLayout::from_code(layout_code).ok_or(FormatError::UnknownEnum {
        what: "layout",
        code: layout_code,
    })?;
    let quant_code = r.get_u32()?;
    let quant_type = QuantType::from_code(quant_code).ok_or(FormatError::UnknownEnum {
        what: "quant type",
        code: quant_code,
    })?;
    let _reserved = r.get_u32()?;
    let name_offset = r.get_i64()?;
    let name = r.cstr_at(name_offset)?.to_owned();
    debug_assert_eq!(r.pos(), SCALAR_AREA);

    let op = match kind {
        OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::Div | OpKind::Sigmoid | OpKind::Tanh => {
            OpParams::Plain
        }
        OpKind::Relu | OpKind::Relu6 | OpKind::LeakyRelu => OpParams::Relu { n: r.get_f32()? },
        OpKind::Softmax => OpParams::Softmax { axis: r.get_i32()? },
        OpKind::Concat => OpParams::Concat {
            axis: r.get_i32()?,
            inputs_count: r.get_i32()?,
        },
        OpKind::Clip => OpParams::Clip {
            min_value: r.get_f32()?,
            max_value: r.get_f32()?,
        },
        OpKind::FullyConnected => OpParams::FullyConnected { units: r.get_i32()? },
        OpKind::MatMul => OpParams::MatMul {
            trans_a: r.get_u32()? != 0,
            trans_b: r.get_u32()? != 0,
        },
        OpKind::Conv2d | OpKind::DepthwiseConv2d => OpParams::Conv2d {
            group: r.get_i32()?,
            stride_height: r.get_i32()?,
            stride_width: r.get_i32()?,
            pad_top: r.get_i32()?,
            pad_left: r.get_i32()?,
            pad_down: r.get_i32()?,
            pad_right: r.get_i32()?,
            dilation_height: r.get_i32()?,
            dilation_width: r.get_i32()?,
        },
        OpKind::MaxPool2d | OpKind::AvgPool2d | OpKind::GlobalAvgPool2d => OpParams::Pool {
            filter_height: r.get_i32()?,
            filter_width: r.get_i32()?,
            stride_height: r.get_i32()?,
            stride_width: r.get_i32()?,
            pad_top: r.get_i32()?,
            pad_left: r.get_i32()?,
            pad_down: r.get_i32()?,
            pad_right: r.get_i32()?,
            count_include_pad: r.get_u32()? != 0,
        },
        OpKind::Reshape => OpParams::Reshape {
            shape: read_array(&mut r)?,
        },
        OpKind::Transpose => OpParams::Transpose {
            permute: read_array(&mut r)?,
        },
        OpKind::Pad => {
            let pad_before = read_array(&mut r)?;
            let pad_after = read_array(&mut r)?;
            let pad_value = r.get_f32()?;
            let mode_code = r.get_u32()?;
            OpParams::Pad {
                pad_before,
                pad_after,
                pad_value,
                pad_mode: PadMode::from_code(mode_code).ok_or(FormatError::UnknownEnum {
                    what: "pad mode",
                    code: mode_code,
                })?,
            }
        }
        OpKind::Split => OpParams::Split {
            split_index: read_array(&mut r)?,
            axis: r.get_i32()?,
        },
        OpKind::Mean
        | OpKind::ReduceSum
        | OpKind::ReduceMax
        | OpKind::ReduceMin
        | OpKind::ReduceMean => OpParams::Reduce {
            out_strides: read_array(&mut r)?,
            out_extents: read_array(&mut r)?,
            inner_strides: read_array(&mut r)?,
            inner_extents: read_array(&mut r)?,
            axis: read_array(&mut r)?,
            keepdims: r.get_u32()? != 0,
        },
        OpKind::BroadcastTo => OpParams::BroadcastTo {
            shape: read_array(&mut r)?,
        },
        OpKind::StridedSlice => OpParams::StridedSlice {
            begin: read_array(&mut r)?,
            end: read_array(&mut r)?,
            stride: read_array(&mut r)?,
        },
    };

    Ok(ParamsBlock {
        base: ParamsBase {
            name,
            layout,
            api,
            quant_type,
        },
        op,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(kind: OpKind, op: OpParams) {
        let block = ParamsBlock::new("p", op);
        let bytes = dump_params(kind, &block).unwrap();
        assert!(bytes.len() >= PARAMS_PREFIX_SIZE);
        let loaded = load_params(kind, &bytes).unwrap();
        assert_eq!(loaded, block);
    }

    #[test]
    fn scalar_kinds() {
        round_trip(OpKind::Add, OpParams::Plain);
        round_trip(OpKind::LeakyRelu, OpParams::Relu { n: 0.125 });
        round_trip(OpKind::Softmax, OpParams::Softmax { axis: -1 });
        round_trip(
            OpKind::Clip,
            OpParams::Clip {
                min_value: -6.0,
                max_value: 6.0,
            },
        );
        round_trip(
            OpKind::MatMul,
            OpParams::MatMul {
                trans_a: false,
                trans_b: true,
            },
        );
        round_trip(
            OpKind::Conv2d,
            OpParams::Conv2d {
                group: 1,
                stride_height: 2,
                stride_width: 2,
                pad_top: 1,
                pad_left: 1,
                pad_down: 0,
                pad_right: 0,
                dilation_height: 1,
                dilation_width: 1,
            },
        );
    }

    #[test]
    fn pointer_tail_kinds() {
        round_trip(
            OpKind::Reshape,
            OpParams::Reshape {
                shape: vec![1, -1, 16],
            },
        );
        round_trip(
            OpKind::Transpose,
            OpParams::Transpose {
                permute: vec![0, 2, 3, 1],
            },
        );
        round_trip(
            OpKind::Pad,
            OpParams::Pad {
                pad_before: vec![0, 0, 1, 1],
                pad_after: vec![0, 0, 1, 1],
                pad_value: 0.0,
                pad_mode: PadMode::Constant,
            },
        );
        round_trip(
            OpKind::Split,
            OpParams::Split {
                split_index: vec![2, 5, 7],
                axis: 1,
            },
        );
        round_trip(
            OpKind::ReduceMean,
            OpParams::Reduce {
                out_strides: vec![4, 1],
                out_extents: vec![2, 4],
                inner_strides: vec![8],
                inner_extents: vec![3],
                axis: vec![1],
                keepdims: true,
            },
        );
        round_trip(
            OpKind::BroadcastTo,
            OpParams::BroadcastTo {
                shape: vec![2, 3, 4],
            },
        );
        round_trip(
            OpKind::StridedSlice,
            OpParams::StridedSlice {
                begin: vec![0, 0],
                end: vec![3, 4],
                stride: vec![1, 2],
            },
        );
    }

    #[test]
    fn empty_arrays_survive() {
        round_trip(OpKind::Reshape, OpParams::Reshape { shape: vec![] });
    }

    #[test]
    fn shape_mismatch_fails_loudly() {
        let block = ParamsBlock::new("p", OpParams::Softmax { axis: 0 });
        assert!(matches!(
            dump_params(OpKind::Relu, &block),
            Err(FormatError::ParamsShape { .. })
        ));
    }
}
