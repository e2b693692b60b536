//! Portable reference kernels.
//!
//! These are the slow-but-correct implementations every backend can fall
//! back to. Each kernel validates its arity, then computes elementwise over
//! the decoded f32 slices.

use anyhow::{anyhow, bail, Result};
use rein_core::{OpParams, ParamsBlock};

use crate::registry::Kernel;

fn unary_args<'a>(
    inputs: &[&'a [f32]],
    outputs: &mut [Vec<f32>],
    name: &str,
) -> Result<&'a [f32]> {
    if inputs.len() != 1 || outputs.len() != 1 {
        bail!(
            "{name} expects 1 input and 1 output, got {} and {}",
            inputs.len(),
            outputs.len()
        );
    }
    if outputs[0].len() != inputs[0].len() {
        bail!(
            "{name} output holds {} elements, input has {}",
            outputs[0].len(),
            inputs[0].len()
        );
    }
    Ok(inputs[0])
}

/// Plain ReLU: `max(0, x)`.
pub struct ReluKernel;

impl Kernel for ReluKernel {
    fn run(&self, inputs: &[&[f32]], outputs: &mut [Vec<f32>], _params: &ParamsBlock) -> Result<()> {
        let input = unary_args(inputs, outputs, "relu")?;
        for (out, &x) in outputs[0].iter_mut().zip(input) {
            *out = x.max(0.0);
        }
        Ok(())
    }
}

/// ReLU clamped to `[0, 6]`.
pub struct Relu6Kernel;

impl Kernel for Relu6Kernel {
    fn run(&self, inputs: &[&[f32]], outputs: &mut [Vec<f32>], _params: &ParamsBlock) -> Result<()> {
        let input = unary_args(inputs, outputs, "relu6")?;
        for (out, &x) in outputs[0].iter_mut().zip(input) {
            *out = x.clamp(0.0, 6.0);
        }
        Ok(())
    }
}

/// Leaky ReLU; the negative slope is the `n` coefficient of the relu
/// parameter family.
pub struct LeakyReluKernel;

impl Kernel for LeakyReluKernel {
    fn run(&self, inputs: &[&[f32]], outputs: &mut [Vec<f32>], params: &ParamsBlock) -> Result<()> {
        let input = unary_args(inputs, outputs, "leaky relu")?;
        let n = match &params.op {
            OpParams::Relu { n } => *n,
            other => return Err(anyhow!("leaky relu kernel got {other:?} parameters")),
        };
        for (out, &x) in outputs[0].iter_mut().zip(input) {
            *out = if x > 0.0 { x } else { n * x };
        }
        Ok(())
    }
}

/// Logistic sigmoid.
pub struct SigmoidKernel;

impl Kernel for SigmoidKernel {
    fn run(&self, inputs: &[&[f32]], outputs: &mut [Vec<f32>], _params: &ParamsBlock) -> Result<()> {
        let input = unary_args(inputs, outputs, "sigmoid")?;
        for (out, &x) in outputs[0].iter_mut().zip(input) {
            *out = 1.0 / (1.0 + (-x).exp());
        }
        Ok(())
    }
}

/// Hyperbolic tangent.
pub struct TanhKernel;

impl Kernel for TanhKernel {
    fn run(&self, inputs: &[&[f32]], outputs: &mut [Vec<f32>], _params: &ParamsBlock) -> Result<()> {
        let input = unary_args(inputs, outputs, "tanh")?;
        for (out, &x) in outputs[0].iter_mut().zip(input) {
            *out = x.tanh();
        }
        Ok(())
    }
}

/// Softmax over the whole slice, shifted by the max for stability.
pub struct SoftmaxKernel;

impl Kernel for SoftmaxKernel {
    fn run(&self, inputs: &[&[f32]], outputs: &mut [Vec<f32>], _params: &ParamsBlock) -> Result<()> {
        let input = unary_args(inputs, outputs, "softmax")?;
        if input.is_empty() {
            return Ok(());
        }
        let max = input.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let mut sum = 0.0;
        for (out, &x) in outputs[0].iter_mut().zip(input) {
            *out = (x - max).exp();
            sum += *out;
        }
        for out in outputs[0].iter_mut() {
            *out /= sum;
        }
        Ok(())
    }
}

fn binary_elementwise(
    inputs: &[&[f32]],
    outputs: &mut [Vec<f32>],
    name: &str,
    f: impl Fn(f32, f32) -> f32,
) -> Result<()> {
    if inputs.len() != 2 || outputs.len() != 1 {
        bail!(
            "{name} expects 2 inputs and 1 output, got {} and {}",
            inputs.len(),
            outputs.len()
        );
    }
    let (a, b) = (inputs[0], inputs[1]);
    if a.len() != b.len() || outputs[0].len() != a.len() {
        bail!("{name} operand lengths differ: {} vs {}", a.len(), b.len());
    }
    for ((out, &x), &y) in outputs[0].iter_mut().zip(a).zip(b) {
        *out = f(x, y);
    }
    Ok(())
}

/// Elementwise addition.
pub struct AddKernel;

impl Kernel for AddKernel {
    fn run(&self, inputs: &[&[f32]], outputs: &mut [Vec<f32>], _params: &ParamsBlock) -> Result<()> {
        binary_elementwise(inputs, outputs, "add", |x, y| x + y)
    }
}

/// Elementwise multiplication.
pub struct MulKernel;

impl Kernel for MulKernel {
    fn run(&self, inputs: &[&[f32]], outputs: &mut [Vec<f32>], _params: &ParamsBlock) -> Result<()> {
        binary_elementwise(inputs, outputs, "mul", |x, y| x * y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rein_core::ParamsBlock;

    fn run(kernel: &dyn Kernel, input: &[f32], params: &ParamsBlock) -> Vec<f32> {
        let mut outputs = vec![vec![0.0; input.len()]];
        kernel.run(&[input], &mut outputs, params).unwrap();
        outputs.remove(0)
    }

    #[test]
    fn relu_clamps_negatives() {
        let params = ParamsBlock::new("r", OpParams::Relu { n: 0.0 });
        let out = run(&ReluKernel, &[-1.0, 0.0, 2.5], &params);
        assert_eq!(out, vec![0.0, 0.0, 2.5]);
    }

    #[test]
    fn softmax_sums_to_one() {
        let params = ParamsBlock::new("s", OpParams::Softmax { axis: 0 });
        let out = run(&SoftmaxKernel, &[1.0, 2.0, 3.0], &params);
        let sum: f32 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(out[2] > out[1] && out[1] > out[0]);
    }

    #[test]
    fn add_is_elementwise() {
        let params = ParamsBlock::new("a", OpParams::Plain);
        let mut outputs = vec![vec![0.0; 3]];
        AddKernel
            .run(&[&[1.0, 2.0, 3.0], &[10.0, 20.0, 30.0]], &mut outputs, &params)
            .unwrap();
        assert_eq!(outputs[0], vec![11.0, 22.0, 33.0]);
    }

    #[test]
    fn arity_mismatch_fails() {
        let params = ParamsBlock::new("a", OpParams::Plain);
        let mut outputs = vec![vec![0.0; 3]];
        assert!(AddKernel.run(&[&[1.0, 2.0, 3.0]], &mut outputs, &params).is_err());
    }
}
