use crate::error::Result;
use super::Tensor;
use super::constant::TIME_DIM;

/// Numerically stable `log(sum(exp(xs)))`.
///
/// The maximum is subtracted before exponentiating so that large negative
/// sentinels underflow to zero instead of producing `NaN`. When the maximum is
/// not finite (every input is `-inf`, or one is `+inf`/`NaN`) it is returned
/// as-is.
pub(crate) fn log_sum_exp(xs: &[f32]) -> f32 {
    let max = max(xs);
    if !max.is_finite() {
        return max;
    }
    let sum: f32 = xs.iter().map(|&x| (x - max).exp()).sum();
    max + sum.ln()
}

/// Largest element, `-inf` for an empty slice. `NaN` propagates.
pub(crate) fn max(xs: &[f32]) -> f32 {
    xs.iter().fold(f32::NEG_INFINITY, |acc, &x| {
        if x.is_nan() || acc.is_nan() { f32::NAN } else { acc.max(x) }
    })
}

/// Position of the first maximum.
pub(crate) fn argmax(xs: &[f32]) -> usize {
    let mut best = 0;
    for (i, &x) in xs.iter().enumerate() {
        if x > xs[best] {
            best = i;
        }
    }
    best
}

/// Write `softmax(xs)` into `out`.
pub(crate) fn softmax_into(xs: &[f32], out: &mut [f32]) {
    debug_assert_eq!(xs.len(), out.len());
    let lse = log_sum_exp(xs);
    for (o, &x) in out.iter_mut().zip(xs) {
        *o = (x - lse).exp();
    }
}

/// Write a one-hot indicator of the first maximum of `xs` into `out`.
pub(crate) fn one_hot_argmax_into(xs: &[f32], out: &mut [f32]) {
    debug_assert_eq!(xs.len(), out.len());
    out.fill(0.0);
    if !xs.is_empty() {
        out[argmax(xs)] = 1.0;
    }
}

/// Reverse a time-major tensor along its leading dimension.
pub(crate) fn flip_time(tensor: &Tensor) -> Result<Tensor> {
    let steps = tensor.shape().get(TIME_DIM).copied().unwrap_or(0);
    if steps == 0 {
        return Ok(tensor.clone());
    }
    let stride = tensor.elem_count() / steps;
    let src = tensor.as_slice();
    let data = (0..steps)
        .rev()
        .flat_map(|t| src[t * stride..(t + 1) * stride].iter().copied())
        .collect();
    Tensor::new(data, tensor.shape().to_vec())
}
