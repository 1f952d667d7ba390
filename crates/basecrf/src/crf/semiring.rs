//! Log-domain semirings driving the scan.
//!
//! | Semiring | ⊕ (`sum`) | ⊗ (`mul`) | 0 | 1 | `dsum` |
//! |----------|-----------|-----------|---|---|--------|
//! | [`Log`]  | log-sum-exp | + | [`LOG_ZERO`] | 0 | softmax |
//! | [`Max`]  | max | + | [`LOG_ZERO`] | 0 | one-hot argmax |

use crate::tensor::operations::{log_sum_exp, max, one_hot_argmax_into, softmax_into};

/// Additive identity in the log domain.
///
/// A finite stand-in for `-inf`: adding a handful of these stays finite in
/// `f32` while still vanishing under `exp`.
pub const LOG_ZERO: f32 = -1.0e30;

/// A semiring over log-domain `f32` potentials, together with the local
/// derivative of its reduction.
pub trait Semiring: Copy + Clone + Send + Sync + 'static {
    /// Additive identity (impossible).
    const ZERO: f32;

    /// Multiplicative identity (certain).
    const ONE: f32;

    /// Short name used in logs and error messages, e.g. `"log"`.
    const NAME: &'static str;

    /// Semiring product (⊗).
    #[inline]
    fn mul(a: f32, b: f32) -> f32 {
        a + b
    }

    /// Semiring sum (⊕) over a group of values.
    fn sum(xs: &[f32]) -> f32;

    /// Derivative of [`sum`](Self::sum) with respect to each input, written to `out`.
    fn dsum(xs: &[f32], out: &mut [f32]);
}

/// Sum semiring: log-domain probability accumulation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Log;

/// Max semiring: best-path (Viterbi) scoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct Max;

impl Semiring for Log {
    const ZERO: f32 = LOG_ZERO;
    const ONE: f32 = 0.0;
    const NAME: &'static str = "log";

    #[inline]
    fn sum(xs: &[f32]) -> f32 {
        let total = log_sum_exp(xs);
        // an all-zero group collapses to -inf in lse; keep the sentinel
        if total < Self::ZERO { Self::ZERO } else { total }
    }

    #[inline]
    fn dsum(xs: &[f32], out: &mut [f32]) {
        softmax_into(xs, out)
    }
}

impl Semiring for Max {
    const ZERO: f32 = LOG_ZERO;
    const ONE: f32 = 0.0;
    const NAME: &'static str = "max";

    #[inline]
    fn sum(xs: &[f32]) -> f32 {
        max(xs)
    }

    #[inline]
    fn dsum(xs: &[f32], out: &mut [f32]) {
        one_hot_argmax_into(xs, out)
    }
}
