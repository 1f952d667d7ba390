//! The log-partition as a differentiable operation.
//!
//! Differentiating the scan through its control flow would record `T`
//! sequential steps, each depending on the whole previous table. Instead the
//! gradient is computed in closed form with the forward-backward identity:
//! one forward scan (kept from the forward pass), one backward scan over the
//! transposed graph, and a per-step gradient-reduce over the edge weights.

use std::marker::PhantomData;
use std::sync::Arc;
use crate::error::{ConfigError, Result};
use crate::tensor::Tensor;
use crate::tensor::operations::flip_time;
use super::index::TransitionIndex;
use super::scan::scan;
use super::semiring::Semiring;

/// Saved context of a `logZ` forward pass under semiring `S`.
///
/// [`LogZ::forward`] returns the per-sequence values together with this
/// context; [`LogZ::backward`] turns an upstream gradient into the gradient
/// with respect to every transition score.
#[derive(Debug, Clone)]
pub struct LogZ<S: Semiring> {
    ms: Tensor,
    alpha: Tensor,
    v_t: Tensor,
    index: Arc<TransitionIndex>,
    _semiring: PhantomData<S>,
}

impl<S: Semiring> LogZ<S> {
    /// Run the forward scan of `ms` (`(T, N, C, NZ)`) from `v0` and combine the
    /// last row with `v_t` (both `(N, C)`).
    ///
    /// Returns a tensor of shape `(N)` holding the log-partition (or the best
    /// path score under [`Max`](super::Max)) of each sequence.
    pub fn forward(ms: Tensor, index: Arc<TransitionIndex>, v0: &Tensor, v_t: Tensor) -> Result<(Tensor, Self)> {
        let (steps, batch, states, degree) = ms.dims4("logZ")?;
        if states != index.n_states() || degree != index.out_degree() {
            return Err(ConfigError::ShapeMismatch {
                op: "logZ",
                expected: vec![steps, batch, index.n_states(), index.out_degree()],
                actual: ms.shape().to_vec(),
            }
            .into());
        }
        if v_t.shape() != [batch, states] {
            return Err(ConfigError::ShapeMismatch {
                op: "logZ terminal boundary",
                expected: vec![batch, states],
                actual: v_t.shape().to_vec(),
            }
            .into());
        }
        let alpha = scan::<S>(&ms, index.sources(), v0)?;

        let last = &alpha.as_slice()[steps * batch * states..];
        let mut combined = vec![S::ZERO; states];
        let values = (0..batch)
            .map(|n| {
                let row = &last[n * states..(n + 1) * states];
                let end = &v_t.as_slice()[n * states..(n + 1) * states];
                for ((c, &a), &v) in combined.iter_mut().zip(row).zip(end) {
                    *c = S::mul(a, v);
                }
                S::sum(&combined)
            })
            .collect();

        let ctx = Self {
            ms,
            alpha,
            v_t,
            index,
            _semiring: PhantomData,
        };
        Ok((Tensor::new(values, [batch])?, ctx))
    }

    /// Forward table `(T + 1, N, C)` computed by [`forward`](Self::forward).
    pub fn alpha(&self) -> &Tensor {
        &self.alpha
    }

    /// Gradient of `sum_n grad[n] * logZ[n]` with respect to the transition
    /// scores, shaped `(T, N, C * NZ)`.
    ///
    /// Under [`Log`](super::Log) each `(t, n)` block holds the posterior
    /// probability of every edge; under [`Max`](super::Max) it is the indicator
    /// of the edge taken by the best path.
    pub fn backward(&self, grad: &[f32]) -> Result<Tensor> {
        let (steps, batch, states, degree) = self.ms.dims4("logZ backward")?;
        if grad.len() != batch {
            return Err(ConfigError::ShapeMismatch {
                op: "logZ backward gradient",
                expected: vec![batch],
                actual: vec![grad.len()],
            }
            .into());
        }
        let beta = backward_table::<S>(&self.ms, &self.index, &self.v_t)?;

        let edges = states * degree;
        let plane = batch * states;
        let sources = self.index.sources();
        let (m, alpha, beta) = (self.ms.as_slice(), self.alpha.as_slice(), beta.as_slice());

        let mut out = vec![0.0f32; steps * batch * edges];
        let mut weights = vec![S::ZERO; edges];
        for t in 0..steps {
            for n in 0..batch {
                let block = (t * batch + n) * edges;
                let a = &alpha[t * plane + n * states..t * plane + (n + 1) * states];
                let b = &beta[(t + 1) * plane + n * states..(t + 1) * plane + (n + 1) * states];
                for (e, w) in weights.iter_mut().enumerate() {
                    *w = S::mul(S::mul(m[block + e], a[sources[e]]), b[e / degree]);
                }
                let g = &mut out[block..block + edges];
                S::dsum(&weights, g);
                g.iter_mut().for_each(|v| *v *= grad[n]);
            }
        }
        Tensor::new(out, [steps, batch, edges])
    }
}

/// Backward table `(T + 1, N, C)` of `ms` ending in `v_t`, in forward time order.
///
/// The matrices are reversed in time and their edges regrouped by the state
/// they leave, so the forward [`scan`] accumulates each state's potential
/// from its successors.
pub(crate) fn backward_table<S: Semiring>(ms: &Tensor, index: &TransitionIndex, v_t: &Tensor) -> Result<Tensor> {
    let (steps, batch, states, degree) = ms.dims4("backward scan")?;
    if states != index.n_states() || degree != index.out_degree() {
        return Err(ConfigError::ShapeMismatch {
            op: "backward scan",
            expected: vec![steps, batch, index.n_states(), index.out_degree()],
            actual: ms.shape().to_vec(),
        }
        .into());
    }
    let edges = states * degree;
    let src = ms.as_slice();
    let transposed = index.transposed();
    let mut data = Vec::with_capacity(src.len());
    for t in (0..steps).rev() {
        for n in 0..batch {
            let block = &src[(t * batch + n) * edges..(t * batch + n + 1) * edges];
            data.extend(transposed.iter().map(|&e| block[e]));
        }
    }
    let reversed = Tensor::new(data, [steps, batch, states, degree])?;
    let table = scan::<S>(&reversed, index.transposed_targets(), v_t)?;
    flip_time(&table)
}
