use crate::error::{ConfigError, Result};
use crate::tensor::Tensor;
use super::semiring::Semiring;

/// Forward recursion of per-step transition matrices under semiring `S`.
///
/// * `ms` - transition matrices of shape `(T, N, C, NZ)`; `ms[t, n, c, z]` scores
///   the edge entering state `c` through slot `z` at step `t`
/// * `gather` - flattened `(C, NZ)` table naming the state each edge leaves
/// * `v0` - boundary potentials of shape `(N, C)`
///
/// Returns the table of shape `(T + 1, N, C)` with `table[0] = v0` and
///
/// ```text
/// table[t + 1, n, c] = sum_z mul(ms[t, n, c, z], table[t, n, gather[c, z]])
/// ```
///
/// The scan has no hidden state. Running it over time-reversed matrices
/// permuted by [`TransitionIndex::transposed`](super::TransitionIndex::transposed)
/// with the transposed targets as `gather` yields the backward table.
pub fn scan<S: Semiring>(ms: &Tensor, gather: &[usize], v0: &Tensor) -> Result<Tensor> {
    let (steps, batch, states, degree) = ms.dims4("scan")?;
    if gather.len() != states * degree {
        return Err(ConfigError::ShapeMismatch {
            op: "scan gather",
            expected: vec![states, degree],
            actual: vec![gather.len()],
        }
        .into());
    }
    if let Some(edge) = gather.iter().position(|&s| s >= states) {
        return Err(ConfigError::IndexOutOfRange {
            state: edge / degree,
            slot: edge % degree,
            source_state: gather[edge],
            n_states: states,
        }
        .into());
    }
    if v0.shape() != [batch, states] {
        return Err(ConfigError::ShapeMismatch {
            op: "scan boundary",
            expected: vec![batch, states],
            actual: v0.shape().to_vec(),
        }
        .into());
    }

    let plane = batch * states;
    let mut table = Tensor::full([steps + 1, batch, states], S::ZERO);
    let out = table.as_mut_slice();
    out[..plane].copy_from_slice(v0.as_slice());

    let m = ms.as_slice();
    let mut edges = vec![S::ZERO; degree];
    for t in 0..steps {
        let (prev, next) = out[t * plane..(t + 2) * plane].split_at_mut(plane);
        for n in 0..batch {
            let prev_row = &prev[n * states..(n + 1) * states];
            let next_row = &mut next[n * states..(n + 1) * states];
            let block = (t * batch + n) * states * degree;
            let m_row = &m[block..block + states * degree];
            for (c, potential) in next_row.iter_mut().enumerate() {
                for (z, edge) in edges.iter_mut().enumerate() {
                    let e = c * degree + z;
                    *edge = S::mul(m_row[e], prev_row[gather[e]]);
                }
                *potential = S::sum(&edges);
            }
        }
    }
    Ok(table)
}
