use std::sync::Arc;
use tracing::debug;
use crate::config::CrfConfig;
use crate::error::{ConfigError, Result};
use crate::tensor::Tensor;
use crate::tensor::operations::argmax;
use super::index::TransitionIndex;
use super::log_z::{LogZ, backward_table};
use super::scan::scan;
use super::semiring::{Log, Max, Semiring};

/// Sequence-level scorer of a CTC-CRF over per-step transition scores.
///
/// Scores are time-major tensors of shape `(T, N, C * NZ)` where block
/// `c * NZ + z` holds the score of edge `(c, z)` of the model's
/// [`TransitionIndex`]. Every operation is generic over the [`Semiring`], so
/// the same scorer computes partition functions with [`Log`] and best-path
/// scores with [`Max`].
///
/// # Example
///
/// ```ignore
/// use basecrf::crf::{CrfScorer, Log};
/// use basecrf::config::CrfConfig;
///
/// let scorer = CrfScorer::new(&CrfConfig::default())?;
/// let log_z = scorer.log_z::<Log>(&scores)?;
/// let grad = scorer.log_z_grad::<Log>(&scores, &vec![1.0; log_z.elem_count()])?;
/// ```
#[derive(Debug, Clone)]
pub struct CrfScorer {
    index: Arc<TransitionIndex>,
    alphabet: Vec<char>,
}

impl CrfScorer {
    /// Build the scorer for a model configuration.
    pub fn new(config: &CrfConfig) -> Result<Self> {
        let index = config.index()?;
        Self::from_index(Arc::new(index), &config.alphabet)
    }

    /// Build from a prepared index. `alphabet` names the label of every edge
    /// slot, the first one being the blank.
    pub fn from_index(index: Arc<TransitionIndex>, alphabet: &str) -> Result<Self> {
        let alphabet: Vec<char> = alphabet.chars().collect();
        if alphabet.len() != index.out_degree() {
            return Err(ConfigError::ShapeMismatch {
                op: "alphabet",
                expected: vec![index.out_degree()],
                actual: vec![alphabet.len()],
            }
            .into());
        }
        Ok(Self { index, alphabet })
    }

    pub fn index(&self) -> &Arc<TransitionIndex> {
        &self.index
    }

    /// Size `C * NZ` of the last dimension of a score tensor.
    pub fn n_score(&self) -> usize {
        self.index.n_transitions()
    }

    /// Per-sequence log-partition with every state allowed at both ends.
    pub fn log_z<S: Semiring>(&self, scores: &Tensor) -> Result<Tensor> {
        let (ms, batch) = self.matrices(scores)?;
        let ones = self.boundary::<S>(batch);
        let (values, _) = LogZ::<S>::forward(ms, self.index.clone(), &ones, ones.clone())?;
        Ok(values)
    }

    /// Per-sequence log-partition with explicit start (`v0`) and end (`v_t`)
    /// potentials, both `(N, C)`.
    pub fn log_z_with_boundaries<S: Semiring>(&self, scores: &Tensor, v0: &Tensor, v_t: &Tensor) -> Result<Tensor> {
        let (ms, _) = self.matrices(scores)?;
        let (values, _) = LogZ::<S>::forward(ms, self.index.clone(), v0, v_t.clone())?;
        Ok(values)
    }

    /// Forward potentials, shape `(T + 1, N, C)`.
    pub fn forward_scores<S: Semiring>(&self, scores: &Tensor) -> Result<Tensor> {
        let (ms, batch) = self.matrices(scores)?;
        scan::<S>(&ms, self.index.sources(), &self.boundary::<S>(batch))
    }

    /// Backward potentials, shape `(T + 1, N, C)`, in forward time order.
    pub fn backward_scores<S: Semiring>(&self, scores: &Tensor) -> Result<Tensor> {
        let (ms, batch) = self.matrices(scores)?;
        backward_table::<S>(&ms, &self.index, &self.boundary::<S>(batch))
    }

    /// Gradient of `sum_n grad[n] * logZ[n]` with respect to `scores`.
    pub fn log_z_grad<S: Semiring>(&self, scores: &Tensor, grad: &[f32]) -> Result<Tensor> {
        let (ms, batch) = self.matrices(scores)?;
        let ones = self.boundary::<S>(batch);
        let (_, ctx) = LogZ::<S>::forward(ms, self.index.clone(), &ones, ones.clone())?;
        ctx.backward(grad)
    }

    /// Posterior probability of every edge at every step, shaped like `scores`.
    pub fn posteriors(&self, scores: &Tensor) -> Result<Tensor> {
        let (_, batch, _) = scores.dims3("posteriors")?;
        self.log_z_grad::<Log>(scores, &vec![1.0; batch])
    }

    /// Edge slot taken by the best path at every step, one row per sequence.
    /// Slot `0` is a stay.
    pub fn viterbi(&self, scores: &Tensor) -> Result<Vec<Vec<usize>>> {
        let (steps, batch, edges) = scores.dims3("viterbi")?;
        let degree = self.index.out_degree();
        let path = self.log_z_grad::<Max>(scores, &vec![1.0; batch])?;
        let blocks = path.as_slice();
        let labels = (0..batch)
            .map(|n| {
                (0..steps)
                    .map(|t| {
                        let block = (t * batch + n) * edges;
                        argmax(&blocks[block..block + edges]) % degree
                    })
                    .collect()
            })
            .collect();
        Ok(labels)
    }

    /// Best-path label sequence of every sequence, stays dropped.
    pub fn decode(&self, scores: &Tensor) -> Result<Vec<String>> {
        let paths = self.viterbi(scores)?;
        debug!(sequences = paths.len(), "decoded best paths");
        Ok(paths
            .into_iter()
            .map(|path| {
                path.into_iter()
                    .filter(|&z| z != 0)
                    .map(|z| self.alphabet[z])
                    .collect()
            })
            .collect())
    }

    /// Check `scores` against the index and view it as `(T, N, C, NZ)`.
    fn matrices(&self, scores: &Tensor) -> Result<(Tensor, usize)> {
        let (steps, batch, edges) = scores.dims3("crf scores")?;
        if edges != self.n_score() {
            return Err(ConfigError::ShapeMismatch {
                op: "crf scores",
                expected: vec![steps, batch, self.n_score()],
                actual: scores.shape().to_vec(),
            }
            .into());
        }
        let ms = scores
            .clone()
            .reshape([steps, batch, self.index.n_states(), self.index.out_degree()])?;
        Ok((ms, batch))
    }

    fn boundary<S: Semiring>(&self, batch: usize) -> Tensor {
        Tensor::full([batch, self.index.n_states()], S::ONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crf::semiring::LOG_ZERO;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn two_state() -> CrfScorer {
        let index = TransitionIndex::from_table(&[vec![0, 1], vec![0, 1]]).unwrap();
        CrfScorer::from_index(Arc::new(index), "NA").unwrap()
    }

    fn random_scores(scorer: &CrfScorer, steps: usize, batch: usize, seed: u64) -> Tensor {
        let mut rng = StdRng::seed_from_u64(seed);
        let len = steps * batch * scorer.n_score();
        let data = (0..len).map(|_| rng.random_range(-3.0f32..3.0)).collect();
        Tensor::new(data, [steps, batch, scorer.n_score()]).unwrap()
    }

    fn assert_forward_backward_agree<S: Semiring>(scorer: &CrfScorer, scores: &Tensor) {
        let (steps, batch, _) = scores.dims3("test").unwrap();
        let states = scorer.index().n_states();
        let log_z = scorer.log_z::<S>(scores).unwrap();
        let alpha = scorer.forward_scores::<S>(scores).unwrap();
        let beta = scorer.backward_scores::<S>(scores).unwrap();
        assert_eq!(alpha.shape(), beta.shape());

        for t in 0..=steps {
            for n in 0..batch {
                let joint: Vec<f32> = (0..states)
                    .map(|c| S::mul(alpha.get(&[t, n, c]), beta.get(&[t, n, c])))
                    .collect();
                let expected = log_z.get(&[n]);
                let got = S::sum(&joint);
                assert!(
                    (got - expected).abs() < 1e-3 * expected.abs().max(1.0),
                    "{} step {t} sequence {n}: {got} != {expected}",
                    S::NAME
                );
            }
        }
    }

    #[test]
    fn test_forward_backward_consistency() {
        let scorer = CrfScorer::new(&CrfConfig::default()).unwrap();
        let scores = random_scores(&scorer, 6, 2, 42);
        assert_forward_backward_agree::<Log>(&scorer, &scores);
        assert_forward_backward_agree::<Max>(&scorer, &scores);
    }

    #[test]
    fn test_two_state_regression() {
        let scorer = two_state();
        let data = [0.0, -1.0, -2.0, 0.0].repeat(3);
        let scores = Tensor::new(data, [3, 1, 4]).unwrap();
        let v0 = Tensor::new(vec![0.0, LOG_ZERO], [1, 2]).unwrap();
        let v_t = Tensor::zeros([1, 2]);

        let log_z = scorer.log_z_with_boundaries::<Log>(&scores, &v0, &v_t).unwrap();
        assert_eq!(log_z.shape(), &[1]);
        assert!((log_z.get(&[0]) - 0.44603427).abs() < 1e-5);

        let best = scorer.log_z_with_boundaries::<Max>(&scores, &v0, &v_t).unwrap();
        assert_eq!(best.get(&[0]), 0.0);
    }

    #[test]
    fn test_empty_sequence_sums_boundaries() {
        let scorer = two_state();
        let scores = Tensor::zeros([0, 3, 4]);
        let log_z = scorer.log_z::<Log>(&scores).unwrap();
        for n in 0..3 {
            assert!((log_z.get(&[n]) - 2.0f32.ln()).abs() < 1e-6);
        }
        assert_eq!(scorer.log_z_grad::<Log>(&scores, &[1.0; 3]).unwrap().shape(), &[0, 3, 4]);
    }

    #[test]
    fn test_viterbi_follows_best_path() {
        let index = Arc::new(TransitionIndex::new(2, 1).unwrap());
        let scorer = CrfScorer::from_index(index, "NAC").unwrap();
        // edge (c, z) sits at c * 3 + z
        let mut scores = Tensor::zeros([3, 2, 6]);
        let data = scores.as_mut_slice();
        data[4] = 5.0; // t=0, n=0: 0 -> 1 through slot 1
        data[12 + 3] = 5.0; // t=1, n=0: stay in 1
        data[24 + 2] = 5.0; // t=2, n=0: 1 -> 0 through slot 2
        for t in 0..3 {
            data[(t * 2 + 1) * 6] = 5.0; // n=1: stay in 0
        }

        let paths = scorer.viterbi(&scores).unwrap();
        assert_eq!(paths, vec![vec![1, 0, 2], vec![0, 0, 0]]);
        assert_eq!(scorer.decode(&scores).unwrap(), vec!["AC".to_string(), String::new()]);
    }

    #[test]
    fn test_posteriors_have_score_shape() {
        let scorer = two_state();
        let scores = random_scores(&scorer, 5, 2, 1);
        let posteriors = scorer.posteriors(&scores).unwrap();
        assert_eq!(posteriors.shape(), scores.shape());
        for block in posteriors.as_slice().chunks(4) {
            assert!((block.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_rejects_mismatched_scores() {
        let scorer = two_state();
        assert!(scorer.log_z::<Log>(&Tensor::zeros([3, 1, 5])).is_err());
        assert!(scorer.log_z::<Log>(&Tensor::zeros([3, 4])).is_err());
        let scores = Tensor::zeros([3, 2, 4]);
        assert!(scorer.log_z_grad::<Log>(&scores, &[1.0]).is_err());
        let wrong_boundary = Tensor::zeros([1, 2]);
        assert!(scorer.log_z_with_boundaries::<Log>(&scores, &wrong_boundary, &wrong_boundary).is_err());
    }

    #[test]
    fn test_alphabet_must_label_every_slot() {
        let index = Arc::new(TransitionIndex::new(4, 1).unwrap());
        assert!(CrfScorer::from_index(index.clone(), "NACG").is_err());
        assert!(CrfScorer::from_index(index, "NACGT").is_ok());
    }

    proptest! {
        #[test]
        fn prop_forward_backward_agree(
            data in proptest::collection::vec(-4.0f32..4.0, 4 * 2 * 4),
        ) {
            let scorer = two_state();
            let scores = Tensor::new(data, [4, 2, 4]).unwrap();
            let log_z = scorer.log_z::<Log>(&scores).unwrap();
            let alpha = scorer.forward_scores::<Log>(&scores).unwrap();
            let beta = scorer.backward_scores::<Log>(&scores).unwrap();
            for t in 0..=4 {
                for n in 0..2 {
                    let joint = [
                        alpha.get(&[t, n, 0]) + beta.get(&[t, n, 0]),
                        alpha.get(&[t, n, 1]) + beta.get(&[t, n, 1]),
                    ];
                    prop_assert!((Log::sum(&joint) - log_z.get(&[n])).abs() < 1e-3);
                }
            }
        }

        #[test]
        fn prop_max_never_exceeds_log(
            data in proptest::collection::vec(-4.0f32..4.0, 3 * 4),
        ) {
            let scorer = two_state();
            let scores = Tensor::new(data, [3, 1, 4]).unwrap();
            let best = scorer.log_z::<Max>(&scores).unwrap().get(&[0]);
            let total = scorer.log_z::<Log>(&scores).unwrap().get(&[0]);
            prop_assert!(best <= total + 1e-4);
        }
    }
}
