//! Basecaller facades: an executable network behind the batch scheduler,
//! with a CRF scorer or a CTC decoder on the host side.

use tracing::info;
use crate::backend::{Backend, ExecutableNetwork};
use crate::config::CrfConfig;
use crate::crf::{CrfScorer, Log, Semiring};
use crate::error::{ConfigError, Result};
use crate::scheduler::{BatchInferenceScheduler, SchedulerStats};
use crate::tensor::Tensor;
use crate::tensor::operations::argmax;

/// Copy a joined network output to the host as `(T, N, C)`.
///
/// `(1, T, N, C)` outputs lose their leading dimension.
fn host_scores<T: Backend>(output: &T) -> Result<Tensor> {
    let scores = output.to_host()?;
    match scores.shape().to_vec().as_slice() {
        &[1, steps, batch, channels] => scores.reshape([steps, batch, channels]),
        _ => Ok(scores),
    }
}

/// Check that a network emits `channels` values per time step.
fn check_channels<N: ExecutableNetwork>(network: &N, channels: usize, op: &'static str) -> Result<()> {
    let shape = network.output_shape();
    if shape.last().copied() != Some(channels) {
        return Err(ConfigError::ShapeMismatch {
            op,
            expected: vec![channels],
            actual: shape,
        }
        .into());
    }
    Ok(())
}

/// A CRF basecaller: an executable encoder network, the batch scheduler that
/// feeds it and the scorer that reads its transition scores.
///
/// The network must emit `(T, 1, C * NZ)` scores per chunk for the
/// configured alphabet and state length; this is checked at construction.
pub struct CrfBasecaller<N: ExecutableNetwork> {
    network: N,
    scheduler: BatchInferenceScheduler,
    scorer: CrfScorer,
}

impl<N: ExecutableNetwork> CrfBasecaller<N> {
    pub fn new(network: N, config: &CrfConfig) -> Result<Self> {
        let scorer = CrfScorer::new(config)?;
        check_channels(&network, scorer.n_score(), "network scores")?;
        info!(
            alphabet = %config.alphabet,
            state_len = config.state_len,
            slots = network.num_slots(),
            "basecaller ready"
        );
        Ok(Self {
            network,
            scheduler: BatchInferenceScheduler::new(),
            scorer,
        })
    }

    pub fn scorer(&self) -> &CrfScorer {
        &self.scorer
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn stats(&self) -> &SchedulerStats {
        self.scheduler.stats()
    }

    /// Transition scores `(T, N, C * NZ)` of every chunk of `batch`, on the host.
    pub async fn call(&mut self, batch: &N::Tensor) -> Result<Tensor> {
        let output = self.scheduler.run(&mut self.network, batch).await?;
        host_scores(&output)
    }

    /// Per-sequence log-partition of a score tensor.
    pub fn log_z(&self, scores: &Tensor) -> Result<Tensor> {
        self.scorer.log_z::<Log>(scores)
    }

    /// Generic form of [`log_z`](Self::log_z) over any semiring.
    pub fn log_z_in<S: Semiring>(&self, scores: &Tensor) -> Result<Tensor> {
        self.scorer.log_z::<S>(scores)
    }

    pub fn posteriors(&self, scores: &Tensor) -> Result<Tensor> {
        self.scorer.posteriors(scores)
    }

    pub fn decode(&self, scores: &Tensor) -> Result<Vec<String>> {
        self.scorer.decode(scores)
    }

    /// Run the network over `batch` and decode the best path of every chunk.
    pub async fn basecall(&mut self, batch: &N::Tensor) -> Result<Vec<String>> {
        let scores = self.call(batch).await?;
        self.decode(&scores)
    }
}

/// A CTC basecaller: the same scheduled network path as [`CrfBasecaller`],
/// with per-step label scores `(T, 1, L)` over a blank plus the alphabet.
///
/// No transition structure is involved; decoding is greedy.
pub struct CtcBasecaller<N: ExecutableNetwork> {
    network: N,
    scheduler: BatchInferenceScheduler,
    alphabet: Vec<char>,
}

impl<N: ExecutableNetwork> CtcBasecaller<N> {
    /// # Parameters
    /// * `network` - Emits one score per label of `alphabet` at every step
    /// * `alphabet` - Labels, blank first, e.g. `"NACGT"`
    pub fn new(network: N, alphabet: &str) -> Result<Self> {
        let alphabet: Vec<char> = alphabet.chars().collect();
        if alphabet.len() < 2 {
            return Err(ConfigError::InvalidModel {
                n_base: alphabet.len().saturating_sub(1),
                state_len: 0,
                reason: "a CTC alphabet needs a blank and at least one base",
            }
            .into());
        }
        check_channels(&network, alphabet.len(), "network labels")?;
        info!(labels = alphabet.len(), slots = network.num_slots(), "ctc basecaller ready");
        Ok(Self {
            network,
            scheduler: BatchInferenceScheduler::new(),
            alphabet,
        })
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn stats(&self) -> &SchedulerStats {
        self.scheduler.stats()
    }

    /// Raw network output of every chunk of `batch`, joined in batch order.
    pub async fn call(&mut self, batch: &N::Tensor) -> Result<N::Tensor> {
        self.scheduler.run(&mut self.network, batch).await
    }

    /// Greedy CTC decoding of `(T, N, L)` label scores: the best label per
    /// step, repeats collapsed, blanks dropped.
    pub fn decode(&self, scores: &Tensor) -> Result<Vec<String>> {
        let (steps, batch, labels) = scores.dims3("ctc decode")?;
        if labels != self.alphabet.len() {
            return Err(ConfigError::ShapeMismatch {
                op: "ctc decode",
                expected: vec![steps, batch, self.alphabet.len()],
                actual: scores.shape().to_vec(),
            }
            .into());
        }
        let data = scores.as_slice();
        let calls = (0..batch)
            .map(|n| {
                let mut call = String::new();
                let mut previous = 0;
                for t in 0..steps {
                    let from = (t * batch + n) * labels;
                    let label = argmax(&data[from..from + labels]);
                    if label != 0 && label != previous {
                        call.push(self.alphabet[label]);
                    }
                    previous = label;
                }
                call
            })
            .collect();
        Ok(calls)
    }

    /// Run the network over `batch` and decode every chunk.
    pub async fn basecall(&mut self, batch: &N::Tensor) -> Result<Vec<String>> {
        let output = self.call(batch).await?;
        self.decode(&host_scores(&output)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::backend::mock::{Completion, MockNetwork};
    use crate::backend::{ChunkModel, TaskPoolNetwork};
    use crate::crf::Max;
    use crate::error::BackendError;

    /// Two bases, one-base states: edge `(c, z)` at `c * 3 + z`.
    fn config() -> CrfConfig {
        CrfConfig {
            alphabet: "NAC".to_string(),
            state_len: 1,
        }
    }

    /// Even chunks follow 0 -> 1 (A), stay, 1 -> 0 (C); odd chunks stay in 0.
    struct ScriptedEncoder {
        channels: usize,
    }

    #[async_trait]
    impl ChunkModel for ScriptedEncoder {
        type Tensor = Tensor;

        async fn forward(&self, input: Tensor) -> Result<Tensor, BackendError> {
            let mut scores = vec![0.0; 3 * self.channels];
            let path = if input.as_slice()[0] as usize % 2 == 0 { [4, 3, 2] } else { [0, 0, 0] };
            for (t, edge) in path.into_iter().enumerate() {
                scores[t * self.channels + edge] = 5.0;
            }
            Tensor::new(scores, [3, 1, self.channels]).map_err(|e| BackendError::Inference(e.to_string()))
        }

        fn output_shape(&self) -> Vec<usize> {
            vec![3, 1, self.channels]
        }
    }

    /// Label scores over `"NAC"`: chunk `i` emits A, A, blank, A, C when even
    /// and only blanks when odd, as a `(1, T, 1, L)` output.
    struct ScriptedCtc;

    #[async_trait]
    impl ChunkModel for ScriptedCtc {
        type Tensor = Tensor;

        async fn forward(&self, input: Tensor) -> Result<Tensor, BackendError> {
            let path = if input.as_slice()[0] as usize % 2 == 0 { [1, 1, 0, 1, 2] } else { [0; 5] };
            let mut scores = vec![0.0; 5 * 3];
            for (t, label) in path.into_iter().enumerate() {
                scores[t * 3 + label] = 1.0;
            }
            Tensor::new(scores, [1, 5, 1, 3]).map_err(|e| BackendError::Inference(e.to_string()))
        }

        fn output_shape(&self) -> Vec<usize> {
            vec![1, 5, 1, 3]
        }
    }

    fn batch(chunks: usize) -> Tensor {
        Tensor::new((0..chunks).map(|i| i as f32).collect(), [chunks, 1, 1]).unwrap()
    }

    #[tokio::test]
    async fn test_basecall() {
        let network = TaskPoolNetwork::new(ScriptedEncoder { channels: 6 }, 2);
        let mut caller = CrfBasecaller::new(network, &config()).unwrap();
        let calls = caller.basecall(&batch(5)).await.unwrap();
        assert_eq!(calls, vec!["AC", "", "AC", "", "AC"]);
        assert_eq!(caller.stats().harvests, vec![1; 5]);
    }

    #[tokio::test]
    async fn test_scores_feed_the_scorer() {
        let network = TaskPoolNetwork::new(ScriptedEncoder { channels: 6 }, 3);
        let mut caller = CrfBasecaller::new(network, &config()).unwrap();
        let scores = caller.call(&batch(4)).await.unwrap();
        assert_eq!(scores.shape(), &[3, 4, 6]);

        let best = caller.log_z_in::<Max>(&scores).unwrap();
        assert!(best.as_slice().iter().all(|&v| v == 15.0));
        let total = caller.log_z(&scores).unwrap();
        assert!(total.as_slice().iter().zip(best.as_slice()).all(|(t, b)| t >= b));
        assert_eq!(caller.posteriors(&scores).unwrap().shape(), scores.shape());
    }

    #[test]
    fn test_rejects_network_with_wrong_score_width() {
        let network = TaskPoolNetwork::new(ScriptedEncoder { channels: 5 }, 1);
        assert!(CrfBasecaller::new(network, &config()).is_err());
    }

    #[tokio::test]
    async fn test_ctc_basecall_over_rank_four_outputs() {
        let network = TaskPoolNetwork::new(ScriptedCtc, 2);
        let mut caller = CtcBasecaller::new(network, "NAC").unwrap();
        let output = caller.call(&batch(3)).await.unwrap();
        assert_eq!(output.shape(), &[1, 5, 3, 3]);

        let calls = caller.basecall(&batch(3)).await.unwrap();
        assert_eq!(calls, vec!["AAC", "", "AAC"]);
        assert_eq!(caller.stats().harvests, vec![1; 3]);
    }

    #[test]
    fn test_ctc_decode_collapses_repeats() {
        let caller = CtcBasecaller::new(MockNetwork::new(1, Completion::Fifo), "NAC").unwrap();
        // best labels over time: A A C C blank C
        let labels = [1, 1, 2, 2, 0, 2];
        let mut data = vec![0.0; 6 * 3];
        for (t, label) in labels.into_iter().enumerate() {
            data[t * 3 + label] = 2.0;
        }
        let scores = Tensor::new(data, [6, 1, 3]).unwrap();
        assert_eq!(caller.decode(&scores).unwrap(), vec!["ACC"]);
        assert!(caller.decode(&Tensor::zeros([6, 1, 4])).is_err());
    }

    #[test]
    fn test_ctc_rejects_mismatched_alphabet() {
        assert!(CtcBasecaller::new(MockNetwork::new(1, Completion::Fifo), "NACGT").is_err());
        assert!(CtcBasecaller::new(MockNetwork::new(1, Completion::Fifo), "N").is_err());
    }
}
