use tracing::{debug, info, warn};
use crate::backend::{Backend, ExecutableNetwork, WaitFor};
use crate::error::{BackendError, ConfigError, Result};
use crate::tensor::constant::{BATCH_DIM, CHUNK_DIM};
use super::slot::{SlotId, SlotTable};

/// Counters of the last batch run by a [`BatchInferenceScheduler`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// `wait(One)` calls made because no slot was idle.
    pub blocking_waits: usize,
    /// `wait(All)` calls made after the last submission.
    pub drains: usize,
    pub submissions: usize,
    /// Submissions per slot.
    pub slot_assignments: Vec<usize>,
    /// Harvests per batch position.
    pub harvests: Vec<usize>,
}

impl SchedulerStats {
    fn new(slots: usize, chunks: usize) -> Self {
        Self {
            slot_assignments: vec![0; slots],
            harvests: vec![0; chunks],
            ..Default::default()
        }
    }
}

/// Runs a chunk-major batch through a fixed pool of inference slots.
///
/// Chunk `i` is submitted on the first idle slot; when every slot is busy the
/// scheduler blocks until one request completes. A slot's previous output is
/// harvested right before the slot is reused, and the remaining outputs after
/// a final wait for all requests. Completion order never affects the result:
/// output column `i` is always chunk `i`'s output.
///
/// The scheduler is driven by a single task and holds no locks. Any backend
/// failure aborts the batch without returning partial output; requests still
/// in flight are drained first, so the network is quiescent when
/// [`run`](Self::run) returns.
#[derive(Debug, Clone, Default)]
pub struct BatchInferenceScheduler {
    stats: SchedulerStats,
}

impl BatchInferenceScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters of the most recent call to [`run`](Self::run).
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Run every chunk of `batch` through `network`.
    ///
    /// # Parameters
    /// * `network` - The slot pool to run on
    /// * `batch` - `N` chunks stacked along dimension `0`
    ///
    /// # Returns
    /// The outputs joined along the network's batch dimension: `(T, N, C)`
    /// for `(T, 1, C)` outputs, `(1, T, N, C)` for `(1, T, 1, C)` outputs
    pub async fn run<N>(&mut self, network: &mut N, batch: &N::Tensor) -> Result<N::Tensor>
    where
        N: ExecutableNetwork + ?Sized,
    {
        match self.run_batch(network, batch).await {
            Ok(output) => Ok(output),
            Err(e) => {
                warn!(error = %e, "batch aborted, draining in-flight requests");
                if let Err(drain) = network.wait(WaitFor::All).await {
                    warn!(error = %drain, "drain after abort failed");
                }
                Err(e)
            }
        }
    }

    async fn run_batch<N>(&mut self, network: &mut N, batch: &N::Tensor) -> Result<N::Tensor>
    where
        N: ExecutableNetwork + ?Sized,
    {
        let out_shape = network.output_shape();
        let batch_dim = output_batch_dim(&out_shape)?;
        let chunks = batch.vectorize_dim(CHUNK_DIM)?;
        let mut columns = vec![None; chunks.len()];
        let mut slots = SlotTable::new(network.num_slots());
        self.stats = SchedulerStats::new(slots.len(), chunks.len());
        info!(chunks = chunks.len(), slots = slots.len(), output = ?out_shape, "running batch");

        for (index, chunk) in chunks.into_iter().enumerate() {
            let slot = match network.idle_slot() {
                Some(slot) => slot,
                None => {
                    debug!(index, "all slots busy, waiting for a completion");
                    self.stats.blocking_waits += 1;
                    network.wait(WaitFor::One).await?;
                    network.idle_slot().ok_or(BackendError::NoIdleSlot)?
                }
            };

            self.harvest(network, &mut slots, slot, &out_shape, &mut columns)?;
            slots.assign(slot, index)?;
            network.submit(slot, chunk)?;
            self.stats.submissions += 1;
            self.stats.slot_assignments[slot.index()] += 1;
            debug!(%slot, index, "chunk submitted");
        }

        self.stats.drains += 1;
        network.wait(WaitFor::All).await?;
        let busy: Vec<SlotId> = slots.busy().map(|(slot, _)| slot).collect();
        for slot in busy {
            self.harvest(network, &mut slots, slot, &out_shape, &mut columns)?;
        }

        if let Some((index, &count)) = self.stats.harvests.iter().enumerate().find(|&(_, &c)| c != 1) {
            return Err(BackendError::Harvest { index, count }.into());
        }
        let columns: Vec<N::Tensor> = columns.into_iter().flatten().collect();
        let output = if columns.is_empty() {
            let mut shape = out_shape;
            shape[batch_dim] = 0;
            batch.new_zeros(&shape)?
        } else {
            <N::Tensor as Backend>::cat(&columns, batch_dim)?
        };
        info!(
            chunks = columns.len(),
            blocking_waits = self.stats.blocking_waits,
            submissions = self.stats.submissions,
            "batch complete"
        );
        Ok(output)
    }

    /// Read the output `slot` holds, if any, into its batch column and
    /// return the slot to `Idle`.
    fn harvest<N>(
        &mut self,
        network: &mut N,
        slots: &mut SlotTable,
        slot: SlotId,
        out_shape: &[usize],
        columns: &mut [Option<N::Tensor>],
    ) -> Result<()>
    where
        N: ExecutableNetwork + ?Sized,
    {
        let Some(index) = slots.pending(slot) else {
            return Ok(());
        };
        let output = network.read_output(slot)?;
        let shape = output.shape();
        if shape != out_shape {
            return Err(ConfigError::ShapeMismatch {
                op: "harvested output",
                expected: out_shape.to_vec(),
                actual: shape,
            }
            .into());
        }
        slots.harvested(slot)?;
        columns[index] = Some(output);
        self.stats.harvests[index] += 1;
        debug!(%slot, index, "output harvested");
        Ok(())
    }
}

/// Dimension of a request's output that holds the batch: `(T, 1, C)` or
/// `(1, T, 1, C)`.
fn output_batch_dim(shape: &[usize]) -> Result<usize> {
    match shape {
        &[_, 1, _] => Ok(BATCH_DIM),
        &[1, _, 1, _] => Ok(BATCH_DIM + 1),
        other => Err(ConfigError::ShapeMismatch {
            op: "network output",
            expected: vec![0, 1, 0],
            actual: other.to_vec(),
        }
        .into()),
    }
}
