//! In-process execution engine running every slot as a tokio task.

use std::sync::Arc;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::select_all;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};
use crate::config::SchedulerConfig;
use crate::error::BackendError;
use crate::scheduler::SlotId;
use super::{ChunkModel, ExecutableNetwork, WaitFor};

type Request<T> = JoinHandle<Result<T, BackendError>>;

enum Slot<T> {
    Idle,
    Running(Request<T>),
    Complete(T),
    Failed(BackendError),
}

impl<T> Slot<T> {
    fn settle(result: Result<Result<T, BackendError>, JoinError>) -> Self {
        match result {
            Ok(Ok(output)) => Self::Complete(output),
            Ok(Err(e)) => Self::Failed(e),
            Err(e) => Self::Failed(BackendError::Inference(format!("request task failed: {e}"))),
        }
    }

    fn failure(&self) -> Option<&BackendError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// An [`ExecutableNetwork`] whose slots run a shared [`ChunkModel`] on the
/// current tokio runtime.
///
/// Each submission spawns one task. Completed tasks are reaped lazily by
/// [`idle_slot`](ExecutableNetwork::idle_slot) and eagerly by
/// [`wait`](ExecutableNetwork::wait). Tasks still running when the pool is
/// dropped are aborted.
pub struct TaskPoolNetwork<M: ChunkModel> {
    model: Arc<M>,
    slots: Vec<Slot<M::Tensor>>,
}

impl<M: ChunkModel> TaskPoolNetwork<M> {
    /// Create a pool running `model` on every slot.
    ///
    /// # Parameters
    /// * `model` - The model shared by all slots
    /// * `slots` - Size of the pool; `0` is raised to `1`
    pub fn new(model: M, slots: usize) -> Self {
        Self {
            model: Arc::new(model),
            slots: (0..slots.max(1)).map(|_| Slot::Idle).collect(),
        }
    }

    /// Build with the slot count resolved from the scheduler configuration.
    pub fn from_config(model: M, config: &SchedulerConfig) -> Self {
        Self::new(model, config.resolve_slots())
    }

    /// The shared model.
    pub fn model(&self) -> &Arc<M> {
        &self.model
    }

    /// Number of requests currently running.
    pub fn in_flight(&self) -> usize {
        self.slots.iter().filter(|s| matches!(s, Slot::Running(_))).count()
    }

    fn reap(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Slot::Running(handle) = slot {
                if handle.is_finished() {
                    if let Some(result) = handle.now_or_never() {
                        *slot = Slot::settle(result);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl<M: ChunkModel> ExecutableNetwork for TaskPoolNetwork<M> {
    type Tensor = M::Tensor;

    fn num_slots(&self) -> usize {
        self.slots.len()
    }

    fn output_shape(&self) -> Vec<usize> {
        self.model.output_shape()
    }

    fn idle_slot(&mut self) -> Option<SlotId> {
        self.reap();
        self.slots
            .iter()
            .position(|s| !matches!(s, Slot::Running(_)))
            .map(SlotId::new)
    }

    fn submit(&mut self, slot: SlotId, input: M::Tensor) -> Result<(), BackendError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| BackendError::Submit {
            slot,
            reason: e.to_string(),
        })?;
        let state = self.slots.get_mut(slot.index()).ok_or_else(|| BackendError::Submit {
            slot,
            reason: "slot is outside the pool".to_string(),
        })?;
        if matches!(state, Slot::Running(_)) {
            return Err(BackendError::Submit {
                slot,
                reason: "a request is still running".to_string(),
            });
        }

        let model = self.model.clone();
        *state = Slot::Running(runtime.spawn(async move { model.forward(input).await }));
        debug!(%slot, "request started");
        Ok(())
    }

    async fn wait(&mut self, what: WaitFor) -> Result<(), BackendError> {
        match what {
            WaitFor::One => {
                let (ids, running): (Vec<usize>, Vec<&mut Request<M::Tensor>>) = self
                    .slots
                    .iter_mut()
                    .enumerate()
                    .filter_map(|(i, s)| match s {
                        Slot::Running(handle) => Some((i, handle)),
                        _ => None,
                    })
                    .unzip();
                if running.is_empty() {
                    return Ok(());
                }
                let (result, position, pending) = select_all(running).await;
                drop(pending);
                let finished = ids[position];
                self.slots[finished] = Slot::settle(result);
                match self.slots[finished].failure() {
                    Some(e) => Err(BackendError::Wait {
                        what: what.as_str(),
                        status: e.to_string(),
                    }),
                    None => Ok(()),
                }
            }
            WaitFor::All => {
                let mut failure = None;
                for slot in self.slots.iter_mut() {
                    if let Slot::Running(handle) = slot {
                        let result = handle.await;
                        *slot = Slot::settle(result);
                        if failure.is_none() {
                            failure = slot.failure().cloned();
                        }
                    }
                }
                match failure {
                    Some(e) => Err(BackendError::Wait {
                        what: what.as_str(),
                        status: e.to_string(),
                    }),
                    None => Ok(()),
                }
            }
        }
    }

    fn read_output(&mut self, slot: SlotId) -> Result<M::Tensor, BackendError> {
        match self.slots.get(slot.index()) {
            Some(Slot::Complete(output)) => Ok(output.clone()),
            Some(Slot::Failed(e)) => Err(e.clone()),
            Some(Slot::Running(_)) => Err(BackendError::Output {
                slot,
                reason: "request is still running".to_string(),
            }),
            Some(Slot::Idle) | None => Err(BackendError::Output {
                slot,
                reason: "no request has completed on this slot".to_string(),
            }),
        }
    }
}

impl<M: ChunkModel> Drop for TaskPoolNetwork<M> {
    fn drop(&mut self) {
        for slot in &self.slots {
            if let Slot::Running(handle) = slot {
                warn!("aborting in-flight request on drop");
                handle.abort();
            }
        }
    }
}
