use std::collections::VecDeque;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::backend::{ExecutableNetwork, WaitFor};
use crate::error::BackendError;
use crate::scheduler::SlotId;
use crate::tensor::Tensor;

/// Order in which in-flight requests complete on a blocking wait.
#[derive(Debug, Clone, Copy)]
pub enum Completion {
    /// Oldest submission first.
    Fifo,
    /// Newest submission first.
    Reverse,
    /// Uniformly random, seeded.
    Random(u64),
}

#[derive(Debug, Clone)]
enum MockSlot {
    Idle,
    Pending(Tensor),
    Done(Tensor),
}

/// Deterministic in-memory network for scheduler tests.
///
/// Requests only complete inside [`wait`](ExecutableNetwork::wait), in the
/// order given by the [`Completion`] policy. The output of a chunk whose
/// first value is `v` is `v * 100 + t * C + c` at `(t, 0, c)`.
pub struct MockNetwork {
    slots: Vec<MockSlot>,
    in_flight: VecDeque<usize>,
    completion: Completion,
    rng: StdRng,
    output_shape: Vec<usize>,
    pub(crate) fail_wait: Option<usize>,
    pub(crate) stall: bool,
    pub(crate) waits_one: usize,
    pub(crate) waits_all: usize,
    pub(crate) submissions: Vec<(SlotId, usize)>,
}

impl MockNetwork {
    pub fn new(slots: usize, completion: Completion) -> Self {
        let seed = match completion {
            Completion::Random(seed) => seed,
            _ => 0,
        };
        Self {
            slots: vec![MockSlot::Idle; slots],
            in_flight: VecDeque::new(),
            completion,
            rng: StdRng::seed_from_u64(seed),
            output_shape: vec![STEPS, 1, CHANNELS],
            fail_wait: None,
            stall: false,
            waits_one: 0,
            waits_all: 0,
            submissions: Vec::new(),
        }
    }

    pub fn with_output_shape(mut self, shape: Vec<usize>) -> Self {
        self.output_shape = shape;
        self
    }

    fn complete(&mut self, slot: usize) {
        if let MockSlot::Pending(input) = &self.slots[slot] {
            let value = input.as_slice().first().copied().unwrap_or(0.0);
            let output = Tensor::new(expected_column(value), self.output_shape.clone()).unwrap();
            self.slots[slot] = MockSlot::Done(output);
        }
    }

    /// Requests submitted but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Fails the `fail_wait`-th wait call, once.
    fn check_failure(&mut self, what: WaitFor) -> Result<(), BackendError> {
        let calls = self.waits_one + self.waits_all;
        if self.fail_wait == Some(calls) {
            self.fail_wait = None;
            return Err(BackendError::Wait {
                what: what.as_str(),
                status: "GENERAL_ERROR".to_string(),
            });
        }
        Ok(())
    }
}

/// Time steps of every mock output.
pub const STEPS: usize = 2;
/// Channels of every mock output.
pub const CHANNELS: usize = 3;

/// Output the mock produces for a chunk whose first value is `value`.
pub fn expected_column(value: f32) -> Vec<f32> {
    (0..STEPS * CHANNELS).map(|i| value * 100.0 + i as f32).collect()
}

/// A chunk-major batch whose chunk `i` is filled with `i`.
pub fn numbered_batch(chunks: usize, len: usize) -> Tensor {
    let data = (0..chunks).flat_map(|i| std::iter::repeat_n(i as f32, len)).collect();
    Tensor::new(data, [chunks, 1, len]).unwrap()
}

#[async_trait]
impl ExecutableNetwork for MockNetwork {
    type Tensor = Tensor;

    fn num_slots(&self) -> usize {
        self.slots.len()
    }

    fn output_shape(&self) -> Vec<usize> {
        self.output_shape.clone()
    }

    fn idle_slot(&mut self) -> Option<SlotId> {
        self.slots
            .iter()
            .position(|s| !matches!(s, MockSlot::Pending(_)))
            .map(SlotId::new)
    }

    fn submit(&mut self, slot: SlotId, input: Tensor) -> Result<(), BackendError> {
        let index = input.as_slice().first().copied().unwrap_or(0.0) as usize;
        let reason = match self.slots.get(slot.index()) {
            Some(MockSlot::Pending(_)) => Some("request in flight"),
            None => Some("unknown slot"),
            Some(_) => None,
        };
        if let Some(reason) = reason {
            return Err(BackendError::Submit {
                slot,
                reason: reason.to_string(),
            });
        }
        self.slots[slot.index()] = MockSlot::Pending(input);
        self.in_flight.push_back(slot.index());
        self.submissions.push((slot, index));
        Ok(())
    }

    async fn wait(&mut self, what: WaitFor) -> Result<(), BackendError> {
        self.check_failure(what)?;
        match what {
            WaitFor::One => {
                self.waits_one += 1;
                if self.stall || self.in_flight.is_empty() {
                    return Ok(());
                }
                let position = match self.completion {
                    Completion::Fifo => 0,
                    Completion::Reverse => self.in_flight.len() - 1,
                    Completion::Random(_) => self.rng.random_range(0..self.in_flight.len()),
                };
                if let Some(slot) = self.in_flight.remove(position) {
                    self.complete(slot);
                }
            }
            WaitFor::All => {
                self.waits_all += 1;
                while let Some(slot) = self.in_flight.pop_front() {
                    self.complete(slot);
                }
            }
        }
        Ok(())
    }

    fn read_output(&mut self, slot: SlotId) -> Result<Tensor, BackendError> {
        match self.slots.get(slot.index()) {
            Some(MockSlot::Done(output)) => Ok(output.clone()),
            _ => Err(BackendError::Output {
                slot,
                reason: "no completed request".to_string(),
            }),
        }
    }
}
