use std::fmt;
use crate::error::BackendError;

/// Identifier of one inference slot of an
/// [`ExecutableNetwork`](crate::backend::ExecutableNetwork).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl SlotId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the scheduler last started on a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    /// Nothing started yet, or the last output was already harvested.
    #[default]
    Idle,
    /// Holds (or will hold) the output of batch position `i`.
    Busy(usize),
}

/// Slot-to-batch-position bookkeeping for one batch.
///
/// Every slot follows `Idle -> Busy(i) -> Idle`: [`assign`](Self::assign)
/// records that batch position `i` was submitted on an idle slot, and
/// [`harvested`](Self::harvested) returns the slot to `Idle` once position
/// `i`'s output has been read. A slot holding an unharvested output can not
/// be assigned again.
#[derive(Debug, Clone)]
pub struct SlotTable {
    states: Vec<SlotState>,
}

impl SlotTable {
    /// Create a table with every slot `Idle`.
    ///
    /// # Parameters
    /// * `slots` - Size of the network's slot pool
    pub fn new(slots: usize) -> Self {
        Self {
            states: vec![SlotState::Idle; slots],
        }
    }

    /// Number of slots tracked.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Current state of `slot`.
    ///
    /// # Returns
    /// `None` if `slot` is outside the table
    pub fn state(&self, slot: SlotId) -> Option<SlotState> {
        self.states.get(slot.index()).copied()
    }

    /// Batch position whose output `slot` still holds, if any.
    pub fn pending(&self, slot: SlotId) -> Option<usize> {
        match self.state(slot) {
            Some(SlotState::Busy(index)) => Some(index),
            _ => None,
        }
    }

    /// Mark an idle `slot` busy with batch position `index`.
    pub fn assign(&mut self, slot: SlotId, index: usize) -> Result<(), BackendError> {
        let state = self.states.get_mut(slot.index()).ok_or_else(|| BackendError::Submit {
            slot,
            reason: "slot is outside the pool".to_string(),
        })?;
        match *state {
            SlotState::Idle => {
                *state = SlotState::Busy(index);
                Ok(())
            }
            SlotState::Busy(previous) => Err(BackendError::Submit {
                slot,
                reason: format!("output of position {previous} has not been harvested"),
            }),
        }
    }

    /// Return a busy `slot` to `Idle` after its output was read.
    ///
    /// # Returns
    /// The batch position the slot held
    pub fn harvested(&mut self, slot: SlotId) -> Result<usize, BackendError> {
        if let Some(state) = self.states.get_mut(slot.index()) {
            if let SlotState::Busy(index) = *state {
                *state = SlotState::Idle;
                return Ok(index);
            }
        }
        Err(BackendError::Output {
            slot,
            reason: "slot holds no unharvested output".to_string(),
        })
    }

    /// Slots still holding an unharvested output.
    pub fn busy(&self) -> impl Iterator<Item = (SlotId, usize)> + '_ {
        self.states.iter().enumerate().filter_map(|(slot, state)| match state {
            SlotState::Busy(index) => Some((SlotId::new(slot), *index)),
            SlotState::Idle => None,
        })
    }
}
