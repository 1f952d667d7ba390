//! Error types shared by the scorer, the scheduler and the backends.
//!
//! Nothing in this crate retries or swallows an error: a failed score
//! computation or batch is reported to the caller as a whole.

use crate::scheduler::SlotId;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error returned by scorer and scheduler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The model configuration or a tensor shape is inconsistent.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The execution backend failed while a batch was in flight.
    #[error("backend execution error: {0}")]
    Backend(#[from] BackendError),

    /// Conversion to or from a candle tensor failed.
    #[cfg(feature = "candle")]
    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),
}

/// Invalid model parameters, tensor shapes or transition tables.
///
/// These are detected eagerly, at construction time where possible, and are
/// never recoverable by retrying the same call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// `n_base` or `state_len` cannot describe a state space.
    #[error("invalid model parameters: n_base={n_base}, state_len={state_len}: {reason}")]
    InvalidModel {
        n_base: usize,
        state_len: usize,
        reason: &'static str,
    },

    /// A transition table entry addresses a state outside the state space.
    #[error("transition ({state}, {slot}) has source {source_state}, outside a state space of {n_states}")]
    IndexOutOfRange {
        state: usize,
        slot: usize,
        source_state: usize,
        n_states: usize,
    },

    /// A transition table is ragged or its states have differing out-degree.
    #[error("irregular transition table: {0}")]
    IrregularIndex(String),

    /// A tensor does not have the shape an operation requires.
    #[error("shape mismatch in {op}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        op: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Reading or parsing a configuration file failed.
    #[error("{0}")]
    Parse(String),
}

/// Failures reported by an [`ExecutableNetwork`](crate::backend::ExecutableNetwork).
///
/// Any of these aborts the current batch; no partial output is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    /// A blocking wait returned a non-success status.
    #[error("wait for {what} requests failed: {status}")]
    Wait { what: &'static str, status: String },

    /// Starting a request on a slot failed.
    #[error("submit to slot {slot} failed: {reason}")]
    Submit { slot: SlotId, reason: String },

    /// The backend reported a completion but still has no idle slot.
    #[error("no idle slot after a completed wait")]
    NoIdleSlot,

    /// A slot's output buffer could not be read.
    #[error("reading output of slot {slot} failed: {reason}")]
    Output { slot: SlotId, reason: String },

    /// The unit of work itself failed.
    #[error("inference failed: {0}")]
    Inference(String),

    /// A batch position was never (or more than once) harvested.
    #[error("batch position {index} harvested {count} times")]
    Harvest { index: usize, count: usize },
}
