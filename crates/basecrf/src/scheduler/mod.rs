//! # Batch scheduling
//!
//! Splits a batch of independent input chunks across the asynchronous
//! inference slots of an [`ExecutableNetwork`](crate::backend::ExecutableNetwork)
//! and reassembles the outputs in batch order.
//!
//! ## Invariants
//!
//! - Output column `i` holds the output of input chunk `i`, whatever order
//!   the requests complete in
//! - Every column is written exactly once
//! - Each slot cycles `Idle -> Busy(i) -> Idle`; its output is harvested
//!   before the slot is reused
//! - A failed batch leaves no request running

mod slot;
mod batch;

pub use slot::{SlotId, SlotState, SlotTable};
pub use batch::{BatchInferenceScheduler, SchedulerStats};
