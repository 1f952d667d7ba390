//! # CTC-CRF scoring
//!
//! Dynamic programming over the state graph of a CTC-CRF basecaller.
//!
//! A model with an alphabet of `n_base` bases and a state length `L` has
//! `C = n_base^L` states, one per window of the last `L` emitted bases, and
//! `NZ = n_base + 1` edges entering every state: a stay and one move per
//! base. A network emits, for every time step and sequence, one score per
//! edge; the CRF turns those into sequence-level quantities:
//!
//! - [`TransitionIndex`] - the validated edge table and its transpose
//! - [`Semiring`] - [`Log`] for partition functions, [`Max`] for best paths
//! - [`scan()`] - the forward recursion shared by both directions
//! - [`LogZ`] - the log-partition with a closed-form gradient
//! - [`CrfScorer`] - the user-facing scorer and decoder
//!
//! All potentials are log-domain `f32`. Impossible states are represented by
//! the finite sentinel [`LOG_ZERO`] rather than `-inf`.

pub mod index;
pub mod semiring;
pub mod scan;
pub mod log_z;
pub mod scorer;

pub use index::{MAX_TRANSITIONS, TransitionIndex};
pub use semiring::{LOG_ZERO, Log, Max, Semiring};
pub use scan::scan;
pub use log_z::LogZ;
pub use scorer::CrfScorer;
