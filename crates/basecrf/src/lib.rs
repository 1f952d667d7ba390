//! # basecrf
//!
//! Batched CRF inference for nanopore basecalling: scores chunks of raw
//! signal on an asynchronous slot-based executor and reads sequence-level
//! quantities from the network's CTC-CRF transition scores.
//!
//! ## Overview
//!
//! A CRF basecaller's encoder emits, for every time step, one score per edge
//! of a fixed state graph. This crate provides the two halves around it:
//!
//! - A semiring dynamic-programming engine over that graph: the partition
//!   function, forward and backward potentials, a closed-form gradient
//!   (edge posteriors) and best-path decoding
//! - A batch scheduler that feeds independent input chunks through a fixed
//!   pool of asynchronous inference slots and reassembles the outputs in
//!   batch order
//!
//! ## Architecture
//!
//! ### Assumptions
//! Regardless of the execution backend, basecrf reserves dimensions with special meanings:
//!  - Score and output tensors are time-major: `0th` dimension is time, `1st` is the batch
//!  - Input batches handed to the scheduler are chunk-major: `0th` dimension is the chunk
//!
//! ### CRF
//!
//! [`crf::TransitionIndex`] describes the graph, [`crf::Semiring`] selects
//! between sum ([`crf::Log`]) and max ([`crf::Max`]) accumulation, and
//! [`crf::CrfScorer`] runs the scan in both directions.
//!
//! ### Backends
//!
//! The [`backend::ExecutableNetwork`] trait is the only thing the scheduler
//! knows about the network. [`backend::TaskPoolNetwork`] implements it on the
//! tokio runtime for any async [`backend::ChunkModel`]. Batches are split and
//! joined through the [`backend::Backend`] tensor trait, so the scheduler is
//! agnostic to where the tensors live.
//!
//! ### Models
//!
//! [`CrfBasecaller`] reads the joined output with the CRF scorer;
//! [`CtcBasecaller`] shares the scheduled path and decodes label scores
//! greedily.
//!
//! ## Features
//!
//! - **candle** - [`backend::Backend`] for candle tensors, and conversions to [`Tensor`]
//! - **burn** - [`backend::Backend`] for burn float tensors, and conversions to [`Tensor`]
//!

pub mod backend;
pub mod config;
pub mod crf;
pub mod error;
pub mod model;
pub mod scheduler;
pub mod tensor;

/// Constants for client reference
pub use tensor::constant;

pub use config::{BasecallerConfig, CrfConfig, SchedulerConfig};
pub use error::{BackendError, ConfigError, Error, Result};
pub use model::{CrfBasecaller, CtcBasecaller};
pub use tensor::Tensor;
