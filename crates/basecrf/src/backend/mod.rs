//! # Execution backends
//!
//! The [`ExecutableNetwork`] trait is the boundary between the batch
//! scheduler and whatever actually runs the network: a compiled graph on an
//! accelerator, a remote service, or the in-process [`TaskPoolNetwork`].
//! Network conversion and compilation happen outside this crate; a backend
//! only has to expose a pool of slots that accept one input chunk each.
//!
//! The scheduler never looks inside a tensor: it splits and joins batches
//! through the [`Backend`] trait, so inputs and outputs stay on the device
//! the network runs on.
//!
//! ## Feature Flags
//!
//! - `candle`: Implements [`Backend`] for candle's `Tensor`
//! - `burn`: Implements [`Backend`] for burn float tensors of rank 1 to 6
//!
//! The host [`Tensor`](crate::Tensor) always implements it.
//!
//! ## Usage
//!
//! 1. Implement [`ChunkModel`] for a single-chunk forward pass, or
//!    [`ExecutableNetwork`] directly for an engine with its own request pool
//! 2. Hand the network to a [`BatchInferenceScheduler`](crate::scheduler::BatchInferenceScheduler)
//!    or a [`CrfBasecaller`](crate::model::CrfBasecaller)

mod core_trait;
mod dense;
mod task_pool;

#[cfg_attr(docsrs, doc(cfg(feature = "candle")))]
#[cfg(feature = "candle")]
/// Candle tensor backend implementation.
///
/// This module is only available when the `candle` feature flag is enabled.
pub mod candle;

#[cfg_attr(docsrs, doc(cfg(feature = "burn")))]
#[cfg(feature = "burn")]
/// Burn tensor backend implementation.
///
/// This module is only available when the `burn` feature flag is enabled.
pub mod burn;

pub use core_trait::*;
pub use task_pool::TaskPoolNetwork;

#[cfg(test)]
/// Mock network with scripted completion order.
pub(crate) mod mock;
