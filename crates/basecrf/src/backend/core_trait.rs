use std::fmt::{Debug, Display};
use async_trait::async_trait;
use crate::error::{BackendError, Result};
use crate::scheduler::SlotId;
use crate::tensor::Tensor;

/// The tensor operations the batch scheduler needs from an execution backend.
///
/// Implemented for the crate's dense [`Tensor`], and for candle and burn
/// tensors behind the `candle` and `burn` features. Operations never panic on
/// out-of-range arguments; they report a shape error instead.
pub trait Backend: Debug + Display + Clone + Send + Sync + 'static {
    /// Return the shape of this tensor
    fn shape(&self) -> Vec<usize>;

    /// Concatenate several tensors to each other along dimension `dim`, in the order supplied
    ///
    /// # Parameters
    /// * `tensors` - At least one tensor; all must agree outside `dim`
    /// * `dim` - The dimension to join along
    fn cat(tensors: &[Self], dim: usize) -> Result<Self>;

    /// Slice a given `dimension` from `start` to `start + len`, keeping the rank
    fn slice(&self, dimension: usize, start: usize, len: usize) -> Result<Self>;

    /// Slice a tensor into a vector of size `1` tensors along the supplied `dim`
    fn vectorize_dim(&self, dim: usize) -> Result<Vec<Self>> {
        let size = Backend::shape(self).get(dim).copied().unwrap_or(0);
        (0..size).map(|i| self.slice(dim, i, 1)).collect()
    }

    /// A zero-filled tensor of `shape` on the same device and with the same
    /// element type as `self`
    fn new_zeros(&self, shape: &[usize]) -> Result<Self>;

    /// Copy the tensor to the host as a dense `f32` [`Tensor`]
    fn to_host(&self) -> Result<Tensor>;
}

/// How many in-flight requests a blocking [`ExecutableNetwork::wait`] waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitFor {
    /// Return as soon as any one running request has completed.
    One,
    /// Return once every running request has completed.
    All,
}

impl WaitFor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::One => "one",
            Self::All => "all",
        }
    }
}

/// A compiled network with a fixed pool of asynchronous inference slots.
///
/// Each slot runs one single-chunk request at a time. A submitted request
/// runs in the background; its output stays readable on the slot until the
/// slot is submitted to again.
///
/// # Implementation Notes
///
/// Implementations should:
/// * Never block in [`submit`](Self::submit), [`idle_slot`](Self::idle_slot)
///   or [`read_output`](Self::read_output)
/// * Report a slot as idle once its request has completed, whether or not
///   its output has been read
/// * Report a failed request from [`wait`](Self::wait) or
///   [`read_output`](Self::read_output), never by silently dropping it
/// * Report from [`wait`](Self::wait) only requests that settled during that
///   call
#[async_trait]
pub trait ExecutableNetwork: Send {
    /// Tensor type of both the input chunks and the outputs.
    type Tensor: Backend;

    /// Size of the slot pool.
    fn num_slots(&self) -> usize;

    /// Shape of one request's output: `(T, 1, C)`, or `(1, T, 1, C)`.
    fn output_shape(&self) -> Vec<usize>;

    /// A slot with no request in flight, if any. Never blocks.
    fn idle_slot(&mut self) -> Option<SlotId>;

    /// Start a request for a single input chunk on an idle slot.
    fn submit(&mut self, slot: SlotId, input: Self::Tensor) -> Result<(), BackendError>;

    /// Block until one, or all, in-flight requests have completed.
    async fn wait(&mut self, what: WaitFor) -> Result<(), BackendError>;

    /// Output of the last request completed on `slot`.
    fn read_output(&mut self, slot: SlotId) -> Result<Self::Tensor, BackendError>;
}

/// A model that maps a single input chunk to its output in one pass.
///
/// The input carries a leading chunk dimension of size `1`; the output must
/// have the shape reported by [`output_shape`](Self::output_shape).
///
/// # Example
///
/// ```ignore
/// use basecrf::backend::ChunkModel;
/// use async_trait::async_trait;
///
/// struct Encoder {
///     weights: candle_core::Tensor,
/// }
///
/// #[async_trait]
/// impl ChunkModel for Encoder {
///     type Tensor = candle_core::Tensor;
///
///     async fn forward(&self, input: Self::Tensor) -> Result<Self::Tensor, BackendError> {
///         encode(&self.weights, input)
///     }
///
///     fn output_shape(&self) -> Vec<usize> {
///         vec![400, 1, 5120]
///     }
/// }
/// ```
#[async_trait]
pub trait ChunkModel: Send + Sync + 'static {
    /// Tensor type of both the input chunk and the output.
    type Tensor: Backend;

    /// Run the model over one chunk.
    ///
    /// # Parameters
    /// * `input` - A single chunk, leading dimension `1`
    ///
    /// # Returns
    /// The chunk's output, shaped as [`output_shape`](Self::output_shape)
    async fn forward(&self, input: Self::Tensor) -> Result<Self::Tensor, BackendError>;

    fn output_shape(&self) -> Vec<usize>;
}
