//! # Constants with reserved meanings in basecrf

/// Score, potential and output tensors are time-major; dimension `0` is time
pub const TIME_DIM: usize = 0;

/// Score, potential and output tensors carry the batch in dimension `1`
pub const BATCH_DIM: usize = 1;

/// Raw input batches handed to the scheduler are chunk-major; dimension `0` indexes chunks
pub const CHUNK_DIM: usize = 0;
