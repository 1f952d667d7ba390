//! # Tensor
//!
//! A minimal dense `f32` tensor used at every seam of the crate: transition
//! scores, potential tables, chunk inputs and batch outputs.
//!
//! Storage is contiguous and row-major. The scorer walks the raw slices
//! directly; conversions to and from candle or burn tensors are available
//! behind the `candle` and `burn` features.

use std::fmt;
use crate::error::{ConfigError, Result};

pub mod constant;
pub(crate) mod operations;

#[cfg_attr(docsrs, doc(cfg(feature = "candle")))]
#[cfg(feature = "candle")]
/// Conversions between [`Tensor`] and candle's `Tensor`.
pub mod candle;

#[cfg_attr(docsrs, doc(cfg(feature = "burn")))]
#[cfg(feature = "burn")]
/// Conversions between [`Tensor`] and burn tensors of any backend.
pub mod burn;

/// Dense, row-major `f32` tensor with a dynamic shape.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// Wrap `data` with the given shape, checking the element count.
    pub fn new(data: Vec<f32>, shape: impl Into<Vec<usize>>) -> Result<Self> {
        let shape = shape.into();
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(ConfigError::ShapeMismatch {
                op: "tensor",
                expected: shape,
                actual: vec![data.len()],
            }
            .into());
        }
        Ok(Self { shape, data })
    }

    /// A tensor of the given shape with every element set to `value`.
    pub fn full(shape: impl Into<Vec<usize>>, value: f32) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![value; len],
        }
    }

    /// A tensor of the given shape filled with `0.0`.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        Self::full(shape, 0.0)
    }

    /// Size of every dimension, outermost first.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    pub fn elem_count(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consume the tensor, returning its row-major elements.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// The three dimensions of a rank 3 tensor.
    pub fn dims3(&self, op: &'static str) -> Result<(usize, usize, usize)> {
        match self.shape.as_slice() {
            &[a, b, c] => Ok((a, b, c)),
            other => Err(ConfigError::ShapeMismatch {
                op,
                expected: vec![0, 0, 0],
                actual: other.to_vec(),
            }
            .into()),
        }
    }

    /// The four dimensions of a rank 4 tensor.
    pub fn dims4(&self, op: &'static str) -> Result<(usize, usize, usize, usize)> {
        match self.shape.as_slice() {
            &[a, b, c, d] => Ok((a, b, c, d)),
            other => Err(ConfigError::ShapeMismatch {
                op,
                expected: vec![0, 0, 0, 0],
                actual: other.to_vec(),
            }
            .into()),
        }
    }

    /// Same data under a new shape with the same element count.
    pub fn reshape(self, shape: impl Into<Vec<usize>>) -> Result<Self> {
        let shape = shape.into();
        let expected: usize = shape.iter().product();
        if expected != self.data.len() {
            return Err(ConfigError::ShapeMismatch {
                op: "reshape",
                expected: shape,
                actual: self.shape,
            }
            .into());
        }
        Ok(Self { shape, data: self.data })
    }

    /// Element at a multi-dimensional index. Panics when out of bounds.
    pub fn get(&self, index: &[usize]) -> f32 {
        assert_eq!(index.len(), self.shape.len(), "index rank must match tensor rank");
        let offset = index
            .iter()
            .zip(self.shape.iter())
            .fold(0, |acc, (&i, &d)| {
                assert!(i < d, "index {i} out of bounds for dimension of size {d}");
                acc * d + i
            });
        self.data[offset]
    }

    /// Elements `start..start + len` of dimension `dim`, keeping the rank.
    pub fn narrow(&self, dim: usize, start: usize, len: usize) -> Result<Self> {
        let size = self.shape.get(dim).copied().unwrap_or(0);
        if dim >= self.rank() || start + len > size {
            return Err(ConfigError::ShapeMismatch {
                op: "narrow",
                expected: vec![start + len],
                actual: self.shape.clone(),
            }
            .into());
        }
        let inner: usize = self.shape[dim + 1..].iter().product();
        let outer: usize = self.shape[..dim].iter().product();
        let mut data = Vec::with_capacity(outer * len * inner);
        for o in 0..outer {
            let from = (o * size + start) * inner;
            data.extend_from_slice(&self.data[from..from + len * inner]);
        }
        let mut shape = self.shape.clone();
        shape[dim] = len;
        Ok(Self { shape, data })
    }

    /// Concatenate tensors that agree everywhere but in dimension `dim`.
    pub fn cat(tensors: &[Self], dim: usize) -> Result<Self> {
        let first = tensors.first().ok_or_else(|| ConfigError::ShapeMismatch {
            op: "cat",
            expected: vec![1],
            actual: vec![0],
        })?;
        if dim >= first.rank() {
            return Err(ConfigError::ShapeMismatch {
                op: "cat",
                expected: vec![dim + 1],
                actual: first.shape.clone(),
            }
            .into());
        }
        for t in tensors {
            let agrees = t.rank() == first.rank()
                && t.shape.iter().zip(&first.shape).enumerate().all(|(d, (a, b))| d == dim || a == b);
            if !agrees {
                return Err(ConfigError::ShapeMismatch {
                    op: "cat",
                    expected: first.shape.clone(),
                    actual: t.shape.clone(),
                }
                .into());
            }
        }

        let inner: usize = first.shape[dim + 1..].iter().product();
        let outer: usize = first.shape[..dim].iter().product();
        let mut shape = first.shape.clone();
        shape[dim] = tensors.iter().map(|t| t.shape[dim]).sum();
        let mut data = Vec::with_capacity(shape.iter().product());
        for o in 0..outer {
            for t in tensors {
                let block = t.shape[dim] * inner;
                data.extend_from_slice(&t.data[o * block..(o + 1) * block]);
            }
        }
        Ok(Self { shape, data })
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor({:?}, {} elements)", self.shape, self.data.len())
    }
}
