use super::Backend;
use candle_core::Tensor;
use crate::error::{ConfigError, Result};

impl Backend for Tensor {
    fn shape(&self) -> Vec<usize> {
        self.dims().to_vec()
    }

    fn cat(tensors: &[Self], dim: usize) -> Result<Self> {
        if tensors.is_empty() {
            return Err(ConfigError::ShapeMismatch {
                op: "cat",
                expected: vec![1],
                actual: vec![0],
            }
            .into());
        }
        Ok(Tensor::cat(tensors, dim)?)
    }

    fn slice(&self, dimension: usize, start: usize, len: usize) -> Result<Self> {
        Ok(self.narrow(dimension, start, len)?)
    }

    fn new_zeros(&self, shape: &[usize]) -> Result<Self> {
        Ok(Tensor::zeros(shape.to_vec(), self.dtype(), self.device())?)
    }

    fn to_host(&self) -> Result<crate::tensor::Tensor> {
        crate::tensor::Tensor::try_from(self)
    }
}
