//! The host [`Tensor`] as a backend, for CPU models and tests.
use super::Backend;
use crate::error::Result;
use crate::tensor::Tensor;

impl Backend for Tensor {
    fn shape(&self) -> Vec<usize> {
        Tensor::shape(self).to_vec()
    }

    fn cat(tensors: &[Self], dim: usize) -> Result<Self> {
        Tensor::cat(tensors, dim)
    }

    fn slice(&self, dimension: usize, start: usize, len: usize) -> Result<Self> {
        self.narrow(dimension, start, len)
    }

    fn new_zeros(&self, shape: &[usize]) -> Result<Self> {
        Ok(Tensor::zeros(shape.to_vec()))
    }

    fn to_host(&self) -> Result<Tensor> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vectorize_dim() {
        let t = Tensor::new((0..6).map(|v| v as f32).collect(), [3, 1, 2]).unwrap();
        let chunks = t.vectorize_dim(0).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].as_slice(), &[4.0, 5.0]);
        assert_eq!(Backend::shape(&chunks[0]), vec![1, 1, 2]);
        assert_eq!(<Tensor as Backend>::cat(&chunks, 0).unwrap(), t);
        assert!(t.vectorize_dim(3).unwrap().is_empty());
    }

    #[test]
    fn test_new_zeros() {
        let t = Tensor::zeros([1]);
        let z = t.new_zeros(&[2, 0, 3]).unwrap();
        assert_eq!(z.shape(), &[2, 0, 3]);
        assert_eq!(z.elem_count(), 0);
    }
}
