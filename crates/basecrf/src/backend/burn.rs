//! The burn implementation for backend provision.
//! Since burn tensors are constrained with const generics, the operations are
//! macro applied per rank; `cat` and `slice` keep the rank, so one rank serves
//! both the input chunks and the outputs of a network.
use burn::prelude::{Backend as BurnBackend, Tensor};
use burn::tensor::Shape;
use super::Backend;
use crate::error::{ConfigError, Result};

fn check_slice(shape: &[usize], dimension: usize, start: usize, len: usize) -> Result<()> {
    match shape.get(dimension) {
        Some(&size) if start + len <= size => Ok(()),
        _ => Err(ConfigError::ShapeMismatch {
            op: "slice",
            expected: vec![start + len],
            actual: shape.to_vec(),
        }
        .into()),
    }
}

fn check_cat(shapes: &[Vec<usize>], dim: usize) -> Result<()> {
    let Some(first) = shapes.first() else {
        return Err(ConfigError::ShapeMismatch {
            op: "cat",
            expected: vec![1],
            actual: vec![0],
        }
        .into());
    };
    for shape in shapes {
        let agrees = dim < first.len()
            && shape.iter().zip(first).enumerate().all(|(d, (a, b))| d == dim || a == b);
        if !agrees {
            return Err(ConfigError::ShapeMismatch {
                op: "cat",
                expected: first.clone(),
                actual: shape.clone(),
            }
            .into());
        }
    }
    Ok(())
}

macro_rules! impl_core_tensor_ops {
    ($d:literal) => {
        impl<B> Backend for Tensor<B, $d>
        where
            B: BurnBackend,
        {
            fn shape(&self) -> Vec<usize> {
                self.dims().to_vec()
            }

            fn cat(tensors: &[Self], dim: usize) -> Result<Self> {
                let shapes: Vec<_> = tensors.iter().map(|t| t.dims().to_vec()).collect();
                check_cat(&shapes, dim)?;
                Ok(Tensor::cat(tensors.to_vec(), dim))
            }

            fn slice(&self, dimension: usize, start: usize, len: usize) -> Result<Self> {
                check_slice(&self.dims(), dimension, start, len)?;
                Ok(self.clone().narrow(dimension, start, len))
            }

            fn new_zeros(&self, shape: &[usize]) -> Result<Self> {
                if shape.len() != $d {
                    return Err(ConfigError::ShapeMismatch {
                        op: "new_zeros",
                        expected: vec![0; $d],
                        actual: shape.to_vec(),
                    }
                    .into());
                }
                Ok(Tensor::zeros(Shape::from(shape.to_vec()), &self.device()))
            }

            fn to_host(&self) -> Result<crate::tensor::Tensor> {
                crate::tensor::Tensor::from_burn(self.clone())
            }
        }
    };
}

impl_core_tensor_ops!(1);
impl_core_tensor_ops!(2);
impl_core_tensor_ops!(3);
impl_core_tensor_ops!(4);
impl_core_tensor_ops!(5);
impl_core_tensor_ops!(6);

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type T3 = Tensor<NdArray, 3>;

    #[test]
    fn test_vectorize_and_cat() {
        let device = Default::default();
        let t = crate::tensor::Tensor::new((0..6).map(|v| v as f32).collect(), [3, 1, 2])
            .unwrap()
            .to_burn::<NdArray, 3>(&device)
            .unwrap();
        let chunks = t.vectorize_dim(0).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].dims(), [1, 1, 2]);

        let joined = <T3 as Backend>::cat(&chunks, 1).unwrap();
        assert_eq!(joined.dims(), [1, 3, 2]);
        assert_eq!(joined.to_host().unwrap().as_slice(), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(<T3 as Backend>::cat(&[], 0).is_err());
        assert!(Backend::slice(&t, 0, 3, 1).is_err());
    }

    #[test]
    fn test_new_zeros_checks_rank() {
        let t = T3::zeros([1, 1, 1], &Default::default());
        assert_eq!(t.new_zeros(&[2, 0, 4]).unwrap().dims(), [2, 0, 4]);
        assert!(t.new_zeros(&[2, 4]).is_err());
    }
}
