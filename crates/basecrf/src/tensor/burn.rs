//! Burn tensors carry their rank as a const generic, so conversions are
//! generic over `D` and check it against the dynamic shape at runtime.
use burn::prelude::{Backend as BurnBackend, Tensor as BurnTensor};
use burn::tensor::TensorData;
use crate::error::{BackendError, ConfigError, Result};
use super::Tensor;

impl Tensor {
    /// Read a float burn tensor of any rank back to the host.
    pub fn from_burn<B: BurnBackend, const D: usize>(tensor: BurnTensor<B, D>) -> Result<Self> {
        let shape = tensor.dims().to_vec();
        let data = tensor
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| BackendError::Inference(format!("burn tensor readback: {e:?}")))?;
        Tensor::new(data, shape)
    }

    /// Upload into a burn tensor of rank `D` on `device`.
    pub fn to_burn<B: BurnBackend, const D: usize>(&self, device: &B::Device) -> Result<BurnTensor<B, D>> {
        if self.rank() != D {
            return Err(ConfigError::ShapeMismatch {
                op: "to_burn",
                expected: vec![0; D],
                actual: self.shape().to_vec(),
            }
            .into());
        }
        let data = TensorData::new(self.as_slice().to_vec(), self.shape().to_vec());
        Ok(BurnTensor::<B, D>::from_data(data, device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_burn_round_trip_keeps_shape() {
        let device = Default::default();
        let t = Tensor::new((0..6).map(|v| v as f32).collect(), [3, 1, 2]).unwrap();
        let b = t.to_burn::<NdArray, 3>(&device).unwrap();
        assert_eq!(b.dims(), [3, 1, 2]);
        let back = Tensor::from_burn(b).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_burn_rank_mismatch_is_rejected() {
        let device = Default::default();
        let t = Tensor::zeros([2, 2]);
        assert!(t.to_burn::<NdArray, 3>(&device).is_err());
    }
}
