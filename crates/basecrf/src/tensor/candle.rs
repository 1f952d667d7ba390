use candle_core::{DType, Device};
use crate::error::Result;
use super::Tensor;

impl TryFrom<&candle_core::Tensor> for Tensor {
    type Error = crate::error::Error;

    fn try_from(tensor: &candle_core::Tensor) -> Result<Self> {
        let shape = tensor.dims().to_vec();
        let data = tensor
            .to_dtype(DType::F32)?
            .flatten_all()?
            .to_vec1::<f32>()?;
        Tensor::new(data, shape)
    }
}

impl Tensor {
    /// Copy into a candle tensor on `device`.
    pub fn to_candle(&self, device: &Device) -> Result<candle_core::Tensor> {
        let tensor = candle_core::Tensor::from_vec(self.as_slice().to_vec(), self.shape().to_vec(), device)?;
        Ok(tensor)
    }
}
