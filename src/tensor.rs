//! Conversions between `ndarray` arrays and backend tensors.

use anyhow::Result;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use ndarray::{Array1, Array2, Array3};

/// Upload a `(frames, channels)` array.
pub fn array2_to_tensor<B: Backend>(array: &Array2<f32>, device: &B::Device) -> Tensor<B, 2> {
    let shape = [array.nrows(), array.ncols()];
    let values: Vec<f32> = array.iter().copied().collect();
    Tensor::from_data(TensorData::new(values, shape), device)
}

fn values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<(Vec<usize>, Vec<f32>)> {
    let dims = tensor.dims().to_vec();
    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Failed to read tensor data: {e:?}"))?;
    Ok((dims, values))
}

pub fn tensor_to_array1<B: Backend>(tensor: Tensor<B, 1>) -> Result<Array1<f32>> {
    let (_, values) = values(tensor)?;
    Ok(Array1::from(values))
}

pub fn tensor_to_array2<B: Backend>(tensor: Tensor<B, 2>) -> Result<Array2<f32>> {
    let (dims, values) = values(tensor)?;
    Ok(Array2::from_shape_vec((dims[0], dims[1]), values)?)
}

pub fn tensor_to_array3<B: Backend>(tensor: Tensor<B, 3>) -> Result<Array3<f32>> {
    let (dims, values) = values(tensor)?;
    Ok(Array3::from_shape_vec((dims[0], dims[1], dims[2]), values)?)
}
